// Copyright (C) 2024 Huawei Device Co., Ltd.
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use dcs_http_client::async_impl::Call;
use dcs_http_client::{Tag, Timeout};
use log::debug;

use crate::error::DispatchError;

/// A prepared request, created by the builders of
/// [`request`](crate::request).
///
/// Clones share the call and its status, so a clone kept by the caller can
/// cancel or observe a request handed to the manager.
#[derive(Clone, Debug)]
pub struct RequestCall {
    id: i32,
    call: Call,
    status: Arc<AtomicU8>,
}

/// Progress of a [`RequestCall`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[repr(u8)]
pub enum TaskStatus {
    /// built, not executed yet
    #[default]
    Created = 0,
    /// handed to the transport
    Submitted,
    /// a response was accepted
    Succeeded,
    /// the request failed or its response was rejected
    Failed,
    /// the request was canceled
    Canceled,
    /// the callbacks have run
    Completed,
}

impl From<u8> for TaskStatus {
    fn from(value: u8) -> Self {
        match value {
            1 => Self::Submitted,
            2 => Self::Succeeded,
            3 => Self::Failed,
            4 => Self::Canceled,
            5 => Self::Completed,
            _ => Self::Created,
        }
    }
}

impl TaskStatus {
    pub(crate) fn of<T>(outcome: &Result<T, DispatchError>) -> Self {
        match outcome {
            Ok(_) => Self::Succeeded,
            Err(DispatchError::Canceled) => Self::Canceled,
            Err(_) => Self::Failed,
        }
    }
}

impl RequestCall {
    pub(crate) fn new(id: i32, call: Call) -> Self {
        Self {
            id,
            call,
            status: Arc::new(AtomicU8::new(TaskStatus::Created as u8)),
        }
    }

    /// Identifier passed to every callback of this request.
    pub fn id(&self) -> i32 {
        self.id
    }

    /// Tag matched by `cancel_tag`.
    pub fn tag(&self) -> Option<&Tag> {
        self.call.tag()
    }

    /// The transport call.
    pub fn call(&self) -> &Call {
        &self.call
    }

    /// Sets the total timeout of this request. Must be called before the
    /// request is executed.
    pub fn timeout(self, timeout: Timeout) -> Self {
        self.call.set_timeout(timeout);
        self
    }

    /// Cancels the request. A request canceled before its result is
    /// delivered reports `Canceled!`.
    pub fn cancel(&self) {
        debug!("request {} canceled", self.id);
        self.call.cancel();
    }

    /// Returns `true` once [`cancel`](RequestCall::cancel) or a matching
    /// `cancel_tag` was called.
    pub fn is_canceled(&self) -> bool {
        self.call.is_canceled()
    }

    pub fn status(&self) -> TaskStatus {
        self.status.load(Ordering::SeqCst).into()
    }

    // Created -> Submitted. Fails if the request was executed before.
    pub(crate) fn submit(&self) -> bool {
        self.status
            .compare_exchange(
                TaskStatus::Created as u8,
                TaskStatus::Submitted as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_ok()
    }

    pub(crate) fn set_status(&self, status: TaskStatus) {
        self.status.store(status as u8, Ordering::SeqCst);
    }
}
