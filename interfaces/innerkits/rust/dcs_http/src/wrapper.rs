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

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use dcs_http_client::async_impl::{Call, Callback};
use dcs_http_client::{HttpClientError, Response};
use dcs_platform::Platform;
use log::{debug, error};
use serde::de::DeserializeOwned;

use crate::callback::{DcsCallback, DirectCallback};
use crate::error::DispatchError;
use crate::response::RawResponse;
use crate::task::{RequestCall, TaskStatus};

/// Adapts a [`DcsCallback`] to the transport callback.
#[derive(Clone)]
pub(crate) struct RawCallbackWrapper {
    request: RequestCall,
    callback: Arc<dyn DcsCallback>,
    platform: Arc<dyn Platform>,
}

impl RawCallbackWrapper {
    pub(crate) fn new(
        request: RequestCall,
        callback: Arc<dyn DcsCallback>,
        platform: Arc<dyn Platform>,
    ) -> Self {
        Self {
            request,
            callback,
            platform,
        }
    }

    async fn accept(&self, call: &Call, response: &mut Response) -> Result<RawResponse, DispatchError> {
        if call.is_canceled() {
            return Err(DispatchError::Canceled);
        }
        let id = self.request.id();
        let callback = &self.callback;
        let valid = panic::catch_unwind(AssertUnwindSafe(|| callback.validate_response(response, id)))
            .map_err(|e| DispatchError::Unexpected(panic_message(e.as_ref())))?;
        if !valid {
            return Err(DispatchError::Rejected(response.status().as_u16()));
        }
        let raw = RawResponse::read(response)
            .await
            .map_err(|e| DispatchError::from_transport(call, e))?;
        if call.is_canceled() {
            return Err(DispatchError::Canceled);
        }
        Ok(raw)
    }

    fn deliver(&self, call: &Call, outcome: Result<RawResponse, DispatchError>) {
        self.request.set_status(TaskStatus::of(&outcome));
        let request = self.request.clone();
        let callback = self.callback.clone();
        let call = call.clone();
        self.platform.execute(Box::new(move || {
            let id = request.id();
            match outcome {
                Ok(response) => {
                    debug!("request {} on_response is called", id);
                    callback.on_response(response, id);
                }
                Err(e) => {
                    debug!("request {} on_error is called: {}", id, e);
                    callback.on_error(&call, &e, id);
                }
            }
            callback.on_after(id);
            request.set_status(TaskStatus::Completed);
        }));
    }

    /// Reports a second execution of the same request. The status belongs to
    /// the first execution and is left alone.
    pub(crate) fn reject_duplicate(&self) {
        let id = self.request.id();
        let callback = self.callback.clone();
        let call = self.request.call().clone();
        error!("request {} is already executed", id);
        self.platform.execute(Box::new(move || {
            callback.on_error(&call, &DispatchError::AlreadyExecuted, id);
            callback.on_after(id);
        }));
    }
}

impl Callback for RawCallbackWrapper {
    fn on_failure(&self, call: &Call, error: HttpClientError) {
        debug!("request {} on_failure callback is called", self.request.id());
        self.deliver(call, Err(DispatchError::from_transport(call, error)));
    }

    async fn on_response(&self, call: &Call, mut response: Response) {
        debug!("request {} on_response callback is called", self.request.id());
        let outcome = self.accept(call, &mut response).await;
        response.close();
        self.deliver(call, outcome);
    }
}

/// Adapts an optional [`DirectCallback`] to the transport callback. The body
/// is decoded as JSON into `T`.
pub(crate) struct TypedCallbackWrapper<T> {
    request: RequestCall,
    callback: Option<Arc<dyn DirectCallback<T>>>,
    platform: Arc<dyn Platform>,
}

impl<T> Clone for TypedCallbackWrapper<T> {
    fn clone(&self) -> Self {
        Self {
            request: self.request.clone(),
            callback: self.callback.clone(),
            platform: self.platform.clone(),
        }
    }
}

impl<T> TypedCallbackWrapper<T>
where
    T: DeserializeOwned + Send + 'static,
{
    pub(crate) fn new(
        request: RequestCall,
        callback: Option<Arc<dyn DirectCallback<T>>>,
        platform: Arc<dyn Platform>,
    ) -> Self {
        Self {
            request,
            callback,
            platform,
        }
    }

    async fn decode(call: &Call, response: &mut Response) -> Result<T, DispatchError> {
        if call.is_canceled() {
            return Err(DispatchError::Canceled);
        }
        if !response.is_successful() {
            return Err(DispatchError::Rejected(response.status().as_u16()));
        }
        let body = response
            .bytes()
            .await
            .map_err(|e| DispatchError::from_transport(call, e))?;
        if call.is_canceled() {
            return Err(DispatchError::Canceled);
        }
        Ok(serde_json::from_slice(&body)?)
    }

    fn deliver(&self, call: &Call, outcome: Result<T, DispatchError>) {
        self.request.set_status(TaskStatus::of(&outcome));
        let Some(callback) = self.callback.clone() else {
            debug!("request {} has no callback, result dropped", self.request.id());
            self.request.set_status(TaskStatus::Completed);
            return;
        };
        let request = self.request.clone();
        let call = call.clone();
        self.platform.execute(Box::new(move || {
            let id = request.id();
            match outcome {
                Ok(value) => callback.on_success(value, id),
                Err(e) => callback.on_failure(id, &call, &e.to_string()),
            }
            request.set_status(TaskStatus::Completed);
        }));
    }

    pub(crate) fn reject_duplicate(&self) {
        let id = self.request.id();
        error!("request {} is already executed", id);
        let Some(callback) = self.callback.clone() else {
            return;
        };
        let call = self.request.call().clone();
        self.platform.execute(Box::new(move || {
            callback.on_failure(id, &call, &DispatchError::AlreadyExecuted.to_string());
        }));
    }
}

impl<T> Callback for TypedCallbackWrapper<T>
where
    T: DeserializeOwned + Send + 'static,
{
    fn on_failure(&self, call: &Call, error: HttpClientError) {
        debug!("request {} on_failure callback is called", self.request.id());
        self.deliver(call, Err(DispatchError::from_transport(call, error)));
    }

    async fn on_response(&self, call: &Call, mut response: Response) {
        debug!("request {} on_response callback is called", self.request.id());
        let outcome = Self::decode(call, &mut response).await;
        response.close();
        self.deliver(call, outcome);
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "validate_response panicked".to_string())
}
