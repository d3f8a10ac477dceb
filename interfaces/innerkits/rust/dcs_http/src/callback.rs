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

//! Result callbacks of [`HttpManager`](crate::HttpManager).
//!
//! Except for [`DcsCallback::validate_response`], every method is called on
//! the manager's [`Platform`](dcs_platform::Platform), never on a transport
//! worker.

use dcs_http_client::async_impl::Call;
use dcs_http_client::Response;

use crate::error::DispatchError;
use crate::response::RawResponse;

/// Callback of [`HttpManager::execute`](crate::HttpManager::execute).
///
/// For every request exactly one of `on_response` and `on_error` is called,
/// then `on_after`.
pub trait DcsCallback: Send + Sync {
    /// Decides whether `response` is a success. Runs on the transport worker
    /// before the body is read. The default accepts 2xx responses.
    fn validate_response(&self, response: &Response, id: i32) -> bool {
        let _ = id;
        response.is_successful()
    }

    /// Called with the buffered response of an accepted request.
    fn on_response(&self, response: RawResponse, id: i32);

    /// Called when the request failed, was canceled or was rejected.
    fn on_error(&self, call: &Call, error: &DispatchError, id: i32);

    /// Called after `on_response` or `on_error`.
    fn on_after(&self, id: i32) {
        let _ = id;
    }
}

/// A [`DcsCallback`] that ignores everything. Used when no callback is
/// given.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultCallback;

impl DcsCallback for DefaultCallback {
    fn on_response(&self, _response: RawResponse, _id: i32) {}

    fn on_error(&self, _call: &Call, _error: &DispatchError, _id: i32) {}
}

/// Callback of [`HttpManager::execute_typed`](crate::HttpManager::execute_typed).
///
/// Exactly one method is called per request. There is no after hook.
pub trait DirectCallback<T>: Send + Sync {
    /// Called with the decoded body of a 2xx response.
    fn on_success(&self, value: T, id: i32);

    /// Called when the request failed, was canceled, got a non-2xx status or
    /// its body did not decode. `message` is the error text, `"Canceled!"`
    /// for canceled requests.
    fn on_failure(&self, id: i32, call: &Call, message: &str);
}
