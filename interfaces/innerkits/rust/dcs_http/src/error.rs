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

use dcs_http_client::async_impl::Call;
use dcs_http_client::{ErrorKind, HttpClientError};

/// Why a dispatched request did not produce a result.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// The transport failed: connection, timeout, body transfer, etc.
    #[error(transparent)]
    Transport(#[from] HttpClientError),

    /// The call was canceled before its result was delivered.
    #[error("Canceled!")]
    Canceled,

    /// The response was refused by `validate_response`, or was not a 2xx
    /// response for typed requests.
    #[error("request failed, response's code is: {0}")]
    Rejected(u16),

    /// The body could not be decoded into the requested type.
    #[error(transparent)]
    Deserialize(#[from] serde_json::Error),

    /// The request handle was already executed.
    #[error("Already Executed")]
    AlreadyExecuted,

    /// User code panicked while the response was handled.
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl DispatchError {
    /// Converts a transport failure of `call`. Any failure of a canceled call
    /// is reported as [`DispatchError::Canceled`].
    pub(crate) fn from_transport(call: &Call, error: HttpClientError) -> Self {
        if call.is_canceled() || error.is_canceled() {
            return Self::Canceled;
        }
        match error.error_kind() {
            ErrorKind::AlreadyExecuted => Self::AlreadyExecuted,
            _ => Self::Transport(error),
        }
    }

    /// Returns `true` for [`DispatchError::Canceled`].
    pub fn is_canceled(&self) -> bool {
        matches!(self, Self::Canceled)
    }
}
