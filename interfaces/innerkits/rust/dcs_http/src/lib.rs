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

//! dcs_http runs HTTP requests in the background and reports their results
//! through callbacks delivered on a single callback thread.
//!
//! Requests are prepared with the builders returned by [`HttpManager::get`],
//! [`HttpManager::post`] and [`HttpManager::post_string`], then handed to
//! [`HttpManager::execute`] or [`HttpManager::execute_typed`]. Requests
//! carrying a tag can be canceled together with [`HttpManager::cancel_tag`].

#![warn(
    missing_docs,
    clippy::redundant_static_lifetimes,
    clippy::enum_variant_names,
    clippy::clone_on_copy,
    clippy::unused_async
)]
#![deny(unused_must_use)]
#![allow(missing_docs)]

/// Result callbacks.
pub mod callback;
/// Client settings.
pub mod config;
pub mod error;
/// Request builders.
pub mod request;
/// Buffered responses.
pub mod response;
/// Prepared requests and their status.
pub mod task;

mod manager;
mod wrapper;

pub use config::{HttpManagerConfig, DEFAULT_MILLISECONDS};
pub use manager::HttpManager;
pub use task::{RequestCall, TaskStatus};
