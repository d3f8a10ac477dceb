/*
 * Copyright (c) 2022 Huawei Device Co., Ltd.
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *     http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

//! This crate is the transport of the DCS HTTP stack. It wraps `Reqwest`,
//! runs calls on its own worker runtime and keeps track of queued and running
//! calls so they can be canceled by tag.

mod reqwest_impl;

pub use reqwest_impl::*;

/// A loopback HTTP/1.1 server for tests.
#[cfg(any(test, feature = "test-server"))]
pub mod test_server;
