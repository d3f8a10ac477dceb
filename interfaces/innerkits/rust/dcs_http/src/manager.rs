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

use std::sync::Arc;

use dcs_http_client::async_impl::{Call, Client};
use dcs_http_client::{HttpClientError, Tag};
use dcs_platform::Platform;
use log::{debug, info};
use once_cell::sync::OnceCell;
use serde::de::DeserializeOwned;

use crate::callback::{DcsCallback, DefaultCallback, DirectCallback};
use crate::config::HttpManagerConfig;
use crate::error::DispatchError;
use crate::request::{GetBuilder, PostMultipartBuilder, PostStringBuilder};
use crate::response::RawResponse;
use crate::task::{RequestCall, TaskStatus};
use crate::wrapper::{RawCallbackWrapper, TypedCallbackWrapper};

static INSTANCE: OnceCell<HttpManager> = OnceCell::new();

/// Dispatches [`RequestCall`]s and delivers their results through callbacks
/// run on a [`Platform`].
///
/// The manager owns a [`Client`] that is never reconfigured. Most programs
/// use the process-wide instance:
///
/// ```no_run
/// use std::sync::Arc;
///
/// use dcs_http::callback::DcsCallback;
/// use dcs_http::error::DispatchError;
/// use dcs_http::response::RawResponse;
/// use dcs_http::HttpManager;
/// use dcs_http_client::async_impl::Call;
///
/// struct Login;
///
/// impl DcsCallback for Login {
///     fn on_response(&self, response: RawResponse, id: i32) {
///         println!("{}: {}", id, response.text());
///     }
///
///     fn on_error(&self, _call: &Call, error: &DispatchError, id: i32) {
///         println!("{}: {}", id, error);
///     }
/// }
///
/// # fn login() -> Result<(), dcs_http_client::HttpClientError> {
/// let manager = HttpManager::instance()?;
/// let request = HttpManager::get()
///     .url("http://www.example.com/login")
///     .tag("login")
///     .build(manager.client())?;
/// manager.execute(&request, Some(Arc::new(Login)));
/// manager.cancel_tag("login");
/// # Ok(())
/// # }
/// ```
pub struct HttpManager {
    client: Client,
    platform: Arc<dyn Platform>,
}

impl HttpManager {
    /// Creates a manager delivering on the process-wide callback thread.
    /// Without a client, one is built from [`HttpManagerConfig::default`].
    pub fn new(client: Option<Client>) -> Result<Self, HttpClientError> {
        let client = match client {
            Some(client) => client,
            None => HttpManagerConfig::default().client_builder().build()?,
        };
        let platform =
            dcs_platform::main_thread().map_err(|e| HttpClientError::other(Some(e)))?;
        Ok(Self::with_platform(client, platform))
    }

    /// Creates a manager with a client built from `config`.
    pub fn from_config(config: &HttpManagerConfig) -> Result<Self, HttpClientError> {
        Self::new(Some(config.client_builder().build()?))
    }

    /// Creates a manager that runs callbacks on `platform`.
    pub fn with_platform(client: Client, platform: Arc<dyn Platform>) -> Self {
        Self { client, platform }
    }

    /// Creates the process-wide manager on the first call. Later calls return
    /// it and ignore `client`.
    pub fn init_client(client: Option<Client>) -> Result<&'static HttpManager, HttpClientError> {
        INSTANCE.get_or_try_init(|| {
            info!("creating the process-wide http manager");
            Self::new(client)
        })
    }

    /// Gets the process-wide manager, creating it with the default client if
    /// needed.
    pub fn instance() -> Result<&'static HttpManager, HttpClientError> {
        Self::init_client(None)
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn platform(&self) -> &Arc<dyn Platform> {
        &self.platform
    }

    pub fn get() -> GetBuilder {
        GetBuilder::new()
    }

    pub fn post() -> PostMultipartBuilder {
        PostMultipartBuilder::new()
    }

    pub fn post_string() -> PostStringBuilder {
        PostStringBuilder::new()
    }

    /// Runs `request` on the transport and delivers the buffered response to
    /// `callback`. Returns immediately.
    ///
    /// `callback` receives `on_response` or `on_error`, then `on_after`, on
    /// the manager's platform. Without a callback results are dropped.
    pub fn execute(&self, request: &RequestCall, callback: Option<Arc<dyn DcsCallback>>) {
        debug!("execute request {}", request.id());
        let callback = callback.unwrap_or_else(|| Arc::new(DefaultCallback));
        let wrapper = RawCallbackWrapper::new(request.clone(), callback, self.platform.clone());
        request.submit();
        if request.call().enqueue(wrapper.clone()).is_err() {
            wrapper.reject_duplicate();
        }
    }

    /// Runs `request` on the transport and decodes a 2xx JSON body into `T`.
    /// Returns immediately.
    ///
    /// `callback` receives either `on_success` or `on_failure` on the
    /// manager's platform, with no after hook. Without a callback results
    /// are dropped, the response body is still released.
    pub fn execute_typed<T>(&self, request: &RequestCall, callback: Option<Arc<dyn DirectCallback<T>>>)
    where
        T: DeserializeOwned + Send + 'static,
    {
        debug!("execute typed request {}", request.id());
        let wrapper = TypedCallbackWrapper::new(request.clone(), callback, self.platform.clone());
        request.submit();
        if request.call().enqueue(wrapper.clone()).is_err() {
            wrapper.reject_duplicate();
        }
    }

    /// Runs `request` on the caller's runtime and returns the buffered
    /// response. The platform is not involved. Responses refused by the
    /// default validation (non-2xx) are returned as
    /// [`DispatchError::Rejected`].
    pub async fn execute_async(&self, request: &RequestCall) -> Result<RawResponse, DispatchError> {
        debug!("execute request {} asynchronously", request.id());
        if !request.submit() {
            return Err(DispatchError::AlreadyExecuted);
        }
        let outcome = fetch(request.call()).await;
        request.set_status(TaskStatus::of(&outcome));
        request.set_status(TaskStatus::Completed);
        outcome
    }

    /// Cancels every queued or running call tagged with `tag`.
    pub fn cancel_tag(&self, tag: impl Into<Tag>) {
        let tag = tag.into();
        let dispatcher = self.client.dispatcher();
        let matching: Vec<Call> = dispatcher
            .queued_calls()
            .into_iter()
            .chain(dispatcher.running_calls())
            .filter(|call| call.tag() == Some(&tag))
            .collect();
        info!("cancel {} calls tagged {}", matching.len(), tag);
        matching.iter().for_each(Call::cancel);
    }
}

async fn fetch(call: &Call) -> Result<RawResponse, DispatchError> {
    let mut response = call
        .execute()
        .await
        .map_err(|e| DispatchError::from_transport(call, e))?;
    if call.is_canceled() {
        return Err(DispatchError::Canceled);
    }
    if !response.is_successful() {
        return Err(DispatchError::Rejected(response.status().as_u16()));
    }
    let raw = RawResponse::read(&mut response)
        .await
        .map_err(|e| DispatchError::from_transport(call, e))?;
    if call.is_canceled() {
        return Err(DispatchError::Canceled);
    }
    Ok(raw)
}
