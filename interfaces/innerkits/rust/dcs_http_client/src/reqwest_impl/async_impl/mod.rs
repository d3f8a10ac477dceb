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

use std::time::Duration;

use crate::{ErrorKind, HttpClientError, Redirect, Request, Response, Timeout};
use log::debug;

mod call;
mod dispatcher;
mod multipart;

pub use call::{Call, Callback};
pub(crate) use call::RunningGuard;
pub use dispatcher::Dispatcher;
pub use multipart::{MultiPart, Part};

const DEFAULT_MAX_REQUESTS: usize = 64;
const DEFAULT_MAX_REQUESTS_PER_HOST: usize = 5;

/// An asynchronous `Client` to make requests with.
///
/// The `Client` holds a connection pool and a [`Dispatcher`] with its own
/// worker runtime, so you should create one and **reuse** it. Cloning is
/// cheap and clones share the pool and the dispatcher.
///
/// # Examples
///
/// ```no_run
/// # use dcs_http_client::async_impl::Client;
/// # use dcs_http_client::Request;
///
/// # async fn send_request() {
/// // Creates a `Client`.
/// let client = Client::builder().build().unwrap();
///
/// // Constructs your `Request`.
/// let request = Request::builder()
///     .url("http://www.example.com")
///     .body("".as_bytes())
///     .unwrap();
///
/// // Sends your request through `Client` and gets the response.
/// let _response = client.request(request).await;
/// # }
/// ```
#[derive(Clone)]
pub struct Client {
    inner: reqwest::Client,
    dispatcher: Dispatcher,
    write_timeout: Option<Duration>,
    retry_on_connection_failure: bool,
}

impl Client {
    /// Creates a `ClientBuilder` to configure a `Client`.
    ///
    /// This is the same as `ClientBuilder::new()`.
    ///
    /// # Examples
    ///
    /// ```
    /// # use dcs_http_client::async_impl::Client;
    ///
    /// let builder = Client::builder();
    /// ```
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Prepares `request` to be sent later, either asynchronously through
    /// [`Call::enqueue`] or awaited with [`Call::execute`].
    ///
    /// # Errors
    ///
    /// This method fails if the request cannot be converted for the underlying
    /// client.
    pub fn new_call<T: Into<reqwest::Body>>(
        &self,
        request: Request<T>,
    ) -> Result<Call, HttpClientError> {
        let tag = request.inner.tag.clone();
        let request = self.build_request(request)?;
        Ok(Call::new(self.clone(), request, tag))
    }

    /// Sends a `Request` and gets the `Response`, without going through the
    /// dispatcher.
    ///
    /// # Errors
    ///
    /// This method fails if there was an error while sending request,
    /// redirect loop was detected or redirect limit was exhausted.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use dcs_http_client::async_impl::Client;
    /// # use dcs_http_client::Request;
    ///
    /// # async fn send_request() {
    /// let client = Client::builder().build().unwrap();
    /// let request = Request::builder()
    ///     .url("http://www.example.com")
    ///     .body("".as_bytes())
    ///     .unwrap();
    /// let _response = client.request(request).await;
    /// # }
    /// ```
    pub async fn request<T: Into<reqwest::Body>>(
        &self,
        request: Request<T>,
    ) -> Result<Response, HttpClientError> {
        let request = self.build_request(request)?;
        self.send(request).await
    }

    /// Gets the `Dispatcher` that runs and tracks the calls of this client.
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Returns `true` if a failed connection attempt is retried once.
    pub fn retry_on_connection_failure(&self) -> bool {
        self.retry_on_connection_failure
    }

    fn build_request<T: Into<reqwest::Body>>(
        &self,
        request: Request<T>,
    ) -> Result<reqwest::Request, HttpClientError> {
        let mut builder = self
            .inner
            .request(request.inner.method, request.inner.url)
            .headers(request.inner.headers)
            .version(request.inner.version)
            .body(request.body.into());
        if let Some(timeout) = request.inner.timeout.inner() {
            builder = builder.timeout(timeout);
        }
        builder.build().map_err(HttpClientError::from)
    }

    pub(crate) async fn send(&self, request: reqwest::Request) -> Result<Response, HttpClientError> {
        let retry = if self.retry_on_connection_failure {
            request.try_clone()
        } else {
            None
        };

        match (self.send_once(request).await, retry) {
            (Err(e), Some(request)) if e.error_kind() == ErrorKind::Connect => {
                debug!("connection to {} failed, retrying once", request.url());
                self.send_once(request).await
            }
            (result, _) => result,
        }
    }

    // The write timeout bounds uploading the request and waiting for the
    // response head.
    async fn send_once(&self, request: reqwest::Request) -> Result<Response, HttpClientError> {
        let pending = self.inner.execute(request);
        let response = match self.write_timeout {
            Some(duration) => tokio::time::timeout(duration, pending)
                .await
                .map_err(|e| HttpClientError::new_with_cause(ErrorKind::Timeout, Some(e)))?,
            None => pending.await,
        };
        response.map(Response::new).map_err(HttpClientError::from)
    }
}

/// A `ClientBuilder` can be used to create a `Client` with custom configuration.
///
/// # Examples
///
/// ```
/// # use dcs_http_client::async_impl::ClientBuilder;
///
/// let builder = ClientBuilder::new();
/// ```
pub struct ClientBuilder {
    inner: reqwest::ClientBuilder,
    write_timeout: Option<Duration>,
    retry_on_connection_failure: bool,
    max_requests: usize,
    max_requests_per_host: usize,
    worker_threads: Option<usize>,
}

impl ClientBuilder {
    /// Creates a `ClientBuilder` to configure a `Client`.
    ///
    /// This is the same as `Client::builder()`.
    pub fn new() -> Self {
        Self {
            inner: reqwest::ClientBuilder::new(),
            write_timeout: None,
            retry_on_connection_failure: false,
            max_requests: DEFAULT_MAX_REQUESTS,
            max_requests_per_host: DEFAULT_MAX_REQUESTS_PER_HOST,
            worker_threads: None,
        }
    }

    /// Only uses HTTP/1.
    ///
    /// # Examples
    ///
    /// ```
    /// # use dcs_http_client::async_impl::ClientBuilder;
    ///
    /// let builder = ClientBuilder::new().http1_only();
    /// ```
    pub fn http1_only(mut self) -> Self {
        self.inner = self.inner.http1_only();
        self
    }

    /// Enables a request timeout.
    ///
    /// The timeout is applied from when the request starts connecting until the
    /// response body has finished.
    ///
    /// Default is `Timeout::none()`.
    pub fn request_timeout(mut self, timeout: Timeout) -> Self {
        if let Some(duration) = timeout.inner() {
            self.inner = self.inner.timeout(duration);
        }
        self
    }

    /// Sets a timeout for only the connect phase of a `Client`.
    ///
    /// Default is `Timeout::none()`.
    ///
    /// # Examples
    ///
    /// ```
    /// # use dcs_http_client::async_impl::ClientBuilder;
    /// # use dcs_http_client::Timeout;
    ///
    /// let builder = ClientBuilder::new()
    ///     .connect_timeout(Timeout::from_secs(60));
    /// ```
    pub fn connect_timeout(mut self, timeout: Timeout) -> Self {
        if let Some(duration) = timeout.inner() {
            self.inner = self.inner.connect_timeout(duration);
        }
        self
    }

    /// Sets a timeout for every read on a connection.
    ///
    /// Default is `Timeout::none()`.
    pub fn read_timeout(mut self, timeout: Timeout) -> Self {
        if let Some(duration) = timeout.inner() {
            self.inner = self.inner.read_timeout(duration);
        }
        self
    }

    /// Sets a timeout for sending the request and receiving the response head.
    ///
    /// Default is `Timeout::none()`.
    pub fn write_timeout(mut self, timeout: Timeout) -> Self {
        self.write_timeout = timeout.inner();
        self
    }

    /// Sets a `RedirectPolicy` for this client.
    ///
    /// Default will follow redirects up to a maximum of 10.
    ///
    /// # Examples
    ///
    /// ```
    /// # use dcs_http_client::async_impl::ClientBuilder;
    /// # use dcs_http_client::Redirect;
    ///
    /// let builder = ClientBuilder::new().redirect(Redirect::none());
    /// ```
    pub fn redirect(mut self, redirect: Redirect) -> Self {
        self.inner = self.inner.redirect(redirect.inner());
        self
    }

    /// Retries a request once when connecting to the server fails. Requests
    /// with streaming bodies are never retried.
    ///
    /// Default is `false`.
    pub fn retry_on_connection_failure(mut self, retry: bool) -> Self {
        self.retry_on_connection_failure = retry;
        self
    }

    /// Sets the maximum number of enqueued calls running at the same time.
    /// Further calls wait in the queue.
    ///
    /// Default is 64. Values below 1 are treated as 1.
    pub fn max_requests(mut self, max: usize) -> Self {
        self.max_requests = max.max(1);
        self
    }

    /// Sets the maximum number of enqueued calls running at the same time for
    /// one host.
    ///
    /// Default is 5. Values below 1 are treated as 1.
    pub fn max_requests_per_host(mut self, max: usize) -> Self {
        self.max_requests_per_host = max.max(1);
        self
    }

    /// Sets the number of worker threads of the dispatcher runtime.
    ///
    /// Default is the number of CPU cores.
    pub fn worker_threads(mut self, threads: usize) -> Self {
        self.worker_threads = Some(threads.max(1));
        self
    }

    /// Returns a `Client` that uses this `ClientBuilder` configuration.
    ///
    /// # Errors
    ///
    /// This method fails if a TLS backend cannot be initialized, or the
    /// dispatcher runtime cannot be started.
    ///
    /// # Examples
    ///
    /// ```
    /// # use dcs_http_client::async_impl::ClientBuilder;
    ///
    /// let client = ClientBuilder::new().build().unwrap();
    /// ```
    pub fn build(self) -> Result<Client, HttpClientError> {
        let inner = self.inner.build().map_err(HttpClientError::from)?;
        let dispatcher = Dispatcher::new(
            self.max_requests,
            self.max_requests_per_host,
            self.worker_threads,
        )?;
        Ok(Client {
            inner,
            dispatcher,
            write_timeout: self.write_timeout,
            retry_on_connection_failure: self.retry_on_connection_failure,
        })
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod ut_client {
    use super::*;
    use crate::test_server::{closed_port_url, TestResponse, TestServer};

    #[tokio::test]
    async fn ut_client_request() {
        let server = TestServer::start(|request| TestResponse::ok(request.path.clone()));
        let client = Client::builder().build().unwrap();
        let request = Request::builder()
            .url(&server.url("/hello"))
            .body("")
            .unwrap();
        let mut response = client.request(request).await.unwrap();
        assert!(response.is_successful());
        assert_eq!(response.text().await.unwrap(), "/hello");
        assert_eq!(client.dispatcher().running_calls_count(), 0);
    }

    #[tokio::test]
    async fn ut_client_write_timeout() {
        let server = TestServer::start(|_| {
            TestResponse::ok("late").delay(Duration::from_millis(1000))
        });
        let client = Client::builder()
            .write_timeout(Timeout::from_millis(100))
            .build()
            .unwrap();
        let request = Request::builder().url(&server.url("/")).body("").unwrap();
        let err = client.request(request).await.err().unwrap();
        assert_eq!(err.error_kind(), ErrorKind::Timeout);
    }

    #[tokio::test]
    async fn ut_client_connect_failure() {
        let client = Client::builder()
            .retry_on_connection_failure(true)
            .build()
            .unwrap();
        assert!(client.retry_on_connection_failure());
        let request = Request::builder()
            .url(&closed_port_url())
            .body("")
            .unwrap();
        let err = client.request(request).await.err().unwrap();
        assert_eq!(err.error_kind(), ErrorKind::Connect);
    }

    #[test]
    fn ut_client_builder_limits() {
        let client = Client::builder()
            .max_requests(0)
            .max_requests_per_host(2)
            .worker_threads(1)
            .build()
            .unwrap();
        assert_eq!(client.dispatcher().max_requests(), 1);
        assert_eq!(client.dispatcher().max_requests_per_host(), 2);
        assert!(!client.retry_on_connection_failure());
    }
}
