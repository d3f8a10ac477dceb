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

use std::fmt::{Debug, Formatter};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use futures::FutureExt;
use log::debug;
use reqwest::Url;
use tokio_util::sync::CancellationToken;

use super::{Client, Dispatcher};
use crate::{HttpClientError, Response, Tag, Timeout};

/// Receives the outcome of an enqueued [`Call`].
///
/// Exactly one of the two methods is invoked per call, on a worker thread of
/// the dispatcher runtime.
pub trait Callback: Send + Sync + 'static {
    /// Called when the request could not be executed: it was canceled, the
    /// connection failed, a timeout elapsed, etc.
    fn on_failure(&self, call: &Call, error: HttpClientError);

    /// Called when the response head was received. The body may still be
    /// streaming, and is released when `response` is dropped.
    fn on_response(&self, call: &Call, response: Response) -> impl Future<Output = ()> + Send;
}

/// A request that has been prepared for execution.
///
/// A call can be executed once. It can be canceled at any time; a call that
/// is canceled before or while it runs fails with a `Canceled` error, and so
/// does reading the body of its response once the call is canceled.
///
/// Cloning a `Call` gives another handle to the same call.
#[derive(Clone)]
pub struct Call {
    inner: Arc<CallInner>,
}

struct CallInner {
    client: Client,
    request: Mutex<Option<reqwest::Request>>,
    url: Url,
    host: String,
    tag: Option<Tag>,
    executed: AtomicBool,
    canceled: AtomicBool,
    token: CancellationToken,
}

impl Call {
    pub(crate) fn new(client: Client, request: reqwest::Request, tag: Option<Tag>) -> Self {
        let url = request.url().clone();
        let host = url.host_str().unwrap_or_default().to_string();
        Self {
            inner: Arc::new(CallInner {
                client,
                request: Mutex::new(Some(request)),
                url,
                host,
                tag,
                executed: AtomicBool::new(false),
                canceled: AtomicBool::new(false),
                token: CancellationToken::new(),
            }),
        }
    }

    /// Gets the tag the request was built with.
    pub fn tag(&self) -> Option<&Tag> {
        self.inner.tag.as_ref()
    }

    /// Gets the URL of the request.
    pub fn url(&self) -> &Url {
        &self.inner.url
    }

    /// Gets the host of the request.
    pub fn host(&self) -> &str {
        &self.inner.host
    }

    /// Returns `true` once the call has been enqueued or executed.
    pub fn is_executed(&self) -> bool {
        self.inner.executed.load(Ordering::SeqCst)
    }

    /// Returns `true` if [`cancel`](Call::cancel) was called.
    pub fn is_canceled(&self) -> bool {
        self.inner.canceled.load(Ordering::SeqCst)
    }

    /// Replaces the total timeout of the request. Has no effect once the
    /// request has been sent.
    pub fn set_timeout(&self, timeout: Timeout) {
        let mut request = self
            .inner
            .request
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(request) = request.as_mut() {
            *request.timeout_mut() = timeout.inner();
        }
    }

    /// Cancels the call. A queued call fails as soon as it is promoted, a
    /// running call stops waiting for the server. Canceling a finished call
    /// only marks it canceled.
    pub fn cancel(&self) {
        if !self.inner.canceled.swap(true, Ordering::SeqCst) {
            debug!("call to {} canceled", self.inner.url);
            self.inner.token.cancel();
        }
    }

    /// Schedules the call on the client's dispatcher. `callback` is invoked
    /// with the outcome from a worker thread.
    ///
    /// # Errors
    ///
    /// Fails if the call was already enqueued or executed.
    pub fn enqueue<C: Callback>(&self, callback: C) -> Result<(), HttpClientError> {
        self.mark_executed()?;
        let call = self.clone();
        let future = async move { call.run(callback).await }.boxed();
        self.dispatcher().enqueue(self.clone(), future);
        Ok(())
    }

    /// Sends the request on the current runtime and waits for the response
    /// head. The call is listed among the dispatcher's running calls until
    /// the body of the response is read or released.
    ///
    /// # Errors
    ///
    /// Fails if the call was already enqueued or executed, was canceled, or
    /// the request failed.
    pub async fn execute(&self) -> Result<Response, HttpClientError> {
        self.mark_executed()?;
        let guard = RunningGuard::new(self);
        let response = self.send().await?;
        Ok(response.with_running(guard))
    }

    fn dispatcher(&self) -> &Dispatcher {
        self.inner.client.dispatcher()
    }

    fn mark_executed(&self) -> Result<(), HttpClientError> {
        if self.inner.executed.swap(true, Ordering::SeqCst) {
            return Err(HttpClientError::already_executed(&self.inner.url));
        }
        Ok(())
    }

    async fn run<C: Callback>(&self, callback: C) {
        match self.send().await {
            Ok(response) => callback.on_response(self, response).await,
            Err(e) => {
                debug!("call to {} failed: {}", self.inner.url, e);
                callback.on_failure(self, e);
            }
        }
    }

    async fn send(&self) -> Result<Response, HttpClientError> {
        let url = &self.inner.url;
        if self.is_canceled() {
            return Err(HttpClientError::canceled(url));
        }
        let request = self
            .inner
            .request
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or_else(|| HttpClientError::already_executed(url))?;

        let token = &self.inner.token;
        tokio::select! {
            biased;
            _ = token.cancelled() => Err(HttpClientError::canceled(url)),
            result = self.inner.client.send(request) => result
                .map(|response| response.with_cancel(token.clone()))
                .map_err(|e| e.with_url(url)),
        }
    }

    /// Completes once the call is canceled.
    pub async fn cancelled(&self) {
        self.inner.token.cancelled().await
    }

    pub(crate) fn same_call(&self, other: &Call) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Debug for Call {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Call")
            .field("url", &self.inner.url.as_str())
            .field("tag", &self.inner.tag)
            .field("executed", &self.is_executed())
            .field("canceled", &self.is_canceled())
            .finish()
    }
}

/// Keeps an executed call among the running calls of its dispatcher.
pub(crate) struct RunningGuard {
    call: Call,
}

impl RunningGuard {
    fn new(call: &Call) -> Self {
        call.dispatcher().executed(call);
        Self { call: call.clone() }
    }
}

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.call.dispatcher().finished_sync(&self.call);
    }
}

#[cfg(test)]
mod ut_call {
    use std::sync::mpsc::{self, Sender};
    use std::time::{Duration, Instant};

    use super::*;
    use crate::test_server::{TestResponse, TestServer};
    use crate::{ErrorKind, Request};

    struct ChannelCallback(Sender<Result<(u16, String), ErrorKind>>);

    impl Callback for ChannelCallback {
        fn on_failure(&self, _call: &Call, error: HttpClientError) {
            let _ = self.0.send(Err(error.error_kind()));
        }

        async fn on_response(&self, _call: &Call, mut response: Response) {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            let _ = self.0.send(Ok((status, body)));
        }
    }

    fn new_call(client: &Client, url: &str, tag: &str) -> Call {
        let request = Request::builder().url(url).tag(tag).body("").unwrap();
        client.new_call(request).unwrap()
    }

    #[test]
    fn ut_call_enqueue() {
        let server = TestServer::start(|_| TestResponse::ok("hello"));
        let client = Client::builder().build().unwrap();
        let call = new_call(&client, &server.url("/"), "home");
        assert_eq!(call.tag(), Some(&Tag::from("home")));
        assert_eq!(call.host(), "127.0.0.1");

        let (tx, rx) = mpsc::channel();
        call.enqueue(ChannelCallback(tx)).unwrap();
        assert!(call.is_executed());
        let result = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(result, Ok((200, "hello".to_string())));
    }

    #[test]
    fn ut_call_enqueue_twice() {
        let server = TestServer::start(|_| TestResponse::ok("hello"));
        let client = Client::builder().build().unwrap();
        let call = new_call(&client, &server.url("/"), "home");
        let (tx, rx) = mpsc::channel();
        call.enqueue(ChannelCallback(tx.clone())).unwrap();
        let err = call.enqueue(ChannelCallback(tx)).err().unwrap();
        assert_eq!(err.error_kind(), ErrorKind::AlreadyExecuted);
        assert_eq!(err.url(), Some(call.url()));
        assert!(rx.recv_timeout(Duration::from_secs(5)).unwrap().is_ok());
        assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());
    }

    #[test]
    fn ut_call_cancel_running() {
        let server = TestServer::start(|_| {
            TestResponse::ok("late").delay(Duration::from_millis(3000))
        });
        let client = Client::builder().build().unwrap();
        let call = new_call(&client, &server.url("/"), "slow");
        let (tx, rx) = mpsc::channel();
        let start = Instant::now();
        call.enqueue(ChannelCallback(tx)).unwrap();
        std::thread::sleep(Duration::from_millis(200));
        call.cancel();
        let result = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(result, Err(ErrorKind::Canceled));
        assert!(start.elapsed() < Duration::from_millis(2500));
        assert!(call.is_canceled());
    }

    #[test]
    fn ut_call_cancel_before_enqueue() {
        let server = TestServer::start(|_| TestResponse::ok("hello"));
        let client = Client::builder().build().unwrap();
        let call = new_call(&client, &server.url("/"), "home");
        call.cancel();
        let (tx, rx) = mpsc::channel();
        call.enqueue(ChannelCallback(tx)).unwrap();
        let result = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(result, Err(ErrorKind::Canceled));
        assert_eq!(server.hits(), 0);
    }

    #[tokio::test]
    async fn ut_call_set_timeout() {
        let server = TestServer::start(|_| {
            TestResponse::ok("late").delay(Duration::from_millis(1000))
        });
        let client = Client::builder().build().unwrap();
        let call = new_call(&client, &server.url("/"), "slow");
        call.set_timeout(Timeout::from_millis(100));
        let err = call.execute().await.err().unwrap();
        assert_eq!(err.error_kind(), ErrorKind::Timeout);
    }

    #[tokio::test]
    async fn ut_call_execute() {
        let server = TestServer::start(|request| TestResponse::ok(request.method.clone()));
        let client = Client::builder().build().unwrap();
        let call = new_call(&client, &server.url("/"), "home");
        let mut response = call.execute().await.unwrap();
        assert_eq!(client.dispatcher().running_calls_count(), 1);
        assert_eq!(response.text().await.unwrap(), "GET");
        assert_eq!(client.dispatcher().running_calls_count(), 0);
        let err = call.execute().await.err().unwrap();
        assert_eq!(err.error_kind(), ErrorKind::AlreadyExecuted);
    }

    #[tokio::test]
    async fn ut_call_cancel_while_reading_body() {
        let server = TestServer::start(|_| {
            TestResponse::ok("helloworld").stall(5, Duration::from_millis(1500))
        });
        let client = Client::builder().build().unwrap();
        let call = new_call(&client, &server.url("/"), "stream");
        let mut response = call.execute().await.unwrap();

        let canceler = call.clone();
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(200));
            canceler.cancel();
        });
        let start = Instant::now();
        let err = response.bytes().await.err().unwrap();
        handle.join().unwrap();
        assert!(err.is_canceled());
        assert!(start.elapsed() < Duration::from_millis(1000));
        assert_eq!(server.released(), 1);
        call.cancelled().await;
    }
}
