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

use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::future::BoxFuture;
use futures::FutureExt;
use log::{debug, error};
use tokio::runtime::{Builder, Handle, Runtime};

use super::Call;
use crate::{ErrorKind, HttpClientError};

/// Runs enqueued calls on a worker runtime and keeps track of every call of
/// a client.
///
/// At most `max_requests` enqueued calls run at once, and at most
/// `max_requests_per_host` of them target the same host. Calls over either
/// limit wait in a FIFO queue and are promoted when a running call finishes.
/// Calls awaited with `Call::execute` are tracked but never limited.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    state: Mutex<State>,
    max_requests: usize,
    max_requests_per_host: usize,
    handle: Handle,
    runtime: Option<Runtime>,
}

#[derive(Default)]
struct State {
    queued: VecDeque<AsyncCall>,
    running: Vec<Call>,
    running_sync: Vec<Call>,
}

impl State {
    fn running_for_host(&self, host: &str) -> usize {
        self.running.iter().filter(|c| c.host() == host).count()
    }
}

struct AsyncCall {
    call: Call,
    future: BoxFuture<'static, ()>,
}

impl Dispatcher {
    pub(crate) fn new(
        max_requests: usize,
        max_requests_per_host: usize,
        worker_threads: Option<usize>,
    ) -> Result<Self, HttpClientError> {
        let mut builder = Builder::new_multi_thread();
        builder.thread_name("dcs-http-worker").enable_all();
        if let Some(threads) = worker_threads {
            builder.worker_threads(threads);
        }
        let runtime = builder
            .build()
            .map_err(|e| HttpClientError::new_with_cause(ErrorKind::Build, Some(e)))?;
        Ok(Self {
            inner: Arc::new(DispatcherInner {
                state: Mutex::new(State::default()),
                max_requests,
                max_requests_per_host,
                handle: runtime.handle().clone(),
                runtime: Some(runtime),
            }),
        })
    }

    /// Gets the maximum number of enqueued calls running at once.
    pub fn max_requests(&self) -> usize {
        self.inner.max_requests
    }

    /// Gets the maximum number of enqueued calls running at once per host.
    pub fn max_requests_per_host(&self) -> usize {
        self.inner.max_requests_per_host
    }

    /// Gets the calls waiting to run, in the order they will be promoted.
    pub fn queued_calls(&self) -> Vec<Call> {
        self.lock().queued.iter().map(|c| c.call.clone()).collect()
    }

    /// Gets the running calls, both enqueued and executed ones.
    pub fn running_calls(&self) -> Vec<Call> {
        let state = self.lock();
        state
            .running
            .iter()
            .chain(state.running_sync.iter())
            .cloned()
            .collect()
    }

    pub fn queued_calls_count(&self) -> usize {
        self.lock().queued.len()
    }

    pub fn running_calls_count(&self) -> usize {
        let state = self.lock();
        state.running.len() + state.running_sync.len()
    }

    /// Cancels every queued and running call.
    pub fn cancel_all(&self) {
        let calls: Vec<Call> = {
            let state = self.lock();
            state
                .queued
                .iter()
                .map(|c| &c.call)
                .chain(state.running.iter())
                .chain(state.running_sync.iter())
                .cloned()
                .collect()
        };
        debug!("canceling {} calls", calls.len());
        calls.iter().for_each(Call::cancel);
    }

    pub(crate) fn enqueue(&self, call: Call, future: BoxFuture<'static, ()>) {
        self.lock().queued.push_back(AsyncCall { call, future });
        self.promote_and_execute();
    }

    pub(crate) fn executed(&self, call: &Call) {
        self.lock().running_sync.push(call.clone());
    }

    pub(crate) fn finished_sync(&self, call: &Call) {
        self.lock().running_sync.retain(|c| !c.same_call(call));
        self.promote_and_execute();
    }

    fn finished(&self, call: &Call) {
        self.lock().running.retain(|c| !c.same_call(call));
        self.promote_and_execute();
    }

    fn promote_and_execute(&self) {
        let ready = {
            let mut state = self.lock();
            let mut ready = Vec::new();
            let mut index = 0;
            while index < state.queued.len() && state.running.len() < self.inner.max_requests {
                let host_full = state.running_for_host(state.queued[index].call.host())
                    >= self.inner.max_requests_per_host;
                if host_full {
                    index += 1;
                    continue;
                }
                if let Some(async_call) = state.queued.remove(index) {
                    state.running.push(async_call.call.clone());
                    ready.push(async_call);
                }
            }
            ready
        };
        for async_call in ready {
            self.spawn(async_call);
        }
    }

    fn spawn(&self, async_call: AsyncCall) {
        let dispatcher = self.clone();
        let AsyncCall { call, future } = async_call;
        self.inner.handle.spawn(async move {
            if AssertUnwindSafe(future).catch_unwind().await.is_err() {
                error!("callback of call to {} panicked", call.url());
            }
            dispatcher.finished(&call);
        });
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for DispatcherInner {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

#[cfg(test)]
mod ut_dispatcher {
    use std::sync::mpsc::{self, Receiver, Sender};
    use std::time::Duration;

    use crate::async_impl::{Callback, Client};
    use crate::test_server::{TestResponse, TestServer};
    use crate::{ErrorKind, HttpClientError, Request, Response};

    use super::*;

    struct ChannelCallback(Sender<Result<String, ErrorKind>>);

    impl Callback for ChannelCallback {
        fn on_failure(&self, _call: &Call, error: HttpClientError) {
            let _ = self.0.send(Err(error.error_kind()));
        }

        async fn on_response(&self, _call: &Call, mut response: Response) {
            let body = response.text().await.unwrap_or_default();
            let _ = self.0.send(Ok(body));
        }
    }

    struct PanicCallback;

    impl Callback for PanicCallback {
        fn on_failure(&self, _call: &Call, _error: HttpClientError) {
            panic!("failure");
        }

        async fn on_response(&self, _call: &Call, _response: Response) {
            panic!("response");
        }
    }

    fn slow_server() -> TestServer {
        let _ = env_logger::builder().is_test(true).try_init();
        TestServer::start(|request| {
            TestResponse::ok(request.path.clone()).delay(Duration::from_millis(300))
        })
    }

    fn enqueue(
        client: &Client,
        url: &str,
    ) -> (Call, Receiver<Result<String, ErrorKind>>) {
        let request = Request::builder().url(url).body("").unwrap();
        let call = client.new_call(request).unwrap();
        let (tx, rx) = mpsc::channel();
        call.enqueue(ChannelCallback(tx)).unwrap();
        (call, rx)
    }

    #[test]
    fn ut_dispatcher_max_requests() {
        let server = slow_server();
        let client = Client::builder().max_requests(1).build().unwrap();
        let dispatcher = client.dispatcher();

        let (_first, rx1) = enqueue(&client, &server.url("/first"));
        let (_second, rx2) = enqueue(&client, &server.url("/second"));
        assert_eq!(dispatcher.running_calls_count(), 1);
        assert_eq!(dispatcher.queued_calls_count(), 1);
        assert_eq!(dispatcher.queued_calls()[0].url().path(), "/second");

        let timeout = Duration::from_secs(5);
        assert_eq!(rx1.recv_timeout(timeout).unwrap(), Ok("/first".to_string()));
        assert_eq!(rx2.recv_timeout(timeout).unwrap(), Ok("/second".to_string()));
        std::thread::sleep(Duration::from_millis(100));
        assert_eq!(dispatcher.running_calls_count(), 0);
        assert_eq!(dispatcher.queued_calls_count(), 0);
    }

    #[test]
    fn ut_dispatcher_max_requests_per_host() {
        let server = slow_server();
        let client = Client::builder()
            .max_requests_per_host(1)
            .build()
            .unwrap();
        let dispatcher = client.dispatcher();

        let (_first, rx1) = enqueue(&client, &server.url("/first"));
        let (_second, rx2) = enqueue(&client, &server.url("/second"));
        assert_eq!(dispatcher.running_calls_count(), 1);
        assert_eq!(dispatcher.queued_calls_count(), 1);

        let timeout = Duration::from_secs(5);
        assert!(rx1.recv_timeout(timeout).unwrap().is_ok());
        assert!(rx2.recv_timeout(timeout).unwrap().is_ok());
    }

    #[test]
    fn ut_dispatcher_cancel_queued() {
        let server = slow_server();
        let client = Client::builder().max_requests(1).build().unwrap();

        let (_first, rx1) = enqueue(&client, &server.url("/first"));
        let (second, rx2) = enqueue(&client, &server.url("/second"));
        second.cancel();

        let timeout = Duration::from_secs(5);
        assert!(rx1.recv_timeout(timeout).unwrap().is_ok());
        assert_eq!(rx2.recv_timeout(timeout).unwrap(), Err(ErrorKind::Canceled));
        assert_eq!(server.hits(), 1);
    }

    #[test]
    fn ut_dispatcher_cancel_all() {
        let server = slow_server();
        let client = Client::builder().max_requests(1).build().unwrap();

        let (first, rx1) = enqueue(&client, &server.url("/first"));
        let (second, rx2) = enqueue(&client, &server.url("/second"));
        client.dispatcher().cancel_all();
        assert!(first.is_canceled());
        assert!(second.is_canceled());

        let timeout = Duration::from_secs(5);
        assert_eq!(rx1.recv_timeout(timeout).unwrap(), Err(ErrorKind::Canceled));
        assert_eq!(rx2.recv_timeout(timeout).unwrap(), Err(ErrorKind::Canceled));
    }

    #[test]
    fn ut_dispatcher_survives_callback_panic() {
        let server = TestServer::start(|_| TestResponse::ok("hello"));
        let client = Client::builder().max_requests(1).build().unwrap();

        let request = Request::builder().url(&server.url("/")).body("").unwrap();
        client.new_call(request).unwrap().enqueue(PanicCallback).unwrap();
        let (_call, rx) = enqueue(&client, &server.url("/after"));
        let result = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(result, Ok("/after".to_string()));
    }
}
