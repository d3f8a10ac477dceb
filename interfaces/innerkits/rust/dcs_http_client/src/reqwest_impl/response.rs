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

use bytes::Bytes;
use log::debug;
use reqwest::header::HeaderMap;
use reqwest::{StatusCode, Url, Version};
use tokio_util::sync::CancellationToken;

use crate::async_impl::RunningGuard;
use crate::{ErrorKind, HttpClientError};

/// A response received for a `Call`.
///
/// Status line and headers are always available. The body is held open until
/// it is read with [`bytes`]/[`text`], closed with [`close`], or the
/// `Response` is dropped, whichever happens first. The body is released at
/// most once.
///
/// A response obtained through a `Call` stops reading its body as soon as the
/// call is canceled.
///
/// [`bytes`]: Response::bytes
/// [`text`]: Response::text
/// [`close`]: Response::close
pub struct Response {
    status: StatusCode,
    version: Version,
    url: Url,
    headers: HeaderMap,
    content_length: Option<u64>,
    body: Option<reqwest::Response>,
    cancel: Option<CancellationToken>,
    running: Option<RunningGuard>,
}

impl Response {
    pub(crate) fn new(inner: reqwest::Response) -> Self {
        Self {
            status: inner.status(),
            version: inner.version(),
            url: inner.url().clone(),
            headers: inner.headers().clone(),
            content_length: inner.content_length(),
            body: Some(inner),
            cancel: None,
            running: None,
        }
    }

    pub(crate) fn with_cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub(crate) fn with_running(mut self, guard: RunningGuard) -> Self {
        self.running = Some(guard);
        self
    }

    /// Gets the status code.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Returns `true` if the status code is in `200..300`.
    pub fn is_successful(&self) -> bool {
        self.status.is_success()
    }

    /// Gets the HTTP version.
    pub fn version(&self) -> Version {
        self.version
    }

    /// Gets the final URL of this response.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Gets the headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Gets the body length announced by the server, if any.
    pub fn content_length(&self) -> Option<u64> {
        self.content_length
    }

    /// Returns `true` once the body has been read or closed.
    pub fn is_closed(&self) -> bool {
        self.body.is_none()
    }

    /// Reads the whole body and releases it.
    ///
    /// # Errors
    ///
    /// Fails with a `Canceled` error if the call this response belongs to is
    /// canceled before the body is complete.
    pub async fn bytes(&mut self) -> Result<Bytes, HttpClientError> {
        let body = self.release().ok_or_else(|| {
            HttpClientError::new_with_cause(ErrorKind::BodyTransfer, Some("body already closed"))
                .with_url(&self.url)
        })?;
        let read = body.bytes();
        let result = match self.cancel.as_ref() {
            Some(token) => tokio::select! {
                biased;
                _ = token.cancelled() => Err(HttpClientError::canceled(&self.url)),
                result = read => result.map_err(HttpClientError::from),
            },
            None => read.await.map_err(HttpClientError::from),
        };
        self.running = None;
        debug!("response body of {} released after read", self.url);
        result
    }

    /// Reads the whole body as UTF-8 text, replacing invalid sequences.
    pub async fn text(&mut self) -> Result<String, HttpClientError> {
        let bytes = self.bytes().await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Releases the body without reading it. Does nothing if the body is
    /// already released.
    pub fn close(&mut self) {
        if self.release().is_some() {
            debug!("response body of {} closed", self.url);
        }
        self.running = None;
    }

    fn release(&mut self) -> Option<reqwest::Response> {
        let body = self.body.take();
        if body.is_some() {
            record_release(&self.url);
        }
        body
    }
}

#[cfg(any(test, feature = "test-server"))]
fn record_release(url: &Url) {
    crate::test_server::record_release(url);
}

#[cfg(not(any(test, feature = "test-server")))]
fn record_release(_url: &Url) {}

impl Drop for Response {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod ut_response {
    use super::*;

    fn response(status: u16, body: &'static str) -> Response {
        let mut inner = http::Response::new(body);
        *inner.status_mut() = StatusCode::from_u16(status).unwrap();
        Response::new(reqwest::Response::from(inner))
    }

    #[tokio::test]
    async fn ut_response_read_once() {
        let mut response = response(200, "hello");
        assert!(response.is_successful());
        assert!(!response.is_closed());
        assert_eq!(response.text().await.unwrap(), "hello");
        assert!(response.is_closed());
        let err = response.bytes().await.err().unwrap();
        assert_eq!(err.error_kind(), ErrorKind::BodyTransfer);
    }

    #[tokio::test]
    async fn ut_response_read_canceled() {
        let token = CancellationToken::new();
        let mut response = response(200, "hello").with_cancel(token.clone());
        token.cancel();
        let err = response.bytes().await.err().unwrap();
        assert!(err.is_canceled());
        assert!(response.is_closed());
    }

    #[test]
    fn ut_response_close() {
        let mut response = response(404, "missing");
        assert!(!response.is_successful());
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        response.close();
        assert!(response.is_closed());
        response.close();
        assert!(response.is_closed());
    }
}
