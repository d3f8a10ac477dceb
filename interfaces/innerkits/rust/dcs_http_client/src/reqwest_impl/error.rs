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

use std::error::Error;
use std::fmt::{Debug, Display, Formatter};

use reqwest::Url;

/// Why a call of this crate failed.
///
/// Errors raised by a call carry the URL of its request, so failures of
/// calls running side by side can be told apart in logs.
pub struct HttpClientError {
    kind: ErrorKind,
    url: Option<Url>,
    cause: Option<Box<dyn Error + Send + Sync>>,
}

impl HttpClientError {
    /// Creates the error a call to `url` fails with once it is canceled.
    ///
    /// # Examples
    ///
    /// ```
    /// # use dcs_http_client::{HttpClientError, Url};
    /// let url = Url::parse("http://www.example.com/login").unwrap();
    /// let canceled = HttpClientError::canceled(&url);
    /// assert!(canceled.is_canceled());
    /// assert_eq!(canceled.url(), Some(&url));
    /// ```
    pub fn canceled(url: &Url) -> Self {
        Self {
            kind: ErrorKind::Canceled,
            url: Some(url.clone()),
            cause: None,
        }
    }

    /// Creates an `Other` error.
    pub fn other<T: Into<Box<dyn Error + Send + Sync>>>(cause: Option<T>) -> Self {
        Self::new_with_cause(ErrorKind::Other, cause)
    }

    pub(crate) fn already_executed(url: &Url) -> Self {
        Self {
            kind: ErrorKind::AlreadyExecuted,
            url: Some(url.clone()),
            cause: None,
        }
    }

    pub(crate) fn new_with_cause<T>(kind: ErrorKind, cause: Option<T>) -> Self
    where
        T: Into<Box<dyn Error + Send + Sync>>,
    {
        Self {
            kind,
            url: None,
            cause: cause.map(Into::into),
        }
    }

    /// Attaches `url` unless the error already names one.
    pub(crate) fn with_url(mut self, url: &Url) -> Self {
        if self.url.is_none() {
            self.url = Some(url.clone());
        }
        self
    }

    pub fn error_kind(&self) -> ErrorKind {
        self.kind
    }

    /// Gets the URL of the request that failed, when known.
    pub fn url(&self) -> Option<&Url> {
        self.url.as_ref()
    }

    /// Returns `true` if the call was canceled.
    pub fn is_canceled(&self) -> bool {
        self.kind == ErrorKind::Canceled
    }

    pub fn is_timeout(&self) -> bool {
        self.kind == ErrorKind::Timeout
    }

    pub fn is_connect(&self) -> bool {
        self.kind == ErrorKind::Connect
    }
}

impl From<reqwest::Error> for HttpClientError {
    fn from(err: reqwest::Error) -> Self {
        let kind = if err.is_builder() {
            ErrorKind::Build
        } else if err.is_timeout() {
            ErrorKind::Timeout
        } else if err.is_connect() {
            ErrorKind::Connect
        } else if err.is_redirect() {
            ErrorKind::Redirect
        } else if err.is_body() {
            ErrorKind::BodyTransfer
        } else if err.is_decode() {
            ErrorKind::BodyDecode
        } else if err.is_request() {
            ErrorKind::Request
        } else {
            ErrorKind::Other
        };
        Self {
            kind,
            url: err.url().cloned(),
            cause: Some(Box::new(err)),
        }
    }
}

impl Debug for HttpClientError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClientError")
            .field("kind", &self.kind)
            .field("url", &self.url.as_ref().map(Url::as_str))
            .field("cause", &self.cause)
            .finish()
    }
}

impl Display for HttpClientError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.kind.as_str())?;
        if let Some(url) = self.url.as_ref() {
            write!(f, " ({})", url)?;
        }
        if let Some(cause) = self.cause.as_ref() {
            write!(f, ": {}", cause)?;
        }
        Ok(())
    }
}

impl Error for HttpClientError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.cause.as_ref().map(|e| e.as_ref() as &(dyn Error + 'static))
    }
}

/// What went wrong with a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The client or the request could not be built.
    Build,
    Connect,
    /// Sending the request failed after the connection was made.
    Request,
    Redirect,
    /// The body could not be sent or received.
    BodyTransfer,
    BodyDecode,
    /// The call was canceled before it finished.
    Canceled,
    /// The call was enqueued or executed a second time.
    AlreadyExecuted,
    /// A configured timeout elapsed.
    Timeout,
    Other,
}

impl ErrorKind {
    /// Gets a short description of this kind, used as the start of the
    /// error message.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Build => "Build Error",
            Self::Connect => "Connect Error",
            Self::Request => "Request Error",
            Self::Redirect => "Redirect Error",
            Self::BodyTransfer => "Body Transfer Error",
            Self::BodyDecode => "Body Decode Error",
            Self::Canceled => "Canceled",
            Self::AlreadyExecuted => "Already Executed",
            Self::Timeout => "Timeout Error",
            Self::Other => "Other Error",
        }
    }
}

#[cfg(test)]
mod ut_error {
    use super::*;

    #[test]
    fn ut_error_display() {
        let url = Url::parse("http://127.0.0.1:8080/login").unwrap();
        assert_eq!(
            HttpClientError::canceled(&url).to_string(),
            "Canceled (http://127.0.0.1:8080/login)"
        );
        assert_eq!(
            HttpClientError::already_executed(&url).to_string(),
            "Already Executed (http://127.0.0.1:8080/login)"
        );
        let other = HttpClientError::other(Some("boom"));
        assert_eq!(other.error_kind(), ErrorKind::Other);
        assert_eq!(other.to_string(), "Other Error: boom");
        assert!(other.source().is_some());
        assert!(HttpClientError::canceled(&url).source().is_none());
    }

    #[test]
    fn ut_error_with_url() {
        let first = Url::parse("http://127.0.0.1/first").unwrap();
        let second = Url::parse("http://127.0.0.1/second").unwrap();
        let err = HttpClientError::new_with_cause(ErrorKind::Timeout, Some("elapsed"))
            .with_url(&first)
            .with_url(&second);
        assert_eq!(err.url(), Some(&first));
        assert!(err.is_timeout());
        assert!(!err.is_canceled());
        assert!(!err.is_connect());
    }
}
