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

use std::fmt::{Display, Formatter};

use crate::reqwest_impl::async_impl::MultiPart;
use crate::reqwest_impl::{Method, Version};
use crate::{ErrorKind, HttpClientError, Timeout};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Url;

/// A token attached to a request when it is built. Calls are looked up by tag
/// when they are canceled in bulk; two tags match when their values are equal.
///
/// # Examples
///
/// ```
/// use dcs_http_client::Tag;
///
/// assert_eq!(Tag::from("login"), Tag::from(String::from("login")));
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Tag(String);

impl Tag {
    /// Creates a `Tag`.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Gets the tag value.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Tag {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for Tag {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&Tag> for Tag {
    fn from(value: &Tag) -> Self {
        value.clone()
    }
}

impl Display for Tag {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// HTTP request implementation.
///
/// Request is a message type that can be sent from a HTTP client to a HTTP server.
///
/// # Examples
///
/// ```
/// use dcs_http_client::{Method, Request};
///
/// let request = Request::builder()
///     .method(Method::GET)
///     .url("http://www.example.com")
///     .tag("home")
///     .body("Hello World".as_bytes());
/// ```
pub struct Request<T> {
    pub(crate) inner: RequestInner,
    pub(crate) body: T,
}

impl Request<()> {
    /// Creates a `RequestBuilder` that can construct a `Request`.
    ///
    /// # Examples
    ///
    /// ```
    /// use dcs_http_client::Request;
    ///
    /// let builder = Request::builder();
    /// ```
    pub fn builder() -> RequestBuilder {
        RequestBuilder::new()
    }
}

impl<T> Request<T> {
    /// Gets the tag of this request.
    pub fn tag(&self) -> Option<&Tag> {
        self.inner.tag.as_ref()
    }

    /// Gets the URL of this request.
    pub fn url(&self) -> &Url {
        &self.inner.url
    }

    /// Gets the method of this request.
    pub fn method(&self) -> &Method {
        &self.inner.method
    }

    /// Gets the headers of this request.
    pub fn headers(&self) -> &HeaderMap {
        &self.inner.headers
    }
}

/// A builder that can construct a `Request`.
///
/// # Examples
///
/// ```
/// use dcs_http_client::RequestBuilder;
///
/// let builder = RequestBuilder::new();
/// ```
pub struct RequestBuilder {
    inner: Result<PartialRequest, HttpClientError>,
}

impl RequestBuilder {
    /// Creates a `RequestBuilder`.
    ///
    /// # Examples
    ///
    /// ```
    /// use dcs_http_client::RequestBuilder;
    ///
    /// let builder = RequestBuilder::new();
    /// ```
    pub fn new() -> Self {
        Self {
            inner: Ok(PartialRequest::default()),
        }
    }

    /// Sets `Method` of this request.
    ///
    /// # Examples
    ///
    /// ```
    /// use dcs_http_client::{Method, RequestBuilder};
    ///
    /// let builder = RequestBuilder::new().method(Method::GET);
    /// ```
    pub fn method(mut self, method: Method) -> Self {
        self.inner = self.inner.map(|mut r| {
            r.method = method;
            r
        });
        self
    }

    /// Sets `Url` of this request.
    ///
    /// # Examples
    ///
    /// ```
    /// use dcs_http_client::RequestBuilder;
    ///
    /// let builder = RequestBuilder::new().url("http://www.example.com");
    /// ```
    pub fn url(mut self, url: &str) -> Self {
        self.inner = self.inner.and_then(|mut r| {
            r.url = Some(
                Url::parse(url)
                    .map_err(|e| HttpClientError::new_with_cause(ErrorKind::Build, Some(e)))?,
            );
            Ok(r)
        });
        self
    }

    /// Appends a query pair to the `Url` of this request. The `Url` must be
    /// set before.
    ///
    /// # Examples
    ///
    /// ```
    /// use dcs_http_client::RequestBuilder;
    ///
    /// let builder = RequestBuilder::new()
    ///     .url("http://www.example.com/search")
    ///     .query("q", "weather");
    /// ```
    pub fn query(mut self, name: &str, value: &str) -> Self {
        self.inner = self.inner.and_then(|mut r| {
            match r.url.as_mut() {
                Some(url) => {
                    url.query_pairs_mut().append_pair(name, value);
                }
                None => {
                    return Err(HttpClientError::new_with_cause(
                        ErrorKind::Build,
                        Some("query set before url"),
                    ))
                }
            }
            Ok(r)
        });
        self
    }

    /// Adds a header to this request.
    ///
    /// # Examples
    ///
    /// ```
    /// use dcs_http_client::RequestBuilder;
    ///
    /// let builder = RequestBuilder::new().header("Content-Length", "100");
    /// ```
    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.inner = self.inner.and_then(|mut r| {
            r.headers.append(
                HeaderName::from_bytes(name.as_bytes())
                    .map_err(|e| HttpClientError::new_with_cause(ErrorKind::Build, Some(e)))?,
                value
                    .parse::<HeaderValue>()
                    .map_err(|e| HttpClientError::new_with_cause(ErrorKind::Build, Some(e)))?,
            );
            Ok(r)
        });
        self
    }

    /// Sets the `Version` of the request.
    ///
    /// # Examples
    ///
    /// ```
    /// use dcs_http_client::{RequestBuilder, Version};
    ///
    /// let builder = RequestBuilder::new().version(Version::HTTP_11);
    /// ```
    pub fn version(mut self, version: Version) -> Self {
        self.inner = self.inner.map(|mut r| {
            r.version = version;
            r
        });
        self
    }

    /// Attaches a `Tag` to the request.
    ///
    /// # Examples
    ///
    /// ```
    /// use dcs_http_client::RequestBuilder;
    ///
    /// let builder = RequestBuilder::new().tag("login");
    /// ```
    pub fn tag(mut self, tag: impl Into<Tag>) -> Self {
        let tag = tag.into();
        self.inner = self.inner.map(|mut r| {
            r.tag = Some(tag);
            r
        });
        self
    }

    /// Sets a timeout for this request only, from connecting until the
    /// response body has finished.
    ///
    /// # Examples
    ///
    /// ```
    /// use dcs_http_client::{RequestBuilder, Timeout};
    ///
    /// let builder = RequestBuilder::new().timeout(Timeout::from_secs(10));
    /// ```
    pub fn timeout(mut self, timeout: Timeout) -> Self {
        self.inner = self.inner.map(|mut r| {
            r.timeout = timeout;
            r
        });
        self
    }

    /// Creates a `Request` that uses this `RequestBuilder` configuration and
    /// the provided body.
    ///
    /// # Error
    ///
    /// This method fails if some configurations are wrong or the url is missing.
    ///
    /// # Examples
    ///
    /// ```
    /// use dcs_http_client::RequestBuilder;
    ///
    /// let request = RequestBuilder::new()
    ///     .url("http://www.example.com")
    ///     .body("HelloWorld".as_bytes())
    ///     .unwrap();
    /// ```
    pub fn body<T: Into<reqwest::Body>>(self, body: T) -> Result<Request<T>, HttpClientError> {
        Ok(Request {
            inner: self.inner?.finish()?,
            body,
        })
    }

    /// Creates a `Request` that uses this `RequestBuilder` configuration and
    /// the provided `Multipart`.
    ///
    /// # Error
    ///
    /// This method fails if some configurations are wrong.
    ///
    /// # Examples
    ///
    /// ```
    /// # use dcs_http_client::async_impl::{MultiPart, Part};
    /// # use dcs_http_client::RequestBuilder;
    ///
    /// # fn create_request_with_multipart(multipart: MultiPart) {
    /// let request = RequestBuilder::new()
    ///     .url("http://www.example.com")
    ///     .multipart(multipart)
    ///     .unwrap();
    /// # }
    /// ```
    pub fn multipart<T>(self, body: T) -> Result<Request<T>, HttpClientError>
    where
        T: Into<reqwest::Body> + AsRef<MultiPart>,
    {
        let value = format!("multipart/form-data; boundary={}", body.as_ref().boundary());

        let mut inner = self.inner?.finish()?;
        inner.headers.insert(
            "Content-Type",
            HeaderValue::from_str(value.as_str())
                .map_err(|e| HttpClientError::new_with_cause(ErrorKind::Build, Some(e)))?,
        );

        if let Some(size) = body.as_ref().total_bytes() {
            inner.headers.insert(
                "Content-Length",
                HeaderValue::from_str(format!("{}", size).as_str())
                    .map_err(|e| HttpClientError::new_with_cause(ErrorKind::Build, Some(e)))?,
            );
        }

        Ok(Request { inner, body })
    }
}

impl Default for RequestBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Default)]
struct PartialRequest {
    method: Method,
    url: Option<Url>,
    headers: HeaderMap,
    version: Version,
    tag: Option<Tag>,
    timeout: Timeout,
}

impl PartialRequest {
    fn finish(self) -> Result<RequestInner, HttpClientError> {
        let url = self.url.ok_or_else(|| {
            HttpClientError::new_with_cause(ErrorKind::Build, Some("request url is not set"))
        })?;
        Ok(RequestInner {
            method: self.method,
            url,
            headers: self.headers,
            version: self.version,
            tag: self.tag,
            timeout: self.timeout,
        })
    }
}

pub(crate) struct RequestInner {
    pub(crate) method: Method,
    pub(crate) url: Url,
    pub(crate) headers: HeaderMap,
    pub(crate) version: Version,
    pub(crate) tag: Option<Tag>,
    pub(crate) timeout: Timeout,
}

/// Body trait implementation.
pub trait Body: Into<reqwest::Body> {}

impl<T: Into<reqwest::Body>> Body for T {}
