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

//! Builders of [`RequestCall`]s.
//!
//! ```no_run
//! # use dcs_http::HttpManager;
//! # fn build() -> Result<(), dcs_http_client::HttpClientError> {
//! let manager = HttpManager::instance()?;
//! let request = HttpManager::get()
//!     .url("http://www.example.com/profile")
//!     .param("user", "alice")
//!     .tag("login")
//!     .id(1)
//!     .build(manager.client())?;
//! # Ok(())
//! # }
//! ```

use bytes::Bytes;
use dcs_http_client::async_impl::{Client, MultiPart, Part};
use dcs_http_client::{Body, HttpClientError, Method, Request, RequestBuilder, Tag, Timeout};

use crate::task::RequestCall;

const DEFAULT_MEDIA_TYPE: &str = "text/plain;charset=utf-8";

/// Request builder shared by every request kind. `K` holds what is specific
/// to the kind.
pub struct CallBuilder<K> {
    url: Option<String>,
    tag: Option<Tag>,
    headers: Vec<(String, String)>,
    params: Vec<(String, String)>,
    id: i32,
    timeout: Timeout,
    kind: K,
}

/// GET request. Params are appended to the URL query.
pub type GetBuilder = CallBuilder<Get>;
/// POST request with a text body.
pub type PostStringBuilder = CallBuilder<PostString>;
/// POST request with a `multipart/form-data` body. Params become form fields.
pub type PostMultipartBuilder = CallBuilder<PostMultipart>;

#[derive(Default)]
pub struct Get;

pub struct PostString {
    content: String,
    media_type: String,
}

impl Default for PostString {
    fn default() -> Self {
        Self {
            content: String::new(),
            media_type: DEFAULT_MEDIA_TYPE.to_string(),
        }
    }
}

#[derive(Default)]
pub struct PostMultipart {
    files: Vec<FilePart>,
}

struct FilePart {
    name: String,
    file_name: String,
    mime: String,
    content: Bytes,
}

impl<K: Default> CallBuilder<K> {
    pub fn new() -> Self {
        Self {
            url: None,
            tag: None,
            headers: Vec::new(),
            params: Vec::new(),
            id: 0,
            timeout: Timeout::none(),
            kind: K::default(),
        }
    }
}

impl<K: Default> Default for CallBuilder<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K> CallBuilder<K> {
    /// Sets the URL. Required.
    pub fn url(mut self, url: &str) -> Self {
        self.url = Some(url.to_string());
        self
    }

    /// Sets the tag used by [`HttpManager::cancel_tag`](crate::HttpManager::cancel_tag).
    pub fn tag(mut self, tag: impl Into<Tag>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    /// Adds a request header.
    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    /// Adds a parameter: a query pair, or a form field for multipart posts.
    pub fn param(mut self, name: &str, value: &str) -> Self {
        self.params.push((name.to_string(), value.to_string()));
        self
    }

    /// Sets the identifier passed to the callbacks. Default is 0.
    pub fn id(mut self, id: i32) -> Self {
        self.id = id;
        self
    }

    /// Sets the total timeout of this request, overriding the client's.
    pub fn timeout(mut self, timeout: Timeout) -> Self {
        self.timeout = timeout;
        self
    }

    fn request_builder(&self, method: Method) -> RequestBuilder {
        let mut builder = Request::builder().method(method);
        if let Some(url) = &self.url {
            builder = builder.url(url);
        }
        if let Some(tag) = &self.tag {
            builder = builder.tag(tag);
        }
        for (name, value) in &self.headers {
            builder = builder.header(name, value);
        }
        builder.timeout(self.timeout)
    }

    fn finish<T>(self, client: &Client, request: Request<T>) -> Result<RequestCall, HttpClientError>
    where
        T: Body,
    {
        Ok(RequestCall::new(self.id, client.new_call(request)?))
    }
}

impl GetBuilder {
    /// Builds the request for `client`.
    ///
    /// # Errors
    ///
    /// Fails if the URL is missing or invalid, or a header is invalid.
    pub fn build(self, client: &Client) -> Result<RequestCall, HttpClientError> {
        let mut builder = self.request_builder(Method::GET);
        for (name, value) in &self.params {
            builder = builder.query(name, value);
        }
        let request = builder.body("")?;
        self.finish(client, request)
    }
}

impl PostStringBuilder {
    /// Sets the body.
    pub fn content(mut self, content: impl Into<String>) -> Self {
        self.kind.content = content.into();
        self
    }

    /// Sets the `Content-Type`. Default is `text/plain;charset=utf-8`.
    pub fn media_type(mut self, media_type: &str) -> Self {
        self.kind.media_type = media_type.to_string();
        self
    }

    /// Builds the request for `client`. Params are appended to the URL query.
    pub fn build(mut self, client: &Client) -> Result<RequestCall, HttpClientError> {
        let mut builder = self
            .request_builder(Method::POST)
            .header("Content-Type", &self.kind.media_type);
        for (name, value) in &self.params {
            builder = builder.query(name, value);
        }
        let request = builder.body(std::mem::take(&mut self.kind.content))?;
        self.finish(client, request)
    }
}

impl PostMultipartBuilder {
    /// Adds a file field.
    pub fn file(
        mut self,
        name: &str,
        file_name: &str,
        mime: &str,
        content: impl Into<Bytes>,
    ) -> Self {
        self.kind.files.push(FilePart {
            name: name.to_string(),
            file_name: file_name.to_string(),
            mime: mime.to_string(),
            content: content.into(),
        });
        self
    }

    pub fn build(mut self, client: &Client) -> Result<RequestCall, HttpClientError> {
        let builder = self.request_builder(Method::POST);
        let mut multipart = MultiPart::new();
        for (name, value) in &self.params {
            multipart = multipart.part(Part::new().name(name).body(value));
        }
        for file in std::mem::take(&mut self.kind.files) {
            multipart = multipart.part(
                Part::new()
                    .name(&file.name)
                    .file_name(&file.file_name)
                    .mime(&file.mime)
                    .body(file.content),
            );
        }
        let request = builder.multipart(multipart)?;
        self.finish(client, request)
    }
}
