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

use std::io;
use std::pin::Pin;

use bytes::Bytes;
use futures::future::ready;
use futures::stream::{self, Stream, StreamExt};
use tokio::io::AsyncRead;
use tokio_util::io::ReaderStream;

use crate::reqwest_impl::util::gen_boundary;

type Segment = Pin<Box<dyn Stream<Item = io::Result<Bytes>> + Send + Sync>>;

/// A `multipart/form-data` message.
///
/// # Examples
///
/// ```
/// # use dcs_http_client::async_impl::{MultiPart, Part};
///
/// let multipart = MultiPart::new()
///     .part(Part::new().name("user").body("alice"))
///     .part(Part::new().name("avatar").file_name("a.png").mime("image/png").body([0u8; 4]));
/// ```
pub struct MultiPart {
    parts: Vec<Part>,
    boundary: String,
}

impl MultiPart {
    /// Creates an empty `MultiPart` with a random boundary.
    pub fn new() -> Self {
        Self {
            parts: Vec::new(),
            boundary: gen_boundary(),
        }
    }

    /// Appends a part.
    pub fn part(mut self, part: Part) -> Self {
        self.parts.push(part);
        self
    }

    /// Gets the boundary separating the parts.
    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// Gets the encoded size of the whole message, boundaries and part
    /// headers included. Returns `None` if a streamed part has no known
    /// length.
    pub fn total_bytes(&self) -> Option<u64> {
        self.parts.iter().try_fold(self.closing().len() as u64, |total, part| {
            let head = part.head(&self.boundary).len() as u64;
            Some(total + head + part.length? + 2)
        })
    }

    fn closing(&self) -> String {
        format!("--{}--\r\n", self.boundary)
    }

    pub(crate) fn into_stream(self) -> impl Stream<Item = io::Result<Bytes>> + Send + Sync {
        let closing = self.closing();
        let mut segments: Vec<Segment> = Vec::with_capacity(self.parts.len() * 3 + 1);
        for part in self.parts {
            segments.push(chunk(part.head(&self.boundary).into_bytes()));
            match part.body {
                Some(PartBody::Bytes(bytes)) => segments.push(chunk(bytes)),
                Some(PartBody::Stream(reader)) => segments.push(Box::pin(ReaderStream::new(reader))),
                None => {}
            }
            segments.push(chunk(&b"\r\n"[..]));
        }
        segments.push(chunk(closing.into_bytes()));
        stream::iter(segments).flatten()
    }
}

fn chunk(bytes: impl Into<Bytes>) -> Segment {
    Box::pin(stream::once(ready(Ok(bytes.into()))))
}

impl Default for MultiPart {
    fn default() -> Self {
        Self::new()
    }
}

impl AsRef<MultiPart> for MultiPart {
    fn as_ref(&self) -> &MultiPart {
        self
    }
}

impl From<MultiPart> for reqwest::Body {
    fn from(value: MultiPart) -> Self {
        reqwest::Body::wrap_stream(value.into_stream())
    }
}

/// One part of a [`MultiPart`] message.
pub struct Part {
    name: Option<String>,
    file_name: Option<String>,
    mime: Option<String>,
    length: Option<u64>,
    body: Option<PartBody>,
}

enum PartBody {
    Bytes(Bytes),
    Stream(Pin<Box<dyn AsyncRead + Send + Sync>>),
}

impl Part {
    /// Creates an empty `Part`.
    pub fn new() -> Self {
        Self {
            name: None,
            file_name: None,
            mime: None,
            length: Some(0),
            body: None,
        }
    }

    /// Sets the `name` of the `Content-Disposition` header.
    pub fn name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    /// Sets the `filename` of the `Content-Disposition` header.
    pub fn file_name(mut self, file_name: &str) -> Self {
        self.file_name = Some(file_name.to_string());
        self
    }

    /// Sets the `Content-Type` header of this part.
    pub fn mime(mut self, mime: &str) -> Self {
        self.mime = Some(mime.to_string());
        self
    }

    /// Sets the length of a streamed body.
    pub fn length(mut self, length: Option<u64>) -> Self {
        self.length = length;
        self
    }

    /// Sets an in-memory body. The length is taken from it.
    pub fn body<T: AsRef<[u8]>>(mut self, body: T) -> Self {
        let body = Bytes::copy_from_slice(body.as_ref());
        self.length = Some(body.len() as u64);
        self.body = Some(PartBody::Bytes(body));
        self
    }

    /// Sets a streamed body. Its length is unknown unless set with
    /// [`length`](Part::length) afterwards.
    ///
    /// # Examples
    ///
    /// ```
    /// # use dcs_http_client::async_impl::Part;
    ///
    /// let file = std::io::Cursor::new(vec![1u8, 2, 3]);
    /// let part = Part::new().name("file").stream(file).length(Some(3));
    /// ```
    pub fn stream<T: AsyncRead + Send + Sync + 'static>(mut self, body: T) -> Self {
        self.length = None;
        self.body = Some(PartBody::Stream(Box::pin(body)));
        self
    }

    fn head(&self, boundary: &str) -> String {
        let mut head = format!("--{boundary}\r\nContent-Disposition: form-data");
        if let Some(name) = &self.name {
            head.push_str(&format!("; name=\"{name}\""));
        }
        if let Some(file_name) = &self.file_name {
            head.push_str(&format!("; filename=\"{file_name}\""));
        }
        head.push_str("\r\n");
        if let Some(mime) = &self.mime {
            head.push_str(&format!("Content-Type: {mime}\r\n"));
        }
        head.push_str("\r\n");
        head
    }
}

impl Default for Part {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod ut_multipart {
    use futures::TryStreamExt;

    use super::*;
    use crate::test_server::{TestResponse, TestServer};
    use crate::async_impl::Client;
    use crate::Request;

    async fn encode(multipart: MultiPart) -> Vec<u8> {
        multipart
            .into_stream()
            .try_fold(Vec::new(), |mut acc, bytes| async move {
                acc.extend_from_slice(&bytes);
                Ok(acc)
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn ut_multipart_encode() {
        let multipart = MultiPart::new()
            .part(Part::new().name("user").body("alice"))
            .part(Part::new().name("file").file_name("a.txt").mime("text/plain").body("abc"));
        let boundary = multipart.boundary().to_string();
        let total = multipart.total_bytes();

        let encoded = encode(multipart).await;
        let expected = format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"user\"\r\n\r\nalice\r\n\
             --{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"a.txt\"\r\n\
             Content-Type: text/plain\r\n\r\nabc\r\n--{b}--\r\n",
            b = boundary
        );
        assert_eq!(String::from_utf8(encoded).unwrap(), expected);
        assert_eq!(total, Some(expected.len() as u64));
    }

    #[tokio::test]
    async fn ut_multipart_stream_part() {
        let unknown = MultiPart::new().part(Part::new().name("f").stream(&b"xyz"[..]));
        assert_eq!(unknown.total_bytes(), None);

        let known = MultiPart::new().part(Part::new().name("f").stream(&b"xyz"[..]).length(Some(3)));
        let total = known.total_bytes();
        let encoded = encode(known).await;
        assert_eq!(total, Some(encoded.len() as u64));
    }

    #[tokio::test]
    async fn ut_multipart_upload() {
        let server = TestServer::start(|request| {
            let content_type = request.header("content-type").unwrap_or_default();
            TestResponse::ok(format!("{}|{}", content_type, request.body.len()))
        });
        let client = Client::builder().build().unwrap();
        let multipart = MultiPart::new().part(Part::new().name("user").body("alice"));
        let boundary = multipart.boundary().to_string();
        let total = multipart.total_bytes().unwrap();

        let request = Request::builder()
            .url(&server.url("/upload"))
            .method(crate::Method::POST)
            .multipart(multipart)
            .unwrap();
        let mut response = client.request(request).await.unwrap();
        assert_eq!(
            response.text().await.unwrap(),
            format!("multipart/form-data; boundary={}|{}", boundary, total)
        );
    }
}
