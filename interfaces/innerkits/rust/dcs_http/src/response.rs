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

use std::collections::HashMap;

use bytes::Bytes;
use dcs_http_client::{HttpClientError, Response};
use serde::de::DeserializeOwned;

use crate::error::DispatchError;

/// A response whose body has been read completely.
///
/// The transport body is released before a `RawResponse` reaches a callback,
/// so it can be moved freely between threads.
#[derive(Clone, Debug)]
pub struct RawResponse {
    status: u16,
    url: String,
    headers: HashMap<String, String>,
    body: Bytes,
}

impl RawResponse {
    pub(crate) async fn read(response: &mut Response) -> Result<Self, HttpClientError> {
        let mut headers: HashMap<String, String> = HashMap::new();
        for (name, value) in response.headers() {
            let Ok(value) = value.to_str() else { continue };
            headers
                .entry(name.as_str().to_lowercase())
                .and_modify(|v| {
                    v.push_str(", ");
                    v.push_str(value);
                })
                .or_insert_with(|| value.to_string());
        }
        let body = response.bytes().await?;
        Ok(Self {
            status: response.status().as_u16(),
            url: response.url().to_string(),
            headers,
            body,
        })
    }

    /// Status code
    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn is_successful(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Final URL, after redirects.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Headers, keyed by lower-cased name. Repeated headers are joined with
    /// `", "`.
    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_lowercase()).map(String::as_str)
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Body as text. Invalid UTF-8 is replaced.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Decodes the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, DispatchError> {
        Ok(serde_json::from_slice(&self.body)?)
    }
}
