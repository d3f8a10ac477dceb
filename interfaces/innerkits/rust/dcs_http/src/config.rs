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

//! Settings of the client an [`HttpManager`](crate::HttpManager) creates.

use std::str::FromStr;

use dcs_http_client::async_impl::ClientBuilder;
use dcs_http_client::Timeout;
use log::warn;
use serde::{Deserialize, Serialize};

/// Default connect, read and write timeout, in milliseconds.
pub const DEFAULT_MILLISECONDS: u64 = 60 * 1000;

const DEFAULT_MAX_REQUESTS: usize = 64;
const DEFAULT_MAX_REQUESTS_PER_HOST: usize = 5;

const ENV_CONNECT_TIMEOUT: &str = "DCS_HTTP_CONNECT_TIMEOUT_MS";
const ENV_READ_TIMEOUT: &str = "DCS_HTTP_READ_TIMEOUT_MS";
const ENV_WRITE_TIMEOUT: &str = "DCS_HTTP_WRITE_TIMEOUT_MS";
const ENV_RETRY: &str = "DCS_HTTP_RETRY_ON_CONNECTION_FAILURE";
const ENV_MAX_REQUESTS: &str = "DCS_HTTP_MAX_REQUESTS";
const ENV_MAX_REQUESTS_PER_HOST: &str = "DCS_HTTP_MAX_REQUESTS_PER_HOST";

/// Client settings. Missing fields take their default value.
///
/// ```
/// # use dcs_http::config::HttpManagerConfig;
/// let config = HttpManagerConfig::from_json(r#"{ "read_timeout_ms": 5000 }"#).unwrap();
/// assert_eq!(config.read_timeout_ms, 5000);
/// assert_eq!(config.connect_timeout_ms, 60000);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpManagerConfig {
    pub connect_timeout_ms: u64,
    pub read_timeout_ms: u64,
    pub write_timeout_ms: u64,
    pub retry_on_connection_failure: bool,
    pub max_requests: usize,
    pub max_requests_per_host: usize,
    /// Worker threads of the transport runtime, one per core when unset.
    pub worker_threads: Option<usize>,
}

impl Default for HttpManagerConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: DEFAULT_MILLISECONDS,
            read_timeout_ms: DEFAULT_MILLISECONDS,
            write_timeout_ms: DEFAULT_MILLISECONDS,
            retry_on_connection_failure: false,
            max_requests: DEFAULT_MAX_REQUESTS,
            max_requests_per_host: DEFAULT_MAX_REQUESTS_PER_HOST,
            worker_threads: None,
        }
    }
}

impl HttpManagerConfig {
    /// Parses a JSON object.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Reads the `DCS_HTTP_*` environment variables. Unset or malformed
    /// variables keep their default value.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let read = |key: &str, target: &mut u64| parse_into(key, lookup(key), target);
        read(ENV_CONNECT_TIMEOUT, &mut config.connect_timeout_ms);
        read(ENV_READ_TIMEOUT, &mut config.read_timeout_ms);
        read(ENV_WRITE_TIMEOUT, &mut config.write_timeout_ms);
        parse_into(ENV_RETRY, lookup(ENV_RETRY), &mut config.retry_on_connection_failure);
        parse_into(ENV_MAX_REQUESTS, lookup(ENV_MAX_REQUESTS), &mut config.max_requests);
        parse_into(
            ENV_MAX_REQUESTS_PER_HOST,
            lookup(ENV_MAX_REQUESTS_PER_HOST),
            &mut config.max_requests_per_host,
        );
        config
    }

    /// Creates a client builder with these settings.
    pub fn client_builder(&self) -> ClientBuilder {
        let mut builder = ClientBuilder::new()
            .connect_timeout(Timeout::from_millis(self.connect_timeout_ms))
            .read_timeout(Timeout::from_millis(self.read_timeout_ms))
            .write_timeout(Timeout::from_millis(self.write_timeout_ms))
            .retry_on_connection_failure(self.retry_on_connection_failure)
            .max_requests(self.max_requests)
            .max_requests_per_host(self.max_requests_per_host);
        if let Some(threads) = self.worker_threads {
            builder = builder.worker_threads(threads);
        }
        builder
    }
}

fn parse_into<T: FromStr>(key: &str, value: Option<String>, target: &mut T) {
    let Some(value) = value else { return };
    match value.trim().parse() {
        Ok(parsed) => *target = parsed,
        Err(_) => warn!("ignoring malformed {}={:?}", key, value),
    }
}

#[cfg(test)]
mod test {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn ut_config_default() {
        let config = HttpManagerConfig::default();
        assert_eq!(config.connect_timeout_ms, 60_000);
        assert_eq!(config.read_timeout_ms, 60_000);
        assert_eq!(config.write_timeout_ms, 60_000);
        assert!(!config.retry_on_connection_failure);
        assert_eq!(config.max_requests, 64);
        assert_eq!(config.max_requests_per_host, 5);
        assert_eq!(config.worker_threads, None);
    }

    #[test]
    fn ut_config_from_json() {
        let config = HttpManagerConfig::from_json(
            r#"{ "write_timeout_ms": 10, "retry_on_connection_failure": true, "worker_threads": 2 }"#,
        )
        .unwrap();
        assert_eq!(config.write_timeout_ms, 10);
        assert!(config.retry_on_connection_failure);
        assert_eq!(config.worker_threads, Some(2));
        assert_eq!(config.read_timeout_ms, DEFAULT_MILLISECONDS);
        assert!(HttpManagerConfig::from_json("[1, 2]").is_err());
    }

    #[test]
    fn ut_config_from_lookup() {
        let vars: HashMap<&str, &str> = [
            (ENV_CONNECT_TIMEOUT, "1500"),
            (ENV_READ_TIMEOUT, "soon"),
            (ENV_RETRY, "true"),
            (ENV_MAX_REQUESTS_PER_HOST, " 9 "),
        ]
        .into_iter()
        .collect();
        let config = HttpManagerConfig::from_lookup(|key| vars.get(key).map(|v| v.to_string()));
        assert_eq!(config.connect_timeout_ms, 1500);
        assert_eq!(config.read_timeout_ms, DEFAULT_MILLISECONDS);
        assert!(config.retry_on_connection_failure);
        assert_eq!(config.max_requests, 64);
        assert_eq!(config.max_requests_per_host, 9);
    }

    #[test]
    fn ut_config_client_builder() {
        let config = HttpManagerConfig {
            max_requests: 3,
            max_requests_per_host: 2,
            worker_threads: Some(1),
            ..Default::default()
        };
        let client = config.client_builder().build().unwrap();
        assert_eq!(client.dispatcher().max_requests(), 3);
        assert_eq!(client.dispatcher().max_requests_per_host(), 2);
        assert!(!client.retry_on_connection_failure());
    }
}
