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

/// Timeout settings.
///
/// # Examples
///
/// ```
/// # use dcs_http_client::Timeout;
///
/// let timeout = Timeout::none();
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Timeout(Option<Duration>);

impl Timeout {
    /// Creates a `Timeout` without limiting the timeout.
    ///
    /// # Examples
    ///
    /// ```
    /// # use dcs_http_client::Timeout;
    ///
    /// let timeout = Timeout::none();
    /// ```
    pub fn none() -> Self {
        Self(None)
    }

    /// Creates a `Timeout` from the specified number of seconds.
    ///
    /// # Examples
    ///
    /// ```
    /// # use dcs_http_client::Timeout;
    ///
    /// let timeout = Timeout::from_secs(9);
    /// ```
    pub fn from_secs(secs: u64) -> Self {
        Self(Some(Duration::from_secs(secs)))
    }

    /// Creates a `Timeout` from the specified number of milliseconds.
    ///
    /// # Examples
    ///
    /// ```
    /// # use dcs_http_client::Timeout;
    ///
    /// let timeout = Timeout::from_millis(60_000);
    /// ```
    pub fn from_millis(millis: u64) -> Self {
        Self(Some(Duration::from_millis(millis)))
    }

    /// Gets the configured duration, `None` means unlimited.
    pub fn inner(&self) -> Option<Duration> {
        self.0
    }
}

/// Redirect settings.
///
/// # Examples
///
/// ```
/// # use dcs_http_client::Redirect;
///
/// let redirect = Redirect::none();
/// ```
#[derive(Default)]
pub struct Redirect(reqwest::redirect::Policy);

impl Redirect {
    /// Creates a `Redirect` without redirection.
    ///
    /// # Examples
    ///
    /// ```
    /// # use dcs_http_client::Redirect;
    ///
    /// let redirect = Redirect::none();
    /// ```
    pub fn none() -> Self {
        Self(reqwest::redirect::Policy::none())
    }

    /// Creates a `Redirect` from the specified times.
    ///
    /// # Examples
    ///
    /// ```
    /// # use dcs_http_client::Redirect;
    ///
    /// let redirect = Redirect::limited(10);
    /// ```
    pub fn limited(max: usize) -> Self {
        Self(reqwest::redirect::Policy::limited(max))
    }

    pub(crate) fn inner(self) -> reqwest::redirect::Policy {
        self.0
    }
}

#[cfg(test)]
mod ut_config {
    use super::*;

    #[test]
    fn ut_timeout() {
        assert_eq!(Timeout::none().inner(), None);
        assert_eq!(Timeout::default(), Timeout::none());
        assert_eq!(Timeout::from_secs(60).inner(), Some(Duration::from_secs(60)));
        assert_eq!(Timeout::from_millis(60_000), Timeout::from_secs(60));
    }
}
