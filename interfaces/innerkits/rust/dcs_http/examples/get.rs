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

//! Sends a GET request through the process-wide manager and prints the
//! result on the callback thread.

use std::sync::mpsc::{self, Sender};
use std::sync::Arc;

use dcs_http::callback::DcsCallback;
use dcs_http::error::DispatchError;
use dcs_http::response::RawResponse;
use dcs_http::HttpManager;
use dcs_http_client::async_impl::Call;

struct PrintCallback(Sender<()>);

impl DcsCallback for PrintCallback {
    fn on_response(&self, response: RawResponse, id: i32) {
        println!("[{}] {} {}", id, response.status(), response.url());
        println!("{}", response.text());
    }

    fn on_error(&self, call: &Call, error: &DispatchError, id: i32) {
        println!("[{}] {} failed: {}", id, call.url(), error);
    }

    fn on_after(&self, _id: i32) {
        let _ = self.0.send(());
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let url = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "http://www.example.com".to_string());

    let manager = HttpManager::instance()?;
    let request = HttpManager::get()
        .url(&url)
        .tag("example")
        .id(1)
        .build(manager.client())?;

    let (done, wait) = mpsc::channel();
    manager.execute(&request, Some(Arc::new(PrintCallback(done))));
    wait.recv()?;
    Ok(())
}
