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

use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::Receiver;

use log::{debug, error};

/// A task submitted to a [`Platform`](crate::Platform).
pub type Task = Box<dyn FnOnce() + Send + 'static>;

pub(crate) struct ClosureWrapper {
    inner: Option<Task>,
}

impl ClosureWrapper {
    pub(crate) fn new(task: Task) -> Self {
        Self { inner: Some(task) }
    }

    /// Runs the wrapped closure once. A panic inside the closure is logged and
    /// swallowed so the executing thread keeps serving tasks.
    pub(crate) fn run(&mut self) {
        if let Some(f) = self.inner.take() {
            if let Err(e) = panic::catch_unwind(AssertUnwindSafe(f)) {
                let msg = e
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| e.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                error!("callback task panicked: {}", msg);
            }
        }
    }
}

pub(crate) fn run_loop(name: &str, receiver: Receiver<ClosureWrapper>) {
    debug!("{} started", name);
    while let Ok(mut task) = receiver.recv() {
        task.run();
    }
    debug!("{} stopped", name);
}
