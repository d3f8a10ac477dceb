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

//! dcs_platform provides the executors on which request results are delivered.
//!
//! Network completions happen on transport worker threads. Everything a user
//! callback sees is re-dispatched through a [`Platform`], usually the
//! process-wide [`MainThread`].

#![warn(missing_docs, clippy::redundant_static_lifetimes, clippy::clone_on_copy)]
#![deny(unused_must_use)]

mod wrapper;

use std::io;
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle, ThreadId};

use log::error;
use once_cell::sync::OnceCell;

pub use wrapper::Task;
use wrapper::ClosureWrapper;

const MAIN_THREAD_NAME: &str = "dcs-callback";

/// An execution context that callback tasks are handed to.
pub trait Platform: Send + Sync {
    /// Schedules `task` on this platform's callback context.
    fn execute(&self, task: Task);
}

/// A single dedicated thread that runs submitted tasks one after another, in
/// submission order.
pub struct MainThread {
    sender: Mutex<Option<Sender<ClosureWrapper>>>,
    handle: Mutex<Option<JoinHandle<()>>>,
    thread_id: ThreadId,
}

impl MainThread {
    /// Starts a callback thread with the default name.
    pub fn new() -> io::Result<Self> {
        Self::with_name(MAIN_THREAD_NAME)
    }

    /// Starts a callback thread called `name`.
    pub fn with_name(name: &str) -> io::Result<Self> {
        let (sender, receiver) = mpsc::channel();
        let thread_name = name.to_string();
        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || wrapper::run_loop(&thread_name, receiver))?;
        Ok(Self {
            sender: Mutex::new(Some(sender)),
            thread_id: handle.thread().id(),
            handle: Mutex::new(Some(handle)),
        })
    }

    /// Returns `true` if called from this callback thread.
    pub fn is_current(&self) -> bool {
        thread::current().id() == self.thread_id
    }

    /// Stops accepting tasks. Tasks already queued still run.
    pub fn shutdown(&self) {
        let sender = self.sender.lock().unwrap_or_else(|e| e.into_inner()).take();
        drop(sender);
        let handle = self.handle.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(handle) = handle {
            if !self.is_current() {
                let _ = handle.join();
            }
        }
    }
}

impl Platform for MainThread {
    fn execute(&self, task: Task) {
        let sender = self.sender.lock().unwrap_or_else(|e| e.into_inner());
        match sender.as_ref() {
            Some(sender) => {
                if sender.send(ClosureWrapper::new(task)).is_err() {
                    error!("callback thread is gone, task dropped");
                }
            }
            None => error!("callback thread is shut down, task dropped"),
        }
    }
}

impl Drop for MainThread {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Runs every task immediately on the thread that submits it.
#[derive(Clone, Copy, Debug, Default)]
pub struct Inline;

impl Platform for Inline {
    fn execute(&self, task: Task) {
        ClosureWrapper::new(task).run();
    }
}

static MAIN_THREAD: OnceCell<Arc<MainThread>> = OnceCell::new();

/// Returns the process-wide callback thread, starting it on first use.
///
/// # Errors
///
/// Fails if the thread cannot be spawned. A later call tries again.
pub fn main_thread() -> io::Result<Arc<MainThread>> {
    MAIN_THREAD
        .get_or_try_init(|| MainThread::new().map(Arc::new))
        .cloned()
}

/// Runs `f` on the process-wide callback thread.
pub fn spawn<F>(f: F) -> io::Result<()>
where
    F: FnOnce() + Send + 'static,
{
    main_thread()?.execute(Box::new(f));
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;

    #[test]
    fn ut_spawn() {
        let flag = Arc::new(AtomicUsize::new(0));
        let flag_clone = flag.clone();
        spawn(move || {
            flag_clone.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
        std::thread::sleep(Duration::from_millis(100));
        assert_eq!(flag.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn ut_main_thread_shared() {
        let first = main_thread().unwrap();
        let second = main_thread().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(!first.is_current());

        let (tx, rx) = mpsc::channel();
        first.execute(Box::new(move || {
            let name = thread::current().name().map(str::to_string);
            tx.send(name).unwrap();
        }));
        let name = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(name.as_deref(), Some(MAIN_THREAD_NAME));
    }

    #[test]
    fn ut_main_thread_keeps_order() {
        let main = MainThread::with_name("ut-order").unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let (tx, rx) = mpsc::channel();
        for i in 0..50 {
            let seen = seen.clone();
            main.execute(Box::new(move || seen.lock().unwrap().push(i)));
        }
        main.execute(Box::new(move || tx.send(()).unwrap()));
        rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(*seen.lock().unwrap(), (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn ut_main_thread_single_context() {
        let main = Arc::new(MainThread::with_name("ut-context").unwrap());
        let (tx, rx) = mpsc::channel();
        for _ in 0..4 {
            let main = main.clone();
            let tx = tx.clone();
            std::thread::spawn(move || {
                let inner = main.clone();
                main.execute(Box::new(move || {
                    let name = thread::current().name().map(str::to_string);
                    tx.send((inner.is_current(), name)).unwrap();
                }));
            });
        }
        for _ in 0..4 {
            let (current, name) = rx.recv_timeout(Duration::from_secs(5)).unwrap();
            assert!(current);
            assert_eq!(name.as_deref(), Some("ut-context"));
        }
        assert!(!main.is_current());
    }

    #[test]
    fn ut_main_thread_survives_panic() {
        let _ = env_logger::builder().is_test(true).try_init();
        let main = MainThread::with_name("ut-panic").unwrap();
        let (tx, rx) = mpsc::channel();
        main.execute(Box::new(|| panic!("boom")));
        main.execute(Box::new(move || tx.send(7).unwrap()));
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), 7);
    }

    #[test]
    fn ut_main_thread_shutdown() {
        let main = MainThread::with_name("ut-shutdown").unwrap();
        let flag = Arc::new(AtomicUsize::new(0));
        let flag_clone = flag.clone();
        main.execute(Box::new(move || {
            std::thread::sleep(Duration::from_millis(50));
            flag_clone.fetch_add(1, Ordering::SeqCst);
        }));
        main.shutdown();
        assert_eq!(flag.load(Ordering::SeqCst), 1);

        let flag_clone = flag.clone();
        main.execute(Box::new(move || {
            flag_clone.fetch_add(1, Ordering::SeqCst);
        }));
        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(flag.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn ut_inline() {
        let flag = Arc::new(AtomicUsize::new(0));
        let flag_clone = flag.clone();
        let caller = thread::current().id();
        Inline.execute(Box::new(move || {
            assert_eq!(thread::current().id(), caller);
            flag_clone.fetch_add(1, Ordering::SeqCst);
        }));
        assert_eq!(flag.load(Ordering::SeqCst), 1);
    }
}
