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

//! A blocking HTTP/1.1 server on the loopback interface, for tests.
//!
//! Every connection is served by its own thread, answers one request and is
//! closed. Only `Content-Length` request bodies are read.
//!
//! The server also counts the response bodies the client releases for it, so
//! tests can check that every path lets go of the connection exactly once.

use std::collections::BTreeMap;
use std::io::{BufRead, BufReader, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::debug;
use reqwest::Url;

type Handler = dyn Fn(&TestRequest) -> TestResponse + Send + Sync;

/// A request received by a [`TestServer`].
#[derive(Clone, Debug)]
pub struct TestRequest {
    pub method: String,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl TestRequest {
    /// Gets the first header named `name`, ignoring case.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// The response a [`TestServer`] handler answers with.
#[derive(Clone, Debug)]
pub struct TestResponse {
    status: u16,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
    delay: Option<Duration>,
    stall: Option<(usize, Duration)>,
}

impl TestResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
            delay: None,
            stall: None,
        }
    }

    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        Self::new(200, body)
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    /// Waits `delay` before writing the response.
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Writes the head and the first `sent` body bytes, then waits `pause`
    /// before writing the rest of the body.
    pub fn stall(mut self, sent: usize, pause: Duration) -> Self {
        self.stall = Some((sent.min(self.body.len()), pause));
        self
    }
}

/// A loopback HTTP server that stops when dropped.
pub struct TestServer {
    addr: SocketAddr,
    hits: Arc<AtomicUsize>,
    stopped: Arc<AtomicBool>,
    accept: Option<JoinHandle<()>>,
}

impl TestServer {
    /// Starts a server answering every request with `handler`.
    pub fn start<F>(handler: F) -> Self
    where
        F: Fn(&TestRequest) -> TestResponse + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind loopback listener");
        let addr = listener.local_addr().expect("listener address");
        releases().remove(&addr.port());
        let handler: Arc<Handler> = Arc::new(handler);
        let hits = Arc::new(AtomicUsize::new(0));
        let stopped = Arc::new(AtomicBool::new(false));

        let accept = {
            let hits = hits.clone();
            let stopped = stopped.clone();
            thread::spawn(move || {
                for stream in listener.incoming() {
                    if stopped.load(Ordering::SeqCst) {
                        break;
                    }
                    let Ok(stream) = stream else { continue };
                    let handler = handler.clone();
                    let hits = hits.clone();
                    thread::spawn(move || serve(stream, handler.as_ref(), &hits));
                }
            })
        };
        debug!("test server listening on {}", addr);
        Self {
            addr,
            hits,
            stopped,
            accept: Some(accept),
        }
    }

    /// Gets the URL of `path` on this server.
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Gets the number of requests received so far.
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    /// Gets the number of response bodies from this server that the client
    /// has released, by reading them to the end or by closing them.
    pub fn released(&self) -> usize {
        releases().get(&self.addr.port()).copied().unwrap_or(0)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.stopped.store(true, Ordering::SeqCst);
        let _ = TcpStream::connect(self.addr);
        if let Some(accept) = self.accept.take() {
            let _ = accept.join();
        }
        releases().remove(&self.addr.port());
    }
}

static RELEASES: Mutex<BTreeMap<u16, usize>> = Mutex::new(BTreeMap::new());

fn releases() -> std::sync::MutexGuard<'static, BTreeMap<u16, usize>> {
    RELEASES.lock().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn record_release(url: &Url) {
    if let Some(port) = url.port_or_known_default() {
        *releases().entry(port).or_default() += 1;
    }
}

/// Gets a URL on a loopback port nothing listens on.
pub fn closed_port_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind loopback listener");
    let addr = listener.local_addr().expect("listener address");
    drop(listener);
    format!("http://{}/", addr)
}

fn serve(stream: TcpStream, handler: &Handler, hits: &AtomicUsize) {
    let Ok(mut writer) = stream.try_clone() else { return };
    let mut reader = BufReader::new(stream);
    let Some(request) = read_request(&mut reader) else { return };
    hits.fetch_add(1, Ordering::SeqCst);

    let response = handler(&request);
    if let Some(delay) = response.delay {
        thread::sleep(delay);
    }
    let mut head = format!("HTTP/1.1 {} {}\r\n", response.status, reason(response.status));
    for (name, value) in &response.headers {
        head.push_str(&format!("{}: {}\r\n", name, value));
    }
    head.push_str(&format!(
        "Content-Length: {}\r\nConnection: close\r\n\r\n",
        response.body.len()
    ));
    let (first, rest) = match response.stall {
        Some((sent, _)) => response.body.split_at(sent),
        None => (response.body.as_slice(), &[][..]),
    };
    let written = writer
        .write_all(head.as_bytes())
        .and_then(|_| writer.write_all(first))
        .and_then(|_| writer.flush());
    if written.is_err() {
        return;
    }
    if let Some((_, pause)) = response.stall {
        thread::sleep(pause);
        let _ = writer.write_all(rest).and_then(|_| writer.flush());
    }
}

fn read_request(reader: &mut BufReader<TcpStream>) -> Option<TestRequest> {
    let mut line = String::new();
    reader.read_line(&mut line).ok()?;
    let mut parts = line.split_whitespace();
    let method = parts.next()?.to_string();
    let path = parts.next()?.to_string();

    let mut headers = Vec::new();
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line).ok()? == 0 {
            return None;
        }
        let line = line.trim_end();
        if line.is_empty() {
            break;
        }
        let (name, value) = line.split_once(':')?;
        headers.push((name.trim().to_string(), value.trim().to_string()));
    }

    let length = headers
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, v)| v.parse::<usize>().ok())
        .unwrap_or(0);
    let mut body = vec![0; length];
    reader.read_exact(&mut body).ok()?;

    Some(TestRequest {
        method,
        path,
        headers,
        body,
    })
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        201 => "Created",
        204 => "No Content",
        400 => "Bad Request",
        401 => "Unauthorized",
        404 => "Not Found",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "Unknown",
    }
}
