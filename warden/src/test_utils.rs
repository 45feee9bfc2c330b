// SPDX-License-Identifier: MIT OR Apache-2.0

//! Helpers for testing code built on top of a hive.
use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::transport::{Method, Transport, TransportError};

pub fn setup_logging() {
    if std::env::var("RUST_LOG").is_ok() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    }
}

type Route = (Method, String);

type Reply = Result<Value, TransportError>;

/// Request received by a [`MockTransport`].
#[derive(Clone, Debug, PartialEq)]
pub struct Request {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
}

#[derive(Debug, Default)]
struct MockState {
    /// Replies handed out once, before falling back to the standing reply of a route.
    queued: HashMap<Route, VecDeque<Reply>>,
    standing: HashMap<Route, Reply>,
    requests: Vec<Request>,
}

/// In-memory upstream answering requests with prepared JSON values.
///
/// Requests to routes without a prepared reply fail with [`TransportError::Network`].
#[derive(Clone, Debug, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer every request to this route with the given reply.
    pub fn respond(&self, method: Method, path: &str, reply: Reply) {
        self.state()
            .standing
            .insert((method, path.to_string()), reply);
    }

    /// Answer the next request to this route with the given reply.
    pub fn respond_once(&self, method: Method, path: &str, reply: Reply) {
        self.state()
            .queued
            .entry((method, path.to_string()))
            .or_default()
            .push_back(reply);
    }

    /// All requests received so far, oldest first.
    pub fn requests(&self) -> Vec<Request> {
        self.state().requests.clone()
    }

    /// Number of requests received for a route.
    pub fn count(&self, method: Method, path: &str) -> usize {
        self.state()
            .requests
            .iter()
            .filter(|request| request.method == method && request.path == path)
            .count()
    }

    fn reply<T>(&self, method: Method, path: &str, body: Option<Value>) -> Result<T, TransportError>
    where
        T: DeserializeOwned,
    {
        let mut state = self.state();
        state.requests.push(Request {
            method,
            path: path.to_string(),
            body,
        });

        let route = (method, path.to_string());
        let reply = match state.queued.get_mut(&route).and_then(VecDeque::pop_front) {
            Some(reply) => reply,
            None => state.standing.get(&route).cloned().unwrap_or_else(|| {
                Err(TransportError::Network(format!(
                    "no route for {method} {path}"
                )))
            }),
        };

        serde_json::from_value(reply?).map_err(|err| TransportError::Network(err.to_string()))
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Transport for MockTransport {
    fn fetch<T>(&self, path: &str) -> impl Future<Output = Result<T, TransportError>> + Send
    where
        T: DeserializeOwned + Send + 'static,
    {
        let result = self.reply(Method::Get, path, None);
        async move { result }
    }

    fn send<B, T>(
        &self,
        method: Method,
        path: &str,
        body: &B,
    ) -> impl Future<Output = Result<T, TransportError>> + Send
    where
        B: Serialize + Sync,
        T: DeserializeOwned + Send + 'static,
    {
        let result = serde_json::to_value(body)
            .map_err(|err| TransportError::Network(err.to_string()))
            .and_then(|body| self.reply(method, path, Some(body)));
        async move { result }
    }
}
