// SPDX-License-Identifier: MIT OR Apache-2.0

//! Interface to the upstream data source holding users, groups and commands.
use std::fmt::Display;
use std::future::Future;

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

/// Message returned when upstream rejected a request without giving a reason.
pub(crate) const UNKNOWN_REASON: &str = "no reason given";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let method = match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        };
        write!(f, "{method}")
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TransportError {
    /// Upstream understood the request but refused it.
    #[error("request was refused: {}", messages.join(", "))]
    Validation { messages: Vec<String> },

    /// Upstream could not be reached or answered with something unexpected.
    #[error("upstream unavailable: {0}")]
    Network(String),
}

impl TransportError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            messages: vec![message.into()],
        }
    }

    /// First message of a refused request.
    pub fn first_message(&self) -> Option<&str> {
        match self {
            Self::Validation { messages } => messages.first().map(String::as_str),
            Self::Network(_) => None,
        }
    }
}

/// Client of the upstream API.
///
/// Paths are absolute, for example `/services/lobby/hive`. Implementations take care of encoding,
/// authentication and mapping status codes: refused requests become
/// [`TransportError::Validation`], everything else which is not a success becomes
/// [`TransportError::Network`].
pub trait Transport: Send + Sync + 'static {
    /// Retrieve and decode a resource.
    fn fetch<T>(&self, path: &str) -> impl Future<Output = Result<T, TransportError>> + Send
    where
        T: DeserializeOwned + Send + 'static;

    /// Send a request with a body and decode the answer.
    fn send<B, T>(
        &self,
        method: Method,
        path: &str,
        body: &B,
    ) -> impl Future<Output = Result<T, TransportError>> + Send
    where
        B: Serialize + Sync,
        T: DeserializeOwned + Send + 'static;
}
