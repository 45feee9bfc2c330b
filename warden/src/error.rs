// SPDX-License-Identifier: MIT OR Apache-2.0

use thiserror::Error;
use tokio::runtime::TryCurrentError;
use warden_auth::GroupTableError;

use crate::transport::TransportError;

#[derive(Debug, Error)]
pub enum HiveError {
    #[error("session was rejected: {0}")]
    SessionRejected(String),

    #[error("invite was rejected: {0}")]
    InviteRejected(String),

    #[error("request was rejected: {0}")]
    Validation(String),

    #[error("could not access upstream data")]
    DataAccess(#[from] TransportError),

    #[error("upstream delivered invalid groups")]
    InvalidGroups(#[from] GroupTableError),

    #[error("hive needs to be created from within a tokio runtime")]
    NoRuntime(#[from] TryCurrentError),
}

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("You don't have permission to use this command.")]
    PermissionDenied,

    #[error("{0}")]
    Rejected(String),

    #[error("could not contact the server")]
    Unreachable(#[source] TransportError),
}
