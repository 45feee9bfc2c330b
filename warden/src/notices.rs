// SPDX-License-Identifier: MIT OR Apache-2.0

use std::sync::Arc;

use tracing::warn;

use crate::error::HiveError;
use crate::hive::Hive;
use crate::messages::Notice;
use crate::transport::{Transport, TransportError, UNKNOWN_REASON};

/// Broadcast messages servers show to their players, for example in the chat or on join.
#[derive(Debug)]
pub struct Notices<T> {
    hive: Arc<Hive<T>>,
}

impl<T> Notices<T>
where
    T: Transport,
{
    pub fn new(hive: Arc<Hive<T>>) -> Self {
        Self { hive }
    }

    /// Fetch the next notice of a notice group.
    pub async fn next(&self, group: &str) -> Result<Notice, HiveError> {
        let path = format!(
            "/services/{}/notices/{}/next/",
            self.hive.config().service_id(),
            group
        );

        self.hive
            .transport()
            .fetch(&path)
            .await
            .map_err(|err| {
                warn!(group, "could not fetch notice: {}", err);
                match err {
                    TransportError::Validation { .. } => HiveError::Validation(
                        err.first_message().unwrap_or(UNKNOWN_REASON).to_string(),
                    ),
                    err => HiveError::DataAccess(err),
                }
            })
    }
}
