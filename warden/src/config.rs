// SPDX-License-Identifier: MIT OR Apache-2.0

use std::time::Duration;

use warden_retry::Config as BackoffConfig;

const SESSION_TTL: Duration = Duration::from_secs(10 * 60);
const PERMISSION_TTL: Duration = warden_auth::subject::DEFAULT_PERMISSION_TTL;
const REFRESH_USERS_INTERVAL: Duration = Duration::from_secs(2 * 60);

/// Configuration parameters of a [`Hive`](crate::Hive).
#[derive(Clone, Debug)]
pub struct HiveConfig {
    /// Identifier of this service towards upstream.
    pub(crate) service_id: String,

    /// Time after which sessions nobody asked for are dropped.
    ///
    /// Default: 10 minutes.
    pub(crate) session_ttl: Duration,

    /// Time after which unused, cached permission decisions are dropped.
    ///
    /// Default: 10 minutes.
    pub(crate) permission_ttl: Duration,

    /// Interval between two `RefreshUsersEvent`s, the first one is posted after one interval.
    ///
    /// Default: 2 minutes.
    pub(crate) refresh_users_interval: Duration,

    /// Backoff between failed attempts to load data from upstream.
    ///
    /// Default: 5 seconds growing to 10 minutes.
    pub(crate) backoff: BackoffConfig,
}

impl HiveConfig {
    pub fn new(service_id: impl Into<String>) -> Self {
        Self {
            service_id: service_id.into(),
            session_ttl: SESSION_TTL,
            permission_ttl: PERMISSION_TTL,
            refresh_users_interval: REFRESH_USERS_INTERVAL,
            backoff: BackoffConfig::default(),
        }
    }

    pub fn service_id(&self) -> &str {
        &self.service_id
    }

    pub fn session_ttl(mut self, ttl: Duration) -> Self {
        self.session_ttl = ttl;
        self
    }

    pub fn permission_ttl(mut self, ttl: Duration) -> Self {
        self.permission_ttl = ttl;
        self
    }

    pub fn refresh_users_interval(mut self, interval: Duration) -> Self {
        self.refresh_users_interval = interval;
        self
    }

    pub fn backoff(mut self, backoff: BackoffConfig) -> Self {
        self.backoff = backoff;
        self
    }
}
