// SPDX-License-Identifier: MIT OR Apache-2.0

//! Messages exchanged with upstream.
use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use warden_auth::{Context, GroupDefinition};

use crate::actor::ActorId;
use crate::session::Session;

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct LoginRequest {
    pub service: String,
    pub actor: ActorId,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct LoginResponse {
    pub accepted: bool,

    #[serde(default)]
    pub reject_message: Option<String>,

    #[serde(default)]
    pub session: Session,
}

/// Authorization data of one service.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct HiveSnapshot {
    #[serde(default)]
    pub groups: Vec<GroupDefinition>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct InviteRequest {
    pub referrer: ActorId,
}

/// Command handled by upstream.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct CommandSpec {
    pub name: String,

    #[serde(default)]
    pub aliases: Vec<String>,

    #[serde(default)]
    pub description: Option<String>,

    /// Permissions the sender needs to hold, `*` lets everyone use the command.
    #[serde(default)]
    pub require: BTreeSet<String>,
}

impl CommandSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    pub fn with_requirement(mut self, permission: impl Into<String>) -> Self {
        self.require.insert(permission.into());
        self
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct CommandSet {
    #[serde(default)]
    pub commands: Vec<CommandSpec>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct CommandRequest {
    pub sender: ActorId,
    pub message: String,

    #[serde(default)]
    pub context: Context,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct CommandResponse {
    /// Text to show to the sender.
    #[serde(default)]
    pub message: Option<String>,
}

/// Broadcast message of a notice group.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct Notice {
    pub group: String,

    #[serde(default)]
    pub title: Option<String>,

    pub message: String,
}
