// SPDX-License-Identifier: MIT OR Apache-2.0

use std::fmt::Display;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity of someone or something acting on the network.
///
/// Serialized as an object tagged with its identity `domain`. Domains this version does not know
/// about decode into [`ActorId::Unknown`].
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(tag = "domain", rename_all = "snake_case")]
pub enum ActorId {
    /// Player identified through the network's account service.
    ///
    /// Two ids are the same actor when their `id` matches, `name` is only the last known display
    /// name.
    Network { id: Uuid, name: String },

    /// The server console or another system process.
    Console,

    #[serde(other)]
    Unknown,
}

impl ActorId {
    pub fn network(id: Uuid, name: impl Into<String>) -> Self {
        Self::Network {
            id,
            name: name.into(),
        }
    }

    pub fn is_console(&self) -> bool {
        matches!(self, Self::Console)
    }

    /// Display name of networked actors.
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Network { name, .. } => Some(name),
            _ => None,
        }
    }
}

impl PartialEq for ActorId {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Network { id, .. }, Self::Network { id: other, .. }) => id == other,
            (Self::Console, Self::Console) => true,
            (Self::Unknown, Self::Unknown) => true,
            _ => false,
        }
    }
}

impl Eq for ActorId {}

impl Hash for ActorId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        if let Self::Network { id, .. } = self {
            id.hash(state);
        }
    }
}

impl Display for ActorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Network { id, name } => write!(f, "{name} ({id})"),
            Self::Console => write!(f, "console"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use serde_json::json;
    use uuid::Uuid;

    use super::ActorId;

    #[test]
    fn equal_by_id_only() {
        let id = Uuid::from_u128(7);
        let before = ActorId::network(id, "sam");
        let after = ActorId::network(id, "sam_renamed");

        assert_eq!(before, after);
        assert_ne!(before, ActorId::network(Uuid::from_u128(8), "sam"));
        assert_ne!(before, ActorId::Console);

        let set: HashSet<ActorId> = [before, after, ActorId::Console].into_iter().collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn tagged_by_domain() {
        let id = Uuid::from_u128(1);
        let actor = ActorId::network(id, "sam");

        let value = serde_json::to_value(&actor).unwrap();
        assert_eq!(
            value,
            json!({ "domain": "network", "id": id.to_string(), "name": "sam" })
        );
        assert_eq!(serde_json::from_value::<ActorId>(value).unwrap(), actor);

        assert_eq!(
            serde_json::from_value::<ActorId>(json!({ "domain": "console" })).unwrap(),
            ActorId::Console
        );
        assert_eq!(
            serde_json::from_value::<ActorId>(json!({ "domain": "bedrock" })).unwrap(),
            ActorId::Unknown
        );
    }
}
