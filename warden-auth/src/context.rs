// SPDX-License-Identifier: MIT OR Apache-2.0

use std::collections::BTreeMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Qualifiers describing where a permission check takes place, for example the world or
/// server an actor is currently on.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Deserialize, Serialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct Context(BTreeMap<String, String>);

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Turns a requested permission into the concrete permission strings which all need to be
/// granted for the request to be allowed.
pub trait ContextExpander: Send + Sync {
    fn expand(&self, permission: &str, context: &Context) -> Vec<String>;
}

/// Expander which ignores the context and checks the permission as-is.
#[derive(Clone, Copy, Debug, Default)]
pub struct LiteralExpander;

impl ContextExpander for LiteralExpander {
    fn expand(&self, permission: &str, _context: &Context) -> Vec<String> {
        vec![permission.to_string()]
    }
}

impl<F> ContextExpander for F
where
    F: Fn(&str, &Context) -> Vec<String> + Send + Sync,
{
    fn expand(&self, permission: &str, context: &Context) -> Vec<String> {
        self(permission, context)
    }
}

#[cfg(test)]
mod tests {
    use super::{Context, ContextExpander, LiteralExpander};

    #[test]
    fn literal_expansion() {
        let context = Context::new().with("world", "nether");
        assert_eq!(LiteralExpander.expand("build", &context), vec!["build"]);
    }

    #[test]
    fn closure_expansion() {
        let expander = |permission: &str, context: &Context| {
            let mut permissions = vec![permission.to_string()];
            if let Some(world) = context.get("world") {
                permissions.push(format!("world.{}.{}", world, permission));
            }
            permissions
        };

        let context = Context::new().with("world", "nether");
        assert_eq!(
            expander.expand("build", &context),
            vec!["build", "world.nether.build"]
        );
        assert_eq!(expander.expand("build", &Context::new()), vec!["build"]);
    }
}
