// SPDX-License-Identifier: MIT OR Apache-2.0

use std::fmt::Display;

/// Outcome of evaluating a permission string against one or more groups.
///
/// Grants form a total order where greater grants always win when combined:
///
/// ```text
/// Never > Deny > Allow > Unset
/// ```
///
/// A `Never` grant can not be overridden by anything else and lets callers stop looking at
/// further groups.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Grant {
    /// No rule matched.
    #[default]
    Unset,

    /// An explicit rule allows the permission.
    Allow,

    /// An explicit `-` rule denies the permission.
    Deny,

    /// An explicit `!` rule denies the permission and can't be overridden.
    Never,
}

impl Grant {
    /// Combine two grants, keeping the stronger one.
    pub fn combine(self, other: Grant) -> Grant {
        self.max(other)
    }

    /// Returns `true` if no other grant could change the outcome anymore.
    pub fn is_absolute(&self) -> bool {
        matches!(self, Grant::Never)
    }

    /// Returns `true` if the grant permits the requested action.
    pub fn permits(&self) -> bool {
        matches!(self, Grant::Allow)
    }
}

impl Display for Grant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Grant::Unset => "unset",
            Grant::Allow => "allow",
            Grant::Deny => "deny",
            Grant::Never => "never",
        };

        write!(f, "{}", s)
    }
}
