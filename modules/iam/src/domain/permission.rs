use std::fmt;

use serde::{Deserialize, Serialize};

/// An atomic grantable capability: what may be done (`action`) to which
/// kind of thing (`resource`) at which reach (`scope`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Permission {
    pub resource: String,
    pub action: String,
    pub scope: String,
}

impl Permission {
    pub fn new(
        resource: impl Into<String>,
        action: impl Into<String>,
        scope: impl Into<String>,
    ) -> Self {
        Self {
            resource: resource.into(),
            action: action.into(),
            scope: scope.into(),
        }
    }

    /// The grant-everything triple held by super-admin roles.
    #[must_use]
    pub fn wildcard() -> Self {
        Self::new("*", "*", "*")
    }

    #[must_use]
    pub fn is_wildcard(&self) -> bool {
        self.resource == "*" && self.action == "*" && self.scope == "*"
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.resource, self.action, self.scope)
    }
}
