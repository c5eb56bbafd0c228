//! History partitions
//!
//! A document keeps one independent history per scope. Each scope has its
//! own index sequence, skip counters and hash chain.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::DocumentError;

#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// Shared state, synchronized between replicas
    #[default]
    Global,
    /// Per-replica state (selection, view settings)
    Local,
}

impl Scope {
    pub const ALL: [Scope; 2] = [Scope::Global, Scope::Local];

    pub fn as_str(self) -> &'static str {
        match self {
            Scope::Global => "global",
            Scope::Local => "local",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scope {
    type Err = DocumentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "global" => Ok(Scope::Global),
            "local" => Ok(Scope::Local),
            other => Err(DocumentError::InvalidScope(other.to_string())),
        }
    }
}

/// One value per scope
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerScope<T> {
    pub global: T,
    pub local: T,
}

impl<T> PerScope<T> {
    pub fn new(global: T, local: T) -> Self {
        Self { global, local }
    }

    pub fn get(&self, scope: Scope) -> &T {
        match scope {
            Scope::Global => &self.global,
            Scope::Local => &self.local,
        }
    }

    pub fn get_mut(&mut self, scope: Scope) -> &mut T {
        match scope {
            Scope::Global => &mut self.global,
            Scope::Local => &mut self.local,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Scope, &T)> {
        Scope::ALL.into_iter().map(move |scope| (scope, self.get(scope)))
    }

    pub fn map<U>(&self, mut f: impl FnMut(Scope, &T) -> U) -> PerScope<U> {
        PerScope {
            global: f(Scope::Global, &self.global),
            local: f(Scope::Local, &self.local),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_parsing() {
        assert_eq!("global".parse::<Scope>().unwrap(), Scope::Global);
        assert_eq!("local".parse::<Scope>().unwrap(), Scope::Local);

        let err = "shared".parse::<Scope>().unwrap_err();
        assert!(matches!(err, DocumentError::InvalidScope(ref s) if s == "shared"));
    }

    #[test]
    fn test_scope_serde_names() {
        assert_eq!(serde_json::to_string(&Scope::Local).unwrap(), "\"local\"");
        let scope: Scope = serde_json::from_str("\"global\"").unwrap();
        assert_eq!(scope, Scope::Global);
    }

    #[test]
    fn test_per_scope_access() {
        let mut revisions = PerScope::new(3u64, 1u64);
        *revisions.get_mut(Scope::Local) += 1;

        assert_eq!(*revisions.get(Scope::Global), 3);
        assert_eq!(*revisions.get(Scope::Local), 2);

        let doubled = revisions.map(|_, r| r * 2);
        assert_eq!(doubled, PerScope::new(6, 4));
        assert_eq!(revisions.iter().count(), 2);
    }
}
