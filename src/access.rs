//! Caller identity and the role gate in front of catalog operations.
//!
//! Authentication happens upstream; this module only answers whether an
//! already-resolved role may perform an action.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{CatalogError, Result};

/// Application roles.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Office,
    Supervisor,
    Promoter,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Admin, Role::Office, Role::Supervisor, Role::Promoter];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Office => "office",
            Role::Supervisor => "supervisor",
            Role::Promoter => "promoter",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self> {
        Role::ALL
            .into_iter()
            .find(|role| role.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| CatalogError::InvalidValue {
                field: "role".into(),
                value: s.to_string(),
                reason: "unknown role".into(),
            })
    }
}

/// Operations guarded by the role gate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    List,
    Get,
    Create,
    Update,
    Delete,
    Subscribe,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Action::List => "list",
            Action::Get => "get",
            Action::Create => "create",
            Action::Update => "update",
            Action::Delete => "delete",
            Action::Subscribe => "subscribe",
        };
        f.write_str(name)
    }
}

/// A resolved caller identity.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Caller {
    pub subject: String,
    pub role: Role,
}

impl Caller {
    pub fn new(subject: impl Into<String>, role: Role) -> Self {
        Self {
            subject: subject.into(),
            role,
        }
    }

    pub fn admin() -> Self {
        Self::new("admin", Role::Admin)
    }
}

/// Which roles may perform which actions.
#[derive(Clone, Debug)]
pub struct AccessPolicy {
    writers: Vec<Role>,
    deleters: Vec<Role>,
}

impl Default for AccessPolicy {
    fn default() -> Self {
        Self {
            writers: vec![Role::Admin, Role::Office],
            deleters: vec![Role::Admin],
        }
    }
}

impl AccessPolicy {
    pub fn permits(&self, role: Role, action: Action) -> bool {
        match action {
            Action::List | Action::Get | Action::Subscribe => true,
            Action::Create | Action::Update => self.writers.contains(&role),
            Action::Delete => self.deleters.contains(&role),
        }
    }

    /// Fail with `Forbidden` unless the caller may perform `action`.
    pub fn check(&self, caller: &Caller, action: Action) -> Result<()> {
        if self.permits(caller.role, action) {
            Ok(())
        } else {
            Err(CatalogError::Forbidden {
                role: caller.role,
                action,
            })
        }
    }
}
