use std::fmt;

use serde::{Deserialize, Serialize};

/// Repository an event happened in.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RepoRef {
    /// Platform-assigned numeric repository id.
    pub id: i64,
    /// `owner/name`.
    pub full: String,
}

impl RepoRef {
    pub fn new(id: i64, full: impl Into<String>) -> Self {
        Self {
            id,
            full: full.into(),
        }
    }

    /// Owner half of `full`, if it has one.
    pub fn owner(&self) -> Option<&str> {
        self.full.split_once('/').map(|(owner, _)| owner)
    }

    /// Name half of `full`, or the whole string when there is no owner.
    pub fn name(&self) -> &str {
        self.full
            .split_once('/')
            .map_or(self.full.as_str(), |(_, name)| name)
    }
}

impl fmt::Display for RepoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.full, self.id)
    }
}

/// User (or bot) that triggered an event.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ActorRef {
    pub id: i64,
    pub username: String,
}

impl ActorRef {
    pub fn new(id: i64, username: impl Into<String>) -> Self {
        Self {
            id,
            username: username.into(),
        }
    }
}

impl fmt::Display for ActorRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.username)
    }
}
