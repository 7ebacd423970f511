//! Group members as seen by the engine.
//!
//! A member is an opaque unique key (an email in practice) plus a display
//! label. The engine only compares keys for equality and orders them
//! lexicographically to break ties.

use serde::{Deserialize, Serialize};

use crate::{EngineError, ResultEngine};

pub type MemberKey = String;

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Member {
    pub key: MemberKey,
    pub display_name: String,
}

impl Member {
    /// Builds a member, trimming both fields. An empty display name falls
    /// back to the key.
    pub fn new(key: &str, display_name: &str) -> ResultEngine<Self> {
        let key = normalize_member_key(key)?;
        let display_name = match display_name.trim() {
            "" => key.clone(),
            name => name.to_string(),
        };
        Ok(Self { key, display_name })
    }

    /// Re-applies the [`Member::new`] rules to a member built by hand.
    pub fn normalized(self) -> ResultEngine<Self> {
        Self::new(&self.key, &self.display_name)
    }
}

pub(crate) fn normalize_member_key(value: &str) -> ResultEngine<MemberKey> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(EngineError::InvalidInput(
            "member key must not be empty".to_string(),
        ));
    }
    Ok(trimmed.to_string())
}
