//! Destination addressing for playback sessions

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::PlayerError;

/// Kind of chat target a message is addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    User,
    Group,
}

impl TargetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetKind::User => "user",
            TargetKind::Group => "group",
        }
    }
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TargetKind {
    type Err = PlayerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "user" | "private" => Ok(TargetKind::User),
            "group" => Ok(TargetKind::Group),
            other => Err(PlayerError::invalid_command(format!("unknown target kind '{}'", other))),
        }
    }
}

/// Identity of a playback destination: (platform, target kind, target id).
///
/// Two requests with the same key address the same destination, whatever
/// video they play.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DestinationKey {
    pub platform: String,
    pub kind: TargetKind,
    pub target_id: String,
}

impl DestinationKey {
    pub fn new(platform: impl Into<String>, kind: TargetKind, target_id: impl Into<String>) -> Self {
        Self { platform: platform.into(), kind, target_id: target_id.into() }
    }

    pub fn user(platform: impl Into<String>, target_id: impl Into<String>) -> Self {
        Self::new(platform, TargetKind::User, target_id)
    }

    pub fn group(platform: impl Into<String>, target_id: impl Into<String>) -> Self {
        Self::new(platform, TargetKind::Group, target_id)
    }
}

impl fmt::Display for DestinationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.platform, self.kind, self.target_id)
    }
}
