use anyhow::bail;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_BALANCE: f64 = 1000.0;
const NO_EMAIL: &str = "no-email";

/// One account from a `firebase auth:export` JSON file.
/// Only `localId` and `email` are read; every other key is ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    #[serde(rename = "localId")]
    pub local_id: String,
    #[serde(default)]
    pub email: Option<String>,
}

impl UserRecord {
    pub fn new(local_id: impl Into<String>, email: Option<&str>) -> Self {
        Self {
            local_id: local_id.into(),
            email: email.map(str::to_string),
        }
    }

    pub fn display_email(&self) -> &str {
        self.email.as_deref().unwrap_or(NO_EMAIL)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct UserExport {
    #[serde(default)]
    pub users: Vec<UserRecord>,
}

/// The per-user document stored at `{collection}/{userId}`.
#[derive(Debug, Clone, PartialEq)]
pub struct UserProfile {
    pub user_id: String,
    pub saved_strategies: Vec<serde_json::Value>,
    pub generation_history: Vec<serde_json::Value>,
    pub balance: f64,
    pub created_at_ms: i64,
    pub migrated: bool,
}

impl UserProfile {
    /// A freshly seeded profile: empty containers, starting balance, flagged as migrated.
    pub fn seeded(user_id: &str, balance: f64, now: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.to_string(),
            saved_strategies: Vec::new(),
            generation_history: Vec::new(),
            balance,
            created_at_ms: now.timestamp_millis(),
            migrated: true,
        }
    }
}

/// How each profile document gets written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SeedMode {
    /// Replace the whole document.
    Overwrite,
    /// Write the profile fields under an update mask, keeping any other fields.
    Merge,
    /// Read first; create, backfill the balance, or skip.
    #[default]
    Upsert,
}

impl SeedMode {
    pub const ALL: [SeedMode; 3] = [SeedMode::Overwrite, SeedMode::Merge, SeedMode::Upsert];
}

impl FromStr for SeedMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "overwrite" => Ok(SeedMode::Overwrite),
            "merge" => Ok(SeedMode::Merge),
            "upsert" => Ok(SeedMode::Upsert),
            other => bail!(
                "Invalid seed mode: {}. Valid values are: overwrite, merge, upsert",
                other
            ),
        }
    }
}

impl fmt::Display for SeedMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Overwrite => write!(f, "overwrite"),
            Self::Merge => write!(f, "merge"),
            Self::Upsert => write!(f, "upsert"),
        }
    }
}

/// What happened to a single user's document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedOutcome {
    /// Overwrite/merge write accepted.
    Written,
    /// Upsert found no document and created one.
    Created,
    /// Upsert found a document without a balance and backfilled it.
    Updated,
    /// Upsert found a complete profile.
    Skipped,
}
