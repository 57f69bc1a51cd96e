//! CTFd API response types.

use serde::{Deserialize, Serialize};

/// Standard `{ "success": .., "data": .. }` wrapper.
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope<T> {
    #[serde(default)]
    pub success: Option<bool>,
    pub data: Option<T>,
}

/// Entry of the `challenges` listing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChallengeSummary {
    pub id: u64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub value: Option<i64>,
}

/// `challenges/{id}` detail.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChallengeDetail {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub category: Option<String>,
    /// Points awarded.
    #[serde(default)]
    pub value: Option<i64>,
}

impl ChallengeDetail {
    /// Category, `misc` when missing or blank.
    pub fn category_or_default(&self) -> &str {
        match self.category.as_deref().map(str::trim) {
            Some(c) if !c.is_empty() => c,
            _ => "misc",
        }
    }

    pub fn points(&self) -> i64 {
        self.value.unwrap_or(0)
    }
}

/// `users/{id}` record. Hidden or partial accounts omit fields.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CtfdUser {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub team_id: Option<u64>,
}

impl CtfdUser {
    /// Name for log lines and replies.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("(unnamed)")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CtfdTeam {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub name: Option<String>,
}
