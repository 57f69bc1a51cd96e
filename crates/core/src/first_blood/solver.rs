//! Solver identification for raw solve records.
//!
//! CTFd returns different shapes depending on version, user/team mode and
//! whether the record came from `solves` or `submissions`. Each record is
//! classified once into a [`SolverRef`] and resolved to a display name.

use serde_json::Value;
use tracing::{debug, warn};

use crate::ctfd::{CtfdError, CtfdUser, ScoringApi};

/// How a solve record identifies its solver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SolverRef {
    /// Record carries the account name directly (current `solves` format).
    Named {
        name: String,
        account_id: Option<u64>,
    },
    /// Submission record with nested `user` / `team` objects.
    Nested {
        user_name: Option<String>,
        team_name: Option<String>,
    },
    /// Only a user id.
    User(u64),
    /// Only a team id (team mode).
    Team(u64),
}

impl SolverRef {
    /// Classify a raw solve record. `None` if no known shape matches.
    pub fn classify(raw: &Value) -> Option<Self> {
        if let Some(name) = raw.get("name").and_then(Value::as_str) {
            return Some(SolverRef::Named {
                name: name.to_string(),
                account_id: raw.get("account_id").and_then(as_id),
            });
        }

        let nested_user = raw.get("user").filter(|v| v.is_object());
        let nested_team = raw.get("team").filter(|v| v.is_object());
        if nested_user.is_some() || nested_team.is_some() {
            let name_of = |v: Option<&Value>| {
                v.and_then(|o| o.get("name"))
                    .and_then(Value::as_str)
                    .map(str::to_string)
            };
            return Some(SolverRef::Nested {
                user_name: name_of(nested_user),
                team_name: name_of(nested_team),
            });
        }

        if let Some(user_id) = raw.get("user_id").and_then(as_id) {
            return Some(SolverRef::User(user_id));
        }
        if let Some(team_id) = raw.get("team_id").and_then(as_id) {
            return Some(SolverRef::Team(team_id));
        }

        None
    }
}

/// Resolved solver for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Solver {
    pub name: String,
    pub team: Option<String>,
}

impl Solver {
    pub fn new(name: impl Into<String>, team: Option<String>) -> Self {
        Self {
            name: name.into(),
            team,
        }
    }

    /// `name` or `name (team)`.
    pub fn display(&self) -> String {
        match &self.team {
            Some(team) => format!("{} ({})", self.name, team),
            None => self.name.clone(),
        }
    }
}

/// Resolve a solver reference through the scoring API.
///
/// `Ok(None)` means the solver could not be identified.
pub async fn resolve(api: &dyn ScoringApi, solver: &SolverRef) -> Result<Option<Solver>, CtfdError> {
    match solver {
        SolverRef::Named { name, account_id } => {
            let team = match account_id {
                Some(id) => match api.user(*id).await {
                    Ok(Some(user)) => team_name(api, user.team_id).await,
                    Ok(None) => None,
                    Err(e) => {
                        // In team mode the account id may be a team id
                        debug!(account_id = id, "Account lookup failed, keeping bare name: {}", e);
                        None
                    }
                },
                None => None,
            };
            Ok(Some(Solver::new(name.clone(), team)))
        }
        SolverRef::Nested {
            user_name,
            team_name,
        } => Ok(match (user_name, team_name) {
            (Some(user), team) => Some(Solver::new(user.clone(), team.clone())),
            (None, Some(team)) => Some(Solver::new(team.clone(), None)),
            (None, None) => None,
        }),
        SolverRef::User(user_id) => match api.user(*user_id).await? {
            Some(CtfdUser {
                name: Some(name),
                team_id,
                ..
            }) => {
                let team = team_name(api, team_id).await;
                Ok(Some(Solver::new(name, team)))
            }
            Some(_) => {
                debug!(user_id, "User record has no name");
                Ok(None)
            }
            None => Ok(None),
        },
        SolverRef::Team(team_id) => Ok(api
            .team(*team_id)
            .await?
            .and_then(|team| team.name)
            .map(|name| Solver::new(name, None))),
    }
}

async fn team_name(api: &dyn ScoringApi, team_id: Option<u64>) -> Option<String> {
    let team_id = team_id?;
    match api.team(team_id).await {
        Ok(team) => team.and_then(|t| t.name),
        Err(e) => {
            warn!(team_id, "Team lookup failed: {}", e);
            None
        }
    }
}

/// Ids arrive as numbers or numeric strings.
fn as_id(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
