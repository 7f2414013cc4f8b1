//! Raw row types returned by the league backend
//!
//! Field names follow the backend's column names so rows deserialize
//! straight from the REST responses.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Match outcome, also used as a pick value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Outcome {
    /// Home win
    H,
    /// Draw
    D,
    /// Away win
    A,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Outcome::H => "H",
            Outcome::D => "D",
            Outcome::A => "A",
        };
        f.write_str(s)
    }
}

/// A mini-league the viewer belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct League {
    /// League ID
    pub id: String,

    /// Display name
    pub name: String,

    /// Join code (optional)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

/// Membership row: one user in one league.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeagueMember {
    pub league_id: String,
    pub user_id: String,
    /// Display name shown in tables
    pub name: String,
}

/// One fixture of a gameweek.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fixture {
    /// Gameweek number
    pub gw: u32,

    /// Position of the fixture within its gameweek
    pub fixture_index: u32,

    /// Home team
    pub home: String,

    /// Away team
    pub away: String,

    /// Kickoff time (RFC 3339, optional)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kickoff: Option<String>,
}

/// Final result of a fixture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultRow {
    pub gw: u32,
    pub fixture_index: u32,
    #[serde(rename = "result")]
    pub outcome: Outcome,
}

/// A user's pick for one fixture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pick {
    pub user_id: String,
    pub gw: u32,
    pub fixture_index: u32,
    pub pick: Outcome,
}

/// Marks a user's picks for a gameweek as submitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    pub user_id: String,
    pub gw: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submitted_at: Option<String>,
}

/// App-wide points of one user in one gameweek.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameweekPoints {
    pub user_id: String,
    pub name: String,
    pub gw: u32,
    pub points: u32,
}

/// App-wide overall correct predictions of one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverallStanding {
    pub user_id: String,
    pub name: String,
    pub ocp: u32,
}

/// A league chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub league_id: String,
    pub user_id: String,
    pub content: String,
    pub created_at: String,
}
