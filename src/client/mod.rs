//! League data source
//!
//! `LeagueSource` is the seam between the caching layer and the hosted
//! backend. `RestSource` is the production implementation; tests use
//! `MockLeagueSource`.

use async_trait::async_trait;

use crate::error::FetchResult;

#[cfg(test)]
pub mod mock;
pub mod models;
pub mod rest;

#[cfg(test)]
pub use mock::MockLeagueSource;
pub use models::{
    ChatMessage, Fixture, GameweekPoints, League, LeagueMember, OverallStanding, Pick, ResultRow,
    Submission,
};
pub use rest::RestSource;

/// Read-only access to the league backend, one method per row family.
#[async_trait]
pub trait LeagueSource: Send + Sync {
    /// Published current gameweek number
    async fn current_gameweek(&self) -> FetchResult<u32>;

    /// Leagues the user belongs to
    async fn memberships(&self, user_id: &str) -> FetchResult<Vec<League>>;

    /// Members of one league
    async fn league_members(&self, league_id: &str) -> FetchResult<Vec<LeagueMember>>;

    /// Fixtures of one gameweek, ordered by fixture index
    async fn fixtures(&self, gw: u32) -> FetchResult<Vec<Fixture>>;

    /// All published results of the season
    async fn results(&self) -> FetchResult<Vec<ResultRow>>;

    /// Picks of the given users, optionally limited to one gameweek
    async fn picks(&self, user_ids: &[String], gw: Option<u32>) -> FetchResult<Vec<Pick>>;

    /// Gameweek submissions of the given users
    async fn submissions(&self, user_ids: &[String]) -> FetchResult<Vec<Submission>>;

    /// App-wide points per user per gameweek
    async fn gameweek_points(&self) -> FetchResult<Vec<GameweekPoints>>;

    /// App-wide overall correct predictions
    async fn overall_standings(&self) -> FetchResult<Vec<OverallStanding>>;

    /// Most recent `limit` chat messages of a league, newest first
    async fn chat_backlog(&self, league_id: &str, limit: usize) -> FetchResult<Vec<ChatMessage>>;
}
