//! Mock league source for testing
//!
//! Serves canned rows without network access, counts calls per method, and
//! can be told to fail specific methods.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{
    ChatMessage, Fixture, GameweekPoints, League, LeagueMember, LeagueSource, OverallStanding,
    Pick, ResultRow, Submission,
};
use crate::error::{FetchError, FetchResult};

/// Method names accepted by `failing` and `calls`.
pub mod method {
    pub const CURRENT_GAMEWEEK: &str = "current_gameweek";
    pub const MEMBERSHIPS: &str = "memberships";
    pub const LEAGUE_MEMBERS: &str = "league_members";
    pub const FIXTURES: &str = "fixtures";
    pub const RESULTS: &str = "results";
    pub const PICKS: &str = "picks";
    pub const SUBMISSIONS: &str = "submissions";
    pub const GAMEWEEK_POINTS: &str = "gameweek_points";
    pub const OVERALL_STANDINGS: &str = "overall_standings";
    pub const CHAT_BACKLOG: &str = "chat_backlog";
}

/// Mock source for testing.
///
/// # Example
/// ```ignore
/// let mock = MockLeagueSource::new()
///     .with_gameweek(3)
///     .failing(method::RESULTS, FetchError::NotFound("results".into()));
/// ```
#[derive(Default)]
pub struct MockLeagueSource {
    gameweek: u32,
    leagues: Vec<League>,
    members: Vec<LeagueMember>,
    fixtures: Vec<Fixture>,
    results: Vec<ResultRow>,
    picks: Vec<Pick>,
    submissions: Vec<Submission>,
    points: Vec<GameweekPoints>,
    overall: Vec<OverallStanding>,
    messages: Vec<ChatMessage>,
    /// Error returned by a method on every call
    failures: HashMap<&'static str, FetchError>,
    /// Artificial latency applied to every call
    delay: Option<Duration>,
    /// Call counts per method
    calls: Arc<Mutex<HashMap<&'static str, usize>>>,
}

impl MockLeagueSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_gameweek(mut self, gw: u32) -> Self {
        self.gameweek = gw;
        self
    }

    pub fn with_leagues(mut self, leagues: Vec<League>) -> Self {
        self.leagues = leagues;
        self
    }

    pub fn with_members(mut self, members: Vec<LeagueMember>) -> Self {
        self.members = members;
        self
    }

    pub fn with_fixtures(mut self, fixtures: Vec<Fixture>) -> Self {
        self.fixtures = fixtures;
        self
    }

    pub fn with_results(mut self, results: Vec<ResultRow>) -> Self {
        self.results = results;
        self
    }

    pub fn with_picks(mut self, picks: Vec<Pick>) -> Self {
        self.picks = picks;
        self
    }

    pub fn with_submissions(mut self, submissions: Vec<Submission>) -> Self {
        self.submissions = submissions;
        self
    }

    pub fn with_points(mut self, points: Vec<GameweekPoints>) -> Self {
        self.points = points;
        self
    }

    pub fn with_overall(mut self, overall: Vec<OverallStanding>) -> Self {
        self.overall = overall;
        self
    }

    pub fn with_messages(mut self, messages: Vec<ChatMessage>) -> Self {
        self.messages = messages;
        self
    }

    /// Make `method` return `error` on every call.
    pub fn failing(mut self, method: &'static str, error: FetchError) -> Self {
        self.failures.insert(method, error);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of calls made to `method` so far.
    pub async fn calls(&self, method: &str) -> usize {
        self.calls.lock().await.get(method).copied().unwrap_or(0)
    }

    /// Count the call, apply the delay, and return the configured failure.
    async fn enter(&self, method: &'static str) -> FetchResult<()> {
        *self.calls.lock().await.entry(method).or_insert(0) += 1;
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match self.failures.get(method) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl LeagueSource for MockLeagueSource {
    async fn current_gameweek(&self) -> FetchResult<u32> {
        self.enter(method::CURRENT_GAMEWEEK).await?;
        Ok(self.gameweek)
    }

    async fn memberships(&self, _user_id: &str) -> FetchResult<Vec<League>> {
        self.enter(method::MEMBERSHIPS).await?;
        Ok(self.leagues.clone())
    }

    async fn league_members(&self, league_id: &str) -> FetchResult<Vec<LeagueMember>> {
        self.enter(method::LEAGUE_MEMBERS).await?;
        Ok(self
            .members
            .iter()
            .filter(|m| m.league_id == league_id)
            .cloned()
            .collect())
    }

    async fn fixtures(&self, gw: u32) -> FetchResult<Vec<Fixture>> {
        self.enter(method::FIXTURES).await?;
        Ok(self.fixtures.iter().filter(|f| f.gw == gw).cloned().collect())
    }

    async fn results(&self) -> FetchResult<Vec<ResultRow>> {
        self.enter(method::RESULTS).await?;
        Ok(self.results.clone())
    }

    async fn picks(&self, user_ids: &[String], gw: Option<u32>) -> FetchResult<Vec<Pick>> {
        self.enter(method::PICKS).await?;
        Ok(self
            .picks
            .iter()
            .filter(|p| user_ids.contains(&p.user_id) && gw.is_none_or(|gw| p.gw == gw))
            .cloned()
            .collect())
    }

    async fn submissions(&self, user_ids: &[String]) -> FetchResult<Vec<Submission>> {
        self.enter(method::SUBMISSIONS).await?;
        Ok(self
            .submissions
            .iter()
            .filter(|s| user_ids.contains(&s.user_id))
            .cloned()
            .collect())
    }

    async fn gameweek_points(&self) -> FetchResult<Vec<GameweekPoints>> {
        self.enter(method::GAMEWEEK_POINTS).await?;
        Ok(self.points.clone())
    }

    async fn overall_standings(&self) -> FetchResult<Vec<OverallStanding>> {
        self.enter(method::OVERALL_STANDINGS).await?;
        Ok(self.overall.clone())
    }

    async fn chat_backlog(&self, league_id: &str, limit: usize) -> FetchResult<Vec<ChatMessage>> {
        self.enter(method::CHAT_BACKLOG).await?;
        Ok(self
            .messages
            .iter()
            .filter(|m| m.league_id == league_id)
            .take(limit)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_counts_calls() {
        let mock = MockLeagueSource::new().with_gameweek(4);

        assert_eq!(mock.current_gameweek().await, Ok(4));
        assert_eq!(mock.current_gameweek().await, Ok(4));
        assert_eq!(mock.calls(method::CURRENT_GAMEWEEK).await, 2);
        assert_eq!(mock.calls(method::RESULTS).await, 0);
    }

    #[tokio::test]
    async fn test_mock_failure_every_call() {
        let mock = MockLeagueSource::new().failing(method::RESULTS, FetchError::Timeout);

        assert_eq!(mock.results().await, Err(FetchError::Timeout));
        assert_eq!(mock.results().await, Err(FetchError::Timeout));
        assert_eq!(mock.calls(method::RESULTS).await, 2);
    }

    #[tokio::test]
    async fn test_mock_filters_by_league() {
        let mock = MockLeagueSource::new().with_members(vec![
            LeagueMember {
                league_id: "l1".into(),
                user_id: "u1".into(),
                name: "Amy".into(),
            },
            LeagueMember {
                league_id: "l2".into(),
                user_id: "u2".into(),
                name: "Zoe".into(),
            },
        ]);

        let members = mock.league_members("l2").await.unwrap();
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].name, "Zoe");
    }
}
