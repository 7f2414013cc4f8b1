//! Cache prewarm
//!
//! Loads everything the first screens need into the cache in three waves:
//!
//! 1. current gameweek (required), memberships, results, gameweek points,
//!    overall standings;
//! 2. fixtures and the viewer's picks for that gameweek, members and chat
//!    backlog of every league;
//! 3. members' picks and submissions, then the derived league tables,
//!    viewer ranks and form windows.
//!
//! Every step writes to the cache as soon as it completes. Only the
//! gameweek is required; any other failure is logged, recorded in the
//! report, and skips the steps that depend on it.

pub mod period;
pub mod standings;

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::join;
use log::{debug, info, warn};
use serde::Serialize;
use tokio::task::JoinHandle;

use crate::cache::{CacheStore, Category, key};
use crate::client::{ChatMessage, GameweekPoints, League, LeagueMember, LeagueSource, ResultRow};
use crate::error::{Error, FetchError, FetchResult, Result};
use crate::fetch::{Deduplicator, RetryPolicy, run_bounded};

pub use period::{PeriodResolver, PublishedGameweek};

/// Gameweek windows precomputed for the form table
pub const FORM_WINDOWS: [u32; 2] = [5, 10];

/// Chat messages fetched per league by default
pub const DEFAULT_CHAT_BACKLOG: usize = 50;

/// What happened to one prewarm step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// Fetched or derived, and written to the cache
    Cached,
    Failed(FetchError),
    /// Not attempted because an input was missing
    Skipped(String),
}

impl fmt::Display for StepOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepOutcome::Cached => write!(f, "cached"),
            StepOutcome::Failed(err) => write!(f, "failed: {}", err),
            StepOutcome::Skipped(reason) => write!(f, "skipped: {}", reason),
        }
    }
}

/// Per-step outcomes of one prewarm run, keyed by cache key.
///
/// League-scoped steps that could not be enumerated (memberships failed)
/// are recorded under `<category>:*`.
#[derive(Debug, Clone, Default)]
pub struct PrewarmReport {
    pub gameweek: Option<u32>,
    pub steps: BTreeMap<String, StepOutcome>,
}

impl PrewarmReport {
    fn record(&mut self, key: impl Into<String>, outcome: StepOutcome) {
        self.steps.insert(key.into(), outcome);
    }

    /// Record a fetch result, returning the value on success.
    fn settle<T>(&mut self, key: &str, result: FetchResult<T>) -> Option<T> {
        match result {
            Ok(value) => {
                self.record(key, StepOutcome::Cached);
                Some(value)
            }
            Err(err) => {
                warn!("Prewarm step {} failed: {}", key, err);
                self.record(key, StepOutcome::Failed(err));
                None
            }
        }
    }

    fn skip(&mut self, key: impl Into<String>, reason: &str) {
        let key = key.into();
        debug!("Prewarm step {} skipped: {}", key, reason);
        self.record(key, StepOutcome::Skipped(reason.to_string()));
    }

    pub fn cached(&self) -> usize {
        self.count(|o| matches!(o, StepOutcome::Cached))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, StepOutcome::Failed(_)))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, StepOutcome::Skipped(_)))
    }

    fn count(&self, pred: impl Fn(&StepOutcome) -> bool) -> usize {
        self.steps.values().filter(|o| pred(o)).count()
    }
}

/// Result of a prewarm raced against a ceiling.
#[derive(Debug)]
pub enum PrewarmStatus {
    Completed(PrewarmReport),
    /// The ceiling passed first; the run continues in the background.
    TimedOut(PrewarmHandle),
}

/// A prewarm run that outlived its ceiling.
///
/// The run belongs to the runtime it was spawned on, so a caller about to
/// shut that runtime down should `finish` it first or lose whatever was
/// still in flight.
#[derive(Debug)]
pub struct PrewarmHandle {
    run: JoinHandle<Result<PrewarmReport>>,
}

impl PrewarmHandle {
    /// Wait for the background run to settle.
    pub async fn finish(self) -> Result<PrewarmReport> {
        self.run.await.map_err(task_failed)?
    }
}

fn task_failed(err: tokio::task::JoinError) -> Error {
    Error::Other(format!("Prewarm task failed: {}", err))
}

/// Prewarm tuning
#[derive(Debug, Clone, Copy)]
pub struct PrewarmOptions {
    pub retry: RetryPolicy,
    /// Leagues processed at once in the per-league fan-outs
    pub max_concurrent: usize,
    pub chat_backlog: usize,
}

impl Default for PrewarmOptions {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            max_concurrent: 4,
            chat_backlog: DEFAULT_CHAT_BACKLOG,
        }
    }
}

/// Fills the cache for a viewer ahead of navigation.
#[derive(Clone)]
pub struct Prewarmer {
    source: Arc<dyn LeagueSource>,
    resolver: Arc<dyn PeriodResolver>,
    store: Arc<CacheStore>,
    dedup: Arc<Deduplicator>,
    options: PrewarmOptions,
}

/// Raw rows shared by the wave 3 steps
struct SeasonInputs<'a> {
    gw: u32,
    viewer_id: &'a str,
    results: Option<&'a [ResultRow]>,
}

impl Prewarmer {
    pub fn new(
        source: Arc<dyn LeagueSource>,
        resolver: Arc<dyn PeriodResolver>,
        store: Arc<CacheStore>,
        dedup: Arc<Deduplicator>,
        options: PrewarmOptions,
    ) -> Self {
        Self {
            source,
            resolver,
            store,
            dedup,
            options,
        }
    }

    /// Fetch through dedupe and retry, then write the value under `key`.
    async fn fetch_with<C, T, F, Fut>(
        &self,
        ctx: C,
        key: &str,
        category: Category,
        op: F,
    ) -> FetchResult<T>
    where
        C: Clone + Send + Sync + 'static,
        T: Serialize + Clone + Send + Sync + 'static,
        F: Fn(C) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = FetchResult<T>> + Send + 'static,
    {
        let retry = self.options.retry;
        let value = self
            .dedup
            .dedupe(key, move || async move { retry.run(|| op(ctx.clone())).await })
            .await?;

        self.store.set_cached(key, &value, category.ttl());
        Ok(value)
    }

    /// `fetch_with` against the data source
    async fn fetch<T, F, Fut>(&self, key: &str, category: Category, op: F) -> FetchResult<T>
    where
        T: Serialize + Clone + Send + Sync + 'static,
        F: Fn(Arc<dyn LeagueSource>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = FetchResult<T>> + Send + 'static,
    {
        self.fetch_with(Arc::clone(&self.source), key, category, op)
            .await
    }

    /// Prewarm the cache for `viewer_id`.
    ///
    /// Returns `Error::PrewarmRequired` if the current gameweek cannot be
    /// resolved. Every other failure is reported in the returned report.
    pub async fn prewarm(&self, viewer_id: &str) -> Result<PrewarmReport> {
        let mut report = PrewarmReport::default();
        info!("Prewarming cache for viewer {}", viewer_id);

        // Wave 1: independent reads
        let gw_key = key::current_gameweek(viewer_id);
        let memberships_key = key::memberships(viewer_id);
        let results_key = key::results();
        let points_key = key::gameweek_points();
        let overall_key = key::overall_standings();

        let viewer = viewer_id.to_string();
        let (gw, leagues, results, points, overall) = join!(
            self.fetch_with(
                Arc::clone(&self.resolver),
                &gw_key,
                Category::CurrentGameweek,
                move |resolver| {
                    let viewer = viewer.clone();
                    async move { resolver.resolve(&viewer).await }
                },
            ),
            self.fetch(&memberships_key, Category::Memberships, {
                let viewer = viewer_id.to_string();
                move |source| {
                    let viewer = viewer.clone();
                    async move { source.memberships(&viewer).await }
                }
            }),
            self.fetch(&results_key, Category::Results, |source| async move {
                source.results().await
            }),
            self.fetch(&points_key, Category::GameweekPoints, |source| async move {
                source.gameweek_points().await
            }),
            self.fetch(&overall_key, Category::OverallStandings, |source| async move {
                source.overall_standings().await
            }),
        );

        let gw = match gw {
            Ok(gw) => {
                report.record(&gw_key, StepOutcome::Cached);
                gw
            }
            Err(err) => {
                warn!("Prewarm aborted, current gameweek unavailable: {}", err);
                return Err(Error::PrewarmRequired {
                    step: gw_key,
                    source: err,
                });
            }
        };
        report.gameweek = Some(gw);
        let leagues = report.settle(&memberships_key, leagues);
        let results = report.settle(&results_key, results);
        let points = report.settle(&points_key, points);
        report.settle(&overall_key, overall);
        debug!("Prewarm wave 1 done: gameweek {}", gw);

        // Wave 2: gameweek- and league-scoped reads
        let fixtures_key = key::fixtures(gw);
        let picks_key = key::viewer_picks(viewer_id, gw);
        let league_list = leagues.clone().unwrap_or_default();

        let (fixtures, viewer_picks, members, chats) = join!(
            self.fetch(&fixtures_key, Category::Fixtures, move |source| async move {
                source.fixtures(gw).await
            }),
            self.fetch(&picks_key, Category::ViewerPicks, {
                let viewer = vec![viewer_id.to_string()];
                move |source| {
                    let viewer = viewer.clone();
                    async move { source.picks(&viewer, Some(gw)).await }
                }
            }),
            self.members_of(&league_list),
            self.chat_backlogs(&league_list),
        );
        report.settle(&fixtures_key, fixtures);
        report.settle(&picks_key, viewer_picks);

        let Some(leagues) = leagues else {
            for category in [
                Category::LeagueMembers,
                Category::ChatBacklog,
                Category::LeaguePicks,
                Category::Submissions,
                Category::LeagueTable,
                Category::SeasonTable,
                Category::ViewerRank,
            ] {
                report.skip(format!("{}:*", category.tag()), "memberships unavailable");
            }
            self.warm_form(&mut report, gw, points.as_deref());
            return Ok(report);
        };

        for (league, result) in chats {
            report.settle(&key::chat_backlog(&league.id), result);
        }
        let mut league_members = Vec::new();
        for (league, result) in members {
            if let Some(rows) = report.settle(&key::league_members(&league.id), result) {
                league_members.push((league, rows));
            }
        }
        debug!(
            "Prewarm wave 2 done: {} of {} leagues with members",
            league_members.len(),
            leagues.len()
        );

        // Wave 3: per-league derived views, then app-wide form
        let inputs = SeasonInputs {
            gw,
            viewer_id,
            results: results.as_deref(),
        };
        let per_league = run_bounded(
            league_members,
            |(league, members)| self.warm_league(league, members, &inputs),
            self.options.max_concurrent,
        )
        .await;
        for (_, league_report) in per_league {
            report.steps.extend(league_report.steps);
        }

        self.warm_form(&mut report, gw, points.as_deref());

        info!(
            "Prewarm finished: {} cached, {} failed, {} skipped",
            report.cached(),
            report.failed(),
            report.skipped()
        );
        Ok(report)
    }

    /// Race `prewarm` against `ceiling`.
    ///
    /// The run is spawned, so on `TimedOut` it keeps going and keeps
    /// writing to the cache; the returned handle lets the caller wait for it.
    pub async fn prewarm_within(&self, viewer_id: &str, ceiling: Duration) -> Result<PrewarmStatus> {
        let this = self.clone();
        let viewer = viewer_id.to_string();
        let mut run = tokio::spawn(async move { this.prewarm(&viewer).await });

        match tokio::time::timeout(ceiling, &mut run).await {
            Ok(Ok(result)) => result.map(PrewarmStatus::Completed),
            Ok(Err(join_err)) => Err(task_failed(join_err)),
            Err(_) => {
                warn!(
                    "Prewarm still running after {:?}; continuing in background",
                    ceiling
                );
                Ok(PrewarmStatus::TimedOut(PrewarmHandle { run }))
            }
        }
    }

    async fn members_of(&self, leagues: &[League]) -> Vec<(League, FetchResult<Vec<LeagueMember>>)> {
        run_bounded(
            leagues.to_vec(),
            |league: League| async move {
                let id = league.id.clone();
                self.fetch(
                    &key::league_members(&league.id),
                    Category::LeagueMembers,
                    move |source| {
                        let id = id.clone();
                        async move { source.league_members(&id).await }
                    },
                )
                .await
            },
            self.options.max_concurrent,
        )
        .await
    }

    async fn chat_backlogs(&self, leagues: &[League]) -> Vec<(League, FetchResult<Vec<ChatMessage>>)> {
        let limit = self.options.chat_backlog;
        run_bounded(
            leagues.to_vec(),
            |league: League| async move {
                let id = league.id.clone();
                self.fetch(
                    &key::chat_backlog(&league.id),
                    Category::ChatBacklog,
                    move |source| {
                        let id = id.clone();
                        async move { source.chat_backlog(&id, limit).await }
                    },
                )
                .await
            },
            self.options.max_concurrent,
        )
        .await
    }

    /// Members' raw rows and the derived views of one league.
    async fn warm_league(
        &self,
        league: League,
        members: Vec<LeagueMember>,
        inputs: &SeasonInputs<'_>,
    ) -> PrewarmReport {
        let mut report = PrewarmReport::default();
        let gw = inputs.gw;
        let user_ids: Vec<String> = members.iter().map(|m| m.user_id.clone()).collect();

        let picks_key = key::league_picks(&league.id);
        let subs_key = key::submissions(&league.id);
        let (picks, submissions) = join!(
            self.fetch(&picks_key, Category::LeaguePicks, {
                let user_ids = user_ids.clone();
                move |source| {
                    let user_ids = user_ids.clone();
                    async move { source.picks(&user_ids, None).await }
                }
            }),
            self.fetch(&subs_key, Category::Submissions, move |source| {
                let user_ids = user_ids.clone();
                async move { source.submissions(&user_ids).await }
            }),
        );
        let picks = report.settle(&picks_key, picks);
        let submissions = report.settle(&subs_key, submissions);

        let table_key = key::league_table(&league.id, gw);
        let season_key = key::season_table(&league.id);
        let rank_key = key::viewer_rank(&league.id, gw, inputs.viewer_id);

        let (Some(results), Some(picks)) = (inputs.results, picks) else {
            for k in [table_key, season_key, rank_key] {
                report.skip(k, "results or member picks unavailable");
            }
            return report;
        };

        let table = standings::gameweek_table(&members, results, &picks, gw);
        match standings::viewer_rank(&table.rows, inputs.viewer_id) {
            Some(rank) => {
                self.store
                    .set_cached(&rank_key, &rank, Category::ViewerRank.ttl());
                report.record(rank_key, StepOutcome::Cached);
            }
            None => report.skip(rank_key, "viewer is not a member"),
        }
        self.store
            .set_cached(&table_key, &table, Category::LeagueTable.ttl());
        report.record(table_key, StepOutcome::Cached);

        match submissions {
            Some(submissions) => {
                let season = standings::season_table(&members, results, &picks, &submissions);
                self.store
                    .set_cached(&season_key, &season, Category::SeasonTable.ttl());
                report.record(season_key, StepOutcome::Cached);
            }
            None => report.skip(season_key, "submissions unavailable"),
        }

        debug!("Prewarmed league {} ({})", league.name, league.id);
        report
    }

    fn warm_form(&self, report: &mut PrewarmReport, gw: u32, points: Option<&[GameweekPoints]>) {
        for window in FORM_WINDOWS {
            let form_key = key::form(window, gw);
            match points {
                Some(points) => {
                    let form = standings::form_table(points, gw, window);
                    self.store.set_cached(&form_key, &form, Category::Form.ttl());
                    report.record(form_key, StepOutcome::Cached);
                }
                None => report.skip(form_key, "gameweek points unavailable"),
            }
        }
    }
}
