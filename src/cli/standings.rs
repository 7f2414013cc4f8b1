//! Standings command: the cached table right away, then any update

use std::sync::Arc;

use colored::Colorize;
use serde::Serialize;
use tabled::Tabled;

use crate::cache::{CacheTtl, key};
use crate::cli::{CommandContext, GlobalOptions, OutputFormat};
use crate::client::LeagueSource;
use crate::error::{FetchResult, Result};
use crate::output::formatters::{format_age, ordinal};
use crate::output::json::{format_json, format_json_cached};
use crate::output::table::format_table;
use crate::prewarm::PeriodResolver;
use crate::prewarm::standings::{
    self, GameweekRow, GameweekTable, SeasonRow, SeasonTable, viewer_rank,
};
use crate::read_path::{Refresh, SwrRead};

const NO_MEMBERS: &str = "No members in this league yet.";

/// A league table the command knows how to print.
trait LeagueView: Serialize + PartialEq {
    fn title(&self) -> String;
    fn table(&self, viewer: Option<&str>) -> String;
    /// "You: 2nd of 7" line, if the viewer is in the table
    fn viewer_line(&self, viewer: &str) -> Option<String>;
}

#[derive(Tabled)]
struct SeasonDisplay {
    #[tabled(rename = "#")]
    rank: String,
    #[tabled(rename = "NAME")]
    name: String,
    #[tabled(rename = "PTS")]
    points: u32,
    #[tabled(rename = "W")]
    wins: u32,
    #[tabled(rename = "D")]
    draws: u32,
    #[tabled(rename = "OCP")]
    ocp: u32,
    #[tabled(rename = "UNICORNS")]
    unicorns: u32,
}

#[derive(Tabled)]
struct GameweekDisplay {
    #[tabled(rename = "#")]
    rank: String,
    #[tabled(rename = "NAME")]
    name: String,
    #[tabled(rename = "SCORE")]
    score: u32,
    #[tabled(rename = "UNICORNS")]
    unicorns: u32,
}

/// Rank cell, with a `=` suffix when shared
fn rank_cell(rank: u32, all: &[u32]) -> String {
    if all.iter().filter(|r| **r == rank).count() > 1 {
        format!("{}=", rank)
    } else {
        rank.to_string()
    }
}

/// Name cell, with the viewer marked
fn name_cell(name: &str, user_id: &str, viewer: Option<&str>) -> String {
    if viewer == Some(user_id) {
        format!("{} (you)", name)
    } else {
        name.to_string()
    }
}

fn viewer_summary(rank: Option<standings::ViewerRank>) -> Option<String> {
    rank.map(|r| {
        format!(
            "You: {}{} of {}",
            ordinal(r.rank),
            if r.tied { " (tied)" } else { "" },
            r.of
        )
    })
}

impl LeagueView for SeasonTable {
    fn title(&self) -> String {
        match self.through_gw {
            Some(gw) => format!("Season table (through gameweek {})", gw),
            None => "Season table (no results yet)".to_string(),
        }
    }

    fn table(&self, viewer: Option<&str>) -> String {
        let ranks: Vec<u32> = self.rows.iter().map(|r| r.rank).collect();
        let rows: Vec<SeasonDisplay> = self
            .rows
            .iter()
            .map(|r: &SeasonRow| SeasonDisplay {
                rank: rank_cell(r.rank, &ranks),
                name: name_cell(&r.name, &r.user_id, viewer),
                points: r.points,
                wins: r.wins,
                draws: r.draws,
                ocp: r.ocp,
                unicorns: r.unicorns,
            })
            .collect();
        format_table(&rows, NO_MEMBERS)
    }

    fn viewer_line(&self, viewer: &str) -> Option<String> {
        viewer_summary(viewer_rank(&self.rows, viewer))
    }
}

impl LeagueView for GameweekTable {
    fn title(&self) -> String {
        format!("Gameweek {} table", self.gw)
    }

    fn table(&self, viewer: Option<&str>) -> String {
        let ranks: Vec<u32> = self.rows.iter().map(|r| r.rank).collect();
        let rows: Vec<GameweekDisplay> = self
            .rows
            .iter()
            .map(|r: &GameweekRow| GameweekDisplay {
                rank: rank_cell(r.rank, &ranks),
                name: name_cell(&r.name, &r.user_id, viewer),
                score: r.score,
                unicorns: r.unicorns,
            })
            .collect();
        format_table(&rows, NO_MEMBERS)
    }

    fn viewer_line(&self, viewer: &str) -> Option<String> {
        viewer_summary(viewer_rank(&self.rows, viewer))
    }
}

/// Fetch members and their rows, then derive the season table.
async fn fetch_season(source: Arc<dyn LeagueSource>, league_id: String) -> FetchResult<SeasonTable> {
    let members = source.league_members(&league_id).await?;
    let ids: Vec<String> = members.iter().map(|m| m.user_id.clone()).collect();
    let (results, picks, submissions) = futures::try_join!(
        source.results(),
        source.picks(&ids, None),
        source.submissions(&ids),
    )?;
    Ok(standings::season_table(
        &members,
        &results,
        &picks,
        &submissions,
    ))
}

/// Fetch members and their rows, then derive the table for `gw`.
async fn fetch_gameweek(
    source: Arc<dyn LeagueSource>,
    league_id: String,
    gw: u32,
) -> FetchResult<GameweekTable> {
    let members = source.league_members(&league_id).await?;
    let ids: Vec<String> = members.iter().map(|m| m.user_id.clone()).collect();
    let (results, picks) = futures::try_join!(source.results(), source.picks(&ids, Some(gw)))?;
    Ok(standings::gameweek_table(&members, &results, &picks, gw))
}

/// Run the standings command
pub async fn run(opts: &GlobalOptions, league_id: &str, gameweek: bool) -> Result<()> {
    let ctx = CommandContext::new(opts)?;
    let viewer = ctx.config.viewer(opts.viewer_ref()).ok();
    let revalidator = ctx.revalidator();
    let league = league_id.to_string();

    if gameweek {
        // "Current" is decided per viewer, so this mode needs one
        let who = ctx.config.viewer(opts.viewer_ref())?;
        let gw_key = key::current_gameweek(&who);
        let resolver = ctx.period_resolver();
        let gw = revalidator
            .get_or_fetch(
                &gw_key,
                CacheTtl::for_key(&gw_key),
                move || {
                    let resolver = Arc::clone(&resolver);
                    let who = who.clone();
                    async move { resolver.resolve(&who).await }
                },
            )
            .await?;

        let table_key = key::league_table(league_id, gw);
        let age = ctx.store.entry_age(&table_key);
        let source = Arc::clone(&ctx.source);
        let read = revalidator.read(&table_key, CacheTtl::for_key(&table_key), move || {
            fetch_gameweek(Arc::clone(&source), league.clone(), gw)
        });
        show(read, age, viewer.as_deref(), ctx.format).await
    } else {
        let season_key = key::season_table(league_id);
        let age = ctx.store.entry_age(&season_key);
        let source = Arc::clone(&ctx.source);
        let read = revalidator.read(&season_key, CacheTtl::for_key(&season_key), move || {
            fetch_season(Arc::clone(&source), league.clone())
        });
        show(read, age, viewer.as_deref(), ctx.format).await
    }
}

/// Print the cached view (if any), then react to the refresh.
///
/// A failed refresh with nothing cached is the only error; with a cached
/// copy on screen it is a warning.
async fn show<T: LeagueView>(
    read: SwrRead<T>,
    age: Option<u64>,
    viewer: Option<&str>,
    format: OutputFormat,
) -> Result<()> {
    if let Some(cached) = read.cached() {
        match format {
            OutputFormat::Table => {
                let label = format!("(cached {} ago)", format_age(age.unwrap_or(0)));
                println!("{} {}", cached.title().bold(), label.dimmed());
                print_view(cached, viewer);
            }
            OutputFormat::Json => println!("{}", format_json_cached(cached, age.unwrap_or(0))?),
        }
    }

    match read.revalidate().await {
        Refresh::Updated(fresh) => match format {
            OutputFormat::Table => {
                println!("{}", fresh.title().bold());
                print_view(&fresh, viewer);
            }
            OutputFormat::Json => println!("{}", format_json(&fresh)?),
        },
        Refresh::Unchanged => {
            if format == OutputFormat::Table {
                println!("{}", "✓ Up to date".dimmed());
            }
        }
        Refresh::Failed {
            error,
            has_fallback: true,
        } => {
            let hint = if error.is_transient() {
                "; try again shortly"
            } else {
                ""
            };
            eprintln!(
                "{}",
                format!("⚠ Could not refresh ({}); showing cached data{}", error, hint).dimmed()
            );
        }
        Refresh::Failed {
            error,
            has_fallback: false,
        } => return Err(error.into()),
    }

    Ok(())
}

fn print_view<T: LeagueView>(view: &T, viewer: Option<&str>) {
    println!("{}", view.table(viewer));
    if let Some(line) = viewer.and_then(|v| view.viewer_line(v)) {
        println!("{}", line);
    }
    println!();
}
