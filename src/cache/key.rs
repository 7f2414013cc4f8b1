//! Cache key construction
//!
//! Keys read as `<category>:<param>:<param>`. Parameters are positional, so
//! every key family has a constructor below that fixes their order.
//! A `:` inside a parameter is percent-encoded so it cannot shift the
//! positions of the ones after it.

use super::Category;

/// Build a deterministic key from a category and its identifying parameters.
pub fn cache_key(category: Category, params: &[&str]) -> String {
    let mut key = String::from(category.tag());
    for param in params {
        key.push(':');
        push_escaped(&mut key, param);
    }
    key
}

fn push_escaped(key: &mut String, param: &str) {
    for c in param.chars() {
        match c {
            '%' => key.push_str("%25"),
            ':' => key.push_str("%3A"),
            c => key.push(c),
        }
    }
}

/// Prefix matching every key of a category scoped by the leading params.
///
/// `key_prefix(Category::LeagueTable, &["L1"])` matches `league-table:L1:*`.
pub fn key_prefix(category: Category, params: &[&str]) -> String {
    let mut prefix = cache_key(category, params);
    prefix.push(':');
    prefix
}

/// Gameweek the resolver picked for this viewer
pub fn current_gameweek(viewer_id: &str) -> String {
    cache_key(Category::CurrentGameweek, &[viewer_id])
}

pub fn memberships(viewer_id: &str) -> String {
    cache_key(Category::Memberships, &[viewer_id])
}

pub fn league_members(league_id: &str) -> String {
    cache_key(Category::LeagueMembers, &[league_id])
}

pub fn fixtures(gw: u32) -> String {
    cache_key(Category::Fixtures, &[&gw.to_string()])
}

pub fn results() -> String {
    cache_key(Category::Results, &[])
}

pub fn viewer_picks(viewer_id: &str, gw: u32) -> String {
    cache_key(Category::ViewerPicks, &[viewer_id, &gw.to_string()])
}

/// Picks of every member of a league, all gameweeks
pub fn league_picks(league_id: &str) -> String {
    cache_key(Category::LeaguePicks, &[league_id])
}

pub fn submissions(league_id: &str) -> String {
    cache_key(Category::Submissions, &[league_id])
}

pub fn league_table(league_id: &str, gw: u32) -> String {
    cache_key(Category::LeagueTable, &[league_id, &gw.to_string()])
}

pub fn season_table(league_id: &str) -> String {
    cache_key(Category::SeasonTable, &[league_id])
}

pub fn viewer_rank(league_id: &str, gw: u32, viewer_id: &str) -> String {
    cache_key(
        Category::ViewerRank,
        &[league_id, &gw.to_string(), viewer_id],
    )
}

pub fn form(window: u32, gw: u32) -> String {
    cache_key(Category::Form, &[&window.to_string(), &gw.to_string()])
}

pub fn overall_standings() -> String {
    cache_key(Category::OverallStandings, &[])
}

pub fn gameweek_points() -> String {
    cache_key(Category::GameweekPoints, &[])
}

pub fn chat_backlog(league_id: &str) -> String {
    cache_key(Category::ChatBacklog, &[league_id])
}
