//! Local cache for league data
//!
//! A TTL-enveloped key-value store over a pluggable storage medium (SQLite on
//! disk by default). Prewarm writes into it; readers take values out
//! synchronously and refresh in the background.

pub mod clock;
pub mod key;
pub mod medium;
pub mod policy;
pub mod store;

use std::time::Duration;

/// Data categories, each with its own volatility and therefore its own TTL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    CurrentGameweek,
    Memberships,
    LeagueMembers,
    Fixtures,
    Results,
    ViewerPicks,
    LeaguePicks,
    Submissions,
    LeagueTable,
    SeasonTable,
    ViewerRank,
    Form,
    OverallStandings,
    GameweekPoints,
    ChatBacklog,
}

impl Category {
    pub const ALL: [Category; 15] = [
        Category::CurrentGameweek,
        Category::Memberships,
        Category::LeagueMembers,
        Category::Fixtures,
        Category::Results,
        Category::ViewerPicks,
        Category::LeaguePicks,
        Category::Submissions,
        Category::LeagueTable,
        Category::SeasonTable,
        Category::ViewerRank,
        Category::Form,
        Category::OverallStandings,
        Category::GameweekPoints,
        Category::ChatBacklog,
    ];

    /// Key prefix for this category
    pub fn tag(self) -> &'static str {
        match self {
            Category::CurrentGameweek => "gw-current",
            Category::Memberships => "memberships",
            Category::LeagueMembers => "league-members",
            Category::Fixtures => "fixtures",
            Category::Results => "results",
            Category::ViewerPicks => "picks",
            Category::LeaguePicks => "league-picks",
            Category::Submissions => "submissions",
            Category::LeagueTable => "league-table",
            Category::SeasonTable => "season-table",
            Category::ViewerRank => "viewer-rank",
            Category::Form => "form",
            Category::OverallStandings => "overall",
            Category::GameweekPoints => "gw-points",
            Category::ChatBacklog => "chat",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Category> {
        Category::ALL.into_iter().find(|c| c.tag() == tag)
    }

    /// Time-to-live for entries of this category
    pub fn ttl(self) -> Duration {
        match self {
            // In-progress state - seconds
            Category::ChatBacklog => Duration::from_secs(30),
            Category::CurrentGameweek => Duration::from_secs(60),

            // Results land during a gameweek
            Category::Results => Duration::from_secs(2 * 60),

            // Per-gameweek data - minutes
            Category::ViewerPicks => Duration::from_secs(5 * 60),
            Category::LeaguePicks => Duration::from_secs(5 * 60),
            Category::Submissions => Duration::from_secs(5 * 60),
            Category::LeagueTable => Duration::from_secs(5 * 60),
            Category::ViewerRank => Duration::from_secs(5 * 60),
            Category::Memberships => Duration::from_secs(10 * 60),
            Category::LeagueMembers => Duration::from_secs(10 * 60),
            Category::Fixtures => Duration::from_secs(15 * 60),

            // Season aggregates
            Category::SeasonTable => Duration::from_secs(30 * 60),
            Category::Form => Duration::from_secs(30 * 60),
            Category::OverallStandings => Duration::from_secs(30 * 60),
            Category::GameweekPoints => Duration::from_secs(30 * 60),
        }
    }
}

/// TTL lookup for raw keys
pub struct CacheTtl;

impl CacheTtl {
    /// Used for keys whose prefix names no known category.
    pub const FALLBACK: Duration = Duration::from_secs(30);

    pub fn for_key(key: &str) -> Duration {
        let tag = key.split(':').next().unwrap_or_default();
        Category::from_tag(tag)
            .map(Category::ttl)
            .unwrap_or(Self::FALLBACK)
    }
}

pub use medium::{MemoryMedium, SqliteMedium};
pub use store::CacheStore;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tags_round_trip() {
        for category in Category::ALL {
            assert_eq!(Category::from_tag(category.tag()), Some(category));
        }
    }

    #[test]
    fn test_tags_unique() {
        let mut tags: Vec<_> = Category::ALL.iter().map(|c| c.tag()).collect();
        tags.sort_unstable();
        tags.dedup();
        assert_eq!(tags.len(), Category::ALL.len());
    }

    #[test]
    fn test_every_category_expires() {
        for category in Category::ALL {
            let ttl = category.ttl();
            assert!(ttl > Duration::ZERO);
            assert!(ttl <= Duration::from_secs(60 * 60));
        }
    }

    #[test]
    fn test_volatile_data_shorter_than_aggregates() {
        assert!(Category::ChatBacklog.ttl() < Category::Fixtures.ttl());
        assert!(Category::Fixtures.ttl() < Category::SeasonTable.ttl());
    }

    #[test]
    fn test_ttl_for_key() {
        assert_eq!(
            CacheTtl::for_key(&key::season_table("l1")),
            Category::SeasonTable.ttl()
        );
        assert_eq!(CacheTtl::for_key("gw-current"), Category::CurrentGameweek.ttl());
        assert_eq!(CacheTtl::for_key("mystery:1"), CacheTtl::FALLBACK);
        assert_eq!(CacheTtl::for_key(""), CacheTtl::FALLBACK);
    }
}
