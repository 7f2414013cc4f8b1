//! Derived league views computed from raw rows
//!
//! Scoring rules:
//! - a pick is correct when it matches the fixture's result;
//! - a unicorn is a correct pick that no other member got, counted only
//!   when at least one other member picked that fixture;
//! - in the season table, each gameweek's members who submitted compete on
//!   (correct picks, unicorns): a sole winner takes 3 points, a shared top
//!   gives 1 point to each.
//!
//! Every ordering ends on name then user id, so output is fully
//! deterministic for a given input.

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::client::models::{GameweekPoints, LeagueMember, Outcome, Pick, ResultRow, Submission};

/// Points for an outright gameweek win
pub const WIN_POINTS: u32 = 3;
/// Points for each member sharing the gameweek top spot
pub const DRAW_POINTS: u32 = 1;

/// A row that carries a competition rank.
pub trait Ranked {
    fn rank(&self) -> u32;
    fn user_id(&self) -> &str;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameweekRow {
    pub rank: u32,
    pub user_id: String,
    pub name: String,
    /// Correct picks
    pub score: u32,
    pub unicorns: u32,
}

/// One league's table for a single gameweek.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameweekTable {
    pub gw: u32,
    pub rows: Vec<GameweekRow>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeasonRow {
    pub rank: u32,
    pub user_id: String,
    pub name: String,
    pub points: u32,
    pub wins: u32,
    pub draws: u32,
    /// Overall correct picks across all scored gameweeks
    pub ocp: u32,
    pub unicorns: u32,
}

/// One league's cumulative table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeasonTable {
    /// Last gameweek that contributed, if any
    pub through_gw: Option<u32>,
    pub rows: Vec<SeasonRow>,
}

/// Where the viewer sits in a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewerRank {
    pub rank: u32,
    /// Number of rows in the table
    pub of: usize,
    /// Another row shares the viewer's rank
    pub tied: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormRow {
    pub rank: u32,
    pub user_id: String,
    pub name: String,
    pub total: u32,
}

/// App-wide points over the last `window` gameweeks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormTable {
    pub window: u32,
    pub through_gw: u32,
    pub rows: Vec<FormRow>,
}

impl Ranked for GameweekRow {
    fn rank(&self) -> u32 {
        self.rank
    }
    fn user_id(&self) -> &str {
        &self.user_id
    }
}

impl Ranked for SeasonRow {
    fn rank(&self) -> u32 {
        self.rank
    }
    fn user_id(&self) -> &str {
        &self.user_id
    }
}

impl Ranked for FormRow {
    fn rank(&self) -> u32 {
        self.rank
    }
    fn user_id(&self) -> &str {
        &self.user_id
    }
}

/// Competition ranks ("1, 1, 3") for rows already in display order.
///
/// Adjacent rows with equal `key` share a rank; the next distinct row takes
/// its 1-based position.
pub fn rank_rows<T, K, F>(rows: &[T], key: F) -> Vec<u32>
where
    K: PartialEq,
    F: Fn(&T) -> K,
{
    let mut ranks = Vec::with_capacity(rows.len());
    let mut previous: Option<K> = None;

    for (i, row) in rows.iter().enumerate() {
        let k = key(row);
        let rank = match (&previous, ranks.last()) {
            (Some(prev), Some(&last)) if *prev == k => last,
            _ => i as u32 + 1,
        };
        ranks.push(rank);
        previous = Some(k);
    }

    ranks
}

/// Per-user (correct picks, unicorns) for one gameweek among `players`.
fn score_gameweek(
    players: &HashSet<&str>,
    outcomes: &HashMap<u32, Outcome>,
    picks: &[Pick],
    gw: u32,
) -> HashMap<String, (u32, u32)> {
    // fixture -> (pickers, correct pickers)
    let mut by_fixture: HashMap<u32, (u32, Vec<&str>)> = HashMap::new();
    let mut scores: HashMap<String, (u32, u32)> = HashMap::new();

    for pick in picks
        .iter()
        .filter(|p| p.gw == gw && players.contains(p.user_id.as_str()))
    {
        let Some(outcome) = outcomes.get(&pick.fixture_index) else {
            continue;
        };
        let entry = by_fixture.entry(pick.fixture_index).or_default();
        entry.0 += 1;
        if pick.pick == *outcome {
            entry.1.push(pick.user_id.as_str());
            scores.entry(pick.user_id.clone()).or_default().0 += 1;
        }
    }

    for (pickers, correct) in by_fixture.values() {
        if let [only] = correct.as_slice()
            && *pickers > 1
        {
            scores.entry(only.to_string()).or_default().1 += 1;
        }
    }

    scores
}

/// Outcome per fixture index for one gameweek.
fn outcomes_for(results: &[ResultRow], gw: u32) -> HashMap<u32, Outcome> {
    results
        .iter()
        .filter(|r| r.gw == gw)
        .map(|r| (r.fixture_index, r.outcome))
        .collect()
}

fn by_name(a_name: &str, a_id: &str, b_name: &str, b_id: &str) -> Ordering {
    a_name.cmp(b_name).then_with(|| a_id.cmp(b_id))
}

/// League table for gameweek `gw`.
///
/// Order: score desc, unicorns desc, name asc, user id asc.
pub fn gameweek_table(
    members: &[LeagueMember],
    results: &[ResultRow],
    picks: &[Pick],
    gw: u32,
) -> GameweekTable {
    let players: HashSet<&str> = members.iter().map(|m| m.user_id.as_str()).collect();
    let scores = score_gameweek(&players, &outcomes_for(results, gw), picks, gw);

    let mut rows: Vec<GameweekRow> = members
        .iter()
        .map(|m| {
            let (score, unicorns) = scores.get(&m.user_id).copied().unwrap_or_default();
            GameweekRow {
                rank: 0,
                user_id: m.user_id.clone(),
                name: m.name.clone(),
                score,
                unicorns,
            }
        })
        .collect();

    rows.sort_by(|a, b| {
        b.score
            .cmp(&a.score)
            .then_with(|| b.unicorns.cmp(&a.unicorns))
            .then_with(|| by_name(&a.name, &a.user_id, &b.name, &b.user_id))
    });

    let ranks = rank_rows(&rows, |r| (r.score, r.unicorns));
    for (row, rank) in rows.iter_mut().zip(ranks) {
        row.rank = rank;
    }

    GameweekTable { gw, rows }
}

/// Cumulative league table over every gameweek that has results.
///
/// Order: points desc, unicorns desc, ocp desc, name asc, user id asc.
pub fn season_table(
    members: &[LeagueMember],
    results: &[ResultRow],
    picks: &[Pick],
    submissions: &[Submission],
) -> SeasonTable {
    let mut rows: Vec<SeasonRow> = members
        .iter()
        .map(|m| SeasonRow {
            rank: 0,
            user_id: m.user_id.clone(),
            name: m.name.clone(),
            points: 0,
            wins: 0,
            draws: 0,
            ocp: 0,
            unicorns: 0,
        })
        .collect();
    let index: HashMap<String, usize> = rows
        .iter()
        .enumerate()
        .map(|(i, r)| (r.user_id.clone(), i))
        .collect();

    let gameweeks: BTreeSet<u32> = results.iter().map(|r| r.gw).collect();
    let mut through_gw = None;

    for gw in gameweeks {
        let players: HashSet<&str> = submissions
            .iter()
            .filter(|s| s.gw == gw && index.contains_key(&s.user_id))
            .map(|s| s.user_id.as_str())
            .collect();
        if players.is_empty() {
            continue;
        }
        through_gw = Some(gw);

        let scores = score_gameweek(&players, &outcomes_for(results, gw), picks, gw);
        let score_of = |user: &str| scores.get(user).copied().unwrap_or_default();

        let top = players.iter().map(|u| score_of(u)).max().unwrap_or_default();
        let winners = players.iter().filter(|u| score_of(u) == top).count();

        for user in &players {
            let (score, unicorns) = score_of(user);
            let row = &mut rows[index[*user]];
            row.ocp += score;
            row.unicorns += unicorns;
            if (score, unicorns) == top {
                if winners == 1 {
                    row.points += WIN_POINTS;
                    row.wins += 1;
                } else {
                    row.points += DRAW_POINTS;
                    row.draws += 1;
                }
            }
        }
    }

    rows.sort_by(|a, b| {
        b.points
            .cmp(&a.points)
            .then_with(|| b.unicorns.cmp(&a.unicorns))
            .then_with(|| b.ocp.cmp(&a.ocp))
            .then_with(|| by_name(&a.name, &a.user_id, &b.name, &b.user_id))
    });

    let ranks = rank_rows(&rows, |r| (r.points, r.unicorns, r.ocp));
    for (row, rank) in rows.iter_mut().zip(ranks) {
        row.rank = rank;
    }

    SeasonTable { through_gw, rows }
}

/// The viewer's position in a ranked table, or `None` if absent.
pub fn viewer_rank<R: Ranked>(rows: &[R], viewer_id: &str) -> Option<ViewerRank> {
    let mine = rows.iter().find(|r| r.user_id() == viewer_id)?;
    let rank = mine.rank();
    let sharing = rows.iter().filter(|r| r.rank() == rank).count();

    Some(ViewerRank {
        rank,
        of: rows.len(),
        tied: sharing > 1,
    })
}

/// App-wide points summed over gameweeks `current_gw - window + 1 ..= current_gw`.
///
/// Order: total desc, name asc, user id asc. A zero window covers no
/// gameweeks and yields an empty table.
pub fn form_table(points: &[GameweekPoints], current_gw: u32, window: u32) -> FormTable {
    let first_gw = current_gw.saturating_add(1).saturating_sub(window);
    let mut totals: HashMap<&str, (&str, u32)> = HashMap::new();

    for row in points
        .iter()
        .filter(|p| window > 0 && p.gw >= first_gw && p.gw <= current_gw)
    {
        totals
            .entry(row.user_id.as_str())
            .or_insert((row.name.as_str(), 0))
            .1 += row.points;
    }

    let mut rows: Vec<FormRow> = totals
        .into_iter()
        .map(|(user_id, (name, total))| FormRow {
            rank: 0,
            user_id: user_id.to_string(),
            name: name.to_string(),
            total,
        })
        .collect();

    rows.sort_by(|a, b| {
        b.total
            .cmp(&a.total)
            .then_with(|| by_name(&a.name, &a.user_id, &b.name, &b.user_id))
    });

    let ranks = rank_rows(&rows, |r| r.total);
    for (row, rank) in rows.iter_mut().zip(ranks) {
        row.rank = rank;
    }

    FormTable {
        window,
        through_gw: current_gw,
        rows,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use Outcome::{A, D, H};

    fn member(user_id: &str, name: &str) -> LeagueMember {
        LeagueMember {
            league_id: "l1".to_string(),
            user_id: user_id.to_string(),
            name: name.to_string(),
        }
    }

    fn result(gw: u32, fixture_index: u32, outcome: Outcome) -> ResultRow {
        ResultRow {
            gw,
            fixture_index,
            outcome,
        }
    }

    fn picks(user_id: &str, gw: u32, outcomes: &[Outcome]) -> Vec<Pick> {
        outcomes
            .iter()
            .enumerate()
            .map(|(i, o)| Pick {
                user_id: user_id.to_string(),
                gw,
                fixture_index: i as u32,
                pick: *o,
            })
            .collect()
    }

    fn submitted(user_id: &str, gw: u32) -> Submission {
        Submission {
            user_id: user_id.to_string(),
            gw,
            submitted_at: None,
        }
    }

    fn names<R>(rows: &[R], name: impl Fn(&R) -> &str) -> Vec<String> {
        rows.iter().map(|r| name(r).to_string()).collect()
    }

    #[test]
    fn test_rank_rows_competition_style() {
        let scores = [9, 7, 7, 4, 4, 4, 1];
        assert_eq!(rank_rows(&scores, |s| *s), vec![1, 2, 2, 4, 4, 4, 7]);
        assert!(rank_rows::<u32, u32, _>(&[], |s| *s).is_empty());
    }

    #[test]
    fn test_gameweek_table_tie_breaks_on_name() {
        let members = vec![member("z", "Zoe"), member("a", "Amy")];
        let results = vec![result(1, 0, H), result(1, 1, D), result(1, 2, A)];
        let mut all = picks("z", 1, &[H, D, H]);
        all.extend(picks("a", 1, &[H, D, H]));

        let table = gameweek_table(&members, &results, &all, 1);

        assert_eq!(names(&table.rows, |r| r.name.as_str()), vec!["Amy", "Zoe"]);
        assert_eq!(table.rows[0].score, 2);
        assert_eq!(table.rows[0].rank, 1);
        assert_eq!(table.rows[1].rank, 1);
    }

    #[test]
    fn test_gameweek_table_unicorn_breaks_score_tie() {
        let members = vec![member("a", "Amy"), member("b", "Bob"), member("c", "Cat")];
        let results = vec![result(2, 0, H), result(2, 1, A)];
        let mut all = picks("a", 2, &[H, D]);
        all.extend(picks("b", 2, &[D, A])); // only Bob got fixture 1
        all.extend(picks("c", 2, &[H, H]));

        let table = gameweek_table(&members, &results, &all, 2);

        assert_eq!(names(&table.rows, |r| r.name.as_str()), vec!["Bob", "Amy", "Cat"]);
        assert_eq!(table.rows[0].unicorns, 1);
        assert_eq!(table.rows.iter().map(|r| r.rank).collect::<Vec<_>>(), vec![1, 2, 2]);
    }

    #[test]
    fn test_sole_picker_is_not_a_unicorn() {
        let members = vec![member("a", "Amy"), member("b", "Bob")];
        let results = vec![result(1, 0, H)];
        let all = picks("a", 1, &[H]);

        let table = gameweek_table(&members, &results, &all, 1);

        assert_eq!(table.rows[0].score, 1);
        assert_eq!(table.rows[0].unicorns, 0);
    }

    #[test]
    fn test_gameweek_table_ignores_outsiders_and_other_weeks() {
        let members = vec![member("a", "Amy")];
        let results = vec![result(1, 0, H), result(2, 0, A)];
        let mut all = picks("a", 1, &[H]);
        all.extend(picks("a", 2, &[A]));
        all.extend(picks("x", 1, &[D])); // not a member

        let table = gameweek_table(&members, &results, &all, 1);

        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.rows[0].score, 1);
        assert_eq!(table.rows[0].unicorns, 0);
    }

    #[test]
    fn test_gameweek_table_deterministic_regardless_of_input_order() {
        let members = vec![member("b", "Bob"), member("a", "Amy"), member("c", "Cat")];
        let results = vec![result(1, 0, H), result(1, 1, H)];
        let mut all = picks("a", 1, &[H, A]);
        all.extend(picks("b", 1, &[H, H]));
        all.extend(picks("c", 1, &[A, A]));

        let first = gameweek_table(&members, &results, &all, 1);

        let mut reversed_members = members.clone();
        reversed_members.reverse();
        let mut reversed_picks = all.clone();
        reversed_picks.reverse();
        let second = gameweek_table(&reversed_members, &results, &reversed_picks, 1);

        assert_eq!(first, second);
    }

    #[test]
    fn test_season_table_win_and_draw_points() {
        let members = vec![member("a", "Amy"), member("b", "Bob"), member("c", "Cat")];
        let results = vec![
            result(1, 0, H),
            result(1, 1, D),
            result(2, 0, A),
            result(2, 1, A),
        ];
        let mut all = Vec::new();
        // GW1: Amy 2 correct outright
        all.extend(picks("a", 1, &[H, D]));
        all.extend(picks("b", 1, &[H, H]));
        all.extend(picks("c", 1, &[A, H]));
        // GW2: Amy and Bob share the top
        all.extend(picks("a", 2, &[A, H]));
        all.extend(picks("b", 2, &[A, H]));
        all.extend(picks("c", 2, &[H, H]));
        let subs = vec![
            submitted("a", 1),
            submitted("b", 1),
            submitted("c", 1),
            submitted("a", 2),
            submitted("b", 2),
            submitted("c", 2),
        ];

        let table = season_table(&members, &results, &all, &subs);

        assert_eq!(table.through_gw, Some(2));
        let amy = &table.rows[0];
        assert_eq!(amy.name, "Amy");
        assert_eq!((amy.points, amy.wins, amy.draws), (4, 1, 1));
        assert_eq!(amy.ocp, 3);
        let bob = &table.rows[1];
        assert_eq!((bob.points, bob.wins, bob.draws), (1, 0, 1));
        assert_eq!(table.rows[2].points, 0);
    }

    #[test]
    fn test_season_table_only_submitters_compete() {
        let members = vec![member("a", "Amy"), member("b", "Bob")];
        let results = vec![result(1, 0, H)];
        let mut all = picks("a", 1, &[A]);
        all.extend(picks("b", 1, &[H]));
        // Bob never submitted, so Amy wins on zero
        let subs = vec![submitted("a", 1)];

        let table = season_table(&members, &results, &all, &subs);

        assert_eq!(table.rows[0].name, "Amy");
        assert_eq!(table.rows[0].points, WIN_POINTS);
        assert_eq!(table.rows[1].ocp, 0);
    }

    #[test]
    fn test_season_table_tie_break_amy_before_zoe() {
        let members = vec![member("z", "Zoe"), member("a", "Amy")];
        let results = vec![result(1, 0, H), result(1, 1, A)];
        let mut all = picks("z", 1, &[H, D]);
        all.extend(picks("a", 1, &[H, D]));
        let subs = vec![submitted("z", 1), submitted("a", 1)];

        let table = season_table(&members, &results, &all, &subs);

        assert_eq!(names(&table.rows, |r| r.name.as_str()), vec!["Amy", "Zoe"]);
        assert!(table.rows.iter().all(|r| r.points == DRAW_POINTS && r.rank == 1));
    }

    #[test]
    fn test_season_table_without_results() {
        let members = vec![member("a", "Amy")];
        let table = season_table(&members, &[], &[], &[]);

        assert_eq!(table.through_gw, None);
        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.rows[0].rank, 1);
    }

    #[test]
    fn test_viewer_rank() {
        let members = vec![member("a", "Amy"), member("b", "Bob"), member("c", "Cat")];
        let results = vec![result(1, 0, H)];
        let mut all = picks("a", 1, &[H]);
        all.extend(picks("b", 1, &[H]));
        all.extend(picks("c", 1, &[A]));
        let table = gameweek_table(&members, &results, &all, 1);

        assert_eq!(
            viewer_rank(&table.rows, "b"),
            Some(ViewerRank {
                rank: 1,
                of: 3,
                tied: true
            })
        );
        assert_eq!(
            viewer_rank(&table.rows, "c"),
            Some(ViewerRank {
                rank: 3,
                of: 3,
                tied: false
            })
        );
        assert_eq!(viewer_rank(&table.rows, "nobody"), None);
    }

    fn points(user_id: &str, name: &str, gw: u32, points: u32) -> GameweekPoints {
        GameweekPoints {
            user_id: user_id.to_string(),
            name: name.to_string(),
            gw,
            points,
        }
    }

    #[test]
    fn test_form_table_window() {
        let rows = vec![
            points("a", "Amy", 1, 9), // outside a 2-week window ending at 3
            points("a", "Amy", 2, 1),
            points("a", "Amy", 3, 2),
            points("b", "Bob", 2, 4),
            points("b", "Bob", 3, 4),
            points("z", "Zoe", 3, 3),
        ];

        let form = form_table(&rows, 3, 2);

        assert_eq!((form.window, form.through_gw), (2, 3));
        assert_eq!(names(&form.rows, |r| r.name.as_str()), vec!["Bob", "Amy", "Zoe"]);
        assert_eq!(form.rows[0].total, 8);
        assert_eq!(form.rows[1].total, 3);
        assert_eq!(form.rows[2].rank, 2);
    }

    #[test]
    fn test_form_table_tie_break_amy_before_zoe() {
        let rows = vec![points("z", "Zoe", 5, 10), points("a", "Amy", 5, 10)];

        let form = form_table(&rows, 5, 5);

        assert_eq!(names(&form.rows, |r| r.name.as_str()), vec!["Amy", "Zoe"]);
    }

    #[test]
    fn test_form_table_window_larger_than_season() {
        let rows = vec![points("a", "Amy", 1, 3), points("a", "Amy", 2, 3)];
        let form = form_table(&rows, 2, 10);
        assert_eq!(form.rows[0].total, 6);
    }

    #[test]
    fn test_form_table_zero_window_is_empty() {
        let rows = vec![points("a", "Amy", 5, 3), points("b", "Bob", 4, 1)];

        let form = form_table(&rows, 5, 0);

        assert!(form.rows.is_empty());
        assert_eq!((form.window, form.through_gw), (0, 5));
    }
}
