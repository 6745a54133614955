// Normalized domain types shared by every stage of the weekly pipeline.
//
// The fetch layer maps the upstream league payload into these types exactly
// once; everything downstream works against this single stable contract.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ---------------------------------------------------------------------------
// Slot constants
// ---------------------------------------------------------------------------

/// Lineup slot label for bench players.
pub const BENCH_SLOT: &str = "BE";

/// Lineup slot label for injured reserve.
pub const RESERVE_SLOT: &str = "IR";

// ---------------------------------------------------------------------------
// Request identity
// ---------------------------------------------------------------------------

/// Identifies one (league, season, week) request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WeekContext {
    pub league_id: u64,
    pub year: u16,
    pub week: u16,
}

impl WeekContext {
    pub fn new(league_id: u64, year: u16, week: u16) -> Self {
        Self {
            league_id,
            year,
            week,
        }
    }
}

impl fmt::Display for WeekContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "league {} season {} week {}",
            self.league_id, self.year, self.week
        )
    }
}

// ---------------------------------------------------------------------------
// Starter classification
// ---------------------------------------------------------------------------

/// Which lineup slots count as starters.
///
/// `BenchOnly` treats every slot other than the bench as a starter, including
/// injured reserve. `BenchAndReserve` also excludes injured reserve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StarterRule {
    #[default]
    BenchOnly,
    BenchAndReserve,
}

impl StarterRule {
    /// Classify a slot label. Comparison is case-insensitive and accepts the
    /// long forms ("Bench") used by some upstream payloads.
    pub fn is_starter(self, slot: &str) -> bool {
        let slot = slot.trim();
        if is_bench_label(slot) {
            return false;
        }
        match self {
            StarterRule::BenchOnly => true,
            StarterRule::BenchAndReserve => !is_reserve_label(slot),
        }
    }
}

fn is_bench_label(slot: &str) -> bool {
    ["BE", "BN", "BENCH"]
        .iter()
        .any(|label| slot.eq_ignore_ascii_case(label))
}

fn is_reserve_label(slot: &str) -> bool {
    ["IR", "IL", "INJURED RESERVE"]
        .iter()
        .any(|label| slot.eq_ignore_ascii_case(label))
}

// ---------------------------------------------------------------------------
// League snapshot
// ---------------------------------------------------------------------------

/// Identity and season record for one fantasy team.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamMeta {
    pub team_id: u32,
    pub team_name: String,
    pub owner_name: String,
    pub logo_url: String,
    /// "W-L", or "W-L-T" when the team has ties.
    pub record: String,
    pub points_for: f64,
    pub points_against: f64,
    /// "<TYPE> <length>", e.g. "WIN 3".
    pub streak: String,
}

/// One roster row in a week's lineup, as normalized from upstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineupEntry {
    pub player_id: String,
    pub name: String,
    /// Lineup slot label ("QB", "FLEX", "BE", "IR", ...).
    pub slot: String,
    /// The player's natural position, empty when upstream omits it.
    pub position: String,
    pub projected_points: Option<f64>,
    pub actual_points: Option<f64>,
}

impl LineupEntry {
    /// Position label for display: the natural position when known,
    /// otherwise the slot label.
    pub fn display_position(&self) -> &str {
        if self.position.is_empty() {
            &self.slot
        } else {
            &self.position
        }
    }
}

/// One side of a box score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineupSide {
    pub team_id: u32,
    pub score: Option<f64>,
    pub lineup: Vec<LineupEntry>,
}

/// One game for the week with both teams' lineups.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoxScore {
    pub home: LineupSide,
    pub away: LineupSide,
}

impl BoxScore {
    /// Return the side belonging to `team_id`, checking home first.
    pub fn side_for(&self, team_id: u32) -> Option<&LineupSide> {
        if self.home.team_id == team_id {
            Some(&self.home)
        } else if self.away.team_id == team_id {
            Some(&self.away)
        } else {
            None
        }
    }
}

/// Everything fetched for one (league, season, week).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeekData {
    pub context: WeekContext,
    pub teams: BTreeMap<u32, TeamMeta>,
    /// (home team id, away team id) per game, in upstream order.
    pub pairs: Vec<(u32, u32)>,
    pub box_scores: Vec<BoxScore>,
}

// ---------------------------------------------------------------------------
// Projections
// ---------------------------------------------------------------------------

/// One player's projection for the week.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerProjection {
    pub player_id: String,
    pub name: String,
    pub position: String,
    pub projected_points: f64,
    pub is_starter: bool,
}

/// Starter-only projection summary for one team in one week.
#[derive(Debug, Clone, PartialEq)]
pub struct TeamWeekProjection {
    pub team_id: u32,
    pub team_name: String,
    /// Sum over starters, rounded to 2 decimals.
    pub projected_points: f64,
    /// Highest projected starters, non-increasing by points.
    pub top_players: Vec<PlayerProjection>,
    pub meta: TeamMeta,
}

// ---------------------------------------------------------------------------
// Generated fragments
// ---------------------------------------------------------------------------

/// Narrative pieces for one matchup, keyed by (home_team, away_team).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationFragment {
    pub home_team: String,
    pub away_team: String,
    pub home_quote: String,
    pub away_quote: String,
    pub closer: String,
}

impl GenerationFragment {
    pub fn matches(&self, home_team: &str, away_team: &str) -> bool {
        self.home_team == home_team && self.away_team == away_team
    }
}

/// Canonical attribution appended to every quote.
pub fn attribution(team: &str) -> String {
    format!("The {team} coach says.")
}

/// Wrap bare quote text in the canonical template:
/// `"<text>," The <Team> coach says.`
pub fn attributed_quote(text: &str, team: &str) -> String {
    format!("\"{text},\" {}", attribution(team))
}

// ---------------------------------------------------------------------------
// Output document
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Preview,
    Recap,
}

impl DocumentKind {
    pub fn label(self) -> &'static str {
        match self {
            DocumentKind::Preview => "preview",
            DocumentKind::Recap => "recap",
        }
    }
}

/// The final markdown document for one request.
#[derive(Debug, Clone, PartialEq)]
pub struct WeeklyDocument {
    pub kind: DocumentKind,
    pub context: WeekContext,
    pub markdown: String,
    /// True when any generated fragment was replaced by local fallback text.
    pub used_fallback: bool,
}

impl WeeklyDocument {
    /// Download file name, e.g. `weekly_preview_12345_2024_w3.md`.
    pub fn file_name(&self) -> String {
        format!(
            "weekly_{}_{}_{}_w{}.md",
            self.kind.label(),
            self.context.league_id,
            self.context.year,
            self.context.week
        )
    }
}

// ---------------------------------------------------------------------------
// Rounding helpers
// ---------------------------------------------------------------------------

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
