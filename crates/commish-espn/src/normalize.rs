// Normalization of the raw ESPN payload into the shared domain types.
//
// This is the only place that knows about ESPN slot ids, stat sources, and
// the season-to-season differences in the team record shape.

use std::collections::{BTreeMap, HashMap};

use commish_core::model::{
    BoxScore, LineupEntry, LineupSide, TeamMeta, WeekContext, WeekData,
};
use tracing::{debug, warn};

use crate::raw::{RawLeague, RawMatchupSide, RawMember, RawRosterEntry, RawStat, RawTeam};

// ---------------------------------------------------------------------------
// ESPN id tables (football)
// ---------------------------------------------------------------------------

pub const STAT_SOURCE_ACTUAL: u8 = 0;
pub const STAT_SOURCE_PROJECTED: u8 = 1;

pub const ESPN_SLOT_BENCH: u16 = 20;
pub const ESPN_SLOT_IR: u16 = 21;

/// Lineup slot id to label.
pub fn slot_label(slot_id: u16) -> String {
    let label = match slot_id {
        0 => "QB",
        1 => "TQB",
        2 => "RB",
        3 => "RB/WR",
        4 => "WR",
        5 => "WR/TE",
        6 => "TE",
        7 => "OP",
        8 => "DT",
        9 => "DE",
        10 => "LB",
        11 => "DL",
        12 => "CB",
        13 => "S",
        14 => "DB",
        15 => "DP",
        16 => "D/ST",
        17 => "K",
        18 => "P",
        19 => "HC",
        ESPN_SLOT_BENCH => "BE",
        ESPN_SLOT_IR => "IR",
        23 => "FLEX",
        24 => "ER",
        25 => "Rookie",
        other => return format!("SLOT{other}"),
    };
    label.to_string()
}

/// Player default position id to label. Unknown ids map to an empty string
/// so the slot label is used for display instead.
pub fn position_label(position_id: u16) -> &'static str {
    match position_id {
        1 => "QB",
        2 => "RB",
        3 => "WR",
        4 => "TE",
        5 => "K",
        7 => "P",
        9 => "DT",
        10 => "DE",
        11 => "LB",
        12 => "CB",
        13 => "S",
        14 => "HC",
        16 => "D/ST",
        _ => "",
    }
}

// ---------------------------------------------------------------------------
// League → WeekData
// ---------------------------------------------------------------------------

/// Map the raw league payload into the week's normalized data.
///
/// Games are the schedule entries whose matchup period equals the requested
/// week and that have both sides (byes are skipped). Pairs and box scores
/// come from the same entries, so every paired team has a box score.
pub fn normalize_week(raw: &RawLeague, ctx: WeekContext) -> WeekData {
    let members: HashMap<&str, &RawMember> =
        raw.members.iter().map(|m| (m.id.as_str(), m)).collect();

    let teams: BTreeMap<u32, TeamMeta> = raw
        .teams
        .iter()
        .map(|t| (t.id, team_meta(t, &members)))
        .collect();

    let mut pairs = Vec::new();
    let mut box_scores = Vec::new();
    for matchup in raw
        .schedule
        .iter()
        .filter(|m| m.matchup_period_id == ctx.week)
    {
        let (Some(home), Some(away)) = (&matchup.home, &matchup.away) else {
            debug!(matchup = matchup.id, "skipping bye entry");
            continue;
        };
        pairs.push((home.team_id, away.team_id));
        box_scores.push(BoxScore {
            home: lineup_side(home, ctx),
            away: lineup_side(away, ctx),
        });
    }

    debug!(
        context = %ctx,
        teams = teams.len(),
        games = pairs.len(),
        "normalized league payload"
    );

    WeekData {
        context: ctx,
        teams,
        pairs,
        box_scores,
    }
}

fn team_meta(team: &RawTeam, members: &HashMap<&str, &RawMember>) -> TeamMeta {
    let team_name = team_name(team);
    let owner_id = team
        .primary_owner
        .as_deref()
        .or_else(|| team.owners.first().map(String::as_str));
    let owner_raw = owner_id
        .and_then(|id| members.get(id))
        .and_then(|m| m.display_name.as_deref());

    let overall = team
        .record
        .as_ref()
        .and_then(|r| r.overall.clone())
        .unwrap_or_default();

    TeamMeta {
        team_id: team.id,
        owner_name: owner_label(owner_raw, &team_name),
        logo_url: team.logo.clone().unwrap_or_default(),
        record: format_record(overall.wins, overall.losses, overall.ties),
        points_for: finite_or_zero(overall.points_for),
        points_against: finite_or_zero(overall.points_against),
        streak: format_streak(overall.streak_type.as_deref(), overall.streak_length),
        team_name,
    }
}

/// Full team name: `name` when present, else "location nickname", else the
/// abbreviation, else "Team <id>".
pub fn team_name(team: &RawTeam) -> String {
    if let Some(name) = team.name.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
        return name.to_string();
    }
    let joined = [team.location.as_deref(), team.nickname.as_deref()]
        .iter()
        .flatten()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    if !joined.is_empty() {
        return joined;
    }
    match team.abbrev.as_deref().map(str::trim).filter(|a| !a.is_empty()) {
        Some(abbrev) => abbrev.to_string(),
        None => format!("Team {}", team.id),
    }
}

/// Human-friendly owner label. Abbreviation-like names (3 chars or fewer,
/// or all-caps up to 5 chars) are replaced with "Coach of <team>".
pub fn owner_label(raw: Option<&str>, team_name: &str) -> String {
    if let Some(label) = raw.map(str::trim).filter(|l| !l.is_empty()) {
        let len = label.chars().count();
        let all_caps = label.chars().any(char::is_alphabetic)
            && label
                .chars()
                .filter(|c| c.is_alphabetic())
                .all(char::is_uppercase);
        if !(len <= 3 || (all_caps && len <= 5)) {
            return label.to_string();
        }
    }
    format!("Coach of {team_name}")
}

/// "W-L", with "-T" appended only when there are ties.
pub fn format_record(wins: u32, losses: u32, ties: u32) -> String {
    if ties > 0 {
        format!("{wins}-{losses}-{ties}")
    } else {
        format!("{wins}-{losses}")
    }
}

pub fn format_streak(kind: Option<&str>, length: u32) -> String {
    let kind = kind.map(str::trim).filter(|k| !k.is_empty()).unwrap_or("NONE");
    format!("{} {length}", kind.to_uppercase())
}

fn finite_or_zero(v: f64) -> f64 {
    if v.is_finite() {
        v
    } else {
        0.0
    }
}

fn lineup_side(side: &RawMatchupSide, ctx: WeekContext) -> LineupSide {
    let lineup = side
        .roster_for_current_scoring_period
        .as_ref()
        .map(|r| r.entries.iter().map(|e| lineup_entry(e, ctx)).collect())
        .unwrap_or_default();
    LineupSide {
        team_id: side.team_id,
        score: side.total_points.filter(|p| p.is_finite()),
        lineup,
    }
}

fn lineup_entry(entry: &RawRosterEntry, ctx: WeekContext) -> LineupEntry {
    let pool = entry.player_pool_entry.as_ref();
    let player = pool.and_then(|p| p.player.as_ref());

    let player_id = player
        .map(|p| p.id)
        .filter(|id| *id != 0)
        .or_else(|| pool.map(|p| p.id).filter(|id| *id != 0))
        .unwrap_or(entry.player_id);

    let name = player
        .and_then(|p| p.full_name.clone())
        .unwrap_or_else(|| "Player".to_string());

    let stats: &[RawStat] = player.map(|p| p.stats.as_slice()).unwrap_or_default();
    let projected_points = week_stat(stats, ctx, STAT_SOURCE_PROJECTED);
    let actual_points = week_stat(stats, ctx, STAT_SOURCE_ACTUAL)
        .or_else(|| pool.and_then(|p| p.applied_stat_total));

    if projected_points.is_none() {
        debug!(player = %name, "no projection for week");
    }

    LineupEntry {
        player_id: player_id.to_string(),
        name,
        slot: slot_label(entry.lineup_slot_id),
        position: player
            .and_then(|p| p.default_position_id)
            .map(|id| position_label(id).to_string())
            .unwrap_or_default(),
        projected_points,
        actual_points,
    }
}

/// The applied total for `source` in the requested week. Stats tagged with a
/// different season are ignored; untagged ones are accepted.
fn week_stat(stats: &[RawStat], ctx: WeekContext, source: u8) -> Option<f64> {
    let value = stats
        .iter()
        .find(|s| {
            s.stat_source_id == Some(source)
                && s.scoring_period_id == Some(ctx.week)
                && s.season_id.map_or(true, |season| season == ctx.year)
        })
        .and_then(|s| s.applied_total)?;
    if value.is_finite() {
        Some(value)
    } else {
        warn!("ignoring non-finite stat value");
        None
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
