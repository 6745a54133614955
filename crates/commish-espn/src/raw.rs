// Raw serde shapes for the ESPN fantasy football v3 league payload.
//
// Only the fields the normalizer reads are declared; everything else in the
// payload is ignored. Fields that vary by season, view set, or league privacy
// are `Option` or `#[serde(default)]`.

use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawLeague {
    #[serde(default)]
    pub id: u64,
    #[serde(default)]
    pub season_id: u16,
    #[serde(default)]
    pub members: Vec<RawMember>,
    #[serde(default)]
    pub teams: Vec<RawTeam>,
    #[serde(default)]
    pub schedule: Vec<RawMatchup>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMember {
    #[serde(default)]
    pub id: String,
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTeam {
    pub id: u32,
    /// Present on newer seasons.
    pub name: Option<String>,
    /// Older seasons split the name into location + nickname.
    pub location: Option<String>,
    pub nickname: Option<String>,
    pub abbrev: Option<String>,
    pub logo: Option<String>,
    #[serde(default)]
    pub owners: Vec<String>,
    pub primary_owner: Option<String>,
    pub record: Option<RawRecord>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawRecord {
    pub overall: Option<RawOverall>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawOverall {
    #[serde(default)]
    pub wins: u32,
    #[serde(default)]
    pub losses: u32,
    #[serde(default)]
    pub ties: u32,
    #[serde(default)]
    pub points_for: f64,
    #[serde(default)]
    pub points_against: f64,
    pub streak_type: Option<String>,
    #[serde(default)]
    pub streak_length: u32,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMatchup {
    #[serde(default)]
    pub id: u64,
    #[serde(default)]
    pub matchup_period_id: u16,
    pub home: Option<RawMatchupSide>,
    /// Missing on bye weeks.
    pub away: Option<RawMatchupSide>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMatchupSide {
    pub team_id: u32,
    pub total_points: Option<f64>,
    pub roster_for_current_scoring_period: Option<RawRoster>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawRoster {
    #[serde(default)]
    pub entries: Vec<RawRosterEntry>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawRosterEntry {
    #[serde(default)]
    pub player_id: i64,
    #[serde(default)]
    pub lineup_slot_id: u16,
    pub player_pool_entry: Option<RawPlayerPoolEntry>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawPlayerPoolEntry {
    #[serde(default)]
    pub id: i64,
    pub applied_stat_total: Option<f64>,
    pub player: Option<RawPlayer>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawPlayer {
    #[serde(default)]
    pub id: i64,
    pub full_name: Option<String>,
    pub default_position_id: Option<u16>,
    #[serde(default)]
    pub stats: Vec<RawStat>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawStat {
    pub scoring_period_id: Option<u16>,
    pub season_id: Option<u16>,
    /// 0 = actual, 1 = projected.
    pub stat_source_id: Option<u8>,
    pub applied_total: Option<f64>,
}
