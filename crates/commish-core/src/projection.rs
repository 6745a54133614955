// Starter projection builder.
//
// Sums projected points over a team's starting lineup for one week and ranks
// the starters. Bench rows never contribute to the total or the ranking.

use std::cmp::Ordering;

use tracing::{debug, warn};

use crate::error::CoreError;
use crate::model::{round2, PlayerProjection, StarterRule, TeamWeekProjection, WeekData};

/// How many starters are kept in `top_players`.
pub const TOP_PLAYERS: usize = 4;

/// Build the starter-only projection for `team_id`.
///
/// The first box score containing the team is used. Rows without a
/// projection are skipped, as are rows whose slot is not a starter under
/// `rule`. Starters are stable-sorted by projected points (descending) so
/// exact ties keep lineup order.
pub fn build_team_projection(
    week: &WeekData,
    team_id: u32,
    rule: StarterRule,
) -> Result<TeamWeekProjection, CoreError> {
    let meta = week
        .teams
        .get(&team_id)
        .ok_or(CoreError::UnknownTeam { team_id })?;

    let side = week
        .box_scores
        .iter()
        .find_map(|bx| bx.side_for(team_id))
        .ok_or(CoreError::TeamNotInBoxScores {
            team_id,
            week: week.context.week,
        })?;

    let mut total = 0.0;
    let mut starters: Vec<PlayerProjection> = Vec::new();

    for entry in &side.lineup {
        let Some(points) = entry.projected_points else {
            continue;
        };
        if !points.is_finite() {
            warn!(player = %entry.name, "skipping non-finite projection");
            continue;
        }
        if !rule.is_starter(&entry.slot) {
            continue;
        }
        total += points;
        starters.push(PlayerProjection {
            player_id: entry.player_id.clone(),
            name: entry.name.clone(),
            position: entry.display_position().to_string(),
            projected_points: points,
            is_starter: true,
        });
    }

    starters.sort_by(|a, b| {
        b.projected_points
            .partial_cmp(&a.projected_points)
            .unwrap_or(Ordering::Equal)
    });
    starters.truncate(TOP_PLAYERS);

    let projected_points = round2(total);
    debug!(
        team_id,
        team = %meta.team_name,
        projected_points,
        "built starter projection"
    );

    Ok(TeamWeekProjection {
        team_id,
        team_name: meta.team_name.clone(),
        projected_points,
        top_players: starters,
        meta: meta.clone(),
    })
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
