// Errors raised while shaping fetched week data.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoreError {
    /// The team appears in the week's pairings but in none of its box scores.
    #[error("team {team_id} not found in any box score for week {week}")]
    TeamNotInBoxScores { team_id: u32, week: u16 },

    /// The team id has no metadata record in the league snapshot.
    #[error("team {team_id} has no metadata in the league snapshot")]
    UnknownTeam { team_id: u32 },
}
