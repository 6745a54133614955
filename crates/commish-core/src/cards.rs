// Matchup card assembly.
//
// Pairs two starter projections per game, computes the favorite and edge,
// and flags the week's featured matchup (highest combined starter total).
// Also builds the final-score results used by recaps.

use std::fmt;

use tracing::{debug, info};

use crate::error::CoreError;
use crate::model::{round1, round2, StarterRule, TeamWeekProjection, WeekData};
use crate::projection::build_team_projection;

/// Label used whenever the edge is zero.
pub const PICK_EM: &str = "Pick'em";

// ---------------------------------------------------------------------------
// Card types
// ---------------------------------------------------------------------------

/// A starter as shown on a card: points rounded to one decimal.
#[derive(Debug, Clone, PartialEq)]
pub struct StarterLine {
    pub name: String,
    pub position: String,
    pub points: f64,
}

/// One team's half of a matchup card.
#[derive(Debug, Clone, PartialEq)]
pub struct CardSide {
    pub team_id: u32,
    pub team_name: String,
    pub owner_name: String,
    pub record: String,
    pub streak: String,
    pub top_players: Vec<StarterLine>,
    /// Starter total; used for edge math, never rendered.
    pub(crate) projected_total: f64,
}

impl CardSide {
    fn from_projection(proj: &TeamWeekProjection) -> Self {
        Self {
            team_id: proj.team_id,
            team_name: proj.team_name.clone(),
            owner_name: proj.meta.owner_name.clone(),
            record: proj.meta.record.clone(),
            streak: proj.meta.streak.clone(),
            top_players: proj
                .top_players
                .iter()
                .map(|p| StarterLine {
                    name: p.name.clone(),
                    position: p.position.clone(),
                    points: round1(p.projected_points),
                })
                .collect(),
            projected_total: proj.projected_points,
        }
    }

    /// The highest projected starter, if any.
    pub fn headliner(&self) -> Option<&StarterLine> {
        self.top_players.first()
    }
}

/// Who the projections favor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Favorite {
    Team(String),
    PickEm,
}

impl Favorite {
    pub fn label(&self) -> &str {
        match self {
            Favorite::Team(name) => name,
            Favorite::PickEm => PICK_EM,
        }
    }

    pub fn is_pick_em(&self) -> bool {
        matches!(self, Favorite::PickEm)
    }
}

impl fmt::Display for Favorite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One game for the week.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchupCard {
    pub home: CardSide,
    pub away: CardSide,
    pub favorite: Favorite,
    /// Absolute starter-total difference, 2 decimals.
    pub edge: f64,
    /// Home + away starter totals; only ranks the featured card.
    pub(crate) combined: f64,
    pub is_featured: bool,
}

impl MatchupCard {
    fn from_projections(home: &TeamWeekProjection, away: &TeamWeekProjection) -> Self {
        let margin = round2(home.projected_points - away.projected_points);
        let edge = margin.abs();
        let favorite = if edge == 0.0 {
            Favorite::PickEm
        } else if margin > 0.0 {
            Favorite::Team(home.team_name.clone())
        } else {
            Favorite::Team(away.team_name.clone())
        };
        Self {
            home: CardSide::from_projection(home),
            away: CardSide::from_projection(away),
            favorite,
            edge,
            combined: round2(home.projected_points + away.projected_points),
            is_featured: false,
        }
    }

    /// (home team, away team) key used to match generated fragments.
    pub fn key(&self) -> (&str, &str) {
        (&self.home.team_name, &self.away.team_name)
    }
}

// ---------------------------------------------------------------------------
// Assembly
// ---------------------------------------------------------------------------

/// Build one card per pair in `week.pairs`, flagging exactly one as featured.
///
/// An empty pair list (bye week, off week, bad week number) yields an empty
/// vec, which callers render as "nothing found".
pub fn assemble_cards(week: &WeekData, rule: StarterRule) -> Result<Vec<MatchupCard>, CoreError> {
    let mut cards = Vec::with_capacity(week.pairs.len());
    for &(home_id, away_id) in &week.pairs {
        let home = build_team_projection(week, home_id, rule)?;
        let away = build_team_projection(week, away_id, rule)?;
        cards.push(MatchupCard::from_projections(&home, &away));
    }

    if let Some(idx) = featured_index(&cards) {
        cards[idx].is_featured = true;
        info!(
            context = %week.context,
            cards = cards.len(),
            featured = %cards[idx].home.team_name,
            "assembled matchup cards"
        );
    } else {
        info!(context = %week.context, "no matchups for week");
    }

    Ok(cards)
}

/// Index of the card with the highest combined total; first occurrence wins.
fn featured_index(cards: &[MatchupCard]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, card) in cards.iter().enumerate() {
        match best {
            Some((_, top)) if card.combined <= top => {}
            _ => best = Some((i, card.combined)),
        }
    }
    best.map(|(i, _)| i)
}

/// Cards in display order: featured first, the rest in fetch order.
pub fn display_order(cards: &[MatchupCard]) -> Vec<&MatchupCard> {
    let mut ordered: Vec<&MatchupCard> = cards.iter().filter(|c| c.is_featured).collect();
    ordered.extend(cards.iter().filter(|c| !c.is_featured));
    ordered
}

// ---------------------------------------------------------------------------
// Recap results
// ---------------------------------------------------------------------------

/// A starter's actual output for the week.
#[derive(Debug, Clone, PartialEq)]
pub struct StatLine {
    pub name: String,
    pub slot: String,
    pub points: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResultSide {
    pub team_id: u32,
    pub team_name: String,
    pub record: String,
    pub score: f64,
    pub starters: Vec<StatLine>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Winner {
    Team(String),
    Tie,
}

impl Winner {
    pub fn label(&self) -> &str {
        match self {
            Winner::Team(name) => name,
            Winner::Tie => "Tie",
        }
    }
}

/// Final (or in-progress) score for one game.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchupResult {
    pub home: ResultSide,
    pub away: ResultSide,
    /// Home score minus away score, 2 decimals.
    pub margin: f64,
    pub winner: Winner,
}

impl MatchupResult {
    pub fn involves(&self, team_id: u32) -> bool {
        self.home.team_id == team_id || self.away.team_id == team_id
    }
}

/// Build one result per pair with starters' actual points.
///
/// Starters without an actual score count as zero; the team score falls back
/// to the starters' sum when upstream omits it.
pub fn assemble_results(
    week: &WeekData,
    rule: StarterRule,
) -> Result<Vec<MatchupResult>, CoreError> {
    let mut results = Vec::with_capacity(week.pairs.len());
    for &(home_id, away_id) in &week.pairs {
        let home = result_side(week, home_id, rule)?;
        let away = result_side(week, away_id, rule)?;
        let margin = round2(home.score - away.score);
        let winner = if margin > 0.0 {
            Winner::Team(home.team_name.clone())
        } else if margin < 0.0 {
            Winner::Team(away.team_name.clone())
        } else {
            Winner::Tie
        };
        results.push(MatchupResult {
            home,
            away,
            margin,
            winner,
        });
    }
    debug!(context = %week.context, results = results.len(), "assembled results");
    Ok(results)
}

fn result_side(week: &WeekData, team_id: u32, rule: StarterRule) -> Result<ResultSide, CoreError> {
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

    let starters: Vec<StatLine> = side
        .lineup
        .iter()
        .filter(|e| rule.is_starter(&e.slot))
        .map(|e| StatLine {
            name: e.name.clone(),
            slot: e.slot.clone(),
            points: round2(e.actual_points.filter(|p| p.is_finite()).unwrap_or(0.0)),
        })
        .collect();

    let score = match side.score {
        Some(s) if s.is_finite() => round2(s),
        _ => round2(starters.iter().map(|s| s.points).sum()),
    };

    Ok(ResultSide {
        team_id,
        team_name: meta.team_name.clone(),
        record: meta.record.clone(),
        score,
        starters,
    })
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
