// Prompt templates for weekly previews and recaps.
//
// Each request pairs fixed system instructions (voice plus ground rules) with
// a compact JSON payload that fully describes the week. Team point totals are
// never included; the model only sees per-player figures, the favorite, and
// the edge.

use commish_core::cards::{CardSide, MatchupCard, MatchupResult, ResultSide};
use commish_core::model::WeekContext;
use serde_json::{json, Value};

use crate::generator::{GenerationParams, GenerationRequest};
use crate::seed::stable_index;

/// Upper bound on quote length requested from the model.
pub const QUOTE_MAX_WORDS: usize = 25;

// ---------------------------------------------------------------------------
// Personas
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Persona {
    pub name: &'static str,
    pub voice: &'static str,
}

pub static PERSONAS: [Persona; 5] = [
    Persona {
        name: "The Commissioner",
        voice: "a witty league commissioner who loves a playful pun and a bold headline",
    },
    Persona {
        name: "The Beat Writer",
        voice: "a sharp, insightful fantasy football beat writer with a dry sense of humor",
    },
    Persona {
        name: "The Radio Host",
        voice: "a high-energy sports radio host who talks in short punchy bursts",
    },
    Persona {
        name: "The Film Room Analyst",
        voice: "a calm film-room analyst who finds the one matchup detail that matters",
    },
    Persona {
        name: "The Hype Announcer",
        voice: "a stadium hype announcer who brings big energy and tasteful emojis",
    },
];

/// Pick the week's persona from a stable hash of (league, year, week).
pub fn select_persona(ctx: &WeekContext) -> &'static Persona {
    let key = format!("{}:{}:{}", ctx.league_id, ctx.year, ctx.week);
    &PERSONAS[stable_index(&key, "persona", PERSONAS.len())]
}

// ---------------------------------------------------------------------------
// System prompt
// ---------------------------------------------------------------------------

const GROUND_RULES: &str = "Ground rules:\n\
- Use ONLY the facts in the JSON payload. Never invent statistics, injuries, trades, or past meetings between these teams.\n\
- Never name a real person who is not in the payload. Quotes come from a team's coach, never from a named individual.\n\
- Keep it league-safe: no profanity, no slurs, no insults aimed at real people.\n\
- Always use full team names, never abbreviations.\n\
- Do not state or estimate team point totals; use the individual player figures and the edge provided.";

fn system_prompt(persona: &Persona, task: &str, length: &str) -> String {
    let mut s = String::with_capacity(1024);
    s.push_str(&format!(
        "You are {}, {}, writing for a fantasy football league.\n\n",
        persona.name, persona.voice
    ));
    s.push_str(task);
    s.push_str("\n\n");
    s.push_str(GROUND_RULES);
    s.push_str("\n- ");
    s.push_str(length);
    s
}

// ---------------------------------------------------------------------------
// Payload helpers
// ---------------------------------------------------------------------------

fn side_payload(side: &CardSide) -> Value {
    json!({
        "team": side.team_name,
        "record": side.record,
        "streak": side.streak,
        "top_starters": side
            .top_players
            .iter()
            .map(|p| json!({ "name": p.name, "position": p.position, "points": p.points }))
            .collect::<Vec<_>>(),
    })
}

fn card_payload(card: &MatchupCard) -> Value {
    json!({
        "home_team": card.home.team_name,
        "away_team": card.away.team_name,
        "featured": card.is_featured,
        "favorite": card.favorite.label(),
        "edge": card.edge,
        "home": side_payload(&card.home),
        "away": side_payload(&card.away),
    })
}

fn week_payload(ctx: &WeekContext, cards: &[MatchupCard]) -> Value {
    json!({
        "league_id": ctx.league_id,
        "season": ctx.year,
        "week": ctx.week,
        "matchups": cards.iter().map(card_payload).collect::<Vec<_>>(),
    })
}

// ---------------------------------------------------------------------------
// Quotes and closers
// ---------------------------------------------------------------------------

/// Request one pre-game quote per side and a closer per matchup, as JSON.
pub fn build_quotes_request(
    ctx: &WeekContext,
    cards: &[MatchupCard],
    persona: &Persona,
    params: GenerationParams,
) -> GenerationRequest {
    let task = format!(
        "For every matchup in the payload write: one short pre-game quote from the home team's coach, \
         one from the away team's coach, and a one-sentence closer that hypes the game. \
         Quotes sound like realistic coach lines (focus, execution, respect for the opponent), \
         at most {QUOTE_MAX_WORDS} words each, and the two quotes in a matchup must differ. \
         Write the quote text only: no quotation marks and no attribution such as \"coach says\".\n\n\
         Reply with JSON only, no prose and no code fences: an array with one object per matchup, \
         using the exact team names from the payload:\n\
         [{{\"home_team\": \"...\", \"away_team\": \"...\", \"home_quote\": \"...\", \"away_quote\": \"...\", \"closer\": \"...\"}}]"
    );
    let system = system_prompt(
        persona,
        &task,
        "Keep every quote and closer to a single sentence.",
    );

    let user = json!({
        "instructions": "Write quotes and closers for each matchup.",
        "data": week_payload(ctx, cards),
    });

    GenerationRequest {
        system,
        user: user.to_string(),
        params,
    }
}

// ---------------------------------------------------------------------------
// Freeform preview document
// ---------------------------------------------------------------------------

/// Request a complete markdown preview for the week.
pub fn build_preview_request(
    ctx: &WeekContext,
    cards: &[MatchupCard],
    persona: &Persona,
    projection_source: &str,
    params: GenerationParams,
) -> GenerationRequest {
    let task = format!(
        "Write a markdown WEEKLY PREVIEW for week {} covering every matchup in the payload. \
         Start with the featured matchup under a \"## \u{2b50} Matchup of the Week\" heading.\n\
         For each matchup:\n\
         - A \"### <Home> (<record>) vs <Away> (<record>)\" heading.\n\
         - An edge line: \"**Edge:** <favorite> by <edge>\", or \"**Edge:** Pick'em\" when the edge is 0.\n\
         - One short paragraph per team that begins \"Based on projections from {projection_source}, <Team> leans on <headliner>...\" \
         and names players only from top_starters, with their points in bold.\n\
         - One quote per team attributed exactly as: \"<quote>,\" The <Team> coach says.\n\
         - A one-line closer. No invented history.",
        ctx.week
    );
    let system = system_prompt(
        persona,
        &task,
        "Keep paragraphs compact and easy to scan; the whole document stays under 900 words.",
    );

    let mut data = week_payload(ctx, cards);
    data["projection_source"] = Value::String(projection_source.to_string());
    let user = json!({
        "instructions": "Generate the markdown preview using the format and rules above.",
        "data": data,
    });

    GenerationRequest {
        system,
        user: user.to_string(),
        params,
    }
}

// ---------------------------------------------------------------------------
// Recap
// ---------------------------------------------------------------------------

fn result_side_payload(side: &ResultSide) -> Value {
    json!({
        "team": side.team_name,
        "record": side.record,
        "score": side.score,
        "starters": side
            .starters
            .iter()
            .map(|s| json!({ "name": s.name, "slot": s.slot, "points": s.points }))
            .collect::<Vec<_>>(),
    })
}

/// Request a recap of one finished matchup from its actual statlines.
pub fn build_recap_request(
    ctx: &WeekContext,
    result: &MatchupResult,
    persona: &Persona,
    params: GenerationParams,
) -> GenerationRequest {
    let task = "Write a creative, snarky, intelligent recap of the matchup in the payload.\n\
                - Open with a strong lead sentence that hooks the reader.\n\
                - Follow with 2-3 short paragraphs mixing stats and colorful commentary.\n\
                - Call out standout players and key performances from the starters lists.\n\
                - End with a witty one-line kicker.\n\
                - Plain paragraphs only: no headings, the caller adds them.";
    let system = system_prompt(persona, task, "Limit the recap to about 300 words.");

    let user = json!({
        "instructions": "Recap this matchup.",
        "data": {
            "league_id": ctx.league_id,
            "season": ctx.year,
            "week": ctx.week,
            "home": result_side_payload(&result.home),
            "away": result_side_payload(&result.away),
            "winner": result.winner.label(),
            "margin": result.margin.abs(),
        },
    });

    GenerationRequest {
        system,
        user: user.to_string(),
        params,
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use commish_core::cards::{assemble_cards, assemble_results};
    use commish_core::model::{BoxScore, LineupEntry, LineupSide, StarterRule, TeamMeta, WeekData};
    use std::collections::BTreeMap;

    fn entry(name: &str, slot: &str, proj: f64, actual: f64) -> LineupEntry {
        LineupEntry {
            player_id: name.into(),
            name: name.into(),
            slot: slot.into(),
            position: slot.into(),
            projected_points: Some(proj),
            actual_points: Some(actual),
        }
    }

    fn meta(id: u32, name: &str) -> TeamMeta {
        TeamMeta {
            team_id: id,
            team_name: name.into(),
            owner_name: "gridirongreg".into(),
            logo_url: String::new(),
            record: "3-1".into(),
            points_for: 400.0,
            points_against: 350.0,
            streak: "WIN 2".into(),
        }
    }

    fn week() -> WeekData {
        let mut teams = BTreeMap::new();
        teams.insert(1, meta(1, "River Otters"));
        teams.insert(2, meta(2, "Storm Hawks"));
        WeekData {
            context: WeekContext::new(555, 2024, 3),
            teams,
            pairs: vec![(1, 2)],
            box_scores: vec![BoxScore {
                home: LineupSide {
                    team_id: 1,
                    score: Some(61.3),
                    lineup: vec![
                        entry("Ace Passer", "QB", 27.17, 31.5),
                        entry("Deuce Runner", "RB", 24.11, 29.8),
                    ],
                },
                away: LineupSide {
                    team_id: 2,
                    score: Some(40.0),
                    lineup: vec![entry("Gunslinger Gary", "QB", 33.33, 40.0)],
                },
            }],
        }
    }

    #[test]
    fn persona_selection_is_stable() {
        let ctx = WeekContext::new(555, 2024, 3);
        assert_eq!(select_persona(&ctx), select_persona(&ctx));
        assert!(PERSONAS.contains(select_persona(&WeekContext::new(1, 2023, 17))));
    }

    #[test]
    fn system_prompt_carries_ground_rules() {
        let w = week();
        let cards = assemble_cards(&w, StarterRule::BenchOnly).unwrap();
        let req = build_quotes_request(
            &w.context,
            &cards,
            &PERSONAS[0],
            GenerationParams::quotes("m"),
        );
        assert!(req.system.contains("Never invent statistics, injuries"));
        assert!(req.system.contains("no profanity"));
        assert!(req.system.contains("Never name a real person"));
        assert!(req.system.contains("\"home_quote\""));
        assert!(req.system.starts_with("You are The Commissioner"));
    }

    #[test]
    fn quotes_payload_is_complete_and_omits_totals() {
        let w = week();
        let cards = assemble_cards(&w, StarterRule::BenchOnly).unwrap();
        let req = build_quotes_request(&w.context, &cards, &PERSONAS[1], GenerationParams::quotes("m"));

        let v: Value = serde_json::from_str(&req.user).unwrap();
        let m = &v["data"]["matchups"][0];
        assert_eq!(m["home_team"], "River Otters");
        assert_eq!(m["away_team"], "Storm Hawks");
        assert_eq!(m["favorite"], "River Otters");
        assert_eq!(m["edge"], 17.95);
        assert_eq!(m["home"]["top_starters"][0]["name"], "Ace Passer");
        assert_eq!(m["home"]["top_starters"][0]["points"], 27.2);
        assert_eq!(v["data"]["week"], 3);

        // Home total 51.28, away 33.33, combined 84.61.
        assert!(!req.user.contains("51.28"));
        assert!(!req.user.contains("84.61"));
        assert!(!req.user.contains("combined"));
        assert!(!req.user.contains("proj"));
        // Owner names stay out of the payload.
        assert!(!req.user.contains("gridirongreg"));
    }

    #[test]
    fn preview_request_names_source_and_format() {
        let w = week();
        let cards = assemble_cards(&w, StarterRule::BenchOnly).unwrap();
        let req = build_preview_request(
            &w.context,
            &cards,
            &PERSONAS[2],
            "Fantasy Sharks",
            GenerationParams::preview("m"),
        );
        assert!(req.system.contains("Based on projections from Fantasy Sharks"));
        assert!(req.system.contains("Matchup of the Week"));
        assert_eq!(req.params.max_tokens, 2200);
        let v: Value = serde_json::from_str(&req.user).unwrap();
        assert_eq!(v["data"]["projection_source"], "Fantasy Sharks");
        assert!(!req.user.contains("51.28"));
    }

    #[test]
    fn recap_request_lists_statlines() {
        let w = week();
        let results = assemble_results(&w, StarterRule::BenchOnly).unwrap();
        let req = build_recap_request(&w.context, &results[0], &PERSONAS[3], GenerationParams::recap("m"));
        let v: Value = serde_json::from_str(&req.user).unwrap();
        assert_eq!(v["data"]["winner"], "River Otters");
        assert_eq!(v["data"]["margin"], 21.3);
        assert_eq!(v["data"]["home"]["starters"][1]["name"], "Deuce Runner");
        assert_eq!(v["data"]["home"]["starters"][1]["points"], 29.8);
        assert!(req.system.contains("about 300 words"));
        assert!(req.system.contains("no profanity"));
    }
}
