// Quote and closer generation with sanitization and deterministic fallback.
//
// The model's reply is parsed, aligned to cards by (home, away) team names,
// stripped of any attribution it added, and re-attributed with the canonical
// template exactly once. Any failure to call or parse degrades to fallback
// text picked from fixed pools by a stable hash, so a preview never fails on
// quotes alone.

use commish_core::cards::MatchupCard;
use commish_core::model::{attributed_quote, GenerationFragment};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::generator::{GenerationRequest, Generator};
use crate::seed::stable_index;

// ---------------------------------------------------------------------------
// Fallback pools
// ---------------------------------------------------------------------------

pub const FALLBACK_QUOTES: [&str; 12] = [
    "We know what we have to do this week",
    "It comes down to execution, one snap at a time",
    "Our guys are locked in and ready to play four full quarters",
    "We respect them, but we trust our game plan",
    "Win the little battles and the scoreboard takes care of itself",
    "Nobody in our building is looking past this one",
    "We have been building toward a week like this",
    "Stay focused, stay aggressive, finish plays",
    "It is a big opportunity and we plan to take it",
    "We just need to play our brand of football",
    "Every point matters and we are treating it that way",
    "Our starters are ready and the plan is simple",
];

pub const FALLBACK_CLOSERS: [&str; 8] = [
    "Set your lineups and buckle up.",
    "Something has to give on Sunday.",
    "Grab the snacks; this one could go the distance.",
    "Projections are a guess; the games are real.",
    "May the best lineup win.",
    "Kickoff cannot come soon enough.",
    "Check back Monday to see who called it.",
    "One of these rosters is about to make a statement.",
];

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum FragmentOutcome {
    /// Parsed from the model reply (cards the reply missed use fallback text).
    Generated(Vec<GenerationFragment>),
    /// The model call or parse failed; every card uses fallback text.
    Fallback {
        fragments: Vec<GenerationFragment>,
        reason: String,
    },
}

impl FragmentOutcome {
    pub fn fragments(&self) -> &[GenerationFragment] {
        match self {
            FragmentOutcome::Generated(f) => f,
            FragmentOutcome::Fallback { fragments, .. } => fragments,
        }
    }

    pub fn into_fragments(self) -> Vec<GenerationFragment> {
        match self {
            FragmentOutcome::Generated(f) => f,
            FragmentOutcome::Fallback { fragments, .. } => fragments,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, FragmentOutcome::Fallback { .. })
    }
}

/// Run the quotes request and return sanitized fragments for every card.
///
/// Never fails: generator errors, unparseable replies, and replies that match
/// no card all produce `FragmentOutcome::Fallback`.
pub async fn generate_fragments(
    generator: &dyn Generator,
    request: &GenerationRequest,
    cards: &[MatchupCard],
) -> FragmentOutcome {
    if cards.is_empty() {
        return FragmentOutcome::Generated(Vec::new());
    }

    let reply = match generator.generate(request).await {
        Ok(text) => text,
        Err(e) => return fallback_outcome(cards, format!("generation failed: {e}")),
    };

    let raw = match parse_fragments(&reply) {
        Ok(raw) if !raw.is_empty() => raw,
        Ok(_) => return fallback_outcome(cards, "reply contained no fragments".to_string()),
        Err(e) => return fallback_outcome(cards, format!("unparseable reply: {e}")),
    };

    let (fragments, matched) = sanitize_fragments(&raw, cards);
    if matched == 0 {
        return fallback_outcome(cards, "reply matched no matchup".to_string());
    }
    if matched < cards.len() {
        warn!(
            matched,
            cards = cards.len(),
            "reply missed some matchups; using fallback text for them"
        );
    }
    info!(fragments = fragments.len(), "generated quote fragments");
    FragmentOutcome::Generated(fragments)
}

fn fallback_outcome(cards: &[MatchupCard], reason: String) -> FragmentOutcome {
    warn!(%reason, "using fallback quotes");
    FragmentOutcome::Fallback {
        fragments: cards.iter().map(fallback_fragment).collect(),
        reason,
    }
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// One entry of the model's JSON reply, before sanitization.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawFragment {
    #[serde(default, alias = "home")]
    pub home_team: String,
    #[serde(default, alias = "away")]
    pub away_team: String,
    #[serde(default)]
    pub home_quote: String,
    #[serde(default)]
    pub away_quote: String,
    #[serde(default)]
    pub closer: String,
}

/// Parse the reply as a list of fragments.
///
/// Accepts a bare array, an object wrapping the array under `matchups` or
/// `fragments`, and either of those inside code fences or surrounding prose.
pub fn parse_fragments(reply: &str) -> Result<Vec<RawFragment>, String> {
    let text = strip_code_fence(reply);

    if let Ok(value) = serde_json::from_str::<Value>(text) {
        return fragments_from_value(value);
    }

    // Prose around the JSON: take the outermost array.
    match (text.find('['), text.rfind(']')) {
        (Some(start), Some(end)) if start < end => {
            let value: Value =
                serde_json::from_str(&text[start..=end]).map_err(|e| e.to_string())?;
            fragments_from_value(value)
        }
        _ => Err("no JSON array found".to_string()),
    }
}

fn fragments_from_value(value: Value) -> Result<Vec<RawFragment>, String> {
    let list = match value {
        Value::Array(_) => value,
        Value::Object(mut map) => match map.remove("matchups").or_else(|| map.remove("fragments")) {
            Some(list @ Value::Array(_)) => list,
            _ => return Err("object without a matchups list".to_string()),
        },
        _ => return Err("expected a JSON list".to_string()),
    };
    serde_json::from_value(list).map_err(|e| e.to_string())
}

fn strip_code_fence(reply: &str) -> &str {
    let trimmed = reply.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string ("json") on the opening fence line.
    let body = rest.split_once('\n').map_or("", |(_, body)| body);
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

// ---------------------------------------------------------------------------
// Sanitization
// ---------------------------------------------------------------------------

// A generic attribution is "coach says", optionally "the <anything> coach
// says". At the end of a quote it only counts when punctuation separates it
// from the quote text, so wording like "whatever our coach says" survives.
static GENERIC_TRAILING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?i)(?:^|\s*[,;:.!?\-–—"'“”][\s,;:.!?\-–—"'“”]*)(?:the\s+(?:[^,;:.!?"“”\n]{1,60}?\s+)?)?(?:head\s+)?coach\s+says\s*[.!]?\s*$"#,
    )
    .expect("valid trailing attribution regex")
});

static GENERIC_LEADING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?i)^\s*(?:the\s+(?:[^,;:.!?"“”\n]{1,60}?\s+)?)?(?:head\s+)?coach\s+says\s*[:,\-–—]\s*"#,
    )
    .expect("valid leading attribution regex")
});

/// Remove any attribution the model appended (or prefixed), plus wrapping
/// quotes and trailing punctuation, leaving the bare quote text on one line.
pub fn strip_attribution(text: &str, team: &str) -> String {
    let escaped = regex::escape(team.trim());
    let team_trailing = Regex::new(&format!(
        r#"(?i)[\s,;:.\-–—"'“”]*(?:the\s+)?{escaped}\s+(?:head\s+)?coach\s+says\s*[.!]?\s*$"#
    ))
    .ok();
    let team_leading = Regex::new(&format!(
        r#"(?i)^\s*(?:the\s+)?{escaped}\s+(?:head\s+)?coach\s+says\s*[:,\-–—]?\s*"#
    ))
    .ok();

    let mut s = text.trim().to_string();
    // Repeat until stable so doubled attributions are fully removed.
    loop {
        let before = s.clone();
        if let Some(re) = &team_trailing {
            s = re.replace(&s, "").into_owned();
        }
        s = GENERIC_TRAILING.replace(&s, "").into_owned();
        if let Some(re) = &team_leading {
            s = re.replace(&s, "").into_owned();
        }
        s = GENERIC_LEADING.replace(&s, "").into_owned();
        s = trim_wrapping(&s);
        if s == before {
            break;
        }
    }
    s
}

/// Strip wrapping quotes and trailing punctuation; collapse all whitespace
/// (newlines included) to single spaces.
fn trim_wrapping(s: &str) -> String {
    let one_line = s.split_whitespace().collect::<Vec<_>>().join(" ");
    one_line
        .trim_matches(|c: char| matches!(c, '"' | '\'' | '“' | '”' | '‘' | '’'))
        .trim_end_matches(|c: char| matches!(c, '.' | ',' | ';' | ':' | '!' | '?'))
        .trim()
        .to_string()
}

/// Bare text → `"<text>," The <Team> coach says.`; `None` if nothing is left.
pub fn canonical_quote(raw: &str, team: &str) -> Option<String> {
    let bare = strip_attribution(raw, team);
    if bare.is_empty() {
        None
    } else {
        Some(attributed_quote(&bare, team))
    }
}

/// Case- and whitespace-insensitive comparison key.
fn normalized(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn same_key(a: &str, b: &str) -> bool {
    normalized(a) == normalized(b)
}

/// Align raw fragments to cards and repair them.
///
/// Returns one fragment per card (in card order) and how many cards were
/// matched by the reply. A reply entry with home and away swapped is accepted
/// and flipped back.
pub fn sanitize_fragments(
    raw: &[RawFragment],
    cards: &[MatchupCard],
) -> (Vec<GenerationFragment>, usize) {
    let mut matched = 0;
    let mut out = Vec::with_capacity(cards.len());

    for card in cards {
        let (home, away) = card.key();
        let found = raw.iter().find_map(|r| {
            if same_key(&r.home_team, home) && same_key(&r.away_team, away) {
                Some((r.home_quote.as_str(), r.away_quote.as_str(), r.closer.as_str()))
            } else if same_key(&r.home_team, away) && same_key(&r.away_team, home) {
                Some((r.away_quote.as_str(), r.home_quote.as_str(), r.closer.as_str()))
            } else {
                None
            }
        });

        match found {
            Some((home_raw, away_raw, closer)) => {
                matched += 1;
                out.push(repair(card, home_raw, away_raw, closer));
            }
            None => {
                debug!(home, away, "no reply entry for matchup");
                out.push(fallback_fragment(card));
            }
        }
    }

    (out, matched)
}

fn repair(card: &MatchupCard, home_raw: &str, away_raw: &str, closer: &str) -> GenerationFragment {
    let (home, away) = card.key();

    let home_bare = non_empty(strip_attribution(home_raw, home))
        .unwrap_or_else(|| fallback_quote(home, "home").to_string());
    let mut away_bare = non_empty(strip_attribution(away_raw, away))
        .unwrap_or_else(|| fallback_quote(away, "away").to_string());

    if same_key(&home_bare, &away_bare) {
        debug!(home, away, "identical quotes; replacing away side");
        away_bare = distinct_fallback(away, &home_bare).to_string();
    }

    let closer = trim_wrapping(closer);
    let closer = if closer.is_empty() {
        fallback_closer(home, away).to_string()
    } else {
        format!("{closer}.")
    };

    GenerationFragment {
        home_team: home.to_string(),
        away_team: away.to_string(),
        home_quote: attributed_quote(&home_bare, home),
        away_quote: attributed_quote(&away_bare, away),
        closer,
    }
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}

// ---------------------------------------------------------------------------
// Deterministic fallback
// ---------------------------------------------------------------------------

/// Bare fallback quote for `team`; `salt` separates home/away picks.
pub fn fallback_quote(team: &str, salt: &str) -> &'static str {
    FALLBACK_QUOTES[stable_index(team, salt, FALLBACK_QUOTES.len())]
}

pub fn fallback_closer(home: &str, away: &str) -> &'static str {
    let key = format!("{home}|{away}");
    FALLBACK_CLOSERS[stable_index(&key, "closer", FALLBACK_CLOSERS.len())]
}

/// A fallback quote for `team` that differs from `other`.
fn distinct_fallback(team: &str, other: &str) -> &'static str {
    let start = stable_index(team, "away", FALLBACK_QUOTES.len());
    (0..FALLBACK_QUOTES.len())
        .map(|offset| FALLBACK_QUOTES[(start + offset) % FALLBACK_QUOTES.len()])
        .find(|q| !same_key(q, other))
        .unwrap_or(FALLBACK_QUOTES[start])
}

/// Fully deterministic fragment for one card, with distinct quotes.
pub fn fallback_fragment(card: &MatchupCard) -> GenerationFragment {
    let (home, away) = card.key();
    let home_bare = fallback_quote(home, "home");
    let away_bare = distinct_fallback(away, home_bare);
    GenerationFragment {
        home_team: home.to_string(),
        away_team: away.to_string(),
        home_quote: attributed_quote(home_bare, home),
        away_quote: attributed_quote(away_bare, away),
        closer: fallback_closer(home, away).to_string(),
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
