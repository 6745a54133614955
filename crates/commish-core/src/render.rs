// Markdown document rendering.
//
// Merges the deterministic card structure (headers, records, edge lines,
// top starters) with generated fragments (quotes, closers) into one
// document. The featured matchup always renders first.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::cards::{display_order, CardSide, MatchupCard};
use crate::model::{attributed_quote, GenerationFragment, WeekContext};

/// Body used when the week has no matchups.
pub const NO_MATCHUPS: &str = "_No matchups found for this week._";

const FEATURED_MARKER: &str = "## \u{2b50} Matchup of the Week";
const OTHERS_MARKER: &str = "## Around the League";

// ---------------------------------------------------------------------------
// Preview
// ---------------------------------------------------------------------------

/// Render the weekly preview.
///
/// `fragments` are matched to cards by (home, away) team names; a card
/// without a matching fragment gets [`default_fragment`] inline.
pub fn render_preview(
    ctx: &WeekContext,
    cards: &[MatchupCard],
    fragments: &[GenerationFragment],
    projection_source: &str,
) -> String {
    let mut doc = String::with_capacity(1024 + cards.len() * 768);
    doc.push_str(&format!("# Weekly Preview \u{2014} Week {}\n\n", ctx.week));
    doc.push_str(&format!(
        "_League {} \u{00b7} Season {}_\n\n",
        ctx.league_id, ctx.year
    ));

    if cards.is_empty() {
        doc.push_str(NO_MATCHUPS);
        doc.push('\n');
        return doc;
    }

    let ordered = display_order(cards);
    let mut others_started = false;
    for (i, card) in ordered.iter().enumerate() {
        if card.is_featured {
            doc.push_str(FEATURED_MARKER);
            doc.push_str("\n\n");
        } else if !others_started {
            if i > 0 {
                doc.push_str("---\n\n");
            }
            doc.push_str(OTHERS_MARKER);
            doc.push_str("\n\n");
            others_started = true;
        }

        let (home, away) = card.key();
        let fragment = fragments
            .iter()
            .find(|f| f.matches(home, away))
            .cloned()
            .unwrap_or_else(|| default_fragment(card));

        render_card(&mut doc, card, &fragment, ctx.week, projection_source);
    }

    doc
}

fn render_card(
    doc: &mut String,
    card: &MatchupCard,
    fragment: &GenerationFragment,
    week: u16,
    projection_source: &str,
) {
    doc.push_str(&format!(
        "### {} ({}) vs {} ({})\n\n",
        card.home.team_name, card.home.record, card.away.team_name, card.away.record
    ));
    doc.push_str(&format!("**Edge:** {}\n\n", edge_line(card)));
    doc.push_str(&format!(
        "_Streaks: {} {} \u{00b7} {} {}_\n\n",
        card.home.team_name, card.home.streak, card.away.team_name, card.away.streak
    ));

    for (side, quote) in [
        (&card.home, &fragment.home_quote),
        (&card.away, &fragment.away_quote),
    ] {
        doc.push_str(&format!(
            "**{} top starters:** {}\n\n",
            side.team_name,
            starters_line(side)
        ));
        doc.push_str(&flavor_paragraph(side, week, projection_source));
        doc.push_str("\n\n");
        doc.push_str(&format!("> {quote}\n\n"));
    }

    doc.push_str(&format!("**Closer:** {}\n\n", fragment.closer));
}

/// "Pick'em" for a zero edge, otherwise "<team> by <edge>".
pub fn edge_line(card: &MatchupCard) -> String {
    if card.favorite.is_pick_em() || card.edge == 0.0 {
        card.favorite.label().to_string()
    } else {
        format!("{} by {:.2}", card.favorite.label(), card.edge)
    }
}

fn starters_line(side: &CardSide) -> String {
    if side.top_players.is_empty() {
        return "no projected starters".to_string();
    }
    side.top_players
        .iter()
        .map(|p| format!("{} ({}) {:.1}", p.name, p.position, p.points))
        .collect::<Vec<_>>()
        .join(" \u{00b7} ")
}

fn flavor_paragraph(side: &CardSide, week: u16, projection_source: &str) -> String {
    match side.headliner() {
        Some(top) => format!(
            "Based on projections from {projection_source}, {} leans on {} ({}) for **{:.1}** points in week {week}.",
            side.team_name, top.name, top.position, top.points
        ),
        None => format!(
            "Based on projections from {projection_source}, {} heads into week {week} without a projected headliner.",
            side.team_name
        ),
    }
}

/// Canned fragment used when no generated fragment matches a card.
pub fn default_fragment(card: &MatchupCard) -> GenerationFragment {
    let (home, away) = card.key();
    GenerationFragment {
        home_team: home.to_string(),
        away_team: away.to_string(),
        home_quote: attributed_quote("We know what we have to do this week", home),
        away_quote: attributed_quote("Our guys are ready to play four full quarters", away),
        closer: "Set your lineups and buckle up.".to_string(),
    }
}

// ---------------------------------------------------------------------------
// Recap
// ---------------------------------------------------------------------------

static HIGHLIGHT_WORDS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(MVP|Upset|stud|boom)\b").expect("valid highlight regex")
});

fn highlight_mark(word: &str) -> &'static str {
    match word {
        "MVP" => "\u{2b50}",
        "Upset" => "\u{1f6a8}",
        "stud" => "\u{1f31f}",
        _ => "\u{1f4a3}",
    }
}

/// Wrap a generated recap with a banner heading, decorate its headings, and
/// mark the highlight words (MVP, Upset, stud, boom) with an emoji.
pub fn decorate_recap(week: u16, body: &str) -> String {
    let mut out = Vec::new();
    out.push(format!(
        "# \u{1f3c8}\u{1f525} Weekly Recap \u{2014} Week {week} \u{1f525}\u{1f3c8}"
    ));
    out.push(String::new());
    for line in body.trim().lines() {
        if line.starts_with('#') {
            out.push(format!("{} \u{1f3c8}", line.trim_end()));
        } else {
            out.push(line.to_string());
        }
    }
    let text = out.join("\n");
    let mut text = HIGHLIGHT_WORDS
        .replace_all(&text, |caps: &Captures| {
            format!("{} {}", &caps[1], highlight_mark(&caps[1]))
        })
        .into_owned();
    text.push('\n');
    text
}

/// Recap document for a week with no games.
pub fn empty_recap(week: u16) -> String {
    format!("# Weekly Recap \u{2014} Week {week}\n\n{NO_MATCHUPS}\n")
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
