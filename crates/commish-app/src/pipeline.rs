// Weekly pipeline orchestration.
//
// Fetch -> cards/results -> prompt -> generation -> render. Every await is
// sequential; one request runs to completion before the caller starts the
// next.

use commish_core::cards::{assemble_cards, assemble_results, MatchupResult};
use commish_core::model::{DocumentKind, StarterRule, WeekContext, WeeklyDocument};
use commish_core::render::{decorate_recap, empty_recap, render_preview};
use commish_espn::{EspnClient, FetchError, MatchupSource, MemoizedSource};
use commish_llm::prompt::{
    build_preview_request, build_quotes_request, build_recap_request, select_persona,
};
use commish_llm::{
    generate_fragments, ChatClient, GenerationError, GenerationParams, Generator, LlmClient,
    LlmEvent,
};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::{Config, ConfigError};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Terminal failure of one request, tagged with the stage that failed.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("generation failed: {0}")]
    Generation(#[from] GenerationError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("team {team_id} has no matchup in {context}")]
    TeamNotPlaying { team_id: u32, context: WeekContext },
}

// ---------------------------------------------------------------------------
// Settings and actions
// ---------------------------------------------------------------------------

/// The slice of [`Config`] the pipeline needs, fixed at construction.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSettings {
    pub starter_rule: StarterRule,
    pub projection_source: String,
    pub model: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl PipelineSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            starter_rule: config.league.starter_rule,
            projection_source: config.generation.projection_source.clone(),
            model: config.generation.model.clone(),
            temperature: config.generation.temperature,
            max_tokens: config.generation.max_tokens,
        }
    }

    fn params(&self, defaults: fn(String) -> GenerationParams) -> GenerationParams {
        defaults(self.model.clone())
            .with_temperature(self.temperature)
            .with_max_tokens(self.max_tokens)
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            starter_rule: StarterRule::default(),
            projection_source: "ESPN".to_string(),
            model: commish_llm::DEFAULT_MODEL.to_string(),
            temperature: None,
            max_tokens: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PreviewMode {
    /// Deterministic cards with generated quotes and closers.
    #[default]
    Structured,
    /// The whole document written by the model.
    Freeform,
}

/// One operator request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Preview(PreviewMode),
    /// Recap the week, optionally only the game involving one team.
    Recap { team: Option<u32> },
}

impl Action {
    pub fn kind(self) -> DocumentKind {
        match self {
            Action::Preview(_) => DocumentKind::Preview,
            Action::Recap { .. } => DocumentKind::Recap,
        }
    }

    /// Whether the action cannot produce a document without the model.
    /// Structured previews degrade to fallback quotes instead.
    pub fn needs_api_key(self) -> bool {
        !matches!(self, Action::Preview(PreviewMode::Structured))
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

pub struct Pipeline<S, G> {
    source: S,
    generator: G,
    settings: PipelineSettings,
}

/// The production wiring: memoized ESPN fetches and a streaming chat client.
pub type LivePipeline = Pipeline<MemoizedSource<EspnClient>, LlmClient>;

impl<S, G> Pipeline<S, G>
where
    S: MatchupSource,
    G: Generator,
{
    pub fn new(source: S, generator: G, settings: PipelineSettings) -> Self {
        Self {
            source,
            generator,
            settings,
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    pub async fn run(
        &self,
        ctx: WeekContext,
        action: Action,
    ) -> Result<WeeklyDocument, PipelineError> {
        match action {
            Action::Preview(mode) => self.preview(ctx, mode).await,
            Action::Recap { team } => self.recap(ctx, team).await,
        }
    }

    /// Build the weekly preview.
    ///
    /// Structured mode never fails on generation: quote problems fall back to
    /// canned text. Freeform mode propagates generation errors.
    pub async fn preview(
        &self,
        ctx: WeekContext,
        mode: PreviewMode,
    ) -> Result<WeeklyDocument, PipelineError> {
        let week = self.source.fetch_week(&ctx).await?;
        let cards = assemble_cards(&week, self.settings.starter_rule).map_err(FetchError::from)?;
        let persona = select_persona(&ctx);
        info!(context = %ctx, cards = cards.len(), persona = persona.name, ?mode, "building preview");

        if cards.is_empty() {
            return Ok(self.document(
                DocumentKind::Preview,
                ctx,
                render_preview(&ctx, &cards, &[], &self.settings.projection_source),
                false,
            ));
        }

        match mode {
            PreviewMode::Structured => {
                let request = build_quotes_request(
                    &ctx,
                    &cards,
                    persona,
                    self.settings.params(GenerationParams::quotes),
                );
                let outcome = generate_fragments(&self.generator, &request, &cards).await;
                let used_fallback = outcome.is_fallback();
                if let commish_llm::FragmentOutcome::Fallback { reason, .. } = &outcome {
                    warn!(context = %ctx, %reason, "preview quotes replaced with fallback text");
                }
                let markdown = render_preview(
                    &ctx,
                    &cards,
                    outcome.fragments(),
                    &self.settings.projection_source,
                );
                Ok(self.document(DocumentKind::Preview, ctx, markdown, used_fallback))
            }
            PreviewMode::Freeform => {
                let request = build_preview_request(
                    &ctx,
                    &cards,
                    persona,
                    &self.settings.projection_source,
                    self.settings.params(GenerationParams::preview),
                );
                let reply = self.generator.generate(&request).await?;
                Ok(self.document(DocumentKind::Preview, ctx, finish(&reply), false))
            }
        }
    }

    /// Build the weekly recap from actual scores, one generation per game.
    pub async fn recap(
        &self,
        ctx: WeekContext,
        team: Option<u32>,
    ) -> Result<WeeklyDocument, PipelineError> {
        let week = self.source.fetch_week(&ctx).await?;
        let mut results =
            assemble_results(&week, self.settings.starter_rule).map_err(FetchError::from)?;

        if let Some(team_id) = team {
            results.retain(|r| r.involves(team_id));
            if results.is_empty() {
                return Err(PipelineError::TeamNotPlaying {
                    team_id,
                    context: ctx,
                });
            }
        }

        if results.is_empty() {
            info!(context = %ctx, "no games to recap");
            return Ok(self.document(DocumentKind::Recap, ctx, empty_recap(ctx.week), false));
        }

        let persona = select_persona(&ctx);
        info!(context = %ctx, games = results.len(), persona = persona.name, "building recap");

        let mut sections = Vec::with_capacity(results.len());
        for result in &results {
            let request = build_recap_request(
                &ctx,
                result,
                persona,
                self.settings.params(GenerationParams::recap),
            );
            let body = self.generator.generate(&request).await?;
            debug!(home = %result.home.team_name, away = %result.away.team_name, "recap section generated");
            sections.push(format!("{}\n\n{}", section_heading(result), body.trim()));
        }

        let markdown = decorate_recap(ctx.week, &sections.join("\n\n"));
        Ok(self.document(DocumentKind::Recap, ctx, markdown, false))
    }

    fn document(
        &self,
        kind: DocumentKind,
        context: WeekContext,
        markdown: String,
        used_fallback: bool,
    ) -> WeeklyDocument {
        WeeklyDocument {
            kind,
            context,
            markdown,
            used_fallback,
        }
    }
}

/// Wire the production pipeline from configuration.
///
/// `events` receives streamed tokens when set.
pub fn live_pipeline(
    config: &Config,
    events: Option<mpsc::Sender<LlmEvent>>,
) -> Result<LivePipeline, PipelineError> {
    let espn = EspnClient::new(config.espn_cookies())?;
    let source = MemoizedSource::new(espn, config.memo_ttl());

    let provider = config.generation.provider;
    let generator = match (config.api_key(), events) {
        (Some(key), Some(tx)) => LlmClient::Active(ChatClient::new(provider, key).with_events(tx)),
        (key, _) => LlmClient::from_key(provider, key),
    };
    if !generator.is_active() {
        debug!(%provider, "no API key configured; generation disabled");
    }

    Ok(Pipeline::new(
        source,
        generator,
        PipelineSettings::from_config(config),
    ))
}

/// `## Home 101.50 – Away 99.20`
fn section_heading(result: &MatchupResult) -> String {
    format!(
        "## {} {:.2} \u{2013} {} {:.2}",
        result.home.team_name, result.home.score, result.away.team_name, result.away.score
    )
}

fn finish(reply: &str) -> String {
    let mut text = reply.trim().to_string();
    text.push('\n');
    text
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
