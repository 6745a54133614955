// Configuration loading (commish.toml, credentials.toml, environment).
//
// Precedence, lowest to highest: built-in defaults, config/commish.toml,
// config/credentials.toml, environment variables (including .env files the
// binary loads at startup), then CLI flags applied by the caller.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use commish_core::model::StarterRule;
use commish_espn::{EspnCookies, DEFAULT_MEMO_TTL};
use commish_llm::{Provider, DEFAULT_MODEL};
use directories::ProjectDirs;
use serde::Deserialize;
use thiserror::Error;

/// Shipped default for `config/commish.toml`.
const DEFAULT_CONFIG: &str = include_str!("../defaults/commish.toml");

/// Files written into `config/` on first run when missing.
const DEFAULT_FILES: &[(&str, &str)] = &[("commish.toml", DEFAULT_CONFIG)];

/// Overrides the base directory holding `config/` and `logs/`.
pub const HOME_VAR: &str = "COMMISH_HOME";

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },

    #[error("failed to initialize config from defaults: {message}")]
    DefaultsCopyError { message: String },
}

fn invalid(field: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError {
        field: field.to_string(),
        message: message.into(),
    }
}

// ---------------------------------------------------------------------------
// Config structs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    pub league: LeagueConfig,
    pub generation: GenerationConfig,
    pub fetch: FetchConfig,
    pub credentials: CredentialsConfig,
}

/// Raw deserialization target for commish.toml.
#[derive(Debug, Clone, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    league: LeagueConfig,
    #[serde(default)]
    generation: GenerationConfig,
    #[serde(default)]
    fetch: FetchConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct LeagueConfig {
    #[serde(default)]
    pub league_id: Option<u64>,
    #[serde(default)]
    pub starter_rule: StarterRule,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub provider: Provider,
    pub model: String,
    pub projection_source: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: Provider::OpenAi,
            model: DEFAULT_MODEL.to_string(),
            projection_source: "ESPN".to_string(),
            temperature: None,
            max_tokens: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub memo_ttl_secs: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            memo_ttl_secs: DEFAULT_MEMO_TTL.as_secs(),
        }
    }
}

#[derive(Clone, Default, PartialEq, Deserialize)]
pub struct CredentialsConfig {
    pub openai_api_key: Option<String>,
    pub anthropic_api_key: Option<String>,
    pub espn_s2: Option<String>,
    pub swid: Option<String>,
}

impl fmt::Debug for CredentialsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mark = |v: &Option<String>| if v.is_some() { "<set>" } else { "<unset>" };
        f.debug_struct("CredentialsConfig")
            .field("openai_api_key", &mark(&self.openai_api_key))
            .field("anthropic_api_key", &mark(&self.anthropic_api_key))
            .field("espn_s2", &mark(&self.espn_s2))
            .field("swid", &mark(&self.swid))
            .finish()
    }
}

impl Config {
    /// API key for the configured provider, if present and non-blank.
    pub fn api_key(&self) -> Option<&str> {
        let key = match self.generation.provider {
            Provider::OpenAi => &self.credentials.openai_api_key,
            Provider::Anthropic => &self.credentials.anthropic_api_key,
        };
        key.as_deref().map(str::trim).filter(|k| !k.is_empty())
    }

    /// Like [`Config::api_key`] but an error naming the missing variable.
    pub fn require_api_key(&self) -> Result<&str, ConfigError> {
        self.api_key().ok_or_else(|| {
            invalid(
                self.generation.provider.api_key_var(),
                "an API key is required for recaps and freeform previews",
            )
        })
    }

    pub fn espn_cookies(&self) -> Option<EspnCookies> {
        match (&self.credentials.espn_s2, &self.credentials.swid) {
            (Some(s2), Some(swid)) => EspnCookies::new(s2.as_str(), swid.as_str()),
            _ => None,
        }
    }

    pub fn memo_ttl(&self) -> Duration {
        Duration::from_secs(self.fetch.memo_ttl_secs)
    }
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Load and validate `config/commish.toml` and (optionally)
/// `config/credentials.toml` relative to `base_dir`. No environment lookups.
pub fn load_config_from(base_dir: &Path) -> Result<Config, ConfigError> {
    let config_dir = base_dir.join("config");

    // --- commish.toml (required) ---
    let config_path = config_dir.join("commish.toml");
    let text = read_file(&config_path)?;
    let file: ConfigFile = toml::from_str(&text).map_err(|e| ConfigError::ParseError {
        path: config_path.clone(),
        source: e,
    })?;

    // --- credentials.toml (optional) ---
    let credentials_path = config_dir.join("credentials.toml");
    let credentials = if credentials_path.exists() {
        let cred_text = read_file(&credentials_path)?;
        toml::from_str(&cred_text).map_err(|e| ConfigError::ParseError {
            path: credentials_path.clone(),
            source: e,
        })?
    } else {
        CredentialsConfig::default()
    };

    let config = Config {
        league: file.league,
        generation: file.generation,
        fetch: file.fetch,
        credentials,
    };

    validate(&config)?;

    Ok(config)
}

/// Write any missing default files into `base_dir/config`.
/// Returns the files that were created; existing files are left untouched.
pub fn ensure_config_files(base_dir: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    let config_dir = base_dir.join("config");
    std::fs::create_dir_all(&config_dir).map_err(|e| ConfigError::DefaultsCopyError {
        message: format!("failed to create config directory: {e}"),
    })?;

    let mut written = Vec::new();
    for (name, content) in DEFAULT_FILES {
        let target = config_dir.join(name);
        match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&target)
        {
            Ok(mut dest) => {
                std::io::Write::write_all(&mut dest, content.as_bytes()).map_err(|e| {
                    ConfigError::DefaultsCopyError {
                        message: format!("failed to write {}: {e}", target.display()),
                    }
                })?;
                written.push(target);
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {}
            Err(e) => {
                return Err(ConfigError::DefaultsCopyError {
                    message: format!("failed to create {}: {e}", target.display()),
                });
            }
        }
    }

    Ok(written)
}

/// Full load: defaults, files, then process environment.
pub fn load_config(base_dir: &Path) -> Result<Config, ConfigError> {
    ensure_config_files(base_dir)?;
    let mut config = load_config_from(base_dir)?;
    apply_env_overrides(&mut config, |name| std::env::var(name).ok())?;
    Ok(config)
}

/// Directory holding `config/` and `logs/`.
///
/// `COMMISH_HOME` wins; otherwise the current directory when it already has a
/// `config/` directory; otherwise the per-user config directory; otherwise
/// the current directory.
pub fn resolve_base_dir() -> PathBuf {
    if let Some(home) = std::env::var_os(HOME_VAR).filter(|v| !v.is_empty()) {
        return PathBuf::from(home);
    }
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    if cwd.join("config").is_dir() {
        return cwd;
    }
    ProjectDirs::from("", "", "commish")
        .map(|dirs| dirs.config_dir().to_path_buf())
        .unwrap_or(cwd)
}

// ---------------------------------------------------------------------------
// Environment overrides
// ---------------------------------------------------------------------------

/// Apply environment overrides through `lookup`, then re-validate.
/// Blank values are ignored.
pub fn apply_env_overrides<F>(config: &mut Config, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

    if let Some(provider) = get("COMMISH_PROVIDER") {
        config.generation.provider = provider
            .parse()
            .map_err(|e: String| invalid("COMMISH_PROVIDER", e))?;
    }
    if let Some(model) = get("COMMISH_MODEL").or_else(|| get("OPENAI_MODEL")) {
        config.generation.model = model;
    }
    if let Some(source) = get("PREVIEW_PROJECTION_SOURCE") {
        config.generation.projection_source = source;
    }
    if let Some(t) = get("COMMISH_TEMPERATURE") {
        let value = t
            .parse::<f32>()
            .map_err(|_| invalid("COMMISH_TEMPERATURE", format!("not a number: {t}")))?;
        config.generation.temperature = Some(value);
    }
    if let Some(n) = get("COMMISH_MAX_TOKENS") {
        let value = n
            .parse::<u32>()
            .map_err(|_| invalid("COMMISH_MAX_TOKENS", format!("not a positive integer: {n}")))?;
        config.generation.max_tokens = Some(value);
    }
    if let Some(ttl) = get("COMMISH_MEMO_TTL_SECS") {
        config.fetch.memo_ttl_secs = ttl
            .parse::<u64>()
            .map_err(|_| invalid("COMMISH_MEMO_TTL_SECS", format!("not a whole number: {ttl}")))?;
    }
    if let Some(id) = get("LEAGUE_ID") {
        let value = id
            .parse::<u64>()
            .map_err(|_| invalid("LEAGUE_ID", format!("not a league id: {id}")))?;
        config.league.league_id = Some(value);
    }

    let creds = &mut config.credentials;
    if let Some(key) = get("OPENAI_API_KEY") {
        creds.openai_api_key = Some(key);
    }
    if let Some(key) = get("ANTHROPIC_API_KEY") {
        creds.anthropic_api_key = Some(key);
    }
    if let Some(s2) = get("ESPN_S2") {
        creds.espn_s2 = Some(s2);
    }
    if let Some(swid) = get("SWID").or_else(|| get("ESPN_SWID")) {
        creds.swid = Some(swid);
    }

    validate(config)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.to_path_buf(),
    })
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate(config: &Config) -> Result<(), ConfigError> {
    let generation = &config.generation;
    if generation.model.trim().is_empty() {
        return Err(invalid("generation.model", "must not be empty"));
    }
    if generation.projection_source.trim().is_empty() {
        return Err(invalid("generation.projection_source", "must not be empty"));
    }
    if let Some(t) = generation.temperature {
        if !(0.0..=2.0).contains(&t) {
            return Err(invalid(
                "generation.temperature",
                format!("must be between 0.0 and 2.0 inclusive, got {t}"),
            ));
        }
    }
    if generation.max_tokens == Some(0) {
        return Err(invalid("generation.max_tokens", "must be > 0"));
    }
    if config.league.league_id == Some(0) {
        return Err(invalid("league.league_id", "must be > 0"));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
