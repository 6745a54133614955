// ESPN fantasy football v3 HTTP client.
//
// One GET per request: the league endpoint with the team, matchup, box score,
// roster, and settings views scoped to a single scoring period. Private
// leagues need the `espn_s2` and `SWID` cookies from a logged-in browser.

use std::fmt;

use commish_core::model::WeekContext;
use commish_core::CoreError;
use reqwest::StatusCode;
use thiserror::Error;
use tracing::{debug, info};

use crate::raw::RawLeague;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Base path for the ESPN fantasy football v3 API.
pub const FFL_BASE_URL: &str = "https://lm-api-reads.fantasy.espn.com/apis/v3/games/ffl";

const USER_AGENT: &str = concat!("commish/", env!("CARGO_PKG_VERSION"));

const WEEK_VIEWS: [&str; 5] = ["mTeam", "mMatchupScore", "mBoxscore", "mRoster", "mSettings"];

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from fetching or normalizing a league week.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to ESPN failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("league {league_id} not found (check the league id and season)")]
    LeagueNotFound { league_id: u64 },

    #[error("league {league_id} is private: ESPN_S2 and SWID cookies are required")]
    Unauthorized { league_id: u64 },

    #[error("ESPN returned status {status} for league {league_id}")]
    Status { status: u16, league_id: u64 },

    #[error("could not decode ESPN response: {0}")]
    Decode(String),

    #[error("inconsistent league data: {0}")]
    Integrity(#[from] CoreError),
}

// ---------------------------------------------------------------------------
// Cookies
// ---------------------------------------------------------------------------

/// Private-league session cookies.
#[derive(Clone, PartialEq, Eq)]
pub struct EspnCookies {
    pub espn_s2: String,
    pub swid: String,
}

impl EspnCookies {
    /// Both values are required; returns `None` if either is blank.
    pub fn new(espn_s2: impl Into<String>, swid: impl Into<String>) -> Option<Self> {
        let espn_s2 = espn_s2.into().trim().to_string();
        let swid = swid.into().trim().to_string();
        if espn_s2.is_empty() || swid.is_empty() {
            return None;
        }
        Some(Self { espn_s2, swid })
    }

    fn header_value(&self) -> String {
        format!("espn_s2={}; SWID={}", self.espn_s2, self.swid)
    }
}

// Cookie values are session credentials.
impl fmt::Debug for EspnCookies {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EspnCookies")
            .field("espn_s2", &"<redacted>")
            .field("swid", &"<redacted>")
            .finish()
    }
}

// ---------------------------------------------------------------------------
// EspnClient
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct EspnClient {
    http: reqwest::Client,
    base_url: String,
    cookies: Option<EspnCookies>,
}

impl EspnClient {
    pub fn new(cookies: Option<EspnCookies>) -> Result<Self, FetchError> {
        Self::with_base_url(FFL_BASE_URL, cookies)
    }

    /// Point the client at a different host (used by tests).
    pub fn with_base_url(
        base_url: impl Into<String>,
        cookies: Option<EspnCookies>,
    ) -> Result<Self, FetchError> {
        let http = reqwest::Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            cookies,
        })
    }

    pub fn has_cookies(&self) -> bool {
        self.cookies.is_some()
    }

    pub(crate) fn league_url(&self, ctx: &WeekContext) -> String {
        format!(
            "{}/seasons/{}/segments/0/leagues/{}",
            self.base_url, ctx.year, ctx.league_id
        )
    }

    /// Fetch the raw league payload for one scoring period.
    pub async fn fetch_league(&self, ctx: &WeekContext) -> Result<RawLeague, FetchError> {
        let url = self.league_url(ctx);
        let mut query: Vec<(&str, String)> = WEEK_VIEWS
            .iter()
            .map(|v| ("view", (*v).to_string()))
            .collect();
        query.push(("scoringPeriodId", ctx.week.to_string()));

        let mut request = self.http.get(&url).query(&query);
        if let Some(cookies) = &self.cookies {
            request = request.header(reqwest::header::COOKIE, cookies.header_value());
        }

        debug!(%url, private = self.cookies.is_some(), "requesting league week");
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(status_error(status, ctx.league_id));
        }

        let body = response.text().await?;
        let league: RawLeague =
            serde_json::from_str(&body).map_err(|e| FetchError::Decode(e.to_string()))?;

        info!(
            context = %ctx,
            teams = league.teams.len(),
            schedule = league.schedule.len(),
            "fetched league payload"
        );
        Ok(league)
    }
}

fn status_error(status: StatusCode, league_id: u64) -> FetchError {
    match status {
        StatusCode::NOT_FOUND => FetchError::LeagueNotFound { league_id },
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => FetchError::Unauthorized { league_id },
        other => FetchError::Status {
            status: other.as_u16(),
            league_id,
        },
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cookies_require_both_values() {
        assert!(EspnCookies::new("abc", "{SWID}").is_some());
        assert!(EspnCookies::new("", "{SWID}").is_none());
        assert!(EspnCookies::new("abc", "  ").is_none());
    }

    #[test]
    fn cookie_header_and_redacted_debug() {
        let cookies = EspnCookies::new("s2value", "{ABC-123}").unwrap();
        assert_eq!(cookies.header_value(), "espn_s2=s2value; SWID={ABC-123}");
        let debug = format!("{cookies:?}");
        assert!(!debug.contains("s2value"));
        assert!(!debug.contains("ABC-123"));
    }

    #[test]
    fn league_url_shape() {
        let client = EspnClient::with_base_url("http://localhost:1/ffl/", None).unwrap();
        let url = client.league_url(&WeekContext::new(12345, 2024, 3));
        assert_eq!(url, "http://localhost:1/ffl/seasons/2024/segments/0/leagues/12345");
    }

    #[test]
    fn status_mapping() {
        assert!(matches!(
            status_error(StatusCode::NOT_FOUND, 1),
            FetchError::LeagueNotFound { league_id: 1 }
        ));
        assert!(matches!(
            status_error(StatusCode::UNAUTHORIZED, 1),
            FetchError::Unauthorized { .. }
        ));
        assert!(matches!(
            status_error(StatusCode::FORBIDDEN, 1),
            FetchError::Unauthorized { .. }
        ));
        assert!(matches!(
            status_error(StatusCode::BAD_GATEWAY, 1),
            FetchError::Status { status: 502, .. }
        ));
    }
}
