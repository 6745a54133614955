// Matchup Fetcher: the `MatchupSource` seam plus a short-TTL memo.
//
// Implementations return fully normalized `WeekData`; nothing downstream sees
// the upstream payload shape.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use commish_core::model::{WeekContext, WeekData};
use tokio::time::Instant;
use tracing::debug;

use crate::client::{EspnClient, FetchError};
use crate::normalize::normalize_week;

/// Default lifetime of a memoized fetch.
pub const DEFAULT_MEMO_TTL: Duration = Duration::from_secs(60);

/// Anything that can produce one normalized league week.
#[async_trait]
pub trait MatchupSource: Send + Sync {
    async fn fetch_week(&self, ctx: &WeekContext) -> Result<WeekData, FetchError>;
}

#[async_trait]
impl MatchupSource for EspnClient {
    async fn fetch_week(&self, ctx: &WeekContext) -> Result<WeekData, FetchError> {
        let raw = self.fetch_league(ctx).await?;
        Ok(normalize_week(&raw, *ctx))
    }
}

// ---------------------------------------------------------------------------
// MemoizedSource
// ---------------------------------------------------------------------------

struct MemoSlot {
    context: WeekContext,
    fetched_at: Instant,
    data: WeekData,
}

/// Wraps a source and remembers the most recent successful fetch.
///
/// Single slot: a request for a different (league, year, week) replaces it.
/// A zero TTL disables memoization. Failed fetches are never stored.
pub struct MemoizedSource<S> {
    inner: S,
    ttl: Duration,
    slot: Mutex<Option<MemoSlot>>,
}

impl<S: MatchupSource> MemoizedSource<S> {
    pub fn new(inner: S, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            slot: Mutex::new(None),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    fn cached(&self, ctx: &WeekContext) -> Option<WeekData> {
        if self.ttl.is_zero() {
            return None;
        }
        let slot = self.slot.lock().ok()?;
        slot.as_ref()
            .filter(|s| s.context == *ctx && s.fetched_at.elapsed() < self.ttl)
            .map(|s| s.data.clone())
    }

    fn store(&self, ctx: &WeekContext, data: &WeekData) {
        if self.ttl.is_zero() {
            return;
        }
        if let Ok(mut slot) = self.slot.lock() {
            *slot = Some(MemoSlot {
                context: *ctx,
                fetched_at: Instant::now(),
                data: data.clone(),
            });
        }
    }
}

#[async_trait]
impl<S: MatchupSource> MatchupSource for MemoizedSource<S> {
    async fn fetch_week(&self, ctx: &WeekContext) -> Result<WeekData, FetchError> {
        if let Some(data) = self.cached(ctx) {
            debug!(context = %ctx, "serving memoized week");
            return Ok(data);
        }
        let data = self.inner.fetch_week(ctx).await?;
        self.store(ctx, &data);
        Ok(data)
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
