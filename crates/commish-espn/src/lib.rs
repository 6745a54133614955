pub mod client;
pub mod fetcher;
pub mod normalize;
pub mod raw;

pub use client::{EspnClient, EspnCookies, FetchError};
pub use fetcher::{MatchupSource, MemoizedSource, DEFAULT_MEMO_TTL};
