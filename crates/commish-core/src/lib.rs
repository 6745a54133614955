// Library root for the shared domain types and the deterministic stages of
// the weekly pipeline: starter projections, matchup cards, and rendering.

pub mod cards;
pub mod error;
pub mod model;
pub mod projection;
pub mod render;

pub use error::CoreError;
