// Library root: exposes the orchestration modules so the binary and
// integration tests share one API.

pub mod cli;
pub mod config;
pub mod export;
pub mod pipeline;
