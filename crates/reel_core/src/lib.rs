//! Timeline composition and caption timing for Reelsmith.
//!
//! Turns ordered video clips, a narration track and optional caption text
//! into one finished video. Media work is delegated to an external
//! transcoding engine behind [`tools::MediaTool`]; this crate plans the
//! work and runs it in order.

pub mod captions;
pub mod config;
pub mod logging;
pub mod models;
pub mod orchestrator;
pub mod selection;
pub mod timeline;
pub mod tools;

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
