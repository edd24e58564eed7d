//! Data models for Reelsmith.
//!
//! This module contains the core data structures passed between components:
//! - Media structures (clips, normalized clips, tracks, target format)
//! - Job structures (composition request, caption source)

mod jobs;
mod media;

pub use jobs::{CaptionSource, CompositionJob};
pub use media::{Clip, NormalizedClip, TargetFormat, Track, TrackKind};
