//! Video timeline assembly.
//!
//! ```text
//! clips ─► normalize ─► concat ─► reconcile (+ audio) ─► muxed track
//! ```
//!
//! Each stage degrades instead of failing where it can: concatenation keeps
//! the longest prefix that joins, and reconciliation passes the video
//! through untouched when the tool fails.

pub mod concat;
pub mod normalize;
pub mod reconcile;

pub use concat::{concatenate, ConcatError, ConcatOutcome};
pub use normalize::{normalize_clip, normalize_clips, NormalizeBatch, NormalizeError};
pub use reconcile::{ReconcileOutcome, ReconcilePlan, Reconciler};
