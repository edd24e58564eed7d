//! Composition pipeline steps.

mod captions;
mod concat;
mod finish;
mod normalize;
mod reconcile;
mod render;

pub use captions::CaptionsStep;
pub use concat::ConcatStep;
pub use finish::{
    fade_filter, music_gain_db, music_invocation, video_pass_invocation, watermark_filter,
    FinishStep,
};
pub use normalize::NormalizeStep;
pub use reconcile::ReconcileStep;
pub use render::{burn_invocation, subtitles_filter, RenderStep};
