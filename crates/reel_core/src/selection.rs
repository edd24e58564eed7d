//! Clip pre-selection.
//!
//! Narrows a probed clip catalog before composition: drop clips outside a
//! duration window or below a resolution floor, then order the rest by
//! pixel count, highest first.

use crate::config::SelectionSettings;
use crate::models::Clip;

/// Keep clips whose duration lies in `[min_secs, max_secs]`.
pub fn filter_by_duration(clips: Vec<Clip>, min_secs: f64, max_secs: f64) -> Vec<Clip> {
    clips
        .into_iter()
        .filter(|c| c.duration >= min_secs && c.duration <= max_secs)
        .collect()
}

/// Keep clips at least `min_width` × `min_height`.
pub fn filter_by_resolution(clips: Vec<Clip>, min_width: u32, min_height: u32) -> Vec<Clip> {
    clips
        .into_iter()
        .filter(|c| c.width >= min_width && c.height >= min_height)
        .collect()
}

/// Order by pixel count, highest first. Ties keep their input order.
pub fn sort_by_quality(mut clips: Vec<Clip>) -> Vec<Clip> {
    clips.sort_by(|a, b| b.pixel_count().cmp(&a.pixel_count()));
    clips
}

/// Apply every filter from `settings`, then order by quality.
pub fn select_clips(clips: Vec<Clip>, settings: &SelectionSettings) -> Vec<Clip> {
    let total = clips.len();
    let clips = filter_by_duration(clips, settings.min_duration_secs, settings.max_duration_secs);
    let clips = filter_by_resolution(clips, settings.min_width, settings.min_height);

    if clips.len() < total {
        tracing::debug!("Selection kept {} of {} clips", clips.len(), total);
    }

    sort_by_quality(clips)
}
