//! Settings, one struct per TOML table.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::logging::LogLevel;
use crate::models::TargetFormat;

/// Everything read from `settings.toml`. Every table may be omitted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub paths: PathSettings,

    #[serde(default)]
    pub logging: LoggingSettings,

    /// Output format and encoder settings.
    #[serde(default)]
    pub composition: CompositionSettings,

    /// Video/audio duration reconciliation thresholds.
    #[serde(default)]
    pub reconcile: ReconcileSettings,

    /// Caption chunking and timing.
    #[serde(default)]
    pub captions: CaptionSettings,

    /// Burned-in caption style.
    #[serde(default)]
    pub burn: BurnSettings,

    /// External tool configuration.
    #[serde(default)]
    pub tools: ToolSettings,

    /// Clip pre-selection filters.
    #[serde(default)]
    pub selection: SelectionSettings,

    /// Optional passes over the rendered output.
    #[serde(default)]
    pub finish: FinishSettings,
}

impl Settings {
    /// One message per value that would make every job fail.
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();

        if !self.composition.target().is_valid() {
            problems.push("composition: width, height and frame_rate must be positive".into());
        }
        if !(self.reconcile.tolerance_secs.is_finite() && self.reconcile.tolerance_secs >= 0.0) {
            problems.push("reconcile.tolerance_secs must be a non-negative number".into());
        }
        if !(self.reconcile.loop_audio_below > 0.0 && self.reconcile.loop_audio_below < 1.0) {
            problems.push("reconcile.loop_audio_below must be between 0 and 1".into());
        }
        if !(self.reconcile.max_stretch_ratio >= 1.0 && self.reconcile.max_stretch_ratio.is_finite()) {
            problems.push("reconcile.max_stretch_ratio must be at least 1.0".into());
        }
        if self.captions.max_words == 0 || self.captions.max_chars == 0 {
            problems.push("captions.max_words and captions.max_chars must be at least 1".into());
        }
        if !(self.captions.chars_per_second > 0.0) {
            problems.push("captions.chars_per_second must be positive".into());
        }
        if !(self.captions.min_display_secs > 0.0
            && self.captions.min_display_secs <= self.captions.max_display_secs)
        {
            problems.push("captions: min_display_secs must be positive and <= max_display_secs".into());
        }
        if self.tools.max_concurrent == 0 {
            problems.push("tools.max_concurrent must be at least 1".into());
        }
        if self.tools.timeout_secs == 0 {
            problems.push("tools.timeout_secs must be at least 1".into());
        }
        if self.selection.min_duration_secs > self.selection.max_duration_secs {
            problems.push("selection: min_duration_secs exceeds max_duration_secs".into());
        }
        if !(self.finish.fade_secs.is_finite() && self.finish.fade_secs >= 0.0) {
            problems.push("finish.fade_secs must be a non-negative number".into());
        }
        if !(0.0..=1.0).contains(&self.finish.music_volume) {
            problems.push("finish.music_volume must be between 0 and 1".into());
        }

        problems
    }
}

/// Where renders, scratch files and logs go.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathSettings {
    /// Default folder for finished videos.
    #[serde(default = "default_output_folder")]
    pub output_folder: String,

    /// Root folder for per-job scratch directories.
    #[serde(default = "default_temp_root")]
    pub temp_root: String,

    /// Folder for log files.
    #[serde(default = "default_logs_folder")]
    pub logs_folder: String,
}

fn default_output_folder() -> String {
    "reel_output".to_string()
}

fn default_temp_root() -> String {
    ".temp".to_string()
}

fn default_logs_folder() -> String {
    ".logs".to_string()
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            output_folder: default_output_folder(),
            temp_root: default_temp_root(),
            logs_folder: default_logs_folder(),
        }
    }
}

/// The `[logging]` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Minimum level written to job logs and the console.
    #[serde(default)]
    pub level: LogLevel,

    /// Use compact log format (tool output only shown on failure).
    #[serde(default = "default_true")]
    pub compact: bool,

    /// Number of tool output lines to show on failure.
    #[serde(default = "default_error_tail")]
    pub error_tail: u32,

    /// Compact logs record progress once per this many percent.
    #[serde(default = "default_progress_step")]
    pub progress_step: u32,

    /// Log every tool command line.
    #[serde(default = "default_true")]
    pub show_commands: bool,

    /// Write a JSON job report next to the job log.
    #[serde(default)]
    pub write_report: bool,
}

fn default_true() -> bool {
    true
}

fn default_error_tail() -> u32 {
    20
}

fn default_progress_step() -> u32 {
    20
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: LogLevel::default(),
            compact: true,
            error_tail: default_error_tail(),
            progress_step: default_progress_step(),
            show_commands: true,
            write_report: false,
        }
    }
}

/// Output format and encoder settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompositionSettings {
    /// Output width in pixels.
    #[serde(default = "default_width")]
    pub width: u32,

    /// Output height in pixels.
    #[serde(default = "default_height")]
    pub height: u32,

    /// Output frame rate.
    #[serde(default = "default_frame_rate")]
    pub frame_rate: u32,

    /// Video encoder.
    #[serde(default = "default_video_codec")]
    pub video_codec: String,

    /// Encoder preset.
    #[serde(default = "default_preset")]
    pub preset: String,

    /// Constant rate factor.
    #[serde(default = "default_crf")]
    pub crf: u32,

    /// Audio encoder used whenever audio has to be re-encoded.
    #[serde(default = "default_audio_codec")]
    pub audio_codec: String,
}

fn default_width() -> u32 {
    1920
}

fn default_height() -> u32 {
    1080
}

fn default_frame_rate() -> u32 {
    30
}

fn default_video_codec() -> String {
    "libx264".to_string()
}

fn default_preset() -> String {
    "medium".to_string()
}

fn default_crf() -> u32 {
    23
}

fn default_audio_codec() -> String {
    "aac".to_string()
}

impl CompositionSettings {
    /// Target format built from width, height and frame rate.
    pub fn target(&self) -> TargetFormat {
        TargetFormat::new(self.width, self.height, self.frame_rate)
    }

    /// Encoder options shared by every re-encoding invocation.
    pub fn video_encoder_args(&self) -> Vec<String> {
        vec![
            "-c:v".to_string(),
            self.video_codec.clone(),
            "-preset".to_string(),
            self.preset.clone(),
            "-crf".to_string(),
            self.crf.to_string(),
            "-pix_fmt".to_string(),
            "yuv420p".to_string(),
        ]
    }
}

impl Default for CompositionSettings {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            frame_rate: default_frame_rate(),
            video_codec: default_video_codec(),
            preset: default_preset(),
            crf: default_crf(),
            audio_codec: default_audio_codec(),
        }
    }
}

/// Duration reconciliation thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileSettings {
    /// Durations closer than this are muxed directly.
    #[serde(default = "default_tolerance")]
    pub tolerance_secs: f64,

    /// Loop audio when it is shorter than this fraction of the video.
    #[serde(default = "default_loop_audio_below")]
    pub loop_audio_below: f64,

    /// Largest audio/video ratio handled by slowing the video down.
    #[serde(default = "default_max_stretch")]
    pub max_stretch_ratio: f64,
}

fn default_tolerance() -> f64 {
    2.0
}

fn default_loop_audio_below() -> f64 {
    0.5
}

fn default_max_stretch() -> f64 {
    1.5
}

impl Default for ReconcileSettings {
    fn default() -> Self {
        Self {
            tolerance_secs: default_tolerance(),
            loop_audio_below: default_loop_audio_below(),
            max_stretch_ratio: default_max_stretch(),
        }
    }
}

/// Caption chunking and timing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptionSettings {
    /// Maximum words per caption.
    #[serde(default = "default_max_words")]
    pub max_words: usize,

    /// Maximum characters per caption (a single longer word is kept whole).
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,

    /// Assumed speaking rate when no narration length is known.
    #[serde(default = "default_chars_per_second")]
    pub chars_per_second: f64,

    /// Floor for the estimated narration length.
    #[serde(default = "default_min_estimated")]
    pub min_estimated_secs: f64,

    /// Shortest display time for a caption.
    #[serde(default = "default_min_display")]
    pub min_display_secs: f64,

    /// Longest display time for a caption.
    #[serde(default = "default_max_display")]
    pub max_display_secs: f64,

    /// Re-time captions to the final video length after reconciliation.
    #[serde(default = "default_true")]
    pub realign_to_final_duration: bool,

    /// Allowed overshoot of the last caption past the track end.
    #[serde(default = "default_end_epsilon")]
    pub end_epsilon_secs: f64,
}

fn default_max_words() -> usize {
    10
}

fn default_max_chars() -> usize {
    50
}

fn default_chars_per_second() -> f64 {
    15.0
}

fn default_min_estimated() -> f64 {
    5.0
}

fn default_min_display() -> f64 {
    1.0
}

fn default_max_display() -> f64 {
    10.0
}

fn default_end_epsilon() -> f64 {
    0.001
}

impl Default for CaptionSettings {
    fn default() -> Self {
        Self {
            max_words: default_max_words(),
            max_chars: default_max_chars(),
            chars_per_second: default_chars_per_second(),
            min_estimated_secs: default_min_estimated(),
            min_display_secs: default_min_display(),
            max_display_secs: default_max_display(),
            realign_to_final_duration: true,
            end_epsilon_secs: default_end_epsilon(),
        }
    }
}

/// Style for burned-in captions (ASS `force_style` fields).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BurnSettings {
    /// Burn captions into the picture (otherwise the reconciled track is copied).
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_font_name")]
    pub font_name: String,

    #[serde(default = "default_font_size")]
    pub font_size: u32,

    /// Text colour in ASS `&HAABBGGRR` notation.
    #[serde(default = "default_primary_colour")]
    pub primary_colour: String,

    #[serde(default = "default_outline_colour")]
    pub outline_colour: String,

    #[serde(default = "default_back_colour")]
    pub back_colour: String,

    #[serde(default = "default_true")]
    pub bold: bool,

    #[serde(default)]
    pub italic: bool,

    /// Numpad-style alignment (2 = bottom centre).
    #[serde(default = "default_alignment")]
    pub alignment: u8,
}

fn default_font_name() -> String {
    "Arial".to_string()
}

fn default_font_size() -> u32 {
    24
}

fn default_primary_colour() -> String {
    "&H00FFFFFF".to_string()
}

fn default_outline_colour() -> String {
    "&H00000000".to_string()
}

fn default_back_colour() -> String {
    "&H80000000".to_string()
}

fn default_alignment() -> u8 {
    2
}

impl BurnSettings {
    /// Render as an ASS `force_style` value.
    pub fn force_style(&self) -> String {
        format!(
            "FontName={},FontSize={},PrimaryColour={},OutlineColour={},BackColour={},Bold={},Italic={},Alignment={}",
            self.font_name,
            self.font_size,
            self.primary_colour,
            self.outline_colour,
            self.back_colour,
            u8::from(self.bold),
            u8::from(self.italic),
            self.alignment
        )
    }
}

impl Default for BurnSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            font_name: default_font_name(),
            font_size: default_font_size(),
            primary_colour: default_primary_colour(),
            outline_colour: default_outline_colour(),
            back_colour: default_back_colour(),
            bold: true,
            italic: false,
            alignment: default_alignment(),
        }
    }
}

/// External tool configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSettings {
    #[serde(default = "default_ffmpeg")]
    pub ffmpeg_path: String,

    #[serde(default = "default_ffprobe")]
    pub ffprobe_path: String,

    /// Per-invocation time budget.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Maximum tool processes running at once across all jobs.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
}

fn default_ffmpeg() -> String {
    "ffmpeg".to_string()
}

fn default_ffprobe() -> String {
    "ffprobe".to_string()
}

fn default_timeout() -> u64 {
    600
}

fn default_max_concurrent() -> usize {
    2
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            ffmpeg_path: default_ffmpeg(),
            ffprobe_path: default_ffprobe(),
            timeout_secs: default_timeout(),
            max_concurrent: default_max_concurrent(),
        }
    }
}

/// Clip pre-selection filters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionSettings {
    #[serde(default = "default_min_clip")]
    pub min_duration_secs: f64,

    #[serde(default = "default_max_clip")]
    pub max_duration_secs: f64,

    #[serde(default = "default_min_clip_width")]
    pub min_width: u32,

    #[serde(default = "default_min_clip_height")]
    pub min_height: u32,
}

fn default_min_clip() -> f64 {
    5.0
}

fn default_max_clip() -> f64 {
    60.0
}

fn default_min_clip_width() -> u32 {
    720
}

fn default_min_clip_height() -> u32 {
    480
}

impl Default for SelectionSettings {
    fn default() -> Self {
        Self {
            min_duration_secs: default_min_clip(),
            max_duration_secs: default_max_clip(),
            min_width: default_min_clip_width(),
            min_height: default_min_clip_height(),
        }
    }
}

/// The `[finish]` table. Every pass is off in the defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinishSettings {
    /// Fade the picture in and out over this many seconds. 0 disables.
    #[serde(default)]
    pub fade_secs: f64,

    /// Text drawn in the bottom-right corner. Empty disables.
    #[serde(default)]
    pub watermark_text: String,

    #[serde(default = "default_font_size")]
    pub watermark_font_size: u32,

    /// Music looped under the narration. Empty disables.
    #[serde(default)]
    pub music_path: String,

    /// Music level from 0.0 (-20 dB) to 1.0 (unchanged).
    #[serde(default = "default_music_volume")]
    pub music_volume: f64,
}

fn default_music_volume() -> f64 {
    0.2
}

impl FinishSettings {
    pub fn music(&self) -> Option<&Path> {
        (!self.music_path.trim().is_empty()).then(|| Path::new(self.music_path.trim()))
    }

    pub fn watermark(&self) -> Option<&str> {
        Some(self.watermark_text.trim()).filter(|t| !t.is_empty())
    }

    pub fn is_enabled(&self) -> bool {
        self.fade_secs > 0.0 || self.watermark().is_some() || self.music().is_some()
    }
}

impl Default for FinishSettings {
    fn default() -> Self {
        Self {
            fade_secs: 0.0,
            watermark_text: String::new(),
            watermark_font_size: default_font_size(),
            music_path: String::new(),
            music_volume: default_music_volume(),
        }
    }
}

/// A top-level table of the settings file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigSection {
    Paths,
    Logging,
    Composition,
    Reconcile,
    Captions,
    Burn,
    Tools,
    Selection,
    Finish,
}

impl ConfigSection {
    /// All sections in file order.
    pub const ALL: [ConfigSection; 9] = [
        ConfigSection::Paths,
        ConfigSection::Logging,
        ConfigSection::Composition,
        ConfigSection::Reconcile,
        ConfigSection::Captions,
        ConfigSection::Burn,
        ConfigSection::Tools,
        ConfigSection::Selection,
        ConfigSection::Finish,
    ];

    pub fn table_name(&self) -> &'static str {
        match self {
            ConfigSection::Paths => "paths",
            ConfigSection::Logging => "logging",
            ConfigSection::Composition => "composition",
            ConfigSection::Reconcile => "reconcile",
            ConfigSection::Captions => "captions",
            ConfigSection::Burn => "burn",
            ConfigSection::Tools => "tools",
            ConfigSection::Selection => "selection",
            ConfigSection::Finish => "finish",
        }
    }

    /// Comment written above the section in generated files.
    pub fn comment(&self) -> &'static str {
        match self {
            ConfigSection::Paths => "Output and working directories",
            ConfigSection::Logging => "Logging configuration",
            ConfigSection::Composition => "Output format and encoder",
            ConfigSection::Reconcile => "Video/audio length reconciliation",
            ConfigSection::Captions => "Caption chunking and timing",
            ConfigSection::Burn => "Burned-in caption style",
            ConfigSection::Tools => "External tools (ffmpeg/ffprobe)",
            ConfigSection::Selection => "Clip pre-selection filters",
            ConfigSection::Finish => "Fade, watermark and background music passes",
        }
    }
}
