//! Settings file handling.
//!
//! Settings live in one TOML file with a table per [`ConfigSection`].
//! Missing keys take their defaults; values that would make every job fail
//! are rejected on load.
//!
//! ```no_run
//! use reel_core::config::{ConfigManager, ConfigSection};
//!
//! let mut config = ConfigManager::new(".config/settings.toml");
//! config.load_or_create()?;
//! config.settings_mut().captions.max_words = 8;
//! config.update_section(ConfigSection::Captions)?;
//! # Ok::<(), reel_core::config::ConfigError>(())
//! ```

mod manager;
mod settings;

pub use manager::{ConfigError, ConfigManager, ConfigResult};
pub use settings::{
    BurnSettings, CaptionSettings, CompositionSettings, ConfigSection, FinishSettings,
    LoggingSettings, PathSettings, ReconcileSettings, SelectionSettings, Settings, ToolSettings,
};
