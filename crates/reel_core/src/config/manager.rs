//! Reading and writing `settings.toml`.
//!
//! Writes go through a temporary file in the target directory that is then
//! persisted over the real file. Rewriting a single section edits the
//! on-disk document with `toml_edit`, so other sections keep their comments.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use thiserror::Error;
use toml_edit::{DocumentMut, Item};

use super::settings::{ConfigSection, Settings};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot access config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Malformed config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Cannot serialize settings: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Cannot edit config document: {0}")]
    Edit(#[from] toml_edit::TomlError),

    #[error("No config file at {}", .0.display())]
    NotFound(PathBuf),

    #[error("Invalid config: {}", .0.join("; "))]
    Invalid(Vec<String>),

    #[error("Unknown setting '{0}' (expected <section>.<key>)")]
    UnknownKey(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Owns the settings file and the settings read from it.
pub struct ConfigManager {
    path: PathBuf,
    settings: Settings,
}

impl ConfigManager {
    /// Manager for `path` holding default settings. Nothing is read until
    /// [`load`](Self::load) or [`load_or_create`](Self::load_or_create).
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            settings: Settings::default(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// In-memory only until [`save`](Self::save) or
    /// [`update_section`](Self::update_section).
    pub fn settings_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    pub fn into_settings(self) -> Settings {
        self.settings
    }

    /// Read and validate an existing file.
    pub fn load(&mut self) -> ConfigResult<()> {
        let text = self.read()?.ok_or_else(|| ConfigError::NotFound(self.path.clone()))?;
        self.settings = validated(&text)?;
        Ok(())
    }

    /// Read the file, or write one with defaults when there is none. A file
    /// missing a section, or carrying a table we don't know, is rewritten.
    pub fn load_or_create(&mut self) -> ConfigResult<()> {
        match self.read()? {
            Some(text) => {
                self.settings = validated(&text)?;
                if !has_canonical_tables(&text.parse()?) {
                    tracing::debug!("Rewriting config {}", self.path.display());
                    self.save()?;
                }
            }
            None => {
                tracing::info!("Creating default config at {}", self.path.display());
                self.settings = Settings::default();
                self.save()?;
            }
        }
        Ok(())
    }

    /// Create the output, scratch and logs folders.
    pub fn ensure_dirs_exist(&self) -> ConfigResult<()> {
        let paths = &self.settings.paths;
        for dir in [&paths.output_folder, &paths.temp_root, &paths.logs_folder] {
            fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
                path: PathBuf::from(dir),
                source,
            })?;
        }
        Ok(())
    }

    pub fn logs_folder(&self) -> PathBuf {
        PathBuf::from(&self.settings.paths.logs_folder)
    }

    /// Replace the whole file with the current settings.
    pub fn save(&self) -> ConfigResult<()> {
        let mut text = String::from(
            "# Reelsmith settings\n# Sections rewritten by `reel` keep the comments of the others.\n",
        );
        for section in ConfigSection::ALL {
            text.push_str(&format!(
                "\n# {}\n[{}]\n{}",
                section.comment(),
                section.table_name(),
                self.section_body(section)?
            ));
        }
        self.replace_file(&text)
    }

    /// Write one section from memory into the on-disk document, leaving
    /// the rest of the file as it is.
    pub fn update_section(&mut self, section: ConfigSection) -> ConfigResult<()> {
        let mut doc = match self.read()? {
            Some(text) => text.parse::<DocumentMut>()?,
            None => DocumentMut::new(),
        };

        let fresh: DocumentMut = self.section_body(section)?.parse()?;
        doc[section.table_name()] = Item::Table(fresh.as_table().clone());

        self.replace_file(&doc.to_string())
    }

    /// Set `section.key` from its TOML text and write that section back.
    /// Text that is not a TOML value is taken as a string, so
    /// `output_folder renders` works without quotes.
    pub fn set_value(&mut self, key: &str, raw: &str) -> ConfigResult<ConfigSection> {
        let unknown = || ConfigError::UnknownKey(key.to_string());
        let (table, field) = key.split_once('.').ok_or_else(unknown)?;
        let section = ConfigSection::ALL
            .into_iter()
            .find(|s| s.table_name() == table)
            .ok_or_else(unknown)?;

        let mut tree = toml::Value::try_from(&self.settings)?;
        let slot = tree
            .get_mut(table)
            .and_then(|t| t.get_mut(field))
            .ok_or_else(unknown)?;
        *slot = parse_value(raw);

        let updated: Settings = tree.try_into()?;
        let problems = updated.validate();
        if !problems.is_empty() {
            return Err(ConfigError::Invalid(problems));
        }

        self.settings = updated;
        self.update_section(section)?;
        Ok(section)
    }

    /// Key/value lines of one section, without its header.
    fn section_body(&self, section: ConfigSection) -> ConfigResult<String> {
        let s = &self.settings;
        let body = match section {
            ConfigSection::Paths => toml::to_string_pretty(&s.paths),
            ConfigSection::Logging => toml::to_string_pretty(&s.logging),
            ConfigSection::Composition => toml::to_string_pretty(&s.composition),
            ConfigSection::Reconcile => toml::to_string_pretty(&s.reconcile),
            ConfigSection::Captions => toml::to_string_pretty(&s.captions),
            ConfigSection::Burn => toml::to_string_pretty(&s.burn),
            ConfigSection::Tools => toml::to_string_pretty(&s.tools),
            ConfigSection::Selection => toml::to_string_pretty(&s.selection),
            ConfigSection::Finish => toml::to_string_pretty(&s.finish),
        }?;
        Ok(body)
    }

    fn read(&self) -> ConfigResult<Option<String>> {
        match fs::read_to_string(&self.path) {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(self.io_error(source)),
        }
    }

    fn replace_file(&self, text: &str) -> ConfigResult<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir).map_err(|e| self.io_error(e))?;

        let mut staged = NamedTempFile::new_in(dir).map_err(|e| self.io_error(e))?;
        staged
            .write_all(text.as_bytes())
            .and_then(|()| staged.as_file().sync_all())
            .map_err(|e| self.io_error(e))?;
        staged
            .persist(&self.path)
            .map_err(|e| self.io_error(e.error))?;
        Ok(())
    }

    fn io_error(&self, source: io::Error) -> ConfigError {
        ConfigError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

fn parse_value(raw: &str) -> toml::Value {
    toml::from_str::<toml::Table>(&format!("value = {}", raw))
        .ok()
        .and_then(|mut table| table.remove("value"))
        .unwrap_or_else(|| toml::Value::String(raw.to_string()))
}

fn validated(text: &str) -> ConfigResult<Settings> {
    let settings: Settings = toml::from_str(text)?;
    match settings.validate() {
        problems if problems.is_empty() => Ok(settings),
        problems => Err(ConfigError::Invalid(problems)),
    }
}

/// Every known section present and nothing else at the top level.
fn has_canonical_tables(doc: &DocumentMut) -> bool {
    let known = |key: &str| ConfigSection::ALL.iter().any(|s| s.table_name() == key);
    doc.iter().all(|(key, _)| known(key))
        && ConfigSection::ALL.iter().all(|s| doc.contains_key(s.table_name()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn first_run_writes_every_section() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(".config").join("settings.toml");

        let mut manager = ConfigManager::new(&path);
        manager.load_or_create().unwrap();

        let text = fs::read_to_string(&path).unwrap();
        for section in ConfigSection::ALL {
            assert!(text.contains(&format!("[{}]", section.table_name())));
        }

        let mut reloaded = ConfigManager::new(&path);
        reloaded.load().unwrap();
        assert_eq!(reloaded.settings().composition.crf, 23);
        assert_eq!(reloaded.settings().burn.font_name, "Arial");
    }

    #[test]
    fn partial_file_keeps_values_and_gains_sections() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        fs::write(&path, "[paths]\noutput_folder = \"renders\"\n\n[legacy]\nx = 1\n").unwrap();

        let mut manager = ConfigManager::new(&path);
        manager.load_or_create().unwrap();
        assert_eq!(manager.settings().paths.output_folder, "renders");

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("[reconcile]"));
        assert!(text.contains("\"renders\""));
        assert!(!text.contains("[legacy]"));
    }

    #[test]
    fn out_of_range_value_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        fs::write(&path, "[captions]\nmax_words = 0\n").unwrap();

        let err = ConfigManager::new(&path).load().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
        assert!(err.to_string().contains("max_words"));
    }

    #[test]
    fn absent_file_is_not_found() {
        let dir = tempdir().unwrap();
        let mut manager = ConfigManager::new(dir.path().join("absent.toml"));
        assert!(matches!(manager.load(), Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn set_value_writes_one_key() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        let mut manager = ConfigManager::new(&path);
        manager.load_or_create().unwrap();

        assert_eq!(manager.set_value("captions.max_words", "8").unwrap(), ConfigSection::Captions);
        manager.set_value("finish.watermark_text", "Harbour Films").unwrap();
        manager.set_value("reconcile.tolerance_secs", "1").unwrap();

        let mut reloaded = ConfigManager::new(&path);
        reloaded.load().unwrap();
        assert_eq!(reloaded.settings().captions.max_words, 8);
        assert_eq!(reloaded.settings().finish.watermark_text, "Harbour Films");
        assert_eq!(reloaded.settings().reconcile.tolerance_secs, 1.0);
    }

    #[test]
    fn set_value_rejects_bad_keys_and_values() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        let mut manager = ConfigManager::new(&path);
        manager.load_or_create().unwrap();

        assert!(matches!(manager.set_value("captions", "8"), Err(ConfigError::UnknownKey(_))));
        assert!(matches!(
            manager.set_value("captions.max_lines", "2"),
            Err(ConfigError::UnknownKey(_))
        ));
        assert!(matches!(manager.set_value("captions.max_words", "0"), Err(ConfigError::Invalid(_))));
        assert!(matches!(manager.set_value("captions.max_words", "many"), Err(ConfigError::Parse(_))));
        assert_eq!(manager.settings().captions.max_words, 10);
    }

    #[test]
    fn section_update_keeps_other_comments() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.toml");

        let mut manager = ConfigManager::new(&path);
        manager.load_or_create().unwrap();
        manager.settings_mut().reconcile.tolerance_secs = 0.75;
        manager.update_section(ConfigSection::Reconcile).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("tolerance_secs = 0.75"));
        assert!(text.contains(&format!("# {}", ConfigSection::Paths.comment())));

        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path() != path)
            .collect();
        assert!(leftovers.is_empty());
    }
}
