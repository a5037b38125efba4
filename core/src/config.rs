//! Per-family configuration and the sources the backend reads it from.
//!
//! The backend never caches configuration: every instance allocation asks its
//! `ConfigSource` again, so edits take effect on the next allocation.
//!
//! # Example
//!
//! ```rust
//! use ibus_libpinyin_core::{BackendConfig, ConfigSource, EngineOptions, Family};
//!
//! let config = BackendConfig::from_toml_str("[pinyin]\ndouble_pinyin_schema = 5\n").unwrap();
//! let options = config.options(Family::Pinyin);
//! assert_eq!(options.keyboard, 5);
//! assert!(options.flags.contains(EngineOptions::PINYIN_INCOMPLETE));
//! ```

use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::engine::Family;
use crate::error::ConfigError;
use crate::options::EngineOptions;

/// What the backend pushes into a context on every allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FamilyOptions {
    /// Keyboard scheme selector code.
    pub keyboard: i32,
    pub flags: EngineOptions,
}

/// Read-only configuration collaborator, queried per family.
pub trait ConfigSource {
    fn options(&self, family: Family) -> FamilyOptions;
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PinyinConfig {
    /// Double pinyin keyboard code (0 Microsoft .. 5 XiaoHe)
    pub double_pinyin_schema: i32,
    /// Match syllables typed without their final ("zh" → "zhi", "zhong", ...)
    pub pinyin_incomplete: bool,
    pub correct_gn_ng: bool,
    pub correct_mg_ng: bool,
    pub correct_iou_iu: bool,
    pub correct_uei_ui: bool,
    pub correct_uen_un: bool,
    pub correct_ue_ve: bool,
    pub correct_v_u: bool,
    pub correct_on_ong: bool,
    /// Fuzzy rules such as "z=zh" or "an=ang"
    pub fuzzy: Vec<String>,
    /// Let the engine adapt phrase frequencies to the user
    pub dynamic_adjust: bool,
}

impl Default for PinyinConfig {
    fn default() -> Self {
        Self {
            double_pinyin_schema: 0,
            pinyin_incomplete: true,
            correct_gn_ng: true,
            correct_mg_ng: true,
            correct_iou_iu: true,
            correct_uei_ui: true,
            correct_uen_un: true,
            correct_ue_ve: true,
            correct_v_u: true,
            correct_on_ong: true,
            fuzzy: vec![],
            dynamic_adjust: true,
        }
    }
}

impl PinyinConfig {
    /// Engine flags described by this configuration.
    pub fn option(&self) -> EngineOptions {
        let mut flags = fuzzy_flags(&self.fuzzy);
        let toggles = [
            (self.pinyin_incomplete, EngineOptions::PINYIN_INCOMPLETE),
            (self.correct_gn_ng, EngineOptions::PINYIN_CORRECT_GN_NG),
            (self.correct_mg_ng, EngineOptions::PINYIN_CORRECT_MG_NG),
            (self.correct_iou_iu, EngineOptions::PINYIN_CORRECT_IOU_IU),
            (self.correct_uei_ui, EngineOptions::PINYIN_CORRECT_UEI_UI),
            (self.correct_uen_un, EngineOptions::PINYIN_CORRECT_UEN_UN),
            (self.correct_ue_ve, EngineOptions::PINYIN_CORRECT_UE_VE),
            (self.correct_v_u, EngineOptions::PINYIN_CORRECT_V_U),
            (self.correct_on_ong, EngineOptions::PINYIN_CORRECT_ON_ONG),
            (self.dynamic_adjust, EngineOptions::DYNAMIC_ADJUST),
        ];
        for (enabled, flag) in toggles {
            flags.set(flag, enabled);
        }
        flags
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct BopomofoConfig {
    /// Bopomofo keyboard code (0 Standard, 1 Ginyieh, 2 ETen, 3 IBM)
    pub bopomofo_keyboard_mapping: i32,
    pub chewing_incomplete: bool,
    pub fuzzy: Vec<String>,
    pub dynamic_adjust: bool,
}

impl Default for BopomofoConfig {
    fn default() -> Self {
        Self {
            bopomofo_keyboard_mapping: 0,
            chewing_incomplete: true,
            fuzzy: vec![],
            dynamic_adjust: true,
        }
    }
}

impl BopomofoConfig {
    pub fn option(&self) -> EngineOptions {
        let mut flags = fuzzy_flags(&self.fuzzy);
        flags.set(EngineOptions::CHEWING_INCOMPLETE, self.chewing_incomplete);
        flags.set(EngineOptions::DYNAMIC_ADJUST, self.dynamic_adjust);
        flags
    }
}

fn fuzzy_flags(rules: &[String]) -> EngineOptions {
    let mut flags = EngineOptions::empty();
    for rule in rules {
        match EngineOptions::from_fuzzy_rule(rule) {
            Some(flag) => flags |= flag,
            None => warn!(rule = %rule, "ignoring unsupported fuzzy rule"),
        }
    }
    flags
}

/// Configuration for both families, as stored in TOML.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct BackendConfig {
    pub pinyin: PinyinConfig,
    pub bopomofo: BopomofoConfig,
}

impl BackendConfig {
    /// Load configuration from a TOML file.
    pub fn load_toml<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(Self::from_toml_str(&content)?)
    }

    /// Save configuration to a TOML file.
    pub fn save_toml<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = self.to_toml_string()?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

impl ConfigSource for BackendConfig {
    fn options(&self, family: Family) -> FamilyOptions {
        match family {
            Family::Pinyin => FamilyOptions {
                keyboard: self.pinyin.double_pinyin_schema,
                flags: self.pinyin.option(),
            },
            Family::Bopomofo => FamilyOptions {
                keyboard: self.bopomofo.bopomofo_keyboard_mapping,
                flags: self.bopomofo.option(),
            },
        }
    }
}

/// Configuration handle shared between the host and the backend.
///
/// The host keeps a clone and edits it when the user changes preferences.
#[derive(Debug, Clone, Default)]
pub struct SharedConfig {
    inner: Rc<RefCell<BackendConfig>>,
}

impl SharedConfig {
    pub fn new(config: BackendConfig) -> Self {
        Self {
            inner: Rc::new(RefCell::new(config)),
        }
    }

    pub fn update<F: FnOnce(&mut BackendConfig)>(&self, edit: F) {
        edit(&mut self.inner.borrow_mut());
    }

    pub fn get(&self) -> BackendConfig {
        self.inner.borrow().clone()
    }
}

impl ConfigSource for SharedConfig {
    fn options(&self, family: Family) -> FamilyOptions {
        self.inner.borrow().options(family)
    }
}

/// Re-reads a TOML file on every query.
///
/// A missing or malformed file keeps the last configuration that loaded
/// (defaults before the first success).
#[derive(Debug)]
pub struct ConfigFile {
    path: PathBuf,
    last_good: RefCell<BackendConfig>,
}

impl ConfigFile {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            last_good: RefCell::new(BackendConfig::default()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reload from disk, returning the configuration now in effect.
    pub fn current(&self) -> BackendConfig {
        match BackendConfig::load_toml(&self.path) {
            Ok(config) => {
                *self.last_good.borrow_mut() = config.clone();
                config
            }
            Err(err) if err.is_not_found() => {
                debug!(path = ?self.path, "no configuration file; keeping previous configuration");
                self.last_good.borrow().clone()
            }
            Err(err) => {
                warn!(path = ?self.path, error = %err, "keeping previous configuration");
                self.last_good.borrow().clone()
            }
        }
    }
}

impl ConfigSource for ConfigFile {
    fn options(&self, family: Family) -> FamilyOptions {
        self.current().options(family)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_enable_incomplete_and_corrections() {
        let cfg = BackendConfig::default();
        let pinyin = cfg.options(Family::Pinyin);
        assert_eq!(pinyin.keyboard, 0);
        assert!(pinyin.flags.contains(EngineOptions::PINYIN_INCOMPLETE));
        assert!(pinyin.flags.contains(EngineOptions::PINYIN_CORRECT_ALL));
        assert!(!pinyin.flags.intersects(EngineOptions::PINYIN_AMB_ALL));

        let bopomofo = cfg.options(Family::Bopomofo);
        assert!(bopomofo.flags.contains(EngineOptions::CHEWING_INCOMPLETE));
        assert!(!bopomofo.flags.contains(EngineOptions::PINYIN_INCOMPLETE));
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let cfg = BackendConfig::from_toml_str(
            r#"
            [pinyin]
            double_pinyin_schema = 3
            correct_v_u = false
            fuzzy = ["zh=z", "an=ang", "bogus=rule"]

            [bopomofo]
            bopomofo_keyboard_mapping = 2
            "#,
        )
        .unwrap();

        let pinyin = cfg.options(Family::Pinyin);
        assert_eq!(pinyin.keyboard, 3);
        assert!(!pinyin.flags.contains(EngineOptions::PINYIN_CORRECT_V_U));
        assert!(pinyin.flags.contains(EngineOptions::PINYIN_CORRECT_UE_VE));
        assert!(pinyin.flags.contains(EngineOptions::PINYIN_AMB_Z_ZH));
        assert!(pinyin.flags.contains(EngineOptions::PINYIN_AMB_AN_ANG));
        assert!(!pinyin.flags.contains(EngineOptions::PINYIN_AMB_L_N));
        assert_eq!(cfg.options(Family::Bopomofo).keyboard, 2);
    }

    #[test]
    fn toml_string_roundtrip() {
        let mut cfg = BackendConfig::default();
        cfg.bopomofo.fuzzy = vec!["in=ing".into()];
        let text = cfg.to_toml_string().unwrap();
        assert_eq!(BackendConfig::from_toml_str(&text).unwrap(), cfg);
    }

    #[test]
    fn shared_config_edits_are_visible() {
        let shared = SharedConfig::default();
        let handle = shared.clone();
        handle.update(|cfg| cfg.pinyin.double_pinyin_schema = 4);
        assert_eq!(shared.options(Family::Pinyin).keyboard, 4);
    }

    #[test]
    fn config_file_keeps_last_good_on_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("backend.toml");
        let source = ConfigFile::new(&path);

        // Missing file: defaults.
        assert_eq!(source.options(Family::Pinyin).keyboard, 0);

        std::fs::write(&path, "[pinyin]\ndouble_pinyin_schema = 1\n").unwrap();
        assert_eq!(source.options(Family::Pinyin).keyboard, 1);

        std::fs::write(&path, "[pinyin\nnot toml").unwrap();
        assert_eq!(source.options(Family::Pinyin).keyboard, 1);
    }

    #[test]
    fn only_absent_files_count_as_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let missing = BackendConfig::load_toml(dir.path().join("absent.toml")).unwrap_err();
        assert!(missing.is_not_found());

        let path = dir.path().join("broken.toml");
        std::fs::write(&path, "[pinyin\nnot toml").unwrap();
        let broken = BackendConfig::load_toml(&path).unwrap_err();
        assert!(!broken.is_not_found());

        // A directory is unreadable as a file, not absent.
        let unreadable = BackendConfig::load_toml(dir.path()).unwrap_err();
        assert!(!unreadable.is_not_found());
    }
}
