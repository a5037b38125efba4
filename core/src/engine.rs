//! Capability interface between the backend and a conversion engine.
//!
//! The backend never converts anything itself. It only sequences calls on an
//! engine: create a context per family, push scheme and option settings into
//! it, hand out instances and ask it to persist user data. Dropping a context
//! is the engine's teardown.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::error::EngineError;
use crate::options::EngineOptions;
use crate::scheme::KeyboardScheme;

/// Input scheme family. Each family owns one context and one user store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Family {
    /// Full and double pinyin.
    Pinyin,
    /// Bopomofo (zhuyin), called "chewing" by libpinyin.
    Bopomofo,
}

impl Family {
    pub const ALL: [Family; 2] = [Family::Pinyin, Family::Bopomofo];

    /// Directory name of this family's user data below the cache root.
    pub fn user_subdir(self) -> &'static str {
        match self {
            Family::Pinyin => "libpinyin",
            Family::Bopomofo => "libbopomofo",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Family::Pinyin => "pinyin",
            Family::Bopomofo => "bopomofo",
        }
    }
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Family {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pinyin" => Ok(Family::Pinyin),
            "bopomofo" | "zhuyin" | "chewing" => Ok(Family::Bopomofo),
            other => Err(format!("unknown family '{}', expected pinyin or bopomofo", other)),
        }
    }
}

/// Factory for per-family conversion contexts.
pub trait ConversionEngine {
    type Context: ConversionContext;

    /// Load a context from the read-only system data and an optional
    /// writable user directory. Without a user directory the context keeps no
    /// persistent user adaptation.
    fn init_context(
        &self,
        family: Family,
        data_dir: &Path,
        user_dir: Option<&Path>,
    ) -> Result<Self::Context, EngineError>;
}

/// Engine state for one family.
pub trait ConversionContext {
    /// Handle for one stream of conversion requests.
    type Instance;

    fn alloc_instance(&mut self) -> Result<Self::Instance, EngineError>;

    fn free_instance(&mut self, instance: Self::Instance);

    fn set_keyboard_scheme(&mut self, scheme: KeyboardScheme) -> Result<(), EngineError>;

    fn set_options(&mut self, options: EngineOptions) -> Result<(), EngineError>;

    /// Persist the user adaptive data held by this context.
    fn save(&mut self) -> Result<(), EngineError>;
}
