//! ibus-libpinyin-core
//!
//! Backend that an IBus Chinese input method uses to drive a libpinyin-style
//! conversion engine. It owns one context per input family (Pinyin and
//! Bopomofo), creates each lazily, pushes the configured keyboard scheme and
//! option flags into it on every instance allocation, and coalesces user data
//! saves behind a quiet-period timer.
//!
//! Public API:
//! - `ConversionBackend` - context lifecycle, options, debounced saves
//! - `BackendSlot` - the single live backend of an application
//! - `ConversionEngine` / `ConversionContext` - engine capability traits
//! - `UserDictEngine` - pure-Rust engine over a `redb` user dictionary
//! - `LibPinyinEngine` - system libpinyin (feature `system-libpinyin`)
//! - `BackendConfig`, `ConfigSource` - per-family configuration
//! - `Clock`, `Scheduler`, `TimerQueue` - host timer integration
//!
//! ```rust
//! use ibus_libpinyin_core::{
//!     BackendConfig, ConversionBackend, Family, ManualClock, StoragePaths, TimerQueue,
//!     UserDictEngine,
//! };
//!
//! let data = std::env::temp_dir();
//! let clock = ManualClock::new();
//! let mut backend = ConversionBackend::new(
//!     UserDictEngine::new(),
//!     BackendConfig::default(),
//!     StoragePaths::without_user_dirs().with_data_dir(&data),
//!     TimerQueue::new(clock.clone()),
//!     clock,
//! );
//! let instance = backend.alloc_instance(Family::Pinyin).unwrap();
//! instance.learn("你好");
//! backend.modified();
//! backend.free_instance(Family::Pinyin, instance);
//! ```

pub mod backend;
pub use backend::{ConversionBackend, InstanceOf};

pub mod config;
pub use config::{BackendConfig, BopomofoConfig, ConfigFile, ConfigSource, FamilyOptions, PinyinConfig, SharedConfig};

pub mod engine;
pub use engine::{ConversionContext, ConversionEngine, Family};

pub mod error;
pub use error::{BackendError, ConfigError, EngineError, LifecycleError};

pub mod lifecycle;
pub use lifecycle::BackendSlot;

pub mod options;
pub use options::EngineOptions;

pub mod paths;
pub use paths::{ensure_private_dir, StoragePaths, SYSTEM_DATA_DIR};

pub mod scheme;
pub use scheme::{ChewingScheme, DoublePinyinScheme, KeyboardScheme};

pub mod timer;
pub use timer::{
    Clock, ManualClock, SaveDebouncer, Scheduler, SystemClock, TimerAction, TimerId, TimerQueue,
    SAVE_TIMEOUT,
};

pub mod userdict;
pub use userdict::{UserDict, USERDICT_FILE};

pub mod userdict_engine;
pub use userdict_engine::{UserDictContext, UserDictEngine, UserDictInstance};

#[cfg(feature = "system-libpinyin")]
pub mod libpinyin;
#[cfg(feature = "system-libpinyin")]
pub use libpinyin::{LibPinyinContext, LibPinyinEngine, LibPinyinInstance};
