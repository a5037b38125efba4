//! Pure-Rust conversion engine backed by `UserDict`.
//!
//! It does no conversion of its own. It keeps the state the backend manages
//! (scheme, flags, live instances, learned phrases) so hosts without the
//! system libpinyin, the tools and the tests all drive the real backend
//! sequencing.

use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use tracing::{debug, warn};

use crate::engine::{ConversionContext, ConversionEngine, Family};
use crate::error::EngineError;
use crate::options::EngineOptions;
use crate::scheme::KeyboardScheme;
use crate::userdict::{UserDict, USERDICT_FILE};

#[derive(Debug, Clone, Copy, Default)]
pub struct UserDictEngine;

impl UserDictEngine {
    pub fn new() -> Self {
        Self
    }
}

impl ConversionEngine for UserDictEngine {
    type Context = UserDictContext;

    fn init_context(
        &self,
        family: Family,
        data_dir: &Path,
        user_dir: Option<&Path>,
    ) -> Result<UserDictContext, EngineError> {
        if !data_dir.is_dir() {
            return Err(EngineError::MissingData(data_dir.to_path_buf()));
        }
        let dict = match user_dir {
            Some(dir) => {
                let path = dir.join(USERDICT_FILE);
                match UserDict::open(&path) {
                    Ok(dict) => dict,
                    Err(err) => {
                        warn!(%family, ?path, error = %err, "cannot open user dictionary; learned phrases will not persist");
                        UserDict::in_memory()
                    }
                }
            }
            None => UserDict::in_memory(),
        };
        debug!(%family, entries = dict.len(), persistent = dict.is_persistent(), "opened user dictionary");
        Ok(UserDictContext {
            family,
            data_dir: data_dir.to_path_buf(),
            dict: Rc::new(RefCell::new(dict)),
            scheme: None,
            options: EngineOptions::empty(),
            next_instance: 0,
            live_instances: 0,
        })
    }
}

#[derive(Debug)]
pub struct UserDictContext {
    family: Family,
    data_dir: PathBuf,
    dict: Rc<RefCell<UserDict>>,
    scheme: Option<KeyboardScheme>,
    options: EngineOptions,
    next_instance: u64,
    live_instances: usize,
}

impl UserDictContext {
    pub fn family(&self) -> Family {
        self.family
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// `None` until a scheme has been selected.
    pub fn keyboard_scheme(&self) -> Option<KeyboardScheme> {
        self.scheme
    }

    pub fn options(&self) -> EngineOptions {
        self.options
    }

    pub fn live_instances(&self) -> usize {
        self.live_instances
    }

    pub fn frequency(&self, phrase: &str) -> u64 {
        self.dict.borrow().frequency(phrase)
    }

    pub fn entries(&self) -> Vec<(String, u64)> {
        self.dict.borrow().entries()
    }

    /// False when learned phrases only live in memory.
    pub fn is_persistent(&self) -> bool {
        self.dict.borrow().is_persistent()
    }

    pub fn has_unsaved_changes(&self) -> bool {
        self.dict.borrow().is_dirty()
    }
}

impl ConversionContext for UserDictContext {
    type Instance = UserDictInstance;

    fn alloc_instance(&mut self) -> Result<UserDictInstance, EngineError> {
        self.next_instance += 1;
        self.live_instances += 1;
        Ok(UserDictInstance {
            id: self.next_instance,
            scheme: self.scheme,
            options: self.options,
            dict: Rc::clone(&self.dict),
        })
    }

    fn free_instance(&mut self, instance: UserDictInstance) {
        self.live_instances = self.live_instances.saturating_sub(1);
        debug!(family = %self.family, id = instance.id, "released instance");
    }

    fn set_keyboard_scheme(&mut self, scheme: KeyboardScheme) -> Result<(), EngineError> {
        if scheme.family() != self.family {
            return Err(EngineError::Rejected("keyboard scheme of another family"));
        }
        self.scheme = Some(scheme);
        Ok(())
    }

    fn set_options(&mut self, options: EngineOptions) -> Result<(), EngineError> {
        self.options = options;
        Ok(())
    }

    fn save(&mut self) -> Result<(), EngineError> {
        let written = self.dict.borrow_mut().flush()?;
        debug!(family = %self.family, written, "flushed user dictionary");
        Ok(())
    }
}

/// One conversion session. Settings are captured when it is allocated.
#[derive(Debug)]
pub struct UserDictInstance {
    id: u64,
    scheme: Option<KeyboardScheme>,
    options: EngineOptions,
    dict: Rc<RefCell<UserDict>>,
}

impl UserDictInstance {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn keyboard_scheme(&self) -> Option<KeyboardScheme> {
        self.scheme
    }

    pub fn options(&self) -> EngineOptions {
        self.options
    }

    /// Record a committed phrase. Callers then tell the backend `modified()`.
    pub fn learn(&self, phrase: &str) {
        self.dict.borrow_mut().learn(phrase);
    }

    pub fn frequency(&self, phrase: &str) -> u64 {
        self.dict.borrow().frequency(phrase)
    }
}
