//! The conversion backend.
//!
//! Owns at most one context per family, created on the first allocation for
//! that family and kept until the backend is dropped. Every allocation
//! re-applies the current configuration to the context. Modifications of
//! user data are coalesced into one save after a quiet period.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, warn};

use crate::config::{ConfigSource, FamilyOptions};
use crate::engine::{ConversionContext, ConversionEngine, Family};
use crate::error::BackendError;
use crate::options::EngineOptions;
use crate::paths::{ensure_private_dir, StoragePaths};
use crate::scheme::KeyboardScheme;
use crate::timer::{Clock, SaveDebouncer, Scheduler, TimerAction, TimerQueue, SAVE_TIMEOUT};

/// Instance type handed out by engine `E`.
pub type InstanceOf<E> = <<E as ConversionEngine>::Context as ConversionContext>::Instance;

struct FamilyContext<X> {
    context: X,
    user_dir: Option<PathBuf>,
}

pub struct ConversionBackend<E, C, S, K>
where
    E: ConversionEngine,
    C: ConfigSource,
    S: Scheduler,
    K: Clock,
{
    engine: E,
    config: C,
    paths: StoragePaths,
    scheduler: S,
    clock: K,
    pinyin: Option<FamilyContext<E::Context>>,
    bopomofo: Option<FamilyContext<E::Context>>,
    debouncer: SaveDebouncer,
}

impl<E, C, S, K> ConversionBackend<E, C, S, K>
where
    E: ConversionEngine,
    C: ConfigSource,
    S: Scheduler,
    K: Clock,
{
    pub fn new(engine: E, config: C, paths: StoragePaths, scheduler: S, clock: K) -> Self {
        Self {
            engine,
            config,
            paths,
            scheduler,
            clock,
            pinyin: None,
            bopomofo: None,
            debouncer: SaveDebouncer::new(SAVE_TIMEOUT),
        }
    }

    /// Use a different quiet period before saving.
    pub fn with_save_timeout(mut self, quiet: Duration) -> Self {
        self.debouncer = SaveDebouncer::new(quiet);
        self
    }

    pub fn save_timeout(&self) -> Duration {
        self.debouncer.quiet_period()
    }

    pub fn config(&self) -> &C {
        &self.config
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    pub fn has_context(&self, family: Family) -> bool {
        self.slot(family).is_some()
    }

    pub fn context(&self, family: Family) -> Option<&E::Context> {
        self.slot(family).as_ref().map(|entry| &entry.context)
    }

    /// User directory the family's context was created with. `None` when
    /// there is no context yet or it runs without persistent user data.
    pub fn user_dir(&self, family: Family) -> Option<&Path> {
        self.slot(family)
            .as_ref()
            .and_then(|entry| entry.user_dir.as_deref())
    }

    pub fn is_save_pending(&self) -> bool {
        self.debouncer.pending().is_some()
    }

    fn slot(&self, family: Family) -> &Option<FamilyContext<E::Context>> {
        match family {
            Family::Pinyin => &self.pinyin,
            Family::Bopomofo => &self.bopomofo,
        }
    }

    /// Allocate a conversion instance, creating the family's context first if
    /// this is the first request for it.
    pub fn alloc_instance(&mut self, family: Family) -> Result<InstanceOf<E>, BackendError> {
        let slot = match family {
            Family::Pinyin => &mut self.pinyin,
            Family::Bopomofo => &mut self.bopomofo,
        };
        let entry = match slot.take() {
            Some(entry) => slot.insert(entry),
            None => slot.insert(create_context(&self.engine, &self.paths, family)?),
        };

        let options = self.config.options(family);
        apply_options(&mut entry.context, family, options);

        entry
            .context
            .alloc_instance()
            .map_err(|source| BackendError::InstanceAlloc { family, source })
    }

    /// Give an instance back to its context.
    pub fn free_instance(&mut self, family: Family, instance: InstanceOf<E>) {
        let slot = match family {
            Family::Pinyin => &mut self.pinyin,
            Family::Bopomofo => &mut self.bopomofo,
        };
        match slot {
            Some(entry) => entry.context.free_instance(instance),
            None => warn!(%family, "instance freed with no context; dropping it"),
        }
    }

    /// User data changed. Restarts the quiet period and schedules a save if
    /// none is pending.
    pub fn modified(&mut self) {
        if self.debouncer.touch(self.clock.now()) {
            let id = self.scheduler.add_timeout(self.debouncer.quiet_period());
            self.debouncer.arm(id);
            debug!(?id, "scheduled user data save");
        }
    }

    /// Save timer callback. Saves once the quiet period has passed since the
    /// last modification; otherwise asks to be called again. A failed save
    /// also keeps the timer, so it is retried at the next firing.
    pub fn on_save_timeout(&mut self) -> TimerAction {
        if self.debouncer.pending().is_none() {
            return TimerAction::Stop;
        }
        if !self.debouncer.is_due(self.clock.now()) {
            return TimerAction::Continue;
        }
        match self.save_user_db() {
            Ok(()) => {
                self.debouncer.complete();
                TimerAction::Stop
            }
            Err(err) => {
                warn!(error = %err, "user data save failed; retrying at the next timeout");
                TimerAction::Continue
            }
        }
    }

    /// Persist every existing context. Both families are attempted even when
    /// the first one fails.
    pub fn save_user_db(&mut self) -> Result<(), BackendError> {
        let mut failures = Vec::new();
        for (family, slot) in [
            (Family::Pinyin, &mut self.pinyin),
            (Family::Bopomofo, &mut self.bopomofo),
        ] {
            let Some(entry) = slot else { continue };
            match entry.context.save() {
                Ok(()) => debug!(%family, "saved user data"),
                Err(err) => failures.push((family, err)),
            }
        }
        if failures.is_empty() {
            Ok(())
        } else {
            Err(BackendError::Save { failures })
        }
    }
}

impl<E, C, K, Q> ConversionBackend<E, C, TimerQueue<Q>, K>
where
    E: ConversionEngine,
    C: ConfigSource,
    K: Clock,
    Q: Clock,
{
    /// Run the callbacks of expired timers. Returns how many fired.
    pub fn dispatch_timers(&mut self) -> usize {
        let mut fired = 0;
        for id in self.scheduler.expired() {
            if self.debouncer.pending() != Some(id) {
                self.scheduler.remove(id);
                continue;
            }
            fired += 1;
            if self.on_save_timeout() == TimerAction::Stop {
                self.scheduler.remove(id);
            }
        }
        fired
    }
}

impl<E, C, S, K> Drop for ConversionBackend<E, C, S, K>
where
    E: ConversionEngine,
    C: ConfigSource,
    S: Scheduler,
    K: Clock,
{
    fn drop(&mut self) {
        if let Some(id) = self.debouncer.pending() {
            if let Err(err) = self.save_user_db() {
                warn!(error = %err, "user data save at shutdown failed");
            }
            self.scheduler.remove(id);
            self.debouncer.complete();
        }
        drop(self.pinyin.take());
        drop(self.bopomofo.take());
    }
}

fn create_context<E: ConversionEngine>(
    engine: &E,
    paths: &StoragePaths,
    family: Family,
) -> Result<FamilyContext<E::Context>, BackendError> {
    let user_dir = paths
        .user_dir(family)
        .and_then(|dir| match ensure_private_dir(&dir) {
            Ok(()) => Some(dir),
            Err(err) => {
                warn!(%family, ?dir, error = %err, "cannot create user directory; user data will not persist");
                None
            }
        });

    let context = engine
        .init_context(family, paths.data_dir(), user_dir.as_deref())
        .map_err(|source| BackendError::ContextInit { family, source })?;
    debug!(%family, data_dir = ?paths.data_dir(), ?user_dir, "created context");
    Ok(FamilyContext { context, user_dir })
}

fn apply_options<X: ConversionContext>(context: &mut X, family: Family, options: FamilyOptions) {
    match KeyboardScheme::for_family(family, options.keyboard) {
        Some(scheme) => {
            if let Err(err) = context.set_keyboard_scheme(scheme) {
                warn!(%family, %scheme, error = %err, "keyboard scheme not applied");
            }
        }
        None => debug!(%family, code = options.keyboard, "no scheme for keyboard code; keeping current"),
    }

    let flags = match family {
        Family::Pinyin => options.flags | EngineOptions::USE_RESPLIT_TABLE,
        Family::Bopomofo => options.flags,
    };
    if let Err(err) = context.set_options(flags) {
        warn!(%family, flags = flags.bits(), error = %err, "options not applied");
    }
}
