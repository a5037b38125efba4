// core/tests/backend_lifecycle.rs
//
// Backend sequencing against a recording engine.
//
// Tests cover:
// - Lazy, per-family context creation and reuse
// - Keyboard scheme and option flags re-applied on every allocation
// - Debounced saves driven by a manual clock and a timer queue
// - Forced save before teardown, partial save failures, init failures

use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Duration;

use ibus_libpinyin_core::{
    BackendConfig, BackendError, BackendSlot, ChewingScheme, ConversionBackend, ConversionContext,
    ConversionEngine, DoublePinyinScheme, EngineError, EngineOptions, Family, KeyboardScheme,
    LifecycleError, ManualClock, SharedConfig, StoragePaths, TimerAction, TimerQueue,
};

#[derive(Debug, Clone, PartialEq)]
enum Event {
    Init(Family, Option<PathBuf>),
    Fini(Family),
    Alloc(Family, u32),
    Free(Family, u32),
    Scheme(Family, KeyboardScheme),
    Options(Family, EngineOptions),
    Save(Family),
}

#[derive(Clone, Default)]
struct Log(Rc<RefCell<Vec<Event>>>);

impl Log {
    fn push(&self, event: Event) {
        self.0.borrow_mut().push(event);
    }

    fn events(&self) -> Vec<Event> {
        self.0.borrow().clone()
    }

    fn count(&self, pred: impl Fn(&Event) -> bool) -> usize {
        self.0.borrow().iter().filter(|e| pred(e)).count()
    }

    fn schemes(&self, family: Family) -> Vec<KeyboardScheme> {
        self.0
            .borrow()
            .iter()
            .filter_map(|e| match e {
                Event::Scheme(f, s) if *f == family => Some(*s),
                _ => None,
            })
            .collect()
    }

    fn clear(&self) {
        self.0.borrow_mut().clear();
    }
}

#[derive(Clone, Default)]
struct RecordingEngine {
    log: Log,
    fail_init: Rc<Cell<bool>>,
    fail_save: Rc<RefCell<HashSet<Family>>>,
}

struct RecordingContext {
    family: Family,
    log: Log,
    next: u32,
    fail_save: Rc<RefCell<HashSet<Family>>>,
}

#[derive(Debug)]
struct Handle(u32);

impl ConversionEngine for RecordingEngine {
    type Context = RecordingContext;

    fn init_context(
        &self,
        family: Family,
        _data_dir: &Path,
        user_dir: Option<&Path>,
    ) -> Result<RecordingContext, EngineError> {
        if self.fail_init.get() {
            return Err(EngineError::NullHandle("context"));
        }
        self.log.push(Event::Init(family, user_dir.map(Path::to_path_buf)));
        Ok(RecordingContext {
            family,
            log: self.log.clone(),
            next: 0,
            fail_save: Rc::clone(&self.fail_save),
        })
    }
}

impl ConversionContext for RecordingContext {
    type Instance = Handle;

    fn alloc_instance(&mut self) -> Result<Handle, EngineError> {
        self.next += 1;
        self.log.push(Event::Alloc(self.family, self.next));
        Ok(Handle(self.next))
    }

    fn free_instance(&mut self, instance: Handle) {
        self.log.push(Event::Free(self.family, instance.0));
    }

    fn set_keyboard_scheme(&mut self, scheme: KeyboardScheme) -> Result<(), EngineError> {
        self.log.push(Event::Scheme(self.family, scheme));
        Ok(())
    }

    fn set_options(&mut self, options: EngineOptions) -> Result<(), EngineError> {
        self.log.push(Event::Options(self.family, options));
        Ok(())
    }

    fn save(&mut self) -> Result<(), EngineError> {
        self.log.push(Event::Save(self.family));
        if self.fail_save.borrow().contains(&self.family) {
            return Err(EngineError::Rejected("save"));
        }
        Ok(())
    }
}

impl Drop for RecordingContext {
    fn drop(&mut self) {
        self.log.push(Event::Fini(self.family));
    }
}

type TestBackend =
    ConversionBackend<RecordingEngine, SharedConfig, TimerQueue<ManualClock>, ManualClock>;

struct Fixture {
    _home: tempfile::TempDir,
    home: PathBuf,
    engine: RecordingEngine,
    config: SharedConfig,
    clock: ManualClock,
}

impl Fixture {
    fn new() -> Self {
        let home = tempfile::tempdir().unwrap();
        Self {
            home: home.path().to_path_buf(),
            _home: home,
            engine: RecordingEngine::default(),
            config: SharedConfig::new(BackendConfig::default()),
            clock: ManualClock::new(),
        }
    }

    fn backend(&self) -> TestBackend {
        ConversionBackend::new(
            self.engine.clone(),
            self.config.clone(),
            StoragePaths::with_home(&self.home).with_data_dir(&self.home),
            TimerQueue::new(self.clock.clone()),
            self.clock.clone(),
        )
    }

    fn log(&self) -> &Log {
        &self.engine.log
    }

    fn inits(&self, family: Family) -> usize {
        self.log()
            .count(|e| matches!(e, Event::Init(f, _) if *f == family))
    }

    fn saves(&self, family: Family) -> usize {
        self.log().count(|e| *e == Event::Save(family))
    }
}

#[test]
fn test_no_context_before_first_allocation() {
    let fx = Fixture::new();
    let backend = fx.backend();
    assert!(!backend.has_context(Family::Pinyin));
    assert!(!backend.has_context(Family::Bopomofo));
    assert!(fx.log().events().is_empty());
}

#[test]
fn test_allocation_creates_only_its_family() {
    let fx = Fixture::new();
    let mut backend = fx.backend();
    backend.alloc_instance(Family::Pinyin).unwrap();

    assert!(backend.has_context(Family::Pinyin));
    assert!(!backend.has_context(Family::Bopomofo));
    assert_eq!(fx.inits(Family::Pinyin), 1);
    assert_eq!(fx.inits(Family::Bopomofo), 0);
}

#[test]
fn test_context_is_reused() {
    let fx = Fixture::new();
    let mut backend = fx.backend();
    let a = backend.alloc_instance(Family::Bopomofo).unwrap();
    let b = backend.alloc_instance(Family::Bopomofo).unwrap();

    assert_eq!(fx.inits(Family::Bopomofo), 1);
    assert_eq!((a.0, b.0), (1, 2));
}

#[test]
fn test_user_dirs_are_created_and_passed_for_both_families() {
    let fx = Fixture::new();
    let mut backend = fx.backend();
    backend.alloc_instance(Family::Pinyin).unwrap();
    backend.alloc_instance(Family::Bopomofo).unwrap();

    let pinyin_dir = fx.home.join(".cache/ibus/libpinyin");
    let bopomofo_dir = fx.home.join(".cache/ibus/libbopomofo");
    assert!(pinyin_dir.is_dir());
    assert!(bopomofo_dir.is_dir());
    assert_eq!(backend.user_dir(Family::Bopomofo), Some(bopomofo_dir.as_path()));

    let events = fx.log().events();
    assert!(events.contains(&Event::Init(Family::Pinyin, Some(pinyin_dir))));
    assert!(events.contains(&Event::Init(Family::Bopomofo, Some(bopomofo_dir))));
}

#[test]
fn test_unwritable_user_dir_degrades_to_none() {
    let fx = Fixture::new();
    // `.cache` is a plain file, so the user directory cannot be created.
    std::fs::write(fx.home.join(".cache"), b"not a directory").unwrap();

    let mut backend = fx.backend();
    backend.alloc_instance(Family::Pinyin).unwrap();

    assert!(backend.has_context(Family::Pinyin));
    assert_eq!(backend.user_dir(Family::Pinyin), None);
    assert!(fx.log().events().contains(&Event::Init(Family::Pinyin, None)));
}

#[test]
fn test_scheme_reapplied_without_recreating_context() {
    let fx = Fixture::new();
    let mut backend = fx.backend();

    backend.alloc_instance(Family::Pinyin).unwrap();
    fx.config.update(|cfg| cfg.pinyin.double_pinyin_schema = 5);
    backend.alloc_instance(Family::Pinyin).unwrap();

    assert_eq!(fx.inits(Family::Pinyin), 1);
    assert_eq!(
        fx.log().schemes(Family::Pinyin),
        vec![
            KeyboardScheme::DoublePinyin(DoublePinyinScheme::Microsoft),
            KeyboardScheme::DoublePinyin(DoublePinyinScheme::XiaoHe),
        ]
    );
}

#[test]
fn test_unmatched_code_keeps_previous_scheme() {
    let fx = Fixture::new();
    fx.config.update(|cfg| cfg.bopomofo.bopomofo_keyboard_mapping = 2);
    let mut backend = fx.backend();
    backend.alloc_instance(Family::Bopomofo).unwrap();

    fx.config.update(|cfg| cfg.bopomofo.bopomofo_keyboard_mapping = 42);
    fx.log().clear();
    backend.alloc_instance(Family::Bopomofo).unwrap();

    // No scheme call at all, but options are still pushed.
    assert!(fx.log().schemes(Family::Bopomofo).is_empty());
    assert_eq!(
        fx.log()
            .count(|e| matches!(e, Event::Options(Family::Bopomofo, _))),
        1
    );

    fx.config.update(|cfg| cfg.bopomofo.bopomofo_keyboard_mapping = 3);
    backend.alloc_instance(Family::Bopomofo).unwrap();
    assert_eq!(
        fx.log().schemes(Family::Bopomofo),
        vec![KeyboardScheme::Chewing(ChewingScheme::Ibm)]
    );
}

#[test]
fn test_resplit_table_forced_for_pinyin_only() {
    let fx = Fixture::new();
    let mut backend = fx.backend();
    backend.alloc_instance(Family::Pinyin).unwrap();
    backend.alloc_instance(Family::Bopomofo).unwrap();

    let options: Vec<_> = fx
        .log()
        .events()
        .into_iter()
        .filter_map(|e| match e {
            Event::Options(f, o) => Some((f, o)),
            _ => None,
        })
        .collect();
    assert_eq!(options.len(), 2);
    assert_eq!(options[0].0, Family::Pinyin);
    assert!(options[0].1.contains(EngineOptions::USE_RESPLIT_TABLE));
    assert!(options[0].1.contains(EngineOptions::PINYIN_INCOMPLETE));
    assert_eq!(options[1].0, Family::Bopomofo);
    assert!(!options[1].1.contains(EngineOptions::USE_RESPLIT_TABLE));
    assert_eq!(
        options[1].1,
        fx.config.get().bopomofo.option()
    );
}

#[test]
fn test_free_instance_returns_to_context() {
    let fx = Fixture::new();
    let mut backend = fx.backend();
    let handle = backend.alloc_instance(Family::Pinyin).unwrap();
    backend.free_instance(Family::Pinyin, handle);
    assert!(fx.log().events().contains(&Event::Free(Family::Pinyin, 1)));
}

#[test]
fn test_modified_calls_coalesce_into_one_save() {
    let fx = Fixture::new();
    let mut backend = fx.backend();
    backend.alloc_instance(Family::Pinyin).unwrap();

    backend.modified();
    fx.clock.advance(Duration::from_secs(100));
    backend.modified();
    fx.clock.advance(Duration::from_secs(100));
    backend.modified();
    assert_eq!(backend.scheduler().len(), 1);
    assert!(backend.is_save_pending());

    // t=300: timer fires, but only 100s have passed since the last change.
    fx.clock.advance(Duration::from_secs(100));
    assert_eq!(backend.dispatch_timers(), 1);
    assert_eq!(fx.saves(Family::Pinyin), 0);
    assert!(backend.is_save_pending());

    // t=500: quiet period over, but the timer is not due until t=600.
    fx.clock.advance(Duration::from_secs(200));
    assert_eq!(backend.dispatch_timers(), 0);
    assert_eq!(fx.saves(Family::Pinyin), 0);

    fx.clock.advance(Duration::from_secs(100));
    assert_eq!(backend.dispatch_timers(), 1);
    assert_eq!(fx.saves(Family::Pinyin), 1);
    assert!(!backend.is_save_pending());
    assert!(backend.scheduler().is_empty());

    fx.clock.advance(Duration::from_secs(900));
    assert_eq!(backend.dispatch_timers(), 0);
    assert_eq!(fx.saves(Family::Pinyin), 1);
}

#[test]
fn test_timeout_measures_from_last_modification() {
    let fx = Fixture::new();
    let mut backend = fx.backend();
    backend.alloc_instance(Family::Pinyin).unwrap();

    backend.modified();
    fx.clock.advance(Duration::from_secs(200));
    backend.modified();

    fx.clock.advance(Duration::from_secs(299));
    assert_eq!(backend.on_save_timeout(), TimerAction::Continue);
    assert_eq!(fx.saves(Family::Pinyin), 0);

    fx.clock.advance(Duration::from_secs(1));
    assert_eq!(backend.on_save_timeout(), TimerAction::Stop);
    assert_eq!(fx.saves(Family::Pinyin), 1);
}

#[test]
fn test_modified_after_save_schedules_again() {
    let fx = Fixture::new();
    let mut backend = fx.backend().with_save_timeout(Duration::from_secs(10));
    backend.alloc_instance(Family::Pinyin).unwrap();

    backend.modified();
    fx.clock.advance(Duration::from_secs(10));
    backend.dispatch_timers();
    assert_eq!(fx.saves(Family::Pinyin), 1);

    backend.modified();
    assert!(backend.is_save_pending());
    assert_eq!(backend.scheduler().len(), 1);
    fx.clock.advance(Duration::from_secs(10));
    backend.dispatch_timers();
    assert_eq!(fx.saves(Family::Pinyin), 2);
}

#[test]
fn test_pending_save_forced_before_teardown() {
    let fx = Fixture::new();
    let mut slot = BackendSlot::new();
    let backend = slot.init(fx.backend()).unwrap();
    backend.alloc_instance(Family::Pinyin).unwrap();
    backend.alloc_instance(Family::Bopomofo).unwrap();
    backend.modified();
    fx.log().clear();

    slot.finalize().unwrap();

    assert_eq!(
        fx.log().events(),
        vec![
            Event::Save(Family::Pinyin),
            Event::Save(Family::Bopomofo),
            Event::Fini(Family::Pinyin),
            Event::Fini(Family::Bopomofo),
        ]
    );
}

#[test]
fn test_failed_save_at_teardown_still_finalizes() {
    let fx = Fixture::new();
    fx.engine.fail_save.borrow_mut().insert(Family::Pinyin);
    let mut slot = BackendSlot::new();
    let backend = slot.init(fx.backend()).unwrap();
    backend.alloc_instance(Family::Pinyin).unwrap();
    backend.alloc_instance(Family::Bopomofo).unwrap();
    backend.modified();
    fx.log().clear();

    assert!(slot.finalize().is_ok());
    assert!(!slot.is_initialized());
    assert_eq!(
        fx.log().events(),
        vec![
            Event::Save(Family::Pinyin),
            Event::Save(Family::Bopomofo),
            Event::Fini(Family::Pinyin),
            Event::Fini(Family::Bopomofo),
        ]
    );
}

#[test]
fn test_oversized_save_timeout_waits_for_teardown() {
    let fx = Fixture::new();
    let mut backend = fx.backend().with_save_timeout(Duration::MAX);
    assert_eq!(backend.save_timeout(), Duration::MAX);
    backend.alloc_instance(Family::Pinyin).unwrap();

    backend.modified();
    assert!(backend.is_save_pending());
    fx.clock.advance(Duration::from_secs(365 * 24 * 3600));
    assert_eq!(backend.dispatch_timers(), 0);
    assert_eq!(fx.saves(Family::Pinyin), 0);

    drop(backend);
    assert_eq!(fx.saves(Family::Pinyin), 1);
}

#[test]
fn test_teardown_without_pending_save_does_not_save() {
    let fx = Fixture::new();
    let mut backend = fx.backend();
    backend.alloc_instance(Family::Pinyin).unwrap();
    drop(backend);
    assert_eq!(fx.saves(Family::Pinyin), 0);
    assert!(fx.log().events().contains(&Event::Fini(Family::Pinyin)));
}

#[test]
fn test_save_skips_families_without_context() {
    let fx = Fixture::new();
    let mut backend = fx.backend();
    backend.save_user_db().unwrap();
    assert!(fx.log().events().is_empty());

    backend.alloc_instance(Family::Pinyin).unwrap();
    backend.save_user_db().unwrap();
    assert_eq!(fx.saves(Family::Pinyin), 1);
    assert_eq!(fx.saves(Family::Bopomofo), 0);
}

#[test]
fn test_failed_save_does_not_block_other_family() {
    let fx = Fixture::new();
    fx.engine.fail_save.borrow_mut().insert(Family::Pinyin);
    let mut backend = fx.backend();
    backend.alloc_instance(Family::Pinyin).unwrap();
    backend.alloc_instance(Family::Bopomofo).unwrap();

    let err = backend.save_user_db().unwrap_err();
    assert!(matches!(err, BackendError::Save { .. }));
    assert_eq!(err.failed_families(), vec![Family::Pinyin]);
    assert_eq!(fx.saves(Family::Bopomofo), 1);
}

#[test]
fn test_failed_save_keeps_timer_for_retry() {
    let fx = Fixture::new();
    fx.engine.fail_save.borrow_mut().insert(Family::Pinyin);
    let mut backend = fx.backend();
    backend.alloc_instance(Family::Pinyin).unwrap();

    backend.modified();
    fx.clock.advance(Duration::from_secs(300));
    assert_eq!(backend.dispatch_timers(), 1);
    assert!(backend.is_save_pending());
    assert_eq!(backend.scheduler().len(), 1);

    fx.engine.fail_save.borrow_mut().clear();
    fx.clock.advance(Duration::from_secs(300));
    assert_eq!(backend.dispatch_timers(), 1);
    assert!(!backend.is_save_pending());
    assert_eq!(fx.saves(Family::Pinyin), 2);
}

#[test]
fn test_context_init_failure_is_reported_and_retried() {
    let fx = Fixture::new();
    fx.engine.fail_init.set(true);
    let mut backend = fx.backend();

    let err = backend.alloc_instance(Family::Pinyin).unwrap_err();
    assert!(matches!(
        err,
        BackendError::ContextInit {
            family: Family::Pinyin,
            ..
        }
    ));
    assert!(!backend.has_context(Family::Pinyin));

    fx.engine.fail_init.set(false);
    backend.alloc_instance(Family::Pinyin).unwrap();
    assert!(backend.has_context(Family::Pinyin));
    assert_eq!(fx.inits(Family::Pinyin), 1);
}

#[test]
fn test_double_init_fails_until_finalized() {
    let fx = Fixture::new();
    let mut slot: BackendSlot<TestBackend> = BackendSlot::new();
    slot.init(fx.backend()).unwrap();

    for _ in 0..3 {
        assert!(matches!(
            slot.init(fx.backend()),
            Err(LifecycleError::AlreadyInitialized)
        ));
    }

    slot.finalize().unwrap();
    assert!(slot.init(fx.backend()).is_ok());
}
