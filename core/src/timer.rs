//! Clocks, host timers and the save debouncer.
//!
//! The host event loop owns the actual timers. The backend only asks a
//! `Scheduler` to register or remove a periodic timeout and is told when one
//! fires. `TimerQueue` is a small in-process scheduler for hosts that poll
//! instead of running a GLib main loop.

use std::cell::Cell;
use std::collections::BTreeMap;
use std::rc::Rc;
use std::time::{Duration, Instant};

/// Quiet period before modified user data is written out.
pub const SAVE_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Monotonic time source.
pub trait Clock {
    fn now(&self) -> Instant;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A clock that only moves when told to. Clones share the same time.
#[derive(Debug, Clone)]
pub struct ManualClock {
    origin: Instant,
    offset: Rc<Cell<Duration>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset: Rc::new(Cell::new(Duration::ZERO)),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.offset.set(self.offset.get() + by);
    }

    /// Time elapsed since the clock was created.
    pub fn elapsed(&self) -> Duration {
        self.offset.get()
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + self.offset.get()
    }
}

/// Host timer handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(pub u64);

/// What a timer callback wants next, like a GLib source's return value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerAction {
    /// Keep the timer and fire again after another interval.
    Continue,
    /// Remove the timer.
    Stop,
}

/// Periodic timeouts provided by the host event loop.
pub trait Scheduler {
    fn add_timeout(&mut self, interval: Duration) -> TimerId;

    fn remove(&mut self, id: TimerId);
}

#[derive(Debug, Clone, Copy)]
struct Timer {
    interval: Duration,
    /// `None` when the interval reaches past what `Instant` can represent.
    deadline: Option<Instant>,
}

/// Poll-driven periodic timers.
#[derive(Debug)]
pub struct TimerQueue<K: Clock = SystemClock> {
    clock: K,
    next_id: u64,
    timers: BTreeMap<TimerId, Timer>,
}

impl<K: Clock> TimerQueue<K> {
    pub fn new(clock: K) -> Self {
        Self {
            clock,
            next_id: 1,
            timers: BTreeMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }

    pub fn contains(&self, id: TimerId) -> bool {
        self.timers.contains_key(&id)
    }

    /// Earliest pending deadline, for hosts that sleep between polls.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.values().filter_map(|timer| timer.deadline).min()
    }

    /// Timers whose deadline has passed. Each one is re-armed one interval
    /// from now; callers remove the ones that asked to stop.
    pub fn expired(&mut self) -> Vec<TimerId> {
        let now = self.clock.now();
        let mut due = Vec::new();
        for (id, timer) in self.timers.iter_mut() {
            if matches!(timer.deadline, Some(deadline) if deadline <= now) {
                timer.deadline = now.checked_add(timer.interval);
                due.push(*id);
            }
        }
        due
    }
}

impl<K: Clock> Scheduler for TimerQueue<K> {
    fn add_timeout(&mut self, interval: Duration) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        let deadline = self.clock.now().checked_add(interval);
        self.timers.insert(id, Timer { interval, deadline });
        id
    }

    fn remove(&mut self, id: TimerId) {
        self.timers.remove(&id);
    }
}

/// Trailing-edge debounce state for user data saves.
///
/// Every modification restarts the quiet period. Only the first modification
/// after a completed save needs a timer; later ones just move the reference
/// point, and the timer callback keeps re-checking until the quiet period has
/// really elapsed.
#[derive(Debug, Clone)]
pub struct SaveDebouncer {
    quiet: Duration,
    last_modified: Option<Instant>,
    pending: Option<TimerId>,
}

impl SaveDebouncer {
    pub fn new(quiet: Duration) -> Self {
        Self {
            quiet,
            last_modified: None,
            pending: None,
        }
    }

    pub fn quiet_period(&self) -> Duration {
        self.quiet
    }

    /// Record a modification. Returns true when a timer must be registered.
    pub fn touch(&mut self, now: Instant) -> bool {
        self.last_modified = Some(now);
        self.pending.is_none()
    }

    pub fn arm(&mut self, id: TimerId) {
        self.pending = Some(id);
    }

    pub fn pending(&self) -> Option<TimerId> {
        self.pending
    }

    pub fn elapsed(&self, now: Instant) -> Duration {
        self.last_modified
            .map(|at| now.saturating_duration_since(at))
            .unwrap_or(Duration::MAX)
    }

    pub fn is_due(&self, now: Instant) -> bool {
        self.elapsed(now) >= self.quiet
    }

    /// The save went through; the next modification schedules a new timer.
    pub fn complete(&mut self) -> Option<TimerId> {
        self.pending.take()
    }
}

impl Default for SaveDebouncer {
    fn default() -> Self {
        Self::new(SAVE_TIMEOUT)
    }
}
