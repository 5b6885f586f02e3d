//! Change notification
//!
//! Every radix node and leaf owns a [`WatchCh`]. A read that wants to be told
//! about future changes collects the channels it touched into a [`WatchSet`]
//! and blocks on it; a commit fires the channels of every node it replaced.
//!
//! | Type | Role |
//! |------|------|
//! | [`WatchCh`] | single-fire broadcast signal |
//! | [`WatchSet`] | wait for any of many channels, with timeout |
//! | [`CancelToken`] | caller-owned early exit for a wait |
//!
//! A channel fires at most once. Waiters register against the exact
//! channels they observed, so a fire that lands between the read and the
//! wait is seen immediately rather than lost.

use parking_lot::{Condvar, Mutex};
use rustc_hash::FxHashSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

/// Dead waiter references are swept once a channel holds this many.
const SWEEP_THRESHOLD: usize = 32;

// ============================================================================
// WatchCh
// ============================================================================

/// Single-fire broadcast signal.
///
/// Clones share the same underlying signal; equality and hashing are by
/// identity, so a [`WatchSet`] never holds the same channel twice.
#[derive(Clone)]
pub struct WatchCh {
    inner: Arc<Channel>,
}

struct Channel {
    fired: AtomicBool,
    waiters: Mutex<Vec<Weak<Waiter>>>,
}

impl WatchCh {
    /// Create a new, unfired channel
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Channel {
                fired: AtomicBool::new(false),
                waiters: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Fire the channel, waking every current waiter.
    ///
    /// Firing an already fired channel does nothing.
    pub fn fire(&self) {
        let waiters = {
            let mut waiters = self.inner.waiters.lock();
            if self.inner.fired.swap(true, Ordering::AcqRel) {
                return;
            }
            std::mem::take(&mut *waiters)
        };
        for waiter in waiters.iter().filter_map(Weak::upgrade) {
            waiter.wake();
        }
    }

    /// True once [`fire`](Self::fire) has been called
    pub fn is_fired(&self) -> bool {
        self.inner.fired.load(Ordering::Acquire)
    }

    /// Block until the channel fires or `timeout` elapses.
    ///
    /// Returns `true` if the channel fired.
    pub fn wait(&self, timeout: Option<Duration>) -> bool {
        if self.is_fired() {
            return true;
        }
        let waiter = Arc::new(Waiter::new());
        if self.subscribe(&waiter) {
            return true;
        }
        waiter.wait(timeout.and_then(deadline_after));
        self.is_fired()
    }

    /// Register `waiter`; returns `true` if the channel already fired.
    fn subscribe(&self, waiter: &Arc<Waiter>) -> bool {
        let mut waiters = self.inner.waiters.lock();
        if self.inner.fired.load(Ordering::Acquire) {
            return true;
        }
        if waiters.len() >= SWEEP_THRESHOLD {
            waiters.retain(|w| w.strong_count() > 0);
        }
        waiters.push(Arc::downgrade(waiter));
        false
    }
}

impl Default for WatchCh {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for WatchCh {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for WatchCh {}

impl Hash for WatchCh {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (Arc::as_ptr(&self.inner) as usize).hash(state);
    }
}

impl fmt::Debug for WatchCh {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchCh")
            .field("id", &Arc::as_ptr(&self.inner))
            .field("fired", &self.is_fired())
            .finish()
    }
}

/// Deadline `timeout` from now; `None` when it lies beyond what `Instant`
/// can represent, which waits without a deadline.
fn deadline_after(timeout: Duration) -> Option<Instant> {
    Instant::now().checked_add(timeout)
}

/// One blocked thread, shared by every channel it registered with.
struct Waiter {
    woken: Mutex<bool>,
    cvar: Condvar,
}

impl Waiter {
    fn new() -> Self {
        Self {
            woken: Mutex::new(false),
            cvar: Condvar::new(),
        }
    }

    fn wake(&self) {
        let mut woken = self.woken.lock();
        *woken = true;
        self.cvar.notify_all();
    }

    /// Returns `true` if woken before the deadline.
    fn wait(&self, deadline: Option<Instant>) -> bool {
        let mut woken = self.woken.lock();
        while !*woken {
            match deadline {
                Some(deadline) => {
                    if self.cvar.wait_until(&mut woken, deadline).timed_out() {
                        return *woken;
                    }
                }
                None => self.cvar.wait(&mut woken),
            }
        }
        true
    }
}

// ============================================================================
// CancelToken
// ============================================================================

/// Caller-owned cancellation signal for [`WatchSet::watch_with_cancel`].
///
/// Clones share state; cancelling any clone cancels them all.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    ch: WatchCh,
}

impl CancelToken {
    /// Create a new, uncancelled token
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel every wait using this token
    pub fn cancel(&self) {
        self.ch.fire();
    }

    /// True once cancelled
    pub fn is_cancelled(&self) -> bool {
        self.ch.is_fired()
    }
}

// ============================================================================
// WatchSet
// ============================================================================

/// How a [`WatchSet`] wait ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchOutcome {
    /// At least one watched channel fired (or the set was empty)
    Fired,
    /// The timeout elapsed first
    TimedOut,
    /// The cancel token fired first
    Cancelled,
}

/// Set of channels collected during reads.
///
/// Waiting returns as soon as any member fires. An empty set resolves
/// immediately with [`WatchOutcome::Fired`] so callers simply re-run their
/// query.
#[derive(Debug, Clone, Default)]
pub struct WatchSet {
    channels: FxHashSet<WatchCh>,
}

impl WatchSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a channel
    pub fn add(&mut self, ch: WatchCh) {
        self.channels.insert(ch);
    }

    /// Add `ch` while the set holds fewer than `limit` channels, otherwise
    /// add the coarser `alt` instead.
    ///
    /// `alt` should be a channel that fires whenever `ch` would, typically
    /// the table's root channel.
    pub fn add_with_limit(&mut self, limit: usize, ch: WatchCh, alt: WatchCh) {
        if self.channels.len() < limit {
            self.add(ch);
        } else {
            self.add(alt);
        }
    }

    /// Merge another set into this one
    pub fn extend(&mut self, other: WatchSet) {
        self.channels.extend(other.channels);
    }

    /// Number of distinct channels
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    /// True when no channel has been added
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// True if the set holds `ch`
    pub fn contains(&self, ch: &WatchCh) -> bool {
        self.channels.contains(ch)
    }

    /// Block until any channel fires or `timeout` elapses.
    ///
    /// `None` waits without a deadline.
    pub fn watch(&self, timeout: Option<Duration>) -> WatchOutcome {
        self.wait_any(None, timeout)
    }

    /// Like [`watch`](Self::watch), but also returns early with
    /// [`WatchOutcome::Cancelled`] when `cancel` fires.
    pub fn watch_with_cancel(&self, cancel: &CancelToken, timeout: Option<Duration>) -> WatchOutcome {
        self.wait_any(Some(cancel), timeout)
    }

    fn wait_any(&self, cancel: Option<&CancelToken>, timeout: Option<Duration>) -> WatchOutcome {
        if self.channels.is_empty() {
            return WatchOutcome::Fired;
        }
        let deadline = timeout.and_then(deadline_after);

        let waiter = Arc::new(Waiter::new());
        let mut ready = false;
        for ch in &self.channels {
            if ch.subscribe(&waiter) {
                ready = true;
                break;
            }
        }
        if !ready {
            if let Some(cancel) = cancel {
                ready = cancel.ch.subscribe(&waiter);
            }
        }
        if !ready {
            waiter.wait(deadline);
        }

        if self.channels.iter().any(WatchCh::is_fired) {
            WatchOutcome::Fired
        } else if cancel.map_or(false, CancelToken::is_cancelled) {
            WatchOutcome::Cancelled
        } else {
            WatchOutcome::TimedOut
        }
    }
}
