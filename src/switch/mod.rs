//! Debounced momentary switches.
//!
//! A [`Switch`] holds the logical state of one push switch together with its
//! listeners. The [`SwitchMonitor`](monitor::SwitchMonitor) worker feeds it
//! accepted raw samples; [`Switch::apply_sample`] turns those into confirmed
//! transitions according to the hold-time policy and notifies listeners.
//!
//! Listener ordering for one transition is fixed: the specific `On`/`Off`
//! listeners run first, then the `Changed` listeners, each list in
//! registration order. Listeners run on whichever thread caused the
//! transition (the monitor task, or the caller of [`Switch::force`]) while
//! the switch's transition lock is held, so they must only record wake
//! requests and return. They may call [`Switch::is_on`] but must not
//! register listeners or force the same switch.

pub mod monitor;

use std::{
    fmt,
    sync::{
        Arc, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use log::{debug, trace};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

pub use monitor::{DebounceTiming, SwitchMonitor};

/// Minimum time a press must last before a release counts as "off".
pub const MIN_HOLD_TIME: Duration = Duration::from_millis(500);

/// Which front-panel switch a [`Switch`] represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SwitchRole {
    Light,
    Alarm,
    Clock,
}

impl fmt::Display for SwitchRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SwitchRole::Light => "light",
            SwitchRole::Alarm => "alarm",
            SwitchRole::Clock => "clock",
        })
    }
}

/// Kind of notification a listener subscribes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SwitchEvent {
    On,
    Off,
    Changed,
}

/// Receives switch notifications.
///
/// `on` is the logical state right after the transition. Closures of the form
/// `Fn(SwitchEvent, bool)` implement this trait directly.
pub trait SwitchListener: Send + Sync {
    fn notify(&self, event: SwitchEvent, on: bool);
}

impl<F> SwitchListener for F
where
    F: Fn(SwitchEvent, bool) + Send + Sync,
{
    fn notify(&self, event: SwitchEvent, on: bool) {
        self(event, on)
    }
}

type Listeners = Vec<Arc<dyn SwitchListener>>;

/// Mutable part of a switch, only touched under the transition lock.
struct Transitions {
    /// Instant of the last accepted rising sample.
    high_time: Instant,
    /// Logical state before the last rising sample (or the forced state).
    on_before: bool,
    on_listeners: Listeners,
    off_listeners: Listeners,
    changed_listeners: Listeners,
}

impl Transitions {
    fn dispatch(&self, specific: SwitchEvent, on: bool) {
        let first = match specific {
            SwitchEvent::On => &self.on_listeners,
            SwitchEvent::Off => &self.off_listeners,
            SwitchEvent::Changed => &self.changed_listeners,
        };
        for listener in first {
            listener.notify(specific, on);
        }
        if specific != SwitchEvent::Changed {
            for listener in &self.changed_listeners {
                listener.notify(SwitchEvent::Changed, on);
            }
        }
    }
}

/// Logical state of one push switch plus its listeners.
pub struct Switch {
    role: SwitchRole,
    line: u32,
    min_hold: Duration,
    on: AtomicBool,
    /// One-shot permission for the monitor to accept its next sample.
    override_next: AtomicBool,
    transitions: Mutex<Transitions>,
}

impl fmt::Debug for Switch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Switch")
            .field("role", &self.role)
            .field("line", &self.line)
            .field("on", &self.is_on())
            .finish()
    }
}

impl Switch {
    /// Creates a switch whose logical state starts at the raw line value.
    pub fn new(role: SwitchRole, line: u32, initially_on: bool, min_hold: Duration) -> Self {
        Self {
            role,
            line,
            min_hold,
            on: AtomicBool::new(initially_on),
            override_next: AtomicBool::new(false),
            transitions: Mutex::new(Transitions {
                high_time: Instant::now(),
                on_before: false,
                on_listeners: Vec::new(),
                off_listeners: Vec::new(),
                changed_listeners: Vec::new(),
            }),
        }
    }

    pub fn role(&self) -> SwitchRole {
        self.role
    }

    pub fn line(&self) -> u32 {
        self.line
    }

    /// Current logical state. Lock-free, safe to call from listeners.
    pub fn is_on(&self) -> bool {
        self.on.load(Ordering::Acquire)
    }

    /// Registers a listener.
    ///
    /// `On`/`Off` listeners whose condition already holds are notified once
    /// immediately, before the call returns.
    pub fn register(&self, event: SwitchEvent, listener: impl SwitchListener + 'static) {
        let listener: Arc<dyn SwitchListener> = Arc::new(listener);
        let mut transitions = self.lock();
        let on = self.is_on();
        let list = match event {
            SwitchEvent::On => {
                if on {
                    listener.notify(SwitchEvent::On, on);
                }
                &mut transitions.on_listeners
            }
            SwitchEvent::Off => {
                if !on {
                    listener.notify(SwitchEvent::Off, on);
                }
                &mut transitions.off_listeners
            }
            SwitchEvent::Changed => &mut transitions.changed_listeners,
        };
        list.push(listener);
    }

    /// Sets the logical state programmatically.
    ///
    /// Fires the specific listener list and then `Changed`, and arms a
    /// one-shot override so the monitor accepts its next raw sample without
    /// waiting for the line to differ. Returns `false` (and does nothing) if
    /// the switch is already in the requested state.
    pub fn force(&self, on: bool) -> bool {
        let mut transitions = self.lock();
        if self.is_on() == on {
            return false;
        }
        self.on.store(on, Ordering::Release);
        transitions.on_before = on;
        self.override_next.store(true, Ordering::Release);
        debug!("{} switch forced {}", self.role, if on { "on" } else { "off" });
        transitions.dispatch(if on { SwitchEvent::On } else { SwitchEvent::Off }, on);
        true
    }

    /// Consumes the override armed by [`force`](Self::force).
    pub(crate) fn take_override(&self) -> bool {
        self.override_next.swap(false, Ordering::AcqRel)
    }

    /// Applies one accepted raw sample taken at `now`.
    ///
    /// Every rising sample is a confirmed "on", even when the switch is
    /// already on. A falling sample only counts as "off" once the press has
    /// been held for longer than the minimum hold time, or when the switch
    /// was already on before that press; otherwise it is treated as bounce.
    /// Returns whether listeners were notified.
    pub fn apply_sample(&self, active: bool, now: Instant) -> bool {
        let mut transitions = self.lock();
        if active {
            transitions.high_time = now;
            transitions.on_before = self.is_on();
            self.on.store(true, Ordering::Release);
            debug!("{} switch on (line {})", self.role, self.line);
            transitions.dispatch(SwitchEvent::On, true);
            return true;
        }

        if !self.is_on() {
            trace!("{} switch released while already off", self.role);
            return false;
        }
        let held = now.saturating_duration_since(transitions.high_time) > self.min_hold;
        if held || transitions.on_before {
            self.on.store(false, Ordering::Release);
            debug!("{} switch off (line {})", self.role, self.line);
            transitions.dispatch(SwitchEvent::Off, false);
            true
        } else {
            trace!("{} switch release ignored as bounce", self.role);
            false
        }
    }

    fn lock(&self) -> MutexGuard<'_, Transitions> {
        self.transitions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::{Arc, Mutex};

    use super::{Switch, SwitchEvent};

    /// Records every notification a switch delivers, in order.
    #[derive(Clone, Default)]
    pub struct Recorder(Arc<Mutex<Vec<(SwitchEvent, bool)>>>);

    impl Recorder {
        pub fn attach(switch: &Switch) -> Self {
            let recorder = Self::default();
            for event in [SwitchEvent::On, SwitchEvent::Off, SwitchEvent::Changed] {
                let log = recorder.0.clone();
                switch.register(event, move |event, on| log.lock().unwrap().push((event, on)));
            }
            recorder.clear();
            recorder
        }

        pub fn events(&self) -> Vec<(SwitchEvent, bool)> {
            self.0.lock().unwrap().clone()
        }

        pub fn count(&self, event: SwitchEvent) -> usize {
            self.events().iter().filter(|(e, _)| *e == event).count()
        }

        pub fn clear(&self) {
            self.0.lock().unwrap().clear();
        }
    }
}
