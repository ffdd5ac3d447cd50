//! Interruptible waits for the controller loops.
//!
//! Controllers sleep for anything between one second and many hours. A switch
//! transition or a new alarm window has to cut such a sleep short, so every
//! loop parks on a [`Waker`] instead of a plain timer.

use std::{sync::Arc, time::Duration};

use tokio::sync::Notify;

/// What a controller loop does after one evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wait {
    /// Re-evaluate after the given delay unless woken earlier.
    For(Duration),
    /// Park until somebody calls [`Waker::wake`].
    Indefinitely,
}

/// Wake signal owned by one controller loop and shared with the switch
/// listeners that need to interrupt it.
///
/// A wake that arrives while the loop is busy is remembered and consumed by
/// the next [`sleep`](Self::sleep), so no event is lost between evaluations.
#[derive(Debug, Clone, Default)]
pub struct Waker(Arc<Notify>);

impl Waker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Interrupts the current (or next) sleep. Never blocks.
    pub fn wake(&self) {
        self.0.notify_one();
    }

    /// Sleeps according to `wait`. Returns `true` when woken early.
    pub async fn sleep(&self, wait: Wait) -> bool {
        match wait {
            Wait::For(delay) => tokio::select! {
                () = self.0.notified() => true,
                () = tokio::time::sleep(delay) => false,
            },
            Wait::Indefinitely => {
                self.0.notified().await;
                true
            }
        }
    }
}
