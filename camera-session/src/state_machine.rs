use std::sync::{Mutex, MutexGuard, PoisonError};

use log::debug;
use num_enum::{IntoPrimitive, TryFromPrimitive};
use strum::{Display, EnumCount, EnumIter};

#[derive(Clone, Copy, Debug, Default, Display, EnumCount, EnumIter, Eq, Hash, PartialEq, IntoPrimitive, TryFromPrimitive)]
#[repr(i32)]
pub enum CaptureSessionState {
    #[default]
    #[strum(serialize = "Init")]
    Init = 0,
    #[strum(serialize = "Config_In-progress")]
    ConfigInProgress,
    #[strum(serialize = "Committed")]
    ConfigCommitted,
    #[strum(serialize = "Released")]
    Released,
    #[strum(serialize = "Started")]
    Started,
}

impl CaptureSessionState {
    /// States reachable from `self` in one hop.
    pub fn successors(&self) -> &'static [CaptureSessionState] {
        use CaptureSessionState::*;

        match self {
            Init => &[ConfigInProgress, Released],
            ConfigInProgress => &[ConfigCommitted, Released],
            ConfigCommitted => &[ConfigInProgress, Started, Released],
            Started => &[ConfigInProgress, ConfigCommitted, Released],
            Released => &[],
        }
    }

    pub fn can_transfer_to(&self, target: CaptureSessionState) -> bool {
        self.successors().contains(&target)
    }
}

/// Handle passed to a guarded action. It owns the machine's lock for the
/// duration of the action, so transitions requested through it never
/// re-enter the lock.
pub struct StateTransition<'a> {
    state: MutexGuard<'a, CaptureSessionState>,
}

impl StateTransition<'_> {
    pub fn current(&self) -> CaptureSessionState {
        *self.state
    }

    pub fn check_transfer(&self, target: CaptureSessionState) -> bool {
        self.state.can_transfer_to(target)
    }

    pub fn transfer(&mut self, target: CaptureSessionState) -> bool {
        if !self.state.can_transfer_to(target) {
            debug!("state transfer rejected: {} -> {}", *self.state, target);
            return false;
        }
        debug!("state transfer: {} -> {}", *self.state, target);
        *self.state = target;
        true
    }
}

pub struct StateMachine {
    state: Mutex<CaptureSessionState>,
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl StateMachine {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(CaptureSessionState::Init),
        }
    }

    fn lock(&self) -> MutexGuard<'_, CaptureSessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn current_state(&self) -> CaptureSessionState {
        *self.lock()
    }

    pub fn check_transfer(&self, target: CaptureSessionState) -> bool {
        self.lock().can_transfer_to(target)
    }

    pub fn transfer(&self, target: CaptureSessionState) -> bool {
        StateTransition {
            state: self.lock(),
        }
        .transfer(target)
    }

    /// Runs `action` with the state held fixed. The action must not call the
    /// machine's own lock-taking methods, it transitions through the handle.
    pub fn state_guard<R, F>(&self, action: F) -> R
    where
        F: FnOnce(&mut StateTransition<'_>) -> R,
    {
        let mut transition = StateTransition {
            state: self.lock(),
        };
        action(&mut transition)
    }
}
