use std::{
    collections::HashMap,
    sync::{Arc, LazyLock, PoisonError, RwLock, Weak},
};

use log::{error, info};

use crate::session::CaptureSession;

static SESSION_REGISTRY: LazyLock<SessionRegistry> = LazyLock::new(SessionRegistry::default);

/// Process-wide directory of live sessions keyed by client pid.
///
/// Entries are inserted by `CaptureSession::new` and erased by
/// `CaptureSession::release`. The registry holds weak handles only.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<u32, Weak<CaptureSession>>>,
}

impl SessionRegistry {
    pub fn instance() -> &'static SessionRegistry {
        &SESSION_REGISTRY
    }

    pub fn insert(&self, pid: u32, session: &Arc<CaptureSession>) {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = sessions.insert(pid, Arc::downgrade(session)) {
            if previous.strong_count() > 0 {
                error!("session of pid {} replaced while still alive", pid);
            }
        }
        info!("session {} registered for pid {}", session.session_id(), pid);
    }

    pub fn get(&self, pid: u32) -> Option<Arc<CaptureSession>> {
        self.sessions.read().unwrap_or_else(PoisonError::into_inner).get(&pid).and_then(Weak::upgrade)
    }

    /// Erases the entry of `pid` if it still refers to `session`.
    pub fn erase(&self, pid: u32, session: &Weak<CaptureSession>) -> bool {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        match sessions.get(&pid) {
            Some(entry) if Weak::ptr_eq(entry, session) => {
                sessions.remove(&pid);
                true
            }
            _ => false,
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.read().unwrap_or_else(PoisonError::into_inner).values().filter(|session| session.strong_count() > 0).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
