use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use camera_core::stream::Rotation;
use log::debug;

use crate::stream::StreamRepeat;

/// Keeps preview transforms in sync with the physical display rotation.
#[derive(Default)]
pub struct DisplayRotationListener {
    previews: Mutex<Vec<Arc<StreamRepeat>>>,
    rotation: RwLock<Rotation>,
}

impl DisplayRotationListener {
    pub fn new() -> Self {
        Self::default()
    }

    fn previews(&self) -> MutexGuard<'_, Vec<Arc<StreamRepeat>>> {
        self.previews.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn add_preview_stream(&self, stream: &Arc<StreamRepeat>) {
        let mut previews = self.previews();
        if previews.iter().any(|s| Arc::ptr_eq(s, stream)) {
            return;
        }
        stream.set_transform(self.rotation());
        previews.push(stream.clone());
    }

    pub fn remove_preview_stream(&self, stream: &Arc<StreamRepeat>) {
        self.previews().retain(|s| !Arc::ptr_eq(s, stream));
    }

    pub fn clear(&self) {
        self.previews().clear();
    }

    pub fn preview_count(&self) -> usize {
        self.previews().len()
    }

    pub fn rotation(&self) -> Rotation {
        *self.rotation.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Display rotation changed.
    pub fn on_change(&self, rotation: Rotation) {
        *self.rotation.write().unwrap_or_else(PoisonError::into_inner) = rotation;
        let previews = self.previews().clone();
        debug!("display rotation {} degrees, {} previews", rotation.degrees(), previews.len());
        for stream in previews {
            stream.set_transform(rotation);
        }
    }
}
