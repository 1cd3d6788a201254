//! Capture session: one client's binding of a camera device to its output
//! streams, driven through the configure, commit, start, stop and release
//! lifecycle.

mod callback;
mod configure;
mod controls;
mod lifecycle;
mod moving_photo;

use std::{
    fmt::Write,
    sync::{
        atomic::{AtomicBool, AtomicI32, AtomicU64, Ordering},
        Arc, Mutex, MutexGuard, PoisonError, RwLock, Weak,
    },
};

use camera_core::{
    buffer::Surface,
    error::ServiceErrorCode,
    stream::{ColorSpace, OperationMode, StreamInfo, StreamType},
};
use camera_device::{CameraDevice, DeviceErrorKind};
use log::{error, info, warn};

use crate::{
    config::SessionConfig,
    display::DisplayRotationListener,
    moving_photo::{DiscardEncoder, MovingPhotoEncoder, MovingPhotoListener, MovingPhotoVideoCache, TaskManager},
    registry::SessionRegistry,
    state_machine::{CaptureSessionState, StateMachine},
    stream_container::StreamContainer,
};

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// Client-facing notifications of a session.
pub trait CaptureSessionCallback: Send + Sync {
    fn on_error(&self, code: ServiceErrorCode);
}

// Handles of the moving-photo pipeline, created at commit and dropped when the
// live-photo stream is stripped or the session is released.
#[derive(Default)]
struct MovingPhotoContext {
    surface: Option<Arc<Surface>>,
    listener: Option<Arc<MovingPhotoListener>>,
    video_cache: Option<Arc<MovingPhotoVideoCache>>,
    task_manager: Option<Arc<TaskManager>>,
}

pub struct CaptureSession {
    weak_self: Weak<CaptureSession>,
    session_id: u64,
    caller_token: u32,
    pid: u32,
    op_mode: OperationMode,
    feature_mode: AtomicI32,
    config: SessionConfig,
    state_machine: StateMachine,
    streams: StreamContainer,
    device: RwLock<Option<Arc<dyn CameraDevice>>>,
    color_space: RwLock<ColorSpace>,
    capture_color_space: RwLock<ColorSpace>,
    callback: RwLock<Option<Arc<dyn CaptureSessionCallback>>>,
    // serializes every hardware callback delivery
    cb_mutex: Mutex<()>,
    rotation_listener: Arc<DisplayRotationListener>,
    rotation_enabled: AtomicBool,
    device_class: RwLock<String>,
    is_set_motion_photo: AtomicBool,
    is_moving_photo_mirror: AtomicBool,
    moving_photo: Mutex<MovingPhotoContext>,
    encoder: RwLock<Arc<dyn MovingPhotoEncoder>>,
}

impl CaptureSession {
    /// Creates a session for `pid` and registers it. Unless the configuration
    /// enables multi-camera, an existing session of the same process is
    /// preempted and released first.
    pub fn new(caller_token: u32, pid: u32, op_mode: OperationMode, config: SessionConfig) -> Arc<Self> {
        let registry = SessionRegistry::instance();
        if !config.multi_camera_enabled {
            if let Some(previous) = registry.get(pid) {
                warn!("pid {} already owns session {}, preempting it", pid, previous.session_id);
                previous.preempt();
            }
        }

        let session = Arc::new_cyclic(|weak_self| Self {
            weak_self: weak_self.clone(),
            session_id: NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed),
            caller_token,
            pid,
            op_mode,
            feature_mode: AtomicI32::new(0),
            config,
            state_machine: StateMachine::new(),
            streams: StreamContainer::new(),
            device: RwLock::new(None),
            color_space: RwLock::new(ColorSpace::COLOR_SPACE_UNKNOWN),
            capture_color_space: RwLock::new(ColorSpace::COLOR_SPACE_UNKNOWN),
            callback: RwLock::new(None),
            cb_mutex: Mutex::new(()),
            rotation_listener: Arc::new(DisplayRotationListener::new()),
            rotation_enabled: AtomicBool::new(false),
            device_class: RwLock::new(String::new()),
            is_set_motion_photo: AtomicBool::new(false),
            is_moving_photo_mirror: AtomicBool::new(false),
            moving_photo: Mutex::new(MovingPhotoContext::default()),
            encoder: RwLock::new(Arc::new(DiscardEncoder)),
        });
        registry.insert(pid, &session);
        info!("session {} created: pid {}, mode {}", session.session_id, pid, op_mode);
        session
    }

    fn preempt(&self) {
        if let Some(device) = self.device() {
            device.on_error(DeviceErrorKind::DevicePreempt, 0);
        }
        self.notify_error(ServiceErrorCode::DevicePreempted);
        if let Err(err) = self.release() {
            error!("release of preempted session {} failed: {}", self.session_id, err);
        }
    }

    /// Releases the registered session of a process that went away.
    pub fn destroy_for_pid(pid: u32) {
        if let Some(session) = SessionRegistry::instance().get(pid) {
            info!("destroy session {} of pid {}", session.session_id, pid);
            if let Err(err) = session.release() {
                warn!("release of session {} failed: {}", session.session_id, err);
            }
        }
    }

    pub fn session_id(&self) -> u64 {
        self.session_id
    }

    pub fn caller_token(&self) -> u32 {
        self.caller_token
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn op_mode(&self) -> OperationMode {
        self.op_mode
    }

    pub fn set_feature_mode(&self, feature_mode: i32) {
        self.feature_mode.store(feature_mode, Ordering::Release);
    }

    pub fn feature_mode(&self) -> i32 {
        self.feature_mode.load(Ordering::Acquire)
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn session_state(&self) -> CaptureSessionState {
        self.state_machine.current_state()
    }

    pub fn streams(&self) -> &StreamContainer {
        &self.streams
    }

    pub fn device(&self) -> Option<Arc<dyn CameraDevice>> {
        self.device.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn set_device(&self, device: Option<Arc<dyn CameraDevice>>) {
        *self.device.write().unwrap_or_else(PoisonError::into_inner) = device;
    }

    pub fn active_color_space(&self) -> ColorSpace {
        *self.color_space.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn capture_color_space(&self) -> ColorSpace {
        *self.capture_color_space.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Descriptors of every non-metadata stream, in framework id order.
    pub fn current_stream_infos(&self) -> Vec<StreamInfo> {
        self.streams.get_all_streams().iter().filter(|stream| stream.stream_type() != StreamType::Metadata).map(|stream| stream.stream_info()).collect()
    }

    pub fn set_callback(&self, callback: Arc<dyn CaptureSessionCallback>) {
        *self.callback.write().unwrap_or_else(PoisonError::into_inner) = Some(callback);
    }

    pub fn unset_callback(&self) {
        self.callback.write().unwrap_or_else(PoisonError::into_inner).take();
    }

    fn notify_error(&self, code: ServiceErrorCode) {
        let callback = self.callback.read().unwrap_or_else(PoisonError::into_inner).clone();
        if let Some(callback) = callback {
            callback.on_error(code);
        }
    }

    /// Makes preview transforms follow the display rotation for `device_class`.
    pub fn set_preview_rotation(&self, device_class: &str) {
        *self.device_class.write().unwrap_or_else(PoisonError::into_inner) = device_class.to_string();
        self.rotation_enabled.store(true, Ordering::Release);
    }

    pub fn rotation_listener(&self) -> &Arc<DisplayRotationListener> {
        &self.rotation_listener
    }

    pub fn set_moving_photo_encoder(&self, encoder: Arc<dyn MovingPhotoEncoder>) {
        *self.encoder.write().unwrap_or_else(PoisonError::into_inner) = encoder;
    }

    fn moving_photo_context(&self) -> MutexGuard<'_, MovingPhotoContext> {
        self.moving_photo.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Human readable session summary.
    pub fn dump_session_info(&self) -> String {
        let mut dump = String::new();
        writeln!(dump, "Client pid:[{}]    Session id:[{}]", self.pid, self.session_id).ok();
        writeln!(dump, "session state:[{}]", self.session_state()).ok();
        writeln!(dump, "operation mode:[{}]    feature mode:[{}]", self.op_mode, self.feature_mode()).ok();
        writeln!(dump, "color space:[{}]    capture color space:[{}]", self.active_color_space(), self.capture_color_space()).ok();
        for stream in self.streams.get_all_streams() {
            let info = stream.stream_info();
            writeln!(
                dump,
                "    stream type:[{}] fwk id:[{}] hdi id:[{}] {}x{} format:[{}] color space:[{}]",
                stream.stream_type(),
                stream.fwk_stream_id(),
                stream.hdi_stream_id(),
                info.width,
                info.height,
                info.format,
                info.color_space
            )
            .ok();
        }
        dump
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        if self.state_machine.current_state() != CaptureSessionState::Released {
            if let Err(err) = self.release() {
                warn!("release on drop of session {} failed: {}", self.session_id, err);
            }
        }
    }
}
