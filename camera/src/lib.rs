use cfg_if::cfg_if;
pub use camera_core::*;

cfg_if! {
    if #[cfg(feature = "device")] {
        pub use camera_device as device;
    }
}

cfg_if! {
    if #[cfg(feature = "session")] {
        pub use camera_session as session;
        pub use camera_session::{CaptureSession, CaptureSessionCallback, CaptureSessionState, SessionConfig, Stream};
    }
}
