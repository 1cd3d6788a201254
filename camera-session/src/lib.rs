pub mod config;
pub mod display;
pub mod moving_photo;
pub mod registry;
pub mod session;
pub mod smooth_zoom;
pub mod state_machine;
pub mod stream;
pub mod stream_container;

pub use config::SessionConfig;
pub use session::{CaptureSession, CaptureSessionCallback};
pub use state_machine::{CaptureSessionState, StateMachine};
pub use stream::Stream;
pub use stream_container::StreamContainer;
