mod device;
pub mod hdi;
pub mod stream_operator;

pub use device::*;
pub use stream_operator::{CaptureEndedInfo, CaptureErrorInfo, CaptureInfo, StreamError, StreamOperator, StreamOperatorCallback};
