mod common;

use std::sync::Arc;

use camera_core::{
    error::ServiceErrorCode,
    metadata::{CameraMetadata, MetadataTag, MetadataValue},
    stream::{OperationMode, CAPTURE_ID_UNSET},
};
use camera_device::{CaptureErrorInfo, StreamError, StreamOperatorCallback};
use camera_session::{stream::StreamCapture, CaptureSession};
use common::*;
use uuid::Uuid;

fn burst_settings() -> CameraMetadata {
    let mut settings = CameraMetadata::new();
    settings.add_entry(MetadataTag::ControlBurstCapture, MetadataValue::Byte(vec![1]));
    settings
}

fn committed_capture() -> (Arc<CaptureSession>, Arc<MockDevice>, Arc<StreamCapture>) {
    init_logger();
    let session = new_session(OperationMode::Capture);
    let device = MockDevice::new();
    let capture = capture_stream();
    commit_with(&session, &device, &[preview_stream().into(), capture.clone().into()]);
    (session, device, capture)
}

#[test]
fn test_burst_lifecycle() {
    let (session, device, capture) = committed_capture();
    let hdi_stream_id = capture.common().hdi_stream_id();

    let capture_id = capture.capture(&burst_settings()).unwrap();
    assert!(capture.is_bursting());
    assert!(capture.is_burst_capture(capture_id));
    assert_eq!(capture.burst_count(), 1);
    let key = capture.burst_key(capture_id).unwrap();
    assert!(Uuid::parse_str(&key).is_ok());
    let (_, _, is_streaming) = device.operator.last_capture().unwrap();
    assert!(is_streaming);
    assert_eq!(capture.common().prepared_capture_id(), capture_id);
    assert_eq!(capture.capture(&burst_settings()).unwrap_err().code(), ServiceErrorCode::InvalidState);

    for timestamp in [10, 20, 30] {
        session.on_frame_shutter_end(capture_id, &[hdi_stream_id], timestamp).unwrap();
    }
    capture.set_burst_images(capture_id, "image-0");
    assert!(capture.is_burst_cover(capture_id));
    capture.set_burst_images(capture_id, "image-1");
    assert!(!capture.is_burst_cover(capture_id));
    assert_eq!(capture.cur_burst_seq(capture_id), 2);

    capture.confirm_capture().unwrap();
    assert!(!capture.is_bursting());
    assert_eq!(capture.common().prepared_capture_id(), CAPTURE_ID_UNSET);
    assert_eq!(device.operator.cancels.lock().unwrap().clone(), vec![capture_id]);
    // the key survives until all three shutters have their image
    assert_eq!(capture.burst_key(capture_id), Some(key));

    capture.set_burst_images(capture_id, "image-2");
    assert!(capture.burst_key(capture_id).is_none());
    assert_eq!(capture.cur_burst_seq(capture_id), 0);
}

#[test]
fn test_confirm_without_burst() {
    let (_session, _device, capture) = committed_capture();
    assert_eq!(capture.confirm_capture().unwrap_err().code(), ServiceErrorCode::OperationNotAllowed);
}

#[test]
fn test_capture_ready_ends_burst() {
    let (session, _device, capture) = committed_capture();
    let hdi_stream_id = capture.common().hdi_stream_id();
    let capture_id = capture.capture(&burst_settings()).unwrap();
    session.on_frame_shutter_end(capture_id, &[hdi_stream_id], 10).unwrap();
    session.on_capture_ready(capture_id, &[hdi_stream_id], 11).unwrap();

    assert!(!capture.is_bursting());
    assert_eq!(capture.common().prepared_capture_id(), CAPTURE_ID_UNSET);
    capture.set_burst_images(capture_id, "only");
    assert!(!capture.is_burst_capture(capture_id));

    // a second burst gets a fresh key
    let next = capture.capture(&burst_settings()).unwrap();
    assert_ne!(next, capture_id);
    assert_eq!(capture.burst_count(), 2);
}

#[test]
fn test_capture_error_resets_burst() {
    let (session, _device, capture) = committed_capture();
    let hdi_stream_id = capture.common().hdi_stream_id();
    let capture_id = capture.capture(&burst_settings()).unwrap();
    session
        .on_capture_error(capture_id, &[CaptureErrorInfo { stream_id: hdi_stream_id, error: StreamError::Unknown }])
        .unwrap();
    assert!(!capture.is_bursting());
    assert!(capture.burst_key(capture_id).is_none());
    assert_eq!(capture.common().prepared_capture_id(), CAPTURE_ID_UNSET);
}

#[test]
fn test_single_capture_waits_for_ready() {
    let (session, _device, capture) = committed_capture();
    let hdi_stream_id = capture.common().hdi_stream_id();
    let capture_id = capture.capture(&CameraMetadata::new()).unwrap();
    assert!(!capture.is_burst_capture(capture_id));
    assert_eq!(capture.capture(&CameraMetadata::new()).unwrap_err().code(), ServiceErrorCode::OperationNotAllowed);

    session.on_capture_ready(capture_id, &[hdi_stream_id], 5).unwrap();
    capture.capture(&CameraMetadata::new()).unwrap();
}

#[test]
fn test_failed_burst_request_is_undone() {
    let (_session, device, capture) = committed_capture();
    device.operator.fail_capture.store(true, std::sync::atomic::Ordering::Release);
    let err = capture.capture(&burst_settings()).unwrap_err();
    assert_eq!(err.code(), ServiceErrorCode::UnknownError);
    assert!(!capture.is_bursting());
    assert_eq!(capture.common().prepared_capture_id(), CAPTURE_ID_UNSET);
}
