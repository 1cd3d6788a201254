use camera_core::{
    error::{status_of, Error, ServiceErrorCode},
    invalid_state_error,
    metadata::{CameraMetadata, MetadataTag, MetadataValue, MuteMode},
    session_config_error,
    stream::{ColorSpace, OperationMode, PixelFormat, Rotation},
    Result,
};

#[test]
fn test_add_and_find() {
    let mut metadata = CameraMetadata::new();
    assert!(metadata.is_empty());

    assert!(!metadata.add_entry(MetadataTag::ControlMuteMode, MetadataValue::Byte(vec![MuteMode::Off.into()])));
    assert!(metadata.add_entry(MetadataTag::ControlMuteMode, MetadataValue::Byte(vec![MuteMode::SolidColorBlack.into()])));
    assert_eq!(metadata.len(), 1);
    assert_eq!(metadata.find_u8(MetadataTag::ControlMuteMode), Some(1));

    metadata.add_entry(MetadataTag::AbilityZoomPerformance, MetadataValue::UInt32(vec![0, 1, 200, 50, 60]));
    assert_eq!(metadata.find_u32_array(MetadataTag::AbilityZoomPerformance).unwrap().len(), 5);
    assert!(metadata.find_f32_array(MetadataTag::AbilityZoomPerformance).is_none());
}

#[test]
fn test_merge_overlays_entries() {
    let mut settings = CameraMetadata::new();
    settings.add_entry(MetadataTag::ControlZoomRatio, MetadataValue::Float(vec![1.0]));
    settings.add_entry(MetadataTag::JpegOrientation, MetadataValue::Int32(vec![0]));

    let mut overlay = CameraMetadata::new();
    overlay.add_entry(MetadataTag::JpegOrientation, MetadataValue::Int32(vec![90]));
    settings.merge(&overlay);

    assert_eq!(settings.len(), 2);
    assert_eq!(settings.find_i32(MetadataTag::JpegOrientation), Some(90));
}

#[test]
fn test_error_codes() {
    let err = invalid_state_error!("session released");
    assert_eq!(err.code(), ServiceErrorCode::InvalidState);
    assert_eq!(err.status(), 10);

    let err = session_config_error!("second input");
    assert_eq!(err.code(), ServiceErrorCode::InvalidSessionCfg);

    assert_eq!(Error::NotFound("stream".into()).code(), ServiceErrorCode::InvalidArg);

    let ok: Result<()> = Ok(());
    assert_eq!(status_of(&ok), 0);
    assert_eq!(ServiceErrorCode::try_from(12).unwrap(), ServiceErrorCode::DevicePreempted);
    assert_eq!(ServiceErrorCode::OperationNotAllowed.to_string(), "CAMERA_OPERATION_NOT_ALLOWED");
}

#[test]
fn test_stream_enums() {
    assert!(ColorSpace::BT2020_PQ_LIMIT.is_hdr());
    assert!(!ColorSpace::BT709.is_hdr());
    assert!(PixelFormat::YCRCB_P010.is_10bit());
    assert!(OperationMode::try_from(15).unwrap().is_secure());
    assert_eq!(Rotation::try_from(450).unwrap(), Rotation::Rotation90);
    assert!(Rotation::try_from(45).is_err());
}
