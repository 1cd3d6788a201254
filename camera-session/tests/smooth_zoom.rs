use camera_core::{
    metadata::{CameraMetadata, MetadataTag, MetadataValue},
    stream::OperationMode,
};
use camera_session::smooth_zoom::{
    parse_zoom_performance, plan_smooth_zoom, zoom_duration_ms, CubicBezierCurve, LinearCurve, SmoothZoomType, ZoomCurve, ZoomPointInfo,
};

#[test]
fn test_duration() {
    assert_eq!(zoom_duration_ms(100.0, 100.0), 300.0);
    assert_eq!(zoom_duration_ms(100.0, 200.0), 450.0);
    assert_eq!(zoom_duration_ms(200.0, 100.0), 450.0);
    assert_eq!(zoom_duration_ms(100.0, 100_000.0), 1000.0);
}

#[test]
fn test_zoom_array_ends_at_target() {
    for curve in [&LinearCurve as &dyn ZoomCurve, &CubicBezierCurve::default()] {
        let array = curve.zoom_array(100.0, 200.0, 50.0);
        assert_eq!(array.len(), 9);
        assert_eq!(*array.last().unwrap(), 200.0);
        assert!(array.windows(2).all(|pair| pair[0] <= pair[1]));
        assert!(array[0] > 100.0);
    }
    assert!(LinearCurve.zoom_array(0.0, 200.0, 50.0).is_empty());
    assert!(LinearCurve.zoom_array(100.0, 200.0, 0.0).is_empty());
}

#[test]
fn test_bezier_progress() {
    let curve = CubicBezierCurve::default();
    assert!(curve.progress(0.0).abs() < 1e-4);
    assert!((curve.progress(1.0) - 1.0).abs() < 1e-4);
    // ease-out: ahead of linear around the middle
    assert!(curve.progress(0.5) > 0.5);
}

#[test]
fn test_curve_from_ability() {
    let mut ability = CameraMetadata::new();
    ability.add_entry(MetadataTag::AbilityZoomBezierCurve, MetadataValue::Float(vec![0.0, 0.0, 1.0, 1.0]));
    let curve = SmoothZoomType::Normal.curve(Some(&ability));
    assert!((curve.progress(0.5) - 0.5).abs() < 1e-3);
    assert!((SmoothZoomType::Linear.curve(None).progress(0.25) - 0.25).abs() < 1e-6);
}

#[test]
fn test_parse_zoom_performance() {
    let data = [0, 1, 200, 10, 20, 1, 2, 300, 30, 40, 500, 50, 60];
    assert_eq!(parse_zoom_performance(&data, OperationMode::Normal), vec![ZoomPointInfo {
        zoom_ratio: 200.0,
        wait_up: 10.0,
        wait_down: 20.0
    }]);
    let points = parse_zoom_performance(&data, OperationMode::Capture);
    assert_eq!(points.len(), 2);
    assert_eq!(points[1].zoom_ratio, 500.0);
    assert!(parse_zoom_performance(&data, OperationMode::Video).is_empty());
    assert!(parse_zoom_performance(&[0], OperationMode::Normal).is_empty());
}

#[test]
fn test_plan() {
    let plan = plan_smooth_zoom(&LinearCurve, 100.0, 200.0, 20.0, &[]).unwrap();
    assert_eq!(plan.points.len(), 9);
    assert_eq!(plan.points[0].1, 0);
    assert_eq!(plan.points[8], (200, 400));
    assert_eq!(plan.duration_ms, 400.0);
    assert_eq!(plan.to_ratios().len(), 18);

    assert!(plan_smooth_zoom(&LinearCurve, 0.0, 200.0, 30.0, &[]).is_err());
}

#[test]
fn test_plan_waits_at_cross_point() {
    let cross = [ZoomPointInfo {
        zoom_ratio: 150.0,
        wait_up: 300.0,
        wait_down: 0.0,
    }];
    let plain = plan_smooth_zoom(&LinearCurve, 100.0, 200.0, 20.0, &[]).unwrap();
    let plan = plan_smooth_zoom(&LinearCurve, 100.0, 200.0, 20.0, &cross).unwrap();
    assert!(plan.duration_ms > plain.duration_ms);
    assert!(plan.points[0].1 > 0);

    // outside the zoom range
    let far = [ZoomPointInfo {
        zoom_ratio: 900.0,
        ..cross[0]
    }];
    assert_eq!(plan_smooth_zoom(&LinearCurve, 100.0, 200.0, 20.0, &far).unwrap(), plain);
}

#[test]
fn test_plan_handles_extreme_ratios() {
    let cross = [ZoomPointInfo {
        zoom_ratio: 1.2e11,
        wait_up: 300.0,
        wait_down: 0.0,
    }];
    // 20 samples of 5e10 each at 20 fps, the third one passes the cross point
    let plan = plan_smooth_zoom(&LinearCurve, 100.0, 1e12, 20.0, &cross).unwrap();
    assert_eq!(plan.points.len(), 20);
    assert_eq!(plan.points[0].1, 200);
    assert_eq!(plan.duration_ms, 1150.0);
}
