use camera_core::stream::{PixelFormat, RepeatStreamType, StreamType, STREAM_ID_UNSET};
use camera_session::{
    stream::{StreamCapture, StreamMetadata, StreamRepeat},
    Stream, StreamContainer,
};

fn repeat(fwk_stream_id: i32) -> Stream {
    StreamRepeat::with_stream_id(fwk_stream_id, None, PixelFormat::YCBCR_420_SP, 16, 16, RepeatStreamType::Preview).into()
}

#[test]
fn test_streams_sorted_by_fwk_id() {
    let container = StreamContainer::new();
    for id in [5, 2, 9] {
        assert!(container.add_stream(repeat(id)));
    }
    let ids: Vec<_> = container.get_streams(StreamType::Repeat).iter().map(Stream::fwk_stream_id).collect();
    assert_eq!(ids, vec![2, 5, 9]);
    assert_eq!(container.size(), 3);
    assert!(container.get_streams(StreamType::Capture).is_empty());
}

#[test]
fn test_add_and_remove_are_idempotent() {
    let container = StreamContainer::new();
    let stream = repeat(7);
    assert!(container.add_stream(stream.clone()));
    assert!(!container.add_stream(stream.clone()));
    assert_eq!(container.size(), 1);

    assert!(container.remove_stream(&stream));
    assert!(!container.remove_stream(&stream));
    assert!(container.is_empty());
}

#[test]
fn test_identity_not_id() {
    // Two distinct streams sharing an id are both kept.
    let container = StreamContainer::new();
    assert!(container.add_stream(repeat(3)));
    assert!(container.add_stream(repeat(3)));
    assert_eq!(container.size(), 2);
}

#[test]
fn test_lookup() {
    let container = StreamContainer::new();
    let capture: Stream = StreamCapture::with_stream_id(11, PixelFormat::BLOB, 16, 16).into();
    let metadata: Stream = StreamMetadata::with_stream_id(4).into();
    container.add_stream(repeat(8));
    container.add_stream(capture.clone());
    container.add_stream(metadata.clone());

    assert!(container.get_stream(11).unwrap().ptr_eq(&capture));
    assert!(container.get_stream(42).is_none());
    assert!(container.get_stream(STREAM_ID_UNSET).is_none());

    // hdi ids are unset until commit
    assert!(container.get_hdi_stream(STREAM_ID_UNSET).is_none());
    capture.set_hdi_stream_id(2);
    assert!(container.get_hdi_stream(2).unwrap().ptr_eq(&capture));

    let ids: Vec<_> = container.get_all_streams().iter().map(Stream::fwk_stream_id).collect();
    assert_eq!(ids, vec![4, 8, 11]);

    container.clear();
    assert!(container.is_empty());
    assert!(container.get_stream(11).is_none());
}
