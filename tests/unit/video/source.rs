use super::*;

fn solid(v: u8) -> RgbaImage {
    RgbaImage::from_pixel(4, 3, image::Rgba([v, v, v, 255]))
}

#[test]
fn memory_source_reports_duration_from_frame_count() {
    let frames = (0..45).map(|i| solid(i as u8)).collect();
    let src = MemoryVideoSource::new(frames, Fps::integer(30).unwrap()).unwrap();
    let info = src.info();
    assert_eq!((info.width, info.height), (4, 3));
    assert!((info.duration_secs - 1.5).abs() < 1e-12);
    assert_eq!(src.len(), 45);
}

#[test]
fn memory_source_seeks_by_floor_and_clamps_to_last() {
    let frames = (0..30).map(|i| solid(i as u8)).collect();
    let mut src = MemoryVideoSource::new(frames, Fps::integer(30).unwrap()).unwrap();
    assert_eq!(src.frame_at(0.0).unwrap().get_pixel(0, 0)[0], 0);
    assert_eq!(src.frame_at(10.0 / 30.0).unwrap().get_pixel(0, 0)[0], 10);
    assert_eq!(src.frame_at(0.999).unwrap().get_pixel(0, 0)[0], 29);
    assert_eq!(src.frame_at(5.0).unwrap().get_pixel(0, 0)[0], 29);
    assert!(src.frame_at(-1.0).is_err());
    assert!(src.frame_at(f64::NAN).is_err());
}

#[test]
fn memory_source_rejects_bad_frame_sets() {
    let fps = Fps::integer(30).unwrap();
    assert!(MemoryVideoSource::new(Vec::new(), fps).is_err());
    assert!(MemoryVideoSource::new(vec![RgbaImage::new(0, 0)], fps).is_err());
    let mixed = vec![solid(1), RgbaImage::new(2, 2)];
    assert!(MemoryVideoSource::new(mixed, fps).is_err());
}

#[cfg(not(feature = "media-ffmpeg"))]
#[test]
fn file_source_needs_feature() {
    let err = FfmpegVideoSource::open("clip.mp4").unwrap_err();
    assert!(matches!(err, HyperError::CapabilityMissing(_)));
}

#[cfg(feature = "media-ffmpeg")]
#[test]
fn ff_ratio_parsing() {
    assert_eq!(parse_ff_ratio("30000/1001"), Some((30000, 1001)));
    assert_eq!(parse_ff_ratio("0/0"), None);
    assert_eq!(parse_ff_ratio("25"), None);
}
