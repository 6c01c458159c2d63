use super::*;

#[test]
fn resolution_tiers_roundtrip_through_px() {
    for r in Resolution::ALL {
        assert_eq!(Resolution::from_px(r.px()).unwrap(), r);
    }
    assert!(Resolution::from_px(300).is_err());
    assert!(Resolution::from_px(0).is_err());
}

#[test]
fn resolution_serializes_as_edge_length() {
    let json = serde_json::to_string(&Resolution::R2048).unwrap();
    assert_eq!(json, "2048");
    let back: Resolution = serde_json::from_str("512").unwrap();
    assert_eq!(back, Resolution::R512);
    assert!(serde_json::from_str::<Resolution>("513").is_err());
}

#[test]
fn safe_zones_tighten_with_resolution() {
    let zones: Vec<SafeZone> = Resolution::ALL.iter().map(|r| r.safe_zone()).collect();
    for pair in zones.windows(2) {
        assert!(pair[0].min_memory_mb < pair[1].min_memory_mb);
        assert!(pair[0].max_concurrent >= pair[1].max_concurrent);
    }
    assert_eq!(Resolution::R256.safe_zone().max_concurrent, 8);
    assert_eq!(Resolution::R2048.safe_zone().min_memory_mb, 4096);
    assert!(Resolution::R2048.safe_zone().warning.is_none());
    assert!(Resolution::R4096.safe_zone().warning.is_some());
    assert!(Resolution::R16384.safe_zone().warning.is_some());
}

#[test]
fn fps_floor_is_stable_for_frame_aligned_timestamps() {
    let fps = Fps::integer(30).unwrap();
    for i in 0..300u64 {
        let secs = i as f64 / 30.0;
        assert_eq!(fps.secs_to_frames_floor(secs), i);
    }
    assert_eq!(fps.secs_to_frames_floor(1.0), 30);
}

#[test]
fn fps_timestamps_are_in_microseconds() {
    let fps = Fps::integer(30).unwrap();
    assert_eq!(fps.frame_timestamp_us(0), 0);
    assert_eq!(fps.frame_timestamp_us(30), 1_000_000);
    assert_eq!(fps.frame_timestamp_us(1), 33_333);

    let ntsc = Fps::new(30000, 1001).unwrap();
    assert_eq!(ntsc.frame_timestamp_us(30000), 1_001_000_000);
    assert!(Fps::new(0, 1).is_err());
    assert!(Fps::new(30, 0).is_err());
}

#[test]
fn pixel_rect_intersection_clips_partial_tiles() {
    let bounds = PixelRect::new(0, 0, 300, 300);
    let tile = PixelRect::new(256, 256, 256, 256);
    assert_eq!(tile.intersect(bounds), PixelRect::new(256, 256, 44, 44));

    let outside = PixelRect::new(400, 0, 10, 10);
    assert!(outside.intersect(bounds).is_empty());
}
