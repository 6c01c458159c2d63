use super::*;

fn png_cfg(w: u32, h: u32) -> EncoderConfig {
    EncoderConfig::new(CodecProfile::Png, w, h, Fps::integer(30).unwrap())
}

fn be32(b: &[u8], at: usize) -> u32 {
    u32::from_be_bytes([b[at], b[at + 1], b[at + 2], b[at + 3]])
}

fn find(hay: &[u8], tag: &[u8; 4]) -> usize {
    hay.windows(4).position(|w| w == tag).unwrap() - 4
}

#[test]
fn flatten_composites_over_black() {
    let src = RgbaImage::from_raw(2, 1, vec![200, 100, 50, 128, 1, 2, 3, 255]).unwrap();
    let mut dst = RgbaImage::new(2, 1);
    flatten_over_black(&mut dst, &src);
    assert_eq!(dst.as_raw(), &vec![100, 50, 25, 255, 1, 2, 3, 255]);
}

#[test]
fn config_validation() {
    assert!(png_cfg(3, 3).validate().is_ok());
    assert!(png_cfg(0, 3).validate().is_err());
    assert!(png_cfg(70_000, 2).validate().is_err());

    let odd = EncoderConfig::new(CodecProfile::H264Main, 3, 4, Fps::integer(30).unwrap());
    assert!(odd.validate().is_err());
    let zero_rate = EncoderConfig {
        bitrate: 0,
        ..EncoderConfig::new(CodecProfile::H264Main, 4, 4, Fps::integer(30).unwrap())
    };
    assert!(zero_rate.validate().is_err());
}

#[test]
fn defaults_and_fourcc() {
    assert_eq!(CodecProfile::default(), CodecProfile::H264Main);
    assert_eq!(png_cfg(2, 2).bitrate, 5_000_000);
    assert_eq!(&CodecProfile::H264Main.fourcc(), b"avc1");
    assert_eq!(&CodecProfile::Png.fourcc(), b"png ");
    assert!(is_available(CodecProfile::Png));
}

#[test]
fn png_session_writes_one_sample_per_frame() {
    let frames: Vec<_> = (0..3u8)
        .map(|i| RgbaImage::from_pixel(6, 4, image::Rgba([200, 10 * i, 0, 128])))
        .collect();
    let file = encode_frames(&frames, png_cfg(6, 4)).unwrap();

    let stsz = find(&file, b"stsz");
    assert_eq!(be32(&file, stsz + 16), 3);
    let first_len = be32(&file, stsz + 20) as usize;

    let stco = find(&file, b"stco");
    let off = be32(&file, stco + 16) as usize;
    let first = image::load_from_memory(&file[off..off + first_len])
        .unwrap()
        .to_rgba8();
    assert_eq!(first.dimensions(), (6, 4));
    assert_eq!(first.get_pixel(0, 0).0, [100, 0, 0, 255]);
}

#[test]
fn session_rejects_wrong_frame_size() {
    let mut s = EncodeSession::new(png_cfg(4, 4)).unwrap();
    assert!(s.push_frame(&RgbaImage::new(2, 2)).is_err());
    assert_eq!(s.frames_pushed(), 0);
    assert!(s.finish().is_err());
}

#[test]
fn chunks_are_stamped_by_frame_index() {
    let cfg = png_cfg(2, 2);
    let mut enc = open_encoder(&cfg).unwrap();
    let mut out: Vec<EncodedChunk> = Vec::new();
    let frame = RgbaImage::from_pixel(2, 2, image::Rgba([1, 2, 3, 255]));
    for i in 0..3 {
        enc.encode(&frame, cfg.fps.frame_timestamp_us(i), &mut out)
            .unwrap();
    }
    enc.flush(&mut out).unwrap();
    let ts: Vec<_> = out.iter().map(|c| c.timestamp_us).collect();
    assert_eq!(ts, vec![0, 33_333, 66_666]);
    assert!(out.iter().all(|c| c.is_key && c.duration_us >= 33_333));
}
