use super::*;
use crate::encode::ffmpeg::is_ffmpeg_on_path;
use crate::foundation::core::Fps;
use crate::foundation::error::HyperError;
use crate::schedule::job::JobStatus;
use crate::video::source::MemoryVideoSource;
use std::sync::Mutex;

fn engine(codec: CodecProfile) -> Engine {
    let mut opts = EngineOpts::default();
    opts.encode.codec = codec;
    Engine::with_capabilities(
        opts,
        SystemCapabilities {
            cores: 2,
            memory_gb: 8.0,
        },
    )
    .unwrap()
}

fn clip(frames: usize) -> MemoryVideoSource {
    let frames = (0..frames)
        .map(|i| RgbaImage::from_pixel(8, 8, image::Rgba([(i * 8) as u8, 60, 120, 255])))
        .collect();
    MemoryVideoSource::new(frames, Fps::integer(30).unwrap()).unwrap()
}

fn is_monotone(v: &[u8]) -> bool {
    v.windows(2).all(|w| w[0] <= w[1])
}

#[test]
fn image_job_returns_png_and_completes_record() {
    let e = engine(CodecProfile::Png);
    let seen = Mutex::new(Vec::new());
    let cb = |p: u8| seen.lock().unwrap().push(p);
    let src = RgbaImage::from_pixel(20, 10, image::Rgba([200, 30, 30, 255]));
    let req = ImageRequest::new(Some(src), Resolution::R512)
        .with_label("red.png")
        .with_algorithm_id(Some("quantum"));

    let bytes = e.process_image(&req, Some(&cb), &CancelToken::new()).unwrap();
    let img = image::load_from_memory(&bytes).unwrap();
    assert_eq!((img.width(), img.height()), (512, 512));

    let seen = seen.into_inner().unwrap();
    assert!(is_monotone(&seen));
    assert_eq!(seen.last(), Some(&100));

    let job = &e.jobs().list()[0];
    assert_eq!(job.kind, JobKind::Image);
    assert_eq!(job.source, "red.png");
    assert_eq!(job.algorithm, Algorithm::Wave);
    assert_eq!(job.status, JobStatus::Complete);
    assert_eq!(job.progress, 100);
}

#[test]
fn cancelled_image_job_is_marked_failed() {
    let e = engine(CodecProfile::Png);
    let cancel = CancelToken::new();
    cancel.cancel();
    let err = e
        .process_image(&ImageRequest::new(None, Resolution::R256), None, &cancel)
        .unwrap_err();
    assert!(err.is_cancelled());
    let job = &e.jobs().list()[0];
    assert_eq!(job.status, JobStatus::Error);
    assert!(job.error.is_some());
    assert_eq!(e.pool_stats().in_use, 0);
}

#[test]
fn video_job_produces_mp4_with_split_progress() {
    let e = engine(CodecProfile::Png);
    let seen = Mutex::new(Vec::new());
    let cb = |p: u8| seen.lock().unwrap().push(p);
    let mut src = clip(30);

    let bytes = e
        .process_video(
            &mut src,
            &VideoRequest::new(Resolution::R256),
            Some(&cb),
            &CancelToken::new(),
        )
        .unwrap()
        .unwrap();
    assert_eq!(&bytes[4..8], b"ftyp");
    assert!(bytes.windows(4).any(|w| w == b"moov"));

    let seen = seen.into_inner().unwrap();
    assert!(is_monotone(&seen));
    assert!(seen.iter().any(|&p| p > 0 && p < 50));
    assert!(seen.iter().any(|&p| p > 50 && p < 100));
    assert_eq!(seen.last(), Some(&100));

    let job = &e.jobs().list()[0];
    assert_eq!(job.kind, JobKind::Video);
    assert_eq!(job.status, JobStatus::Complete);
    assert_eq!(e.pool_stats().in_use, 0);
}

#[test]
fn video_progress_reaches_100_only_after_muxing() {
    let e = engine(CodecProfile::Png);
    let seen = Mutex::new(Vec::new());
    let cb = |p: u8| seen.lock().unwrap().push(p);
    let mut src = clip(30);
    e.process_video(
        &mut src,
        &VideoRequest::new(Resolution::R256),
        Some(&cb),
        &CancelToken::new(),
    )
    .unwrap()
    .unwrap();

    let seen = seen.into_inner().unwrap();
    assert_eq!(seen.iter().filter(|&&p| p == 100).count(), 1, "{seen:?}");
    assert_eq!(seen.last(), Some(&100));
    let before_last = seen[seen.len() - 2];
    assert!(before_last <= 95, "{seen:?}");
}

#[test]
fn short_video_fails_precondition_and_frees_pool() {
    let e = engine(CodecProfile::Png);
    let mut src = clip(5);
    let err = e
        .process_video(
            &mut src,
            &VideoRequest::new(Resolution::R256),
            None,
            &CancelToken::new(),
        )
        .unwrap_err();
    assert!(matches!(err, HyperError::Precondition(_)));
    assert_eq!(e.jobs().list()[0].status, JobStatus::Error);
    assert_eq!(e.pool_stats().in_use, 0);
}

#[test]
fn keyframe_interval_override_is_applied() {
    let e = engine(CodecProfile::Png);
    let mut src = clip(30);
    let req = VideoRequest {
        keyframe_interval: Some(20),
        ..VideoRequest::new(Resolution::R256)
    };
    // Indices 0 and 20: two keyframes, enough to proceed.
    assert!(
        e.process_video(&mut src, &req, None, &CancelToken::new())
            .unwrap()
            .is_some()
    );
}

#[test]
fn missing_h264_encoder_skips_video_job() {
    if is_ffmpeg_on_path() {
        return;
    }
    let e = engine(CodecProfile::H264Main);
    let mut src = clip(30);
    let out = e
        .process_video(
            &mut src,
            &VideoRequest::new(Resolution::R256),
            None,
            &CancelToken::new(),
        )
        .unwrap();
    assert!(out.is_none());
    assert!(e.jobs().list().is_empty());
}

#[test]
fn batch_keeps_request_order() {
    let e = engine(CodecProfile::Png);
    let reqs = vec![
        ImageRequest::new(None, Resolution::R256).with_label("a"),
        ImageRequest::new(None, Resolution::R512).with_label("b"),
        ImageRequest::new(None, Resolution::R256).with_label("c"),
    ];
    let out = e.process_images(reqs, &CancelToken::new());
    let sizes: Vec<u32> = out
        .iter()
        .map(|r| image::load_from_memory(r.as_ref().unwrap()).unwrap().width())
        .collect();
    assert_eq!(sizes, vec![256, 512, 256]);
    assert_eq!(e.jobs().list().len(), 3);
    assert!(e.process_images(Vec::new(), &CancelToken::new()).is_empty());
}

#[test]
fn capability_report_lists_every_tier() {
    let e = engine(CodecProfile::Png);
    let r = e.capability_report();
    assert!(r.png);
    assert_eq!(r.max_concurrent_jobs, 2);
    assert_eq!(r.safe_zones.len(), 7);
}

#[test]
fn invalid_opts_are_rejected() {
    let mut opts = EngineOpts::default();
    opts.pool.capacity = 0;
    assert!(Engine::new(opts).is_err());
}
