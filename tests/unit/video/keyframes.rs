use super::*;
use crate::render::surface_pool::SurfacePoolOpts;
use crate::schedule::job::CancelToken;
use crate::video::source::MemoryVideoSource;
use std::sync::Mutex;

fn clip(frames: usize) -> MemoryVideoSource {
    let frames = (0..frames)
        .map(|i| RgbaImage::from_pixel(8, 8, image::Rgba([(i * 8) as u8, 40, 90, 255])))
        .collect();
    MemoryVideoSource::new(frames, Fps::integer(30).unwrap()).unwrap()
}

fn pool() -> SurfacePool {
    SurfacePool::new(SurfacePoolOpts::default()).unwrap()
}

fn extract(src: &mut MemoryVideoSource, ctx: &JobCtx<'_>) -> HyperResult<Vec<Keyframe>> {
    extract_keyframes(
        src,
        &pool(),
        AcquirePolicy::default(),
        &SynthOpts::default(),
        &KeyframeOpts::default(),
        64,
        Algorithm::Particle,
        ctx,
    )
}

#[test]
fn indices_follow_stride_below_total() {
    let opts = KeyframeOpts::default();
    assert_eq!(keyframe_indices(1.0, &opts).unwrap(), vec![0, 10, 20]);
    assert_eq!(keyframe_indices(0.5, &opts).unwrap(), vec![0, 10]);
    assert_eq!(keyframe_indices(0.3, &opts).unwrap(), vec![0]);
    assert!(keyframe_indices(0.0, &opts).unwrap().is_empty());
    assert!(keyframe_indices(f64::INFINITY, &opts).unwrap().is_empty());

    let every_5 = KeyframeOpts {
        interval: 5,
        ..opts
    };
    assert_eq!(keyframe_indices(1.0, &every_5).unwrap().len(), 6);
    assert!(
        keyframe_indices(
            1.0,
            &KeyframeOpts {
                interval: 0,
                ..opts
            }
        )
        .is_err()
    );
}

#[test]
fn one_second_clip_yields_three_keyframes() {
    let mut src = clip(30);
    let kfs = extract(&mut src, &JobCtx::default()).unwrap();
    let idx: Vec<_> = kfs.iter().map(|k| k.frame_index).collect();
    assert_eq!(idx, vec![0, 10, 20]);
    assert!((kfs[1].timestamp_secs - 10.0 / 30.0).abs() < 1e-12);
    assert!(kfs.iter().all(|k| k.raster.dimensions() == (64, 64)));
    assert!(kfs.windows(2).all(|w| w[0].timestamp_secs < w[1].timestamp_secs));
}

#[test]
fn short_clip_is_a_precondition_failure() {
    let mut src = clip(9);
    let err = extract(&mut src, &JobCtx::default()).unwrap_err();
    assert!(matches!(err, HyperError::Precondition(_)));
}

#[test]
fn progress_covers_first_half() {
    let seen = Mutex::new(Vec::new());
    let cb = |p: u8| seen.lock().unwrap().push(p);
    let ctx = JobCtx::default().with_progress(&cb);
    let mut src = clip(30);
    extract(&mut src, &ctx.window(0, 50)).unwrap();
    assert_eq!(seen.into_inner().unwrap(), vec![0, 17, 33]);
}

#[test]
fn cancellation_stops_extraction() {
    let token = CancelToken::new();
    token.cancel();
    let mut src = clip(30);
    let err = extract(&mut src, &JobCtx::new(token)).unwrap_err();
    assert!(err.is_cancelled());
}
