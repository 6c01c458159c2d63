use super::*;
use crate::render::surface_pool::SurfacePoolOpts;
use crate::schedule::job::CancelToken;
use std::sync::Mutex;

fn pool() -> SurfacePool {
    SurfacePool::new(SurfacePoolOpts::default()).unwrap()
}

fn gradient(w: u32, h: u32) -> RgbaImage {
    RgbaImage::from_fn(w, h, |x, y| {
        image::Rgba([(x * 255 / w.max(1)) as u8, (y * 255 / h.max(1)) as u8, 128, 255])
    })
}

fn run(res: u32, algorithm: Algorithm, source: Option<&RgbaImage>) -> RgbaImage {
    synthesize(
        &pool(),
        AcquirePolicy::default(),
        &SynthOpts::default(),
        res,
        algorithm,
        source,
        &JobCtx::default(),
    )
    .unwrap()
}

#[test]
fn output_is_exactly_resolution_square() {
    let src = gradient(40, 30);
    for res in [256, 512, 1024, 2048, 4096] {
        let out = run(res, Algorithm::Particle, Some(&src));
        assert_eq!(out.dimensions(), (res, res));
    }
}

#[test]
fn odd_sizes_smaller_than_tile_and_latent() {
    for res in [1, 17, 300] {
        let out = run(res, Algorithm::Block, None);
        assert_eq!(out.dimensions(), (res, res));
    }
}

#[test]
fn output_is_opaque_and_dark() {
    let out = run(256, Algorithm::Polygon, None);
    assert!(out.pixels().all(|p| p[3] == 255));
    let mean = crate::effects::sample::mean_rgb(&out);
    assert!(mean.iter().all(|c| *c < 64.0), "{mean:?}");
}

#[test]
fn unknown_algorithm_matches_fallback_bytes() {
    let src = gradient(64, 64);
    let a = run(256, Algorithm::resolve(Some("mystery")), Some(&src));
    let b = run(256, Algorithm::FALLBACK, Some(&src));
    assert_eq!(a.as_raw(), b.as_raw());
}

#[test]
fn deterministic_for_fixed_seed() {
    let src = gradient(32, 32);
    assert_eq!(
        run(256, Algorithm::Particle, Some(&src)),
        run(256, Algorithm::Particle, Some(&src))
    );
}

#[test]
fn surface_returns_to_pool_after_success_and_cancel() {
    let p = pool();
    let token = CancelToken::new();
    token.cancel();
    let err = synthesize(
        &p,
        AcquirePolicy::default(),
        &SynthOpts::default(),
        512,
        Algorithm::Wave,
        None,
        &JobCtx::new(token),
    )
    .unwrap_err();
    assert!(err.is_cancelled());
    assert_eq!(p.available(), p.capacity());

    synthesize(
        &p,
        AcquirePolicy::default(),
        &SynthOpts::default(),
        256,
        Algorithm::Wave,
        None,
        &JobCtx::default(),
    )
    .unwrap();
    assert_eq!(p.available(), p.capacity());
}

#[test]
fn exhausted_pool_fails_with_resource_error() {
    let p = SurfacePool::new(SurfacePoolOpts { capacity: 1 }).unwrap();
    let _held = p.acquire().unwrap();
    let err = synthesize(
        &p,
        AcquirePolicy {
            retries: 0,
            backoff_ms: 0,
        },
        &SynthOpts::default(),
        256,
        Algorithm::Particle,
        None,
        &JobCtx::default(),
    )
    .unwrap_err();
    assert!(matches!(err, HyperError::ResourceExhausted(_)));
}

#[test]
fn progress_covers_every_tile_and_ends_full() {
    let seen = Mutex::new(Vec::new());
    let cb = |p: u8| seen.lock().unwrap().push(p);
    let ctx = JobCtx::default().with_progress(&cb);
    synthesize(
        &pool(),
        AcquirePolicy::default(),
        &SynthOpts::default(),
        512,
        Algorithm::Particle,
        None,
        &ctx,
    )
    .unwrap();
    let seen = seen.into_inner().unwrap();
    assert_eq!(seen, vec![25, 50, 75, 100]);
}

#[test]
fn invalid_opts_are_rejected() {
    let opts = SynthOpts {
        tile_size: 0,
        ..SynthOpts::default()
    };
    assert!(opts.validate().is_err());
    assert!(
        synthesize(
            &pool(),
            AcquirePolicy::default(),
            &SynthOpts::default(),
            0,
            Algorithm::Particle,
            None,
            &JobCtx::default(),
        )
        .is_err()
    );
}

#[test]
fn png_roundtrip_preserves_pixels() {
    let img = gradient(8, 5);
    let bytes = encode_png(&img).unwrap();
    assert_eq!(&bytes[..8], b"\x89PNG\r\n\x1a\n");
    assert_eq!(decode_raster(&bytes).unwrap(), img);
    assert!(decode_raster(b"not an image").is_err());
}
