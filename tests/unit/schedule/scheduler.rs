use super::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

fn caps(cores: usize, memory_gb: f64) -> SystemCapabilities {
    SystemCapabilities { cores, memory_gb }
}

#[test]
fn max_concurrent_jobs_formula() {
    assert_eq!(caps(8, 16.0).max_concurrent_jobs(), 8);
    assert_eq!(caps(8, 4.0).max_concurrent_jobs(), 2);
    assert_eq!(caps(2, 64.0).max_concurrent_jobs(), 2);
    assert_eq!(caps(4, 5.9).max_concurrent_jobs(), 2);
}

#[test]
fn max_concurrent_jobs_is_at_least_one() {
    assert_eq!(caps(1, 0.5).max_concurrent_jobs(), 1);
    assert_eq!(caps(16, 0.0).max_concurrent_jobs(), 1);
    assert_eq!(caps(16, f64::NAN).max_concurrent_jobs(), 1);
    assert_eq!(caps(0, 32.0).max_concurrent_jobs(), 1);
}

#[test]
fn detected_capabilities_are_sane() {
    let c = SystemCapabilities::detect();
    assert!(c.cores >= 1);
    assert!(c.memory_gb > 0.0);
    assert!(c.max_concurrent_jobs() >= 1);
}

#[test]
fn overrides_replace_probed_values() {
    let c = caps(8, 16.0).with_overrides(CapabilityOverrides {
        cores: Some(2),
        memory_gb: None,
    });
    assert_eq!(c, caps(2, 16.0));
}

#[test]
fn meminfo_parsing() {
    let text = "MemFree:  100 kB\nMemTotal:       16777216 kB\n";
    assert_eq!(parse_meminfo_gb(text), Some(16.0));
    assert_eq!(parse_meminfo_gb("nothing here"), None);
}

#[test]
fn budget_is_capped_by_safe_zone() {
    let s = JobScheduler::new(caps(16, 64.0)).unwrap();
    assert_eq!(s.max_concurrent_jobs(), 16);
    assert_eq!(s.budget_for(Resolution::R256), 8);
    assert_eq!(s.budget_for(Resolution::R512), 6);
    assert_eq!(s.budget_for(Resolution::R2048), 2);
    assert_eq!(s.budget_for(Resolution::R16384), 1);

    let small = JobScheduler::new(caps(2, 4.0)).unwrap();
    assert_eq!(small.budget_for(Resolution::R256), 2);
}

#[test]
fn safe_zone_table_rows() {
    let s = JobScheduler::new(caps(1, 1.0)).unwrap();
    let zones = s.safe_zones();
    assert_eq!(zones.len(), 7);
    assert_eq!(zones[0].min_memory_mb, 512);
    assert_eq!(zones[0].max_concurrent, 8);
    assert!(zones[3].warning.is_none());
    assert!(zones[4].warning.is_some());
    assert_eq!(zones[6].min_memory_mb, 32768);
}

#[test]
fn run_batch_keeps_order_and_errors() {
    let s = JobScheduler::new(caps(4, 16.0)).unwrap();
    let jobs: Vec<_> = (0..10u32)
        .map(|i| {
            move || {
                if i == 3 {
                    Err(HyperError::validation("bad"))
                } else {
                    Ok(i * 2)
                }
            }
        })
        .collect();
    let out = s.run_batch(Resolution::R256, jobs);
    assert_eq!(out.len(), 10);
    assert!(out[3].is_err());
    assert_eq!(*out[9].as_ref().unwrap(), 18);
}

#[test]
fn run_batch_never_exceeds_budget() {
    let s = JobScheduler::new(caps(8, 64.0)).unwrap();
    let running = AtomicUsize::new(0);
    let peak = AtomicUsize::new(0);
    let jobs: Vec<_> = (0..12)
        .map(|_| {
            || {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                std::thread::sleep(Duration::from_millis(5));
                running.fetch_sub(1, Ordering::SeqCst);
                Ok(())
            }
        })
        .collect();
    let out = s.run_batch(Resolution::R2048, jobs);
    assert!(out.iter().all(|r| r.is_ok()));
    assert!(peak.load(Ordering::SeqCst) <= 2);
}

#[test]
fn zero_cores_is_rejected() {
    assert!(JobScheduler::new(caps(0, 8.0)).is_err());
}
