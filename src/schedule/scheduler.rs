use rayon::prelude::*;

use crate::foundation::core::{Resolution, SafeZone};
use crate::foundation::error::{HyperError, HyperResult};

/// Memory hint used when the host does not expose one.
pub const DEFAULT_MEMORY_GB: f64 = 4.0;

/// Host resources the concurrency budget is derived from.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SystemCapabilities {
    pub cores: usize,
    pub memory_gb: f64,
}

/// Optional values replacing the probed ones.
#[derive(Clone, Copy, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CapabilityOverrides {
    pub cores: Option<usize>,
    pub memory_gb: Option<f64>,
}

impl SystemCapabilities {
    /// Probe the host: logical cores and total memory from `/proc/meminfo`.
    pub fn detect() -> Self {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        let memory_gb = read_meminfo_gb().unwrap_or(DEFAULT_MEMORY_GB);
        Self { cores, memory_gb }
    }

    pub fn with_overrides(mut self, o: CapabilityOverrides) -> Self {
        if let Some(c) = o.cores {
            self.cores = c;
        }
        if let Some(m) = o.memory_gb {
            self.memory_gb = m;
        }
        self
    }

    /// `max(1, min(cores, floor(memory_gb / 2)))`.
    pub fn max_concurrent_jobs(&self) -> usize {
        let by_memory = if self.memory_gb.is_finite() && self.memory_gb > 0.0 {
            (self.memory_gb / 2.0).floor() as usize
        } else {
            0
        };
        self.cores.min(by_memory).max(1)
    }
}

fn read_meminfo_gb() -> Option<f64> {
    let text = std::fs::read_to_string("/proc/meminfo").ok()?;
    parse_meminfo_gb(&text)
}

fn parse_meminfo_gb(text: &str) -> Option<f64> {
    let line = text.lines().find(|l| l.starts_with("MemTotal:"))?;
    let kb: f64 = line
        .trim_start_matches("MemTotal:")
        .split_whitespace()
        .next()?
        .parse()
        .ok()?;
    Some(kb / (1024.0 * 1024.0))
}

/// Concurrency controller: a worker pool sized to the host budget.
pub struct JobScheduler {
    caps: SystemCapabilities,
    pool: rayon::ThreadPool,
}

impl std::fmt::Debug for JobScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobScheduler")
            .field("caps", &self.caps)
            .field("workers", &self.pool.current_num_threads())
            .finish()
    }
}

impl JobScheduler {
    pub fn new(caps: SystemCapabilities) -> HyperResult<Self> {
        if caps.cores == 0 {
            return Err(HyperError::validation("capabilities 'cores' must be >= 1"));
        }
        let pool = build_thread_pool(caps.max_concurrent_jobs())?;
        tracing::debug!(
            cores = caps.cores,
            memory_gb = caps.memory_gb,
            workers = pool.current_num_threads(),
            "job scheduler ready"
        );
        Ok(Self { caps, pool })
    }

    pub fn capabilities(&self) -> SystemCapabilities {
        self.caps
    }

    pub fn max_concurrent_jobs(&self) -> usize {
        self.caps.max_concurrent_jobs()
    }

    /// Advisory concurrency for jobs at `resolution`; logs the tier warning when memory is short.
    pub fn budget_for(&self, resolution: Resolution) -> usize {
        let zone = resolution.safe_zone();
        if self.caps.memory_gb * 1024.0 < f64::from(zone.min_memory_mb) {
            tracing::warn!(
                resolution = resolution.px(),
                memory_gb = self.caps.memory_gb,
                min_memory_mb = zone.min_memory_mb,
                warning = zone.warning.unwrap_or("host memory below recommended minimum"),
                "resolution exceeds memory safe zone"
            );
        }
        self.max_concurrent_jobs().min(zone.max_concurrent).max(1)
    }

    /// Safe-zone table, smallest tier first.
    pub fn safe_zones(&self) -> Vec<SafeZone> {
        Resolution::ALL.iter().map(|r| r.safe_zone()).collect()
    }

    /// Run `jobs` on the worker pool, at most `budget_for(resolution)` at a time.
    ///
    /// Results come back in submission order.
    pub fn run_batch<T, F>(&self, resolution: Resolution, jobs: Vec<F>) -> Vec<HyperResult<T>>
    where
        T: Send,
        F: FnOnce() -> HyperResult<T> + Send,
    {
        let width = self.budget_for(resolution);
        let mut out = Vec::with_capacity(jobs.len());
        let mut jobs = jobs.into_iter().peekable();
        while jobs.peek().is_some() {
            let wave: Vec<F> = jobs.by_ref().take(width).collect();
            let done: Vec<HyperResult<T>> =
                self.pool.install(|| wave.into_par_iter().map(|job| job()).collect());
            out.extend(done);
        }
        out
    }
}

fn build_thread_pool(threads: usize) -> HyperResult<rayon::ThreadPool> {
    if threads == 0 {
        return Err(HyperError::validation("scheduler worker count must be >= 1"));
    }
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(|i| format!("hyperres-job-{i}"))
        .build()
        .map_err(|e| HyperError::external(format!("failed to build rayon thread pool: {e}")))
}

#[cfg(test)]
#[path = "../../tests/unit/schedule/scheduler.rs"]
mod tests;
