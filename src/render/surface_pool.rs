use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use image::RgbaImage;

use crate::foundation::error::{HyperError, HyperResult};

/// Pool configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SurfacePoolOpts {
    /// Number of surfaces allocated up front. Never grows.
    pub capacity: usize,
}

impl Default for SurfacePoolOpts {
    fn default() -> Self {
        Self { capacity: 10 }
    }
}

/// Bounded retry for [`SurfacePool::acquire_with_retry`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AcquirePolicy {
    /// Attempts after the first one.
    pub retries: u32,
    /// Sleep before the first retry; doubles on each following retry.
    pub backoff_ms: u64,
}

impl Default for AcquirePolicy {
    fn default() -> Self {
        Self {
            retries: 3,
            backoff_ms: 2,
        }
    }
}

/// A reusable drawable raster owned by a [`SurfacePool`].
#[derive(Debug)]
pub struct Surface {
    id: usize,
    pixels: RgbaImage,
}

impl Surface {
    fn new(id: usize) -> Self {
        Self {
            id,
            pixels: RgbaImage::new(0, 0),
        }
    }

    /// Slot index inside the owning pool.
    pub fn id(&self) -> usize {
        self.id
    }

    /// Size the buffer to `width × height` and clear it to transparent black.
    ///
    /// The allocation is kept when the dimensions already match.
    pub fn prepare(&mut self, width: u32, height: u32) -> &mut RgbaImage {
        if self.pixels.dimensions() == (width, height) {
            self.pixels.fill(0);
        } else {
            self.pixels = RgbaImage::new(width, height);
        }
        &mut self.pixels
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    pub fn pixels_mut(&mut self) -> &mut RgbaImage {
        &mut self.pixels
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct SurfacePoolStats {
    pub capacity: usize,
    pub in_use: usize,
    /// Successful acquisitions over the pool lifetime.
    pub acquired: u64,
    /// Acquire calls that found the pool empty.
    pub exhausted: u64,
}

struct PoolState {
    free: Vec<Surface>,
    stats: SurfacePoolStats,
}

struct PoolInner {
    pool_id: u64,
    state: Mutex<PoolState>,
}

impl PoolInner {
    fn lock(&self) -> MutexGuard<'_, PoolState> {
        // A panic while holding the lock cannot leave the free list half-updated.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn give_back(&self, surface: Surface) {
        let mut st = self.lock();
        st.stats.in_use = st.stats.in_use.saturating_sub(1);
        st.free.push(surface);
    }
}

static NEXT_POOL_ID: AtomicU64 = AtomicU64::new(1);

/// Fixed-capacity set of reusable surfaces handed out as exclusive leases.
///
/// Acquire never blocks: an empty pool yields `None`. Cloning the pool shares the same surfaces.
#[derive(Clone)]
pub struct SurfacePool {
    inner: Arc<PoolInner>,
}

impl std::fmt::Debug for SurfacePool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SurfacePool")
            .field("pool_id", &self.inner.pool_id)
            .field("stats", &self.stats())
            .finish()
    }
}

impl SurfacePool {
    pub fn new(opts: SurfacePoolOpts) -> HyperResult<Self> {
        if opts.capacity == 0 {
            return Err(HyperError::validation("surface pool capacity must be >= 1"));
        }
        // Popped from the back, so reverse to hand out slot 0 first.
        let free = (0..opts.capacity).rev().map(Surface::new).collect();
        Ok(Self {
            inner: Arc::new(PoolInner {
                pool_id: NEXT_POOL_ID.fetch_add(1, Ordering::Relaxed),
                state: Mutex::new(PoolState {
                    free,
                    stats: SurfacePoolStats {
                        capacity: opts.capacity,
                        ..SurfacePoolStats::default()
                    },
                }),
            }),
        })
    }

    pub fn capacity(&self) -> usize {
        self.inner.lock().stats.capacity
    }

    /// Surfaces currently free.
    pub fn available(&self) -> usize {
        self.inner.lock().free.len()
    }

    pub fn stats(&self) -> SurfacePoolStats {
        self.inner.lock().stats
    }

    /// Take a free surface, or `None` when every surface is leased.
    pub fn acquire(&self) -> Option<SurfaceLease> {
        let mut st = self.inner.lock();
        match st.free.pop() {
            Some(surface) => {
                st.stats.in_use += 1;
                st.stats.acquired += 1;
                Some(SurfaceLease {
                    surface: Some(surface),
                    pool: Arc::clone(&self.inner),
                })
            }
            None => {
                st.stats.exhausted += 1;
                tracing::debug!(
                    pool = self.inner.pool_id,
                    capacity = st.stats.capacity,
                    "surface pool exhausted"
                );
                None
            }
        }
    }

    /// [`acquire`](Self::acquire) with bounded exponential backoff.
    pub fn acquire_with_retry(&self, policy: AcquirePolicy) -> HyperResult<SurfaceLease> {
        let mut delay = Duration::from_millis(policy.backoff_ms);
        for attempt in 0..=policy.retries {
            if let Some(lease) = self.acquire() {
                return Ok(lease);
            }
            if attempt < policy.retries {
                std::thread::sleep(delay);
                delay = delay.saturating_mul(2);
            }
        }
        Err(HyperError::exhausted(format!(
            "no free surface after {} attempts (capacity {})",
            policy.retries + 1,
            self.capacity()
        )))
    }

    /// Return a lease early.
    ///
    /// Returns `false` and leaves this pool untouched when the lease belongs to another pool; the
    /// lease then goes back to its own pool as it drops.
    pub fn release(&self, lease: SurfaceLease) -> bool {
        let ours = Arc::ptr_eq(&self.inner, &lease.pool);
        drop(lease);
        ours
    }
}

/// Exclusive access to one pooled [`Surface`]. Dropping the lease frees the surface.
pub struct SurfaceLease {
    surface: Option<Surface>,
    pool: Arc<PoolInner>,
}

impl std::fmt::Debug for SurfaceLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SurfaceLease")
            .field("pool_id", &self.pool.pool_id)
            .field("surface", &self.surface.as_ref().map(Surface::id))
            .finish()
    }
}

impl Deref for SurfaceLease {
    type Target = Surface;

    fn deref(&self) -> &Surface {
        // Only `Drop` takes the surface out.
        self.surface.as_ref().unwrap_or_else(|| unreachable!())
    }
}

impl DerefMut for SurfaceLease {
    fn deref_mut(&mut self) -> &mut Surface {
        self.surface.as_mut().unwrap_or_else(|| unreachable!())
    }
}

impl Drop for SurfaceLease {
    fn drop(&mut self) {
        if let Some(surface) = self.surface.take() {
            self.pool.give_back(surface);
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/surface_pool.rs"]
mod tests;
