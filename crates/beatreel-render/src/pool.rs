//! Bounded pool of reusable rendering surfaces.
//!
//! Surfaces are bucketed by pixel size. A semaphore caps how many are checked
//! out at once; the [`PooledSurface`] guard returns its surface on drop, so a
//! failed render still gives it back.

use std::collections::HashMap;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::error::{RenderError, RenderResult};
use crate::surface::{RasterSurface, RenderSurface};
use crate::text::LabelFont;

/// Creates surfaces of a given size.
pub trait SurfaceFactory: Send + Sync {
    fn create(&self, width: u32, height: u32) -> RenderResult<Box<dyn RenderSurface>>;
}

/// Factory for [`RasterSurface`], sharing one label font across surfaces.
#[derive(Debug, Clone, Default)]
pub struct RasterSurfaceFactory {
    font: Option<LabelFont>,
}

impl RasterSurfaceFactory {
    pub fn with_font(font: Option<LabelFont>) -> Self {
        Self { font }
    }
}

impl SurfaceFactory for RasterSurfaceFactory {
    fn create(&self, width: u32, height: u32) -> RenderResult<Box<dyn RenderSurface>> {
        Ok(Box::new(
            RasterSurface::new(width, height)?.with_font(self.font.clone()),
        ))
    }
}

/// Pool limits.
#[derive(Debug, Clone, Copy)]
pub struct SurfacePoolOpts {
    /// Surfaces checked out at the same time
    pub max_active: usize,
    /// Idle surfaces retained per size bucket
    pub max_idle_per_size: usize,
}

impl Default for SurfacePoolOpts {
    fn default() -> Self {
        Self {
            max_active: 2,
            max_idle_per_size: 2,
        }
    }
}

/// Pool counters for monitoring.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SurfacePoolStats {
    pub created: u64,
    pub reused: u64,
    pub released: u64,
    pub discarded: u64,
    pub idle: usize,
}

type SizeKey = (u32, u32);

struct PoolState {
    idle: HashMap<SizeKey, Vec<Box<dyn RenderSurface>>>,
    stats: SurfacePoolStats,
}

pub struct SurfacePool {
    factory: Arc<dyn SurfaceFactory>,
    opts: SurfacePoolOpts,
    semaphore: Arc<Semaphore>,
    state: Mutex<PoolState>,
}

impl SurfacePool {
    pub fn new(factory: Arc<dyn SurfaceFactory>, opts: SurfacePoolOpts) -> Arc<Self> {
        Arc::new(Self {
            factory,
            semaphore: Arc::new(Semaphore::new(opts.max_active.max(1))),
            opts,
            state: Mutex::new(PoolState {
                idle: HashMap::new(),
                stats: SurfacePoolStats::default(),
            }),
        })
    }

    /// Pool of raster surfaces without label text.
    pub fn raster(opts: SurfacePoolOpts) -> Arc<Self> {
        Self::new(Arc::new(RasterSurfaceFactory::default()), opts)
    }

    /// Pool of raster surfaces drawing labels with `font`.
    pub fn raster_with_font(opts: SurfacePoolOpts, font: Option<LabelFont>) -> Arc<Self> {
        Self::new(Arc::new(RasterSurfaceFactory::with_font(font)), opts)
    }

    fn lock(&self) -> MutexGuard<'_, PoolState> {
        // A panic while holding the lock leaves only counters and idle surfaces behind
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Check out a `width`x`height` surface, waiting for a free slot.
    pub async fn acquire(
        self: &Arc<Self>,
        width: u32,
        height: u32,
        cancel: &CancellationToken,
    ) -> RenderResult<PooledSurface> {
        let permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(RenderError::Cancelled),
            permit = self.semaphore.clone().acquire_owned() => {
                permit.map_err(|_| RenderError::PoolClosed)?
            }
        };

        let key = (width, height);
        let reused = {
            let mut state = self.lock();
            let surface = state.idle.get_mut(&key).and_then(Vec::pop);
            if surface.is_some() {
                state.stats.reused += 1;
            }
            surface
        };

        let surface = match reused {
            Some(surface) => {
                trace!(width, height, "Reusing pooled surface");
                surface
            }
            None => {
                let surface = self.factory.create(width, height)?;
                self.lock().stats.created += 1;
                debug!(width, height, "Created render surface");
                surface
            }
        };

        Ok(PooledSurface {
            surface: Some(surface),
            key,
            pool: Arc::clone(self),
            _permit: permit,
        })
    }

    fn release(&self, key: SizeKey, mut surface: Box<dyn RenderSurface>) {
        surface.reset();
        let mut state = self.lock();
        state.stats.released += 1;
        let bucket = state.idle.entry(key).or_default();
        if bucket.len() < self.opts.max_idle_per_size {
            bucket.push(surface);
        } else {
            state.stats.discarded += 1;
        }
    }

    /// Drop every idle surface.
    pub fn clear(&self) {
        self.lock().idle.clear();
    }

    pub fn stats(&self) -> SurfacePoolStats {
        let state = self.lock();
        SurfacePoolStats {
            idle: state.idle.values().map(Vec::len).sum(),
            ..state.stats
        }
    }

    /// Slots currently free for checkout.
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }
}

/// A checked-out surface; returned to the pool when dropped.
pub struct PooledSurface {
    surface: Option<Box<dyn RenderSurface>>,
    key: SizeKey,
    pool: Arc<SurfacePool>,
    _permit: OwnedSemaphorePermit,
}

impl Deref for PooledSurface {
    type Target = dyn RenderSurface;

    fn deref(&self) -> &Self::Target {
        // Only `Drop` takes the surface out
        match &self.surface {
            Some(surface) => surface.as_ref(),
            None => unreachable!("pooled surface used after release"),
        }
    }
}

impl DerefMut for PooledSurface {
    fn deref_mut(&mut self) -> &mut Self::Target {
        match &mut self.surface {
            Some(surface) => surface.as_mut(),
            None => unreachable!("pooled surface used after release"),
        }
    }
}

impl Drop for PooledSurface {
    fn drop(&mut self) {
        if let Some(surface) = self.surface.take() {
            self.pool.release(self.key, surface);
        }
    }
}
