//! Transform worker: serialized off-thread image scaling.
//!
//! One `std::thread` executes scale jobs strictly one at a time, which
//! bounds peak CPU and memory use during bulk scroll. Jobs arrive on a
//! bounded channel; completed `(CacheKey, ProcessedImage)` pairs return
//! on a second bounded channel that the consumer drains with
//! `try_recv` on its own schedule.
//!
//! Channel discipline: the consumer side never blocks. Dispatch uses
//! `try_send` — a full job queue abandons the dispatch (the next paint
//! retries) — while the worker's completion send may block the worker
//! when the consumer falls behind, never the other way around.
//!
//! A scale job never fails silently: degenerate inputs complete with
//! the original unscaled image, so the in-flight tracker entry is
//! always cleared and no caller waits forever.

use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use image::RgbaImage;
use image::imageops::FilterType;

use crate::key::CacheKey;
use crate::types::{CacheError, ProcessedImage, RenderCacheConfig, TargetSize};

/// One scale request handed to the worker.
pub struct ScaleJob {
    /// Cache key the result will be stored under.
    pub key: CacheKey,
    /// Immutable handle to the raw pixel data. The worker never
    /// mutates the source image.
    pub image: Arc<RgbaImage>,
    /// Exact output size, precomputed cover-style by
    /// [`scale_target`].
    pub target: TargetSize,
}

/// One completed scale job.
pub struct Completion {
    /// Cache key the job was dispatched for.
    pub key: CacheKey,
    /// The scaled image (or the original, on failure).
    pub processed: ProcessedImage,
}

/// Outcome of a non-blocking dispatch attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The job was queued for the worker.
    Queued,
    /// The job queue is full; nothing was dispatched.
    Full,
    /// The worker thread is gone; nothing was dispatched.
    Disconnected,
}

/// Handle to the background scale worker.
///
/// Dropping the handle closes the job channel and joins the thread.
pub struct TransformWorker {
    jobs: Option<Sender<ScaleJob>>,
    completions: Option<Receiver<Completion>>,
    handle: Option<JoinHandle<()>>,
}

impl TransformWorker {
    /// Spawn the worker thread with the queue depths and filter
    /// threshold from `config`.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::WorkerSpawn`] if the thread cannot be
    /// created.
    pub fn spawn(config: &RenderCacheConfig) -> Result<Self, CacheError> {
        let (job_tx, job_rx) = bounded::<ScaleJob>(config.job_queue_depth);
        let (completion_tx, completion_rx) = bounded::<Completion>(config.completion_queue_depth);
        let smooth_threshold = config.smooth_threshold;

        let handle = std::thread::Builder::new()
            .name("vitrine-scale".to_owned())
            .spawn(move || worker_loop(&job_rx, &completion_tx, smooth_threshold))?;

        Ok(Self {
            jobs: Some(job_tx),
            completions: Some(completion_rx),
            handle: Some(handle),
        })
    }

    /// Hand a job to the worker without blocking.
    pub fn dispatch(&self, job: ScaleJob) -> DispatchOutcome {
        let Some(jobs) = self.jobs.as_ref() else {
            return DispatchOutcome::Disconnected;
        };
        match jobs.try_send(job) {
            Ok(()) => DispatchOutcome::Queued,
            Err(TrySendError::Full(_)) => DispatchOutcome::Full,
            Err(TrySendError::Disconnected(_)) => DispatchOutcome::Disconnected,
        }
    }

    /// Take one completed job off the channel, if any is ready.
    /// Never blocks.
    pub fn try_complete(&self) -> Option<Completion> {
        self.completions
            .as_ref()
            .and_then(|completions| completions.try_recv().ok())
    }
}

impl Drop for TransformWorker {
    fn drop(&mut self) {
        // Closing both channels lets the worker exit whether it is
        // waiting for a job or blocked sending a completion.
        self.jobs.take();
        self.completions.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// Worker thread body: process jobs to completion, one at a time.
fn worker_loop(
    jobs: &Receiver<ScaleJob>,
    completions: &Sender<Completion>,
    smooth_threshold: u32,
) {
    for job in jobs.iter() {
        let processed = run_job(&job, smooth_threshold);
        let done = Completion {
            key: job.key,
            processed,
        };
        // Consumer dropped its receiver: nothing left to report to.
        if completions.send(done).is_err() {
            break;
        }
    }
}

/// Scale the job's image, falling back to the original on degenerate
/// input. Completion is unconditional by construction.
fn run_job(job: &ScaleJob, smooth_threshold: u32) -> ProcessedImage {
    if job.target.is_empty() || job.image.width() == 0 || job.image.height() == 0 {
        return ProcessedImage {
            image: Arc::clone(&job.image),
            target: job.target,
        };
    }

    let filter = filter_for(job.target, smooth_threshold);
    let scaled = image::imageops::resize(
        job.image.as_ref(),
        job.target.width,
        job.target.height,
        filter,
    );
    ProcessedImage {
        image: Arc::new(scaled),
        target: job.target,
    }
}

/// Pick the interpolation filter for a scale target.
///
/// Large targets get bilinear smoothing, small targets the fastest
/// transform — a latency/quality tradeoff, not a correctness
/// requirement.
#[must_use]
pub const fn filter_for(target: TargetSize, smooth_threshold: u32) -> FilterType {
    if target.width > smooth_threshold || target.height > smooth_threshold {
        FilterType::Triangle
    } else {
        FilterType::Nearest
    }
}

/// Compute the cover-style scale target for an image inside a gallery
/// cell: scale to the cell height, then widen so the image is at least
/// as wide as the cell.
///
/// Degenerate inputs (zero-sized image or cell) return the cell size
/// unchanged.
#[must_use]
pub fn scale_target(image_width: u32, image_height: u32, cell: TargetSize) -> TargetSize {
    if image_width == 0 || image_height == 0 || cell.is_empty() {
        return cell;
    }

    let aspect = f64::from(image_width) / f64::from(image_height);
    let mut height = f64::from(cell.height);
    let mut width = height * aspect;
    if width < f64::from(cell.width) {
        width = f64::from(cell.width);
        height = width / aspect;
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    TargetSize::new(width.round() as u32, height.round() as u32)
}
