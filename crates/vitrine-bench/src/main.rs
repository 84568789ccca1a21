//! vitrine-bench: CLI tool for driving synthetic gallery workloads
//! against the render cache.
//!
//! Simulates a scrolling gallery view frame by frame: each frame
//! paints a window of visible cells through
//! [`RenderCache::request_payload`], pumps completions, and
//! optionally churns the selection or resizes mid-run. Useful for:
//!
//! - Sizing the payload and image caches against a scroll pattern
//! - Measuring how quickly stopgap payloads upgrade to processed ones
//! - Watching eviction and invalidation counters under pressure
//! - Comparing queue depths and the smooth-filter threshold
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin vitrine-bench -- [OPTIONS]
//! ```

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::Parser;
use serde::Serialize;
use vitrine_cache::{
    CacheStats, ItemId, ItemInputs, PayloadSource, RawImage, RenderCache, RenderCacheConfig,
    RgbaImage, TargetSize,
};

/// Synthetic gallery workload driver for the render cache.
///
/// Paints a scrolling window of cells frame by frame and prints cache
/// behavior counters at the end of the run.
#[derive(Parser)]
#[command(name = "vitrine-bench", version)]
struct Cli {
    /// Number of items in the synthetic gallery.
    #[arg(long, default_value_t = 500, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    items: usize,

    /// Number of cells painted per frame.
    #[arg(long, default_value_t = 12, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    visible: usize,

    /// Number of frames to simulate.
    #[arg(long, default_value_t = 200, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    frames: usize,

    /// Items scrolled past per frame.
    #[arg(long, default_value_t = 1)]
    scroll_step: usize,

    /// Move the selection every N frames (0 disables selection churn).
    #[arg(long, default_value_t = 10)]
    select_every: usize,

    /// Resize the view at this frame (cells grow by half).
    #[arg(long)]
    resize_at: Option<usize>,

    /// Every Nth item has no image (0 disables missing items).
    #[arg(long, default_value_t = 0)]
    missing_every: usize,

    /// Cell width in pixels.
    #[arg(long, default_value_t = 300)]
    cell_width: u32,

    /// Cell height in pixels.
    #[arg(long, default_value_t = 400)]
    cell_height: u32,

    /// Synthetic raw image width in pixels.
    #[arg(long, default_value_t = 600)]
    image_width: u32,

    /// Synthetic raw image height in pixels.
    #[arg(long, default_value_t = 800)]
    image_height: u32,

    /// Rendered-payload cache capacity.
    #[arg(long, default_value_t = RenderCacheConfig::DEFAULT_PAYLOAD_CAPACITY)]
    payload_capacity: usize,

    /// Processed-image cache capacity.
    #[arg(long, default_value_t = RenderCacheConfig::DEFAULT_IMAGE_CAPACITY)]
    image_capacity: usize,

    /// Scale job queue depth.
    #[arg(long, default_value_t = RenderCacheConfig::DEFAULT_JOB_QUEUE_DEPTH)]
    job_queue_depth: usize,

    /// Completion queue depth.
    #[arg(long, default_value_t = RenderCacheConfig::DEFAULT_COMPLETION_QUEUE_DEPTH)]
    completion_queue_depth: usize,

    /// Longest target axis above which the smoothing filter is used.
    #[arg(long, default_value_t = RenderCacheConfig::DEFAULT_SMOOTH_THRESHOLD)]
    smooth_threshold: u32,

    /// Wait for all outstanding scale jobs before reporting.
    #[arg(long)]
    settle: bool,

    /// Number of runs for averaging.
    #[arg(long, default_value_t = 1, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    runs: usize,

    /// Output the report as JSON instead of human-readable text.
    #[arg(long)]
    json: bool,

    /// Full cache config as a JSON string.
    ///
    /// When provided, the individual capacity and queue flags are
    /// ignored. The JSON must be a valid `RenderCacheConfig`
    /// serialization.
    #[arg(long)]
    config_json: Option<String>,
}

/// How many payloads each source produced over a run.
#[derive(Debug, Default, Clone, Copy, Serialize)]
struct SourceCounts {
    processed: u64,
    raw: u64,
    loading: u64,
    error: u64,
}

impl SourceCounts {
    fn record(&mut self, source: PayloadSource) {
        match source {
            PayloadSource::Processed => self.processed += 1,
            PayloadSource::Raw => self.raw += 1,
            PayloadSource::Loading => self.loading += 1,
            PayloadSource::Error => self.error += 1,
        }
    }
}

/// One run's results.
#[derive(Debug, Clone, Serialize)]
struct RunReport {
    duration_ms: f64,
    frames: usize,
    paints: u64,
    sources: SourceCounts,
    payload_len: usize,
    image_len: usize,
    inflight_len: usize,
    stats: CacheStats,
}

/// Build a [`RenderCacheConfig`] from CLI arguments.
///
/// If `--config-json` is provided, the JSON is parsed directly and the
/// individual flags are ignored.
fn config_from_cli(cli: &Cli) -> Result<RenderCacheConfig, String> {
    if let Some(ref json) = cli.config_json {
        return serde_json::from_str(json).map_err(|e| format!("Error parsing --config-json: {e}"));
    }

    Ok(RenderCacheConfig {
        payload_capacity: cli.payload_capacity,
        image_capacity: cli.image_capacity,
        job_queue_depth: cli.job_queue_depth,
        completion_queue_depth: cli.completion_queue_depth,
        smooth_threshold: cli.smooth_threshold,
    })
}

/// Deterministic synthetic image for one gallery item.
fn synthetic_image(index: usize, width: u32, height: u32) -> RawImage {
    #[allow(clippy::cast_possible_truncation)]
    let shade = (index * 37 % 256) as u8;
    RawImage::new(RgbaImage::from_pixel(
        width,
        height,
        image::Rgba([shade, shade.wrapping_add(80), shade.wrapping_add(160), 255]),
    ))
}

/// Simulate one scroll session and collect its report.
fn run_workload(cli: &Cli, config: RenderCacheConfig) -> Result<RunReport, String> {
    let mut cache = RenderCache::new(config).map_err(|e| format!("Cache setup failed: {e}"))?;

    // Decode once up front, as a host application would; fingerprints
    // stay stable for the whole run.
    let images: Vec<Option<RawImage>> = (0..cli.items)
        .map(|index| {
            if cli.missing_every > 0 && index % cli.missing_every == 0 {
                None
            } else {
                Some(synthetic_image(index, cli.image_width, cli.image_height))
            }
        })
        .collect();

    let mut cell = TargetSize::new(cli.cell_width, cli.cell_height);
    let mut sources = SourceCounts::default();
    let mut paints: u64 = 0;
    let max_offset = cli.items.saturating_sub(cli.visible);

    let start = Instant::now();
    for frame in 0..cli.frames {
        if cli.resize_at == Some(frame) {
            cell = TargetSize::new(cell.width + cell.width / 2, cell.height + cell.height / 2);
            cache.notify_resized(cell);
        }

        let offset = if max_offset == 0 {
            0
        } else {
            frame * cli.scroll_step % (max_offset + 1)
        };
        let selected_item = if cli.select_every > 0 {
            Some(frame / cli.select_every % cli.items)
        } else {
            None
        };

        for index in offset..(offset + cli.visible).min(cli.items) {
            let inputs = ItemInputs {
                item: ItemId::new(format!("item-{index}")),
                image: images[index].clone(),
                label: format!("Item {index}"),
                kind: "synthetic".to_owned(),
                target: cell,
                selected: selected_item == Some(index),
            };
            let payload = cache.request_payload(&inputs);
            sources.record(payload.source);
            paints += 1;
        }

        cache.pump();
    }

    if cli.settle {
        let deadline = Instant::now() + Duration::from_secs(30);
        while cache.inflight_len() > 0 {
            cache.pump();
            if Instant::now() >= deadline {
                return Err("worker did not drain within 30s".to_owned());
            }
            std::thread::sleep(Duration::from_millis(1));
        }
    }
    let duration = start.elapsed();

    Ok(RunReport {
        duration_ms: duration.as_secs_f64() * 1000.0,
        frames: cli.frames,
        paints,
        sources,
        payload_len: cache.payload_len(),
        image_len: cache.image_len(),
        inflight_len: cache.inflight_len(),
        stats: cache.stats(),
    })
}

fn print_report(report: &RunReport) {
    println!("Workload");
    println!("{}", "=".repeat(60));
    println!("Frames:              {}", report.frames);
    println!("Paints:              {}", report.paints);
    println!("Duration:            {:.3}ms", report.duration_ms);
    println!();
    println!("Payload sources");
    println!("{}", "-".repeat(40));
    println!("  processed:         {}", report.sources.processed);
    println!("  raw (stopgap):     {}", report.sources.raw);
    println!("  loading:           {}", report.sources.loading);
    println!("  error:             {}", report.sources.error);
    println!();
    let stats = &report.stats;
    println!("Cache behavior");
    println!("{}", "-".repeat(40));
    println!(
        "  payload hits/misses: {}/{} ({:.1}% hit rate)",
        stats.payload_hits,
        stats.payload_misses,
        stats.payload_hit_rate() * 100.0,
    );
    println!("  image hits:          {}", stats.image_hits);
    println!(
        "  jobs dispatched:     {} ({} abandoned)",
        stats.jobs_dispatched, stats.jobs_abandoned,
    );
    println!(
        "  completions:         {} applied, {} discarded",
        stats.completions_applied, stats.completions_discarded,
    );
    println!(
        "  evictions:           {} payloads, {} images",
        stats.payload_evictions, stats.image_evictions,
    );
    println!("  invalidated:         {}", stats.payloads_invalidated);
    println!("  flushes:             {}", stats.flushes);
    println!();
    println!(
        "Resident: {} payloads, {} images, {} in flight",
        report.payload_len, report.image_len, report.inflight_len,
    );
}

/// Print aggregated statistics across multiple runs.
#[allow(clippy::cast_precision_loss)]
fn print_multi_run_summary(reports: &[RunReport]) {
    debug_assert!(!reports.is_empty(), "no reports to summarize");

    println!();
    println!("Summary ({} runs)\n{}", reports.len(), "=".repeat(60));

    let durations: Vec<f64> = reports.iter().map(|r| r.duration_ms).collect();
    let min = durations.iter().copied().reduce(f64::min).unwrap_or(0.0);
    let max = durations.iter().copied().reduce(f64::max).unwrap_or(0.0);
    let mean = durations.iter().sum::<f64>() / durations.len() as f64;
    println!("Duration: min={min:.3}ms  mean={mean:.3}ms  max={max:.3}ms");

    let mean_hit_rate = reports
        .iter()
        .map(|r| r.stats.payload_hit_rate())
        .sum::<f64>()
        / reports.len() as f64;
    println!("Payload hit rate: mean={:.1}%", mean_hit_rate * 100.0);
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match config_from_cli(&cli) {
        Ok(c) => c,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    eprintln!(
        "Gallery: {} items, {} visible, {} frames",
        cli.items, cli.visible, cli.frames,
    );
    eprintln!("Config: {config:#?}");
    eprintln!("Runs: {}", cli.runs);
    eprintln!();

    let mut reports = Vec::with_capacity(cli.runs);

    for run in 0..cli.runs {
        if cli.runs > 1 {
            eprintln!("--- Run {}/{} ---", run + 1, cli.runs);
        }

        match run_workload(&cli, config.clone()) {
            Ok(report) => {
                if cli.json {
                    match serde_json::to_string_pretty(&report) {
                        Ok(json) => println!("{json}"),
                        Err(e) => {
                            eprintln!("Error serializing report: {e}");
                            return ExitCode::FAILURE;
                        }
                    }
                } else {
                    print_report(&report);
                }
                reports.push(report);
            }
            Err(msg) => {
                eprintln!("{msg}");
                return ExitCode::FAILURE;
            }
        }

        if cli.runs > 1 {
            eprintln!();
        }
    }

    if cli.runs > 1 {
        print_multi_run_summary(&reports);
    }

    ExitCode::SUCCESS
}
