//! Record a process's window until interrupted.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use pidrec_capture_engine::EncoderSession;
use pidrec_common::config::EncoderDefaults;
use pidrec_platform_core::{CaptureSource, ContentFilter, ResolveOptions, SourceResolver, WindowInfo};
use pidrec_platform_linux::X11SourceResolver;

pub struct RecordArgs {
    pub pid: u32,
    pub output: PathBuf,
    pub fps: u32,
    pub queue_depth: u32,
    pub window_only: bool,
    pub duration: Option<Duration>,
}

pub async fn run(args: RecordArgs, encoder: &EncoderDefaults) -> anyhow::Result<()> {
    let options = ResolveOptions {
        fps: args.fps,
        queue_depth: args.queue_depth,
        window_only: args.window_only,
    };
    let source = X11SourceResolver::new()
        .resolve(args.pid, &options)
        .with_context(|| format!("Could not find something to record for PID {}", args.pid))?;

    println!("Recording PID {}", args.pid);
    let display = &source.display;
    println!(
        "  Display: {} {}x{}+{}+{}",
        display.name, display.width, display.height, display.x, display.y
    );
    if let Some(window) = target_window(&source, args.pid) {
        println!("  Window:  {:#x} \"{}\"", window.id, window.title);
    }
    println!("  Size:    {}x{} @ {} fps", source.width, source.height, source.fps());
    println!("  Output:  {}", args.output.display());

    let mut session = EncoderSession::create(source, &args.output, encoder)
        .with_context(|| format!("Could not open {} for writing", args.output.display()))?;
    session.start()?;

    match args.duration {
        Some(limit) => println!("Recording for {:.1}s (Ctrl+C to stop early)...", limit.as_secs_f64()),
        None => println!("Press Ctrl+C to stop recording..."),
    }
    wait_for_stop(args.duration).await?;

    println!();
    let report = tokio::task::spawn_blocking(move || session.stop()).await??;
    for line in report.summary_lines() {
        println!("{line}");
    }

    Ok(())
}

/// Resolve once Ctrl+C arrives or the optional duration elapses.
async fn wait_for_stop(duration: Option<Duration>) -> anyhow::Result<()> {
    match duration {
        Some(limit) => tokio::select! {
            res = tokio::signal::ctrl_c() => res?,
            _ = tokio::time::sleep(limit) => {
                tracing::info!(?limit, "Recording duration reached");
            }
        },
        None => tokio::signal::ctrl_c().await?,
    }
    Ok(())
}

/// The window the recording was bound to.
fn target_window(source: &CaptureSource, pid: u32) -> Option<&WindowInfo> {
    match &source.filter {
        ContentFilter::SingleWindow { window } => Some(window),
        ContentFilter::DisplayIncludingWindows { windows, .. } => windows
            .iter()
            .find(|w| w.pid == pid && !w.title.trim().is_empty()),
    }
}

/// Parse `--duration` as positive seconds.
pub fn parse_duration_secs(value: &str) -> Result<Duration, String> {
    let secs: f64 = value
        .parse()
        .map_err(|_| format!("'{value}' is not a number of seconds"))?;
    if !secs.is_finite() || secs <= 0.0 {
        return Err("duration must be a positive number of seconds".to_string());
    }
    Duration::try_from_secs_f64(secs).map_err(|e| e.to_string())
}
