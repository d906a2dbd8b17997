// In src/main.rs

//! Main entry point for the `painter` command-line tool.
//!
//! Scripts given on the command line are parsed in full and applied through
//! the loop's synchronous path, one file after another. With `--interactive`,
//! stdin is then read line by line and each valid command is posted to the
//! loop's queue.

use painter::config::CONFIG;
use painter::lang::Parser as ScriptParser;
use painter::painter::{FrameRecorder, HeadlessScreen, Loop};

use anyhow::Context;
use clap::Parser;
use log::{info, warn};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(author, version, about = "Apply drawing scripts to a headless 400x400 canvas")]
struct Cli {
    /// Script files, applied in order.
    scripts: Vec<PathBuf>,
    /// After the scripts, read commands from stdin and queue them.
    #[arg(long, short = 'i')]
    interactive: bool,
    /// Write every published frame as a PNG into this directory.
    #[arg(long, short = 'o')]
    out: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Default filter comes from the config if RUST_LOG is not set.
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(CONFIG.logging.default_filter.as_str()),
    )
    .format_timestamp_micros()
    .init();

    info!("Starting painter...");

    let screen = HeadlessScreen::new(CONFIG.appearance.clone());
    let recorder = Arc::new(match &cli.out {
        Some(dir) => FrameRecorder::with_export(dir, &CONFIG.output.frame_prefix)?,
        None => FrameRecorder::new(),
    });

    let event_loop = Loop::new(recorder.clone());
    event_loop
        .start(&screen)
        .context("Failed to start render loop")?;

    let parser = ScriptParser::new();
    for path in &cli.scripts {
        let file =
            File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
        let ops = parser
            .parse(BufReader::new(file))
            .with_context(|| format!("Failed to parse {}", path.display()))?;

        info!("Applying {} operations from {}", ops.len(), path.display());
        for op in ops {
            event_loop.post_direct(op)?;
        }
    }

    if cli.interactive {
        info!("Reading commands from stdin...");
        let stdin = std::io::stdin();
        for (index, line) in stdin.lock().lines().enumerate() {
            let line = line.context("Failed to read stdin")?;
            match parser.parse_line(&line) {
                Ok(op) => event_loop.post(op)?,
                Err(e) => warn!("stdin line {}: {}", index + 1, e),
            }
        }
    }

    event_loop
        .request_stop_and_wait()
        .context("Failed to stop render loop")?;
    recorder.finish();

    match recorder.last_frame() {
        Some(frame) => info!(
            "Last frame: {:?} with {} figures",
            frame.scene.background,
            frame.scene.figures.len()
        ),
        None => info!("No frames were published"),
    }
    info!(
        "painter exited after {} published frames.",
        event_loop.frames_published()
    );
    Ok(())
}
