use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use color_eyre::eyre::{ensure, WrapErr};
use color_eyre::Result;
use core_table::{
    load_animation_config, load_animation_config_from_env, AnimationConfigMetadata,
    ReplayReport, ReplayTarget, TablePipeline,
};
use serde::Serialize;
use serde_json::Value as JsonValue;
use table_schema::{PropertyPath, RecordedSession};
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about = "Replay recorded table sessions and inspect rendered state", long_about = None)]
struct Cli {
    /// Recorded session: a JSON document or one wire message per line
    /// (`.ndjson` / `.jsonl`).
    #[arg(long)]
    session: PathBuf,

    /// Animation config file. Defaults to ANIMATION_CONFIG_PATH, then the
    /// builtin config.
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the rendered tree (or one path) at the replay target.
    Render {
        #[command(flatten)]
        target: TargetArgs,
        /// Only print the value at this path.
        #[arg(long)]
        path: Option<String>,
        /// Also print pipeline counters.
        #[arg(long)]
        metrics: bool,
    },
    /// Print one path's rendered value across a time range.
    Timeline {
        #[arg(long)]
        path: String,
        #[arg(long, default_value_t = 0.0)]
        from: f64,
        #[arg(long)]
        to: f64,
        #[arg(long, default_value_t = 100.0)]
        step: f64,
    },
    /// Dump the animation queue at the replay target.
    Records {
        #[command(flatten)]
        target: TargetArgs,
    },
}

#[derive(Args, Debug)]
struct TargetArgs {
    /// Stop after the entry with this sequence number.
    #[arg(long, conflicts_with = "time")]
    seq: Option<u64>,
    /// Stop at this logical time (milliseconds).
    #[arg(long)]
    time: Option<f64>,
}

impl TargetArgs {
    fn target(&self) -> ReplayTarget {
        match (self.seq, self.time) {
            (Some(seq), _) => ReplayTarget::Sequence(seq),
            (None, Some(time)) => ReplayTarget::Time(time),
            (None, None) => ReplayTarget::End,
        }
    }
}

#[derive(Serialize)]
struct RenderOutput<'a> {
    config_source: &'a str,
    report: &'a ReplayReport,
    state: JsonValue,
    #[serde(skip_serializing_if = "Option::is_none")]
    metrics: Option<&'a core_table::PipelineMetrics>,
}

const MAX_TIMELINE_POINTS: usize = 100_000;

#[derive(Serialize)]
struct TimelinePoint {
    time: f64,
    value: JsonValue,
}

fn main() -> Result<()> {
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let session = RecordedSession::from_file(&cli.session)
        .wrap_err_with(|| format!("failed to load session {}", cli.session.display()))?;
    info!(entries = session.len(), "session.loaded");

    let (config, metadata) = match cli.config.clone() {
        Some(path) => load_animation_config(Some(path)),
        None => load_animation_config_from_env(),
    };
    let source = config_source(&metadata);
    info!(source = %source, "animation_config.selected");
    let mut pipeline = TablePipeline::new(config);

    match cli.command {
        Command::Render {
            target,
            path,
            metrics,
        } => {
            let report = pipeline.replay(&session, target.target());
            let state = match path {
                Some(path) => rendered_json(&pipeline, Some(&PropertyPath::parse(&path))),
                None => rendered_json(&pipeline, None),
            };
            let output = RenderOutput {
                config_source: &source,
                report: &report,
                state,
                metrics: metrics.then(|| pipeline.metrics()),
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        Command::Timeline {
            path,
            from,
            to,
            step,
        } => {
            let path = PropertyPath::parse(&path);
            let mut points = Vec::new();
            for time in timeline_times(from, to, step)? {
                pipeline.replay(&session, ReplayTarget::Time(time));
                points.push(TimelinePoint {
                    time,
                    value: rendered_json(&pipeline, Some(&path)),
                });
            }
            println!("{}", serde_json::to_string_pretty(&points)?);
        }
        Command::Records { target } => {
            pipeline.replay(&session, target.target());
            println!(
                "{}",
                serde_json::to_string_pretty(pipeline.queue().records())?
            );
        }
    }

    Ok(())
}

/// Sample times `from, from + step, ..` up to and including `to`.
fn timeline_times(from: f64, to: f64, step: f64) -> Result<Vec<f64>> {
    ensure!(
        from.is_finite() && to.is_finite(),
        "--from and --to must be finite"
    );
    ensure!(step.is_finite() && step > 0.0, "--step must be positive");
    ensure!(to >= from, "--to must not precede --from");
    let count = ((to - from) / step).floor() + 1.0;
    ensure!(
        count <= MAX_TIMELINE_POINTS as f64,
        "timeline would take {count} samples (limit {MAX_TIMELINE_POINTS})"
    );
    Ok((0..count as usize)
        .map(|index| from + index as f64 * step)
        .collect())
}

fn config_source(metadata: &AnimationConfigMetadata) -> String {
    metadata
        .path()
        .map_or_else(|| "builtin".to_string(), |path| path.display().to_string())
}

fn rendered_json(pipeline: &TablePipeline, path: Option<&PropertyPath>) -> JsonValue {
    pipeline
        .get_rendered_state(path)
        .map_or(JsonValue::Null, |value| value.to_json())
}
