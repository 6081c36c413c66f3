use crate::config::EvalConfig;
use crate::engine::{EvaluationNode, LabelMap, MeanIou, NodeTelemetry};
use crate::event_model::{GameTime, StreamRole, Timestamp};
use crate::observability::{init_subscriber, ScoreLog, ScoreWriter, Verbosity};
use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::env;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::PathBuf;
use tracing::info;

const USAGE: &str =
    "usage: streameval --config <config.json> --trace <trace.jsonl> [--out <scores.jsonl>] [-v|-q]";

/// One line of a replay trace.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TraceEvent {
    Frame {
        role: StreamRole,
        game_time: GameTime,
        sequence: u64,
        payload: LabelMap,
        #[serde(default)]
        latency: Option<GameTime>,
    },
    Tick {
        game_time: GameTime,
        sequence: u64,
    },
}

/// Parsed command line for the replay binary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayArgs {
    pub config: PathBuf,
    pub trace: PathBuf,
    pub out: Option<PathBuf>,
    pub verbosity: Verbosity,
}

impl ReplayArgs {
    pub fn from_args<I>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = String>,
    {
        let mut config = None;
        let mut trace = None;
        let mut out = None;
        let mut verbose = false;
        let mut quiet = false;
        let mut iter = args.into_iter();
        iter.next(); // skip binary name
        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "--config" => config = iter.next().map(PathBuf::from),
                "--trace" => trace = iter.next().map(PathBuf::from),
                "--out" => out = iter.next().map(PathBuf::from),
                "-v" | "--verbose" => verbose = true,
                "-q" | "--quiet" => quiet = true,
                other => bail!("unexpected argument `{other}`\n{USAGE}"),
            }
        }
        let (Some(config), Some(trace)) = (config, trace) else {
            bail!("{USAGE}");
        };
        Ok(Self {
            config,
            trace,
            out,
            verbosity: Verbosity::from_flags(verbose, quiet),
        })
    }
}

/// Final counters of a replay.
#[derive(Debug, Clone)]
pub struct ReplayOutcome {
    /// Score lines streamed to the output, one per emitted score.
    pub lines_written: u64,
    pub telemetry: NodeTelemetry,
}

/// Binary entrypoint: parse flags, install logging, then replay.
pub fn run() -> Result<()> {
    let args = ReplayArgs::from_args(env::args())?;
    init_subscriber(args.verbosity);
    run_with(&args).map(|_| ())
}

/// Replays the trace named by `args`, streaming scores to `--out` or stdout.
pub fn run_with(args: &ReplayArgs) -> Result<ReplayOutcome> {
    let config = EvalConfig::load(&args.config)
        .with_context(|| format!("invalid config {}", args.config.display()))?;
    let trace = File::open(&args.trace)
        .with_context(|| format!("unable to open trace {}", args.trace.display()))?;
    let mut out: Box<dyn Write> = match &args.out {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("unable to create {}", path.display()))?;
            Box::new(BufWriter::new(file))
        }
        None => Box::new(io::stdout().lock()),
    };
    let outcome = replay(config, BufReader::new(trace), &mut out)?;
    out.flush().context("unable to flush score output")?;
    Ok(outcome)
}

/// Feeds every event of a JSON-lines trace through a mean-IoU node, writing
/// each score line to `out` as soon as it is emitted.
pub fn replay<R, W>(config: EvalConfig, trace: R, out: W) -> Result<ReplayOutcome>
where
    R: BufRead,
    W: Write,
{
    let sink = ScoreWriter::new(ScoreLog::new(config.score_log), out);
    let mut node = EvaluationNode::new(config, MeanIou, sink);
    for (idx, line) in trace.lines().enumerate() {
        let line_no = idx + 1;
        let line = line.with_context(|| format!("unable to read trace line {line_no}"))?;
        if line.trim().is_empty() {
            continue;
        }
        let event: TraceEvent = serde_json::from_str(&line)
            .with_context(|| format!("trace line {line_no} is not a valid event"))?;
        match event {
            TraceEvent::Frame {
                role,
                game_time,
                sequence,
                payload,
                latency,
            } => {
                node.on_frame(role, Timestamp::new(game_time, sequence), payload, latency)
                    .with_context(|| format!("trace line {line_no}"))?;
            }
            TraceEvent::Tick {
                game_time,
                sequence,
            } => {
                node.on_tick(Timestamp::new(game_time, sequence))
                    .with_context(|| format!("trace line {line_no}"))?;
            }
        }
    }
    let telemetry = node.telemetry();
    info!(
        node = %node.config().node_name,
        scores = telemetry.scores_emitted_total,
        gaps = telemetry.sequence_gaps_total,
        "replay finished"
    );
    let mut sink = node.into_sink();
    sink.flush()?;
    Ok(ReplayOutcome {
        lines_written: sink.lines_written(),
        telemetry,
    })
}
