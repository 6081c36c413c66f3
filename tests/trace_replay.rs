use serde_json::{json, Value};
use std::io::Cursor;
use streameval::app::{replay, run_with, ReplayArgs, ReplayOutcome, TraceEvent};
use streameval::{EvalConfig, LabelMap, MatchPolicy, ScoreLogPolicy, StreamRole, Verbosity};

fn frame(
    role: &str,
    game_time: u64,
    sequence: u64,
    labels: [u8; 4],
    latency: Option<u64>,
) -> Value {
    let mut event = json!({
        "kind": "frame",
        "role": role,
        "game_time": game_time,
        "sequence": sequence,
        "payload": {"width": 2, "height": 2, "labels": labels},
    });
    if let Some(latency) = latency {
        event["latency"] = json!(latency);
    }
    event
}

fn tick(game_time: u64, sequence: u64) -> Value {
    json!({"kind": "tick", "game_time": game_time, "sequence": sequence})
}

fn trace(events: &[Value]) -> Cursor<String> {
    let body: Vec<String> = events.iter().map(Value::to_string).collect();
    Cursor::new(body.join("\n"))
}

fn replay_to_lines(config: EvalConfig, events: &[Value]) -> (ReplayOutcome, Vec<String>) {
    let mut out = Vec::new();
    let outcome = replay(config, trace(events), &mut out).unwrap();
    let lines = String::from_utf8(out)
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect();
    (outcome, lines)
}

fn exact_pairs(count: u64) -> Vec<Value> {
    let mut events = vec![tick(0, 0), tick(50, 1)];
    for i in 0..count {
        let game_time = 100 + 50 * i;
        events.push(frame("ground_truth", game_time, i, [1, 1, 2, 2], None));
        events.push(frame("candidate", game_time, i, [1, 1, 2, 2], None));
        events.push(tick(game_time, i + 2));
    }
    events
}

#[test]
fn trace_events_deserialize() {
    let event: TraceEvent =
        serde_json::from_value(frame("candidate", 100, 2, [0, 1, 1, 0], Some(55))).unwrap();
    assert_eq!(
        event,
        TraceEvent::Frame {
            role: StreamRole::Candidate,
            game_time: 100,
            sequence: 2,
            payload: LabelMap::new(2, 2, vec![0, 1, 1, 0]),
            latency: Some(55),
        }
    );
    let event: TraceEvent = serde_json::from_value(tick(50, 1)).unwrap();
    assert_eq!(
        event,
        TraceEvent::Tick {
            game_time: 50,
            sequence: 1
        }
    );
}

#[test]
fn replay_scores_latency_adjusted_pairs() {
    let events = [
        tick(0, 0),
        tick(50, 1),
        frame("ground_truth", 100, 0, [1, 1, 2, 2], None),
        frame("candidate", 100, 0, [1, 1, 2, 2], Some(55)),
        tick(100, 2),
        frame("ground_truth", 150, 1, [1, 2, 2, 2], None),
        tick(150, 3),
    ];
    let config = EvalConfig::new(MatchPolicy::LatencyAdjusted).with_node_name("seg_eval");
    let (outcome, lines) = replay_to_lines(config, &events);
    assert_eq!(lines.len(), 1);
    assert_eq!(outcome.lines_written, 1);
    assert_eq!(outcome.telemetry.scores_emitted_total, 1);

    let line: Value = serde_json::from_str(&lines[0]).unwrap();
    assert_eq!(line["node"], "seg_eval");
    assert_eq!(line["metric"], "mIoU");
    assert_eq!(line["payload_time"], 100);
    assert_eq!(line["ready_time"], 150);
    // class 1: 1/2, class 2: 2/3
    let mean = line["score"]["mean_iou"].as_f64().unwrap();
    assert!((mean - (0.5 + 2.0 / 3.0) / 2.0).abs() < 1e-9);
}

#[test]
fn replay_surfaces_lookup_failure_with_line_context() {
    let events = [
        tick(0, 0),
        tick(50, 1),
        frame("candidate", 100, 0, [0; 4], None),
        tick(100, 2),
    ];
    let mut out = Vec::new();
    let err =
        replay(EvalConfig::new(MatchPolicy::ExactTime), trace(&events), &mut out).unwrap_err();
    let rendered = format!("{err:#}");
    assert!(rendered.contains("trace line 4"), "{rendered}");
    assert!(rendered.contains("could not find ground_truth frame at game time 100"));
}

#[test]
fn replay_rejects_malformed_lines() {
    let err = replay(
        EvalConfig::new(MatchPolicy::ExactTime),
        Cursor::new("{\"kind\": \"tick\"}\n".to_string()),
        Vec::new(),
    )
    .unwrap_err();
    assert!(format!("{err:#}").contains("trace line 1 is not a valid event"));
}

#[test]
fn replay_reads_trace_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("trace.jsonl");
    let events = [
        tick(0, 0),
        tick(50, 1),
        frame("ground_truth", 100, 0, [3; 4], None),
        frame("candidate", 100, 0, [3; 4], None),
        tick(100, 2),
    ];
    let body: Vec<String> = events.iter().map(Value::to_string).collect();
    std::fs::write(&path, body.join("\n")).unwrap();
    let file = std::io::BufReader::new(std::fs::File::open(&path).unwrap());
    let mut out = Vec::new();
    replay(EvalConfig::new(MatchPolicy::ExactTime), file, &mut out).unwrap();
    let body = String::from_utf8(out).unwrap();
    let line: Value = serde_json::from_str(body.trim_end()).unwrap();
    assert_eq!(line["score"]["mean_iou"], 1.0);
}

#[test]
fn replay_streams_scores_rotated_out_of_the_log() {
    let mut config = EvalConfig::new(MatchPolicy::ExactTime);
    config.score_log = ScoreLogPolicy {
        max_bytes: 1000,
        max_files: 1,
    };
    let (outcome, lines) = replay_to_lines(config, &exact_pairs(50));
    assert_eq!(outcome.telemetry.scores_emitted_total, 50);
    assert_eq!(outcome.lines_written, 50);
    assert_eq!(lines.len(), 50);
    let payload_times: Vec<u64> = lines
        .iter()
        .map(|line| {
            let value: Value = serde_json::from_str(line).unwrap();
            value["payload_time"].as_u64().unwrap()
        })
        .collect();
    let expected: Vec<u64> = (0..50).map(|i| 100 + 50 * i).collect();
    assert_eq!(payload_times, expected);
}

#[test]
fn run_with_writes_scores_to_out_file() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("config.json");
    let trace_path = dir.path().join("trace.jsonl");
    let out_path = dir.path().join("scores.jsonl");
    std::fs::write(
        &config_path,
        r#"{"policy": "exact", "score_log": {"max_bytes": 1000, "max_files": 1}}"#,
    )
    .unwrap();
    let body: Vec<String> = exact_pairs(20).iter().map(Value::to_string).collect();
    std::fs::write(&trace_path, body.join("\n")).unwrap();

    let outcome = run_with(&ReplayArgs {
        config: config_path,
        trace: trace_path,
        out: Some(out_path.clone()),
        verbosity: Verbosity::Quiet,
    })
    .unwrap();
    assert_eq!(outcome.lines_written, 20);
    let written = std::fs::read_to_string(&out_path).unwrap();
    assert_eq!(written.lines().count(), 20);
    assert!(written.ends_with('\n'));
}

#[test]
fn run_with_leaves_out_file_empty_without_scores() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("config.json");
    let trace_path = dir.path().join("trace.jsonl");
    let out_path = dir.path().join("scores.jsonl");
    std::fs::write(&config_path, r#"{"policy": "exact"}"#).unwrap();
    std::fs::write(&trace_path, format!("{}\n{}\n", tick(0, 0), tick(50, 1))).unwrap();

    let outcome = run_with(&ReplayArgs {
        config: config_path,
        trace: trace_path,
        out: Some(out_path.clone()),
        verbosity: Verbosity::Quiet,
    })
    .unwrap();
    assert_eq!(outcome.lines_written, 0);
    assert_eq!(std::fs::read_to_string(&out_path).unwrap(), "");
}

#[test]
fn args_parse_paths_and_verbosity() {
    let args = ReplayArgs::from_args(
        ["streameval", "--config", "cfg.json", "--trace", "t.jsonl", "-v"]
            .into_iter()
            .map(String::from),
    )
    .unwrap();
    assert_eq!(args.config.to_str(), Some("cfg.json"));
    assert_eq!(args.trace.to_str(), Some("t.jsonl"));
    assert_eq!(args.out, None);
    assert_eq!(args.verbosity, Verbosity::Verbose);

    let missing = ReplayArgs::from_args(["streameval", "--config", "cfg.json"].map(String::from));
    assert!(missing.is_err());
    let unknown = ReplayArgs::from_args(["streameval", "--bogus"].map(String::from));
    assert!(unknown.is_err());
}
