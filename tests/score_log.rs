use serde_json::Value;
use streameval::{
    MatchPolicy, ScoreLog, ScoreLogPolicy, ScoreRecord, ScoreSink, ScoreWriter, WallClock,
};

struct FixedClock(u64);

impl WallClock for FixedClock {
    fn now_ms(&mut self) -> u64 {
        self.0
    }
}

fn record(payload_time: u64, ready_time: u64, score: f64) -> ScoreRecord<f64> {
    ScoreRecord {
        node: "segmentation_eval".into(),
        policy: MatchPolicy::LatencyAdjusted,
        metric: "mIoU".into(),
        payload_time,
        ready_time,
        score,
    }
}

#[test]
fn score_lines_carry_match_context() {
    let mut log = ScoreLog::with_clock(ScoreLogPolicy::default(), Box::new(FixedClock(1_700)));
    log.on_score(record(100, 150, 0.75)).unwrap();
    let lines: Vec<_> = log.lines().collect();
    assert_eq!(lines.len(), 1);
    let parsed: Value = serde_json::from_str(lines[0]).unwrap();
    assert_eq!(parsed["ts_ms"], 1_700);
    assert_eq!(parsed["node"], "segmentation_eval");
    assert_eq!(parsed["policy"], "latency-adjusted");
    assert_eq!(parsed["metric"], "mIoU");
    assert_eq!(parsed["payload_time"], 100);
    assert_eq!(parsed["ready_time"], 150);
    assert_eq!(parsed["score"], 0.75);
}

#[test]
fn rotation_discards_old_segments() {
    let policy = ScoreLogPolicy {
        max_bytes: 200,
        max_files: 2,
    };
    let mut log = ScoreLog::with_clock(policy, Box::new(FixedClock(0)));
    for idx in 0..20 {
        log.on_score(record(idx * 50, idx * 50, 1.0)).unwrap();
    }
    let segments: Vec<_> = log.segments().collect();
    assert!(segments.len() <= 3, "active + rotated segments retained");
    assert!(segments.iter().all(|segment| segment.bytes_written() <= 200));
    assert_eq!(log.records_total(), 20);
    assert!(log.lines().count() < 20);
}

#[test]
fn vec_sink_collects_records() {
    let mut sink: Vec<ScoreRecord<f64>> = Vec::new();
    sink.on_score(record(0, 0, 0.5)).unwrap();
    assert_eq!(sink.len(), 1);
    assert_eq!(sink[0].score, 0.5);
}

#[test]
fn writer_streams_lines_the_log_rotates_away() {
    let policy = ScoreLogPolicy {
        max_bytes: 200,
        max_files: 1,
    };
    let log = ScoreLog::with_clock(policy, Box::new(FixedClock(5)));
    let mut writer = ScoreWriter::new(log, Vec::new());
    for t in 0..10 {
        writer.on_score(record(t * 50, t * 50 + 50, 0.5)).unwrap();
    }
    writer.flush().unwrap();
    assert_eq!(writer.lines_written(), 10);
    assert_eq!(writer.log().records_total(), 10);
    assert!(writer.log().lines().count() < 10);

    let (_, out) = writer.into_parts();
    let body = String::from_utf8(out).unwrap();
    let payload_times: Vec<u64> = body
        .lines()
        .map(|line| {
            let parsed: Value = serde_json::from_str(line).unwrap();
            parsed["payload_time"].as_u64().unwrap()
        })
        .collect();
    assert_eq!(payload_times, (0..10).map(|t| t * 50).collect::<Vec<_>>());
}
