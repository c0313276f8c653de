use std::fs;
use std::path::Path;

use qfish_bench::config::BenchConfig;
use qfish_bench::logging::init_logging;
use qfish_bench::runner::BenchRunner;
use serde_json::Value;
use tempfile::tempdir;

fn load_config(output_dir: &Path) -> BenchConfig {
    let yaml = format!(
        r#"
run_id: "telemetry_check"
games:
  - name: "duel_first_legal"
    suits: 2
    hands: [4, 4]
    seats: ["first_legal", "first_legal"]
    predict: false
  - name: "settled"
    suits: 1
    hands: [4, 0]
outputs:
  jsonl: "{jsonl}"
  summary_md: "{summary}"
logging:
  enable_structured: true
  tracing_level: "info"
"#,
        jsonl = output_dir.join("games.jsonl").display(),
        summary = output_dir.join("summary.md").display(),
    );

    let mut cfg: BenchConfig = serde_yaml::from_str(&yaml).expect("valid yaml");
    cfg.validate().expect("config validates");
    cfg
}

#[test]
fn telemetry_events_carry_the_run_and_game_spans() {
    let dir = tempdir().expect("temp dir");
    let config = load_config(dir.path());
    let outputs = config.resolved_outputs();

    let guard = init_logging(&config, &outputs)
        .expect("logging starts")
        .expect("structured logging enabled");
    let telemetry_path = guard.telemetry_path.clone();
    assert_eq!(telemetry_path, dir.path().join("telemetry.jsonl"));

    let runner = BenchRunner::new(config, outputs).expect("runner created");
    let summary = runner.run().expect("bench completes");
    assert_eq!(summary.telemetry_path.as_ref(), Some(&telemetry_path));
    drop(guard);

    let lines: Vec<Value> = fs::read_to_string(&telemetry_path)
        .expect("telemetry readable")
        .lines()
        .map(|line| serde_json::from_str(line).expect("telemetry line is JSON"))
        .collect();

    let started = lines
        .iter()
        .find(|line| line["fields"]["message"] == "telemetry started")
        .expect("start event");
    assert_eq!(started["span"]["name"], "bench");
    assert_eq!(started["span"]["run_id"], "telemetry_check");
    assert_eq!(started["span"]["games"], 2);

    let game_events: Vec<&Value> = lines
        .iter()
        .filter(|line| line["target"] == "qfish_bench::game" && line["level"] == "INFO")
        .collect();
    assert_eq!(game_events.len(), 2);
    for (event, name) in game_events.iter().zip(["duel_first_legal", "settled"]) {
        assert_eq!(event["span"]["game"], name);
        assert_eq!(event["spans"][0]["run_id"], "telemetry_check");
    }
}
