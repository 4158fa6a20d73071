use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Shared fixtures live at the workspace root, two levels above this crate.
fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../../tests/fixtures").join(name)
}

/// A file in the temp dir unique to this test process, removed on drop.
struct Scratch(PathBuf);

impl Scratch {
    fn new(suffix: &str) -> Self {
        static NEXT: AtomicUsize = AtomicUsize::new(0);
        let n = NEXT.fetch_add(1, Ordering::Relaxed);
        Self(std::env::temp_dir().join(format!("opcal-{}-{n}-{suffix}", std::process::id())))
    }

    fn with_contents(suffix: &str, contents: &str) -> Self {
        let s = Self::new(suffix);
        std::fs::write(&s.0, contents).unwrap();
        s
    }

    fn arg(&self) -> &str {
        self.0.to_str().unwrap()
    }
}

impl Drop for Scratch {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.0);
    }
}

fn opcal<I, S>(args: I) -> Output
where
    I: IntoIterator<Item = S>,
    S: AsRef<std::ffi::OsStr>,
{
    Command::new(env!("CARGO_BIN_EXE_opcal")).args(args).output().expect("spawn opcal")
}

fn assert_success(out: &Output, what: &str) {
    assert!(out.status.success(), "{what} failed, stderr={}", String::from_utf8_lossy(&out.stderr));
}

fn run_args(extra: &[&str]) -> Vec<String> {
    let mut args = vec![
        "run".to_string(),
        "--config".to_string(),
        fixture("calibration.yaml").display().to_string(),
        "--events".to_string(),
        fixture("events.jsonl").display().to_string(),
    ];
    args.extend(extra.iter().map(|s| s.to_string()));
    args
}

fn report_via_file(extra: &[&str]) -> serde_json::Value {
    let report = Scratch::new("report.json");
    let mut args = run_args(extra);
    args.extend(["--output".to_string(), report.arg().to_string()]);
    assert_success(&opcal(&args), "opcal run");
    serde_json::from_str(&std::fs::read_to_string(&report.0).unwrap()).unwrap()
}

#[test]
fn run_writes_working_points() {
    let v = report_via_file(&[]);

    assert_eq!(v["stats"]["events_processed"], 7);
    assert_eq!(v["stats"]["events_failed"], 1);
    assert_eq!(v["stats"]["observations"], 7);

    let tagger = &v["taggers"][0];
    assert_eq!(tagger["alias"], "TCHE");
    let results = tagger["results"].as_array().unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["name"], "Medium");
    assert_eq!(results[0]["discriminator_cut"].as_f64().unwrap(), 0.4);
    let b = results[0]["signal_efficiency"].as_f64().unwrap();
    assert!((b - 2.0 / 3.0).abs() < 1e-12, "b efficiency = {b}");

    let rejected = tagger["rejected"].as_array().unwrap();
    assert_eq!(rejected.len(), 1);
    assert_eq!(rejected[0]["name"], "Loose");
}

#[test]
fn report_on_stdout_stays_parseable_with_warnings() {
    // The fixture run skips one event and rejects `Loose`, both logged at warn.
    let out = opcal(run_args(&["--log-level", "info"]));
    assert_success(&out, "opcal run");

    let v: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap_or_else(|e| {
        panic!("stdout is not JSON ({e}): {}", String::from_utf8_lossy(&out.stdout))
    });
    assert_eq!(v, report_via_file(&[]));

    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("skipping event 100"), "stderr={stderr}");
    assert!(stderr.contains("TCHE/Loose"), "stderr={stderr}");
}

#[test]
fn parallel_run_matches_sequential() {
    let sequential = report_via_file(&[]);
    let parallel = report_via_file(&["--threads", "3"]);
    assert_eq!(sequential["stats"], parallel["stats"]);
    assert_eq!(sequential["taggers"], parallel["taggers"]);
}

#[test]
fn validate_prints_working_points() {
    let cfg = fixture("calibration.yaml").display().to_string();
    let out = opcal(["validate", "--config", cfg.as_str()]);
    assert_success(&out, "opcal validate");

    let v: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(v["mode"], "mistag_rate");
    assert_eq!(v["inversion_policy"], "reject");
    assert_eq!(v["working_points"].as_array().unwrap().len(), 1);
}

#[test]
fn validate_rejects_inverted_discriminator_range() {
    let text = std::fs::read_to_string(fixture("calibration.yaml"))
        .unwrap()
        .replace("max_discriminator: 1.0", "max_discriminator: -1.0");
    let cfg = Scratch::with_contents("bad_range.yaml", &text);

    let out = opcal(["validate", "--config", cfg.arg()]);
    assert!(!out.status.success(), "validate should fail on min >= max");
}

#[test]
fn run_fails_on_malformed_event_line() {
    let cfg = fixture("calibration.yaml").display().to_string();
    let events = Scratch::with_contents("broken.jsonl", "{\"id\": 1}\nnot json\n");

    let out = opcal(["run", "--config", cfg.as_str(), "--events", events.arg()]);
    assert!(!out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("line 2"), "stderr={stderr}");
}
