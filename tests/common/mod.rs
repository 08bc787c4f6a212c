#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use disk_alert_monitor::daemon::loop_main::{DaemonParts, MonitorDaemon};
use disk_alert_monitor::daemon::notifications::RecordingNotifier;
use disk_alert_monitor::logger::jsonl::JsonlConfig;
use disk_alert_monitor::monitor::alert_state::AlertStateStore;
use disk_alert_monitor::monitor::hysteresis::HysteresisEngine;
use disk_alert_monitor::platform::pal::FixtureSampler;

pub struct CmdResult {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
    pub log_path: PathBuf,
}

fn now_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis())
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

fn resolve_bin_path() -> PathBuf {
    if let Some(path) = option_env!("CARGO_BIN_EXE_diskmon") {
        return PathBuf::from(path);
    }

    let exe_name = if cfg!(windows) { "diskmon.exe" } else { "diskmon" };
    let fallback = std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(PathBuf::from))
        .and_then(|deps| deps.parent().map(PathBuf::from))
        .map(|debug_dir| debug_dir.join(exe_name));

    match fallback {
        Some(path) if path.exists() => path,
        _ => panic!("unable to resolve diskmon binary path for integration test"),
    }
}

/// Run the daemon binary with a scrubbed `DISKMON_*` environment plus `envs`,
/// keeping a transcript for failed assertions.
pub fn run_bin_case(case_name: &str, envs: &[(&str, &Path)]) -> CmdResult {
    let root = std::env::temp_dir().join("diskmon-test-logs");
    fs::create_dir_all(&root).expect("create temp test log dir");

    let log_path = root.join(format!("{}-{}.log", sanitize(case_name), now_millis()));
    let bin_path = resolve_bin_path();

    let mut cmd = Command::new(&bin_path);
    for (name, _) in std::env::vars() {
        if name.starts_with("DISKMON_") {
            cmd.env_remove(name);
        }
    }
    for (name, value) in envs {
        cmd.env(name, value);
    }
    let output = cmd
        .env("RUST_BACKTRACE", "1")
        .output()
        .expect("execute diskmon");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();

    let mut log_content = String::new();
    log_content.push_str(&format!("case={case_name}\n"));
    log_content.push_str(&format!("bin={}\n", bin_path.display()));
    log_content.push_str(&format!("env={envs:?}\n"));
    log_content.push_str(&format!("status={}\n", output.status));
    log_content.push_str("----- stdout -----\n");
    log_content.push_str(&stdout);
    log_content.push('\n');
    log_content.push_str("----- stderr -----\n");
    log_content.push_str(&stderr);
    log_content.push('\n');
    fs::write(&log_path, log_content).expect("write test log");

    CmdResult {
        status: output.status,
        stdout,
        stderr,
        log_path,
    }
}

/// A daemon wired to a scripted sampler and a recording notifier, with its
/// state file and activity log under `dir`.
pub struct Rig {
    pub sampler: Arc<FixtureSampler>,
    pub notifier: Arc<RecordingNotifier>,
    pub daemon: MonitorDaemon,
}

pub fn state_path(dir: &Path) -> PathBuf {
    dir.join("system-monitor.json")
}

pub fn activity_path(dir: &Path) -> PathBuf {
    dir.join("activity.jsonl")
}

pub fn rig(dir: &Path, recipients: &[&str], notifier: RecordingNotifier) -> Rig {
    rig_with_store(dir, AlertStateStore::new(state_path(dir)), recipients, notifier)
}

pub fn rig_with_store(
    dir: &Path,
    store: AlertStateStore,
    recipients: &[&str],
    notifier: RecordingNotifier,
) -> Rig {
    let sampler = Arc::new(FixtureSampler::default());
    let notifier = Arc::new(notifier);
    let daemon = MonitorDaemon::from_parts(DaemonParts {
        sampler: sampler.clone(),
        engine: HysteresisEngine::default(),
        store,
        notifier: notifier.clone(),
        recipients: recipients.iter().map(|r| (*r).to_string()).collect(),
        host: "storage-7".to_string(),
        activity_log: JsonlConfig::at(activity_path(dir)),
    });
    Rig {
        sampler,
        notifier,
        daemon,
    }
}

/// Event names from an activity log, in order.
pub fn logged_events(path: &Path) -> Vec<String> {
    fs::read_to_string(path)
        .unwrap_or_default()
        .lines()
        .map(|line| {
            let value: serde_json::Value = serde_json::from_str(line).expect("valid JSONL line");
            value["event"].as_str().expect("event field").to_string()
        })
        .collect()
}
