//! Poll loop: sample → evaluate → persist → notify, one cycle at a time.
//!
//! Everything runs on the calling thread. A cycle finishes completely before
//! the ticker is consulted for the next one, so the alert state has a single
//! owner and needs no locking.
//!
//! Ordering within a cycle that produced alerts: state is persisted first and
//! delivery is attempted afterwards. A failed delivery never rolls the state
//! back, and a failed persist never skips delivery.

#![allow(missing_docs)]

use std::sync::Arc;
use std::time::Instant;

use crate::core::config::Config;
use crate::core::errors::{MonError, Result};
use crate::daemon::notifications::{CurlNotifier, Notifier, compose_body, deliver_all};
use crate::daemon::schedule::Ticker;
use crate::logger::jsonl::{EventType, JsonlConfig, JsonlWriter, LogEntry, Severity};
use crate::monitor::alert_state::{AlertState, AlertStateStore};
use crate::monitor::hysteresis::{HysteresisEngine, VolumeSnapshot};
use crate::monitor::thresholds::Band;
use crate::platform::pal::{VolumeSampler, detect_sampler, host_name};

// ──────────────────── cycle report ────────────────────

/// What one cycle did.
#[derive(Debug, Default)]
pub struct CycleReport {
    /// Alert lines in snapshot order.
    pub alerts: Vec<String>,
    /// Sampling and per-volume evaluation failures. Each excluded a volume
    /// (or, for enumeration failures, the whole cycle) from alerting.
    pub errors: Vec<MonError>,
    /// State file was rewritten this cycle.
    pub persisted: bool,
    pub persist_error: Option<MonError>,
    /// Recipients a delivery was attempted for.
    pub deliveries_attempted: usize,
    pub delivery_failures: Vec<MonError>,
}

impl CycleReport {
    #[must_use]
    pub fn alerted(&self) -> bool {
        !self.alerts.is_empty()
    }
}

// ──────────────────── daemon ────────────────────

/// Collaborators the loop is assembled from.
pub struct DaemonParts {
    pub sampler: Arc<dyn VolumeSampler>,
    pub engine: HysteresisEngine,
    pub store: AlertStateStore,
    pub notifier: Arc<dyn Notifier>,
    pub recipients: Vec<String>,
    pub host: String,
    pub activity_log: JsonlConfig,
}

pub struct MonitorDaemon {
    sampler: Arc<dyn VolumeSampler>,
    engine: HysteresisEngine,
    state: AlertState,
    store: AlertStateStore,
    notifier: Arc<dyn Notifier>,
    recipients: Vec<String>,
    host: String,
    logger: JsonlWriter,
    config_hash: Option<String>,
    cycles: u64,
}

impl MonitorDaemon {
    /// Build the production daemon: host sampler, curl notifier, configured
    /// state file and activity log.
    pub fn init(config: &Config) -> Result<Self> {
        let parts = DaemonParts {
            sampler: detect_sampler(&config.sampler.ignored_fs_types)?,
            engine: HysteresisEngine::new(config.threshold_table()?),
            store: AlertStateStore::new(config.paths.state_file.clone()),
            notifier: Arc::new(CurlNotifier::from_config(&config.notifier)),
            recipients: config.notifier.recipients.clone(),
            host: host_name(),
            activity_log: JsonlConfig::at(config.paths.activity_log.clone()),
        };
        let mut daemon = Self::from_parts(parts);
        daemon.config_hash = config.stable_hash().ok();
        Ok(daemon)
    }

    /// Assemble a daemon and load the persisted alert state. A missing state
    /// file starts empty; an unreadable one is logged and also starts empty.
    pub fn from_parts(parts: DaemonParts) -> Self {
        let mut logger = JsonlWriter::open(parts.activity_log);
        let (state, load_error) = parts.store.load_or_empty();
        if let Some(err) = load_error {
            eprintln!(
                "[DM-STATE] could not load {}: {err}; starting with empty alert state",
                parts.store.path().display()
            );
            logger.write_entry(
                &LogEntry::from_error(EventType::StateLoadFailed, Severity::Warning, &err)
                    .with_details(parts.store.path().display().to_string()),
            );
        }

        Self {
            sampler: parts.sampler,
            engine: parts.engine,
            state,
            store: parts.store,
            notifier: parts.notifier,
            recipients: parts.recipients,
            host: parts.host,
            logger,
            config_hash: None,
            cycles: 0,
        }
    }

    #[must_use]
    pub fn state(&self) -> &AlertState {
        &self.state
    }

    #[must_use]
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Run one cycle, then keep running until the ticker says stop.
    pub fn run(&mut self, ticker: &mut dyn Ticker) {
        let started = Instant::now();
        let mut entry = LogEntry::new(EventType::DaemonStart, Severity::Info).with_details(format!(
            "version={} host={} recipients={} state_file={}",
            env!("CARGO_PKG_VERSION"),
            self.host,
            self.recipients.len(),
            self.store.path().display(),
        ));
        if let Some(hash) = &self.config_hash {
            entry.details = entry.details.map(|d| format!("{d} config_hash={hash}"));
        }
        self.logger.write_entry(&entry);
        eprintln!(
            "[DM-DAEMON] started: {} bands, {} recipients, {} tracked volumes",
            self.engine.table().alerting().count(),
            self.recipients.len(),
            self.state.len()
        );

        loop {
            let report = self.run_cycle();
            if !report.errors.is_empty() || report.persist_error.is_some() {
                eprintln!(
                    "[DM-DAEMON] cycle {} finished with {} error(s)",
                    self.cycles,
                    report.errors.len() + usize::from(report.persist_error.is_some())
                );
            }
            if !ticker.wait() {
                break;
            }
        }

        let uptime_secs = started.elapsed().as_secs();
        self.logger.write_entry(
            &LogEntry::new(EventType::DaemonStop, Severity::Info).with_details(format!(
                "cycles={} uptime_secs={uptime_secs}",
                self.cycles
            )),
        );
        self.logger.fsync();
        eprintln!("[DM-DAEMON] shutdown complete (uptime={uptime_secs}s)");
    }

    /// One full sample → evaluate → (persist) → (notify) pass.
    pub fn run_cycle(&mut self) -> CycleReport {
        self.cycles += 1;
        let mut report = CycleReport::default();

        let sampler = Arc::clone(&self.sampler);
        let snapshots = match sampler.sample() {
            Ok(snapshots) => snapshots,
            Err(err) => {
                eprintln!("[DM-SAMPLER] cannot enumerate volumes: {err}");
                self.logger.write_entry(&LogEntry::from_error(
                    EventType::SampleError,
                    Severity::Warning,
                    &err,
                ));
                report.errors.push(err);
                return report;
            }
        };

        for item in snapshots {
            match item.and_then(|snapshot| self.evaluate(&snapshot)) {
                Ok(Some(alert)) => report.alerts.push(alert),
                Ok(None) => {}
                Err(err) => {
                    eprintln!("[DM-SAMPLER] skipping volume: {err}");
                    let mut entry =
                        LogEntry::from_error(EventType::SampleError, Severity::Warning, &err);
                    if let MonError::EmptyVolume { location } | MonError::FsStats { location, .. } =
                        &err
                    {
                        entry.location = Some(location.clone());
                    }
                    self.logger.write_entry(&entry);
                    report.errors.push(err);
                }
            }
        }

        if report.alerts.is_empty() {
            return report;
        }

        for alert in &report.alerts {
            eprintln!("[DM-ALERT] {alert}");
        }

        match self.store.persist(&self.state) {
            Ok(()) => {
                report.persisted = true;
                self.logger.write_entry(
                    &LogEntry::new(EventType::StatePersisted, Severity::Info).with_details(format!(
                        "{} entries → {}",
                        self.state.len(),
                        self.store.path().display()
                    )),
                );
            }
            Err(err) => {
                eprintln!(
                    "[DM-STATE] FAILED to persist alert state \
                     (duplicate alerts possible after restart): {err}"
                );
                self.logger.write_entry(&LogEntry::from_error(
                    EventType::Error,
                    Severity::Critical,
                    &err,
                ));
                report.persist_error = Some(err);
            }
        }

        let body = compose_body(&self.host, &report.alerts);
        report.deliveries_attempted = self.recipients.len();
        for err in deliver_all(self.notifier.as_ref(), &self.recipients, &body) {
            eprintln!("[DM-NOTIFY] {} delivery failed: {err}", self.notifier.name());
            let mut entry =
                LogEntry::from_error(EventType::DeliveryFailed, Severity::Warning, &err);
            if let MonError::Delivery { recipient, .. } = &err {
                entry = entry.with_recipient(recipient);
            }
            self.logger.write_entry(&entry);
            report.delivery_failures.push(err);
        }

        report
    }

    fn evaluate(&mut self, snapshot: &VolumeSnapshot) -> Result<Option<String>> {
        let evaluation = self.engine.evaluate(snapshot, &mut self.state)?;
        let Some(alert) = evaluation.alert else {
            return Ok(None);
        };
        let mut entry = LogEntry::new(EventType::AlertFired, Severity::Warning)
            .with_location(&snapshot.location);
        if let Band::Threshold(t) = evaluation.band {
            entry.threshold = Some(t);
        }
        entry.percent = snapshot.percent_used().ok();
        self.logger.write_entry(&entry);
        Ok(Some(alert))
    }
}
