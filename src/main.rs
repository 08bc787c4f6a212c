#![forbid(unsafe_code)]

//! diskmon — unattended disk usage alert daemon.
//!
//! No flags: configuration comes from `$DISKMON_CONFIG` (default
//! `/etc/diskmon/config.toml`) plus `DISKMON_*` environment overrides.

use std::time::Duration;

use disk_alert_monitor::core::config::Config;
use disk_alert_monitor::core::errors::Result;
use disk_alert_monitor::daemon::loop_main::MonitorDaemon;
use disk_alert_monitor::daemon::schedule::IntervalTicker;
use disk_alert_monitor::daemon::signals::SignalHandler;

fn main() {
    if let Err(e) = run() {
        eprintln!("diskmon: {e}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let config = Config::load(None)?;
    let signals = SignalHandler::new();
    let mut daemon = MonitorDaemon::init(&config)?;
    let mut ticker = IntervalTicker::new(
        Duration::from_secs(config.monitor.poll_interval_secs),
        signals,
    );
    daemon.run(&mut ticker);
    Ok(())
}
