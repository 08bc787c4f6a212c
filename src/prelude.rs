//! Convenience re-exports for library consumers.
//!
//! ```rust,no_run
//! use disk_alert_monitor::prelude::*;
//! ```

// Core
pub use crate::core::config::Config;
pub use crate::core::errors::{MonError, Result};

// Platform
pub use crate::platform::pal::{
    FixtureSampler, LinuxSampler, MountPoint, VolumeSampler, detect_sampler, host_name,
};

// Monitor
pub use crate::monitor::alert_state::{AlertState, AlertStateStore};
pub use crate::monitor::hysteresis::{Evaluation, HysteresisEngine, StateUpdate, VolumeSnapshot};
pub use crate::monitor::thresholds::{Band, DEFAULT_THRESHOLDS, ThresholdTable};

// Notifications
pub use crate::daemon::notifications::{
    CurlNotifier, NotificationRequest, Notifier, RecordingNotifier, compose_body, deliver_all,
};

// Daemon
#[cfg(feature = "daemon")]
pub use crate::daemon::loop_main::{CycleReport, DaemonParts, MonitorDaemon};
#[cfg(feature = "daemon")]
pub use crate::daemon::schedule::{CountedTicker, IntervalTicker, Ticker};
