#![forbid(unsafe_code)]

//! Disk alert monitor: watches every mounted volume and notifies operators once
//! per severity crossing as usage rises, re-arming only after usage recedes
//! below the lowest alerting band.
//!
//! The pieces, in the order a poll cycle touches them:
//! 1. **Sampler** ([`platform::pal`]) — `(location, used, free)` for each mount
//! 2. **Hysteresis engine** ([`monitor::hysteresis`]) — decides which crossings alert
//! 3. **Alert state** ([`monitor::alert_state`]) — durable per-volume memory
//! 4. **Notifier** ([`daemon::notifications`]) — one request per recipient
//!
//! # Library usage
//!
//! ```rust,no_run
//! use disk_alert_monitor::prelude::*;
//!
//! let engine = HysteresisEngine::default();
//! let mut state = AlertState::new();
//! let eval = engine.evaluate(&VolumeSnapshot::new("/data", 95, 5), &mut state)?;
//! assert_eq!(eval.alert.as_deref(), Some("DISK \"/data\" is at 95%"));
//! # Ok::<(), MonError>(())
//! ```

pub mod prelude;

pub mod core;
pub mod daemon;
pub mod logger;
pub mod monitor;
pub mod platform;
