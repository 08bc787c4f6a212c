//! Daemon subsystem: poll loop, scheduling, signal handling, and alert delivery.

#[cfg(feature = "daemon")]
pub mod loop_main;
pub mod notifications;
#[cfg(feature = "daemon")]
pub mod schedule;
#[cfg(feature = "daemon")]
pub mod signals;
