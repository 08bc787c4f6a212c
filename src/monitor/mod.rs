//! Volume monitoring: severity bands, the hysteresis engine, and durable alert state.

pub mod alert_state;
pub mod hysteresis;
pub mod thresholds;
