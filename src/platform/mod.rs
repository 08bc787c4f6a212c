//! Platform abstraction: volume sampling and host identity.

pub mod pal;
