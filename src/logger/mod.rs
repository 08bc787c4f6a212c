//! Structured activity logging: append-only JSONL with rotation and stderr fallback.

pub mod jsonl;
