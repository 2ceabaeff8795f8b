//! Shared utilities (hex formatting and parsing).

pub mod hex;
