//! `charfeed-agent` library crate.
//!
//! Holds the stdin command parser so it can be tested. The binary
//! entrypoint lives in `main.rs`.

pub mod command;
