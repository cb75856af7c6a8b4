// THEORY:
// This file is the main entry point for the `gangway_guard` library crate.
// It follows the standard Rust convention of using `lib.rs` to define the public
// API that will be exposed to external consumers (like the `gangway_monitor`
// binary).
//
// The primary goal is to export the `BlockagePipeline` and the `Monitor` run
// loop, together with their configuration and report types, as the high-level
// interface of the engine. The individual stages live in `core_modules` and can
// be used on their own, but a consumer normally only needs the pipeline, a
// `FrameSource`, a `DisplaySink`, and the operator `ControlHandle`.

pub mod config;
pub mod core_modules;
pub mod error;
pub mod monitor;
pub mod pipeline;

pub use config::GuardConfig;
pub use error::{GuardError, Result};
pub use monitor::{ControlHandle, Monitor, OperatorCommand, ShutdownReason, control_channel};
pub use pipeline::{BlockagePipeline, Report};
