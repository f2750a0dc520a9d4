//! TUI debugger.
//!
//! Provides an interactive terminal-based debugger with:
//! - PC, IR, flags and register file view
//! - RAM view and `OUT` log
//! - Step/run/breakpoint controls
//! - Disassembly view

mod app;
mod ui;

pub use app::{DebuggerApp, run_debugger};
