//! Trace utilities

/// Trace category for command launches and builtins.
pub const COMMANDS: &str = "commands";
/// Trace category for waiting on and reaping child processes.
pub const JOBS: &str = "jobs";
/// Trace category for building command lists from tokens.
pub const PARSE: &str = "parse";
/// Trace category for terminal foreground handoff.
pub const TERMINAL: &str = "terminal";
