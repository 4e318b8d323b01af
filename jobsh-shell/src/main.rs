//! Implements the command-line interface for the `jobsh` shell.

/// Main entry point for the `jobsh` shell.
fn main() {
    jobsh_shell::entry::run();
}
