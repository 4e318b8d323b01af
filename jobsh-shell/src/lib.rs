//! Crate for jobsh, a small job-control shell.

pub mod args;
pub mod config;
pub mod entry;
mod error;
pub mod events;
mod productinfo;

pub use error::ShellError;
