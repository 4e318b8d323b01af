//! Platform abstraction facilities

#[cfg(unix)]
pub(crate) mod unix;
#[cfg(unix)]
pub(crate) use unix as platform;

pub use platform::process;
pub(crate) use platform::signal;
pub(crate) use platform::terminal;
