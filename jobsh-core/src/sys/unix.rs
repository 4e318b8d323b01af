pub mod process;
pub(crate) mod signal;
pub(crate) mod terminal;
