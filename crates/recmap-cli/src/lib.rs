//! Library side of the `recmap` command.

pub mod commands;
pub mod logging;
pub mod types;
