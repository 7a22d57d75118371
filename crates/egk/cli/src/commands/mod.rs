//! Subcommand implementations

mod read;
mod readers;

pub(crate) use read::read_command;
pub(crate) use readers::{list_readers, status_command};
