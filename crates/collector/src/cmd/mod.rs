//! Subcommands

pub mod check;
pub mod serve;
