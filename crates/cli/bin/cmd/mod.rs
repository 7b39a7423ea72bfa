//! Subcommands of the `fastpath` binary.

pub mod keys;
pub mod send;
pub mod status;
