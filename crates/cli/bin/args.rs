use crate::cmd::{keys::KeysSubcommand, send::SendArgs, status::StatusArgs};
use clap::{Parser, Subcommand};

/// Send smart-account transactions with scoped session keys.
#[derive(Debug, Parser)]
#[command(name = "fastpath", version, next_display_order = None)]
pub struct Fastpath {
    #[command(subcommand)]
    pub cmd: FastpathSubcommand,
}

#[derive(Debug, Subcommand)]
pub enum FastpathSubcommand {
    /// Manage session keys.
    #[command(visible_alias = "k")]
    Keys {
        #[command(subcommand)]
        command: KeysSubcommand,
    },

    /// Send a call, using a session key when one covers it.
    #[command(visible_alias = "s")]
    Send(SendArgs),

    /// Show the status of a submitted call bundle.
    #[command(visible_alias = "st")]
    Status(StatusArgs),
}
