use comfy_table::{Cell, Table, modifiers::UTF8_ROUND_CORNERS};
use eyre::Result;
use fastpath_session::SessionKey;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{EnvFilter, prelude::*};

/// Initializes a tracing subscriber for the binary, filtered by `RUST_LOG`.
pub fn subscriber() {
    let registry = tracing_subscriber::Registry::default().with(EnvFilter::from_default_env());
    if let Err(err) = registry.with(tracing_subscriber::fmt::layer()).try_init() {
        eprintln!("failed to install tracing subscriber: {err}");
    }
}

/// Returns a token that is cancelled on ctrl-c.
pub fn ctrl_c_token() -> CancellationToken {
    let token = CancellationToken::new();
    let cancel = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });
    token
}

/// Prints `value` as pretty JSON to stdout.
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Renders session keys as a table.
pub fn keys_table(keys: &[SessionKey], now: u64) -> Table {
    let mut table = Table::new();
    table.apply_modifier(UTF8_ROUND_CORNERS);
    table.set_header(vec![
        Cell::new("Id"),
        Cell::new("Type"),
        Cell::new("Public Key"),
        Cell::new("Expires In"),
        Cell::new("Calls"),
        Cell::new("Local"),
    ]);
    for key in keys {
        table.add_row(vec![
            Cell::new(&key.id),
            Cell::new(key.key_type),
            Cell::new(short_hex(&key.public_key)),
            Cell::new(format_remaining(key.expiry.saturating_sub(now))),
            Cell::new(key.scope.call_scope.len()),
            Cell::new(if key.has_local_private_key { "yes" } else { "no" }),
        ]);
    }
    table
}

fn short_hex(s: &str) -> String {
    if s.len() <= 18 { s.to_string() } else { format!("{}…{}", &s[..10], &s[s.len() - 6..]) }
}

fn format_remaining(secs: u64) -> String {
    match secs {
        0..60 => format!("{secs}s"),
        60..3600 => format!("{}m {}s", secs / 60, secs % 60),
        _ => format!("{}h {}m", secs / 3600, (secs % 3600) / 60),
    }
}
