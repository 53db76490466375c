// SPDX-License-Identifier: GPL-3.0-only

//! Tracing subscriber setup
//!
//! `RUST_LOG` always wins. Without it the default level is `warn`, or `debug`
//! when verbose logging is requested.

use tracing_subscriber::EnvFilter;

fn default_filter(verbose: bool) -> EnvFilter {
    EnvFilter::new(if verbose { "debug" } else { "warn" })
}

/// Install the global subscriber; false if one was already installed
pub fn init(verbose: bool) -> bool {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter(verbose)),
        )
        .with_target(true)
        .with_level(true)
        .try_init()
        .is_ok()
}
