//! Termination signal recording.
//!
//! Handlers only store the signal number; the collector polls it at safe
//! points and unwinds through the normal error path so the scratch guard
//! still runs.
use crate::error::FatalError;
use anyhow::{Context, Result};
use signal_hook::consts::{SIGHUP, SIGINT, SIGTERM};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

const HANDLED: [i32; 3] = [SIGINT, SIGTERM, SIGHUP];

fn pending_flag() -> &'static Arc<AtomicUsize> {
    static PENDING: OnceLock<Arc<AtomicUsize>> = OnceLock::new();
    PENDING.get_or_init(|| Arc::new(AtomicUsize::new(0)))
}

/// Install recording handlers for SIGINT, SIGTERM and SIGHUP.
pub fn install() -> Result<()> {
    for signum in HANDLED {
        let value = usize::try_from(signum).context("signal numbers are positive")?;
        signal_hook::flag::register_usize(signum, Arc::clone(pending_flag()), value)
            .with_context(|| format!("install handler for signal {signum}"))?;
    }
    Ok(())
}

/// The most recently received termination signal, if any.
pub fn pending() -> Option<i32> {
    match pending_flag().load(Ordering::SeqCst) {
        0 => None,
        signum => i32::try_from(signum).ok(),
    }
}

/// Fail with `Interrupted` when a termination signal is pending.
pub fn check() -> std::result::Result<(), FatalError> {
    match pending() {
        Some(signal) => Err(FatalError::Interrupted { signal }),
        None => Ok(()),
    }
}
