//! Fatal conditions that terminate a collection run with a distinct exit code.
//!
//! Everything else in the collector is either absorbed (recorded in the build
//! report) or surfaces as a plain `anyhow` error with the generic exit code.
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Exit code for a normal collection run.
pub const EXIT_OK: u8 = 0;
/// Exit code for any failure that is not one of the distinguished fatal conditions.
pub const EXIT_FAILURE: u8 = 1;
/// Exit code when the scratch area could not be created.
pub const EXIT_SCRATCH_CREATE: u8 = 3;
/// Exit code when cleanup refused to remove a path that is not a generated scratch area.
pub const EXIT_UNSAFE_CLEANUP: u8 = 4;

/// Conditions that abort a run and map onto their own exit code.
#[derive(Debug, Error)]
pub enum FatalError {
    /// The scratch area could not be created; nothing else was attempted.
    #[error("could not create scratch area under {root}")]
    ScratchCreate {
        root: PathBuf,
        #[source]
        source: io::Error,
    },
    /// Release found a path that does not look like a generated scratch area.
    #[error("refusing to remove {path}: not a generated scratch directory")]
    UnsafeCleanup { path: PathBuf },
    /// A termination signal arrived while the build was in progress.
    #[error("interrupted by signal {signal}")]
    Interrupted { signal: i32 },
}

impl FatalError {
    /// Process exit code for this condition.
    pub fn exit_code(&self) -> u8 {
        match self {
            FatalError::ScratchCreate { .. } => EXIT_SCRATCH_CREATE,
            FatalError::UnsafeCleanup { .. } => EXIT_UNSAFE_CLEANUP,
            FatalError::Interrupted { signal } => {
                u8::try_from(128 + (*signal).clamp(0, 127)).unwrap_or(EXIT_FAILURE)
            }
        }
    }
}

/// Pick the exit code for an error returned from a command.
pub fn exit_code_for(err: &anyhow::Error) -> u8 {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<FatalError>())
        .map_or(EXIT_FAILURE, FatalError::exit_code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn fatal_conditions_have_distinct_nonzero_codes() {
        let create = FatalError::ScratchCreate {
            root: PathBuf::from("/nonexistent"),
            source: io::Error::from(io::ErrorKind::PermissionDenied),
        };
        let unsafe_cleanup = FatalError::UnsafeCleanup {
            path: PathBuf::from("/"),
        };
        assert_eq!(create.exit_code(), EXIT_SCRATCH_CREATE);
        assert_eq!(unsafe_cleanup.exit_code(), EXIT_UNSAFE_CLEANUP);
        assert_ne!(create.exit_code(), unsafe_cleanup.exit_code());
        assert_ne!(create.exit_code(), EXIT_OK);
        assert_ne!(unsafe_cleanup.exit_code(), EXIT_OK);
    }

    #[test]
    fn interrupted_maps_to_shell_convention() {
        let err = FatalError::Interrupted {
            signal: signal_hook::consts::SIGTERM,
        };
        assert_eq!(err.exit_code(), 128 + signal_hook::consts::SIGTERM as u8);
    }

    #[test]
    fn exit_code_found_through_context_chain() {
        let err = Err::<(), _>(FatalError::UnsafeCleanup {
            path: PathBuf::from("/etc"),
        })
        .context("release scratch area")
        .unwrap_err();
        assert_eq!(exit_code_for(&err), EXIT_UNSAFE_CLEANUP);

        let plain = anyhow::anyhow!("zip write failed");
        assert_eq!(exit_code_for(&plain), EXIT_FAILURE);
    }
}
