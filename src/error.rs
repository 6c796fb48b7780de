use std::{io, path::PathBuf};

use thiserror::Error;

/// Failure while acquiring, holding or releasing a pidfile.
///
/// Every variant up to and including [`PidfileError::Write`] means the
/// pidfile was never recorded and readiness was never signalled.
#[derive(Debug, Error)]
pub enum PidfileError {
    #[error("failed to create pidfile directory {}", path.display())]
    DirectoryCreation {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to open pidfile {}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Another handle holds the exclusive lock right now.
    #[error("pidfile {} is locked by another process", path.display())]
    LockContention {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The recorded pid belongs to a live, signalable process.
    #[error("pidfile '{}' contains active pid: {pid}", path.display())]
    ProcessExists { path: PathBuf, pid: i32 },

    #[error("failed to write pid to {}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to remove pidfile {}", path.display())]
    Removal {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn process_exists_names_path_and_pid() {
        let err = PidfileError::ProcessExists {
            path: PathBuf::from("/run/svc/svc.pid"),
            pid: 4242,
        };
        assert_eq!(
            err.to_string(),
            "pidfile '/run/svc/svc.pid' contains active pid: 4242"
        );
    }
}
