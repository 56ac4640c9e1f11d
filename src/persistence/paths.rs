//! Filesystem layout under a work root.
//!
//! ```text
//! <work_root>/
//!   repo/                     # the clone the agent works in
//!   state/state.json          # WorkerState
//!   state/openhands_home/     # HOME for the coding agent
//!   logs/
//!   out/result.json           # machine-readable outcome of the last run
//! ```

use std::io;
use std::path::{Path, PathBuf};

/// Resolved paths for one worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkPaths {
    pub work_root: PathBuf,
    pub repo_dir: PathBuf,
    pub state_dir: PathBuf,
    pub state_file: PathBuf,
    pub agent_home_dir: PathBuf,
    pub logs_dir: PathBuf,
    pub out_dir: PathBuf,
    pub result_file: PathBuf,
}

impl WorkPaths {
    /// Derives every path from `work_root`. Relative roots are resolved against
    /// the current directory so that subprocesses with a different cwd agree.
    pub fn new(work_root: impl AsRef<Path>) -> Self {
        let root = work_root.as_ref();
        let root = if root.is_absolute() {
            root.to_path_buf()
        } else {
            std::env::current_dir()
                .map(|cwd| cwd.join(root))
                .unwrap_or_else(|_| root.to_path_buf())
        };

        let state_dir = root.join("state");
        let out_dir = root.join("out");
        WorkPaths {
            repo_dir: root.join("repo"),
            state_file: state_dir.join("state.json"),
            agent_home_dir: state_dir.join("openhands_home"),
            logs_dir: root.join("logs"),
            result_file: out_dir.join("result.json"),
            state_dir,
            out_dir,
            work_root: root,
        }
    }

    /// Creates every directory of the layout.
    pub fn ensure_directories(&self) -> io::Result<()> {
        for dir in [
            &self.repo_dir,
            &self.state_dir,
            &self.agent_home_dir,
            &self.logs_dir,
            &self.out_dir,
        ] {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }
}
