use std::path::PathBuf;

use anyhow::Result;

use crate::config::GuardConfig;

#[derive(Debug, Clone)]
pub struct AppContext {
    pub pidfile: PathBuf,
    pub cfg: GuardConfig,
}

impl AppContext {
    pub const fn new(pidfile: PathBuf, cfg: GuardConfig) -> Self {
        Self { pidfile, cfg }
    }

    /// Convenience constructor loading config from the environment.
    pub fn from_env(pidfile: PathBuf) -> Result<Self> {
        let cfg = GuardConfig::load()?;
        Ok(Self::new(pidfile, cfg))
    }
}
