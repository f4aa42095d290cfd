use crate::CoreError;
use berth_host::{CommandRunner, CommandSpec};
use serde::Serialize;
use std::fmt;
use std::sync::OnceLock;

/// Which command surface drives Docker compose projects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ComposeDialect {
    /// `docker compose ...`
    Plugin,
    /// `docker-compose ...`
    Standalone,
}

impl ComposeDialect {
    /// Command prefix before any compose arguments.
    pub fn base_command(self) -> CommandSpec {
        match self {
            Self::Plugin => CommandSpec::new("docker").arg("compose"),
            Self::Standalone => CommandSpec::new("docker-compose"),
        }
    }
}

impl fmt::Display for ComposeDialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plugin => f.write_str("docker compose"),
            Self::Standalone => f.write_str("docker-compose"),
        }
    }
}

/// Probe the integrated plugin first, then the standalone binary.
pub fn resolve_dialect(runner: &dyn CommandRunner) -> Result<ComposeDialect, CoreError> {
    for dialect in [ComposeDialect::Plugin, ComposeDialect::Standalone] {
        let probe = dialect.base_command().arg("version");
        if runner.succeeds(&probe) {
            tracing::debug!("compose dialect: {dialect}");
            return Ok(dialect);
        }
        tracing::debug!("{probe} failed");
    }
    Err(CoreError::DialectResolution)
}

/// Resolves the dialect once and remembers it. Failures are not cached, so a
/// later call probes again.
#[derive(Debug, Default)]
pub struct DialectResolver {
    resolved: OnceLock<ComposeDialect>,
}

impl DialectResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resolve(&self, runner: &dyn CommandRunner) -> Result<ComposeDialect, CoreError> {
        if let Some(dialect) = self.resolved.get() {
            return Ok(*dialect);
        }
        let dialect = resolve_dialect(runner)?;
        let _ = self.resolved.set(dialect);
        Ok(dialect)
    }

    pub fn cached(&self) -> Option<ComposeDialect> {
        self.resolved.get().copied()
    }
}
