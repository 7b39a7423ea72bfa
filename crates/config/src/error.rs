//! Errors raised while loading the fastpath config.
use figment::providers::{Format, Toml};
use std::{collections::HashSet, error::Error, fmt};

/// First line of every rendered [`ExtractConfigError`].
pub const FAILED_TO_EXTRACT_CONFIG_MSG: &str = "failed to extract fastpath config:";

/// `Config::load` failed. Holds every problem figment collected across the merged sources.
#[derive(Clone, Debug, PartialEq)]
pub struct ExtractConfigError {
    pub(crate) error: figment::Error,
}

impl ExtractConfigError {
    pub fn new(error: figment::Error) -> Self {
        Self { error }
    }

    /// The individual problems, one per offending setting, with duplicates collapsed.
    pub fn problems(&self) -> Vec<ConfigError> {
        let mut seen = HashSet::new();
        self.error
            .clone()
            .into_iter()
            .map(ConfigError::from)
            .filter(|problem| seen.insert(problem.to_string()))
            .collect()
    }
}

impl fmt::Display for ExtractConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{FAILED_TO_EXTRACT_CONFIG_MSG}")?;
        for problem in self.problems() {
            writeln!(f, "{problem}")?;
        }
        Ok(())
    }
}

impl Error for ExtractConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Error::source(&self.error)
    }
}

/// One bad setting, tagged with the source it came from.
#[derive(Clone, Debug, PartialEq)]
pub enum ConfigError {
    /// A value in `fastpath.toml` or the global `~/.fastpath/fastpath.toml`.
    File(figment::Error),
    /// A `FASTPATH_*` environment variable.
    Env(figment::Error),
    /// CLI overrides and anything without source metadata.
    Other(figment::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        let source = err.metadata.as_ref().map(|meta| meta.name.to_string()).unwrap_or_default();
        if source.contains(Toml::NAME) {
            Self::File(err)
        } else if source.contains("environment") {
            Self::Env(err)
        } else {
            Self::Other(err)
        }
    }
}

impl ConfigError {
    fn inner(&self) -> &figment::Error {
        match self {
            Self::File(err) | Self::Env(err) | Self::Other(err) => err,
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let origin = match self {
            Self::File(_) => "fastpath.toml",
            Self::Env(_) => "environment",
            Self::Other(_) => "config",
        };
        let err = self.inner();
        write!(f, "{origin}: {}", err.kind)?;
        // e.g. `poll.interval_ms`
        if !err.path.is_empty() {
            write!(f, " at `{}`", err.path.join("."))?;
        }
        Ok(())
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Error::source(self.inner())
    }
}
