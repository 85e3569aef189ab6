use super::FlagError;
use crate::params::{self, flags};
use crate::store::FlagSource;
use crate::types::Version;
use log::{debug, info, warn};
use std::time::Duration;

/// Result of evaluating the remote flags against the running version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagOutcome {
    Maintenance,
    ForcedUpdate,
    UpToDate,
}

/// Flag values cached by the last successful fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedFlags {
    pub is_maintenance: bool,
    /// Minimum version clients must run
    pub force_update_version: Version,
}

impl FetchedFlags {
    /// Maintenance wins over any version comparison.
    pub fn evaluate(&self, current: &Version) -> FlagOutcome {
        if self.is_maintenance {
            FlagOutcome::Maintenance
        } else if self.force_update_version > *current {
            FlagOutcome::ForcedUpdate
        } else {
            FlagOutcome::UpToDate
        }
    }
}

/// Cache of the remote flags.
///
/// [`FacadeFlags::fetch`] refreshes the cache, fetch failures are recorded (see
/// [`FacadeFlags::error`]) and leave the previously cached values untouched.
pub struct FacadeFlags<S> {
    source: S,
    min_fetch_interval: Duration,
    fetched: Option<FetchedFlags>,
    error: Option<FlagError>,
}

impl<S: FlagSource> FacadeFlags<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            min_fetch_interval: params::configurables().flags_min_fetch_interval,
            fetched: None,
            error: None,
        }
    }

    pub fn with_min_fetch_interval(mut self, interval: Duration) -> Self {
        self.min_fetch_interval = interval;
        self
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Fetches and activates the remote flags, then caches their values.
    ///
    /// Missing flags take their default values: not in maintenance and a minimum
    /// version of [`flags::DEFAULT_FORCE_UPDATE_VERSION`].
    pub async fn fetch(&mut self) {
        match self.try_fetch().await {
            Ok(fetched) => {
                info!(
                    "remote flags: maintenance {}, minimum version {}",
                    fetched.is_maintenance, fetched.force_update_version
                );
                self.fetched = Some(fetched);
                self.error = None;
            }
            Err(e) => {
                warn!("{}", e);
                self.error = Some(e);
            }
        }
    }

    async fn try_fetch(&self) -> Result<FetchedFlags, FlagError> {
        let activated = self
            .source
            .fetch_and_activate(self.min_fetch_interval)
            .await?;
        if !activated {
            debug!("remote flags not refreshed, using the active values");
        }

        let is_maintenance = self
            .source
            .bool_value(flags::IS_MAINTENANCE)
            .unwrap_or(false);

        let raw_version = self
            .source
            .string_value(flags::FORCE_UPDATE_VERSION)
            .unwrap_or_else(|| flags::DEFAULT_FORCE_UPDATE_VERSION.to_owned());
        let force_update_version = raw_version
            .parse::<Version>()
            .map_err(|e| FlagError::Version(format!("`{raw_version}`: {e}")))?;

        Ok(FetchedFlags {
            is_maintenance,
            force_update_version,
        })
    }

    /// Evaluates the cached flags, [`None`] until a fetch succeeded.
    pub fn evaluate(&self, current: &Version) -> Option<FlagOutcome> {
        self.fetched.as_ref().map(|f| f.evaluate(current))
    }

    pub fn fetched(&self) -> Option<&FetchedFlags> {
        self.fetched.as_ref()
    }

    /// Error of the last fetch, cleared by a successful fetch.
    pub fn error(&self) -> Option<&FlagError> {
        self.error.as_ref()
    }
}
