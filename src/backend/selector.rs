//! Backend Selector
//!
//! Opens the preferred engine, falling back to the second engine when the
//! first fails for an I/O-class reason.

use std::fmt;
use std::sync::Arc;

use super::{BackendHandle, Engine, EngineKind, NativeEngine, PortableEngine};
use crate::config::Config;
use crate::error::{Result, TwinError};

/// Two-tier engine selection
#[derive(Clone)]
pub struct BackendSelector {
    preferred: Arc<dyn Engine>,
    fallback: Arc<dyn Engine>,
}

impl BackendSelector {
    pub fn new(preferred: Arc<dyn Engine>, fallback: Arc<dyn Engine>) -> Self {
        Self {
            preferred,
            fallback,
        }
    }

    pub fn preferred_kind(&self) -> EngineKind {
        self.preferred.kind()
    }

    pub fn fallback_kind(&self) -> EngineKind {
        self.fallback.kind()
    }

    /// Open a handle for `config`, reporting which engine served it
    ///
    /// - preferred succeeds → preferred handle
    /// - preferred fails, I/O-class → try fallback
    /// - preferred fails otherwise → that error, fallback untouched
    /// - both fail → `StoreOpen` with the fallback failure as source
    pub fn open(&self, config: &Config) -> Result<(Box<dyn BackendHandle>, EngineKind)> {
        let preferred_err = match self.preferred.open(config) {
            Ok(handle) => {
                tracing::info!(
                    engine = %self.preferred.kind(),
                    path = %config.path.display(),
                    "using preferred engine"
                );
                return Ok((handle, self.preferred.kind()));
            }
            Err(e) if e.is_io_class() => e,
            Err(e) => return Err(e),
        };

        tracing::warn!(
            engine = %self.preferred.kind(),
            error = %preferred_err,
            "preferred engine failed to open; trying {}",
            self.fallback.kind()
        );

        match self.fallback.open(config) {
            Ok(handle) => {
                tracing::info!(
                    engine = %self.fallback.kind(),
                    path = %config.path.display(),
                    "using fallback engine"
                );
                Ok((handle, self.fallback.kind()))
            }
            Err(fallback_err) => Err(TwinError::StoreOpen {
                preferred: Box::new(preferred_err),
                source: Box::new(fallback_err),
            }),
        }
    }
}

impl Default for BackendSelector {
    /// Native first, portable as fallback
    fn default() -> Self {
        Self::new(Arc::new(NativeEngine), Arc::new(PortableEngine))
    }
}

impl fmt::Debug for BackendSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendSelector")
            .field("preferred", &self.preferred.kind())
            .field("fallback", &self.fallback.kind())
            .finish()
    }
}
