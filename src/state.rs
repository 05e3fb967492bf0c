//! Shared runtime state handed to every handler as `State<Arc<AppState>>`.

use std::sync::Arc;

use serde::Serialize;

use crate::auth::PrincipalDirectory;
use crate::engine::Engine;

/// Static build metadata included in health responses.
#[derive(Clone, Debug, Serialize)]
pub struct BuildInfo {
    pub service: &'static str,
    pub version: &'static str,
}

impl Default for BuildInfo {
    fn default() -> Self {
        Self {
            service: "qwishi",
            version: env!("CARGO_PKG_VERSION"),
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
    pub principals: PrincipalDirectory,
    pub build: BuildInfo,
}

impl AppState {
    pub fn new(engine: Arc<Engine>, principals: PrincipalDirectory) -> Self {
        Self {
            engine,
            principals,
            build: BuildInfo::default(),
        }
    }
}
