//! Numeric runtime initialization
//!
//! ONNX Runtime keeps a process-wide environment. `RuntimeHandle` commits it
//! once and memoises the outcome, so the startup task and the custom-model
//! loader can both wait on the same initialization.

use ort::session::Session;
use std::fmt;
use std::sync::{Arc, OnceLock};
use tokio::task;
use tracing::{debug, info};

use crate::error::ModelLoadError;

/// Outcome of a successful runtime initialization
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeInfo {
    /// Name the environment was committed under
    pub name: String,
}

type Initializer = fn(&str) -> Result<RuntimeInfo, ModelLoadError>;

/// Shared, initialize-once handle to the numeric runtime
#[derive(Clone)]
pub struct RuntimeHandle {
    name: String,
    state: Arc<OnceLock<Result<RuntimeInfo, ModelLoadError>>>,
    initializer: Initializer,
}

impl RuntimeHandle {
    /// Handle that commits the ONNX Runtime environment under `name`
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_initializer(name, commit_environment)
    }

    pub(crate) fn with_initializer(name: impl Into<String>, initializer: Initializer) -> Self {
        Self {
            name: name.into(),
            state: Arc::new(OnceLock::new()),
            initializer,
        }
    }

    /// Initialize on the blocking pool. Later calls return the first outcome.
    pub async fn init(&self) -> Result<RuntimeInfo, ModelLoadError> {
        let handle = self.clone();
        task::spawn_blocking(move || handle.init_blocking())
            .await
            .map_err(|e| ModelLoadError::Join(e.to_string()))?
    }

    /// Blocking variant; waits if another thread is initializing right now
    pub fn init_blocking(&self) -> Result<RuntimeInfo, ModelLoadError> {
        self.state
            .get_or_init(|| (self.initializer)(&self.name))
            .clone()
    }

    #[cfg(test)]
    pub fn is_initialized(&self) -> bool {
        matches!(self.state.get(), Some(Ok(_)))
    }
}

impl fmt::Debug for RuntimeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuntimeHandle")
            .field("name", &self.name)
            .field("state", &self.state.get())
            .finish()
    }
}

/// Commit the global ORT environment and probe it with a session builder
fn commit_environment(name: &str) -> Result<RuntimeInfo, ModelLoadError> {
    check_commit(name, ort::init().with_name(name).commit())?;

    Session::builder().map_err(|e| ModelLoadError::Runtime(e.to_string()))?;

    info!("🧮 ONNX Runtime ready ({})", name);
    Ok(RuntimeInfo {
        name: name.to_string(),
    })
}

/// `Ok(false)` means an environment was already committed in this process
fn check_commit<E: fmt::Display>(
    name: &str,
    committed: Result<bool, E>,
) -> Result<(), ModelLoadError> {
    match committed {
        Ok(true) => Ok(()),
        Ok(false) => {
            debug!("ONNX Runtime environment already committed, reusing it for {}", name);
            Ok(())
        }
        Err(e) => Err(ModelLoadError::Runtime(e.to_string())),
    }
}
