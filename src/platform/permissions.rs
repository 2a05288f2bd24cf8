//! Capability gateway
//!
//! Asks the user for OS-gated capabilities and remembers each decision for the
//! rest of the process. Prompts block, so they run on the blocking pool.

use rfd::{MessageButtons, MessageDialog, MessageDialogResult, MessageLevel};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::task;
use tracing::{info, warn};

use crate::error::CapabilityError;
use crate::state::data::{Capability, PermissionState};

/// Something that can decide whether a capability is granted
pub trait CapabilityGateway: Send + Sync {
    /// Prompt (if not already decided) and return the decision
    fn request(&self, capability: Capability) -> Result<PermissionState, CapabilityError>;
}

/// Request a capability without blocking the UI thread.
///
/// Never fails: a prompt error, a join error or an undecided answer all count
/// as `Denied`.
pub async fn request_capability(
    gateway: Arc<dyn CapabilityGateway>,
    capability: Capability,
) -> PermissionState {
    let decision = task::spawn_blocking(move || gateway.request(capability)).await;

    let state = match decision {
        Ok(Ok(PermissionState::Unknown)) => PermissionState::Denied,
        Ok(Ok(state)) => state,
        Ok(Err(e)) => {
            warn!("⚠️  {}", e);
            PermissionState::Denied
        }
        Err(e) => {
            warn!("⚠️  Permission task for {} failed: {}", capability.label(), e);
            PermissionState::Denied
        }
    };

    info!("🔐 {} permission: {:?}", capability.label(), state);
    state
}

/// Gateway backed by native yes/no dialogs
pub struct DialogGateway {
    decisions: Mutex<HashMap<Capability, PermissionState>>,
}

impl DialogGateway {
    /// Create a gateway; `pre_granted` capabilities never show a prompt
    pub fn new(pre_granted: &[Capability]) -> Self {
        let decisions = pre_granted
            .iter()
            .map(|capability| (*capability, PermissionState::Granted))
            .collect();

        Self {
            decisions: Mutex::new(decisions),
        }
    }

    fn prompt(capability: Capability) -> PermissionState {
        let answer = MessageDialog::new()
            .set_level(MessageLevel::Info)
            .set_title(format!("Allow {} access?", capability.label()))
            .set_description(capability.rationale())
            .set_buttons(MessageButtons::YesNo)
            .show();

        if matches!(answer, MessageDialogResult::Yes) {
            PermissionState::Granted
        } else {
            PermissionState::Denied
        }
    }
}

impl CapabilityGateway for DialogGateway {
    fn request(&self, capability: Capability) -> Result<PermissionState, CapabilityError> {
        // Held across the prompt so two requests never show two dialogs
        let mut decisions = self.decisions.lock().map_err(|_| CapabilityError::Prompt {
            capability,
            message: "decision table lock poisoned".to_string(),
        })?;

        if let Some(state) = decisions.get(&capability) {
            return Ok(*state);
        }

        let state = Self::prompt(capability);
        decisions.insert(capability, state);
        Ok(state)
    }
}

impl std::fmt::Debug for DialogGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DialogGateway").finish_non_exhaustive()
    }
}
