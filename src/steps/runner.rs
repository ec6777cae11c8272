use std::sync::Arc;

use tokio::sync::mpsc;

use super::StepRef;
use crate::error::StepError;

/// Runs one step tree and reports its single terminal outcome.
///
/// The tree runs on its own task; the outcome is written to the caller's
/// capacity-1 channel and also returned, so composition under `Serial`
/// sees the failure rather than a silent success.
pub struct ActionRunner {
    step: StepRef,
}

impl ActionRunner {
    pub fn new(step: StepRef) -> Self {
        Self { step }
    }

    pub async fn perform(
        &self,
        outcome: mpsc::Sender<Result<(), StepError>>,
    ) -> Result<(), StepError> {
        let step = Arc::clone(&self.step);
        let result = match tokio::spawn(async move { step.perform().await }).await {
            Ok(res) => res,
            Err(_) => Err(StepError::failed("step tree panicked")),
        };

        if let Err(err) = &result {
            tracing::debug!(error = %err, "action finished with error");
        }

        let _ = outcome.try_send(result.clone());
        result
    }

    pub fn cancel(&self) {
        self.step.cancel();
    }

    /// Present for symmetry with other action kinds; nothing to release.
    pub fn cleanup(&self) {}
}
