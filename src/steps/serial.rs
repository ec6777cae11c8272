use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::{Step, StepRef};
use crate::error::StepError;

/// Performs children in order, stopping at the first failure.
///
/// On external cancel the currently executing child is cancelled and its
/// result is returned as-is; children that have not started yet never
/// run. No child is retried.
pub struct SerialStep {
    steps: Vec<StepRef>,
    canceled: CancellationToken,
}

impl SerialStep {
    pub fn new(steps: Vec<StepRef>) -> Self {
        Self {
            steps,
            canceled: CancellationToken::new(),
        }
    }
}

#[async_trait]
impl Step for SerialStep {
    async fn perform(&self) -> Result<(), StepError> {
        for step in &self.steps {
            if self.canceled.is_cancelled() {
                return Err(StepError::Canceled);
            }

            let mut attempt = step.perform();
            tokio::select! {
                res = &mut attempt => res?,
                _ = self.canceled.cancelled() => {
                    step.cancel();
                    return attempt.await;
                }
            }
        }
        Ok(())
    }

    fn cancel(&self) {
        self.canceled.cancel();
    }
}
