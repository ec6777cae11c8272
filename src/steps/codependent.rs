use std::sync::Arc;

use async_trait::async_trait;
use tokio::task::JoinSet;

use super::{Step, StepRef};
use crate::error::StepError;

/// Performs children in parallel; the first child to terminate wins and
/// every sibling is cancelled.
///
/// The result is the winner's outcome, with one refinement: when the
/// winner succeeded, sibling errors from the cancel cascade are
/// suppressed, while sibling errors that are *not* cancel-attributable
/// surface as a composite error.
pub struct CodependentStep {
    steps: Vec<StepRef>,
}

impl CodependentStep {
    pub fn new(steps: Vec<StepRef>) -> Self {
        Self { steps }
    }
}

#[async_trait]
impl Step for CodependentStep {
    async fn perform(&self) -> Result<(), StepError> {
        if self.steps.is_empty() {
            return Ok(());
        }

        let mut group = JoinSet::new();
        for step in &self.steps {
            let step = Arc::clone(step);
            group.spawn(async move { step.perform().await });
        }

        let winner = match group.join_next().await {
            Some(Ok(outcome)) => outcome,
            Some(Err(_)) => Err(StepError::failed("codependent child panicked")),
            None => return Ok(()),
        };

        // The race is decided; tell everyone else to stop.
        self.cancel();

        let mut collateral = Vec::new();
        while let Some(joined) = group.join_next().await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(err)) if err.is_cancel() => {}
                Ok(Err(err)) => collateral.push(err),
                Err(_) => collateral.push(StepError::failed("codependent child panicked")),
            }
        }

        match winner {
            Err(err) => Err(err),
            Ok(()) if collateral.is_empty() => Ok(()),
            Ok(()) => {
                let mut secondary = collateral;
                let primary = secondary.remove(0);
                if secondary.is_empty() {
                    Err(primary)
                } else {
                    Err(StepError::Aggregate {
                        primary: Box::new(primary),
                        secondary,
                    })
                }
            }
        }
    }

    fn cancel(&self) {
        for step in &self.steps {
            step.cancel();
        }
    }
}
