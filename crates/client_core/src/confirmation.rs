//! Stand-ins for the remote service that confirms optimistic mutations.

use std::{collections::VecDeque, sync::Mutex as StdMutex, time::Duration};

use async_trait::async_trait;
use rand::{rngs::StdRng, Rng, SeedableRng};
use shared::{
    domain::{ColumnId, Task, TaskId},
    error::OperationFailed,
    protocol::{ConfirmationRequest, DeleteReceipt, MoveReceipt, MutationKind},
};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::RemoteConfirmation;

pub const DEFAULT_MIN_DELAY: Duration = Duration::from_millis(1000);
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_millis(2000);
pub const DEFAULT_FAILURE_PROBABILITY: f64 = 0.2;

/// Delay window `[min_delay, max_delay)` and failure rate shared by every
/// mutation kind.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RemoteProfile {
    pub min_delay: Duration,
    pub max_delay: Duration,
    pub failure_probability: f64,
}

impl Default for RemoteProfile {
    fn default() -> Self {
        Self {
            min_delay: DEFAULT_MIN_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            failure_probability: DEFAULT_FAILURE_PROBABILITY,
        }
    }
}

/// Randomised remote: waits a uniform delay, then fails with the profile's
/// probability.
pub struct SimulatedRemote {
    profile: RemoteProfile,
    rng: StdMutex<StdRng>,
}

impl SimulatedRemote {
    pub fn new(profile: RemoteProfile) -> Self {
        Self {
            profile,
            rng: StdMutex::new(StdRng::from_os_rng()),
        }
    }

    /// Reproducible delays and outcomes for a given seed.
    pub fn seeded(profile: RemoteProfile, seed: u64) -> Self {
        Self {
            profile,
            rng: StdMutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    pub fn profile(&self) -> RemoteProfile {
        self.profile
    }

    /// Probabilities outside `0.0..=1.0` (NaN included) fall back to the
    /// default rate.
    fn failure_probability(&self) -> f64 {
        let probability = self.profile.failure_probability;
        if (0.0..=1.0).contains(&probability) {
            probability
        } else {
            warn!(probability, "invalid failure probability; using the default");
            DEFAULT_FAILURE_PROBABILITY
        }
    }

    /// Draws the delay and the outcome for one call.
    fn draw(&self) -> (Duration, bool) {
        let min_ms = duration_ms(self.profile.min_delay);
        let max_ms = duration_ms(self.profile.max_delay);
        let probability = self.failure_probability();

        let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let delay_ms = if max_ms > min_ms {
            rng.random_range(min_ms..max_ms)
        } else {
            min_ms
        };
        (Duration::from_millis(delay_ms), rng.random_bool(probability))
    }

    async fn settle(&self, kind: MutationKind) -> Result<(), OperationFailed> {
        let (delay, fail) = self.draw();
        debug!(kind = kind.as_str(), delay_ms = duration_ms(delay), fail, "simulated confirmation");
        tokio::time::sleep(delay).await;
        if fail {
            return Err(OperationFailed::unavailable(kind));
        }
        Ok(())
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[async_trait]
impl RemoteConfirmation for SimulatedRemote {
    async fn add_task(&self, _column_id: &ColumnId, task: &Task) -> Result<Task, OperationFailed> {
        self.settle(MutationKind::Add).await?;
        Ok(task.clone())
    }

    async fn move_task(
        &self,
        task_id: &TaskId,
        from_column: &ColumnId,
        to_column: &ColumnId,
    ) -> Result<MoveReceipt, OperationFailed> {
        self.settle(MutationKind::Move).await?;
        Ok(MoveReceipt {
            task_id: task_id.clone(),
            from_column: from_column.clone(),
            to_column: to_column.clone(),
        })
    }

    async fn delete_task(
        &self,
        task_id: &TaskId,
        column_id: &ColumnId,
    ) -> Result<DeleteReceipt, OperationFailed> {
        self.settle(MutationKind::Delete).await?;
        Ok(DeleteReceipt {
            task_id: task_id.clone(),
            column_id: column_id.clone(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptedOutcome {
    Succeed,
    /// The remote could not be reached.
    Fail,
    /// The remote answered and refused the mutation.
    Reject,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScriptStep {
    pub outcome: ScriptedOutcome,
    pub delay: Duration,
}

/// Deterministic remote. Each call consumes the next scripted step, in call
/// order; once the script runs out the fallback outcome and delay apply.
pub struct ScriptedRemote {
    fallback: ScriptStep,
    script: Mutex<VecDeque<ScriptStep>>,
    requests: Mutex<Vec<ConfirmationRequest>>,
}

impl ScriptedRemote {
    pub fn new(outcome: ScriptedOutcome, delay: Duration) -> Self {
        Self {
            fallback: ScriptStep { outcome, delay },
            script: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn succeeding() -> Self {
        Self::new(ScriptedOutcome::Succeed, Duration::ZERO)
    }

    pub fn failing() -> Self {
        Self::new(ScriptedOutcome::Fail, Duration::ZERO)
    }

    pub fn with_steps(self, steps: impl IntoIterator<Item = ScriptStep>) -> Self {
        Self {
            script: Mutex::new(steps.into_iter().collect()),
            ..self
        }
    }

    pub async fn push_step(&self, outcome: ScriptedOutcome, delay: Duration) {
        self.script
            .lock()
            .await
            .push_back(ScriptStep { outcome, delay });
    }

    /// Every request received so far, in call order.
    pub async fn requests(&self) -> Vec<ConfirmationRequest> {
        self.requests.lock().await.clone()
    }

    async fn settle(&self, request: ConfirmationRequest) -> Result<(), OperationFailed> {
        let kind = request.kind();
        self.requests.lock().await.push(request);
        let step = self
            .script
            .lock()
            .await
            .pop_front()
            .unwrap_or(self.fallback);

        if !step.delay.is_zero() {
            tokio::time::sleep(step.delay).await;
        }
        match step.outcome {
            ScriptedOutcome::Succeed => Ok(()),
            ScriptedOutcome::Fail => Err(OperationFailed::unavailable(kind)),
            ScriptedOutcome::Reject => Err(OperationFailed::rejected(kind)),
        }
    }
}

#[async_trait]
impl RemoteConfirmation for ScriptedRemote {
    async fn add_task(&self, column_id: &ColumnId, task: &Task) -> Result<Task, OperationFailed> {
        self.settle(ConfirmationRequest::AddTask {
            column_id: column_id.clone(),
            task: task.clone(),
        })
        .await?;
        Ok(task.clone())
    }

    async fn move_task(
        &self,
        task_id: &TaskId,
        from_column: &ColumnId,
        to_column: &ColumnId,
    ) -> Result<MoveReceipt, OperationFailed> {
        self.settle(ConfirmationRequest::MoveTask {
            task_id: task_id.clone(),
            from_column: from_column.clone(),
            to_column: to_column.clone(),
        })
        .await?;
        Ok(MoveReceipt {
            task_id: task_id.clone(),
            from_column: from_column.clone(),
            to_column: to_column.clone(),
        })
    }

    async fn delete_task(
        &self,
        task_id: &TaskId,
        column_id: &ColumnId,
    ) -> Result<DeleteReceipt, OperationFailed> {
        self.settle(ConfirmationRequest::DeleteTask {
            task_id: task_id.clone(),
            column_id: column_id.clone(),
        })
        .await?;
        Ok(DeleteReceipt {
            task_id: task_id.clone(),
            column_id: column_id.clone(),
        })
    }
}

#[cfg(test)]
#[path = "tests/confirmation_tests.rs"]
mod tests;
