// ABOUTME: Ordered multi-step transactions with automatic reverse rollback.
// ABOUTME: Step lifecycle is an explicit state machine; outcomes are data, not errors.

use futures::FutureExt;
use futures::future::BoxFuture;

type ExecuteFn<T> = Box<dyn FnOnce() -> BoxFuture<'static, Result<T, anyhow::Error>> + Send>;
type RollbackFn<T> = Box<dyn FnOnce(T) -> BoxFuture<'static, Result<(), anyhow::Error>> + Send>;

/// Lifecycle of a single step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StepState {
    Pending,
    Executing,
    Succeeded,
    Failed,
}

/// One step of a transaction: a named execute action and an optional
/// compensating rollback.
///
/// The rollback receives the value the execute action produced, so it can
/// undo exactly what was done.
pub struct Step<T> {
    name: String,
    execute: Option<ExecuteFn<T>>,
    rollback: Option<RollbackFn<T>>,
    state: StepState,
}

impl<T> Step<T> {
    /// Create a step with no rollback. Steps without a rollback are skipped
    /// during unwind.
    pub fn new<F, Fut>(name: impl Into<String>, execute: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, anyhow::Error>> + Send + 'static,
    {
        Self {
            name: name.into(),
            execute: Some(Box::new(move || execute().boxed())),
            rollback: None,
            state: StepState::Pending,
        }
    }

    /// Attach a compensating rollback to this step.
    pub fn with_rollback<F, Fut>(mut self, rollback: F) -> Self
    where
        F: FnOnce(T) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), anyhow::Error>> + Send + 'static,
    {
        self.rollback = Some(Box::new(move |value| rollback(value).boxed()));
        self
    }

    /// The step's name, used in failure reporting.
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Result of running a transaction. Never surfaced as an `Err` - callers
/// inspect the variant.
#[derive(Debug)]
pub enum TransactionOutcome<T> {
    /// Every step succeeded. Results are in step order.
    Committed { results: Vec<T> },
    /// A step failed and the preceding steps were rolled back.
    RolledBack {
        /// Name of the step whose execute action failed.
        failed_at: String,
        /// The failure itself.
        error: anyhow::Error,
        /// Errors raised by rollbacks during the unwind. A rollback failure
        /// does not stop the remaining rollbacks from running.
        rollback_errors: Vec<anyhow::Error>,
    },
}

impl<T> TransactionOutcome<T> {
    /// Whether every step succeeded.
    pub fn is_committed(&self) -> bool {
        matches!(self, TransactionOutcome::Committed { .. })
    }

    /// The step results, if the transaction committed.
    pub fn into_results(self) -> Option<Vec<T>> {
        match self {
            TransactionOutcome::Committed { results } => Some(results),
            TransactionOutcome::RolledBack { .. } => None,
        }
    }
}

/// An ordered list of steps executed strictly sequentially.
///
/// On the first failing step, execution stops and every step that already
/// succeeded is rolled back in reverse order of execution.
pub struct Transaction<T> {
    steps: Vec<Step<T>>,
}

impl<T> Default for Transaction<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Transaction<T> {
    /// Create an empty transaction.
    pub fn new() -> Self {
        Self { steps: Vec::new() }
    }

    /// Register the next step. Steps run in registration order.
    pub fn add_step(&mut self, step: Step<T>) -> &mut Self {
        self.steps.push(step);
        self
    }

    /// Number of registered steps.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether no steps are registered.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Execute all steps.
    ///
    /// Steps never overlap: each execute action is awaited to completion
    /// before the next starts. Later steps are never started once one fails.
    pub async fn run(mut self) -> TransactionOutcome<T> {
        let mut outputs: Vec<Option<T>> = Vec::with_capacity(self.steps.len());
        outputs.resize_with(self.steps.len(), || None);

        let mut failure: Option<(String, anyhow::Error)> = None;

        for (idx, step) in self.steps.iter_mut().enumerate() {
            let Some(execute) = step.execute.take() else {
                continue;
            };
            step.state = StepState::Executing;

            match execute().await {
                Ok(value) => {
                    step.state = StepState::Succeeded;
                    outputs[idx] = Some(value);
                }
                Err(error) => {
                    step.state = StepState::Failed;
                    tracing::warn!(
                        step = %step.name,
                        error = %error,
                        "transaction step failed, rolling back"
                    );
                    failure = Some((step.name.clone(), error));
                    break;
                }
            }
        }

        let Some((failed_at, error)) = failure else {
            let results = outputs.into_iter().flatten().collect();
            return TransactionOutcome::Committed { results };
        };

        let mut rollback_errors = Vec::new();
        for idx in (0..self.steps.len()).rev() {
            let step = &mut self.steps[idx];
            if step.state != StepState::Succeeded {
                continue;
            }
            let Some(rollback) = step.rollback.take() else {
                continue;
            };
            let Some(value) = outputs[idx].take() else {
                continue;
            };

            if let Err(e) = rollback(value).await {
                tracing::error!(step = %step.name, error = %e, "rollback failed");
                rollback_errors.push(e);
            }
        }

        TransactionOutcome::RolledBack {
            failed_at,
            error,
            rollback_errors,
        }
    }
}

/// Run `steps` as a one-shot transaction.
pub async fn execute_transaction<T>(steps: Vec<Step<T>>) -> TransactionOutcome<T> {
    let mut transaction = Transaction::new();
    for step in steps {
        transaction.add_step(step);
    }
    transaction.run().await
}
