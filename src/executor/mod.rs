mod diagnostics;

use std::collections::HashMap;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::Level;
use tracing_indicatif::span_ext::IndicatifSpanExt;

use crate::error::{ExecutionError, SchemeError};
use crate::function::Container;
use crate::hash::Hash32;
use crate::plan::{ExecutionPlan, ProxyData, Stage};

pub use diagnostics::{Diagnostics, StageExecution};

/// How stages are scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// One stage after another, in depth order.
    #[default]
    Sequential,
    /// Stages of equal depth run concurrently on the rayon thread pool. Falls
    /// back to sequential execution without the `parallel` feature.
    Parallel,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorOptions {
    pub mode: ExecutionMode,
    /// Call [`Function::validate_input`](crate::Function::validate_input)
    /// before executing every stage.
    pub validate_inputs: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutorState {
    Idle,
    Completed,
    Failed,
}

/// Runs an [`ExecutionPlan`] and keeps every computed container.
///
/// An executor runs its plan once. Stages are executed in depth order, each
/// with a fresh [`Function`](crate::Function) instance, and their outputs are
/// cached under the hash of the planned data they fulfil.
///
/// On failure, outputs of stages that completed before the failing one stay
/// available; throw the executor away if you need all-or-nothing behaviour.
#[derive(Debug)]
pub struct Executor {
    plan: ExecutionPlan,
    options: ExecutorOptions,
    state: ExecutorState,
    data: HashMap<Hash32, Container>,
    diagnostics: Diagnostics,
}

impl Executor {
    pub fn new(plan: ExecutionPlan) -> Self {
        Self::with_options(plan, ExecutorOptions::default())
    }

    pub fn with_options(plan: ExecutionPlan, options: ExecutorOptions) -> Self {
        Self {
            plan,
            options,
            state: ExecutorState::Idle,
            data: HashMap::new(),
            diagnostics: Diagnostics::default(),
        }
    }

    pub fn plan(&self) -> &ExecutionPlan {
        &self.plan
    }

    pub fn state(&self) -> ExecutorState {
        self.state
    }

    /// Every computed container, keyed by planned data hash.
    pub fn data(&self) -> &HashMap<Hash32, Container> {
        &self.data
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn has_computed(&self, proxy: &ProxyData) -> bool {
        self.data.contains_key(&proxy.calculated_hash())
    }

    pub fn get(&self, proxy: &ProxyData) -> Option<Container> {
        self.data.get(&proxy.calculated_hash()).cloned()
    }

    /// Executes the whole plan.
    ///
    /// The first failing stage aborts the run. Calling this again after a
    /// run, successful or not, fails with [`ExecutionError::AlreadyExecuted`]
    /// and leaves the cache untouched.
    pub fn execute(&mut self) -> Result<(), ExecutionError> {
        if self.state != ExecutorState::Idle {
            return Err(ExecutionError::AlreadyExecuted);
        }

        let total = self.plan.len() as u64;
        let root_span = tracing::span!(Level::INFO, "executing_plan", stages = total);
        root_span.pb_set_style(&crate::utils::get_style_plan());
        root_span.pb_set_length(total);
        root_span.pb_set_message("Executing stages...");
        let _enter = root_span.enter();

        let mut run = Run {
            plan: &self.plan,
            validate: self.options.validate_inputs,
            data: &mut self.data,
            diagnostics: &mut self.diagnostics,
            span: &root_span,
        };

        let result = match self.options.mode {
            ExecutionMode::Sequential => run.sequential(),
            #[cfg(feature = "parallel")]
            ExecutionMode::Parallel => run.parallel(),
            #[cfg(not(feature = "parallel"))]
            ExecutionMode::Parallel => {
                tracing::warn!("built without the `parallel` feature, running sequentially");
                run.sequential()
            }
        };

        match &result {
            Ok(()) => {
                self.state = ExecutorState::Completed;
                tracing::info!(outputs = self.data.len(), "Execution complete!");
            }
            Err(err) => {
                self.state = ExecutorState::Failed;
                tracing::error!("{err}");
            }
        }

        result
    }
}

/// Mutable state of a single `execute` call.
struct Run<'a> {
    plan: &'a ExecutionPlan,
    validate: bool,
    data: &'a mut HashMap<Hash32, Container>,
    diagnostics: &'a mut Diagnostics,
    span: &'a tracing::Span,
}

impl Run<'_> {
    fn sequential(&mut self) -> Result<(), ExecutionError> {
        for stage in self.plan.ordered_stages() {
            let inputs = gather(stage, self.data)?;

            let start = Instant::now();
            let outputs = run_stage(stage, inputs, self.validate);
            self.diagnostics.record(stage.calculated_hash(), start, start.elapsed());

            commit(stage, outputs?, self.data);
            self.span.pb_inc(1);
        }

        Ok(())
    }

    /// Levels the plan by depth and runs every level on the rayon pool. A
    /// level is committed in hash order once all of its stages returned, so
    /// no stage ever reads data produced within its own level.
    #[cfg(feature = "parallel")]
    fn parallel(&mut self) -> Result<(), ExecutionError> {
        use rayon::iter::{IntoParallelIterator, ParallelIterator};

        let ordered = self.plan.ordered_stages();

        for level in ordered.chunk_by(|a, b| a.depth() == b.depth()) {
            let jobs = level
                .iter()
                .map(|stage| Ok((*stage, gather(stage, self.data)?)))
                .collect::<Result<Vec<_>, ExecutionError>>()?;

            let validate = self.validate;
            let results: Vec<_> = jobs
                .into_par_iter()
                .map(|(stage, inputs)| {
                    let start = Instant::now();
                    let outputs = run_stage(stage, inputs, validate);
                    (outputs, start, start.elapsed())
                })
                .collect();

            for (stage, (outputs, start, duration)) in level.iter().zip(results) {
                self.diagnostics.record(stage.calculated_hash(), start, duration);
                commit(stage, outputs?, self.data);
                self.span.pb_inc(1);
            }
        }

        Ok(())
    }
}

/// Collects the inputs of `stage` from the cache. Depth ordering guarantees
/// they are present for plans built by a planner.
fn gather(stage: &Stage, data: &HashMap<Hash32, Container>) -> Result<Vec<Container>, ExecutionError> {
    stage
        .data_in()
        .iter()
        .map(|input| {
            data.get(&input.calculated_hash())
                .cloned()
                .ok_or_else(|| ExecutionError::MissingInput {
                    identifier: stage.identifier().to_string(),
                    hash: input.calculated_hash(),
                })
        })
        .collect()
}

/// Runs one stage on a fresh function instance and checks its outputs
/// against the plan. Touches no shared state.
fn run_stage(
    stage: &Stage,
    inputs: Vec<Container>,
    validate: bool,
) -> Result<Vec<Container>, ExecutionError> {
    let identifier = stage.identifier();
    let span = tracing::span!(
        Level::INFO,
        "stage",
        id = identifier,
        hash = %stage.calculated_hash().short()
    );
    let _enter = span.enter();

    let mut function = stage.definition().new_function();

    function
        .set_input(inputs)
        .map_err(|source| ExecutionError::FunctionInput {
            identifier: identifier.to_string(),
            source,
        })?;

    if validate && !function.validate_input() {
        return Err(ExecutionError::FunctionInput {
            identifier: identifier.to_string(),
            source: anyhow::anyhow!("input validation failed"),
        });
    }

    // A panicking function is reported like a failing one instead of tearing
    // down the executor.
    let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| function.execute()));

    let outputs = match outcome {
        Ok(result) => result,
        Err(panic) => Err(anyhow::anyhow!(panic_message(panic.as_ref()))),
    }
    .map_err(|source| ExecutionError::FunctionExecution {
        identifier: identifier.to_string(),
        source,
    })?
    .unwrap_or_default();

    if outputs.len() != stage.data_out().len() {
        return Err(ExecutionError::ReturnCountMismatch {
            identifier: identifier.to_string(),
            expected: stage.data_out().len(),
            actual: outputs.len(),
        });
    }

    for (position, (planned, output)) in stage.data_out().iter().zip(&outputs).enumerate() {
        let verdict = match planned.schema().verify(output.as_ref()) {
            Ok(true) => Ok(()),
            Ok(false) => Err(SchemeError::Rejected),
            Err(err) => Err(err),
        };

        verdict.map_err(|source| ExecutionError::SchemeConformity {
            identifier: identifier.to_string(),
            position,
            source,
        })?;
    }

    tracing::debug!(outputs = outputs.len(), "stage finished");
    Ok(outputs)
}

fn commit(stage: &Stage, outputs: Vec<Container>, data: &mut HashMap<Hash32, Container>) {
    for (planned, output) in stage.data_out().iter().zip(outputs) {
        data.insert(planned.calculated_hash(), output);
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("Function panicked: {s}")
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("Function panicked: {s}")
    } else {
        String::from("Function panicked with unknown payload")
    }
}
