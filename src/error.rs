use thiserror::Error;

use crate::Hash32;

/// Failure reported by a [`DataScheme`](crate::DataScheme).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SchemeError {
    /// The consuming scheme cannot accept the produced scheme.
    #[error("incompatible data scheme: {0}")]
    Incompatible(String),

    /// A container does not match the shape declared by a scheme.
    #[error("data does not conform to scheme: {0}")]
    Conformity(String),

    /// The scheme answered `false` without giving a reason.
    #[error("rejected by data scheme")]
    Rejected,
}

impl SchemeError {
    pub fn incompatible(message: impl Into<String>) -> Self {
        Self::Incompatible(message.into())
    }

    pub fn conformity(message: impl Into<String>) -> Self {
        Self::Conformity(message.into())
    }
}

/// Errors raised while adding stages to a [`Planner`](crate::Planner).
///
/// A failed `add` never leaves a partially registered stage behind, the
/// caller can fix the pipeline and keep planning.
#[derive(Debug, Error)]
pub enum PlanningError {
    #[error("Argument at position {position} with hash {hash} is not part of this plan")]
    UnresolvedReference { position: usize, hash: Hash32 },

    #[error("Function '{identifier}' expects {expected} argument(s), got {actual}")]
    ArgumentCount {
        identifier: String,
        expected: usize,
        actual: usize,
    },

    #[error("Function '{identifier}': argument at position {position} has an incompatible scheme")]
    ArgumentSchema {
        identifier: String,
        position: usize,
        #[source]
        source: SchemeError,
    },

    #[error("Function '{identifier}' with the same inputs is already planned as stage {hash}")]
    DuplicateStage { identifier: String, hash: Hash32 },

    #[error("Source function '{identifier}' must not consume any data, declares {consumes} input(s)")]
    SourceHasInputs { identifier: String, consumes: usize },

    #[error("Function '{identifier}' could not derive its output schemes")]
    Production {
        identifier: String,
        #[source]
        source: SchemeError,
    },
}

/// Errors raised by an [`Executor`](crate::Executor).
///
/// All of them abort the current execution, stages committed before the
/// failure stay in the cache.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("Executor has already run its plan")]
    AlreadyExecuted,

    #[error("Stage '{identifier}': input {hash} has not been computed")]
    MissingInput { identifier: String, hash: Hash32 },

    #[error("Stage '{identifier}': failed to set input of function")]
    FunctionInput {
        identifier: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Stage '{identifier}': function failed to execute")]
    FunctionExecution {
        identifier: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Stage '{identifier}': function returned {actual} output(s), expected {expected}")]
    ReturnCountMismatch {
        identifier: String,
        expected: usize,
        actual: usize,
    },

    #[error("Stage '{identifier}': output at position {position} violates its scheme")]
    SchemeConformity {
        identifier: String,
        position: usize,
        #[source]
        source: SchemeError,
    },
}

/// Consistency problems found by [`ExecutionPlan::check`](crate::ExecutionPlan::check).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PlanError {
    #[error("Stage {stage} references data {data} which is not part of the plan")]
    DanglingData { stage: Hash32, data: Hash32 },

    #[error("Data {data} claims to be produced by stage {stage} which is not part of the plan")]
    DanglingProducer { data: Hash32, stage: Hash32 },

    #[error("Plan contains a cycle through stage {0}")]
    Cycle(Hash32),
}

#[derive(Debug, Error)]
pub enum HashflowError {
    #[error("Error while planning:\n{0}")]
    Planning(#[from] PlanningError),

    #[error("Error while executing the plan:\n{0}")]
    Execution(#[from] ExecutionError),

    #[error("Inconsistent plan:\n{0}")]
    Plan(#[from] PlanError),
}
