#![forbid(unsafe_code)]
#![doc = include_str!("../README.md")]

mod define;
mod error;
mod executor;
mod function;
mod hash;
mod plan;
mod quantity;
mod scheme;
#[cfg(test)]
mod testing;
mod utils;

pub use crate::define::{Definition, DefinitionBuilder};
pub use crate::error::*;
pub use crate::executor::{
    Diagnostics, ExecutionMode, Executor, ExecutorOptions, ExecutorState, StageExecution,
};
pub use crate::function::{Container, Function, FunctionDefinition, FunctionResult, Scheme};
pub use crate::hash::{Hash32, HashBuilder};
pub use crate::plan::{
    DuplicatePolicy, ExecutionPlan, PlannedData, Planner, PlannerOptions, ProxyData, Stage,
};
pub use crate::quantity::Quantity;
pub use crate::scheme::{DataContainer, DataScheme, Payload, TypedScheme};
#[cfg(feature = "logging")]
pub use crate::utils::init_logging;
