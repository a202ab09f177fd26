use std::sync::Arc;

use crate::error::SchemeError;
use crate::hash::{Hash32, HashBuilder};
use crate::scheme::{DataContainer, DataScheme};

/// Shared, type-erased data container.
pub type Container = Arc<dyn DataContainer>;

/// Shared, type-erased data scheme.
pub type Scheme = Arc<dyn DataScheme>;

/// Result of user function code.
pub type FunctionResult<T> = anyhow::Result<T>;

/// Static, side-effect-free description of a computation.
///
/// A definition is what gets planned. It declares the schemes it consumes,
/// derives the schemes it produces from the schemes actually wired into it,
/// and hands out a fresh [`Function`] for every stage that is executed.
///
/// `config_hash` must be deterministic: two definitions configured alike must
/// return the same bytes, and definitions configured differently must not.
/// The planner relies on it for deduplication.
pub trait FunctionDefinition: Send + Sync {
    /// Logical name of the kind of computation, e.g. `"windowing"`.
    fn identifier(&self) -> &str;

    /// Digest over this definition's configuration parameters.
    fn config_hash(&self) -> Hash32;

    /// Identity of the definition independent of its position in a plan.
    fn identifying_hash(&self) -> Hash32 {
        HashBuilder::new()
            .str(self.identifier())
            .update(self.config_hash())
            .digest()
    }

    /// Scheme expected for each positional argument, empty for sources.
    fn consumes(&self) -> Vec<Scheme>;

    /// Concrete output schemes for the given input schemes. Called once per
    /// planned stage.
    fn produces(&self, inputs: &[Scheme]) -> Result<Vec<Scheme>, SchemeError>;

    /// A new, independent execution unit. Never returns a shared instance.
    fn new_function(&self) -> Box<dyn Function>;
}

/// One concrete execution of a [`FunctionDefinition`].
///
/// The executor calls [`set_input`](Function::set_input) and then
/// [`execute`](Function::execute), which consumes the instance.
pub trait Function: Send {
    /// Stores the inputs for the upcoming execution. Sources receive an empty
    /// vector. Implementations should not validate here and may assume they
    /// own the inputs exclusively.
    fn set_input(&mut self, inputs: Vec<Container>) -> FunctionResult<()>;

    /// Optional, advisory input check. Only called when the executor is
    /// configured to do so.
    fn validate_input(&self) -> bool {
        true
    }

    /// Runs the computation. `None` is equivalent to no outputs.
    fn execute(self: Box<Self>) -> FunctionResult<Option<Vec<Container>>>;
}
