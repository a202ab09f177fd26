//! Closure-backed function definitions.
//!
//! Implementing [`FunctionDefinition`] and [`Function`] by hand is the way to
//! go for reusable domain functions. For glue code and small stages the
//! [`Definition`] builder wires a closure into both traits:
//!
//! ```rust
//! use std::sync::Arc;
//! use hashflow::{Container, Definition, Payload, TypedScheme};
//!
//! let double = Definition::named("double")
//!     .config(|hash| {
//!         hash.int(2);
//!     })
//!     .consumes(TypedScheme::<Vec<f64>>::new())
//!     .produces(TypedScheme::<Vec<f64>>::new())
//!     .run(|inputs| {
//!         let values = inputs[0]
//!             .downcast_ref::<Payload<Vec<f64>>>()
//!             .ok_or_else(|| anyhow::anyhow!("expected a vector of floats"))?;
//!         let doubled: Vec<f64> = values.data().iter().map(|v| v * 2.0).collect();
//!         Ok(vec![Arc::new(Payload::new(doubled)) as Container])
//!     });
//! ```

use std::borrow::Cow;
use std::sync::Arc;

use crate::error::SchemeError;
use crate::function::{Container, Function, FunctionDefinition, FunctionResult, Scheme};
use crate::hash::{Hash32, HashBuilder};
use crate::scheme::DataScheme;

type RunFn = Arc<dyn Fn(Vec<Container>) -> FunctionResult<Vec<Container>> + Send + Sync>;
type ProduceFn = Arc<dyn Fn(&[Scheme]) -> Result<Vec<Scheme>, SchemeError> + Send + Sync>;
type ValidateFn = Arc<dyn Fn(&[Container]) -> bool + Send + Sync>;

enum Produces {
    Static(Vec<Scheme>),
    Dynamic(ProduceFn),
}

/// A [`FunctionDefinition`] whose computation is a closure.
pub struct Definition {
    identifier: Cow<'static, str>,
    config_hash: Hash32,
    consumes: Vec<Scheme>,
    produces: Produces,
    validate: Option<ValidateFn>,
    run: RunFn,
}

impl Definition {
    /// The entry point of the builder. The identifier is the first feed of
    /// the configuration hash, closures cannot be hashed so the name is what
    /// tells two unconfigured definitions apart.
    pub fn named(identifier: impl Into<Cow<'static, str>>) -> DefinitionBuilder {
        let identifier = identifier.into();
        let mut config = HashBuilder::new();
        config.str(&identifier);

        DefinitionBuilder {
            identifier,
            config,
            consumes: Vec::new(),
            produces: Vec::new(),
            produce_fn: None,
            validate: None,
        }
    }
}

pub struct DefinitionBuilder {
    identifier: Cow<'static, str>,
    config: HashBuilder,
    consumes: Vec<Scheme>,
    produces: Vec<Scheme>,
    produce_fn: Option<ProduceFn>,
    validate: Option<ValidateFn>,
}

impl DefinitionBuilder {
    /// Feeds configuration parameters into the configuration hash, after the
    /// identifier. May be called repeatedly, feeds accumulate in call order.
    pub fn config<F>(mut self, feed: F) -> Self
    where
        F: FnOnce(&mut HashBuilder),
    {
        feed(&mut self.config);
        self
    }

    /// Declares the scheme of the next positional argument.
    pub fn consumes(self, scheme: impl DataScheme) -> Self {
        self.consumes_shared(Arc::new(scheme))
    }

    pub fn consumes_shared(mut self, scheme: Scheme) -> Self {
        self.consumes.push(scheme);
        self
    }

    /// Declares the scheme of the next output, independent of the inputs.
    pub fn produces(mut self, scheme: impl DataScheme) -> Self {
        self.produces.push(Arc::new(scheme));
        self
    }

    /// Derives the output schemes from the input schemes. Takes precedence
    /// over schemes declared with [`produces`](Self::produces).
    pub fn produces_with<F>(mut self, derive: F) -> Self
    where
        F: Fn(&[Scheme]) -> Result<Vec<Scheme>, SchemeError> + Send + Sync + 'static,
    {
        self.produce_fn = Some(Arc::new(derive));
        self
    }

    /// Advisory input check, see [`Function::validate_input`].
    pub fn validate<F>(mut self, check: F) -> Self
    where
        F: Fn(&[Container]) -> bool + Send + Sync + 'static,
    {
        self.validate = Some(Arc::new(check));
        self
    }

    /// Finishes the definition with the computation itself.
    pub fn run<F>(self, callback: F) -> Definition
    where
        F: Fn(Vec<Container>) -> FunctionResult<Vec<Container>> + Send + Sync + 'static,
    {
        let produces = match self.produce_fn {
            Some(derive) => Produces::Dynamic(derive),
            None => Produces::Static(self.produces),
        };

        Definition {
            identifier: self.identifier,
            config_hash: self.config.digest(),
            consumes: self.consumes,
            produces,
            validate: self.validate,
            run: Arc::new(callback),
        }
    }
}

impl FunctionDefinition for Definition {
    fn identifier(&self) -> &str {
        &self.identifier
    }

    fn config_hash(&self) -> Hash32 {
        self.config_hash
    }

    fn consumes(&self) -> Vec<Scheme> {
        self.consumes.clone()
    }

    fn produces(&self, inputs: &[Scheme]) -> Result<Vec<Scheme>, SchemeError> {
        match &self.produces {
            Produces::Static(schemes) => Ok(schemes.clone()),
            Produces::Dynamic(derive) => derive(inputs),
        }
    }

    fn new_function(&self) -> Box<dyn Function> {
        Box::new(ClosureFunction {
            run: self.run.clone(),
            validate: self.validate.clone(),
            inputs: Vec::new(),
        })
    }
}

impl std::fmt::Debug for Definition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Definition")
            .field("identifier", &self.identifier)
            .field("config_hash", &self.config_hash)
            .field("consumes", &self.consumes)
            .finish_non_exhaustive()
    }
}

struct ClosureFunction {
    run: RunFn,
    validate: Option<ValidateFn>,
    inputs: Vec<Container>,
}

impl Function for ClosureFunction {
    fn set_input(&mut self, inputs: Vec<Container>) -> FunctionResult<()> {
        self.inputs = inputs;
        Ok(())
    }

    fn validate_input(&self) -> bool {
        match &self.validate {
            Some(check) => check(&self.inputs),
            None => true,
        }
    }

    fn execute(self: Box<Self>) -> FunctionResult<Option<Vec<Container>>> {
        let outputs = (self.run)(self.inputs)?;
        Ok(Some(outputs))
    }
}
