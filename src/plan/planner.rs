use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{PlanningError, SchemeError};
use crate::function::FunctionDefinition;
use crate::hash::Hash32;
use crate::plan::{ExecutionPlan, PlannedData, ProxyData, Stage};

/// What to do when a stage with an already planned hash is added again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Fail with [`PlanningError::DuplicateStage`].
    #[default]
    Reject,
    /// Hand out the proxies of the stage that is already planned.
    Reuse,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerOptions {
    pub duplicates: DuplicatePolicy,
}

/// Builds an [`ExecutionPlan`] one stage at a time.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use hashflow::{Container, Definition, Payload, Planner, TypedScheme};
///
/// let source = Definition::named("constant")
///     .produces(TypedScheme::<u32>::new())
///     .run(|_| Ok(vec![Arc::new(Payload::new(21u32)) as Container]));
///
/// let double = Definition::named("double")
///     .consumes(TypedScheme::<u32>::new())
///     .produces(TypedScheme::<u32>::new())
///     .run(|inputs| {
///         let value = inputs[0].downcast_ref::<Payload<u32>>().unwrap().data();
///         Ok(vec![Arc::new(Payload::new(value * 2)) as Container])
///     });
///
/// let mut planner = Planner::new();
/// let constant = planner.add_source(Arc::new(source))?;
/// let doubled = planner.add(Arc::new(double), &constant)?;
///
/// assert_eq!(constant[0].depth(), 0);
/// assert_eq!(doubled[0].depth(), 1);
/// assert_eq!(planner.get_plan().len(), 2);
/// # Ok::<(), hashflow::PlanningError>(())
/// ```
#[derive(Debug, Default)]
pub struct Planner {
    options: PlannerOptions,
    stages: HashMap<Hash32, Arc<Stage>>,
    data: HashMap<Hash32, Arc<PlannedData>>,
}

impl Planner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: PlannerOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    pub fn options(&self) -> &PlannerOptions {
        &self.options
    }

    /// Adds a function without inputs.
    pub fn add_source(
        &mut self,
        definition: Arc<dyn FunctionDefinition>,
    ) -> Result<Vec<ProxyData>, PlanningError> {
        let consumes = definition.consumes().len();

        if consumes > 0 {
            tracing::warn!(id = definition.identifier(), "source declares inputs");
            return Err(PlanningError::SourceHasInputs {
                identifier: definition.identifier().to_string(),
                consumes,
            });
        }

        self.add(definition, &[])
    }

    /// Plans `definition` applied to `inputs` and returns a token for every
    /// output, in position order.
    ///
    /// Nothing is registered unless every check passes.
    pub fn add(
        &mut self,
        definition: Arc<dyn FunctionDefinition>,
        inputs: &[ProxyData],
    ) -> Result<Vec<ProxyData>, PlanningError> {
        let result = self.try_add(definition.as_ref(), inputs).map(|data_in| {
            let hash = Stage::hash_for(definition.config_hash(), &data_in);
            (data_in, hash)
        });

        let (data_in, hash) = match result {
            Ok(ok) => ok,
            Err(err) => {
                tracing::warn!(id = definition.identifier(), "{err}");
                return Err(err);
            }
        };

        if let Some(existing) = self.stages.get(&hash) {
            return match self.options.duplicates {
                DuplicatePolicy::Reuse => {
                    tracing::debug!(id = definition.identifier(), stage = %hash.short(), "reusing planned stage");
                    Ok(existing.proxies())
                }
                DuplicatePolicy::Reject => {
                    tracing::warn!(id = definition.identifier(), stage = %hash.short(), "stage already planned");
                    Err(PlanningError::DuplicateStage {
                        identifier: definition.identifier().to_string(),
                        hash,
                    })
                }
            };
        }

        let schemes: Vec<_> = data_in.iter().map(|data| data.schema().clone()).collect();
        let produces = match definition.produces(&schemes) {
            Ok(produces) => produces,
            Err(source) => {
                let err = PlanningError::Production {
                    identifier: definition.identifier().to_string(),
                    source,
                };
                tracing::warn!(id = definition.identifier(), "{err}");
                return Err(err);
            }
        };

        let stage = Arc::new(Stage::new(definition, data_in, produces));

        tracing::debug!(
            id = stage.identifier(),
            stage = %stage.calculated_hash().short(),
            depth = stage.depth(),
            outputs = stage.data_out().len(),
            "planned stage"
        );

        for data in stage.data_out() {
            self.data.insert(data.calculated_hash(), data.clone());
        }

        let proxies = stage.proxies();
        self.stages.insert(stage.calculated_hash(), stage);

        Ok(proxies)
    }

    /// Resolves the inputs and checks them against the definition.
    fn try_add(
        &self,
        definition: &dyn FunctionDefinition,
        inputs: &[ProxyData],
    ) -> Result<Vec<Arc<PlannedData>>, PlanningError> {
        let data_in = inputs
            .iter()
            .enumerate()
            .map(|(position, proxy)| {
                self.data
                    .get(&proxy.calculated_hash())
                    .cloned()
                    .ok_or(PlanningError::UnresolvedReference {
                        position,
                        hash: proxy.calculated_hash(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let consumes = definition.consumes();

        if consumes.len() != data_in.len() {
            return Err(PlanningError::ArgumentCount {
                identifier: definition.identifier().to_string(),
                expected: consumes.len(),
                actual: data_in.len(),
            });
        }

        for (position, (expected, actual)) in consumes.iter().zip(&data_in).enumerate() {
            let verdict = match expected.accepts(actual.schema().as_ref()) {
                Ok(true) => Ok(()),
                Ok(false) => Err(SchemeError::Rejected),
                Err(err) => Err(err),
            };

            verdict.map_err(|source| PlanningError::ArgumentSchema {
                identifier: definition.identifier().to_string(),
                position,
                source,
            })?;
        }

        Ok(data_in)
    }

    /// Snapshot of everything planned so far. The planner stays open.
    pub fn get_plan(&self) -> ExecutionPlan {
        ExecutionPlan::new(self.stages.clone(), self.data.clone())
    }

    /// Whether `proxy` was handed out by this planner.
    pub fn contains(&self, proxy: &ProxyData) -> bool {
        self.data.contains_key(&proxy.calculated_hash())
    }

    /// Number of planned stages.
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}
