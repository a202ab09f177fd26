use std::sync::Arc;

use crate::function::{FunctionDefinition, Scheme};
use crate::hash::{Hash32, HashBuilder};

/// A lightweight token representing the *future* result of a stage.
///
/// `ProxyData` is what the planner hands back for every output of a stage.
/// It carries no data and grants no access to the plan internals, it only
/// names a planned output by its content hash. Pass it to
/// [`Planner::add`](crate::Planner::add) to wire stages together, and to
/// [`Executor::get`](crate::Executor::get) to fetch the computed container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProxyData {
    calculated_hash: Hash32,
    depth: usize,
}

impl ProxyData {
    pub fn calculated_hash(&self) -> Hash32 {
        self.calculated_hash
    }

    pub fn depth(&self) -> usize {
        self.depth
    }
}

impl From<&PlannedData> for ProxyData {
    fn from(data: &PlannedData) -> Self {
        Self {
            calculated_hash: data.calculated_hash,
            depth: data.depth,
        }
    }
}

/// A planned, not yet computed output slot of a [`Stage`].
#[derive(Debug)]
pub struct PlannedData {
    schema: Scheme,
    produced_by: Hash32,
    position: usize,
    calculated_hash: Hash32,
    depth: usize,
}

impl PlannedData {
    fn new(stage: Hash32, depth: usize, position: usize, schema: Scheme) -> Self {
        let calculated_hash = HashBuilder::new()
            .int(position as i64)
            .update(stage)
            .digest();

        Self {
            schema,
            produced_by: stage,
            position,
            calculated_hash,
            depth,
        }
    }

    /// The scheme a conforming container must satisfy.
    pub fn schema(&self) -> &Scheme {
        &self.schema
    }

    /// Hash of the producing stage.
    pub fn produced_by(&self) -> Hash32 {
        self.produced_by
    }

    /// Output position within the producing stage.
    pub fn position(&self) -> usize {
        self.position
    }

    pub fn calculated_hash(&self) -> Hash32 {
        self.calculated_hash
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn proxy(&self) -> ProxyData {
        ProxyData::from(self)
    }
}

/// One planned invocation of a [`FunctionDefinition`].
///
/// The stage hash folds the definition's configuration hash with the hashes
/// of all inputs in order, so the same definition applied to the same data
/// always yields the same stage, no matter which objects were used.
pub struct Stage {
    definition: Arc<dyn FunctionDefinition>,
    data_in: Vec<Arc<PlannedData>>,
    data_out: Vec<Arc<PlannedData>>,
    calculated_hash: Hash32,
    depth: usize,
}

impl Stage {
    /// Builds a stage and its outputs from already derived output schemes.
    ///
    /// This does not check the inputs against the definition, the
    /// [`Planner`](crate::Planner) takes care of that.
    pub fn new(
        definition: Arc<dyn FunctionDefinition>,
        data_in: Vec<Arc<PlannedData>>,
        produces: Vec<Scheme>,
    ) -> Self {
        let calculated_hash = Stage::hash_for(definition.config_hash(), &data_in);
        let depth = data_in
            .iter()
            .map(|data| data.depth + 1)
            .max()
            .unwrap_or(0);

        let data_out = produces
            .into_iter()
            .enumerate()
            .map(|(position, schema)| {
                Arc::new(PlannedData::new(calculated_hash, depth, position, schema))
            })
            .collect();

        Self {
            definition,
            data_in,
            data_out,
            calculated_hash,
            depth,
        }
    }

    /// The stage hash for a configuration hash and the inputs, in order.
    pub fn hash_for(config_hash: Hash32, data_in: &[Arc<PlannedData>]) -> Hash32 {
        let mut hasher = HashBuilder::new();
        hasher.update(config_hash);

        for data in data_in {
            hasher.update(data.calculated_hash);
        }

        hasher.digest()
    }

    pub fn definition(&self) -> &Arc<dyn FunctionDefinition> {
        &self.definition
    }

    pub fn identifier(&self) -> &str {
        self.definition.identifier()
    }

    pub fn data_in(&self) -> &[Arc<PlannedData>] {
        &self.data_in
    }

    pub fn data_out(&self) -> &[Arc<PlannedData>] {
        &self.data_out
    }

    pub fn calculated_hash(&self) -> Hash32 {
        self.calculated_hash
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Tokens for every output, in position order.
    pub fn proxies(&self) -> Vec<ProxyData> {
        self.data_out.iter().map(|data| data.proxy()).collect()
    }
}

impl std::fmt::Debug for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stage")
            .field("identifier", &self.identifier())
            .field("calculated_hash", &self.calculated_hash)
            .field("depth", &self.depth)
            .field("data_in", &self.data_in.len())
            .field("data_out", &self.data_out.len())
            .finish()
    }
}
