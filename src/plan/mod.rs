//! Planning: the DAG of stages and the data flowing between them.
//!
//! A [`Planner`] is fed [`FunctionDefinition`](crate::FunctionDefinition)s
//! one at a time. For every definition it checks the wiring, computes the
//! content hash of the new [`Stage`], and returns a [`ProxyData`] token for
//! every output. Tokens are then used as inputs of later stages.
//!
//! ## Content hashes
//!
//! * stage: `config_hash ‖ input_0 ‖ input_1 ‖ …`
//! * data: `position ‖ stage`
//!
//! Nothing in a hash refers to object identity, so re-planning the same
//! pipeline yields the same hashes, and an executor can key its cache by them.
//!
//! ## Depth
//!
//! Sources sit at depth `0`, every other stage one level below its deepest
//! input. Outputs share the depth of their stage. Sorting stages by depth is
//! a valid topological order, which is all the executor needs.

mod planner;
mod stage;

use std::collections::HashMap;
use std::sync::Arc;

use petgraph::Graph;
use petgraph::graph::NodeIndex;

pub use crate::plan::planner::{DuplicatePolicy, Planner, PlannerOptions};
pub use crate::plan::stage::{PlannedData, ProxyData, Stage};

use crate::error::PlanError;
use crate::hash::Hash32;

/// Immutable snapshot of a plan, produced by [`Planner::get_plan`].
///
/// Cloning a plan is cheap, stages and data are shared.
#[derive(Debug, Clone, Default)]
pub struct ExecutionPlan {
    stages: HashMap<Hash32, Arc<Stage>>,
    planned_data: HashMap<Hash32, Arc<PlannedData>>,
}

impl ExecutionPlan {
    /// Builds a plan from raw tables. Nothing is validated, see
    /// [`check`](Self::check).
    pub fn new(
        stages: HashMap<Hash32, Arc<Stage>>,
        planned_data: HashMap<Hash32, Arc<PlannedData>>,
    ) -> Self {
        Self {
            stages,
            planned_data,
        }
    }

    /// Builds a plan from stages, registering every stage output as planned
    /// data. Inputs produced by stages outside of `stages` are not added.
    pub fn from_stages(stages: impl IntoIterator<Item = Arc<Stage>>) -> Self {
        let mut plan = Self::default();

        for stage in stages {
            for data in stage.data_out() {
                plan.planned_data
                    .insert(data.calculated_hash(), data.clone());
            }
            plan.stages.insert(stage.calculated_hash(), stage);
        }

        plan
    }

    pub fn stages(&self) -> &HashMap<Hash32, Arc<Stage>> {
        &self.stages
    }

    pub fn planned_data(&self) -> &HashMap<Hash32, Arc<PlannedData>> {
        &self.planned_data
    }

    pub fn stage(&self, hash: &Hash32) -> Option<&Arc<Stage>> {
        self.stages.get(hash)
    }

    pub fn data(&self, hash: &Hash32) -> Option<&Arc<PlannedData>> {
        self.planned_data.get(hash)
    }

    /// The stage producing the data behind `proxy`.
    pub fn producer_of(&self, proxy: &ProxyData) -> Option<&Arc<Stage>> {
        self.planned_data
            .get(&proxy.calculated_hash())
            .and_then(|data| self.stages.get(&data.produced_by()))
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Stages in execution order: ascending depth, ties broken by hash so the
    /// order is reproducible across runs of the same plan.
    pub fn ordered_stages(&self) -> Vec<&Arc<Stage>> {
        let mut ordered: Vec<_> = self.stages.values().collect();
        ordered.sort_by_key(|stage| (stage.depth(), stage.calculated_hash()));
        ordered
    }

    /// Stage graph: one node per stage, one edge per consumed data item,
    /// pointing from producer to consumer and labelled with the data hash.
    ///
    /// Inputs whose producer is not part of the plan are left out.
    pub fn graph(&self) -> Graph<Arc<Stage>, Hash32> {
        let mut graph = Graph::new();
        let mut indices: HashMap<Hash32, NodeIndex> = HashMap::new();

        for stage in self.ordered_stages() {
            let index = graph.add_node(stage.clone());
            indices.insert(stage.calculated_hash(), index);
        }

        for stage in self.ordered_stages() {
            let target = indices[&stage.calculated_hash()];

            for data in stage.data_in() {
                if let Some(&source) = indices.get(&data.produced_by()) {
                    graph.add_edge(source, target, data.calculated_hash());
                }
            }
        }

        graph
    }

    /// Verifies the plan invariants: every referenced data item is part of
    /// the plan, every data item's producer is part of the plan, and the
    /// stage graph is acyclic.
    ///
    /// Plans coming from a [`Planner`] always pass; this is meant for plans
    /// assembled by hand.
    pub fn check(&self) -> Result<(), PlanError> {
        for stage in self.ordered_stages() {
            let referenced = stage.data_in().iter().chain(stage.data_out());

            for data in referenced {
                if !self.planned_data.contains_key(&data.calculated_hash()) {
                    return Err(PlanError::DanglingData {
                        stage: stage.calculated_hash(),
                        data: data.calculated_hash(),
                    });
                }
            }
        }

        let mut data: Vec<_> = self.planned_data.values().collect();
        data.sort_by_key(|data| data.calculated_hash());

        for data in data {
            if !self.stages.contains_key(&data.produced_by()) {
                return Err(PlanError::DanglingProducer {
                    data: data.calculated_hash(),
                    stage: data.produced_by(),
                });
            }
        }

        let graph = self.graph();
        petgraph::algo::toposort(&graph, None)
            .map(|_| ())
            .map_err(|cycle| PlanError::Cycle(graph[cycle.node_id()].calculated_hash()))
    }
}

/// Renders the plan as a Mermaid flowchart.
impl std::fmt::Display for ExecutionPlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "graph LR")?;

        for stage in self.ordered_stages() {
            let name = stage.identifier().replace('"', "\\\"");
            writeln!(f, "    s{}[\"{}\"]", stage.calculated_hash(), name)?;
        }

        let graph = self.graph();

        for edge in graph.raw_edges() {
            let source = &graph[edge.source()];
            let target = &graph[edge.target()];

            let scheme = self
                .planned_data
                .get(&edge.weight)
                .map(|data| format!("{:?}", data.schema()))
                .unwrap_or_default()
                .replace('"', "'")
                .replace('<', "&lt;")
                .replace('>', "&gt;");

            writeln!(
                f,
                "    s{} -- \"{}\" --> s{}",
                source.calculated_hash(),
                scheme,
                target.calculated_hash()
            )?;
        }

        Ok(())
    }
}
