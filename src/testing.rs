//! Mock definitions shared by the unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::define::Definition;
use crate::error::SchemeError;
use crate::function::{Container, Function, FunctionDefinition, FunctionResult, Scheme};
use crate::hash::{Hash32, HashBuilder};
use crate::scheme::{Payload, TypedScheme};

pub(crate) type Log = Arc<Mutex<Vec<String>>>;

pub(crate) fn scheme() -> Scheme {
    Arc::new(TypedScheme::<u32>::new())
}

fn values(inputs: &[Container]) -> FunctionResult<Vec<u32>> {
    inputs
        .iter()
        .map(|input| {
            input
                .downcast_ref::<Payload<u32>>()
                .map(|payload| *payload.data())
                .ok_or_else(|| anyhow::anyhow!("expected Payload<u32>, got {input:?}"))
        })
        .collect()
}

/// Source emitting `0..outputs` as `Payload<u32>`.
pub(crate) fn counting_source(identifier: &'static str, outputs: usize) -> Arc<dyn FunctionDefinition> {
    let mut builder = Definition::named(identifier);
    for _ in 0..outputs {
        builder = builder.produces(TypedScheme::<u32>::new());
    }

    Arc::new(builder.run(move |_| {
        Ok((0..outputs)
            .map(|value| Arc::new(Payload::new(value as u32)) as Container)
            .collect())
    }))
}

/// Stage over `Payload<u32>` inputs, output `k` is the sum of inputs plus `k`.
pub(crate) fn mock(identifier: &'static str, consumes: usize, produces: usize) -> Arc<dyn FunctionDefinition> {
    let mut builder = Definition::named(identifier);
    for _ in 0..consumes {
        builder = builder.consumes(TypedScheme::<u32>::new());
    }
    for _ in 0..produces {
        builder = builder.produces(TypedScheme::<u32>::new());
    }

    Arc::new(builder.run(move |inputs| {
        let sum: u32 = values(&inputs)?.iter().sum();
        Ok((0..produces)
            .map(|k| Arc::new(Payload::new(sum + k as u32)) as Container)
            .collect())
    }))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Behaviour {
    Succeed,
    FailInput,
    FailExecute,
    RejectInput,
    WrongPayload,
    ReturnNone,
}

/// Hand-written definition recording every execution into a shared log.
pub(crate) struct MockDefinition {
    pub identifier: &'static str,
    pub config: i64,
    pub consumes: usize,
    pub produces: usize,
    pub returns: usize,
    pub behaviour: Behaviour,
    pub log: Log,
    pub created: Arc<AtomicUsize>,
}

impl MockDefinition {
    pub fn new(identifier: &'static str, consumes: usize, produces: usize, log: &Log) -> Self {
        Self {
            identifier,
            config: 0,
            consumes,
            produces,
            returns: produces,
            behaviour: Behaviour::Succeed,
            log: log.clone(),
            created: Arc::default(),
        }
    }

    pub fn returning(mut self, returns: usize) -> Self {
        self.returns = returns;
        self
    }

    pub fn behaving(mut self, behaviour: Behaviour) -> Self {
        self.behaviour = behaviour;
        self
    }

    pub fn shared(self) -> Arc<dyn FunctionDefinition> {
        Arc::new(self)
    }
}

impl FunctionDefinition for MockDefinition {
    fn identifier(&self) -> &str {
        self.identifier
    }

    fn config_hash(&self) -> Hash32 {
        HashBuilder::new()
            .str(self.identifier)
            .int(self.config)
            .digest()
    }

    fn consumes(&self) -> Vec<Scheme> {
        (0..self.consumes).map(|_| scheme()).collect()
    }

    fn produces(&self, _: &[Scheme]) -> Result<Vec<Scheme>, SchemeError> {
        Ok((0..self.produces).map(|_| scheme()).collect())
    }

    fn new_function(&self) -> Box<dyn Function> {
        self.created.fetch_add(1, Ordering::SeqCst);

        Box::new(MockFunction {
            identifier: self.identifier,
            returns: self.returns,
            behaviour: self.behaviour,
            log: self.log.clone(),
            inputs: Vec::new(),
        })
    }
}

struct MockFunction {
    identifier: &'static str,
    returns: usize,
    behaviour: Behaviour,
    log: Log,
    inputs: Vec<Container>,
}

impl Function for MockFunction {
    fn set_input(&mut self, inputs: Vec<Container>) -> FunctionResult<()> {
        if self.behaviour == Behaviour::FailInput {
            anyhow::bail!("{} refuses its input", self.identifier);
        }
        self.inputs = inputs;
        Ok(())
    }

    fn validate_input(&self) -> bool {
        self.behaviour != Behaviour::RejectInput
    }

    fn execute(self: Box<Self>) -> FunctionResult<Option<Vec<Container>>> {
        self.log
            .lock()
            .map_err(|_| anyhow::anyhow!("log poisoned"))?
            .push(self.identifier.to_string());

        let sum: u32 = values(&self.inputs)?.iter().sum();

        match self.behaviour {
            Behaviour::FailExecute => anyhow::bail!("{} blew up", self.identifier),
            Behaviour::ReturnNone => Ok(None),
            Behaviour::WrongPayload => Ok(Some(
                (0..self.returns)
                    .map(|_| Arc::new(Payload::new(String::from("oops"))) as Container)
                    .collect(),
            )),
            _ => Ok(Some(
                (0..self.returns)
                    .map(|k| Arc::new(Payload::new(sum + k as u32)) as Container)
                    .collect(),
            )),
        }
    }
}

pub(crate) fn payload(container: &Container) -> u32 {
    *container
        .downcast_ref::<Payload<u32>>()
        .expect("expected Payload<u32>")
        .data()
}

/// Subscriber counting `WARN` events, installed per test with
/// `tracing::subscriber::with_default`.
#[derive(Clone, Default)]
pub(crate) struct WarnCounter(Arc<AtomicUsize>);

impl WarnCounter {
    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

impl tracing::Subscriber for WarnCounter {
    fn enabled(&self, _: &tracing::Metadata<'_>) -> bool {
        true
    }

    fn new_span(&self, _: &tracing::span::Attributes<'_>) -> tracing::span::Id {
        tracing::span::Id::from_u64(1)
    }

    fn record(&self, _: &tracing::span::Id, _: &tracing::span::Record<'_>) {}

    fn record_follows_from(&self, _: &tracing::span::Id, _: &tracing::span::Id) {}

    fn event(&self, event: &tracing::Event<'_>) {
        if *event.metadata().level() == tracing::Level::WARN {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn enter(&self, _: &tracing::span::Id) {}

    fn exit(&self, _: &tracing::span::Id) {}
}
