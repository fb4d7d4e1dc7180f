use tokio::sync::watch;

use crate::phase::PhaseGraph;

/// Single-writer observable container for the phase table.
///
/// Only the engine commits. Every commit replaces the whole graph, so a
/// receiver always sees a consistent table and never a half-applied update.
#[derive(Debug)]
pub struct PhaseStore {
    tx: watch::Sender<PhaseGraph>,
}

impl PhaseStore {
    pub fn new(graph: PhaseGraph) -> Self {
        let (tx, _rx) = watch::channel(graph);
        Self { tx }
    }

    /// Latest committed graph.
    pub fn snapshot(&self) -> PhaseGraph {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<PhaseGraph> {
        self.tx.subscribe()
    }

    pub(crate) fn commit(&self, graph: PhaseGraph) {
        self.tx.send_replace(graph);
    }

    /// Apply `f` to the latest graph and commit the result.
    pub(crate) fn update<F, E>(&self, f: F) -> Result<PhaseGraph, E>
    where
        F: FnOnce(&PhaseGraph) -> Result<PhaseGraph, E>,
    {
        let next = f(&self.snapshot())?;
        self.commit(next.clone());
        Ok(next)
    }
}
