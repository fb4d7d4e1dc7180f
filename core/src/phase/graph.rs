use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use crate::error::EngineError;

use super::types::{Phase, PhaseId, PhaseStatus};

/// Authoritative phase table (arena + index).
///
/// Cloning is cheap: the arena holds `Arc<Phase>` records and the index is
/// shared. Updates never touch an existing record; they build a new graph in
/// which only the changed entries point at fresh records.
#[derive(Debug, Clone)]
pub struct PhaseGraph {
    phases: Arc<Vec<Arc<Phase>>>,
    index: Arc<HashMap<PhaseId, usize>>,
}

impl PhaseGraph {
    /// Build the table from phases in registration order.
    ///
    /// Callers are expected to have validated the list (see
    /// [`PhaseRegistry`](super::PhaseRegistry)); a duplicate id keeps the
    /// first occurrence in the index.
    pub(crate) fn from_phases(phases: Vec<Phase>) -> Self {
        let mut index = HashMap::with_capacity(phases.len());
        for (pos, phase) in phases.iter().enumerate() {
            index.entry(phase.id).or_insert(pos);
        }

        Self {
            phases: Arc::new(phases.into_iter().map(Arc::new).collect()),
            index: Arc::new(index),
        }
    }

    pub fn len(&self) -> usize {
        self.phases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.phases.is_empty()
    }

    /// Phases in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Phase> {
        self.phases.iter().map(|p| p.as_ref())
    }

    pub fn ids(&self) -> impl Iterator<Item = PhaseId> + '_ {
        self.phases.iter().map(|p| p.id)
    }

    pub fn contains(&self, id: PhaseId) -> bool {
        self.index.contains_key(&id)
    }

    pub fn get(&self, id: PhaseId) -> Option<&Phase> {
        self.index.get(&id).map(|&pos| self.phases[pos].as_ref())
    }

    /// Lookup that treats an unknown id as a configuration error.
    pub fn lookup(&self, id: PhaseId) -> Result<&Phase, EngineError> {
        self.get(id).ok_or(EngineError::UnknownPhase(id))
    }

    /// The shared record for `id`, for observers that want to detect changes
    /// by pointer identity.
    pub fn record(&self, id: PhaseId) -> Option<&Arc<Phase>> {
        self.index.get(&id).map(|&pos| &self.phases[pos])
    }

    pub fn status_of(&self, id: PhaseId) -> Option<PhaseStatus> {
        self.get(id).map(|p| p.status)
    }

    /// Dependency records of `id` in declared order.
    pub fn dependencies_of(&self, id: PhaseId) -> Result<Vec<&Phase>, EngineError> {
        let phase = self.lookup(id)?;
        phase.dependencies.iter().map(|dep| self.lookup(*dep)).collect()
    }

    /// True when every dependency of `id` currently has `status`.
    ///
    /// A dependency id missing from the table never satisfies the check.
    pub fn all_dependencies_have_status(
        &self,
        id: PhaseId,
        status: PhaseStatus,
    ) -> Result<bool, EngineError> {
        let phase = self.lookup(id)?;
        Ok(phase
            .dependencies
            .iter()
            .all(|dep| self.status_of(*dep) == Some(status)))
    }

    /// First dependency of `id` (declared order) that is not `completed`.
    pub fn first_unmet_dependency(&self, id: PhaseId) -> Result<Option<PhaseId>, EngineError> {
        let phase = self.lookup(id)?;
        Ok(phase
            .dependencies
            .iter()
            .copied()
            .find(|dep| self.status_of(*dep) != Some(PhaseStatus::Completed)))
    }

    /// Every phase that transitively depends on `id`, in registration order.
    pub fn transitive_dependents(&self, id: PhaseId) -> Vec<PhaseId> {
        let mut reached: HashSet<PhaseId> = HashSet::new();
        reached.insert(id);

        // Registration order is topological, so a single forward pass is enough.
        let mut out = Vec::new();
        for phase in self.iter() {
            if phase.id == id {
                continue;
            }
            if phase.dependencies.iter().any(|d| reached.contains(d)) {
                reached.insert(phase.id);
                out.push(phase.id);
            }
        }
        out
    }

    /// True if `a` transitively depends on `b`.
    pub fn depends_on(&self, a: PhaseId, b: PhaseId) -> bool {
        self.transitive_dependents(b).contains(&a)
    }

    /// Copy-on-write update of a single phase.
    pub fn with_phase<F>(&self, id: PhaseId, f: F) -> Result<Self, EngineError>
    where
        F: FnOnce(&mut Phase),
    {
        let mut f = Some(f);
        self.with_phases(&[id], |phase| {
            if let Some(f) = f.take() {
                f(phase)
            }
        })
    }

    /// Copy-on-write update of several phases, committed as one new graph.
    pub fn with_phases<F>(&self, ids: &[PhaseId], mut f: F) -> Result<Self, EngineError>
    where
        F: FnMut(&mut Phase),
    {
        let mut phases: Vec<Arc<Phase>> = self.phases.as_ref().clone();
        for id in ids {
            let pos = *self.index.get(id).ok_or(EngineError::UnknownPhase(*id))?;
            let mut next = phases[pos].as_ref().clone();
            f(&mut next);
            debug_assert_eq!(next.id, *id, "phase id is immutable");
            phases[pos] = Arc::new(next);
        }

        Ok(Self {
            phases: Arc::new(phases),
            index: Arc::clone(&self.index),
        })
    }

    /// A graph with every phase reset to `pending` and per-run fields cleared.
    pub fn reset(&self) -> Self {
        Self {
            phases: Arc::new(self.phases.iter().map(|p| Arc::new(p.reset())).collect()),
            index: Arc::clone(&self.index),
        }
    }

    pub fn count_with_status(&self, status: PhaseStatus) -> usize {
        self.iter().filter(|p| p.status == status).count()
    }

    pub fn ids_with_status(&self, status: PhaseStatus) -> Vec<PhaseId> {
        self.iter()
            .filter(|p| p.status == status)
            .map(|p| p.id)
            .collect()
    }

    /// Execution plan using Kahn's algorithm.
    ///
    /// Returns stages where phases in the same stage have no dependency on
    /// each other; each stage is ordered by registration position.
    pub fn stages(&self) -> Vec<Vec<PhaseId>> {
        let mut in_degree: HashMap<PhaseId, usize> = HashMap::new();
        let mut dependents: HashMap<PhaseId, Vec<PhaseId>> = HashMap::new();

        for phase in self.iter() {
            let known: Vec<PhaseId> = phase
                .dependencies
                .iter()
                .copied()
                .filter(|d| self.contains(*d))
                .collect();
            in_degree.insert(phase.id, known.len());
            for dep in known {
                dependents.entry(dep).or_default().push(phase.id);
            }
        }

        let position = |id: &PhaseId| self.index.get(id).copied().unwrap_or(usize::MAX);

        let mut stages = Vec::new();
        let mut current: Vec<PhaseId> = self
            .ids()
            .filter(|id| in_degree.get(id) == Some(&0))
            .collect();

        while !current.is_empty() {
            let mut next = Vec::new();
            for id in &current {
                for dependent in dependents.get(id).into_iter().flatten() {
                    if let Some(degree) = in_degree.get_mut(dependent) {
                        *degree -= 1;
                        if *degree == 0 {
                            next.push(*dependent);
                        }
                    }
                }
            }
            next.sort_by_key(position);
            stages.push(std::mem::replace(&mut current, next));
        }

        stages
    }

    /// Breadth-first walk over the dependencies of `id` (closest first).
    pub fn ancestors(&self, id: PhaseId) -> Vec<PhaseId> {
        let mut seen = HashSet::new();
        let mut queue: VecDeque<PhaseId> = VecDeque::new();
        let mut out = Vec::new();

        if let Some(phase) = self.get(id) {
            queue.extend(phase.dependencies.iter().copied());
        }
        while let Some(next) = queue.pop_front() {
            if !seen.insert(next) {
                continue;
            }
            out.push(next);
            if let Some(phase) = self.get(next) {
                queue.extend(phase.dependencies.iter().copied());
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn diamond() -> PhaseGraph {
        PhaseGraph::from_phases(vec![
            Phase::new(1, "A"),
            Phase::new(2, "B").with_dependencies([1u32]),
            Phase::new(3, "C").with_dependencies([1u32]),
            Phase::new(4, "D").with_dependencies([2u32, 3]),
        ])
    }

    #[test]
    fn lookup_unknown_id_is_configuration_error() {
        let graph = diamond();
        let err = graph.lookup(PhaseId(99)).unwrap_err();
        assert!(matches!(err, EngineError::UnknownPhase(PhaseId(99))));
    }

    #[test]
    fn dependencies_follow_declared_order() {
        let graph = diamond();
        let titles: Vec<&str> = graph
            .dependencies_of(PhaseId(4))
            .unwrap()
            .iter()
            .map(|p| p.title.as_str())
            .collect();
        assert_eq!(titles, vec!["B", "C"]);
    }

    #[test]
    fn dependency_status_checks_use_current_records() {
        let graph = diamond();
        assert!(graph
            .all_dependencies_have_status(PhaseId(1), PhaseStatus::Completed)
            .unwrap());
        assert!(!graph
            .all_dependencies_have_status(PhaseId(2), PhaseStatus::Completed)
            .unwrap());

        let graph = graph
            .with_phase(PhaseId(1), |p| p.status = PhaseStatus::Completed)
            .unwrap();
        assert!(graph
            .all_dependencies_have_status(PhaseId(2), PhaseStatus::Completed)
            .unwrap());
        assert_eq!(
            graph.first_unmet_dependency(PhaseId(4)).unwrap(),
            Some(PhaseId(2))
        );
    }

    #[test]
    fn updates_are_copy_on_write() {
        let before = diamond();
        let after = before
            .with_phase(PhaseId(2), |p| p.output = "b-out".into())
            .unwrap();

        assert_eq!(before.get(PhaseId(2)).unwrap().output, "");
        assert_eq!(after.get(PhaseId(2)).unwrap().output, "b-out");
        // Untouched records are shared, the changed one is fresh.
        assert!(Arc::ptr_eq(
            before.record(PhaseId(1)).unwrap(),
            after.record(PhaseId(1)).unwrap()
        ));
        assert!(!Arc::ptr_eq(
            before.record(PhaseId(2)).unwrap(),
            after.record(PhaseId(2)).unwrap()
        ));
    }

    #[test]
    fn batch_update_rejects_unknown_id() {
        let graph = diamond();
        let err = graph
            .with_phases(&[PhaseId(1), PhaseId(42)], |p| p.status = PhaseStatus::Running)
            .unwrap_err();
        assert!(matches!(err, EngineError::UnknownPhase(PhaseId(42))));
    }

    #[test]
    fn transitive_dependents_and_stages() {
        let graph = diamond();
        assert_eq!(
            graph.transitive_dependents(PhaseId(1)),
            vec![PhaseId(2), PhaseId(3), PhaseId(4)]
        );
        assert_eq!(graph.transitive_dependents(PhaseId(3)), vec![PhaseId(4)]);
        assert!(graph.depends_on(PhaseId(4), PhaseId(1)));
        assert!(!graph.depends_on(PhaseId(2), PhaseId(3)));

        assert_eq!(
            graph.stages(),
            vec![
                vec![PhaseId(1)],
                vec![PhaseId(2), PhaseId(3)],
                vec![PhaseId(4)]
            ]
        );
        assert_eq!(graph.ancestors(PhaseId(4)), vec![PhaseId(2), PhaseId(3), PhaseId(1)]);
    }

    #[test]
    fn reset_clears_run_fields() {
        let graph = diamond()
            .with_phases(&[PhaseId(1), PhaseId(2)], |p| {
                p.status = PhaseStatus::Completed;
                p.output = "x".into();
            })
            .unwrap();
        let fresh = graph.reset();
        assert_eq!(fresh.count_with_status(PhaseStatus::Pending), 4);
        assert!(fresh.iter().all(|p| p.output.is_empty()));
    }
}
