//! Dependency graph and readiness resolution for work items.

use std::collections::{HashMap, HashSet};

use dbr_core::{
    Dependency, DependencyError, DependencyKind, TenantId, WorkItem, WorkItemId, WorkItemStatus,
};
use dbr_storage::Storage;
use petgraph::algo::{astar, has_path_connecting};
use petgraph::graphmap::DiGraphMap;
use petgraph::Direction;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{EngineError, Result};

/// A tenant's dependency graph.
///
/// Edges point from dependent to prerequisite. One pair of items may be
/// linked by several kinds at once, so each edge carries every kind stored
/// for its pair.
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    tenant: TenantId,
    graph: DiGraphMap<WorkItemId, Vec<DependencyKind>>,
}

impl DependencyGraph {
    /// Create an empty graph.
    pub fn new(tenant: TenantId) -> Self {
        Self {
            tenant,
            graph: DiGraphMap::new(),
        }
    }

    /// Build from stored edges. Edges of other tenants are skipped.
    pub fn from_dependencies<'a, I>(tenant: TenantId, dependencies: I) -> Self
    where
        I: IntoIterator<Item = &'a Dependency>,
    {
        let mut graph = Self::new(tenant);
        for dep in dependencies {
            if dep.tenant == graph.tenant {
                graph.link(dep);
            }
        }
        graph
    }

    fn link(&mut self, dependency: &Dependency) {
        let (from, to) = (dependency.dependent, dependency.prerequisite);
        match self.graph.edge_weight_mut(from, to) {
            Some(kinds) => {
                if !kinds.contains(&dependency.kind) {
                    kinds.push(dependency.kind);
                }
            }
            None => {
                self.graph.add_edge(from, to, vec![dependency.kind]);
            }
        }
    }

    /// Owning tenant.
    pub fn tenant(&self) -> &TenantId {
        &self.tenant
    }

    /// Number of linked (dependent, prerequisite) pairs.
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Kinds linking a dependent to a prerequisite.
    pub fn kinds(&self, dependent: WorkItemId, prerequisite: WorkItemId) -> &[DependencyKind] {
        self.graph
            .edge_weight(dependent, prerequisite)
            .map(|kinds| kinds.as_slice())
            .unwrap_or(&[])
    }

    /// Whether the item waits on anything.
    pub fn has_prerequisites(&self, item: WorkItemId) -> bool {
        self.graph.contains_node(item)
            && self.graph.neighbors_directed(item, Direction::Outgoing).next().is_some()
    }

    /// Finish-to-start prerequisites of an item.
    pub fn finish_to_start_prerequisites(&self, item: WorkItemId) -> Vec<WorkItemId> {
        if !self.graph.contains_node(item) {
            return Vec::new();
        }
        self.graph
            .edges_directed(item, Direction::Outgoing)
            .filter(|(_, _, kinds)| kinds.contains(&DependencyKind::FinishToStart))
            .map(|(_, prerequisite, _)| prerequisite)
            .collect()
    }

    /// The cycle that adding `dependent -> prerequisite` would close, if any.
    ///
    /// The returned path starts and ends at `dependent`. A self-edge yields a
    /// single-element path.
    pub fn cycle_for(&self, dependent: WorkItemId, prerequisite: WorkItemId) -> Option<Vec<WorkItemId>> {
        if dependent == prerequisite {
            return Some(vec![dependent]);
        }
        if !self.graph.contains_node(prerequisite) || !self.graph.contains_node(dependent) {
            return None;
        }
        if !has_path_connecting(&self.graph, prerequisite, dependent, None) {
            return None;
        }

        // Shortest chain from the prerequisite back to the dependent.
        let (_, path) = astar(&self.graph, prerequisite, |n| n == dependent, |_| 1u32, |_| 0u32)?;
        let mut cycle = Vec::with_capacity(path.len() + 1);
        cycle.push(dependent);
        cycle.extend(path);
        Some(cycle)
    }

    /// Add an edge, rejecting cycles.
    pub fn add(&mut self, dependency: &Dependency) -> std::result::Result<(), DependencyError> {
        if let Some(cycle) = self.cycle_for(dependency.dependent, dependency.prerequisite) {
            return Err(DependencyError::Circular {
                dependent: dependency.dependent,
                prerequisite: dependency.prerequisite,
                cycle,
            });
        }
        self.link(dependency);
        Ok(())
    }
}

/// Outcome of one readiness resolution pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionSummary {
    /// Items promoted to Ready
    pub promoted: Vec<WorkItemId>,
    /// Blocked items that stay blocked
    pub still_blocked: usize,
}

/// Resolves work item readiness from the dependency graph.
pub struct DependencyResolver;

impl DependencyResolver {
    /// Create a new resolver.
    pub fn new() -> Self {
        Self
    }

    /// Whether every finish-to-start prerequisite is Done.
    ///
    /// Unknown prerequisites count as unfinished.
    pub fn can_become_ready(
        &self,
        item: WorkItemId,
        graph: &DependencyGraph,
        items: &HashMap<WorkItemId, WorkItem>,
    ) -> bool {
        graph
            .finish_to_start_prerequisites(item)
            .iter()
            .all(|p| items.get(p).map_or(false, |w| w.status == WorkItemStatus::Done))
    }

    /// Promote blocked items whose prerequisites are satisfied, in place.
    ///
    /// A blocked item is a Backlog item that is the dependent end of at least
    /// one edge. Running the pass twice without other changes promotes
    /// nothing the second time.
    pub fn resolve_in_place(
        &self,
        graph: &DependencyGraph,
        items: &mut HashMap<WorkItemId, WorkItem>,
    ) -> ResolutionSummary {
        let mut blocked: Vec<(chrono::DateTime<chrono::Utc>, WorkItemId)> = items
            .values()
            .filter(|w| &w.tenant == graph.tenant())
            .filter(|w| w.status == WorkItemStatus::Backlog && graph.has_prerequisites(w.id))
            .map(|w| (w.created_at, w.id))
            .collect();
        blocked.sort();

        let ready: Vec<WorkItemId> = blocked
            .iter()
            .map(|(_, id)| *id)
            .filter(|id| self.can_become_ready(*id, graph, items))
            .collect();

        for id in &ready {
            if let Some(item) = items.get_mut(id) {
                item.set_status(WorkItemStatus::Ready);
                debug!(item = %id, "promoted to ready");
            }
        }

        ResolutionSummary {
            still_blocked: blocked.len() - ready.len(),
            promoted: ready,
        }
    }

    /// Check one item's readiness against storage.
    pub async fn can_become_ready_in(&self, storage: &dyn Storage, item: &WorkItem) -> Result<bool> {
        let dependencies = storage.list_dependencies(item.id).await?;
        let prerequisites: Vec<WorkItemId> = dependencies
            .iter()
            .filter(|d| d.gates_readiness())
            .map(|d| d.prerequisite)
            .collect();
        if prerequisites.is_empty() {
            return Ok(true);
        }
        let loaded = storage.load_work_items(&prerequisites).await?;
        let done: HashSet<WorkItemId> = loaded
            .iter()
            .filter(|w| w.status == WorkItemStatus::Done)
            .map(|w| w.id)
            .collect();
        Ok(prerequisites.iter().all(|p| done.contains(p)))
    }

    /// Promote a tenant's newly ready items and save them.
    ///
    /// Saved items are left pending; the caller commits.
    pub async fn resolve_newly_ready(
        &self,
        storage: &mut dyn Storage,
        tenant: &TenantId,
    ) -> Result<ResolutionSummary> {
        let blocked = storage.list_blocked_work_items(tenant).await?;
        let mut summary = ResolutionSummary::default();

        for mut item in blocked {
            if self.can_become_ready_in(&*storage, &item).await? {
                item.set_status(WorkItemStatus::Ready);
                storage.save_work_item(&item).await?;
                summary.promoted.push(item.id);
            } else {
                summary.still_blocked += 1;
            }
        }

        if !summary.promoted.is_empty() {
            info!(
                tenant = %tenant,
                promoted = summary.promoted.len(),
                still_blocked = summary.still_blocked,
                "resolved newly ready work items"
            );
        }
        Ok(summary)
    }

    /// Check that a candidate edge may be added.
    pub async fn validate_dependency(&self, storage: &dyn Storage, candidate: &Dependency) -> Result<()> {
        let items = storage
            .load_work_items(&[candidate.dependent, candidate.prerequisite])
            .await?;
        let find = |id: WorkItemId| {
            items
                .iter()
                .find(|w| w.id == id)
                .ok_or(EngineError::Dependency(DependencyError::UnknownItem(id)))
        };
        let dependent = find(candidate.dependent)?;
        let prerequisite = find(candidate.prerequisite)?;

        if dependent.tenant != prerequisite.tenant || dependent.tenant != candidate.tenant {
            return Err(DependencyError::CrossScope {
                dependent: dependent.id,
                dependent_tenant: dependent.tenant.clone(),
                prerequisite: prerequisite.id,
                prerequisite_tenant: prerequisite.tenant.clone(),
            }
            .into());
        }

        let existing = storage.list_tenant_dependencies(&candidate.tenant).await?;
        let graph = DependencyGraph::from_dependencies(candidate.tenant.clone(), &existing);
        if let Some(cycle) = graph.cycle_for(candidate.dependent, candidate.prerequisite) {
            return Err(DependencyError::Circular {
                dependent: candidate.dependent,
                prerequisite: candidate.prerequisite,
                cycle,
            }
            .into());
        }
        Ok(())
    }

    /// Validate and save a new edge.
    pub async fn add_dependency(&self, storage: &mut dyn Storage, candidate: Dependency) -> Result<Dependency> {
        self.validate_dependency(&*storage, &candidate).await?;
        storage.save_dependency(&candidate).await?;
        debug!(
            dependent = %candidate.dependent,
            prerequisite = %candidate.prerequisite,
            "dependency added"
        );
        Ok(candidate)
    }
}

impl Default for DependencyResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dbr_storage::MemoryStorage;

    fn tenant() -> TenantId {
        TenantId::new("t1")
    }

    fn chain(n: usize) -> (Vec<WorkItemId>, DependencyGraph) {
        // item[i] depends on item[i + 1]
        let ids: Vec<WorkItemId> = (0..n).map(|_| WorkItemId::new()).collect();
        let mut graph = DependencyGraph::new(tenant());
        for pair in ids.windows(2) {
            graph
                .add(&Dependency::finish_to_start(tenant(), pair[0], pair[1]))
                .unwrap();
        }
        (ids, graph)
    }

    #[test]
    fn test_self_edge_rejected() {
        let graph = DependencyGraph::new(tenant());
        let id = WorkItemId::new();
        assert_eq!(graph.cycle_for(id, id), Some(vec![id]));
    }

    #[test]
    fn test_closing_edge_rejected_for_chains() {
        for n in 2..=6 {
            let (ids, mut graph) = chain(n);
            let last = ids[n - 1];
            let first = ids[0];

            let err = graph
                .add(&Dependency::finish_to_start(tenant(), last, first))
                .unwrap_err();
            match err {
                DependencyError::Circular { cycle, .. } => {
                    assert_eq!(cycle.first(), Some(&last));
                    assert_eq!(cycle.last(), Some(&last));
                    assert_eq!(cycle.len(), n + 1);
                }
                other => panic!("unexpected error: {other:?}"),
            }
            assert_eq!(graph.edge_count(), n - 1);

            // every inner back-edge closes a cycle too
            for j in 1..n {
                assert!(graph.cycle_for(ids[j], ids[0]).is_some());
            }
        }
    }

    #[test]
    fn test_forward_and_diamond_edges_accepted() {
        let (ids, mut graph) = chain(4);
        assert!(graph
            .add(&Dependency::finish_to_start(tenant(), ids[0], ids[3]))
            .is_ok());
        assert!(graph.cycle_for(ids[1], ids[3]).is_none());
    }

    #[test]
    fn test_foreign_edges_skipped_when_building() {
        let a = WorkItemId::new();
        let b = WorkItemId::new();
        let deps = vec![Dependency::finish_to_start(TenantId::new("t2"), a, b)];
        let graph = DependencyGraph::from_dependencies(tenant(), &deps);
        assert_eq!(graph.edge_count(), 0);
    }

    fn item(status: WorkItemStatus) -> WorkItem {
        WorkItem::new(tenant(), "item").with_status(status)
    }

    #[test]
    fn test_can_become_ready_only_counts_finish_to_start() {
        let prereq = item(WorkItemStatus::InProgress);
        let started = item(WorkItemStatus::InProgress);
        let dependent = item(WorkItemStatus::Backlog);
        let mut graph = DependencyGraph::new(tenant());
        graph
            .add(&Dependency::new(tenant(), dependent.id, started.id, DependencyKind::StartToStart))
            .unwrap();

        let mut items: HashMap<WorkItemId, WorkItem> = [&prereq, &started, &dependent]
            .into_iter()
            .map(|w| (w.id, w.clone()))
            .collect();
        let resolver = DependencyResolver::new();
        assert!(resolver.can_become_ready(dependent.id, &graph, &items));

        graph
            .add(&Dependency::finish_to_start(tenant(), dependent.id, prereq.id))
            .unwrap();
        assert!(!resolver.can_become_ready(dependent.id, &graph, &items));

        items.get_mut(&prereq.id).unwrap().status = WorkItemStatus::Done;
        assert!(resolver.can_become_ready(dependent.id, &graph, &items));
    }

    #[test]
    fn test_resolve_in_place_is_idempotent() {
        let done = item(WorkItemStatus::Done);
        let open = item(WorkItemStatus::InProgress);
        let unblocked = item(WorkItemStatus::Backlog);
        let blocked = item(WorkItemStatus::Backlog);
        let loose = item(WorkItemStatus::Backlog);

        let mut graph = DependencyGraph::new(tenant());
        graph.add(&Dependency::finish_to_start(tenant(), unblocked.id, done.id)).unwrap();
        graph.add(&Dependency::finish_to_start(tenant(), blocked.id, done.id)).unwrap();
        graph.add(&Dependency::finish_to_start(tenant(), blocked.id, open.id)).unwrap();

        let mut items: HashMap<WorkItemId, WorkItem> = [&done, &open, &unblocked, &blocked, &loose]
            .into_iter()
            .map(|w| (w.id, w.clone()))
            .collect();

        let resolver = DependencyResolver::new();
        let first = resolver.resolve_in_place(&graph, &mut items);
        assert_eq!(first.promoted, vec![unblocked.id]);
        assert_eq!(first.still_blocked, 1);
        assert_eq!(items[&unblocked.id].status, WorkItemStatus::Ready);
        // items without prerequisites are not blocked, so they are left alone
        assert_eq!(items[&loose.id].status, WorkItemStatus::Backlog);

        let second = resolver.resolve_in_place(&graph, &mut items);
        assert!(second.promoted.is_empty());
        assert_eq!(second.still_blocked, 1);
    }

    #[tokio::test]
    async fn test_resolve_newly_ready_against_storage() {
        let mut storage = MemoryStorage::new();
        let prereq = item(WorkItemStatus::Done);
        let dependent = item(WorkItemStatus::Backlog);
        storage.save_work_item(&prereq).await.unwrap();
        storage.save_work_item(&dependent).await.unwrap();

        let resolver = DependencyResolver::new();
        resolver
            .add_dependency(&mut storage, Dependency::finish_to_start(tenant(), dependent.id, prereq.id))
            .await
            .unwrap();

        let summary = resolver.resolve_newly_ready(&mut storage, &tenant()).await.unwrap();
        assert_eq!(summary.promoted, vec![dependent.id]);
        assert_eq!(summary.still_blocked, 0);

        let summary = resolver.resolve_newly_ready(&mut storage, &tenant()).await.unwrap();
        assert!(summary.promoted.is_empty());

        let loaded = storage.load_work_items(&[dependent.id]).await.unwrap();
        assert_eq!(loaded[0].status, WorkItemStatus::Ready);
    }

    #[tokio::test]
    async fn test_validate_dependency_rejects_cycles_in_storage() {
        let mut storage = MemoryStorage::new();
        let ids: Vec<WorkItem> = (0..5).map(|_| item(WorkItemStatus::Backlog)).collect();
        for w in &ids {
            storage.save_work_item(w).await.unwrap();
        }
        let resolver = DependencyResolver::new();
        for pair in ids.windows(2) {
            resolver
                .add_dependency(&mut storage, Dependency::finish_to_start(tenant(), pair[0].id, pair[1].id))
                .await
                .unwrap();
        }

        let closing = Dependency::finish_to_start(tenant(), ids[4].id, ids[0].id);
        let err = resolver.add_dependency(&mut storage, closing).await.unwrap_err();
        assert!(matches!(err, EngineError::Dependency(DependencyError::Circular { .. })));

        let self_edge = Dependency::finish_to_start(tenant(), ids[2].id, ids[2].id);
        let err = resolver.validate_dependency(&storage, &self_edge).await.unwrap_err();
        assert!(matches!(err, EngineError::Dependency(DependencyError::Circular { .. })));

        assert_eq!(storage.list_tenant_dependencies(&tenant()).await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_validate_dependency_rejects_cross_scope() {
        let mut storage = MemoryStorage::new();
        let ours = item(WorkItemStatus::Backlog);
        let theirs = WorkItem::new(TenantId::new("t2"), "foreign");
        storage.save_work_item(&ours).await.unwrap();
        storage.save_work_item(&theirs).await.unwrap();

        let candidate = Dependency::finish_to_start(tenant(), ours.id, theirs.id);
        let err = DependencyResolver::new()
            .validate_dependency(&storage, &candidate)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Dependency(DependencyError::CrossScope { .. })));
    }

    #[tokio::test]
    async fn test_validate_dependency_unknown_item() {
        let storage = MemoryStorage::new();
        let candidate = Dependency::finish_to_start(tenant(), WorkItemId::new(), WorkItemId::new());
        let err = DependencyResolver::new()
            .validate_dependency(&storage, &candidate)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Dependency(DependencyError::UnknownItem(_))));
    }

    #[test]
    fn test_mixed_kinds_on_one_pair_keep_finish_to_start() {
        let prereq = item(WorkItemStatus::InProgress);
        let dependent = item(WorkItemStatus::Backlog);
        let fs = Dependency::finish_to_start(tenant(), dependent.id, prereq.id);
        let ss = Dependency::new(tenant(), dependent.id, prereq.id, DependencyKind::StartToStart);

        for edges in [vec![&fs, &ss], vec![&ss, &fs]] {
            let graph = DependencyGraph::from_dependencies(tenant(), edges);
            assert_eq!(graph.edge_count(), 1);
            assert_eq!(graph.kinds(dependent.id, prereq.id).len(), 2);
            assert_eq!(graph.finish_to_start_prerequisites(dependent.id), vec![prereq.id]);

            let mut items: HashMap<WorkItemId, WorkItem> = [&prereq, &dependent]
                .into_iter()
                .map(|w| (w.id, w.clone()))
                .collect();
            let resolver = DependencyResolver::new();
            assert!(!resolver.can_become_ready(dependent.id, &graph, &items));
            let summary = resolver.resolve_in_place(&graph, &mut items);
            assert!(summary.promoted.is_empty());
            assert_eq!(summary.still_blocked, 1);
        }

        let mut graph = DependencyGraph::new(tenant());
        graph.add(&ss).unwrap();
        graph.add(&fs).unwrap();
        graph.add(&ss).unwrap();
        assert_eq!(graph.kinds(dependent.id, prereq.id).len(), 2);
    }

    #[tokio::test]
    async fn test_snapshot_and_storage_resolution_agree() {
        let mut storage = MemoryStorage::new();
        let running = item(WorkItemStatus::InProgress);
        let finished = item(WorkItemStatus::Done);
        let mixed = item(WorkItemStatus::Backlog);
        let after_finished = item(WorkItemStatus::Backlog);
        let start_only = item(WorkItemStatus::Backlog);
        for w in [&running, &finished, &mixed, &after_finished, &start_only] {
            storage.save_work_item(w).await.unwrap();
        }

        let resolver = DependencyResolver::new();
        for dep in [
            Dependency::finish_to_start(tenant(), mixed.id, running.id),
            Dependency::new(tenant(), mixed.id, running.id, DependencyKind::StartToStart),
            Dependency::finish_to_start(tenant(), after_finished.id, finished.id),
            Dependency::new(tenant(), start_only.id, running.id, DependencyKind::StartToStart),
        ] {
            resolver.add_dependency(&mut storage, dep).await.unwrap();
        }

        let deps = storage.list_tenant_dependencies(&tenant()).await.unwrap();
        let graph = DependencyGraph::from_dependencies(tenant(), &deps);
        let mut items: HashMap<WorkItemId, WorkItem> = storage
            .list_work_items(&tenant())
            .await
            .unwrap()
            .into_iter()
            .map(|w| (w.id, w))
            .collect();
        for w in [&mixed, &after_finished, &start_only] {
            let in_storage = resolver.can_become_ready_in(&storage, w).await.unwrap();
            assert_eq!(resolver.can_become_ready(w.id, &graph, &items), in_storage);
        }

        let mut snapshot = resolver.resolve_in_place(&graph, &mut items);
        let mut stored = resolver.resolve_newly_ready(&mut storage, &tenant()).await.unwrap();
        snapshot.promoted.sort();
        stored.promoted.sort();
        assert_eq!(snapshot, stored);

        let mut expected = vec![after_finished.id, start_only.id];
        expected.sort();
        assert_eq!(stored.promoted, expected);
        assert_eq!(stored.still_blocked, 1);
    }
}
