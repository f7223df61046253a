//! Level-synchronous BFS over the relationship store.

use std::collections::{HashSet, VecDeque};

use futures_util::stream::{self, StreamExt, TryStreamExt};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::graph::{Relationship, TypeFilter};
use crate::store::{RelationshipStore, StoreError};
use crate::{DetectiveError, Result};

/// Expand the relationship neighborhood of `root` up to `max_depth` hops.
///
/// Each logical relationship is reported once, in the direction it was first
/// discovered. Edges rejected by `filter` are neither reported nor walked
/// through. Up to `fanout` store reads for one level run concurrently; the
/// next level starts only after the whole level has been collected.
///
/// Returns `InvalidInput` for `max_depth == 0` without touching the store,
/// `PersonNotFound` if the root does not exist and `Cancelled` if `cancel`
/// fires before the walk completes. No partial results are returned.
pub async fn traverse_graph<S>(
    store: &S,
    root: Uuid,
    max_depth: usize,
    filter: &TypeFilter,
    fanout: usize,
    cancel: &CancellationToken,
) -> Result<Vec<Relationship>>
where
    S: RelationshipStore + ?Sized,
{
    if max_depth == 0 {
        return Err(DetectiveError::InvalidInput("Depth can't be 0".to_string()));
    }

    let mut visited = HashSet::from([root]);
    let mut frontier = VecDeque::from([root]);
    let mut added_pairs = HashSet::new();
    let mut result = Vec::new();

    for depth in 0..max_depth {
        if cancel.is_cancelled() {
            log::debug!("Traversal from {} cancelled before depth {}", root, depth);
            return Err(DetectiveError::Cancelled);
        }

        let level = stream::iter(std::mem::take(&mut frontier))
            .map(move |person| async move {
                store
                    .outgoing_relationships(person)
                    .await
                    .map_err(|e| level_error(root, person, e))
            })
            .buffered(fanout.max(1))
            .try_collect::<Vec<Vec<Relationship>>>();

        let edges_per_person = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                log::debug!("Traversal from {} cancelled at depth {}", root, depth);
                return Err(DetectiveError::Cancelled);
            }
            edges = level => edges?,
        };

        let mut next = VecDeque::new();
        for edge in edges_per_person.into_iter().flatten() {
            if !filter.allows(edge.kind) {
                continue;
            }
            // The reverse row of an already reported link shares its pair key.
            if added_pairs.insert(edge.pair_key()) {
                result.push(edge);
            }
            if visited.insert(edge.person_id2) {
                next.push_back(edge.person_id2);
            }
        }

        log::debug!(
            "Traversal from {}: depth {} done, {} edges, {} persons in next frontier",
            root,
            depth + 1,
            result.len(),
            next.len()
        );

        if next.is_empty() {
            break;
        }
        frontier = next;
    }

    Ok(result)
}

fn level_error(root: Uuid, person: Uuid, err: StoreError) -> DetectiveError {
    match err {
        StoreError::PersonNotFound(id) if person == root => DetectiveError::PersonNotFound(id),
        StoreError::PersonNotFound(id) => {
            log::error!(
                "Store consistency violation: person {} reached from {} through a stored edge does not exist",
                id,
                root
            );
            DetectiveError::StoreConsistency(format!(
                "person {} is referenced by a relationship but does not exist",
                id
            ))
        }
        other => other.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::RelationshipType;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    /// Fixed adjacency store that counts reads. Persons without an entry do not exist.
    #[derive(Default)]
    struct FixtureStore {
        edges: HashMap<Uuid, Vec<Relationship>>,
        calls: AtomicUsize,
        hang_on: Option<Uuid>,
        slow_on: Option<(Uuid, Duration)>,
        cancel_on_call: Mutex<Option<CancellationToken>>,
    }

    impl FixtureStore {
        fn with_persons(ids: &[Uuid]) -> Self {
            let mut store = FixtureStore::default();
            for id in ids {
                store.edges.insert(*id, Vec::new());
            }
            store
        }

        /// Store both directions, as a real store would.
        fn link(&mut self, a: Uuid, b: Uuid, kind: RelationshipType) {
            let rel = Relationship::new(a, b, kind);
            self.edges.entry(a).or_default().push(rel);
            self.edges.entry(b).or_default().push(rel.opposite());
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl RelationshipStore for FixtureStore {
        async fn outgoing_relationships(&self, person_id: Uuid) -> crate::store::Result<Vec<Relationship>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(token) = self.cancel_on_call.lock().unwrap().as_ref() {
                token.cancel();
            }
            if self.hang_on == Some(person_id) {
                std::future::pending::<()>().await;
            }
            if let Some((slow, delay)) = self.slow_on {
                if slow == person_id {
                    tokio::time::sleep(delay).await;
                }
            }
            self.edges
                .get(&person_id)
                .cloned()
                .ok_or(StoreError::PersonNotFound(person_id))
        }

        async fn set_relationship(
            &self,
            _id1: Uuid,
            _id2: Uuid,
            _kind: Option<RelationshipType>,
        ) -> crate::store::Result<()> {
            unimplemented!("read-only fixture")
        }

        async fn get_relationship(&self, id1: Uuid, id2: Uuid) -> crate::store::Result<RelationshipType> {
            Err(StoreError::RelationshipNotFound { person_id1: id1, person_id2: id2 })
        }
    }

    fn ids(n: usize) -> Vec<Uuid> {
        (0..n).map(|_| Uuid::new_v4()).collect()
    }

    /// Direction-independent view of an edge set.
    fn canonical(edges: &[Relationship]) -> HashSet<Relationship> {
        edges
            .iter()
            .map(|e| if e.person_id1 <= e.person_id2 { *e } else { e.opposite() })
            .collect()
    }

    async fn expand(store: &FixtureStore, root: Uuid, depth: usize) -> Result<Vec<Relationship>> {
        traverse_graph(store, root, depth, &TypeFilter::All, 4, &CancellationToken::new()).await
    }

    #[tokio::test]
    async fn test_depth_one_completeness() {
        let p = ids(3);
        let (a, b, c) = (p[0], p[1], p[2]);
        let mut store = FixtureStore::with_persons(&p);
        store.link(a, b, RelationshipType::Friend);
        store.link(a, c, RelationshipType::Colleague);

        let edges = expand(&store, a, 1).await.unwrap();

        assert_eq!(
            edges,
            vec![
                Relationship::new(a, b, RelationshipType::Friend),
                Relationship::new(a, c, RelationshipType::Colleague),
            ]
        );
        assert_eq!(store.calls(), 1);
    }

    #[tokio::test]
    async fn test_no_opposite_duplicate() {
        let p = ids(2);
        let mut store = FixtureStore::with_persons(&p);
        store.link(p[0], p[1], RelationshipType::Friend);

        for depth in 1..=3 {
            let edges = expand(&store, p[0], depth).await.unwrap();
            assert_eq!(edges, vec![Relationship::new(p[0], p[1], RelationshipType::Friend)]);
        }
    }

    #[tokio::test]
    async fn test_early_termination() {
        let p = ids(3);
        let (a, b, c) = (p[0], p[1], p[2]);
        let mut store = FixtureStore::with_persons(&p);
        store.link(a, b, RelationshipType::Friend);
        store.link(a, c, RelationshipType::Colleague);

        let edges = expand(&store, a, 3).await.unwrap();

        assert_eq!(edges.len(), 2);
        // Root plus its two neighbors; nothing new is found so depth 3 is never fetched.
        assert_eq!(store.calls(), 3);
    }

    #[tokio::test]
    async fn test_cycle_terminates() {
        let p = ids(3);
        let mut store = FixtureStore::with_persons(&p);
        store.link(p[0], p[1], RelationshipType::Friend);
        store.link(p[1], p[2], RelationshipType::Friend);
        store.link(p[2], p[0], RelationshipType::Friend);

        let edges = expand(&store, p[0], 5).await.unwrap();

        assert_eq!(edges.len(), 3);
        assert_eq!(store.calls(), 3);
    }

    #[tokio::test]
    async fn test_zero_depth_rejected_without_store_call() {
        let p = ids(1);
        let store = FixtureStore::with_persons(&p);

        let err = expand(&store, p[0], 0).await.unwrap_err();

        assert!(matches!(err, DetectiveError::InvalidInput(_)));
        assert_eq!(store.calls(), 0);
    }

    #[tokio::test]
    async fn test_multi_level_graph() {
        let p = ids(5);
        let (root, a, b, c, d) = (p[0], p[1], p[2], p[3], p[4]);
        let mut store = FixtureStore::with_persons(&p);
        store.link(root, a, RelationshipType::Friend);
        store.link(root, b, RelationshipType::Parent);
        store.link(a, c, RelationshipType::Colleague);
        store.link(b, c, RelationshipType::Parent);
        store.link(b, d, RelationshipType::Mentor);
        store.link(c, d, RelationshipType::Sibling);

        let edges = expand(&store, root, 2).await.unwrap();

        let expected = canonical(&[
            Relationship::new(root, a, RelationshipType::Friend),
            Relationship::new(root, b, RelationshipType::Parent),
            Relationship::new(a, c, RelationshipType::Colleague),
            Relationship::new(b, c, RelationshipType::Parent),
            Relationship::new(b, d, RelationshipType::Mentor),
        ]);
        assert_eq!(edges.len(), expected.len());
        assert_eq!(canonical(&edges), expected);

        // The link between two depth-2 persons needs a third level.
        let edges = expand(&store, root, 3).await.unwrap();
        assert_eq!(edges.len(), 6);
        assert!(canonical(&edges).is_superset(&canonical(&[Relationship::new(c, d, RelationshipType::Sibling)])));
    }

    #[tokio::test]
    async fn test_level_order_of_discovery() {
        let p = ids(4);
        let (root, a, b, c) = (p[0], p[1], p[2], p[3]);
        let mut store = FixtureStore::with_persons(&p);
        store.link(root, a, RelationshipType::Friend);
        store.link(a, c, RelationshipType::Friend);
        store.link(root, b, RelationshipType::Spouse);

        let edges = expand(&store, root, 2).await.unwrap();

        assert_eq!(
            edges,
            vec![
                Relationship::new(root, a, RelationshipType::Friend),
                Relationship::new(root, b, RelationshipType::Spouse),
                Relationship::new(a, c, RelationshipType::Friend),
            ]
        );
    }

    #[tokio::test]
    async fn test_except_filter_blocks_traversal() {
        let p = ids(3);
        let (a, b, c) = (p[0], p[1], p[2]);
        let mut store = FixtureStore::with_persons(&p);
        store.link(a, b, RelationshipType::Colleague);
        store.link(b, c, RelationshipType::Friend);

        let filter = TypeFilter::except([RelationshipType::Colleague]);
        let edges = traverse_graph(&store, a, 3, &filter, 4, &CancellationToken::new())
            .await
            .unwrap();

        assert!(edges.is_empty());
        assert_eq!(store.calls(), 1);
    }

    #[tokio::test]
    async fn test_only_filter_keeps_listed_types() {
        let p = ids(4);
        let (a, b, c, d) = (p[0], p[1], p[2], p[3]);
        let mut store = FixtureStore::with_persons(&p);
        store.link(a, b, RelationshipType::Parent);
        store.link(a, c, RelationshipType::Employer);
        store.link(b, d, RelationshipType::Parent);

        let filter = TypeFilter::only([RelationshipType::Parent, RelationshipType::Child]);
        let edges = traverse_graph(&store, a, 2, &filter, 4, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(
            edges,
            vec![
                Relationship::new(a, b, RelationshipType::Parent),
                Relationship::new(b, d, RelationshipType::Parent),
            ]
        );
    }

    /// r is the Parent of c, and f is a Friend of both.
    fn triangle() -> (FixtureStore, Uuid, Uuid, Uuid) {
        let p = ids(3);
        let (r, c, f) = (p[0], p[1], p[2]);
        let mut store = FixtureStore::with_persons(&p);
        store.link(r, c, RelationshipType::Parent);
        store.link(r, f, RelationshipType::Friend);
        store.link(f, c, RelationshipType::Friend);
        (store, r, c, f)
    }

    #[tokio::test]
    async fn test_except_filter_holds_from_either_endpoint() {
        let (store, r, c, f) = triangle();
        let filter = TypeFilter::except([RelationshipType::Parent]);

        // c is reached through f, and its Child row points back at r.
        let edges = traverse_graph(&store, r, 3, &filter, 4, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(
            edges,
            vec![
                Relationship::new(r, f, RelationshipType::Friend),
                Relationship::new(f, c, RelationshipType::Friend),
            ]
        );

        let edges = traverse_graph(&store, c, 3, &filter, 4, &CancellationToken::new())
            .await
            .unwrap();
        assert!(edges.iter().all(|e| e.kind == RelationshipType::Friend));
        assert_eq!(edges.len(), 2);
    }

    #[tokio::test]
    async fn test_only_filter_holds_from_either_endpoint() {
        let (store, r, c, _f) = triangle();
        let filter = TypeFilter::only([RelationshipType::Parent]);

        let edges = traverse_graph(&store, c, 3, &filter, 4, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(edges, vec![Relationship::new(c, r, RelationshipType::Child)]);

        let edges = traverse_graph(&store, r, 3, &filter, 4, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(edges, vec![Relationship::new(r, c, RelationshipType::Parent)]);
    }

    #[tokio::test]
    async fn test_out_of_order_fetches_keep_level_order() {
        let p = ids(5);
        let (root, a, b, c, d) = (p[0], p[1], p[2], p[3], p[4]);
        let mut store = FixtureStore::with_persons(&p);
        store.link(root, a, RelationshipType::Friend);
        store.link(root, b, RelationshipType::Sibling);
        store.link(a, c, RelationshipType::Mentor);
        store.link(b, d, RelationshipType::Employer);
        // a's read finishes well after b's.
        store.slow_on = Some((a, Duration::from_millis(50)));

        let edges = traverse_graph(&store, root, 3, &TypeFilter::All, 4, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(
            edges,
            vec![
                Relationship::new(root, a, RelationshipType::Friend),
                Relationship::new(root, b, RelationshipType::Sibling),
                Relationship::new(a, c, RelationshipType::Mentor),
                Relationship::new(b, d, RelationshipType::Employer),
            ]
        );
        // root, then a and b, then c and d.
        assert_eq!(store.calls(), 5);
    }

    #[tokio::test]
    async fn test_root_not_found() {
        let store = FixtureStore::default();
        let root = Uuid::new_v4();

        let err = expand(&store, root, 2).await.unwrap_err();

        assert!(matches!(err, DetectiveError::PersonNotFound(id) if id == root));
    }

    #[tokio::test]
    async fn test_missing_neighbor_is_consistency_violation() {
        let p = ids(1);
        let ghost = Uuid::new_v4();
        let mut store = FixtureStore::with_persons(&p);
        store
            .edges
            .get_mut(&p[0])
            .unwrap()
            .push(Relationship::new(p[0], ghost, RelationshipType::Friend));

        // Depth 1 never reads the ghost.
        assert_eq!(expand(&store, p[0], 1).await.unwrap().len(), 1);

        let err = expand(&store, p[0], 2).await.unwrap_err();
        assert!(matches!(err, DetectiveError::StoreConsistency(_)));
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let p = ids(1);
        let store = FixtureStore::with_persons(&p);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = traverse_graph(&store, p[0], 2, &TypeFilter::All, 4, &cancel)
            .await
            .unwrap_err();

        assert!(matches!(err, DetectiveError::Cancelled));
        assert_eq!(store.calls(), 0);
    }

    #[tokio::test]
    async fn test_cancel_checked_at_level_boundary() {
        let p = ids(3);
        let mut store = FixtureStore::with_persons(&p);
        store.link(p[0], p[1], RelationshipType::Friend);
        store.link(p[1], p[2], RelationshipType::Friend);
        let cancel = CancellationToken::new();
        *store.cancel_on_call.lock().unwrap() = Some(cancel.clone());

        let err = traverse_graph(&store, p[0], 3, &TypeFilter::All, 4, &cancel)
            .await
            .unwrap_err();

        assert!(matches!(err, DetectiveError::Cancelled));
        assert_eq!(store.calls(), 1);
    }

    #[tokio::test]
    async fn test_cancel_interrupts_pending_level() {
        let p = ids(2);
        let mut store = FixtureStore::with_persons(&p);
        store.link(p[0], p[1], RelationshipType::Friend);
        store.hang_on = Some(p[1]);
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let result = tokio::time::timeout(
            Duration::from_secs(5),
            traverse_graph(&store, p[0], 2, &TypeFilter::All, 4, &cancel),
        )
        .await
        .expect("traversal should stop once cancelled");

        assert!(matches!(result, Err(DetectiveError::Cancelled)));
    }
}
