use std::collections::BTreeMap;

use telemetry_proto::{BeliefGrid, TrackerRecord};

/// Belief grids recorded for one frame, keyed by entity index.
pub type EntityBeliefs = BTreeMap<usize, BeliefGrid>;

/// Per-frame belief grids, filled once while a replay loads.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BeliefTensorStore {
    frames: BTreeMap<u64, EntityBeliefs>,
    empty: EntityBeliefs,
}

impl BeliefTensorStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(records: impl IntoIterator<Item = TrackerRecord>) -> Self {
        let mut store = Self::new();
        for record in records {
            store.frames.entry(record.frame_index).or_default();
            for (entity, grid) in record.tensor.entities.into_iter().enumerate() {
                store.put(record.frame_index, entity, grid);
            }
        }
        store
    }

    /// Record one entity's grid. An existing `(frame, entity)` entry is kept
    /// and the new grid is dropped; returns whether the grid was stored.
    pub fn put(&mut self, frame_index: u64, entity_index: usize, grid: BeliefGrid) -> bool {
        let entities = self.frames.entry(frame_index).or_default();
        if entities.contains_key(&entity_index) {
            tracing::warn!(
                target: "match_inspector::replay",
                frame_index,
                entity_index,
                "belief_store.duplicate_ignored"
            );
            return false;
        }
        entities.insert(entity_index, grid);
        true
    }

    /// Grids for `frame_index`; empty when nothing was recorded for it.
    pub fn get(&self, frame_index: u64) -> &EntityBeliefs {
        self.frames.get(&frame_index).unwrap_or(&self.empty)
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn frame_indices(&self) -> impl Iterator<Item = u64> + '_ {
        self.frames.keys().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use telemetry_proto::BeliefTensor;

    #[test]
    fn unknown_frame_is_empty() {
        let store = BeliefTensorStore::new();
        assert!(store.get(0).is_empty());
        assert!(store.get(u64::MAX).is_empty());
    }

    #[test]
    fn records_are_split_per_entity() {
        let store = BeliefTensorStore::from_records([TrackerRecord {
            frame_index: 4,
            tensor: BeliefTensor::new(vec![vec![vec![0.5]], vec![], vec![vec![0.1, 0.2]]]),
        }]);
        let beliefs = store.get(4);
        assert_eq!(beliefs.len(), 3);
        assert_eq!(beliefs[&0], vec![vec![0.5]]);
        assert!(beliefs[&1].is_empty());
        assert_eq!(store.frame_count(), 1);
        assert_eq!(store.frame_indices().collect::<Vec<_>>(), vec![4]);
    }

    #[test]
    fn duplicate_put_keeps_first_grid() {
        let mut store = BeliefTensorStore::new();
        assert!(store.put(1, 0, vec![vec![0.3]]));
        assert!(!store.put(1, 0, vec![vec![0.9]]));
        assert_eq!(store.get(1)[&0], vec![vec![0.3]]);
    }

    #[test]
    fn record_without_entities_still_counts_as_a_frame() {
        let store = BeliefTensorStore::from_records([
            TrackerRecord {
                frame_index: 0,
                tensor: BeliefTensor::new(Vec::new()),
            },
            TrackerRecord {
                frame_index: 1,
                tensor: BeliefTensor::new(vec![vec![vec![0.5]]]),
            },
        ]);
        assert_eq!(store.frame_indices().collect::<Vec<_>>(), vec![0, 1]);
        assert!(store.get(0).is_empty());
    }
}
