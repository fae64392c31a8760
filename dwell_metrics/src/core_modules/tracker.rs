// THEORY:
// The `tracker` module gives detections "object permanence". A detector only says
// "there is a person here" in each frame; the tracker decides that the person in
// this frame is the same one as in the last frame and hands out a stable integer
// id. Those ids are what the dwell-time accumulator keys on.
//
// The pipeline only depends on the `ObjectTracker` trait. `CentroidTracker` is the
// minimal implementation the live runner uses:
// 1.  **Association**: every (object, detection) pair is scored by the distance
//     between their box centers. Pairs are taken closest-first, each object and
//     each detection at most once, and only while the distance is within
//     `max_distance`.
// 2.  **Birth**: an unmatched detection registers a new object with the next id.
//     Ids count up from zero and are never handed out twice.
// 3.  **Occlusion and Death**: an unmatched object keeps its last prediction and is
//     still reported, until it has been missing for more than `deregister_frames`
//     consecutive frames, at which point it is dropped.

use crate::core_modules::detection::Prediction;
use crate::core_modules::metrics_manager::ObjectId;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};

/// Associates detections across frames and assigns stable ids.
pub trait ObjectTracker {
    /// Feeds one frame's detections and returns every object still being tracked.
    fn update(&mut self, predictions: Vec<Prediction>) -> BTreeMap<ObjectId, Prediction>;
}

/// An object followed across frames by `CentroidTracker`.
#[derive(Debug, Clone)]
struct TrackedObject {
    latest: Prediction,
    /// Consecutive frames without a matching detection.
    frames_since_seen: u32,
}

impl TrackedObject {
    fn centroid(&self) -> (f64, f64) {
        self.latest.bbox.center()
    }
}

/// Nearest-centroid tracker with a miss budget.
#[derive(Debug, Clone)]
pub struct CentroidTracker {
    objects: BTreeMap<ObjectId, TrackedObject>,
    next_id: u64,
    deregister_frames: u32,
    max_distance: f64,
}

impl CentroidTracker {
    pub fn new(deregister_frames: u32, max_distance: f64) -> Self {
        Self {
            objects: BTreeMap::new(),
            next_id: 0,
            deregister_frames,
            max_distance,
        }
    }

    fn register(&mut self, prediction: Prediction) {
        let id = ObjectId::new(self.next_id);
        self.next_id += 1;
        self.objects.insert(
            id,
            TrackedObject {
                latest: prediction,
                frames_since_seen: 0,
            },
        );
    }

    fn tracked(&self) -> BTreeMap<ObjectId, Prediction> {
        self.objects
            .iter()
            .map(|(id, object)| (*id, object.latest.clone()))
            .collect()
    }
}

impl ObjectTracker for CentroidTracker {
    fn update(&mut self, predictions: Vec<Prediction>) -> BTreeMap<ObjectId, Prediction> {
        // --- 1. Matching ---
        let mut pairs: Vec<(f64, ObjectId, usize)> = Vec::new();
        for (id, object) in &self.objects {
            let (ox, oy) = object.centroid();
            for (j, prediction) in predictions.iter().enumerate() {
                let (px, py) = prediction.bbox.center();
                let dist = ((ox - px).powi(2) + (oy - py).powi(2)).sqrt();
                if dist <= self.max_distance {
                    pairs.push((dist, *id, j));
                }
            }
        }
        pairs.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));

        let mut matched_ids: HashSet<ObjectId> = HashSet::new();
        let mut matched_predictions: HashSet<usize> = HashSet::new();
        let mut matches: Vec<(ObjectId, usize)> = Vec::new();
        for (_, id, j) in pairs {
            if matched_ids.contains(&id) || matched_predictions.contains(&j) {
                continue;
            }
            matched_ids.insert(id);
            matched_predictions.insert(j);
            matches.push((id, j));
        }

        // --- 2. State Updating ---
        let mut predictions: Vec<Option<Prediction>> = predictions.into_iter().map(Some).collect();
        for (id, j) in matches {
            if let (Some(object), Some(prediction)) = (self.objects.get_mut(&id), predictions[j].take()) {
                object.latest = prediction;
                object.frames_since_seen = 0;
            }
        }

        // Objects that were not matched (occlusion or death).
        let deregister_frames = self.deregister_frames;
        self.objects.retain(|id, object| {
            if matched_ids.contains(id) {
                return true;
            }
            object.frames_since_seen += 1;
            object.frames_since_seen <= deregister_frames
        });

        // Detections that were not matched (birth).
        for prediction in predictions.into_iter().flatten() {
            self.register(prediction);
        }

        self.tracked()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::detection::BoundingBox;

    fn person_at(x: f64, y: f64) -> Prediction {
        Prediction::new("person", 0.9, BoundingBox::new(x - 5.0, y - 5.0, x + 5.0, y + 5.0))
    }

    fn ids(tracked: &BTreeMap<ObjectId, Prediction>) -> Vec<u64> {
        tracked.keys().map(|id| id.get()).collect()
    }

    #[test]
    fn new_detections_get_sequential_ids() {
        let mut tracker = CentroidTracker::new(20, 50.0);
        let tracked = tracker.update(vec![person_at(10.0, 10.0), person_at(200.0, 200.0)]);
        assert_eq!(ids(&tracked), vec![0, 1]);
    }

    #[test]
    fn nearby_detection_keeps_its_id() {
        let mut tracker = CentroidTracker::new(20, 50.0);
        tracker.update(vec![person_at(10.0, 10.0), person_at(200.0, 200.0)]);
        let tracked = tracker.update(vec![person_at(210.0, 205.0), person_at(15.0, 12.0)]);

        assert_eq!(ids(&tracked), vec![0, 1]);
        assert_eq!(tracked[&ObjectId::new(0)].bbox.center(), (15.0, 12.0));
        assert_eq!(tracked[&ObjectId::new(1)].bbox.center(), (210.0, 205.0));
    }

    #[test]
    fn distant_detection_is_a_new_object() {
        let mut tracker = CentroidTracker::new(20, 50.0);
        tracker.update(vec![person_at(10.0, 10.0)]);
        let tracked = tracker.update(vec![person_at(300.0, 10.0)]);

        // The first object is missing but still within its miss budget.
        assert_eq!(ids(&tracked), vec![0, 1]);
        assert_eq!(tracked[&ObjectId::new(0)].bbox.center(), (10.0, 10.0));
    }

    #[test]
    fn object_is_dropped_after_miss_budget() {
        let mut tracker = CentroidTracker::new(2, 50.0);
        tracker.update(vec![person_at(10.0, 10.0)]);

        assert_eq!(ids(&tracker.update(Vec::new())), vec![0]);
        assert_eq!(ids(&tracker.update(Vec::new())), vec![0]);
        assert!(tracker.update(Vec::new()).is_empty());

        // A returning person is a new id; old ids are never reused.
        assert_eq!(ids(&tracker.update(vec![person_at(10.0, 10.0)])), vec![1]);
    }

    #[test]
    fn each_detection_matches_at_most_one_object() {
        let mut tracker = CentroidTracker::new(20, 50.0);
        tracker.update(vec![person_at(10.0, 10.0), person_at(30.0, 10.0)]);
        let tracked = tracker.update(vec![person_at(20.0, 10.0)]);

        assert_eq!(ids(&tracked), vec![0, 1]);
        let moved: Vec<_> = tracked
            .values()
            .filter(|p| p.bbox.center() == (20.0, 10.0))
            .collect();
        assert_eq!(moved.len(), 1);
    }
}
