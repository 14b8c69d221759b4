//! Time-indexed record of recent odometry poses.

use std::collections::VecDeque;

use crate::common::Pose2D;

/// Poses recorded over a sliding time window, sampled with interpolation.
#[derive(Debug, Clone)]
pub struct PoseHistory {
    window: f64,
    entries: VecDeque<(f64, Pose2D)>,
}

impl PoseHistory {
    /// Keep poses no older than `window` seconds behind the newest one.
    pub fn new(window: f64) -> Self {
        PoseHistory {
            window,
            entries: VecDeque::new(),
        }
    }

    pub fn window(&self) -> f64 {
        self.window
    }

    /// Record `pose` at `timestamp`.
    ///
    /// A timestamp at or before the newest entry replaces everything from
    /// that time on, so the buffer always stays sorted.
    pub fn record(&mut self, timestamp: f64, pose: Pose2D) {
        while matches!(self.entries.back(), Some((t, _)) if *t >= timestamp) {
            self.entries.pop_back();
        }
        self.entries.push_back((timestamp, pose));

        let cutoff = timestamp - self.window;
        while matches!(self.entries.front(), Some((t, _)) if *t < cutoff) {
            self.entries.pop_front();
        }
    }

    pub fn newest_timestamp(&self) -> Option<f64> {
        self.entries.back().map(|(t, _)| *t)
    }

    pub fn oldest_timestamp(&self) -> Option<f64> {
        self.entries.front().map(|(t, _)| *t)
    }

    /// Pose at `timestamp`, interpolated between neighbours and clamped to
    /// the recorded range. `None` when nothing has been recorded.
    pub fn sample(&self, timestamp: f64) -> Option<Pose2D> {
        let (first_t, first) = *self.entries.front()?;
        let (last_t, last) = *self.entries.back()?;
        if timestamp <= first_t {
            return Some(first);
        }
        if timestamp >= last_t {
            return Some(last);
        }

        let upper = self.entries.partition_point(|(t, _)| *t < timestamp);
        let (t1, p1) = self.entries[upper];
        if t1 == timestamp {
            return Some(p1);
        }
        let (t0, p0) = self.entries[upper - 1];
        Some(p0.interpolate(&p1, (timestamp - t0) / (t1 - t0)))
    }

    /// Re-express every entry at or after `timestamp` relative to
    /// `corrected` instead of `reference`, keeping the motion since then.
    pub fn shift_from(&mut self, timestamp: f64, reference: &Pose2D, corrected: &Pose2D) {
        for (t, pose) in self.entries.iter_mut() {
            if *t >= timestamp {
                *pose = corrected.transform_by(&pose.relative_to(reference));
            }
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_empty_history_has_no_sample() {
        assert!(PoseHistory::new(1.5).sample(0.0).is_none());
    }

    #[test]
    fn test_sample_interpolates_and_clamps() {
        let mut history = PoseHistory::new(1.5);
        history.record(1.0, Pose2D::from_degrees(0.0, 0.0, 0.0));
        history.record(2.0, Pose2D::from_degrees(2.0, 0.0, 0.0));

        assert_relative_eq!(history.sample(1.5).unwrap().x, 1.0, epsilon = 1e-12);
        assert_relative_eq!(history.sample(0.0).unwrap().x, 0.0);
        assert_relative_eq!(history.sample(9.0).unwrap().x, 2.0);
        assert_relative_eq!(history.sample(2.0).unwrap().x, 2.0);
    }

    #[test]
    fn test_old_entries_are_pruned() {
        let mut history = PoseHistory::new(1.0);
        for i in 0..=30 {
            history.record(i as f64 * 0.1, Pose2D::default());
        }
        assert!(history.oldest_timestamp().unwrap() >= 2.0 - 1e-9);
        assert_relative_eq!(history.newest_timestamp().unwrap(), 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_rewound_timestamp_replaces_tail() {
        let mut history = PoseHistory::new(5.0);
        history.record(1.0, Pose2D::default());
        history.record(2.0, Pose2D::default());
        history.record(1.5, Pose2D::from_degrees(1.0, 0.0, 0.0));
        assert_eq!(history.len(), 2);
        assert_relative_eq!(history.newest_timestamp().unwrap(), 1.5);
    }

    #[test]
    fn test_shift_from_moves_later_entries_only() {
        let mut history = PoseHistory::new(5.0);
        history.record(1.0, Pose2D::from_degrees(0.0, 0.0, 0.0));
        history.record(2.0, Pose2D::from_degrees(1.0, 0.0, 0.0));

        let reference = Pose2D::from_degrees(0.0, 0.0, 0.0);
        let corrected = Pose2D::from_degrees(0.0, 1.0, 90.0);
        history.shift_from(1.0, &reference, &corrected);

        let later = history.sample(2.0).unwrap();
        assert_relative_eq!(later.x, 0.0, epsilon = 1e-12);
        assert_relative_eq!(later.y, 2.0, epsilon = 1e-12);
        assert_relative_eq!(later.rotation.degrees(), 90.0, epsilon = 1e-9);
    }
}
