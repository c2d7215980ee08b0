// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Efficient storage for rolling performance samples.

use cadence_core::telemetry::MetricCategory;
use std::collections::HashMap;

/// Number of samples kept per metric.
pub const METRIC_WINDOW: usize = 10;

/// A fixed-size circular buffer. Pushing is O(1) and never allocates.
#[derive(Debug, Clone)]
pub struct RingBuffer<T, const N: usize> {
    data: [T; N],
    index: usize,
    count: usize,
}

impl<T: Default + Copy, const N: usize> RingBuffer<T, N> {
    /// Creates a new, empty ring buffer.
    pub fn new() -> Self {
        Self {
            data: [T::default(); N],
            index: 0,
            count: 0,
        }
    }

    /// Pushes a new value into the buffer, overwriting the oldest if full.
    pub fn push(&mut self, value: T) {
        self.data[self.index] = value;
        self.index = (self.index + 1) % N;
        if self.count < N {
            self.count += 1;
        }
    }

    /// Returns the number of elements currently in the buffer.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Returns `true` if nothing was pushed since creation or the last clear.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Forgets every sample.
    pub fn clear(&mut self) {
        self.index = 0;
        self.count = 0;
    }

    /// The most recently pushed value.
    pub fn latest(&self) -> Option<T> {
        if self.count == 0 {
            return None;
        }
        Some(self.data[(self.index + N - 1) % N])
    }

    /// Returns an iterator over the values in chronological order (oldest to newest).
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        let (left, right) = self.data.split_at(self.index);
        if self.count < N {
            // Not full yet: the valid values are the first `count` slots.
            right[N - self.index..]
                .iter()
                .chain(left[..self.index].iter())
        } else {
            // Full: the oldest value sits at the write index.
            right.iter().chain(left.iter())
        }
    }
}

impl<T: Default + Copy, const N: usize> Default for RingBuffer<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> RingBuffer<f64, N> {
    /// Arithmetic mean of the values, or 0.0 when empty.
    pub fn average(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        self.iter().sum::<f64>() / self.count as f64
    }

    /// Largest value, or 0.0 when empty.
    pub fn max(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        self.iter().copied().fold(f64::MIN, f64::max)
    }
}

/// A single timestamped measurement.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MetricSample {
    /// The measured value.
    pub value: f64,
    /// Clock time of the measurement, in ms.
    pub timestamp_ms: f64,
}

#[derive(Debug, Clone)]
struct MetricSeries {
    category: MetricCategory,
    samples: RingBuffer<MetricSample, METRIC_WINDOW>,
}

impl MetricSeries {
    fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.samples.iter().map(|s| s.value)
    }
}

/// Central store for all recorded metrics, organized by name.
#[derive(Debug, Default)]
pub struct MetricStore {
    series: HashMap<String, MetricSeries>,
}

impl MetricStore {
    /// Creates a new empty metric store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a sample to the metric's rolling window.
    ///
    /// The category is fixed by the first sample recorded under a name.
    pub fn push(&mut self, name: &str, value: f64, category: MetricCategory, timestamp_ms: f64) {
        let series = self
            .series
            .entry(name.to_string())
            .or_insert_with(|| MetricSeries {
                category,
                samples: RingBuffer::new(),
            });
        if series.category != category {
            log::debug!(
                "MetricStore: '{}' recorded as {:?}, keeping original category {:?}.",
                name,
                category,
                series.category
            );
        }
        series.samples.push(MetricSample {
            value,
            timestamp_ms,
        });
    }

    /// Moving average over the window, or `None` if nothing was recorded.
    pub fn average(&self, name: &str) -> Option<f64> {
        let series = self.series.get(name)?;
        let count = series.samples.count();
        if count == 0 {
            return None;
        }
        Some(series.values().sum::<f64>() / count as f64)
    }

    /// Largest value in the window.
    pub fn max(&self, name: &str) -> Option<f64> {
        let series = self.series.get(name)?;
        series.values().reduce(f64::max)
    }

    /// Most recent sample.
    pub fn latest(&self, name: &str) -> Option<MetricSample> {
        self.series.get(name)?.samples.latest()
    }

    /// Samples currently held for a metric.
    pub fn sample_count(&self, name: &str) -> usize {
        self.series.get(name).map(|s| s.samples.count()).unwrap_or(0)
    }

    /// The category a metric was recorded under.
    pub fn category(&self, name: &str) -> Option<MetricCategory> {
        self.series.get(name).map(|s| s.category)
    }

    /// Names of every metric recorded so far, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.series.keys().cloned().collect();
        names.sort();
        names
    }

    /// Drops the window of a single metric.
    pub fn reset(&mut self, name: &str) {
        if let Some(series) = self.series.get_mut(name) {
            series.samples.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ring_buffer_push_and_iter() {
        let mut rb = RingBuffer::<f64, 3>::new();
        rb.push(1.0);
        rb.push(2.0);
        rb.push(3.0);
        rb.push(4.0); // Overwrites 1.0

        let values: Vec<f64> = rb.iter().copied().collect();
        assert_eq!(values, vec![2.0, 3.0, 4.0]);
        assert_eq!(rb.count(), 3);
        assert_eq!(rb.latest(), Some(4.0));
    }

    #[test]
    fn test_ring_buffer_partial_iter_order() {
        let mut rb = RingBuffer::<f64, 4>::new();
        rb.push(5.0);
        rb.push(6.0);
        let values: Vec<f64> = rb.iter().copied().collect();
        assert_eq!(values, vec![5.0, 6.0]);
    }

    #[test]
    fn test_ring_buffer_average_and_max() {
        let mut rb = RingBuffer::<f64, 4>::new();
        rb.push(10.0);
        rb.push(20.0);
        assert_eq!(rb.average(), 15.0);
        assert_eq!(rb.max(), 20.0);
    }

    #[test]
    fn test_ring_buffer_empty_and_clear() {
        let mut rb = RingBuffer::<f64, 4>::new();
        assert_eq!(rb.average(), 0.0);
        assert_eq!(rb.latest(), None);
        rb.push(1.0);
        rb.clear();
        assert!(rb.is_empty());
        assert_eq!(rb.iter().count(), 0);
    }

    #[test]
    fn test_store_window_is_bounded() {
        let mut store = MetricStore::new();
        for i in 0..(METRIC_WINDOW * 3) {
            store.push("flush_time", i as f64, MetricCategory::Timing, i as f64);
        }
        assert_eq!(store.sample_count("flush_time"), METRIC_WINDOW);

        // Only the last METRIC_WINDOW values (20..30) remain.
        let expected = (20..30).sum::<usize>() as f64 / METRIC_WINDOW as f64;
        assert!((store.average("flush_time").unwrap() - expected).abs() < 1e-9);
        assert_eq!(store.max("flush_time"), Some(29.0));
        assert_eq!(store.latest("flush_time").unwrap().timestamp_ms, 29.0);
    }

    #[test]
    fn test_store_unknown_metric() {
        let store = MetricStore::new();
        assert_eq!(store.average("missing"), None);
        assert_eq!(store.sample_count("missing"), 0);
    }

    #[test]
    fn test_store_keeps_first_category_and_resets() {
        let mut store = MetricStore::new();
        store.push("x", 1.0, MetricCategory::Custom, 0.0);
        store.push("x", 2.0, MetricCategory::Timing, 1.0);
        assert_eq!(store.category("x"), Some(MetricCategory::Custom));
        store.reset("x");
        assert_eq!(store.sample_count("x"), 0);
        assert_eq!(store.names(), vec!["x".to_string()]);
    }
}
