//! Bounded per-entity sample windows.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, VecDeque};

use wellwatch_core::TelemetrySample;

use crate::error::WindowError;

/// Fixed-capacity FIFO of samples for one entity, oldest first.
#[derive(Debug, Clone)]
pub struct EntityWindow {
    buf: VecDeque<TelemetrySample>,
    capacity: usize,
}

impl EntityWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Push a sample, evicting the oldest if at capacity.
    pub fn push(&mut self, sample: TelemetrySample) {
        if self.buf.len() == self.capacity {
            self.buf.pop_front();
        }
        self.buf.push_back(sample);
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn latest(&self) -> Option<&TelemetrySample> {
        self.buf.back()
    }

    /// Iterate from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &TelemetrySample> {
        self.buf.iter()
    }

    /// The newest `length` samples, oldest first.
    pub fn tail(&self, length: usize) -> impl Iterator<Item = &TelemetrySample> {
        self.buf.iter().skip(self.buf.len().saturating_sub(length))
    }
}

/// Owns every entity's window. Windows never share state, so one store per
/// shard is enough for per-entity parallelism.
#[derive(Debug)]
pub struct EntityWindowStore {
    window_size: usize,
    max_buffer: usize,
    windows: HashMap<String, EntityWindow>,
}

impl EntityWindowStore {
    /// `max_buffer` is fixed at twice `window_size`.
    pub fn new(window_size: usize) -> Self {
        Self {
            window_size,
            max_buffer: window_size.saturating_mul(2).max(1),
            windows: HashMap::new(),
        }
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    pub fn max_buffer(&self) -> usize {
        self.max_buffer
    }

    /// Append at the tail of the sample's entity window. Returns `true` when
    /// this created the entity's window.
    pub fn append(&mut self, sample: TelemetrySample) -> bool {
        match self.windows.entry(sample.entity_id().to_string()) {
            Entry::Occupied(mut e) => {
                e.get_mut().push(sample);
                false
            }
            Entry::Vacant(e) => {
                e.insert(EntityWindow::new(self.max_buffer)).push(sample);
                true
            }
        }
    }

    pub fn is_ready(&self, entity_id: &str) -> bool {
        self.buffered(entity_id) >= self.window_size
    }

    pub fn buffered(&self, entity_id: &str) -> usize {
        self.windows.get(entity_id).map_or(0, EntityWindow::len)
    }

    pub fn latest(&self, entity_id: &str) -> Option<&TelemetrySample> {
        self.windows.get(entity_id).and_then(EntityWindow::latest)
    }

    /// The newest `length` samples of an entity in arrival order.
    pub fn extract_sequence(
        &self,
        entity_id: &str,
        length: usize,
    ) -> Result<Vec<&TelemetrySample>, WindowError> {
        let buffered = self.buffered(entity_id);
        if buffered < self.window_size || buffered < length {
            return Err(WindowError::NotReady {
                entity_id: entity_id.to_string(),
                buffered,
                required: length.max(self.window_size),
            });
        }
        let window = self.windows.get(entity_id).ok_or_else(|| WindowError::NotReady {
            entity_id: entity_id.to_string(),
            buffered: 0,
            required: length,
        })?;
        Ok(window.tail(length).collect())
    }

    pub fn window(&self, entity_id: &str) -> Option<&EntityWindow> {
        self.windows.get(entity_id)
    }

    pub fn entity_count(&self) -> usize {
        self.windows.len()
    }
}
