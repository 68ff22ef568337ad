//! Where a non-replacing insert lands.
//!
//! Each context (slide) keeps its own cascade: successive inserts step
//! diagonally from a base offset, wrap after `max_steps`, and restart from
//! the base once the context has been idle for `idle_reset`.

use std::collections::HashMap;

use tokio::time::Instant;

use super::host::Bounds;
use crate::config::InsertConfig;

#[derive(Debug, Clone, Copy)]
struct InsertPositionState {
    offset_index: u32,
    last_used_at: Instant,
}

pub struct CascadeTracker {
    config: InsertConfig,
    states: HashMap<String, InsertPositionState>,
}

impl CascadeTracker {
    pub fn new(config: InsertConfig) -> Self {
        Self {
            config,
            states: HashMap::new(),
        }
    }

    /// Next default position in `context`, advancing its cascade
    pub fn next(&mut self, context: &str, now: Instant) -> Bounds {
        let steps = self.config.max_steps.max(1);
        let idle_reset = self.config.idle_reset();

        // Idle contexts restart from the base, so their state can go
        self.states
            .retain(|_, state| now.saturating_duration_since(state.last_used_at) < idle_reset);

        let state = self
            .states
            .entry(context.to_string())
            .or_insert(InsertPositionState {
                offset_index: 0,
                last_used_at: now,
            });

        let index = state.offset_index % steps;
        state.offset_index = (index + 1) % steps;
        state.last_used_at = now;

        let offset = self.config.step * f64::from(index);
        Bounds {
            left: self.config.base_left + offset,
            top: self.config.base_top + offset,
            width: self.config.default_width,
            height: self.config.default_height,
        }
    }
}

/// Short-lived memo of the active context identity
pub struct ContextCache {
    ttl: std::time::Duration,
    current: Option<(String, Instant)>,
}

impl ContextCache {
    pub fn new(ttl: std::time::Duration) -> Self {
        Self { ttl, current: None }
    }

    pub fn get(&self, now: Instant) -> Option<&str> {
        match self.current {
            Some((ref id, at)) if now.saturating_duration_since(at) < self.ttl => Some(id),
            _ => None,
        }
    }

    pub fn set(&mut self, id: String, now: Instant) {
        self.current = Some((id, now));
    }
}
