//! Vigilance Monitor — drift guard against an immutable reference.
//!
//! A guard, not an attractor: it observes, accumulates drift, and
//! classifies, but never pushes the state back. `cumulative_drift` only
//! grows until an explicit external reset.

use conatus_core::config::VigilanceConfig;
use conatus_core::tensor::{
    cosine, l2_norm, normalized_euclidean, Channel, StateTensor, CHANNEL_COUNT,
};
use conatus_core::types::{VigilanceAlert, VigilanceLevel};
use conatus_core::Result;
use std::collections::VecDeque;
use tracing::{debug, info};

pub struct VigilanceMonitor {
    config: VigilanceConfig,
    reference: StateTensor,
    reference_flat: Vec<f32>,
    cumulative_drift: f32,
    /// Flattened previously-observed state. None before the first check.
    previous_flat: Option<Vec<f32>>,
    history: VecDeque<VigilanceAlert>,
}

impl VigilanceMonitor {
    /// The reference is fixed for the run and tagged sequence −1 whatever
    /// tensor it was built from.
    pub fn new(config: VigilanceConfig, reference: &StateTensor) -> Result<Self> {
        config.validate()?;
        let reference = StateTensor::reference(reference);
        let reference_flat = reference.flatten();
        Ok(Self {
            config,
            reference,
            reference_flat,
            cumulative_drift: 0.0,
            previous_flat: None,
            history: VecDeque::new(),
        })
    }

    pub fn reference(&self) -> &StateTensor {
        &self.reference
    }

    pub fn cumulative_drift(&self) -> f32 {
        self.cumulative_drift
    }

    pub fn history(&self) -> impl Iterator<Item = &VigilanceAlert> {
        self.history.iter()
    }

    /// Explicit external reset — the only way cumulative drift decreases.
    pub fn reset_cumulative(&mut self) {
        info!(
            previous = self.cumulative_drift,
            "vigilance cumulative drift reset"
        );
        self.cumulative_drift = 0.0;
    }

    /// Observe a state. Pure with respect to the inspected tensor; never
    /// errors. Mutates only the monitor's own accumulators and history.
    pub fn check(&mut self, state: &StateTensor) -> VigilanceAlert {
        let mut channel_distances = [0.0f32; CHANNEL_COUNT];
        for channel in Channel::ALL {
            channel_distances[channel.index()] =
                channel_distance(state.channel(channel), self.reference.channel(channel));
        }

        let flat = state.flatten();
        let global_distance = normalized_euclidean(&flat, &self.reference_flat);

        let cycle_drift = match &self.previous_flat {
            Some(previous) => normalized_euclidean(&flat, previous),
            None => 0.0,
        };
        self.cumulative_drift += cycle_drift;
        self.previous_flat = Some(flat);

        let drifted = channel_distances
            .iter()
            .filter(|d| **d > self.config.threshold_per_dimension)
            .count();

        let critical_threshold =
            self.config.threshold_cumulative * self.config.critical_multiplier;
        let level = if self.cumulative_drift > critical_threshold {
            VigilanceLevel::Critical
        } else if self.cumulative_drift > self.config.threshold_cumulative || drifted > 2 {
            VigilanceLevel::Warning
        } else if cycle_drift > self.config.cycle_drift_threshold {
            VigilanceLevel::Warning
        } else {
            VigilanceLevel::Ok
        };

        let mut ranked: Vec<(Channel, f32)> = Channel::ALL
            .into_iter()
            .map(|c| (c, channel_distances[c.index()]))
            .collect();
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        ranked.truncate(3);

        let message = format!(
            "drift {}: cumulative {:.4}, cycle {:.4}, global {:.4}, {} channels over per-dimension threshold",
            level.as_str(),
            self.cumulative_drift,
            cycle_drift,
            global_distance,
            drifted
        );
        debug!(%message, seq = state.sequence, "vigilance check");

        let alert = VigilanceAlert {
            level,
            message,
            channel_distances,
            global_distance,
            cumulative_drift: self.cumulative_drift,
            cycle_drift,
            top_channels: ranked,
            state_seq: state.sequence,
            created_at: chrono::Utc::now(),
        };

        self.history.push_back(alert.clone());
        while self.history.len() > self.config.alert_history {
            self.history.pop_front();
        }

        alert
    }
}

/// Cosine distance between two channel vectors, 0 identical to 2 opposite.
/// Two never-written (zero) channels are identical, not maximally distant.
fn channel_distance(a: &[f32], b: &[f32]) -> f32 {
    if l2_norm(a) <= f32::EPSILON && l2_norm(b) <= f32::EPSILON {
        return 0.0;
    }
    1.0 - cosine(a, b)
}
