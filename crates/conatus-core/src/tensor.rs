//! State tensor — the 8-channel numeric identity value type.
//!
//! A `StateTensor` is an immutable snapshot: 8 named channels, each a
//! fixed-length unit vector. The daemon owns the "current" pointer and
//! replaces it atomically each cycle; history is an append-only chain via
//! `previous`.

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Fixed channel dimensionality. Every channel vector and every input
/// vector crossing the embedding boundary has this length.
pub const CHANNEL_DIM: usize = 1024;

/// Number of channels composing a tensor.
pub const CHANNEL_COUNT: usize = 8;

/// One of the 8 named directions composing the state tensor.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Values,
    Beliefs,
    Memory,
    Habits,
    Affect,
    Relations,
    Narrative,
    Tension,
}

impl Channel {
    /// All channels in flatten order. The order is part of the format:
    /// `flatten` and the global distance math depend on it.
    pub const ALL: [Channel; CHANNEL_COUNT] = [
        Channel::Values,
        Channel::Beliefs,
        Channel::Memory,
        Channel::Habits,
        Channel::Affect,
        Channel::Relations,
        Channel::Narrative,
        Channel::Tension,
    ];

    pub fn index(self) -> usize {
        Self::ALL.iter().position(|c| *c == self).unwrap_or(0)
    }

    pub fn from_index(index: usize) -> Option<Channel> {
        Self::ALL.get(index).copied()
    }

    pub fn name(self) -> &'static str {
        match self {
            Channel::Values => "values",
            Channel::Beliefs => "beliefs",
            Channel::Memory => "memory",
            Channel::Habits => "habits",
            Channel::Affect => "affect",
            Channel::Relations => "relations",
            Channel::Narrative => "narrative",
            Channel::Tension => "tension",
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

// ---------------------------------------------------------------------------
// Vector math primitives
// ---------------------------------------------------------------------------

/// L2 norm of a vector.
#[inline]
pub fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Normalize a vector to unit length in place.
/// Does nothing on a zero-magnitude vector (avoids division by zero).
#[inline]
pub fn normalize(v: &mut [f32]) {
    let norm = l2_norm(v);
    if norm > f32::EPSILON {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

/// Cosine similarity of two vectors.
///
/// Degenerate inputs — mismatched lengths, empty or zero-magnitude
/// vectors — score 0.0 (maximal distance) rather than erroring. Scoring
/// must stay available every cycle.
#[inline]
pub fn cosine(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let na = l2_norm(a);
    let nb = l2_norm(b);
    if na <= f32::EPSILON || nb <= f32::EPSILON {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    dot / (na * nb)
}

/// Euclidean distance between two equal-length vectors, normalized by
/// `sqrt(len)` so the value is dimension-independent.
#[inline]
pub fn normalized_euclidean(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let sum: f32 = a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum();
    sum.sqrt() / (a.len() as f32).sqrt()
}

// ---------------------------------------------------------------------------
// StateTensor
// ---------------------------------------------------------------------------

/// Multi-channel identity state. Immutable snapshot; every write produces
/// a new tensor with `sequence + 1` and `previous` pointing back.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StateTensor {
    /// Channel vectors in `Channel::ALL` order. Invariant: each has unit
    /// L2 norm, except the all-zero vector before its first write.
    channels: Vec<Vec<f32>>,
    /// Monotonic sequence id. The reference tensor uses −1.
    pub sequence: i64,
    pub created_at: DateTime<Utc>,
    /// Lineage: sequence id of the tensor this one was derived from.
    pub previous: Option<i64>,
    /// Label of the trigger that produced this snapshot.
    pub origin: String,
    pub provenance: String,
}

impl StateTensor {
    /// Zero-initialized tensor. All channels are the zero vector, which is
    /// legal only in this pre-first-write condition.
    pub fn zeroed() -> Self {
        Self {
            channels: vec![vec![0.0; CHANNEL_DIM]; CHANNEL_COUNT],
            sequence: 0,
            created_at: Utc::now(),
            previous: None,
            origin: "genesis".to_string(),
            provenance: "local".to_string(),
        }
    }

    /// Construct from 8 channel vectors. Each is checked against
    /// `CHANNEL_DIM` and normalized to unit length.
    pub fn from_channels(channels: Vec<Vec<f32>>) -> Result<Self> {
        if channels.len() != CHANNEL_COUNT {
            return Err(Error::DimensionMismatch {
                expected: CHANNEL_COUNT,
                actual: channels.len(),
            });
        }
        let mut tensor = Self::zeroed();
        for (channel, vector) in Channel::ALL.into_iter().zip(channels) {
            tensor.write_channel(channel, vector)?;
        }
        Ok(tensor)
    }

    /// Tag a tensor as the fixed vigilance reference: sequence −1, never
    /// produced or mutated by the cycle path.
    pub fn reference(base: &StateTensor) -> Self {
        let mut tensor = base.deep_copy();
        tensor.sequence = -1;
        tensor.previous = None;
        tensor.origin = "reference".to_string();
        tensor.provenance = "reference".to_string();
        tensor
    }

    pub fn channel(&self, channel: Channel) -> &[f32] {
        &self.channels[channel.index()]
    }

    /// True once the channel has received its first write.
    pub fn is_written(&self, channel: Channel) -> bool {
        l2_norm(self.channel(channel)) > f32::EPSILON
    }

    /// Replace one channel. The vector is normalized to unit length; a
    /// wrong-length vector is rejected before any mutation.
    pub fn set_channel(&mut self, channel: Channel, vector: Vec<f32>) -> Result<()> {
        self.write_channel(channel, vector)
    }

    fn write_channel(&mut self, channel: Channel, mut vector: Vec<f32>) -> Result<()> {
        if vector.len() != CHANNEL_DIM {
            return Err(Error::DimensionMismatch {
                expected: CHANNEL_DIM,
                actual: vector.len(),
            });
        }
        normalize(&mut vector);
        self.channels[channel.index()] = vector;
        Ok(())
    }

    /// Concatenate all channels in fixed order for global distance math.
    pub fn flatten(&self) -> Vec<f32> {
        let mut flat = Vec::with_capacity(CHANNEL_COUNT * CHANNEL_DIM);
        for channel in &self.channels {
            flat.extend_from_slice(channel);
        }
        flat
    }

    /// Independent copy. Mutating the copy never affects the original.
    pub fn deep_copy(&self) -> Self {
        self.clone()
    }

    /// Start the next snapshot in the lineage: same channels, sequence
    /// bumped, `previous` pointing back here.
    pub fn successor(&self, origin: impl Into<String>) -> Self {
        Self {
            channels: self.channels.clone(),
            sequence: self.sequence + 1,
            created_at: Utc::now(),
            previous: Some(self.sequence),
            origin: origin.into(),
            provenance: self.provenance.clone(),
        }
    }

    /// Per-channel weighted sum of several tensors, renormalized.
    ///
    /// A channel whose weighted sum has zero norm is kept as the zero
    /// vector rather than divided by zero.
    pub fn weighted_blend(tensors: &[&StateTensor], weights: &[f32]) -> Result<StateTensor> {
        if tensors.is_empty() || tensors.len() != weights.len() {
            return Err(Error::DimensionMismatch {
                expected: tensors.len().max(1),
                actual: weights.len(),
            });
        }
        let mut blended = StateTensor::zeroed();
        blended.origin = "blend".to_string();
        for channel in Channel::ALL {
            let mut sum = vec![0.0f32; CHANNEL_DIM];
            for (tensor, weight) in tensors.iter().zip(weights) {
                for (acc, x) in sum.iter_mut().zip(tensor.channel(channel)) {
                    *acc += weight * x;
                }
            }
            normalize(&mut sum);
            blended.channels[channel.index()] = sum;
        }
        Ok(blended)
    }
}
