//! Fixation Engine — the bounded update law.
//!
//! Four sub-methods each turn (input, state, corpus) into a directional
//! contribution; their weighted sum is clamped to the per-cycle change
//! budget `delta_max` and applied as a new state snapshot. The clamp is a
//! hard invariant: no single cycle moves the tensor further than
//! `delta_max`, whatever the inputs.

use conatus_core::config::{AnchorKind, FixationApply, FixationConfig};
use conatus_core::error::Result;
use conatus_core::tensor::{cosine, l2_norm, normalize, Channel, StateTensor, CHANNEL_DIM};
use conatus_core::types::CorpusHit;
use serde::Serialize;
use tracing::debug;

/// Channels the A Priori method measures coherence against.
const APRIORI_CHANNELS: [Channel; 3] = [Channel::Values, Channel::Beliefs, Channel::Narrative];

/// Typed outcome of one sub-method, one variant per method.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum MethodOutcome {
    Tenacity {
        habit_similarity: f32,
        reinforced: bool,
    },
    Authority {
        aligned: Vec<String>,
        violated: Vec<String>,
        /// No anchors configured — deliberate neutral default.
        neutral: bool,
    },
    APriori {
        coherence: f32,
        full_integration: bool,
    },
    Science {
        corroboration: Option<f32>,
        mode: ScienceMode,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScienceMode {
    /// Strong corroboration — full integration of the input direction.
    Integrate,
    /// No corpus results — small cautious step toward tension.
    Caution,
    /// Low corroboration — tension step in the opposite sense.
    Tension,
}

/// Where the clamped delta is written.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplyTarget {
    Channel(Channel),
    Distributed,
}

/// The combined, clamped update for one cycle.
#[derive(Clone, Debug, Serialize)]
pub struct FixationResult {
    pub delta: Vec<f32>,
    /// `‖delta‖` after clamping. Always `<= delta_max`.
    pub magnitude: f32,
    pub was_clamped: bool,
    pub target: ApplyTarget,
    /// Fixed order: Tenacity, Authority, A Priori, Science.
    pub outcomes: [MethodOutcome; 4],
}

impl FixationResult {
    pub fn affected_channels(&self) -> Vec<Channel> {
        match self.target {
            ApplyTarget::Channel(c) => vec![c],
            ApplyTarget::Distributed => Channel::ALL.to_vec(),
        }
    }
}

#[derive(Debug)]
struct Anchor {
    name: String,
    kind: AnchorKind,
    vector: Vec<f32>,
}

#[derive(Debug)]
pub struct FixationEngine {
    config: FixationConfig,
    anchors: Vec<Anchor>,
}

impl FixationEngine {
    /// Construction validates method weights (sum 1.0 ± 1%), the positive
    /// clamp budget, and anchor dimensionality. Violations are fatal here.
    pub fn new(config: FixationConfig) -> Result<Self> {
        config.validate()?;
        let anchors = config
            .anchors
            .iter()
            .map(|a| {
                let mut vector = a.vector.clone();
                normalize(&mut vector);
                Anchor {
                    name: a.name.clone(),
                    kind: a.kind,
                    vector,
                }
            })
            .collect();
        Ok(Self { config, anchors })
    }

    pub fn delta_max(&self) -> f32 {
        self.config.delta_max
    }

    /// Combine the four sub-methods and clamp the result.
    pub fn fixate(
        &self,
        input: &[f32],
        state: &StateTensor,
        corpus: &[CorpusHit],
    ) -> FixationResult {
        let (t_vec, t_out) = self.tenacity(input, state);
        let (a_vec, a_out) = self.authority(input);
        let (p_vec, p_out) = self.apriori(input, state);
        let (s_vec, s_out) = self.science(input, state, corpus);

        let [w_t, w_a, w_p, w_s] = self.config.method_weights();
        let mut delta = vec![0.0f32; CHANNEL_DIM];
        for i in 0..CHANNEL_DIM {
            delta[i] = w_t * t_vec.get(i).copied().unwrap_or(0.0)
                + w_a * a_vec.get(i).copied().unwrap_or(0.0)
                + w_p * p_vec.get(i).copied().unwrap_or(0.0)
                + w_s * s_vec.get(i).copied().unwrap_or(0.0);
        }

        let raw_magnitude = l2_norm(&delta);
        let was_clamped = raw_magnitude > self.config.delta_max;
        if was_clamped {
            let scale = self.config.delta_max / raw_magnitude;
            for x in delta.iter_mut() {
                *x *= scale;
            }
        }
        let magnitude = l2_norm(&delta);

        let target = match self.config.apply {
            FixationApply::Distributed => ApplyTarget::Distributed,
            FixationApply::Focused => ApplyTarget::Channel(self.most_aligned(&delta, state)),
        };

        debug!(
            raw_magnitude,
            magnitude, was_clamped, "fixation delta combined"
        );

        FixationResult {
            delta,
            magnitude,
            was_clamped,
            target,
            outcomes: [t_out, a_out, p_out, s_out],
        }
    }

    /// Apply a fixation result: a new snapshot with the delta added to the
    /// target channel (renormalized) or spread across all 8. Sequence is
    /// bumped and lineage recorded.
    pub fn apply(
        &self,
        state: &StateTensor,
        result: &FixationResult,
        origin: &str,
    ) -> Result<StateTensor> {
        let mut next = state.successor(origin);
        match result.target {
            ApplyTarget::Channel(channel) => {
                let updated = add_vectors(state.channel(channel), &result.delta, 1.0);
                next.set_channel(channel, updated)?;
            }
            ApplyTarget::Distributed => {
                // Spread proportionally to each channel's alignment with
                // the delta, uniform when nothing aligns.
                let shares = self.distribution_shares(&result.delta, state);
                for channel in Channel::ALL {
                    let share = shares[channel.index()];
                    if share <= f32::EPSILON {
                        continue;
                    }
                    let updated = add_vectors(state.channel(channel), &result.delta, share);
                    next.set_channel(channel, updated)?;
                }
            }
        }
        Ok(next)
    }

    fn distribution_shares(&self, delta: &[f32], state: &StateTensor) -> [f32; 8] {
        let mut shares = [0.0f32; 8];
        let mut sum = 0.0f32;
        for channel in Channel::ALL {
            let alignment = cosine(delta, state.channel(channel)).abs();
            shares[channel.index()] = alignment;
            sum += alignment;
        }
        if sum <= f32::EPSILON {
            return [1.0 / 8.0; 8];
        }
        for share in shares.iter_mut() {
            *share /= sum;
        }
        shares
    }

    fn most_aligned(&self, delta: &[f32], state: &StateTensor) -> Channel {
        Channel::ALL
            .into_iter()
            .max_by(|a, b| {
                let ca = cosine(delta, state.channel(*a)).abs();
                let cb = cosine(delta, state.channel(*b)).abs();
                ca.partial_cmp(&cb).unwrap_or(std::cmp::Ordering::Equal)
            })
            .unwrap_or(Channel::Tension)
    }

    /// Tenacity: reinforce the habit channel only when the input strongly
    /// confirms it; otherwise resist (contribute nothing).
    fn tenacity(&self, input: &[f32], state: &StateTensor) -> (Vec<f32>, MethodOutcome) {
        let habit = state.channel(Channel::Habits);
        let similarity = cosine(input, habit);
        if similarity > self.config.confirm_threshold {
            let excess =
                (similarity - self.config.confirm_threshold) / (1.0 - self.config.confirm_threshold);
            let contribution = habit.iter().map(|x| x * excess).collect();
            (
                contribution,
                MethodOutcome::Tenacity {
                    habit_similarity: similarity,
                    reinforced: true,
                },
            )
        } else {
            (
                vec![0.0; CHANNEL_DIM],
                MethodOutcome::Tenacity {
                    habit_similarity: similarity,
                    reinforced: false,
                },
            )
        }
    }

    /// Authority: directional pull toward aligned anchors and away from
    /// violated ones. Critical anchors weigh double. With zero anchors the
    /// method is an explicit neutral.
    fn authority(&self, input: &[f32]) -> (Vec<f32>, MethodOutcome) {
        if self.anchors.is_empty() {
            return (
                vec![0.0; CHANNEL_DIM],
                MethodOutcome::Authority {
                    aligned: Vec::new(),
                    violated: Vec::new(),
                    neutral: true,
                },
            );
        }

        let mut contribution = vec![0.0f32; CHANNEL_DIM];
        let mut aligned = Vec::new();
        let mut violated = Vec::new();

        for anchor in &self.anchors {
            let a = cosine(input, &anchor.vector);
            let weight = if anchor.kind == AnchorKind::Critical {
                2.0
            } else {
                1.0
            };
            if a > self.config.align_threshold {
                for (acc, x) in contribution.iter_mut().zip(&anchor.vector) {
                    *acc += weight * a * x;
                }
                aligned.push(anchor.name.clone());
            } else if a < self.config.violate_threshold {
                for (acc, x) in contribution.iter_mut().zip(&anchor.vector) {
                    *acc -= weight * a.abs() * x;
                }
                violated.push(anchor.name.clone());
            }
        }

        let n = self.anchors.len() as f32;
        for x in contribution.iter_mut() {
            *x /= n;
        }

        (
            contribution,
            MethodOutcome::Authority {
                aligned,
                violated,
                neutral: false,
            },
        )
    }

    /// A Priori: mean coherence of the input against the values, beliefs
    /// and narrative channels. Strong coherence integrates fully; weak or
    /// negative coherence takes a much smaller step.
    fn apriori(&self, input: &[f32], state: &StateTensor) -> (Vec<f32>, MethodOutcome) {
        let coherence = APRIORI_CHANNELS
            .iter()
            .map(|c| cosine(input, state.channel(*c)))
            .sum::<f32>()
            / APRIORI_CHANNELS.len() as f32;

        let full_integration = coherence >= self.config.coherence_threshold;
        let scale = if full_integration {
            1.0
        } else {
            self.config.weak_scale
        };
        let contribution = input.iter().map(|x| x * scale).collect();
        (
            contribution,
            MethodOutcome::APriori {
                coherence,
                full_integration,
            },
        )
    }

    /// Science: corroboration against corpus results. Strong corroboration
    /// integrates; no results take a cautious step toward tension; weak
    /// corroboration takes the tension step in the opposite sense.
    fn science(
        &self,
        input: &[f32],
        state: &StateTensor,
        corpus: &[CorpusHit],
    ) -> (Vec<f32>, MethodOutcome) {
        let tension = state.channel(Channel::Tension);
        if corpus.is_empty() {
            let contribution = tension.iter().map(|x| x * self.config.caution_scale).collect();
            return (
                contribution,
                MethodOutcome::Science {
                    corroboration: None,
                    mode: ScienceMode::Caution,
                },
            );
        }

        let corroboration = corpus
            .iter()
            .map(|hit| cosine(input, &hit.vector))
            .sum::<f32>()
            / corpus.len() as f32;

        if corroboration >= self.config.corroboration_threshold {
            (
                input.to_vec(),
                MethodOutcome::Science {
                    corroboration: Some(corroboration),
                    mode: ScienceMode::Integrate,
                },
            )
        } else {
            let contribution = tension
                .iter()
                .map(|x| -x * self.config.caution_scale)
                .collect();
            (
                contribution,
                MethodOutcome::Science {
                    corroboration: Some(corroboration),
                    mode: ScienceMode::Tension,
                },
            )
        }
    }
}

fn add_vectors(base: &[f32], delta: &[f32], scale: f32) -> Vec<f32> {
    base.iter()
        .zip(delta)
        .map(|(x, d)| x + scale * d)
        .collect()
}
