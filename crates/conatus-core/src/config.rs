//! Configuration for all engines and the daemon.
//!
//! All tunable parameters in one place, serde-defaulted so partial TOML
//! files work. `validate()` runs at engine/daemon construction; a bad
//! weight sum or clamp budget is fatal there and never at runtime.

use crate::error::{Error, Result};
use crate::tensor::{CHANNEL_COUNT, CHANNEL_DIM};
use serde::{Deserialize, Serialize};

/// Weight sets must sum to 1.0 within this tolerance.
pub const WEIGHT_SUM_TOLERANCE: f32 = 0.01;

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub dissonance: DissonanceConfig,
    pub fixation: FixationConfig,
    pub vigilance: VigilanceConfig,
    pub daemon: DaemonConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DissonanceConfig {
    /// Per-channel weight in `Channel::ALL` order. Sum 1.0 ± 1%.
    pub channel_weights: [f32; CHANNEL_COUNT],
    /// Corpus results below this input similarity are hard negatives.
    pub hard_negative_threshold: f32,
    /// Similarity band in which an external contradiction detector, when
    /// supplied, decides. `[band_low, band_high)`.
    pub band_low: f32,
    pub band_high: f32,
    pub contradiction_weight: f32,
    pub novelty_weight: f32,
    /// Novelty only applies when max corpus similarity is below this.
    pub novelty_floor: f32,
    /// Total dissonance above this records an Impact.
    pub shock_threshold: f32,
}

/// How the clamped delta is written back into the tensor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FixationApply {
    /// Spread the delta proportionally across all 8 channels.
    #[default]
    Distributed,
    /// Apply the whole delta to the channel most aligned with it.
    Focused,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FixationConfig {
    /// Method weights. Sum 1.0 ± 1%. Science dominant, Tenacity minimal.
    pub tenacity_weight: f32,
    pub authority_weight: f32,
    pub apriori_weight: f32,
    pub science_weight: f32,
    /// Hard per-cycle change budget. Must be positive.
    pub delta_max: f32,
    /// Tenacity reinforces only above this input/habit similarity.
    pub confirm_threshold: f32,
    /// Authority: pull toward anchors above this cosine.
    pub align_threshold: f32,
    /// Authority: push away from anchors below this cosine.
    pub violate_threshold: f32,
    /// A Priori: full integration at or above this mean coherence.
    pub coherence_threshold: f32,
    /// A Priori: scale of the weak_integrate contribution.
    pub weak_scale: f32,
    /// Science: full integration at or above this mean corroboration.
    pub corroboration_threshold: f32,
    /// Science: scale of the cautious tension step.
    pub caution_scale: f32,
    pub apply: FixationApply,
    /// Named anchor directions for the Authority method.
    pub anchors: Vec<AnchorConfig>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnchorKind {
    /// Part of the fixed pact.
    Pact,
    /// Critical subset — violations weigh double.
    Critical,
    /// Philosophical anchors.
    Philosophical,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnchorConfig {
    pub name: String,
    pub kind: AnchorKind,
    /// Unit direction, `CHANNEL_DIM` long.
    pub vector: Vec<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VigilanceConfig {
    /// Per-channel cosine distance considered drifted.
    pub threshold_per_dimension: f32,
    /// Cumulative drift warning threshold.
    pub threshold_cumulative: f32,
    /// Cumulative drift above `threshold_cumulative × critical_multiplier`
    /// is critical.
    pub critical_multiplier: f32,
    /// Per-cycle drift warning threshold.
    pub cycle_drift_threshold: f32,
    /// Bounded alert history length.
    pub alert_history: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// Autonomous loop interval in milliseconds.
    pub autonomous_interval_ms: u64,
    /// Vigilance loop interval in milliseconds. Longer than autonomous.
    pub vigilance_interval_ms: u64,
    /// Inbound queue capacity.
    pub inbox_capacity: usize,
    /// Autonomous cycles verbalize above this dissonance total.
    pub verbalization_threshold: f32,
    /// Trigger source probabilities. Sum 1.0 ± 1%.
    pub rumination_probability: f32,
    pub corpus_probability: f32,
    pub free_probability: f32,
    /// Unresolved impacts older than this many days take priority outright.
    pub impact_priority_days: i64,
    /// Corpus results requested per cycle.
    pub corpus_k: usize,
    /// Disallowed reasoning markers scanned for in translated output.
    pub reasoning_markers: Vec<String>,
}

// ============================================================
// Defaults
// ============================================================

impl Default for Config {
    fn default() -> Self {
        Self {
            dissonance: DissonanceConfig::default(),
            fixation: FixationConfig::default(),
            vigilance: VigilanceConfig::default(),
            daemon: DaemonConfig::default(),
        }
    }
}

impl Default for DissonanceConfig {
    fn default() -> Self {
        Self {
            channel_weights: [0.20, 0.20, 0.10, 0.10, 0.10, 0.10, 0.10, 0.10],
            hard_negative_threshold: 0.25,
            band_low: 0.25,
            band_high: 0.55,
            contradiction_weight: 0.3,
            novelty_weight: 0.2,
            novelty_floor: 0.3,
            shock_threshold: 0.75,
        }
    }
}

impl Default for FixationConfig {
    fn default() -> Self {
        Self {
            tenacity_weight: 0.05,
            authority_weight: 0.25,
            apriori_weight: 0.25,
            science_weight: 0.45,
            delta_max: 0.001,
            confirm_threshold: 0.8,
            align_threshold: 0.5,
            violate_threshold: -0.2,
            coherence_threshold: 0.5,
            weak_scale: 0.1,
            corroboration_threshold: 0.6,
            caution_scale: 0.05,
            apply: FixationApply::Distributed,
            anchors: Vec::new(),
        }
    }
}

impl Default for VigilanceConfig {
    fn default() -> Self {
        Self {
            threshold_per_dimension: 0.3,
            threshold_cumulative: 1.0,
            critical_multiplier: 2.0,
            cycle_drift_threshold: 0.1,
            alert_history: 256,
        }
    }
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            autonomous_interval_ms: 30_000,
            vigilance_interval_ms: 120_000,
            inbox_capacity: 64,
            verbalization_threshold: 0.6,
            rumination_probability: 0.5,
            corpus_probability: 0.3,
            free_probability: 0.2,
            impact_priority_days: 3,
            corpus_k: 5,
            reasoning_markers: vec![
                "step 1".to_string(),
                "let me think".to_string(),
                "chain of thought".to_string(),
                "as an ai".to_string(),
                "reasoning:".to_string(),
            ],
        }
    }
}

// ============================================================
// Validation
// ============================================================

fn check_weight_sum(what: &str, sum: f32) -> Result<()> {
    if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
        return Err(Error::weight_sum(what, sum));
    }
    Ok(())
}

impl DissonanceConfig {
    pub fn validate(&self) -> Result<()> {
        check_weight_sum("dissonance.channel_weights", self.channel_weights.iter().sum())?;
        if self.band_low > self.band_high {
            return Err(Error::config(format!(
                "dissonance band_low {} exceeds band_high {}",
                self.band_low, self.band_high
            )));
        }
        Ok(())
    }
}

impl FixationConfig {
    pub fn method_weights(&self) -> [f32; 4] {
        [
            self.tenacity_weight,
            self.authority_weight,
            self.apriori_weight,
            self.science_weight,
        ]
    }

    pub fn validate(&self) -> Result<()> {
        check_weight_sum("fixation.method_weights", self.method_weights().iter().sum())?;
        if self.delta_max <= 0.0 {
            return Err(Error::config(format!(
                "fixation.delta_max must be positive, got {}",
                self.delta_max
            )));
        }
        for anchor in &self.anchors {
            if anchor.vector.len() != CHANNEL_DIM {
                return Err(Error::DimensionMismatch {
                    expected: CHANNEL_DIM,
                    actual: anchor.vector.len(),
                });
            }
        }
        Ok(())
    }
}

impl VigilanceConfig {
    pub fn validate(&self) -> Result<()> {
        if self.alert_history == 0 {
            return Err(Error::config("vigilance.alert_history must be positive"));
        }
        if self.critical_multiplier < 1.0 {
            return Err(Error::config(format!(
                "vigilance.critical_multiplier must be >= 1.0, got {}",
                self.critical_multiplier
            )));
        }
        Ok(())
    }
}

impl DaemonConfig {
    pub fn trigger_probabilities(&self) -> [f32; 3] {
        [
            self.rumination_probability,
            self.corpus_probability,
            self.free_probability,
        ]
    }

    pub fn validate(&self) -> Result<()> {
        check_weight_sum(
            "daemon.trigger_probabilities",
            self.trigger_probabilities().iter().sum(),
        )?;
        if self.autonomous_interval_ms == 0 || self.vigilance_interval_ms == 0 {
            return Err(Error::config("daemon loop intervals must be positive"));
        }
        if self.inbox_capacity == 0 {
            return Err(Error::config("daemon.inbox_capacity must be positive"));
        }
        Ok(())
    }
}

impl Config {
    /// Validate every section. Called once at construction; violations are
    /// fatal there, never at runtime.
    pub fn validate(&self) -> Result<()> {
        self.dissonance.validate()?;
        self.fixation.validate()?;
        self.vigilance.validate()?;
        self.daemon.validate()?;
        Ok(())
    }
}
