//! Shared record types: triggers, shocks, thoughts, scoring reports,
//! vigilance alerts, and the small values crossing boundary traits.

use crate::tensor::{Channel, CHANNEL_COUNT};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Hard negatives keep at most this much of the offending text.
pub const HARD_NEGATIVE_TEXT_LIMIT: usize = 160;

// ---------------------------------------------------------------------------
// Trigger — one discrete unit of input driving a cycle
// ---------------------------------------------------------------------------

/// Closed set of trigger kinds. Each variant carries its own typed payload
/// so downstream matches stay exhaustive.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Trigger {
    /// Inbound user message. Always verbalizes.
    User { message: String },
    /// Excerpt surfaced from the corpus boundary.
    CorpusExcerpt {
        text: String,
        source: Option<String>,
    },
    /// Rumination over an unresolved shock.
    ImpactRumination { impact_id: Uuid, text: String },
    /// Free rumination over past thoughts.
    FreeRumination { text: String },
    /// Fallback when a source has nothing to offer. Non-forcing.
    Empty,
}

impl Trigger {
    pub fn user(message: impl Into<String>) -> Self {
        Self::User {
            message: message.into(),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Trigger::User { .. } => "user",
            Trigger::CorpusExcerpt { .. } => "corpus_excerpt",
            Trigger::ImpactRumination { .. } => "impact_rumination",
            Trigger::FreeRumination { .. } => "free_rumination",
            Trigger::Empty => "empty",
        }
    }

    pub fn text(&self) -> &str {
        match self {
            Trigger::User { message } => message,
            Trigger::CorpusExcerpt { text, .. } => text,
            Trigger::ImpactRumination { text, .. } => text,
            Trigger::FreeRumination { text } => text,
            Trigger::Empty => "",
        }
    }

    pub fn is_user(&self) -> bool {
        matches!(self, Trigger::User { .. })
    }

    /// Map an external label to a trigger. Unknown or malformed kinds
    /// degrade to non-forcing defaults instead of erroring.
    pub fn from_label(label: &str, text: impl Into<String>) -> Self {
        let text = text.into();
        match label {
            "user" => Trigger::User { message: text },
            "corpus_excerpt" => Trigger::CorpusExcerpt { text, source: None },
            "free_rumination" => Trigger::FreeRumination { text },
            _ if text.is_empty() => Trigger::Empty,
            _ => Trigger::FreeRumination { text },
        }
    }
}

// ---------------------------------------------------------------------------
// Dissonance report
// ---------------------------------------------------------------------------

/// A corpus result flagged as contradicting the input.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HardNegative {
    pub similarity: f32,
    /// Truncated to `HARD_NEGATIVE_TEXT_LIMIT` chars.
    pub text: Option<String>,
    pub source: Option<String>,
}

/// Scalar mismatch score between an input event and the current state,
/// with its full breakdown. Stored inside `Impact` records for audit.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DissonanceReport {
    pub total: f32,
    /// Weighted per-channel component, in `Channel::ALL` order.
    pub per_channel: [f32; CHANNEL_COUNT],
    pub hard_negatives: Vec<HardNegative>,
    /// Highest input similarity across corpus results, if any were given.
    pub max_similarity: Option<f32>,
    pub is_shock: bool,
}

// ---------------------------------------------------------------------------
// Impact — a recorded shock
// ---------------------------------------------------------------------------

/// Audit record of a dissonance event exceeding the shock threshold.
/// The only permitted mutation is flipping `resolved`; impacts are never
/// deleted.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Impact {
    pub id: Uuid,
    pub trigger_label: String,
    pub trigger_text: String,
    /// Sequence id of the state at the moment of impact.
    pub state_seq: i64,
    pub dissonance: DissonanceReport,
    pub resolved: bool,
    pub created_at: DateTime<Utc>,
}

impl Impact {
    pub fn record(trigger: &Trigger, state_seq: i64, dissonance: DissonanceReport) -> Self {
        Self {
            id: Uuid::new_v4(),
            trigger_label: trigger.label().to_string(),
            trigger_text: trigger.text().to_string(),
            state_seq,
            dissonance,
            resolved: false,
            created_at: Utc::now(),
        }
    }

    pub fn resolve(&mut self) {
        self.resolved = true;
    }

    pub fn age_days(&self, now: DateTime<Utc>) -> i64 {
        (now - self.created_at).num_days()
    }
}

// ---------------------------------------------------------------------------
// Thought — the per-cycle summary record
// ---------------------------------------------------------------------------

/// Why a cycle did or did not produce external output.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerbalizeReason {
    ConversationMode,
    HighDissonanceDiscovery,
    ContradictionFound,
    SilentProcessing,
}

impl VerbalizeReason {
    pub fn as_str(self) -> &'static str {
        match self {
            VerbalizeReason::ConversationMode => "conversation_mode",
            VerbalizeReason::HighDissonanceDiscovery => "high_dissonance_discovery",
            VerbalizeReason::ContradictionFound => "contradiction_found",
            VerbalizeReason::SilentProcessing => "silent_processing",
        }
    }
}

/// Ephemeral summary created every cycle, voiced or not. Immutable once
/// created. Captures what the cycle did, never externally-generated text.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Thought {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub trigger_label: String,
    pub dissonance_total: f32,
    pub delta_magnitude: f32,
    pub affected_channels: Vec<Channel>,
    pub verbalized: bool,
    pub reason: VerbalizeReason,
}

// ---------------------------------------------------------------------------
// Boundary values
// ---------------------------------------------------------------------------

/// One corpus retrieval result.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CorpusHit {
    pub vector: Vec<f32>,
    pub text: Option<String>,
    pub source: Option<String>,
}

/// What kind of output the translation boundary is asked for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputKind {
    /// Synchronous reply to a user trigger.
    Reply,
    /// Autonomous verbalization of a high-dissonance cycle.
    Discovery,
    /// Autonomous verbalization of a rumination cycle.
    Rumination,
}

/// Projection of a named direction onto the current state, supplied to the
/// translation boundary for audit.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NamedProjection {
    pub name: String,
    pub value: f32,
}

// ---------------------------------------------------------------------------
// Vigilance alerts
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VigilanceLevel {
    Ok,
    Warning,
    Critical,
}

impl VigilanceLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            VigilanceLevel::Ok => "ok",
            VigilanceLevel::Warning => "warning",
            VigilanceLevel::Critical => "critical",
        }
    }
}

/// Structured drift observation. Data, not an error.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VigilanceAlert {
    pub level: VigilanceLevel,
    pub message: String,
    /// Cosine distance to the reference per channel (0 identical, 2 opposite).
    pub channel_distances: [f32; CHANNEL_COUNT],
    /// Normalized Euclidean distance between flattened tensors.
    pub global_distance: f32,
    pub cumulative_drift: f32,
    pub cycle_drift: f32,
    /// Up to 3 most-drifted channels, worst first.
    pub top_channels: Vec<(Channel, f32)>,
    pub state_seq: i64,
    pub created_at: DateTime<Utc>,
}
