//! Cycle Engine — one unit of work.
//!
//! vectorize → score → record shock → fixate → apply → decide
//! verbalization → summarize. Boundary failures degrade the single cycle
//! (empty corpus, zero input vector) and are logged; the cycle itself
//! never fails, whatever the trigger looked like.

use crate::dissonance::DissonanceEngine;
use crate::fixation::{FixationEngine, FixationResult};
use conatus_core::tensor::{normalize, StateTensor, CHANNEL_DIM};
use conatus_core::traits::{ContradictionDetector, CorpusStore, Embedder};
use conatus_core::types::{CorpusHit, DissonanceReport, Impact, Thought, Trigger, VerbalizeReason};
use chrono::Utc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::warn;
use uuid::Uuid;

/// Everything one cycle produced.
#[derive(Debug)]
pub struct CycleOutcome {
    /// The new state, sequence bumped, lineage set.
    pub state: StateTensor,
    pub previous_seq: i64,
    pub dissonance: DissonanceReport,
    pub fixation: FixationResult,
    /// Recorded when the dissonance total exceeded the shock threshold.
    pub impact: Option<Impact>,
    pub thought: Thought,
    pub should_verbalize: bool,
    pub reason: VerbalizeReason,
    pub elapsed: Duration,
    /// Monotonic cycle counter of this engine.
    pub cycle: u64,
}

pub struct CycleEngine {
    dissonance: DissonanceEngine,
    fixation: FixationEngine,
    embedder: Arc<dyn Embedder>,
    corpus: Arc<dyn CorpusStore>,
    detector: Option<Arc<dyn ContradictionDetector>>,
    verbalization_threshold: f32,
    corpus_k: usize,
    cycles: AtomicU64,
}

impl CycleEngine {
    pub fn new(
        dissonance: DissonanceEngine,
        fixation: FixationEngine,
        embedder: Arc<dyn Embedder>,
        corpus: Arc<dyn CorpusStore>,
        detector: Option<Arc<dyn ContradictionDetector>>,
        verbalization_threshold: f32,
        corpus_k: usize,
    ) -> Self {
        Self {
            dissonance,
            fixation,
            embedder,
            corpus,
            detector,
            verbalization_threshold,
            corpus_k,
            cycles: AtomicU64::new(0),
        }
    }

    pub fn cycles_run(&self) -> u64 {
        self.cycles.load(Ordering::Relaxed)
    }

    /// Run one cycle against the given current state.
    ///
    /// The caller (the daemon) owns the current pointer; this engine only
    /// computes the successor and hands it back.
    pub async fn run_cycle(&self, trigger: &Trigger, current: &StateTensor) -> CycleOutcome {
        let started = Instant::now();
        let cycle = self.cycles.fetch_add(1, Ordering::Relaxed) + 1;

        let input = self.vectorize(trigger).await;
        let corpus = self.lookup(trigger).await;

        let dissonance =
            self.dissonance
                .score(&input, current, &corpus, self.detector.as_deref());

        let impact = if dissonance.is_shock {
            Some(Impact::record(trigger, current.sequence, dissonance.clone()))
        } else {
            None
        };

        let fixation = self.fixation.fixate(&input, current, &corpus);
        let state = match self.fixation.apply(current, &fixation, trigger.label()) {
            Ok(next) => next,
            Err(e) => {
                // Delta application is dimension-safe by construction, but
                // a failure must still leave a valid successor.
                warn!(error = %e, "delta apply failed, keeping channels unchanged");
                current.successor(trigger.label())
            }
        };

        let (should_verbalize, reason) = self.decide_verbalization(trigger, &dissonance);

        let thought = Thought {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            trigger_label: trigger.label().to_string(),
            dissonance_total: dissonance.total,
            delta_magnitude: fixation.magnitude,
            affected_channels: fixation.affected_channels(),
            verbalized: should_verbalize,
            reason,
        };

        CycleOutcome {
            previous_seq: current.sequence,
            state,
            dissonance,
            fixation,
            impact,
            thought,
            should_verbalize,
            reason,
            elapsed: started.elapsed(),
            cycle,
        }
    }

    /// A user trigger always verbalizes. Otherwise verbalize on high
    /// dissonance or any hard negative; stay silent by default.
    fn decide_verbalization(
        &self,
        trigger: &Trigger,
        dissonance: &DissonanceReport,
    ) -> (bool, VerbalizeReason) {
        if trigger.is_user() {
            (true, VerbalizeReason::ConversationMode)
        } else if dissonance.total > self.verbalization_threshold {
            (true, VerbalizeReason::HighDissonanceDiscovery)
        } else if !dissonance.hard_negatives.is_empty() {
            (true, VerbalizeReason::ContradictionFound)
        } else {
            (false, VerbalizeReason::SilentProcessing)
        }
    }

    /// Embed the trigger text. Failure or wrong dimensionality degrades to
    /// the zero vector, which scores as maximally distant downstream.
    async fn vectorize(&self, trigger: &Trigger) -> Vec<f32> {
        if trigger.text().is_empty() {
            return vec![0.0; CHANNEL_DIM];
        }
        match self.embedder.embed(trigger.text()).await {
            Ok(mut vector) if vector.len() == CHANNEL_DIM => {
                normalize(&mut vector);
                vector
            }
            Ok(vector) => {
                warn!(
                    expected = CHANNEL_DIM,
                    actual = vector.len(),
                    "embedding dimensionality off, degrading to zero vector"
                );
                vec![0.0; CHANNEL_DIM]
            }
            Err(e) => {
                warn!(error = %e, "embedding failed, degrading to zero vector");
                vec![0.0; CHANNEL_DIM]
            }
        }
    }

    /// Corpus lookup. Failure yields an empty result set, never an error.
    async fn lookup(&self, trigger: &Trigger) -> Vec<CorpusHit> {
        if trigger.text().is_empty() {
            return Vec::new();
        }
        match self.corpus.search(trigger.text(), self.corpus_k).await {
            Ok(hits) => hits,
            Err(e) => {
                warn!(error = %e, "corpus lookup failed, continuing without results");
                Vec::new()
            }
        }
    }
}
