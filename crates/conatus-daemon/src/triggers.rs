//! Trigger Generator — resolves autonomous trigger requests.
//!
//! Weighted random choice among three sources: unresolved-impact
//! rumination, corpus excerpts, and free rumination over past thoughts.
//! The cumulative-weight table is built once at construction (where the
//! probability sum is validated), not per draw. Every source degrades to
//! `Trigger::Empty` when its backing store is empty or fails.

use conatus_core::config::DaemonConfig;
use conatus_core::traits::{CorpusStore, ImpactStore, ThoughtStore};
use conatus_core::types::{Impact, Trigger};
use conatus_core::Result;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use std::sync::Mutex;
use tracing::{debug, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Source {
    Rumination,
    Corpus,
    Free,
}

pub struct TriggerGenerator {
    impacts: Arc<dyn ImpactStore>,
    corpus: Arc<dyn CorpusStore>,
    thoughts: Arc<dyn ThoughtStore>,
    /// Cumulative-weight table, one uniform draw selects a source.
    table: [(Source, f32); 3],
    priority_days: i64,
    corpus_k: usize,
    rng: Mutex<StdRng>,
}

impl TriggerGenerator {
    pub fn new(
        config: &DaemonConfig,
        impacts: Arc<dyn ImpactStore>,
        corpus: Arc<dyn CorpusStore>,
        thoughts: Arc<dyn ThoughtStore>,
    ) -> Result<Self> {
        Self::with_rng(config, impacts, corpus, thoughts, StdRng::from_entropy())
    }

    /// Deterministic variant for tests.
    pub fn with_seed(
        config: &DaemonConfig,
        impacts: Arc<dyn ImpactStore>,
        corpus: Arc<dyn CorpusStore>,
        thoughts: Arc<dyn ThoughtStore>,
        seed: u64,
    ) -> Result<Self> {
        Self::with_rng(config, impacts, corpus, thoughts, StdRng::seed_from_u64(seed))
    }

    fn with_rng(
        config: &DaemonConfig,
        impacts: Arc<dyn ImpactStore>,
        corpus: Arc<dyn CorpusStore>,
        thoughts: Arc<dyn ThoughtStore>,
        rng: StdRng,
    ) -> Result<Self> {
        config.validate()?;
        let [p_rum, p_corpus, p_free] = config.trigger_probabilities();
        let table = [
            (Source::Rumination, p_rum),
            (Source::Corpus, p_rum + p_corpus),
            (Source::Free, p_rum + p_corpus + p_free),
        ];
        Ok(Self {
            impacts,
            corpus,
            thoughts,
            table,
            priority_days: config.impact_priority_days,
            corpus_k: config.corpus_k,
            rng: Mutex::new(rng),
        })
    }

    /// Produce the next autonomous trigger.
    pub async fn next_trigger(&self) -> Trigger {
        // An unresolved impact past the age threshold takes priority over
        // the random draw.
        if let Some(oldest) = self.oldest_unresolved().await {
            if oldest.age_days(chrono::Utc::now()) > self.priority_days {
                debug!(impact = %oldest.id, "stale unresolved impact takes priority");
                return Trigger::ImpactRumination {
                    impact_id: oldest.id,
                    text: oldest.trigger_text.clone(),
                };
            }
        }

        let draw: f32 = {
            let mut rng = self.rng.lock().unwrap_or_else(|p| p.into_inner());
            rng.gen()
        };
        let source = self
            .table
            .iter()
            .find(|(_, cumulative)| draw < *cumulative)
            .map(|(source, _)| *source)
            .unwrap_or(Source::Free);

        match source {
            Source::Rumination => self.ruminate().await,
            Source::Corpus => self.excerpt().await,
            Source::Free => self.free_ruminate().await,
        }
    }

    async fn oldest_unresolved(&self) -> Option<Impact> {
        match self.impacts.impacts_by_resolved(false).await {
            Ok(unresolved) => unresolved.into_iter().min_by_key(|i| i.created_at),
            Err(e) => {
                warn!(error = %e, "impact store unavailable for rumination");
                None
            }
        }
    }

    async fn ruminate(&self) -> Trigger {
        match self.oldest_unresolved().await {
            Some(impact) => Trigger::ImpactRumination {
                impact_id: impact.id,
                text: impact.trigger_text,
            },
            None => Trigger::Empty,
        }
    }

    async fn excerpt(&self) -> Trigger {
        // Probe the corpus in the direction of the most recent thought.
        let query = match self.thoughts.recent_thoughts(1).await {
            Ok(thoughts) => thoughts
                .first()
                .map(|t| t.trigger_label.clone())
                .unwrap_or_else(|| "*".to_string()),
            Err(_) => "*".to_string(),
        };
        match self.corpus.search(&query, self.corpus_k).await {
            Ok(hits) => hits
                .into_iter()
                .find(|h| h.text.is_some())
                .map(|h| Trigger::CorpusExcerpt {
                    text: h.text.unwrap_or_default(),
                    source: h.source,
                })
                .unwrap_or(Trigger::Empty),
            Err(e) => {
                warn!(error = %e, "corpus unavailable for excerpt trigger");
                Trigger::Empty
            }
        }
    }

    async fn free_ruminate(&self) -> Trigger {
        match self.thoughts.recent_thoughts(5).await {
            Ok(thoughts) if !thoughts.is_empty() => {
                let labels: Vec<&str> = thoughts.iter().map(|t| t.trigger_label.as_str()).collect();
                Trigger::FreeRumination {
                    text: format!("revisiting {}", labels.join(", ")),
                }
            }
            Ok(_) => Trigger::Empty,
            Err(e) => {
                warn!(error = %e, "thought store unavailable for free rumination");
                Trigger::Empty
            }
        }
    }
}
