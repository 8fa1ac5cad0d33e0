//! Deterministic in-memory boundary implementations.
//!
//! Used by the binary when no external services are wired up, and by the
//! tests as mocks. Everything here is synchronous under the hood; the
//! async trait impls exist so real network-backed implementations can
//! swap in without touching callers.

use conatus_core::tensor::{normalize, StateTensor, CHANNEL_DIM};
use conatus_core::traits::{
    CorpusStore, Embedder, ImpactStore, Notifier, StateStore, ThoughtStore, Translator,
};
use conatus_core::types::{
    CorpusHit, Impact, NamedProjection, OutputKind, Thought, VigilanceAlert,
};
use conatus_core::{Error, Result};
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::info;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Embedding
// ---------------------------------------------------------------------------

/// Deterministic text embedder: FNV-hashes bytes into bucket positions and
/// normalizes. Same text, same unit vector, every run.
pub struct HashEmbedder {
    dimension: usize,
}

impl HashEmbedder {
    pub fn new() -> Self {
        Self {
            dimension: CHANNEL_DIM,
        }
    }

    pub fn with_dimension(dimension: usize) -> Self {
        Self { dimension }
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Embedder for HashEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vector = vec![0.0f32; self.dimension];
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in text.bytes() {
            hash ^= u64::from(byte);
            hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
            vector[(hash % self.dimension as u64) as usize] += 1.0;
        }
        normalize(&mut vector);
        Ok(vector)
    }
}

// ---------------------------------------------------------------------------
// Corpus
// ---------------------------------------------------------------------------

/// In-memory corpus. `search` returns up to `k` hits whose text contains
/// the query, falling back to the front of the corpus for broad probes.
#[derive(Default)]
pub struct MemoryCorpus {
    hits: RwLock<Vec<CorpusHit>>,
}

impl MemoryCorpus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, hit: CorpusHit) {
        self.hits.write().unwrap_or_else(|p| p.into_inner()).push(hit);
    }
}

#[async_trait::async_trait]
impl CorpusStore for MemoryCorpus {
    async fn search(&self, query: &str, k: usize) -> Result<Vec<CorpusHit>> {
        let hits = self.hits.read().unwrap_or_else(|p| p.into_inner());
        let matched: Vec<CorpusHit> = hits
            .iter()
            .filter(|h| {
                query == "*"
                    || h.text
                        .as_deref()
                        .is_some_and(|t| t.contains(query))
            })
            .take(k)
            .cloned()
            .collect();
        if matched.is_empty() {
            Ok(hits.iter().take(k).cloned().collect())
        } else {
            Ok(matched)
        }
    }
}

// ---------------------------------------------------------------------------
// Persistence
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryStateStore {
    states: RwLock<HashMap<i64, StateTensor>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.states.read().unwrap_or_else(|p| p.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait::async_trait]
impl StateStore for MemoryStateStore {
    async fn save_state(&self, state: &StateTensor) -> Result<()> {
        self.states
            .write()
            .unwrap_or_else(|p| p.into_inner())
            .insert(state.sequence, state.clone());
        Ok(())
    }

    async fn load_state(&self, sequence: i64) -> Result<Option<StateTensor>> {
        Ok(self
            .states
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .get(&sequence)
            .cloned())
    }
}

#[derive(Default)]
pub struct MemoryImpactStore {
    impacts: RwLock<Vec<Impact>>,
}

impl MemoryImpactStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl ImpactStore for MemoryImpactStore {
    async fn append_impact(&self, impact: &Impact) -> Result<()> {
        self.impacts
            .write()
            .unwrap_or_else(|p| p.into_inner())
            .push(impact.clone());
        Ok(())
    }

    async fn impacts_by_resolved(&self, resolved: bool) -> Result<Vec<Impact>> {
        Ok(self
            .impacts
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .iter()
            .filter(|i| i.resolved == resolved)
            .cloned()
            .collect())
    }

    async fn resolve_impact(&self, id: Uuid) -> Result<()> {
        let mut impacts = self.impacts.write().unwrap_or_else(|p| p.into_inner());
        match impacts.iter_mut().find(|i| i.id == id) {
            Some(impact) => {
                impact.resolve();
                Ok(())
            }
            None => Err(Error::store(format!("impact {id} not found"))),
        }
    }
}

#[derive(Default)]
pub struct MemoryThoughtStore {
    thoughts: RwLock<Vec<Thought>>,
}

impl MemoryThoughtStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.thoughts.read().unwrap_or_else(|p| p.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait::async_trait]
impl ThoughtStore for MemoryThoughtStore {
    async fn append_thought(&self, thought: &Thought) -> Result<()> {
        self.thoughts
            .write()
            .unwrap_or_else(|p| p.into_inner())
            .push(thought.clone());
        Ok(())
    }

    async fn recent_thoughts(&self, n: usize) -> Result<Vec<Thought>> {
        let thoughts = self.thoughts.read().unwrap_or_else(|p| p.into_inner());
        Ok(thoughts.iter().rev().take(n).cloned().collect())
    }
}

// ---------------------------------------------------------------------------
// Translation and notification
// ---------------------------------------------------------------------------

/// Template translator: renders a plain-text summary of the state and its
/// projections. Stands in for the real text-generation boundary.
#[derive(Default)]
pub struct TemplateTranslator;

impl TemplateTranslator {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl Translator for TemplateTranslator {
    async fn translate(
        &self,
        state: &StateTensor,
        kind: OutputKind,
        context: Option<&str>,
        projections: &[NamedProjection],
    ) -> Result<String> {
        let kind = match kind {
            OutputKind::Reply => "reply",
            OutputKind::Discovery => "discovery",
            OutputKind::Rumination => "rumination",
        };
        let strongest = projections
            .iter()
            .max_by(|a, b| a.value.partial_cmp(&b.value).unwrap_or(std::cmp::Ordering::Equal))
            .map(|p| format!(", leaning {} ({:.2})", p.name, p.value))
            .unwrap_or_default();
        let context = context.map(|c| format!(" re: {c}")).unwrap_or_default();
        Ok(format!(
            "[{kind}] state seq {}{strongest}{context}",
            state.sequence
        ))
    }
}

/// Logs alerts instead of delivering them anywhere.
#[derive(Default)]
pub struct LogNotifier;

impl LogNotifier {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, alert: &VigilanceAlert) -> Result<()> {
        info!(level = alert.level.as_str(), message = %alert.message, "vigilance notification");
        Ok(())
    }
}
