//! Boundary traits.
//!
//! Everything outside the engine — embedding, corpus retrieval,
//! translation, persistence, notification — sits behind one of these
//! traits so it can be mocked deterministically in tests. Callers treat
//! failures as transient: they are logged and degrade a single cycle,
//! never a loop.

use crate::error::Result;
use crate::tensor::StateTensor;
use crate::types::{
    CorpusHit, Impact, NamedProjection, OutputKind, Thought, VigilanceAlert,
};
use uuid::Uuid;

/// Embedding boundary: text to unit vector of fixed dimensionality.
#[async_trait::async_trait]
pub trait Embedder: Send + Sync {
    fn dimension(&self) -> usize;

    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Corpus retrieval boundary. Callers convert failure to an empty result
/// set, so dissonance and fixation stay available.
#[async_trait::async_trait]
pub trait CorpusStore: Send + Sync {
    async fn search(&self, query: &str, k: usize) -> Result<Vec<CorpusHit>>;
}

/// Translation boundary: state to externally visible text. The daemon
/// audits the returned text for disallowed reasoning markers after the
/// fact; the audit logs and never blocks delivery.
#[async_trait::async_trait]
pub trait Translator: Send + Sync {
    async fn translate(
        &self,
        state: &StateTensor,
        kind: OutputKind,
        context: Option<&str>,
        projections: &[NamedProjection],
    ) -> Result<String>;
}

/// State persistence: save and load-by-sequence.
#[async_trait::async_trait]
pub trait StateStore: Send + Sync {
    async fn save_state(&self, state: &StateTensor) -> Result<()>;

    async fn load_state(&self, sequence: i64) -> Result<Option<StateTensor>>;
}

/// Impact persistence: append, query by resolved flag, resolve. Impacts
/// are an audit log — there is deliberately no delete.
#[async_trait::async_trait]
pub trait ImpactStore: Send + Sync {
    async fn append_impact(&self, impact: &Impact) -> Result<()>;

    async fn impacts_by_resolved(&self, resolved: bool) -> Result<Vec<Impact>>;

    async fn resolve_impact(&self, id: Uuid) -> Result<()>;
}

/// Thought persistence: append-only.
#[async_trait::async_trait]
pub trait ThoughtStore: Send + Sync {
    async fn append_thought(&self, thought: &Thought) -> Result<()>;

    async fn recent_thoughts(&self, n: usize) -> Result<Vec<Thought>>;
}

/// Notification boundary: best-effort delivery of critical drift alerts.
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, alert: &VigilanceAlert) -> Result<()>;
}

/// Optional external contradiction detector consulted when a corpus
/// result's similarity falls inside the configured middle band. Pure and
/// synchronous.
pub trait ContradictionDetector: Send + Sync {
    fn contradicts(&self, input: &[f32], hit: &CorpusHit) -> bool;
}
