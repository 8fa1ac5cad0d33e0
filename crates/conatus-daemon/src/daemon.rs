//! The daemon: exclusive owner of the current-state pointer, running
//! three independently-scheduled loops.
//!
//! - Conversation loop: drains a priority inbox (user messages first),
//!   runs a cycle per item, always translates, replies synchronously.
//! - Autonomous loop: fixed interval, asks the trigger generator, runs a
//!   cycle, verbalizes only when the cycle says so.
//! - Vigilance loop: longer interval, observes the current state without
//!   mutating it, notifies on critical drift.
//!
//! Mutual exclusion: the current pointer lives in an `RwLock<Arc<_>>`
//! whose write lock is held only for the swap; the two mutating loops are
//! serialized by a cycle gate, and the mode flag is re-checked inside the
//! gate so a racing autonomous cycle is rejected before touching state.
//! Per-iteration failures are logged, never terminate a loop.

use crate::audit;
use crate::triggers::TriggerGenerator;
use conatus_core::config::Config;
use conatus_core::tensor::{cosine, normalize, Channel, StateTensor};
use conatus_core::traits::{
    ContradictionDetector, CorpusStore, Embedder, ImpactStore, Notifier, StateStore,
    ThoughtStore, Translator,
};
use conatus_core::types::{NamedProjection, OutputKind, Trigger, VerbalizeReason, VigilanceAlert, VigilanceLevel};
use conatus_core::{Error, Result};
use conatus_engine::{CycleEngine, CycleOutcome, DissonanceEngine, FixationEngine, VigilanceMonitor};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot, Mutex as AsyncMutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Daemon lifecycle mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Paused,
    Autonomous,
    Conversation,
}

impl Mode {
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Paused => "paused",
            Mode::Autonomous => "autonomous",
            Mode::Conversation => "conversation",
        }
    }
}

/// Inbox processing order. User messages always go first; within a class,
/// arrival order is kept.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
enum Priority {
    Normal = 0,
    User = 10,
}

struct InboundMessage {
    trigger: Trigger,
    priority: Priority,
    reply: oneshot::Sender<ConversationReply>,
}

/// Synchronous result of a conversation-queued trigger.
#[derive(Clone, Debug)]
pub struct ConversationReply {
    pub text: String,
    pub reason: VerbalizeReason,
    pub cycle: u64,
    pub dissonance_total: f32,
    pub elapsed: Duration,
}

/// Events emitted to subscribers.
#[derive(Clone, Debug)]
pub enum DaemonEvent {
    Verbalized {
        text: String,
        reason: VerbalizeReason,
        kind: OutputKind,
        cycle: u64,
    },
    Silent {
        cycle: u64,
    },
    Drift {
        alert: VigilanceAlert,
    },
}

#[derive(Clone, Copy, Debug, Serialize)]
pub struct DaemonStats {
    pub mode: Mode,
    pub conversation_cycles: u64,
    pub autonomous_cycles: u64,
    pub silent_cycles: u64,
    pub cycles_run: u64,
}

/// External collaborators, all mockable.
#[derive(Clone)]
pub struct Boundaries {
    pub embedder: Arc<dyn Embedder>,
    pub corpus: Arc<dyn CorpusStore>,
    pub translator: Arc<dyn Translator>,
    pub notifier: Arc<dyn Notifier>,
    pub states: Arc<dyn StateStore>,
    pub impacts: Arc<dyn ImpactStore>,
    pub thoughts: Arc<dyn ThoughtStore>,
    pub detector: Option<Arc<dyn ContradictionDetector>>,
}

struct Shared {
    engine: CycleEngine,
    vigilance: AsyncMutex<VigilanceMonitor>,
    /// The current pointer. Write lock held only for the swap.
    state: RwLock<Arc<StateTensor>>,
    mode: StdMutex<Mode>,
    /// Serializes the two mutating loops.
    cycle_gate: AsyncMutex<()>,
    generator: TriggerGenerator,
    translator: Arc<dyn Translator>,
    notifier: Arc<dyn Notifier>,
    states: Arc<dyn StateStore>,
    impacts: Arc<dyn ImpactStore>,
    thoughts: Arc<dyn ThoughtStore>,
    anchor_dirs: Vec<(String, Vec<f32>)>,
    config: conatus_core::config::DaemonConfig,
    events: broadcast::Sender<DaemonEvent>,
    conversation_cycles: AtomicU64,
    autonomous_cycles: AtomicU64,
    silent_cycles: AtomicU64,
}

impl Shared {
    fn mode(&self) -> Mode {
        *self.mode.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn set_mode(&self, mode: Mode) {
        *self.mode.lock().unwrap_or_else(|p| p.into_inner()) = mode;
    }

    /// Run one cycle and swap the current pointer.
    ///
    /// The mode flag is checked again under the gate: an autonomous cycle
    /// that lost the race against a conversation is rejected here, before
    /// any mutation.
    async fn run_cycle(&self, trigger: &Trigger, conversation: bool) -> Option<CycleOutcome> {
        let _gate = self.cycle_gate.lock().await;
        if !conversation && self.mode() == Mode::Conversation {
            debug!("autonomous cycle rejected, conversation in flight");
            return None;
        }

        let current = { self.state.read().await.clone() };
        let outcome = self.engine.run_cycle(trigger, &current).await;
        {
            let mut slot = self.state.write().await;
            *slot = Arc::new(outcome.state.clone());
        }
        self.persist(&outcome).await;
        Some(outcome)
    }

    /// Persistence failures are transient: logged, never propagated, and
    /// the in-memory state already moved on consistently.
    async fn persist(&self, outcome: &CycleOutcome) {
        if let Err(e) = self.states.save_state(&outcome.state).await {
            warn!(error = %e, "state persistence failed");
        }
        if let Some(impact) = &outcome.impact {
            if let Err(e) = self.impacts.append_impact(impact).await {
                warn!(error = %e, "impact persistence failed");
            }
        }
        if let Err(e) = self.thoughts.append_thought(&outcome.thought).await {
            warn!(error = %e, "thought persistence failed");
        }
    }

    /// How present each configured anchor direction is in the state: the
    /// best cosine across channels. Supplied to the translator for audit.
    fn projections(&self, state: &StateTensor) -> Vec<NamedProjection> {
        self.anchor_dirs
            .iter()
            .map(|(name, vector)| {
                let value = Channel::ALL
                    .into_iter()
                    .map(|c| cosine(vector, state.channel(c)))
                    .fold(-1.0f32, f32::max);
                NamedProjection {
                    name: name.clone(),
                    value,
                }
            })
            .collect()
    }

    async fn translate_outcome(
        &self,
        outcome: &CycleOutcome,
        kind: OutputKind,
        context: Option<&str>,
    ) -> String {
        let projections = self.projections(&outcome.state);
        match self
            .translator
            .translate(&outcome.state, kind, context, &projections)
            .await
        {
            Ok(text) => {
                audit::audit_and_log(&text, &self.config.reasoning_markers);
                text
            }
            Err(e) => {
                warn!(error = %e, "translation failed, using fallback text");
                format!(
                    "(low confidence) still settling; dissonance {:.2}",
                    outcome.dissonance.total
                )
            }
        }
    }
}

pub struct Daemon {
    shared: Arc<Shared>,
    cancel: StdMutex<Option<CancellationToken>>,
    handles: AsyncMutex<Vec<JoinHandle<()>>>,
    inbox: StdMutex<Option<mpsc::Sender<InboundMessage>>>,
}

impl Daemon {
    /// Build a daemon around an initial state, which also becomes the
    /// vigilance reference for the run. All configuration is validated
    /// here; a bad config never reaches the loops.
    pub fn new(config: Config, initial: StateTensor, boundaries: Boundaries) -> Result<Self> {
        config.validate()?;

        let dissonance = DissonanceEngine::new(config.dissonance.clone())?;
        let fixation = FixationEngine::new(config.fixation.clone())?;
        let engine = CycleEngine::new(
            dissonance,
            fixation,
            boundaries.embedder.clone(),
            boundaries.corpus.clone(),
            boundaries.detector.clone(),
            config.daemon.verbalization_threshold,
            config.daemon.corpus_k,
        );
        let vigilance = VigilanceMonitor::new(config.vigilance.clone(), &initial)?;
        let generator = TriggerGenerator::new(
            &config.daemon,
            boundaries.impacts.clone(),
            boundaries.corpus.clone(),
            boundaries.thoughts.clone(),
        )?;

        let anchor_dirs = config
            .fixation
            .anchors
            .iter()
            .map(|a| {
                let mut vector = a.vector.clone();
                normalize(&mut vector);
                (a.name.clone(), vector)
            })
            .collect();

        let (events, _) = broadcast::channel(256);

        let shared = Arc::new(Shared {
            engine,
            vigilance: AsyncMutex::new(vigilance),
            state: RwLock::new(Arc::new(initial)),
            mode: StdMutex::new(Mode::Paused),
            cycle_gate: AsyncMutex::new(()),
            generator,
            translator: boundaries.translator,
            notifier: boundaries.notifier,
            states: boundaries.states,
            impacts: boundaries.impacts,
            thoughts: boundaries.thoughts,
            anchor_dirs,
            config: config.daemon,
            events,
            conversation_cycles: AtomicU64::new(0),
            autonomous_cycles: AtomicU64::new(0),
            silent_cycles: AtomicU64::new(0),
        });

        Ok(Self {
            shared,
            cancel: StdMutex::new(None),
            handles: AsyncMutex::new(Vec::new()),
            inbox: StdMutex::new(None),
        })
    }

    pub fn mode(&self) -> Mode {
        self.shared.mode()
    }

    pub fn stats(&self) -> DaemonStats {
        DaemonStats {
            mode: self.shared.mode(),
            conversation_cycles: self.shared.conversation_cycles.load(Ordering::Relaxed),
            autonomous_cycles: self.shared.autonomous_cycles.load(Ordering::Relaxed),
            silent_cycles: self.shared.silent_cycles.load(Ordering::Relaxed),
            cycles_run: self.shared.engine.cycles_run(),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DaemonEvent> {
        self.shared.events.subscribe()
    }

    /// Snapshot of the current state pointer.
    pub async fn current_state(&self) -> Arc<StateTensor> {
        self.shared.state.read().await.clone()
    }

    /// Run a vigilance check outside the loop schedule.
    pub async fn check_vigilance(&self) -> VigilanceAlert {
        let state = self.shared.state.read().await.clone();
        self.shared.vigilance.lock().await.check(&state)
    }

    /// The explicit external reset — the only way cumulative drift drops.
    pub async fn reset_vigilance(&self) {
        self.shared.vigilance.lock().await.reset_cumulative();
    }

    /// Launch the three loops. Calling `start()` on a running daemon is a
    /// logged no-op.
    pub async fn start(&self) {
        let token = {
            let mut slot = self.cancel.lock().unwrap_or_else(|p| p.into_inner());
            if slot.is_some() {
                info!("start() on a running daemon is a no-op");
                return;
            }
            let token = CancellationToken::new();
            *slot = Some(token.clone());
            token
        };

        let (tx, rx) = mpsc::channel(self.shared.config.inbox_capacity);
        *self.inbox.lock().unwrap_or_else(|p| p.into_inner()) = Some(tx);
        self.shared.set_mode(Mode::Autonomous);

        let mut handles = self.handles.lock().await;
        handles.push(tokio::spawn(conversation_loop(
            self.shared.clone(),
            rx,
            token.clone(),
        )));
        handles.push(tokio::spawn(autonomous_loop(
            self.shared.clone(),
            token.clone(),
        )));
        handles.push(tokio::spawn(vigilance_loop(self.shared.clone(), token)));
        info!("daemon started: conversation + autonomous + vigilance loops");
    }

    /// Cancel all three loops and await their completion. An in-flight
    /// cycle finishes atomically before its loop observes the
    /// cancellation. Safe to call at any time; a second call is a no-op.
    pub async fn stop(&self) {
        let token = self
            .cancel
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .take();
        let Some(token) = token else {
            info!("stop() on a paused daemon is a no-op");
            self.shared.set_mode(Mode::Paused);
            return;
        };

        token.cancel();
        self.inbox.lock().unwrap_or_else(|p| p.into_inner()).take();

        let handles: Vec<JoinHandle<()>> = {
            let mut slot = self.handles.lock().await;
            slot.drain(..).collect()
        };
        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "loop task did not join cleanly");
            }
        }
        self.shared.set_mode(Mode::Paused);
        info!("daemon stopped");
    }

    /// Queue a user message and wait for the verbalized reply.
    pub async fn send_user(&self, message: impl Into<String>) -> Result<ConversationReply> {
        self.enqueue(Trigger::user(message)).await
    }

    /// Queue any trigger on the conversation path. User triggers take
    /// priority over everything else in the inbox.
    pub async fn enqueue(&self, trigger: Trigger) -> Result<ConversationReply> {
        let priority = if trigger.is_user() {
            Priority::User
        } else {
            Priority::Normal
        };
        let tx = self
            .inbox
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
            .ok_or_else(|| Error::config("daemon is paused"))?;

        let (reply_tx, reply_rx) = oneshot::channel();
        tx.send(InboundMessage {
            trigger,
            priority,
            reply: reply_tx,
        })
        .await
        .map_err(|_| Error::boundary("daemon", "inbox closed"))?;

        reply_rx
            .await
            .map_err(|_| Error::boundary("daemon", "conversation loop dropped the reply"))
    }
}

// ---------------------------------------------------------------------------
// Loops
// ---------------------------------------------------------------------------

async fn conversation_loop(
    shared: Arc<Shared>,
    mut rx: mpsc::Receiver<InboundMessage>,
    cancel: CancellationToken,
) {
    info!("conversation loop started");
    let mut buffer: Vec<InboundMessage> = Vec::new();
    loop {
        let msg = tokio::select! {
            _ = cancel.cancelled() => break,
            msg = recv_with_priority(&mut rx, &mut buffer) => match msg {
                Some(m) => m,
                None => break,
            },
        };
        handle_conversation(&shared, msg).await;
    }
    info!("conversation loop stopped");
}

async fn handle_conversation(shared: &Arc<Shared>, msg: InboundMessage) {
    shared.set_mode(Mode::Conversation);

    // Conversation cycles are never rejected by the mode check.
    let Some(outcome) = shared.run_cycle(&msg.trigger, true).await else {
        shared.set_mode(Mode::Autonomous);
        return;
    };

    let context = (!msg.trigger.text().is_empty()).then(|| msg.trigger.text().to_string());
    // The translation boundary is always invoked on the conversation path,
    // whatever the cycle decided.
    let text = shared
        .translate_outcome(&outcome, OutputKind::Reply, context.as_deref())
        .await;

    shared.conversation_cycles.fetch_add(1, Ordering::Relaxed);
    let _ = shared.events.send(DaemonEvent::Verbalized {
        text: text.clone(),
        reason: outcome.reason,
        kind: OutputKind::Reply,
        cycle: outcome.cycle,
    });
    shared.set_mode(Mode::Autonomous);

    let reply = ConversationReply {
        text,
        reason: outcome.reason,
        cycle: outcome.cycle,
        dissonance_total: outcome.dissonance.total,
        elapsed: outcome.elapsed,
    };
    if msg.reply.send(reply).is_err() {
        debug!("conversation caller went away before the reply");
    }
}

/// Receive the next inbox message, preferring higher priority. Drains all
/// immediately available messages first; the stable sort keeps arrival
/// order within a priority class.
async fn recv_with_priority(
    rx: &mut mpsc::Receiver<InboundMessage>,
    buffer: &mut Vec<InboundMessage>,
) -> Option<InboundMessage> {
    if buffer.is_empty() {
        let first = rx.recv().await?;
        buffer.push(first);
        while let Ok(msg) = rx.try_recv() {
            buffer.push(msg);
        }
    }
    buffer.sort_by_key(|m| std::cmp::Reverse(m.priority));
    Some(buffer.remove(0))
}

async fn autonomous_loop(shared: Arc<Shared>, cancel: CancellationToken) {
    info!(
        interval_ms = shared.config.autonomous_interval_ms,
        "autonomous loop started"
    );
    let mut ticker =
        tokio::time::interval(Duration::from_millis(shared.config.autonomous_interval_ms));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick fires immediately; skip it so a fresh daemon idles
    // for one interval before its first autonomous cycle.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }
        if shared.mode() == Mode::Conversation {
            continue;
        }

        let trigger = shared.generator.next_trigger().await;
        let Some(outcome) = shared.run_cycle(&trigger, false).await else {
            continue;
        };
        shared.autonomous_cycles.fetch_add(1, Ordering::Relaxed);

        if outcome.should_verbalize {
            let kind = match &trigger {
                Trigger::ImpactRumination { .. } | Trigger::FreeRumination { .. } => {
                    OutputKind::Rumination
                }
                _ => OutputKind::Discovery,
            };
            let text = shared.translate_outcome(&outcome, kind, None).await;
            info!(
                cycle = outcome.cycle,
                reason = outcome.reason.as_str(),
                "autonomous verbalization: {text}"
            );
            let _ = shared.events.send(DaemonEvent::Verbalized {
                text,
                reason: outcome.reason,
                kind,
                cycle: outcome.cycle,
            });
        } else {
            shared.silent_cycles.fetch_add(1, Ordering::Relaxed);
            let _ = shared.events.send(DaemonEvent::Silent {
                cycle: outcome.cycle,
            });
        }

        // A ruminated shock counts as worked through.
        if let Trigger::ImpactRumination { impact_id, .. } = trigger {
            if let Err(e) = shared.impacts.resolve_impact(impact_id).await {
                warn!(error = %e, "failed to resolve ruminated impact");
            }
        }
    }
    info!("autonomous loop stopped");
}

async fn vigilance_loop(shared: Arc<Shared>, cancel: CancellationToken) {
    info!(
        interval_ms = shared.config.vigilance_interval_ms,
        "vigilance loop started"
    );
    let mut ticker =
        tokio::time::interval(Duration::from_millis(shared.config.vigilance_interval_ms));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let state = { shared.state.read().await.clone() };
        let alert = { shared.vigilance.lock().await.check(&state) };
        let critical = alert.level == VigilanceLevel::Critical;
        let _ = shared.events.send(DaemonEvent::Drift {
            alert: alert.clone(),
        });

        if critical {
            // Best effort: a failed notification never reaches the loop.
            if let Err(e) = shared.notifier.notify(&alert).await {
                warn!(error = %e, "notification delivery failed");
            }
        }
    }
    info!("vigilance loop stopped");
}
