use std::sync::Arc;

use bevy::prelude::Resource;
use table_schema::{InboundMessage, PropertyPath, StateValue, TickEvent};

use crate::animation::AnimationQueue;
use crate::animation_config::AnimationConfig;
use crate::clock::{ClockError, ClockState, LogicalClock, LogicalTime};
use crate::diff::diff;
use crate::metrics::PipelineMetrics;
use crate::sampler::{sample, sample_path, RenderedState};
use crate::store::{GameStateStore, StatePatch, StoreError};

/// Notification emitted as the pipeline processes input.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    StateApplied {
        message_id: u64,
        version: Option<i64>,
        initial: bool,
        changes: usize,
    },
    StaleDropped {
        message_id: u64,
        incoming: i64,
        applied: i64,
    },
    Ticked(ClockState),
    ClockRejected(ClockError),
    Pruned {
        evicted: usize,
        remaining: usize,
    },
}

/// Receives [`PipelineEvent`]s in the order they happen.
pub trait PipelineObserver {
    fn on_event(&mut self, event: &PipelineEvent);
}

impl<F> PipelineObserver for F
where
    F: FnMut(&PipelineEvent),
{
    fn on_event(&mut self, event: &PipelineEvent) {
        self(event)
    }
}

/// What one inbound message did.
#[derive(Debug, Clone, PartialEq)]
pub enum MessageOutcome {
    Applied {
        version: Option<i64>,
        changes: usize,
    },
    Stale(StoreError),
    Ticked(ClockState),
    ClockRejected(ClockError),
    /// Chat, notifications and unknown types never touch state.
    Ignored,
}

/// Store, animation queue and clock for one table, driven in delivery
/// order.
#[derive(Resource)]
pub struct TablePipeline {
    pub(crate) store: GameStateStore,
    pub(crate) queue: AnimationQueue,
    pub(crate) clock: LogicalClock,
    config: Arc<AnimationConfig>,
    metrics: PipelineMetrics,
    observers: Vec<Box<dyn PipelineObserver + Send + Sync>>,
    next_message_id: u64,
}

impl TablePipeline {
    pub fn new(config: Arc<AnimationConfig>) -> Self {
        let fatal = config
            .fatal_clock_regressions()
            .unwrap_or(cfg!(debug_assertions));
        Self {
            store: GameStateStore::new(),
            queue: AnimationQueue::new(),
            clock: LogicalClock::new().with_fatal_regressions(fatal),
            config,
            metrics: PipelineMetrics::default(),
            observers: Vec::new(),
            next_message_id: 0,
        }
    }

    pub fn store(&self) -> &GameStateStore {
        &self.store
    }

    pub fn queue(&self) -> &AnimationQueue {
        &self.queue
    }

    pub fn clock(&self) -> &LogicalClock {
        &self.clock
    }

    pub fn now(&self) -> LogicalTime {
        self.clock.now()
    }

    pub fn config(&self) -> &Arc<AnimationConfig> {
        &self.config
    }

    /// Swaps the timing configuration. Records already queued keep theirs.
    pub fn set_config(&mut self, config: Arc<AnimationConfig>) {
        self.config = config;
    }

    pub fn metrics(&self) -> &PipelineMetrics {
        &self.metrics
    }

    pub fn subscribe(&mut self, observer: impl PipelineObserver + Send + Sync + 'static) {
        self.observers.push(Box::new(observer));
    }

    pub fn handle_message(&mut self, message: &InboundMessage) -> MessageOutcome {
        let message_id = self.next_message_id;
        self.next_message_id += 1;
        self.metrics.messages += 1;

        match message {
            InboundMessage::UpdateGamestate(update) => {
                let patch = if update.partial {
                    StatePatch::Merge(update.payload.clone())
                } else {
                    StatePatch::Replace(update.payload.clone())
                };
                self.apply_update(message_id, update.version, patch)
            }
            InboundMessage::UpdateTournamentState(update) => self.apply_update(
                message_id,
                update.version,
                StatePatch::Tournament(update.payload.clone()),
            ),
            InboundMessage::Tick(tick) => match self.tick(tick) {
                Ok(state) => MessageOutcome::Ticked(state),
                Err(err) => MessageOutcome::ClockRejected(err),
            },
            InboundMessage::UpdateChat(_)
            | InboundMessage::Notification(_)
            | InboundMessage::Unrecognized { .. } => {
                self.metrics.ignored += 1;
                tracing::trace!(
                    target: "table::pipeline",
                    message_id,
                    kind = message.kind(),
                    "pipeline.message_ignored"
                );
                MessageOutcome::Ignored
            }
        }
    }

    /// Version-checks `patch`, applies it and queues one animation per
    /// changed path, starting at the current logical time.
    pub fn apply_update(
        &mut self,
        message_id: u64,
        version: Option<i64>,
        patch: StatePatch,
    ) -> MessageOutcome {
        let accepted = match self.store.apply(version, patch) {
            Ok(accepted) => accepted,
            Err(err) => {
                let StoreError::StaleVersion { incoming, applied } = err.clone();
                self.metrics.stale_dropped += 1;
                self.emit(PipelineEvent::StaleDropped {
                    message_id,
                    incoming,
                    applied,
                });
                return MessageOutcome::Stale(err);
            }
        };

        let changes = if accepted.initial {
            self.queue
                .install_baseline(self.store.state().clone(), Some(message_id));
            0
        } else {
            let changes = diff(&accepted.previous, self.store.state());
            let clock = self.clock.state();
            for change in &changes {
                self.queue
                    .enqueue(change, &clock, self.config.as_ref(), Some(message_id));
            }
            changes.len()
        };

        self.metrics.accepted += 1;
        self.metrics.enqueued += changes as u64;
        self.sync_queue_metrics();
        tracing::debug!(
            target: "table::pipeline",
            message_id,
            version = ?accepted.version,
            initial = accepted.initial,
            changes,
            "pipeline.state_applied"
        );
        self.emit(PipelineEvent::StateApplied {
            message_id,
            version: accepted.version,
            initial: accepted.initial,
            changes,
        });
        MessageOutcome::Applied {
            version: accepted.version,
            changes,
        }
    }

    /// Advances the clock, then prunes records that finished more than the
    /// configured grace period ago.
    pub fn tick(&mut self, tick: &TickEvent) -> Result<ClockState, ClockError> {
        let state = match self
            .clock
            .tick(tick.warped_time, tick.former_time, tick.speed)
        {
            Ok(state) => state,
            Err(err) => {
                self.metrics.clock_rejections += 1;
                self.emit(PipelineEvent::ClockRejected(err));
                return Err(err);
            }
        };
        self.metrics.ticks += 1;
        self.emit(PipelineEvent::Ticked(state));
        self.prune(state.warped_time - self.config.prune_grace_ms());
        Ok(state)
    }

    /// Evicts records that ended before `before`.
    pub fn prune(&mut self, before: LogicalTime) -> usize {
        let evicted = self.queue.prune(before);
        self.sync_queue_metrics();
        if evicted > 0 {
            self.emit(PipelineEvent::Pruned {
                evicted,
                remaining: self.queue.len(),
            });
        }
        evicted
    }

    /// The tree at the current logical time.
    pub fn rendered_state(&self) -> RenderedState {
        sample(&self.queue, self.clock.now())
    }

    /// The tree at an arbitrary time. Times before the last prune may no
    /// longer show transitions that were evicted.
    pub fn sample_at(&self, time: LogicalTime) -> RenderedState {
        sample(&self.queue, time)
    }

    /// Rendered value at `path`, or the whole tree for `None`.
    pub fn get_rendered_state(&self, path: Option<&PropertyPath>) -> Option<StateValue> {
        match path {
            Some(path) => sample_path(&self.queue, path, self.clock.now()),
            None => self.rendered_state().into_root(),
        }
    }

    /// Samples the current frame and records it in the metrics.
    pub fn render_frame(&mut self) -> RenderedState {
        let rendered = self.rendered_state();
        self.metrics.frames += 1;
        self.metrics.skipped_paths += rendered.skipped().len() as u64;
        rendered
    }

    /// Clears store, queue, clock and counters. Observers stay subscribed.
    pub fn reset_for_replay(&mut self) {
        self.store.reset();
        self.queue.reset();
        self.clock.reset();
        self.metrics = PipelineMetrics::default();
        self.next_message_id = 0;
    }

    fn sync_queue_metrics(&mut self) {
        self.metrics.queue_depth = self.queue.len();
        self.metrics.superseded = self.queue.superseded_total();
        self.metrics.evicted = self.queue.evicted_total();
    }

    fn emit(&mut self, event: PipelineEvent) {
        for observer in &mut self.observers {
            observer.on_event(&event);
        }
    }
}
