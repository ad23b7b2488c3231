//! Client-side state and animation pipeline for a poker table.
//!
//! Versioned server snapshots are reconciled into one authoritative state;
//! every accepted change becomes a time-bounded animation record, and the
//! sampler renders the record queue at the logical time advanced by TICK
//! messages. [`build_table_app`] wires the pipeline into a headless Bevy
//! app that processes one frame per [`run_frame`].

pub mod animation;
pub mod animation_config;
pub mod clock;
pub mod diff;
pub mod interpolate;
pub mod metrics;
mod pipeline;
mod replay;
pub mod sampler;
pub mod store;
mod systems;

use std::sync::Arc;

use bevy::prelude::*;
use table_schema::InboundMessage;

pub use animation::{
    AnimationKind, AnimationQueue, AnimationRecord, AnimationTiming, DurationPolicy,
    FixedDuration, MergePolicy,
};
pub use animation_config::{
    load_animation_config, load_animation_config_from_env, AnimationConfig,
    AnimationConfigError, AnimationConfigHandle, AnimationConfigMetadata, AnimationRule,
    PathPattern,
};
pub use clock::{ClockError, ClockState, LogicalClock, LogicalTime};
pub use diff::{apply_changes, diff, ChangeKind, PathChange};
pub use interpolate::Curve;
pub use metrics::PipelineMetrics;
pub use pipeline::{MessageOutcome, PipelineEvent, PipelineObserver, TablePipeline};
pub use replay::{ReplayReport, ReplayTarget};
pub use sampler::{sample, sample_path, RenderedState};
pub use store::{AcceptedUpdate, GameStateStore, StatePatch, StoreError};

/// Inbound message delivered to the app by the transport or frame driver.
#[derive(Event, Debug, Clone)]
pub struct InboundEvent(pub InboundMessage);

/// The tree sampled during the most recent frame.
#[derive(Resource, Debug, Clone)]
pub struct RenderedFrame(pub RenderedState);

impl Default for RenderedFrame {
    fn default() -> Self {
        Self(RenderedState::empty(0.0))
    }
}

/// Construct a Bevy [`App`] running the table pipeline with `config`.
pub fn build_table_app(config: Arc<AnimationConfig>) -> App {
    let mut app = App::new();

    app.insert_resource(AnimationConfigHandle::new(Arc::clone(&config)))
        .insert_resource(TablePipeline::new(config))
        .insert_resource(RenderedFrame::default())
        .insert_resource(PipelineMetrics::default())
        .add_event::<InboundEvent>()
        .add_plugins(MinimalPlugins)
        .add_systems(
            Update,
            (
                systems::sync_animation_config,
                systems::ingest_inbound_events,
                systems::publish_rendered_frame,
                metrics::collect_metrics,
            )
                .chain(),
        );

    app
}

/// Process one frame: pending inbound events, then sampling, then metrics.
pub fn run_frame(app: &mut App) {
    app.update();
}
