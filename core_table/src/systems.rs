use bevy::prelude::*;

use crate::animation_config::AnimationConfigHandle;
use crate::pipeline::TablePipeline;
use crate::{InboundEvent, RenderedFrame};

/// Hands a replaced animation config to the pipeline.
pub fn sync_animation_config(
    handle: Res<AnimationConfigHandle>,
    mut pipeline: ResMut<TablePipeline>,
) {
    if handle.is_changed() && !handle.is_added() {
        pipeline.set_config(handle.get());
        tracing::info!(target: "table::config", "animation_config.applied");
    }
}

/// Feeds this frame's inbound messages to the pipeline in delivery order.
pub fn ingest_inbound_events(
    mut events: EventReader<InboundEvent>,
    mut pipeline: ResMut<TablePipeline>,
) {
    for InboundEvent(message) in events.read() {
        pipeline.handle_message(message);
    }
}

pub fn publish_rendered_frame(
    mut pipeline: ResMut<TablePipeline>,
    mut frame: ResMut<RenderedFrame>,
) {
    frame.0 = pipeline.render_frame();
}
