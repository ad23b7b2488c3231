use bevy::prelude::*;
use serde::Serialize;

use crate::pipeline::TablePipeline;

#[derive(Resource, Default, Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PipelineMetrics {
    pub frames: u64,
    pub messages: u64,
    pub accepted: u64,
    pub stale_dropped: u64,
    pub ignored: u64,
    pub ticks: u64,
    pub clock_rejections: u64,
    pub enqueued: u64,
    pub superseded: u64,
    pub evicted: u64,
    pub skipped_paths: u64,
    pub queue_depth: usize,
}

pub fn collect_metrics(pipeline: Res<TablePipeline>, mut metrics: ResMut<PipelineMetrics>) {
    metrics.clone_from(pipeline.metrics());
}
