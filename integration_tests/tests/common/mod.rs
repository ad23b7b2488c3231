#![allow(dead_code)]

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use core_table::{AnimationConfig, TablePipeline};
use table_schema::{Amount, InboundMessage, PropertyPath, RecordedSession, StateValue};

pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

pub fn test_config() -> Arc<AnimationConfig> {
    let path = fixture_path("test_animation_config.json");
    Arc::new(
        AnimationConfig::from_file(&path)
            .unwrap_or_else(|err| panic!("failed to load {}: {err}", path.display())),
    )
}

/// Pipeline with every change animating over `duration_ms`.
pub fn uniform_pipeline(duration_ms: f64) -> TablePipeline {
    TablePipeline::new(Arc::new(
        AnimationConfig::uniform(duration_ms).with_fatal_clock_regressions(false),
    ))
}

pub fn fixture_pipeline() -> TablePipeline {
    TablePipeline::new(test_config())
}

pub fn load_session(name: &str) -> RecordedSession {
    let path = fixture_path(name);
    RecordedSession::from_file(&path)
        .unwrap_or_else(|err| panic!("failed to load {}: {err}", path.display()))
}

pub fn state(value: serde_json::Value) -> StateValue {
    StateValue::from_json(&value)
}

pub fn gamestate(version: i64, value: serde_json::Value) -> InboundMessage {
    InboundMessage::gamestate(version, state(value))
}

pub fn chips(text: &str) -> StateValue {
    StateValue::Amount(Amount::from_str(text).expect("valid amount"))
}

pub fn rendered(pipeline: &TablePipeline, path: &str) -> Option<StateValue> {
    pipeline.get_rendered_state(Some(&PropertyPath::parse(path)))
}
