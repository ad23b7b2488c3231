use std::{
    env, fmt, fs, io,
    path::{Path, PathBuf},
    sync::Arc,
};

use bevy::prelude::Resource;
use serde::Deserialize;
use table_schema::PropertyPath;
use thiserror::Error;

use crate::animation::{
    default_kind, AnimationKind, AnimationTiming, DurationPolicy, MergePolicy,
};
use crate::diff::PathChange;
use crate::interpolate::{Curve, DEFAULT_SWITCH_POINT};

pub const BUILTIN_ANIMATION_CONFIG: &str = include_str!("data/animation_config.json");
pub const ANIMATION_CONFIG_ENV: &str = "ANIMATION_CONFIG_PATH";

/// Per-path animation timing, read from JSON.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AnimationConfig {
    default_duration_ms: f64,
    default_curve: Curve,
    switch_point: f64,
    prune_grace_ms: f64,
    fatal_clock_regressions: Option<bool>,
    rules: Vec<AnimationRule>,
}

impl Default for AnimationConfig {
    fn default() -> Self {
        Self {
            default_duration_ms: 300.0,
            default_curve: Curve::Linear,
            switch_point: DEFAULT_SWITCH_POINT,
            prune_grace_ms: 1000.0,
            fatal_clock_regressions: None,
            rules: Vec::new(),
        }
    }
}

impl AnimationConfig {
    pub fn builtin() -> Arc<Self> {
        Arc::new(
            Self::from_json_str(BUILTIN_ANIMATION_CONFIG)
                .expect("builtin animation config should parse"),
        )
    }

    /// Same duration for every path, no rules.
    pub fn uniform(duration_ms: f64) -> Self {
        Self {
            default_duration_ms: duration_ms,
            ..Self::default()
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self, AnimationConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, AnimationConfigError> {
        let contents =
            fs::read_to_string(path).map_err(|source| AnimationConfigError::ReadFailed {
                path: path.to_path_buf(),
                source,
            })?;
        Self::from_json_str(&contents)
    }

    pub fn with_rule(mut self, rule: AnimationRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn with_prune_grace_ms(mut self, grace_ms: f64) -> Self {
        self.prune_grace_ms = grace_ms;
        self
    }

    pub fn with_fatal_clock_regressions(mut self, fatal: bool) -> Self {
        self.fatal_clock_regressions = Some(fatal);
        self
    }

    pub fn default_duration_ms(&self) -> f64 {
        self.default_duration_ms
    }

    pub fn default_curve(&self) -> Curve {
        self.default_curve
    }

    pub fn switch_point(&self) -> f64 {
        self.switch_point
    }

    /// How far behind the clock a finished record may linger before it is
    /// pruned.
    pub fn prune_grace_ms(&self) -> f64 {
        self.prune_grace_ms
    }

    /// `None` defers to the build profile.
    pub fn fatal_clock_regressions(&self) -> Option<bool> {
        self.fatal_clock_regressions
    }

    pub fn rules(&self) -> &[AnimationRule] {
        &self.rules
    }

    /// First rule whose pattern matches `path`.
    pub fn rule_for(&self, path: &PropertyPath) -> Option<&AnimationRule> {
        self.rules.iter().find(|rule| rule.pattern.matches(path))
    }

    fn validate(&self) -> Result<(), AnimationConfigError> {
        check_duration("default_duration_ms", self.default_duration_ms)?;
        check_duration("prune_grace_ms", self.prune_grace_ms)?;
        check_switch_point("switch_point", self.switch_point)?;
        for rule in &self.rules {
            if let Some(duration) = rule.duration_ms {
                check_duration(&format!("rules[{}].duration_ms", rule.pattern), duration)?;
            }
            if let Some(switch_point) = rule.switch_point {
                check_switch_point(&format!("rules[{}].switch_point", rule.pattern), switch_point)?;
            }
        }
        Ok(())
    }
}

fn check_duration(field: &str, value: f64) -> Result<(), AnimationConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(AnimationConfigError::Invalid {
            field: field.to_string(),
            reason: format!("{value} is not a non-negative duration"),
        })
    }
}

fn check_switch_point(field: &str, value: f64) -> Result<(), AnimationConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(AnimationConfigError::Invalid {
            field: field.to_string(),
            reason: format!("{value} is outside [0, 1]"),
        })
    }
}

impl DurationPolicy for AnimationConfig {
    fn timing_for(&self, change: &PathChange) -> AnimationTiming {
        let rule = self.rule_for(&change.path);
        AnimationTiming {
            duration: rule
                .and_then(|rule| rule.duration_ms)
                .unwrap_or(self.default_duration_ms),
            curve: rule
                .and_then(|rule| rule.curve)
                .unwrap_or(self.default_curve),
            kind: rule
                .and_then(|rule| rule.kind)
                .unwrap_or_else(|| default_kind(change)),
            merge_policy: rule.and_then(|rule| rule.merge).unwrap_or_default(),
            switch_point: rule
                .and_then(|rule| rule.switch_point)
                .unwrap_or(self.switch_point),
        }
    }
}

/// Overrides for paths matching `pattern`. Unset fields fall back to the
/// config defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct AnimationRule {
    pub pattern: PathPattern,
    pub duration_ms: Option<f64>,
    pub curve: Option<Curve>,
    pub kind: Option<AnimationKind>,
    pub merge: Option<MergePolicy>,
    pub switch_point: Option<f64>,
}

impl AnimationRule {
    pub fn new(pattern: PathPattern) -> Self {
        Self {
            pattern,
            duration_ms: None,
            curve: None,
            kind: None,
            merge: None,
            switch_point: None,
        }
    }

    pub fn duration_ms(mut self, duration_ms: f64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    pub fn curve(mut self, curve: Curve) -> Self {
        self.curve = Some(curve);
        self
    }

    pub fn kind(mut self, kind: AnimationKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn merge(mut self, merge: MergePolicy) -> Self {
        self.merge = Some(merge);
        self
    }
}

/// Path pattern: `*` matches exactly one segment, a trailing `**` matches
/// any remainder (including none).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub struct PathPattern {
    segments: Vec<String>,
    open_ended: bool,
}

impl PathPattern {
    pub fn parse(text: &str) -> Result<Self, AnimationConfigError> {
        let mut segments: Vec<String> = PropertyPath::parse(text).segments().to_vec();
        let open_ended = segments.last().is_some_and(|segment| segment == "**");
        if open_ended {
            segments.pop();
        }
        if segments.iter().any(|segment| segment == "**") {
            return Err(AnimationConfigError::InvalidPattern(text.to_string()));
        }
        Ok(Self {
            segments,
            open_ended,
        })
    }

    pub fn matches(&self, path: &PropertyPath) -> bool {
        let segments = path.segments();
        let length_ok = if self.open_ended {
            segments.len() >= self.segments.len()
        } else {
            segments.len() == self.segments.len()
        };
        length_ok
            && self
                .segments
                .iter()
                .zip(segments)
                .all(|(pattern, segment)| pattern == "*" || pattern == segment)
    }
}

impl TryFrom<String> for PathPattern {
    type Error = AnimationConfigError;

    fn try_from(text: String) -> Result<Self, Self::Error> {
        Self::parse(&text)
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for segment in &self.segments {
            write!(f, "/{segment}")?;
        }
        if self.open_ended {
            f.write_str("/**")?;
        } else if self.segments.is_empty() {
            f.write_str("/")?;
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum AnimationConfigError {
    #[error("failed to parse animation config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("failed to read animation config from {path:?}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid animation config field {field}: {reason}")]
    Invalid { field: String, reason: String },
    #[error("`**` may only end a pattern: {0}")]
    InvalidPattern(String),
}

/// Handle for accessing the animation configuration.
#[derive(Resource, Debug, Clone)]
pub struct AnimationConfigHandle(pub Arc<AnimationConfig>);

impl AnimationConfigHandle {
    pub fn new(config: Arc<AnimationConfig>) -> Self {
        Self(config)
    }

    pub fn get(&self) -> Arc<AnimationConfig> {
        Arc::clone(&self.0)
    }

    pub fn replace(&mut self, config: Arc<AnimationConfig>) {
        self.0 = config;
    }
}

/// Where the active animation configuration came from.
#[derive(Resource, Debug, Clone)]
pub struct AnimationConfigMetadata {
    path: Option<PathBuf>,
}

impl AnimationConfigMetadata {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }

    /// `None` for the builtin config.
    pub fn path(&self) -> Option<&PathBuf> {
        self.path.as_ref()
    }
}

/// Load animation configuration from `ANIMATION_CONFIG_PATH`, falling back
/// to the builtin.
pub fn load_animation_config_from_env() -> (Arc<AnimationConfig>, AnimationConfigMetadata) {
    let override_path = env::var(ANIMATION_CONFIG_ENV).ok().map(PathBuf::from);
    load_animation_config(override_path)
}

/// Load animation configuration from `path` when given, otherwise the
/// builtin. A file that fails to load is logged and the builtin is used.
pub fn load_animation_config(
    path: Option<PathBuf>,
) -> (Arc<AnimationConfig>, AnimationConfigMetadata) {
    if let Some(path) = path {
        match AnimationConfig::from_file(&path) {
            Ok(config) => {
                tracing::info!(
                    target: "table::config",
                    path = %path.display(),
                    "animation_config.loaded=file"
                );
                return (Arc::new(config), AnimationConfigMetadata::new(Some(path)));
            }
            Err(err) => {
                tracing::warn!(
                    target: "table::config",
                    path = %path.display(),
                    error = %err,
                    "animation_config.load_failed"
                );
            }
        }
    }

    let config = AnimationConfig::builtin();
    tracing::info!(
        target: "table::config",
        "animation_config.loaded=builtin"
    );
    (config, AnimationConfigMetadata::new(None))
}

#[cfg(test)]
mod tests {
    use super::*;
    use table_schema::{Amount, StateValue};

    fn chips(value: i64) -> StateValue {
        StateValue::Amount(Amount::from_i64(value))
    }

    #[test]
    fn builtin_config_parses() {
        let config = AnimationConfig::builtin();
        assert!(!config.rules().is_empty());
        assert_eq!(config.fatal_clock_regressions(), None);
    }

    #[test]
    fn patterns_match_single_and_trailing_wildcards() {
        let stack = PathPattern::parse("/players/*/stack").unwrap();
        assert!(stack.matches(&PropertyPath::parse("/players/7/stack")));
        assert!(!stack.matches(&PropertyPath::parse("/players/7")));
        assert!(!stack.matches(&PropertyPath::parse("/players/7/stack/x")));

        let pots = PathPattern::parse("/pots/**").unwrap();
        assert!(pots.matches(&PropertyPath::parse("/pots")));
        assert!(pots.matches(&PropertyPath::parse("/pots/main/amount")));
        assert!(!pots.matches(&PropertyPath::parse("/board/0")));
        assert_eq!(pots.to_string(), "/pots/**");

        assert!(matches!(
            PathPattern::parse("/a/**/b"),
            Err(AnimationConfigError::InvalidPattern(_))
        ));
    }

    #[test]
    fn first_matching_rule_wins() {
        let config = AnimationConfig::from_json_str(
            r#"{
                "default_duration_ms": 100,
                "rules": [
                    { "pattern": "/players/*/stack", "duration_ms": 1000, "curve": "ease_out" },
                    { "pattern": "/players/**", "duration_ms": 5, "merge": "chain" }
                ]
            }"#,
        )
        .unwrap();
        let stack = PathChange::changed(
            PropertyPath::parse("/players/7/stack"),
            chips(1),
            chips(2),
        );
        let timing = config.timing_for(&stack);
        assert_eq!(timing.duration, 1000.0);
        assert_eq!(timing.curve, Curve::EaseOut);
        assert_eq!(timing.kind, AnimationKind::Tween);
        assert_eq!(timing.merge_policy, MergePolicy::Override);

        let name = PathChange::changed(
            PropertyPath::parse("/players/7/name"),
            StateValue::from("ann"),
            StateValue::from("bob"),
        );
        let timing = config.timing_for(&name);
        assert_eq!(timing.duration, 5.0);
        assert_eq!(timing.kind, AnimationKind::Become);
        assert_eq!(timing.merge_policy, MergePolicy::Chain);

        let pot = PathChange::added(PropertyPath::parse("/pot"), chips(3));
        assert_eq!(config.timing_for(&pot).duration, 100.0);
    }

    #[test]
    fn rules_built_in_code_match_like_parsed_ones() {
        let config = AnimationConfig::uniform(250.0).with_rule(
            AnimationRule::new(PathPattern::parse("/players/*/bet").unwrap())
                .duration_ms(400.0)
                .curve(Curve::EaseIn)
                .kind(AnimationKind::TranslateToTop)
                .merge(MergePolicy::Chain),
        );
        let bet = PathChange::changed(PropertyPath::parse("/players/2/bet"), chips(0), chips(5));
        let timing = config.timing_for(&bet);
        assert_eq!(timing.duration, 400.0);
        assert_eq!(timing.curve, Curve::EaseIn);
        assert_eq!(timing.kind, AnimationKind::TranslateToTop);
        assert_eq!(timing.merge_policy, MergePolicy::Chain);
        assert_eq!(timing.switch_point, config.switch_point());

        let pot = PathChange::changed(PropertyPath::parse("/pot"), chips(0), chips(5));
        assert_eq!(config.timing_for(&pot).duration, 250.0);
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(matches!(
            AnimationConfig::from_json_str(r#"{ "default_duration_ms": -1 }"#),
            Err(AnimationConfigError::Invalid { .. })
        ));
        assert!(matches!(
            AnimationConfig::from_json_str(
                r#"{ "rules": [{ "pattern": "/a", "switch_point": 2 }] }"#
            ),
            Err(AnimationConfigError::Invalid { .. })
        ));
        assert!(matches!(
            AnimationConfig::from_json_str(r#"{ "default_curve": "bouncy" }"#),
            Err(AnimationConfigError::Parse(_))
        ));
    }

    #[test]
    fn missing_file_falls_back_to_builtin() {
        let (config, metadata) =
            load_animation_config(Some(PathBuf::from("/nonexistent/animation_config.json")));
        assert!(metadata.path().is_none());
        assert_eq!(config.rules().len(), AnimationConfig::builtin().rules().len());
    }
}
