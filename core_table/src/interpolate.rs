use serde::{Deserialize, Serialize};
use table_schema::StateValue;

use crate::animation::AnimationRecord;
use crate::clock::LogicalTime;

/// Default progress at which non-numeric transitions switch to their end
/// value.
pub const DEFAULT_SWITCH_POINT: f64 = 0.5;

/// Easing applied to the progress of a numeric transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Curve {
    #[default]
    Linear,
    EaseIn,
    EaseOut,
    EaseInOut,
    /// Holds the start value until the switch point, even for amounts.
    Step,
}

impl Curve {
    /// Maps linear progress in `[0, 1]` to eased progress in `[0, 1]`.
    pub fn remap(self, progress: f64) -> f64 {
        let p = progress.clamp(0.0, 1.0);
        match self {
            Curve::Linear => p,
            Curve::EaseIn => p * p,
            Curve::EaseOut => 1.0 - (1.0 - p) * (1.0 - p),
            Curve::EaseInOut => p * p * (3.0 - 2.0 * p),
            Curve::Step => {
                if p >= 1.0 {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }
}

/// Linear progress of `time` through `[start_time, end_time]`, clamped to
/// `[0, 1]`. An infinite span never progresses.
pub fn progress(start_time: LogicalTime, end_time: LogicalTime, time: LogicalTime) -> f64 {
    let span = end_time - start_time;
    if !span.is_finite() {
        return 0.0;
    }
    if span <= 0.0 {
        return if time >= start_time { 1.0 } else { 0.0 };
    }
    ((time - start_time) / span).clamp(0.0, 1.0)
}

/// Value of `record` at `time`.
///
/// Boundaries are exact: at or before `start_time` this is the start value,
/// at or after `end_time` the end value. Amount pairs are eased in
/// between; every other pair steps at the record's switch point.
pub fn value_at(record: &AnimationRecord, time: LogicalTime) -> Option<StateValue> {
    if record.duration <= 0.0 && time >= record.start_time {
        return record.end_value.clone();
    }
    if time <= record.start_time {
        return record.start_value.clone();
    }
    if time >= record.end_time {
        return record.end_value.clone();
    }

    let linear = progress(record.start_time, record.end_time, time);
    match (&record.start_value, &record.end_value) {
        (Some(StateValue::Amount(start)), Some(StateValue::Amount(end)))
            if record.curve != Curve::Step =>
        {
            Some(StateValue::Amount(start.lerp(*end, record.curve.remap(linear))))
        }
        _ if linear < record.switch_point => record.start_value.clone(),
        _ => record.end_value.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::{AnimationKind, MergePolicy};
    use table_schema::{Amount, PropertyPath};

    fn chips(value: i64) -> Option<StateValue> {
        Some(StateValue::Amount(Amount::from_i64(value)))
    }

    fn record(
        start_value: Option<StateValue>,
        end_value: Option<StateValue>,
        start_time: f64,
        duration: f64,
        curve: Curve,
    ) -> AnimationRecord {
        AnimationRecord {
            id: 1,
            path: PropertyPath::parse("/players/7/stack"),
            kind: AnimationKind::Tween,
            start_value,
            end_value,
            start_time,
            end_time: start_time + duration,
            duration,
            curve,
            switch_point: DEFAULT_SWITCH_POINT,
            source_id: None,
            merge_policy: MergePolicy::Override,
        }
    }

    #[test]
    fn stack_tween_matches_expected_timeline() {
        let tween = record(chips(1000), chips(1200), 100.0, 1000.0, Curve::Linear);
        assert_eq!(value_at(&tween, 0.0), chips(1000));
        assert_eq!(value_at(&tween, 100.0), chips(1000));
        assert_eq!(value_at(&tween, 600.0), chips(1100));
        assert_eq!(value_at(&tween, 1100.0), chips(1200));
        assert_eq!(value_at(&tween, 5000.0), chips(1200));
    }

    #[test]
    fn boundaries_are_exact_for_every_curve() {
        for curve in [
            Curve::Linear,
            Curve::EaseIn,
            Curve::EaseOut,
            Curve::EaseInOut,
            Curve::Step,
        ] {
            let tween = record(chips(3), chips(-7), 10.0, 30.0, curve);
            assert_eq!(value_at(&tween, 10.0), chips(3), "{curve:?}");
            assert_eq!(value_at(&tween, 40.0), chips(-7), "{curve:?}");
        }
    }

    #[test]
    fn zero_duration_jumps_at_start() {
        let jump = record(chips(1), chips(2), 50.0, 0.0, Curve::Linear);
        assert_eq!(value_at(&jump, 49.0), chips(1));
        assert_eq!(value_at(&jump, 50.0), chips(2));
    }

    #[test]
    fn non_numeric_values_step_at_switch_point() {
        let mut card = record(
            Some(StateValue::from("Ah")),
            Some(StateValue::from("Kd")),
            0.0,
            100.0,
            Curve::Linear,
        );
        assert_eq!(value_at(&card, 49.0), Some(StateValue::from("Ah")));
        assert_eq!(value_at(&card, 50.0), Some(StateValue::from("Kd")));

        card.switch_point = 0.9;
        assert_eq!(value_at(&card, 80.0), Some(StateValue::from("Ah")));

        let appearing = record(None, Some(StateValue::from("Qs")), 0.0, 100.0, Curve::Linear);
        assert_eq!(value_at(&appearing, 10.0), None);
        assert_eq!(value_at(&appearing, 60.0), Some(StateValue::from("Qs")));
    }

    #[test]
    fn eased_curves_bend_the_midpoint() {
        let ease_in = record(chips(0), chips(100), 0.0, 100.0, Curve::EaseIn);
        assert_eq!(value_at(&ease_in, 50.0), chips(25));
        let ease_out = record(chips(0), chips(100), 0.0, 100.0, Curve::EaseOut);
        assert_eq!(value_at(&ease_out, 50.0), chips(75));
        let ease_in_out = record(chips(0), chips(100), 0.0, 100.0, Curve::EaseInOut);
        assert_eq!(value_at(&ease_in_out, 50.0), chips(50));
        let step = record(chips(0), chips(100), 0.0, 100.0, Curve::Step);
        assert_eq!(value_at(&step, 40.0), chips(0));
        assert_eq!(value_at(&step, 60.0), chips(100));
    }

    #[test]
    fn infinite_span_holds_start() {
        assert_eq!(progress(0.0, f64::INFINITY, 1e12), 0.0);
        assert_eq!(progress(5.0, 5.0, 4.0), 0.0);
        assert_eq!(progress(5.0, 5.0, 5.0), 1.0);
    }
}
