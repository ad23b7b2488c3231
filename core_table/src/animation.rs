use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use table_schema::{PropertyPath, StateValue};

use crate::clock::{ClockState, LogicalTime};
use crate::diff::PathChange;
use crate::interpolate::{self, Curve, DEFAULT_SWITCH_POINT};

/// Presentation hint carried by a record. Sampling does not look at it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AnimationKind {
    #[default]
    Become,
    TranslateToTop,
    Tween,
}

/// How a new record on a path interacts with records already queued there.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergePolicy {
    /// Interrupt in-flight records and start from their current value.
    #[default]
    Override,
    /// Start once the latest record on the path has finished.
    Chain,
}

/// A time-bounded transition of one path from `start_value` to `end_value`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnimationRecord {
    pub id: u64,
    pub path: PropertyPath,
    pub kind: AnimationKind,
    pub start_value: Option<StateValue>,
    pub end_value: Option<StateValue>,
    pub start_time: LogicalTime,
    pub end_time: LogicalTime,
    pub duration: f64,
    pub curve: Curve,
    pub switch_point: f64,
    /// Inbound message that produced the record.
    pub source_id: Option<u64>,
    pub merge_policy: MergePolicy,
}

impl AnimationRecord {
    /// Records with an unbounded span never expire.
    pub fn is_baseline(&self) -> bool {
        self.end_time == f64::INFINITY
    }

    pub fn is_expired_at(&self, time: LogicalTime) -> bool {
        !self.is_baseline() && self.end_time < time
    }

    pub fn is_active_at(&self, time: LogicalTime) -> bool {
        self.start_time <= time && time < self.end_time
    }

    /// Queue precedence: later `start_time` first, then later insertion.
    pub fn precedence_cmp(&self, other: &AnimationRecord) -> Ordering {
        self.start_time
            .total_cmp(&other.start_time)
            .then(self.id.cmp(&other.id))
    }

    /// Whether `self` should be rendered instead of `other` at `time`.
    ///
    /// Started records beat upcoming ones. Among started records the
    /// highest precedence wins; among upcoming ones the earliest does.
    pub fn outranks_at(&self, other: &AnimationRecord, time: LogicalTime) -> bool {
        match (self.start_time <= time, other.start_time <= time) {
            (true, false) => true,
            (false, true) => false,
            (true, true) => self.precedence_cmp(other) == Ordering::Greater,
            (false, false) => self.precedence_cmp(other) == Ordering::Less,
        }
    }

    pub fn value_at(&self, time: LogicalTime) -> Option<StateValue> {
        interpolate::value_at(self, time)
    }
}

/// Timing decided for one change.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnimationTiming {
    pub duration: f64,
    pub curve: Curve,
    pub kind: AnimationKind,
    pub merge_policy: MergePolicy,
    pub switch_point: f64,
}

impl AnimationTiming {
    pub fn new(duration: f64) -> Self {
        Self {
            duration,
            curve: Curve::Linear,
            kind: AnimationKind::Become,
            merge_policy: MergePolicy::Override,
            switch_point: DEFAULT_SWITCH_POINT,
        }
    }

    pub fn with_curve(mut self, curve: Curve) -> Self {
        self.curve = curve;
        self
    }

    pub fn with_kind(mut self, kind: AnimationKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_merge_policy(mut self, merge_policy: MergePolicy) -> Self {
        self.merge_policy = merge_policy;
        self
    }

    pub fn with_switch_point(mut self, switch_point: f64) -> Self {
        self.switch_point = switch_point;
        self
    }
}

/// Decides how long, and how, each change animates.
pub trait DurationPolicy {
    fn timing_for(&self, change: &PathChange) -> AnimationTiming;
}

impl DurationPolicy for AnimationTiming {
    fn timing_for(&self, _change: &PathChange) -> AnimationTiming {
        *self
    }
}

/// Kind used when no rule names one.
pub fn default_kind(change: &PathChange) -> AnimationKind {
    if change.is_numeric() {
        AnimationKind::Tween
    } else {
        AnimationKind::Become
    }
}

/// Same duration for every change, linear, override.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedDuration(pub f64);

impl DurationPolicy for FixedDuration {
    fn timing_for(&self, change: &PathChange) -> AnimationTiming {
        AnimationTiming::new(self.0).with_kind(default_kind(change))
    }
}

/// Ordered animation records plus the bookkeeping for eviction.
#[derive(Debug, Clone, Default)]
pub struct AnimationQueue {
    records: Vec<AnimationRecord>,
    next_id: u64,
    superseded: u64,
    evicted: u64,
}

impl AnimationQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records in insertion order.
    pub fn records(&self) -> &[AnimationRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Total records removed by override supersession.
    pub fn superseded_total(&self) -> u64 {
        self.superseded
    }

    /// Total records removed by [`AnimationQueue::prune`].
    pub fn evicted_total(&self) -> u64 {
        self.evicted
    }

    /// The most recent root baseline, if a state has been loaded.
    pub fn baseline(&self) -> Option<&AnimationRecord> {
        self.records
            .iter()
            .filter(|record| record.path.is_root() && record.is_baseline())
            .max_by(|a, b| a.precedence_cmp(b))
    }

    /// Installs the synthetic root BECOME record for a freshly loaded state.
    pub fn install_baseline(
        &mut self,
        state: StateValue,
        source_id: Option<u64>,
    ) -> &AnimationRecord {
        let record = AnimationRecord {
            id: self.allocate_id(),
            path: PropertyPath::root(),
            kind: AnimationKind::Become,
            start_value: Some(state.clone()),
            end_value: Some(state),
            start_time: 0.0,
            end_time: f64::INFINITY,
            duration: f64::INFINITY,
            curve: Curve::Linear,
            switch_point: DEFAULT_SWITCH_POINT,
            source_id,
            merge_policy: MergePolicy::Override,
        };
        tracing::debug!(
            target: "table::queue",
            id = record.id,
            source_id = ?source_id,
            "queue.baseline_installed"
        );
        self.push(record)
    }

    /// Enqueues `change` starting at the clock's current time.
    pub fn enqueue(
        &mut self,
        change: &PathChange,
        clock: &ClockState,
        policy: &dyn DurationPolicy,
        source_id: Option<u64>,
    ) -> &AnimationRecord {
        self.enqueue_at(change, clock.warped_time, policy, source_id)
    }

    /// Enqueues `change` at a caller-chosen start time.
    pub fn enqueue_at(
        &mut self,
        change: &PathChange,
        start_time: LogicalTime,
        policy: &dyn DurationPolicy,
        source_id: Option<u64>,
    ) -> &AnimationRecord {
        let timing = policy.timing_for(change);
        let duration = if timing.duration.is_nan() || timing.duration < 0.0 {
            0.0
        } else {
            timing.duration
        };

        let mut start_time = start_time;
        let mut start_value = change.old_value.clone();
        match timing.merge_policy {
            MergePolicy::Override => {
                if let Some(current) = self
                    .in_flight(&change.path, start_time)
                    .map(|record| record.value_at(start_time))
                {
                    start_value = current;
                }
                self.supersede(&change.path, start_time);
            }
            MergePolicy::Chain => {
                if let Some((tail_end, tail_value)) = self
                    .chain_tail(&change.path)
                    .filter(|tail| tail.end_time > start_time)
                    .map(|tail| (tail.end_time, tail.end_value.clone()))
                {
                    start_time = tail_end;
                    start_value = tail_value;
                }
            }
        }

        let record = AnimationRecord {
            id: self.allocate_id(),
            path: change.path.clone(),
            kind: timing.kind,
            start_value,
            end_value: change.new_value.clone(),
            start_time,
            end_time: start_time + duration,
            duration,
            curve: timing.curve,
            switch_point: timing.switch_point,
            source_id,
            merge_policy: timing.merge_policy,
        };
        tracing::trace!(
            target: "table::queue",
            id = record.id,
            path = %record.path,
            start_time = record.start_time,
            end_time = record.end_time,
            kind = ?record.kind,
            "queue.enqueued"
        );
        self.push(record)
    }

    /// Evicts every finite record that ended before `current_time` and
    /// returns how many were removed.
    ///
    /// Expired end values are folded, oldest first, into older records that
    /// cover their path (the baseline included), so sampling at or after
    /// `current_time` renders the same tree as before the prune. Older
    /// records under an expired path can never render again and go with it.
    pub fn prune(&mut self, current_time: LogicalTime) -> usize {
        let (mut expired, retained): (Vec<_>, Vec<_>) = std::mem::take(&mut self.records)
            .into_iter()
            .partition(|record| record.is_expired_at(current_time));
        self.records = retained;
        if expired.is_empty() {
            return 0;
        }

        expired.sort_by(|a, b| a.precedence_cmp(b));
        let mut evicted = expired.len();
        for record in &expired {
            evicted += self.drop_shadowed_descendants(record);
            self.fold_into_holders(record);
        }
        self.evicted += evicted as u64;
        tracing::debug!(
            target: "table::queue",
            current_time,
            evicted,
            remaining = self.records.len(),
            "queue.pruned"
        );
        evicted
    }

    /// Records targeting exactly `path`, in insertion order.
    pub fn records_for(&self, path: &PropertyPath) -> Vec<&AnimationRecord> {
        self.records
            .iter()
            .filter(|record| &record.path == path)
            .collect()
    }

    /// The record that would render `path` at `time`, ignoring ancestors.
    pub fn effective_record(
        &self,
        path: &PropertyPath,
        time: LogicalTime,
    ) -> Option<&AnimationRecord> {
        self.records
            .iter()
            .filter(|record| &record.path == path)
            .fold(None, |best, record| match best {
                Some(current) if !record.outranks_at(current, time) => Some(current),
                _ => Some(record),
            })
    }

    /// Rendered value at `path` and `time`, honouring ancestors.
    pub fn value_at(&self, path: &PropertyPath, time: LogicalTime) -> Option<StateValue> {
        crate::sampler::sample_path(self, path, time)
    }

    /// Drops every record. Id allocation restarts so a replay reproduces
    /// the same ids.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    fn allocate_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn push(&mut self, record: AnimationRecord) -> &AnimationRecord {
        let index = self.records.len();
        self.records.push(record);
        &self.records[index]
    }

    fn in_flight(&self, path: &PropertyPath, time: LogicalTime) -> Option<&AnimationRecord> {
        self.records
            .iter()
            .filter(|record| &record.path == path)
            .filter(|record| !record.is_baseline() && record.is_active_at(time))
            .max_by(|a, b| a.precedence_cmp(b))
    }

    fn chain_tail(&self, path: &PropertyPath) -> Option<&AnimationRecord> {
        self.records
            .iter()
            .filter(|record| &record.path == path)
            .filter(|record| !record.is_baseline())
            .max_by(|a, b| {
                a.end_time
                    .total_cmp(&b.end_time)
                    .then(a.precedence_cmp(b))
            })
    }

    /// Removes finite records on `path` that started by `start_time` and are
    /// still running then. Their end values are folded into older covering
    /// records so shape changes they carried (list growth, new keys) survive.
    fn supersede(&mut self, path: &PropertyPath, start_time: LogicalTime) {
        let (mut superseded, retained): (Vec<_>, Vec<_>) = std::mem::take(&mut self.records)
            .into_iter()
            .partition(|record| {
                !record.is_baseline()
                    && &record.path == path
                    && record.start_time <= start_time
                    && record.end_time > start_time
            });
        self.records = retained;
        if superseded.is_empty() {
            return;
        }

        superseded.sort_by(|a, b| a.precedence_cmp(b));
        for record in &superseded {
            self.fold_into_holders(record);
        }
        self.superseded += superseded.len() as u64;
        tracing::trace!(
            target: "table::queue",
            path = %path,
            removed = superseded.len(),
            "queue.superseded"
        );
    }

    fn drop_shadowed_descendants(&mut self, expired: &AnimationRecord) -> usize {
        let before = self.records.len();
        self.records.retain(|record| {
            !(expired.path.is_ancestor_of(&record.path)
                && record.precedence_cmp(expired) == Ordering::Less)
        });
        before - self.records.len()
    }

    fn fold_into_holders(&mut self, expired: &AnimationRecord) {
        for holder in &mut self.records {
            if holder.precedence_cmp(expired) != Ordering::Less {
                continue;
            }
            let Some(relative) = expired.path.strip_prefix(&holder.path) else {
                continue;
            };
            for slot in [&mut holder.start_value, &mut holder.end_value] {
                absorb(slot, &relative, expired.end_value.clone());
            }
        }
    }
}

fn absorb(slot: &mut Option<StateValue>, relative: &PropertyPath, value: Option<StateValue>) {
    if relative.is_root() {
        *slot = value;
        return;
    }
    if let Some(tree) = slot.as_mut() {
        if let Err(err) = tree.put(relative, value) {
            tracing::trace!(
                target: "table::queue",
                path = %relative,
                error = %err,
                "queue.fold_skipped"
            );
        }
    }
}
