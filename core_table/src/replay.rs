use serde::Serialize;
use table_schema::{InboundMessage, RecordedSession, TickEvent};

use crate::clock::LogicalTime;
use crate::pipeline::TablePipeline;

/// How far into a session a replay runs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum ReplayTarget {
    /// Every entry.
    End,
    /// Entries with `seq` up to and including this one.
    Sequence(u64),
    /// Entries up to the first TICK past this time, then a tick to exactly
    /// this time.
    Time(LogicalTime),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReplayReport {
    pub target: ReplayTarget,
    pub entries_applied: usize,
    pub last_seq: Option<u64>,
    pub time: LogicalTime,
    pub version: Option<i64>,
    pub digest: u64,
}

impl TablePipeline {
    /// Rebuilds the pipeline from `session`, from time zero.
    ///
    /// The pipeline is reset first, so replaying the same session to the
    /// same target always produces the same rendered tree. Clock regressions
    /// inside a recording are rejected rather than fatal.
    pub fn replay(&mut self, session: &RecordedSession, target: ReplayTarget) -> ReplayReport {
        self.reset_for_replay();
        let fatal = self.clock.set_fatal_regressions(false);

        let mut entries_applied = 0;
        let mut last_seq = None;
        for entry in session.ordered() {
            let past_target = match (target, &entry.message) {
                (ReplayTarget::Sequence(limit), _) => entry.seq > limit,
                (ReplayTarget::Time(limit), InboundMessage::Tick(tick)) => {
                    tick.warped_time > limit
                }
                _ => false,
            };
            if past_target {
                break;
            }
            self.handle_message(&entry.message);
            entries_applied += 1;
            last_seq = Some(entry.seq);
        }

        if let ReplayTarget::Time(time) = target {
            let now = self.clock.now();
            if time >= now {
                if let Err(err) = self.tick(&TickEvent::new(time, now)) {
                    tracing::warn!(
                        target: "table::replay",
                        time,
                        error = %err,
                        "replay.final_tick_rejected"
                    );
                }
            } else {
                self.clock.seek(time);
            }
        }
        self.clock.set_fatal_regressions(fatal);

        let report = ReplayReport {
            target,
            entries_applied,
            last_seq,
            time: self.clock.now(),
            version: self.store.version(),
            digest: self.rendered_state().digest(),
        };
        tracing::info!(
            target: "table::replay",
            entries = report.entries_applied,
            last_seq = ?report.last_seq,
            time = report.time,
            digest = report.digest,
            "replay.finished"
        );
        report
    }
}
