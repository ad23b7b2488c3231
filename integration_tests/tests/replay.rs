mod common;

use common::{chips, fixture_path, fixture_pipeline, load_session, rendered};
use core_table::ReplayTarget;
use table_schema::{RecordedSession, StateValue};

#[test]
fn json_and_ndjson_sessions_replay_identically() -> anyhow::Result<()> {
    let document = RecordedSession::from_file(&fixture_path("session_basic.json"))?;
    let lines = RecordedSession::from_file(&fixture_path("session_basic.ndjson"))?;
    assert_eq!(document.len(), lines.len());

    let mut from_document = fixture_pipeline();
    let mut from_lines = fixture_pipeline();
    let a = from_document.replay(&document, ReplayTarget::End);
    let b = from_lines.replay(&lines, ReplayTarget::End);
    assert_eq!(a, b);
    Ok(())
}

#[test]
fn replaying_twice_is_identical() {
    let session = load_session("session_basic.json");
    let mut pipeline = fixture_pipeline();
    for target in [
        ReplayTarget::End,
        ReplayTarget::Sequence(5),
        ReplayTarget::Time(321.5),
    ] {
        let first = pipeline.replay(&session, target);
        let first_root = pipeline.rendered_state().into_root();
        let second = pipeline.replay(&session, target);
        assert_eq!(first, second);
        assert_eq!(pipeline.rendered_state().into_root(), first_root);
    }
}

#[test]
fn sequence_replay_matches_feeding_the_prefix() {
    let session = load_session("session_basic.json");
    for limit in 0..session.len() as u64 {
        let mut replayed = fixture_pipeline();
        let report = replayed.replay(&session, ReplayTarget::Sequence(limit));

        let mut fed = fixture_pipeline();
        for entry in session.ordered().into_iter().filter(|entry| entry.seq <= limit) {
            fed.handle_message(&entry.message);
        }

        assert_eq!(report.last_seq, Some(limit));
        assert_eq!(report.digest, fed.rendered_state().digest(), "seq {limit}");
        assert_eq!(replayed.store().state(), fed.store().state());
        assert_eq!(replayed.metrics(), fed.metrics());
    }
}

#[test]
fn time_replay_lands_between_ticks() {
    let session = load_session("session_basic.json");
    let mut pipeline = fixture_pipeline();
    let report = pipeline.replay(&session, ReplayTarget::Time(600.0));

    assert_eq!(report.time, 600.0);
    assert_eq!(report.last_seq, Some(9));
    assert_eq!(report.version, Some(1));
    // override from 999.5 (interrupted at t=100) toward 1200 over [100, 1100]
    assert_eq!(rendered(&pipeline, "/players/7/stack"), Some(chips("1099.75")));
    // chained behind the first bet animation: [450, 850], ease_out
    assert_eq!(rendered(&pipeline, "/players/7/bet"), Some(chips("3.90625")));
    assert_eq!(
        rendered(&pipeline, "/tournament/level"),
        Some(chips("2"))
    );
}

#[test]
fn full_replay_settles_on_the_last_accepted_state() {
    let session = load_session("session_basic.json");
    let mut pipeline = fixture_pipeline();
    let report = pipeline.replay(&session, ReplayTarget::End);

    assert_eq!(report.entries_applied, 12);
    assert_eq!(report.last_seq, Some(11));
    assert_eq!(report.time, 5000.0);
    assert_eq!(report.version, Some(1));

    assert_eq!(rendered(&pipeline, "/players/7/stack"), Some(chips("1200")));
    assert_eq!(rendered(&pipeline, "/players/7/bet"), Some(chips("0")));
    assert_eq!(rendered(&pipeline, "/tournament/level"), Some(chips("2")));
    match rendered(&pipeline, "/board") {
        Some(StateValue::List(cards)) => assert_eq!(cards.len(), 3),
        other => panic!("unexpected board {other:?}"),
    }
    assert_eq!(
        pipeline.rendered_state().root(),
        Some(pipeline.store().state())
    );

    let metrics = pipeline.metrics();
    assert_eq!(metrics.stale_dropped, 1);
    assert_eq!(metrics.ignored, 2);
    assert_eq!(metrics.ticks, 5);
    assert_eq!(metrics.clock_rejections, 0);
}
