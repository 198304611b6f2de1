use std::sync::Arc;

use tdb_common::{FrameId, LoadedRegions, PauseId};
use tdb_engine::{
    test_utils::{frame, pause, paused, point, positions, MockTransport},
    Command, CommandResult, Debugger, EngineConfig, EngineError, NavigationOutcome,
    PauseStatus, SeekTarget, TransportError,
};
use tracing::info;

fn setup(config: EngineConfig) -> (Arc<MockTransport>, Debugger<MockTransport>) {
    tdb_common::logging::ensure_test_logging(None);
    let transport = Arc::new(MockTransport::new());
    let debugger = Debugger::new(transport.clone(), config);
    debugger.load_recording(LoadedRegions::single(point("0"), point("10000"))).unwrap();
    (transport, debugger)
}

/// Resume to P1 at 500 with a two-frame stack, and select the outer frame.
async fn pause_in_outer_frame(transport: &MockTransport, debugger: &Debugger<MockTransport>) {
    transport.reply_to_command(paused("500", "P1"));
    transport.with_frames(PauseId::new("P1"), vec![frame("P1", "f0", 0), frame("P1", "f1", 1)]);
    transport.with_steps(
        PauseId::new("P1"),
        FrameId::new("f1"),
        positions(&["900", "100", "600", "300"]),
    );

    let outcome = debugger.run_command(Command::Resume).await.unwrap();
    assert!(matches!(outcome, NavigationOutcome::Paused(_)));
    debugger.select_frame(&FrameId::new("f1")).await.unwrap();
}

#[tokio::test]
async fn test_step_over_targets_next_step_of_selected_frame() {
    let (transport, debugger) = setup(EngineConfig::default());
    info!("Running test");
    pause_in_outer_frame(&transport, &debugger).await;

    transport.reply_to_command(paused("600", "P2"));
    let outcome = debugger.run_command(Command::StepOver).await.unwrap();

    let calls = transport.calls();
    assert_eq!(calls.commands.last(), Some(&(Command::StepOver, Some(point("600")))));
    match outcome {
        NavigationOutcome::Paused(entry) => {
            assert_eq!(entry.execution_point, point("600"));
            assert_eq!(entry.pause_id, PauseId::new("P2"));
        }
        other => panic!("unexpected outcome {other:?}"),
    }
}

#[tokio::test]
async fn test_reverse_step_over_targets_previous_step() {
    let (transport, debugger) = setup(EngineConfig::default());
    info!("Running test");
    pause_in_outer_frame(&transport, &debugger).await;

    transport.reply_to_command(paused("300", "P2"));
    debugger.run_command(Command::ReverseStepOver).await.unwrap();

    let calls = transport.calls();
    assert_eq!(calls.commands.last(), Some(&(Command::ReverseStepOver, Some(point("300")))));
}

#[tokio::test]
async fn test_step_out_uses_server_default() {
    let (transport, debugger) = setup(EngineConfig::default());
    info!("Running test");
    pause_in_outer_frame(&transport, &debugger).await;

    transport.reply_to_command(paused("950", "P2"));
    debugger.run_command(Command::StepOut).await.unwrap();

    let calls = transport.calls();
    assert_eq!(calls.commands.last(), Some(&(Command::StepOut, None)));
    assert!(calls.get_frame_steps.is_empty());
}

#[tokio::test]
async fn test_innermost_frame_uses_server_default() {
    let (transport, debugger) = setup(EngineConfig::default());
    info!("Running test");
    transport.reply_to_command(paused("500", "P1"));
    transport.with_frames(PauseId::new("P1"), vec![frame("P1", "f0", 0), frame("P1", "f1", 1)]);
    debugger.run_command(Command::Resume).await.unwrap();

    // Loading the stack selects the innermost frame
    let frames = debugger.frames().await.unwrap();
    assert_eq!(frames.len(), 2);
    assert_eq!(debugger.snapshot().selected_frame_id(), Some(&FrameId::new("f0")));

    transport.reply_to_command(paused("510", "P2"));
    debugger.run_command(Command::StepOver).await.unwrap();

    let calls = transport.calls();
    assert_eq!(calls.commands.last(), Some(&(Command::StepOver, None)));
    assert!(calls.get_frame_steps.is_empty());
}

#[tokio::test]
async fn test_too_many_points_falls_back_to_server_default() {
    let (transport, debugger) = setup(EngineConfig::default());
    info!("Running test");
    pause_in_outer_frame(&transport, &debugger).await;
    // Replace the scripted steps before they are fetched
    transport.fail_steps(PauseId::new("P1"), FrameId::new("f1"), TransportError::TooManyPoints);

    transport.reply_to_command(paused("700", "P2"));
    let outcome = debugger.run_command(Command::StepOver).await.unwrap();

    assert!(matches!(outcome, NavigationOutcome::Paused(_)));
    let calls = transport.calls();
    assert_eq!(calls.commands.last(), Some(&(Command::StepOver, None)));
}

#[tokio::test]
async fn test_superseded_completion_is_discarded() {
    let (transport, debugger) = setup(EngineConfig::default());
    info!("Running test");
    let release = transport.reply_to_command_gated(paused("500", "P1"));
    transport.pause_at(pause("700", "P2"));

    let first = debugger.run_command(Command::Resume);
    let second = async {
        let outcome = debugger.seek(SeekTarget::point(point("700"))).await;
        let _ = release.send(());
        outcome
    };
    let (first, second) = tokio::join!(first, second);

    assert_eq!(first.unwrap(), NavigationOutcome::Superseded);
    assert!(matches!(second.unwrap(), NavigationOutcome::Paused(_)));

    // Same observable state as a session that only sought to 700
    let (reference_transport, reference) = setup(EngineConfig::default());
    reference_transport.pause_at(pause("700", "P2"));
    reference.seek(SeekTarget::point(point("700"))).await.unwrap();

    let (state, expected) = (debugger.snapshot(), reference.snapshot());
    assert_eq!(state.status(), expected.status());
    assert_eq!(state.current_pause_id(), expected.current_pause_id());
    assert_eq!(state.current_execution_point(), expected.current_execution_point());
    assert_eq!(state.selected_frame_id(), expected.selected_frame_id());
    assert_eq!(state.command_in_flight(), expected.command_in_flight());
    assert_eq!(debugger.history(), reference.history());
}

#[tokio::test]
async fn test_concurrent_steps_share_one_steps_fetch() {
    let (transport, debugger) = setup(EngineConfig::default());
    info!("Running test");
    pause_in_outer_frame(&transport, &debugger).await;
    let release = transport.gate_steps(PauseId::new("P1"), FrameId::new("f1"));
    transport.reply_to_command(paused("600", "P2"));

    let releaser = async {
        tokio::task::yield_now().await;
        let _ = release.send(());
    };
    let (a, b, ()) = tokio::join!(
        debugger.run_command(Command::StepOver),
        debugger.run_command(Command::StepOver),
        releaser
    );

    let outcomes = [a.unwrap(), b.unwrap()];
    let superseded =
        outcomes.iter().filter(|outcome| **outcome == NavigationOutcome::Superseded).count();
    assert_eq!(superseded, 1);
    assert_eq!(transport.calls().get_frame_steps.len(), 1);
    assert_eq!(transport.calls().commands.len(), 2);
}

#[tokio::test]
async fn test_pause_creation_failure_keeps_point() {
    let (transport, debugger) = setup(EngineConfig::default());
    info!("Running test");
    transport.fail_pause_at(
        point("800"),
        TransportError::PauseCreationFailed { point: point("800"), reason: "gone".to_string() },
    );

    let outcome = debugger.seek(SeekTarget::point(point("800"))).await.unwrap();

    assert_eq!(outcome, NavigationOutcome::Unavailable(point("800")));
    let state = debugger.snapshot();
    assert_eq!(state.status(), PauseStatus::PauseErrored);
    assert_eq!(state.current_execution_point(), Some(&point("800")));
    assert_eq!(state.current_pause_id(), None);
    assert!(debugger.history().is_empty());
}

#[tokio::test]
async fn test_command_pause_creation_failure() {
    let (transport, debugger) = setup(EngineConfig::default());
    info!("Running test");
    transport.reply_to_command(Err(TransportError::PauseCreationFailed {
        point: point("4200"),
        reason: "unloaded".to_string(),
    }));

    let outcome = debugger.run_command(Command::Resume).await.unwrap();

    assert_eq!(outcome, NavigationOutcome::Unavailable(point("4200")));
    assert_eq!(debugger.snapshot().status(), PauseStatus::PauseErrored);
}

#[tokio::test]
async fn test_seek_outside_loaded_regions_is_refused() {
    let (transport, debugger) = setup(EngineConfig::default());
    info!("Running test");

    let outcome = debugger.seek(SeekTarget::point(point("20000"))).await.unwrap();

    assert_eq!(outcome, NavigationOutcome::Unavailable(point("20000")));
    assert!(transport.calls().create_pause.is_empty());
    assert_eq!(debugger.snapshot().current_execution_point(), Some(&point("20000")));
}

#[tokio::test]
async fn test_history_round_trip() {
    let (transport, debugger) = setup(EngineConfig::default());
    info!("Running test");
    pause_in_outer_frame(&transport, &debugger).await;
    transport.reply_to_command(paused("600", "P2"));
    debugger.run_command(Command::StepOver).await.unwrap();
    assert_eq!(debugger.history().len(), 2);

    let back = debugger.go_back().await.unwrap();
    match back {
        Some(NavigationOutcome::Paused(entry)) => {
            assert_eq!(entry.execution_point, point("500"));
            assert_eq!(entry.pause_id, PauseId::new("P1"));
        }
        other => panic!("unexpected outcome {other:?}"),
    }
    let state = debugger.snapshot();
    assert_eq!(state.current_pause_id(), Some(&PauseId::new("P1")));
    assert_eq!(state.current_execution_point(), Some(&point("500")));
    // Known pauses are revisited without creating new ones
    assert!(transport.calls().create_pause.is_empty());
    // Walking the history does not grow it
    assert_eq!(debugger.history().len(), 2);

    assert_eq!(debugger.go_back().await.unwrap(), None);

    let forward = debugger.go_forward().await.unwrap();
    assert!(matches!(forward, Some(NavigationOutcome::Paused(entry)) if entry.pause_id == PauseId::new("P2")));
    assert_eq!(debugger.go_forward().await.unwrap(), None);
}

#[tokio::test]
async fn test_revisited_pause_reloads_its_stack() {
    let (transport, debugger) = setup(EngineConfig::default());
    info!("Running test");
    pause_in_outer_frame(&transport, &debugger).await;
    transport.reply_to_command(paused("600", "P2"));
    debugger.run_command(Command::StepOver).await.unwrap();

    debugger.go_back().await.unwrap();
    let frames = debugger.frames().await.unwrap();

    assert_eq!(frames.len(), 2);
    let fetched: Vec<_> =
        transport.calls().get_frames.into_iter().filter(|p| p == &PauseId::new("P1")).collect();
    assert_eq!(fetched.len(), 2);
}

#[tokio::test]
async fn test_steps_require_a_pause() {
    let (_transport, debugger) = setup(EngineConfig::default());
    info!("Running test");

    let err = debugger.run_command(Command::StepOver).await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidState { status: PauseStatus::Running, .. }));

    debugger.reset();
    let err = debugger.run_command(Command::Resume).await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidState { status: PauseStatus::Idle, .. }));
}

#[tokio::test]
async fn test_transport_failure_is_reported() {
    let (transport, debugger) = setup(EngineConfig::default());
    info!("Running test");
    pause_in_outer_frame(&transport, &debugger).await;
    transport.reply_to_command(Err(TransportError::Request("boom".to_string())));

    let err = debugger.run_command(Command::StepIn).await.unwrap_err();

    assert_eq!(err, EngineError::Transport(TransportError::Request("boom".to_string())));
    let state = debugger.snapshot();
    assert_eq!(state.status(), PauseStatus::PauseErrored);
    assert_eq!(state.current_execution_point(), Some(&point("500")));
    assert_eq!(state.command_in_flight(), None);
}

#[tokio::test]
async fn test_finished_command_leaves_session_running() {
    let (transport, debugger) = setup(EngineConfig::default());
    info!("Running test");
    transport.reply_to_command(Ok(CommandResult::Finished));

    let outcome = debugger.run_command(Command::Resume).await.unwrap();

    assert_eq!(outcome, NavigationOutcome::Running);
    let state = debugger.snapshot();
    assert_eq!(state.status(), PauseStatus::Running);
    assert_eq!(state.current_pause_id(), None);
}

#[tokio::test]
async fn test_unknown_frame_is_rejected() {
    let (transport, debugger) = setup(EngineConfig::default());
    info!("Running test");
    pause_in_outer_frame(&transport, &debugger).await;

    let err = debugger.select_frame(&FrameId::new("missing")).await.unwrap_err();

    assert_eq!(err, EngineError::UnknownFrame(FrameId::new("missing")));
    assert_eq!(debugger.snapshot().selected_frame_id(), Some(&FrameId::new("f1")));
}

#[tokio::test]
async fn test_frame_steps_are_fetched_once() {
    let (transport, debugger) = setup(EngineConfig::default());
    info!("Running test");
    pause_in_outer_frame(&transport, &debugger).await;
    assert!(debugger.selected_frame_steps().is_none());

    let steps = debugger.load_selected_frame_steps().await.unwrap().unwrap();
    let points: Vec<_> = steps.iter().map(|step| step.point.to_string()).collect();
    assert_eq!(points, vec!["100", "300", "600", "900"]);

    debugger.load_selected_frame_steps().await.unwrap();
    assert_eq!(transport.calls().get_frame_steps.len(), 1);
    assert_eq!(debugger.selected_frame_steps(), Some(steps));
}

#[tokio::test]
async fn test_pause_without_frames_has_empty_stack() {
    let (transport, debugger) = setup(EngineConfig::default());
    info!("Running test");
    let mut result = pause("500", "P1");
    result.has_frames = false;
    transport.pause_at(result);

    debugger.seek(SeekTarget::point(point("500"))).await.unwrap();

    assert!(debugger.frames().await.unwrap().is_empty());
    assert!(transport.calls().get_frames.is_empty());
}

#[tokio::test]
async fn test_prefetch_loads_stack_on_pause() {
    let config = EngineConfig { prefetch_frames: true, ..Default::default() };
    let (transport, debugger) = setup(config);
    info!("Running test");
    transport.reply_to_command(paused("500", "P1"));
    transport.with_frames(PauseId::new("P1"), vec![frame("P1", "f0", 0)]);

    debugger.run_command(Command::Resume).await.unwrap();

    assert_eq!(transport.calls().get_frames, vec![PauseId::new("P1")]);
    assert_eq!(debugger.snapshot().selected_frame_id(), Some(&FrameId::new("f0")));
}

#[tokio::test]
async fn test_reset_discards_navigation_in_flight() {
    let (transport, debugger) = setup(EngineConfig::default());
    info!("Running test");
    let release = transport.reply_to_command_gated(paused("500", "P1"));

    let reset = async {
        debugger.reset();
        let _ = release.send(());
    };
    let (outcome, ()) = tokio::join!(debugger.run_command(Command::Resume), reset);

    assert_eq!(outcome.unwrap(), NavigationOutcome::Superseded);
    let state = debugger.snapshot();
    assert_eq!(state.status(), PauseStatus::Idle);
    assert_eq!(state.current_pause_id(), None);
    assert!(debugger.history().is_empty());
}

#[tokio::test]
async fn test_superseded_command_failure_is_not_reported() {
    let (transport, debugger) = setup(EngineConfig::default());
    info!("Running test");
    let release =
        transport.reply_to_command_gated(Err(TransportError::Request("late".to_string())));
    transport.pause_at(pause("700", "P2"));

    let first = debugger.run_command(Command::Resume);
    let second = async {
        let outcome = debugger.seek(SeekTarget::point(point("700"))).await;
        let _ = release.send(());
        outcome
    };
    let (first, second) = tokio::join!(first, second);

    assert_eq!(first.unwrap(), NavigationOutcome::Superseded);
    assert!(matches!(second.unwrap(), NavigationOutcome::Paused(_)));
    let state = debugger.snapshot();
    assert_eq!(state.status(), PauseStatus::Paused);
    assert_eq!(state.current_pause_id(), Some(&PauseId::new("P2")));
    assert_eq!(state.current_execution_point(), Some(&point("700")));
}

#[tokio::test]
async fn test_superseded_seek_failure_is_not_reported() {
    let (transport, debugger) = setup(EngineConfig::default());
    info!("Running test");
    transport.fail_pause_at(point("700"), TransportError::Request("late".to_string()));
    let release = transport.gate_pause_at(point("700"));
    transport.pause_at(pause("800", "P2"));

    let first = debugger.seek(SeekTarget::point(point("700")));
    let second = async {
        let outcome = debugger.seek(SeekTarget::point(point("800"))).await;
        let _ = release.send(());
        outcome
    };
    let (first, second) = tokio::join!(first, second);

    assert_eq!(first.unwrap(), NavigationOutcome::Superseded);
    assert!(matches!(second.unwrap(), NavigationOutcome::Paused(_)));
    let state = debugger.snapshot();
    assert_eq!(state.status(), PauseStatus::Paused);
    assert_eq!(state.current_execution_point(), Some(&point("800")));
}

#[tokio::test]
async fn test_older_seek_resolving_last_is_discarded() {
    let (transport, debugger) = setup(EngineConfig::default());
    info!("Running test");
    transport.pause_at(pause("700", "P1"));
    let release = transport.gate_pause_at(point("700"));
    transport.pause_at(pause("800", "P2"));

    let first = debugger.seek(SeekTarget::point(point("700")));
    let second = async {
        let outcome = debugger.seek(SeekTarget::point(point("800"))).await;
        let _ = release.send(());
        outcome
    };
    let (first, second) = tokio::join!(first, second);

    assert_eq!(first.unwrap(), NavigationOutcome::Superseded);
    assert!(matches!(second.unwrap(), NavigationOutcome::Paused(_)));
    let state = debugger.snapshot();
    assert_eq!(state.current_pause_id(), Some(&PauseId::new("P2")));
    assert_eq!(state.current_execution_point(), Some(&point("800")));

    let history = debugger.history();
    assert_eq!(history.len(), 1);
    assert_eq!(history.entries()[0].execution_point, point("800"));
}

#[tokio::test]
async fn test_call_stack_failure_is_not_memoized() {
    let (transport, debugger) = setup(EngineConfig::default());
    info!("Running test");
    transport.reply_to_command(paused("500", "P1"));
    debugger.run_command(Command::Resume).await.unwrap();
    transport.fail_frames(PauseId::new("P1"), TransportError::Request("boom".to_string()));

    let err = debugger.frames().await.unwrap_err();

    assert_eq!(err, EngineError::Transport(TransportError::Request("boom".to_string())));
    assert_eq!(debugger.snapshot().status(), PauseStatus::Paused);

    transport.with_frames(PauseId::new("P1"), vec![frame("P1", "f0", 0), frame("P1", "f1", 1)]);
    let frames = debugger.frames().await.unwrap();
    assert_eq!(frames.len(), 2);
    assert_eq!(transport.calls().get_frames.len(), 2);
}

#[tokio::test]
async fn test_step_fails_when_call_stack_cannot_load() {
    let (transport, debugger) = setup(EngineConfig::default());
    info!("Running test");
    let mut preselected = pause("500", "P1");
    preselected.frame = Some(frame("P1", "f1", 1));
    transport.pause_at(preselected);
    debugger.seek(SeekTarget::point(point("500"))).await.unwrap();
    transport.fail_frames(PauseId::new("P1"), TransportError::Request("boom".to_string()));

    let err = debugger.run_command(Command::StepOver).await.unwrap_err();

    assert_eq!(err, EngineError::Transport(TransportError::Request("boom".to_string())));
    assert!(transport.calls().commands.is_empty());
    let state = debugger.snapshot();
    assert_eq!(state.status(), PauseStatus::Paused);
    assert_eq!(state.current_pause_id(), Some(&PauseId::new("P1")));
}

#[tokio::test]
async fn test_step_superseded_while_loading_call_stack() {
    let (transport, debugger) = setup(EngineConfig::default());
    info!("Running test");
    let mut preselected = pause("500", "P1");
    preselected.frame = Some(frame("P1", "f1", 1));
    transport.pause_at(preselected);
    debugger.seek(SeekTarget::point(point("500"))).await.unwrap();
    transport.with_frames(PauseId::new("P1"), vec![frame("P1", "f0", 0), frame("P1", "f1", 1)]);
    transport.with_steps(PauseId::new("P1"), FrameId::new("f1"), positions(&["100", "600"]));
    let release = transport.gate_frames(PauseId::new("P1"));
    transport.pause_at(pause("700", "P2"));

    let step = debugger.run_command(Command::StepOver);
    let seek = async {
        let outcome = debugger.seek(SeekTarget::point(point("700"))).await;
        let _ = release.send(());
        outcome
    };
    let (step, seek) = tokio::join!(step, seek);

    assert_eq!(step.unwrap(), NavigationOutcome::Superseded);
    assert!(matches!(seek.unwrap(), NavigationOutcome::Paused(_)));
    let calls = transport.calls();
    assert!(calls.get_frame_steps.is_empty());
    assert!(calls.commands.is_empty());
    assert!(debugger.selected_frame_steps().is_none());
    assert_eq!(debugger.snapshot().current_pause_id(), Some(&PauseId::new("P2")));
}
