//! Frame loop integration tests, run on a paused clock

mod common;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use common::{addr, FixedPattern, MockTransport};
use ledflow_core::{
    CancelHandle, ControlError, FixtureRegistry, FrameEvent, FrameObserver, FrameScheduler, Rgb,
    RunOptions, RunOutcome, SchedulerState,
};
use tokio::sync::watch;
use tokio::time::Instant;

/// Records what the loop reports after every tick
#[derive(Default)]
struct Recorder {
    indices: Vec<u64>,
    sent: Vec<usize>,
    failed: Vec<Vec<SocketAddr>>,
    cancel_after: Option<(u64, CancelHandle)>,
    state: Option<watch::Receiver<SchedulerState>>,
    states: Vec<SchedulerState>,
    times: Vec<Instant>,
    fail: bool,
}

impl FrameObserver for Recorder {
    fn on_frame(&mut self, event: &FrameEvent<'_>) -> anyhow::Result<()> {
        self.indices.push(event.index);
        self.times.push(Instant::now());
        self.sent.push(event.report.packets_sent);
        self.failed
            .push(event.report.failures.iter().map(|f| f.address).collect());
        if let Some(rx) = &self.state {
            self.states.push(*rx.borrow());
        }
        if let Some((after, handle)) = &self.cancel_after {
            if event.index + 1 >= *after {
                handle.cancel();
            }
        }
        if self.fail {
            anyhow::bail!("observer failure");
        }
        Ok(())
    }
}

fn registry_with(fixtures: &[(&str, usize)]) -> FixtureRegistry {
    let mut registry = FixtureRegistry::new();
    for (address, pixels) in fixtures {
        registry.add_manual(addr(address), *pixels, None).unwrap();
    }
    registry
}

#[tokio::test(start_paused = true)]
async fn single_fixture_receives_exact_payload() {
    let transport = Arc::new(MockTransport::new());
    let mut scheduler = FrameScheduler::new(transport.clone());
    let registry = registry_with(&[("10.0.0.5:6454", 3)]);
    let mut pattern = FixedPattern::new(vec![Rgb::RED, Rgb::GREEN, Rgb::BLUE]);

    let summary = scheduler
        .run(
            &registry,
            &mut pattern,
            RunOptions::new(30.0).with_duration(Duration::from_millis(1)),
            None,
        )
        .await
        .unwrap();

    assert_eq!(summary.outcome, RunOutcome::Completed);
    assert_eq!(summary.frames, 1);
    assert_eq!(pattern.step, 1);

    let packets = transport.dmx_sent_to(addr("10.0.0.5:6454"));
    assert_eq!(packets.len(), 1);
    assert_eq!(packets[0].universe, 5);
    assert_eq!(packets[0].sequence, 1);
    // 9 channels padded to an even length
    assert_eq!(
        packets[0].data,
        vec![0xFF, 0x00, 0x00, 0x00, 0xFF, 0x00, 0x00, 0x00, 0xFF, 0x00]
    );
}

#[tokio::test(start_paused = true)]
async fn holds_frame_rate_under_send_jitter() {
    // Up to a full 30 fps tick spent inside a single send
    let delays = [0, 33, 12, 25, 5, 31, 18, 2, 28]
        .into_iter()
        .map(Duration::from_millis)
        .collect();
    let transport = Arc::new(MockTransport::with_send_delays(delays));
    let mut scheduler = FrameScheduler::new(transport.clone());
    let registry = registry_with(&[("10.0.0.7:6454", 30)]);
    let mut pattern = FixedPattern::new(vec![Rgb::WHITE; 30]);
    let mut recorder = Recorder::default();

    let start = Instant::now();
    let summary = scheduler
        .run(
            &registry,
            &mut pattern,
            RunOptions::new(30.0).with_duration(Duration::from_secs(1)),
            Some(&mut recorder),
        )
        .await
        .unwrap();

    assert_eq!(summary.outcome, RunOutcome::Completed);
    assert!(
        (29..=31).contains(&summary.frames),
        "sent {} frames",
        summary.frames
    );
    assert_eq!(recorder.indices.len() as u64, summary.frames);
    assert_eq!(recorder.indices, (0..summary.frames).collect::<Vec<_>>());
    assert_eq!(pattern.step, summary.frames);
    assert_eq!(transport.sent().len() as u64, summary.frames);

    // Slow sends eat into the next sleep, they never push later ticks back
    let interval = Duration::from_secs(1) / 30;
    for (n, at) in recorder.times.iter().enumerate() {
        let latest = interval * n as u32 + Duration::from_millis(35);
        assert!(
            at.duration_since(start) <= latest,
            "frame {} finished at {:?}",
            n,
            at.duration_since(start)
        );
    }
}

#[tokio::test(start_paused = true)]
async fn failed_fixture_does_not_stop_the_others() {
    let transport = Arc::new(MockTransport::new());
    transport.fail_sends_to(addr("10.0.0.2:6454"));
    let mut scheduler = FrameScheduler::new(transport.clone());
    let registry = registry_with(&[("10.0.0.1:6454", 4), ("10.0.0.2:6454", 4)]);
    let mut pattern = FixedPattern::new(vec![Rgb::BLUE; 8]);
    let mut recorder = Recorder {
        cancel_after: Some((3, scheduler.cancel_handle())),
        ..Recorder::default()
    };

    let summary = scheduler
        .run(&registry, &mut pattern, RunOptions::new(30.0), Some(&mut recorder))
        .await
        .unwrap();

    assert_eq!(summary.outcome, RunOutcome::Cancelled);
    assert_eq!(summary.frames, 3);
    assert_eq!(summary.failed_sends, 3);
    assert_eq!(recorder.sent, vec![1, 1, 1]);
    for failed in &recorder.failed {
        assert_eq!(failed, &vec![addr("10.0.0.2:6454")]);
    }
    assert_eq!(transport.dmx_sent_to(addr("10.0.0.1:6454")).len(), 3);
    assert_eq!(scheduler.state(), SchedulerState::Cancelled);
}

#[tokio::test(start_paused = true)]
async fn transmission_failure_carries_the_socket_error() {
    let transport = Arc::new(MockTransport::new());
    transport.fail_sends_to(addr("10.0.0.3:6454"));
    let mut scheduler = FrameScheduler::new(transport);
    let registry = registry_with(&[("10.0.0.3:6454", 1)]);

    let report = scheduler.stop_all_fixtures(&registry).await.unwrap();
    assert!(!report.is_clean());
    assert_eq!(report.failures[0].universe, 3);
    assert!(matches!(
        report.failures[0].error,
        ControlError::Transmission { universe: 3, .. }
    ));
}

#[tokio::test(start_paused = true)]
async fn cancel_from_another_task() {
    let transport = Arc::new(MockTransport::new());
    let mut scheduler = FrameScheduler::new(transport);
    let registry = registry_with(&[("10.0.0.1:6454", 2)]);
    let mut pattern = FixedPattern::new(vec![Rgb::RED; 2]);

    let handle = scheduler.cancel_handle();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        handle.cancel();
    });

    let summary = scheduler
        .run(&registry, &mut pattern, RunOptions::new(30.0), None)
        .await
        .unwrap();

    assert_eq!(summary.outcome, RunOutcome::Cancelled);
    assert!((3..=4).contains(&summary.frames), "sent {} frames", summary.frames);
    assert!(scheduler.cancel_handle().is_cancelled());
}

#[tokio::test(start_paused = true)]
async fn earlier_cancel_does_not_abort_next_run() {
    let transport = Arc::new(MockTransport::new());
    let mut scheduler = FrameScheduler::new(transport);
    let registry = registry_with(&[("10.0.0.1:6454", 2)]);
    let mut pattern = FixedPattern::new(vec![Rgb::RED; 2]);

    scheduler.cancel_handle().cancel();
    let summary = scheduler
        .run(
            &registry,
            &mut pattern,
            RunOptions::new(10.0).with_duration(Duration::from_millis(250)),
            None,
        )
        .await
        .unwrap();

    assert_eq!(summary.outcome, RunOutcome::Completed);
    assert_eq!(summary.frames, 3);
}

#[tokio::test(start_paused = true)]
async fn wrong_frame_length_fails_the_run() {
    let transport = Arc::new(MockTransport::new());
    let mut scheduler = FrameScheduler::new(transport.clone());
    let registry = registry_with(&[("10.0.0.1:6454", 3)]);
    let mut pattern = FixedPattern::new(vec![Rgb::RED; 2]);

    let err = scheduler
        .run(&registry, &mut pattern, RunOptions::new(30.0), None)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ControlError::FrameLength {
            expected: 3,
            actual: 2
        }
    ));
    assert_eq!(scheduler.state(), SchedulerState::Failed);
    assert!(transport.sent().is_empty());
}

#[tokio::test(start_paused = true)]
async fn empty_registry_and_bad_rate_are_rejected() {
    let mut scheduler = FrameScheduler::new(Arc::new(MockTransport::new()));
    let mut pattern = FixedPattern::new(Vec::new());

    let err = scheduler
        .run(&FixtureRegistry::new(), &mut pattern, RunOptions::new(30.0), None)
        .await
        .unwrap_err();
    assert!(matches!(err, ControlError::NoFixtures));

    let registry = registry_with(&[("10.0.0.1:6454", 1)]);
    let err = scheduler
        .run(&registry, &mut pattern, RunOptions::new(0.0), None)
        .await
        .unwrap_err();
    assert!(matches!(err, ControlError::InvalidParameter(_)));
    assert_eq!(scheduler.state(), SchedulerState::Idle);
}

#[tokio::test(start_paused = true)]
async fn rates_without_a_usable_interval_are_rejected() {
    let transport = Arc::new(MockTransport::new());
    let mut scheduler = FrameScheduler::new(transport.clone());
    let registry = registry_with(&[("10.0.0.1:6454", 1)]);
    let mut pattern = FixedPattern::new(vec![Rgb::RED]);

    // 1e-20 fps is a period beyond Duration::MAX, 1e300 fps rounds to zero
    for fps in [1e-20, 1e300, f64::MIN_POSITIVE] {
        let err = scheduler
            .run(&registry, &mut pattern, RunOptions::new(fps), None)
            .await
            .unwrap_err();
        assert!(
            matches!(err, ControlError::InvalidParameter(_)),
            "fps {} gave {:?}",
            fps,
            err
        );
    }
    assert_eq!(scheduler.state(), SchedulerState::Idle);
    assert!(transport.sent().is_empty());
    assert_eq!(pattern.step, 0);
}

#[tokio::test(start_paused = true)]
async fn observer_errors_are_not_fatal() {
    let mut scheduler = FrameScheduler::new(Arc::new(MockTransport::new()));
    let registry = registry_with(&[("10.0.0.1:6454", 1)]);
    let mut pattern = FixedPattern::new(vec![Rgb::GREEN]);
    let mut recorder = Recorder {
        fail: true,
        state: Some(scheduler.subscribe()),
        ..Recorder::default()
    };

    let summary = scheduler
        .run(
            &registry,
            &mut pattern,
            RunOptions::new(20.0).with_duration(Duration::from_millis(120)),
            Some(&mut recorder),
        )
        .await
        .unwrap();

    assert_eq!(summary.frames, 3);
    assert_eq!(recorder.indices, vec![0, 1, 2]);
    assert!(recorder
        .states
        .iter()
        .all(|s| *s == SchedulerState::Running));
    assert_eq!(scheduler.state(), SchedulerState::Completed);
}

#[tokio::test(start_paused = true)]
async fn long_fixture_is_sent_as_several_universes() {
    let transport = Arc::new(MockTransport::new());
    let mut scheduler = FrameScheduler::new(transport.clone());
    let registry = registry_with(&[("10.0.0.9:6454", 200)]);

    scheduler.stop_all_fixtures(&registry).await.unwrap();

    let packets = transport.dmx_sent_to(addr("10.0.0.9:6454"));
    let layout: Vec<(u16, usize)> = packets.iter().map(|p| (p.universe, p.data.len())).collect();
    assert_eq!(layout, vec![(9, 510), (10, 90)]);
    assert_eq!(
        packets.iter().map(|p| p.sequence).collect::<Vec<_>>(),
        vec![1, 2]
    );
}

#[tokio::test(start_paused = true)]
async fn stop_all_sends_black_to_every_fixture() {
    let transport = Arc::new(MockTransport::new());
    let mut scheduler = FrameScheduler::new(transport.clone());
    let registry = registry_with(&[("10.0.0.1:6454", 2), ("10.0.0.2:6454", 3)]);

    let report = scheduler.stop_all_fixtures(&registry).await.unwrap();
    assert!(report.is_clean());
    assert_eq!(report.packets_sent, 2);

    let a = transport.dmx_sent_to(addr("10.0.0.1:6454"));
    let b = transport.dmx_sent_to(addr("10.0.0.2:6454"));
    assert_eq!(a.len(), 1);
    assert_eq!(b.len(), 1);
    assert_eq!(a[0].data, vec![0; 6]);
    // 9 channels plus one pad byte
    assert_eq!(b[0].data, vec![0; 10]);
    assert_eq!(transport.sent().len(), 2);
}
