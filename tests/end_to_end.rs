//! Full sessions against the simulated virtualized list.

use std::ops::ControlFlow;
use std::sync::Mutex;

use roster_extract::extract::retry_with_backoff;
use roster_extract::{
    ExtractError, ExtractionConfig, ExtractionSession, Phase, Progress, RetryConfig,
    SimulatedSurface, SimulationConfig, SurfaceError, TerminationReason, normalize,
};

fn fast_config() -> ExtractionConfig {
    ExtractionConfig::default().without_delays()
}

fn fast_retry() -> RetryConfig {
    RetryConfig {
        max_attempts: 3,
        base_delay_ms: 0,
        max_delay_ms: 0,
    }
}

/// Rows lost to virtualization on the way down come back through the reverse
/// pass and the capture feed.
#[tokio::test]
async fn five_percent_loss_recovers_completely() {
    let surface = SimulatedSurface::new(SimulationConfig::numbered(300).loss(0.05, 42));
    assert!(surface.lost_count() > 0);
    let config = fast_config();

    let result = ExtractionSession::new(&surface, &config)
        .expected_total(300)
        .run()
        .await
        .unwrap();

    assert_eq!(result.len(), 300);
    assert_eq!(result.completeness, 1.0);
    // Forward reads miss exactly the lost rows; more than 6 of 300 puts the
    // forward pass under the 98% reverse threshold.
    if surface.lost_count() > 6 {
        assert!(result.reverse_pass_ran);
    }
    assert!(result.capture_events > 0);
    assert_ne!(result.termination_reason, TerminationReason::SurfaceUnavailable);
    assert_eq!(surface.installed_feeds(), 0);
}

#[tokio::test]
async fn capture_feed_alone_fills_forward_gaps() {
    let surface = SimulatedSurface::new(SimulationConfig::numbered(200).loss(0.1, 3));
    let config = ExtractionConfig {
        reverse_threshold: 0.0,
        ..fast_config()
    };

    let result = ExtractionSession::new(&surface, &config)
        .expected_total(200)
        .run()
        .await
        .unwrap();

    assert!(!result.reverse_pass_ran);
    assert_eq!(result.len(), 200);
}

#[tokio::test]
async fn subject_never_in_result() {
    let members = std::iter::once("alice".to_string())
        .chain((0..50).map(|i| format!("friend_{i}")));
    let surface = SimulatedSurface::new(SimulationConfig::with_members(members));
    let config = fast_config();
    let subject = normalize("alice");

    let result = ExtractionSession::new(&surface, &config)
        .subject(subject.clone())
        .expected_total(50)
        .run()
        .await
        .unwrap();

    let subject = subject.unwrap();
    assert!(!result.identifiers.contains(&subject));
    assert_eq!(result.len(), 50);
    assert_eq!(result.termination_reason, TerminationReason::ReachedTarget);
}

#[tokio::test]
async fn unknown_total_ends_on_a_stall_reason() {
    let surface = SimulatedSurface::new(SimulationConfig::numbered(60));
    let config = fast_config();

    let result = ExtractionSession::new(&surface, &config)
        .expected_total(0)
        .run()
        .await
        .unwrap();

    assert!(matches!(
        result.termination_reason,
        TerminationReason::Stalled
            | TerminationReason::AtBottomStalled
            | TerminationReason::ScrollStuck
    ));
    assert!(result.forward_ticks <= config.max_ticks);
    assert!(!result.reverse_pass_ran);
    assert_eq!(result.completeness, 1.0);
    assert_eq!(result.len(), 60);
}

#[tokio::test]
async fn tick_ceiling_stops_an_endless_list() {
    let surface = SimulatedSurface::new(SimulationConfig::endless());
    let config = fast_config();
    assert_eq!(config.max_ticks, 800);

    let result = ExtractionSession::new(&surface, &config)
        .expected_total(0)
        .run()
        .await
        .unwrap();

    assert_eq!(result.termination_reason, TerminationReason::Stalled);
    assert_eq!(result.forward_ticks, 800);
    assert!(result.len() > 2000);
}

#[tokio::test]
async fn stale_expected_total_still_returns_everything() {
    let surface = SimulatedSurface::new(SimulationConfig::numbered(100));
    let config = fast_config();

    let result = ExtractionSession::new(&surface, &config)
        .expected_total(120)
        .run()
        .await
        .unwrap();

    assert_eq!(result.len(), 100);
    assert!(result.reverse_pass_ran);
    assert!(result.completeness < 0.9);
    assert_ne!(result.termination_reason, TerminationReason::ReachedTarget);
}

#[tokio::test]
async fn missing_container_returns_empty_result() {
    let surface = SimulatedSurface::new(SimulationConfig::numbered(20));
    surface.set_available(false);
    let config = fast_config();

    let result = ExtractionSession::new(&surface, &config)
        .expected_total(20)
        .run()
        .await
        .unwrap();

    assert_eq!(
        result.termination_reason,
        TerminationReason::SurfaceUnavailable
    );
    assert!(result.is_empty());
}

#[tokio::test]
async fn container_lost_mid_session_keeps_partial_set() {
    let surface = SimulatedSurface::new(SimulationConfig::numbered(500));
    surface.close_after(20);
    let config = fast_config();

    let result = ExtractionSession::new(&surface, &config)
        .expected_total(500)
        .run()
        .await
        .unwrap();

    assert_eq!(
        result.termination_reason,
        TerminationReason::SurfaceUnavailable
    );
    assert!(!result.is_empty());
    assert!(result.len() < 500);
    assert_eq!(surface.installed_feeds(), 0);
}

#[tokio::test]
async fn container_lost_in_reverse_keeps_forward_reason() {
    let surface = SimulatedSurface::new(SimulationConfig::numbered(100));
    let config = fast_config();
    let sink = |progress: &Progress| {
        if progress.phase == Phase::Reverse {
            surface.set_available(false);
        }
        ControlFlow::Continue(())
    };

    let result = ExtractionSession::new(&surface, &config)
        .expected_total(120)
        .progress(&sink)
        .run()
        .await
        .unwrap();

    assert!(result.reverse_pass_ran);
    assert_eq!(result.reverse_ticks, 1);
    assert!(matches!(
        result.termination_reason,
        TerminationReason::Stalled
            | TerminationReason::AtBottomStalled
            | TerminationReason::ScrollStuck
    ));
    assert_eq!(result.len(), 100);
}

#[tokio::test]
async fn growing_footer_ends_on_bottom_stall() {
    let surface = SimulatedSurface::new(SimulationConfig::numbered(80).footer_growth(8.0));
    let config = fast_config();

    let result = ExtractionSession::new(&surface, &config)
        .expected_total(0)
        .run()
        .await
        .unwrap();

    assert_eq!(
        result.termination_reason,
        TerminationReason::AtBottomStalled
    );
    assert_eq!(result.len(), 80);
    assert!(!result.reverse_pass_ran);
}

#[tokio::test]
async fn transient_failure_releases_feed_and_propagates() {
    let surface = SimulatedSurface::new(SimulationConfig::numbered(100));
    surface.fail_scroll(5);
    let config = fast_config();

    let err = ExtractionSession::new(&surface, &config)
        .expected_total(100)
        .run()
        .await
        .unwrap_err();

    assert!(err.is_transient());
    assert_eq!(surface.installed_feeds(), 0);
}

#[tokio::test]
async fn retry_policy_restarts_the_session() {
    let surface = SimulatedSurface::new(SimulationConfig::numbered(100));
    surface.fail_scroll(5);
    let config = fast_config();
    let surface = &surface;
    let config = &config;

    let result = retry_with_backoff(&fast_retry(), move |_| async move {
        ExtractionSession::new(surface, config)
            .expected_total(100)
            .run()
            .await
    })
    .await
    .unwrap();

    assert_eq!(result.len(), 100);
    assert_eq!(surface.installed_feeds(), 0);
}

#[tokio::test]
async fn unavailable_is_not_retried() {
    let surface = SimulatedSurface::new(SimulationConfig::numbered(10));
    surface.set_available(false);
    let config = fast_config();
    let surface = &surface;
    let config = &config;

    let result = retry_with_backoff(&fast_retry(), move |_| async move {
        ExtractionSession::new(surface, config).run().await
    })
    .await
    .unwrap();
    assert_eq!(
        result.termination_reason,
        TerminationReason::SurfaceUnavailable
    );
}

#[tokio::test]
async fn exhausted_retries_are_reported() {
    let surface = SimulatedSurface::new(SimulationConfig::numbered(10));
    surface.fail_next(10);
    let config = fast_config();
    let surface = &surface;
    let config = &config;

    let err = retry_with_backoff(&fast_retry(), move |_| async move {
        ExtractionSession::new(surface, config).run().await
    })
    .await
    .unwrap_err();
    assert!(matches!(
        err,
        ExtractError::RetriesExhausted {
            attempts: 3,
            last: SurfaceError::Transient(_)
        }
    ));
}

#[tokio::test]
async fn sink_cancels_after_current_tick() {
    let surface = SimulatedSurface::new(SimulationConfig::numbered(300));
    let config = fast_config();
    let sink = |progress: &Progress| {
        if progress.current >= 30 {
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    };

    let result = ExtractionSession::new(&surface, &config)
        .expected_total(300)
        .progress(&sink)
        .run()
        .await
        .unwrap();

    assert_eq!(result.termination_reason, TerminationReason::Cancelled);
    assert!(!result.reverse_pass_ran);
    assert!(result.forward_ticks < 20);
    assert!(result.len() >= 30);
    assert_eq!(surface.installed_feeds(), 0);
}

#[tokio::test]
async fn one_report_per_tick() {
    let surface = SimulatedSurface::new(SimulationConfig::numbered(150).loss(0.1, 9));
    let config = fast_config();
    let phases = Mutex::new(Vec::new());
    let sink = |progress: &Progress| {
        phases.lock().unwrap().push(progress.phase);
        ControlFlow::Continue(())
    };

    let result = ExtractionSession::new(&surface, &config)
        .expected_total(150)
        .progress(&sink)
        .run()
        .await
        .unwrap();

    let phases = phases.into_inner().unwrap();
    let count = |phase: Phase| phases.iter().filter(|p| **p == phase).count() as u32;
    assert_eq!(count(Phase::Init), 1);
    assert_eq!(count(Phase::Forward), result.forward_ticks);
    assert_eq!(count(Phase::Reverse), result.reverse_ticks);
    assert_eq!(count(Phase::Merge), 1);
}

#[tokio::test]
async fn post_links_are_filtered() {
    let surface = SimulatedSurface::new(SimulationConfig::numbered(40).noise_links(true));
    let config = fast_config();

    let result = ExtractionSession::new(&surface, &config)
        .expected_total(40)
        .run()
        .await
        .unwrap();

    assert_eq!(result.len(), 40);
    assert!(
        result
            .identifiers
            .iter()
            .all(|id| id.as_str().starts_with("member_"))
    );
}

#[tokio::test]
async fn result_serializes_with_snake_case_reason() {
    let surface = SimulatedSurface::new(SimulationConfig::numbered(5));
    let config = fast_config();
    let result = ExtractionSession::new(&surface, &config)
        .expected_total(5)
        .run()
        .await
        .unwrap();

    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["termination_reason"], "reached_target");
    assert_eq!(json["identifiers"].as_array().unwrap().len(), 5);
}
