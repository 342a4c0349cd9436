mod common;

use std::time::Duration;

use chrono::Utc;

use common::{TestFactory, compute_config, compute_recommendation};
use savings_engine::portfolio::{MixEntry, PortfolioMix};
use savings_engine::queue::QueueAdapter as _;
use savings_engine::scheduler::scheduler::Scheduler;
use savings_engine::scheduler::types::DecisionAction;
use savings_engine::sp::types::{PaymentOption, PurchaseIntent, SpCategory, Term};
use savings_engine::strategy::Strategy;

async fn queued_intents(factory: &TestFactory) -> Vec<PurchaseIntent> {
    factory
        .queue
        .receive_messages(32, Duration::ZERO)
        .await
        .unwrap()
        .iter()
        .map(|m| serde_json::from_str(&m.body).unwrap())
        .collect()
}

#[tokio::test]
async fn fixed_strategy_first_run_queues_configured_fraction() {
    let factory = TestFactory::new();
    factory.cloud.set_coverage(SpCategory::Compute, 0.0, 100.0);
    factory.cloud.set_recommendation(compute_recommendation(100.0));

    let scheduler = Scheduler::new(compute_config(Strategy::Fixed {
        max_purchase_percent: 5.0,
    }));
    let report = scheduler.run(&factory, Utc::now()).await.unwrap();

    assert_eq!(report.enqueued, 1);
    assert!((report.total_hourly() - 5.0).abs() < 1e-9);

    let intents = queued_intents(&factory).await;
    assert_eq!(intents.len(), 1);
    assert!((intents[0].hourly_commitment - 5.0).abs() < 1e-9);
    assert!((intents[0].projected_gain_pct - 5.0).abs() < 1e-9);
    assert_eq!(intents[0].source_recommendation_id, "rec-compute");

    assert_eq!(
        factory.notifier.subjects(),
        vec!["Savings Plans purchase schedule".to_string()]
    );
}

#[tokio::test]
async fn dry_run_never_touches_the_queue() {
    let factory = TestFactory::new();
    factory.cloud.set_coverage(SpCategory::Compute, 0.0, 100.0);
    factory.cloud.set_recommendation(compute_recommendation(100.0));

    let mut config = compute_config(Strategy::Fixed {
        max_purchase_percent: 5.0,
    });
    config.dry_run = true;

    let report = Scheduler::new(config).run(&factory, Utc::now()).await.unwrap();

    assert_eq!(report.intents.len(), 1, "decisions are identical to a live run");
    assert_eq!(report.enqueued, 0);
    assert!(factory.queue.is_empty());

    let subjects = factory.notifier.subjects();
    assert_eq!(subjects.len(), 1);
    assert!(subjects[0].contains("dry run"));
}

#[tokio::test]
async fn conservative_gap_below_threshold_sends_no_action() {
    let factory = TestFactory::new();
    factory.cloud.set_coverage(SpCategory::Compute, 88.0, 100.0);
    factory.cloud.set_recommendation(compute_recommendation(20.0));

    let mut config = compute_config(Strategy::Conservative {
        min_gap_threshold: 5.0,
        max_purchase_percent: 50.0,
    });
    config.coverage_target_percent = 90.0;
    config.max_coverage_cap = 95.0;
    config.send_no_action = true;

    let report = Scheduler::new(config).run(&factory, Utc::now()).await.unwrap();

    assert!(report.intents.is_empty());
    assert!(factory.queue.is_empty());
    assert_eq!(
        factory.notifier.subjects(),
        vec!["Savings Plans: no action".to_string()]
    );
}

#[tokio::test]
async fn no_action_stays_silent_unless_enabled() {
    let factory = TestFactory::new();
    factory.cloud.set_coverage(SpCategory::Compute, 88.0, 100.0);

    // No recommendation at all, send_no_action defaults to false.
    let report = Scheduler::new(compute_config(Strategy::Fixed {
        max_purchase_percent: 5.0,
    }))
    .run(&factory, Utc::now())
    .await
    .unwrap();

    assert!(report.intents.is_empty());
    assert_eq!(factory.notifier.count(), 0);
    assert!(matches!(
        report.decisions[0].action,
        DecisionAction::NoRecommendation
    ));
}

#[tokio::test]
async fn dichotomy_ramp_converges_toward_target() {
    // Four monthly runs starting from zero coverage; the vendor keeps
    // recommending the full uncovered remainder (denominator 100/h, so
    // 1 unit of hourly commitment is one percentage point).
    let mut config = compute_config(Strategy::Dichotomy {
        max_purchase_percent: 50.0,
        min_purchase_percent: 1.0,
    });
    config.coverage_target_percent = 90.0;
    config.max_coverage_cap = 95.0;
    let scheduler = Scheduler::new(config);

    let mut current = 0.0;
    let mut purchased = Vec::new();

    for _ in 0..4 {
        let factory = TestFactory::new();
        factory.cloud.set_coverage(SpCategory::Compute, current, 100.0);
        factory
            .cloud
            .set_recommendation(compute_recommendation(100.0 - current));

        let report = scheduler.run(&factory, Utc::now()).await.unwrap();
        let bought = report.total_hourly();
        purchased.push(bought);
        current += bought; // denominator 100 -> 1/h == 1pp
    }

    let expected = [50.0, 25.0, 12.5, 12.5 * 0.125];
    for (got, want) in purchased.iter().zip(expected) {
        assert!(
            (got - want).abs() < 1e-9,
            "expected ramp {expected:?}, got {purchased:?}"
        );
    }
    assert!(current <= 90.0 + 1e-9);
}

#[tokio::test]
async fn projection_above_cap_is_clamped_proportionally() {
    let factory = TestFactory::new();
    factory.cloud.set_coverage(SpCategory::Compute, 85.0, 100.0);
    factory.cloud.set_recommendation(compute_recommendation(100.0));

    // Fixed 10% would buy 10/h (= 10pp), but only 5pp of headroom
    // remains below the 90% cap.
    let mut config = compute_config(Strategy::Fixed {
        max_purchase_percent: 10.0,
    });
    config.coverage_target_percent = 88.0;
    let report = Scheduler::new(config).run(&factory, Utc::now()).await.unwrap();

    assert!((report.total_hourly() - 5.0).abs() < 1e-9);
    match &report.decisions[0].action {
        DecisionAction::Queued { gain_pct, .. } => assert!((gain_pct - 5.0).abs() < 1e-9),
        other => panic!("expected a queued decision, got {other:?}"),
    }
}

#[tokio::test]
async fn idempotency_tokens_are_stable_across_runs_in_a_month() {
    let now = Utc::now();
    let scheduler = Scheduler::new(compute_config(Strategy::Fixed {
        max_purchase_percent: 5.0,
    }));

    let mut tokens = Vec::new();
    for _ in 0..2 {
        let factory = TestFactory::new();
        factory.cloud.set_coverage(SpCategory::Compute, 0.0, 100.0);
        factory.cloud.set_recommendation(compute_recommendation(100.0));

        let report = scheduler.run(&factory, now).await.unwrap();
        tokens.push(report.intents[0].idempotency_token.clone());
    }

    assert_eq!(tokens[0], tokens[1]);
}

#[tokio::test]
async fn portfolio_mix_splits_into_weighted_intents() {
    let factory = TestFactory::new();
    factory.cloud.set_coverage(SpCategory::Compute, 0.0, 100.0);
    factory.cloud.set_recommendation(compute_recommendation(100.0));

    let mut config = compute_config(Strategy::Fixed {
        max_purchase_percent: 10.0,
    });
    config.sp_plans.get_mut(&SpCategory::Compute).unwrap().mix = PortfolioMix::new(vec![
        MixEntry {
            term: Term::OneYear,
            payment_option: PaymentOption::NoUpfront,
            weight: 0.6,
        },
        MixEntry {
            term: Term::ThreeYear,
            payment_option: PaymentOption::PartialUpfront,
            weight: 0.4,
        },
    ]);
    config.validate().unwrap();

    let report = Scheduler::new(config).run(&factory, Utc::now()).await.unwrap();

    assert_eq!(report.intents.len(), 2);
    assert!((report.total_hourly() - 10.0).abs() < 1e-9);
    assert_eq!(report.intents[0].term, Term::OneYear);
    assert!((report.intents[0].hourly_commitment - 6.0).abs() < 1e-9);
    assert_eq!(report.intents[1].term, Term::ThreeYear);
    assert_eq!(report.intents[1].upfront_fraction, 0.5);
    assert!(report.intents.iter().all(|i| i.validate().is_ok()));
}

#[tokio::test]
async fn coverage_outage_degrades_to_no_purchases() {
    let factory = TestFactory::new();
    factory.cloud.set_recommendation(compute_recommendation(100.0));
    factory.cloud.fail_coverage.store(true, std::sync::atomic::Ordering::SeqCst);

    let report = Scheduler::new(compute_config(Strategy::Fixed {
        max_purchase_percent: 5.0,
    }))
    .run(&factory, Utc::now())
    .await
    .unwrap();

    assert!(report.intents.is_empty());
    assert!(factory.queue.is_empty());
    assert!(matches!(
        report.decisions[0].action,
        DecisionAction::NoDenominator
    ));
}

#[tokio::test]
async fn delegated_role_is_assumed_when_configured() {
    let factory = TestFactory::new();
    factory.cloud.set_coverage(SpCategory::Compute, 0.0, 100.0);
    factory.cloud.set_recommendation(compute_recommendation(100.0));

    let mut config = compute_config(Strategy::Fixed {
        max_purchase_percent: 5.0,
    });
    config.assume_role_arn = Some("arn:aws:iam::123456789012:role/sp-buyer".into());

    Scheduler::new(config).run(&factory, Utc::now()).await.unwrap();

    assert_eq!(
        factory.cloud.assumed_roles(),
        vec!["arn:aws:iam::123456789012:role/sp-buyer".to_string()]
    );
}

#[tokio::test]
async fn role_denial_is_fatal_and_notified() {
    let factory = TestFactory::new();
    factory.cloud.fail_assume.store(true, std::sync::atomic::Ordering::SeqCst);

    let mut config = compute_config(Strategy::Fixed {
        max_purchase_percent: 5.0,
    });
    config.assume_role_arn = Some("arn:aws:iam::123456789012:role/sp-buyer".into());

    let err = Scheduler::new(config)
        .run(&factory, Utc::now())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        savings_engine::error::AppError::AssumeRole { .. }
    ));
    let subjects = factory.notifier.subjects();
    assert_eq!(subjects.len(), 1);
    assert!(subjects[0].contains("failed"));
}
