// tests/trend_state_machine.rs
//
// Drives the full NORMAL -> CANDIDATE -> TRENDING -> COOLING -> NORMAL
// cycle with a manual clock.

use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use stock_mention_engine::aggregate::AggregationEngine;
use stock_mention_engine::clock::{Clock, ManualClock};
use stock_mention_engine::community::classify;
use stock_mention_engine::config::EngineConfig;
use stock_mention_engine::mention::{Mention, RawMention, Source};
use stock_mention_engine::trend::{TrendDetector, TrendState};

fn mention(now: chrono::DateTime<Utc>, author: &str) -> Mention {
    let raw = RawMention {
        symbol: "GME".into(),
        source: Source::Reddit,
        community: "wallstreetbets".into(),
        author: author.into(),
        text: "gamma squeeze".into(),
        timestamp: now,
        engagement: 1,
        raw_sentiment: None,
    };
    Mention::new(&raw, "gamma squeeze".into(), 0.4, 0.7, classify("wallstreetbets"), 1.0)
}

fn setup() -> (Arc<ManualClock>, AggregationEngine, TrendDetector) {
    let t0 = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
    let clock = ManualClock::new(t0);
    let agg = AggregationEngine::new(clock.clone());
    let det = TrendDetector::new(clock.clone(), &EngineConfig::default());
    (clock, agg, det)
}

fn feed(agg: &AggregationEngine, clock: &ManualClock, n: usize, tag: &str) {
    for i in 0..n {
        agg.record(&mention(clock.now(), &format!("{tag}{i}")));
    }
}

#[test]
fn ratio_below_threshold_never_leaves_normal() {
    let (clock, agg, det) = setup();
    det.seed_baseline("GME", 100.0);
    feed(&agg, &clock, 150, "a"); // ratio 1.5 < 2.0
    assert!(det.evaluate("GME", &agg).is_none());
    assert_eq!(det.state("GME"), TrendState::Normal);
}

#[test]
fn full_lifecycle_with_persistence_and_cooldown() {
    let (clock, agg, det) = setup();
    det.seed_baseline("GME", 100.0);

    // Spike: ratio 3.0.
    feed(&agg, &clock, 300, "a");
    assert!(det.evaluate("GME", &agg).is_none());
    assert_eq!(det.state("GME"), TrendState::Candidate);

    // Persistence not yet met.
    clock.advance(Duration::minutes(29));
    assert!(det.evaluate("GME", &agg).is_none());
    assert_eq!(det.state("GME"), TrendState::Candidate);

    // 30 minutes elevated: trending, event emitted once.
    clock.advance(Duration::minutes(1));
    let ev = det.evaluate("GME", &agg).expect("event on entering trending");
    assert!((ev.trend_score - 200.0).abs() < 1e-9);
    assert!((ev.spike_ratio - 3.0).abs() < 1e-9);
    assert_eq!(ev.top_communities, vec!["wallstreetbets".to_string()]);
    assert!(det.evaluate("GME", &agg).is_none(), "no duplicate event");

    // Mentions age out: ratio collapses, cooling starts.
    clock.advance(Duration::hours(25));
    feed(&agg, &clock, 30, "b"); // ratio 0.3
    det.evaluate("GME", &agg);
    assert_eq!(det.state("GME"), TrendState::Cooling);
    assert!(det.is_trending("GME"), "cooling still reports trending");

    // Below threshold through the whole cooldown: terminal.
    clock.advance(Duration::minutes(30));
    det.evaluate("GME", &agg);
    assert_eq!(det.state("GME"), TrendState::Normal);

    let events = det.events();
    assert_eq!(events.len(), 1);
    assert!(events[0].ended_at.is_some());
    assert!(events[0].peak_count >= 300);
}

#[test]
fn single_burst_against_floor_baseline_cannot_trend() {
    let (clock, agg, det) = setup();
    // No history: floor baseline 1.0. Three mentions give ratio 3.0 but the
    // absolute gate (10) blocks evaluation.
    feed(&agg, &clock, 3, "a");
    assert!(det.evaluate("GME", &agg).is_none());
    assert_eq!(det.state("GME"), TrendState::Normal);
}

#[test]
fn baseline_failures_keep_previous_value() {
    let (clock, agg, det) = setup();
    det.seed_baseline("GME", 33.0);
    det.recompute_baseline("GME", &agg); // no samples at all
    assert!((det.baseline("GME") - 33.0).abs() < 1e-9);

    feed(&agg, &clock, 140, "a");
    det.recompute_baseline("GME", &agg);
    assert!((det.baseline("GME") - 20.0).abs() < 1e-9, "140 over 7d = 20/24h");
}
