// tests/community_breakdown.rs
use chrono::Utc;
use stock_mention_engine::community::{self, InvestmentStyle};
use stock_mention_engine::mention::{Mention, RawMention, Source};

fn mention(community_id: &str, author: &str) -> Mention {
    let raw = RawMention {
        symbol: "AMD".into(),
        source: Source::Reddit,
        community: community_id.into(),
        author: author.into(),
        text: "chips".into(),
        timestamp: Utc::now(),
        engagement: 0,
        raw_sentiment: None,
    };
    Mention::new(
        &raw,
        "chips".into(),
        0.0,
        0.5,
        community::classify(community_id),
        1.0,
    )
}

#[test]
fn percentages_sum_to_100_for_any_nonempty_set() {
    let sets: Vec<Vec<&str>> = vec![
        vec!["wallstreetbets"],
        vec!["wallstreetbets", "dividends", "bitcoin"],
        vec!["a", "b", "c", "d", "e", "f", "g"], // all unclassified
        vec!["stocks"; 33],
    ];
    for (si, set) in sets.iter().enumerate() {
        let mentions: Vec<Mention> = set
            .iter()
            .enumerate()
            .map(|(i, c)| mention(c, &format!("u{si}-{i}")))
            .collect();
        let b = community::breakdown(&mentions);
        let total: f64 = b.values().map(|s| s.percentage).sum();
        assert!((total - 100.0).abs() < 0.1, "set {si}: sum {total}");
    }
}

#[test]
fn categories_are_the_closed_enum() {
    assert_eq!(community::classify("r/daytrading"), InvestmentStyle::DayTrading);
    assert_eq!(community::classify("SecurityAnalysis"), InvestmentStyle::ValueInvesting);
    assert_eq!(community::classify("growthstocks"), InvestmentStyle::GrowthInvesting);
    assert_eq!(community::classify("ethereum"), InvestmentStyle::Crypto);
    assert_eq!(community::classify("cooking"), InvestmentStyle::Unclassified);
}

#[test]
fn counts_match_input() {
    let mentions: Vec<Mention> = ["wallstreetbets", "wallstreetbets", "options", "bogleheads"]
        .iter()
        .enumerate()
        .map(|(i, c)| mention(c, &format!("x{i}")))
        .collect();
    let b = community::breakdown(&mentions);
    assert_eq!(b[&InvestmentStyle::DayTrading].count, 3);
    assert_eq!(b[&InvestmentStyle::ValueInvesting].count, 1);
    assert!((b[&InvestmentStyle::DayTrading].percentage - 75.0).abs() < 1e-9);
}
