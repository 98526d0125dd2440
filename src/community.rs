//! # Community Classifier
//!
//! Maps a community identifier (subreddit, handle, channel name) to one
//! investment-style category from a closed enum, and computes per-category
//! breakdowns. Pure lookup, no side effects.
//!
//! Lookup order: exact match on the normalized identifier → substring match
//! → `Unclassified`.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::mention::Mention;

/// Closed set of investment-style categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvestmentStyle {
    DayTrading,
    ValueInvesting,
    GrowthInvesting,
    Crypto,
    Unclassified,
}

impl InvestmentStyle {
    pub const ALL: [InvestmentStyle; 5] = [
        InvestmentStyle::DayTrading,
        InvestmentStyle::ValueInvesting,
        InvestmentStyle::GrowthInvesting,
        InvestmentStyle::Crypto,
        InvestmentStyle::Unclassified,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            InvestmentStyle::DayTrading => "day_trading",
            InvestmentStyle::ValueInvesting => "value_investing",
            InvestmentStyle::GrowthInvesting => "growth_investing",
            InvestmentStyle::Crypto => "crypto",
            InvestmentStyle::Unclassified => "unclassified",
        }
    }
}

#[rustfmt::skip]
static ENTRIES: &[(&str, InvestmentStyle)] = &[
    // day trading / momentum communities
    ("wallstreetbets", InvestmentStyle::DayTrading),
    ("daytrading", InvestmentStyle::DayTrading),
    ("shortsqueeze", InvestmentStyle::DayTrading),
    ("pennystocks", InvestmentStyle::DayTrading),
    ("options", InvestmentStyle::DayTrading),
    ("thetagang", InvestmentStyle::DayTrading),
    // value
    ("valueinvesting", InvestmentStyle::ValueInvesting),
    ("securityanalysis", InvestmentStyle::ValueInvesting),
    ("dividends", InvestmentStyle::ValueInvesting),
    ("bogleheads", InvestmentStyle::ValueInvesting),
    // growth
    ("growthstocks", InvestmentStyle::GrowthInvesting),
    ("stocks", InvestmentStyle::GrowthInvesting),
    ("investing", InvestmentStyle::GrowthInvesting),
    ("stockmarket", InvestmentStyle::GrowthInvesting),
    // crypto
    ("cryptocurrency", InvestmentStyle::Crypto),
    ("bitcoin", InvestmentStyle::Crypto),
    ("ethereum", InvestmentStyle::Crypto),
    ("satoshistreetbets", InvestmentStyle::Crypto),
    ("dogecoin", InvestmentStyle::Crypto),
];

static TABLE: Lazy<HashMap<&'static str, InvestmentStyle>> =
    Lazy::new(|| ENTRIES.iter().copied().collect());

/// Per-category share of a mention set.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StyleShare {
    pub count: u64,
    pub percentage: f64,
}

/// Classify one community identifier.
pub fn classify(community: &str) -> InvestmentStyle {
    let norm = normalize(community);
    if let Some(&style) = TABLE.get(norm.as_str()) {
        return style;
    }
    // Substring fallback ("r/wallstreetbets_new" still classifies). Longest
    // matching key wins so "pennystocksdaily" is day trading, not growth.
    ENTRIES
        .iter()
        .filter(|(k, _)| norm.contains(k))
        .max_by_key(|(k, _)| k.len())
        .map(|&(_, style)| style)
        .unwrap_or(InvestmentStyle::Unclassified)
}

/// Per-style counts and percentages for a mention set.
///
/// Percentages sum to 100% (± float rounding) for any non-empty input.
pub fn breakdown(mentions: &[Mention]) -> HashMap<InvestmentStyle, StyleShare> {
    let mut counts: HashMap<InvestmentStyle, u64> = HashMap::new();
    for m in mentions {
        *counts.entry(m.style).or_insert(0) += 1;
    }
    shares_from_counts(&counts)
}

/// Same computation from pre-aggregated counts (used by the aggregation
/// engine so it does not need to hold full mentions).
pub fn shares_from_counts(
    counts: &HashMap<InvestmentStyle, u64>,
) -> HashMap<InvestmentStyle, StyleShare> {
    let total: u64 = counts.values().sum();
    let mut out = HashMap::new();
    if total == 0 {
        return out;
    }
    for (&style, &count) in counts {
        out.insert(
            style,
            StyleShare {
                count,
                percentage: count as f64 * 100.0 / total as f64,
            },
        );
    }
    out
}

/// Normalize identifier: lowercase, strip leading "r/"/"@"/"#", drop
/// separators.
fn normalize(s: &str) -> String {
    let mut t = s.trim().to_ascii_lowercase();
    for prefix in ["r/", "/r/", "@", "#"] {
        if let Some(rest) = t.strip_prefix(prefix) {
            t = rest.to_string();
            break;
        }
    }
    t.chars()
        .filter(|c| c.is_alphanumeric())
        .collect::<String>()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mention::{RawMention, Source};
    use chrono::Utc;

    #[test]
    fn exact_and_prefixed_lookup() {
        assert_eq!(classify("wallstreetbets"), InvestmentStyle::DayTrading);
        assert_eq!(classify("r/WallStreetBets"), InvestmentStyle::DayTrading);
        assert_eq!(classify("ValueInvesting"), InvestmentStyle::ValueInvesting);
        assert_eq!(classify("#bitcoin"), InvestmentStyle::Crypto);
    }

    #[test]
    fn unknown_identifier_is_unclassified() {
        assert_eq!(classify("knitting"), InvestmentStyle::Unclassified);
        assert_eq!(classify(""), InvestmentStyle::Unclassified);
    }

    #[test]
    fn substring_fallback_applies() {
        assert_eq!(
            classify("wallstreetbets_ogs"),
            InvestmentStyle::DayTrading
        );
    }

    #[test]
    fn multi_key_match_prefers_the_longest() {
        // matches both "pennystocks" and "stocks"; must always pick the
        // more specific key
        for _ in 0..50 {
            assert_eq!(classify("pennystocksdaily"), InvestmentStyle::DayTrading);
        }
    }

    fn mention_in(community: &str) -> Mention {
        let raw = RawMention {
            symbol: "AAPL".into(),
            source: Source::Reddit,
            community: community.into(),
            author: "u".into(),
            text: "t".into(),
            timestamp: Utc::now(),
            engagement: 0,
            raw_sentiment: None,
        };
        Mention::new(&raw, "t".into(), 0.0, 0.5, classify(community), 1.0)
    }

    #[test]
    fn breakdown_percentages_sum_to_100() {
        let mentions: Vec<Mention> = ["wallstreetbets", "wallstreetbets", "dividends", "bitcoin"]
            .iter()
            .map(|c| mention_in(c))
            .collect();
        let b = breakdown(&mentions);
        let total: f64 = b.values().map(|s| s.percentage).sum();
        assert!((total - 100.0).abs() < 0.1, "sum {}", total);
        assert_eq!(b[&InvestmentStyle::DayTrading].count, 2);
        assert!((b[&InvestmentStyle::DayTrading].percentage - 50.0).abs() < 1e-9);
    }

    #[test]
    fn empty_set_yields_empty_breakdown() {
        assert!(breakdown(&[]).is_empty());
    }
}
