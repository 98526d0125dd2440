//! # Sentiment Normalizer
//! Converts source-native sentiment scales onto the canonical [-1.0, +1.0]
//! scale, blends in domain/meme phrase overrides, and falls back to a small
//! word lexicon (with negation handling) when a source provides no score.
//!
//! Guarantees: sentiment output is always clamped to [-1, +1], confidence is
//! always in [0, 1]. Unknown inputs fall back to identity with confidence 0.5.

use once_cell::sync::Lazy;
use serde::Serialize;
use std::collections::HashMap;

use crate::mention::RawSentiment;

/// Normalized sentiment plus scoring confidence.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Scored {
    pub sentiment: f64,
    pub confidence: f64,
}

/// Domain phrase overrides: (phrase, sentiment, confidence).
static PHRASES: &[(&str, f64, f64)] = &[
    ("diamond hands", 0.8, 0.9),
    ("paper hands", -0.8, 0.8),
    ("to the moon", 0.9, 0.85),
    ("tendies", 0.6, 0.7),
    ("bagholder", -0.7, 0.8),
    ("bag holder", -0.7, 0.8),
    ("rekt", -0.9, 0.85),
    ("yolo", 0.5, 0.6),
    ("short squeeze", 0.7, 0.7),
    ("rug pull", -0.9, 0.85),
    ("buy the dip", 0.6, 0.7),
    ("dead cat bounce", -0.6, 0.7),
];

/// Word lexicon for text-only scoring (integer valence).
static LEXICON: Lazy<HashMap<&'static str, i32>> = Lazy::new(|| {
    let mut m = HashMap::new();
    for (w, v) in [
        ("bullish", 2),
        ("moon", 2),
        ("rocket", 1),
        ("buy", 1),
        ("long", 1),
        ("calls", 1),
        ("undervalued", 2),
        ("beat", 1),
        ("breakout", 1),
        ("rally", 1),
        ("gains", 1),
        ("winner", 1),
        ("strong", 1),
        ("bearish", -2),
        ("crash", -2),
        ("dump", -2),
        ("sell", -1),
        ("short", -1),
        ("puts", -1),
        ("overvalued", -2),
        ("miss", -1),
        ("drop", -1),
        ("plunge", -2),
        ("loss", -1),
        ("weak", -1),
        ("scam", -2),
        ("fraud", -2),
    ] {
        m.insert(w, v);
    }
    m
});

#[derive(Debug, Clone, Default)]
pub struct SentimentNormalizer;

impl SentimentNormalizer {
    pub fn new() -> Self {
        Self
    }

    /// Convert a source-native score onto the canonical scale.
    pub fn normalize_scale(&self, raw: RawSentiment) -> Scored {
        let sentiment = match raw {
            RawSentiment::Scored0To100(s) => (s - 50.0) / 50.0,
            RawSentiment::Polarity(p) => p,
            RawSentiment::Ratio(r) => r * 2.0 - 1.0,
        };
        Scored {
            sentiment: sentiment.clamp(-1.0, 1.0),
            confidence: 0.7,
        }
    }

    /// Score normalized text with the word lexicon alone.
    ///
    /// Negation: a negator within the previous 1..=3 tokens inverts the sign
    /// of a matched word.
    pub fn score_text(&self, text: &str) -> Scored {
        let tokens: Vec<String> = tokenize(text).collect();
        let mut score: i32 = 0;
        let mut hits: usize = 0;

        for i in 0..tokens.len() {
            let base = *LEXICON.get(tokens[i].as_str()).unwrap_or(&0);
            if base == 0 {
                continue;
            }
            let negated = (1..=3).any(|k| i >= k && is_negator(tokens[i - k].as_str()));
            score += if negated { -base } else { base };
            hits += 1;
        }

        if hits == 0 {
            // No lexical evidence: neutral with identity-fallback confidence.
            return Scored {
                sentiment: 0.0,
                confidence: 0.5,
            };
        }

        Scored {
            sentiment: (score as f64 / 3.0).clamp(-1.0, 1.0),
            confidence: (0.5 + 0.1 * hits as f64).min(0.9),
        }
    }

    /// Full normalization: base score from the source scale (or the text
    /// lexicon when none is provided), then a confidence-weighted blend with
    /// any matched domain phrases. Base weight = 1 - max matched confidence.
    pub fn normalize(&self, raw: Option<RawSentiment>, normalized_text: &str) -> Scored {
        let base = match raw {
            Some(r) => self.normalize_scale(r),
            None => self.score_text(normalized_text),
        };

        let lowered = normalized_text.to_ascii_lowercase();
        let matched: Vec<(f64, f64)> = PHRASES
            .iter()
            .filter(|(p, _, _)| lowered.contains(p))
            .map(|&(_, s, c)| (s, c))
            .collect();

        if matched.is_empty() {
            return base;
        }

        let max_conf = matched.iter().map(|(_, c)| *c).fold(0.0f64, f64::max);
        let conf_sum: f64 = matched.iter().map(|(_, c)| c).sum();
        let phrase_sent: f64 = matched.iter().map(|(s, c)| s * c).sum::<f64>() / conf_sum;

        let blended = base.sentiment * (1.0 - max_conf) + phrase_sent * max_conf;
        Scored {
            sentiment: blended.clamp(-1.0, 1.0),
            confidence: base.confidence.max(max_conf).clamp(0.0, 1.0),
        }
    }
}

/// Alphanumeric tokens, lower-case.
fn tokenize(s: &str) -> impl Iterator<Item = String> + '_ {
    s.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_ascii_lowercase())
}

fn is_negator(tok: &str) -> bool {
    matches!(
        tok,
        "not" | "no" | "never" | "isn" | "wasn" | "aren" | "won" | "can" | "cannot" | "without"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn n() -> SentimentNormalizer {
        SentimentNormalizer::new()
    }

    #[test]
    fn stocktwits_scale_maps_linearly() {
        let s = n().normalize_scale(RawSentiment::Scored0To100(75.0));
        assert!((s.sentiment - 0.5).abs() < 1e-9);
        let s = n().normalize_scale(RawSentiment::Scored0To100(50.0));
        assert_eq!(s.sentiment, 0.0);
    }

    #[test]
    fn ratio_scale_maps_linearly() {
        let s = n().normalize_scale(RawSentiment::Ratio(0.7));
        assert!((s.sentiment - 0.4).abs() < 1e-9);
    }

    #[test]
    fn polarity_is_clamped() {
        let s = n().normalize_scale(RawSentiment::Polarity(-1.5));
        assert_eq!(s.sentiment, -1.0);
        let s = n().normalize_scale(RawSentiment::Polarity(0.3));
        assert!((s.sentiment - 0.3).abs() < 1e-9);
    }

    #[test]
    fn scale_conversion_is_monotonic() {
        let mut prev = f64::NEG_INFINITY;
        for i in 0..=100 {
            let s = n().normalize_scale(RawSentiment::Scored0To100(i as f64));
            assert!(s.sentiment >= prev);
            assert!((-1.0..=1.0).contains(&s.sentiment));
            prev = s.sentiment;
        }
    }

    #[test]
    fn phrase_override_pulls_neutral_base_positive() {
        let s = n().normalize(Some(RawSentiment::Polarity(0.0)), "diamond hands on this one");
        // base 0.0 * 0.1 + 0.8 * 0.9 = 0.72
        assert!((s.sentiment - 0.72).abs() < 1e-9);
        assert!((s.confidence - 0.9).abs() < 1e-9);
    }

    #[test]
    fn negation_inverts_word_score() {
        let pos = n().score_text("this stock is strong");
        let neg = n().score_text("this stock is not strong");
        assert!(pos.sentiment > 0.0);
        assert!(neg.sentiment < 0.0);
    }

    #[test]
    fn missing_raw_score_falls_back_to_text() {
        let s = n().normalize(None, "massive crash incoming, sell everything");
        assert!(s.sentiment < 0.0);
        let neutral = n().normalize(None, "quarterly report released today");
        assert_eq!(neutral.sentiment, 0.0);
        assert!((neutral.confidence - 0.5).abs() < 1e-9);
    }

    #[test]
    fn output_always_in_bounds() {
        for txt in ["to the moon rekt diamond hands bagholder", "", "rekt rekt rekt"] {
            for raw in [
                None,
                Some(RawSentiment::Scored0To100(250.0)),
                Some(RawSentiment::Polarity(9.0)),
                Some(RawSentiment::Ratio(-3.0)),
            ] {
                let s = n().normalize(raw, txt);
                assert!((-1.0..=1.0).contains(&s.sentiment));
                assert!((0.0..=1.0).contains(&s.confidence));
            }
        }
    }
}
