//! Text preprocessor: normalization, ticker extraction, spam scoring.
//!
//! Pure functions of the input; never panics on malformed text. A record
//! that normalizes to nothing gets quality 0.0 and is dropped upstream by
//! the quality floor.

use std::collections::BTreeSet;

use once_cell::sync::OnceCell;
use regex::Regex;
use serde::Serialize;

/// Output of preprocessing one raw text.
#[derive(Debug, Clone, Serialize)]
pub struct Preprocessed {
    pub text: String,
    pub tickers: BTreeSet<String>,
    /// Spam-filter score on [0.0, 1.0]; 1.0 = clean.
    pub quality: f64,
    pub flags: NoiseFlags,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct NoiseFlags {
    pub excessive_caps: bool,
    pub excessive_exclamation: bool,
    pub repeated_chars: bool,
    pub link_heavy: bool,
}

fn re_urls() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"(?i)https?://\S+|www\.\S+").unwrap())
}

fn re_tags() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"(?is)</?[^>]+>").unwrap())
}

fn re_ws() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"\s+").unwrap())
}

fn re_cashtag() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"\$([A-Za-z]{1,5})\b").unwrap())
}

/// Normalize raw mention text: decode HTML entities, strip tags/URLs/emoji,
/// collapse repeated punctuation and whitespace.
pub fn normalize_text(s: &str) -> String {
    // 1) HTML entity decode
    let mut out = html_escape::decode_html_entities(s).to_string();

    // 2) Strip HTML tags, then URLs
    out = re_tags().replace_all(&out, " ").to_string();
    out = re_urls().replace_all(&out, " ").to_string();

    // 3) Normalize typographic quotes to ASCII
    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    // 4) Drop emoji and other pictographs
    out = out.chars().filter(|c| !is_emoji(*c)).collect();

    // 5) Collapse repeated punctuation ("!!!" -> "!")
    out = collapse_repeat_punct(&out);

    // 6) Collapse whitespace
    out = re_ws().replace_all(&out, " ").trim().to_string();

    // 7) Length cap: 1500 chars
    if out.chars().count() > 1500 {
        out = out.chars().take(1500).collect();
    }

    out
}

/// Extract `$TICKER` cashtags from raw text, uppercased.
pub fn extract_tickers(s: &str) -> BTreeSet<String> {
    re_cashtag()
        .captures_iter(s)
        .map(|c| c[1].to_ascii_uppercase())
        .collect()
}

/// Run the full preprocessing pass over one raw text.
pub fn preprocess(raw: &str) -> Preprocessed {
    let tickers = extract_tickers(raw);
    let text = normalize_text(raw);

    if text.is_empty() {
        return Preprocessed {
            text,
            tickers,
            quality: 0.0,
            flags: NoiseFlags::default(),
        };
    }

    let (quality, flags) = quality_score(raw, &text);
    Preprocessed {
        text,
        tickers,
        quality,
        flags,
    }
}

/// Spam/bot heuristics over the raw and normalized text.
///
/// Starts at 1.0 and subtracts per-signal penalties: link density, caps
/// ratio, exclamation density and long repeated-character runs.
fn quality_score(raw: &str, normalized: &str) -> (f64, NoiseFlags) {
    let mut score = 1.0f64;
    let mut flags = NoiseFlags::default();

    let words = normalized.split_whitespace().count().max(1);

    // Link density: each URL counts against a short message much more.
    let links = re_urls().find_iter(raw).count();
    if links > 0 {
        let density = links as f64 / words as f64;
        if density > 0.2 {
            flags.link_heavy = true;
        }
        score -= (density * 1.5).min(0.6);
    }

    // Caps ratio over alphabetic chars.
    let alpha: Vec<char> = normalized.chars().filter(|c| c.is_alphabetic()).collect();
    if alpha.len() >= 12 {
        let upper = alpha.iter().filter(|c| c.is_uppercase()).count();
        let ratio = upper as f64 / alpha.len() as f64;
        if ratio > 0.6 {
            flags.excessive_caps = true;
            score -= 0.3;
        }
    }

    // Exclamation density in the raw text.
    let bangs = raw.chars().filter(|c| *c == '!').count();
    if bangs as f64 / words as f64 > 0.5 {
        flags.excessive_exclamation = true;
        score -= 0.25;
    }

    // Repeated-character runs ("mooooon") of length >= 5.
    if has_long_run(normalized, 5) {
        flags.repeated_chars = true;
        score -= 0.2;
    }

    // One- or two-word messages carry almost no signal.
    if words < 3 {
        score -= 0.2;
    }

    (score.clamp(0.0, 1.0), flags)
}

/// Collapse runs of the same punctuation character to a single occurrence.
/// Runs of *different* punctuation ("?!") are left alone.
fn collapse_repeat_punct(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev: Option<char> = None;
    for c in s.chars() {
        if matches!(c, '!' | '?' | '.' | ',') && prev == Some(c) {
            continue;
        }
        out.push(c);
        prev = Some(c);
    }
    out
}

fn has_long_run(s: &str, min_run: usize) -> bool {
    let mut prev = None;
    let mut run = 0usize;
    for c in s.chars() {
        if Some(c) == prev {
            run += 1;
            if run >= min_run {
                return true;
            }
        } else {
            prev = Some(c);
            run = 1;
        }
    }
    false
}

fn is_emoji(c: char) -> bool {
    matches!(c as u32,
        0x1F300..=0x1FAFF // pictographs, emoticons, transport, supplemental
        | 0x2600..=0x27BF // misc symbols + dingbats
        | 0x2190..=0x21FF // arrows
        | 0xFE00..=0xFE0F // variation selectors
        | 0x1F1E6..=0x1F1FF // regional indicators
    )
}
