//! Three-tier content classifier.
//!
//! Maps free memo text to exactly one [`Bucket`] using, in strict order:
//!
//! 1. prefix patterns against the first line,
//! 2. suffix patterns against the last line,
//! 3. contains patterns against the full combined text,
//! 4. a word-frequency fallback over per-bucket indicator lists.
//!
//! First match wins at every tier, and buckets are iterated in
//! [`Bucket::ALL`] order, so ties resolve to the earlier-declared bucket.
//! The fallback defaults to PERSONAL when no indicator word appears at all.
//!
//! The classifier is a pure function over text: no side effects, and no
//! failure path reaches the caller.

use regex::Regex;
use std::sync::LazyLock;

use crate::models::{Bucket, Note};

/// Per-bucket keyword pattern set. The `prefix`/`suffix`/`contains` lists
/// are ordered; reordering changes output.
struct BucketPatterns {
    bucket: Bucket,
    prefix: Vec<Regex>,
    suffix: Vec<Regex>,
    contains: Vec<Regex>,
}

fn build(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|p| Regex::new(&format!("(?i){}", p)).unwrap())
        .collect()
}

static PATTERNS: LazyLock<Vec<BucketPatterns>> = LazyLock::new(|| {
    vec![
        BucketPatterns {
            bucket: Bucket::Personal,
            prefix: build(&[
                "^PERSONAL", "^LIFE", "^HOME", "^FAMILY", "^PRIVATE", "^ME", "^MY",
            ]),
            suffix: build(&["PERSONAL$", "LIFE$", "HOME$", "FAMILY$", "PRIVATE$"]),
            contains: build(&[
                r"\b(remind me to|remember to|don't forget|call my|text my)\b",
                r"\b(birthday|anniversary|wedding|party|dinner|lunch)\b",
                r"\b(grocery|shopping|buy|pick up|get from)\b",
                r"\b(dentist|doctor|appointment|checkup)\b",
                r"\b(kids?|children|wife|husband|spouse|partner|mom|dad)\b",
                r"\b(personal|life|home|family)\s+(task|note|reminder)\b",
                r"\b(wedding|vacation|trip|travel|hotel|flight)\b",
                r"\b(bank account|credit card|bill pay|mortgage|rent)\b",
            ]),
        },
        BucketPatterns {
            bucket: Bucket::Ttl,
            prefix: build(&[
                "^TTL", "^TRAFFIC", "^CLIENT", "^TRINA", "^BUSINESS", "^WORK",
            ]),
            suffix: build(&["TTL$", "TRAFFIC$", "CLIENT$", "WORK$", "BUSINESS$"]),
            contains: build(&[
                r"\b(the traffic link|traffic link|TTL)\b",
                r"\b(client|project|campaign|email|marketing|lead)\b",
                r"\b(Trina|Fallardo|consulting|consultant)\b",
                r"\b(GHL|go high level|highlevel|CRM)\b",
                r"\b(proposal|contract|invoice|payment|billing)\b",
                r"\b(cold email|warmup|deliverability|domain)\b",
                r"\b(sub-?account|location|agency)\b",
                r"\b(website|funnel|landing page|opt-?in)\b",
            ]),
        },
        BucketPatterns {
            bucket: Bucket::Comcast,
            prefix: build(&[
                "^COMCAST",
                "^SALES",
                "^TERRITORY",
                "^PROSPECT",
                "^BUSINESS",
                "^B2B",
            ]),
            suffix: build(&["COMCAST$", "SALES$", "TERRITORY$", "PROSPECT$"]),
            contains: build(&[
                r"\b(comcast|xfinity|cable|internet|triple play)\b",
                r"\b(territory|zip|zipcode|area|zone|route)\b",
                r"\b(prospect|lead|business|owner|manager|decision maker)\b",
                r"\b(visit|door knock|walk-?in|cold call|follow-?up)\b",
                r"\b(business card|card scan|OCR|extracted)\b",
                r"\b(gigabit|business internet|voice|TV|phone service)\b",
                r"\b(contract|install|installation|tech|technician)\b",
                r"\b(tacoma|puyallup|federal way|auburn|kent)\b",
            ]),
        },
    ]
});

/// Fallback indicator words, checked as lower-cased substrings (not word
/// boundaries). The lists are disjoint per bucket.
const PERSONAL_WORDS: &[&str] = &[
    "remind",
    "remember",
    "forget",
    "family",
    "home",
    "wife",
    "kids",
    "appointment",
    "doctor",
    "dentist",
    "grocery",
    "shopping",
    "birthday",
    "party",
    "dinner",
    "personal",
    "my",
    "i need to",
    "call my",
    "text my",
];

const TTL_WORDS: &[&str] = &[
    "client",
    "trina",
    "traffic link",
    "consulting",
    "campaign",
    "marketing",
    "ghl",
    "crm",
    "project",
    "proposal",
    "contract",
    "invoice",
    "business",
];

const COMCAST_WORDS: &[&str] = &[
    "comcast",
    "xfinity",
    "territory",
    "zip",
    "prospect",
    "visit",
    "door",
    "business card",
    "install",
    "internet",
    "cable",
    "gigabit",
    "sales",
];

fn indicator_words(bucket: Bucket) -> &'static [&'static str] {
    match bucket {
        Bucket::Personal => PERSONAL_WORDS,
        Bucket::Ttl => TTL_WORDS,
        Bucket::Comcast => COMCAST_WORDS,
    }
}

/// Classify a note into exactly one bucket.
pub fn classify(note: &Note) -> Bucket {
    classify_text(&note.summary, &note.transcription)
}

/// Classify raw summary + transcription text.
pub fn classify_text(summary: &str, transcription: &str) -> Bucket {
    let combined = format!("{} {}", summary, transcription);

    if let Some(bucket) = check_keywords(&combined) {
        return bucket;
    }

    heuristic_fallback(&combined)
}

/// Tiers 1–3: explicit keyword matching. Returns `None` when no pattern in
/// any tier matches.
pub fn check_keywords(text: &str) -> Option<Bucket> {
    let normalized = text.trim();
    let first_line = normalized.lines().next().unwrap_or("").trim();
    let last_line = normalized.lines().last().unwrap_or("").trim();

    // Prefix patterns first: explicit overrides beat everything else.
    for bp in PATTERNS.iter() {
        for pattern in &bp.prefix {
            if pattern.is_match(first_line) {
                println!("Keyword match: {} (prefix in first line)", bp.bucket);
                return Some(bp.bucket);
            }
        }
    }

    for bp in PATTERNS.iter() {
        for pattern in &bp.suffix {
            if pattern.is_match(last_line) {
                println!("Keyword match: {} (suffix in last line)", bp.bucket);
                return Some(bp.bucket);
            }
        }
    }

    // Contains patterns last (least specific).
    for bp in PATTERNS.iter() {
        for pattern in &bp.contains {
            if pattern.is_match(normalized) {
                println!("Keyword match: {} (content match)", bp.bucket);
                return Some(bp.bucket);
            }
        }
    }

    None
}

/// Tier 4: count indicator-word hits per bucket in the lower-cased text.
pub fn fallback_scores(text: &str) -> Vec<(Bucket, usize)> {
    let lower = text.to_lowercase();
    Bucket::ALL
        .iter()
        .map(|&bucket| {
            let score = indicator_words(bucket)
                .iter()
                .filter(|w| lower.contains(**w))
                .count();
            (bucket, score)
        })
        .collect()
}

fn heuristic_fallback(text: &str) -> Bucket {
    let scores = fallback_scores(text);

    // A candidate replaces the leader only on a strictly greater score, so
    // nonzero ties resolve to the earlier-declared bucket.
    let mut winner = Bucket::Personal;
    let mut best = 0usize;
    for (bucket, score) in &scores {
        if *score > best {
            winner = *bucket;
            best = *score;
        }
    }

    if best == 0 {
        println!("No clear indicators, defaulting to PERSONAL");
        return Bucket::Personal;
    }

    println!("Heuristic classified as: {} (score: {})", winner, best);
    winner
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_tag_wins_over_contrary_content() {
        // Content keywords point at TTL, but the explicit prefix wins.
        let bucket = classify_text("COMCAST: client proposal and invoice review", "");
        assert_eq!(bucket, Bucket::Comcast);
    }

    #[test]
    fn personal_prefix() {
        assert_eq!(
            classify_text("PERSONAL: Call dentist tomorrow", ""),
            Bucket::Personal
        );
    }

    #[test]
    fn ttl_prefix() {
        assert_eq!(
            classify_text("TTL: Follow up with Trina about cold email campaign", ""),
            Bucket::Ttl
        );
    }

    #[test]
    fn suffix_on_last_line() {
        assert_eq!(
            classify_text("Notes from the field\nwrap up paperwork COMCAST", ""),
            Bucket::Comcast
        );
    }

    #[test]
    fn content_match_triple_play() {
        let bucket = classify_text(
            "Visited pizza place on 6th Ave, owner interested in triple play",
            "",
        );
        assert_eq!(bucket, Bucket::Comcast);
    }

    #[test]
    fn no_signal_defaults_to_personal() {
        assert_eq!(classify_text("zzz qqq xxx", ""), Bucket::Personal);
    }

    #[test]
    fn fallback_counts_indicator_words() {
        let scores = fallback_scores("comcast territory gigabit");
        let comcast = scores
            .iter()
            .find(|(b, _)| *b == Bucket::Comcast)
            .unwrap()
            .1;
        assert_eq!(comcast, 3);
    }

    #[test]
    fn transcription_contributes_to_classification() {
        let bucket = classify_text("", "don't forget the groceries for the party");
        assert_eq!(bucket, Bucket::Personal);
    }

    #[test]
    fn bucket_iteration_order_is_fixed() {
        assert_eq!(
            Bucket::ALL,
            [Bucket::Personal, Bucket::Ttl, Bucket::Comcast]
        );
    }
}
