//! Text canonicalization for matching.
//!
//! Pure functions, deterministic given identical input — classification
//! and similarity results must be reproducible.

use std::sync::LazyLock;

use regex::Regex;

/// Legal and descriptive suffixes stripped from company names. Anchored to
/// the end of the name with leading whitespace so they never eat a prefix
/// ("Cisco" keeps its "co").
static LEGAL_SUFFIX_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\s+(inc|incorporated|ltd|limited|llc|corp|corporation|co|plc|gmbh|ag|sa|group|holdings|company|technologies|technology|solutions|solution|systems|system|labs|lab)\.?$",
    )
    .expect("valid regex")
});

static NON_ALNUM_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^\w\s]").expect("valid regex"));
static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));
static MARKUP_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").expect("valid regex"));

/// Canonicalize a company name for identity matching: lowercase, strip
/// legal suffixes (repeatedly, so "Acme Holdings Ltd" fully reduces),
/// drop punctuation, collapse whitespace. Idempotent.
pub fn normalize_name(raw: &str) -> String {
    let mut name = raw.trim().to_lowercase();

    loop {
        let stripped = LEGAL_SUFFIX_RE.replace(&name, "").into_owned();
        if stripped == name {
            break;
        }
        name = stripped;
    }

    let name = NON_ALNUM_RE.replace_all(&name, "");
    let name = WHITESPACE_RE.replace_all(name.trim(), " ");
    name.into_owned()
}

/// Navigation/footer phrases that mark boilerplate rather than story
/// content. A sentence dominated by these is dropped before term matching.
const NAV_INDICATORS: &[&str] = &[
    "skip to main content",
    "customer stories",
    "all stories",
    "stories by product",
    "explore solutions",
    "stay organized with collections",
    "save and categorize content",
    "follow us",
    "sign in",
    "subscribe",
    "cookie",
    "privacy policy",
    "terms of use",
];

/// Clean harvested body text for term matching: strip markup remnants,
/// lowercase, drop navigation boilerplate sentences, collapse whitespace.
/// Sentence boundaries are preserved (". "-joined) so evidence context
/// windows stay readable.
pub fn clean_body(raw: &str) -> String {
    let text = MARKUP_RE.replace_all(raw, " ");
    let text = text
        .replace("&amp;", "&")
        .replace("&nbsp;", " ")
        .replace("&quot;", "\"")
        .to_lowercase();

    let sentences: Vec<String> = text
        .split(['.', '\n'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter(|s| !is_navigation(s))
        .map(|s| WHITESPACE_RE.replace_all(s, " ").into_owned())
        .collect();

    sentences.join(". ")
}

fn is_navigation(sentence: &str) -> bool {
    let hits = NAV_INDICATORS
        .iter()
        .filter(|ind| sentence.contains(*ind))
        .count();
    // Two indicators means a nav menu; one indicator in a short fragment
    // means a stray link label.
    hits >= 2 || (hits == 1 && sentence.len() < 100)
}
