//! URL slug derivation for course and chapter titles

use once_cell::sync::Lazy;
use regex::Regex;

/// Characters that never survive into a slug
static STRIP_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9\s-]").unwrap());

/// Runs of whitespace and hyphens collapse into one separator
static SEPARATOR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\s-]+").unwrap());

/// Derive a lowercase, hyphen-separated slug from a title
///
/// `"LD_PRELOAD Injection: Part 1"` becomes `"ldpreload-injection-part-1"`.
pub fn slugify(title: &str) -> String {
    let lower = title.to_lowercase();
    let stripped = STRIP_RE.replace_all(&lower, "");
    let joined = SEPARATOR_RE.replace_all(stripped.trim(), "-");
    joined.trim_matches('-').to_string()
}
