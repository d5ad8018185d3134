use regex::Regex;

/// Derives a URL slug from a human-readable name.
///
/// Lowercases, strips everything but alphanumerics/hyphens/whitespace, then
/// collapses whitespace runs into single hyphens.
pub fn slugify(name: &str) -> String {
    let lowered = name.to_lowercase();
    let stripped = Regex::new(r"[^a-z0-9\-\s]")
        .expect("static slug regex")
        .replace_all(lowered.trim(), "");
    Regex::new(r"\s+")
        .expect("static slug regex")
        .replace_all(&stripped, "-")
        .into_owned()
}
