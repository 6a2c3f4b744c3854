//! Cleanup of raw provider output into candidate markup.

use std::borrow::Cow;
use std::sync::OnceLock;

use regex::{Captures, Regex};

fn fence_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)```(?:xaml|xml|html|plaintext|text|txt)?")
            .expect("fence pattern is a valid regex")
    })
}

fn entity_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"&(lt|gt|amp|quot);").expect("entity pattern is a valid regex")
    })
}

/// Reduce raw provider text to the markup it contains.
///
/// 1. Remove every code fence delimiter (```` ``` ````, ```` ```xaml ````,
///    ```` ```xml ````, ```` ```text ```` and friends, any case, anywhere).
/// 2. If no literal `<` remains, the provider escaped the whole fragment:
///    unescape `&lt; &gt; &amp; &quot;` in a single pass.
/// 3. Keep the span from the first `<` to the last `>`; empty when there is
///    no `<` at all.
/// 4. Trim.
///
/// The function is idempotent and leaves clean markup untouched.
pub fn sanitize(raw: &str) -> String {
    let unfenced = fence_pattern().replace_all(raw, "");

    let text: Cow<'_, str> = if unfenced.contains('<') {
        unfenced
    } else {
        Cow::Owned(unescape_entities(&unfenced))
    };

    let Some(start) = text.find('<') else {
        return String::new();
    };
    let end = match text.rfind('>') {
        Some(end) if end > start => end + 1,
        _ => text.len(),
    };
    text[start..end].trim().to_string()
}

fn unescape_entities(text: &str) -> String {
    entity_pattern()
        .replace_all(text, |caps: &Captures| match &caps[1] {
            "lt" => "<",
            "gt" => ">",
            "amp" => "&",
            _ => "\"",
        })
        .into_owned()
}
