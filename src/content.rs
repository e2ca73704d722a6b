//! Fact text parsing and message rendering.
//!
//! Generated text is expected to carry `Place:` and `Fact:` labelled
//! lines, but the generator is not trusted to comply: parsing is
//! best-effort with a raw-text fallback, never an error.

/// Place label recognized in generated text.
const PLACE_LABEL: &str = "Place:";
/// Fact label recognized in generated text.
const FACT_LABEL: &str = "Fact:";
/// Place used when the generated text carries no place label.
const FALLBACK_PLACE: &str = "near you";

/// Structured view of one generated fact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedFact {
    /// Name of the described place.
    pub place: String,
    /// The fact text.
    pub fact: String,
}

/// Parse generated text into place and fact.
///
/// Recognizes a `Place:` line and a `Fact:` line; the fact may continue
/// over subsequent non-empty lines, which are joined with spaces. When no
/// labels are present the whole trimmed text becomes the fact.
#[must_use]
pub fn parse_fact(raw: &str) -> ParsedFact {
    let mut place = FALLBACK_PLACE.to_owned();
    let mut fact = raw.trim().to_owned();

    let lines: Vec<&str> = raw.lines().collect();
    for (i, line) in lines.iter().enumerate() {
        let line = line.trim();
        if let Some(rest) = line.strip_prefix(PLACE_LABEL) {
            place = rest.trim().to_owned();
        } else if let Some(rest) = line.strip_prefix(FACT_LABEL) {
            let mut parts = vec![rest.trim().to_owned()];
            for continuation in &lines[i + 1..] {
                let continuation = continuation.trim();
                if !continuation.is_empty() {
                    parts.push(continuation.to_owned());
                }
            }
            fact = parts.join(" ");
            break;
        }
    }

    ParsedFact { place, fact }
}

/// Render the numbered fact message.
#[must_use]
pub fn render_fact(number: u32, parsed: &ParsedFact) -> String {
    format!(
        "🔴 *Fact #{number}*\n\n📍 *Place:* {}\n\n💡 *Fact:* {}",
        parsed.place, parsed.fact
    )
}

/// Render the numbered placeholder sent when generation fails, keeping
/// user-visible numbering contiguous.
#[must_use]
pub fn render_fallback(number: u32) -> String {
    format!("🔴 *Fact #{number}*\n\n😔 *Oops!*\n\nCouldn't find anything interesting about this spot.")
}

/// History entry recorded for repetition avoidance.
#[must_use]
pub fn history_entry(parsed: &ParsedFact) -> String {
    format!("{}: {}", parsed.place, parsed.fact)
}
