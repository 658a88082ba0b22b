//! Locate an HTML document inside a free-text model response.
//!
//! Rules are tried in [`ExtractRule::ORDER`]; the first one that matches decides the
//! outcome, including failure. All searches run on an ASCII-lowercased copy, which has
//! the same byte offsets as the original.

use serde::Serialize;

const FENCE: &str = "```";
const HTML_FENCE: &str = "```html";
const DOCTYPE_OPEN: &str = "<!doctype";
const HTML_OPEN: &str = "<html";
const HTML_CLOSE: &str = "</html>";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractRule {
    /// Interior of the first ```` ```html ```` block.
    TaggedFence,
    /// Interior of the first untagged (or otherwise tagged) fenced block.
    BareFence,
    /// From `<!doctype`/`<html` up to and including `</html>`.
    DocumentTag,
    /// The whole trimmed response.
    RawText,
}

impl ExtractRule {
    pub const ORDER: [ExtractRule; 4] = [
        ExtractRule::TaggedFence,
        ExtractRule::BareFence,
        ExtractRule::DocumentTag,
        ExtractRule::RawText,
    ];

    /// `None` means the rule does not apply and the next one should be tried.
    fn apply(self, text: &str, lower: &str) -> Option<Result<String, String>> {
        match self {
            ExtractRule::TaggedFence => {
                let start = lower.find(HTML_FENCE)?;
                Some(fenced_body(text, start + HTML_FENCE.len()).ok_or_else(|| {
                    format!("```html fence opened at byte {start} is never closed")
                }))
            }
            ExtractRule::BareFence => {
                let start = lower.find(FENCE)?;
                Some(fenced_body(text, start + FENCE.len()).ok_or_else(|| {
                    format!("``` fence opened at byte {start} is never closed")
                }))
            }
            ExtractRule::DocumentTag => {
                let start = lower.find(DOCTYPE_OPEN).or_else(|| lower.find(HTML_OPEN))?;
                let end = lower[start..]
                    .find(HTML_CLOSE)
                    .map(|i| start + i + HTML_CLOSE.len())
                    .unwrap_or(text.len());
                Some(Ok(text[start..end].trim().to_string()))
            }
            ExtractRule::RawText => Some(Ok(text.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    Html { html: String, rule: ExtractRule },
    /// The response had a recognisable structure that was broken (e.g. unclosed fence).
    Malformed(String),
    /// No response, or nothing left after trimming.
    Empty,
}

impl Extraction {
    pub fn html(&self) -> Option<&str> {
        match self {
            Extraction::Html { html, .. } => Some(html),
            _ => None,
        }
    }
}

pub fn extract_html(response: Option<&str>) -> Extraction {
    let Some(response) = response else {
        return Extraction::Empty;
    };

    let text = response.trim();
    if text.is_empty() {
        return Extraction::Empty;
    }
    let lower = text.to_ascii_lowercase();

    for rule in ExtractRule::ORDER {
        match rule.apply(text, &lower) {
            None => continue,
            Some(Err(reason)) => return Extraction::Malformed(reason),
            Some(Ok(html)) if html.is_empty() => return Extraction::Empty,
            Some(Ok(html)) => return Extraction::Html { html, rule },
        }
    }

    Extraction::Empty
}

/// Body of a fence whose opening marker ends at `after_open`. The rest of the opening
/// line is an info string (`html5`, `xml`, ...) unless the fence also closes on it.
fn fenced_body(text: &str, after_open: usize) -> Option<String> {
    let rest = &text[after_open..];
    let line = rest.find('\n').map_or(rest, |i| &rest[..i]);
    let body_start = if line.contains(FENCE) {
        after_open
    } else {
        after_open + line.len()
    };
    let len = text[body_start..].find(FENCE)?;
    Some(text[body_start..body_start + len].trim().to_string())
}
