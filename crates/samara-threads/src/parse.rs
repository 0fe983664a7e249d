use once_cell::sync::Lazy;
use regex::Regex;

static LIST_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[-*]\s+").unwrap());
static NUMERIC_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9]+[.)]\s+").unwrap());
static CHECKBOX_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\[[ xX]\]\s+").unwrap());
static SESSION_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\*\*Session ID:\*\*\s*(\S+)").unwrap());

/// Collect the lines between a `## <header>` line (case-insensitive)
/// and the next `## ` header.
fn extract_section_lines<'a>(text: &'a str, header: &str) -> Vec<&'a str> {
    let target = format!("## {}", header).to_lowercase();
    let mut in_section = false;
    let mut collected = Vec::new();

    for line in text.lines() {
        let stripped = line.trim();
        if stripped.to_lowercase() == target {
            in_section = true;
            continue;
        }
        if in_section {
            if stripped.starts_with("## ") {
                break;
            }
            collected.push(line);
        }
    }

    collected
}

/// Parse the Open Threads section of a handoff markdown document into
/// titles. List markers, numeric bullets, and checkboxes are stripped;
/// a sole "None identified." line yields no threads.
pub fn parse_open_threads(text: &str) -> Vec<String> {
    let mut threads = Vec::new();

    for line in extract_section_lines(text, "Open Threads") {
        let stripped = line.trim();
        if stripped.is_empty() {
            continue;
        }
        if stripped.eq_ignore_ascii_case("none identified.") {
            return Vec::new();
        }

        let cleaned = LIST_MARKER.replace(stripped, "");
        let cleaned = NUMERIC_MARKER.replace(&cleaned, "");
        let cleaned = CHECKBOX_MARKER.replace(&cleaned, "");
        let cleaned = cleaned.trim();

        if !cleaned.is_empty() {
            threads.push(cleaned.to_string());
        }
    }

    threads
}

/// Extract the session ID from a handoff document, if present.
pub fn parse_session_id(text: &str) -> Option<String> {
    SESSION_ID
        .captures(text)
        .map(|caps| caps[1].to_string())
}
