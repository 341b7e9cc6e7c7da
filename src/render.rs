//! Terminal rendering of responses, documents, and conversation history.
//!
//! Every renderer writes to an `io::Write` so the CLI prints to stdout and
//! tests render into a `Vec<u8>`. Dates are rendered in UTC.

use chrono::{DateTime, NaiveDateTime, Utc};
use std::io::{self, Write};

use crate::models::{Conversation, Document, QueryResponse, ResponseMode};
use crate::settings::Settings;

const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";
const GREEN: &str = "\x1b[32m";
const AMBER: &str = "\x1b[33m";
const GREY: &str = "\x1b[90m";

/// Presentation switches derived from settings and the output stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Style {
    pub color: bool,
    pub compact: bool,
    pub badges: bool,
}

impl Style {
    pub fn plain() -> Self {
        Self {
            color: false,
            compact: false,
            badges: true,
        }
    }

    /// Color only when `dark_mode` is on and stdout is a terminal.
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            color: settings.dark_mode && atty::is(atty::Stream::Stdout),
            compact: settings.compact_view,
            badges: settings.show_document_badges,
        }
    }

    fn paint(&self, code: &str, text: &str) -> String {
        if self.color && !code.is_empty() {
            format!("{}{}{}", code, text, RESET)
        } else {
            text.to_string()
        }
    }
}

struct ModeLook {
    label: &'static str,
    tooltip: &'static str,
    accent: &'static str,
}

fn mode_look(mode: ResponseMode) -> Option<ModeLook> {
    match mode {
        ResponseMode::DirectAnswer => Some(ModeLook {
            label: "DIRECT ANSWER",
            tooltip: "Answer found directly in documents",
            accent: GREEN,
        }),
        ResponseMode::GuidedFallback => Some(ModeLook {
            label: "GUIDED FALLBACK",
            tooltip: "Guidance provided when answer not found verbatim",
            accent: AMBER,
        }),
        ResponseMode::HardRefusal => Some(ModeLook {
            label: "HARD REFUSAL",
            tooltip: "Query cannot be answered from documents",
            accent: GREY,
        }),
        ResponseMode::Unknown => None,
    }
}

/// Last path segment of a citation source.
pub fn filename_from_source(source: &str) -> &str {
    if source.is_empty() {
        return "Unknown source";
    }
    match source.rsplit('/').next() {
        Some(name) if !name.is_empty() => name,
        _ => source,
    }
}

pub fn page_label(page: Option<i64>) -> String {
    match page {
        Some(p) => format!("Page {}", p),
        None => "Page ?".to_string(),
    }
}

/// Human-readable size with 1024-based units and at most one decimal.
pub fn format_bytes(bytes: u64) -> String {
    if bytes == 0 {
        return "0 B".to_string();
    }
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    let rounded = format!("{:.1}", value);
    let trimmed = rounded.strip_suffix(".0").unwrap_or(&rounded);
    format!("{} {}", trimmed, UNITS[unit])
}

/// RFC 3339, or a naive ISO timestamp (document listings carry no offset),
/// which is taken as UTC.
fn parse_ts(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

/// `Dec 15, 2025, 10:30 AM`. Unparseable input is returned as-is.
pub fn format_date(raw: &str) -> String {
    match parse_ts(raw) {
        Some(dt) => dt.format("%b %-d, %Y, %I:%M %p").to_string(),
        None => raw.to_string(),
    }
}

/// `5m ago`, `3h ago`, `Yesterday`, `4d ago`, or `Dec 30` for older dates.
pub fn format_relative(raw: &str, now: DateTime<Utc>) -> String {
    let Some(dt) = parse_ts(raw) else {
        return raw.to_string();
    };
    let diff = (now - dt).num_milliseconds().max(0);
    let mins = diff / 60_000;
    let hours = diff / 3_600_000;
    let days = diff / 86_400_000;

    if mins < 60 {
        format!("{}m ago", mins)
    } else if hours < 24 {
        format!("{}h ago", hours)
    } else if days == 1 {
        "Yesterday".to_string()
    } else if days < 7 {
        format!("{}d ago", days)
    } else {
        dt.format("%b %-d").to_string()
    }
}

/// Render one response: mode badge, answer, and its citations.
///
/// A mode this client does not know renders nothing.
pub fn response(w: &mut impl Write, resp: &QueryResponse, style: Style) -> io::Result<()> {
    let Some(look) = mode_look(resp.mode) else {
        return Ok(());
    };

    writeln!(
        w,
        "{}  {}",
        style.paint(&format!("{}{}", BOLD, look.accent), &format!("● {}", look.label)),
        style.paint(DIM, &format!("({})", look.tooltip))
    )?;
    writeln!(w)?;
    writeln!(w, "{}", resp.answer)?;

    if !resp.citations.is_empty() {
        writeln!(w)?;
        writeln!(
            w,
            "{} ({})",
            style.paint(DIM, "Source Citations"),
            style.paint(look.accent, &resp.citations.len().to_string())
        )?;
        for citation in &resp.citations {
            writeln!(
                w,
                "  - {}  {}",
                filename_from_source(&citation.source),
                style.paint(DIM, &page_label(citation.page))
            )?;
            if !style.compact {
                if let Some(snippet) = citation.snippet.as_deref().filter(|s| !s.is_empty()) {
                    writeln!(w, "      {}", style.paint(DIM, &format!("\"{}\"", snippet)))?;
                }
            }
        }
    }
    Ok(())
}

/// Render the tenant's documents.
pub fn documents(w: &mut impl Write, docs: &[Document], style: Style) -> io::Result<()> {
    if docs.is_empty() {
        writeln!(w, "No documents uploaded")?;
        return Ok(());
    }
    writeln!(w, "Documents ({})", docs.len())?;
    for doc in docs {
        let badge = if !style.badges {
            String::new()
        } else if doc.indexed {
            format!("  {}", style.paint(GREEN, "[indexed]"))
        } else {
            format!("  {}", style.paint(AMBER, "[pending]"))
        };
        writeln!(w, "  {}{}", doc.filename, badge)?;
        writeln!(
            w,
            "    {}",
            style.paint(
                DIM,
                &format!(
                    "{} · {}",
                    format_bytes(doc.size_bytes),
                    format_date(&doc.uploaded_at)
                )
            )
        )?;
    }
    Ok(())
}

/// Render the conversation list, marking the selected one with `>`.
pub fn conversations(
    w: &mut impl Write,
    convs: &[Conversation],
    selected: Option<&str>,
    now: DateTime<Utc>,
    style: Style,
) -> io::Result<()> {
    if convs.is_empty() {
        writeln!(w, "No conversations yet")?;
        return Ok(());
    }
    writeln!(w, "Conversations ({})", convs.len())?;
    for conv in convs {
        let marker = if selected == Some(conv.conversation_id.as_str()) {
            ">"
        } else {
            " "
        };
        let mode = conv
            .turns
            .last()
            .and_then(|t| mode_look(t.response.mode))
            .map(|look| format!("  {}", style.paint(look.accent, look.label)))
            .unwrap_or_default();
        writeln!(
            w,
            "{} {}  {}{}",
            marker,
            conv.conversation_id,
            style.paint(DIM, &format_relative(&conv.last_activity_at, now)),
            mode
        )?;
    }
    Ok(())
}

/// Render every turn of a conversation.
pub fn conversation(w: &mut impl Write, conv: &Conversation, style: Style) -> io::Result<()> {
    writeln!(
        w,
        "{} {}",
        style.paint(BOLD, "Conversation"),
        conv.conversation_id
    )?;
    if conv.turns.is_empty() {
        writeln!(w, "No turns in this conversation")?;
        return Ok(());
    }
    for turn in &conv.turns {
        writeln!(w)?;
        writeln!(w, "{} {}", style.paint(BOLD, "Q:"), turn.query)?;
        writeln!(w)?;
        response(w, &turn.response, style)?;
    }
    Ok(())
}

/// Render the settings table.
pub fn settings(w: &mut impl Write, settings: &Settings) -> io::Result<()> {
    for (key, value, description) in settings.entries() {
        writeln!(
            w,
            "{:<24} {:<6} {}",
            key,
            if value { "on" } else { "off" },
            description
        )?;
    }
    Ok(())
}
