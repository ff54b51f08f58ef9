//! Feed parsing: raw calendar document text in, canonical events out.
//
// The driver normalizes line endings, applies the vendor patch pass when the
// buggy-producer signature is present, decodes the document with the ical
// parser, and assembles one AbstractEvent per source event in document order.
// Individual events never take the whole feed down; only a document that
// cannot be decoded at all is a fatal parse error.

use crate::types::AbstractEvent;
use anyhow::{anyhow, Result};
use chrono::{Duration, Utc};
use ical::parser::ical::component::IcalEvent;
use log::{debug, info, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use std::io::BufReader;

pub mod time;
pub mod vcard;
pub mod venue;

use time::RawTime;

/// Product-identifier marker of the producer with the known linkage and
/// escaping bugs. Detection is a single predicate; every workaround is gated
/// on it and never applied to well-formed documents.
pub const VENDOR_PRODID_MARKER: &str = "Upcoming.org";

/// Self-referential boilerplate the buggy producer appends to descriptions.
const VENDOR_BOILERPLATE: &str = "Imported from Upcoming.org";

/// Placeholder title for events arriving without a summary.
const UNTITLED_EVENT: &str = "Untitled Event";

/// Fatal feed decoding failures. Everything else recovers internally.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("Document could not be decoded as a calendar feed: {0}")]
    UnreadableDocument(String),
    #[error("Document contains no calendar object")]
    EmptyDocument,
}

/// Collaborator that resolves a feed address to raw text. Fetching is outside
/// the core; any failure it reports becomes an import error as-is.
pub trait FeedSource {
    fn fetch(&self, address: &str) -> Result<String>;
}

static PROPERTY_START_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9-]+[;:]").unwrap());

/// Fetch a feed through the collaborator and parse it.
pub fn import_feed(
    source: &dyn FeedSource,
    address: &str,
    skip_old: bool,
) -> Result<Vec<AbstractEvent>> {
    info!("Importing feed from '{}'", address);
    let text = source.fetch(address)?;
    parse_feed(&text, skip_old)
}

/// Parse a calendar feed document into events, preserving document order.
///
/// With `skip_old` set, events whose end (or start, when instantaneous)
/// precedes yesterday are dropped. Errors downcast to [`ParseError`].
pub fn parse_feed(text: &str, skip_old: bool) -> Result<Vec<AbstractEvent>> {
    let content = normalize_line_endings(text);
    let content = if vendor_signature_matches(&content) {
        debug!("Vendor signature detected, applying patch pass");
        apply_vendor_patches(&content)
    } else {
        content
    };

    // Venue blocks are pulled from `content` directly; the calendar decoder
    // gets a copy without them.
    let stripped = venue::strip_blocks(&content);
    let mut calendars = Vec::new();
    for parsed in ical::IcalParser::new(BufReader::new(stripped.as_bytes())) {
        let calendar =
            parsed.map_err(|e| anyhow!(ParseError::UnreadableDocument(e.to_string())))?;
        calendars.push(calendar);
    }
    if calendars.is_empty() {
        return Err(anyhow!(ParseError::EmptyDocument));
    }

    let cutoff = Utc::now() - Duration::days(1);
    let mut events = Vec::new();
    let mut event_index = 0usize;

    for calendar in &calendars {
        for source_event in &calendar.events {
            let index = event_index;
            event_index += 1;

            let start_raw = match raw_time(source_event, "DTSTART") {
                Some(raw) => raw,
                None => {
                    warn!("Skipping event {} without a start time", index);
                    continue;
                }
            };
            let end_raw = raw_time(source_event, "DTEND");
            let duration = property_value(source_event, "DURATION");
            let resolved = time::resolve(&start_raw, end_raw.as_ref(), duration.as_deref());

            if skip_old && resolved.end < cutoff {
                debug!("Skipping stale event {} ending {}", index, resolved.end);
                continue;
            }

            let title = property_value(source_event, "SUMMARY")
                .map(|v| unescape_text(&v))
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| UNTITLED_EVENT.to_string());
            let description =
                property_value(source_event, "DESCRIPTION").map(|v| unescape_text(&v));
            let url = property_value(source_event, "URL");

            let location_text =
                property_value(source_event, "LOCATION").map(|v| unescape_text(&v));
            let backref = venue_backref(source_event);
            let block = venue::extract(&content, index, backref.as_deref());
            let location =
                vcard::decode(block.as_deref(), location_text.as_deref().unwrap_or(""));

            events.push(AbstractEvent {
                title,
                description,
                url,
                start_time: resolved.start,
                end_time: resolved.end,
                location,
            });
        }
    }

    info!("Parsed {} event(s) from feed", events.len());
    Ok(events)
}

/// True when the document was produced by the known buggy vendor.
pub fn vendor_signature_matches(content: &str) -> bool {
    content
        .lines()
        .any(|line| line.starts_with("PRODID") && line.contains(VENDOR_PRODID_MARKER))
}

fn normalize_line_endings(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\r', "\n")
}

/// The vendor patch pass: strip the self-referential boilerplate phrase and
/// collapse raw newlines inside DESCRIPTION bodies into escaped `\n`
/// sequences so line-oriented decoding survives.
fn apply_vendor_patches(content: &str) -> String {
    let content = content.replace(VENDOR_BOILERPLATE, "");

    let mut out: Vec<String> = Vec::new();
    let mut in_description = false;
    for line in content.lines() {
        if line.starts_with("DESCRIPTION") && PROPERTY_START_RE.is_match(line) {
            in_description = true;
            out.push(line.to_string());
        } else if line.starts_with(' ') || line.starts_with('\t') {
            // Folded continuation, already well-formed.
            out.push(line.to_string());
        } else if PROPERTY_START_RE.is_match(line)
            || line.starts_with("BEGIN:")
            || line.starts_with("END:")
        {
            in_description = false;
            out.push(line.to_string());
        } else if in_description {
            // Raw newline inside a description body: rejoin as an escaped
            // newline on the property line.
            match out.last_mut() {
                Some(prev) => {
                    prev.push_str("\\n");
                    prev.push_str(line);
                }
                None => out.push(line.to_string()),
            }
        } else {
            out.push(line.to_string());
        }
    }
    let mut patched = out.join("\n");
    if content.ends_with('\n') {
        patched.push('\n');
    }
    patched
}

/// Undo iCalendar text escaping in a property value.
fn unescape_text(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') | Some('N') => out.push('\n'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

fn property_value(event: &IcalEvent, name: &str) -> Option<String> {
    event
        .properties
        .iter()
        .find(|p| p.name.eq_ignore_ascii_case(name))
        .and_then(|p| p.value.clone())
}

fn raw_time(event: &IcalEvent, name: &str) -> Option<RawTime> {
    let property = event.properties.iter().find(|p| p.name.eq_ignore_ascii_case(name))?;
    let value = property.value.clone()?;
    let tzid = property.params.as_ref().and_then(|params| {
        params
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case("TZID"))
            .and_then(|(_, values)| values.first().cloned())
    });
    Some(RawTime { value, tzid })
}

/// The venue back-reference carried as a VVENUE parameter on the LOCATION
/// property. A malformed parameter shape is swallowed to `None`, never fatal.
fn venue_backref(event: &IcalEvent) -> Option<String> {
    let property = event.properties.iter().find(|p| p.name.eq_ignore_ascii_case("LOCATION"))?;
    let id = property.params.as_ref().and_then(|params| {
        params
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case("VVENUE"))
            .and_then(|(_, values)| values.first().cloned())
    });
    if id.is_none() {
        info!("Location property carries no usable venue back-reference");
    }
    id.filter(|v| !v.trim().is_empty())
}
