//! Extraction of embedded venue sub-records from a feed document.
//
// Venue data rides along inside the calendar document as VVENUE blocks,
// using the same BEGIN/END block syntax as events. Well-behaved producers
// link an event to its venue through a back-reference identifier that
// matches the block's UID. One widespread producer omits the back-reference
// entirely and relies on events and venues appearing in the same order, so
// that document shape gets positional selection instead.

use log::{debug, info};

pub const SUBRECORD_BEGIN: &str = "BEGIN:VVENUE";
pub const SUBRECORD_END: &str = "END:VVENUE";

/// Locate the venue sub-record for the event at `event_index` (position in
/// document order). Returns the raw block text, BEGIN/END lines included.
///
/// With the buggy-producer signature present the block is chosen by index;
/// otherwise `backref` is matched against each block's UID. No back-reference
/// or no match yields `None`, never an error.
pub fn extract(document: &str, event_index: usize, backref: Option<&str>) -> Option<String> {
    let blocks = scan_blocks(document);
    if blocks.is_empty() {
        return None;
    }

    if super::vendor_signature_matches(document) {
        // The producer emits venues 1:1 with events, in order, with no UIDs
        // to match against.
        let block = blocks.get(event_index);
        if block.is_none() {
            info!(
                "No positional venue block for event {} ({} blocks present)",
                event_index,
                blocks.len()
            );
        }
        return block.map(|b| b.to_string());
    }

    let wanted = match backref {
        Some(id) if !id.trim().is_empty() => id.trim(),
        _ => {
            debug!("Event {} carries no venue back-reference", event_index);
            return None;
        }
    };

    for block in &blocks {
        if block_uid(block) == Some(wanted) {
            return Some(block.to_string());
        }
    }
    info!("No venue block with UID '{}' found for event {}", wanted, event_index);
    None
}

/// Remove all venue blocks from the document. The calendar decoder does not
/// understand the nonstandard VVENUE component, so the driver hands it a
/// stripped copy and extracts venues from the original text.
pub fn strip_blocks(document: &str) -> String {
    let mut out = String::with_capacity(document.len());
    let mut in_block = false;
    for line in document.lines() {
        let trimmed = line.trim_end();
        if trimmed == SUBRECORD_BEGIN {
            in_block = true;
        } else if trimmed == SUBRECORD_END {
            in_block = false;
        } else if !in_block {
            out.push_str(line);
            out.push('\n');
        }
    }
    out
}

/// All VVENUE blocks in document order. An unterminated trailing block is
/// dropped.
fn scan_blocks(document: &str) -> Vec<String> {
    let mut blocks = Vec::new();
    let mut current: Option<Vec<&str>> = None;
    for line in document.lines() {
        let trimmed = line.trim_end();
        if trimmed == SUBRECORD_BEGIN {
            current = Some(vec![trimmed]);
        } else if trimmed == SUBRECORD_END {
            if let Some(mut lines) = current.take() {
                lines.push(trimmed);
                blocks.push(lines.join("\n"));
            }
        } else if let Some(lines) = current.as_mut() {
            lines.push(trimmed);
        }
    }
    blocks
}

/// The value of a block's UID property, if any.
fn block_uid(block: &str) -> Option<&str> {
    for line in block.lines() {
        if let Some(rest) = line.strip_prefix("UID") {
            // Parameters may sit between the name and the value.
            if let Some(idx) = rest.find(':') {
                if rest.starts_with(':') || rest.starts_with(';') {
                    return Some(rest[idx + 1..].trim());
                }
            }
        }
    }
    None
}
