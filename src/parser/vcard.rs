//! Decoding of an embedded venue sub-record as a contact card.
//
// VVENUE blocks are structurally compatible with vCard syntax, so decoding
// is a marker rewrite followed by a single-card vCard parse. Decoding is
// tolerant by contract: any failure degrades to a bare-title location built
// from the event's own location text, or to nothing when that text is blank.

use crate::parser::venue::{SUBRECORD_BEGIN, SUBRECORD_END};
use crate::types::AbstractLocation;
use anyhow::{anyhow, bail, Result};
use log::debug;
use std::io::BufReader;

const CARD_BEGIN: &str = "BEGIN:VCARD";
const CARD_END: &str = "END:VCARD";

/// Decode a venue sub-record block into a location, falling back to a
/// title-only stub (or `None` when `fallback_title` is blank) on any failure.
pub fn decode(block: Option<&str>, fallback_title: &str) -> Option<AbstractLocation> {
    if let Some(block) = block {
        match decode_card(block) {
            Ok(location) if !location.is_empty() => return Some(location),
            Ok(_) => debug!("Venue sub-record decoded to an empty location, using fallback"),
            Err(e) => debug!("Venue sub-record decode failed ({}), using fallback", e),
        }
    }

    let title = fallback_title.trim();
    if title.is_empty() {
        None
    } else {
        Some(AbstractLocation::with_title(title))
    }
}

fn decode_card(block: &str) -> Result<AbstractLocation> {
    let card_text =
        block.replace(SUBRECORD_BEGIN, CARD_BEGIN).replace(SUBRECORD_END, CARD_END);

    let mut cards = Vec::new();
    for parsed in ical::VcardParser::new(BufReader::new(card_text.as_bytes())) {
        cards.push(parsed.map_err(|e| anyhow!("invalid contact card: {}", e))?);
    }
    if cards.len() != 1 {
        bail!("expected exactly one contact card, found {}", cards.len());
    }
    let card = cards.remove(0);

    let mut location = AbstractLocation::default();
    for property in &card.properties {
        let value = match &property.value {
            Some(v) if !v.trim().is_empty() => v.trim().to_string(),
            _ => continue,
        };
        match property.name.to_ascii_uppercase().as_str() {
            "NAME" => location.title = Some(value),
            "ADDRESS" => location.street_address = Some(value),
            "CITY" => location.locality = Some(value),
            "REGION" => location.region = Some(value),
            "POSTALCODE" => location.postal_code = Some(value),
            "COUNTRY" => location.country = Some(value),
            "GEO" => {
                let (lat, lon) = parse_geo(&value)?;
                location.latitude = Some(lat);
                location.longitude = Some(lon);
            }
            _ => {}
        }
    }
    Ok(location)
}

/// Split a `lat;lon` pair; both components must parse as floating point.
fn parse_geo(value: &str) -> Result<(f64, f64)> {
    let mut parts = value.splitn(2, ';');
    let lat = parts.next().unwrap_or_default().trim();
    let lon = parts.next().unwrap_or_default().trim();
    let lat: f64 = lat.parse().map_err(|_| anyhow!("bad latitude '{}'", lat))?;
    let lon: f64 = lon.parse().map_err(|_| anyhow!("bad longitude '{}'", lon))?;
    Ok((lat, lon))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const VENUE: &str = "BEGIN:VVENUE\n\
UID:V-100\n\
NAME:Crystal Ballroom\n\
ADDRESS:1332 W Burnside St\n\
CITY:Portland\n\
REGION:OR\n\
POSTALCODE:97209\n\
COUNTRY:United States\n\
GEO:45.522;-122.685\n\
END:VVENUE";

    #[test]
    fn test_decode_full_venue() {
        let loc = decode(Some(VENUE), "").unwrap();
        assert_eq!(loc.title.as_deref(), Some("Crystal Ballroom"));
        assert_eq!(loc.street_address.as_deref(), Some("1332 W Burnside St"));
        assert_eq!(loc.locality.as_deref(), Some("Portland"));
        assert_eq!(loc.region.as_deref(), Some("OR"));
        assert_eq!(loc.postal_code.as_deref(), Some("97209"));
        assert_eq!(loc.country.as_deref(), Some("United States"));
        assert_eq!(loc.latitude, Some(45.522));
        assert_eq!(loc.longitude, Some(-122.685));
    }

    #[test]
    fn test_malformed_block_falls_back_to_title() {
        let loc = decode(Some("not a venue block at all"), "Main Hall").unwrap();
        assert_eq!(loc.title.as_deref(), Some("Main Hall"));
        assert!(loc.street_address.is_none());
        assert!(loc.locality.is_none());
        assert!(loc.region.is_none());
        assert!(loc.postal_code.is_none());
        assert!(loc.country.is_none());
        assert!(loc.latitude.is_none());
        assert!(loc.longitude.is_none());
    }

    #[test]
    fn test_bad_geo_voids_the_decode() {
        let block = VENUE.replace("GEO:45.522;-122.685", "GEO:north;west");
        let loc = decode(Some(&block), "Fallback Hall").unwrap();
        assert_eq!(loc.title.as_deref(), Some("Fallback Hall"));
        assert!(loc.latitude.is_none());
    }

    #[test]
    fn test_blank_fallback_yields_none() {
        assert_eq!(decode(None, ""), None);
        assert_eq!(decode(None, "   "), None);
        assert_eq!(decode(Some("garbage"), ""), None);
    }

    #[test]
    fn test_absent_block_uses_fallback() {
        let loc = decode(None, "Street Corner").unwrap();
        assert_eq!(loc.title.as_deref(), Some("Street Corner"));
    }
}
