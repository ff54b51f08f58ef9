use anyhow::{bail, Result};
use feedsquash::dedup::{match_duplicates, MatchSpec, Matchable};
use feedsquash::squash::{squash, RecordStore, SquashRequest, StoredRecord};
use feedsquash::types::{RecordId, RecordKind};
use pretty_assertions::assert_eq;

#[derive(Debug, Clone, PartialEq)]
struct Venue {
    id: RecordId,
    title: String,
}

#[derive(Debug, Clone, PartialEq)]
struct Event {
    id: RecordId,
    title: String,
    venue_id: Option<RecordId>,
}

/// In-memory stand-in for the persistence collaborator: venues plus events
/// holding a foreign reference to a venue.
#[derive(Default)]
struct MemoryStore {
    venues: Vec<Venue>,
    events: Vec<Event>,
}

impl RecordStore for MemoryStore {
    fn find_by_id(&self, kind: RecordKind, id: RecordId) -> Option<StoredRecord> {
        match kind {
            RecordKind::Venue => self
                .venues
                .iter()
                .find(|v| v.id == id)
                .map(|v| StoredRecord { id: v.id, title: v.title.clone() }),
            RecordKind::Event => self
                .events
                .iter()
                .find(|e| e.id == id)
                .map(|e| StoredRecord { id: e.id, title: e.title.clone() }),
        }
    }

    fn rewrite_references(
        &mut self,
        kind: RecordKind,
        old: RecordId,
        new: RecordId,
    ) -> Result<usize> {
        match kind {
            RecordKind::Venue => {
                let mut count = 0;
                for event in self.events.iter_mut().filter(|e| e.venue_id == Some(old)) {
                    event.venue_id = Some(new);
                    count += 1;
                }
                Ok(count)
            }
            // Nothing references events in this model.
            RecordKind::Event => Ok(0),
        }
    }

    fn delete(&mut self, kind: RecordKind, id: RecordId) -> Result<()> {
        match kind {
            RecordKind::Venue => {
                if !self.venues.iter().any(|v| v.id == id) {
                    bail!("no venue {}", id);
                }
                self.venues.retain(|v| v.id != id);
            }
            RecordKind::Event => {
                if !self.events.iter().any(|e| e.id == id) {
                    bail!("no event {}", id);
                }
                self.events.retain(|e| e.id != id);
            }
        }
        Ok(())
    }
}

fn store_with_duplicate_venues() -> MemoryStore {
    MemoryStore {
        venues: vec![
            Venue { id: 1, title: "Crystal Ballroom".to_string() },
            Venue { id: 2, title: "Crystal Ballroom".to_string() },
            Venue { id: 3, title: "Crystal Ballroom".to_string() },
        ],
        events: vec![
            Event { id: 10, title: "Concert".to_string(), venue_id: Some(1) },
            Event { id: 11, title: "Matinee".to_string(), venue_id: Some(2) },
            Event { id: 12, title: "Late Show".to_string(), venue_id: Some(3) },
        ],
    }
}

#[test]
fn test_squash_repoints_dependents_and_removes_duplicates() {
    let mut store = store_with_duplicate_venues();
    let request = SquashRequest { kind: RecordKind::Venue, master: 1, duplicates: vec![2, 3] };
    let result = squash(&mut store, &request).unwrap();

    let squashed_ids: Vec<RecordId> = result.squashed.iter().map(|r| r.id).collect();
    assert_eq!(squashed_ids, vec![2, 3]);
    assert_eq!(result.squashed[0].title, "Crystal Ballroom");

    // Every dependent now points at the master; duplicates are gone.
    assert!(store.events.iter().all(|e| e.venue_id == Some(1)));
    assert_eq!(store.venues.len(), 1);
    assert_eq!(store.venues[0].id, 1);
}

#[test]
fn test_squash_rejects_master_listed_as_duplicate() {
    let mut store = store_with_duplicate_venues();
    let request = SquashRequest { kind: RecordKind::Venue, master: 1, duplicates: vec![1] };
    assert!(squash(&mut store, &request).is_err());
    assert_eq!(store.venues.len(), 3);
    assert!(store.events.iter().zip(10..).all(|(e, id)| e.id == id));
}

#[test]
fn test_squash_rejects_empty_duplicate_set() {
    let mut store = store_with_duplicate_venues();
    let request = SquashRequest { kind: RecordKind::Venue, master: 1, duplicates: vec![] };
    assert!(squash(&mut store, &request).is_err());
    assert_eq!(store.venues.len(), 3);
}

#[test]
fn test_squash_skips_vanished_duplicates() {
    let mut store = store_with_duplicate_venues();
    let request =
        SquashRequest { kind: RecordKind::Venue, master: 1, duplicates: vec![42, 2] };
    let result = squash(&mut store, &request).unwrap();
    assert_eq!(result.squashed.len(), 1);
    assert_eq!(result.squashed[0].id, 2);
    assert_eq!(store.venues.len(), 2);
}

impl Matchable for Venue {
    fn id(&self) -> RecordId {
        self.id
    }

    fn comparable_fields() -> &'static [&'static str] {
        &["title"]
    }

    fn field_value(&self, field: &str) -> Option<String> {
        match field {
            "title" => Some(self.title.clone()),
            _ => None,
        }
    }
}

#[test]
fn test_detect_then_squash_pipeline() {
    let mut store = store_with_duplicate_venues();

    let groups = match_duplicates(&store.venues, &MatchSpec::ExactAny);
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].ids, vec![1, 2, 3]);

    // Operator picks the first record as master.
    let (master, duplicates) = (groups[0].ids[0], groups[0].ids[1..].to_vec());
    let result = squash(
        &mut store,
        &SquashRequest { kind: RecordKind::Venue, master, duplicates },
    )
    .unwrap();

    assert_eq!(result.squashed.len(), 2);
    assert_eq!(store.venues.len(), 1);
    assert!(store.events.iter().all(|e| e.venue_id == Some(master)));
}
