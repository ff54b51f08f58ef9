//! Duplicate detection over stored records of one kind.
//
// Repeated imports from overlapping sources pile up near-duplicate records.
// This module groups a collection into duplicate sets under a selectable
// matching strategy; the operator then picks a master per group and hands the
// rest to the squash engine.

use crate::types::RecordId;
use log::debug;
use std::collections::BTreeMap;

/// Matching strategy, a closed set of variants rather than anything
/// reflective: the whole collection as one group, equality across every
/// comparable field, or equality across an explicit field list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchSpec {
    ExactAll,
    ExactAny,
    Fields(Vec<String>),
}

impl MatchSpec {
    /// Build a spec from operator-supplied tokens: the literal `all`, the
    /// literal `any`, or one or more field names.
    pub fn from_tokens<S: AsRef<str>>(tokens: &[S]) -> MatchSpec {
        match tokens {
            [single] if single.as_ref() == "all" => MatchSpec::ExactAll,
            [single] if single.as_ref() == "any" => MatchSpec::ExactAny,
            _ => MatchSpec::Fields(tokens.iter().map(|t| t.as_ref().to_string()).collect()),
        }
    }
}

/// A record that can take part in duplicate matching. Field values are
/// compared by exact codepoint equality; no case folding or whitespace
/// normalization is applied.
pub trait Matchable {
    fn id(&self) -> RecordId;

    /// Every comparable field name, in the fixed order grouping keys are
    /// built in.
    fn comparable_fields() -> &'static [&'static str];

    /// The comparison value for one field; `None` when unset or when the
    /// field name is not one this record kind exposes.
    fn field_value(&self, field: &str) -> Option<String>;
}

/// One set of records sharing a matching key. Transient output of a
/// detection pass; never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct DuplicateGroup {
    pub key: Vec<Option<String>>,
    pub ids: Vec<RecordId>,
}

/// Group `records` into duplicate sets under `spec`. Only groups of two or
/// more records are returned; singletons are not duplicates. Output order is
/// deterministic (sorted by key), so repeated runs over the same input agree.
pub fn match_duplicates<R: Matchable>(records: &[R], spec: &MatchSpec) -> Vec<DuplicateGroup> {
    let fields: Vec<&str> = match spec {
        MatchSpec::ExactAll => {
            if records.len() < 2 {
                return Vec::new();
            }
            return vec![DuplicateGroup {
                key: Vec::new(),
                ids: records.iter().map(Matchable::id).collect(),
            }];
        }
        MatchSpec::ExactAny => R::comparable_fields().to_vec(),
        MatchSpec::Fields(names) => names.iter().map(String::as_str).collect(),
    };

    let mut by_key: BTreeMap<Vec<Option<String>>, Vec<RecordId>> = BTreeMap::new();
    for record in records {
        let key: Vec<Option<String>> =
            fields.iter().map(|field| record.field_value(field)).collect();
        by_key.entry(key).or_default().push(record.id());
    }

    let groups: Vec<DuplicateGroup> = by_key
        .into_iter()
        .filter(|(_, ids)| ids.len() >= 2)
        .map(|(key, ids)| DuplicateGroup { key, ids })
        .collect();
    debug!("Matched {} duplicate group(s) across {} record(s)", groups.len(), records.len());
    groups
}
