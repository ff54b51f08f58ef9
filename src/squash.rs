//! Squashing duplicate records onto a chosen master.
//
// A squash repoints every reference held against each duplicate to the
// master, then deletes the duplicate. The engine owns no state and performs
// no locking: callers must serialize squash requests whose master/duplicate
// sets overlap. Validation happens up front, before any side effect.

use crate::types::{RecordId, RecordKind};
use anyhow::{anyhow, Result};
use log::{debug, info};
use serde::{Deserialize, Serialize};

/// Storage collaborator the engine drives. Reference rewriting and deletion
/// are its only side-effect channels.
pub trait RecordStore {
    /// Resolve an identifier to a stored record, or `None` when absent.
    fn find_by_id(&self, kind: RecordKind, id: RecordId) -> Option<StoredRecord>;

    /// Repoint every record referencing `old` to reference `new` instead,
    /// returning how many were rewritten.
    fn rewrite_references(
        &mut self,
        kind: RecordKind,
        old: RecordId,
        new: RecordId,
    ) -> Result<usize>;

    /// Remove a record.
    fn delete(&mut self, kind: RecordKind, id: RecordId) -> Result<()>;
}

/// The slice of a stored record the engine needs: identity plus a display
/// title for reporting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub id: RecordId,
    pub title: String,
}

/// An operator-selected master plus the duplicates to squash into it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SquashRequest {
    pub kind: RecordKind,
    pub master: RecordId,
    pub duplicates: Vec<RecordId>,
}

/// A duplicate that was actually removed, reported in processing order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SquashedRecord {
    pub id: RecordId,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SquashResult {
    pub squashed: Vec<SquashedRecord>,
}

/// Rejected squash preconditions. None of these leave any side effect.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum SquashError {
    #[error("Duplicate set is empty")]
    EmptyDuplicates,
    #[error("Master record {0} does not exist")]
    MasterNotFound(RecordId),
    #[error("Master record {0} is listed among the duplicates")]
    MasterAmongDuplicates(RecordId),
}

/// Squash `request.duplicates` into `request.master`.
///
/// Duplicates are processed in the order supplied; one that no longer
/// resolves is skipped (and absent from the result) rather than failing the
/// batch. The master itself is never rewritten or deleted. Store failures
/// propagate and abort the batch; duplicates squashed before the failure
/// stand. Errors from validation downcast to [`SquashError`].
pub fn squash(store: &mut dyn RecordStore, request: &SquashRequest) -> Result<SquashResult> {
    if request.duplicates.is_empty() {
        return Err(anyhow!(SquashError::EmptyDuplicates));
    }
    if request.duplicates.contains(&request.master) {
        return Err(anyhow!(SquashError::MasterAmongDuplicates(request.master)));
    }
    let master = store
        .find_by_id(request.kind, request.master)
        .ok_or_else(|| anyhow!(SquashError::MasterNotFound(request.master)))?;

    info!(
        "Squashing {} duplicate {}(s) into '{}' ({})",
        request.duplicates.len(),
        request.kind,
        master.title,
        master.id
    );

    let mut result = SquashResult::default();
    for &duplicate_id in &request.duplicates {
        let duplicate = match store.find_by_id(request.kind, duplicate_id) {
            Some(record) => record,
            None => {
                info!("Duplicate {} {} not found, skipping", request.kind, duplicate_id);
                continue;
            }
        };
        let repointed = store.rewrite_references(request.kind, duplicate_id, master.id)?;
        debug!(
            "Repointed {} reference(s) from {} {} to {}",
            repointed, request.kind, duplicate_id, master.id
        );
        store.delete(request.kind, duplicate_id)?;
        result.squashed.push(SquashedRecord { id: duplicate.id, title: duplicate.title });
    }
    Ok(result)
}
