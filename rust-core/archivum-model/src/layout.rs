// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//! Where the store keeps things.
//!
//! ```text
//! aip/{id}/aip.json
//! aip/{id}/descriptive/{dm}.json
//! aip/{id}/preservation/{pm}.json                        content
//! aip/{id}/representations/{rep}/representation.json
//! aip/{id}/representations/{rep}/data/{file}
//! aip/{id}/representations/{rep}/preservation/{pm}.json  content
//! aip/{id}/records/preservation/{pm}                     record
//! log/{entry}
//! ```
//!
//! An ingest source uses the same relative layout below its own root, with
//! manifests in place of records and no `records/` subtree.

use archivum_storage::{PathError, StoragePath};

pub const AIP_CONTAINER: &str = "aip";
pub const LOG_CONTAINER: &str = "log";

pub const AIP_MANIFEST: &str = "aip.json";
pub const DESCRIPTIVE: &str = "descriptive";
pub const REPRESENTATIONS: &str = "representations";
pub const REPRESENTATION_MANIFEST: &str = "representation.json";
pub const DATA: &str = "data";
pub const PRESERVATION: &str = "preservation";
const RECORDS: &str = "records";
const JSON_SUFFIX: &str = ".json";

pub fn aips_root() -> Result<StoragePath, PathError> {
    StoragePath::container_path(AIP_CONTAINER)
}

pub fn log_root() -> Result<StoragePath, PathError> {
    StoragePath::container_path(LOG_CONTAINER)
}

pub fn aip_root(aip_id: &str) -> Result<StoragePath, PathError> {
    StoragePath::from_segments([AIP_CONTAINER, aip_id])
}

pub fn aip_record(aip_id: &str) -> Result<StoragePath, PathError> {
    aip_root(aip_id)?.child(AIP_MANIFEST)
}

pub fn descriptive_root(aip_id: &str) -> Result<StoragePath, PathError> {
    aip_root(aip_id)?.child(DESCRIPTIVE)
}

pub fn descriptive_record(aip_id: &str, dm_id: &str) -> Result<StoragePath, PathError> {
    descriptive_root(aip_id)?.child(json_name(dm_id))
}

pub fn representation_root(aip_id: &str, rep_id: &str) -> Result<StoragePath, PathError> {
    aip_root(aip_id)?.join([REPRESENTATIONS, rep_id])
}

pub fn representation_record(aip_id: &str, rep_id: &str) -> Result<StoragePath, PathError> {
    representation_root(aip_id, rep_id)?.child(REPRESENTATION_MANIFEST)
}

pub fn representation_data(aip_id: &str, rep_id: &str) -> Result<StoragePath, PathError> {
    representation_root(aip_id, rep_id)?.child(DATA)
}

pub fn preservation_content(
    aip_id: &str,
    rep_id: Option<&str>,
    pm_id: &str,
) -> Result<StoragePath, PathError> {
    let base = match rep_id {
        Some(rep_id) => representation_root(aip_id, rep_id)?,
        None => aip_root(aip_id)?,
    };
    base.join([PRESERVATION.to_string(), json_name(pm_id)])
}

pub fn preservation_records_root(aip_id: &str) -> Result<StoragePath, PathError> {
    aip_root(aip_id)?.join([RECORDS, PRESERVATION])
}

pub fn preservation_record(aip_id: &str, pm_id: &str) -> Result<StoragePath, PathError> {
    preservation_records_root(aip_id)?.child(pm_id)
}

pub fn json_name(id: &str) -> String {
    format!("{id}{JSON_SUFFIX}")
}

/// `"x.json"` to `"x"`. `None` for anything else, including a bare `".json"`.
pub fn strip_json(name: &str) -> Option<&str> {
    name.strip_suffix(JSON_SUFFIX).filter(|stem| !stem.is_empty())
}
