//! Node binding. Options and report cross the boundary as JSON.

use napi_derive::napi;

use crate::{migrate_project, MigrateOptions};

#[napi]
pub fn migrate_project_native(options_json: String) -> napi::Result<String> {
    let options = MigrateOptions::from_json(&options_json)
        .map_err(|e| napi::Error::from_reason(e.to_string()))?;
    let report = migrate_project(&options).map_err(|e| napi::Error::from_reason(e.to_string()))?;
    report
        .to_json()
        .map_err(|e| napi::Error::from_reason(e.to_string()))
}
