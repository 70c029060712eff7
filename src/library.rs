//! This module provides `MachineLibrary`, an in-memory collection of user machines that can
//! be exported to and imported from a JSON document, or stored in a file.

use crate::types::{BusyBeaverError, TuringMachine};
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::Path;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::{debug, warn};

/// The version written to export documents.
pub const EXPORT_VERSION: &str = "1.0";

/// A machine stored in the library.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedMachine {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub machine: TuringMachine,
    pub created_at: String,
    pub last_modified: String,
}

/// The document produced by [`MachineLibrary::export_json`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportDocument {
    pub export_date: String,
    pub version: String,
    pub machines: Vec<SavedMachine>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryStats {
    pub total: usize,
    pub total_rules: usize,
    /// Rounded to the nearest whole rule.
    pub average_rules: usize,
    /// Name of the machine with the earliest `created_at`.
    pub oldest: Option<String>,
    /// Name of the machine with the latest `created_at`.
    pub newest: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct MachineLibrary {
    machines: Vec<SavedMachine>,
}

impl MachineLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Saves a machine, replacing any machine with the same name.
    ///
    /// A replaced machine keeps its id and creation time.
    pub fn save(&mut self, machine: TuringMachine) -> SavedMachine {
        let now = timestamp();
        let existing = self.machines.iter().position(|m| m.name == machine.name);

        let (id, created_at) = match existing {
            Some(index) => (
                self.machines[index].id.clone(),
                self.machines[index].created_at.clone(),
            ),
            None => (generate_id(), now.clone()),
        };

        let saved = SavedMachine {
            id,
            name: machine.name.clone(),
            description: machine.description.clone().unwrap_or_default(),
            machine,
            created_at,
            last_modified: now,
        };

        debug!(id = %saved.id, name = %saved.name, replaced = existing.is_some(), "saved machine");

        match existing {
            Some(index) => self.machines[index] = saved.clone(),
            None => self.machines.push(saved.clone()),
        }

        saved
    }

    pub fn get(&self, id: &str) -> Option<&SavedMachine> {
        self.machines.iter().find(|m| m.id == id)
    }

    pub fn get_by_name(&self, name: &str) -> Option<&SavedMachine> {
        self.machines.iter().find(|m| m.name == name)
    }

    /// Deletes the machine with `id`. Returns false if there was none.
    pub fn delete(&mut self, id: &str) -> bool {
        let before = self.machines.len();
        self.machines.retain(|m| m.id != id);
        before != self.machines.len()
    }

    /// Lists the machines in insertion order.
    pub fn list(&self) -> &[SavedMachine] {
        &self.machines
    }

    pub fn len(&self) -> usize {
        self.machines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.machines.is_empty()
    }

    pub fn clear(&mut self) {
        self.machines.clear();
    }

    pub fn stats(&self) -> LibraryStats {
        let total = self.machines.len();
        let total_rules: usize = self.machines.iter().map(|m| m.machine.rules.len()).sum();
        let average_rules = if total == 0 {
            0
        } else {
            (total_rules as f64 / total as f64).round() as usize
        };

        LibraryStats {
            total,
            total_rules,
            average_rules,
            oldest: self
                .machines
                .iter()
                .min_by(|a, b| a.created_at.cmp(&b.created_at))
                .map(|m| m.name.clone()),
            newest: self
                .machines
                .iter()
                .max_by(|a, b| a.created_at.cmp(&b.created_at))
                .map(|m| m.name.clone()),
        }
    }

    /// Serializes every machine into a pretty-printed export document.
    pub fn export_json(&self) -> Result<String, BusyBeaverError> {
        let document = ExportDocument {
            export_date: timestamp(),
            version: EXPORT_VERSION.to_string(),
            machines: self.machines.clone(),
        };

        Ok(serde_json::to_string_pretty(&document)?)
    }

    /// Imports the machines of an export document.
    ///
    /// Each entry is saved under a fresh name if its name is already taken: `name (1)`,
    /// `name (2)`, and so on. Entries that cannot be read are skipped.
    ///
    /// # Returns
    ///
    /// * `Ok(usize)` with the number of imported machines.
    /// * `Err(BusyBeaverError)` if the document is not JSON or has no `machines` array.
    pub fn import_json(&mut self, json: &str) -> Result<usize, BusyBeaverError> {
        let document: Value = serde_json::from_str(json)?;

        let entries = document
            .get("machines")
            .and_then(Value::as_array)
            .ok_or_else(|| {
                BusyBeaverError::Validation(
                    "Invalid library document: missing \"machines\" array".to_string(),
                )
            })?;

        let mut imported = 0;

        for (index, entry) in entries.iter().enumerate() {
            match machine_from_entry(entry) {
                Ok(mut machine) => {
                    machine.name = self.unique_name(&machine.name);
                    self.save(machine);
                    imported += 1;
                }
                Err(e) => warn!(index, error = %e, "skipping library entry"),
            }
        }

        debug!(imported, total = entries.len(), "imported library document");
        Ok(imported)
    }

    fn unique_name(&self, name: &str) -> String {
        let mut candidate = name.to_string();
        let mut counter = 1;

        while self.get_by_name(&candidate).is_some() {
            candidate = format!("{name} ({counter})");
            counter += 1;
        }

        candidate
    }

    /// Reads a library from an export document on disk. A missing file is an empty library.
    pub fn load_from(path: &Path) -> Result<Self, BusyBeaverError> {
        let mut library = Self::new();

        if !path.exists() {
            return Ok(library);
        }

        let content = fs::read_to_string(path).map_err(|e| {
            BusyBeaverError::File(format!("Failed to read file {}: {}", path.display(), e))
        })?;

        let document: ExportDocument = serde_json::from_str(&content)?;
        library.machines = document.machines;

        Ok(library)
    }

    /// Writes the library to disk as an export document.
    pub fn store_to(&self, path: &Path) -> Result<(), BusyBeaverError> {
        fs::write(path, self.export_json()?).map_err(|e| {
            BusyBeaverError::File(format!("Failed to write file {}: {}", path.display(), e))
        })
    }
}

/// Builds a machine from an export entry, taking the name and description from the entry
/// when the nested machine record lacks them.
fn machine_from_entry(entry: &Value) -> Result<TuringMachine, BusyBeaverError> {
    let mut record = entry
        .get("machine")
        .and_then(Value::as_object)
        .cloned()
        .ok_or_else(|| BusyBeaverError::Validation("entry has no machine record".to_string()))?;

    for key in ["name", "description"] {
        if record.get(key).map_or(true, is_blank) {
            if let Some(value) = entry.get(key).filter(|v| !is_blank(v)) {
                record.insert(key.to_string(), value.clone());
            }
        }
    }

    Ok(serde_json::from_value(Value::Object(record))?)
}

fn is_blank(value: &Value) -> bool {
    value.is_null() || value.as_str() == Some("")
}

/// The current UTC time in RFC 3339 with whole seconds, so timestamps sort as text.
fn timestamp() -> String {
    let now = OffsetDateTime::now_utc();
    now.replace_nanosecond(0)
        .unwrap_or(now)
        .format(&Rfc3339)
        .unwrap_or_default()
}

fn generate_id() -> String {
    let millis = OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000;
    let salt: u32 = rand::thread_rng().gen();
    format!("{millis:x}{salt:08x}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Direction, Transition};
    use tempfile::tempdir;

    fn machine(name: &str, rules: usize) -> TuringMachine {
        let rules = (0..rules)
            .map(|i| Transition::new(format!("S{i}"), '0', '1', Direction::Right, "halt"))
            .collect();
        TuringMachine::new(name, rules, "S0")
    }

    #[test]
    fn test_save_and_get() {
        let mut library = MachineLibrary::new();

        let saved = library.save(machine("First", 2).with_description("two rules"));

        assert_eq!(library.len(), 1);
        assert_eq!(saved.description, "two rules");
        assert_eq!(library.get(&saved.id), Some(&saved));
        assert_eq!(library.get_by_name("First").map(|m| &m.id), Some(&saved.id));
        assert!(saved.created_at.ends_with('Z'));
    }

    #[test]
    fn test_save_same_name_replaces() {
        let mut library = MachineLibrary::new();

        let first = library.save(machine("Same", 1));
        let second = library.save(machine("Same", 3));

        assert_eq!(library.len(), 1);
        assert_eq!(first.id, second.id);
        assert_eq!(first.created_at, second.created_at);
        assert_eq!(library.list()[0].machine.rules.len(), 3);
    }

    #[test]
    fn test_delete_and_clear() {
        let mut library = MachineLibrary::new();
        let a = library.save(machine("A", 1));
        library.save(machine("B", 1));

        assert!(library.delete(&a.id));
        assert!(!library.delete(&a.id));
        assert_eq!(library.len(), 1);

        library.clear();
        assert!(library.is_empty());
    }

    #[test]
    fn test_stats() {
        let mut library = MachineLibrary::new();
        assert_eq!(library.stats().average_rules, 0);
        assert_eq!(library.stats().oldest, None);

        library.save(machine("Small", 1));
        library.save(machine("Large", 4));

        let stats = library.stats();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.total_rules, 5);
        assert_eq!(stats.average_rules, 3);
        assert!(stats.oldest.is_some());
        assert!(stats.newest.is_some());
    }

    #[test]
    fn test_export_document_shape() {
        let mut library = MachineLibrary::new();
        library.save(machine("Exported", 1));

        let value: Value = serde_json::from_str(&library.export_json().unwrap()).unwrap();

        assert_eq!(value["version"], "1.0");
        assert!(value["exportDate"].is_string());
        let entry = &value["machines"][0];
        assert_eq!(entry["name"], "Exported");
        assert_eq!(entry["description"], "");
        assert!(entry["createdAt"].is_string());
        assert!(entry["lastModified"].is_string());
        assert_eq!(entry["machine"]["haltStates"], serde_json::json!(["halt"]));
    }

    #[test]
    fn test_import_renames_clashes() {
        let mut source = MachineLibrary::new();
        source.save(machine("Clash", 1));
        source.save(machine("Fresh", 2));
        let document = source.export_json().unwrap();

        let mut target = MachineLibrary::new();
        target.save(machine("Clash", 5));
        target.save(machine("Clash (1)", 5));

        assert_eq!(target.import_json(&document).unwrap(), 2);

        let names: Vec<&str> = target.list().iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["Clash", "Clash (1)", "Clash (2)", "Fresh"]);
        assert_eq!(target.get_by_name("Clash").unwrap().machine.rules.len(), 5);
    }

    #[test]
    fn test_import_skips_invalid_entries_and_fills_defaults() {
        let document = r#"{
            "machines": [
                { "name": "Outer name", "description": "outer", "machine": {
                    "rules": [{ "currentState": "A", "readSymbol": 0, "writeSymbol": 1, "direction": "R", "nextState": "halt" }]
                } },
                { "name": "Broken", "machine": { "name": "Broken", "rules": "nope" } },
                { "name": "No machine" }
            ]
        }"#;
        let mut library = MachineLibrary::new();

        assert_eq!(library.import_json(document).unwrap(), 1);

        let imported = library.get_by_name("Outer name").unwrap();
        assert_eq!(imported.description, "outer");
        assert_eq!(imported.machine.initial_state.as_str(), "A");
        assert!(imported.machine.is_halt_state(&"halt".into()));
    }

    #[test]
    fn test_import_rejects_bad_documents() {
        let mut library = MachineLibrary::new();

        assert!(matches!(
            library.import_json("not json"),
            Err(BusyBeaverError::Json(_))
        ));
        assert!(matches!(
            library.import_json(r#"{ "machines": 1 }"#),
            Err(BusyBeaverError::Validation(_))
        ));
    }

    #[test]
    fn test_store_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("library.json");

        assert!(MachineLibrary::load_from(&path).unwrap().is_empty());

        let mut library = MachineLibrary::new();
        let saved = library.save(machine("Stored", 2));
        library.store_to(&path).unwrap();

        let loaded = MachineLibrary::load_from(&path).unwrap();
        assert_eq!(loaded.list(), &[saved]);
    }
}
