//! This module provides the `MachineLoader` struct, responsible for loading machines from files
//! and strings. Two formats are understood: the JSON exchange record (`.json`) and the
//! textual rule format (`.bb`).

use crate::parser::parse;
use crate::types::{BusyBeaverError, TuringMachine};
use std::fs;
use std::path::{Path, PathBuf};

/// A machine file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// The textual rule format.
    Text,
    /// The JSON exchange record.
    Json,
}

impl Format {
    /// Picks the format from a file extension: `.json` or `.bb`.
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()? {
            "json" => Some(Format::Json),
            "bb" => Some(Format::Text),
            _ => None,
        }
    }

    /// Guesses the format of in-memory content: JSON records start with `{`.
    pub fn detect(content: &str) -> Self {
        if content.trim_start().starts_with('{') {
            Format::Json
        } else {
            Format::Text
        }
    }
}

/// `MachineLoader` is a utility struct for loading machines.
pub struct MachineLoader;

impl MachineLoader {
    /// Loads a single machine from the specified file path.
    ///
    /// # Arguments
    ///
    /// * `path` - A `.json` or `.bb` file.
    ///
    /// # Returns
    ///
    /// * `Ok(TuringMachine)` if the file is read and parsed successfully.
    /// * `Err(BusyBeaverError::File)` if the file cannot be read or has an unknown extension.
    /// * `Err(BusyBeaverError::Parse)` or `Err(BusyBeaverError::Json)` if the content is invalid.
    pub fn load_machine(path: &Path) -> Result<TuringMachine, BusyBeaverError> {
        let format = Format::from_path(path).ok_or_else(|| {
            BusyBeaverError::File(format!(
                "Unsupported file {}: expected a .json or .bb extension",
                path.display()
            ))
        })?;

        let content = fs::read_to_string(path).map_err(|e| {
            BusyBeaverError::File(format!("Failed to read file {}: {}", path.display(), e))
        })?;

        Self::load_machine_as(&content, format)
    }

    /// Loads a single machine from string content, detecting its format.
    pub fn load_machine_from_str(content: &str) -> Result<TuringMachine, BusyBeaverError> {
        Self::load_machine_as(content, Format::detect(content))
    }

    /// Loads a single machine from string content in a known format.
    pub fn load_machine_as(
        content: &str,
        format: Format,
    ) -> Result<TuringMachine, BusyBeaverError> {
        match format {
            Format::Text => Ok(parse(content)?),
            Format::Json => TuringMachine::from_json(content),
        }
    }

    /// Loads every `.json` and `.bb` file in a directory.
    ///
    /// Directories and other files are skipped. Each loaded file yields its own result, so a
    /// single bad file does not hide the others.
    pub fn load_machines(
        directory: &Path,
    ) -> Vec<Result<(PathBuf, TuringMachine), BusyBeaverError>> {
        if !directory.exists() {
            return vec![Err(BusyBeaverError::File(format!(
                "Directory {} does not exist",
                directory.display()
            )))];
        }

        let entries = match fs::read_dir(directory) {
            Ok(entries) => entries,
            Err(e) => {
                return vec![Err(BusyBeaverError::File(format!(
                    "Failed to read directory {}: {}",
                    directory.display(),
                    e
                )))]
            }
        };

        let mut results: Vec<_> = entries
            .filter_map(|entry| {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(e) => {
                        return Some(Err(BusyBeaverError::File(format!(
                            "Failed to read directory entry: {}",
                            e
                        ))))
                    }
                };

                let path = entry.path();

                if path.is_dir() || Format::from_path(&path).is_none() {
                    return None;
                }

                match Self::load_machine(&path) {
                    Ok(machine) => Some(Ok((path, machine))),
                    Err(e) => Some(Err(BusyBeaverError::File(format!(
                        "Failed to load machine from {}: {}",
                        path.display(),
                        e
                    )))),
                }
            })
            .collect();

        // Directory order is platform dependent.
        results.sort_by(|a, b| match (a, b) {
            (Ok((a, _)), Ok((b, _))) => a.cmp(b),
            (Ok(_), Err(_)) => std::cmp::Ordering::Less,
            (Err(_), Ok(_)) => std::cmp::Ordering::Greater,
            (Err(a), Err(b)) => a.to_string().cmp(&b.to_string()),
        });

        results
    }
}
