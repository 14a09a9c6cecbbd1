//! Durable record of processed artifacts.
//!
//! Three CSV tables live in the output directory: the status table (one row
//! per artifact) and two library tables (one row per artifact/library
//! pair). The status table's keys are the authoritative set of processed
//! artifacts. Everything is held in memory and every flush rewrites all
//! three files as a complete snapshot.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use wheelfix_schema::{NO_LIBRARIES_SENTINEL, Outcome, StepResult, StepStatus};

use crate::paths::{EXTERNAL_LIBRARIES_TABLE, LIBRARIES_TABLE, STATUS_TABLE};

const STATUS_HEADER: [&str; 5] = [
    "wheel_path",
    "auditwheel_status",
    "auditwheel_message",
    "pip_install_status",
    "pip_install_message",
];

const LIBRARY_HEADER: [&str; 2] = ["wheel_path", "native_library"];

#[derive(Error, Debug)]
pub enum CheckpointError {
    #[error("Failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Malformed checkpoint table {path}: {source}")]
    Csv { path: PathBuf, source: csv::Error },

    #[error("Checkpoint writer stopped: {0}")]
    Writer(#[from] tokio::task::JoinError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct StatusRow {
    wheel_path: String,
    auditwheel_status: StepStatus,
    auditwheel_message: String,
    pip_install_status: StepStatus,
    pip_install_message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct LibraryRow {
    wheel_path: String,
    native_library: String,
}

#[derive(Debug)]
pub struct Checkpoint {
    status_path: PathBuf,
    libraries_path: PathBuf,
    external_path: PathBuf,
    outcomes: BTreeMap<String, Outcome>,
    external: BTreeMap<String, Vec<String>>,
}

impl Checkpoint {
    /// Load the tables from `dir`. Missing files are empty tables.
    ///
    /// Library rows whose artifact has no status row are dropped: the status
    /// table decides what has been processed.
    ///
    /// # Errors
    ///
    /// Returns an error if a table exists but cannot be read or parsed.
    pub fn load(dir: &Path) -> Result<Self, CheckpointError> {
        let status_path = dir.join(STATUS_TABLE);
        let libraries_path = dir.join(LIBRARIES_TABLE);
        let external_path = dir.join(EXTERNAL_LIBRARIES_TABLE);

        let mut outcomes: BTreeMap<String, Outcome> = read_rows::<StatusRow>(&status_path)?
            .into_iter()
            .map(|row| {
                let outcome = Outcome {
                    wheel: row.wheel_path.clone(),
                    repair: StepResult {
                        status: row.auditwheel_status,
                        message: row.auditwheel_message,
                    },
                    install: StepResult {
                        status: row.pip_install_status,
                        message: row.pip_install_message,
                    },
                    native_libraries: Vec::new(),
                };
                (row.wheel_path, outcome)
            })
            .collect();

        for (wheel, libs) in read_libraries(&libraries_path)? {
            if let Some(outcome) = outcomes.get_mut(&wheel) {
                outcome.native_libraries = libs;
            }
        }

        let external = read_libraries(&external_path)?
            .into_iter()
            .filter(|(wheel, _)| outcomes.contains_key(wheel))
            .collect();

        tracing::debug!(entries = outcomes.len(), dir = %dir.display(), "loaded checkpoint");

        Ok(Self {
            status_path,
            libraries_path,
            external_path,
            outcomes,
            external,
        })
    }

    /// Insert or replace the record for one artifact.
    pub fn merge(&mut self, outcome: Outcome) {
        self.external
            .insert(outcome.wheel.clone(), outcome.external_libraries());
        self.outcomes.insert(outcome.wheel.clone(), outcome);
    }

    /// Rewrite all three tables from memory.
    ///
    /// Rows are rendered on the calling task; the file writes run on the
    /// blocking pool. Each table is written to a sibling temp file and
    /// renamed into place. The status table goes last, so a crash mid-flush
    /// never leaves a processed key without its library rows.
    ///
    /// # Errors
    ///
    /// Returns an error if a table cannot be written or renamed.
    pub async fn flush(&self) -> Result<(), CheckpointError> {
        let snapshot = self.snapshot()?;
        tokio::task::spawn_blocking(move || snapshot.write()).await?
    }

    fn snapshot(&self) -> Result<Snapshot, CheckpointError> {
        let libraries = self
            .outcomes
            .iter()
            .map(|(wheel, o)| (wheel, o.native_libraries.as_slice()));
        let libraries = render_table(
            &self.libraries_path,
            &LIBRARY_HEADER,
            library_rows(libraries),
        )?;

        let external = self
            .external
            .iter()
            .map(|(wheel, libs)| (wheel, libs.as_slice()));
        let external =
            render_table(&self.external_path, &LIBRARY_HEADER, library_rows(external))?;

        let status = self.outcomes.values().map(|o| StatusRow {
            wheel_path: o.wheel.clone(),
            auditwheel_status: o.repair.status,
            auditwheel_message: o.repair.message.clone(),
            pip_install_status: o.install.status,
            pip_install_message: o.install.message.clone(),
        });
        let status = render_table(&self.status_path, &STATUS_HEADER, status)?;

        Ok(Snapshot(vec![
            (self.libraries_path.clone(), libraries),
            (self.external_path.clone(), external),
            (self.status_path.clone(), status),
        ]))
    }

    pub fn contains(&self, wheel: &str) -> bool {
        self.outcomes.contains_key(wheel)
    }

    pub fn get(&self, wheel: &str) -> Option<&Outcome> {
        self.outcomes.get(wheel)
    }

    /// Recorded outcomes in filename order.
    pub fn outcomes(&self) -> impl Iterator<Item = &Outcome> {
        self.outcomes.values()
    }

    /// External libraries recorded for `wheel`.
    pub fn external_libraries(&self, wheel: &str) -> Option<&[String]> {
        self.external.get(wheel).map(Vec::as_slice)
    }

    /// Filenames whose repair failed; candidates for a source rebuild.
    pub fn failed(&self) -> impl Iterator<Item = &str> {
        self.outcomes
            .values()
            .filter(|o| o.repair.status == StepStatus::Failed)
            .map(|o| o.wheel.as_str())
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }
}

fn library_rows<'a>(
    tables: impl Iterator<Item = (&'a String, &'a [String])> + 'a,
) -> impl Iterator<Item = LibraryRow> + 'a {
    tables.flat_map(|(wheel, libs)| {
        let libs: Vec<String> = if libs.is_empty() {
            vec![NO_LIBRARIES_SENTINEL.to_string()]
        } else {
            libs.to_vec()
        };
        libs.into_iter().map(move |native_library| LibraryRow {
            wheel_path: wheel.clone(),
            native_library,
        })
    })
}

fn read_rows<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Vec<T>, CheckpointError> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let csv_err = |source| CheckpointError::Csv {
        path: path.to_path_buf(),
        source,
    };

    csv::Reader::from_path(path)
        .map_err(csv_err)?
        .deserialize()
        .collect::<Result<Vec<T>, _>>()
        .map_err(csv_err)
}

/// Library table grouped by artifact, with the sentinel removed.
fn read_libraries(path: &Path) -> Result<BTreeMap<String, Vec<String>>, CheckpointError> {
    let mut grouped: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for row in read_rows::<LibraryRow>(path)? {
        let libs = grouped.entry(row.wheel_path).or_default();
        if row.native_library != NO_LIBRARIES_SENTINEL {
            libs.push(row.native_library);
        }
    }
    Ok(grouped)
}

/// Rendered tables in write order.
struct Snapshot(Vec<(PathBuf, Vec<u8>)>);

impl Snapshot {
    fn write(self) -> Result<(), CheckpointError> {
        for (path, bytes) in self.0 {
            let io_err = |source| CheckpointError::Io {
                path: path.clone(),
                source,
            };

            let mut tmp = path.as_os_str().to_owned();
            tmp.push(".tmp");
            let tmp = PathBuf::from(tmp);

            std::fs::write(&tmp, bytes).map_err(io_err)?;
            std::fs::rename(&tmp, &path).map_err(io_err)?;
        }
        Ok(())
    }
}

fn render_table<T: Serialize>(
    path: &Path,
    header: &[&str],
    rows: impl Iterator<Item = T>,
) -> Result<Vec<u8>, CheckpointError> {
    let csv_err = |source| CheckpointError::Csv {
        path: path.to_path_buf(),
        source,
    };

    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    writer.write_record(header).map_err(csv_err)?;
    for row in rows {
        writer.serialize(row).map_err(csv_err)?;
    }
    writer.into_inner().map_err(|e| CheckpointError::Io {
        path: path.to_path_buf(),
        source: e.into_error(),
    })
}
