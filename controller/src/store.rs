use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use anyhow::Context;
use lumen_common::ScheduleRecord;
use tracing::{info, warn};

/// Owner of the schedule list. Loaded once at startup, replaced whole on
/// update, persisted as a flat JSON array.
pub struct ScheduleStore {
    path: PathBuf,
    records: Vec<ScheduleRecord>,
}

impl ScheduleStore {
    pub fn open(path: PathBuf) -> Self {
        let records = match fs::read(&path) {
            Ok(raw) => match serde_json::from_slice::<Vec<ScheduleRecord>>(&raw) {
                Ok(records) => {
                    info!("loaded {} schedules from {}", records.len(), path.display());
                    records
                }
                Err(err) => {
                    warn!("unreadable schedule file {}: {err}", path.display());
                    Vec::new()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    "no schedule file at {}, starting with empty schedules",
                    path.display()
                );
                Vec::new()
            }
            Err(err) => {
                warn!("error loading schedules from {}: {err}", path.display());
                Vec::new()
            }
        };

        Self { path, records }
    }

    pub fn records(&self) -> &[ScheduleRecord] {
        &self.records
    }

    /// Full replacement; the list is never merged.
    pub fn replace(&mut self, records: Vec<ScheduleRecord>) {
        self.records = records;
    }

    pub fn save(&self) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let payload = serde_json::to_vec_pretty(&self.records)?;
        fs::write(&self.path, payload)
            .with_context(|| format!("writing {}", self.path.display()))?;
        info!("saved {} schedules to {}", self.records.len(), self.path.display());
        Ok(())
    }
}
