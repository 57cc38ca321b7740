//! Per-offer display history used to enforce display-frequency limits.
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::offers::Offer;
use crate::timesource::TimeSource;
use crate::{Error, Result};

/// A single impression record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayLogEntry {
    /// When the offer was displayed, in epoch seconds.
    pub displayed_on: i64,
    /// Offer that was displayed.
    pub offer_id: String,
    /// Variant of the offer, taken from the offer's impression attribution metadata.
    pub offer_variant_id: String,
    /// Placement the offer was displayed in.
    pub placement_id: String,
}

/// Append-only display history, indexed by offer id.
///
/// Entries for an offer are appended in non-decreasing `displayed_on` order, so each offer's
/// sequence stays chronological. The in-memory index is never capped; the on-disk file keeps
/// only the `max_entries` most recent entries across the whole log.
///
/// Persistence is decoupled from appends: a periodic task calls [`DisplayLog::persist`], plus a
/// best-effort persist on shutdown. Entries appended after the last persist are lost on crash,
/// which at worst shows an offer once more than its limit allows.
pub struct DisplayLog {
    path: PathBuf,
    max_entries: usize,
    time_source: Arc<dyn TimeSource>,
    // Shared with the background persist task.
    index: Mutex<HashMap<String, Vec<DisplayLogEntry>>>,
}

impl DisplayLog {
    /// Load persisted entries from `path` and group them by offer id.
    ///
    /// A missing file means an empty history, not an error. An unparseable file is logged and
    /// treated as empty.
    pub fn prepare(
        path: impl Into<PathBuf>,
        max_entries: usize,
        time_source: Arc<dyn TimeSource>,
    ) -> DisplayLog {
        let path = path.into();
        let entries: Vec<DisplayLogEntry> = match fs::read(&path) {
            Ok(bytes) => match serde_json::from_slice(&bytes) {
                Ok(entries) => entries,
                Err(err) => {
                    log::warn!(target: "metica", "failed to parse display log {:?}: {}", path, err);
                    Vec::new()
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(err) => {
                log::warn!(target: "metica", "failed to read display log {:?}: {}", path, err);
                Vec::new()
            }
        };

        let mut index: HashMap<String, Vec<DisplayLogEntry>> = HashMap::new();
        // The file is oldest-first, so pushing in file order keeps every offer's sequence
        // chronological.
        for entry in entries {
            index.entry(entry.offer_id.clone()).or_default().push(entry);
        }

        DisplayLog {
            path,
            max_entries,
            time_source,
            index: Mutex::new(index),
        }
    }

    /// Append `entries` to the history. Pure in-memory mutation; persistence happens separately.
    pub fn append_entries(&self, entries: impl IntoIterator<Item = DisplayLogEntry>) {
        let mut index = self.index.lock().unwrap();
        for entry in entries {
            index.entry(entry.offer_id.clone()).or_default().push(entry);
        }
    }

    /// Drop offers that have exhausted any of their display limits.
    ///
    /// An offer with no limits or no recorded history passes unchanged. Otherwise, for every
    /// limit, the number of displays within the trailing window must not exceed the limit's
    /// maximum. Input order is preserved; filtered offers are simply omitted.
    pub fn filter_offers(&self, offers: &[Offer]) -> Vec<Offer> {
        let now = self.time_source.epoch_seconds();
        let index = self.index.lock().unwrap();

        offers
            .iter()
            .filter(|offer| {
                let Some(limits) = &offer.display_limits else {
                    return true;
                };
                let Some(history) = index.get(&offer.offer_id) else {
                    return true;
                };
                limits.iter().all(|limit| {
                    let window_seconds = limit.time_window_hours as i64 * 3600;
                    let displays = history
                        .iter()
                        .filter(|entry| now - entry.displayed_on <= window_seconds)
                        .count() as u64;
                    displays <= limit.max_display_count
                })
            })
            .cloned()
            .collect()
    }

    /// Recorded history for `offer_id`, oldest first. Empty if the offer is unknown.
    pub fn entries_for_offer(&self, offer_id: &str) -> Vec<DisplayLogEntry> {
        self.index
            .lock()
            .unwrap()
            .get(offer_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Write the history to disk, keeping only the `max_entries` most recent entries by
    /// `displayed_on` (ties keep the later-appended entry).
    ///
    /// The file is written oldest-first so that reloading reconstructs an identical grouping.
    /// The in-memory index is not truncated.
    pub fn persist(&self) -> Result<()> {
        let snapshot = {
            let index = self.index.lock().unwrap();
            let mut all: Vec<DisplayLogEntry> = index.values().flatten().cloned().collect();
            // Stable sort: same-second entries keep their per-offer append order.
            all.sort_by_key(|entry| entry.displayed_on);
            if all.len() > self.max_entries {
                all.drain(..all.len() - self.max_entries);
            }
            all
        };

        let json = serde_json::to_vec(&snapshot)?;
        fs::write(&self.path, json).map_err(|err| {
            log::warn!(target: "metica", "failed to persist display log {:?}: {}", self.path, err);
            Error::from(err)
        })
    }
}
