//! Per-user trip history.
//!
//! Each user's trips live in one JSON file, newest first. A trip keeps the
//! route and the outline exactly as planned, so resuming it replays the same
//! story arc without asking the outline provider again.

use crate::config::config_dir;
use crate::error::{EchoError, Result};
use crate::route::RouteDetails;
use crate::session::TripRecorder;
use crate::story::Outline;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::debug;
use uuid::Uuid;

/// A route narrated before, with its outline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedTrip {
    pub id: String,
    pub route: RouteDetails,
    pub outline: Outline,
    /// Seconds since the Unix epoch.
    pub created_at: u64,
}

impl SavedTrip {
    pub fn new(route: RouteDetails, outline: Outline) -> Self {
        let created_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        Self {
            id: Uuid::new_v4().to_string(),
            route,
            outline,
            created_at,
        }
    }

    pub fn created(&self) -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(self.created_at)
    }

    /// First eight characters of the id, enough to pick a trip by hand.
    pub fn short_id(&self) -> &str {
        self.id.get(..8).unwrap_or(&self.id)
    }
}

/// JSON-file backed list of saved trips.
#[derive(Debug)]
pub struct TripHistory {
    path: PathBuf,
    // Serializes read-modify-write cycles from concurrent recorders.
    lock: Mutex<()>,
}

impl TripHistory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// History file for `user_id` under the default config directory.
    pub fn for_user(user_id: &str) -> Self {
        Self::new(Self::user_path(&config_dir(), user_id))
    }

    /// `<dir>/history/<user>.json`, with the user id reduced to a safe file name.
    pub fn user_path(dir: &Path, user_id: &str) -> PathBuf {
        let name: String = user_id
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        let name = if name.is_empty() { "default".to_string() } else { name };
        dir.join("history").join(format!("{name}.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All saved trips, newest first. A missing file is an empty history.
    pub fn load(&self) -> Result<Vec<SavedTrip>> {
        match fs::read_to_string(&self.path) {
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn save(&self, trips: &[SavedTrip]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_string_pretty(trips)?)?;
        Ok(())
    }

    /// Save a new trip at the front of the history.
    pub fn record(&self, route: &RouteDetails, outline: &Outline) -> Result<SavedTrip> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let trip = SavedTrip::new(route.clone(), outline.clone());
        let mut trips = self.load()?;
        trips.insert(0, trip.clone());
        self.save(&trips)?;
        debug!(id = %trip.id, path = %self.path.display(), "saved trip");
        Ok(trip)
    }

    pub fn list(&self) -> Result<Vec<SavedTrip>> {
        self.load()
    }

    /// Find a trip by full id or unique id prefix.
    pub fn get(&self, id: &str) -> Result<SavedTrip> {
        let trips = self.load()?;
        let index = find(&trips, id)?;
        Ok(trips[index].clone())
    }

    /// Remove a trip by full id or unique id prefix, returning it.
    pub fn delete(&self, id: &str) -> Result<SavedTrip> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut trips = self.load()?;
        let index = find(&trips, id)?;
        let removed = trips.remove(index);
        self.save(&trips)?;
        Ok(removed)
    }
}

impl TripRecorder for TripHistory {
    fn record(&self, route: &RouteDetails, outline: &Outline) -> Result<()> {
        TripHistory::record(self, route, outline).map(|_| ())
    }
}

fn find(trips: &[SavedTrip], id: &str) -> Result<usize> {
    if let Some(index) = trips.iter().position(|trip| trip.id == id) {
        return Ok(index);
    }
    let matches: Vec<usize> = trips
        .iter()
        .enumerate()
        .filter(|(_, trip)| !id.is_empty() && trip.id.starts_with(id))
        .map(|(index, _)| index)
        .collect();
    match matches.as_slice() {
        [index] => Ok(*index),
        [] => Err(EchoError::TripNotFound { id: id.to_string() }),
        _ => Err(EchoError::AmbiguousTrip {
            id: id.to_string(),
            matches: matches.len(),
        }),
    }
}
