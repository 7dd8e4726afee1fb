//! Route description handed over by the routing collaborator.

use crate::defaults::{MAX_ROUTE_SECS, MAX_WAYPOINTS};
use crate::error::{EchoError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;

/// How the listener is travelling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TravelMode {
    #[default]
    Walking,
    Driving,
}

/// Narrative register for the whole story.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StoryStyle {
    #[default]
    Immersive,
    Noir,
    Children,
    Historical,
    Fantasy,
}

impl StoryStyle {
    /// Style guidance quoted into every prompt.
    pub fn instruction(self) -> &'static str {
        match self {
            StoryStyle::Noir => {
                "Style: Noir Thriller. Gritty, cynical, atmospheric. Use inner monologue. \
                 The traveler is a detective or someone with a troubled past. The city is a \
                 character itself: dark, rainy, hiding secrets."
            }
            StoryStyle::Children => {
                "Style: Children's Story. Whimsical, magical, full of wonder and gentle humor. \
                 The world is bright and alive; animate inanimate objects."
            }
            StoryStyle::Historical => {
                "Style: Historical Epic. Grandiose, dramatic, and timeless. Treat the journey \
                 as a significant pilgrimage."
            }
            StoryStyle::Fantasy => {
                "Style: Fantasy Adventure. Heroic, mystical, and epic. The real world is just \
                 a veil over a magical realm."
            }
            StoryStyle::Immersive => "Style: Immersive, 'in the moment' narration.",
        }
    }
}

impl fmt::Display for StoryStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StoryStyle::Immersive => "immersive",
            StoryStyle::Noir => "noir",
            StoryStyle::Children => "children",
            StoryStyle::Historical => "historical",
            StoryStyle::Fantasy => "fantasy",
        };
        f.write_str(name)
    }
}

/// A computed route: endpoints, stops, mode and duration.
///
/// Immutable once built. `duration_secs` drives the segment estimate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteDetails {
    pub start_address: String,
    pub end_address: String,
    #[serde(default)]
    pub waypoints: Vec<String>,
    #[serde(default)]
    pub travel_mode: TravelMode,
    pub duration_secs: u32,
    /// Human-readable duration ("42 mins"); derived from `duration_secs` when absent.
    #[serde(default)]
    pub duration_text: String,
    #[serde(default)]
    pub distance_text: String,
    #[serde(default)]
    pub style: StoryStyle,
}

impl RouteDetails {
    pub fn new(
        start_address: impl Into<String>,
        end_address: impl Into<String>,
        duration_secs: u32,
    ) -> Self {
        Self {
            start_address: start_address.into(),
            end_address: end_address.into(),
            waypoints: Vec::new(),
            travel_mode: TravelMode::default(),
            duration_secs,
            duration_text: format_duration(duration_secs),
            distance_text: String::new(),
            style: StoryStyle::default(),
        }
    }

    pub fn with_waypoints(mut self, waypoints: Vec<String>) -> Self {
        self.waypoints = waypoints;
        self
    }

    pub fn with_travel_mode(mut self, mode: TravelMode) -> Self {
        self.travel_mode = mode;
        self
    }

    pub fn with_style(mut self, style: StoryStyle) -> Self {
        self.style = style;
        self
    }

    pub fn with_distance(mut self, distance_text: impl Into<String>) -> Self {
        self.distance_text = distance_text.into();
        self
    }

    /// Load a route from a `.json` file, or TOML for any other extension.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let mut route: RouteDetails = if path.extension().is_some_and(|ext| ext == "json") {
            serde_json::from_str(&contents)?
        } else {
            toml::from_str(&contents)?
        };
        if route.duration_text.is_empty() {
            route.duration_text = format_duration(route.duration_secs);
        }
        route.validate()?;
        Ok(route)
    }

    /// Check the invariants the routing collaborator promises.
    pub fn validate(&self) -> Result<()> {
        if self.start_address.trim().is_empty() {
            return Err(invalid("start address is empty"));
        }
        if self.end_address.trim().is_empty() {
            return Err(invalid("end address is empty"));
        }
        if self.waypoints.len() > MAX_WAYPOINTS {
            return Err(invalid(&format!(
                "{} waypoints given, at most {} allowed",
                self.waypoints.len(),
                MAX_WAYPOINTS
            )));
        }
        if self.duration_secs > MAX_ROUTE_SECS {
            return Err(invalid(&format!(
                "duration {}s exceeds the {}s cap",
                self.duration_secs, MAX_ROUTE_SECS
            )));
        }
        Ok(())
    }

    /// One-line summary used in logs and trip listings.
    pub fn summary(&self) -> String {
        let mode = match self.travel_mode {
            TravelMode::Walking => "walking",
            TravelMode::Driving => "driving",
        };
        format!(
            "{} → {} ({}, {})",
            self.start_address, self.end_address, mode, self.duration_text
        )
    }
}

/// Format seconds the way the route planner shows them: whole minutes.
pub fn format_duration(duration_secs: u32) -> String {
    format!("{} mins", (duration_secs as f64 / 60.0).round() as u32)
}

fn invalid(message: &str) -> EchoError {
    EchoError::InvalidRoute {
        message: message.to_string(),
    }
}
