//! Validation of raw plate and slot-choice input.
//!
//! Everything the engine receives from a caller goes through here first, so
//! invalid input is rejected before any collection is touched.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Reasons a plate or slot choice was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("plate must not be empty")]
    EmptyPlate,
    #[error("slot must be \"auto\" or a slot number, got '{0}'")]
    MalformedSlot(String),
}

/// A validated licence plate.
///
/// Stored exactly as entered (minus surrounding whitespace). Comparisons used
/// for duplicate detection and search ignore case.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Plate(String);

impl Plate {
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::EmptyPlate);
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Case-folded form used for equality and substring matching.
    pub fn folded(&self) -> String {
        self.0.to_lowercase()
    }

    /// Case-insensitive equality.
    pub fn same_as(&self, other: &Plate) -> bool {
        self.0 == other.0 || self.folded() == other.folded()
    }

    /// Case-insensitive substring match against an already-folded needle.
    pub fn contains_folded(&self, needle: &str) -> bool {
        self.folded().contains(needle)
    }
}

impl TryFrom<String> for Plate {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Plate> for String {
    fn from(plate: Plate) -> Self {
        plate.0
    }
}

impl fmt::Display for Plate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where a new reservation should go.
///
/// Explicit numbers are kept signed and unchecked here: whether a number is a
/// real slot depends on the lot's capacity, which only the engine knows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotChoice {
    /// Lowest-numbered free slot.
    Auto,
    /// A caller-chosen 1-based slot number.
    Explicit(i64),
}

impl FromStr for SlotChoice {
    type Err = ValidationError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("auto") {
            return Ok(SlotChoice::Auto);
        }
        trimmed
            .parse::<i64>()
            .map(SlotChoice::Explicit)
            .map_err(|_| ValidationError::MalformedSlot(trimmed.to_string()))
    }
}
