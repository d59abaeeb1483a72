//! Core domain types for pokefetch records.

use serde::{Deserialize, Serialize};

use crate::error::{PokefetchError, Result};

/// Separator used when reference URIs are flattened into one field.
pub const REFERENCE_URI_SEPARATOR: char = '|';

// ---------------------------------------------------------------------------
// Wire shapes
// ---------------------------------------------------------------------------

/// A `{ name, url }` pointer to another resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedResource {
    #[serde(default)]
    pub name: String,
    pub url: String,
}

/// One entry of a primary record's `abilities` list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbilitySlot {
    pub ability: NamedResource,
}

/// A primary record exactly as the remote service returns it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRecord {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub height: i64,
    #[serde(default)]
    pub weight: i64,
    #[serde(default)]
    pub abilities: Vec<AbilitySlot>,
}

// ---------------------------------------------------------------------------
// Record
// ---------------------------------------------------------------------------

/// A fetched record with its reference URIs and (after stage 2) its
/// enrichment field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub id: i64,
    pub name: String,
    pub height: i64,
    pub weight: i64,
    /// Secondary sub-resource URIs, in source order.
    #[serde(default)]
    pub reference_uris: Vec<String>,
    /// Description strings gathered from every reference URI.
    #[serde(default)]
    pub effect_entries: Vec<String>,
}

impl Record {
    /// Flatten a raw remote record, keeping ability URLs in source order.
    pub fn from_raw(raw: RawRecord) -> Self {
        let reference_uris = raw
            .abilities
            .into_iter()
            .map(|slot| slot.ability.url)
            .collect();

        Self {
            id: raw.id,
            name: raw.name,
            height: raw.height,
            weight: raw.weight,
            reference_uris,
            effect_entries: Vec::new(),
        }
    }

    /// Reference URIs joined into the single delimited field the store keeps.
    pub fn flat_reference_uris(&self) -> String {
        let mut flat = String::new();
        for (i, uri) in self.reference_uris.iter().enumerate() {
            if i > 0 {
                flat.push(REFERENCE_URI_SEPARATOR);
            }
            flat.push_str(uri);
        }
        flat
    }

    /// Split a delimited reference field. Empty segments are dropped, so an
    /// empty field yields no URIs.
    pub fn split_reference_uris(flat: &str) -> Vec<String> {
        flat.split(REFERENCE_URI_SEPARATOR)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect()
    }
}

// ---------------------------------------------------------------------------
// WorkRange
// ---------------------------------------------------------------------------

/// A closed ID interval `[from, to]` with `from <= to`. Only built through
/// [`WorkRange::new`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WorkRange {
    from: i64,
    to: i64,
}

impl WorkRange {
    /// Validate and build a range. `from > to` is rejected with
    /// [`PokefetchError::InvalidRange`].
    pub fn new(from: i64, to: i64) -> Result<Self> {
        if from > to {
            return Err(PokefetchError::InvalidRange { from, to });
        }
        Ok(Self { from, to })
    }

    pub fn start(&self) -> i64 {
        self.from
    }

    pub fn end(&self) -> i64 {
        self.to
    }

    /// Number of IDs in the range (`to - from + 1`), saturating at
    /// `u64::MAX` for the full `i64` span.
    pub fn len(&self) -> u64 {
        self.to.abs_diff(self.from).saturating_add(1)
    }

    /// A valid range is never empty.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Every ID in the range, ascending.
    pub fn ids(&self) -> std::ops::RangeInclusive<i64> {
        self.from..=self.to
    }
}

impl std::fmt::Display for WorkRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..={}", self.from, self.to)
    }
}
