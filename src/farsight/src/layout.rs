//! Versioned layout tables
//!
//! Offsets, pointer chains, collection shapes and sanity ceilings for one
//! build of the target. Loaded from TOML so a target update only needs a new
//! data file.

use crate::collection::{CollectionKind, CollectionLayout};
use crate::error::{ReadError, Result};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Layout table compiled into the library
pub const BUILTIN_LAYOUT: &str = include_str!("../layouts/default.toml");

/// Default hard upper bound on any foreign collection count
pub const DEFAULT_MAX_COLLECTION_COUNT: usize = 16_384;

fn default_max_collection_count() -> usize {
    DEFAULT_MAX_COLLECTION_COUNT
}

/// Layout of a managed UTF-16 string object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StringLayout {
    pub length_offset: u64,
    pub chars_offset: u64,
    pub max_chars: usize,
}

impl Default for StringLayout {
    fn default() -> Self {
        Self {
            length_offset: 0x10,
            chars_offset: 0x14,
            max_chars: 256,
        }
    }
}

/// All layout constants for one target version
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutTable {
    /// Target build this table was captured against
    pub version: String,
    /// Module whose base address anchors root chains
    pub module: String,
    #[serde(default = "default_max_collection_count")]
    pub max_collection_count: usize,
    #[serde(default)]
    pub strings: StringLayout,
    #[serde(default)]
    pub chains: BTreeMap<String, Vec<u64>>,
    #[serde(default)]
    pub fields: BTreeMap<String, u64>,
    #[serde(default)]
    pub collections: BTreeMap<String, CollectionLayout>,
}

impl LayoutTable {
    /// Parse the table compiled into the library
    pub fn builtin() -> Result<Self> {
        Self::from_toml_str(BUILTIN_LAYOUT)
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        let table: LayoutTable =
            toml::from_str(text).map_err(|e| ReadError::Layout(e.to_string()))?;
        table.validate()?;
        Ok(table)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| ReadError::Layout(e.to_string()))
    }

    pub fn chain(&self, name: &str) -> Result<&[u64]> {
        self.chains
            .get(name)
            .map(Vec::as_slice)
            .ok_or_else(|| ReadError::Layout(format!("missing chain '{}'", name)))
    }

    pub fn field(&self, name: &str) -> Result<u64> {
        self.fields
            .get(name)
            .copied()
            .ok_or_else(|| ReadError::Layout(format!("missing field '{}'", name)))
    }

    pub fn collection(&self, name: &str) -> Result<&CollectionLayout> {
        self.collections
            .get(name)
            .ok_or_else(|| ReadError::Layout(format!("missing collection '{}'", name)))
    }

    /// Reject tables whose shapes could never decode
    pub fn validate(&self) -> Result<()> {
        if self.max_collection_count == 0 {
            return Err(ReadError::Layout("max_collection_count must be > 0".into()));
        }
        if self.strings.max_chars == 0 {
            return Err(ReadError::Layout("strings.max_chars must be > 0".into()));
        }
        for (name, layout) in &self.collections {
            layout
                .validate()
                .map_err(|msg| ReadError::Layout(format!("collection '{}': {}", name, msg)))?;
        }
        for (name, offsets) in &self.chains {
            if offsets.is_empty() {
                return Err(ReadError::Layout(format!("chain '{}' is empty", name)));
            }
        }
        Ok(())
    }
}

impl CollectionLayout {
    fn validate(&self) -> std::result::Result<(), String> {
        if self.entry_stride == 0 {
            return Err("entry_stride must be > 0".into());
        }
        if self.value_offset >= self.entry_stride {
            return Err(format!(
                "value_offset {:#x} outside stride {:#x}",
                self.value_offset, self.entry_stride
            ));
        }
        match (self.kind, self.storage_offset) {
            (CollectionKind::Array, Some(_)) => Err("arrays store entries inline".into()),
            (CollectionKind::Array, None) => Ok(()),
            (_, None) => Err("indirect collections need storage_offset".into()),
            (_, Some(_)) => Ok(()),
        }
    }
}
