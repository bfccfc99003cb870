// ── Channel mapping persistence ──
//
// Both groups' mappings live side by side in one JSON document tagged with
// a format version. A missing file means "nothing cached"; an unreadable,
// outdated or inconsistent file is logged and ignored so the join simply
// runs again.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::CoreError;
use crate::reconcile::ChannelMapping;

pub const MAPPING_FORMAT_VERSION: u32 = 1;
const MAPPING_FILE_NAME: &str = "channel-mapping.json";

/// Loaded TV and radio mappings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoredMappings {
    pub tv: ChannelMapping,
    pub radio: ChannelMapping,
}

impl StoredMappings {
    pub fn is_empty(&self) -> bool {
        self.tv.is_empty() && self.radio.is_empty()
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct MappingFile {
    format_version: u32,
    #[serde(default)]
    tv: MappingPair,
    #[serde(default)]
    radio: MappingPair,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct MappingPair {
    number_to_uuid: BTreeMap<u32, String>,
    uuid_to_number: BTreeMap<String, u32>,
}

impl From<&ChannelMapping> for MappingPair {
    fn from(mapping: &ChannelMapping) -> Self {
        Self {
            number_to_uuid: mapping.number_to_uuid().clone(),
            uuid_to_number: mapping.uuid_to_number().clone(),
        }
    }
}

/// Reads and writes the mapping file under a data directory.
#[derive(Debug, Clone)]
pub struct MappingStore {
    path: PathBuf,
}

impl MappingStore {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            path: data_dir.join(MAPPING_FILE_NAME),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load cached mappings. `Ok(None)` when nothing usable is stored.
    pub fn load(&self) -> Result<Option<StoredMappings>, CoreError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no cached channel mapping");
                return Ok(None);
            }
            Err(e) => return Err(self.persistence_error(&e)),
        };

        let file: MappingFile = match serde_json::from_str(&raw) {
            Ok(file) => file,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "ignoring unreadable channel mapping");
                return Ok(None);
            }
        };
        if file.format_version != MAPPING_FORMAT_VERSION {
            warn!(
                path = %self.path.display(),
                found = file.format_version,
                expected = MAPPING_FORMAT_VERSION,
                "ignoring channel mapping with unknown format version"
            );
            return Ok(None);
        }

        let (Some(tv), Some(radio)) = (
            ChannelMapping::from_maps(file.tv.number_to_uuid, file.tv.uuid_to_number),
            ChannelMapping::from_maps(file.radio.number_to_uuid, file.radio.uuid_to_number),
        ) else {
            warn!(path = %self.path.display(), "ignoring inconsistent channel mapping");
            return Ok(None);
        };

        info!(
            path = %self.path.display(),
            tv = tv.len(),
            radio = radio.len(),
            "loaded cached channel mapping"
        );
        Ok(Some(StoredMappings { tv, radio }))
    }

    /// Write both mappings, replacing the file atomically.
    pub fn save(&self, tv: &ChannelMapping, radio: &ChannelMapping) -> Result<(), CoreError> {
        let file = MappingFile {
            format_version: MAPPING_FORMAT_VERSION,
            tv: tv.into(),
            radio: radio.into(),
        };
        let json = serde_json::to_string_pretty(&file).map_err(|e| CoreError::Persistence {
            path: self.path.clone(),
            message: e.to_string(),
        })?;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| self.persistence_error(&e))?;
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(|e| self.persistence_error(&e))?;
        fs::rename(&tmp, &self.path).map_err(|e| self.persistence_error(&e))?;

        debug!(path = %self.path.display(), "saved channel mapping");
        Ok(())
    }

    /// Delete the cached mapping. Returns whether a file was removed.
    pub fn clear(&self) -> Result<bool, CoreError> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                info!(path = %self.path.display(), "discarded cached channel mapping");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(self.persistence_error(&e)),
        }
    }

    fn persistence_error(&self, e: &std::io::Error) -> CoreError {
        CoreError::Persistence {
            path: self.path.clone(),
            message: e.to_string(),
        }
    }
}
