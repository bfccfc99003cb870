// ── Channel reconciliation ──
//
// Joins Kodi's PVR channel list against TVHeadend's channel directory by
// exact (case-sensitive) label equality, producing a bijection between
// Kodi channel numbers and TVHeadend channel UUIDs.
//
// Known weakness: when several Kodi channels share a label, the first one
// in Kodi's list order wins. Such collisions are logged, not resolved.

use std::collections::{BTreeMap, HashMap};

use kodilink_api::tvheadend::DirectoryEntry;
use tracing::{debug, warn};

use crate::model::ChannelRecord;

/// Bidirectional Kodi channel number <-> TVHeadend UUID map.
///
/// Every number and every UUID takes part in at most one pair; entries
/// are never overwritten once present.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelMapping {
    number_to_uuid: BTreeMap<u32, String>,
    uuid_to_number: BTreeMap<String, u32>,
}

impl ChannelMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from two persisted maps. `None` unless they are exact
    /// inverses of each other.
    pub fn from_maps(
        number_to_uuid: BTreeMap<u32, String>,
        uuid_to_number: BTreeMap<String, u32>,
    ) -> Option<Self> {
        let mapping = Self {
            number_to_uuid,
            uuid_to_number,
        };
        mapping.is_bijective().then_some(mapping)
    }

    pub fn is_empty(&self) -> bool {
        self.number_to_uuid.is_empty()
    }

    pub fn len(&self) -> usize {
        self.number_to_uuid.len()
    }

    /// Insert a pair unless either side is already mapped.
    pub fn insert(&mut self, number: u32, uuid: &str) -> bool {
        if self.number_to_uuid.contains_key(&number) || self.uuid_to_number.contains_key(uuid) {
            return false;
        }
        self.number_to_uuid.insert(number, uuid.to_owned());
        self.uuid_to_number.insert(uuid.to_owned(), number);
        true
    }

    pub fn uuid_for(&self, number: u32) -> Option<&str> {
        self.number_to_uuid.get(&number).map(String::as_str)
    }

    pub fn number_for(&self, uuid: &str) -> Option<u32> {
        self.uuid_to_number.get(uuid).copied()
    }

    /// Mapped Kodi channel numbers, ascending.
    pub fn numbers(&self) -> impl Iterator<Item = u32> + '_ {
        self.number_to_uuid.keys().copied()
    }

    /// `(number, uuid)` pairs ordered by number.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &str)> + '_ {
        self.number_to_uuid.iter().map(|(n, u)| (*n, u.as_str()))
    }

    pub fn number_to_uuid(&self) -> &BTreeMap<u32, String> {
        &self.number_to_uuid
    }

    pub fn uuid_to_number(&self) -> &BTreeMap<String, u32> {
        &self.uuid_to_number
    }

    /// Both maps describe the same set of pairs.
    pub fn is_bijective(&self) -> bool {
        self.number_to_uuid.len() == self.uuid_to_number.len()
            && self
                .number_to_uuid
                .iter()
                .all(|(n, u)| self.uuid_to_number.get(u) == Some(n))
    }
}

/// Join Kodi channels against the TVHeadend directory.
///
/// For each directory entry, the first Kodi channel (in list order) whose
/// label equals the entry's name is paired with the entry's UUID, unless
/// either side is already paired. Unmatched entries are ignored.
pub fn reconcile(channels: &[ChannelRecord], directory: &[DirectoryEntry]) -> ChannelMapping {
    let mut first_by_label: HashMap<&str, &ChannelRecord> = HashMap::new();
    for ch in channels {
        if first_by_label.contains_key(ch.label.as_str()) {
            warn!(
                label = %ch.label,
                number = ch.kodi_channel_number,
                "duplicate Kodi channel label, first in list order wins"
            );
        } else {
            first_by_label.insert(ch.label.as_str(), ch);
        }
    }

    let mut mapping = ChannelMapping::new();
    for entry in directory {
        let Some(ch) = first_by_label.get(entry.val.as_str()) else {
            continue;
        };
        if !mapping.insert(ch.kodi_channel_number, &entry.key) {
            debug!(
                label = %entry.val,
                uuid = %entry.key,
                "channel already paired, skipping"
            );
        }
    }

    debug!(
        kodi = channels.len(),
        directory = directory.len(),
        mapped = mapping.len(),
        "channel reconciliation finished"
    );
    mapping
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn channel(id: u32, number: u32, label: &str) -> ChannelRecord {
        ChannelRecord {
            kodi_channel_id: id,
            kodi_channel_number: number,
            label: label.into(),
            thumbnail_uri: String::new(),
        }
    }

    fn entry(key: &str, val: &str) -> DirectoryEntry {
        DirectoryEntry {
            key: key.into(),
            val: val.into(),
        }
    }

    #[test]
    fn joins_by_exact_label() {
        let channels = [channel(7, 3, "BBC One"), channel(8, 4, "BBC Two")];
        let directory = [entry("uuid-123", "BBC One"), entry("uuid-999", "ITV")];

        let mapping = reconcile(&channels, &directory);

        assert_eq!(mapping.len(), 1);
        assert_eq!(mapping.uuid_for(3), Some("uuid-123"));
        assert_eq!(mapping.number_for("uuid-123"), Some(3));
        assert_eq!(mapping.uuid_for(4), None);
    }

    #[test]
    fn label_match_is_case_sensitive() {
        let mapping = reconcile(&[channel(1, 1, "bbc one")], &[entry("uuid-1", "BBC One")]);
        assert!(mapping.is_empty());
    }

    #[test]
    fn duplicate_kodi_labels_resolve_to_first_in_list_order() {
        let channels = [channel(1, 10, "Arte"), channel(2, 11, "Arte")];
        let mapping = reconcile(&channels, &[entry("uuid-arte", "Arte")]);
        assert_eq!(mapping.uuid_for(10), Some("uuid-arte"));
        assert_eq!(mapping.uuid_for(11), None);
    }

    #[test]
    fn duplicate_directory_names_never_break_bijection() {
        let channels = [channel(1, 10, "Arte")];
        let directory = [entry("uuid-a", "Arte"), entry("uuid-b", "Arte")];
        let mapping = reconcile(&channels, &directory);
        assert_eq!(mapping.len(), 1);
        assert_eq!(mapping.uuid_for(10), Some("uuid-a"));
        assert_eq!(mapping.number_for("uuid-b"), None);
        assert!(mapping.is_bijective());
    }

    #[test]
    fn insert_refuses_to_overwrite_either_side() {
        let mut mapping = ChannelMapping::new();
        assert!(mapping.insert(1, "a"));
        assert!(!mapping.insert(1, "b"));
        assert!(!mapping.insert(2, "a"));
        assert_eq!(mapping.len(), 1);
        assert!(mapping.is_bijective());
    }

    #[test]
    fn every_reachable_mapping_is_bijective() {
        // Exhaust small label collisions on both sides.
        let channels: Vec<_> = (1u32..)
            .zip(["A", "B", "A", "C", "B"])
            .map(|(n, l)| channel(n + 100, n, l))
            .collect();
        let directory: Vec<_> = ["A", "C", "A", "D", "B", "B"]
            .iter()
            .enumerate()
            .map(|(i, l)| entry(&format!("uuid-{i}"), l))
            .collect();

        let mapping = reconcile(&channels, &directory);
        assert!(mapping.is_bijective());
        for (number, uuid) in mapping.iter() {
            assert_eq!(mapping.number_for(uuid), Some(number));
        }
        assert_eq!(mapping.len(), 3);
    }

    #[test]
    fn from_maps_rejects_non_inverse_maps() {
        let n2u = BTreeMap::from([(1, "a".to_owned()), (2, "b".to_owned())]);
        let u2n = BTreeMap::from([("a".to_owned(), 1), ("b".to_owned(), 3)]);
        assert!(ChannelMapping::from_maps(n2u.clone(), u2n).is_none());

        let u2n = BTreeMap::from([("a".to_owned(), 1), ("b".to_owned(), 2)]);
        assert!(ChannelMapping::from_maps(n2u, u2n).is_some());
    }
}
