// ── EPG aggregator ──
//
// Fetches guide data one channel per timer tick, round-robin over the
// mapped channels, and suppresses all traffic until the cache expires.
// Rendering is a pure projection of the buffer through the channel
// mapping onto a timeline grid: 1 minute = 6 px, rows are Kodi channel
// numbers, column 0 holds the 170 px channel label.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, DurationRound, Local, TimeDelta, Utc};
use kodilink_api::{CorrelationId, CorrelationSource};
use tracing::{debug, info, trace};

use crate::browse::{
    CHANNEL_LABEL_COLOR, EpgGridModel, EpgItem, EpgItemKind, HEADER_COLOR, PROGRAM_COLOR, TEXT_COLOR,
};
use crate::model::{ChannelRecord, EpgEntry};
use crate::reconcile::ChannelMapping;

// ── Grid geometry ──────────────────────────────────────────────────
pub(crate) const PX_PER_MINUTE: i64 = 6;
const HOUR_WIDTH: i64 = 60 * PX_PER_MINUTE;
pub(crate) const LABEL_WIDTH: i64 = 170;
const ROW_HEIGHT: u32 = 40;
const HEADER_HOURS: i64 = 80;
/// Entries starting further out than this are not placed on the grid.
const MAX_GRID_MINUTES: i64 = 15_000;

/// What the EPG timer should do on this tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EpgStep {
    Idle,
    Fetch {
        correlation: CorrelationId,
        channel_number: u32,
        channel_uuid: String,
        limit: u32,
    },
}

#[derive(Debug)]
pub struct EpgAggregator {
    ttl: TimeDelta,
    page_limit: u32,
    correlations: Arc<CorrelationSource>,
    /// No fetches before this instant. `None` until the first pass completes.
    expiration: Option<DateTime<Utc>>,
    cursor: usize,
    in_flight: Option<(CorrelationId, String)>,
    entries: BTreeMap<String, Vec<EpgEntry>>,
}

impl EpgAggregator {
    pub fn new(ttl: Duration, page_limit: u32, correlations: Arc<CorrelationSource>) -> Self {
        Self {
            ttl: TimeDelta::from_std(ttl).unwrap_or(TimeDelta::hours(2)),
            page_limit,
            correlations,
            expiration: None,
            cursor: 0,
            in_flight: None,
            entries: BTreeMap::new(),
        }
    }

    pub fn expiration(&self) -> Option<DateTime<Utc>> {
        self.expiration
    }

    pub fn in_flight(&self) -> Option<CorrelationId> {
        self.in_flight.as_ref().map(|(c, _)| *c)
    }

    pub fn entries_for(&self, channel_uuid: &str) -> &[EpgEntry] {
        self.entries.get(channel_uuid).map_or(&[], Vec::as_slice)
    }

    pub fn entry_count(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    /// Decide whether this timer tick fetches anything.
    ///
    /// `epg_channels` restricts the round-robin to those Kodi channel
    /// numbers; empty means every mapped channel.
    pub fn tick(&mut self, now: DateTime<Utc>, mapping: &ChannelMapping, epg_channels: &[u32]) -> EpgStep {
        if mapping.is_empty() {
            return EpgStep::Idle;
        }
        if let Some(correlation) = self.in_flight() {
            trace!(%correlation, "EPG fetch still in flight");
            return EpgStep::Idle;
        }
        if self.expiration.is_some_and(|exp| now < exp) {
            return EpgStep::Idle;
        }

        let targets = targets(mapping, epg_channels);
        let Some((channel_number, channel_uuid)) = targets.get(self.cursor).cloned() else {
            let expires = now + self.ttl;
            info!(
                channels = targets.len(),
                entries = self.entry_count(),
                %expires,
                "EPG pass complete"
            );
            self.expiration = Some(expires);
            self.cursor = 0;
            return EpgStep::Idle;
        };

        self.cursor += 1;
        let correlation = self.correlations.next_id();
        debug!(%correlation, channel_number, %channel_uuid, "EPG fetch");
        self.in_flight = Some((correlation, channel_uuid.clone()));
        EpgStep::Fetch {
            correlation,
            channel_number,
            channel_uuid,
            limit: self.page_limit,
        }
    }

    /// Store a fetched page, replacing that channel's previous entries.
    /// Returns `false` for a response nobody is waiting for.
    pub fn apply(&mut self, correlation: CorrelationId, entries: Vec<EpgEntry>) -> bool {
        let Some(uuid) = self.take_in_flight(correlation) else {
            return false;
        };
        let mut entries: Vec<EpgEntry> = entries
            .into_iter()
            .filter(|e| e.channel_uuid.is_empty() || e.channel_uuid == uuid)
            .map(|mut e| {
                if e.channel_uuid.is_empty() {
                    e.channel_uuid.clone_from(&uuid);
                }
                e
            })
            .collect();
        entries.truncate(usize::try_from(self.page_limit).unwrap_or(usize::MAX));
        debug!(%correlation, channel_uuid = %uuid, count = entries.len(), "EPG entries stored");
        self.entries.insert(uuid, entries);
        true
    }

    /// The in-flight fetch failed; the channel is skipped for this pass.
    pub fn fail(&mut self, correlation: CorrelationId) {
        if let Some(uuid) = self.take_in_flight(correlation) {
            debug!(%correlation, channel_uuid = %uuid, "EPG fetch failed, skipping channel");
        }
    }

    /// Forget the in-flight fetch so a late reply is discarded.
    pub fn cancel_in_flight(&mut self) {
        self.in_flight = None;
    }

    fn take_in_flight(&mut self, correlation: CorrelationId) -> Option<String> {
        match self.in_flight.take() {
            Some((c, uuid)) if c == correlation => Some(uuid),
            other => {
                self.in_flight = other;
                debug!(%correlation, "discarding stale EPG response");
                None
            }
        }
    }

    // ── Rendering ───────────────────────────────────────────────────

    /// Timeline grid over every configured (or mapped) channel.
    pub fn render_grid(
        &self,
        now: DateTime<Utc>,
        mapping: &ChannelMapping,
        channels: &[ChannelRecord],
        epg_channels: &[u32],
    ) -> EpgGridModel {
        let rows: Vec<u32> = targets(mapping, epg_channels).into_iter().map(|(n, _)| n).collect();
        self.render_rows(now, mapping, channels, &rows)
    }

    /// Timeline grid of a single Kodi channel.
    pub fn render_channel(
        &self,
        channel_number: u32,
        now: DateTime<Utc>,
        mapping: &ChannelMapping,
        channels: &[ChannelRecord],
    ) -> EpgGridModel {
        self.render_rows(now, mapping, channels, &[channel_number])
    }

    fn render_rows(
        &self,
        now: DateTime<Utc>,
        mapping: &ChannelMapping,
        channels: &[ChannelRecord],
        rows: &[u32],
    ) -> EpgGridModel {
        let origin = grid_origin(now);
        let mut items = header_items(origin);

        for &number in rows {
            let label = channels
                .iter()
                .find(|ch| ch.kodi_channel_number == number)
                .map_or_else(|| number.to_string(), |ch| ch.label.clone());
            items.push(EpgItem {
                id: format!("channel-{number}"),
                kind: EpgItemKind::ChannelLabel,
                x: 0,
                y: number,
                width: LABEL_WIDTH,
                height: ROW_HEIGHT,
                color: CHANNEL_LABEL_COLOR,
                text_color: TEXT_COLOR,
                title: label,
                subtitle: None,
                description: None,
            });

            let Some(uuid) = mapping.uuid_for(number) else {
                continue;
            };
            items.extend(
                self.entries_for(uuid)
                    .iter()
                    .filter_map(|e| program_item(e, number, origin.timestamp())),
            );
        }

        EpgGridModel {
            starts_at: origin.timestamp(),
            items,
        }
    }
}

/// `(number, uuid)` pairs the timer visits, in order.
fn targets(mapping: &ChannelMapping, epg_channels: &[u32]) -> Vec<(u32, String)> {
    if epg_channels.is_empty() {
        mapping.iter().map(|(n, u)| (n, u.to_owned())).collect()
    } else {
        epg_channels
            .iter()
            .filter_map(|&n| mapping.uuid_for(n).map(|u| (n, u.to_owned())))
            .collect()
    }
}

/// Start of the local hour before `now`.
fn grid_origin(now: DateTime<Utc>) -> DateTime<Local> {
    let local = now.with_timezone(&Local);
    local.duration_trunc(TimeDelta::hours(1)).unwrap_or(local) - TimeDelta::hours(1)
}

fn header_items(origin: DateTime<Local>) -> Vec<EpgItem> {
    (0..HEADER_HOURS)
        .map(|i| {
            let hour = origin + TimeDelta::hours(i);
            EpgItem {
                id: format!("hour-{i}"),
                kind: EpgItemKind::Header,
                x: i * HOUR_WIDTH + LABEL_WIDTH,
                y: 0,
                width: HOUR_WIDTH,
                height: ROW_HEIGHT,
                color: HEADER_COLOR,
                text_color: TEXT_COLOR,
                title: hour.format("%H:00 %d.%m.%Y").to_string(),
                subtitle: None,
                description: None,
            }
        })
        .collect()
}

fn program_item(entry: &EpgEntry, row: u32, origin: i64) -> Option<EpgItem> {
    if entry.stop <= origin {
        return None;
    }
    // Clip programs already running when the grid starts.
    let start = entry.start.max(origin);
    let minutes = (start - origin) / 60;
    if minutes > MAX_GRID_MINUTES {
        return None;
    }
    Some(EpgItem {
        id: format!("{}-{}", entry.channel_uuid, entry.start),
        kind: EpgItemKind::Program,
        x: minutes * PX_PER_MINUTE + LABEL_WIDTH,
        y: row,
        width: ((entry.stop - start) / 60) * PX_PER_MINUTE,
        height: ROW_HEIGHT,
        color: PROGRAM_COLOR,
        text_color: TEXT_COLOR,
        title: entry.title.clone(),
        subtitle: entry.subtitle.clone(),
        description: entry.description.clone(),
    })
}
