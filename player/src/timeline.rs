use crate::hand::{Action, MarkerCategory, Street, StreetRecord};
use crate::time::time_to_percent;
use serde::Serialize;

/// One street's slice of the playback timeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineSegment {
    pub street: Street,
    pub start_time: f64,
    pub end_time: f64,
    pub start_percent: f64,
    pub width_percent: f64,
    pub community_cards: Vec<String>,
}

impl TimelineSegment {
    pub fn is_empty(&self) -> bool {
        self.end_time <= self.start_time
    }

    fn contains(&self, time: f64) -> bool {
        self.start_time <= time && time < self.end_time
    }
}

/// A single action pinned to the timeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionMarker {
    pub action: Action,
    pub street: Street,
    pub time: f64,
    /// Position against the whole recording, not the street's segment.
    pub position_percent: f64,
    pub category: MarkerCategory,
}

/// Segments and markers derived from a hand's streets.
///
/// Everything is computed once in [`Timeline::new`]; the queries used while
/// hovering or playing only search the precomputed, time-sorted lists.
#[derive(Debug, Clone, Default)]
pub struct Timeline {
    duration: f64,
    segments: Vec<TimelineSegment>,
    // indices into `segments` of the non-empty ones, in time order
    spans: Vec<usize>,
    markers: Vec<ActionMarker>,
}

impl Timeline {
    pub fn new(streets: &[StreetRecord], duration: f64) -> Self {
        let duration = if duration.is_finite() && duration > 0.0 {
            duration
        } else {
            0.0
        };

        let mut records: Vec<&StreetRecord> = streets.iter().collect();
        records.sort_by_key(|r| r.street);

        let bounds = boundaries(&records, duration);
        let segments: Vec<TimelineSegment> = records
            .iter()
            .zip(bounds)
            .map(|(record, (start_time, end_time))| {
                let start_percent = time_to_percent(start_time, duration);
                let width_percent =
                    (time_to_percent(end_time, duration) - start_percent).max(0.0);
                TimelineSegment {
                    street: record.street,
                    start_time,
                    end_time,
                    start_percent,
                    width_percent,
                    community_cards: record.community_cards.clone(),
                }
            })
            .collect();

        let spans = segments
            .iter()
            .enumerate()
            .filter(|(_, s)| !s.is_empty())
            .map(|(i, _)| i)
            .collect();

        let mut markers: Vec<ActionMarker> = records
            .iter()
            .flat_map(|record| {
                record.actions.iter().filter_map(move |action| {
                    action.time().map(|time| ActionMarker {
                        action: action.clone(),
                        street: record.street,
                        time,
                        position_percent: time_to_percent(time, duration),
                        category: action.kind.category(),
                    })
                })
            })
            .collect();
        // stable: actions sharing a timestamp keep their recorded order
        markers.sort_by(|a, b| a.time.total_cmp(&b.time));

        Self {
            duration,
            segments,
            spans,
            markers,
        }
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn segments(&self) -> &[TimelineSegment] {
        &self.segments
    }

    /// Markers sorted by time.
    pub fn markers(&self) -> &[ActionMarker] {
        &self.markers
    }

    /// Segment under `time`. Past the end this is the final segment.
    pub fn segment_at(&self, time: f64) -> Option<&TimelineSegment> {
        if self.spans.is_empty() {
            return self.segments.first();
        }

        let time = if time.is_nan() { 0.0 } else { time.max(0.0) };
        if time >= self.duration {
            return self.spans.last().map(|&i| &self.segments[i]);
        }

        let idx = self
            .spans
            .partition_point(|&i| self.segments[i].end_time <= time);
        self.spans
            .get(idx)
            .map(|&i| &self.segments[i])
            .filter(|segment| segment.contains(time))
    }

    pub fn street_at(&self, time: f64) -> Option<Street> {
        self.segment_at(time).map(|segment| segment.street)
    }

    /// Closest action to `time` if it lies within `epsilon` seconds.
    /// On equal distance the earlier action wins.
    pub fn nearest_action(&self, time: f64, epsilon: f64) -> Option<&ActionMarker> {
        if self.markers.is_empty() || time.is_nan() {
            return None;
        }

        let idx = self.markers.partition_point(|m| m.time < time);
        let below = idx.checked_sub(1).map(|i| {
            let t = self.markers[i].time;
            self.markers.partition_point(|m| m.time < t)
        });
        let above = (idx < self.markers.len()).then_some(idx);

        let best = match (below, above) {
            (Some(b), Some(a)) => {
                let db = time - self.markers[b].time;
                let da = self.markers[a].time - time;
                if db <= da {
                    b
                } else {
                    a
                }
            }
            (Some(b), None) => b,
            (None, Some(a)) => a,
            (None, None) => return None,
        };

        let marker = &self.markers[best];
        ((marker.time - time).abs() <= epsilon).then_some(marker)
    }

    /// Markers with `from < time <= to`.
    pub fn markers_between(&self, from: f64, to: f64) -> &[ActionMarker] {
        if !(to > from) {
            return &[];
        }
        let start = self.markers.partition_point(|m| m.time <= from);
        let end = self.markers.partition_point(|m| m.time <= to);
        &self.markers[start..end]
    }
}

/// `(start, end)` for each record, tiling `[0, duration]`.
fn boundaries(records: &[&StreetRecord], duration: f64) -> Vec<(f64, f64)> {
    if records.is_empty() {
        return Vec::new();
    }

    let firsts: Vec<Option<f64>> = records.iter().map(|r| r.first_time()).collect();
    let mut starts: Vec<Option<f64>> = vec![None; records.len()];

    let mut cursor = 0.0;
    let mut seen = false;
    for (i, first) in firsts.iter().enumerate() {
        let Some(first) = first else { continue };
        let start = if seen {
            first.max(cursor).clamp(0.0, duration)
        } else {
            0.0
        };
        starts[i] = Some(start);
        cursor = start;
        seen = true;
    }

    if !seen {
        // nothing to anchor on: give the whole range to the first street
        let mut bounds = vec![(duration, duration); records.len()];
        bounds[0] = (0.0, duration);
        return bounds;
    }

    // walk backwards so each street ends where the next non-empty one starts
    let mut bounds = vec![(0.0, 0.0); records.len()];
    let mut next_start = duration;
    for i in (0..records.len()).rev() {
        match starts[i] {
            Some(start) => {
                bounds[i] = (start, next_start.max(start));
                next_start = start;
            }
            None => bounds[i] = (next_start, next_start),
        }
    }

    bounds
}
