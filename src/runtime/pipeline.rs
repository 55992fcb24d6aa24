//! The realtime orchestrator: frame in, persisted predictions out.
//!
//! Each decoded frame runs through segment extraction, the in-progress
//! filter, feature building, ensemble prediction, and the dispatch policy
//! against the recent-segment cache. Everything here runs on the stream
//! task; only the store enqueue crosses a task boundary, and it never
//! blocks.

use std::time::Duration;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tracing::{error, info, warn};

use crate::darwin::decoder::{self, DecodedMessage};
use crate::darwin::filter::{filter_segments_by_now, FilterMode};
use crate::darwin::segments::{extract_segments, Segment};
use crate::features::{FeatureRow, SegmentFeatureBuilder};
use crate::models::WeightedEnsemble;
use crate::route::Route;
use crate::store::{PredictionRecord, RealtimeStore};

use super::cache::{RecentSegmentCache, SegmentId};

/// Log pipeline counters every this many frames.
const COUNTER_LOG_EVERY: u64 = 500;

pub struct RealtimePipeline {
    route: Route,
    cache: RecentSegmentCache,
    store: RealtimeStore,
    features: SegmentFeatureBuilder,
    ensemble: WeightedEnsemble,
    tz: Tz,
    print_predictions: bool,

    frames: u64,
    predictions: u64,
}

impl RealtimePipeline {
    pub fn new(
        route: Route,
        cache: RecentSegmentCache,
        store: RealtimeStore,
        features: SegmentFeatureBuilder,
        ensemble: WeightedEnsemble,
        tz: Tz,
        print_predictions: bool,
    ) -> Self {
        Self {
            route,
            cache,
            store,
            features,
            ensemble,
            tz,
            print_predictions,
            frames: 0,
            predictions: 0,
        }
    }

    /// Decode and process one raw frame body. Decode failures drop the
    /// frame; the transport will deliver new ones.
    pub fn handle_frame(&mut self, body: &[u8]) {
        let message = match decoder::decode_message(body) {
            Ok(message) => message,
            Err(e) => {
                warn!(error = %e, "Failed to decode frame, dropping");
                return;
            }
        };

        let now = Utc::now().with_timezone(&self.tz);
        self.handle_message(&message, now);
    }

    /// Process one decoded message against the given instant. Returns the
    /// number of predictions made (for tests and counters).
    pub fn handle_message(&mut self, message: &DecodedMessage, now: DateTime<Tz>) -> usize {
        self.frames += 1;
        if self.frames % COUNTER_LOG_EVERY == 0 {
            info!(
                frames = self.frames,
                predictions = self.predictions,
                cache = self.cache.len(),
                dropped_writes = self.store.dropped_writes(),
                "Pipeline counters"
            );
        }

        let segments = extract_segments(
            &message.forecasts,
            &message.schedules,
            &self.route,
            self.tz,
            true,
        );
        if segments.is_empty() {
            return 0;
        }

        let segments = filter_segments_by_now(segments, now, self.tz, FilterMode::in_progress());

        let mut made = 0usize;
        for segment in &segments {
            if self.handle_segment(segment, now) {
                made += 1;
            }
        }
        self.predictions += made as u64;
        made
    }

    fn handle_segment(&mut self, segment: &Segment, now: DateTime<Tz>) -> bool {
        let Some(rid) = segment.rid.clone() else {
            return false;
        };

        let Some(features) = self.features.build(segment) else {
            return false;
        };

        let predicted = match self
            .ensemble
            .predict_one(segment.first, segment.second, &features)
        {
            Ok(Some(predicted)) => predicted,
            Ok(None) => return false,
            Err(e) => {
                error!(
                    first = segment.first,
                    second = segment.second,
                    error = %e,
                    "Model load failed for pair, skipping segment"
                );
                return false;
            }
        };

        let seg_id = SegmentId {
            rid,
            first: segment.first,
            second: segment.second,
            planned_dep: segment.planned_dep.clone(),
        };

        // Dispatch decisions read the state as it was before this snapshot.
        let prev = self.cache.get(&seg_id).cloned();

        self.cache.touch(
            &seg_id,
            segment.dep_time_for_prediction.as_deref(),
            segment.dep_time_kind,
            segment.has_actual_dep,
        );

        let should_insert_all = match &prev {
            None => true,
            Some(state) => {
                state.last_dep_time.as_deref() != segment.dep_time_for_prediction.as_deref()
                    || state.last_kind != segment.dep_time_kind
            }
        };
        let prev_actual_saved = prev.as_ref().map(|s| s.actual_saved).unwrap_or(false);
        let should_insert_actual = segment.has_actual_dep && !prev_actual_saved;

        let record = self.make_record(segment, &seg_id, &features, predicted);

        if should_insert_all {
            self.store.insert_all(record.clone());
        }

        if should_insert_actual && self.store.insert_actual(record.clone()) {
            self.cache.mark_actual_saved(&seg_id);
        }

        if self.print_predictions {
            let flag = if segment.has_actual_dep { "ACTUAL" } else { "EST" };
            println!(
                "{} | {} | {} {}->{} planned_dep={} dep_time={} dep_delay={:.1} dwell={:.1} pred={:.2} | cache={}",
                now.format("%Y-%m-%d %H:%M:%S"),
                flag,
                record.rid,
                record.first,
                record.second,
                record.planned_dep.as_deref().unwrap_or("NA"),
                record.dep_time.as_deref().unwrap_or("NA"),
                record.departure_delay,
                record.dwell_delay,
                record.predicted_delay,
                self.cache.len(),
            );
        }

        true
    }

    fn make_record(
        &self,
        segment: &Segment,
        seg_id: &SegmentId,
        features: &FeatureRow,
        predicted_delay: f64,
    ) -> PredictionRecord {
        PredictionRecord {
            rid: seg_id.rid.clone(),
            ssd: segment.ssd.clone(),
            first: segment.first.to_string(),
            second: segment.second.to_string(),
            planned_dep: segment.planned_dep.clone(),
            dep_time: segment.dep_time_for_prediction.clone(),
            dep_time_kind: segment.dep_time_kind.as_str().to_string(),
            has_actual_dep: segment.has_actual_dep,
            actual_dep_confirmed: segment.actual_dep_confirmed.clone(),
            departure_delay: features.departure_delay,
            dwell_delay: features.dwell_delay,
            peak: features.peak,
            day_of_week: features.day_of_week.clone(),
            day_of_month: features.day_of_month,
            hour_of_day: features.hour_of_day,
            weekend: features.weekend,
            season: features.season.clone(),
            month: features.month,
            holiday: features.holiday,
            predicted_delay,
        }
    }

    /// Drain the writer and release the store.
    pub async fn shutdown(mut self, join_timeout: Duration) {
        info!(
            frames = self.frames,
            predictions = self.predictions,
            dropped_writes = self.store.dropped_writes(),
            "Shutting down pipeline"
        );
        self.store.close(true, join_timeout).await;
    }

    /// Cache occupancy, mostly for the print line and tests.
    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }
}
