use hdrhistogram::Histogram;
use log::warn;
use std::collections::BTreeMap;
use std::time::Duration;

use crate::types::{LoadTestMetrics, Percentiles, RequestOutcome, TimeSeriesPoint};

#[derive(Debug, Default)]
pub struct Statistics {
    outcomes: Vec<RequestOutcome>,
    successful_requests: u64,
    failed_requests: u64,
}

impl Statistics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_outcomes(outcomes: Vec<RequestOutcome>) -> Self {
        let mut stats = Self::new();
        for outcome in outcomes {
            stats.record(outcome);
        }
        stats
    }

    pub fn record(&mut self, outcome: RequestOutcome) {
        if outcome.success {
            self.successful_requests += 1;
        } else {
            self.failed_requests += 1;
        }
        self.outcomes.push(outcome);
    }

    pub fn total_requests(&self) -> u64 {
        self.outcomes.len() as u64
    }

    pub fn outcomes(&self) -> &[RequestOutcome] {
        &self.outcomes
    }

    pub fn into_outcomes(self) -> Vec<RequestOutcome> {
        self.outcomes
    }

    pub fn error_rate(&self) -> f64 {
        if self.outcomes.is_empty() {
            0.0
        } else {
            self.failed_requests as f64 / self.total_requests() as f64
        }
    }

    pub fn get_status_codes(&self) -> BTreeMap<u16, u64> {
        let mut codes = BTreeMap::new();
        for outcome in &self.outcomes {
            *codes.entry(outcome.status_code).or_insert(0) += 1;
        }
        codes
    }

    pub fn get_errors(&self) -> BTreeMap<String, u64> {
        let mut errors = BTreeMap::new();
        for outcome in &self.outcomes {
            if let Some(error) = &outcome.error {
                *errors.entry(error.clone()).or_insert(0) += 1;
            }
        }
        errors
    }

    pub fn metrics(&self, elapsed: Duration) -> LoadTestMetrics {
        let mut sorted: Vec<f64> = self
            .outcomes
            .iter()
            .map(|outcome| outcome.response_time_ms)
            .collect();
        sorted.sort_by(f64::total_cmp);

        let total = self.total_requests();
        let elapsed_seconds = elapsed.as_secs_f64();
        let throughput = if elapsed_seconds > 0.0 {
            total as f64 / elapsed_seconds
        } else {
            0.0
        };
        let average = if sorted.is_empty() {
            0.0
        } else {
            sorted.iter().sum::<f64>() / sorted.len() as f64
        };

        LoadTestMetrics {
            total_requests: total,
            successful_requests: self.successful_requests,
            failed_requests: self.failed_requests,
            error_rate: self.error_rate(),
            throughput,
            average_response_time: average,
            min_response_time: sorted.first().copied().unwrap_or(0.0),
            max_response_time: sorted.last().copied().unwrap_or(0.0),
            percentiles: Percentiles {
                p50: percentile(&sorted, 0.50),
                p90: percentile(&sorted, 0.90),
                p95: percentile(&sorted, 0.95),
                p99: percentile(&sorted, 0.99),
            },
            status_code_distribution: self.get_status_codes(),
            error_distribution: self.get_errors(),
            elapsed_seconds,
        }
    }

    pub fn time_series(&self, started_at_ms: i64) -> Vec<TimeSeriesPoint> {
        struct Bucket {
            histogram: Histogram<u64>,
            count: u64,
            failed: u64,
            total_time: f64,
        }

        let empty = match Histogram::<u64>::new(3) {
            Ok(histogram) => histogram,
            Err(e) => {
                warn!("⚠️ Could not create histogram: {}", e);
                return Vec::new();
            }
        };
        let mut buckets: BTreeMap<u64, Bucket> = BTreeMap::new();

        for outcome in &self.outcomes {
            let second = (outcome.timestamp_ms - started_at_ms).max(0) as u64 / 1000;
            let bucket = buckets.entry(second).or_insert_with(|| Bucket {
                histogram: empty.clone(),
                count: 0,
                failed: 0,
                total_time: 0.0,
            });

            bucket
                .histogram
                .saturating_record(outcome.response_time_ms.round().max(0.0) as u64);
            bucket.count += 1;
            bucket.total_time += outcome.response_time_ms;
            if !outcome.success {
                bucket.failed += 1;
            }
        }

        buckets
            .into_iter()
            .map(|(second, bucket)| TimeSeriesPoint {
                second,
                rps: bucket.count as f64,
                avg_response_time: bucket.total_time / bucket.count as f64,
                p95_response_time: bucket.histogram.value_at_quantile(0.95) as f64,
                error_rate: bucket.failed as f64 / bucket.count as f64,
            })
            .collect()
    }
}

// nearest rank: sorted[ceil(n*p) - 1], clamped
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = (sorted.len() as f64 * p).ceil() as i64 - 1;
    let index = rank.clamp(0, sorted.len() as i64 - 1) as usize;
    sorted[index]
}
