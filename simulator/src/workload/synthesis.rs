//! Request synthesis from machine usage traces.
//!
//! Scans per-machine usage series for over-threshold bursts and turns each
//! burst into a splittable request: arrival is the tick the burst starts,
//! duration is the burst length and demand is the largest excess over the
//! threshold. Machines whose usage profile leaves steady headroom are
//! classified as producers and their series become the capacity the requests
//! are replayed against.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};

use rustc_hash::FxHashMap;
use serde::Deserialize;

use crate::error::{SimError, SimResult};
use crate::workload::records::{ProducerRecord, RequestRecord};
use crate::workload::FractionalWorkload;

/// Usage decile the producer classification looks at.
const PRODUCER_DECILE: usize = 5;
/// Largest share of time a producer may spend at or below that decile.
const PRODUCER_TIME_SHARE_CAP: f64 = 0.5;
/// Usage decile the consumer classification looks at.
const CONSUMER_DECILE: usize = 9;
/// Smallest share of time above that decile that marks a consumer.
const CONSUMER_OVERLOAD_SHARE: f64 = 0.1;

#[derive(Debug, Clone, Deserialize)]
pub struct RequestSynthesizer {
    /// JSON map from machine id to its per-tick normalized usage.
    pub usage_path: String,
    /// Optional machine ranking fixing the scan order, in the
    /// `[[machine_id, weight], ...]` format written by the ranking report.
    /// Without it machines are scanned in id order.
    #[serde(default)]
    pub rank_path: Option<String>,
    #[serde(default = "default_max_usage_cap")]
    pub max_usage_cap: f64,
    #[serde(default = "default_machine_limit")]
    pub machine_limit: usize,
    #[serde(default = "default_request_limit")]
    pub request_limit: usize,
    #[serde(default = "default_producer_count")]
    pub producer_count: usize,
    #[serde(default = "default_consumer_size")]
    pub consumer_size: f64,
    #[serde(default = "default_producer_size")]
    pub producer_size: f64,
    /// Checkpoint dump path for the scaled requests.
    #[serde(default)]
    pub request_out: Option<String>,
    /// Checkpoint dump path for the scaled producer series.
    #[serde(default)]
    pub producer_out: Option<String>,
}

fn default_max_usage_cap() -> f64 {
    0.75
}

fn default_machine_limit() -> usize {
    10000
}

fn default_request_limit() -> usize {
    100000
}

fn default_producer_count() -> usize {
    100
}

fn default_consumer_size() -> f64 {
    512.
}

fn default_producer_size() -> f64 {
    64.
}

/// An over-threshold stretch of a usage series.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Burst {
    start: u64,
    duration: u64,
    excess: f64,
}

impl RequestSynthesizer {
    pub fn from_options(options: &serde_yaml::Value) -> SimResult<Self> {
        serde_yaml::from_value(options.clone())
            .map_err(|e| SimError::InvalidConfig(format!("synthesis options: {}", e)))
    }

    /// Builds the fractional workload and, when dump paths are configured,
    /// writes the scaled checkpoint pair.
    pub fn synthesize(&self) -> SimResult<FractionalWorkload> {
        let cluster = self.read_usage()?;
        let order = self.scan_order(&cluster)?;

        let mut requests: BTreeMap<u64, Vec<RequestRecord>> = BTreeMap::new();
        let mut producer_scores: Vec<(String, f64)> = Vec::new();
        let mut consumer_count = 0usize;
        let mut request_count = 0usize;
        let mut scanned = 0usize;

        for id in order.iter().take(self.machine_limit) {
            let usage = &cluster[id];
            scanned += 1;

            let dist = usage_distribution(usage);
            if dist.len() <= 10 && dist[PRODUCER_DECILE] <= PRODUCER_TIME_SHARE_CAP {
                producer_scores.push((id.clone(), dist[PRODUCER_DECILE]));
            } else if dist.len() > 11 && 1. - dist[CONSUMER_DECILE] >= CONSUMER_OVERLOAD_SHARE {
                consumer_count += 1;
            }

            for burst in extract_bursts(usage, self.max_usage_cap) {
                requests
                    .entry(burst.start)
                    .or_default()
                    .push(RequestRecord::new(burst.duration, burst.excess));
                request_count += 1;
            }
            if request_count > self.request_limit {
                break;
            }
        }

        log::info!(
            "from top {} machines, {} requests generated, {} producer candidates, {} consumers",
            scanned,
            request_count,
            producer_scores.len(),
            consumer_count
        );

        let producers = self.select_producers(producer_scores, &cluster);

        for bucket in requests.values_mut() {
            for request in bucket.iter_mut() {
                request.demand *= self.consumer_size;
            }
        }

        if let Some(path) = &self.request_out {
            dump_requests(path, &requests)?;
        }
        if let Some(path) = &self.producer_out {
            dump_producers(path, &producers)?;
        }

        Ok(FractionalWorkload {
            requests,
            producers,
            producer_size: self.producer_size,
        })
    }

    fn read_usage(&self) -> SimResult<FxHashMap<String, Vec<f64>>> {
        let file =
            File::open(&self.usage_path).map_err(|e| SimError::missing_input(&self.usage_path, e))?;
        let raw: FxHashMap<String, serde_json::Value> =
            serde_json::from_reader(BufReader::new(file))
                .map_err(|e| SimError::malformed_record(&self.usage_path, e))?;

        let mut cluster = FxHashMap::default();
        for (id, value) in raw {
            match serde_json::from_value::<Vec<f64>>(value) {
                Ok(usage) if !usage.is_empty() => {
                    cluster.insert(id, usage);
                }
                Ok(_) => {
                    log::warn!("skipping machine {} with empty usage series", id);
                }
                Err(e) => {
                    log::warn!(
                        "skipping machine {} with malformed usage in {}: {}",
                        id,
                        self.usage_path,
                        e
                    );
                }
            }
        }
        Ok(cluster)
    }

    /// Machine scan order: the ranking file when given, id order otherwise.
    fn scan_order(&self, cluster: &FxHashMap<String, Vec<f64>>) -> SimResult<Vec<String>> {
        match &self.rank_path {
            Some(path) => {
                let file = File::open(path).map_err(|e| SimError::missing_input(path, e))?;
                let ranking: Vec<(String, u64)> = serde_json::from_reader(BufReader::new(file))
                    .map_err(|e| SimError::malformed_record(path, e))?;
                Ok(ranking
                    .into_iter()
                    .map(|(id, _)| id)
                    .filter(|id| cluster.contains_key(id))
                    .collect())
            }
            None => {
                let mut ids: Vec<String> = cluster.keys().cloned().collect();
                ids.sort();
                Ok(ids)
            }
        }
    }

    /// Picks the top `producer_count` candidates by score and scales their
    /// usage to absolute units. Higher score wins, ties go to the smaller id.
    fn select_producers(
        &self,
        mut scores: Vec<(String, f64)>,
        cluster: &FxHashMap<String, Vec<f64>>,
    ) -> Vec<ProducerRecord> {
        scores.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        scores.truncate(self.producer_count);

        let mut producers: Vec<ProducerRecord> = scores
            .into_iter()
            .map(|(id, _)| {
                let usage = cluster[&id]
                    .iter()
                    .map(|u| u * self.producer_size)
                    .collect();
                ProducerRecord { id, usage }
            })
            .collect();
        producers.sort_by(|a, b| a.id.cmp(&b.id));
        producers
    }
}

/// Cumulative share of ticks spent at or below each usage decile.
///
/// The vector has one slot per decile up to the series maximum, at least ten.
/// A machine that never exceeds normalized usage 1.0 therefore has at most
/// ten slots, which is what the producer classification keys on.
fn usage_distribution(usage: &[f64]) -> Vec<f64> {
    let max_usage = usage.iter().cloned().fold(0f64, f64::max);
    let slots = 10usize.max((max_usage * 10.) as usize + 1);
    let mut dist = vec![0f64; slots];
    for &u in &usage[1..] {
        let idx = ((u * 10.) as usize).min(slots - 1);
        dist[idx] += 1.;
    }
    let ticks = usage.len() as f64;
    let mut acc = 0.;
    for slot in dist.iter_mut() {
        acc += *slot / ticks;
        *slot = acc;
    }
    dist
}

/// Splits a usage series into maximal stretches at or above `cap`.
///
/// Demand is the largest excess over `cap` seen inside the stretch. A stretch
/// still open at the end of the series is closed against the last tick.
fn extract_bursts(usage: &[f64], cap: f64) -> Vec<Burst> {
    let mut bursts = Vec::new();
    let mut start: Option<u64> = None;
    let mut excess = 0f64;
    for (t, &u) in usage.iter().enumerate() {
        if u >= cap {
            if start.is_none() {
                start = Some(t as u64);
            }
            excess = excess.max(u - cap);
        } else if let Some(s) = start.take() {
            bursts.push(Burst {
                start: s,
                duration: t as u64 - s,
                excess,
            });
            excess = 0.;
        }
    }
    if let Some(s) = start {
        bursts.push(Burst {
            start: s,
            duration: usage.len() as u64 - 1 - s,
            excess,
        });
    }
    bursts
}

fn create_checkpoint(path: &str) -> SimResult<File> {
    if let Some(parent) = std::path::Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| SimError::report(path, e))?;
        }
    }
    File::create(path).map_err(|e| SimError::report(path, e))
}

fn dump_requests(path: &str, requests: &BTreeMap<u64, Vec<RequestRecord>>) -> SimResult<()> {
    let keyed: BTreeMap<String, Vec<(u64, f64)>> = requests
        .iter()
        .map(|(tick, bucket)| {
            (
                tick.to_string(),
                bucket.iter().map(|r| (r.duration, r.demand)).collect(),
            )
        })
        .collect();
    let file = create_checkpoint(path)?;
    serde_json::to_writer(BufWriter::new(file), &keyed)
        .map_err(|e| SimError::report(path, e))
}

fn dump_producers(path: &str, producers: &[ProducerRecord]) -> SimResult<()> {
    let keyed: BTreeMap<&str, &[f64]> = producers
        .iter()
        .map(|p| (p.id.as_str(), p.usage.as_slice()))
        .collect();
    let file = create_checkpoint(path)?;
    serde_json::to_writer(BufWriter::new(file), &keyed)
        .map_err(|e| SimError::report(path, e))
}
