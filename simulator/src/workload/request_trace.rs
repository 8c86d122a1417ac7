//! Reader for splittable request traces and producer usage checkpoints.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;

use rustc_hash::FxHashMap;
use serde::Deserialize;

use crate::error::{SimError, SimResult};
use crate::workload::records::{ProducerRecord, RequestRecord};

/// Loads the checkpoint pair produced by request synthesis.
///
/// `request_path` maps stringified arrival ticks to `[duration, demand]`
/// pairs; `producer_path` maps producer ids to per-tick usage vectors. Both
/// files carry values already scaled to absolute units, so `producer_size`
/// here only fixes the capacity the usage is measured against.
#[derive(Debug, Clone, Deserialize)]
pub struct RequestTraceReader {
    pub request_path: String,
    pub producer_path: String,
    #[serde(default = "default_producer_size")]
    pub producer_size: f64,
}

fn default_producer_size() -> f64 {
    64.
}

impl RequestTraceReader {
    pub fn from_options(options: &serde_yaml::Value) -> SimResult<Self> {
        serde_yaml::from_value(options.clone())
            .map_err(|e| SimError::InvalidConfig(format!("request trace options: {}", e)))
    }

    /// Reads arrival-bucketed requests, keyed and ordered by arrival tick.
    pub fn read_requests(&self) -> SimResult<BTreeMap<u64, Vec<RequestRecord>>> {
        let file = File::open(&self.request_path)
            .map_err(|e| SimError::missing_input(&self.request_path, e))?;
        let raw: FxHashMap<String, serde_json::Value> =
            serde_json::from_reader(BufReader::new(file))
                .map_err(|e| SimError::malformed_record(&self.request_path, e))?;

        let mut skipped = 0u64;
        let mut requests: BTreeMap<u64, Vec<RequestRecord>> = BTreeMap::new();
        for (key, value) in raw {
            let arrival = match key.parse::<u64>() {
                Ok(tick) => tick,
                Err(_) => {
                    skipped += 1;
                    log::warn!(
                        "skipping arrival bucket with non-numeric tick {:?} in {}",
                        key,
                        self.request_path
                    );
                    continue;
                }
            };
            match serde_json::from_value::<Vec<(u64, f64)>>(value) {
                Ok(pairs) => {
                    let bucket = requests.entry(arrival).or_default();
                    bucket.extend(pairs.into_iter().map(|(d, m)| RequestRecord::new(d, m)));
                }
                Err(e) => {
                    skipped += 1;
                    log::warn!(
                        "skipping malformed arrival bucket {} in {}: {}",
                        arrival,
                        self.request_path,
                        e
                    );
                }
            }
        }
        if skipped > 0 {
            log::warn!(
                "skipped {} malformed buckets in {}",
                skipped,
                self.request_path
            );
        }
        Ok(requests)
    }

    /// Reads producer usage series, sorted by producer id for a stable
    /// placement order.
    pub fn read_producers(&self) -> SimResult<Vec<ProducerRecord>> {
        let file = File::open(&self.producer_path)
            .map_err(|e| SimError::missing_input(&self.producer_path, e))?;
        let raw: FxHashMap<String, serde_json::Value> =
            serde_json::from_reader(BufReader::new(file))
                .map_err(|e| SimError::malformed_record(&self.producer_path, e))?;

        let mut skipped = 0u64;
        let mut producers = Vec::with_capacity(raw.len());
        for (id, value) in raw {
            match serde_json::from_value::<Vec<f64>>(value) {
                Ok(usage) => producers.push(ProducerRecord { id, usage }),
                Err(e) => {
                    skipped += 1;
                    log::warn!(
                        "skipping producer {} with malformed usage in {}: {}",
                        id,
                        self.producer_path,
                        e
                    );
                }
            }
        }
        if skipped > 0 {
            log::warn!(
                "skipped {} malformed producers in {}",
                skipped,
                self.producer_path
            );
        }

        producers.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(producers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_json(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    fn reader(requests: &tempfile::NamedTempFile, producers: &tempfile::NamedTempFile) -> RequestTraceReader {
        RequestTraceReader {
            request_path: requests.path().to_str().unwrap().to_string(),
            producer_path: producers.path().to_str().unwrap().to_string(),
            producer_size: 64.,
        }
    }

    #[test]
    fn requests_are_ordered_by_arrival_tick() {
        let requests = write_json(r#"{"20": [[3, 16.0]], "5": [[2, 8.0], [4, 24.0]]}"#);
        let producers = write_json(r#"{}"#);
        let loaded = reader(&requests, &producers).read_requests().unwrap();
        let arrivals: Vec<u64> = loaded.keys().copied().collect();
        assert_eq!(arrivals, vec![5, 20]);
        assert_eq!(loaded[&5].len(), 2);
        assert_eq!(loaded[&5][0], RequestRecord::new(2, 8.));
        assert_eq!(loaded[&20][0], RequestRecord::new(3, 16.));
    }

    #[test]
    fn malformed_buckets_are_skipped() {
        let requests = write_json(r#"{"5": [[2, 8.0]], "later": [[2, 8.0]], "7": "oops"}"#);
        let producers = write_json(r#"{}"#);
        let loaded = reader(&requests, &producers).read_requests().unwrap();
        assert_eq!(loaded.len(), 1);
        assert!(loaded.contains_key(&5));
    }

    #[test]
    fn producers_come_back_sorted_by_id() {
        let requests = write_json(r#"{}"#);
        let producers = write_json(r#"{"m_2": [1.0, 2.0], "m_1": [0.5], "m_0": "bad"}"#);
        let loaded = reader(&requests, &producers).read_producers().unwrap();
        let ids: Vec<&str> = loaded.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["m_1", "m_2"]);
        assert_eq!(loaded[0].usage, vec![0.5]);
    }
}
