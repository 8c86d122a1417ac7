//! Distribution reports written at the end of a replay.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use serde::Serialize;

use crate::error::{SimError, SimResult};
use crate::metrics::percentile;
use crate::workload::RequestRecord;

pub const WAIT_TIME_DIST_FILENAME: &str = "wait_time_dist.csv";
pub const MEMORY_DURATION_DIST_FILENAME: &str = "memory_duration_dist.csv";
pub const DURATION_DIST_FILENAME: &str = "duration_dist.csv";
pub const ARRIVAL_DIST_FILENAME: &str = "arrival_dist.csv";
pub const MACHINE_RANK_FILENAME: &str = "machine_rank.json";

/// Default histogram bucket width for task durations.
pub const DURATION_BUCKET_WIDTH: u64 = 10_000_000;

fn csv_writer(path: &Path) -> SimResult<csv::Writer<File>> {
    csv::Writer::from_path(path).map_err(|e| SimError::report(&path.to_string_lossy(), e))
}

fn csv_error(path: &Path, e: csv::Error) -> SimError {
    SimError::report(&path.to_string_lossy(), e)
}

#[derive(Debug, Serialize)]
struct WaitTimeRow {
    percentile: u8,
    wait_time: u64,
}

/// Wait time percentile table, one row per percentile 1..=100.
pub fn write_wait_time_distribution(path: &Path, sorted_waits: &[u64]) -> SimResult<()> {
    if sorted_waits.is_empty() {
        log::warn!("no wait time samples, skipping {}", path.display());
        return Ok(());
    }
    let mut writer = csv_writer(path)?;
    for p in 1..=100u8 {
        writer
            .serialize(WaitTimeRow {
                percentile: p,
                wait_time: percentile(sorted_waits, p),
            })
            .map_err(|e| csv_error(path, e))?;
    }
    writer.flush().map_err(|e| SimError::report(&path.to_string_lossy(), e))
}

#[derive(Debug, Serialize)]
struct MemoryDurationRow {
    #[serde(rename = "%")]
    percent: u8,
    memory: f64,
    duration: u64,
}

/// Joint CDF table of request demand and duration: row 0 holds the minima,
/// rows 1..=100 the percentiles of the independently sorted samples.
pub fn write_memory_duration_cdf(
    path: &Path,
    requests: &BTreeMap<u64, Vec<RequestRecord>>,
) -> SimResult<()> {
    let mut memory: Vec<f64> = Vec::new();
    let mut duration: Vec<u64> = Vec::new();
    for bucket in requests.values() {
        for request in bucket {
            memory.push(request.demand);
            duration.push(request.duration);
        }
    }
    if memory.is_empty() {
        log::warn!("no request samples, skipping {}", path.display());
        return Ok(());
    }
    memory.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    duration.sort_unstable();

    let mut writer = csv_writer(path)?;
    writer
        .serialize(MemoryDurationRow {
            percent: 0,
            memory: memory[0],
            duration: duration[0],
        })
        .map_err(|e| csv_error(path, e))?;
    for p in 1..=100u8 {
        writer
            .serialize(MemoryDurationRow {
                percent: p,
                memory: percentile(&memory, p),
                duration: percentile(&duration, p),
            })
            .map_err(|e| csv_error(path, e))?;
    }
    writer.flush().map_err(|e| SimError::report(&path.to_string_lossy(), e))
}

#[derive(Debug, Serialize)]
struct DurationBucketRow {
    duration: u64,
    count: u64,
    normalized: f64,
}

/// Histogram of task durations over fixed-width buckets. The `duration`
/// column carries the bucket index, `normalized` the share of all tasks.
pub fn write_duration_histogram(
    path: &Path,
    durations: &[u64],
    bucket_width: u64,
) -> SimResult<()> {
    if durations.is_empty() {
        log::warn!("no duration samples, skipping {}", path.display());
        return Ok(());
    }
    let mut buckets: BTreeMap<u64, u64> = BTreeMap::new();
    for &duration in durations {
        *buckets.entry(duration / bucket_width).or_default() += 1;
    }
    let total = durations.len() as f64;
    let mut writer = csv_writer(path)?;
    for (bucket, count) in buckets {
        writer
            .serialize(DurationBucketRow {
                duration: bucket,
                count,
                normalized: count as f64 / total,
            })
            .map_err(|e| csv_error(path, e))?;
    }
    writer.flush().map_err(|e| SimError::report(&path.to_string_lossy(), e))
}

#[derive(Debug, Serialize)]
struct ArrivalRow {
    time: u64,
    requests: usize,
    memory: f64,
}

/// Per-arrival-tick request count and total demand, in tick order.
pub fn write_arrival_distribution(
    path: &Path,
    requests: &BTreeMap<u64, Vec<RequestRecord>>,
) -> SimResult<()> {
    let mut writer = csv_writer(path)?;
    for (time, bucket) in requests {
        writer
            .serialize(ArrivalRow {
                time: *time,
                requests: bucket.len(),
                memory: bucket.iter().map(|r| r.demand).sum(),
            })
            .map_err(|e| csv_error(path, e))?;
    }
    writer.flush().map_err(|e| SimError::report(&path.to_string_lossy(), e))
}

/// Machine ranking as `[[machine_id, count], ...]`, busiest first. The same
/// format feeds the synthesis scan order.
pub fn write_machine_ranking(path: &Path, ranking: &[(String, u64)]) -> SimResult<()> {
    let file = File::create(path).map_err(|e| SimError::report(&path.to_string_lossy(), e))?;
    serde_json::to_writer_pretty(BufWriter::new(file), &ranking)
        .map_err(|e| SimError::report(&path.to_string_lossy(), e))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn requests_fixture() -> BTreeMap<u64, Vec<RequestRecord>> {
        let mut requests = BTreeMap::new();
        requests.insert(
            3,
            vec![RequestRecord::new(10, 4.), RequestRecord::new(20, 6.)],
        );
        requests.insert(7, vec![RequestRecord::new(5, 2.)]);
        requests
    }

    #[test]
    fn wait_time_table_has_one_row_per_percentile() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(WAIT_TIME_DIST_FILENAME);
        let waits: Vec<u64> = (0..1000).collect();
        write_wait_time_distribution(&path, &waits).unwrap();

        let mut reader = csv::Reader::from_path(&path).unwrap();
        assert_eq!(
            reader.headers().unwrap(),
            &csv::StringRecord::from(vec!["percentile", "wait_time"])
        );
        let rows: Vec<(u8, u64)> = reader
            .deserialize()
            .map(|r| r.unwrap())
            .collect();
        assert_eq!(rows.len(), 100);
        assert_eq!(rows[99], (100, 999));
        assert!(rows.windows(2).all(|w| w[0].1 <= w[1].1));
    }

    #[test]
    fn memory_duration_table_starts_at_the_minimum() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(MEMORY_DURATION_DIST_FILENAME);
        write_memory_duration_cdf(&path, &requests_fixture()).unwrap();

        let mut reader = csv::Reader::from_path(&path).unwrap();
        assert_eq!(
            reader.headers().unwrap(),
            &csv::StringRecord::from(vec!["%", "memory", "duration"])
        );
        let rows: Vec<(u8, f64, u64)> = reader
            .deserialize()
            .map(|r| r.unwrap())
            .collect();
        assert_eq!(rows.len(), 101);
        assert_eq!(rows[0], (0, 2., 5));
        assert_eq!(rows[100], (100, 6., 20));
    }

    #[test]
    fn duration_histogram_normalizes_to_one() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DURATION_DIST_FILENAME);
        let durations = vec![5, 15, 25, 25, 7];
        write_duration_histogram(&path, &durations, 10).unwrap();

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let rows: Vec<(u64, u64, f64)> = reader
            .deserialize()
            .map(|r| r.unwrap())
            .collect();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0], (0, 2, 0.4));
        assert_eq!(rows[1], (1, 1, 0.2));
        assert_eq!(rows[2], (2, 2, 0.4));
        let total: f64 = rows.iter().map(|r| r.2).sum();
        assert!((total - 1.).abs() < 1e-9);
    }

    #[test]
    fn arrival_distribution_sums_demand_per_tick() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(ARRIVAL_DIST_FILENAME);
        write_arrival_distribution(&path, &requests_fixture()).unwrap();

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let rows: Vec<(u64, usize, f64)> = reader
            .deserialize()
            .map(|r| r.unwrap())
            .collect();
        assert_eq!(rows, vec![(3, 2, 10.), (7, 1, 2.)]);
    }

    #[test]
    fn machine_ranking_round_trips_as_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(MACHINE_RANK_FILENAME);
        let ranking = vec![("m7".to_string(), 42u64), ("m1".to_string(), 3u64)];
        write_machine_ranking(&path, &ranking).unwrap();

        let file = File::open(&path).unwrap();
        let loaded: Vec<(String, u64)> = serde_json::from_reader(file).unwrap();
        assert_eq!(loaded, ranking);
    }

    #[test]
    fn empty_samples_write_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(WAIT_TIME_DIST_FILENAME);
        write_wait_time_distribution(&path, &[]).unwrap();
        assert!(!path.exists());
    }
}
