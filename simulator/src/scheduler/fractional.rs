//! Fractional placement with a per-tick backlog.

use rustc_hash::FxHashSet;
use serde::Serialize;

use crate::capacity::UsageSeries;
use crate::error::{SimError, SimResult};
use crate::scheduler::PlacementState;
use crate::workload::{ProducerRecord, RequestRecord};

/// A producer machine under replay.
pub struct Producer {
    pub id: String,
    pub series: UsageSeries,
    /// Fractions committed to this producer so far.
    pub placed_fractions: u64,
}

/// A request waiting in the backlog.
#[derive(Debug, Clone, Serialize)]
pub struct PendingRequest {
    pub arrival: u64,
    pub duration: u64,
    /// Demand of the whole request, before splitting.
    pub demand: f64,
    pub splits_left: u32,
    pub state: PlacementState,
}

impl PendingRequest {
    /// Demand still waiting for capacity.
    pub fn remaining_demand(&self, split_factor: u32) -> f64 {
        self.demand * self.splits_left as f64 / split_factor as f64
    }
}

/// Splits every request into `split_factor` equal fractions and best-fit
/// packs each fraction onto the producer with the least spare headroom that
/// still sustains it for the full duration.
///
/// Fractions that find no producer stay in the backlog and are retried every
/// tick until placed or until the trace horizon passes.
pub struct FractionalScheduler {
    split_factor: u32,
    producers: Vec<Producer>,
    backlog: Vec<PendingRequest>,
    submitted: u64,
    fully_placed: u64,
}

impl FractionalScheduler {
    pub fn new(
        split_factor: u32,
        producers: Vec<ProducerRecord>,
        producer_size: f64,
    ) -> SimResult<Self> {
        if split_factor == 0 {
            return Err(SimError::InvalidConfig(
                "split_factor must be at least 1".to_string(),
            ));
        }
        let producers = producers
            .into_iter()
            .map(|p| Producer {
                id: p.id,
                series: UsageSeries::new(producer_size, p.usage),
                placed_fractions: 0,
            })
            .collect();
        Ok(Self {
            split_factor,
            producers,
            backlog: Vec::new(),
            submitted: 0,
            fully_placed: 0,
        })
    }

    pub fn submit(&mut self, request: &RequestRecord, arrival: u64) {
        self.submitted += 1;
        self.backlog.push(PendingRequest {
            arrival,
            duration: request.duration,
            demand: request.demand,
            splits_left: self.split_factor,
            state: PlacementState::Pending,
        });
    }

    /// Last tick any producer series covers.
    pub fn horizon(&self) -> u64 {
        self.producers
            .iter()
            .map(|p| p.series.len())
            .max()
            .unwrap_or(0) as u64
    }

    pub fn submitted(&self) -> u64 {
        self.submitted
    }

    pub fn pending(&self) -> usize {
        self.backlog.len()
    }

    pub fn fully_placed(&self) -> u64 {
        self.fully_placed
    }

    pub fn producers(&self) -> &[Producer] {
        &self.producers
    }

    pub fn backlog(&self) -> &[PendingRequest] {
        &self.backlog
    }

    /// One placement pass over the backlog at `tick`.
    ///
    /// Each pending fraction is admitted only if its demand is sustained for
    /// the full request duration starting at this very tick. Within the pass
    /// for one request, fractions go to distinct producers. Requests with all
    /// fractions placed leave the backlog.
    pub fn run_tick(&mut self, tick: u64) {
        let tick = tick as usize;
        let split_factor = self.split_factor;
        let producers = &mut self.producers;

        for entry in self.backlog.iter_mut() {
            let sub_demand = entry.demand / split_factor as f64;
            let duration = entry.duration as usize;
            let mut taken: FxHashSet<usize> = FxHashSet::default();
            for _ in 0..entry.splits_left {
                let Some(best) = best_fit(producers, tick, duration, sub_demand, &taken) else {
                    break;
                };
                producers[best].series.apply(tick, duration, sub_demand);
                producers[best].placed_fractions += 1;
                taken.insert(best);
                entry.splits_left -= 1;
            }
            if entry.splits_left == 0 {
                entry.state = PlacementState::Placed;
            } else if entry.splits_left < split_factor {
                entry.state = PlacementState::PartiallyPlaced;
            }
        }

        let before = self.backlog.len();
        self.backlog.retain(|e| e.state != PlacementState::Placed);
        self.fully_placed += (before - self.backlog.len()) as u64;
    }

    /// Drains the backlog at end of trace, marking every leftover request
    /// unassigned. Leftovers are an outcome to report, not an error.
    pub fn drain_unassigned(&mut self) -> Vec<PendingRequest> {
        let mut unassigned = std::mem::take(&mut self.backlog);
        for entry in unassigned.iter_mut() {
            entry.state = PlacementState::UnassignedAtHorizon;
        }
        unassigned
    }

    /// Producers ranked by hosted fractions, busiest first.
    pub fn placement_ranking(&self) -> Vec<(String, u64)> {
        let mut ranking: Vec<(String, u64)> = self
            .producers
            .iter()
            .map(|p| (p.id.clone(), p.placed_fractions))
            .collect();
        ranking.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranking
    }
}

/// Best-fit choice: the qualifying producer with the least spare headroom
/// over the window. Ties go to the first producer in id order.
fn best_fit(
    producers: &[Producer],
    tick: usize,
    duration: usize,
    demand: f64,
    taken: &FxHashSet<usize>,
) -> Option<usize> {
    let mut best: Option<(f64, usize)> = None;
    for (idx, producer) in producers.iter().enumerate() {
        if taken.contains(&idx) {
            continue;
        }
        if let Some(min_free) = producer.series.fits_window(tick, duration, demand) {
            if best.map_or(true, |(free, _)| min_free < free) {
                best = Some((min_free, idx));
            }
        }
    }
    best.map(|(_, idx)| idx)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn producer(id: &str, usage: Vec<f64>) -> ProducerRecord {
        ProducerRecord {
            id: id.to_string(),
            usage,
        }
    }

    #[test]
    fn fractions_of_one_request_go_to_distinct_producers() {
        let producers = vec![
            producer("p0", vec![0.; 4]),
            producer("p1", vec![0.; 4]),
            producer("p2", vec![0.; 4]),
        ];
        let mut scheduler = FractionalScheduler::new(2, producers, 64.).unwrap();
        scheduler.submit(&RequestRecord::new(4, 80.), 0);
        scheduler.run_tick(0);
        assert_eq!(scheduler.pending(), 0);
        assert_eq!(scheduler.fully_placed(), 1);
        let hosts: Vec<u64> = scheduler
            .producers()
            .iter()
            .map(|p| p.placed_fractions)
            .collect();
        assert_eq!(hosts.iter().sum::<u64>(), 2);
        assert!(hosts.iter().all(|&h| h <= 1));
        // 40 units on each hosting producer.
        for p in scheduler.producers() {
            if p.placed_fractions == 1 {
                assert_eq!(p.series.usage(0), 40.);
                assert_eq!(p.series.usage(3), 40.);
            }
        }
    }

    #[test]
    fn best_fit_prefers_the_tightest_producer() {
        let producers = vec![
            producer("p0", vec![10., 10.]),
            producer("p1", vec![50., 50.]),
        ];
        let mut scheduler = FractionalScheduler::new(1, producers, 64.).unwrap();
        scheduler.submit(&RequestRecord::new(2, 10.), 0);
        scheduler.run_tick(0);
        // p1 has 14 free against p0's 54, so the tighter p1 hosts it.
        assert_eq!(scheduler.producers()[1].placed_fractions, 1);
        assert_eq!(scheduler.producers()[1].series.usage(0), 60.);
        assert_eq!(scheduler.producers()[0].placed_fractions, 0);
    }

    #[test]
    fn unplaced_fractions_wait_for_a_later_tick() {
        let producers = vec![producer("p0", vec![60., 60., 0., 0.])];
        let mut scheduler = FractionalScheduler::new(2, producers, 64.).unwrap();
        scheduler.submit(&RequestRecord::new(2, 16.), 0);
        scheduler.run_tick(0);
        // Only 4 units free on ticks 0 and 1, no fraction fits yet.
        assert_eq!(scheduler.pending(), 1);
        assert_eq!(scheduler.backlog()[0].state, PlacementState::Pending);
        scheduler.run_tick(1);
        assert_eq!(scheduler.pending(), 1);
        scheduler.run_tick(2);
        // Both fractions now fit on [2, 4), but within one pass they need
        // distinct producers, so only one lands.
        assert_eq!(scheduler.backlog().first().map(|e| e.splits_left), Some(1));
        assert_eq!(scheduler.backlog()[0].state, PlacementState::PartiallyPlaced);
        // At tick 3 the window would run past the series end.
        scheduler.run_tick(3);
        assert_eq!(scheduler.pending(), 1);
        let leftovers = scheduler.drain_unassigned();
        assert_eq!(leftovers.len(), 1);
        assert_eq!(leftovers[0].state, PlacementState::UnassignedAtHorizon);
        assert_eq!(leftovers[0].remaining_demand(2), 8.);
    }

    #[test]
    fn zero_split_factor_is_rejected() {
        assert!(FractionalScheduler::new(0, vec![], 64.).is_err());
    }

    #[test]
    fn ranking_orders_producers_by_hosted_fractions() {
        let producers = vec![
            producer("a", vec![0.; 6]),
            producer("b", vec![62.; 6]),
            producer("c", vec![0.; 6]),
        ];
        let mut scheduler = FractionalScheduler::new(1, producers, 64.).unwrap();
        scheduler.submit(&RequestRecord::new(2, 8.), 0);
        scheduler.submit(&RequestRecord::new(2, 8.), 0);
        scheduler.submit(&RequestRecord::new(2, 1.), 0);
        scheduler.run_tick(0);
        // Both 8-unit requests stack on "a" (tightest fit after the first
        // lands), the 1-unit request squeezes onto the nearly full "b".
        let ranking = scheduler.placement_ranking();
        assert_eq!(
            ranking,
            vec![
                ("a".to_string(), 2),
                ("b".to_string(), 1),
                ("c".to_string(), 0)
            ]
        );
    }
}
