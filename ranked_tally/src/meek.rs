//! Meek single transferable vote.
//!
//! Every candidate has a keep factor: the share of the weight reaching it that it
//! keeps. Hopefuls keep everything (1), defeated candidates nothing (0), and elected
//! candidates just enough to stay at the quota. The keep factors of the elected
//! candidates are lowered iteratively until a new candidate reaches the quota, the
//! surplus becomes negligible, or the iteration stops making progress.
//! The surplus is the votes of the elected candidates above the quota, net of those
//! below it, and never negative.
//!
//! All the arithmetic happens at a fixed number of decimal digits:
//! - the weight kept by a candidate is rounded half up,
//! - the quota is rounded down, then raised by one unit,
//! - keep factors are rounded up.

use std::collections::{BTreeMap, BTreeSet};

use log::{debug, info};
use snafu::OptionExt;

use crate::ballots::{BallotSet, CandidateId};
use crate::decimal::{Decimal, Rounding};
use crate::error::{InvariantViolationSnafu, TallyResult};
use crate::rules::{RoundCount, ScoringRule};
use crate::state::{CandidateStates, Status, Tabulation};

#[derive(Debug, Clone)]
pub struct MeekDistribution {
    seats: usize,
    precision: u32,
    omega: Decimal,
    keep_factors: BTreeMap<CandidateId, Decimal>,
}

struct Distribution {
    counts: BTreeMap<CandidateId, Decimal>,
    exhausted: Decimal,
}

impl MeekDistribution {
    pub fn new(seats: usize, precision: u32, omega: Decimal) -> MeekDistribution {
        MeekDistribution {
            seats,
            precision,
            omega,
            keep_factors: BTreeMap::new(),
        }
    }

    /// The current keep factor of a candidate. Unknown candidates keep everything.
    pub fn keep_factor(&self, candidate: CandidateId) -> Decimal {
        self.keep_factors
            .get(&candidate)
            .copied()
            .unwrap_or(Decimal::ONE)
    }

    fn distribute(&self, ballots: &BallotSet, states: &CandidateStates) -> Distribution {
        let mut counts: BTreeMap<CandidateId, Decimal> = BTreeMap::new();
        let mut exhausted = Decimal::ZERO;
        for cb in ballots.counted() {
            let mut weight = Decimal::ONE;
            for vote in cb.ballot.votes() {
                if weight.is_zero() {
                    break;
                }
                if !states.is_standing(vote.candidate) {
                    continue;
                }
                let kept = weight.mul(
                    self.keep_factor(vote.candidate),
                    self.precision,
                    Rounding::HalfUp,
                );
                *counts.entry(vote.candidate).or_default() += kept.times(cb.count);
                weight -= kept;
            }
            exhausted += weight.times(cb.count);
        }
        Distribution { counts, exhausted }
    }

    fn quota(&self, total: Decimal, round: u32) -> TallyResult<Decimal> {
        let share = total
            .checked_div(
                Decimal::from(self.seats as u64 + 1),
                self.precision,
                Rounding::Down,
            )
            .context(InvariantViolationSnafu {
                round,
                message: format!("cannot compute the quota of {}", total),
            })?;
        Ok(share + Decimal::unit(self.precision))
    }

    // New keep factors for the elected candidates, rounded up.
    fn updated_keep_factors(
        &self,
        elected: &BTreeSet<CandidateId>,
        counts: &BTreeMap<CandidateId, Decimal>,
        quota: Decimal,
    ) -> BTreeMap<CandidateId, Decimal> {
        elected
            .iter()
            .map(|cid| {
                let current = self.keep_factor(*cid);
                let votes = counts.get(cid).copied().unwrap_or(Decimal::ZERO);
                let updated = current
                    .checked_mul_div(quota, votes, self.precision, Rounding::Up)
                    .unwrap_or(current);
                (*cid, updated)
            })
            .collect()
    }
}

// The votes above the quota, net of the elected candidates that fell below it.
fn total_surplus(votes: impl Iterator<Item = Decimal>, quota: Decimal) -> Decimal {
    votes.map(|v| v - quota).sum::<Decimal>().max(Decimal::ZERO)
}

impl ScoringRule for MeekDistribution {
    fn count(
        &mut self,
        ballots: &BallotSet,
        states: &mut CandidateStates,
        round: u32,
    ) -> TallyResult<RoundCount> {
        for cid in states.standing() {
            self.keep_factors.entry(cid).or_insert(Decimal::ONE);
        }
        let elected = states.elected();
        let mut iteration = 0;
        loop {
            iteration += 1;
            let Distribution { counts, exhausted } = self.distribute(ballots, states);
            states.reset_counts();
            for cid in states.standing() {
                let votes = counts.get(&cid).copied().unwrap_or(Decimal::ZERO);
                states.set_vote_count(cid, votes)?;
            }
            let total: Decimal = counts.values().sum();
            let quota = self.quota(total, round)?;
            let reached: BTreeSet<CandidateId> = states
                .hopefuls()
                .into_iter()
                .filter(|cid| states.vote_count(*cid) >= quota)
                .collect();
            let surplus = total_surplus(
                elected
                    .iter()
                    .chain(reached.iter())
                    .map(|cid| states.vote_count(*cid)),
                quota,
            );
            debug!(
                "meek round {} iteration {}: quota {} surplus {} exhausted {}",
                round, iteration, quota, surplus, exhausted
            );
            let res = RoundCount {
                quota: Some(quota),
                surplus,
                exhausted,
                ..RoundCount::default()
            };
            if !reached.is_empty() {
                info!("meek round {}: {:?} reached the quota {}", round, reached, quota);
                return Ok(res);
            }
            if elected.is_empty() || surplus < self.omega {
                return Ok(res);
            }
            let updated = self.updated_keep_factors(&elected, &counts, quota);
            let changed = updated.iter().any(|(cid, kf)| *kf != self.keep_factor(*cid));
            let increased = updated.iter().any(|(cid, kf)| *kf > self.keep_factor(*cid));
            if !changed || increased {
                debug!(
                    "meek round {}: stasis after {} iterations (changed: {}, increased: {})",
                    round, iteration, changed, increased
                );
                return Ok(res);
            }
            debug!("meek round {}: keep factors {:?}", round, updated);
            self.keep_factors.extend(updated);
        }
    }

    fn committed(&mut self, transitions: &Tabulation) {
        for (cid, status) in transitions.iter() {
            if *status == Status::Defeated {
                self.keep_factors.insert(*cid, Decimal::ZERO);
            }
        }
    }
}
