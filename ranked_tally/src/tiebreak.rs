//! Strategies to break ties between candidates with the same vote count.
//!
//! Every strategy is told about the counts of each round through `update_tiebreaker`
//! and answers `get_tie_winners` with the subset of a tied pool that it considers
//! stronger. A strategy may fail to narrow the pool, in which case it returns the
//! pool unchanged and the next strategy of a chain takes over.

use std::collections::{BTreeMap, BTreeSet};

use log::debug;
use snafu::ensure;

use crate::ballots::CandidateId;
use crate::config::TiebreakMode;
use crate::error::{TallyResult, UnresolvedTieSnafu};
use crate::state::CandidateStates;

pub trait Tiebreaker: std::fmt::Debug {
    /// Records the counts of the round that was just tabulated.
    fn update_tiebreaker(&mut self, states: &CandidateStates);

    /// The members of the pool that win the tie. May be the whole pool when this
    /// strategy cannot tell the candidates apart.
    fn get_tie_winners(&self, pool: &BTreeSet<CandidateId>) -> BTreeSet<CandidateId>;

    /// True once this strategy can decide any tie among the candidates it tracks.
    fn fully_informed(&self) -> bool;
}

/// Pairwise outcomes of past rounds: `beats[(a, b)]` is true when `a` had more votes
/// than `b` in the round that decided the pair.
#[derive(Debug, Clone, Default)]
struct History {
    beats: BTreeMap<(CandidateId, CandidateId), bool>,
    tracked: BTreeSet<CandidateId>,
}

impl History {
    fn record(&mut self, states: &CandidateStates, overwrite: bool) {
        let standing: Vec<(CandidateId, crate::Decimal)> = states
            .standing()
            .into_iter()
            .map(|cid| (cid, states.vote_count(cid)))
            .collect();
        self.tracked.extend(standing.iter().map(|(cid, _)| *cid));
        for (idx, (a, va)) in standing.iter().enumerate() {
            for (b, vb) in standing[idx + 1..].iter() {
                if va == vb || (!overwrite && self.beats.contains_key(&(*a, *b))) {
                    continue;
                }
                self.beats.insert((*a, *b), va > vb);
                self.beats.insert((*b, *a), vb > va);
            }
        }
    }

    fn is_beaten(&self, candidate: CandidateId, pool: &BTreeSet<CandidateId>) -> bool {
        pool.iter()
            .any(|other| self.beats.get(&(*other, candidate)).copied().unwrap_or(false))
    }

    fn undominated(&self, pool: &BTreeSet<CandidateId>) -> BTreeSet<CandidateId> {
        let winners: BTreeSet<CandidateId> = pool
            .iter()
            .filter(|c| !self.is_beaten(**c, pool))
            .copied()
            .collect();
        // A cycle in the recorded outcomes leaves nobody undominated.
        if winners.is_empty() {
            pool.clone()
        } else {
            winners
        }
    }

    fn complete(&self) -> bool {
        let n = self.tracked.len();
        self.beats.len() == n * n.saturating_sub(1)
    }
}

/// The first round in which two candidates had different counts decides between them,
/// once and for all.
#[derive(Debug, Clone, Default)]
pub struct FirstDifferenceTiebreaker {
    history: History,
}

impl Tiebreaker for FirstDifferenceTiebreaker {
    fn update_tiebreaker(&mut self, states: &CandidateStates) {
        self.history.record(states, false);
    }

    fn get_tie_winners(&self, pool: &BTreeSet<CandidateId>) -> BTreeSet<CandidateId> {
        self.history.undominated(pool)
    }

    fn fully_informed(&self) -> bool {
        self.history.complete()
    }
}

/// The most recent round in which two candidates had different counts decides between
/// them.
#[derive(Debug, Clone, Default)]
pub struct LastDifferenceTiebreaker {
    history: History,
}

impl Tiebreaker for LastDifferenceTiebreaker {
    fn update_tiebreaker(&mut self, states: &CandidateStates) {
        self.history.record(states, true);
    }

    fn get_tie_winners(&self, pool: &BTreeSet<CandidateId>) -> BTreeSet<CandidateId> {
        self.history.undominated(pool)
    }

    fn fully_informed(&self) -> bool {
        self.history.complete()
    }
}

/// The candidate declared first in the roster wins.
#[derive(Debug, Clone, Default)]
pub struct CandidateOrderTiebreaker {}

impl Tiebreaker for CandidateOrderTiebreaker {
    fn update_tiebreaker(&mut self, _states: &CandidateStates) {}

    fn get_tie_winners(&self, pool: &BTreeSet<CandidateId>) -> BTreeSet<CandidateId> {
        pool.iter().next().copied().into_iter().collect()
    }

    fn fully_informed(&self) -> bool {
        true
    }
}

/// A pseudo-random but reproducible choice.
///
/// Candidates are ordered by the SHA-256 digest of the seed, the round number and their
/// name. The smallest digest wins.
#[derive(Debug, Clone)]
pub struct RandomTiebreaker {
    seed: u32,
    round: u32,
    names: BTreeMap<CandidateId, String>,
}

impl RandomTiebreaker {
    pub fn new(seed: u32, names: BTreeMap<CandidateId, String>) -> RandomTiebreaker {
        RandomTiebreaker {
            seed,
            round: 0,
            names,
        }
    }

    fn digest(&self, candidate: CandidateId) -> String {
        let name = self
            .names
            .get(&candidate)
            .cloned()
            .unwrap_or_else(|| candidate.to_string());
        sha256::digest(format!("{:08}{:08}{}", self.seed, self.round, name))
    }
}

impl Tiebreaker for RandomTiebreaker {
    fn update_tiebreaker(&mut self, _states: &CandidateStates) {
        self.round += 1;
    }

    fn get_tie_winners(&self, pool: &BTreeSet<CandidateId>) -> BTreeSet<CandidateId> {
        pool.iter()
            .map(|cid| (self.digest(*cid), *cid))
            .min()
            .map(|(_, cid)| cid)
            .into_iter()
            .collect()
    }

    fn fully_informed(&self) -> bool {
        true
    }
}

/// Narrows the pool through each strategy in turn.
#[derive(Debug)]
pub struct SequentialTiebreaker {
    chain: Vec<Box<dyn Tiebreaker>>,
}

impl SequentialTiebreaker {
    pub fn new(chain: Vec<Box<dyn Tiebreaker>>) -> SequentialTiebreaker {
        SequentialTiebreaker { chain }
    }
}

impl Tiebreaker for SequentialTiebreaker {
    fn update_tiebreaker(&mut self, states: &CandidateStates) {
        for tb in self.chain.iter_mut() {
            tb.update_tiebreaker(states);
        }
    }

    fn get_tie_winners(&self, pool: &BTreeSet<CandidateId>) -> BTreeSet<CandidateId> {
        let mut current = pool.clone();
        for tb in self.chain.iter() {
            if current.len() <= 1 {
                break;
            }
            current = tb.get_tie_winners(&current);
        }
        current
    }

    fn fully_informed(&self) -> bool {
        self.chain.iter().any(|tb| tb.fully_informed())
    }
}

/// Tries every strategy on the full pool and keeps the first one that picks a
/// single candidate.
#[derive(Debug)]
pub struct SeriesTiebreaker {
    chain: Vec<Box<dyn Tiebreaker>>,
}

impl SeriesTiebreaker {
    pub fn new(chain: Vec<Box<dyn Tiebreaker>>) -> SeriesTiebreaker {
        SeriesTiebreaker { chain }
    }
}

impl Tiebreaker for SeriesTiebreaker {
    fn update_tiebreaker(&mut self, states: &CandidateStates) {
        for tb in self.chain.iter_mut() {
            tb.update_tiebreaker(states);
        }
    }

    fn get_tie_winners(&self, pool: &BTreeSet<CandidateId>) -> BTreeSet<CandidateId> {
        self.chain
            .iter()
            .map(|tb| tb.get_tie_winners(pool))
            .find(|winners| winners.len() == 1)
            .unwrap_or_else(|| pool.clone())
    }

    fn fully_informed(&self) -> bool {
        self.chain.iter().any(|tb| tb.fully_informed())
    }
}

pub fn build_tiebreaker(
    mode: &TiebreakMode,
    names: &BTreeMap<CandidateId, String>,
) -> Box<dyn Tiebreaker> {
    match mode {
        TiebreakMode::FirstDifference => Box::new(FirstDifferenceTiebreaker::default()),
        TiebreakMode::LastDifference => Box::new(LastDifferenceTiebreaker::default()),
        TiebreakMode::CandidateOrder => Box::new(CandidateOrderTiebreaker {}),
        TiebreakMode::Random(seed) => Box::new(RandomTiebreaker::new(*seed, names.clone())),
        TiebreakMode::Sequential(modes) => Box::new(SequentialTiebreaker::new(
            modes.iter().map(|m| build_tiebreaker(m, names)).collect(),
        )),
        TiebreakMode::Series(modes) => Box::new(SeriesTiebreaker::new(
            modes.iter().map(|m| build_tiebreaker(m, names)).collect(),
        )),
    }
}

/// Picks the single weakest candidate of a tied pool.
///
/// Tie winners are removed from the pool until one candidate remains.
pub fn resolve_loser(
    tiebreaker: &dyn Tiebreaker,
    pool: &BTreeSet<CandidateId>,
    round: u32,
) -> TallyResult<CandidateId> {
    let mut remaining = pool.clone();
    loop {
        if let Some(&only) = remaining.iter().next().filter(|_| remaining.len() == 1) {
            debug!("resolve_loser: {:?} -> {}", pool, only);
            return Ok(only);
        }
        let winners = tiebreaker.get_tie_winners(&remaining);
        ensure!(
            !winners.is_empty() && winners.len() < remaining.len(),
            UnresolvedTieSnafu {
                round,
                candidates: remaining.iter().copied().collect::<Vec<_>>(),
            }
        );
        remaining = remaining.difference(&winners).copied().collect();
    }
}

/// Picks the single strongest candidate of a tied pool.
pub fn resolve_winner(
    tiebreaker: &dyn Tiebreaker,
    pool: &BTreeSet<CandidateId>,
    round: u32,
) -> TallyResult<CandidateId> {
    let mut remaining = pool.clone();
    loop {
        if let Some(&only) = remaining.iter().next().filter(|_| remaining.len() == 1) {
            debug!("resolve_winner: {:?} -> {}", pool, only);
            return Ok(only);
        }
        let winners = tiebreaker.get_tie_winners(&remaining);
        ensure!(
            !winners.is_empty() && winners.len() < remaining.len(),
            UnresolvedTieSnafu {
                round,
                candidates: remaining.iter().copied().collect::<Vec<_>>(),
            }
        );
        remaining = winners;
    }
}

/// Orders a pool from the strongest to the weakest by repeatedly picking a tie winner.
pub fn tiebreak_order(
    tiebreaker: &dyn Tiebreaker,
    pool: &BTreeSet<CandidateId>,
    round: u32,
) -> TallyResult<Vec<CandidateId>> {
    let mut remaining = pool.clone();
    let mut order = Vec::with_capacity(pool.len());
    while !remaining.is_empty() {
        let winner = resolve_winner(tiebreaker, &remaining, round)?;
        remaining.remove(&winner);
        order.push(winner);
    }
    Ok(order)
}
