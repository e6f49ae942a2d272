//! Choosing the hopefuls to defeat in a round.

use std::collections::BTreeSet;

use log::debug;
use snafu::{ensure, OptionExt};

use crate::ballots::CandidateId;
use crate::config::EliminationAlgorithm;
use crate::decimal::Decimal;
use crate::error::{ArgumentSnafu, InvariantViolationSnafu, TallyResult};
use crate::pairwise::PairwiseGraph;
use crate::state::CandidateStates;
use crate::tiebreak::{resolve_loser, Tiebreaker};
use crate::top_cycle::{TopCycle, TopCycleKind};

#[derive(Eq, PartialEq, Debug, Clone)]
pub enum BatchDecision {
    /// Candidates that can be defeated together without changing the outcome.
    Batch(BTreeSet<CandidateId>),
    /// A single loser picked by the tiebreaker among candidates with equal counts.
    TieBroken(BTreeSet<CandidateId>),
    /// No safe batch exists. The caller should defeat one candidate instead.
    Conflict,
}

/// What an eliminator may look at. Everything is borrowed for the duration of a round.
#[derive(Debug, Clone, Copy)]
pub struct EliminationContext<'a> {
    pub states: &'a CandidateStates,
    pub surplus: Decimal,
    pub graph: Option<&'a PairwiseGraph>,
    pub tiebreaker: &'a dyn Tiebreaker,
    pub round: u32,
}

pub trait BatchEliminator: std::fmt::Debug {
    fn get_elimination_candidates(&self, ctx: &EliminationContext) -> TallyResult<BatchDecision>;
}

/// Defeats the weakest hopefuls as a group, as long as together (and with the surplus
/// still to be transferred) they cannot catch up with the weakest hopeful kept.
#[derive(Debug, Clone)]
pub struct RunoffBatchEliminator {
    pub seats: usize,
}

impl BatchEliminator for RunoffBatchEliminator {
    fn get_elimination_candidates(&self, ctx: &EliminationContext) -> TallyResult<BatchDecision> {
        let states = ctx.states;
        let elected = states.elected().len();
        let mut losers: Vec<(CandidateId, Decimal)> = states
            .hopefuls()
            .into_iter()
            .map(|cid| (cid, states.vote_count(cid)))
            .collect();
        ensure!(
            losers.len() >= 2,
            ArgumentSnafu {
                message: format!(
                    "batch elimination needs at least two hopefuls, found {}",
                    losers.len()
                ),
            }
        );
        ensure!(
            elected + losers.len() > self.seats,
            ArgumentSnafu {
                message: format!(
                    "{} elected and {} hopefuls leave nobody to eliminate for {} seats",
                    elected,
                    losers.len(),
                    self.seats
                ),
            }
        );
        // Descending by votes, then by id.
        losers.sort_by(|(c1, v1), (c2, v2)| v2.cmp(v1).then(c1.cmp(c2)));
        let mut losers = std::collections::VecDeque::from(losers);
        let mut retained: Vec<(CandidateId, Decimal)> = Vec::new();
        let mut min_retained = Decimal::ZERO;

        while let Some(strongest) = losers.pop_front() {
            min_retained = strongest.1;
            retained.push(strongest);
            if losers.len() <= 1 {
                break;
            }
            let losers_total: Decimal = losers.iter().map(|(_, v)| *v).sum();
            let short_of_seats = elected + retained.len() < self.seats;
            let could_overtake = losers_total + ctx.surplus >= min_retained;
            debug!(
                "batch: retained {} (min {}), losers total {} surplus {}",
                retained.len(),
                min_retained,
                losers_total,
                ctx.surplus
            );
            if !short_of_seats && !could_overtake {
                break;
            }
        }

        let losers_total: Decimal = losers.iter().map(|(_, v)| *v).sum();
        if losers_total + ctx.surplus < min_retained {
            let batch: BTreeSet<CandidateId> = losers.iter().map(|(cid, _)| *cid).collect();
            debug!("batch: eliminating {:?}", batch);
            return Ok(BatchDecision::Batch(batch));
        }
        match losers.front() {
            Some(&(last, votes)) if losers.len() == 1 && votes == min_retained => {
                let mut pool: BTreeSet<CandidateId> = retained
                    .iter()
                    .filter(|(_, v)| *v == votes)
                    .map(|(cid, _)| *cid)
                    .collect();
                pool.insert(last);
                let loser = resolve_loser(ctx.tiebreaker, &pool, ctx.round)?;
                debug!("batch: tie {:?} broken against {}", pool, loser);
                Ok(BatchDecision::TieBroken([loser].into_iter().collect()))
            }
            _ => {
                debug!("batch: no safe batch with surplus {}", ctx.surplus);
                Ok(BatchDecision::Conflict)
            }
        }
    }
}

/// Defeats every hopeful outside the top cycle of the standing candidates.
#[derive(Debug, Clone)]
pub struct TopCycleBatchEliminator {
    pub kind: TopCycleKind,
    pub seats: usize,
}

impl BatchEliminator for TopCycleBatchEliminator {
    fn get_elimination_candidates(&self, ctx: &EliminationContext) -> TallyResult<BatchDecision> {
        let graph = ctx.graph.context(InvariantViolationSnafu {
            round: ctx.round,
            message: "top cycle elimination without a pairwise graph".to_string(),
        })?;
        let top = TopCycle::new(graph, &ctx.states.excluded()).compute(self.kind);
        let hopefuls = ctx.states.hopefuls();
        let outside: BTreeSet<CandidateId> = hopefuls.difference(&top).copied().collect();
        debug!("top cycle {:?}: {:?}, outside {:?}", self.kind, top, outside);
        let left = ctx.states.elected().len() + hopefuls.len() - outside.len();
        if !outside.is_empty() && left < self.seats {
            return Ok(BatchDecision::Conflict);
        }
        Ok(BatchDecision::Batch(outside))
    }
}

/// The hopeful with the fewest votes. Ties go through the tiebreaker.
pub fn eliminate_lowest(ctx: &EliminationContext) -> TallyResult<CandidateId> {
    let hopefuls = ctx.states.hopefuls();
    let lowest = hopefuls
        .iter()
        .map(|cid| ctx.states.vote_count(*cid))
        .min()
        .context(ArgumentSnafu {
            message: "no hopeful left to eliminate".to_string(),
        })?;
    let pool: BTreeSet<CandidateId> = hopefuls
        .into_iter()
        .filter(|cid| ctx.states.vote_count(*cid) == lowest)
        .collect();
    resolve_loser(ctx.tiebreaker, &pool, ctx.round)
}

/// Elimination by vote count, in batch when the rules allow it and a safe batch exists.
pub fn eliminate_by_votes(
    ctx: &EliminationContext,
    algorithm: EliminationAlgorithm,
    seats: usize,
) -> TallyResult<BTreeSet<CandidateId>> {
    if algorithm == EliminationAlgorithm::Batch && ctx.states.hopefuls().len() >= 2 {
        let eliminator = RunoffBatchEliminator { seats };
        match eliminator.get_elimination_candidates(ctx)? {
            BatchDecision::Batch(batch) | BatchDecision::TieBroken(batch) if !batch.is_empty() => {
                return Ok(batch);
            }
            _ => {}
        }
    }
    Ok([eliminate_lowest(ctx)?].into_iter().collect())
}
