//! Scoring rules and elimination policies of the supported voting methods.
//!
//! A voting method is the pairing of a `ScoringRule`, which recomputes the vote counts
//! of the standing candidates at the start of every round, and an `EliminationPolicy`,
//! which turns those counts into the transitions of the round.

use std::collections::{BTreeMap, BTreeSet};

use log::debug;
use snafu::{ensure, OptionExt};

use crate::ballots::{BallotSet, CandidateId};
use crate::config::EliminationAlgorithm;
use crate::decimal::Decimal;
use crate::elimination::{
    eliminate_by_votes, BatchDecision, BatchEliminator, EliminationContext,
    TopCycleBatchEliminator,
};
use crate::error::{InvariantViolationSnafu, TallyResult};
use crate::pairwise::PairwiseGraph;
use crate::state::{CandidateStates, Status, Tabulation};
use crate::tiebreak::{resolve_winner, tiebreak_order, Tiebreaker};
use crate::top_cycle::{TopCycle, TopCycleKind};

/// What a scoring pass produced besides the vote counts.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct RoundCount {
    pub quota: Option<Decimal>,
    pub surplus: Decimal,
    pub exhausted: Decimal,
    pub graph: Option<PairwiseGraph>,
    pub smith_set: Option<BTreeSet<CandidateId>>,
    pub schwartz_set: Option<BTreeSet<CandidateId>>,
}

pub trait ScoringRule: std::fmt::Debug {
    /// Recomputes the vote counts of the standing candidates. Statuses are left alone.
    fn count(
        &mut self,
        ballots: &BallotSet,
        states: &mut CandidateStates,
        round: u32,
    ) -> TallyResult<RoundCount>;

    /// Called once the transitions of a round have been committed.
    fn committed(&mut self, _transitions: &Tabulation) {}
}

/// Read-only view of a counted round, handed to the elimination policy.
#[derive(Debug, Clone, Copy)]
pub struct RoundContext<'a> {
    pub round: u32,
    pub seats: usize,
    pub states: &'a CandidateStates,
    pub count: &'a RoundCount,
    pub tiebreaker: &'a dyn Tiebreaker,
}

impl<'a> RoundContext<'a> {
    fn elimination(&self) -> EliminationContext<'a> {
        EliminationContext {
            states: self.states,
            surplus: self.count.surplus,
            graph: self.count.graph.as_ref(),
            tiebreaker: self.tiebreaker,
            round: self.round,
        }
    }
}

pub trait EliminationPolicy: std::fmt::Debug {
    /// The transitions of this round. Must not be empty.
    fn decide(&self, ctx: &RoundContext) -> TallyResult<Tabulation>;
}

fn transitions(candidates: &BTreeSet<CandidateId>, status: Status) -> Tabulation {
    candidates.iter().map(|cid| (*cid, status)).collect()
}

fn top_cycles(graph: &PairwiseGraph) -> (BTreeSet<CandidateId>, BTreeSet<CandidateId>) {
    let tc = TopCycle::new(graph, &BTreeSet::new());
    (tc.smith_set(), tc.schwartz_set())
}

// ******** Scoring rules *********

/// Every ballot counts for its most preferred standing candidate.
///
/// A ballot whose best standing rank is shared by several candidates does not count
/// this round.
#[derive(Debug, Clone)]
pub struct FirstPreference {
    // Seats used for the threshold, if the rule has one.
    threshold_seats: Option<usize>,
    pairwise: bool,
}

impl FirstPreference {
    /// Counting with the threshold `floor(counted / (seats + 1)) + 1`.
    pub fn with_threshold(seats: usize) -> FirstPreference {
        FirstPreference {
            threshold_seats: Some(seats),
            pairwise: false,
        }
    }

    /// Counting that also builds the pairwise graph of the standing candidates.
    pub fn with_pairwise() -> FirstPreference {
        FirstPreference {
            threshold_seats: None,
            pairwise: true,
        }
    }
}

impl ScoringRule for FirstPreference {
    fn count(
        &mut self,
        ballots: &BallotSet,
        states: &mut CandidateStates,
        round: u32,
    ) -> TallyResult<RoundCount> {
        states.reset_counts();
        let mut tallies: BTreeMap<CandidateId, u64> = BTreeMap::new();
        let mut exhausted: u64 = 0;
        for cb in ballots.counted() {
            match cb.ballot.top_choices(|c| states.is_standing(c)).as_slice() {
                [single] => *tallies.entry(*single).or_insert(0) += cb.count,
                _ => exhausted += cb.count,
            }
        }
        for cid in states.standing() {
            let votes = tallies.get(&cid).copied().unwrap_or(0);
            states.set_vote_count(cid, Decimal::from(votes))?;
        }
        let counted = ballots.total() - exhausted;
        let quota = self
            .threshold_seats
            .map(|seats| Decimal::from(counted / (seats as u64 + 1) + 1));
        debug!(
            "first preference round {}: {:?}, exhausted {}, threshold {:?}",
            round, tallies, exhausted, quota
        );
        let mut res = RoundCount {
            quota,
            exhausted: Decimal::from(exhausted),
            ..RoundCount::default()
        };
        if self.pairwise {
            let graph = PairwiseGraph::build_for(states.standing(), ballots);
            let (smith, schwartz) = top_cycles(&graph);
            res.smith_set = Some(smith);
            res.schwartz_set = Some(schwartz);
            res.graph = Some(graph);
        }
        Ok(res)
    }
}

/// Borda count: a standing candidate earns, on each ballot, one point per standing
/// candidate ranked below it. Unranked candidates are below every ranked one.
#[derive(Debug, Clone, Default)]
pub struct BordaCount {}

impl ScoringRule for BordaCount {
    fn count(
        &mut self,
        ballots: &BallotSet,
        states: &mut CandidateStates,
        round: u32,
    ) -> TallyResult<RoundCount> {
        states.reset_counts();
        let standing = states.standing();
        let mut points: BTreeMap<CandidateId, u64> = BTreeMap::new();
        for cb in ballots.counted() {
            let ranked: Vec<(CandidateId, Decimal)> = cb
                .ballot
                .votes()
                .iter()
                .filter(|v| standing.contains(&v.candidate))
                .map(|v| (v.candidate, v.value))
                .collect();
            let unranked = (standing.len() - ranked.len()) as u64;
            for (cid, value) in ranked.iter() {
                let below = ranked.iter().filter(|(_, other)| value < other).count() as u64;
                *points.entry(*cid).or_insert(0) += (below + unranked) * cb.count;
            }
        }
        debug!("borda round {}: {:?}", round, points);
        for cid in standing {
            let p = points.get(&cid).copied().unwrap_or(0);
            states.set_vote_count(cid, Decimal::from(p))?;
        }
        Ok(RoundCount::default())
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum PairwiseScoreKind {
    /// Ballots minus the strongest opposition faced.
    Minimax,
    /// Number of head-to-head wins.
    RankedPairs,
}

/// Scores derived from the pairwise graph of the hopefuls. Elected candidates keep
/// their last score.
#[derive(Debug, Clone)]
pub struct PairwiseScore {
    pub kind: PairwiseScoreKind,
}

impl ScoringRule for PairwiseScore {
    fn count(
        &mut self,
        ballots: &BallotSet,
        states: &mut CandidateStates,
        round: u32,
    ) -> TallyResult<RoundCount> {
        let hopefuls = states.hopefuls();
        let graph = PairwiseGraph::build_for(hopefuls.iter().copied(), ballots);
        let total = Decimal::from(ballots.total());
        for cid in hopefuls.iter() {
            let score = match self.kind {
                PairwiseScoreKind::Minimax => {
                    let mut worst = Decimal::ZERO;
                    for other in hopefuls.iter().filter(|o| *o != cid) {
                        let (against, _) = graph.vote_count(*other, *cid)?;
                        worst = worst.max(against);
                    }
                    total - worst
                }
                PairwiseScoreKind::RankedPairs => Decimal::from(graph.wins(*cid)?.len() as u64),
            };
            states.set_vote_count(*cid, score)?;
        }
        debug!("{:?} round {}: graph over {:?}", self.kind, round, hopefuls);
        let (smith, schwartz) = top_cycles(&graph);
        Ok(RoundCount {
            graph: Some(graph),
            smith_set: Some(smith),
            schwartz_set: Some(schwartz),
            ..RoundCount::default()
        })
    }
}

// ******** Elimination policies *********

/// Elects the hopefuls at or above the quota, otherwise eliminates by vote count.
#[derive(Debug, Clone)]
pub struct QuotaPolicy {
    pub algorithm: EliminationAlgorithm,
}

impl EliminationPolicy for QuotaPolicy {
    fn decide(&self, ctx: &RoundContext) -> TallyResult<Tabulation> {
        if let Some(quota) = ctx.count.quota {
            let winners: BTreeSet<CandidateId> = ctx
                .states
                .hopefuls()
                .into_iter()
                .filter(|cid| ctx.states.vote_count(*cid) >= quota)
                .collect();
            if !winners.is_empty() {
                let open = ctx.seats.saturating_sub(ctx.states.elected().len());
                ensure!(
                    winners.len() <= open,
                    InvariantViolationSnafu {
                        round: ctx.round,
                        message: format!(
                            "{} candidates reached the quota {} for {} open seats",
                            winners.len(),
                            quota,
                            open
                        ),
                    }
                );
                return Ok(transitions(&winners, Status::Elected));
            }
        }
        let losers = eliminate_by_votes(&ctx.elimination(), self.algorithm, ctx.seats)?;
        Ok(transitions(&losers, Status::Defeated))
    }
}

/// Defeats the hopefuls outside the top cycle. When they all belong to it, eliminates
/// by first preferences.
#[derive(Debug, Clone)]
pub struct TopCyclePolicy {
    pub kind: TopCycleKind,
    pub algorithm: EliminationAlgorithm,
}

impl EliminationPolicy for TopCyclePolicy {
    fn decide(&self, ctx: &RoundContext) -> TallyResult<Tabulation> {
        let elimination = ctx.elimination();
        let eliminator = TopCycleBatchEliminator {
            kind: self.kind,
            seats: ctx.seats,
        };
        if let BatchDecision::Batch(outside) = eliminator.get_elimination_candidates(&elimination)? {
            if !outside.is_empty() {
                return Ok(transitions(&outside, Status::Defeated));
            }
        }
        let losers = eliminate_by_votes(&elimination, self.algorithm, ctx.seats)?;
        Ok(transitions(&losers, Status::Defeated))
    }
}

/// Elects the hopeful with the highest count.
#[derive(Debug, Clone, Default)]
pub struct HighestScorePolicy {}

impl EliminationPolicy for HighestScorePolicy {
    fn decide(&self, ctx: &RoundContext) -> TallyResult<Tabulation> {
        let hopefuls = ctx.states.hopefuls();
        let best = hopefuls
            .iter()
            .map(|cid| ctx.states.vote_count(*cid))
            .max()
            .context(InvariantViolationSnafu {
                round: ctx.round,
                message: "no hopeful left to elect".to_string(),
            })?;
        let pool: BTreeSet<CandidateId> = hopefuls
            .into_iter()
            .filter(|cid| ctx.states.vote_count(*cid) == best)
            .collect();
        let winner = resolve_winner(ctx.tiebreaker, &pool, ctx.round)?;
        Ok([(winner, Status::Elected)].into_iter().collect())
    }
}

/// Elects the source of the ranked pairs order of the hopefuls.
#[derive(Debug, Clone, Default)]
pub struct RankedPairsPolicy {}

impl EliminationPolicy for RankedPairsPolicy {
    fn decide(&self, ctx: &RoundContext) -> TallyResult<Tabulation> {
        let graph = ctx.count.graph.as_ref().context(InvariantViolationSnafu {
            round: ctx.round,
            message: "ranked pairs without a pairwise graph".to_string(),
        })?;
        let sources = ranked_pairs_sources(graph, ctx.tiebreaker, ctx.round)?;
        debug!("ranked pairs round {}: sources {:?}", ctx.round, sources);
        let winner = resolve_winner(ctx.tiebreaker, &sources, ctx.round)?;
        Ok([(winner, Status::Elected)].into_iter().collect())
    }
}

// Whether `to` can be reached from `from` in the locked graph.
fn reaches(locked: &[Vec<bool>], from: usize, to: usize) -> bool {
    let mut seen = vec![false; locked.len()];
    let mut todo = vec![from];
    while let Some(node) = todo.pop() {
        if node == to {
            return true;
        }
        if seen[node] {
            continue;
        }
        seen[node] = true;
        todo.extend((0..locked.len()).filter(|next| locked[node][*next]));
    }
    false
}

/// Locks the pairwise victories from the strongest to the weakest, skipping those that
/// would close a cycle, and returns the candidates no locked victory points to.
///
/// Victories are ordered by winning votes (descending), then losing votes (ascending).
/// Victories of the same strength follow the tiebreak order of their winners, then the
/// reverse tiebreak order of their losers.
pub fn ranked_pairs_sources(
    graph: &PairwiseGraph,
    tiebreaker: &dyn Tiebreaker,
    round: u32,
) -> TallyResult<BTreeSet<CandidateId>> {
    let n = graph.candidates().len();
    let mut victories: Vec<(Decimal, Decimal, usize, usize)> = Vec::new();
    for i in 0..n {
        for j in 0..n {
            let (for_i, for_j) = graph.counts_at(i, j);
            if i != j && for_i > for_j {
                victories.push((for_i, for_j, i, j));
            }
        }
    }
    victories.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
    let mut tied: BTreeSet<CandidateId> = BTreeSet::new();
    for pair in victories.windows(2) {
        if pair[0].0 == pair[1].0 && pair[0].1 == pair[1].1 {
            for (_, _, w, l) in pair {
                tied.insert(graph.candidates()[*w]);
                tied.insert(graph.candidates()[*l]);
            }
        }
    }
    if !tied.is_empty() {
        let order = tiebreak_order(tiebreaker, &tied, round)?;
        debug!("ranked pairs: tiebreak order {:?}", order);
        let rank: BTreeMap<CandidateId, usize> =
            order.into_iter().enumerate().map(|(r, c)| (c, r)).collect();
        let rank_of = |idx: usize| rank.get(&graph.candidates()[idx]).copied().unwrap_or(n);
        victories.sort_by(|a, b| {
            b.0.cmp(&a.0)
                .then(a.1.cmp(&b.1))
                .then(rank_of(a.2).cmp(&rank_of(b.2)))
                .then(rank_of(b.3).cmp(&rank_of(a.3)))
        });
    }
    let mut locked = vec![vec![false; n]; n];
    for (for_w, for_l, w, l) in victories {
        if reaches(&locked, l, w) {
            debug!(
                "ranked pairs: skipping {} over {} ({} to {})",
                graph.candidates()[w],
                graph.candidates()[l],
                for_w,
                for_l
            );
        } else {
            locked[w][l] = true;
        }
    }
    Ok((0..n)
        .filter(|t| (0..n).all(|s| !locked[s][*t]))
        .map(|t| graph.candidates()[t])
        .collect())
}
