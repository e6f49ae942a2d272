//! Head-to-head tallies between every pair of candidates.

use std::collections::{BTreeSet, HashMap};

use log::debug;
use snafu::{ensure, OptionExt};

use crate::ballots::{Ballot, BallotSet, CandidateId};
use crate::decimal::Decimal;
use crate::error::{IncompatibleGraphsSnafu, TallyResult, UnknownCandidateSnafu};
use crate::parallel::{map_chunks, worker_count};

/// For every ordered pair `(a, b)` of distinct candidates, the number of ballots that
/// prefer `a` over `b`.
///
/// A candidate ranked on a ballot is preferred over every candidate missing from that
/// ballot. Two candidates that are both missing from a ballot are not compared by it.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct PairwiseGraph {
    candidates: Vec<CandidateId>,
    positions: HashMap<CandidateId, usize>,
    // Row-major: tally[i * n + j] is the support for candidates[i] over candidates[j].
    tally: Vec<Decimal>,
}

impl PairwiseGraph {
    /// A graph with all the tallies at zero.
    pub fn empty<I: IntoIterator<Item = CandidateId>>(candidates: I) -> PairwiseGraph {
        let sorted: BTreeSet<CandidateId> = candidates.into_iter().collect();
        let candidates: Vec<CandidateId> = sorted.into_iter().collect();
        let positions = candidates
            .iter()
            .enumerate()
            .map(|(idx, cid)| (*cid, idx))
            .collect();
        let n = candidates.len();
        PairwiseGraph {
            candidates,
            positions,
            tally: vec![Decimal::ZERO; n * n],
        }
    }

    /// Builds the graph over the candidates referenced by the ballots.
    pub fn build(ballots: &BallotSet) -> PairwiseGraph {
        PairwiseGraph::build_for(ballots.candidates(), ballots)
    }

    /// Builds the graph over the given candidates. Votes for other candidates are ignored.
    ///
    /// The ballots are split into one chunk per worker and the partial graphs are summed.
    pub fn build_for<I: IntoIterator<Item = CandidateId>>(
        candidates: I,
        ballots: &BallotSet,
    ) -> PairwiseGraph {
        let base = PairwiseGraph::empty(candidates);
        let partials = map_chunks(ballots.counted(), worker_count(), |chunk| {
            let mut g = base.clone();
            for cb in chunk {
                g.add_ballot(&cb.ballot, cb.count);
            }
            g
        });
        debug!(
            "build_for: {} candidates, {} partial graphs",
            base.candidates.len(),
            partials.len()
        );
        let mut res = base;
        for p in partials.iter() {
            // Same candidate set by construction.
            res.add_aligned(p);
        }
        res
    }

    /// Adds one ballot cast `count` times.
    pub fn add_ballot(&mut self, ballot: &Ballot, count: u64) {
        let n = self.candidates.len();
        let weight = Decimal::from(count);
        let ranked: Vec<(usize, Decimal)> = ballot
            .votes()
            .iter()
            .filter_map(|v| self.positions.get(&v.candidate).map(|idx| (*idx, v.value)))
            .collect();
        let mut present = vec![false; n];
        for (idx, _) in ranked.iter() {
            present[*idx] = true;
        }
        for (k, &(i, vi)) in ranked.iter().enumerate() {
            for &(j, vj) in ranked[k + 1..].iter() {
                if vi < vj {
                    self.tally[i * n + j] += weight;
                } else if vj < vi {
                    self.tally[j * n + i] += weight;
                }
            }
            for (j, is_present) in present.iter().enumerate() {
                if !is_present {
                    self.tally[i * n + j] += weight;
                }
            }
        }
    }

    fn add_aligned(&mut self, other: &PairwiseGraph) {
        for (x, y) in self.tally.iter_mut().zip(other.tally.iter()) {
            *x += *y;
        }
    }

    /// Sums two graphs. One candidate set must contain the other; the result covers the
    /// larger one. The operation is commutative and associative.
    pub fn merge(&self, other: &PairwiseGraph) -> TallyResult<PairwiseGraph> {
        let (big, small) = if self.candidates.len() >= other.candidates.len() {
            (self, other)
        } else {
            (other, self)
        };
        ensure!(
            small.candidates.iter().all(|c| big.positions.contains_key(c)),
            IncompatibleGraphsSnafu {
                left: self.candidates.clone(),
                right: other.candidates.clone(),
            }
        );
        let mut res = big.clone();
        let n_big = big.candidates.len();
        let n_small = small.candidates.len();
        for (i, a) in small.candidates.iter().enumerate() {
            for (j, b) in small.candidates.iter().enumerate() {
                if i != j {
                    let bi = big.positions[a];
                    let bj = big.positions[b];
                    res.tally[bi * n_big + bj] += small.tally[i * n_small + j];
                }
            }
        }
        Ok(res)
    }

    /// The candidates covered by this graph, in increasing id order.
    pub fn candidates(&self) -> &[CandidateId] {
        &self.candidates
    }

    pub fn contains(&self, candidate: CandidateId) -> bool {
        self.positions.contains_key(&candidate)
    }

    fn position(&self, candidate: CandidateId) -> TallyResult<usize> {
        self.positions
            .get(&candidate)
            .copied()
            .context(UnknownCandidateSnafu { candidate })
    }

    // Tallies by position: (support for i over j, support for j over i).
    pub(crate) fn counts_at(&self, i: usize, j: usize) -> (Decimal, Decimal) {
        let n = self.candidates.len();
        (self.tally[i * n + j], self.tally[j * n + i])
    }

    /// `(ballots preferring c1 over c2, ballots preferring c2 over c1)`.
    pub fn vote_count(&self, c1: CandidateId, c2: CandidateId) -> TallyResult<(Decimal, Decimal)> {
        let i = self.position(c1)?;
        let j = self.position(c2)?;
        Ok(self.counts_at(i, j))
    }

    fn opponents_where<F: Fn(Decimal, Decimal) -> bool>(
        &self,
        candidate: CandidateId,
        pred: F,
    ) -> TallyResult<BTreeSet<CandidateId>> {
        let i = self.position(candidate)?;
        Ok(self
            .candidates
            .iter()
            .enumerate()
            .filter(|(j, _)| *j != i)
            .filter(|(j, _)| {
                let (for_c, against_c) = self.counts_at(i, *j);
                pred(for_c, against_c)
            })
            .map(|(_, cid)| *cid)
            .collect())
    }

    /// The opponents this candidate defeats head to head.
    pub fn wins(&self, candidate: CandidateId) -> TallyResult<BTreeSet<CandidateId>> {
        self.opponents_where(candidate, |f, a| f > a)
    }

    pub fn ties(&self, candidate: CandidateId) -> TallyResult<BTreeSet<CandidateId>> {
        self.opponents_where(candidate, |f, a| f == a)
    }

    pub fn losses(&self, candidate: CandidateId) -> TallyResult<BTreeSet<CandidateId>> {
        self.opponents_where(candidate, |f, a| f < a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ballots::CountedBallot;

    fn cid(x: u32) -> CandidateId {
        CandidateId(x)
    }

    fn dec(x: u64) -> Decimal {
        Decimal::from(x)
    }

    // Alex(0), Chris(1), Sam(2)
    fn fixture() -> BallotSet {
        let cb = |ranking: &[u32], count: u64| CountedBallot {
            ballot: Ballot::from_ranking(&ranking.iter().map(|x| cid(*x)).collect::<Vec<_>>())
                .unwrap(),
            count,
        };
        BallotSet::new(vec![
            cb(&[0, 1, 2], 20),
            cb(&[2, 1], 15),
            cb(&[1, 2, 0], 8),
            cb(&[1, 0], 5),
        ])
    }

    #[test]
    fn fixture_tallies() {
        let g = PairwiseGraph::build(&fixture());
        assert_eq!(g.vote_count(cid(0), cid(1)).unwrap(), (dec(20), dec(28)));
        assert_eq!(g.vote_count(cid(1), cid(2)).unwrap(), (dec(33), dec(15)));
        assert_eq!(g.vote_count(cid(0), cid(2)).unwrap(), (dec(25), dec(23)));
        assert_eq!(g.wins(cid(1)).unwrap(), [cid(0), cid(2)].into_iter().collect());
        assert_eq!(g.losses(cid(2)).unwrap(), [cid(0), cid(1)].into_iter().collect());
        assert!(g.ties(cid(0)).unwrap().is_empty());
    }

    #[test]
    fn tallies_are_mirrored() {
        let g = PairwiseGraph::build(&fixture());
        for a in g.candidates() {
            for b in g.candidates() {
                let (x, y) = g.vote_count(*a, *b).unwrap();
                assert_eq!(g.vote_count(*b, *a).unwrap(), (y, x));
            }
        }
    }

    #[test]
    fn unknown_candidate_is_an_error() {
        let g = PairwiseGraph::build(&fixture());
        assert!(g.vote_count(cid(0), cid(7)).is_err());
        assert!(g.wins(cid(7)).is_err());
    }

    #[test]
    fn equal_ranks_and_shared_absence_do_not_count() {
        let mut g = PairwiseGraph::empty((0..3).map(cid));
        let ballot = Ballot::new(vec![
            crate::ballots::Vote::new(cid(0), dec(1)),
            crate::ballots::Vote::new(cid(1), dec(1)),
        ])
        .unwrap();
        g.add_ballot(&ballot, 4);
        assert_eq!(g.vote_count(cid(0), cid(1)).unwrap(), (dec(0), dec(0)));
        assert_eq!(g.vote_count(cid(0), cid(2)).unwrap(), (dec(4), dec(0)));

        let mut g2 = PairwiseGraph::empty((0..3).map(cid));
        g2.add_ballot(&Ballot::from_ranking(&[cid(0)]).unwrap(), 1);
        assert_eq!(g2.vote_count(cid(1), cid(2)).unwrap(), (dec(0), dec(0)));
    }

    #[test]
    fn partial_graphs_merge_to_the_whole() {
        let all = fixture();
        let (left, right) = all.counted().split_at(2);
        let gl = PairwiseGraph::build_for((0..3).map(cid), &BallotSet::new(left.to_vec()));
        let gr = PairwiseGraph::build_for((0..3).map(cid), &BallotSet::new(right.to_vec()));
        let whole = PairwiseGraph::build(&all);
        assert_eq!(gl.merge(&gr).unwrap(), whole);
        assert_eq!(gr.merge(&gl).unwrap(), whole);
    }

    #[test]
    fn merge_requires_nested_candidate_sets() {
        let sub = PairwiseGraph::empty([cid(0), cid(1)]);
        let sup = PairwiseGraph::build(&fixture());
        let merged = sub.merge(&sup).unwrap();
        assert_eq!(merged.candidates(), sup.candidates());

        let disjoint = PairwiseGraph::empty([cid(0), cid(5)]);
        assert!(matches!(
            disjoint.merge(&sup),
            Err(crate::TabulationError::IncompatibleGraphs { .. })
        ));
    }
}
