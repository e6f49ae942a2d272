use std::collections::{BTreeSet, HashMap};

use log::debug;
use snafu::{ensure, OptionExt};

use crate::ballots::{Ballot, BallotSet, Candidate, CandidateId, CountedBallot, Election, Vote};
use crate::decimal::Decimal;
use crate::error::{ArgumentSnafu, TallyResult};

/// A builder for adding votes by candidate name.
///
/// Identical ballots are merged into a single counted ballot.
///
/// ```
/// use ranked_tally::builder::Builder;
/// # use ranked_tally::TabulationError;
///
/// let mut builder = Builder::new().candidates(&["Anna".to_string(), "Bob".to_string()])?;
///
/// builder.add_vote_simple(&["Anna".to_string(), "Bob".to_string()])?;
/// builder.add_vote_simple(&["Anna".to_string(), "Bob".to_string()])?;
/// let election = builder.build();
/// assert_eq!(election.ballots.counted().len(), 1);
/// assert_eq!(election.ballots.total(), 2);
///
/// # Ok::<(), TabulationError>(())
/// ```
#[derive(Debug, Default)]
pub struct Builder {
    _candidates: Vec<Candidate>,
    _by_name: HashMap<String, CandidateId>,
    _withdrawn: BTreeSet<CandidateId>,
    _ballots: Vec<CountedBallot>,
    _ballot_index: HashMap<Ballot, usize>,
}

impl Builder {
    pub fn new() -> Builder {
        Builder::default()
    }

    /// Declares the roster. The order of the names gives the candidate ids.
    pub fn candidates(self, names: &[String]) -> TallyResult<Builder> {
        let mut by_name: HashMap<String, CandidateId> = HashMap::new();
        let mut candidates: Vec<Candidate> = Vec::new();
        for (idx, name) in names.iter().enumerate() {
            let cid = CandidateId(idx as u32);
            ensure!(
                by_name.insert(name.clone(), cid).is_none(),
                ArgumentSnafu {
                    message: format!("candidate {:?} is declared twice", name),
                }
            );
            candidates.push(Candidate::new(cid, name));
        }
        Ok(Builder {
            _candidates: candidates,
            _by_name: by_name,
            _withdrawn: BTreeSet::new(),
            _ballots: Vec::new(),
            _ballot_index: HashMap::new(),
        })
    }

    pub fn candidate_id(&self, name: &str) -> TallyResult<CandidateId> {
        self._by_name.get(name).copied().context(ArgumentSnafu {
            message: format!("{:?} is not a declared candidate", name),
        })
    }

    /// Marks a candidate as withdrawn before the count starts.
    pub fn withdraw(&mut self, name: &str) -> TallyResult<()> {
        let cid = self.candidate_id(name)?;
        self._withdrawn.insert(cid);
        Ok(())
    }

    /// Adds a single ballot with a strict ranking.
    ///
    /// It is the simplest use case for most cases.
    pub fn add_vote_simple(&mut self, ranking: &[String]) -> TallyResult<()> {
        let ranks: Vec<Vec<String>> = ranking.iter().map(|name| vec![name.clone()]).collect();
        self.add_vote(&ranks, 1)
    }

    /// Adds a vote, with a potential weight attached to it.
    ///
    /// ranks: the choices made by the voter, most preferred first. All the names in the
    /// same slot share the same rank. An empty slot is a skipped rank.
    pub fn add_vote(&mut self, ranks: &[Vec<String>], count: u64) -> TallyResult<()> {
        let mut votes: Vec<Vote> = Vec::new();
        for (idx, slot) in ranks.iter().enumerate() {
            for name in slot {
                let cid = self.candidate_id(name)?;
                votes.push(Vote::new(cid, Decimal::from(idx as u64 + 1)));
            }
        }
        self.add_ballot(Ballot::new(votes)?, count);
        Ok(())
    }

    /// Adds a ballot given by explicit rank values.
    pub fn add_ranks(&mut self, ranks: &[(String, Decimal)], count: u64) -> TallyResult<()> {
        let mut votes: Vec<Vote> = Vec::new();
        for (name, value) in ranks {
            votes.push(Vote::new(self.candidate_id(name)?, *value));
        }
        self.add_ballot(Ballot::new(votes)?, count);
        Ok(())
    }

    pub fn add_ballot(&mut self, ballot: Ballot, count: u64) {
        if count == 0 || ballot.is_empty() {
            debug!("add_ballot: skipping empty ballot {:?} x{}", ballot, count);
            return;
        }
        if let Some(&idx) = self._ballot_index.get(&ballot) {
            self._ballots[idx].count += count;
        } else {
            self._ballot_index.insert(ballot.clone(), self._ballots.len());
            self._ballots.push(CountedBallot { ballot, count });
        }
    }

    pub fn build(self) -> Election {
        Election {
            candidates: self._candidates,
            withdrawn: self._withdrawn,
            ballots: BallotSet::new(self._ballots),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(xs: &[&str]) -> Vec<String> {
        xs.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn merges_identical_ballots() {
        let mut b = Builder::new().candidates(&names(&["A", "B", "C"])).unwrap();
        b.add_vote(&[names(&["A"]), names(&["B"])], 2).unwrap();
        b.add_vote_simple(&names(&["A", "B"])).unwrap();
        b.add_vote_simple(&names(&["C"])).unwrap();
        let e = b.build();
        assert_eq!(e.ballots.counted().len(), 2);
        assert_eq!(e.ballots.counted()[0].count, 3);
        assert_eq!(e.name_of(CandidateId(2)), "C");
    }

    #[test]
    fn equal_ranks_and_skipped_ranks() {
        let mut b = Builder::new().candidates(&names(&["A", "B", "C"])).unwrap();
        b.add_vote(&[names(&["A", "B"]), vec![], names(&["C"])], 1)
            .unwrap();
        let e = b.build();
        let ballot = &e.ballots.counted()[0].ballot;
        assert_eq!(ballot.rank_of(CandidateId(0)), ballot.rank_of(CandidateId(1)));
        assert_eq!(ballot.rank_of(CandidateId(2)), Some(Decimal::from(3u64)));
    }

    #[test]
    fn unknown_and_duplicate_names() {
        assert!(Builder::new().candidates(&names(&["A", "A"])).is_err());
        let mut b = Builder::new().candidates(&names(&["A"])).unwrap();
        assert!(b.add_vote_simple(&names(&["Z"])).is_err());
        assert!(b.add_vote_simple(&names(&["A", "A"])).is_err());
        assert!(b.withdraw("Z").is_err());
        b.withdraw("A").unwrap();
        assert!(b.build().withdrawn.contains(&CandidateId(0)));
    }
}
