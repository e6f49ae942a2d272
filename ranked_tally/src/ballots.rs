// ********* Ballot data model ***********

use std::collections::{BTreeSet, HashSet};
use std::fmt::Display;
use std::hash::{Hash, Hasher};

use snafu::ensure;

use crate::decimal::Decimal;
use crate::error::{ArgumentSnafu, TallyResult};

/// Stable index of a candidate in the roster of an election.
///
/// All the graphs and state tables are keyed by this index.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Ord, PartialOrd)]
pub struct CandidateId(pub u32);

impl Display for CandidateId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A registered candidate. Two candidates are equal when their ids are equal.
#[derive(Debug, Clone)]
pub struct Candidate {
    id: CandidateId,
    name: String,
}

impl Candidate {
    pub fn new(id: CandidateId, name: &str) -> Candidate {
        Candidate {
            id,
            name: name.to_string(),
        }
    }

    pub fn id(&self) -> CandidateId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Candidate {}

impl Hash for Candidate {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// A rank given to a candidate. Lower values are more preferred.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub struct Vote {
    pub candidate: CandidateId,
    pub value: Decimal,
}

impl Vote {
    pub fn new(candidate: CandidateId, value: Decimal) -> Vote {
        Vote { candidate, value }
    }

    pub fn beats(&self, other: &Vote) -> bool {
        self.value < other.value
    }
}

// Invariant: at most one vote per candidate, sorted by increasing value.
#[derive(Eq, PartialEq, Debug, Clone, Hash)]
pub struct Ballot {
    votes: Vec<Vote>,
}

impl Ballot {
    /// Builds a ballot from votes in any order. Votes with equal values express an equal
    /// preference and keep their relative order.
    pub fn new(mut votes: Vec<Vote>) -> TallyResult<Ballot> {
        let mut seen: HashSet<CandidateId> = HashSet::new();
        for v in votes.iter() {
            ensure!(
                seen.insert(v.candidate),
                ArgumentSnafu {
                    message: format!("candidate {} appears twice on a ballot", v.candidate),
                }
            );
        }
        votes.sort_by_key(|v| v.value);
        Ok(Ballot { votes })
    }

    /// A strict ranking: the first candidate gets rank 1, the second rank 2, and so on.
    pub fn from_ranking(ranking: &[CandidateId]) -> TallyResult<Ballot> {
        Ballot::new(
            ranking
                .iter()
                .enumerate()
                .map(|(idx, cid)| Vote::new(*cid, Decimal::from(idx as u64 + 1)))
                .collect(),
        )
    }

    /// The votes, most preferred first.
    pub fn votes(&self) -> &[Vote] {
        &self.votes
    }

    pub fn is_empty(&self) -> bool {
        self.votes.is_empty()
    }

    pub fn contains(&self, candidate: CandidateId) -> bool {
        self.votes.iter().any(|v| v.candidate == candidate)
    }

    pub fn rank_of(&self, candidate: CandidateId) -> Option<Decimal> {
        self.votes
            .iter()
            .find(|v| v.candidate == candidate)
            .map(|v| v.value)
    }

    /// The most preferred candidates among the ones accepted by `keep`.
    ///
    /// More than one candidate is returned when they share the best rank value.
    pub fn top_choices<F: Fn(CandidateId) -> bool>(&self, keep: F) -> Vec<CandidateId> {
        let mut kept = self.votes.iter().filter(|v| keep(v.candidate));
        let first = match kept.next() {
            Some(v) => v,
            None => return vec![],
        };
        let mut res = vec![first.candidate];
        res.extend(
            kept.take_while(|v| v.value == first.value)
                .map(|v| v.candidate),
        );
        res
    }
}

/// A ballot with the number of voters who cast it.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct CountedBallot {
    pub ballot: Ballot,
    pub count: u64,
}

/// The multiset of ballots of an election, stored compactly.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct BallotSet {
    counted: Vec<CountedBallot>,
}

impl BallotSet {
    /// Ballots with a zero count are dropped.
    pub fn new(counted: Vec<CountedBallot>) -> BallotSet {
        BallotSet {
            counted: counted.into_iter().filter(|cb| cb.count > 0).collect(),
        }
    }

    pub fn counted(&self) -> &[CountedBallot] {
        &self.counted
    }

    /// Every individual ballot, each repeated as many times as its count.
    /// The iteration can be restarted and always yields the same multiset.
    pub fn iter(&self) -> impl Iterator<Item = &Ballot> + '_ {
        self.counted
            .iter()
            .flat_map(|cb| std::iter::repeat(&cb.ballot).take(cb.count as usize))
    }

    /// The number of voters.
    pub fn total(&self) -> u64 {
        self.counted.iter().map(|cb| cb.count).sum()
    }

    /// The candidates ranked on at least one ballot.
    pub fn candidates(&self) -> BTreeSet<CandidateId> {
        self.counted
            .iter()
            .flat_map(|cb| cb.ballot.votes().iter().map(|v| v.candidate))
            .collect()
    }
}

/// The complete input of a tabulation: the roster, the withdrawn candidates and the
/// ballots. Candidate ids are positions in the roster.
#[derive(Debug, Clone)]
pub struct Election {
    pub candidates: Vec<Candidate>,
    pub withdrawn: BTreeSet<CandidateId>,
    pub ballots: BallotSet,
}

impl Election {
    pub fn candidate(&self, id: CandidateId) -> Option<&Candidate> {
        self.candidates.get(id.0 as usize)
    }

    pub fn name_of(&self, id: CandidateId) -> String {
        match self.candidate(id) {
            Some(c) => c.name().to_string(),
            None => id.to_string(),
        }
    }

    pub fn candidate_ids(&self) -> Vec<CandidateId> {
        self.candidates.iter().map(|c| c.id()).collect()
    }
}
