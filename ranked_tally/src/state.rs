use std::collections::{BTreeMap, BTreeSet};

use snafu::{ensure, OptionExt};

use crate::ballots::CandidateId;
use crate::decimal::Decimal;
use crate::error::{InvariantViolationSnafu, TallyResult, UnknownCandidateSnafu};

#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Ord, PartialOrd)]
pub enum Status {
    Defeated,
    Withdrawn,
    Hopeful,
    Elected,
}

#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub struct CandidateState {
    pub vote_count: Decimal,
    pub status: Status,
}

/// The transitions decided for one round. An empty map means the count is over.
pub type Tabulation = BTreeMap<CandidateId, Status>;

/// Per-candidate record of a tabulation in progress.
///
/// Vote counts may be rewritten by any scoring pass. Statuses only move through
/// `apply`, which the orchestrator calls once per round.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct CandidateStates {
    states: BTreeMap<CandidateId, CandidateState>,
}

impl CandidateStates {
    pub fn new<I: IntoIterator<Item = CandidateId>>(
        candidates: I,
        withdrawn: &BTreeSet<CandidateId>,
    ) -> CandidateStates {
        CandidateStates {
            states: candidates
                .into_iter()
                .map(|cid| {
                    let status = if withdrawn.contains(&cid) {
                        Status::Withdrawn
                    } else {
                        Status::Hopeful
                    };
                    (
                        cid,
                        CandidateState {
                            vote_count: Decimal::ZERO,
                            status,
                        },
                    )
                })
                .collect(),
        }
    }

    pub fn get(&self, candidate: CandidateId) -> TallyResult<&CandidateState> {
        self.states
            .get(&candidate)
            .context(UnknownCandidateSnafu { candidate })
    }

    pub fn iter(&self) -> impl Iterator<Item = (CandidateId, &CandidateState)> + '_ {
        self.states.iter().map(|(cid, s)| (*cid, s))
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn with_status(&self, status: Status) -> BTreeSet<CandidateId> {
        self.states
            .iter()
            .filter(|(_, s)| s.status == status)
            .map(|(cid, _)| *cid)
            .collect()
    }

    pub fn hopefuls(&self) -> BTreeSet<CandidateId> {
        self.with_status(Status::Hopeful)
    }

    pub fn elected(&self) -> BTreeSet<CandidateId> {
        self.with_status(Status::Elected)
    }

    /// Hopeful and elected candidates.
    pub fn standing(&self) -> BTreeSet<CandidateId> {
        self.states
            .iter()
            .filter(|(_, s)| matches!(s.status, Status::Hopeful | Status::Elected))
            .map(|(cid, _)| *cid)
            .collect()
    }

    /// Defeated and withdrawn candidates.
    pub fn excluded(&self) -> BTreeSet<CandidateId> {
        self.states
            .iter()
            .filter(|(_, s)| matches!(s.status, Status::Defeated | Status::Withdrawn))
            .map(|(cid, _)| *cid)
            .collect()
    }

    pub fn is_standing(&self, candidate: CandidateId) -> bool {
        matches!(
            self.states.get(&candidate).map(|s| s.status),
            Some(Status::Hopeful | Status::Elected)
        )
    }

    pub fn status(&self, candidate: CandidateId) -> Option<Status> {
        self.states.get(&candidate).map(|s| s.status)
    }

    /// The vote count of a candidate, zero if the candidate is unknown.
    pub fn vote_count(&self, candidate: CandidateId) -> Decimal {
        self.states
            .get(&candidate)
            .map(|s| s.vote_count)
            .unwrap_or(Decimal::ZERO)
    }

    pub fn set_vote_count(&mut self, candidate: CandidateId, count: Decimal) -> TallyResult<()> {
        let s = self
            .states
            .get_mut(&candidate)
            .context(UnknownCandidateSnafu { candidate })?;
        s.vote_count = count;
        Ok(())
    }

    /// Sets the count of every candidate that is not withdrawn back to zero.
    pub fn reset_counts(&mut self) {
        for s in self.states.values_mut() {
            if s.status != Status::Withdrawn {
                s.vote_count = Decimal::ZERO;
            }
        }
    }

    /// Commits the transitions of a round. Only `hopeful -> elected` and
    /// `hopeful -> defeated` are accepted.
    pub(crate) fn apply(&mut self, tabulation: &Tabulation, round: u32) -> TallyResult<bool> {
        for (cid, new_status) in tabulation.iter() {
            let current = self.get(*cid)?.status;
            ensure!(
                current == Status::Hopeful
                    && matches!(new_status, Status::Elected | Status::Defeated),
                InvariantViolationSnafu {
                    round,
                    message: format!(
                        "candidate {} cannot move from {:?} to {:?}",
                        cid, current, new_status
                    ),
                }
            );
        }
        let mut changed = false;
        for (cid, new_status) in tabulation.iter() {
            if let Some(s) = self.states.get_mut(cid) {
                changed |= s.status != *new_status;
                s.status = *new_status;
            }
        }
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cid(x: u32) -> CandidateId {
        CandidateId(x)
    }

    #[test]
    fn transitions_are_monotonic() {
        let withdrawn: BTreeSet<CandidateId> = [cid(2)].into_iter().collect();
        let mut states = CandidateStates::new((0..3).map(cid), &withdrawn);
        assert_eq!(states.hopefuls().len(), 2);
        assert_eq!(states.excluded(), withdrawn);

        let t: Tabulation = [(cid(0), Status::Elected)].into_iter().collect();
        assert!(states.apply(&t, 1).unwrap());
        assert_eq!(states.elected(), [cid(0)].into_iter().collect());

        // Elected candidates cannot be defeated, withdrawn ones cannot come back.
        let back: Tabulation = [(cid(0), Status::Defeated)].into_iter().collect();
        assert!(states.apply(&back, 2).is_err());
        let revive: Tabulation = [(cid(2), Status::Hopeful)].into_iter().collect();
        assert!(states.apply(&revive, 2).is_err());
        assert_eq!(states.status(cid(0)), Some(Status::Elected));
    }

    #[test]
    fn counts_and_lookups() {
        let mut states = CandidateStates::new((0..2).map(cid), &BTreeSet::new());
        states.set_vote_count(cid(1), Decimal::from(7u64)).unwrap();
        assert_eq!(states.vote_count(cid(1)), Decimal::from(7u64));
        assert!(states.set_vote_count(cid(9), Decimal::ONE).is_err());
        assert!(states.get(cid(9)).is_err());
        states.reset_counts();
        assert!(states.vote_count(cid(1)).is_zero());
    }
}
