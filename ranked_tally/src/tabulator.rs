//! The round loop shared by every voting method.
//!
//! A round goes through three steps:
//! - `count_ballots` lets the scoring rule recompute the vote counts,
//! - `get_tabulation` asks the elimination policy for the transitions of the round,
//! - `apply_tabulation` commits them and tells the tiebreaker about the counts.
//!
//! The count ends with the round that leaves no hopeful, or with an empty tabulation.

use std::collections::BTreeMap;

use log::{debug, info};
use snafu::{ensure, OptionExt};

use crate::ballots::{BallotSet, CandidateId, Election};
use crate::config::{RoundResult, TabulationRules, TallyOutcome};
use crate::error::{ArgumentSnafu, InvariantViolationSnafu, TallyResult};
use crate::registry::{strategies_for, Strategies};
use crate::rules::{EliminationPolicy, RoundContext, RoundCount, ScoringRule};
use crate::state::{CandidateStates, Status, Tabulation};
use crate::tiebreak::{build_tiebreaker, Tiebreaker};

#[derive(Debug)]
pub struct Tabulator<'e> {
    ballots: &'e BallotSet,
    names: BTreeMap<CandidateId, String>,
    seats: usize,
    // Number of committed rounds.
    round: u32,
    states: CandidateStates,
    scoring: Box<dyn ScoringRule>,
    policy: Box<dyn EliminationPolicy>,
    tiebreaker: Box<dyn Tiebreaker>,
    last_count: Option<RoundCount>,
    complete: bool,
    elected_order: Vec<CandidateId>,
}

impl<'e> Tabulator<'e> {
    pub fn new(
        election: &'e Election,
        seats: usize,
        strategies: Strategies,
        tiebreaker: Box<dyn Tiebreaker>,
    ) -> TallyResult<Tabulator<'e>> {
        let states = CandidateStates::new(election.candidate_ids(), &election.withdrawn);
        let running = states.hopefuls().len();
        ensure!(
            seats >= 1,
            ArgumentSnafu {
                message: "at least one seat is required".to_string(),
            }
        );
        ensure!(
            seats <= running,
            ArgumentSnafu {
                message: format!(
                    "{} seats to fill with only {} candidates running",
                    seats, running
                ),
            }
        );
        info!(
            "Processing {} ballots ({} distinct), {} candidates, {} seats",
            election.ballots.total(),
            election.ballots.counted().len(),
            election.candidates.len(),
            seats
        );
        for c in election.candidates.iter() {
            info!("Candidate: {}: {}", c.id().0, c.name());
        }
        Ok(Tabulator {
            ballots: &election.ballots,
            names: election
                .candidates
                .iter()
                .map(|c| (c.id(), c.name().to_string()))
                .collect(),
            seats,
            round: 0,
            states,
            scoring: strategies.scoring,
            policy: strategies.policy,
            tiebreaker,
            last_count: None,
            complete: false,
            elected_order: Vec::new(),
        })
    }

    /// A tabulator with the strategies and the tiebreaker described by the rules.
    pub fn from_rules(election: &'e Election, rules: &TabulationRules) -> TallyResult<Tabulator<'e>> {
        rules.validate()?;
        info!("Tabulation rules: {:?}", rules);
        let names: BTreeMap<CandidateId, String> = election
            .candidates
            .iter()
            .map(|c| (c.id(), c.name().to_string()))
            .collect();
        let tiebreaker = build_tiebreaker(&rules.tiebreak, &names);
        Tabulator::new(
            election,
            rules.seats as usize,
            strategies_for(rules)?,
            tiebreaker,
        )
    }

    pub fn states(&self) -> &CandidateStates {
        &self.states
    }

    /// The number of committed rounds.
    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// The elected candidates, in the order of their election.
    pub fn winners(&self) -> &[CandidateId] {
        &self.elected_order
    }

    fn name(&self, candidate: CandidateId) -> &str {
        self.names.get(&candidate).map(|s| s.as_str()).unwrap_or("?")
    }

    /// Recomputes the vote counts for the upcoming round.
    pub fn count_ballots(&mut self) -> TallyResult<()> {
        let round = self.round + 1;
        let count = self
            .scoring
            .count(self.ballots, &mut self.states, round)?;
        debug!("count_ballots: round {} count {:?}", round, count);
        self.last_count = Some(count);
        Ok(())
    }

    /// The transitions of the upcoming round. Does not change any state.
    pub fn get_tabulation(&self) -> TallyResult<Tabulation> {
        let round = self.round + 1;
        let count = self.last_count.as_ref().context(InvariantViolationSnafu {
            round,
            message: "the ballots of this round have not been counted".to_string(),
        })?;
        let elected = self.states.elected();
        let hopefuls = self.states.hopefuls();
        if hopefuls.is_empty() {
            return Ok(Tabulation::new());
        }
        if elected.len() >= self.seats {
            return Ok(hopefuls.iter().map(|c| (*c, Status::Defeated)).collect());
        }
        if elected.len() + hopefuls.len() <= self.seats {
            return Ok(hopefuls.iter().map(|c| (*c, Status::Elected)).collect());
        }
        let ctx = RoundContext {
            round,
            seats: self.seats,
            states: &self.states,
            count,
            tiebreaker: self.tiebreaker.as_ref(),
        };
        let mut tabulation = self.policy.decide(&ctx)?;
        ensure!(
            !tabulation.is_empty(),
            InvariantViolationSnafu {
                round,
                message: format!(
                    "no transition with {} elected and {} hopefuls for {} seats",
                    elected.len(),
                    hopefuls.len(),
                    self.seats
                ),
            }
        );
        let newly_elected = tabulation
            .values()
            .filter(|s| **s == Status::Elected)
            .count();
        if elected.len() + newly_elected >= self.seats {
            // All the seats are filled: the other hopefuls are defeated.
            for cid in hopefuls.iter() {
                tabulation.entry(*cid).or_insert(Status::Defeated);
            }
        }
        Ok(tabulation)
    }

    /// Commits the transitions of the round. Returns false once the count is over.
    pub fn apply_tabulation(&mut self) -> TallyResult<bool> {
        Ok(self.commit()?.is_some())
    }

    fn commit(&mut self) -> TallyResult<Option<RoundResult>> {
        let tabulation = self.get_tabulation()?;
        if tabulation.is_empty() {
            info!("Tabulation complete after {} rounds", self.round);
            self.complete = true;
            return Ok(None);
        }
        let round = self.round + 1;
        self.tiebreaker.update_tiebreaker(&self.states);
        let changed = self.states.apply(&tabulation, round)?;
        self.scoring.committed(&tabulation);

        let mut newly_elected: Vec<CandidateId> = tabulation
            .iter()
            .filter(|(_, s)| **s == Status::Elected)
            .map(|(cid, _)| *cid)
            .collect();
        newly_elected.sort_by(|a, b| {
            self.states
                .vote_count(*b)
                .cmp(&self.states.vote_count(*a))
                .then(a.cmp(b))
        });
        self.elected_order.extend(newly_elected);

        for (cid, state) in self.states.iter() {
            match tabulation.get(&cid) {
                Some(status) => info!(
                    "Round {}: {} ({}): {} -> {:?}",
                    round,
                    self.name(cid),
                    cid,
                    state.vote_count,
                    status
                ),
                None => debug!(
                    "Round {}: {} ({}): {} {:?}",
                    round,
                    self.name(cid),
                    cid,
                    state.vote_count,
                    state.status
                ),
            }
        }

        let count = self.last_count.take().unwrap_or_default();
        self.round = round;
        debug!("apply_tabulation: round {} changed: {}", round, changed);
        if self.states.hopefuls().is_empty() {
            // No hopeful left: the counts of this round are the final ones.
            info!("Tabulation complete after {} rounds", round);
            self.complete = true;
        }
        Ok(Some(RoundResult {
            round,
            states: self.states.clone(),
            transitions: tabulation,
            quota: count.quota,
            surplus: count.surplus,
            exhausted: count.exhausted,
            smith_set: count.smith_set,
            schwartz_set: count.schwartz_set,
            graph: count.graph,
        }))
    }

    /// Runs one full round. Returns `None` once the count is over.
    pub fn step(&mut self) -> TallyResult<Option<RoundResult>> {
        if self.complete {
            return Ok(None);
        }
        self.count_ballots()?;
        self.commit()
    }

    /// The remaining rounds, computed lazily.
    pub fn into_rounds(self) -> Rounds<'e> {
        Rounds {
            tabulator: self,
            failed: false,
        }
    }

    /// Runs all the remaining rounds.
    pub fn tabulate(self) -> TallyResult<TallyOutcome> {
        let mut rounds = self.into_rounds();
        let results: Vec<RoundResult> = rounds.by_ref().collect::<TallyResult<Vec<_>>>()?;
        let tabulator = rounds.into_tabulator();
        let winners = tabulator.elected_order.clone();
        info!(
            "Winners: {:?}",
            winners.iter().map(|c| tabulator.name(*c)).collect::<Vec<_>>()
        );
        Ok(TallyOutcome {
            winners,
            rounds: results,
            final_states: tabulator.states,
        })
    }
}

/// The rounds of a tabulation. Stops after the last round or the first error.
#[derive(Debug)]
pub struct Rounds<'e> {
    tabulator: Tabulator<'e>,
    failed: bool,
}

impl<'e> Rounds<'e> {
    pub fn tabulator(&self) -> &Tabulator<'e> {
        &self.tabulator
    }

    pub fn into_tabulator(self) -> Tabulator<'e> {
        self.tabulator
    }
}

impl<'e> Iterator for Rounds<'e> {
    type Item = TallyResult<RoundResult>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.tabulator.step() {
            Ok(res) => res.map(Ok),
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::Builder;
    use crate::config::{TiebreakMode, VotingRule};
    use crate::TabulationError;

    fn init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn names(xs: &[&str]) -> Vec<String> {
        xs.iter().map(|s| s.to_string()).collect()
    }

    fn fixture() -> Election {
        let mut b = Builder::new()
            .candidates(&names(&["Alex", "Chris", "Sam"]))
            .unwrap();
        b.add_vote(&[names(&["Alex"]), names(&["Chris"]), names(&["Sam"])], 20)
            .unwrap();
        b.add_vote(&[names(&["Sam"]), names(&["Chris"])], 15).unwrap();
        b.add_vote(&[names(&["Chris"]), names(&["Sam"]), names(&["Alex"])], 8)
            .unwrap();
        b.add_vote(&[names(&["Chris"]), names(&["Alex"])], 5).unwrap();
        b.build()
    }

    #[test]
    fn get_tabulation_is_idempotent() {
        init();
        let election = fixture();
        let rules = TabulationRules::new(VotingRule::InstantRunoff, 1);
        let mut tab = Tabulator::from_rules(&election, &rules).unwrap();
        assert!(tab.get_tabulation().is_err());
        tab.count_ballots().unwrap();
        let before = tab.states().clone();
        let first = tab.get_tabulation().unwrap();
        let second = tab.get_tabulation().unwrap();
        assert_eq!(first, second);
        assert_eq!(tab.states(), &before);
        assert_eq!(first, [(CandidateId(1), Status::Defeated)].into_iter().collect());
        assert!(tab.apply_tabulation().unwrap());
        assert_eq!(tab.round(), 1);
    }

    #[test]
    fn filling_the_seats_completes_the_count() {
        init();
        let mut b = Builder::new().candidates(&names(&["A", "B", "C"])).unwrap();
        b.add_vote(&[names(&["A"]), names(&["B"])], 60).unwrap();
        b.add_vote(&[names(&["C"])], 30).unwrap();
        b.add_vote(&[names(&["B"])], 10).unwrap();
        let election = b.build();
        let rules = TabulationRules::new(VotingRule::MeekStv, 2);
        let mut tab = Tabulator::from_rules(&election, &rules).unwrap();
        assert!(tab.step().unwrap().is_some());
        assert!(!tab.is_complete());
        let last = tab.step().unwrap().unwrap();
        assert!(tab.is_complete());
        assert_eq!(last.states.vote_count(CandidateId(0)), "33.33333336".parse().unwrap());
        assert!(tab.step().unwrap().is_none());
        assert_eq!(tab.states(), &last.states);
        assert_eq!(tab.round(), 2);
    }

    #[test]
    fn irv_fixture_rounds() {
        init();
        let election = fixture();
        let rules = TabulationRules::new(VotingRule::InstantRunoff, 1);
        let outcome = Tabulator::from_rules(&election, &rules)
            .unwrap()
            .tabulate()
            .unwrap();
        assert_eq!(outcome.winners, vec![CandidateId(0)]);
        assert_eq!(outcome.rounds.len(), 2);
        let first = &outcome.rounds[0];
        assert_eq!(first.quota, Some(crate::Decimal::from(25u64)));
        assert_eq!(first.states.vote_count(CandidateId(0)), crate::Decimal::from(20u64));
        assert_eq!(first.states.vote_count(CandidateId(1)), crate::Decimal::from(13u64));
        let last = &outcome.rounds[1];
        assert_eq!(last.states.vote_count(CandidateId(0)), crate::Decimal::from(25u64));
        assert_eq!(last.transitions.get(&CandidateId(2)), Some(&Status::Defeated));
        assert_eq!(
            outcome.final_states.standing(),
            [CandidateId(0)].into_iter().collect()
        );
    }

    #[test]
    fn identical_counts_without_fallback_are_unresolved() {
        init();
        let mut b = Builder::new().candidates(&names(&["A", "B", "C"])).unwrap();
        for n in ["A", "B", "C"] {
            b.add_vote_simple(&names(&[n])).unwrap();
        }
        let election = b.build();
        let rules = TabulationRules {
            tiebreak: TiebreakMode::Sequential(vec![
                TiebreakMode::LastDifference,
                TiebreakMode::FirstDifference,
            ]),
            ..TabulationRules::new(VotingRule::InstantRunoff, 1)
        };
        let mut rounds = Tabulator::from_rules(&election, &rules)
            .unwrap()
            .into_rounds();
        match rounds.next() {
            Some(Err(TabulationError::UnresolvedTie { round, candidates })) => {
                assert_eq!(round, 1);
                assert_eq!(candidates.len(), 3);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(rounds.next().is_none());
    }

    #[test]
    fn seats_must_be_fillable() {
        let mut b = Builder::new().candidates(&names(&["A", "B", "C"])).unwrap();
        b.withdraw("C").unwrap();
        b.add_vote_simple(&names(&["A"])).unwrap();
        let election = b.build();
        let rules = TabulationRules::new(VotingRule::Borda, 3);
        assert!(matches!(
            Tabulator::from_rules(&election, &rules),
            Err(TabulationError::Argument { .. })
        ));
        let zero = TabulationRules::new(VotingRule::Borda, 0);
        assert!(Tabulator::from_rules(&election, &zero).is_err());
    }

    #[test]
    fn every_seat_is_filled() {
        init();
        let election = fixture();
        let rules = TabulationRules::new(VotingRule::InstantRunoff, 3);
        let outcome = Tabulator::from_rules(&election, &rules)
            .unwrap()
            .tabulate()
            .unwrap();
        assert_eq!(outcome.winners.len(), 3);
        assert_eq!(outcome.rounds.len(), 1);
    }
}
