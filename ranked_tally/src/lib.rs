mod ballots;
pub mod builder;
mod config;
mod decimal;
pub mod elimination;
mod error;
pub mod manual;
pub mod meek;
mod pairwise;
mod parallel;
pub mod registry;
pub mod rules;
mod state;
pub mod tabulator;
pub mod tiebreak;
mod top_cycle;

use log::info;

pub use crate::ballots::*;
pub use crate::config::*;
pub use crate::decimal::{Decimal, ParseDecimalError, Rounding, MAX_PRECISION};
pub use crate::error::{TabulationError, TallyResult};
pub use crate::pairwise::PairwiseGraph;
pub use crate::state::{CandidateState, CandidateStates, Status, Tabulation};
pub use crate::tabulator::{Rounds, Tabulator};
pub use crate::top_cycle::{TopCycle, TopCycleKind};

/// Runs a complete tabulation of an election.
///
/// ```
/// use ranked_tally::builder::Builder;
/// use ranked_tally::{run_tabulation, TabulationRules, VotingRule};
/// # use ranked_tally::TabulationError;
///
/// let mut builder = Builder::new().candidates(&["Anna".to_string(), "Bob".to_string()])?;
/// builder.add_vote_simple(&["Anna".to_string(), "Bob".to_string()])?;
/// builder.add_vote_simple(&["Bob".to_string()])?;
/// builder.add_vote_simple(&["Anna".to_string()])?;
/// let election = builder.build();
///
/// let outcome = run_tabulation(&election, &TabulationRules::new(VotingRule::InstantRunoff, 1))?;
/// assert_eq!(election.name_of(outcome.winners[0]), "Anna");
/// # Ok::<(), TabulationError>(())
/// ```
pub fn run_tabulation(election: &Election, rules: &TabulationRules) -> TallyResult<TallyOutcome> {
    info!(
        "run_tabulation: {} with {} seats",
        rules.algorithm, rules.seats
    );
    Tabulator::from_rules(election, rules)?.tabulate()
}
