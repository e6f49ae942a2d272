// ********* Configuration **********

use std::collections::BTreeSet;
use std::fmt::Display;

use snafu::ensure;

use crate::ballots::CandidateId;
use crate::decimal::{Decimal, MAX_PRECISION};
use crate::error::{ArgumentSnafu, TallyResult};
use crate::pairwise::PairwiseGraph;
use crate::state::{CandidateStates, Tabulation};
use crate::top_cycle::TopCycleKind;

/// The voting methods that can be tabulated.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum VotingRule {
    /// Instant runoff: top choices are counted and the weakest candidates are
    /// eliminated until the threshold is reached. With several seats, the winners'
    /// ballots keep counting for them.
    InstantRunoff,
    /// Candidates outside the top cycle are eliminated, then the weakest by top choices.
    TidemanAlternative(TopCycleKind),
    RankedPairs,
    Borda,
    Minimax,
    MeekStv,
}

impl VotingRule {
    /// The identifier used in configuration files and on the command line.
    pub fn identifier(&self) -> &'static str {
        match self {
            VotingRule::InstantRunoff => "irv",
            VotingRule::TidemanAlternative(TopCycleKind::Smith) => "tideman-alternative-smith",
            VotingRule::TidemanAlternative(TopCycleKind::Schwartz) => {
                "tideman-alternative-schwartz"
            }
            VotingRule::RankedPairs => "ranked-pairs",
            VotingRule::Borda => "borda",
            VotingRule::Minimax => "minimax",
            VotingRule::MeekStv => "meek-stv",
        }
    }
}

impl Display for VotingRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.identifier())
    }
}

/// The elimination algorithm to apply.
///
/// - Single eliminates one candidate at a time. This is the easiest to
/// understand, but it may add many more rounds when there a lot of
/// candidates with a comparatively very low number of votes.
///
/// - Batch eliminates at once all the weakest candidates whose combined votes
/// (plus any surplus not yet transferred) stay below the weakest candidate kept.
/// It falls back to a single elimination when no such group exists.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum EliminationAlgorithm {
    Batch,
    Single,
}

/// How ties between candidates with the same count are broken.
#[derive(Eq, PartialEq, Debug, Clone, Hash)]
pub enum TiebreakMode {
    /// The earliest round where the candidates differ decides.
    FirstDifference,
    /// The latest round where the candidates differ decides.
    LastDifference,
    /// The candidate declared first wins.
    CandidateOrder,
    // Note: the random mode uses a cryptographic hash on the candidate names
    // instead of a random number generator, so results are reproducible.
    Random(u32),
    /// Each mode narrows the pool left by the previous one.
    Sequential(Vec<TiebreakMode>),
    /// The first mode that alone picks a single candidate wins.
    Series(Vec<TiebreakMode>),
}

impl Default for TiebreakMode {
    fn default() -> Self {
        TiebreakMode::Sequential(vec![
            TiebreakMode::LastDifference,
            TiebreakMode::FirstDifference,
            TiebreakMode::CandidateOrder,
        ])
    }
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct TabulationRules {
    pub algorithm: VotingRule,
    pub seats: u32,
    pub elimination_algorithm: EliminationAlgorithm,
    pub tiebreak: TiebreakMode,
    /// Number of decimal digits kept by the weighted counts (Meek STV).
    pub precision: u32,
    /// Meek STV stops iterating when the surplus falls below this value.
    pub omega: Decimal,
}

impl TabulationRules {
    pub const DEFAULT_PRECISION: u32 = 9;
    pub const DEFAULT_OMEGA: Decimal = Decimal::from_scaled(1_000_000);

    pub fn new(algorithm: VotingRule, seats: u32) -> TabulationRules {
        TabulationRules {
            algorithm,
            seats,
            ..TabulationRules::default()
        }
    }

    pub fn validate(&self) -> TallyResult<()> {
        ensure!(
            self.seats >= 1,
            ArgumentSnafu {
                message: format!("at least one seat is required, got {}", self.seats),
            }
        );
        ensure!(
            self.precision <= MAX_PRECISION,
            ArgumentSnafu {
                message: format!(
                    "precision {} is above the maximum of {}",
                    self.precision, MAX_PRECISION
                ),
            }
        );
        ensure!(
            self.omega > Decimal::ZERO,
            ArgumentSnafu {
                message: format!("omega must be positive, got {}", self.omega),
            }
        );
        Ok(())
    }
}

impl Default for TabulationRules {
    fn default() -> Self {
        TabulationRules {
            algorithm: VotingRule::InstantRunoff,
            seats: 1,
            elimination_algorithm: EliminationAlgorithm::Single,
            tiebreak: TiebreakMode::default(),
            precision: TabulationRules::DEFAULT_PRECISION,
            omega: TabulationRules::DEFAULT_OMEGA,
        }
    }
}

// ******** Output data structures *********

/// Statistics for one round
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct RoundResult {
    pub round: u32,
    /// The counts of this round, with the statuses after its transitions.
    pub states: CandidateStates,
    pub transitions: Tabulation,
    /// The quota or threshold to reach, for the rules that have one.
    pub quota: Option<Decimal>,
    pub surplus: Decimal,
    /// Weight held by ballots that no longer count for any standing candidate.
    pub exhausted: Decimal,
    pub smith_set: Option<BTreeSet<CandidateId>>,
    pub schwartz_set: Option<BTreeSet<CandidateId>>,
    pub graph: Option<PairwiseGraph>,
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct TallyOutcome {
    /// In the order of their election.
    pub winners: Vec<CandidateId>,
    pub rounds: Vec<RoundResult>,
    pub final_states: CandidateStates,
}
