use snafu::Snafu;

use crate::ballots::CandidateId;

/// Errors that prevent a tabulation from completing.
///
/// None of them is recoverable for the tabulation in progress: the caller has to start
/// again with a corrected configuration.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum TabulationError {
    #[snafu(display("Invalid argument: {message}"))]
    Argument { message: String },

    #[snafu(display("Round {round}: internal invariant violated: {message}"))]
    InvariantViolation { round: u32, message: String },

    #[snafu(display(
        "Cannot merge pairwise graphs over incompatible candidate sets {left:?} and {right:?}"
    ))]
    IncompatibleGraphs {
        left: Vec<CandidateId>,
        right: Vec<CandidateId>,
    },

    #[snafu(display("Candidate {candidate} is not covered here"))]
    UnknownCandidate { candidate: CandidateId },

    #[snafu(display("Round {round}: the tie between {candidates:?} could not be resolved"))]
    UnresolvedTie {
        round: u32,
        candidates: Vec<CandidateId>,
    },

    #[snafu(display("Unknown tabulation algorithm {name:?}"))]
    UnknownAlgorithm { name: String },
}

pub type TallyResult<T> = Result<T, TabulationError>;
