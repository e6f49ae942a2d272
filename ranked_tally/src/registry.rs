//! Maps the identifier of each voting method to the strategies that implement it.

use std::str::FromStr;

use snafu::OptionExt;

use crate::config::{TabulationRules, VotingRule};
use crate::error::{TabulationError, TallyResult, UnknownAlgorithmSnafu};
use crate::meek::MeekDistribution;
use crate::rules::{
    BordaCount, EliminationPolicy, FirstPreference, HighestScorePolicy, PairwiseScore,
    PairwiseScoreKind, QuotaPolicy, RankedPairsPolicy, ScoringRule, TopCyclePolicy,
};
use crate::top_cycle::TopCycleKind;

/// The pair of strategies plugged into the round loop.
#[derive(Debug)]
pub struct Strategies {
    pub scoring: Box<dyn ScoringRule>,
    pub policy: Box<dyn EliminationPolicy>,
}

pub struct Registration {
    pub identifier: &'static str,
    pub rule: VotingRule,
    pub constructor: fn(&TabulationRules) -> Strategies,
}

fn instant_runoff(rules: &TabulationRules) -> Strategies {
    Strategies {
        scoring: Box::new(FirstPreference::with_threshold(rules.seats as usize)),
        policy: Box::new(QuotaPolicy {
            algorithm: rules.elimination_algorithm,
        }),
    }
}

fn tideman_alternative(kind: TopCycleKind, rules: &TabulationRules) -> Strategies {
    Strategies {
        scoring: Box::new(FirstPreference::with_pairwise()),
        policy: Box::new(TopCyclePolicy {
            kind,
            algorithm: rules.elimination_algorithm,
        }),
    }
}

fn tideman_smith(rules: &TabulationRules) -> Strategies {
    tideman_alternative(TopCycleKind::Smith, rules)
}

fn tideman_schwartz(rules: &TabulationRules) -> Strategies {
    tideman_alternative(TopCycleKind::Schwartz, rules)
}

fn ranked_pairs(_rules: &TabulationRules) -> Strategies {
    Strategies {
        scoring: Box::new(PairwiseScore {
            kind: PairwiseScoreKind::RankedPairs,
        }),
        policy: Box::new(RankedPairsPolicy::default()),
    }
}

fn borda(_rules: &TabulationRules) -> Strategies {
    Strategies {
        scoring: Box::new(BordaCount::default()),
        policy: Box::new(HighestScorePolicy::default()),
    }
}

fn minimax(_rules: &TabulationRules) -> Strategies {
    Strategies {
        scoring: Box::new(PairwiseScore {
            kind: PairwiseScoreKind::Minimax,
        }),
        policy: Box::new(HighestScorePolicy::default()),
    }
}

fn meek_stv(rules: &TabulationRules) -> Strategies {
    Strategies {
        scoring: Box::new(MeekDistribution::new(
            rules.seats as usize,
            rules.precision,
            rules.omega,
        )),
        policy: Box::new(QuotaPolicy {
            algorithm: rules.elimination_algorithm,
        }),
    }
}

pub const REGISTRY: &[Registration] = &[
    Registration {
        identifier: "irv",
        rule: VotingRule::InstantRunoff,
        constructor: instant_runoff,
    },
    Registration {
        identifier: "tideman-alternative-smith",
        rule: VotingRule::TidemanAlternative(TopCycleKind::Smith),
        constructor: tideman_smith,
    },
    Registration {
        identifier: "tideman-alternative-schwartz",
        rule: VotingRule::TidemanAlternative(TopCycleKind::Schwartz),
        constructor: tideman_schwartz,
    },
    Registration {
        identifier: "ranked-pairs",
        rule: VotingRule::RankedPairs,
        constructor: ranked_pairs,
    },
    Registration {
        identifier: "borda",
        rule: VotingRule::Borda,
        constructor: borda,
    },
    Registration {
        identifier: "minimax",
        rule: VotingRule::Minimax,
        constructor: minimax,
    },
    Registration {
        identifier: "meek-stv",
        rule: VotingRule::MeekStv,
        constructor: meek_stv,
    },
];

pub fn lookup(identifier: &str) -> Option<&'static Registration> {
    REGISTRY.iter().find(|r| r.identifier == identifier)
}

fn registration(rule: VotingRule) -> TallyResult<&'static Registration> {
    REGISTRY
        .iter()
        .find(|r| r.rule == rule)
        .context(UnknownAlgorithmSnafu {
            name: rule.identifier(),
        })
}

/// The strategies for the configured voting method.
pub fn strategies_for(rules: &TabulationRules) -> TallyResult<Strategies> {
    Ok((registration(rules.algorithm)?.constructor)(rules))
}

impl FromStr for VotingRule {
    type Err = TabulationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        lookup(s)
            .map(|r| r.rule)
            .context(UnknownAlgorithmSnafu { name: s })
    }
}
