use ranked_tally::builder::Builder;
use ranked_tally::{
    run_tabulation, CandidateId, Decimal, EliminationAlgorithm, Election, Status,
    TabulationError, TabulationRules, Tabulator, TiebreakMode, TopCycleKind, VotingRule,
};

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn names(xs: &[&str]) -> Vec<String> {
    xs.iter().map(|s| s.to_string()).collect()
}

fn election(candidates: &[&str], ballots: &[(&[&str], u64)]) -> Election {
    let mut b = Builder::new().candidates(&names(candidates)).unwrap();
    for (ranking, count) in ballots {
        let ranks: Vec<Vec<String>> = ranking.iter().map(|n| vec![n.to_string()]).collect();
        b.add_vote(&ranks, *count).unwrap();
    }
    b.build()
}

fn fixture() -> Election {
    election(
        &["Alex", "Chris", "Sam"],
        &[
            (&["Alex", "Chris", "Sam"], 20),
            (&["Sam", "Chris"], 15),
            (&["Chris", "Sam", "Alex"], 8),
            (&["Chris", "Alex"], 5),
        ],
    )
}

fn winners(e: &Election, rules: &TabulationRules) -> Vec<String> {
    let outcome = run_tabulation(e, rules).unwrap();
    assert_eq!(outcome.final_states.elected().len(), rules.seats as usize);
    outcome.winners.iter().map(|c| e.name_of(*c)).collect()
}

#[test]
fn fixture_for_every_rule() {
    init();
    let e = fixture();
    let expected = [
        (VotingRule::InstantRunoff, "Alex"),
        (VotingRule::TidemanAlternative(TopCycleKind::Smith), "Chris"),
        (VotingRule::TidemanAlternative(TopCycleKind::Schwartz), "Chris"),
        (VotingRule::RankedPairs, "Chris"),
        (VotingRule::Borda, "Chris"),
        (VotingRule::Minimax, "Chris"),
        (VotingRule::MeekStv, "Alex"),
    ];
    for (rule, winner) in expected {
        for algorithm in [EliminationAlgorithm::Single, EliminationAlgorithm::Batch] {
            let rules = TabulationRules {
                elimination_algorithm: algorithm,
                ..TabulationRules::new(rule, 1)
            };
            assert_eq!(winners(&e, &rules), vec![winner], "{} {:?}", rule, algorithm);
        }
    }
}

#[test]
fn first_round_of_the_fixture() {
    init();
    let e = fixture();
    let rules = TabulationRules::new(VotingRule::TidemanAlternative(TopCycleKind::Smith), 1);
    let mut rounds = Tabulator::from_rules(&e, &rules).unwrap().into_rounds();
    let first = rounds.next().unwrap().unwrap();
    assert_eq!(first.round, 1);
    assert_eq!(first.states.vote_count(CandidateId(0)), Decimal::from(20u64));
    assert_eq!(first.states.vote_count(CandidateId(1)), Decimal::from(13u64));
    assert_eq!(first.smith_set, Some([CandidateId(1)].into_iter().collect()));
    assert_eq!(first.schwartz_set, Some([CandidateId(1)].into_iter().collect()));
    let graph = first.graph.unwrap();
    assert_eq!(
        graph.vote_count(CandidateId(0), CandidateId(1)).unwrap(),
        (Decimal::from(20u64), Decimal::from(28u64))
    );
    assert_eq!(first.states.status(CandidateId(0)), Some(Status::Defeated));
    assert_eq!(rounds.count(), 1);
}

#[test]
fn meek_transfers_the_surplus() {
    init();
    let e = election(
        &["A", "B", "C"],
        &[(&["A", "B"], 60), (&["C"], 30), (&["B"], 10)],
    );
    let outcome = run_tabulation(&e, &TabulationRules::new(VotingRule::MeekStv, 2)).unwrap();
    assert_eq!(outcome.winners, vec![CandidateId(0), CandidateId(1)]);
    let last = outcome.rounds.last().unwrap();
    assert_eq!(last.quota, Some("33.333333334".parse().unwrap()));
    assert_eq!(
        last.states.vote_count(CandidateId(1)),
        "36.66666664".parse().unwrap()
    );
    assert_eq!(outcome.final_states.status(CandidateId(2)), Some(Status::Defeated));
    // The counts of the last round are the final ones.
    assert_eq!(outcome.final_states, last.states);
    let quota = last.quota.unwrap();
    for cid in outcome.winners.iter() {
        assert!(outcome.final_states.vote_count(*cid) >= quota);
    }
}

#[test]
fn meek_batch_elimination_counts_the_surplus() {
    init();
    let e = election(
        &["A", "B", "C", "D", "E"],
        &[(&["A", "D"], 66), (&["B", "D"], 35), (&["C"], 24)],
    );
    let rules = TabulationRules {
        precision: 2,
        elimination_algorithm: EliminationAlgorithm::Batch,
        ..TabulationRules::new(VotingRule::MeekStv, 2)
    };
    let outcome = run_tabulation(&e, &rules).unwrap();
    let dec = |s: &str| -> Decimal { s.parse().unwrap() };
    assert_eq!(outcome.rounds.len(), 4);
    assert_eq!(
        outcome.rounds[0].transitions,
        [(CandidateId(0), Status::Elected)].into_iter().collect()
    );

    // The keep factor of A stops moving at 0.64 while A is still above the quota.
    let second = &outcome.rounds[1];
    let quota = second.quota.unwrap();
    assert_eq!(quota, dec("41.67"));
    assert_eq!(second.states.vote_count(CandidateId(0)), dec("42.24"));
    assert_eq!(second.states.vote_count(CandidateId(3)), dec("23.76"));
    assert_eq!(second.surplus, dec("0.57"));
    assert!(second.surplus >= rules.omega);
    for cid in [1, 2, 3, 4] {
        assert!(second.states.vote_count(CandidateId(cid)) < quota);
    }
    // D and E together trail C, but with the surplus D could still overtake C.
    assert_eq!(
        second.transitions,
        [(CandidateId(4), Status::Defeated)].into_iter().collect()
    );

    assert_eq!(
        outcome.rounds[2].transitions,
        [(CandidateId(3), Status::Defeated)].into_iter().collect()
    );
    let last = &outcome.rounds[3];
    assert_eq!(last.quota, Some(dec("33.75")));
    assert_eq!(last.exhausted, dec("23.76"));
    assert_eq!(
        last.transitions,
        [
            (CandidateId(1), Status::Elected),
            (CandidateId(2), Status::Defeated)
        ]
        .into_iter()
        .collect()
    );
    assert_eq!(outcome.winners, vec![CandidateId(0), CandidateId(1)]);
    assert_eq!(outcome.final_states, last.states);
}

#[test]
fn tideman_breaks_a_cycle() {
    init();
    // A > B (5-2), B > C (5-2), C > A (4-3)
    let e = election(
        &["A", "B", "C"],
        &[(&["A", "B", "C"], 3), (&["B", "C", "A"], 2), (&["C", "A", "B"], 2)],
    );
    let rules = TabulationRules::new(VotingRule::TidemanAlternative(TopCycleKind::Smith), 1);
    let outcome = run_tabulation(&e, &rules).unwrap();
    assert_eq!(outcome.rounds[0].smith_set.as_ref().map(|s| s.len()), Some(3));
    // B and C tie on first preferences, candidate order keeps B.
    assert_eq!(
        outcome.rounds[0].transitions,
        [(CandidateId(2), Status::Defeated)].into_iter().collect()
    );
    assert_eq!(outcome.winners, vec![CandidateId(0)]);

    let rp = run_tabulation(&e, &TabulationRules::new(VotingRule::RankedPairs, 1)).unwrap();
    assert_eq!(rp.winners, vec![CandidateId(0)]);
}

#[test]
fn random_tiebreak_is_reproducible() {
    init();
    let e = election(
        &["A", "B", "C", "D"],
        &[(&["A"], 3), (&["B"], 3), (&["C"], 3), (&["D"], 3)],
    );
    let rules = TabulationRules {
        tiebreak: TiebreakMode::Random(2024),
        ..TabulationRules::new(VotingRule::InstantRunoff, 1)
    };
    let first = winners(&e, &rules);
    for _ in 0..3 {
        assert_eq!(winners(&e, &rules), first);
    }
}

#[test]
fn unbreakable_tie_is_reported() {
    init();
    let e = election(&["A", "B"], &[(&["A"], 2), (&["B"], 2)]);
    let rules = TabulationRules {
        tiebreak: TiebreakMode::Series(vec![
            TiebreakMode::Sequential(vec![
                TiebreakMode::LastDifference,
                TiebreakMode::FirstDifference,
            ]),
            TiebreakMode::LastDifference,
            TiebreakMode::FirstDifference,
        ]),
        ..TabulationRules::new(VotingRule::Borda, 1)
    };
    assert!(matches!(
        run_tabulation(&e, &rules),
        Err(TabulationError::UnresolvedTie { round: 1, .. })
    ));
}

#[test]
fn withdrawn_candidates_never_count() {
    init();
    let mut b = Builder::new()
        .candidates(&names(&["Alex", "Chris", "Sam"]))
        .unwrap();
    b.withdraw("Chris").unwrap();
    b.add_vote_simple(&names(&["Chris", "Sam"])).unwrap();
    b.add_vote_simple(&names(&["Chris", "Sam"])).unwrap();
    b.add_vote_simple(&names(&["Alex"])).unwrap();
    let e = b.build();
    let outcome = run_tabulation(&e, &TabulationRules::new(VotingRule::InstantRunoff, 1)).unwrap();
    assert_eq!(outcome.winners, vec![CandidateId(2)]);
    assert_eq!(
        outcome.final_states.status(CandidateId(1)),
        Some(Status::Withdrawn)
    );
}
