use log::{debug, info, warn};

use ranked_tally::builder::Builder;
use ranked_tally::*;
use snafu::{prelude::*, Snafu};

use std::collections::BTreeSet;
use std::fs;

use serde_json::json;
use serde_json::Map as JSMap;
use serde_json::Value as JSValue;
use text_diff::print_diff;

use crate::args::Args;
use crate::tally::config_reader::*;
use crate::tally::io_csv::*;

pub mod config_reader;
pub mod io_csv;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum CliError {
    #[snafu(display("Error opening file {path}"))]
    OpeningJson {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing JSON"))]
    ParsingJson { source: serde_json::Error },
    #[snafu(display("Expected a non-negative integer, found {value}"))]
    ParsingJsonNumber { value: String },
    #[snafu(display("Error reading the decimal value of {field}"))]
    ParsingDecimal {
        source: ParseDecimalError,
        field: String,
    },
    #[snafu(display("Error opening CSV file {path}"))]
    CsvOpen {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error reading CSV line"))]
    CsvLineParse { source: csv::Error },
    #[snafu(display("Line {lineno}: the ballot count {value:?} is not a non-negative integer"))]
    CsvCount { lineno: usize, value: String },
    #[snafu(display("Error writing file {path}"))]
    WritingSummary {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("The tabulation failed"))]
    Tabulation { source: TabulationError },

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

pub type CliResult<T> = Result<T, CliError>;

fn read_seed(js: &JSValue) -> CliResult<u32> {
    let seed = match js {
        JSValue::Number(n) => n.as_u64(),
        JSValue::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    };
    seed.and_then(|s| u32::try_from(s).ok())
        .context(ParsingJsonNumberSnafu {
            value: js.to_string(),
        })
}

fn read_tiebreak_mode(name: &str, seed: Option<u32>) -> CliResult<TiebreakMode> {
    let mode = match name {
        "firstDifference" => TiebreakMode::FirstDifference,
        "lastDifference" => TiebreakMode::LastDifference,
        "candidateOrder" | "useCandidateOrder" => TiebreakMode::CandidateOrder,
        "random" => match seed {
            Some(s) => TiebreakMode::Random(s),
            None => whatever!("The random tiebreak mode requires a randomSeed"),
        },
        x => whatever!("Unknown tiebreak mode {:?}", x),
    };
    Ok(mode)
}

/// Merges the rules of the election file with the command line flags. The flags win.
fn validate_rules(rules: &ElectionRules, args: &Args) -> CliResult<TabulationRules> {
    let algorithm_name = args
        .algorithm
        .clone()
        .or_else(|| rules.algorithm.clone())
        .unwrap_or_else(|| VotingRule::InstantRunoff.identifier().to_string());
    let algorithm: VotingRule = algorithm_name.parse().context(TabulationSnafu {})?;

    let elimination_algorithm = match args
        .elimination
        .as_deref()
        .or(rules.elimination.as_deref())
    {
        None | Some("single") => EliminationAlgorithm::Single,
        Some("batch") => EliminationAlgorithm::Batch,
        Some(x) => whatever!("Unknown elimination algorithm {:?}", x),
    };

    let seed = match (args.random_seed, &rules.random_seed) {
        (Some(s), _) => Some(s),
        (None, Some(js)) => Some(read_seed(js)?),
        (None, None) => None,
    };

    let tiebreak = match &rules.tiebreak {
        None => match args.random_seed {
            Some(s) => TiebreakMode::Random(s),
            None => TiebreakMode::default(),
        },
        Some(names) if names.is_empty() => whatever!("The tiebreak list is empty"),
        Some(names) => {
            let mut modes: Vec<TiebreakMode> = Vec::new();
            for name in names {
                modes.push(read_tiebreak_mode(name, seed)?);
            }
            if rules.tiebreak_series.unwrap_or(false) {
                TiebreakMode::Series(modes)
            } else {
                TiebreakMode::Sequential(modes)
            }
        }
    };

    let omega = match &rules.omega {
        Some(s) => s
            .parse::<Decimal>()
            .context(ParsingDecimalSnafu { field: "omega" })?,
        None => TabulationRules::DEFAULT_OMEGA,
    };

    let res = TabulationRules {
        algorithm,
        seats: args.seats.or(rules.seats).unwrap_or(1),
        elimination_algorithm,
        tiebreak,
        precision: rules
            .precision
            .unwrap_or(TabulationRules::DEFAULT_PRECISION),
        omega,
    };
    res.validate().context(TabulationSnafu {})?;
    Ok(res)
}

fn ballot_names(ballot: &ElectionBallot) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    if let Some(ranking) = &ballot.ranking {
        names.extend(ranking.iter().flat_map(|e| e.names()));
    }
    if let Some(ranks) = &ballot.ranks {
        names.extend(ranks.keys().cloned());
    }
    names
}

/// The roster: the declared candidates, or else every name met on a ballot, in order.
fn candidate_names(config: &ElectionConfig, extra: &[ParsedBallot]) -> Vec<String> {
    if !config.candidates.is_empty() {
        return config.candidates.iter().map(|c| c.name.clone()).collect();
    }
    let mut seen: BTreeSet<String> = BTreeSet::new();
    let mut res: Vec<String> = Vec::new();
    let from_config = config.ballots.iter().flat_map(ballot_names);
    let from_files = extra.iter().flat_map(|pb| pb.ranking.iter().flatten().cloned());
    for name in from_config.chain(from_files) {
        if seen.insert(name.clone()) {
            res.push(name);
        }
    }
    res
}

fn read_rank(name: &str, js: &JSValue) -> CliResult<Decimal> {
    let text = match js {
        JSValue::String(s) => s.clone(),
        x => x.to_string(),
    };
    text.parse::<Decimal>()
        .context(ParsingDecimalSnafu {
            field: format!("the rank of {}", name),
        })
}

fn build_election(config: &ElectionConfig, extra: &[ParsedBallot]) -> CliResult<Election> {
    let names = candidate_names(config, extra);
    if names.is_empty() {
        whatever!("No candidates were declared and no ballot was found");
    }
    let mut builder = Builder::new()
        .candidates(&names)
        .context(TabulationSnafu {})?;
    for c in config.candidates.iter() {
        if c.withdrawn.unwrap_or(false) {
            builder.withdraw(&c.name).context(TabulationSnafu {})?;
        }
    }

    for (idx, ballot) in config.ballots.iter().enumerate() {
        let count = ballot.count.unwrap_or(1);
        match (&ballot.ranking, &ballot.ranks) {
            (Some(ranking), None) => {
                let slots: Vec<Vec<String>> = ranking.iter().map(|e| e.names()).collect();
                builder.add_vote(&slots, count).context(TabulationSnafu {})?;
            }
            (None, Some(ranks)) => {
                let mut values: Vec<(String, Decimal)> = Vec::new();
                for (name, js) in ranks.iter() {
                    values.push((name.clone(), read_rank(name, js)?));
                }
                builder.add_ranks(&values, count).context(TabulationSnafu {})?;
            }
            _ => whatever!(
                "Ballot {} must have exactly one of 'ranking' or 'ranks'",
                idx + 1
            ),
        }
    }
    for pb in extra.iter() {
        builder
            .add_vote(&pb.ranking, pb.count)
            .context(TabulationSnafu {})?;
    }
    Ok(builder.build())
}

fn names_js(election: &Election, ids: &BTreeSet<CandidateId>) -> JSValue {
    json!(ids.iter().map(|c| election.name_of(*c)).collect::<Vec<String>>())
}

fn round_to_json(election: &Election, rr: &RoundResult) -> JSValue {
    let mut tally: JSMap<String, JSValue> = JSMap::new();
    for (cid, state) in rr.states.iter() {
        let counted = matches!(state.status, Status::Hopeful | Status::Elected)
            || rr.transitions.contains_key(&cid);
        if counted {
            tally.insert(election.name_of(cid), json!(state.vote_count.to_string()));
        }
    }

    let mut tally_results: Vec<JSValue> = Vec::new();
    for (cid, status) in rr.transitions.iter() {
        match status {
            Status::Elected => tally_results.push(json!({ "elected": election.name_of(*cid) })),
            Status::Defeated => {
                tally_results.push(json!({ "eliminated": election.name_of(*cid) }))
            }
            _ => {}
        }
    }

    let mut js = JSMap::new();
    js.insert("round".to_string(), json!(rr.round));
    js.insert("tally".to_string(), JSValue::Object(tally));
    js.insert("tallyResults".to_string(), json!(tally_results));
    js.insert("exhausted".to_string(), json!(rr.exhausted.to_string()));
    if let Some(q) = rr.quota {
        js.insert("threshold".to_string(), json!(q.to_string()));
    }
    if !rr.surplus.is_zero() {
        js.insert("surplus".to_string(), json!(rr.surplus.to_string()));
    }
    if let Some(s) = &rr.smith_set {
        js.insert("smithSet".to_string(), names_js(election, s));
    }
    if let Some(s) = &rr.schwartz_set {
        js.insert("schwartzSet".to_string(), names_js(election, s));
    }
    JSValue::Object(js)
}

fn elimination_name(algorithm: EliminationAlgorithm) -> &'static str {
    match algorithm {
        EliminationAlgorithm::Single => "single",
        EliminationAlgorithm::Batch => "batch",
    }
}

fn build_summary_js(election: &Election, rules: &TabulationRules, outcome: &TallyOutcome) -> JSValue {
    let c = OutputConfig {
        algorithm: rules.algorithm.identifier().to_string(),
        seats: rules.seats,
        elimination: elimination_name(rules.elimination_algorithm).to_string(),
        threshold: outcome
            .rounds
            .first()
            .and_then(|r| r.quota)
            .map(|q| q.to_string()),
    };
    let results: Vec<JSValue> = outcome
        .rounds
        .iter()
        .map(|rr| round_to_json(election, rr))
        .collect();
    let winners: Vec<String> = outcome.winners.iter().map(|c| election.name_of(*c)).collect();
    json!({
        "config": c,
        "results": results,
        "winners": winners,
    })
}

/// Tabulates an election read from its description and extra ballots.
pub fn tabulate(config: &ElectionConfig, extra: &[ParsedBallot], args: &Args) -> CliResult<JSValue> {
    let rules = validate_rules(&config.rules, args)?;
    info!("rules: {:?}", rules);
    let election = build_election(config, extra)?;
    info!(
        "election: {} candidates, {} ballots",
        election.candidates.len(),
        election.ballots.total()
    );
    let outcome = run_tabulation(&election, &rules).context(TabulationSnafu {})?;
    debug!("outcome: {:?}", outcome.winners);
    Ok(build_summary_js(&election, &rules, &outcome))
}

fn read_config(path: &str) -> CliResult<ElectionConfig> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    let config: ElectionConfig = serde_json::from_str(&contents).context(ParsingJsonSnafu {})?;
    debug!("config: {:?}", config);
    Ok(config)
}

fn read_summary(path: &str) -> CliResult<JSValue> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    let js: JSValue = serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu {})?;
    Ok(js)
}

pub fn run_election(args: &Args) -> CliResult<()> {
    let config = match &args.config {
        Some(p) => read_config(p)?,
        None => ElectionConfig::default(),
    };
    let extra = match &args.input {
        Some(p) => read_csv_ballots(p)?,
        None => Vec::new(),
    };
    if config.ballots.is_empty() && extra.is_empty() {
        whatever!("No ballots: provide them in the --config file or with --input");
    }

    let result_js = tabulate(&config, &extra, args)?;
    let pretty_js_stats = serde_json::to_string_pretty(&result_js).context(ParsingJsonSnafu {})?;

    match args.out.as_deref() {
        None | Some("stdout") => println!("{}", pretty_js_stats),
        Some(path) => {
            info!("Writing summary to {:?}", path);
            fs::write(path, &pretty_js_stats).context(WritingSummarySnafu { path })?;
        }
    }

    // The reference summary, if provided for comparison
    if let Some(summary_p) = &args.reference {
        let summary_ref = read_summary(summary_p)?;
        let pretty_js_summary_ref =
            serde_json::to_string_pretty(&summary_ref).context(ParsingJsonSnafu {})?;
        if pretty_js_summary_ref != pretty_js_stats {
            warn!("Found differences with the reference string");
            print_diff(
                pretty_js_summary_ref.as_str(),
                pretty_js_stats.as_ref(),
                "\n",
            );
            whatever!("Difference detected between calculated summary and reference summary")
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn run_election_test(test_name: &str) -> CliResult<()> {
        let test_dir = concat!(env!("CARGO_MANIFEST_DIR"), "/demos");
        info!("Running test {}", test_name);
        let args = Args {
            config: Some(format!("{}/{}/{}_config.json", test_dir, test_name, test_name)),
            reference: Some(format!(
                "{}/{}/{}_expected_summary.json",
                test_dir, test_name, test_name
            )),
            out: Some(
                std::env::temp_dir()
                    .join(format!("rtally_{}_summary.json", test_name))
                    .display()
                    .to_string(),
            ),
            ..Args::default()
        };
        run_election(&args)
    }

    fn fixture() -> ElectionConfig {
        serde_json::from_str(
            r#"{
              "candidates": [{ "name": "Alex" }, { "name": "Chris" }, { "name": "Sam" }],
              "ballots": [
                { "count": 20, "ranking": ["Alex", "Chris", "Sam"] },
                { "count": 15, "ranking": ["Sam", "Chris"] },
                { "count": 8, "ranks": { "Chris": 1, "Sam": 2, "Alex": "3" } },
                { "count": 5, "ranking": ["Chris", "Alex"] }
              ]
            }"#,
        )
        .unwrap()
    }

    fn winners(js: &JSValue) -> Vec<String> {
        js["winners"]
            .as_array()
            .unwrap()
            .iter()
            .map(|w| w.as_str().unwrap().to_string())
            .collect()
    }

    #[test]
    fn irv_summary() {
        let js = tabulate(&fixture(), &[], &Args::default()).unwrap();
        assert_eq!(winners(&js), vec!["Alex"]);
        let results = js["results"].as_array().unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0]["tally"]["Chris"], json!("13"));
        assert_eq!(results[0]["threshold"], json!("25"));
        assert_eq!(
            results[0]["tallyResults"],
            json!([{ "eliminated": "Chris" }])
        );
        assert_eq!(results[1]["tally"], json!({ "Alex": "25", "Sam": "23" }));
        assert_eq!(js["config"]["algorithm"], json!("irv"));
    }

    #[test]
    fn flags_override_the_rules() {
        let args = Args::parse_from(["rtally", "--algorithm", "tideman-alternative-smith"]);
        let js = tabulate(&fixture(), &[], &args).unwrap();
        assert_eq!(winners(&js), vec!["Chris"]);
        assert_eq!(js["results"][0]["smithSet"], json!(["Chris"]));
        assert_eq!(js["config"]["algorithm"], json!("tideman-alternative-smith"));
    }

    #[test]
    fn roster_from_csv_ballots() {
        let data = "20,Alex,Chris,Sam\n15,Sam,Chris\n8,Chris,Sam,Alex\n5,Chris,Alex\n";
        let extra = read_csv_from(data.as_bytes()).unwrap();
        let js = tabulate(&ElectionConfig::default(), &extra, &Args::default()).unwrap();
        assert_eq!(winners(&js), vec!["Alex"]);
    }

    #[test]
    fn tiebreak_rules() {
        let rules: ElectionRules = serde_json::from_str(
            r#"{ "algorithm": "borda", "seats": 2, "tiebreak": ["random", "candidateOrder"],
                 "tiebreakSeries": true, "randomSeed": "42", "omega": "0.0001" }"#,
        )
        .unwrap();
        let res = validate_rules(&rules, &Args::default()).unwrap();
        assert_eq!(res.algorithm, VotingRule::Borda);
        assert_eq!(res.seats, 2);
        assert_eq!(
            res.tiebreak,
            TiebreakMode::Series(vec![TiebreakMode::Random(42), TiebreakMode::CandidateOrder])
        );
        assert_eq!(res.omega, "0.0001".parse().unwrap());
    }

    #[test]
    fn bad_rules() {
        let rules: ElectionRules = serde_json::from_str(r#"{ "tiebreak": ["random"] }"#).unwrap();
        assert!(matches!(
            validate_rules(&rules, &Args::default()),
            Err(CliError::Whatever { .. })
        ));
        let args = Args::parse_from(["rtally", "-a", "coombs"]);
        assert!(matches!(
            validate_rules(&ElectionRules::default(), &args),
            Err(CliError::Tabulation {
                source: TabulationError::UnknownAlgorithm { .. }
            })
        ));
        let args = Args::parse_from(["rtally", "--seats", "0"]);
        assert!(matches!(
            validate_rules(&ElectionRules::default(), &args),
            Err(CliError::Tabulation {
                source: TabulationError::Argument { .. }
            })
        ));
    }

    #[test]
    fn unknown_name_on_a_ballot() {
        let mut config = fixture();
        config.ballots.push(ElectionBallot {
            count: Some(1),
            ranking: Some(vec![RankingEntry::Single("Pat".to_string())]),
            ranks: None,
        });
        assert!(matches!(
            tabulate(&config, &[], &Args::default()),
            Err(CliError::Tabulation {
                source: TabulationError::Argument { .. }
            })
        ));
    }

    #[test]
    fn fixture_matches_reference() {
        let _ = env_logger::builder().is_test(true).try_init();
        run_election_test("fixture").unwrap();
    }

    #[test]
    fn tideman_matches_reference() {
        let _ = env_logger::builder().is_test(true).try_init();
        run_election_test("tideman_smith").unwrap();
    }

    #[test]
    fn csv_input_matches_reference() {
        let test_dir = concat!(env!("CARGO_MANIFEST_DIR"), "/demos/fixture");
        let args = Args {
            input: Some(format!("{}/fixture_ballots.csv", test_dir)),
            reference: Some(format!("{}/fixture_expected_summary.json", test_dir)),
            out: Some(
                std::env::temp_dir()
                    .join("rtally_csv_summary.json")
                    .display()
                    .to_string(),
            ),
            ..Args::default()
        };
        run_election(&args).unwrap();
    }

    #[test]
    fn reference_mismatch_is_an_error() {
        let test_dir = concat!(env!("CARGO_MANIFEST_DIR"), "/demos");
        let args = Args {
            config: Some(format!("{}/tideman_smith/tideman_smith_config.json", test_dir)),
            reference: Some(format!("{}/fixture/fixture_expected_summary.json", test_dir)),
            out: Some(
                std::env::temp_dir()
                    .join("rtally_mismatch_summary.json")
                    .display()
                    .to_string(),
            ),
            ..Args::default()
        };
        assert!(matches!(
            run_election(&args),
            Err(CliError::Whatever { .. })
        ));
    }
}
