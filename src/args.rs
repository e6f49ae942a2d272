use clap::Parser;

/// This is a ranked ballot tabulation program.
#[derive(Parser, Debug, Clone, Default)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (file path, optional) The JSON file describing the election: candidates, ballots and rules.
    /// The format is described in the manual of the ranked_tally library.
    #[clap(short, long, value_parser)]
    pub config: Option<String>,

    /// (file path) A reference file containing the outcome of an election in JSON format. If provided, rtally will
    /// check that the tabulated output matches the reference.
    #[clap(short, long, value_parser)]
    pub reference: Option<String>,

    /// (file path, 'stdout' or empty) If specified, the summary of the election will be written in JSON format to the given
    /// location. By default, it is printed on the standard output.
    #[clap(short, long, value_parser)]
    pub out: Option<String>,

    /// (file path or empty) A CSV file of ballots: one line per ballot, the count followed by the choices.
    /// The ballots are added to the ones of the --config file, if any. Without a --config file, the
    /// candidates are the names found in the ballots.
    #[clap(short, long, value_parser)]
    pub input: Option<String>,

    /// (default irv) The voting method: irv, tideman-alternative-smith, tideman-alternative-schwartz,
    /// ranked-pairs, borda, minimax or meek-stv. Overrides the rules of the --config file.
    #[clap(short, long, value_parser)]
    pub algorithm: Option<String>,

    /// (default 1) The number of seats to fill.
    #[clap(short, long, value_parser)]
    pub seats: Option<u32>,

    /// (single or batch, default single) How the weakest candidates are eliminated.
    #[clap(long, value_parser)]
    pub elimination: Option<String>,

    /// (integer) The seed of the random tiebreak.
    #[clap(long, value_parser)]
    pub random_seed: Option<u32>,

    // Other arguments
    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, takes_value = false)]
    pub verbose: bool,
}
