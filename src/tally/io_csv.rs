// Primitives for reading CSV ballot files.

use std::fs::File;
use std::io::Read;

use crate::tally::*;

/// A ballot as read from a file, before the names are checked against the roster.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ParsedBallot {
    pub count: u64,
    pub ranking: Vec<Vec<String>>,
}

pub fn read_csv_ballots(path: &str) -> CliResult<Vec<ParsedBallot>> {
    info!("Attempting to read ballot file {:?}", path);
    let file = File::open(path).context(CsvOpenSnafu { path })?;
    read_csv_from(file)
}

pub fn read_csv_from<R: Read>(reader: R) -> CliResult<Vec<ParsedBallot>> {
    let rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .comment(Some(b'#'))
        .from_reader(reader);
    let mut res: Vec<ParsedBallot> = Vec::new();
    for (idx, line_r) in rdr.into_records().enumerate() {
        let line = line_r.context(CsvLineParseSnafu {})?;
        let lineno = line
            .position()
            .map(|p| p.line() as usize)
            .unwrap_or(idx + 1);
        let count_field = line.get(0).unwrap_or("");
        let count = count_field
            .parse::<u64>()
            .ok()
            .context(CsvCountSnafu {
                lineno,
                value: count_field,
            })?;
        // An empty field is a skipped rank.
        let ranking: Vec<Vec<String>> = line
            .iter()
            .skip(1)
            .map(|s| {
                if s.is_empty() {
                    Vec::new()
                } else {
                    vec![s.to_string()]
                }
            })
            .collect();
        debug!("read_csv_ballots: lineno: {:?} row: {:?}", lineno, &ranking);
        res.push(ParsedBallot { count, ranking });
    }
    Ok(res)
}
