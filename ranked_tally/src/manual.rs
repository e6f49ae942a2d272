/*!

This is the long-form manual for `ranked_tally` and `rtally`.

## Voting methods

The method is chosen with its identifier, in the `algorithm` field of the rules or with
the `--algorithm` flag of `rtally`.

### `irv`

Instant runoff. Each ballot counts for its most preferred candidate still standing. A
candidate reaching the threshold `floor(counted / (seats + 1)) + 1` is elected, where
`counted` leaves out the ballots that no longer rank a standing candidate. Otherwise the
weakest candidates are eliminated and their ballots move to the next choice.

With several seats, the ballots of elected candidates keep counting for them: use
`meek-stv` to transfer surpluses.

### `tideman-alternative-smith`, `tideman-alternative-schwartz`

Every round, the candidates outside the top cycle (Smith or Schwartz set) of the
standing candidates are eliminated. When all the hopefuls belong to the top cycle, the
weakest by first preferences is eliminated instead.

The Smith set is the smallest set of candidates that beat or tie everyone outside of
it. The Schwartz set only accepts strict wins, and may be smaller.

### `ranked-pairs`

The head-to-head victories are sorted from the strongest to the weakest (winning votes,
then fewest losing votes) and locked in that order, skipping any
victory that would contradict the ones already locked. The candidate that is not
beaten by any locked victory is elected. Victories of the same strength are ordered
with the tiebreak rules: the victory of the stronger winner first, and for the same
winner, the victory over the weaker loser first. With several seats, the count starts
again without the elected candidates.

### `borda`

On each ballot, a candidate earns one point per standing candidate ranked below it.
Candidates missing from a ballot are ranked below all the candidates on it. The
highest score is elected.

### `minimax`

The score of a candidate is the number of ballots minus the largest number of ballots
preferring one opponent over it. The highest score is elected.

### `meek-stv`

Meek single transferable vote. Elected candidates keep only the share of each ballot
they need to reach the quota, and pass the rest on to the next choices. The quota is
`floor(total / (seats + 1))` plus one unit of the last decimal, where `total` is the
weight still held by standing candidates.

All the weights are computed with `precision` decimal digits (9 by default, at most 12).
The shares are lowered again and again until a candidate reaches the quota, the surplus
drops below `omega` (0.000001 by default), or the shares stop going down. The surplus
is the votes of the elected candidates above the quota, less the votes those below it
are missing, and is never negative. The weakest candidates are then eliminated.
Once every seat is filled, the count stops: the last round holds the final weights.

## Elimination

* `single` eliminates the weakest candidate.
* `batch` eliminates at once all the weakest candidates whose votes together, plus the
  surplus not transferred yet, stay strictly below the weakest candidate kept. Enough
  candidates are always kept to fill the seats. When no such group exists, a single
  candidate is eliminated.

## Ties

The tiebreak setting is a list of modes:

* `firstDifference` looks for the first round where the tied candidates had different counts.
* `lastDifference` looks for the most recent round where the tied candidates had different counts.
* `candidateOrder` picks the candidate declared first.
* `random` orders the candidates by the SHA-256 digest of the seed, the round and their
  name. The result is the same on every platform.

By default, a list is applied in sequence: each mode narrows the candidates left by the
previous one. In `series` mode, each mode is tried on the full set of tied candidates and
the first one that picks a single candidate wins.

A tie that none of the modes can break stops the tabulation with an error. The default
list is `lastDifference`, `firstDifference`, `candidateOrder`, which always concludes.

## Election file

`rtally` reads a JSON file:

```json
{
  "candidates": [
    { "name": "Alex" },
    { "name": "Chris" },
    { "name": "Sam", "withdrawn": false }
  ],
  "ballots": [
    { "count": 20, "ranking": ["Alex", "Chris", "Sam"] },
    { "count": 15, "ranks": { "Sam": 1, "Chris": 2 } }
  ],
  "rules": {
    "algorithm": "irv",
    "seats": 1,
    "elimination": "single",
    "tiebreak": ["lastDifference", "firstDifference", "candidateOrder"],
    "tiebreakSeries": false,
    "randomSeed": 0,
    "precision": 9,
    "omega": "0.000001"
  }
}
```

A `ranking` entry may also be a list of names, for candidates sharing the same rank.
Ballots may instead come from a CSV file (`--input`): one line per ballot, a count
followed by the choices in order.

```text
20,Alex,Chris,Sam
15,Sam,Chris
```

*/
