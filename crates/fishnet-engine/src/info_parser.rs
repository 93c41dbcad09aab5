//! Parser for a single UCI `info` line.
//!
//! Tokenized once; each recognized keyword switches the parser into a state
//! and subsequent tokens are interpreted under that state until the next
//! keyword. The `string` state is special: once entered, every remaining
//! token belongs to it verbatim, even if it looks like another keyword —
//! this is the one place the source format is genuinely ambiguous, and we
//! resolve it by never re-tokenizing inside `string`.

use fishnet_core::{InfoRecord, Score};

#[derive(Clone, Copy, PartialEq, Eq)]
enum State {
    None,
    Depth,
    SelDepth,
    Time,
    Nodes,
    Nps,
    TbHits,
    HashFull,
    MultiPv,
    CpuLoad,
    CurrMoveNumber,
    CurrMove,
    Refutation,
    CurrLine,
    Pv,
    String,
    Score,
}

enum ScoreToken {
    Cp(i64),
    Mate(i64),
    Bound,
}

/// Feed one `info` line (without the leading `info` token) into an
/// accumulating [`InfoRecord`].
pub fn apply_info_line(record: &mut InfoRecord, line: &str) {
    let mut state = State::None;
    let mut score_kind: Option<ScoreToken> = None;
    let mut bounded = false;

    let tokens: Vec<&str> = line.split(' ').filter(|t| !t.is_empty()).collect();
    let mut i = 0;
    while i < tokens.len() {
        let tok = tokens[i];

        if matches!(state, State::String) {
            append_string(&mut record.string, tok);
            i += 1;
            continue;
        }

        match tok {
            "depth" => {
                state = State::Depth;
                record.depth = None;
            }
            "seldepth" => {
                state = State::SelDepth;
                record.seldepth = None;
            }
            "time" => {
                state = State::Time;
                record.time = None;
            }
            "nodes" => {
                state = State::Nodes;
                record.nodes = None;
            }
            "nps" => {
                state = State::Nps;
                record.nps = None;
            }
            "tbhits" => {
                state = State::TbHits;
                record.tbhits = None;
            }
            "hashfull" => {
                state = State::HashFull;
                record.hashfull = None;
            }
            "multipv" => {
                state = State::MultiPv;
                record.multipv = None;
            }
            "cpuload" => {
                state = State::CpuLoad;
                record.cpuload = None;
            }
            "currmovenumber" => {
                state = State::CurrMoveNumber;
                record.currmovenumber = None;
            }
            "currmove" => {
                state = State::CurrMove;
                record.currmove = None;
            }
            "refutation" => {
                state = State::Refutation;
                record.refutation = None;
            }
            "currline" => {
                state = State::CurrLine;
                record.currline = None;
            }
            "string" => {
                state = State::String;
                record.string = None;
            }
            "pv" => {
                state = State::Pv;
                if record.multipv.unwrap_or(1) == 1 {
                    record.pv = None;
                }
            }
            "score" => {
                state = State::Score;
                score_kind = None;
                bounded = false;
            }
            other => match state {
                State::Depth => record.depth = parse_i64(other).or(record.depth),
                State::SelDepth => record.seldepth = parse_i64(other).or(record.seldepth),
                State::Time => record.time = parse_i64(other).or(record.time),
                State::Nodes => record.nodes = parse_i64(other).or(record.nodes),
                State::Nps => record.nps = parse_i64(other).or(record.nps),
                State::TbHits => record.tbhits = parse_i64(other).or(record.tbhits),
                State::HashFull => record.hashfull = parse_i64(other).or(record.hashfull),
                State::MultiPv => record.multipv = parse_i64(other).or(record.multipv),
                State::CpuLoad => record.cpuload = parse_i64(other).or(record.cpuload),
                State::CurrMoveNumber => {
                    record.currmovenumber = parse_i64(other).or(record.currmovenumber)
                }
                State::CurrMove => append_string(&mut record.currmove, other),
                State::Refutation => append_string(&mut record.refutation, other),
                State::CurrLine => append_string(&mut record.currline, other),
                State::Pv => {
                    if record.multipv.unwrap_or(1) == 1 {
                        append_string(&mut record.pv, other);
                    }
                }
                State::Score => match other {
                    "cp" => score_kind = None, // value follows
                    "mate" => score_kind = None,
                    "lowerbound" | "upperbound" => bounded = true,
                    value => {
                        if let Some(n) = parse_i64(value) {
                            score_kind = Some(match tokens.get(i.wrapping_sub(1)) {
                                Some(&"mate") => ScoreToken::Mate(n),
                                _ => ScoreToken::Cp(n),
                            });
                        }
                    }
                },
                State::None | State::String => {}
            },
        }
        i += 1;
    }

    if !bounded {
        match score_kind {
            Some(ScoreToken::Cp(v)) => record.score = Some(Score::Cp(v)),
            Some(ScoreToken::Mate(v)) => record.score = Some(Score::Mate(v)),
            Some(ScoreToken::Bound) | None => {}
        }
    }
}

fn parse_i64(tok: &str) -> Option<i64> {
    tok.parse().ok()
}

fn append_string(field: &mut Option<String>, tok: &str) {
    match field {
        Some(existing) => {
            existing.push(' ');
            existing.push_str(tok);
        }
        None => *field = Some(tok.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_depth_wins() {
        let mut rec = InfoRecord::new();
        apply_info_line(&mut rec, "depth 5 depth 7");
        assert_eq!(rec.depth, Some(7));
    }

    #[test]
    fn string_consumes_rest_of_line_without_retokenizing() {
        let mut rec = InfoRecord::new();
        apply_info_line(&mut rec, "string foo bar baz");
        assert_eq!(rec.string.as_deref(), Some("foo bar baz"));
    }

    #[test]
    fn string_value_containing_keyword_is_not_reinterpreted() {
        let mut rec = InfoRecord::new();
        apply_info_line(&mut rec, "string NNUE depth scaling enabled");
        assert_eq!(rec.string.as_deref(), Some("NNUE depth scaling enabled"));
        assert_eq!(rec.depth, None);
    }

    #[test]
    fn bounded_score_is_dropped() {
        let mut rec = InfoRecord::new();
        apply_info_line(&mut rec, "score cp -12 lowerbound");
        assert_eq!(rec.score, None);
    }

    #[test]
    fn unbounded_cp_score_is_kept() {
        let mut rec = InfoRecord::new();
        apply_info_line(&mut rec, "depth 10 score cp -34 nodes 1000");
        assert_eq!(rec.score, Some(Score::Cp(-34)));
        assert_eq!(rec.nodes, Some(1000));
    }

    #[test]
    fn mate_score() {
        let mut rec = InfoRecord::new();
        apply_info_line(&mut rec, "score mate 3");
        assert_eq!(rec.score, Some(Score::Mate(3)));
    }

    #[test]
    fn pv_erased_only_when_multipv_is_one() {
        let mut rec = InfoRecord::new();
        rec.pv = Some("e2e4 e7e5".to_string());
        apply_info_line(&mut rec, "multipv 2 pv d2d4");
        // multipv switched to 2 before pv token, so prior pv is preserved
        assert_eq!(rec.pv.as_deref(), Some("e2e4 e7e5"));

        apply_info_line(&mut rec, "multipv 1 pv g1f3");
        assert_eq!(rec.pv.as_deref(), Some("g1f3"));
    }
}
