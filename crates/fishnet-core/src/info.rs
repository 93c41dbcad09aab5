use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Engine identification gathered from `id` lines during the UCI handshake,
/// plus the `options` map attached before every request (`Threads`, `Hash`,
/// and any custom options configured for this worker).
#[derive(Debug, Clone, Default, Serialize)]
pub struct EngineInfo {
    #[serde(flatten)]
    pub fields: BTreeMap<String, String>,
    pub options: BTreeMap<String, String>,
}

impl EngineInfo {
    pub fn name(&self) -> &str {
        self.fields.get("name").map(String::as_str).unwrap_or("Stockfish <?>")
    }
}

/// A centipawn or mate score reported by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Score {
    Cp(i64),
    Mate(i64),
}

/// The accumulated result of a single `go` search invocation.
///
/// Fields mirror the `info` parameters Stockfish reports; each holds the
/// most recently seen value for that parameter within the search. `bestmove`
/// is always present on the wire (as `null` until the engine announces one).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InfoRecord {
    pub bestmove: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub depth: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seldepth: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nodes: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nps: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tbhits: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hashfull: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub multipv: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpuload: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currmovenumber: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub currmove: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refutation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currline: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pv: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub string: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<Score>,
}

impl InfoRecord {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bestmove_serializes_as_null_when_absent() {
        let info = InfoRecord::new();
        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["bestmove"], serde_json::Value::Null);
        assert!(json.get("depth").is_none());
    }

    #[test]
    fn score_is_externally_tagged_lowercase() {
        let mut info = InfoRecord::new();
        info.score = Some(Score::Cp(-12));
        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["score"], serde_json::json!({"cp": -12}));

        info.score = Some(Score::Mate(3));
        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["score"], serde_json::json!({"mate": 3}));
    }
}
