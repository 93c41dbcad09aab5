use serde::Deserialize;

/// Opaque, server-assigned job identifier.
pub type JobId = String;

/// Default analysis node budget when a job does not specify one.
pub const DEFAULT_ANALYSIS_NODES: u64 = 3_500_000;

/// The two kinds of work the server can hand out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkType {
    Analysis,
    Move,
}

/// Remaining clock time for both sides, used by the `move` flow.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Clock {
    pub wtime: u64,
    pub btime: u64,
    pub inc: u64,
}

/// The `work` sub-object of a [`Job`].
#[derive(Debug, Clone, Deserialize)]
pub struct WorkSpec {
    pub id: JobId,
    #[serde(rename = "type")]
    pub kind: WorkType,
    #[serde(default)]
    pub level: Option<u8>,
    #[serde(default)]
    pub clock: Option<Clock>,
}

fn default_variant() -> String {
    "standard".to_string()
}

/// A unit of work returned by `acquire`.
#[derive(Debug, Clone, Deserialize)]
pub struct Job {
    pub work: WorkSpec,
    pub game_id: String,
    #[serde(default = "default_variant")]
    pub variant: String,
    pub position: String,
    #[serde(default)]
    pub moves: String,
    #[serde(default)]
    pub nodes: Option<u64>,
}

impl Job {
    pub fn id(&self) -> &str {
        &self.work.id
    }

    /// `moves` split on single spaces; empty when the position has no history.
    pub fn moves(&self) -> Vec<&str> {
        if self.moves.is_empty() {
            Vec::new()
        } else {
            self.moves.split(' ').collect()
        }
    }

    pub fn analysis_nodes(&self) -> u64 {
        self.nodes.unwrap_or(DEFAULT_ANALYSIS_NODES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_move_job() {
        let raw = r#"{
            "work": {"id": "x", "type": "move", "level": 4,
                      "clock": {"wtime": 6000, "btime": 6000, "inc": 0}},
            "game_id": "abcd1234",
            "variant": "standard",
            "position": "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1",
            "moves": "e2e4 e7e5"
        }"#;
        let job: Job = serde_json::from_str(raw).unwrap();
        assert_eq!(job.id(), "x");
        assert_eq!(job.work.kind, WorkType::Move);
        assert_eq!(job.work.level, Some(4));
        assert_eq!(job.moves(), vec!["e2e4", "e7e5"]);
        assert_eq!(job.work.clock.unwrap().wtime, 6000);
    }

    #[test]
    fn defaults_variant_and_nodes() {
        let raw = r#"{
            "work": {"id": "y", "type": "analysis"},
            "game_id": "z",
            "position": "startpos",
            "moves": ""
        }"#;
        let job: Job = serde_json::from_str(raw).unwrap();
        assert_eq!(job.variant, "standard");
        assert!(job.moves().is_empty());
        assert_eq!(job.analysis_nodes(), DEFAULT_ANALYSIS_NODES);
    }
}
