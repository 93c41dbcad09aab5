use serde::Serialize;

use crate::info::{EngineInfo, InfoRecord};

/// Client identification attached to every request.
///
/// The `python` field name is a wire-format artifact of the protocol this
/// client speaks (it predates this implementation); it carries this
/// client's own runtime identifier, not an actual Python version.
#[derive(Debug, Clone, Serialize)]
pub struct FishnetMeta {
    pub version: String,
    pub python: String,
    pub apikey: String,
}

/// The `{fishnet, stockfish}` object sent with every outbound request.
#[derive(Debug, Clone, Serialize)]
pub struct Envelope {
    pub fishnet: FishnetMeta,
    pub stockfish: EngineInfo,
}

/// Body of a `POST analysis/<id>` request.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisRequest {
    #[serde(flatten)]
    pub envelope: Envelope,
    pub analysis: Vec<Option<InfoRecord>>,
}

/// Body of a `POST move/<id>` request.
#[derive(Debug, Clone, Serialize)]
pub struct MoveRequest {
    #[serde(flatten)]
    pub envelope: Envelope,
    #[serde(rename = "move")]
    pub bestmove: MoveResult,
}

#[derive(Debug, Clone, Serialize)]
pub struct MoveResult {
    pub bestmove: Option<String>,
}
