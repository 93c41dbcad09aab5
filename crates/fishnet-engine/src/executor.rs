//! Drives one job to completion over an [`EngineDriver`]: either the `move`
//! flow (pick a single weakened best move) or the `analysis` flow (evaluate
//! every position along the game).

use std::time::{Duration, Instant};

use fishnet_core::Job;
use log::warn;

use crate::error::DeadEngine;
use crate::uci::{EngineDriver, SearchBudget};
use fishnet_core::InfoRecord;

/// Move time per skill level, indexed by `level - 1`.
const LVL_MOVETIMES: [u64; 8] = [50, 100, 150, 200, 300, 400, 500, 1000];
/// Search depth cap per skill level, indexed by `level - 1`.
const LVL_DEPTHS: [u32; 8] = [1, 1, 2, 3, 5, 8, 13, 22];

/// Minimum gap between progress-report POSTs during analysis.
const PROGRESS_INTERVAL: Duration = Duration::from_millis(3000);

/// Analysis nodes budget cap below which a result without a mate score is
/// suspicious (logged, not corrected).
const SUSPICIOUSLY_FAST_MS: i64 = 100;
/// `nps` readings at or above this are treated as corrupted telemetry.
const CORRUPT_NPS_THRESHOLD: i64 = 100_000_000;

/// `round((level - 1) * 20 / 7)`, clamped into the engine's 0..=20 range.
pub fn skill_level(level: u8) -> u32 {
    let raw = (level.saturating_sub(1) as f64) * 20.0 / 7.0;
    raw.round() as u32
}

fn movetime_ms(level: u8, threads: u32) -> u64 {
    let threads = threads.max(1) as f64;
    let base = LVL_MOVETIMES[(level.saturating_sub(1).min(7)) as usize] as f64;
    let scale = threads * 0.9f64.powi(threads as i32 - 1);
    (base / scale).round() as u64
}

fn depth_for_level(level: u8) -> u32 {
    LVL_DEPTHS[(level.saturating_sub(1).min(7)) as usize]
}

/// Outcome of the `move` flow.
pub struct MoveOutcome {
    pub bestmove: Option<String>,
    pub nodes: u64,
}

pub fn run_move(
    driver: &mut EngineDriver,
    job: &Job,
    threads: u32,
) -> Result<MoveOutcome, DeadEngine> {
    let level = job.work.level.unwrap_or(1).clamp(1, 8);

    driver.set_variant(&job.variant)?;
    driver.set_option("Skill Level", &skill_level(level).to_string())?;
    driver.sync()?;

    let budget = SearchBudget {
        movetime_ms: Some(movetime_ms(level, threads)),
        depth: Some(depth_for_level(level)),
        nodes: None,
        clock: job.work.clock,
    };

    let record = driver.search(&job.position, &job.moves(), &budget)?;
    Ok(MoveOutcome {
        bestmove: record.bestmove,
        nodes: record.nodes.unwrap_or(0).max(0) as u64,
    })
}

/// Outcome of the `analysis` flow.
pub struct AnalysisOutcome {
    pub analysis: Vec<Option<InfoRecord>>,
    pub nodes: u64,
    pub positions: u32,
}

/// Run the analysis flow. `on_progress` is called with the in-progress
/// (partially filled) array whenever more than [`PROGRESS_INTERVAL`] has
/// elapsed since the last call; it is expected to best-effort POST and
/// swallow its own errors.
pub fn run_analysis(
    driver: &mut EngineDriver,
    job: &Job,
    mut on_progress: impl FnMut(&[Option<InfoRecord>]),
) -> Result<AnalysisOutcome, DeadEngine> {
    driver.set_variant(&job.variant)?;
    driver.set_option("Skill Level", "20")?;
    driver.sync()?;
    driver.ucinewgame()?;
    driver.sync()?;

    let nodes_budget = job.analysis_nodes();
    let moves = job.moves();
    let ply_count = moves.len();

    let mut analysis: Vec<Option<InfoRecord>> = vec![None; ply_count + 1];
    let mut nodes_total: u64 = 0;
    let mut positions = 0u32;
    let mut last_report = Instant::now();

    for ply in (0..=ply_count).rev() {
        if last_report.elapsed() >= PROGRESS_INTERVAL {
            on_progress(&analysis);
            last_report = Instant::now();
        }

        let budget = SearchBudget {
            movetime_ms: Some(4000),
            depth: None,
            nodes: Some(nodes_budget),
            clock: None,
        };
        let mut record = driver.search(&job.position, &moves[..ply], &budget)?;

        validate(&mut record);

        nodes_total = nodes_total.saturating_add(record.nodes.unwrap_or(0).max(0) as u64);
        positions += 1;
        analysis[ply] = Some(record);
    }

    Ok(AnalysisOutcome {
        analysis,
        nodes: nodes_total,
        positions,
    })
}

/// The source's two silent-mutation heuristics: warn on suspiciously fast
/// non-mate scores, and drop `nps` readings that look corrupted.
fn validate(record: &mut InfoRecord) {
    let is_mate = matches!(record.score, Some(fishnet_core::Score::Mate(_)));
    if !is_mate {
        if let Some(time) = record.time {
            if time < SUSPICIOUSLY_FAST_MS {
                warn!(target: "fishnet::executor", "suspiciously fast search: {time}ms with no mate score");
            }
        }
    }
    if let Some(nps) = record.nps {
        if nps >= CORRUPT_NPS_THRESHOLD {
            record.nps = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skill_level_maps_to_uci_table() {
        let expected = [0, 3, 6, 9, 11, 14, 17, 20];
        for (level, &want) in (1u8..=8).zip(expected.iter()) {
            assert_eq!(skill_level(level), want, "level {level}");
        }
    }

    #[test]
    fn movetime_matches_low_skill_scenario() {
        // threads=1, level=4 -> movetime 200, depth 3.
        assert_eq!(movetime_ms(4, 1), 200);
        assert_eq!(depth_for_level(4), 3);
    }

    #[test]
    fn corrupt_nps_is_dropped() {
        let mut record = InfoRecord::new();
        record.nps = Some(150_000_000);
        record.time = Some(500);
        validate(&mut record);
        assert_eq!(record.nps, None);
    }

    #[test]
    fn plausible_nps_is_kept() {
        let mut record = InfoRecord::new();
        record.nps = Some(2_000_000);
        validate(&mut record);
        assert_eq!(record.nps, Some(2_000_000));
    }
}
