//! Writes the end-of-run artifacts: the full per-peer block ledger
//! (`results.json`), the mining-power-utilization summary
//! (`summary.json`), and a flat, human-readable echo of the run's
//! configuration (`config.txt`).

use crate::config::SimConfig;
use crate::error::DriverError;
use crate::mpu::PeerMpu;
use serde::Serialize;
use shared_types::{PeerId, VirtualTime};
use sim_chain::BlockId;
use std::path::Path;

/// One block as it appears in a peer's local view, for the `results.json`
/// ledger dump.
#[derive(Debug, Serialize)]
pub struct BlockSnapshot {
    pub id: BlockId,
    pub fingerprint: String,
    pub parent: Option<BlockId>,
    pub miner: Option<PeerId>,
    pub created_at: VirtualTime,
    pub arrival_time: VirtualTime,
    pub is_private: bool,
}

/// A single peer's full reported state: its hardware/network tags, every
/// block it knows about, and which of them make up its own longest chain.
#[derive(Debug, Serialize)]
pub struct PeerSnapshot {
    pub peer: PeerId,
    pub description: String,
    pub cpu_power: f64,
    pub longest_chain: Vec<BlockId>,
    pub blocks: Vec<BlockSnapshot>,
}

#[derive(Debug, Serialize)]
pub struct RunResults {
    pub finished_at: VirtualTime,
    pub blocks_mined: u64,
    pub peers: Vec<PeerSnapshot>,
    pub mpu_ratios: Vec<PeerMpu>,
}

#[derive(Debug, Serialize)]
pub struct RunSummary {
    pub mpu_ratios: Vec<PeerMpu>,
}

pub fn write_run_artifacts(
    dir: &Path,
    config: &SimConfig,
    results: &RunResults,
) -> Result<(), DriverError> {
    std::fs::create_dir_all(dir).map_err(|source| DriverError::WriteExport {
        path: dir.display().to_string(),
        source,
    })?;

    write_json(&dir.join("results.json"), results)?;

    let summary = RunSummary {
        mpu_ratios: results.mpu_ratios.clone(),
    };
    write_json(&dir.join("summary.json"), &summary)?;

    write_config_txt(&dir.join("config.txt"), config)?;
    Ok(())
}

fn write_json(path: &Path, value: &impl Serialize) -> Result<(), DriverError> {
    let body = serde_json::to_string_pretty(value)?;
    std::fs::write(path, body).map_err(|source| DriverError::WriteExport {
        path: path.display().to_string(),
        source,
    })
}

fn write_config_txt(path: &Path, config: &SimConfig) -> Result<(), DriverError> {
    let body = format!(
        "test_case_name = {}\n\
         number_of_peers = {}\n\
         z0 = {}\n\
         z1 = {}\n\
         z2 = {}\n\
         min_neighbors = {}\n\
         max_neighbors = {}\n\
         mean_network_delay_millis = {}\n\
         avg_txn_interval_time = {}\n\
         number_of_transactions = {}\n\
         initial_coins = {}\n\
         avg_block_mining_time = {}\n\
         max_num_blocks = {}\n\
         random_seed = {}\n\
         save_results = {}\n",
        config.test_case_name,
        config.number_of_peers,
        config.z0,
        config.z1,
        config.z2,
        config.min_neighbors,
        config.max_neighbors,
        config.mean_network_delay_millis,
        config.avg_txn_interval_time,
        config.number_of_transactions,
        config.initial_coins,
        config.avg_block_mining_time,
        config.max_num_blocks,
        config.random_seed,
        config.save_results,
    );
    std::fs::write(path, body).map_err(|source| DriverError::WriteExport {
        path: path.display().to_string(),
        source,
    })
}
