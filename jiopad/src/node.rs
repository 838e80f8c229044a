use crate::config::Config;
use crate::NodeError;
use consensus::{BlockOutcome, Consensus, ConsensusEvent, Hash, MinerData};
use consensus_core::block::Block;
use consensus_core::tx::ScriptPublicKey;
use std::fs;
use std::path::Path;
use tokio::time::{interval, Duration};
use tracing::{debug, info, warn};

/// Counts of an import run
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ImportSummary {
    pub accepted: usize,
    pub orphaned: usize,
    pub delayed: usize,
    pub rejected: usize,
    pub released: usize,
}

pub struct Node {
    config: Config,
    consensus: Consensus,
}

impl Node {
    pub fn open(config: Config) -> Result<Self, NodeError> {
        let consensus_config = config.consensus_config();
        let consensus = if config.storage.in_memory {
            info!(network = %config.network.network, "opening in-memory consensus");
            Consensus::new(consensus_config)?
        } else {
            let path = config.db_path();
            fs::create_dir_all(&path)?;
            info!(network = %config.network.network, path = %path.display(), "opening consensus database");
            Consensus::open(&path, consensus_config)?
        };
        info!(
            genesis = %consensus.genesis_hash(),
            selected_tip = %consensus.selected_tip(),
            virtual_blue_score = consensus.virtual_blue_score(),
            "consensus ready"
        );
        Ok(Self { config, consensus })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn consensus(&self) -> &Consensus {
        &self.consensus
    }

    /// Processes hex-encoded blocks, one per line. Blank lines and lines
    /// starting with `#` are skipped. Rule violations are counted and logged;
    /// malformed input and fatal errors abort the import.
    pub fn import_blocks(&self, path: &Path) -> Result<ImportSummary, NodeError> {
        let content = fs::read_to_string(path)?;
        let mut summary = ImportSummary::default();
        for (i, line) in content.lines().enumerate() {
            let line_no = i + 1;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let bytes = hex::decode(line).map_err(|source| NodeError::Hex { line: line_no, source })?;
            let block = Block::from_bytes(&bytes).map_err(|source| NodeError::Wire { line: line_no, source })?;
            let hash = block.hash();
            match self.consensus.process_block(block) {
                Ok(result) => {
                    match result.outcome {
                        BlockOutcome::Accepted(_) => summary.accepted += 1,
                        BlockOutcome::Orphan => summary.orphaned += 1,
                        BlockOutcome::Delayed => summary.delayed += 1,
                    }
                    summary.released += result.released.len();
                }
                Err(err) if err.is_fatal() => return Err(err.into()),
                Err(err) => {
                    warn!(line = line_no, %hash, %err, "imported block rejected");
                    summary.rejected += 1;
                }
            }
        }
        info!(path = %path.display(), ?summary, "import finished");
        Ok(summary)
    }

    /// Mines `count` blocks on top of the virtual and checks each one lands
    /// as the new selected tip
    pub fn self_check(&self, count: u64) -> Result<Vec<Hash>, NodeError> {
        let miner = MinerData::new(ScriptPublicKey::new(vec![0x51]), b"jiopad self-check".to_vec());
        let mut mined = Vec::new();
        for _ in 0..count {
            let block = self.consensus.build_block(None, &miner, vec![], None)?;
            let result = self.consensus.process_block(block)?;
            if !result.is_accepted() || self.consensus.selected_tip() != result.hash {
                return Err(NodeError::SelfCheck(format!("block {} did not become the selected tip", result.hash)));
            }
            mined.push(result.hash);
        }
        info!(blocks = count, virtual_blue_score = self.consensus.virtual_blue_score(), "self-check passed");
        Ok(mined)
    }

    /// Releases due delayed blocks once per second and logs consensus
    /// events until interrupted
    pub async fn run(&self) -> Result<(), NodeError> {
        let mut events = self.consensus.subscribe();
        let mut ticker = interval(Duration::from_secs(1));
        loop {
            tokio::select! {
                _ = ticker.tick() => match self.consensus.tick() {
                    Ok(released) if !released.is_empty() => debug!(count = released.len(), "delayed blocks released"),
                    Ok(_) => {}
                    Err(err) if err.is_fatal() => return Err(err.into()),
                    Err(err) => warn!(%err, "releasing delayed blocks failed"),
                },
                Some(event) = events.recv() => log_event(&event),
                _ = tokio::signal::ctrl_c() => {
                    info!("shutdown signal received");
                    return Ok(());
                }
            }
        }
    }
}

fn log_event(event: &ConsensusEvent) {
    match event {
        ConsensusEvent::BlockAdded { hash, blue_score, status, was_unorphaned } => {
            debug!(%hash, blue_score, ?status, was_unorphaned, "block added")
        }
        ConsensusEvent::ChainChanged { removed, added } => {
            info!(removed = removed.len(), added = added.len(), "selected chain changed")
        }
        ConsensusEvent::FinalityConflict { id, current_selected_tip, violating_block } => {
            warn!(id, %current_selected_tip, %violating_block, "finality conflict needs resolution")
        }
        ConsensusEvent::FinalityConflictResolved { id, finality_point } => {
            info!(id, %finality_point, "finality conflict resolved")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use consensus_core::network::NetworkType;
    use std::io::Write;

    fn simnet_in_memory() -> Config {
        let mut config = Config::default();
        config.network.network = NetworkType::Simnet;
        config.storage.in_memory = true;
        config
    }

    #[test]
    fn test_self_check_extends_the_chain() {
        let node = Node::open(simnet_in_memory()).unwrap();
        let mined = node.self_check(3).unwrap();
        assert_eq!(mined.len(), 3);
        assert_eq!(node.consensus().selected_tip(), mined[2]);
        assert_eq!(node.consensus().virtual_blue_score(), 4);
    }

    #[test]
    fn test_import_reports_bad_lines() {
        let node = Node::open(simnet_in_memory()).unwrap();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# comment").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "zz").unwrap();
        assert!(matches!(node.import_blocks(file.path()), Err(NodeError::Hex { line: 3, .. })));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "00").unwrap();
        assert!(matches!(node.import_blocks(file.path()), Err(NodeError::Wire { line: 1, .. })));
    }
}
