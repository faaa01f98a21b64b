//! Chain State Management
//!
//! Connects blocks in height order, tracking the median time past and the
//! unspent outputs that lock-time validation runs against. Every non-coinbase
//! transaction in a block goes through the same [`AdmissionGate`] the
//! mempool uses, with the block being connected as the snapshot.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::config::ConsensusParams;
use crate::core::admission::{AdmissionError, AdmissionGate, ChainSnapshot};
use crate::core::block::Block;
use crate::core::error::ErrorKind;
use crate::core::median_time::{MedianTimeError, MedianTimePastTracker};
use crate::core::script::{verify_spend_condition, ScriptError};
use crate::core::sequence_lock::{SequenceLockError, UtxoMaturity};
use crate::core::transaction::{OutPoint, Transaction};
use crate::storage::utxo_set::{UtxoProvider, UtxoSet};

// =============================================================================
// Errors
// =============================================================================

/// Block connection failures. Any of these makes the block invalid.
#[derive(Error, Debug)]
pub enum ChainError {
    #[error("block {index} does not extend the tip at height {tip}")]
    InvalidLinkage { index: u64, tip: u64 },
    #[error("block {0} has an invalid merkle root")]
    InvalidMerkleRoot(u64),
    #[error("block timestamp {time} is not after median time past {median_time_past}")]
    TimestampTooOld { time: i64, median_time_past: i64 },
    #[error("block timestamp {time} is too far in the future (limit {limit})")]
    TimestampTooNew { time: i64, limit: i64 },
    #[error("coinbase transaction {0} is not the first transaction")]
    MisplacedCoinbase(String),
    #[error("transaction {0} is flagged coinbase but does not spend the null outpoint")]
    MalformedCoinbase(String),
    #[error("transaction id {0} does not match its contents")]
    TransactionIdMismatch(String),
    #[error("transaction {tx_id} overwrites unspent output {outpoint}")]
    DuplicateOutput { tx_id: String, outpoint: OutPoint },
    #[error("transaction {tx_id} spends missing output {outpoint}")]
    MissingInput { tx_id: String, outpoint: OutPoint },
    #[error("block contains unfinalized transaction {0}")]
    UnfinalizedTransaction(String),
    #[error("block contains transaction {0} whose input sequence locks are not met")]
    SequenceLocksNotMet(String),
    #[error("script failure in transaction {tx_id}: {source}")]
    Script {
        tx_id: String,
        #[source]
        source: ScriptError,
    },
    #[error(transparent)]
    Maturity(#[from] SequenceLockError),
    #[error(transparent)]
    History(#[from] MedianTimeError),
}

impl ChainError {
    /// Lock-time rejection kind, if this failure is one
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            ChainError::UnfinalizedTransaction(_) => Some(ErrorKind::NonFinalTransaction),
            ChainError::SequenceLocksNotMet(_) => Some(ErrorKind::PrematureSequenceLock),
            ChainError::Maturity(e) => Some(e.kind()),
            ChainError::History(e) => Some(e.kind()),
            _ => None,
        }
    }

    fn from_admission(err: AdmissionError) -> Self {
        match err {
            AdmissionError::NonFinal { tx_id, .. } => ChainError::UnfinalizedTransaction(tx_id),
            AdmissionError::PrematureSequenceLock { tx_id, .. } => {
                ChainError::SequenceLocksNotMet(tx_id)
            }
            AdmissionError::Maturity(e) => ChainError::Maturity(e),
        }
    }
}

// =============================================================================
// Chain State
// =============================================================================

#[derive(Debug, Clone)]
pub struct ChainState {
    params: ConsensusParams,
    gate: AdmissionGate,
    blocks: Vec<Block>,
    median_time: MedianTimePastTracker,
    /// Median time past after connecting the block at each height
    mtp_by_height: Vec<i64>,
    utxos: UtxoSet,
}

impl ChainState {
    /// Start a chain from a genesis block with the given timestamp
    pub fn new(params: ConsensusParams, genesis_time: DateTime<Utc>) -> Self {
        let genesis = Block::genesis(genesis_time);
        let time = genesis.time();

        let mut median_time = MedianTimePastTracker::with_span(params.median_time_span);
        median_time.push_block(time);

        let mut utxos = UtxoSet::new();
        for tx in &genesis.transactions {
            utxos.add_outputs(tx, UtxoMaturity::new(0, time));
        }

        Self {
            gate: AdmissionGate::new(&params),
            params,
            blocks: vec![genesis],
            median_time,
            mtp_by_height: vec![time],
            utxos,
        }
    }

    pub fn params(&self) -> &ConsensusParams {
        &self.params
    }

    pub fn gate(&self) -> &AdmissionGate {
        &self.gate
    }

    pub fn utxos(&self) -> &UtxoSet {
        &self.utxos
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Height of the tip block
    pub fn height(&self) -> u64 {
        self.blocks.len() as u64 - 1
    }

    pub fn tip(&self) -> &Block {
        &self.blocks[self.blocks.len() - 1]
    }

    /// Median time past as of the tip
    pub fn median_time_past(&self) -> Result<i64, MedianTimeError> {
        self.median_time.median()
    }

    /// Median time past as of the block at `height`
    pub fn median_time_past_at(&self, height: u64) -> Option<i64> {
        self.mtp_by_height.get(height as usize).copied()
    }

    /// Snapshot for the next block: the one a mempool transaction would be
    /// mined in.
    pub fn next_block_snapshot(&self) -> Result<ChainSnapshot, MedianTimeError> {
        Ok(ChainSnapshot::new(
            self.height() as i64 + 1,
            self.median_time_past()?,
        ))
    }

    /// Maturity data for the outputs spent by `tx`, in input order
    pub fn maturity_for(&self, tx: &Transaction) -> Result<Vec<UtxoMaturity>, ChainError> {
        lookup_maturity(&self.utxos, tx)
    }

    /// Validate and connect a block on top of the tip.
    ///
    /// Nothing is modified unless the whole block is valid.
    pub fn connect_block(&mut self, block: Block) -> Result<(), ChainError> {
        let tip = self.tip();
        if block.index != tip.index + 1 || block.header.previous_hash != tip.hash {
            return Err(ChainError::InvalidLinkage {
                index: block.index,
                tip: tip.index,
            });
        }

        if !block.verify_merkle_root() {
            return Err(ChainError::InvalidMerkleRoot(block.index));
        }

        let snapshot = self.next_block_snapshot()?;
        self.check_timestamp(&block, snapshot.median_time_past)?;

        let mut staged = self.utxos.clone();
        for (position, tx) in block.transactions.iter().enumerate() {
            if tx.is_coinbase {
                if position != 0 {
                    return Err(ChainError::MisplacedCoinbase(tx.id.clone()));
                }
                if !tx.is_valid_coinbase() {
                    return Err(ChainError::MalformedCoinbase(tx.id.clone()));
                }
                self.gate
                    .admit(tx, &[], &snapshot)
                    .map_err(ChainError::from_admission)?;
            } else {
                check_transaction_id(tx)?;
                let maturity = lookup_maturity(&staged, tx)?;
                self.gate
                    .admit(tx, &maturity, &snapshot)
                    .map_err(ChainError::from_admission)?;
                verify_conditions(&staged, tx)?;
                staged.spend_inputs(tx);
            }

            if let Some(outpoint) = staged.first_unspent_output(tx) {
                return Err(ChainError::DuplicateOutput {
                    tx_id: tx.id.clone(),
                    outpoint,
                });
            }
            staged.add_outputs(
                tx,
                UtxoMaturity::new(snapshot.height, snapshot.median_time_past),
            );
        }

        self.utxos = staged;
        self.median_time.push_block(block.time());
        self.mtp_by_height.push(self.median_time.median()?);

        log::info!(
            "Connected block {} ({} txs), median time past {}",
            block.index,
            block.transactions.len(),
            self.mtp_by_height[self.mtp_by_height.len() - 1]
        );
        self.blocks.push(block);

        Ok(())
    }

    /// Build a block on the tip from `transactions` and connect it
    pub fn extend(
        &mut self,
        timestamp: DateTime<Utc>,
        transactions: Vec<Transaction>,
    ) -> Result<&Block, ChainError> {
        let tip = self.tip();
        let block = Block::new(tip.index + 1, tip.hash.clone(), timestamp, transactions);
        self.connect_block(block)?;
        Ok(self.tip())
    }

    fn check_timestamp(&self, block: &Block, median_time_past: i64) -> Result<(), ChainError> {
        let time = block.time();
        if time <= median_time_past {
            return Err(ChainError::TimestampTooOld {
                time,
                median_time_past,
            });
        }

        let limit = Utc::now().timestamp() + self.params.max_future_block_time;
        if time > limit {
            return Err(ChainError::TimestampTooNew { time, limit });
        }

        Ok(())
    }
}

pub(crate) fn check_transaction_id(tx: &Transaction) -> Result<(), ChainError> {
    if !tx.has_valid_id() {
        return Err(ChainError::TransactionIdMismatch(tx.id.clone()));
    }
    Ok(())
}

fn lookup_maturity<P: UtxoProvider>(
    utxos: &P,
    tx: &Transaction,
) -> Result<Vec<UtxoMaturity>, ChainError> {
    if let Some(outpoint) = utxos.first_missing(tx) {
        return Err(ChainError::MissingInput {
            tx_id: tx.id.clone(),
            outpoint: outpoint.clone(),
        });
    }
    Ok(utxos.maturities_for(tx).unwrap_or_default())
}

/// Check the lock-time conditions of every output `tx` spends
pub(crate) fn verify_conditions<P: UtxoProvider>(
    utxos: &P,
    tx: &Transaction,
) -> Result<(), ChainError> {
    for (index, input) in tx.inputs.iter().enumerate() {
        if let Some(entry) = utxos.lookup(&input.previous_output) {
            verify_spend_condition(&entry.output.condition, tx, index).map_err(|source| {
                ChainError::Script {
                    tx_id: tx.id.clone(),
                    source,
                }
            })?;
        }
    }
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::script::SpendCondition;
    use crate::core::sequence::lock_time_to_sequence;
    use crate::core::transaction::{TransactionBuilder, TransactionOutput};
    use chrono::TimeZone;

    const GENESIS_TIME: i64 = 1_600_000_000;
    const SPACING: i64 = 600;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn funding(id: &str, condition: SpendCondition) -> Transaction {
        let mut tx = Transaction::coinbase(
            vec![TransactionOutput {
                amount: 50,
                recipient: "alice".to_string(),
                condition,
            }],
            0,
        );
        tx.id = id.to_string();
        tx
    }

    /// Chain with a funding coinbase in block 1
    fn funded_chain(condition: SpendCondition) -> ChainState {
        let mut chain = ChainState::new(ConsensusParams::default(), at(GENESIS_TIME));
        chain
            .extend(at(GENESIS_TIME + SPACING), vec![funding("fund", condition)])
            .unwrap();
        chain
    }

    fn mine_empty(chain: &mut ChainState, count: u64) {
        for _ in 0..count {
            let time = chain.tip().time() + SPACING;
            chain.extend(at(time), vec![]).unwrap();
        }
    }

    fn next_time(chain: &ChainState) -> DateTime<Utc> {
        at(chain.tip().time() + SPACING)
    }

    fn spend(version: i32, sequence: u32, lock_time: u32) -> Transaction {
        TransactionBuilder::new()
            .version(version)
            .add_input_with_sequence(OutPoint::new("fund", 0), sequence)
            .add_output("bob", 50)
            .lock_time(lock_time)
            .build()
    }

    #[test]
    fn test_new_chain() {
        let chain = ChainState::new(ConsensusParams::default(), at(GENESIS_TIME));
        assert_eq!(chain.height(), 0);
        assert_eq!(chain.median_time_past().unwrap(), GENESIS_TIME);
        assert_eq!(
            chain.next_block_snapshot().unwrap(),
            ChainSnapshot::new(1, GENESIS_TIME)
        );
    }

    #[test]
    fn test_outputs_record_parent_median_time() {
        let mut chain = ChainState::new(ConsensusParams::default(), at(GENESIS_TIME));
        mine_empty(&mut chain, 5);
        let expected_mtp = chain.median_time_past().unwrap();
        chain
            .extend(next_time(&chain), vec![funding("fund", SpendCondition::Anyone)])
            .unwrap();

        let tx = spend(2, 0, 0);
        assert_eq!(
            chain.maturity_for(&tx).unwrap(),
            vec![UtxoMaturity::new(6, expected_mtp)]
        );
        assert_eq!(chain.median_time_past_at(6), chain.median_time_past().ok());
    }

    #[test]
    fn test_block_relative_lock() {
        let mut chain = funded_chain(SpendCondition::Anyone);

        // Funding output confirmed at height 1; a 10 block lock can be mined
        // in block 11 at the earliest
        mine_empty(&mut chain, 8);
        let tx = spend(2, 10, 0);
        let err = chain.extend(next_time(&chain), vec![tx.clone()]).unwrap_err();
        assert!(err.to_string().contains("sequence locks are not met"));
        assert_eq!(err.kind(), Some(ErrorKind::PrematureSequenceLock));
        assert_eq!(chain.height(), 9);

        mine_empty(&mut chain, 1);
        chain.extend(next_time(&chain), vec![tx]).unwrap();
        assert_eq!(chain.utxos().balance("bob"), 50);
    }

    #[test]
    fn test_time_relative_lock() {
        let mut chain = funded_chain(SpendCondition::Anyone);
        let confirmed_mtp = chain.maturity_for(&spend(2, 0, 0)).unwrap()[0].confirmation_mtp;

        let tx = spend(2, lock_time_to_sequence(true, 512 * 4).unwrap(), 0);
        while chain.median_time_past().unwrap() < confirmed_mtp + 2048 {
            assert!(chain.extend(next_time(&chain), vec![tx.clone()]).is_err());
            mine_empty(&mut chain, 1);
        }
        chain.extend(next_time(&chain), vec![tx]).unwrap();
    }

    #[test]
    fn test_unfinalized_transaction() {
        let mut chain = funded_chain(SpendCondition::Anyone);
        mine_empty(&mut chain, 3);
        let mtp = chain.median_time_past().unwrap();

        let tx = spend(1, 0, mtp as u32);
        let err = chain.extend(next_time(&chain), vec![tx]).unwrap_err();
        assert!(err.to_string().contains("unfinalized"));
        assert_eq!(err.kind(), Some(ErrorKind::NonFinalTransaction));

        let tx = spend(1, 0, (mtp - 1) as u32);
        chain.extend(next_time(&chain), vec![tx]).unwrap();
    }

    #[test]
    fn test_height_lock_uses_block_height() {
        let mut chain = funded_chain(SpendCondition::Anyone);
        // Next block is height 2
        assert!(chain.extend(next_time(&chain), vec![spend(1, 0, 2)]).is_err());
        chain.extend(next_time(&chain), vec![spend(1, 0, 1)]).unwrap();
    }

    #[test]
    fn test_csv_output() {
        let mut chain = funded_chain(SpendCondition::CheckSequenceVerify(3));
        mine_empty(&mut chain, 5);

        // Sequence commits to less than the output requires
        let err = chain
            .extend(next_time(&chain), vec![spend(2, 2, 0)])
            .unwrap_err();
        assert!(matches!(err, ChainError::Script { .. }));

        chain.extend(next_time(&chain), vec![spend(2, 3, 0)]).unwrap();
    }

    #[test]
    fn test_cltv_output() {
        let mut chain = funded_chain(SpendCondition::CheckLockTimeVerify(3));
        mine_empty(&mut chain, 5);

        assert!(chain.extend(next_time(&chain), vec![spend(1, 0, 2)]).is_err());
        chain.extend(next_time(&chain), vec![spend(1, 0, 3)]).unwrap();
    }

    #[test]
    fn test_missing_input() {
        let mut chain = ChainState::new(ConsensusParams::default(), at(GENESIS_TIME));
        let err = chain
            .extend(next_time(&chain), vec![spend(2, 0, 0)])
            .unwrap_err();
        assert!(matches!(err, ChainError::MissingInput { .. }));
    }

    #[test]
    fn test_failed_block_leaves_state_untouched() {
        let mut chain = funded_chain(SpendCondition::Anyone);
        let good = spend(2, 0, 0);
        let bad = TransactionBuilder::new()
            .add_input_with_sequence(OutPoint::new(good.id.clone(), 0), 100)
            .add_output("carol", 50)
            .build();

        assert!(chain.extend(next_time(&chain), vec![good, bad]).is_err());
        assert_eq!(chain.height(), 1);
        assert!(chain.utxos().contains(&OutPoint::new("fund", 0)));
    }

    #[test]
    fn test_timestamp_rules() {
        let mut chain = ChainState::new(ConsensusParams::default(), at(GENESIS_TIME));
        let err = chain.extend(at(GENESIS_TIME), vec![]).unwrap_err();
        assert!(matches!(err, ChainError::TimestampTooOld { .. }));

        let far = Utc::now().timestamp() + 3 * 3600;
        let err = chain.extend(at(far), vec![]).unwrap_err();
        assert!(matches!(err, ChainError::TimestampTooNew { .. }));
    }

    #[test]
    fn test_invalid_linkage() {
        let mut chain = ChainState::new(ConsensusParams::default(), at(GENESIS_TIME));
        let block = Block::new(2, chain.tip().hash.clone(), at(GENESIS_TIME + 1), vec![]);
        assert!(matches!(
            chain.connect_block(block),
            Err(ChainError::InvalidLinkage { index: 2, tip: 0 })
        ));
    }

    #[test]
    fn test_forged_id_cannot_replace_output() {
        let mut chain = funded_chain(SpendCondition::Anyone);
        mine_empty(&mut chain, 1);
        let fund = OutPoint::new("fund", 0);
        let before = chain.utxos().lookup(&fund).cloned().unwrap();

        let mut forged = Transaction::new(vec![], vec![TransactionOutput::new("mallory", 999)]);
        forged.id = "fund".to_string();
        let err = chain.extend(next_time(&chain), vec![forged]).unwrap_err();
        assert!(matches!(err, ChainError::TransactionIdMismatch(_)));

        let after = chain.utxos().lookup(&fund).unwrap();
        assert_eq!(after.output.recipient, "alice");
        assert_eq!(after.maturity, before.maturity);
        assert_eq!(chain.height(), 2);
    }

    #[test]
    fn test_duplicate_unspent_output() {
        let mut chain = funded_chain(SpendCondition::Anyone);
        let err = chain
            .extend(next_time(&chain), vec![funding("fund", SpendCondition::Anyone)])
            .unwrap_err();
        assert!(matches!(
            err,
            ChainError::DuplicateOutput { ref outpoint, .. } if *outpoint == OutPoint::new("fund", 0)
        ));
        assert_eq!(
            chain.utxos().lookup(&OutPoint::new("fund", 0)).unwrap().maturity.confirmation_height,
            1
        );
    }

    #[test]
    fn test_flagged_spend_is_not_a_coinbase() {
        let mut chain = funded_chain(SpendCondition::Anyone);
        let mut tx = spend(2, 10, 0);
        tx.is_coinbase = true;
        let err = chain.extend(next_time(&chain), vec![tx]).unwrap_err();
        assert!(matches!(err, ChainError::MalformedCoinbase(_)));
    }

    #[test]
    fn test_misplaced_coinbase() {
        let mut chain = funded_chain(SpendCondition::Anyone);
        let txs = vec![spend(2, 0, 0), funding("late", SpendCondition::Anyone)];
        let err = chain.extend(next_time(&chain), txs).unwrap_err();
        assert!(matches!(err, ChainError::MisplacedCoinbase(_)));
    }
}
