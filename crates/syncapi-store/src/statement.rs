//! Statement catalog
//!
//! Every statement the API can run is a [`StatementId`]. Each one owns a
//! single SQL template written with named placeholders (`:order`,
//! `:stake_address`, ...) and an optional `{paging}` marker. The registry
//! turns the template into positional SQL for both pagination variants, so
//! the bind order always follows the text.

use std::fmt;

/// Marker replaced by the paging clause in the paged variant
pub const PAGING_MARKER: &str = "{paging}";

/// Clause substituted for [`PAGING_MARKER`] in the paged variant
pub const PAGING_CLAUSE: &str = "LIMIT :count OFFSET (:page - 1) * :count";

/// A named bind position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    /// Sort direction (`asc` / `desc`)
    Order,
    /// Page size, paged variant only
    Count,
    /// 1-based page index, paged variant only
    Page,
    /// Bech32 stake address
    StakeAddress,
    /// Epoch number
    Epoch,
    /// Metadata label
    Label,
    /// Slots per epoch of the configured network
    EpochLength,
}

impl Slot {
    /// Every slot
    pub const ALL: [Slot; 7] = [
        Slot::Order,
        Slot::Count,
        Slot::Page,
        Slot::StakeAddress,
        Slot::Epoch,
        Slot::Label,
        Slot::EpochLength,
    ];

    /// Placeholder spelling (without the colon)
    pub fn name(&self) -> &'static str {
        match self {
            Slot::Order => "order",
            Slot::Count => "count",
            Slot::Page => "page",
            Slot::StakeAddress => "stake_address",
            Slot::Epoch => "epoch",
            Slot::Label => "label",
            Slot::EpochLength => "epoch_length",
        }
    }

    /// Look a slot up by placeholder spelling
    pub fn from_name(name: &str) -> Option<Slot> {
        Slot::ALL.into_iter().find(|slot| slot.name() == name)
    }

    /// Filled from the pagination mode rather than the query
    pub fn is_paging(&self) -> bool {
        matches!(self, Slot::Count | Slot::Page)
    }

    /// Identifies the resource a statement is about
    pub fn is_key(&self) -> bool {
        matches!(self, Slot::StakeAddress | Slot::Epoch | Slot::Label)
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Typed statement identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatementId {
    /// Does a stake address exist
    AccountExists,
    /// Withdrawals of a stake address
    AccountWithdrawals,
    /// Does an epoch exist
    EpochExists,
    /// Stake distribution of an epoch
    EpochStakes,
    /// Epochs preceding an epoch
    EpochsPrevious,
    /// Transactions of the latest block
    BlocksLatestTxs,
    /// All scripts
    Scripts,
    /// Transaction metadata of a label, CBOR encoded
    MetadataLabelCbor,
}

impl StatementId {
    /// Every statement, in registration order
    pub const ALL: [StatementId; 8] = [
        StatementId::AccountExists,
        StatementId::AccountWithdrawals,
        StatementId::EpochExists,
        StatementId::EpochStakes,
        StatementId::EpochsPrevious,
        StatementId::BlocksLatestTxs,
        StatementId::Scripts,
        StatementId::MetadataLabelCbor,
    ];

    /// Stable name used in logs
    pub fn name(&self) -> &'static str {
        match self {
            StatementId::AccountExists => "accounts_404",
            StatementId::AccountWithdrawals => "accounts_stake_address_withdrawals",
            StatementId::EpochExists => "epochs_404",
            StatementId::EpochStakes => "epochs_number_stakes",
            StatementId::EpochsPrevious => "epochs_number_previous",
            StatementId::BlocksLatestTxs => "blocks_latest_txs",
            StatementId::Scripts => "scripts",
            StatementId::MetadataLabelCbor => "metadata_txs_labels_label_cbor",
        }
    }

    /// Slots supplied by the caller, paging slots excluded
    pub fn params(&self) -> &'static [Slot] {
        match self {
            StatementId::AccountExists => &[Slot::StakeAddress],
            StatementId::AccountWithdrawals => &[Slot::Order, Slot::StakeAddress],
            StatementId::EpochExists => &[Slot::Epoch],
            StatementId::EpochStakes => &[Slot::Epoch],
            StatementId::EpochsPrevious => &[Slot::Epoch, Slot::EpochLength],
            StatementId::BlocksLatestTxs => &[Slot::Order],
            StatementId::Scripts => &[Slot::Order],
            StatementId::MetadataLabelCbor => &[Slot::Order, Slot::Label],
        }
    }

    /// SQL template
    pub fn template(&self) -> &'static str {
        match self {
            StatementId::AccountExists => ACCOUNT_EXISTS,
            StatementId::AccountWithdrawals => ACCOUNT_WITHDRAWALS,
            StatementId::EpochExists => EPOCH_EXISTS,
            StatementId::EpochStakes => EPOCH_STAKES,
            StatementId::EpochsPrevious => EPOCHS_PREVIOUS,
            StatementId::BlocksLatestTxs => BLOCKS_LATEST_TXS,
            StatementId::Scripts => SCRIPTS,
            StatementId::MetadataLabelCbor => METADATA_LABEL_CBOR,
        }
    }
}

impl fmt::Display for StatementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

const ACCOUNT_EXISTS: &str = "\
SELECT sa.id
FROM stake_address sa
WHERE sa.view = :stake_address
LIMIT 1";

const ACCOUNT_WITHDRAWALS: &str = "\
SELECT encode(tx.hash, 'hex') AS tx_hash,
       w.amount::TEXT AS amount
FROM withdrawal w
  JOIN tx ON (tx.id = w.tx_id)
  JOIN stake_address sa ON (sa.id = w.addr_id)
WHERE sa.view = :stake_address
ORDER BY
  CASE WHEN :order = 'desc' THEN w.id END DESC,
  CASE WHEN :order <> 'desc' THEN w.id END ASC
{paging}";

const EPOCH_EXISTS: &str = "\
SELECT e.no
FROM epoch e
WHERE e.no = :epoch
LIMIT 1";

const EPOCH_STAKES: &str = "\
SELECT sa.view AS stake_address,
       ph.view AS pool_id,
       es.amount::TEXT AS amount
FROM epoch_stake es
  JOIN stake_address sa ON (sa.id = es.addr_id)
  JOIN pool_hash ph ON (ph.id = es.pool_id)
WHERE es.epoch_no = :epoch
ORDER BY es.id ASC
{paging}";

const EPOCHS_PREVIOUS: &str = "\
SELECT e.no AS epoch,
       EXTRACT(EPOCH FROM e.start_time)::BIGINT AS start_time,
       EXTRACT(EPOCH FROM e.start_time)::BIGINT + :epoch_length AS end_time,
       EXTRACT(EPOCH FROM e.end_time)::BIGINT AS last_block_time,
       e.blk_count AS block_count,
       e.tx_count AS tx_count,
       e.out_sum::TEXT AS output,
       e.fees::TEXT AS fees
FROM epoch e
WHERE e.no < :epoch
ORDER BY e.no DESC
{paging}";

const BLOCKS_LATEST_TXS: &str = "\
SELECT encode(tx.hash, 'hex') AS hash
FROM tx
WHERE tx.block_id = (SELECT MAX(b.id) FROM block b)
ORDER BY
  CASE WHEN :order = 'desc' THEN tx.block_index END DESC,
  CASE WHEN :order <> 'desc' THEN tx.block_index END ASC
{paging}";

const SCRIPTS: &str = "\
SELECT encode(s.hash, 'hex') AS script_hash
FROM script s
ORDER BY
  CASE WHEN :order = 'desc' THEN s.id END DESC,
  CASE WHEN :order <> 'desc' THEN s.id END ASC
{paging}";

const METADATA_LABEL_CBOR: &str = "\
SELECT encode(tx.hash, 'hex') AS tx_hash,
       encode(tm.bytes, 'hex') AS cbor_metadata,
       encode(tm.bytes, 'hex') AS metadata
FROM tx_metadata tm
  JOIN tx ON (tx.id = tm.tx_id)
WHERE tm.key = :label
ORDER BY
  CASE WHEN :order = 'desc' THEN tm.id END DESC,
  CASE WHEN :order <> 'desc' THEN tm.id END ASC
{paging}";
