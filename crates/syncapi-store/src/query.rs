//! Statement compilation and parameter binding

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{StoreError, StoreResult};
use crate::pagination::{PaginationMode, SortOrder, Variant};
use crate::statement::{Slot, StatementId, PAGING_CLAUSE, PAGING_MARKER};

/// A value bound to a positional parameter
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlValue {
    /// `text`
    Text(String),
    /// `int4`
    Int4(i32),
    /// `int8`
    Int8(i64),
}

impl From<SortOrder> for SqlValue {
    fn from(order: SortOrder) -> Self {
        SqlValue::Text(order.as_str().to_string())
    }
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlValue::Text(value) => f.write_str(value),
            SqlValue::Int4(value) => write!(f, "{}", value),
            SqlValue::Int8(value) => write!(f, "{}", value),
        }
    }
}

/// A statement together with the caller-supplied values it declares
///
/// Each variant carries exactly the parameters of its [`StatementId`], so a
/// request cannot reach the database with a missing or misplaced value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    /// See [`StatementId::AccountExists`]
    AccountExists {
        /// Canonical bech32 stake address
        stake_address: String,
    },
    /// See [`StatementId::AccountWithdrawals`]
    AccountWithdrawals {
        /// Sort direction
        order: SortOrder,
        /// Canonical bech32 stake address
        stake_address: String,
    },
    /// See [`StatementId::EpochExists`]
    EpochExists {
        /// Epoch number
        epoch: i32,
    },
    /// See [`StatementId::EpochStakes`]
    EpochStakes {
        /// Epoch number
        epoch: i32,
    },
    /// See [`StatementId::EpochsPrevious`]
    EpochsPrevious {
        /// Epoch number
        epoch: i32,
        /// Slots per epoch
        epoch_length: i64,
    },
    /// See [`StatementId::BlocksLatestTxs`]
    BlocksLatestTxs {
        /// Sort direction
        order: SortOrder,
    },
    /// See [`StatementId::Scripts`]
    Scripts {
        /// Sort direction
        order: SortOrder,
    },
    /// See [`StatementId::MetadataLabelCbor`]
    MetadataLabelCbor {
        /// Sort direction
        order: SortOrder,
        /// Metadata label
        label: i64,
    },
}

impl Query {
    /// Statement this query runs
    pub fn id(&self) -> StatementId {
        match self {
            Query::AccountExists { .. } => StatementId::AccountExists,
            Query::AccountWithdrawals { .. } => StatementId::AccountWithdrawals,
            Query::EpochExists { .. } => StatementId::EpochExists,
            Query::EpochStakes { .. } => StatementId::EpochStakes,
            Query::EpochsPrevious { .. } => StatementId::EpochsPrevious,
            Query::BlocksLatestTxs { .. } => StatementId::BlocksLatestTxs,
            Query::Scripts { .. } => StatementId::Scripts,
            Query::MetadataLabelCbor { .. } => StatementId::MetadataLabelCbor,
        }
    }

    /// Value for a caller-supplied slot
    pub fn value(&self, slot: Slot) -> Option<SqlValue> {
        match (self, slot) {
            (
                Query::AccountExists { stake_address }
                | Query::AccountWithdrawals { stake_address, .. },
                Slot::StakeAddress,
            ) => Some(SqlValue::Text(stake_address.clone())),
            (
                Query::AccountWithdrawals { order, .. }
                | Query::BlocksLatestTxs { order }
                | Query::Scripts { order }
                | Query::MetadataLabelCbor { order, .. },
                Slot::Order,
            ) => Some((*order).into()),
            (
                Query::EpochExists { epoch }
                | Query::EpochStakes { epoch }
                | Query::EpochsPrevious { epoch, .. },
                Slot::Epoch,
            ) => Some(SqlValue::Int4(*epoch)),
            (Query::EpochsPrevious { epoch_length, .. }, Slot::EpochLength) => {
                Some(SqlValue::Int8(*epoch_length))
            }
            (Query::MetadataLabelCbor { label, .. }, Slot::Label) => Some(SqlValue::Int8(*label)),
            _ => None,
        }
    }
}

/// A template compiled for one pagination variant
#[derive(Debug)]
pub struct CompiledStatement {
    id: StatementId,
    variant: Variant,
    sql: String,
    slots: Vec<Slot>,
}

impl CompiledStatement {
    /// Compile `id` for `variant`
    ///
    /// Named placeholders become `$n` in order of first appearance; a
    /// placeholder used twice reuses its position. The result is wrapped
    /// so each row comes back as a single JSON value.
    pub fn compile(id: StatementId, variant: Variant) -> StoreResult<Self> {
        let expanded = match variant {
            Variant::Paged => id.template().replace(PAGING_MARKER, PAGING_CLAUSE),
            Variant::Unpaged => id.template().replace(PAGING_MARKER, ""),
        };
        let (positional, slots) = rewrite_placeholders(id, expanded.trim_end())?;

        for slot in &slots {
            let declared = if slot.is_paging() {
                variant == Variant::Paged
            } else {
                id.params().contains(slot)
            };
            if !declared {
                return Err(StoreError::UndeclaredSlot {
                    statement: id,
                    slot: *slot,
                });
            }
        }
        if let Some(unused) = id.params().iter().find(|slot| !slots.contains(slot)) {
            return Err(StoreError::UnusedSlot {
                statement: id,
                slot: *unused,
            });
        }

        // Row order relies on Postgres emitting the subquery's ORDER BY order
        // through this unsorted outer SELECT. SQL does not promise it; the
        // planner keeps it for a single-relation projection with no join,
        // aggregate or sort above it.
        Ok(Self {
            id,
            variant,
            sql: format!("SELECT row_to_json(rows) AS row\nFROM (\n{}\n) AS rows", positional),
            slots,
        })
    }

    /// Statement identifier
    pub fn id(&self) -> StatementId {
        self.id
    }

    /// Compiled variant
    pub fn variant(&self) -> Variant {
        self.variant
    }

    /// Positional SQL text
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Slot bound at each position (`$1` is index 0)
    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }
}

fn rewrite_placeholders(id: StatementId, sql: &str) -> StoreResult<(String, Vec<Slot>)> {
    let mut out = String::with_capacity(sql.len());
    let mut slots: Vec<Slot> = Vec::new();
    let mut chars = sql.char_indices().peekable();

    while let Some((idx, c)) = chars.next() {
        if c != ':' {
            out.push(c);
            continue;
        }
        // `::` is a cast
        if let Some(&(_, ':')) = chars.peek() {
            chars.next();
            out.push_str("::");
            continue;
        }

        let start = idx + 1;
        let mut end = start;
        while let Some(&(next_idx, next)) = chars.peek() {
            if next.is_ascii_lowercase() || next == '_' || (end > start && next.is_ascii_digit()) {
                end = next_idx + next.len_utf8();
                chars.next();
            } else {
                break;
            }
        }
        if end == start {
            out.push(':');
            continue;
        }

        let name = &sql[start..end];
        let slot = Slot::from_name(name).ok_or_else(|| StoreError::UnknownPlaceholder {
            statement: id,
            name: name.to_string(),
        })?;
        let position = match slots.iter().position(|s| *s == slot) {
            Some(position) => position,
            None => {
                slots.push(slot);
                slots.len() - 1
            }
        };
        out.push('$');
        out.push_str(&(position + 1).to_string());
    }

    Ok((out, slots))
}

/// A compiled statement with its values in bind order
#[derive(Debug, Clone)]
pub struct BoundQuery {
    statement: Arc<CompiledStatement>,
    params: Vec<SqlValue>,
}

impl BoundQuery {
    /// Statement identifier
    pub fn id(&self) -> StatementId {
        self.statement.id()
    }

    /// Statement name for logging
    pub fn name(&self) -> &'static str {
        self.statement.id().name()
    }

    /// Compiled statement
    pub fn statement(&self) -> &CompiledStatement {
        &self.statement
    }

    /// Positional SQL text
    pub fn sql(&self) -> &str {
        self.statement.sql()
    }

    /// Values in bind order
    pub fn params(&self) -> &[SqlValue] {
        &self.params
    }

    /// Value bound to `slot`, if the statement uses it
    pub fn value_of(&self, slot: Slot) -> Option<&SqlValue> {
        self.statement
            .slots()
            .iter()
            .position(|s| *s == slot)
            .and_then(|idx| self.params.get(idx))
    }
}

#[cfg(test)]
impl BoundQuery {
    /// Unchecked statement with no parameters, for backend tests
    pub(crate) fn raw(id: StatementId, sql: &str) -> Self {
        Self {
            statement: Arc::new(CompiledStatement {
                id,
                variant: Variant::Unpaged,
                sql: sql.to_string(),
                slots: Vec::new(),
            }),
            params: Vec::new(),
        }
    }
}

/// All statements compiled for both variants
///
/// Built once at startup. A template error aborts startup rather than
/// failing individual requests.
pub struct StatementRegistry {
    statements: HashMap<(StatementId, Variant), Arc<CompiledStatement>>,
}

impl StatementRegistry {
    /// Compile every statement
    pub fn compile() -> StoreResult<Self> {
        let mut statements = HashMap::with_capacity(StatementId::ALL.len() * Variant::ALL.len());
        for id in StatementId::ALL {
            for variant in Variant::ALL {
                let compiled = CompiledStatement::compile(id, variant)?;
                statements.insert((id, variant), Arc::new(compiled));
            }
        }
        tracing::debug!(statements = statements.len(), "statement registry compiled");
        Ok(Self { statements })
    }

    /// Look up a compiled statement
    pub fn get(&self, id: StatementId, variant: Variant) -> StoreResult<Arc<CompiledStatement>> {
        self.statements
            .get(&(id, variant))
            .cloned()
            .ok_or(StoreError::UnknownStatement(id))
    }

    /// Bind `query` for `mode`
    pub fn bind(&self, query: &Query, mode: PaginationMode) -> StoreResult<BoundQuery> {
        let statement = self.get(query.id(), mode.variant())?;
        let params = statement
            .slots()
            .iter()
            .map(|slot| match (slot, mode) {
                (Slot::Count, PaginationMode::Paged { count, .. }) => {
                    Ok(SqlValue::Int8(i64::from(count)))
                }
                (Slot::Page, PaginationMode::Paged { page, .. }) => {
                    Ok(SqlValue::Int8(i64::from(page)))
                }
                _ => query.value(*slot).ok_or(StoreError::MissingBinding {
                    statement: query.id(),
                    slot: *slot,
                }),
            })
            .collect::<StoreResult<Vec<_>>>()?;

        Ok(BoundQuery { statement, params })
    }

    /// Bind an existence probe; probes are never paged
    pub fn bind_probe(&self, query: &Query) -> StoreResult<BoundQuery> {
        self.bind(query, PaginationMode::Unpaged)
    }

    /// Number of compiled statements
    pub fn len(&self) -> usize {
        self.statements.len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }
}
