//! Pagination mode and sort order

use std::fmt;
use std::str::FromStr;

/// Sort direction bound into ordered statements
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum SortOrder {
    /// Oldest first
    #[default]
    Asc,
    /// Newest first
    Desc,
}

impl SortOrder {
    /// SQL-side spelling
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            other => Err(other.to_string()),
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How much of a result set a request asked for
///
/// Decided once per request; selects both the statement variant and the
/// response emission strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaginationMode {
    /// Entire result set, streamed
    Unpaged,
    /// One bounded page
    Paged {
        /// Page size
        count: u32,
        /// 1-based page index
        page: u32,
    },
}

impl PaginationMode {
    /// Statement variant this mode executes
    pub fn variant(&self) -> Variant {
        match self {
            PaginationMode::Unpaged => Variant::Unpaged,
            PaginationMode::Paged { .. } => Variant::Paged,
        }
    }

    /// Whether the response is bounded
    pub fn is_paged(&self) -> bool {
        matches!(self, PaginationMode::Paged { .. })
    }
}

/// Compiled form of a statement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Variant {
    /// Template with the paging clause expanded
    Paged,
    /// Template with the paging clause removed
    Unpaged,
}

impl Variant {
    /// Both variants
    pub const ALL: [Variant; 2] = [Variant::Paged, Variant::Unpaged];
}
