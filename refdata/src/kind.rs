use std::fmt;
use std::str::FromStr;

/// The external feeds accepted by `postReferenceData`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataKind {
    Identity,
    Opportunity,
    Account,
}

impl DataKind {
    pub const ALL: [DataKind; 3] = [DataKind::Identity, DataKind::Opportunity, DataKind::Account];

    pub const fn as_str(&self) -> &'static str {
        match self {
            DataKind::Identity => "identity",
            DataKind::Opportunity => "opportunity",
            DataKind::Account => "account",
        }
    }

    /// Name of the chunk file assembled for this kind.
    pub fn chunk_filename(&self) -> String {
        format!("{}.json", self.as_str())
    }

    pub const fn staging_table(&self) -> StagingTable {
        match self {
            DataKind::Identity => StagingTable::Employees,
            DataKind::Opportunity => StagingTable::LookupOpportunity,
            DataKind::Account => StagingTable::LookupAccount,
        }
    }
}

impl fmt::Display for DataKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
#[error("unrecognized value: {0:?}")]
pub struct UnknownValue(pub String);

impl FromStr for DataKind {
    type Err = UnknownValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "identity" => Ok(DataKind::Identity),
            "opportunity" => Ok(DataKind::Opportunity),
            "account" => Ok(DataKind::Account),
            other => Err(UnknownValue(other.to_string())),
        }
    }
}

/// Where a chunk sits in an upload sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkPosition {
    First,
    Middle,
    Last,
    Reprocess,
}

impl ChunkPosition {
    pub const fn as_str(&self) -> &'static str {
        match self {
            ChunkPosition::First => "first",
            ChunkPosition::Middle => "middle",
            ChunkPosition::Last => "last",
            ChunkPosition::Reprocess => "reprocess",
        }
    }

    pub const fn triggers_load(&self) -> bool {
        matches!(self, ChunkPosition::Last | ChunkPosition::Reprocess)
    }
}

impl fmt::Display for ChunkPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChunkPosition {
    type Err = UnknownValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "first" => Ok(ChunkPosition::First),
            "middle" => Ok(ChunkPosition::Middle),
            "last" => Ok(ChunkPosition::Last),
            "reprocess" => Ok(ChunkPosition::Reprocess),
            other => Err(UnknownValue(other.to_string())),
        }
    }
}

/// Tables that are fully replaced on every load run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StagingTable {
    Employees,
    LookupOpportunity,
    LookupAccount,
}

impl StagingTable {
    pub const fn table_name(&self) -> &'static str {
        match self {
            StagingTable::Employees => "employees",
            StagingTable::LookupOpportunity => "lookupopportunity",
            StagingTable::LookupAccount => "lookupaccount",
        }
    }
}
