use std::str::FromStr;

use snafu::OptionExt;
use strum::{AsRefStr, Display, EnumIter, EnumString};

use crate::error::{self as ex_error, ExecutionResult};

/// Transaction mode as stored in a test plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, Display, AsRefStr, EnumIter)]
#[strum(ascii_case_insensitive)]
pub enum TxMode {
    #[strum(serialize = "Serializable Read/Write")]
    SerializableReadWrite,
    #[strum(serialize = "Online Read Only")]
    OnlineReadOnly,
    #[strum(serialize = "Stale Read Only")]
    StaleReadOnly,
    #[strum(serialize = "Snapshot Read Only")]
    SnapshotReadOnly,
    #[strum(serialize = "Implicit")]
    Implicit,
    #[strum(serialize = "Inconsistent Read Only")]
    InconsistentReadOnly,
}

/// Transaction control sent with a data query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TxControl {
    /// Begin a serializable read-write transaction and commit it with the query.
    SerializableRw,
    SnapshotRo,
    StaleRo,
    /// No explicit transaction, the server runs the statement on its own.
    Implicit,
}

impl TxControl {
    #[must_use]
    pub const fn is_explicit(self) -> bool {
        !matches!(self, Self::Implicit)
    }

    #[must_use]
    pub const fn is_read_only(self) -> bool {
        matches!(self, Self::SnapshotRo | Self::StaleRo)
    }
}

impl From<TxMode> for TxControl {
    fn from(mode: TxMode) -> Self {
        match mode {
            TxMode::SerializableReadWrite => Self::SerializableRw,
            // online and inconsistent reads have no dedicated control here
            TxMode::OnlineReadOnly | TxMode::SnapshotReadOnly | TxMode::InconsistentReadOnly => {
                Self::SnapshotRo
            }
            TxMode::StaleReadOnly => Self::StaleRo,
            TxMode::Implicit => Self::Implicit,
        }
    }
}

pub fn resolve(mode: &str) -> ExecutionResult<TxControl> {
    TxMode::from_str(mode.trim())
        .ok()
        .map(TxControl::from)
        .context(ex_error::UnknownTransactionModeSnafu { mode })
}
