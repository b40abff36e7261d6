//! Mapping of replica status rows to [`ReplicationStatusRecord`].
//!
//! `SHOW SLAVE STATUS` and `SHOW REPLICA STATUS` return one wide row per
//! replication channel. Columns are read by fixed position; the positions
//! below follow the documented column order, which both statements share.
//! Only the column names differ (`Slave_IO_Running` vs `Replica_IO_Running`).

use crate::error::ReplCheckError;
use crate::models::{ReplicationStatusRecord, ThreadState};
use crate::Result;

/// A status column the collector reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusColumn {
    IoState,
    ReadSourceLogPos,
    RelayLogFile,
    RelayLogPos,
    IoRunning,
    SqlRunning,
    LastError,
}

impl StatusColumn {
    /// Every mapped column.
    pub const ALL: [StatusColumn; 7] = [
        StatusColumn::IoState,
        StatusColumn::ReadSourceLogPos,
        StatusColumn::RelayLogFile,
        StatusColumn::RelayLogPos,
        StatusColumn::IoRunning,
        StatusColumn::SqlRunning,
        StatusColumn::LastError,
    ];

    /// Zero-based position in the status row.
    pub const fn position(self) -> usize {
        match self {
            StatusColumn::IoState => 0,
            StatusColumn::ReadSourceLogPos => 6,
            StatusColumn::RelayLogFile => 7,
            StatusColumn::RelayLogPos => 8,
            StatusColumn::IoRunning => 10,
            StatusColumn::SqlRunning => 11,
            StatusColumn::LastError => 19,
        }
    }

    /// Column name in `SHOW SLAVE STATUS` output.
    pub const fn name(self) -> &'static str {
        match self {
            StatusColumn::IoState => "Slave_IO_State",
            StatusColumn::ReadSourceLogPos => "Read_Master_Log_Pos",
            StatusColumn::RelayLogFile => "Relay_Log_File",
            StatusColumn::RelayLogPos => "Relay_Log_Pos",
            StatusColumn::IoRunning => "Slave_IO_Running",
            StatusColumn::SqlRunning => "Slave_SQL_Running",
            StatusColumn::LastError => "Last_Error",
        }
    }
}

/// Minimum number of columns a status row must have.
pub const MIN_STATUS_COLUMNS: usize = StatusColumn::LastError.position() + 1;

/// One status row, every column rendered as text (`None` for SQL NULL).
///
/// Drivers decode into this shape so parsing stays independent of the wire
/// library.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusRow {
    columns: Vec<Option<String>>,
}

impl StatusRow {
    /// Wraps decoded column values.
    pub fn new(columns: Vec<Option<String>>) -> Self {
        Self { columns }
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// True if the row has no columns.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Sets the value at `column`, growing the row with NULLs if needed.
    pub fn set(&mut self, column: StatusColumn, value: impl Into<String>) -> &mut Self {
        let position = column.position();
        if self.columns.len() <= position {
            self.columns.resize(position + 1, None);
        }
        self.columns[position] = Some(value.into());
        self
    }

    fn raw(&self, column: StatusColumn) -> Result<Option<&str>> {
        self.columns
            .get(column.position())
            .map(Option::as_deref)
            .ok_or_else(|| {
                ReplCheckError::status_parse(
                    column.name(),
                    column.position(),
                    format!("row has only {} columns", self.columns.len()),
                )
            })
    }

    /// Text value; NULL reads as an empty string.
    pub fn text(&self, column: StatusColumn) -> Result<String> {
        Ok(self.raw(column)?.unwrap_or_default().to_string())
    }

    /// Unsigned log position; NULL or non-numeric text is an error.
    pub fn position(&self, column: StatusColumn) -> Result<u64> {
        let value = self.raw(column)?.ok_or_else(|| {
            ReplCheckError::status_parse(column.name(), column.position(), "value is NULL")
        })?;
        value.trim().parse::<u64>().map_err(|e| {
            ReplCheckError::status_parse(
                column.name(),
                column.position(),
                format!("{:?} is not a log position: {}", value, e),
            )
        })
    }
}

/// Maps the first status row of a replica into a record.
///
/// The mapping does not depend on the topology label.
///
/// # Errors
/// Returns `StatusParse` when the row is too short or a position column is
/// NULL or non-numeric.
pub fn parse_status_row(
    host: &str,
    row: &StatusRow,
    server_version: Option<String>,
) -> Result<ReplicationStatusRecord> {
    if row.len() < MIN_STATUS_COLUMNS {
        let last = StatusColumn::LastError;
        return Err(ReplCheckError::status_parse(
            last.name(),
            last.position(),
            format!("row has only {} columns", row.len()),
        ));
    }

    Ok(ReplicationStatusRecord {
        host: host.to_string(),
        io_thread_running: ThreadState::from(row.text(StatusColumn::IoRunning)?),
        sql_thread_running: ThreadState::from(row.text(StatusColumn::SqlRunning)?),
        read_source_log_position: row.position(StatusColumn::ReadSourceLogPos)?,
        relay_log_file: row.text(StatusColumn::RelayLogFile)?,
        relay_log_position: row.position(StatusColumn::RelayLogPos)?,
        io_thread_state: row.text(StatusColumn::IoState)?,
        last_error: row.text(StatusColumn::LastError)?,
        has_replication_data: true,
        server_version,
    })
}
