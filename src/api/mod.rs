//! Purpose: Define the stable public Rust API boundary for Shale.
//! Exports: The session contract, its live and mock implementations, and the value model.
//! Role: Public, additive-only surface; the driver seam is re-exported for adapters.
//! Invariants: Every fallible operation returns `ApiResult`.
//! Invariants: Core modules stay reachable only through these re-exports.

mod batch;
mod metadata;
mod mock;
mod session;

pub type ApiResult<T> = Result<T, Error>;

pub use crate::core::config::{ClusterConfig, ENV_PREFIX};
pub use crate::core::cursor::{Cursor, RowIterator};
pub use crate::core::driver::{
    APPLIED_COLUMN, BatchKind, ColumnSpec, Connector, Driver, Query, RowSource,
};
pub use crate::core::error::{Error, ErrorKind};
pub use crate::core::fixture::{FixtureDriver, ResultSet, driver_error};
pub use crate::core::scan::split_applied;
pub use crate::core::types::ColumnType;
pub use crate::core::value::{Destination, FromValue, RowMap, Value, assign_all, row_to_json};
pub use batch::{Batch, BatchOutcome, StatementBatch};
pub use metadata::{COLUMNS_QUERY, ColumnTypes, TABLES_QUERY};
pub use mock::{
    Arg, BatchMock, Call, IteratorCall, IteratorMock, Matcher, Method, Reply, SessionMock, Stub,
};
pub use session::{CqlSession, Session, connect};
pub use uuid::Uuid;
