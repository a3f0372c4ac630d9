//! Persistence layer: bounded connection pool, transaction coordinator and
//! the job store built on both.

mod pool;
mod store;
mod table;
mod transaction;

pub use pool::{ConnectionState, PoolOptions, PoolStats, PooledConnection, ResourcePool};
pub use store::{JobFilter, JobStore, PooledJobStore, get_existing};
pub use table::JobTable;
pub use transaction::{
    BatchOperation, IsolationLevel, Transaction, TransactionManager, TransactionOptions,
    batch_operation, retry_backoff,
};
