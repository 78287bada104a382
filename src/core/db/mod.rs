/// Database Module
///
/// The database layer is split into three concerns:
/// - **Retry** (`retry.rs`): bounded, fixed-delay retry used to probe reachability
/// - **Connection Management** (`connection.rs`): the pooled engine and scoped checkout
/// - **Query Execution** (`query.rs`): the five fixed flight queries and result shaping
///
/// All operations return the shared `FlightsError` type.
pub mod connection;
pub mod query;
pub mod retry;

pub use connection::*;
pub use query::*;
pub use retry::*;
