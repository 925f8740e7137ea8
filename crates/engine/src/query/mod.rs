//! Query engine: filters, planning and cursors
//!
//! ```ignore
//! let query = RecordQuery::new("Order").with_filter(Query::and([
//!     Query::field("price").lt(50),
//!     Query::field("flower").matches(Query::field("type").eq("ROSE")),
//! ]));
//! let plan = store.plan_query(&query)?;   // Index(priceIndex (null, 50)) | flower matches (...)
//! let orders = store.execute_query(&mut txn, &query)?.collect_records()?;
//! ```
//!
//! The access path only changes order and cost: an index scan yields
//! records in index order, a full scan in primary key order, and both yield
//! the same set.

mod cursor;
mod filter;
mod planner;

pub(crate) use cursor::CursorSource;
pub use cursor::RecordCursor;
pub use filter::{Comparison, Field, Query, QueryComponent};
pub use planner::{plan, AccessPath, QueryPlan, RecordQuery};
