//! # Cluster Fetch Subsystem (hc-04)
//!
//! Fetches raft cluster state by fanning a `GetClusterInfo` request out to
//! all live peers, merging the successful responses and enforcing a single
//! deadline with a majority-quorum requirement. The reply is delivered
//! exactly once on a one-shot channel.
//!
//! ```text
//! start_get ──→ every RUNNING peer          (sent < quorum ⇒ "no live peers")
//!                  │ responses (any order)
//!                  ▼
//!            receive_resp ──→ all answered, or deadline ──→ finish (once)
//!                  ▼
//!            best response by best_block_no
//! ```

pub mod collector;
pub mod ports;
pub mod timer;

pub use collector::{ClusterFetchError, ClusterInfo, ClusterInfoCollector};
pub use ports::ClusterPeer;
pub use timer::invoke_with_timer;
