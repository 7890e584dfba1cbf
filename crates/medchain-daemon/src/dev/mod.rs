//! Local development collaborators.
//!
//! Stand-ins for a browser wallet on a local test chain and a local content
//! node, so the daemon runs end to end on one machine. Not for production.

pub mod chain;
pub mod content;

pub use chain::DevChain;
pub use content::LocalContentStore;
