//! revtree-core: reviewed-state aggregation for a tree of changed files.
//!
//! The engine ([`session`]) keeps one tri-state indicator per directory in
//! step with the reviewed flags of the files below it, incrementally and
//! without re-scanning subtrees. Around it:
//!
//! - [`dispatch`]: the single synchronous consumer of [`TreeEvent`]s
//! - [`discovery`]: registers directories and files from a list of paths
//! - [`source`]: traits for the authoritative state and the presentation
//! - [`db`] / [`schema`]: the SQLite store that holds the reviewed flags

pub mod db;
pub mod discovery;
pub mod dispatch;
pub mod error;
pub mod node;
pub mod schema;
pub mod session;
pub mod source;
pub mod types;

pub use discovery::{DiscoveryReport, TreeBuilder};
pub use dispatch::{Dispatcher, Outcome, Registration, TreeEvent};
pub use error::EngineError;
pub use node::{
    AggregateId, AggregateNode, BulkPolicy, CheckState, LeafId, LeafNode, LeafState, NodePresentation,
    NodeRef, NodeUpdate,
};
pub use session::{LeafWrite, Propagation, TreeSession};
pub use source::{LeafStateSource, MemorySource, NullSink, PresentationSink, WriteOutcome};
