//! Service layer: fingerprinting, run directories, the search policy and
//! the control loop built on them.

pub mod fmax_engine;
pub mod report;
pub mod run_directory;
pub mod search_policy;
pub mod semantic_hasher;

pub use fmax_engine::{FmaxSearchEngine, SearchParameters, SearchRequest};
pub use run_directory::{CachedRunDirectoryResolver, RunDirectory};
pub use search_policy::SearchPolicy;
pub use semantic_hasher::SemanticHasher;
