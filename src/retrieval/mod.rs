//! In-memory retrieval kernel: embedding store, nearest-neighbour index,
//! candidate filtering and MMR diversification.

pub mod filter;
pub mod index;
pub mod mmr;
pub mod store;

pub use filter::CandidateFilter;
pub use index::{FlatIpIndex, Neighbor, VectorIndex};
pub use mmr::{MmrConfig, Selection, DEFAULT_LAMBDA};
pub use store::EmbeddingStore;
