pub mod assembler;
pub mod ranker;

pub use assembler::{assemble, AssemblyOptions, TRUNCATION_MARKER};
pub use ranker::{apply_domain_weights, diversify, filter_domains, rank, rank_pool, truncate};
