pub mod artifact;
pub mod index;
pub mod similarity;

pub use artifact::{load_artifact, write_artifact, IndexArtifact, Manifest};
pub use index::CorpusIndex;
pub use similarity::{cosine, top_k, ScoredIndex};
