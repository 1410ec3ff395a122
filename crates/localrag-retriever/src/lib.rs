pub mod retriever;
pub mod source;

pub use retriever::{Augmented, Retriever};
pub use source::{build_source, ArtifactSource, CorpusDirSource, IndexSource, SourceSpec, StaticSource};
