//! localrag-text
//!
//! Lexical vectorizer: smoothed TF-IDF over a fitted corpus vocabulary. See
//! `tokenize` for the analyzer and `lexical` for weighting.
pub mod tokenize;
pub mod lexical;

pub use lexical::{LexicalFactory, LexicalVectorizer};
pub use tokenize::tokenize;
