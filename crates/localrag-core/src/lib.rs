#![deny(unused_variables)]
#![deny(unused_imports)]

pub mod config;
pub mod data_processor;
pub mod error;
pub mod options;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
