//! Normalizes genomic reference datasets into JSON-lines collections and
//! serves them back through per-species entity adaptors.

pub mod config;
pub mod dispatch;
pub mod domain;
pub mod error;
pub mod fasta;
pub mod fs_util;
pub mod output;
pub mod parser;
pub mod registry;
pub mod serializer;
pub mod store;
pub mod tabular;
pub mod tool;
