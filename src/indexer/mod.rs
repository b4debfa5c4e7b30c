//! Graph construction: walk a checkout, classify files, extract symbols and
//! text chunks, then assemble one [`BuildResult`](crate::types::BuildResult).

pub mod chunker;
pub mod classifier;
pub mod extractor;
pub mod hierarchy;
pub mod identity;
pub mod linker;
pub mod parser;
pub mod pipeline;
pub mod walker;

pub use chunker::TextChunker;
pub use extractor::{ExtractorRegistry, SymbolExtractor};
pub use parser::CodeParser;
pub use pipeline::{GraphBuilder, ROOT_ID};
pub use walker::{ExclusionPolicy, RepositoryWalker};
