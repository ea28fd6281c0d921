//! Front end of the shade shader compiler.
//!
//! Source text is tokenized line by line, parsed into a [`CompilationUnit`],
//! rewritten by the [`TransformerPipeline`] and finally merged with every file
//! it includes. [`ShaderParser`] drives the whole chain.

pub mod ast;
pub mod frontend;
pub mod lexer;
pub mod merge;
pub mod parser;
pub mod resolver;
pub mod source;
pub mod transform;

pub use ast::{CompilationUnit, ShaderDeclaration, ShaderKind};
pub use frontend::ShaderParser;
pub use resolver::{
    CachingResolver, IncludeResolver, IncludeStack, LoaderResolver, ShaderLoader, StaticResolver,
};
pub use source::{normalize_path, FileSystemSources, MemorySources, SourceProvider, SourceReader};
pub use transform::{ShaderTransformer, SpriteTransformer, TransformerPipeline};

pub use tokio_util::sync::CancellationToken;
