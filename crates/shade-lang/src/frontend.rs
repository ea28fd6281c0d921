use std::sync::Arc;

use shade_core::{ShadeConfig, ShadeError, ShadeResult};
use tokio::io::AsyncBufRead;
use tokio_util::sync::CancellationToken;

use crate::ast::ShaderDeclaration;
use crate::lexer::tokenize;
use crate::merge::merge_includes;
use crate::parser::Parser;
use crate::resolver::{IncludeResolver, IncludeStack, StaticResolver};
use crate::transform::{ShaderTransformer, TransformerPipeline};

/// Entry point of the front end: tokenizes, parses, transforms and merges a
/// shader into a [`ShaderDeclaration`].
///
/// Includes go through the configured [`IncludeResolver`], which re-enters
/// this parser for every file it has to build.
pub struct ShaderParser {
    transformers: TransformerPipeline,
    resolver: Arc<dyn IncludeResolver>,
}

impl Default for ShaderParser {
    fn default() -> Self {
        Self::new()
    }
}

impl ShaderParser {
    /// A parser with no transformers that rejects every include.
    pub fn new() -> Self {
        Self {
            transformers: TransformerPipeline::new(),
            resolver: Arc::new(StaticResolver),
        }
    }

    pub fn from_config(config: &ShadeConfig) -> ShadeResult<Self> {
        Ok(Self::new().with_transformers(TransformerPipeline::from_config(&config.parser)?))
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn IncludeResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn with_transformers(mut self, transformers: TransformerPipeline) -> Self {
        self.transformers = transformers;
        self
    }

    pub fn with_transformer(mut self, transformer: impl ShaderTransformer + 'static) -> Self {
        self.transformers.push(transformer);
        self
    }

    pub fn transformers(&self) -> &TransformerPipeline {
        &self.transformers
    }

    pub fn transformers_mut(&mut self) -> &mut TransformerPipeline {
        &mut self.transformers
    }

    pub fn resolver(&self) -> &Arc<dyn IncludeResolver> {
        &self.resolver
    }

    /// Parses a top-level shader read from `reader`.
    pub async fn parse<R>(
        &self,
        path: &str,
        reader: R,
        cancel: &CancellationToken,
    ) -> ShadeResult<ShaderDeclaration>
    where
        R: AsyncBufRead + Unpin + Send,
    {
        self.parse_nested(path, reader, &IncludeStack::root(path), cancel)
            .await
    }

    /// Parses in-memory source text.
    pub async fn parse_str(&self, path: &str, source: &str) -> ShadeResult<ShaderDeclaration> {
        self.parse(path, source.as_bytes(), &CancellationToken::new())
            .await
    }

    /// Parses a top-level shader through the resolver, so it is read from the
    /// resolver's sources and shares its cache.
    pub async fn parse_path(
        &self,
        path: &str,
        cancel: &CancellationToken,
    ) -> ShadeResult<Arc<ShaderDeclaration>> {
        self.resolver
            .resolve(self, path, &IncludeStack::root(path), cancel)
            .await?
            .ok_or_else(|| ShadeError::include("top-level shader forms an include cycle", path))
    }

    /// Parses `reader` as one link of an include chain. `stack` already ends
    /// with `path`.
    pub async fn parse_nested<R>(
        &self,
        path: &str,
        reader: R,
        stack: &IncludeStack,
        cancel: &CancellationToken,
    ) -> ShadeResult<ShaderDeclaration>
    where
        R: AsyncBufRead + Unpin + Send,
    {
        tracing::debug!(path = %path, depth = stack.depth(), "parsing shader");

        let tokens = tokenize(path, reader, cancel).await?;
        let unit = Parser::new(tokens, path).parse()?;
        let unit = self.transformers.apply(unit);
        let unit = merge_includes(self, unit, stack, cancel).await?;

        Ok(ShaderDeclaration::new(path, unit))
    }
}
