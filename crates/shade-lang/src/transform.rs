//! Pluggable rewrites applied to a freshly parsed unit before includes are
//! merged in.

use shade_core::{ParserConfig, ShadeError, ShadeResult};

use crate::ast::*;

/// A pure rewrite of a [`CompilationUnit`].
pub trait ShaderTransformer: Send + Sync {
    fn name(&self) -> &str;

    fn can_transform(&self, unit: &CompilationUnit) -> bool;

    fn transform(&self, unit: CompilationUnit) -> CompilationUnit;
}

/// An ordered list of transformers. Each one sees the output of the ones
/// before it.
#[derive(Default)]
pub struct TransformerPipeline {
    transformers: Vec<Box<dyn ShaderTransformer>>,
}

impl TransformerPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the pipeline named by `[parser] archetypes`.
    pub fn from_config(config: &ParserConfig) -> ShadeResult<Self> {
        let mut pipeline = Self::new();

        for archetype in &config.archetypes {
            match archetype.as_str() {
                "sprite" => pipeline.push(SpriteTransformer),
                other => {
                    return Err(ShadeError::Config(format!(
                        "unknown shader archetype: {}",
                        other
                    )))
                }
            }
        }

        Ok(pipeline)
    }

    pub fn push(&mut self, transformer: impl ShaderTransformer + 'static) {
        self.transformers.push(Box::new(transformer));
    }

    pub fn with(mut self, transformer: impl ShaderTransformer + 'static) -> Self {
        self.push(transformer);
        self
    }

    pub fn len(&self) -> usize {
        self.transformers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transformers.is_empty()
    }

    pub fn apply(&self, mut unit: CompilationUnit) -> CompilationUnit {
        for transformer in &self.transformers {
            if transformer.can_transform(&unit) {
                tracing::trace!(transformer = transformer.name(), "applying transformer");
                unit = transformer.transform(unit);
            }
        }

        unit
    }
}

/// Expands `#shader_type sprite` into the standard sprite inputs: projection
/// and texture uniforms, uv/color varyings and a vertex stage when the unit
/// does not declare one.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpriteTransformer;

impl ShaderTransformer for SpriteTransformer {
    fn name(&self) -> &str {
        "sprite"
    }

    fn can_transform(&self, unit: &CompilationUnit) -> bool {
        unit.shader_type.kind == "sprite"
    }

    fn transform(&self, mut unit: CompilationUnit) -> CompilationUnit {
        let mut uniforms = vec![
            UniformDeclaration {
                primitive: Primitive::vector(PrimitiveKind::Matrix, 4),
                name: "u_projectionView".to_string(),
            },
            UniformDeclaration {
                primitive: Primitive::vector(PrimitiveKind::Sampler, 2),
                name: "u_texture".to_string(),
            },
        ];
        uniforms.append(&mut unit.uniforms);
        unit.uniforms = uniforms;

        let mut varyings = vec![
            VaryingDeclaration {
                primitive: Primitive::vector(PrimitiveKind::Float, 2),
                name: "v_uv".to_string(),
            },
            VaryingDeclaration {
                primitive: Primitive::vector(PrimitiveKind::Float, 4),
                name: "v_color".to_string(),
            },
        ];
        varyings.append(&mut unit.varyings);
        unit.varyings = varyings;

        if !unit.has_stage(ShaderKind::Vertex) {
            unit.stages.insert(
                0,
                StageDeclaration {
                    kind: ShaderKind::Vertex,
                    parameters: Vec::new(),
                    statements: vec![Statement::Comment("default sprite vertex stage".to_string())],
                },
            );
        }

        unit
    }
}
