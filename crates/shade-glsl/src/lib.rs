//! GLSL backend: lowers merged shader declarations into per-stage kernels.

pub mod builder;
pub mod compiler;

pub use builder::ShaderCodeBuilder;
pub use compiler::{
    lower_expression, precision_qualifier, to_glsl, GlslCompiler, Kernel, BACKEND_VERSION,
};

use shade_core::ShadeResult;
use shade_lang::ShaderParser;

/// Compile in-memory shader source into GLSL kernels, one per stage.
///
/// Uses a parser without transformers or include support and the default
/// compiler settings.
pub async fn compile_str(path: &str, source: &str) -> ShadeResult<Vec<Kernel>> {
    let declaration = ShaderParser::new().parse_str(path, source).await?;
    GlslCompiler::default().compile(&declaration)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_compile_minimal_fragment() {
        let src = r#"
        uniform float a;
        varying vec2 uv;
        void fragment() {
          // done
        }
        "#;

        let kernels = compile_str("minimal.shade", src).await.expect("Compilation failed");
        assert_eq!(kernels.len(), 1);

        let source = &kernels[0].source;
        let version = source.find("#version").unwrap();
        let uniform = source.find("uniform float a;").unwrap();
        let varying = source.find("varying vec2 uv;").unwrap();
        let main = source.find("void main()").unwrap();
        let comment = source.find("// done").unwrap();
        let close = source.rfind('}').unwrap();

        assert!(version < uniform && uniform < varying && varying < main);
        assert!(main < comment && comment < close);
    }
}
