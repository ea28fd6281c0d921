use std::sync::Arc;

use shade_core::{ShadeConfig, ShadeError, StatementLowering};
use shade_glsl::GlslCompiler;
use shade_lang::ast::ShaderKind;
use shade_lang::{
    CachingResolver, CancellationToken, FileSystemSources, MemorySources, ShaderParser,
};

#[tokio::test]
async fn test_sprite_archetype_compiles() {
    let config = ShadeConfig::from_toml_str(
        r#"
        [parser]
        archetypes = ["sprite"]
        "#,
    )
    .unwrap();
    let parser = ShaderParser::from_config(&config).unwrap();
    let compiler = GlslCompiler::from_config(&config.compiler);

    let declaration = parser
        .parse_str(
            "sprite.shade",
            "#shader_type sprite\nuniform float intensity;\nvoid fragment() {\n  // noop\n}\n",
        )
        .await
        .unwrap();
    let kernels = compiler.compile(&declaration).unwrap();

    let stages: Vec<_> = kernels.iter().map(|k| k.stage).collect();
    assert_eq!(stages, vec![ShaderKind::Vertex, ShaderKind::Fragment]);

    let fragment = &kernels[1].source;
    assert!(fragment.contains("uniform mat4 u_projectionView;"));
    assert!(fragment.contains("uniform sampler2D u_texture;"));
    assert!(fragment.contains("uniform float intensity;"));
    assert!(fragment.contains("varying vec4 v_color;"));
    assert!(fragment.contains("  // noop\n"));
}

#[tokio::test]
async fn test_includes_are_lowered_into_every_stage() {
    let sources = MemorySources::new()
        .with("common.shade", "uniform highp float time;\nconst float SPEED = 2;")
        .with(
            "main.shade",
            "#include \"common.shade\"\nvoid vertex() {}\nvoid fragment() {}",
        );
    let parser = ShaderParser::new().with_resolver(Arc::new(CachingResolver::new(sources)));

    let declaration = parser
        .parse_path("main.shade", &CancellationToken::new())
        .await
        .unwrap();
    let kernels = GlslCompiler::default().compile(&declaration).unwrap();

    assert_eq!(kernels.len(), 2);
    for kernel in &kernels {
        assert!(kernel.source.contains("uniform highp float time;"));
        assert!(kernel.source.contains("const float SPEED = 2;"));
        assert!(kernel.source.contains("compiled from main.shade"));
    }
}

#[tokio::test]
async fn test_float_literals_keep_their_decimal_point() {
    let declaration = ShaderParser::new()
        .parse_str(
            "speed.shade",
            "const float SPEED = 2.0;\nconst int COUNT = 3;\nvoid fragment() {}",
        )
        .await
        .unwrap();

    let source = &GlslCompiler::default().compile(&declaration).unwrap()[0].source;
    assert!(source.contains("const float SPEED = 2.0;\n"));
    assert!(source.contains("const int COUNT = 3;\n"));
}

#[tokio::test]
async fn test_full_lowering_from_source() {
    let compiler =
        GlslCompiler::new("330 core").with_statement_lowering(StatementLowering::Full);
    let declaration = ShaderParser::new()
        .parse_str(
            "lit.shade",
            r#"
            uniform sampler2d u_texture;
            varying vec2 v_uv;
            float brighten(float value) {
              return value * 2 + 0.5;
            }
            void fragment() {
              const float k = 1.0;
              gl_FragColor = SAMPLE(u_texture, v_uv) * vec4(k, 1, 1, 1);
            }
            "#,
        )
        .await
        .unwrap();

    let source = &compiler.compile(&declaration).unwrap()[0].source;
    assert!(source.contains("float brighten(float value)\n{\n  return (value * 2) + 0.5;\n}\n"));
    assert!(source.contains("void main()\n{\n  const float k = 1.0;\n"));
    assert!(source.contains("  gl_FragColor = texture(u_texture, v_uv) * vec4(k, 1, 1, 1);\n"));
}

#[tokio::test]
async fn test_matrix_without_cardinality_fails() {
    let parser = ShaderParser::new();
    let declaration = parser
        .parse_str("bad.shade", "void fragment() {}")
        .await
        .unwrap();

    let mut declaration = declaration;
    declaration.compilation_unit.uniforms.push(shade_lang::ast::UniformDeclaration {
        primitive: shade_lang::ast::Primitive::new(shade_lang::ast::PrimitiveKind::Matrix),
        name: "transform".into(),
    });

    let err = GlslCompiler::default().compile(&declaration).unwrap_err();
    assert!(matches!(err, ShadeError::Lowering(_)));
}

#[tokio::test]
async fn test_shaders_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir(dir.path().join("lib")).unwrap();
    std::fs::write(dir.path().join("lib/noise.shade"), "uniform float seed;\n").unwrap();
    std::fs::write(
        dir.path().join("water.shade"),
        "#include \"local://lib/noise.shade\"\nvoid fragment() {\n  // waves\n}\n",
    )
    .unwrap();

    let parser = ShaderParser::new()
        .with_resolver(Arc::new(CachingResolver::new(FileSystemSources::new(dir.path()))));
    let declaration = parser
        .parse_path("water.shade", &CancellationToken::new())
        .await
        .unwrap();

    let kernels = GlslCompiler::default().compile(&declaration).unwrap();
    assert!(kernels[0].source.contains("uniform float seed;"));
    assert!(kernels[0].source.contains("// waves"));
}
