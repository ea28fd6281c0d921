use serde::{Deserialize, Serialize};

use crate::error::{ShadeError, ShadeResult};

/// How much of a stage body the GLSL backend lowers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StatementLowering {
    /// Only comments are emitted into `main()`.
    #[default]
    Comments,
    /// Assignments, returns, expression statements and helper functions too.
    Full,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Default)]
pub struct ParserConfig {
    /// Archetype transformers to register, in order (e.g. `"sprite"`).
    #[serde(default)]
    pub archetypes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct CompilerConfig {
    pub glsl_version: String,
    pub statement_lowering: StatementLowering,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            glsl_version: "330 core".to_string(),
            statement_lowering: StatementLowering::Comments,
        }
    }
}

/// Top-level `shade.toml` configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Default)]
pub struct ShadeConfig {
    #[serde(default)]
    pub parser: ParserConfig,
    #[serde(default)]
    pub compiler: CompilerConfig,
}

impl ShadeConfig {
    pub fn from_toml_str(contents: &str) -> ShadeResult<Self> {
        toml::from_str(contents).map_err(|e| ShadeError::Config(e.to_string()))
    }

    pub fn load_from_file(path: &std::path::Path) -> ShadeResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn save_to_file(&self, path: &std::path::Path) -> ShadeResult<()> {
        let contents =
            toml::to_string_pretty(self).map_err(|e| ShadeError::Config(e.to_string()))?;
        std::fs::write(path, contents)?;
        Ok(())
    }
}
