//! # shade-core
//!
//! Core types shared by the shade compiler crates: the error taxonomy,
//! source positions and the TOML-backed compiler configuration.

pub mod config;
pub mod error;
pub mod position;

pub use config::{CompilerConfig, ParserConfig, ShadeConfig, StatementLowering};
pub use error::{ShadeError, ShadeResult};
pub use position::Position;
