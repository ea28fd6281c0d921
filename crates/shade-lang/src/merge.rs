use std::collections::HashSet;

use shade_core::{ShadeError, ShadeResult};
use tokio_util::sync::CancellationToken;

use crate::ast::CompilationUnit;
use crate::frontend::ShaderParser;
use crate::resolver::IncludeStack;
use crate::source::normalize_path;

/// Resolves every include of `unit` in encounter order and appends the
/// included declarations.
///
/// Each path is merged at most once per call. Paths already on `stack` are
/// being resolved further out and are skipped, which breaks include cycles of
/// any length. The resolver may also report a cycle that runs through another
/// compilation sharing its cache; that include is skipped the same way.
pub async fn merge_includes(
    parser: &ShaderParser,
    mut unit: CompilationUnit,
    stack: &IncludeStack,
    cancel: &CancellationToken,
) -> ShadeResult<CompilationUnit> {
    let includes: Vec<String> = unit.includes.iter().map(|i| i.path.clone()).collect();
    let mut visited = HashSet::new();

    for include in includes {
        let path = normalize_path(&include);

        if !visited.insert(path.clone()) {
            continue;
        }
        if stack.contains(&path) {
            tracing::debug!(path = %path, depth = stack.depth(), "skipping cyclic include");
            continue;
        }
        if cancel.is_cancelled() {
            return Err(ShadeError::Cancelled);
        }

        let included = parser
            .resolver()
            .resolve(parser, &path, &stack.push(&path), cancel)
            .await?;

        match included {
            Some(included) => unit = unit.merge_with(&included.compilation_unit),
            None => tracing::debug!(path = %path, "include skipped by resolver"),
        }
    }

    Ok(unit)
}
