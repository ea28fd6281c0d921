use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use shade_core::{ShadeError, ShadeResult};
use shade_lang::ast::ShaderDeclaration;
use shade_lang::{
    CachingResolver, CancellationToken, IncludeStack, LoaderResolver, MemorySources,
    ShaderLoader, ShaderParser, SourceProvider, SourceReader,
};

/// Memory sources that count how often each path is opened, optionally
/// stalling before a path is handed out.
#[derive(Default)]
struct CountingSources {
    inner: MemorySources,
    opened: Mutex<HashMap<String, usize>>,
    delays: HashMap<String, Duration>,
}

impl CountingSources {
    fn with(mut self, path: &str, source: &str) -> Self {
        self.inner.insert(path, source);
        self
    }

    fn with_delay(mut self, path: &str, delay: Duration) -> Self {
        self.delays.insert(path.to_string(), delay);
        self
    }

    fn opened(&self, path: &str) -> usize {
        self.opened.lock().unwrap().get(path).copied().unwrap_or(0)
    }
}

#[async_trait]
impl SourceProvider for CountingSources {
    async fn open(&self, path: &str) -> ShadeResult<SourceReader> {
        *self.opened.lock().unwrap().entry(path.to_string()).or_default() += 1;
        if let Some(delay) = self.delays.get(path) {
            tokio::time::sleep(*delay).await;
        }
        self.inner.open(path).await
    }
}

type SharedResolver = Arc<CachingResolver<CountingSources>>;

fn parser_over(sources: CountingSources) -> (ShaderParser, SharedResolver) {
    let resolver = Arc::new(CachingResolver::new(sources));
    let parser = ShaderParser::new().with_resolver(resolver.clone());
    (parser, resolver)
}

fn uniform_names(declaration: &ShaderDeclaration) -> Vec<&str> {
    declaration
        .compilation_unit
        .uniforms
        .iter()
        .map(|u| u.name.as_str())
        .collect()
}

#[tokio::test]
async fn test_direct_cycle_resolves_each_file_once() {
    let sources = CountingSources::default()
        .with("a.shade", "#include \"b.shade\"\nuniform float a;")
        .with("b.shade", "#include \"a.shade\"\nuniform float b;");
    let (parser, resolver) = parser_over(sources);

    let a = parser
        .parse_path("a.shade", &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(uniform_names(&a), vec!["a", "b"]);
    assert_eq!(resolver.sources().opened("a.shade"), 1);
    assert_eq!(resolver.sources().opened("b.shade"), 1);
}

#[tokio::test]
async fn test_three_file_cycle_terminates() {
    let sources = CountingSources::default()
        .with("a.shade", "#include \"b.shade\"\nuniform float a;")
        .with("b.shade", "#include \"c.shade\"\nuniform float b;")
        .with("c.shade", "#include \"a.shade\"\nuniform float c;");
    let (parser, resolver) = parser_over(sources);

    let a = parser
        .parse_path("a.shade", &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(uniform_names(&a), vec!["a", "b", "c"]);
    for path in ["a.shade", "b.shade", "c.shade"] {
        assert_eq!(resolver.sources().opened(path), 1, "{} opened more than once", path);
    }
}

#[tokio::test]
async fn test_shared_include_is_parsed_once() {
    let sources = CountingSources::default()
        .with("common.shade", "uniform float time;")
        .with("left.shade", "#include \"common.shade\"\nuniform float left;")
        .with("right.shade", "#include \"./common.shade\"\nuniform float right;");
    let (parser, resolver) = parser_over(sources);

    let main = parser
        .parse_str(
            "main.shade",
            "#include \"left.shade\"\n#include \"right.shade\"\nvoid fragment() {}",
        )
        .await
        .unwrap();

    assert_eq!(resolver.sources().opened("common.shade"), 1);
    assert!(resolver.cached("local://common.shade").is_some());
    // each include contributes its own copy of the shared uniforms
    assert_eq!(uniform_names(&main), vec!["left", "time", "right", "time"]);
}

#[tokio::test]
async fn test_cache_hit_does_not_reopen_source() {
    let sources = CountingSources::default().with("lib.shade", "const float PI = 3.14;");
    let (parser, resolver) = parser_over(sources);
    let cancel = CancellationToken::new();

    let first = parser.parse_path("lib.shade", &cancel).await.unwrap();
    let second = parser.parse_path("./lib.shade", &cancel).await.unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(resolver.sources().opened("lib.shade"), 1);
    assert_eq!(resolver.len(), 1);
}

#[tokio::test]
async fn test_concurrent_compilations_share_cache() {
    let sources = CountingSources::default()
        .with("common.shade", "uniform vec4 tint;")
        .with("one.shade", "#include \"common.shade\"\nvoid vertex() {}")
        .with("two.shade", "#include \"common.shade\"\nvoid fragment() {}");
    let resolver = Arc::new(CachingResolver::new(sources));

    let mut handles = Vec::new();
    for path in ["one.shade", "two.shade"] {
        let resolver = resolver.clone();
        handles.push(tokio::spawn(async move {
            let parser = ShaderParser::new().with_resolver(resolver);
            let cancel = CancellationToken::new();
            let declaration = parser.parse_path(path, &cancel).await;
            declaration
        }));
    }

    for handle in handles {
        let declaration = handle.await.unwrap().unwrap();
        assert_eq!(uniform_names(&declaration), vec!["tint"]);
    }
    assert_eq!(resolver.sources().opened("common.shade"), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_cycle_entered_from_both_ends_concurrently() {
    let sources = CountingSources::default()
        .with("a.shade", "#include \"b.shade\"\nuniform float a;")
        .with("b.shade", "#include \"a.shade\"\nuniform float b;")
        .with_delay("a.shade", Duration::from_millis(50))
        .with_delay("b.shade", Duration::from_millis(50));
    let resolver = Arc::new(CachingResolver::new(sources));

    let mut handles = Vec::new();
    for path in ["a.shade", "b.shade"] {
        let resolver = resolver.clone();
        handles.push(tokio::spawn(async move {
            let parser = ShaderParser::new().with_resolver(resolver);
            parser.parse_path(path, &CancellationToken::new()).await
        }));
    }

    for (handle, own) in handles.into_iter().zip(["a", "b"]) {
        let declaration = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("compilations deadlocked on each other")
            .unwrap()
            .unwrap();
        let names = uniform_names(&declaration);
        assert_eq!(names[0], own);
        assert!(names.len() <= 2);
    }
    assert_eq!(resolver.sources().opened("a.shade"), 1);
    assert_eq!(resolver.sources().opened("b.shade"), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_waiting_for_shared_build_is_cancellable() {
    let sources = CountingSources::default()
        .with("slow.shade", "uniform float slow;")
        .with_delay("slow.shade", Duration::from_secs(60));
    let resolver = Arc::new(CachingResolver::new(sources));

    let builder_cancel = CancellationToken::new();
    let builder = {
        let resolver = resolver.clone();
        let cancel = builder_cancel.clone();
        tokio::spawn(async move {
            let parser = ShaderParser::new().with_resolver(resolver);
            parser.parse_path("slow.shade", &cancel).await
        })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    let waiter_cancel = CancellationToken::new();
    let waiter = {
        let resolver = resolver.clone();
        let cancel = waiter_cancel.clone();
        tokio::spawn(async move {
            let parser = ShaderParser::new().with_resolver(resolver);
            parser.parse_path("slow.shade", &cancel).await
        })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    waiter_cancel.cancel();
    let err = tokio::time::timeout(Duration::from_secs(5), waiter)
        .await
        .expect("waiter ignored its cancellation")
        .unwrap()
        .unwrap_err();
    assert!(matches!(err, ShadeError::Cancelled));

    builder_cancel.cancel();
    let err = tokio::time::timeout(Duration::from_secs(5), builder)
        .await
        .expect("builder ignored its cancellation")
        .unwrap()
        .unwrap_err();
    assert!(matches!(err, ShadeError::Cancelled));

    assert!(resolver.is_empty());
    assert_eq!(resolver.sources().opened("slow.shade"), 1);
}

#[tokio::test]
async fn test_missing_include_propagates() {
    let sources = CountingSources::default()
        .with("a.shade", "#include \"b.shade\"")
        .with("b.shade", "#include \"missing.shade\"");
    let (parser, resolver) = parser_over(sources);

    let err = parser
        .parse_path("a.shade", &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, ShadeError::Include { ref path, .. } if path == "missing.shade"));
    assert!(resolver.is_empty());
}

#[tokio::test]
async fn test_nested_parse_error_propagates() {
    let sources = CountingSources::default().with("bad.shade", "int vertex() {}");
    let (parser, _) = parser_over(sources);

    let err = parser
        .parse_str("main.shade", "#include \"bad.shade\"")
        .await
        .unwrap_err();

    match err {
        ShadeError::Parse { path, message, .. } => {
            assert_eq!(path, "bad.shade");
            assert_eq!(message, "The stage function vertex should have a void return type");
        }
        other => panic!("unexpected error: {}", other),
    }
}

#[tokio::test]
async fn test_cancelled_resolution_publishes_nothing() {
    let sources = CountingSources::default().with("lib.shade", "uniform float a;");
    let (parser, resolver) = parser_over(sources);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = parser.parse_path("lib.shade", &cancel).await.unwrap_err();

    assert!(matches!(err, ShadeError::Cancelled));
    assert!(resolver.cached("lib.shade").is_none());
    assert_eq!(resolver.sources().opened("lib.shade"), 0);

    let declaration = parser
        .parse_path("lib.shade", &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(uniform_names(&declaration), vec!["a"]);
}

/// Stands in for an asset manager: hands out prebuilt declarations.
struct PrebuiltLoader {
    loads: AtomicUsize,
}

#[async_trait]
impl ShaderLoader for PrebuiltLoader {
    async fn load(
        &self,
        parser: &ShaderParser,
        path: &str,
        stack: &IncludeStack,
        cancel: &CancellationToken,
    ) -> ShadeResult<ShaderDeclaration> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        let source = format!("uniform float from_{};", path.trim_end_matches(".shade"));
        parser.parse_nested(path, source.as_bytes(), stack, cancel).await
    }
}

#[tokio::test]
async fn test_loader_resolver_delegates() {
    let resolver = Arc::new(LoaderResolver::new(PrebuiltLoader {
        loads: AtomicUsize::new(0),
    }));
    let parser = ShaderParser::new().with_resolver(resolver.clone());

    let main = parser
        .parse_str("main.shade", "#include \"local://noise.shade\"\nuniform float own;")
        .await
        .unwrap();

    assert_eq!(uniform_names(&main), vec!["own", "from_noise"]);
    assert_eq!(resolver.loader().loads.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_declaration_serializes_to_json() {
    let parser = ShaderParser::new();
    let declaration = parser
        .parse_str("dump.shade", "uniform highp vec3 light;\nvoid fragment() { // lit\n}")
        .await
        .unwrap();

    let json = serde_json::to_value(&declaration).unwrap();
    assert_eq!(json["path"], "dump.shade");
    assert_eq!(json["compilation_unit"]["uniforms"][0]["name"], "light");
}
