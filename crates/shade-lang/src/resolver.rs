//! Resolution of `#include` paths into parsed declarations.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use shade_core::{ShadeError, ShadeResult};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::ast::ShaderDeclaration;
use crate::frontend::ShaderParser;
use crate::source::{normalize_path, SourceProvider};

static NEXT_CHAIN: AtomicU64 = AtomicU64::new(1);

/// The chain of paths currently being resolved, outermost first.
///
/// Threaded through nested parses so an include that names a file already on
/// the chain is recognised as a cycle instead of being resolved again. Every
/// root gets its own chain id, shared by everything pushed onto it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IncludeStack {
    paths: Vec<String>,
    chain: u64,
}

impl IncludeStack {
    pub fn root(path: &str) -> Self {
        Self {
            paths: vec![normalize_path(path)],
            chain: NEXT_CHAIN.fetch_add(1, Ordering::Relaxed),
        }
    }

    pub fn contains(&self, path: &str) -> bool {
        let path = normalize_path(path);
        self.paths.iter().any(|p| *p == path)
    }

    pub fn push(&self, path: &str) -> Self {
        let mut paths = self.paths.clone();
        paths.push(normalize_path(path));
        Self {
            paths,
            chain: self.chain,
        }
    }

    pub fn depth(&self) -> usize {
        self.paths.len()
    }

    /// Identifies the top-level compilation this stack belongs to.
    pub fn chain(&self) -> u64 {
        self.chain
    }
}

/// Turns an include path into a fully parsed declaration.
///
/// `stack` already ends with `path`. `Ok(None)` means the include closes a
/// cycle through another compilation and must be skipped like any other
/// cyclic include.
#[async_trait]
pub trait IncludeResolver: Send + Sync {
    async fn resolve(
        &self,
        parser: &ShaderParser,
        path: &str,
        stack: &IncludeStack,
        cancel: &CancellationToken,
    ) -> ShadeResult<Option<Arc<ShaderDeclaration>>>;
}

/// Rejects every include. Used when no environment is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticResolver;

#[async_trait]
impl IncludeResolver for StaticResolver {
    async fn resolve(
        &self,
        _parser: &ShaderParser,
        path: &str,
        _stack: &IncludeStack,
        _cancel: &CancellationToken,
    ) -> ShadeResult<Option<Arc<ShaderDeclaration>>> {
        Err(ShadeError::include("no include resolver is configured", path))
    }
}

/// Paths being built right now, and the path each waiting chain is blocked on.
#[derive(Default)]
struct BuildTable {
    building: HashMap<String, Build>,
    waiting: HashMap<u64, String>,
}

struct Build {
    chain: u64,
    done: watch::Receiver<()>,
}

impl BuildTable {
    /// Whether `chain` waiting for `path` would close a loop of chains each
    /// waiting on a path the next one is building.
    fn closes_cycle<'a>(&'a self, chain: u64, mut path: &'a str) -> bool {
        for _ in 0..=self.waiting.len() {
            let Some(build) = self.building.get(path) else {
                return false;
            };
            if build.chain == chain {
                return true;
            }
            match self.waiting.get(&build.chain) {
                Some(next) => path = next,
                None => return false,
            }
        }
        false
    }
}

/// Removes a path from the build table once its builder finishes, then wakes
/// its waiters by dropping the sender.
struct BuildGuard<'a> {
    builds: &'a Mutex<BuildTable>,
    path: String,
    _done: watch::Sender<()>,
}

impl Drop for BuildGuard<'_> {
    fn drop(&mut self) {
        self.builds.lock().building.remove(&self.path);
    }
}

struct WaitGuard<'a> {
    builds: &'a Mutex<BuildTable>,
    chain: u64,
}

impl Drop for WaitGuard<'_> {
    fn drop(&mut self) {
        self.builds.lock().waiting.remove(&self.chain);
    }
}

enum Claim {
    Build(watch::Sender<()>),
    Wait(watch::Receiver<()>),
    Cycle,
}

/// Parses includes itself, reading them through a [`SourceProvider`] and
/// memoizing the results by normalized path.
///
/// The cache can be shared between concurrent compilations. The first caller
/// for a path builds it while later callers wait, unless waiting would close a
/// cycle between compilations; that include is skipped instead. Waits end when
/// the caller's token is cancelled, and only successful builds are published.
pub struct CachingResolver<S> {
    sources: S,
    cache: DashMap<String, Arc<ShaderDeclaration>>,
    builds: Mutex<BuildTable>,
}

impl<S: SourceProvider> CachingResolver<S> {
    pub fn new(sources: S) -> Self {
        Self {
            sources,
            cache: DashMap::new(),
            builds: Mutex::new(BuildTable::default()),
        }
    }

    pub fn sources(&self) -> &S {
        &self.sources
    }

    /// The cached declaration for `path`, if one has been published.
    pub fn cached(&self, path: &str) -> Option<Arc<ShaderDeclaration>> {
        self.cache
            .get(&normalize_path(path))
            .map(|entry| entry.value().clone())
    }

    /// Number of published declarations.
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    fn claim(&self, key: &str, chain: u64) -> Option<Claim> {
        let mut builds = self.builds.lock();

        // Published between the cache check and taking the lock.
        if self.cache.contains_key(key) {
            return None;
        }

        let existing = builds.building.get(key).map(|build| build.done.clone());
        let claim = match existing {
            None => {
                let (sender, done) = watch::channel(());
                builds
                    .building
                    .insert(key.to_string(), Build { chain, done });
                Claim::Build(sender)
            }
            Some(_) if builds.closes_cycle(chain, key) => Claim::Cycle,
            Some(done) => {
                builds.waiting.insert(chain, key.to_string());
                Claim::Wait(done)
            }
        };

        Some(claim)
    }

    async fn build(
        &self,
        parser: &ShaderParser,
        key: &str,
        stack: &IncludeStack,
        cancel: &CancellationToken,
    ) -> ShadeResult<Arc<ShaderDeclaration>> {
        let reader = tokio::select! {
            _ = cancel.cancelled() => return Err(ShadeError::Cancelled),
            reader = self.sources.open(key) => reader?,
        };
        let declaration = parser.parse_nested(key, reader, stack, cancel).await?;
        tracing::trace!(path = %key, "include resolved");

        let declaration = self
            .cache
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(declaration))
            .value()
            .clone();
        Ok(declaration)
    }
}

#[async_trait]
impl<S: SourceProvider> IncludeResolver for CachingResolver<S> {
    async fn resolve(
        &self,
        parser: &ShaderParser,
        path: &str,
        stack: &IncludeStack,
        cancel: &CancellationToken,
    ) -> ShadeResult<Option<Arc<ShaderDeclaration>>> {
        let key = normalize_path(path);
        let chain = stack.chain();

        loop {
            if let Some(declaration) = self.cached(&key) {
                tracing::trace!(path = %key, "include cache hit");
                return Ok(Some(declaration));
            }
            if cancel.is_cancelled() {
                return Err(ShadeError::Cancelled);
            }

            match self.claim(&key, chain) {
                None => continue,
                Some(Claim::Build(sender)) => {
                    let _guard = BuildGuard {
                        builds: &self.builds,
                        path: key.clone(),
                        _done: sender,
                    };
                    return self.build(parser, &key, stack, cancel).await.map(Some);
                }
                Some(Claim::Cycle) => {
                    tracing::debug!(
                        path = %key,
                        chain,
                        "skipping include that closes a cycle with another compilation"
                    );
                    return Ok(None);
                }
                Some(Claim::Wait(mut done)) => {
                    let _guard = WaitGuard {
                        builds: &self.builds,
                        chain,
                    };
                    tracing::trace!(path = %key, "waiting for include built elsewhere");
                    tokio::select! {
                        _ = cancel.cancelled() => return Err(ShadeError::Cancelled),
                        _ = done.changed() => {}
                    }
                }
            }
        }
    }
}

/// An external loader (typically an asset manager) that produces declarations
/// for include paths and does its own caching.
#[async_trait]
pub trait ShaderLoader: Send + Sync {
    async fn load(
        &self,
        parser: &ShaderParser,
        path: &str,
        stack: &IncludeStack,
        cancel: &CancellationToken,
    ) -> ShadeResult<ShaderDeclaration>;
}

/// Delegates include resolution to a [`ShaderLoader`].
pub struct LoaderResolver<L> {
    loader: L,
}

impl<L: ShaderLoader> LoaderResolver<L> {
    pub fn new(loader: L) -> Self {
        Self { loader }
    }

    pub fn loader(&self) -> &L {
        &self.loader
    }
}

#[async_trait]
impl<L: ShaderLoader> IncludeResolver for LoaderResolver<L> {
    async fn resolve(
        &self,
        parser: &ShaderParser,
        path: &str,
        stack: &IncludeStack,
        cancel: &CancellationToken,
    ) -> ShadeResult<Option<Arc<ShaderDeclaration>>> {
        if cancel.is_cancelled() {
            return Err(ShadeError::Cancelled);
        }

        let path = normalize_path(path);
        tracing::trace!(path = %path, "delegating include to loader");

        let declaration = self.loader.load(parser, &path, stack, cancel).await?;
        Ok(Some(Arc::new(declaration)))
    }
}
