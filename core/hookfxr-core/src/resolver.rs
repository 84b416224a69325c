//! Locating the genuine hostfxr.
//!
//! # Search order
//!
//! 1. The memoized handle from an earlier successful resolution.
//! 2. Each [`ResolverSource`] in turn (the SDK locator first, then the
//!    installed-runtime registry). A source proposes a [`ResolverCandidate`];
//!    the first candidate that actually loads wins.
//!
//! Sources and the module loader are capabilities supplied by the platform
//! layer, so the search itself stays testable without a .NET install.

use std::ffi::c_void;
use std::path::{Path, PathBuf};
use std::ptr::NonNull;
use std::sync::OnceLock;

use thiserror::Error;

#[cfg(windows)]
pub const HOSTFXR_LIBRARY_NAME: &str = "hostfxr.dll";

#[cfg(target_os = "macos")]
pub const HOSTFXR_LIBRARY_NAME: &str = "libhostfxr.dylib";

#[cfg(not(any(windows, target_os = "macos")))]
pub const HOSTFXR_LIBRARY_NAME: &str = "libhostfxr.so";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Export '{0}' not found")]
pub struct SymbolNotFound(pub String);

#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("No loadable hostfxr found")]
    ResolverNotFound,

    #[error("Failed to load {}: {reason}", path.display())]
    Load { path: PathBuf, reason: String },
}

/// Named export lookup inside a loaded module.
pub trait SymbolResolver {
    fn symbol(&self, name: &str) -> Result<NonNull<c_void>, SymbolNotFound>;
}

/// Loads a library by path. Loaded modules are never unloaded.
pub trait ModuleLoader: Send + Sync {
    type Module: SymbolResolver + Send + Sync;

    fn load(&self, path: &Path) -> Result<Self::Module, ResolveError>;

    /// True when `module` is the proxy itself. Forwarding into it would
    /// call the same export again.
    fn is_self(&self, _module: &Self::Module) -> bool {
        false
    }
}

/// A hostfxr location proposed by a source, not yet loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverCandidate {
    pub hostfxr_path: PathBuf,
    pub dotnet_root: PathBuf,
}

impl ResolverCandidate {
    /// Builds a candidate from a hostfxr path laid out as
    /// `<root>/host/fxr/<version>/<library>`. An explicit root wins over the
    /// derived one; without it, any other layout (such as an app-local
    /// hostfxr next to the launcher) is rejected.
    pub fn from_hostfxr_path(hostfxr_path: PathBuf, root_override: Option<&Path>) -> Option<Self> {
        let dotnet_root = match root_override {
            Some(root) => root.to_path_buf(),
            None => layout_root(&hostfxr_path)?,
        };

        Some(Self {
            hostfxr_path,
            dotnet_root,
        })
    }
}

fn layout_root(hostfxr_path: &Path) -> Option<PathBuf> {
    let named = |dir: &Path, name: &str| {
        dir.file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.eq_ignore_ascii_case(name))
    };

    let version_dir = hostfxr_path.parent()?;
    version_dir.file_name()?;
    let fxr = version_dir.parent()?;
    let host = fxr.parent()?;

    if named(fxr, "fxr") && named(host, "host") {
        host.parent().map(Path::to_path_buf)
    } else {
        None
    }
}

/// Shared host registration of an installed runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharedHostInstall {
    pub root: PathBuf,
    pub version: String,
}

impl SharedHostInstall {
    pub fn hostfxr_path(&self) -> PathBuf {
        self.root
            .join("host")
            .join("fxr")
            .join(&self.version)
            .join(HOSTFXR_LIBRARY_NAME)
    }

    pub fn into_candidate(self) -> ResolverCandidate {
        ResolverCandidate {
            hostfxr_path: self.hostfxr_path(),
            dotnet_root: self.root,
        }
    }
}

/// One step of the hostfxr search.
pub trait ResolverSource: Send + Sync {
    fn name(&self) -> &'static str;

    fn find(&self, app_path: &Path, dotnet_root: Option<&Path>) -> Option<ResolverCandidate>;
}

/// The loaded genuine hostfxr and the runtime root it belongs to.
#[derive(Debug)]
pub struct ResolverHandle<M> {
    pub module: M,
    pub hostfxr_path: PathBuf,
    pub dotnet_root: PathBuf,
}

pub struct ResolverLocator<L: ModuleLoader> {
    loader: L,
    sources: Vec<Box<dyn ResolverSource>>,
    dotnet_root_override: Option<PathBuf>,
    handle: OnceLock<ResolverHandle<L::Module>>,
}

impl<L: ModuleLoader> ResolverLocator<L> {
    pub fn new(
        loader: L,
        sources: Vec<Box<dyn ResolverSource>>,
        dotnet_root_override: Option<PathBuf>,
    ) -> Self {
        Self {
            loader,
            sources,
            dotnet_root_override,
            handle: OnceLock::new(),
        }
    }

    /// Already resolved handle, without searching.
    pub fn handle(&self) -> Option<&ResolverHandle<L::Module>> {
        self.handle.get()
    }

    pub fn resolve(&self, app_path: &Path) -> Result<&ResolverHandle<L::Module>, ResolveError> {
        if let Some(handle) = self.handle.get() {
            return Ok(handle);
        }

        for source in &self.sources {
            let Some(candidate) = source.find(app_path, self.dotnet_root_override.as_deref())
            else {
                tracing::debug!(source = source.name(), "Source found no hostfxr");
                continue;
            };

            tracing::debug!(
                source = source.name(),
                path = %candidate.hostfxr_path.display(),
                "Trying hostfxr candidate"
            );

            match self.loader.load(&candidate.hostfxr_path) {
                Ok(module) if self.loader.is_self(&module) => {
                    tracing::warn!(
                        source = source.name(),
                        path = %candidate.hostfxr_path.display(),
                        "Candidate is this proxy, skipping"
                    );
                }
                Ok(module) => {
                    tracing::info!(
                        source = source.name(),
                        path = %candidate.hostfxr_path.display(),
                        dotnet_root = %candidate.dotnet_root.display(),
                        "Loaded genuine hostfxr"
                    );
                    let handle = ResolverHandle {
                        module,
                        hostfxr_path: candidate.hostfxr_path,
                        dotnet_root: candidate.dotnet_root,
                    };
                    return Ok(self.handle.get_or_init(|| handle));
                }
                Err(e) => {
                    tracing::warn!(source = source.name(), error = %e, "hostfxr candidate failed to load");
                }
            }
        }

        tracing::error!(app = %app_path.display(), "Could not locate the genuine hostfxr");
        Err(ResolveError::ResolverNotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct MockModule(PathBuf);

    impl SymbolResolver for MockModule {
        fn symbol(&self, name: &str) -> Result<NonNull<c_void>, SymbolNotFound> {
            Err(SymbolNotFound(name.to_string()))
        }
    }

    #[derive(Default)]
    struct MockLoader {
        loadable: Vec<PathBuf>,
        attempts: Arc<AtomicUsize>,
        own_path: Option<PathBuf>,
    }

    impl ModuleLoader for MockLoader {
        type Module = MockModule;

        fn load(&self, path: &Path) -> Result<MockModule, ResolveError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            if self.loadable.iter().any(|p| p == path) {
                Ok(MockModule(path.to_path_buf()))
            } else {
                Err(ResolveError::Load {
                    path: path.to_path_buf(),
                    reason: "not loadable".to_string(),
                })
            }
        }

        fn is_self(&self, module: &MockModule) -> bool {
            self.own_path.as_deref() == Some(module.0.as_path())
        }
    }

    struct FixedSource(&'static str, Option<ResolverCandidate>);

    impl ResolverSource for FixedSource {
        fn name(&self) -> &'static str {
            self.0
        }

        fn find(&self, _app_path: &Path, _dotnet_root: Option<&Path>) -> Option<ResolverCandidate> {
            self.1.clone()
        }
    }

    fn candidate(root: &str, version: &str) -> ResolverCandidate {
        SharedHostInstall {
            root: PathBuf::from(root),
            version: version.to_string(),
        }
        .into_candidate()
    }

    #[test]
    fn test_shared_host_path_shape() {
        let install = SharedHostInstall {
            root: PathBuf::from("/dotnet"),
            version: "8.0.4".to_string(),
        };
        assert_eq!(
            install.hostfxr_path(),
            PathBuf::from("/dotnet/host/fxr/8.0.4").join(HOSTFXR_LIBRARY_NAME)
        );
    }

    #[test]
    fn test_candidate_root_is_derived_from_layout() {
        let path = PathBuf::from("/dotnet/host/fxr/8.0.4").join(HOSTFXR_LIBRARY_NAME);
        let candidate = ResolverCandidate::from_hostfxr_path(path.clone(), None).unwrap();
        assert_eq!(candidate.hostfxr_path, path);
        assert_eq!(candidate.dotnet_root, PathBuf::from("/dotnet"));
    }

    #[test]
    fn test_candidate_root_override_wins() {
        let path = PathBuf::from("/dotnet/host/fxr/8.0.4").join(HOSTFXR_LIBRARY_NAME);
        let candidate =
            ResolverCandidate::from_hostfxr_path(path, Some(Path::new("/custom"))).unwrap();
        assert_eq!(candidate.dotnet_root, PathBuf::from("/custom"));
    }

    #[test]
    fn test_candidate_needs_full_layout_without_override() {
        assert!(ResolverCandidate::from_hostfxr_path(PathBuf::from("hostfxr.dll"), None).is_none());
    }

    #[test]
    fn test_app_local_hostfxr_is_not_a_candidate() {
        let app_local = PathBuf::from("/Steam/steamapps/common/Resonite").join(HOSTFXR_LIBRARY_NAME);
        assert!(ResolverCandidate::from_hostfxr_path(app_local.clone(), None).is_none());

        let with_root =
            ResolverCandidate::from_hostfxr_path(app_local, Some(Path::new("/dotnet"))).unwrap();
        assert_eq!(with_root.dotnet_root, PathBuf::from("/dotnet"));
    }

    #[test]
    fn test_candidate_layout_ignores_case() {
        let path = PathBuf::from("/dotnet/Host/FXR/8.0.4").join(HOSTFXR_LIBRARY_NAME);
        let candidate = ResolverCandidate::from_hostfxr_path(path, None).unwrap();
        assert_eq!(candidate.dotnet_root, PathBuf::from("/dotnet"));
    }

    #[test]
    fn test_proxy_itself_is_skipped_for_next_source() {
        let own = PathBuf::from("/game").join(HOSTFXR_LIBRARY_NAME);
        let registry = candidate("/registry", "8.0.4");
        let loader = MockLoader {
            loadable: vec![own.clone(), registry.hostfxr_path.clone()],
            own_path: Some(own.clone()),
            ..Default::default()
        };
        let locator = ResolverLocator::new(
            loader,
            vec![
                Box::new(FixedSource(
                    "nethost",
                    Some(ResolverCandidate {
                        hostfxr_path: own,
                        dotnet_root: PathBuf::from("/game"),
                    }),
                )),
                Box::new(FixedSource("registry", Some(registry.clone()))),
            ],
            None,
        );

        let handle = locator.resolve(Path::new("/game/Game.dll")).unwrap();
        assert_eq!(handle.hostfxr_path, registry.hostfxr_path);
        assert_eq!(handle.dotnet_root, PathBuf::from("/registry"));
    }

    #[test]
    fn test_only_the_proxy_is_resolver_not_found() {
        let own = PathBuf::from("/game").join(HOSTFXR_LIBRARY_NAME);
        let loader = MockLoader {
            loadable: vec![own.clone()],
            own_path: Some(own.clone()),
            ..Default::default()
        };
        let locator = ResolverLocator::new(
            loader,
            vec![Box::new(FixedSource(
                "nethost",
                Some(ResolverCandidate {
                    hostfxr_path: own,
                    dotnet_root: PathBuf::from("/game"),
                }),
            ))],
            None,
        );

        assert!(matches!(
            locator.resolve(Path::new("/game/Game.dll")),
            Err(ResolveError::ResolverNotFound)
        ));
        assert!(locator.handle().is_none());
    }

    #[test]
    fn test_first_loadable_source_wins() {
        let sdk = candidate("/sdk", "8.0.0");
        let registry = candidate("/registry", "7.0.0");
        let loader = MockLoader {
            loadable: vec![sdk.hostfxr_path.clone(), registry.hostfxr_path.clone()],
            ..Default::default()
        };
        let locator = ResolverLocator::new(
            loader,
            vec![
                Box::new(FixedSource("sdk", Some(sdk.clone()))),
                Box::new(FixedSource("registry", Some(registry))),
            ],
            None,
        );

        let handle = locator.resolve(Path::new("/game/Game.dll")).unwrap();
        assert_eq!(handle.hostfxr_path, sdk.hostfxr_path);
        assert_eq!(handle.dotnet_root, PathBuf::from("/sdk"));
    }

    #[test]
    fn test_registry_fallback_when_sdk_finds_nothing() {
        let registry = candidate("/registry", "7.0.0");
        let loader = MockLoader {
            loadable: vec![registry.hostfxr_path.clone()],
            ..Default::default()
        };
        let locator = ResolverLocator::new(
            loader,
            vec![
                Box::new(FixedSource("sdk", None)),
                Box::new(FixedSource("registry", Some(registry.clone()))),
            ],
            None,
        );

        let handle = locator.resolve(Path::new("/game/Game.dll")).unwrap();
        assert_eq!(handle.hostfxr_path, registry.hostfxr_path);
    }

    #[test]
    fn test_unloadable_candidate_falls_through() {
        let sdk = candidate("/sdk", "8.0.0");
        let registry = candidate("/registry", "7.0.0");
        let loader = MockLoader {
            loadable: vec![registry.hostfxr_path.clone()],
            ..Default::default()
        };
        let locator = ResolverLocator::new(
            loader,
            vec![
                Box::new(FixedSource("sdk", Some(sdk))),
                Box::new(FixedSource("registry", Some(registry.clone()))),
            ],
            None,
        );

        let handle = locator.resolve(Path::new("/game/Game.dll")).unwrap();
        assert_eq!(handle.dotnet_root, registry.dotnet_root);
    }

    #[test]
    fn test_nothing_loadable_is_resolver_not_found() {
        let locator = ResolverLocator::new(
            MockLoader::default(),
            vec![
                Box::new(FixedSource("sdk", Some(candidate("/sdk", "8.0.0")))),
                Box::new(FixedSource("registry", None)),
            ],
            None,
        );

        assert!(matches!(
            locator.resolve(Path::new("/game/Game.dll")),
            Err(ResolveError::ResolverNotFound)
        ));
        assert!(locator.handle().is_none());
    }

    #[test]
    fn test_resolution_is_memoized() {
        let sdk = candidate("/sdk", "8.0.0");
        let attempts = Arc::new(AtomicUsize::new(0));
        let loader = MockLoader {
            loadable: vec![sdk.hostfxr_path.clone()],
            attempts: attempts.clone(),
            ..Default::default()
        };
        let locator =
            ResolverLocator::new(loader, vec![Box::new(FixedSource("sdk", Some(sdk)))], None);

        locator.resolve(Path::new("/a/A.dll")).unwrap();
        locator.resolve(Path::new("/b/B.dll")).unwrap();

        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failed_resolution_retries_when_invoked_again() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let loader = MockLoader {
            loadable: vec![],
            attempts: attempts.clone(),
            ..Default::default()
        };
        let locator = ResolverLocator::new(
            loader,
            vec![Box::new(FixedSource("sdk", Some(candidate("/sdk", "8.0.0"))))],
            None,
        );

        assert!(locator.resolve(Path::new("/a/A.dll")).is_err());
        assert!(locator.resolve(Path::new("/a/A.dll")).is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }
}
