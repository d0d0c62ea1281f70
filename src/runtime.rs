//! Runtime registry
//!
//! Owns the loaded backends and resolves a locator's scheme to one of them.
//! Each factory's sanity check runs exactly once, when the runtime is built;
//! a backend that fails it stays excluded for the life of the runtime.

use crate::backend::{Backend, BackendFactory, LocalBackendFactory, SshBackendFactory};
use crate::config::RuntimeConfig;
use crate::error::{JobError, JobResult};
use crate::locator::ResourceLocator;
use crate::logging::{info, warn};
use once_cell::sync::OnceCell;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Something noteworthy that happened while loading backends
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    /// Sanity check failed; the backend is excluded
    SanityCheckFailed { backend: String },
    /// Skipped through `disabled_backends`
    Disabled { backend: String },
    /// A second backend declared an already indexed scheme; the first one keeps it
    SchemeConflict {
        scheme: String,
        kept: String,
        rejected: String,
    },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::SanityCheckFailed { backend } => {
                write!(f, "backend '{}' failed its sanity check and is excluded", backend)
            }
            Diagnostic::Disabled { backend } => {
                write!(f, "backend '{}' is disabled by configuration", backend)
            }
            Diagnostic::SchemeConflict {
                scheme,
                kept,
                rejected,
            } => write!(
                f,
                "scheme '{}' declared by both '{}' and '{}'; keeping '{}'",
                scheme, kept, rejected, kept
            ),
        }
    }
}

/// Name and schemes of a loaded backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackendInfo {
    pub name: String,
    pub schemes: Vec<String>,
}

struct LoadedBackend {
    info: BackendInfo,
    backend: Arc<dyn Backend>,
}

pub struct Runtime {
    config: RuntimeConfig,
    backends: Vec<LoadedBackend>,
    index: HashMap<String, usize>,
    diagnostics: Vec<Diagnostic>,
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("backends", &self.backend_infos())
            .field("diagnostics", &self.diagnostics)
            .finish()
    }
}

impl Runtime {
    /// The process-wide runtime, built from [`RuntimeConfig::load`] and the
    /// default factories on first use. Concurrent first calls build it once.
    pub fn initialize() -> &'static Runtime {
        static INSTANCE: OnceCell<Runtime> = OnceCell::new();
        INSTANCE.get_or_init(|| {
            Runtime::builder()
                .config(RuntimeConfig::load())
                .with_default_factories()
                .build()
        })
    }

    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::default()
    }

    /// Factories known to this crate, in registration order
    pub fn default_factories() -> Vec<Box<dyn BackendFactory>> {
        vec![Box::new(LocalBackendFactory), Box::new(SshBackendFactory)]
    }

    pub fn resolve(&self, locator: &ResourceLocator) -> JobResult<Arc<dyn Backend>> {
        self.index
            .get(&locator.scheme().to_ascii_lowercase())
            .map(|position| Arc::clone(&self.backends[*position].backend))
            .ok_or_else(|| {
                JobError::does_not_exist(format!(
                    "no backend serves scheme '{}' ({})",
                    locator.scheme(),
                    locator
                ))
            })
    }

    pub fn backend_infos(&self) -> Vec<BackendInfo> {
        self.backends.iter().map(|loaded| loaded.info.clone()).collect()
    }

    /// Scheme currently routed to the backend named `name`, if any
    pub fn schemes_for(&self, name: &str) -> Vec<String> {
        let mut schemes: Vec<String> = self
            .index
            .iter()
            .filter(|(_, position)| self.backends[**position].info.name == name)
            .map(|(scheme, _)| scheme.clone())
            .collect();
        schemes.sort();
        schemes
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }
}

#[derive(Default)]
pub struct RuntimeBuilder {
    config: RuntimeConfig,
    factories: Vec<Box<dyn BackendFactory>>,
}

impl RuntimeBuilder {
    pub fn config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    pub fn factory(mut self, factory: impl BackendFactory + 'static) -> Self {
        self.factories.push(Box::new(factory));
        self
    }

    pub fn with_default_factories(mut self) -> Self {
        self.factories.extend(Runtime::default_factories());
        self
    }

    /// Run every sanity check once and index the surviving backends
    pub fn build(self) -> Runtime {
        let mut runtime = Runtime {
            config: self.config,
            backends: Vec::new(),
            index: HashMap::new(),
            diagnostics: Vec::new(),
        };

        for factory in self.factories {
            let name = factory.name();
            if runtime.config.is_backend_disabled(name) {
                runtime.report(Diagnostic::Disabled {
                    backend: name.to_string(),
                });
                continue;
            }
            if !factory.sanity_check() {
                runtime.report(Diagnostic::SanityCheckFailed {
                    backend: name.to_string(),
                });
                continue;
            }

            let position = runtime.backends.len();
            let mut schemes = Vec::new();
            for scheme in factory.declared_schemes() {
                let scheme = scheme.to_ascii_lowercase();
                if let Some(existing) = runtime.index.get(&scheme) {
                    let kept = runtime.backends[*existing].info.name.clone();
                    runtime.report(Diagnostic::SchemeConflict {
                        scheme,
                        kept,
                        rejected: name.to_string(),
                    });
                    continue;
                }
                runtime.index.insert(scheme.clone(), position);
                schemes.push(scheme);
            }

            runtime.backends.push(LoadedBackend {
                info: BackendInfo {
                    name: name.to_string(),
                    schemes,
                },
                backend: factory.create(&runtime.config),
            });
        }

        info(format!(
            "Runtime initialized with backends {:?}",
            runtime
                .backends
                .iter()
                .map(|loaded| loaded.info.name.as_str())
                .collect::<Vec<_>>()
        ));
        runtime
    }
}

impl Runtime {
    fn report(&mut self, diagnostic: Diagnostic) {
        warn(&diagnostic);
        self.diagnostics.push(diagnostic);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::LocalBackend;
    use crate::error::ErrorKind;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingFactory {
        name: &'static str,
        schemes: &'static [&'static str],
        healthy: bool,
        checks: Arc<AtomicUsize>,
    }

    impl BackendFactory for CountingFactory {
        fn name(&self) -> &'static str {
            self.name
        }

        fn declared_schemes(&self) -> &'static [&'static str] {
            self.schemes
        }

        fn sanity_check(&self) -> bool {
            self.checks.fetch_add(1, Ordering::SeqCst);
            self.healthy
        }

        fn create(&self, config: &RuntimeConfig) -> Arc<dyn Backend> {
            Arc::new(LocalBackend::with_config(config))
        }
    }

    fn counting(
        name: &'static str,
        schemes: &'static [&'static str],
        healthy: bool,
    ) -> (CountingFactory, Arc<AtomicUsize>) {
        let checks = Arc::new(AtomicUsize::new(0));
        (
            CountingFactory {
                name,
                schemes,
                healthy,
                checks: Arc::clone(&checks),
            },
            checks,
        )
    }

    #[test]
    fn test_resolves_every_declared_scheme() {
        let runtime = Runtime::builder().factory(LocalBackendFactory).build();
        for scheme in ["fork", "local"] {
            let locator = ResourceLocator::parse(&format!("{}://localhost", scheme)).unwrap();
            assert_eq!(runtime.resolve(&locator).unwrap().name(), "local");
        }
    }

    #[test]
    fn test_undeclared_scheme_does_not_exist() {
        let runtime = Runtime::builder().factory(LocalBackendFactory).build();
        let locator = ResourceLocator::parse("pbs://cluster").unwrap();
        assert_eq!(
            runtime.resolve(&locator).unwrap_err().kind(),
            ErrorKind::DoesNotExist
        );
    }

    #[test]
    fn test_failed_sanity_check_excludes_backend_once() {
        let (factory, checks) = counting("broken", &["broken"], false);
        let runtime = Runtime::builder().factory(factory).build();

        let locator = ResourceLocator::parse("broken://localhost").unwrap();
        assert!(runtime.resolve(&locator).is_err());
        assert!(runtime.resolve(&locator).is_err());
        assert_eq!(checks.load(Ordering::SeqCst), 1);
        assert_eq!(
            runtime.diagnostics(),
            &[Diagnostic::SanityCheckFailed {
                backend: "broken".to_string()
            }]
        );
    }

    #[test]
    fn test_scheme_conflict_keeps_first_and_reports() {
        let (second, _) = counting("shadow", &["fork", "shadow"], true);
        let runtime = Runtime::builder()
            .factory(LocalBackendFactory)
            .factory(second)
            .build();

        assert_eq!(runtime.schemes_for("local"), vec!["fork", "local"]);
        assert_eq!(runtime.schemes_for("shadow"), vec!["shadow"]);
        assert!(runtime.diagnostics().contains(&Diagnostic::SchemeConflict {
            scheme: "fork".to_string(),
            kept: "local".to_string(),
            rejected: "shadow".to_string(),
        }));
    }

    #[test]
    fn test_disabled_backend_is_skipped_without_check() {
        let (factory, checks) = counting("ssh-like", &["sshlike"], true);
        let config = RuntimeConfig {
            disabled_backends: vec!["ssh-like".to_string()],
            ..RuntimeConfig::default()
        };
        let runtime = Runtime::builder().config(config).factory(factory).build();

        assert!(runtime.backend_infos().is_empty());
        assert_eq!(checks.load(Ordering::SeqCst), 0);
    }

    #[test]
    #[serial_test::serial]
    fn test_initialize_is_shared() {
        let home = tempfile::TempDir::new().unwrap();
        std::env::set_var(crate::config::CONFIG_ENV, home.path().join("config.json"));
        let first = Runtime::initialize() as *const Runtime;
        std::env::remove_var(crate::config::CONFIG_ENV);
        let handles: Vec<_> = (0..4)
            .map(|_| std::thread::spawn(|| Runtime::initialize() as *const Runtime as usize))
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), first as usize);
        }
    }
}
