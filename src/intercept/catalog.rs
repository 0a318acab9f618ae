use std::collections::HashMap;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};
use tracing::debug;

static GLOBAL_CATALOG: OnceLock<Arc<LibraryCatalog>> = OnceLock::new();

/// Which root libraries are currently available, and at what version.
///
/// Integration layers register themselves here when they bind a backend;
/// scopes consult it before patching.
#[derive(Debug, Default)]
pub struct LibraryCatalog {
    versions: RwLock<HashMap<String, String>>,
}

impl LibraryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn global() -> Arc<LibraryCatalog> {
        GLOBAL_CATALOG
            .get_or_init(|| Arc::new(LibraryCatalog::new()))
            .clone()
    }

    pub fn register(&self, root: impl Into<String>, version: impl Into<String>) {
        let root = root.into();
        let version = version.into();
        debug!("Registering library {} {}", root, version);
        self.versions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(root, version);
    }

    pub fn unregister(&self, root: &str) -> Option<String> {
        self.versions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(root)
    }

    pub fn version_of(&self, root: &str) -> Option<String> {
        self.versions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(root)
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_lookup_unregister() {
        let catalog = LibraryCatalog::new();
        assert!(catalog.version_of("openai").is_none());

        catalog.register("openai", "1.3.0");
        assert_eq!(catalog.version_of("openai").as_deref(), Some("1.3.0"));

        catalog.register("openai", "1.4.0");
        assert_eq!(catalog.version_of("openai").as_deref(), Some("1.4.0"));

        assert_eq!(catalog.unregister("openai").as_deref(), Some("1.4.0"));
        assert!(catalog.version_of("openai").is_none());
    }
}
