//! Extension plugins and their registry.
//!
//! Plugins are registered once under their extension name and bound to schema
//! nodes, types, enum/bit entries and restrictions while the schema is built.
//! Validation never looks a plugin up by name; it calls whatever was bound.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use crate::data::{DataTree, NodeId};

/// How far an extension's rule reaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExtensionScope {
    /// Only the instance the extension is bound to.
    #[default]
    Node,
    /// The bound instance and everything below it; re-checked whenever a
    /// descendant is validated.
    Subtree,
}

/// A data-validation callback supplied by an extension plugin.
///
/// # Example
///
/// ```rust
/// use yangcheck::data::{DataTree, NodeId};
/// use yangcheck::schema::ExtensionPlugin;
///
/// struct NoSpaces;
///
/// impl ExtensionPlugin for NoSpaces {
///     fn name(&self) -> &str {
///         "ex:no-spaces"
///     }
///
///     fn valid_data(&self, tree: &DataTree, node: NodeId) -> bool {
///         tree.value(node).map_or(true, |v| !v.canonical.contains(' '))
///     }
/// }
/// ```
pub trait ExtensionPlugin: Send + Sync {
    /// The extension's qualified name, used for registration and in errors.
    fn name(&self) -> &str;

    fn scope(&self) -> ExtensionScope {
        ExtensionScope::Node
    }

    /// Returns false to reject the instance.
    fn valid_data(&self, tree: &DataTree, node: NodeId) -> bool;
}

/// An [`ExtensionPlugin`] built from a closure.
pub struct FnExtension<F> {
    name: String,
    scope: ExtensionScope,
    check: F,
}

impl<F> FnExtension<F> {
    pub fn new(name: impl Into<String>, check: F) -> Self
    where
        F: Fn(&DataTree, NodeId) -> bool + Send + Sync,
    {
        Self {
            name: name.into(),
            scope: ExtensionScope::Node,
            check,
        }
    }

    pub fn with_scope(mut self, scope: ExtensionScope) -> Self {
        self.scope = scope;
        self
    }
}

impl<F> ExtensionPlugin for FnExtension<F>
where
    F: Fn(&DataTree, NodeId) -> bool + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn scope(&self) -> ExtensionScope {
        self.scope
    }

    fn valid_data(&self, tree: &DataTree, node: NodeId) -> bool {
        (self.check)(tree, node)
    }
}

type PluginMap = Arc<RwLock<HashMap<String, Arc<dyn ExtensionPlugin>>>>;

/// A thread-safe registry of extension plugins keyed by extension name.
///
/// # Example
///
/// ```rust
/// use yangcheck::schema::{ExtensionRegistry, FnExtension};
///
/// let registry = ExtensionRegistry::new();
/// registry.register(FnExtension::new("ex:always", |_, _| true)).unwrap();
///
/// assert!(registry.get("ex:always").is_some());
/// assert!(registry.register(FnExtension::new("ex:always", |_, _| false)).is_err());
/// ```
pub struct ExtensionRegistry {
    plugins: PluginMap,
}

impl ExtensionRegistry {
    pub fn new() -> Self {
        Self {
            plugins: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Registers a plugin under its own name.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::DuplicateName` if the name is already registered.
    pub fn register<P>(&self, plugin: P) -> Result<(), RegistryError>
    where
        P: ExtensionPlugin + 'static,
    {
        let name = plugin.name().to_string();
        let mut plugins = self.plugins.write();

        if plugins.contains_key(&name) {
            return Err(RegistryError::DuplicateName(name));
        }

        plugins.insert(name, Arc::new(plugin));
        Ok(())
    }

    /// Retrieves a plugin by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn ExtensionPlugin>> {
        self.plugins.read().get(name).cloned()
    }

    /// Retrieves a plugin by name, failing if it is not registered.
    pub fn resolve(&self, name: &str) -> Result<Arc<dyn ExtensionPlugin>, RegistryError> {
        self.get(name)
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))
    }

    /// Returns all registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.plugins.read().keys().cloned().collect();
        names.sort();
        names
    }
}

impl Default for ExtensionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for ExtensionRegistry {
    fn clone(&self) -> Self {
        Self {
            plugins: Arc::clone(&self.plugins),
        }
    }
}

/// Errors that can occur during registry operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// Attempted to register a plugin with a name that already exists.
    #[error("extension '{0}' already registered")]
    DuplicateName(String),

    /// A schema referenced an extension nobody registered.
    #[error("extension '{0}' not found")]
    NotFound(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_resolve_and_list() {
        let registry = ExtensionRegistry::new();
        registry
            .register(FnExtension::new("ex:b", |_, _| true))
            .unwrap();
        registry
            .register(FnExtension::new("ex:a", |_, _| true).with_scope(ExtensionScope::Subtree))
            .unwrap();

        assert_eq!(registry.names(), vec!["ex:a", "ex:b"]);
        assert_eq!(
            registry.resolve("ex:a").unwrap().scope(),
            ExtensionScope::Subtree
        );
        assert_eq!(
            registry.resolve("ex:c").err(),
            Some(RegistryError::NotFound("ex:c".to_string()))
        );
    }

    #[test]
    fn test_clones_share_plugins() {
        let registry = ExtensionRegistry::new();
        let clone = registry.clone();
        registry
            .register(FnExtension::new("ex:shared", |_, _| true))
            .unwrap();
        assert!(clone.get("ex:shared").is_some());
    }
}
