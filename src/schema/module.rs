//! Modules, features and identities.
//!
//! Feature states live behind a lock so they can be toggled at runtime while
//! trees are validated against the same schema.

use indexmap::IndexMap;
use parking_lot::RwLock;
use std::sync::Arc;

use super::{SchemaError, Status};

/// The YANG language version a module is written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum YangVersion {
    V1_0,
    V1_1,
}

/// A compiled module with its feature table.
///
/// # Example
///
/// ```rust
/// use yangcheck::schema::{Module, YangVersion};
///
/// let module = Module::new("ex", YangVersion::V1_1)
///     .with_feature("fast-reroute", false)
///     .into_shared();
///
/// assert_eq!(module.feature_enabled("fast-reroute"), Some(false));
/// module.set_feature("fast-reroute", true).unwrap();
/// assert_eq!(module.feature_enabled("fast-reroute"), Some(true));
/// ```
#[derive(Debug)]
pub struct Module {
    name: String,
    version: YangVersion,
    features: RwLock<IndexMap<String, bool>>,
}

impl Module {
    /// Creates a module with no features.
    pub fn new(name: impl Into<String>, version: YangVersion) -> Self {
        Self {
            name: name.into(),
            version,
            features: RwLock::new(IndexMap::new()),
        }
    }

    /// Declares a feature with its initial state.
    pub fn with_feature(self, feature: impl Into<String>, enabled: bool) -> Self {
        self.features.write().insert(feature.into(), enabled);
        self
    }

    /// Wraps the module for sharing between schema nodes.
    pub fn into_shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> YangVersion {
        self.version
    }

    /// Returns the state of a declared feature, or `None` if it is unknown.
    pub fn feature_enabled(&self, feature: &str) -> Option<bool> {
        self.features.read().get(feature).copied()
    }

    /// Enables or disables a declared feature.
    ///
    /// # Errors
    ///
    /// Returns `SchemaError::UnknownFeature` if the feature was never declared.
    pub fn set_feature(&self, feature: &str, enabled: bool) -> Result<(), SchemaError> {
        match self.features.write().get_mut(feature) {
            Some(state) => {
                *state = enabled;
                Ok(())
            }
            None => Err(SchemaError::UnknownFeature {
                module: self.name.clone(),
                feature: feature.to_string(),
            }),
        }
    }

    /// Returns all declared features with their current states, in declaration order.
    pub fn features(&self) -> Vec<(String, bool)> {
        self.features
            .read()
            .iter()
            .map(|(name, enabled)| (name.clone(), *enabled))
            .collect()
    }
}

/// An if-feature expression.
#[derive(Debug, Clone)]
pub enum IfFeature {
    Feature { module: Arc<Module>, name: String },
    Not(Box<IfFeature>),
    And(Vec<IfFeature>),
    Or(Vec<IfFeature>),
}

impl IfFeature {
    /// References a single feature of `module`.
    pub fn feature(module: &Arc<Module>, name: impl Into<String>) -> Self {
        IfFeature::Feature {
            module: Arc::clone(module),
            name: name.into(),
        }
    }

    /// Negates an expression.
    pub fn not(inner: IfFeature) -> Self {
        IfFeature::Not(Box::new(inner))
    }

    /// Evaluates the expression against the current feature states.
    ///
    /// Unknown features count as disabled.
    pub fn is_satisfied(&self) -> bool {
        match self {
            IfFeature::Feature { module, name } => module.feature_enabled(name).unwrap_or(false),
            IfFeature::Not(inner) => !inner.is_satisfied(),
            IfFeature::And(terms) => terms.iter().all(IfFeature::is_satisfied),
            IfFeature::Or(terms) => terms.iter().any(IfFeature::is_satisfied),
        }
    }
}

/// An identity usable as an identityref value.
#[derive(Debug)]
pub struct Identity {
    pub name: String,
    pub module: Arc<Module>,
    pub status: Status,
    pub if_features: Vec<IfFeature>,
}

impl Identity {
    pub fn new(module: &Arc<Module>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            module: Arc::clone(module),
            status: Status::Current,
            if_features: Vec::new(),
        }
    }

    pub fn with_status(mut self, status: Status) -> Self {
        self.status = status;
        self
    }

    pub fn with_if_feature(mut self, expr: IfFeature) -> Self {
        self.if_features.push(expr);
        self
    }

    pub fn into_shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Returns the `module:name` form used as the canonical value.
    pub fn qualified_name(&self) -> String {
        format!("{}:{}", self.module.name(), self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_feature_cannot_be_set() {
        let module = Module::new("ex", YangVersion::V1_0).into_shared();
        let err = module.set_feature("missing", true).unwrap_err();
        assert!(err.to_string().contains("missing"));
    }

    #[test]
    fn test_if_feature_expressions() {
        let module = Module::new("ex", YangVersion::V1_1)
            .with_feature("a", true)
            .with_feature("b", false)
            .into_shared();
        let a = IfFeature::feature(&module, "a");
        let b = IfFeature::feature(&module, "b");

        assert!(a.is_satisfied());
        assert!(!b.is_satisfied());
        assert!(IfFeature::not(b.clone()).is_satisfied());
        assert!(!IfFeature::And(vec![a.clone(), b.clone()]).is_satisfied());
        assert!(IfFeature::Or(vec![a, b.clone()]).is_satisfied());
        assert!(!IfFeature::feature(&module, "undeclared").is_satisfied());

        module.set_feature("b", true).unwrap();
        assert!(b.is_satisfied());
    }

    #[test]
    fn test_identity_qualified_name() {
        let module = Module::new("iana-if-type", YangVersion::V1_0).into_shared();
        let identity = Identity::new(&module, "ethernetCsmacd");
        assert_eq!(identity.qualified_name(), "iana-if-type:ethernetCsmacd");
    }
}
