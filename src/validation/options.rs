//! Validator configuration.

/// The kind of document being validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ValidationMode {
    /// A complete datastore with configuration and state data.
    #[default]
    Data,
    /// Configuration data only.
    Config,
    /// A `get` reply.
    Get,
    /// A `get-config` reply.
    GetConfig,
    /// The content of an `edit-config`.
    Edit,
    /// A subtree filter.
    Filter,
    /// An RPC or action request.
    Rpc,
    /// An RPC or action reply.
    RpcReply,
    Notification,
}

/// Options steering which checks run and how conflicts are handled.
///
/// # Example
///
/// ```rust
/// use yangcheck::{ValidationMode, ValidationOptions};
///
/// let options = ValidationOptions::new(ValidationMode::Config)
///     .with_autodelete(true)
///     .with_reject_obsolete(true);
///
/// assert!(options.is_config_only());
/// assert!(options.schedules_deferred());
/// assert!(!ValidationOptions::new(ValidationMode::Get).schedules_deferred());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ValidationOptions {
    pub mode: ValidationMode,
    /// The data is known to be valid already; skip the expensive checks.
    pub trusted: bool,
    /// Remove instances of a conflicting case instead of failing.
    pub autodelete: bool,
    /// Treat use of obsolete nodes and identities as a violation.
    pub reject_obsolete: bool,
}

impl ValidationOptions {
    pub fn new(mode: ValidationMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    pub fn with_trusted(mut self, trusted: bool) -> Self {
        self.trusted = trusted;
        self
    }

    pub fn with_autodelete(mut self, autodelete: bool) -> Self {
        self.autodelete = autodelete;
        self
    }

    pub fn with_reject_obsolete(mut self, reject: bool) -> Self {
        self.reject_obsolete = reject;
        self
    }

    /// Whether leafref, instance-identifier, when and must checks are queued.
    pub fn schedules_deferred(&self) -> bool {
        !self.trusted
            && !matches!(
                self.mode,
                ValidationMode::Edit
                    | ValidationMode::Filter
                    | ValidationMode::Get
                    | ValidationMode::GetConfig
            )
    }

    /// `get` and `get-config` replies: data is shown, not checked for
    /// references or duplicates.
    pub fn is_read_only_view(&self) -> bool {
        matches!(self.mode, ValidationMode::Get | ValidationMode::GetConfig)
    }

    /// Only configuration may appear outside operations.
    pub fn is_config_only(&self) -> bool {
        matches!(
            self.mode,
            ValidationMode::Config | ValidationMode::GetConfig | ValidationMode::Edit
        )
    }

    pub fn is_operation(&self) -> bool {
        matches!(
            self.mode,
            ValidationMode::Rpc | ValidationMode::RpcReply | ValidationMode::Notification
        )
    }

    /// Whether absent mandatory nodes and element counts are reported.
    pub fn checks_presence(&self) -> bool {
        !matches!(
            self.mode,
            ValidationMode::Edit
                | ValidationMode::Filter
                | ValidationMode::Get
                | ValidationMode::GetConfig
        )
    }
}
