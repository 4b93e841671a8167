//! Provider requirement checks.
//!
//! Runs before anything touches the network or the file system: if the
//! selected provider is missing a credential, the action stops here with a
//! message naming exactly which keys are absent.

use crate::config::{Credentials, ProviderKind};
use crate::error::StudioError;

/// Outcome of a requirement check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequirementReport {
    /// `None` when the provider name could not be resolved.
    pub provider: Option<ProviderKind>,
    /// Labels of the missing credentials, in declaration order.
    pub missing: Vec<&'static str>,
}

impl RequirementReport {
    pub fn is_satisfied(&self) -> bool {
        self.provider.is_some() && self.missing.is_empty()
    }

    /// `"<Provider> <label>, <label> missing"`, or `"Unknown provider"`.
    ///
    /// Empty when the requirements are satisfied.
    pub fn message(&self) -> String {
        match self.provider {
            None => "Unknown provider".to_string(),
            Some(_) if self.missing.is_empty() => String::new(),
            Some(p) => format!("{} {} missing", p.display_name(), self.missing.join(", ")),
        }
    }

    /// The `(satisfied, message)` pair shown by the form.
    pub fn as_tuple(&self) -> (bool, String) {
        (self.is_satisfied(), self.message())
    }

    /// Convert an unsatisfied report into a configuration error.
    pub fn into_result(self) -> Result<(), StudioError> {
        if self.is_satisfied() {
            return Ok(());
        }
        let message = self.message();
        match self.provider {
            Some(provider) => Err(StudioError::Configuration {
                provider,
                missing: self.missing,
                message,
            }),
            None => Err(StudioError::InvalidConfig(message)),
        }
    }
}

/// Check whether every credential `provider` requires is non-empty.
pub fn check(provider: ProviderKind, credentials: &Credentials) -> RequirementReport {
    let missing = provider
        .required_fields()
        .iter()
        .filter(|f| !credentials.is_set(f.key))
        .map(|f| f.label)
        .collect();
    RequirementReport {
        provider: Some(provider),
        missing,
    }
}

/// Like [`check`], for a free-form provider name.
///
/// Names outside the supported set report unsatisfied with
/// `"Unknown provider"`.
pub fn check_named(name: &str, credentials: &Credentials) -> RequirementReport {
    match name.parse::<ProviderKind>() {
        Ok(provider) => check(provider, credentials),
        Err(_) => RequirementReport {
            provider: None,
            missing: Vec::new(),
        },
    }
}
