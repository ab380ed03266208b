//! Validated tenant and unit identifiers.
//!
//! [`TenantId`] and [`UnitId`] are built once at the identity-binding
//! boundary from trimmed, non-empty strings. Downstream code never
//! re-validates them.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Error returned when an identifier fails validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentityError {
    /// The tenant identifier was empty after trimming.
    #[error("tenant id must not be empty")]
    EmptyTenant,
    /// The unit identifier was empty after trimming.
    #[error("unit id must not be empty")]
    EmptyUnit,
}

/// Identifier of an isolated customer/fleet namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(String);

impl TenantId {
    /// Builds a `TenantId` from raw input, trimming surrounding whitespace.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::EmptyTenant`] if nothing is left after
    /// trimming.
    pub fn parse(raw: &str) -> Result<Self, IdentityError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(IdentityError::EmptyTenant);
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of a tracked unit within a tenant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnitId(String);

impl UnitId {
    /// Builds a `UnitId` from raw input, trimming surrounding whitespace.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::EmptyUnit`] if nothing is left after
    /// trimming.
    pub fn parse(raw: &str) -> Result<Self, IdentityError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(IdentityError::EmptyUnit);
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity a connection is bound to after a successful `register`.
///
/// Once bound, a connection keeps this identity for its whole lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Binding {
    /// A reporting unit. May send position reports for exactly this pair.
    Unit {
        /// Owning tenant.
        tenant_id: TenantId,
        /// The unit itself.
        unit_id: UnitId,
    },
    /// A tenant-scoped live viewer. Receives broadcasts, never reports.
    Viewer {
        /// Tenant being watched.
        tenant_id: TenantId,
    },
}

impl Binding {
    /// Returns the tenant this binding is scoped to.
    #[must_use]
    pub fn tenant_id(&self) -> &TenantId {
        match self {
            Self::Unit { tenant_id, .. } | Self::Viewer { tenant_id } => tenant_id,
        }
    }

    /// Returns the bound unit, if this is a unit binding.
    #[must_use]
    pub fn unit_id(&self) -> Option<&UnitId> {
        match self {
            Self::Unit { unit_id, .. } => Some(unit_id),
            Self::Viewer { .. } => None,
        }
    }
}
