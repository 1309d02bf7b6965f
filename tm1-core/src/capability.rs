//! Version-gated capabilities.
//!
//! Every endpoint family whose availability depends on the server version is
//! listed here together with the version window it lives in. Services call
//! [`Capability::check`] before touching a gated endpoint.

use std::fmt;

use crate::error::CoreError;
use crate::version::{V12, is_version_at_least};

/// An endpoint family that is only reachable on some server versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// `/Jobs`, v12 only.
    Jobs,
    /// `/Threads`, removed in v12.
    Threads,
    /// `tm1.SaveDataAll`, pre-v12.
    SaveData,
    /// `tm1.DeletePersistentFeeders`, pre-v12.
    DeletePersistentFeeders,
    /// Transaction log delta and tail endpoints, pre-v12.
    TransactionLogDelta,
    /// Message log delta and tail endpoints, pre-v12.
    MessageLogDelta,
    /// Audit log entries, 11.6 up to (not including) v12.
    AuditLog,
    /// `tm1.UpdateStorageDimensionOrder`, 11.4 and later.
    StorageDimensionOrder,
    /// `tm1.Load` / `tm1.Unload` on cubes, 11.6 and later.
    CubeLoadUnload,
}

impl Capability {
    /// Human-readable name used in error messages.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Jobs => "Jobs API",
            Self::Threads => "Threads API",
            Self::SaveData => "SaveData",
            Self::DeletePersistentFeeders => "DeletePersistentFeeders",
            Self::TransactionLogDelta => "TransactionLog delta",
            Self::MessageLogDelta => "MessageLog delta",
            Self::AuditLog => "AuditLog",
            Self::StorageDimensionOrder => "StorageDimensionOrder",
            Self::CubeLoadUnload => "Cube Load/Unload",
        }
    }

    /// Inclusive lower bound, if any.
    pub fn min_version(&self) -> Option<&'static str> {
        match self {
            Self::Jobs => Some(V12),
            Self::AuditLog => Some("11.6.0"),
            Self::StorageDimensionOrder => Some("11.4.0"),
            Self::CubeLoadUnload => Some("11.6.0"),
            _ => None,
        }
    }

    /// Exclusive upper bound, if any.
    pub fn removed_in(&self) -> Option<&'static str> {
        match self {
            Self::Threads
            | Self::SaveData
            | Self::DeletePersistentFeeders
            | Self::TransactionLogDelta
            | Self::MessageLogDelta
            | Self::AuditLog => Some(V12),
            _ => None,
        }
    }

    /// Returns true if the capability is reachable on `version`.
    pub fn is_supported(&self, version: &str) -> bool {
        let above_min = self
            .min_version()
            .is_none_or(|min| is_version_at_least(version, min));
        let below_max = self
            .removed_in()
            .is_none_or(|max| !is_version_at_least(version, max));
        above_min && below_max
    }

    /// Fails with a version error when the capability is unreachable.
    pub fn check(&self, version: &str) -> Result<(), CoreError> {
        if let Some(min) = self.min_version() {
            if !is_version_at_least(version, min) {
                return Err(CoreError::VersionUnsupported {
                    feature: self.name().to_string(),
                    required: format!(">= {min}"),
                    actual: version.to_string(),
                });
            }
        }

        if let Some(max) = self.removed_in() {
            if is_version_at_least(version, max) {
                if matches!(self, Self::Threads) {
                    return Err(CoreError::FeatureRemoved {
                        feature: self.name().to_string(),
                        removed_in: max.to_string(),
                        actual: version.to_string(),
                    });
                }
                return Err(CoreError::VersionUnsupported {
                    feature: self.name().to_string(),
                    required: format!("< {max}"),
                    actual: version.to_string(),
                });
            }
        }

        Ok(())
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// Content Root
// ============================================================================

/// Root collection for server-side files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentRoot {
    /// `/Contents('Files')`, v12 and later. Supports nested folders.
    Files,
    /// `/Contents('Blobs')`, before v12. Flat.
    Blobs,
}

impl ContentRoot {
    /// Picks the content root for a server version.
    pub fn for_version(version: &str) -> Self {
        if is_version_at_least(version, V12) {
            Self::Files
        } else {
            Self::Blobs
        }
    }

    /// Endpoint of the root collection.
    pub fn path(&self) -> &'static str {
        match self {
            Self::Files => "/Contents('Files')",
            Self::Blobs => "/Contents('Blobs')",
        }
    }

    /// Folder listing depth actually sent to the server.
    ///
    /// Blobs has no nested folders, so depth is always 0 there.
    pub fn effective_depth(&self, requested: u32) -> u32 {
        match self {
            Self::Files => requested,
            Self::Blobs => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jobs_require_v12() {
        assert!(Capability::Jobs.is_supported("12.0.0"));
        assert!(!Capability::Jobs.is_supported("11.8.02500.3"));

        let err = Capability::Jobs.check("11.8").unwrap_err();
        assert!(matches!(err, CoreError::VersionUnsupported { .. }));
        assert!(err.to_string().contains(">= 12.0.0"));
    }

    #[test]
    fn test_threads_removed_in_v12() {
        assert!(Capability::Threads.check("11.8.1").is_ok());
        let err = Capability::Threads.check("12.0.1").unwrap_err();
        assert!(matches!(err, CoreError::FeatureRemoved { .. }));
    }

    #[test]
    fn test_pre_v12_only() {
        for cap in [
            Capability::SaveData,
            Capability::DeletePersistentFeeders,
            Capability::TransactionLogDelta,
            Capability::MessageLogDelta,
        ] {
            assert!(cap.is_supported("11.8.02500"), "{cap}");
            assert!(!cap.is_supported("12.0.0"), "{cap}");
        }
    }

    #[test]
    fn test_lower_bounds() {
        assert!(!Capability::StorageDimensionOrder.is_supported("11.3.9"));
        assert!(Capability::StorageDimensionOrder.is_supported("11.4"));
        assert!(!Capability::CubeLoadUnload.is_supported("11.5.99"));
        assert!(Capability::CubeLoadUnload.is_supported("11.6.0"));
        assert!(Capability::CubeLoadUnload.is_supported("12.2.0"));
    }

    #[test]
    fn test_audit_log_window() {
        assert!(!Capability::AuditLog.is_supported("11.5"));
        assert!(Capability::AuditLog.is_supported("11.6"));
        assert!(!Capability::AuditLog.is_supported("12.0.0"));
    }

    #[test]
    fn test_content_root() {
        assert_eq!(ContentRoot::for_version("12.0.0"), ContentRoot::Files);
        assert_eq!(ContentRoot::for_version("11.8.3"), ContentRoot::Blobs);
        assert_eq!(ContentRoot::Files.path(), "/Contents('Files')");
        assert_eq!(ContentRoot::Blobs.effective_depth(3), 0);
        assert_eq!(ContentRoot::Files.effective_depth(3), 3);
    }
}
