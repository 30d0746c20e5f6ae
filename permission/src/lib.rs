//! Location permission handling.
//!
//! This crate asks the platform for location access once, at screen mount,
//! and reduces the answer to a [`GateOutcome`] the screen can act on.
//!
//! The platform side sits behind [`PermissionProvider`] so the gate can be
//! driven by the system backend ([`SystemPermissions`]) or by a scripted
//! provider in tests.

#![warn(missing_docs)]

/// Platform-specific implementations.
pub mod sys;

use std::sync::Arc;

use futures::future::BoxFuture;
use log::{info, warn};

/// Types of permissions that can be requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum Permission {
    /// Precise (GPS-grade) access to device location.
    FineLocation,
}

/// The platform's answer to a permission request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PermissionStatus {
    /// Permission has been granted by the user.
    Granted,
    /// Permission has been denied by the user.
    Denied,
    /// Denied, and the platform will not prompt again.
    NeverAskAgain,
    /// Permission is restricted (e.g., parental controls).
    Restricted,
}

/// Errors that can occur when requesting permissions.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PermissionError {
    /// The permission type is not supported on this platform.
    #[error("permission not supported on this platform")]
    NotSupported,
    /// An unknown error occurred.
    #[error("unknown error: {0}")]
    Unknown(String),
}

/// Text shown in the system dialog when asking for a permission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rationale {
    /// Dialog title.
    pub title: String,
    /// Dialog body.
    pub message: String,
    /// Label of the affirmative button.
    pub button_positive: String,
}

impl Rationale {
    /// The rationale used when asking for location access for the map.
    #[must_use]
    pub fn location() -> Self {
        Self {
            title: "Location Permission".into(),
            message: "This app needs access to your location to show you on the map.".into(),
            button_positive: "OK".into(),
        }
    }
}

/// A source of permission decisions.
pub trait PermissionProvider: Send + Sync {
    /// Whether the platform enforces a runtime grant step.
    ///
    /// When this is `false`, access is implied and [`request`](Self::request)
    /// is never called.
    fn requires_runtime_grant(&self) -> bool;

    /// Ask for `permission`, presenting `rationale` where the platform
    /// supports it.
    fn request(
        &self,
        permission: Permission,
        rationale: &Rationale,
    ) -> BoxFuture<'static, Result<PermissionStatus, PermissionError>>;
}

/// The permission provider of the platform this crate was built for.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemPermissions;

impl PermissionProvider for SystemPermissions {
    fn requires_runtime_grant(&self) -> bool {
        sys::REQUIRES_RUNTIME_GRANT
    }

    fn request(
        &self,
        permission: Permission,
        rationale: &Rationale,
    ) -> BoxFuture<'static, Result<PermissionStatus, PermissionError>> {
        let rationale = rationale.clone();
        Box::pin(async move { sys::request(permission, &rationale).await })
    }
}

/// What the gate concluded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateOutcome {
    /// Location access is available.
    Granted,
    /// The user (or policy) refused access.
    Denied {
        /// Title of the blocking notice to show.
        title: String,
        /// Body of the blocking notice to show.
        message: String,
    },
    /// The platform failed while asking.
    Failed(String),
}

impl GateOutcome {
    /// Whether location tracking may start.
    #[must_use]
    pub const fn is_granted(&self) -> bool {
        matches!(self, Self::Granted)
    }

    fn denied() -> Self {
        Self::Denied {
            title: "Permission Denied".into(),
            message: "Location permission is required to show your position.".into(),
        }
    }
}

/// Requests fine-location access once and classifies the answer.
#[derive(Clone)]
pub struct PermissionGate {
    provider: Arc<dyn PermissionProvider>,
    rationale: Rationale,
}

impl std::fmt::Debug for PermissionGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PermissionGate")
            .field("rationale", &self.rationale)
            .finish_non_exhaustive()
    }
}

impl PermissionGate {
    /// Creates a gate asking `provider` with the default location rationale.
    pub fn new(provider: Arc<dyn PermissionProvider>) -> Self {
        Self {
            provider,
            rationale: Rationale::location(),
        }
    }

    /// Replaces the dialog text.
    #[must_use]
    pub fn with_rationale(mut self, rationale: Rationale) -> Self {
        self.rationale = rationale;
        self
    }

    /// Request fine-location access.
    ///
    /// Platforms without a runtime grant step are granted without asking.
    /// A denial is final; the gate never retries on its own.
    pub async fn request_permission(&self) -> GateOutcome {
        if !self.provider.requires_runtime_grant() {
            info!("no runtime grant step on this platform, location access implied");
            return GateOutcome::Granted;
        }

        match self
            .provider
            .request(Permission::FineLocation, &self.rationale)
            .await
        {
            Ok(PermissionStatus::Granted) => {
                info!("location permission granted");
                GateOutcome::Granted
            }
            Ok(status) => {
                info!("location permission denied ({status:?})");
                GateOutcome::denied()
            }
            Err(err) => {
                warn!("permission error: {err}");
                GateOutcome::Failed(err.to_string())
            }
        }
    }
}
