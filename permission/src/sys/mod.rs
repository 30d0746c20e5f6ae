//! Platform-specific permission implementations.

#[cfg(target_os = "windows")]
mod windows;

#[cfg(target_os = "linux")]
mod linux;

#[cfg(target_os = "windows")]
pub(crate) use windows::{REQUIRES_RUNTIME_GRANT, request};

#[cfg(target_os = "linux")]
pub(crate) use linux::{REQUIRES_RUNTIME_GRANT, request};

// Fallback for unsupported platforms (compile-time stub)
#[cfg(not(any(target_os = "windows", target_os = "linux")))]
pub(crate) const REQUIRES_RUNTIME_GRANT: bool = true;

#[cfg(not(any(target_os = "windows", target_os = "linux")))]
pub(crate) async fn request(
    _permission: crate::Permission,
    _rationale: &crate::Rationale,
) -> Result<crate::PermissionStatus, crate::PermissionError> {
    Err(crate::PermissionError::NotSupported)
}
