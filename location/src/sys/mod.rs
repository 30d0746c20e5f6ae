//! Platform-specific location implementations.

#[cfg(target_os = "windows")]
mod windows;

#[cfg(target_os = "linux")]
mod linux;

#[cfg(target_os = "windows")]
pub(crate) use windows::get_location;

#[cfg(target_os = "linux")]
pub(crate) use linux::get_location;

// Fallback for unsupported platforms
#[cfg(not(any(target_os = "windows", target_os = "linux")))]
pub(crate) async fn get_location(
    _accuracy: crate::Accuracy,
) -> Result<crate::Location, crate::LocationError> {
    Err(crate::LocationError::NotAvailable)
}
