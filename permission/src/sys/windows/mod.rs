//! Windows permission implementation using WinRT.

use crate::{Permission, PermissionError, PermissionStatus, Rationale};

pub(crate) const REQUIRES_RUNTIME_GRANT: bool = true;

// The consent prompt is owned by the OS; the rationale text cannot be shown.
pub(crate) async fn request(
    permission: Permission,
    _rationale: &Rationale,
) -> Result<PermissionStatus, PermissionError> {
    match permission {
        Permission::FineLocation => request_location(),
    }
}

fn request_location() -> Result<PermissionStatus, PermissionError> {
    use windows::Devices::Geolocation::{GeolocationAccessStatus, Geolocator};

    let status = Geolocator::RequestAccessAsync()
        .map_err(|e| PermissionError::Unknown(e.message().to_string()))?
        .get()
        .map_err(|e| PermissionError::Unknown(e.message().to_string()))?;

    Ok(match status {
        GeolocationAccessStatus::Allowed => PermissionStatus::Granted,
        // Windows only asks once; a later change needs the Settings app.
        GeolocationAccessStatus::Denied => PermissionStatus::NeverAskAgain,
        _ => PermissionStatus::Denied,
    })
}
