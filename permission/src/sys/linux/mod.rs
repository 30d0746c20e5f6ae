//! Linux permission implementation.
//!
//! GeoClue2 authorizes clients at the system level (agent or sandbox
//! portal), so there is no runtime dialog to show.

use crate::{Permission, PermissionError, PermissionStatus, Rationale};

pub(crate) const REQUIRES_RUNTIME_GRANT: bool = false;

pub(crate) async fn request(
    _permission: Permission,
    _rationale: &Rationale,
) -> Result<PermissionStatus, PermissionError> {
    Ok(PermissionStatus::Granted)
}
