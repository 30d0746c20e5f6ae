//! Linux location implementation using GeoClue2 D-Bus service.
//!
//! A fresh client reports no location until GeoClue emits
//! `LocationUpdated`, so a one-shot query waits for that signal. The
//! caller bounds the wait with the request timeout.

use futures::{Stream, StreamExt};
use zbus::zvariant::{ObjectPath, OwnedObjectPath, OwnedValue, Value};
use zbus::{Connection, Proxy};

use crate::{Accuracy, Location, LocationError, timestamp_now};

const GEOCLUE_BUS: &str = "org.freedesktop.GeoClue2";
const MANAGER_PATH: &str = "/org/freedesktop/GeoClue2/Manager";
const MANAGER_IFACE: &str = "org.freedesktop.GeoClue2.Manager";
const CLIENT_IFACE: &str = "org.freedesktop.GeoClue2.Client";
const LOCATION_IFACE: &str = "org.freedesktop.GeoClue2.Location";
const PROPERTIES_IFACE: &str = "org.freedesktop.DBus.Properties";

// GClueAccuracyLevel
const ACCURACY_STREET: u32 = 6;
const ACCURACY_EXACT: u32 = 8;

const fn accuracy_level(accuracy: Accuracy) -> u32 {
    match accuracy {
        Accuracy::Balanced => ACCURACY_STREET,
        Accuracy::High => ACCURACY_EXACT,
    }
}

fn unknown(context: &str) -> impl Fn(zbus::Error) -> LocationError + '_ {
    move |e| LocationError::Unknown(format!("{context}: {e}"))
}

async fn set_client_property(
    connection: &Connection,
    client: &OwnedObjectPath,
    name: &str,
    value: Value<'_>,
) -> Result<(), LocationError> {
    connection
        .call_method(
            Some(GEOCLUE_BUS),
            client.as_str(),
            Some(PROPERTIES_IFACE),
            "Set",
            &(CLIENT_IFACE, name, value),
        )
        .await
        .map_err(unknown(name))?;
    Ok(())
}

async fn get_property(
    connection: &Connection,
    path: &str,
    iface: &str,
    name: &str,
) -> Result<OwnedValue, zbus::Error> {
    connection
        .call_method(Some(GEOCLUE_BUS), path, Some(PROPERTIES_IFACE), "Get", &(iface, name))
        .await?
        .body()
        .deserialize()
}

async fn get_f64(connection: &Connection, path: &str, name: &str) -> Option<f64> {
    let value = get_property(connection, path, LOCATION_IFACE, name).await.ok()?;
    value.downcast_ref::<f64>().ok()
}

pub(crate) async fn get_location(accuracy: Accuracy) -> Result<Location, LocationError> {
    let connection = Connection::system()
        .await
        .map_err(unknown("D-Bus connection failed"))?;

    let (client,): (OwnedObjectPath,) = connection
        .call_method(Some(GEOCLUE_BUS), MANAGER_PATH, Some(MANAGER_IFACE), "GetClient", &())
        .await
        .map_err(unknown("GeoClue2 not available"))?
        .body()
        .deserialize()
        .map_err(unknown("Failed to parse response"))?;

    // GeoClue2 refuses to start a client without a desktop id.
    set_client_property(&connection, &client, "DesktopId", Value::from("trackkit")).await?;
    set_client_property(
        &connection,
        &client,
        "RequestedAccuracyLevel",
        Value::from(accuracy_level(accuracy)),
    )
    .await?;

    // Subscribe before starting so the first update cannot slip past.
    let proxy = Proxy::new(&connection, GEOCLUE_BUS, client.as_str(), CLIENT_IFACE)
        .await
        .map_err(unknown("Failed to create client proxy"))?;
    let mut updates = proxy
        .receive_signal("LocationUpdated")
        .await
        .map_err(unknown("Failed to subscribe to location updates"))?;

    connection
        .call_method(Some(GEOCLUE_BUS), client.as_str(), Some(CLIENT_IFACE), "Start", &())
        .await
        .map_err(unknown("Failed to start GeoClue client"))?;

    let updates = updates.map(|message| message.body().deserialize::<(OwnedObjectPath, OwnedObjectPath)>());
    let result = match current_location_path(&connection, &client).await {
        Ok(current) => match first_location(current, updates).await {
            Ok(path) => read_location(&connection, &path).await,
            Err(e) => Err(e),
        },
        Err(e) => Err(e),
    };

    let _ = connection
        .call_method(Some(GEOCLUE_BUS), client.as_str(), Some(CLIENT_IFACE), "Stop", &())
        .await;

    result
}

/// The client's current location object, or `None` before the first fix.
async fn current_location_path(
    connection: &Connection,
    client: &OwnedObjectPath,
) -> Result<Option<OwnedObjectPath>, LocationError> {
    let reply = get_property(connection, client.as_str(), CLIENT_IFACE, "Location")
        .await
        .map_err(unknown("Failed to get location"))?;

    let path: OwnedObjectPath = reply
        .downcast_ref::<ObjectPath>()
        .map(|p| p.to_owned().into())
        .map_err(|_| LocationError::NotAvailable)?;

    Ok((!is_unset(&path)).then_some(path))
}

/// GeoClue reports "/" until the first fix arrives.
fn is_unset(path: &OwnedObjectPath) -> bool {
    path.as_str() == "/"
}

/// The client's location object: `current` when set, otherwise the new
/// object of the first `LocationUpdated` (old, new) pair that names one.
async fn first_location<S>(
    current: Option<OwnedObjectPath>,
    mut updates: S,
) -> Result<OwnedObjectPath, LocationError>
where
    S: Stream<Item = zbus::Result<(OwnedObjectPath, OwnedObjectPath)>> + Unpin,
{
    if let Some(path) = current {
        return Ok(path);
    }
    while let Some(update) = updates.next().await {
        let (_old, new) = update.map_err(unknown("Failed to parse location update"))?;
        if !is_unset(&new) {
            return Ok(new);
        }
    }
    Err(LocationError::NotAvailable)
}

async fn read_location(
    connection: &Connection,
    path: &OwnedObjectPath,
) -> Result<Location, LocationError> {
    let latitude = get_f64(connection, path.as_str(), "Latitude")
        .await
        .ok_or(LocationError::NotAvailable)?;
    let longitude = get_f64(connection, path.as_str(), "Longitude")
        .await
        .ok_or(LocationError::NotAvailable)?;
    let altitude = get_f64(connection, path.as_str(), "Altitude")
        .await
        .filter(|a| a.is_finite() && *a > -f64::MAX);
    let accuracy = get_f64(connection, path.as_str(), "Accuracy").await;

    Ok(Location {
        latitude,
        longitude,
        altitude,
        horizontal_accuracy: accuracy,
        vertical_accuracy: None,
        timestamp: timestamp_now(),
    })
}
