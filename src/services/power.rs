//! Power device service.
//!
//! Mirrors UPower devices into the `/device/` collection. Signals from
//! UPower are used as triggers only; the affected device is always fetched
//! fresh.

use capy_resources::{CollectionWriter, Profile, Resource, ResourceStore};
use futures_util::stream::StreamExt;
use log::{debug, info, warn};
use std::sync::Arc;
use std::thread;
use zbus::Connection;
use zbus::zvariant::OwnedObjectPath;

pub const DEVICES_PREFIX: &str = "/device/";

const UPOWER_SERVICE: &str = "org.freedesktop.UPower";
const UPOWER_DEVICES: &str = "/org/freedesktop/UPower/devices/";
const DISPLAY_DEVICE: &str = "/org/freedesktop/UPower/devices/DisplayDevice";

#[zbus::proxy(
    interface = "org.freedesktop.UPower",
    default_service = "org.freedesktop.UPower",
    default_path = "/org/freedesktop/UPower"
)]
trait UPower {
    fn enumerate_devices(&self) -> zbus::Result<Vec<OwnedObjectPath>>;
}

#[zbus::proxy(
    interface = "org.freedesktop.UPower.Device",
    default_service = "org.freedesktop.UPower"
)]
trait UPowerDevice {
    #[zbus(property)]
    fn native_path(&self) -> zbus::Result<String>;
    #[zbus(property)]
    fn vendor(&self) -> zbus::Result<String>;
    #[zbus(property)]
    fn model(&self) -> zbus::Result<String>;
    #[zbus(property, name = "Type")]
    fn kind(&self) -> zbus::Result<u32>;
    #[zbus(property)]
    fn icon_name(&self) -> zbus::Result<String>;
    #[zbus(property)]
    fn percentage(&self) -> zbus::Result<f64>;
    #[zbus(property)]
    fn state(&self) -> zbus::Result<u32>;
    #[zbus(property)]
    fn is_present(&self) -> zbus::Result<bool>;
    #[zbus(property)]
    fn online(&self) -> zbus::Result<bool>;
    #[zbus(property)]
    fn time_to_empty(&self) -> zbus::Result<i64>;
    #[zbus(property)]
    fn time_to_full(&self) -> zbus::Result<i64>;
}

/// A snapshot of one UPower device.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DeviceInfo {
    pub native_path: String,
    pub vendor: String,
    pub model: String,
    pub kind: u32,
    pub icon_name: String,
    pub percentage: f64,
    pub state: u32,
    pub is_present: bool,
    pub online: bool,
    pub time_to_empty: i64,
    pub time_to_full: i64,
}

pub fn device_type(kind: u32) -> &'static str {
    match kind {
        1 => "Line Power",
        2 => "Battery",
        3 => "Ups",
        4 => "Monitor",
        5 => "Mouse",
        6 => "Keyboard",
        7 => "Pda",
        8 => "Phone",
        _ => "Unknown",
    }
}

pub fn device_state(state: u32) -> &'static str {
    match state {
        1 => "Charging",
        2 => "Discharging",
        3 => "Empty",
        4 => "Fully charged",
        5 => "Pending charge",
        6 => "Pending discharge",
        _ => "Unknown",
    }
}

impl DeviceInfo {
    pub fn title(&self) -> String {
        match device_type(self.kind) {
            "Unknown" => "Unknown power device".to_string(),
            "Line Power" => "Line Power".to_string(),
            "Battery" => format!("Battery {}", self.model).trim_end().to_string(),
            _ => self.model.clone(),
        }
    }

    pub fn to_resource(&self, path: String) -> Resource {
        Resource::new(path, self.title(), Profile::Device)
            .with_comment(format!(
                "{} {}%",
                device_state(self.state),
                self.percentage.round()
            ))
            .with_icon(self.icon_name.clone())
            .with_detail("nativePath", self.native_path.clone())
            .with_detail("vendor", self.vendor.clone())
            .with_detail("model", self.model.clone())
            .with_detail("type", device_type(self.kind))
            .with_detail("state", device_state(self.state))
            .with_detail("percentage", self.percentage)
            .with_detail("isPresent", self.is_present)
            .with_detail("online", self.online)
            .with_detail("timeToEmpty", self.time_to_empty)
            .with_detail("timeToFull", self.time_to_full)
    }
}

/// `/org/freedesktop/UPower/devices/battery_BAT0` -> `battery_BAT0`.
pub fn device_id(dbus_path: &str) -> &str {
    dbus_path.strip_prefix(UPOWER_DEVICES).unwrap_or_else(|| {
        dbus_path
            .rsplit('/')
            .next()
            .unwrap_or(dbus_path)
    })
}

fn is_device_path(dbus_path: &str) -> bool {
    dbus_path
        .strip_prefix(UPOWER_DEVICES)
        .is_some_and(|id| !id.is_empty())
}

async fn fetch_device(connection: &Connection, path: &str) -> zbus::Result<DeviceInfo> {
    let proxy = UPowerDeviceProxy::builder(connection)
        .path(path)?
        .build()
        .await?;

    Ok(DeviceInfo {
        native_path: proxy.native_path().await.unwrap_or_default(),
        vendor: proxy.vendor().await.unwrap_or_default(),
        model: proxy.model().await.unwrap_or_default(),
        kind: proxy.kind().await?,
        icon_name: proxy.icon_name().await.unwrap_or_default(),
        percentage: proxy.percentage().await.unwrap_or_default(),
        state: proxy.state().await.unwrap_or_default(),
        is_present: proxy.is_present().await.unwrap_or_default(),
        online: proxy.online().await.unwrap_or_default(),
        time_to_empty: proxy.time_to_empty().await.unwrap_or_default(),
        time_to_full: proxy.time_to_full().await.unwrap_or_default(),
    })
}

async fn put_device(connection: &Connection, writer: &CollectionWriter, dbus_path: &str) {
    match fetch_device(connection, dbus_path).await {
        Ok(info) => {
            let resource = info.to_resource(writer.path_of(device_id(dbus_path)));
            if let Err(e) = writer.put(resource) {
                warn!("Cannot store device {}: {}", dbus_path, e);
            }
        }
        Err(e) => warn!("Cannot read device {}: {}", dbus_path, e),
    }
}

async fn dbus_worker(writer: CollectionWriter) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let connection = Connection::system().await?;

    let rule = zbus::MatchRule::builder()
        .msg_type(zbus::message::Type::Signal)
        .sender(UPOWER_SERVICE)?
        .build();
    let mut stream = zbus::MessageStream::for_match_rule(rule, &connection, Some(100)).await?;

    let upower = UPowerProxy::new(&connection).await?;
    let mut devices: Vec<OwnedObjectPath> = upower.enumerate_devices().await?;
    devices.push(OwnedObjectPath::try_from(DISPLAY_DEVICE)?);

    let mut initial = Vec::new();
    for path in &devices {
        match fetch_device(&connection, path.as_str()).await {
            Ok(info) => initial.push(info.to_resource(writer.path_of(device_id(path.as_str())))),
            Err(e) => warn!("Cannot read device {}: {}", path.as_str(), e),
        }
    }
    writer.replace_with(initial)?;

    info!("Listening for UPower D-Bus signals...");

    while let Some(msg) = stream.next().await {
        let Ok(msg) = msg else {
            continue;
        };
        let header = msg.header();
        let member = header.member().map(|m| m.to_string()).unwrap_or_default();

        match member.as_str() {
            "PropertiesChanged" => {
                // The daemon object itself (OnBattery and friends) is not a device.
                if let Some(path) = header.path().filter(|p| is_device_path(p.as_str())) {
                    debug!("Device changed: {}", path.as_str());
                    put_device(&connection, &writer, path.as_str()).await;
                }
            }
            "DeviceAdded" => {
                if let Ok(path) = msg.body().deserialize::<OwnedObjectPath>() {
                    put_device(&connection, &writer, path.as_str()).await;
                }
            }
            "DeviceRemoved" => {
                if let Ok(path) = msg.body().deserialize::<OwnedObjectPath>() {
                    let resource_path = writer.path_of(device_id(path.as_str()));
                    if let Err(e) = writer.delete(&resource_path) {
                        warn!("Cannot remove device {}: {}", resource_path, e);
                    }
                }
            }
            _ => {}
        }
    }

    info!("UPower signal stream ended");
    Ok(())
}

/// Start the power device background thread.
pub fn start_monitor(store: &Arc<ResourceStore>) -> bool {
    let writer = match store.claim(DEVICES_PREFIX) {
        Ok(writer) => writer,
        Err(e) => {
            warn!("Power monitor not started: {}", e);
            return false;
        }
    };

    info!("Starting power device monitor...");

    let spawned = thread::Builder::new()
        .name("power".to_string())
        .spawn(move || {
            let rt = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(rt) => rt,
                Err(e) => {
                    warn!("Failed to create runtime for power monitor: {}", e);
                    return;
                }
            };
            rt.block_on(async {
                if let Err(e) = dbus_worker(writer).await {
                    warn!("UPower worker failed: {}", e);
                }
            });
        });

    match spawned {
        Ok(_) => true,
        Err(e) => {
            warn!("Failed to spawn power monitor: {}", e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn battery() -> DeviceInfo {
        DeviceInfo {
            native_path: "BAT0".into(),
            model: "5B10W13930".into(),
            kind: 2,
            icon_name: "battery-good-symbolic".into(),
            percentage: 81.4,
            state: 2,
            is_present: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_device_id() {
        assert_eq!(device_id("/org/freedesktop/UPower/devices/battery_BAT0"), "battery_BAT0");
        assert_eq!(device_id(DISPLAY_DEVICE), "DisplayDevice");
        assert_eq!(device_id("/somewhere/else/mouse_0"), "mouse_0");
    }

    #[test]
    fn test_only_device_objects_are_devices() {
        assert!(is_device_path("/org/freedesktop/UPower/devices/battery_BAT0"));
        assert!(is_device_path(DISPLAY_DEVICE));
        assert!(!is_device_path("/org/freedesktop/UPower"));
        assert!(!is_device_path(UPOWER_DEVICES));
    }

    #[test]
    fn test_device_titles() {
        assert_eq!(battery().title(), "Battery 5B10W13930");
        let line = DeviceInfo {
            kind: 1,
            ..Default::default()
        };
        assert_eq!(line.title(), "Line Power");
        assert_eq!(DeviceInfo::default().title(), "Unknown power device");
    }

    #[test]
    fn test_device_resource() {
        let res = battery().to_resource("/device/battery_BAT0".into());
        assert_eq!(res.profile, Profile::Device);
        assert_eq!(res.comment, "Discharging 81%");
        assert_eq!(res.details["state"], "Discharging");
        assert_eq!(res.icon, "battery-good-symbolic");
    }
}
