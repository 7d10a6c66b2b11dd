use log::{debug, info, warn};
use serde::Serialize;

use super::platform::Platform;

/// Upper bound on devices considered during enumeration.
pub const MAX_DEVICES: usize = 16;

/// An enumerated rendering device as seen by the selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DeviceInfo {
    /// Position in the enumeration order.
    pub position: usize,
    /// Vendor device index, absent when the attribute query failed.
    pub cuda_id: Option<i64>,
}

/// Outcome of scanning enumerated devices against a preferred index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    /// A device reported exactly the requested index.
    Exact(usize),
    /// No exact match, using the device with the highest index.
    Fallback(usize),
    /// Nothing usable was enumerated.
    Default,
}

/// Pick a device position from the attribute values of each enumerated
/// device, in enumeration order.
///
/// Devices whose attribute could not be read never match and never become
/// the fallback. Ties on the fallback keep the first device seen.
pub fn choose(attributes: &[Option<i64>], requested: Option<i64>) -> Selection {
    let mut selected = None;
    let mut fallback: Option<(usize, i64)> = None;

    for (position, attribute) in attributes.iter().enumerate() {
        let Some(value) = *attribute else {
            continue;
        };
        if fallback.map_or(true, |(_, best)| value > best) {
            fallback = Some((position, value));
        }
        if requested == Some(value) {
            selected = Some(position);
        }
    }

    match (selected, fallback) {
        (Some(position), _) => Selection::Exact(position),
        (None, Some((position, _))) => Selection::Fallback(position),
        (None, None) => Selection::Default,
    }
}

/// List the devices the platform exposes, with their vendor index.
pub fn list_devices<P: Platform>(platform: &P) -> Vec<DeviceInfo> {
    platform
        .query_devices(MAX_DEVICES)
        .into_iter()
        .enumerate()
        .map(|(position, device)| DeviceInfo {
            position,
            cuda_id: platform.device_index(device),
        })
        .collect()
}

/// Open a display on the preferred device.
///
/// Never fails hard: without a usable device the platform's default display
/// is returned, and `None` only if even that is unavailable.
pub fn select_display<P: Platform>(platform: &P, requested: Option<i64>) -> Option<P::Display> {
    let devices = platform.query_devices(MAX_DEVICES);
    let attributes: Vec<Option<i64>> = devices
        .iter()
        .map(|device| platform.device_index(*device))
        .collect();
    debug!("Enumerated {} EGL devices: {:?}", devices.len(), attributes);

    let position = match choose(&attributes, requested) {
        Selection::Exact(position) => {
            info!("Using EGL device {} (requested index {:?})", position, requested);
            Some(position)
        }
        Selection::Fallback(position) => {
            if requested.is_some() {
                warn!(
                    "No EGL device with index {:?}, falling back to device {}",
                    requested, position
                );
            } else {
                info!("Using EGL device {} (highest index)", position);
            }
            Some(position)
        }
        Selection::Default => None,
    };

    if let Some(display) = position.and_then(|p| platform.device_display(devices[p])) {
        return Some(display);
    }

    info!("Using default EGL display");
    platform.default_display()
}
