//! Topic conventions shared with the device firmware.
//!
//! These strings are interop-critical; devices subscribe and publish on
//! exactly these patterns.

/// Subscription filter covering every device's update stream.
pub const UPDATE_FILTER: &str = "device/+/update";

pub fn pin_set(device_id: &str) -> String {
    format!("device/{}/pin/set", device_id)
}

pub fn pin_get(device_id: &str) -> String {
    format!("device/{}/pin/get", device_id)
}

pub fn phone_set(device_id: &str) -> String {
    format!("device/{}/phone/set", device_id)
}

/// Recover the device id from an update topic.
///
/// Accepts exactly `device/<id>/update` where `<id>` is one or more
/// word characters; anything else yields `None` and the message is dropped
/// by the caller.
pub fn parse_update(topic: &str) -> Option<&str> {
    let mut parts = topic.split('/');
    match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some("device"), Some(id), Some("update"), None) if is_device_id(id) => Some(id),
        _ => None,
    }
}

fn is_device_id(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}
