use crossterm::style::Color;
use k8s_openapi::api::core::v1::Pod;
use std::hash::{Hash, Hasher};

/// Strip the replica-set hash and pod suffix from a generated pod name.
///
/// `chartmuseum-7d9f8b6c4-x2x1z` becomes `chartmuseum`. Names with fewer
/// than three dash-separated segments are returned unchanged.
pub fn pod_base_name(pod_name: &str) -> &str {
    let mut parts = pod_name.rsplitn(3, '-');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(_), Some(_), Some(base)) => base,
        _ => pod_name,
    }
}

/// Pick the container to tail: one whose name contains `pattern`, else the first.
pub fn select_container(pod: &Pod, pattern: &str) -> Option<String> {
    let containers = &pod.spec.as_ref()?.containers;
    containers
        .iter()
        .find(|c| c.name.contains(pattern))
        .or_else(|| containers.first())
        .map(|c| c.name.clone())
}

/// Name of the first container in the pod spec.
pub fn first_container(pod: &Pod) -> Option<String> {
    pod.spec
        .as_ref()
        .and_then(|s| s.containers.first())
        .map(|c| c.name.clone())
}

/// Generate a color for a string based on hash.
pub fn get_color(s: &str) -> Color {
    let colors = [
        Color::Red,
        Color::Green,
        Color::Blue,
        Color::Yellow,
        Color::Magenta,
        Color::Cyan,
        Color::AnsiValue(91), // Bright Red
        Color::AnsiValue(92), // Bright Green
        Color::AnsiValue(94), // Bright Blue
        Color::AnsiValue(93), // Bright Yellow
        Color::AnsiValue(95), // Bright Magenta
        Color::AnsiValue(96), // Bright Cyan
    ];
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    s.hash(&mut hasher);
    let hash = hasher.finish() as u32;
    colors[(hash % colors.len() as u32) as usize]
}
