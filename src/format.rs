// Output container selection
//
// The format is chosen once per process from an ordered preference list.
// An empty result means no recording can be started.

/// Pick the first MIME type the platform encoder reports as supported.
///
/// Returns `None` when nothing in the list is supported.
pub fn select_format<F>(preferences: &[String], is_supported: F) -> Option<String>
where
    F: Fn(&str) -> bool,
{
    let selected = preferences
        .iter()
        .find(|mime_type| is_supported(mime_type.as_str()))
        .cloned();

    match &selected {
        Some(mime_type) => crate::info!("Selected recording format: {}", mime_type),
        None => crate::warn!(
            "None of the {} preferred formats is supported, recording disabled",
            preferences.len()
        ),
    }

    selected
}

/// File extension for a container MIME type: `mp4` for MP4 variants, else `webm`.
pub fn extension_for(mime_type: &str) -> &'static str {
    if mime_type.to_ascii_lowercase().contains("mp4") {
        "mp4"
    } else {
        "webm"
    }
}

#[cfg(test)]
#[path = "format_test.rs"]
mod tests;
