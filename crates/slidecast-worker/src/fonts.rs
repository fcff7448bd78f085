//! Overlay font lookup.

use std::path::{Path, PathBuf};

/// Find a font file whose name contains `font_name`, case-insensitively.
///
/// Returns `None` when the directory is unreadable or nothing matches;
/// callers fall back to the platform default font.
pub fn find_font_file(fonts_dir: &Path, font_name: &str) -> Option<PathBuf> {
    if font_name.is_empty() {
        return None;
    }
    let needle = font_name.to_lowercase();

    let entries = std::fs::read_dir(fonts_dir).ok()?;
    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            if name.to_lowercase().contains(&needle) {
                return Some(path);
            }
        }
    }
    None
}
