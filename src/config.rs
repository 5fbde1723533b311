use directories::ProjectDirs;
use std::path::PathBuf;

/// The CGPA edit gate is a single well-known document.
pub const CGPA_CONFIG_KEY: &str = "default";

/// Resolve where the document store lives: the PLACECELL_DB environment
/// variable wins, then the platform data directory, then the current
/// directory as a last resort.
pub fn store_path() -> PathBuf {
    if let Ok(path) = std::env::var("PLACECELL_DB") {
        return PathBuf::from(path);
    }
    if let Some(dirs) = ProjectDirs::from("", "", "placecell") {
        return dirs.data_dir().join("placecell.db");
    }
    PathBuf::from("placecell.db")
}
