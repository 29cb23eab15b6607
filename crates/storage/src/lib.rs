//! Settings and project files.
//!
//! Both are JSON documents wrapped in a versioned envelope. Settings live in
//! the platform data directory (or an explicit root); projects live next to
//! the PDF they annotate as `*.stampwork.json`.

use directories::ProjectDirs;
use doc_model::Snapshot;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const SETTINGS_SCHEMA_VERSION: u32 = 1;
const PROJECT_SCHEMA_VERSION: u32 = 1;

pub const PROJECT_EXTENSION: &str = "stampwork.json";

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("unable to resolve local data directory")]
    NoDataDirectory,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("unsupported {kind} version {found} (expected {supported})")]
    UnsupportedVersion {
        kind: &'static str,
        found: u32,
        supported: u32,
    },
}

/// Page size in PDF points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointSize {
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorSettings {
    /// Screen pixels per PDF point when pages are laid out for editing.
    pub preview_scale: f64,
    pub default_blank_page: PointSize,
    /// `#rrggbb`
    pub placeholder_fill: String,
    /// `#rrggbb`
    pub placeholder_border: String,
    pub log_skipped_elements: bool,
}

impl Default for EditorSettings {
    fn default() -> Self {
        Self {
            preview_scale: 1.0,
            default_blank_page: PointSize {
                width: 612.0,
                height: 792.0,
            },
            placeholder_fill: "#e6e6e6".to_owned(),
            placeholder_border: "#999999".to_owned(),
            log_skipped_elements: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SettingsEnvelope {
    version: u32,
    settings: EditorSettings,
}

/// Overlay state of one PDF.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub version: u32,
    #[serde(default = "default_preview_scale")]
    pub preview_scale: f64,
    pub snapshot: Snapshot,
}

impl Project {
    pub fn new(snapshot: Snapshot, preview_scale: f64) -> Self {
        Self {
            version: PROJECT_SCHEMA_VERSION,
            preview_scale,
            snapshot,
        }
    }
}

fn default_preview_scale() -> f64 {
    1.0
}

#[derive(Debug, Clone)]
pub struct Storage {
    root: PathBuf,
}

impl Storage {
    pub fn from_default_project() -> Result<Self, StorageError> {
        let dirs = ProjectDirs::from("dev", "Stampwork", "Stampwork")
            .ok_or(StorageError::NoDataDirectory)?;

        Ok(Self {
            root: dirs.data_local_dir().to_path_buf(),
        })
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn load_settings(&self) -> Result<EditorSettings, StorageError> {
        let path = self.settings_path();
        if !path.exists() {
            log::debug!("no settings at {}, using defaults", path.display());
            return Ok(EditorSettings::default());
        }

        let bytes = fs::read(path)?;
        let envelope: SettingsEnvelope = serde_json::from_slice(&bytes)?;
        check_version("settings", envelope.version, SETTINGS_SCHEMA_VERSION)?;

        Ok(envelope.settings)
    }

    pub fn save_settings(&self, settings: &EditorSettings) -> Result<(), StorageError> {
        fs::create_dir_all(&self.root)?;

        let envelope = SettingsEnvelope {
            version: SETTINGS_SCHEMA_VERSION,
            settings: settings.clone(),
        };

        let bytes = serde_json::to_vec_pretty(&envelope)?;
        fs::write(self.settings_path(), bytes)?;
        Ok(())
    }

    fn settings_path(&self) -> PathBuf {
        self.root.join("settings.json")
    }
}

pub fn load_project(path: impl AsRef<Path>) -> Result<Project, StorageError> {
    let bytes = fs::read(path)?;
    let project: Project = serde_json::from_slice(&bytes)?;
    check_version("project", project.version, PROJECT_SCHEMA_VERSION)?;
    Ok(project)
}

pub fn save_project(path: impl AsRef<Path>, project: &Project) -> Result<(), StorageError> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let bytes = serde_json::to_vec_pretty(project)?;
    fs::write(path, bytes)?;
    log::debug!("saved project {}", path.display());
    Ok(())
}

/// `contract.pdf` -> `contract.stampwork.json`, in the same directory.
pub fn project_path_for(pdf: impl AsRef<Path>) -> PathBuf {
    pdf.as_ref().with_extension(PROJECT_EXTENSION)
}

fn check_version(kind: &'static str, found: u32, supported: u32) -> Result<(), StorageError> {
    if found == supported {
        Ok(())
    } else {
        Err(StorageError::UnsupportedVersion {
            kind,
            found,
            supported,
        })
    }
}
