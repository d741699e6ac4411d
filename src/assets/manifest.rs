use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::foundation::core::View;
use crate::foundation::error::{DyelotError, DyelotResult};

/// Static layer resources for one garment.
///
/// The background and shadow are shared by both views; only the base shape differs between front
/// and back.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AssetManifest {
    /// Backdrop drawn under everything. Also fixes the output aspect ratio.
    pub background: String,
    /// Lighting overlay drawn at reduced opacity above the tinted garment.
    #[serde(default)]
    pub shadow: Option<String>,
    /// Alpha-masked garment photograph, front side.
    pub front: String,
    /// Alpha-masked garment photograph, back side.
    pub back: String,
}

impl AssetManifest {
    /// Parse a manifest from a JSON reader.
    pub fn from_reader<R: std::io::Read>(r: R) -> DyelotResult<Self> {
        let manifest: Self = serde_json::from_reader(r)
            .map_err(|e| DyelotError::serde(format!("parse asset manifest JSON: {e}")))?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Parse a manifest from a JSON file on disk.
    pub fn from_path(path: impl AsRef<Path>) -> DyelotResult<Self> {
        let path = path.as_ref();
        let f = File::open(path).map_err(|e| {
            DyelotError::validation(format!("open asset manifest '{}': {e}", path.display()))
        })?;
        Self::from_reader(BufReader::new(f))
    }

    /// Reject empty resource references.
    pub fn validate(&self) -> DyelotResult<()> {
        let required = [
            ("background", self.background.as_str()),
            ("front", self.front.as_str()),
            ("back", self.back.as_str()),
        ];
        for (name, uri) in required {
            if uri.trim().is_empty() {
                return Err(DyelotError::validation(format!(
                    "manifest '{name}' must be non-empty"
                )));
            }
        }
        if let Some(shadow) = &self.shadow
            && shadow.trim().is_empty()
        {
            return Err(DyelotError::validation(
                "manifest 'shadow' must be non-empty when present",
            ));
        }
        Ok(())
    }

    /// Base-shape resource for `view`.
    pub fn base_shape(&self, view: View) -> &str {
        match view {
            View::Front => &self.front,
            View::Back => &self.back,
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/assets/manifest.rs"]
mod tests;
