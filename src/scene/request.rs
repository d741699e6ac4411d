use serde::{Deserialize, Serialize};

use crate::foundation::core::{HexColor, View};
use crate::foundation::error::{DyelotError, DyelotResult};

/// Output width used when the host does not pick one.
pub const DEFAULT_OUTPUT_WIDTH: u32 = 800;

/// Parameters of one render cycle.
///
/// A request is an immutable value: the controller builds a fresh one on every parameter change
/// and compares it against the previous request to decide whether a new cycle is needed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RenderRequest {
    /// Target garment color.
    #[serde(rename = "colorHex")]
    pub color: HexColor,
    /// Optional design graphic, resolved through the same asset source as the garment layers.
    #[serde(default)]
    pub design_ref: Option<String>,
    /// Logical output width in pixels.
    #[serde(default = "default_output_width")]
    pub output_width: u32,
    /// Garment side.
    #[serde(default)]
    pub view: View,
}

fn default_output_width() -> u32 {
    DEFAULT_OUTPUT_WIDTH
}

impl RenderRequest {
    /// Request for `color`, front view, no design, default width.
    pub fn new(color: HexColor) -> Self {
        Self {
            color,
            design_ref: None,
            output_width: DEFAULT_OUTPUT_WIDTH,
            view: View::Front,
        }
    }

    /// Replace the design reference.
    pub fn with_design(mut self, design_ref: impl Into<String>) -> Self {
        self.design_ref = Some(design_ref.into());
        self
    }

    /// Replace the output width.
    pub fn with_output_width(mut self, output_width: u32) -> Self {
        self.output_width = output_width;
        self
    }

    /// Replace the view.
    pub fn with_view(mut self, view: View) -> Self {
        self.view = view;
        self
    }

    /// Check the invariants that the type system does not carry.
    pub fn validate(&self) -> DyelotResult<()> {
        if self.output_width == 0 {
            return Err(DyelotError::validation("output width must be > 0"));
        }
        if let Some(design) = &self.design_ref
            && design.trim().is_empty()
        {
            return Err(DyelotError::validation(
                "design reference must be non-empty when present",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/scene/request.rs"]
mod tests;
