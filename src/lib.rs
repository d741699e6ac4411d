//! dyelot renders garment color previews.
//!
//! A fixed-pose garment photograph is tinted to a requested color while keeping its fabric
//! shading, optionally printed with a design graphic, and encoded for display:
//!
//! - Describe the garment's layer images with an [`AssetManifest`]
//! - Load a [`LayerBundle`] for a [`RenderRequest`] through an [`AssetResolver`]
//! - Blend it with [`composite`] into an [`EncodedImage`]
//! - Or let a [`RenderController`] re-render whenever the parameters change
#![forbid(unsafe_code)]

mod assets;
mod foundation;
mod render;
mod scene;
mod session;

pub use crate::foundation::core::{Canvas, HexColor, Rgba8Premul, View};
pub use crate::foundation::error::{DyelotError, DyelotResult};

pub use crate::assets::decode::{PreparedImage, decode_image};
pub use crate::assets::manifest::AssetManifest;
pub use crate::assets::resolver::{AssetResolver, LayerBundle, LayerSlot, PlannedLayer};
pub use crate::assets::source::{
    AssetSource, CachingSource, FsAssetSource, MemoryAssetSource, decode_data_uri,
    normalize_rel_path,
};
pub use crate::render::blend::CompositeOp;
pub use crate::render::compositor::{
    CompositorOpts, OutputGeometry, compose_layers, composite, design_rect, output_geometry,
};
pub use crate::render::encode::{EncodedImage, JPEG_MIME, encode_jpeg};
pub use crate::render::surface::Surface;
pub use crate::scene::request::{DEFAULT_OUTPUT_WIDTH, RenderRequest};
pub use crate::session::controller::{
    ControllerOpts, FailureKind, RenderController, RenderFailure, RenderState, StalePolicy,
};
