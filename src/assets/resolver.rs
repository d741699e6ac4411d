use rayon::prelude::*;
use serde::Serialize;

use crate::assets::decode::{PreparedImage, decode_image};
use crate::assets::manifest::AssetManifest;
use crate::assets::source::AssetSource;
use crate::foundation::error::{DyelotError, DyelotResult};
use crate::scene::request::RenderRequest;

/// Role of a layer within a [`LayerBundle`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerSlot {
    /// Backdrop.
    Background,
    /// View-specific garment photograph.
    BaseShape,
    /// Lighting overlay.
    Shadow,
    /// Caller-supplied print graphic.
    Design,
}

/// One resource the resolver will load.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PlannedLayer {
    /// Where the decoded image goes in the bundle.
    pub slot: LayerSlot,
    /// Resource reference handed to the [`AssetSource`].
    pub uri: String,
}

/// Fully loaded layers for one render cycle.
///
/// A bundle only exists when every planned layer loaded; there is no partially populated form.
#[derive(Clone, Debug)]
pub struct LayerBundle {
    /// Backdrop, also the aspect-ratio reference.
    pub background: PreparedImage,
    /// Garment photograph for the requested view.
    pub base_shape: PreparedImage,
    /// Lighting overlay, if the manifest has one.
    pub shadow: Option<PreparedImage>,
    /// Print graphic, if the request has one.
    pub design: Option<PreparedImage>,
}

/// Upper bound on layers per bundle; one loader thread each.
const MAX_LAYERS: usize = 4;

/// Maps requests to layer resources and loads them.
///
/// Loads run on a resolver-owned pool so a slow fetch never occupies the global rayon pool.
pub struct AssetResolver<S> {
    manifest: AssetManifest,
    source: S,
    pool: rayon::ThreadPool,
}

impl<S: AssetSource> AssetResolver<S> {
    /// Resolver for the garment described by `manifest`, reading through `source`.
    pub fn new(manifest: AssetManifest, source: S) -> DyelotResult<Self> {
        manifest.validate()?;
        Ok(Self {
            manifest,
            source,
            pool: build_loader_pool()?,
        })
    }

    /// The static layer manifest.
    pub fn manifest(&self) -> &AssetManifest {
        &self.manifest
    }

    /// Resources a render of `req` needs, in bundle order.
    pub fn plan(&self, req: &RenderRequest) -> Vec<PlannedLayer> {
        let mut out = vec![
            PlannedLayer {
                slot: LayerSlot::Background,
                uri: self.manifest.background.clone(),
            },
            PlannedLayer {
                slot: LayerSlot::BaseShape,
                uri: self.manifest.base_shape(req.view).to_string(),
            },
        ];
        if let Some(shadow) = &self.manifest.shadow {
            out.push(PlannedLayer {
                slot: LayerSlot::Shadow,
                uri: shadow.clone(),
            });
        }
        if let Some(design) = &req.design_ref {
            out.push(PlannedLayer {
                slot: LayerSlot::Design,
                uri: design.clone(),
            });
        }
        out
    }

    /// Load every planned layer in parallel and join on all of them.
    ///
    /// The first failing layer fails the whole bundle with [`DyelotError::AssetLoad`].
    #[tracing::instrument(
        skip(self, req),
        fields(view = %req.view, design = req.design_ref.is_some())
    )]
    pub fn resolve(&self, req: &RenderRequest) -> DyelotResult<LayerBundle> {
        req.validate()?;
        let plan = self.plan(req);

        let loaded = self
            .pool
            .install(|| {
                plan.par_iter()
                    .map(|layer| {
                        self.load(&layer.uri)
                            .map(|img| (layer.slot, img))
                            .map_err(|e| {
                                DyelotError::asset_load(format!(
                                    "{:?} layer '{}': {e}",
                                    layer.slot, layer.uri
                                ))
                            })
                    })
                    .collect::<DyelotResult<Vec<_>>>()
            })
            .inspect_err(|e| tracing::warn!(error = %e, "layer bundle failed to load"))?;

        let mut background = None;
        let mut base_shape = None;
        let mut shadow = None;
        let mut design = None;
        for (slot, img) in loaded {
            match slot {
                LayerSlot::Background => background = Some(img),
                LayerSlot::BaseShape => base_shape = Some(img),
                LayerSlot::Shadow => shadow = Some(img),
                LayerSlot::Design => design = Some(img),
            }
        }

        let bundle = LayerBundle {
            background: background
                .ok_or_else(|| DyelotError::asset_load("background layer missing from bundle"))?,
            base_shape: base_shape
                .ok_or_else(|| DyelotError::asset_load("base shape layer missing from bundle"))?,
            shadow,
            design,
        };
        tracing::debug!(layers = plan.len(), "layer bundle loaded");
        Ok(bundle)
    }

    fn load(&self, uri: &str) -> DyelotResult<PreparedImage> {
        let bytes = self.source.fetch(uri)?;
        decode_image(&bytes)
    }
}

fn build_loader_pool() -> DyelotResult<rayon::ThreadPool> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(MAX_LAYERS)
        .thread_name(|i| format!("dyelot-loader-{i}"))
        .build()
        .map_err(|e| DyelotError::Other(anyhow::anyhow!("failed to build loader pool: {e}")))
}

#[cfg(test)]
#[path = "../../tests/unit/assets/resolver.rs"]
mod tests;
