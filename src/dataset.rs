//! What the rings display.
//!
//! A `Dataset` is the fixed list of display items an external controller
//! hands to the window manager. Switching datasets switches the gallery
//! mode and forces a full window rebuild.

use serde::Deserialize;

use crate::config::DatasetConfig;
use crate::net::metadata::{ImageResolver, TokenMetadata};

/// Image source the rings are built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GalleryMode {
    /// Local files or plain URLs
    Local,
    /// Resolved on-chain token metadata
    OnChain,
}

impl Default for GalleryMode {
    fn default() -> Self {
        Self::Local
    }
}

/// One image slot's content.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayItem {
    /// Display-ready image URL or local path
    pub url: String,
    /// Token id when the item came from on-chain metadata
    pub external_id: Option<String>,
}

impl DisplayItem {
    pub fn local(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            external_id: None,
        }
    }

    /// Resolve token metadata to an item. `None` when no image can be found.
    pub fn from_metadata(resolver: &dyn ImageResolver, meta: &TokenMetadata) -> Option<Self> {
        let url = resolver.resolve(meta)?;
        Some(Self {
            url,
            external_id: Some(meta.token_id.clone()),
        })
    }
}

#[derive(Debug, Clone)]
pub struct Dataset {
    pub mode: GalleryMode,
    pub items: Vec<DisplayItem>,
}

impl Dataset {
    pub fn new(mode: GalleryMode, items: Vec<DisplayItem>) -> Self {
        Self { mode, items }
    }

    pub fn local<S: Into<String>>(urls: impl IntoIterator<Item = S>) -> Self {
        Self {
            mode: GalleryMode::Local,
            items: urls.into_iter().map(DisplayItem::local).collect(),
        }
    }

    /// Build a dataset from token metadata, skipping tokens with no image.
    pub fn on_chain(resolver: &dyn ImageResolver, tokens: &[TokenMetadata]) -> Self {
        let items: Vec<DisplayItem> = tokens
            .iter()
            .filter_map(|t| {
                let item = DisplayItem::from_metadata(resolver, t);
                if item.is_none() {
                    log::debug!("Token {} has no resolvable image", t.token_id);
                }
                item
            })
            .collect();
        Self {
            mode: GalleryMode::OnChain,
            items,
        }
    }

    /// Build from the config section. Items are resolved through `resolver`
    /// so `ipfs://` entries become gateway URLs.
    pub fn from_config(cfg: &DatasetConfig, resolver: &dyn ImageResolver) -> Self {
        let items = cfg
            .items
            .iter()
            .map(|raw| {
                let url = resolver.resolve_uri(raw).unwrap_or_else(|| raw.clone());
                DisplayItem::local(url)
            })
            .collect();
        Self {
            mode: cfg.mode,
            items,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Item shown in `slot` of ring `ring_index`. Rings rotate through the
    /// list so neighbouring rings do not show identical columns.
    pub fn item_for(&self, ring_index: i64, slot: usize) -> Option<&DisplayItem> {
        if self.items.is_empty() {
            return None;
        }
        let len = self.items.len() as i64;
        let shift = ring_index.rem_euclid(len) as usize;
        self.items.get((slot + shift) % self.items.len())
    }
}
