//! Image resolution for token metadata.
//!
//! The gallery treats resolution as a pure function: metadata in, display
//! URL out. `GatewayResolver` covers the common decentralised schemes.

use serde::Deserialize;
use url::Url;

/// Token metadata as served by the metadata layer (ERC-721 style JSON).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenMetadata {
    #[serde(default, alias = "tokenId", alias = "id")]
    pub token_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default, alias = "imageUrl")]
    pub image_url: Option<String>,
}

/// Turns metadata into a display-ready image URL.
pub trait ImageResolver {
    /// Resolve a single raw reference (ipfs://, ar://, http(s), data:, path).
    fn resolve_uri(&self, raw: &str) -> Option<String>;

    fn resolve(&self, meta: &TokenMetadata) -> Option<String> {
        [meta.image.as_deref(), meta.image_url.as_deref()]
            .into_iter()
            .flatten()
            .find_map(|raw| self.resolve_uri(raw))
    }
}

/// Rewrites `ipfs://` and `ar://` references through HTTP gateways.
#[derive(Debug, Clone)]
pub struct GatewayResolver {
    ipfs_gateway: Url,
    arweave_gateway: Url,
}

impl Default for GatewayResolver {
    fn default() -> Self {
        Self {
            ipfs_gateway: Url::parse("https://ipfs.io/").expect("static gateway url"),
            arweave_gateway: Url::parse("https://arweave.net/").expect("static gateway url"),
        }
    }
}

impl GatewayResolver {
    /// Use a custom IPFS gateway. Falls back to the default on a bad URL.
    pub fn with_ipfs_gateway(gateway: &str) -> Self {
        let mut resolver = Self::default();
        let normalized = if gateway.ends_with('/') {
            gateway.to_string()
        } else {
            format!("{}/", gateway)
        };
        match Url::parse(&normalized) {
            Ok(url) => resolver.ipfs_gateway = url,
            Err(e) => log::warn!("Invalid IPFS gateway {}: {}", gateway, e),
        }
        resolver
    }

    fn ipfs(&self, path: &str) -> Option<String> {
        let path = path.trim_start_matches('/');
        let path = path.strip_prefix("ipfs/").unwrap_or(path);
        if path.is_empty() {
            return None;
        }
        self.ipfs_gateway
            .join(&format!("ipfs/{}", path))
            .ok()
            .map(|u| u.to_string())
    }
}

fn looks_like_cid(s: &str) -> bool {
    (s.starts_with("Qm") && s.len() == 46) || (s.starts_with("bafy") && s.len() > 50)
}

impl ImageResolver for GatewayResolver {
    fn resolve_uri(&self, raw: &str) -> Option<String> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        if let Some(rest) = raw.strip_prefix("ipfs://") {
            return self.ipfs(rest);
        }
        if let Some(rest) = raw.strip_prefix("ar://") {
            return self.arweave_gateway.join(rest).ok().map(|u| u.to_string());
        }
        if raw.starts_with("data:") {
            return Some(raw.to_string());
        }
        if raw.starts_with("http://") || raw.starts_with("https://") {
            return Url::parse(raw).ok().map(|_| raw.to_string());
        }
        let head = raw.split('/').next().unwrap_or(raw);
        if looks_like_cid(head) {
            return self.ipfs(raw);
        }
        // Local path
        Some(raw.to_string())
    }
}
