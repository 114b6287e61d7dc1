//! Reference-counted texture registry.
//!
//! The registry is the only owner of decoded texture data. Tiles acquire a
//! URL when they are built and release it when they are disposed; the first
//! acquire issues the load, later acquires share it, and the data is freed
//! only when the last reference is released.

use std::collections::HashMap;

use thiserror::Error;

use super::image::ImageData;

#[derive(Error, Debug)]
pub enum TextureError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Request failed: {0}")]
    Fetch(#[from] reqwest::Error),
    #[error("HTTP status {0}")]
    Status(u16),
    #[error("Decode failed: {0}")]
    Decode(#[from] image::ImageError),
    #[error("Malformed data URI: {0}")]
    DataUri(&'static str),
    #[error("Invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("Loader dropped the request")]
    Cancelled,
}

/// Background source of decoded images.
pub trait TextureLoader {
    /// Start loading `url`. Must not block.
    fn request(&mut self, url: &str);
    /// Drain finished loads. Called once per frame.
    fn poll(&mut self) -> Vec<(String, Result<ImageData, TextureError>)>;
}

#[derive(Debug)]
pub enum TextureState {
    Loading,
    Ready(ImageData),
    Failed(String),
}

/// Copyable view of a texture's state, for per-frame material decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureStatus {
    Loading,
    Ready,
    Failed,
    /// Not held by anyone
    Missing,
}

struct TextureEntry {
    state: TextureState,
    refs: usize,
}

pub struct TextureRegistry {
    entries: HashMap<String, TextureEntry>,
    loader: Box<dyn TextureLoader>,
    loads_issued: usize,
    /// URLs whose data was freed since the last `take_released`
    released: Vec<String>,
}

impl TextureRegistry {
    pub fn new(loader: Box<dyn TextureLoader>) -> Self {
        Self {
            entries: HashMap::new(),
            loader,
            loads_issued: 0,
            released: Vec::new(),
        }
    }

    /// Take a reference to `url`, issuing a load on first use.
    pub fn acquire(&mut self, url: &str) {
        if let Some(entry) = self.entries.get_mut(url) {
            entry.refs += 1;
            log::debug!("Texture HIT: {} (refs={})", url, entry.refs);
            return;
        }

        log::debug!("Texture MISS: {}", url);
        self.loader.request(url);
        self.loads_issued += 1;
        self.entries.insert(
            url.to_string(),
            TextureEntry {
                state: TextureState::Loading,
                refs: 1,
            },
        );
    }

    /// Drop one reference. Returns true when the texture was freed.
    pub fn release(&mut self, url: &str) -> bool {
        let Some(entry) = self.entries.get_mut(url) else {
            log::warn!("Release of unknown texture {}", url);
            return false;
        };
        entry.refs = entry.refs.saturating_sub(1);
        if entry.refs > 0 {
            return false;
        }
        self.entries.remove(url);
        self.released.push(url.to_string());
        log::debug!("Texture freed: {}", url);
        true
    }

    /// Apply finished loads. Results for URLs nobody holds any more are dropped.
    pub fn poll(&mut self) {
        for (url, result) in self.loader.poll() {
            let Some(entry) = self.entries.get_mut(&url) else {
                log::debug!("Dropping late texture for released {}", url);
                continue;
            };
            if !matches!(entry.state, TextureState::Loading) {
                continue;
            }
            entry.state = match result {
                Ok(data) => TextureState::Ready(data),
                Err(e) => {
                    log::warn!("Texture load failed for {}: {}", url, e);
                    TextureState::Failed(e.to_string())
                }
            };
        }
    }

    pub fn status(&self, url: &str) -> TextureStatus {
        match self.entries.get(url).map(|e| &e.state) {
            Some(TextureState::Loading) => TextureStatus::Loading,
            Some(TextureState::Ready(_)) => TextureStatus::Ready,
            Some(TextureState::Failed(_)) => TextureStatus::Failed,
            None => TextureStatus::Missing,
        }
    }

    pub fn image(&self, url: &str) -> Option<&ImageData> {
        match self.entries.get(url).map(|e| &e.state) {
            Some(TextureState::Ready(data)) => Some(data),
            _ => None,
        }
    }

    pub fn refs(&self, url: &str) -> usize {
        self.entries.get(url).map(|e| e.refs).unwrap_or(0)
    }

    /// Number of loads handed to the loader over the registry's lifetime.
    pub fn loads_issued(&self) -> usize {
        self.loads_issued
    }

    pub fn live_count(&self) -> usize {
        self.entries.len()
    }

    /// URLs freed since the last call, so GPU-side handles can be dropped.
    pub fn take_released(&mut self) -> Vec<String> {
        std::mem::take(&mut self.released)
    }

    /// Free everything regardless of reference counts (scene teardown).
    pub fn clear(&mut self) {
        let urls: Vec<String> = self.entries.drain().map(|(url, _)| url).collect();
        self.released.extend(urls);
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;

    /// Loader that records requests and completes them on demand.
    #[derive(Clone, Default)]
    pub struct ManualLoader {
        pub requests: Rc<RefCell<Vec<String>>>,
        pub ready: Rc<RefCell<Vec<(String, bool)>>>,
    }

    impl ManualLoader {
        pub fn complete(&self, url: &str, ok: bool) {
            self.ready.borrow_mut().push((url.to_string(), ok));
        }

        pub fn request_count(&self, url: &str) -> usize {
            self.requests.borrow().iter().filter(|u| *u == url).count()
        }
    }

    impl TextureLoader for ManualLoader {
        fn request(&mut self, url: &str) {
            self.requests.borrow_mut().push(url.to_string());
        }

        fn poll(&mut self) -> Vec<(String, Result<ImageData, TextureError>)> {
            self.ready
                .borrow_mut()
                .drain(..)
                .map(|(url, ok)| {
                    let result = if ok {
                        Ok(ImageData {
                            width: 1,
                            height: 1,
                            rgba: vec![255, 255, 255, 255],
                        })
                    } else {
                        Err(TextureError::Status(404))
                    };
                    (url, result)
                })
                .collect()
        }
    }

    pub fn registry() -> (TextureRegistry, ManualLoader) {
        let loader = ManualLoader::default();
        (TextureRegistry::new(Box::new(loader.clone())), loader)
    }
}
