//! Reference-counted texture cache
//!
//! One renderer texture per distinct host path, shared by every material
//! channel that samples it. The texture is released when the last user lets
//! go.

use std::collections::HashMap;

use crate::render::{RenderBridge, RenderResult, TextureHandle};

#[derive(Debug, Clone, Copy)]
struct CachedTexture {
    handle: TextureHandle,
    refcount: usize,
}

/// Textures keyed by host path
#[derive(Debug, Default)]
pub struct TextureCache {
    entries: HashMap<String, CachedTexture>,
}

impl TextureCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Take a reference to the texture at `path`, loading it on first use
    pub fn acquire(
        &mut self,
        renderer: &mut dyn RenderBridge,
        path: &str,
    ) -> RenderResult<TextureHandle> {
        if let Some(entry) = self.entries.get_mut(path) {
            entry.refcount += 1;
            return Ok(entry.handle);
        }

        let handle = renderer.request_texture(path)?;
        log::debug!("Loaded texture '{}' as {:?}", path, handle);
        self.entries
            .insert(path.to_string(), CachedTexture { handle, refcount: 1 });
        Ok(handle)
    }

    /// Drop one reference; the last one frees the texture
    pub fn release(&mut self, renderer: &mut dyn RenderBridge, path: &str) -> RenderResult<()> {
        let Some(entry) = self.entries.get_mut(path) else {
            crate::invariant_violation!("release of texture '{}' that was never acquired", path);
            return Ok(());
        };
        entry.refcount -= 1;
        if entry.refcount > 0 {
            return Ok(());
        }

        let handle = entry.handle;
        self.entries.remove(path);
        renderer.wait_for_gpu_idle();
        renderer.release_texture(handle)?;
        log::debug!("Released texture '{}'", path);
        Ok(())
    }

    /// Free every cached texture regardless of reference counts
    pub fn release_all(&mut self, renderer: &mut dyn RenderBridge) {
        if self.entries.is_empty() {
            return;
        }
        renderer.wait_for_gpu_idle();
        for (path, entry) in self.entries.drain() {
            if let Err(e) = renderer.release_texture(entry.handle) {
                log::warn!("Failed to release texture '{}': {}", path, e);
            }
        }
    }

    /// Current reference count of `path`
    pub fn refcount(&self, path: &str) -> usize {
        self.entries.get(path).map_or(0, |entry| entry.refcount)
    }

    /// Number of distinct textures held
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// No textures held
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::HeadlessRenderer;

    #[test]
    fn test_shared_path_loads_once() {
        let mut renderer = HeadlessRenderer::new();
        let mut cache = TextureCache::new();

        let a = cache.acquire(&mut renderer, "wood.png").unwrap();
        let b = cache.acquire(&mut renderer, "wood.png").unwrap();

        assert_eq!(a, b);
        assert_eq!(cache.refcount("wood.png"), 2);
        assert_eq!(renderer.texture_count(), 1);
    }

    #[test]
    fn test_last_release_frees_after_idle_wait() {
        let mut renderer = HeadlessRenderer::new();
        let mut cache = TextureCache::new();
        cache.acquire(&mut renderer, "wood.png").unwrap();
        cache.acquire(&mut renderer, "wood.png").unwrap();

        cache.release(&mut renderer, "wood.png").unwrap();
        assert_eq!(renderer.texture_count(), 1);

        cache.release(&mut renderer, "wood.png").unwrap();
        assert_eq!(renderer.texture_count(), 0);
        assert!(cache.is_empty());
        assert!(renderer.destroys_are_fenced());
    }

    #[test]
    fn test_failed_load_is_not_cached() {
        let mut renderer = HeadlessRenderer::new();
        renderer.fail_texture("missing.png");
        let mut cache = TextureCache::new();

        assert!(cache.acquire(&mut renderer, "missing.png").is_err());
        assert_eq!(cache.refcount("missing.png"), 0);
    }
}
