//! Search-path asset resolution with optional caching.
//!
//! Assets (shaders, fonts, images) are addressed by path relative to a
//! list of search roots; the first root containing the path wins. Roots,
//! in priority order:
//!
//! 1. entries from `VIVID_ASSET_PATH` (highest priority, prepended);
//! 2. roots added by the host (project directory, addon install dirs);
//! 3. the executable's directory and its `assets/` subdirectory.
//!
//! Caching is on by default and cleared on hot-reload so edited assets
//! are picked up by the rebuilt chain.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};

/// Environment variable whose entries are prepended to the search roots.
pub const ASSET_PATH_ENV: &str = "VIVID_ASSET_PATH";

#[derive(Default)]
struct Inner {
    env_roots: Vec<PathBuf>,
    added_roots: Vec<PathBuf>,
    exe_roots: Vec<PathBuf>,
    cache_enabled: bool,
    text_cache: HashMap<String, String>,
    binary_cache: HashMap<String, Vec<u8>>,
}

impl Inner {
    fn roots(&self) -> impl Iterator<Item = &PathBuf> {
        self.env_roots
            .iter()
            .chain(self.added_roots.iter())
            .chain(self.exe_roots.iter())
    }
}

/// Process-wide asset resolver.
///
/// The usual entry point is [`AssetLoader::global`]; hosts add their
/// project roots at startup. [`AssetLoader::new`] builds an isolated
/// instance for tests and embedded use.
pub struct AssetLoader {
    inner: Mutex<Inner>,
}

impl AssetLoader {
    /// The process-wide loader, created on first use.
    pub fn global() -> &'static AssetLoader {
        static LOADER: OnceLock<AssetLoader> = OnceLock::new();
        LOADER.get_or_init(AssetLoader::detect)
    }

    /// Creates an empty loader with no search roots and caching enabled.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                cache_enabled: true,
                ..Inner::default()
            }),
        }
    }

    /// Creates a loader with platform-detected roots and `VIVID_ASSET_PATH`.
    pub fn detect() -> Self {
        let loader = Self::new();
        {
            let mut inner = loader.inner.lock().unwrap();
            if let Ok(value) = std::env::var(ASSET_PATH_ENV) {
                inner.env_roots = std::env::split_paths(&value).collect();
            }
            if let Ok(exe) = std::env::current_exe()
                && let Some(dir) = exe.parent()
            {
                inner.exe_roots.push(dir.to_path_buf());
                inner.exe_roots.push(dir.join("assets"));
            }
        }
        loader
    }

    /// Appends a search root (after env roots, before executable roots).
    pub fn add_search_path(&self, path: impl Into<PathBuf>) {
        let path = path.into();
        let mut inner = self.inner.lock().unwrap();
        if !inner.added_roots.contains(&path) {
            inner.added_roots.push(path);
        }
    }

    /// Resolves a relative asset path. First matching root wins.
    pub fn resolve(&self, path: impl AsRef<Path>) -> Option<PathBuf> {
        let path = path.as_ref();
        if path.is_absolute() {
            return path.is_file().then(|| path.to_path_buf());
        }
        let inner = self.inner.lock().unwrap();
        inner.roots().map(|root| root.join(path)).find(|p| p.is_file())
    }

    /// Returns `true` if the asset can be found.
    pub fn exists(&self, path: impl AsRef<Path>) -> bool {
        self.resolve(path).is_some()
    }

    /// Loads a text asset (shaders, configs). `None` if unresolvable.
    pub fn load_text(&self, path: &str) -> Option<String> {
        {
            let inner = self.inner.lock().unwrap();
            if inner.cache_enabled
                && let Some(cached) = inner.text_cache.get(path)
            {
                return Some(cached.clone());
            }
        }
        let resolved = self.resolve(path)?;
        match std::fs::read_to_string(&resolved) {
            Ok(text) => {
                let mut inner = self.inner.lock().unwrap();
                if inner.cache_enabled {
                    inner.text_cache.insert(path.to_string(), text.clone());
                }
                Some(text)
            }
            Err(err) => {
                tracing::warn!(path = %resolved.display(), %err, "asset read failed");
                None
            }
        }
    }

    /// Loads a binary asset (fonts, images). `None` if unresolvable.
    pub fn load_binary(&self, path: &str) -> Option<Vec<u8>> {
        {
            let inner = self.inner.lock().unwrap();
            if inner.cache_enabled
                && let Some(cached) = inner.binary_cache.get(path)
            {
                return Some(cached.clone());
            }
        }
        let resolved = self.resolve(path)?;
        match std::fs::read(&resolved) {
            Ok(bytes) => {
                let mut inner = self.inner.lock().unwrap();
                if inner.cache_enabled {
                    inner.binary_cache.insert(path.to_string(), bytes.clone());
                }
                Some(bytes)
            }
            Err(err) => {
                tracing::warn!(path = %resolved.display(), %err, "asset read failed");
                None
            }
        }
    }

    /// Loads a shader by file name, searching `shaders/`.
    pub fn load_shader(&self, name: &str) -> Option<String> {
        self.load_text(&format!("shaders/{name}"))
    }

    /// Enables or disables caching. Disabling also drops current entries.
    pub fn set_cache_enabled(&self, enabled: bool) {
        let mut inner = self.inner.lock().unwrap();
        inner.cache_enabled = enabled;
        if !enabled {
            inner.text_cache.clear();
            inner.binary_cache.clear();
        }
    }

    /// Drops all cached entries. Called on hot-reload.
    pub fn clear_cache(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.text_cache.clear();
        inner.binary_cache.clear();
    }
}

impl Default for AssetLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn first_matching_root_wins() {
        let a = TempDir::new().unwrap();
        let b = TempDir::new().unwrap();
        fs::write(a.path().join("thing.txt"), "from a").unwrap();
        fs::write(b.path().join("thing.txt"), "from b").unwrap();

        let loader = AssetLoader::new();
        loader.add_search_path(a.path());
        loader.add_search_path(b.path());

        assert_eq!(loader.load_text("thing.txt").unwrap(), "from a");
        assert_eq!(loader.resolve("thing.txt").unwrap(), a.path().join("thing.txt"));
    }

    #[test]
    fn missing_asset_resolves_to_none() {
        let dir = TempDir::new().unwrap();
        let loader = AssetLoader::new();
        loader.add_search_path(dir.path());
        assert!(loader.resolve("absent.wgsl").is_none());
        assert!(loader.load_text("absent.wgsl").is_none());
        assert!(!loader.exists("absent.wgsl"));
    }

    #[test]
    fn cache_serves_until_cleared() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("shader.wgsl");
        fs::write(&file, "v1").unwrap();

        let loader = AssetLoader::new();
        loader.add_search_path(dir.path());
        assert_eq!(loader.load_text("shader.wgsl").unwrap(), "v1");

        // The cache masks the edit until a hot-reload clears it.
        fs::write(&file, "v2").unwrap();
        assert_eq!(loader.load_text("shader.wgsl").unwrap(), "v1");
        loader.clear_cache();
        assert_eq!(loader.load_text("shader.wgsl").unwrap(), "v2");
    }

    #[test]
    fn shader_helper_searches_shader_dir() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("shaders")).unwrap();
        fs::write(dir.path().join("shaders/glow.wgsl"), "// glow").unwrap();

        let loader = AssetLoader::new();
        loader.add_search_path(dir.path());
        assert_eq!(loader.load_shader("glow.wgsl").unwrap(), "// glow");
    }

    #[test]
    fn binary_roundtrip() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("font.bin"), [0u8, 1, 2, 255]).unwrap();

        let loader = AssetLoader::new();
        loader.add_search_path(dir.path());
        assert_eq!(loader.load_binary("font.bin").unwrap(), vec![0, 1, 2, 255]);
    }
}
