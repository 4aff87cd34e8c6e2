//! Source watching, rebuild, and module swap.
//!
//! The controller polls the chain source's modification time (no watcher
//! thread; one `stat` per frame is nothing). When it changes, the host
//! runs the reload sequence:
//!
//! 1. host pauses audio and uninstalls the audio graph;
//! 2. host snapshots chain state and drops the
//!    [`LoadedChain`](crate::LoadedChain);
//! 3. [`HotReload::reload`] compiles the project — on failure the old
//!    module stays live and the error is surfaced (editor bridge, overlay);
//! 4. on success the old module is unloaded, the new one loaded;
//! 5. host runs `setup`, restores the snapshot, reinstalls audio.
//!
//! Each successful build is copied to a numbered artifact before loading
//! so the dynamic loader never re-opens a path it has cached.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::SystemTime;

use crate::error::LiveError;
use crate::module::ChainModule;

/// Watches a chain project and swaps its compiled module on change.
pub struct HotReload {
    project_dir: PathBuf,
    source_path: PathBuf,
    artifact_dir: PathBuf,
    crate_name: String,
    module: Option<ChainModule>,
    last_mtime: Option<SystemTime>,
    build_number: u32,
    error: Option<String>,
}

impl HotReload {
    /// Creates a controller for the chain crate at `project_dir`.
    ///
    /// The directory must contain a `Cargo.toml` with a `[package]` name
    /// and a `src/lib.rs` (the watched source).
    pub fn new(project_dir: impl Into<PathBuf>) -> Result<Self, LiveError> {
        let project_dir = project_dir.into();
        let manifest_path = project_dir.join("Cargo.toml");
        let manifest =
            std::fs::read_to_string(&manifest_path).map_err(|source| LiveError::Io {
                path: manifest_path.clone(),
                source,
            })?;
        let crate_name = package_name(&manifest).ok_or_else(|| LiveError::InvalidProject {
            path: project_dir.clone(),
            message: "Cargo.toml has no [package] name".into(),
        })?;

        let source_path = project_dir.join("src/lib.rs");
        if !source_path.is_file() {
            return Err(LiveError::InvalidProject {
                path: project_dir,
                message: "no src/lib.rs to watch".into(),
            });
        }

        Ok(Self {
            artifact_dir: project_dir.join("target/vivid"),
            project_dir,
            source_path,
            crate_name,
            module: None,
            last_mtime: None,
            build_number: 0,
            error: None,
        })
    }

    /// The watched source file.
    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    /// The currently loaded module, if any.
    pub fn module(&self) -> Option<&ChainModule> {
        self.module.as_ref()
    }

    /// Returns `true` once a module is loaded.
    pub fn is_loaded(&self) -> bool {
        self.module.is_some()
    }

    /// The last compile/load error, if the previous reload failed.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Polls the source mtime. Returns `true` if a reload is needed.
    ///
    /// Never reloads by itself: the host must tear down audio and the
    /// running chain first.
    pub fn check_needs_reload(&mut self) -> bool {
        let mtime = match std::fs::metadata(&self.source_path).and_then(|m| m.modified()) {
            Ok(mtime) => mtime,
            Err(_) => return false,
        };
        match self.last_mtime {
            None => true,
            Some(seen) => mtime > seen,
        }
    }

    /// Forces the next [`check_needs_reload`](Self::check_needs_reload)
    /// to report `true`.
    pub fn force_reload(&mut self) {
        self.last_mtime = None;
    }

    /// Compiles the project and swaps the loaded module.
    ///
    /// On compile failure the previous module stays live and the error is
    /// kept for [`error`](Self::error). The caller must have dropped every
    /// chain created by the previous module.
    pub fn reload(&mut self) -> Result<(), LiveError> {
        let mtime = std::fs::metadata(&self.source_path)
            .and_then(|m| m.modified())
            .map_err(|source| LiveError::Io {
                path: self.source_path.clone(),
                source,
            })?;

        let artifact = match self.compile() {
            Ok(artifact) => artifact,
            Err(err) => {
                self.error = Some(err.to_string());
                // Source is consumed even on failure so a broken save
                // doesn't retrigger every frame; the next edit re-polls.
                self.last_mtime = Some(mtime);
                return Err(err);
            }
        };

        // Unload the previous module only after a successful build.
        self.module = None;

        let module = unsafe { ChainModule::load(&artifact) };
        match module {
            Ok(module) => {
                self.module = Some(module);
                self.last_mtime = Some(mtime);
                self.error = None;
                Ok(())
            }
            Err(err) => {
                self.error = Some(err.to_string());
                self.last_mtime = Some(mtime);
                Err(err)
            }
        }
    }

    fn compile(&mut self) -> Result<PathBuf, LiveError> {
        tracing::info!(project = %self.project_dir.display(), "compiling chain");
        let output = Command::new("cargo")
            .arg("build")
            .current_dir(&self.project_dir)
            .output()
            .map_err(|source| LiveError::Io {
                path: self.project_dir.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(LiveError::CompileFailed(
                String::from_utf8_lossy(&output.stderr).into_owned(),
            ));
        }

        let built = self.built_artifact_path();
        if !built.is_file() {
            return Err(LiveError::MissingArtifact(built));
        }

        // Copy to a numbered path so the loader sees a fresh file.
        std::fs::create_dir_all(&self.artifact_dir).map_err(|source| LiveError::Io {
            path: self.artifact_dir.clone(),
            source,
        })?;
        self.build_number += 1;
        let numbered = self.artifact_dir.join(format!(
            "chain_{}.{}",
            self.build_number,
            dylib_extension()
        ));
        std::fs::copy(&built, &numbered).map_err(|source| LiveError::Io {
            path: numbered.clone(),
            source,
        })?;
        Ok(numbered)
    }

    fn built_artifact_path(&self) -> PathBuf {
        let stem = self.crate_name.replace('-', "_");
        self.project_dir
            .join("target/debug")
            .join(format!("{}{}.{}", dylib_prefix(), stem, dylib_extension()))
    }
}

fn dylib_prefix() -> &'static str {
    if cfg!(target_os = "windows") { "" } else { "lib" }
}

fn dylib_extension() -> &'static str {
    if cfg!(target_os = "windows") {
        "dll"
    } else if cfg!(target_os = "macos") {
        "dylib"
    } else {
        "so"
    }
}

/// Pulls `[package] name` out of a manifest.
fn package_name(manifest: &str) -> Option<String> {
    let value: toml::Value = manifest.parse().ok()?;
    value
        .get("package")?
        .get("name")?
        .as_str()
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn stub_project(dir: &Path) {
        fs::create_dir_all(dir.join("src")).unwrap();
        fs::write(
            dir.join("Cargo.toml"),
            "[package]\nname = \"demo-chain\"\nversion = \"0.1.0\"\n\n[lib]\ncrate-type = [\"cdylib\"]\n",
        )
        .unwrap();
        fs::write(dir.join("src/lib.rs"), "// chain\n").unwrap();
    }

    #[test]
    fn detects_source_change_via_mtime() {
        let dir = TempDir::new().unwrap();
        stub_project(dir.path());
        let mut reload = HotReload::new(dir.path()).unwrap();

        // Fresh controller has never loaded: reload wanted.
        assert!(reload.check_needs_reload());

        // Simulate a completed load at the current mtime.
        reload.last_mtime = fs::metadata(reload.source_path())
            .and_then(|m| m.modified())
            .ok();
        assert!(!reload.check_needs_reload());

        // Touch the source with a strictly newer mtime.
        let later = SystemTime::now() + std::time::Duration::from_secs(2);
        let file = fs::File::options()
            .write(true)
            .open(reload.source_path())
            .unwrap();
        file.set_modified(later).unwrap();
        assert!(reload.check_needs_reload());

        reload.force_reload();
        assert!(reload.check_needs_reload());
    }

    #[test]
    fn rejects_directory_without_manifest() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            HotReload::new(dir.path()),
            Err(LiveError::Io { .. })
        ));
    }

    #[test]
    fn rejects_project_without_source() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("Cargo.toml"),
            "[package]\nname = \"x\"\nversion = \"0.1.0\"\n",
        )
        .unwrap();
        assert!(matches!(
            HotReload::new(dir.path()),
            Err(LiveError::InvalidProject { .. })
        ));
    }

    #[test]
    fn parses_package_name() {
        assert_eq!(
            package_name("[package]\nname = \"my-chain\"\n"),
            Some("my-chain".to_string())
        );
        assert_eq!(package_name("[workspace]\n"), None);
    }

    #[test]
    fn artifact_path_uses_underscored_crate_name() {
        let dir = TempDir::new().unwrap();
        stub_project(dir.path());
        let reload = HotReload::new(dir.path()).unwrap();
        let built = reload.built_artifact_path();
        let name = built.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.contains("demo_chain"), "got {name}");
    }
}
