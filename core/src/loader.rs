//! Window system discovery, probing and selection.
//!
//! Candidates are the compiled-in plugins, or, when a window system directory
//! is configured, the modules found in that directory. Each module file is
//! matched to a plugin by its stem (`xcb.so` and `libxcb.so` both name
//! `xcb`); a module with no matching plugin fails to load and scores zero.

use std::path::{Path, PathBuf};

use crate::error::{CoreError, CoreResult};
use crate::options::Options;
use crate::plugin::{PROBE_BAD, PluginRegistry, WindowSystemPlugin};
use crate::window_system::WindowSystem;

#[derive(Debug, Clone)]
struct Candidate {
    name: String,
    path: Option<PathBuf>,
    plugin: Option<WindowSystemPlugin>,
}

impl Candidate {
    fn location(&self) -> String {
        match &self.path {
            Some(path) => path.display().to_string(),
            None => self.name.clone(),
        }
    }
}

/// Plugin name a module file provides: the file name up to the first dot,
/// without a `lib` prefix.
pub fn module_name(path: &Path) -> Option<String> {
    let file_name = path.file_name()?.to_str()?;
    let stem = file_name.split('.').next()?;
    let stem = stem.strip_prefix("lib").unwrap_or(stem);
    (!stem.is_empty()).then(|| stem.to_string())
}

fn modules_in_dir(dir: &Path) -> Vec<PathBuf> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            log::debug!("Cannot read window system directory '{}': {}", dir.display(), e);
            return Vec::new();
        }
    };

    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .collect();
    files.sort();
    files
}

/// Picks and owns the window system for the run.
pub struct WindowSystemLoader {
    candidates: Vec<Candidate>,
    window_system: Option<Box<dyn WindowSystem>>,
    selected: Option<String>,
}

impl WindowSystemLoader {
    pub fn new(registry: &PluginRegistry, options: &Options) -> Self {
        let candidates = match &options.window_system_dir {
            Some(dir) => modules_in_dir(dir)
                .into_iter()
                .filter_map(|path| {
                    let name = module_name(&path)?;
                    Some(Candidate {
                        plugin: registry.find(&name).copied(),
                        name,
                        path: Some(path),
                    })
                })
                .collect(),
            None => registry
                .plugins()
                .iter()
                .map(|plugin| Candidate {
                    name: plugin.name.to_string(),
                    path: None,
                    plugin: Some(*plugin),
                })
                .collect(),
        };

        Self {
            candidates,
            window_system: None,
            selected: None,
        }
    }

    /// Names of the candidate window systems, in probing order.
    pub fn candidate_names(&self) -> impl Iterator<Item = &str> {
        self.candidates.iter().map(|c| c.name.as_str())
    }

    /// Let every loadable candidate register its option help.
    pub fn load_window_system_options(&self, options: &mut Options) {
        for plugin in self.candidates.iter().filter_map(|c| c.plugin.as_ref()) {
            (plugin.load_options)(options);
        }
    }

    /// The window system chosen for this run, created on first call.
    pub fn load_window_system(&mut self, options: &Options) -> CoreResult<&mut dyn WindowSystem> {
        if self.window_system.is_none() {
            let plugin = match &options.window_system {
                Some(name) => self.forced(name)?,
                None => self.probe_for_best_window_system(options)?,
            };
            log::debug!("Using window system {}", plugin.name);
            self.window_system = Some((plugin.create)(options)?);
            self.selected = Some(plugin.name.to_string());
        }

        match self.window_system.as_deref_mut() {
            Some(ws) => Ok(ws),
            None => Err(CoreError::NoUsableWindowSystem),
        }
    }

    /// Name of the loaded window system.
    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn window_system_mut(&mut self) -> Option<&mut dyn WindowSystem> {
        match self.window_system.as_deref_mut() {
            Some(ws) => Some(ws),
            None => None,
        }
    }

    fn forced(&self, name: &str) -> CoreResult<WindowSystemPlugin> {
        self.candidates
            .iter()
            .find(|c| c.name == name)
            .and_then(|c| c.plugin)
            .ok_or_else(|| CoreError::WindowSystemNotFound(name.to_string()))
    }

    fn probe_for_best_window_system(&self, options: &Options) -> CoreResult<WindowSystemPlugin> {
        let mut best: Option<(WindowSystemPlugin, i32)> = None;

        for candidate in &self.candidates {
            let score = match &candidate.plugin {
                Some(plugin) => (plugin.probe)(options),
                None => {
                    log::debug!(
                        "Failed to load window system module '{}'",
                        candidate.location()
                    );
                    PROBE_BAD
                }
            };
            log::debug!("Probing window system {}... score {}", candidate.name, score);

            if let Some(plugin) = candidate.plugin
                && score > best.map_or(PROBE_BAD, |(_, best_score)| best_score)
            {
                best = Some((plugin, score));
            }
        }

        best.map(|(plugin, _)| plugin)
            .ok_or(CoreError::NoUsableWindowSystem)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::{PROBE_GOOD, PROBE_OK};
    use rstest::rstest;

    #[rstest]
    #[case::plain("xcb.so", Some("xcb"))]
    #[case::lib_prefix("libwayland.so", Some("wayland"))]
    #[case::versioned("kms.so.1", Some("kms"))]
    #[case::no_extension("headless", Some("headless"))]
    #[case::hidden(".so", None)]
    fn test_module_name(#[case] file: &str, #[case] expected: Option<&str>) {
        assert_eq!(module_name(Path::new(file)).as_deref(), expected);
    }

    fn unusable(_: &Options) -> CoreResult<Box<dyn WindowSystem>> {
        Err(CoreError::WindowSystem("not in unit tests".into()))
    }

    fn plugin(name: &'static str, probe: fn(&Options) -> i32) -> WindowSystemPlugin {
        WindowSystemPlugin {
            name,
            load_options: |options| options.add_window_system_help("help\n"),
            probe,
            create: unusable,
        }
    }

    fn registry() -> PluginRegistry {
        PluginRegistry::new(vec![
            plugin("ok", |_| PROBE_OK),
            plugin("good", |_| PROBE_GOOD),
            plugin("bad", |_| PROBE_BAD),
        ])
    }

    fn options() -> Options {
        Options {
            window_system_dir: None,
            ..Options::default()
        }
    }

    #[test]
    fn test_best_score_wins() {
        let loader = WindowSystemLoader::new(&registry(), &options());
        let best = loader.probe_for_best_window_system(&options()).unwrap();
        assert_eq!(best.name, "good");
    }

    #[test]
    fn test_first_of_equal_scores_wins() {
        let registry = PluginRegistry::new(vec![
            plugin("first", |_| PROBE_OK),
            plugin("second", |_| PROBE_OK),
        ]);
        let loader = WindowSystemLoader::new(&registry, &options());
        let best = loader.probe_for_best_window_system(&options()).unwrap();
        assert_eq!(best.name, "first");
    }

    #[test]
    fn test_all_bad_is_error() {
        let registry = PluginRegistry::new(vec![plugin("bad", |_| PROBE_BAD)]);
        let loader = WindowSystemLoader::new(&registry, &options());
        assert!(matches!(
            loader.probe_for_best_window_system(&options()),
            Err(CoreError::NoUsableWindowSystem)
        ));
    }

    #[test]
    fn test_forced_unknown_is_error() {
        let mut loader = WindowSystemLoader::new(&registry(), &options());
        let options = Options {
            window_system: Some("missing".into()),
            ..options()
        };
        let err = loader.load_window_system(&options).err().unwrap();
        assert_eq!(err.to_string(), "Failed to load window system 'missing'");
    }

    #[test]
    fn test_load_options_from_every_candidate() {
        let loader = WindowSystemLoader::new(&registry(), &options());
        let mut options = options();
        loader.load_window_system_options(&mut options);
        assert_eq!(options.window_system_help.len(), 3);
    }

    #[test]
    fn test_directory_candidates() {
        let dir = tempfile::tempdir().unwrap();
        for file in ["ok.so", "libgood.so", "stranger.so"] {
            std::fs::write(dir.path().join(file), b"").unwrap();
        }
        std::fs::create_dir(dir.path().join("bad.d")).unwrap();

        let options = Options {
            window_system_dir: Some(dir.path().to_path_buf()),
            ..options()
        };
        let loader = WindowSystemLoader::new(&registry(), &options);

        let names: Vec<_> = loader.candidate_names().collect();
        assert_eq!(names, ["good", "ok", "stranger"]);

        let best = loader.probe_for_best_window_system(&options).unwrap();
        assert_eq!(best.name, "good");

        let mut with_help = options.clone();
        loader.load_window_system_options(&mut with_help);
        assert_eq!(with_help.window_system_help.len(), 2);
    }

    #[test]
    fn test_empty_directory_has_no_usable_window_system() {
        let dir = tempfile::tempdir().unwrap();
        let options = Options {
            window_system_dir: Some(dir.path().to_path_buf()),
            ..options()
        };
        let loader = WindowSystemLoader::new(&registry(), &options);
        assert_eq!(loader.candidate_names().count(), 0);
        assert!(loader.probe_for_best_window_system(&options).is_err());
    }
}
