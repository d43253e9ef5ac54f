//! Direct DRM/KMS output, with legacy or atomic modesetting.

mod atomic;
mod card;
mod scanout;
mod vt;
mod window_system;

use std::os::unix::fs::FileTypeExt;
use std::path::{Path, PathBuf};

use drm::Device as _;
use drm::control::Device as _;

use vkbench_core::{
    CoreError, CoreResult, Options, PROBE_BAD, PROBE_GOOD, PROBE_OK, WindowSystem,
    WindowSystemPlugin,
};

use card::Card;
pub use window_system::KmsWindowSystem;

const KMS_PRIORITY: i32 = 2;
const DRM_DEVICE_OPTION: &str = "kms-drm-device";
const ATOMIC_OPTION: &str = "kms-atomic";
const DRI_DIR: &str = "/dev/dri";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AtomicMode {
    #[default]
    Auto,
    Yes,
    No,
}

impl AtomicMode {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "auto" => Some(Self::Auto),
            "yes" => Some(Self::Yes),
            "no" => Some(Self::No),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KmsOptions {
    pub drm_device: Option<PathBuf>,
    pub atomic: AtomicMode,
}

/// Read the KMS window system options. Later values win; anything unknown is
/// logged and ignored.
pub fn parse_kms_options(options: &Options) -> KmsOptions {
    let mut kms = KmsOptions::default();
    for opt in &options.window_system_options {
        match opt.name.as_str() {
            DRM_DEVICE_OPTION => kms.drm_device = Some(PathBuf::from(&opt.value)),
            ATOMIC_OPTION => match AtomicMode::parse(&opt.value) {
                Some(mode) => kms.atomic = mode,
                None => log::info!(
                    "KMSWindowSystemPlugin: Ignoring unknown value '{}' for window system option '{}'",
                    opt.value,
                    opt.name
                ),
            },
            _ => log::info!(
                "KMSWindowSystemPlugin: Ignoring unknown window system option '{}'",
                opt.name
            ),
        }
    }
    kms
}

/// Card nodes under `dri_dir`, in name order.
pub fn card_nodes(dri_dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(dri_dir) else {
        return Vec::new();
    };
    let mut cards: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_ok_and(|t| t.is_char_device()))
        .filter(|entry| entry.file_name().to_string_lossy().starts_with("card"))
        .map(|entry| entry.path())
        .collect();
    cards.sort();
    cards
}

/// Whether the card can be driven: it opens, the master lock can be taken and
/// it reports modesetting resources.
fn is_usable(path: &Path) -> bool {
    let Ok(card) = Card::open(path) else {
        return false;
    };
    if card.acquire_master_lock().is_err() {
        return false;
    }
    let usable = card.resource_handles().is_ok();
    if let Err(e) = card.release_master_lock() {
        log::debug!("Failed to drop DRM master on {}: {}", path.display(), e);
    }
    usable
}

/// The first usable device and its score. A device named in the options
/// scores GOOD, one found by scanning scores OK.
fn probe_drm_devices(kms: &KmsOptions) -> Option<(PathBuf, i32)> {
    let (candidates, score) = match &kms.drm_device {
        Some(device) => (vec![device.clone()], PROBE_GOOD),
        None => (card_nodes(Path::new(DRI_DIR)), PROBE_OK),
    };
    candidates
        .into_iter()
        .find(|path| is_usable(path))
        .map(|path| (path, score))
}

fn probe(options: &Options) -> i32 {
    match probe_drm_devices(&parse_kms_options(options)) {
        Some((device, score)) => {
            log::debug!("KMS: found device {}", device.display());
            score + KMS_PRIORITY
        }
        None => PROBE_BAD,
    }
}

fn create(options: &Options) -> CoreResult<Box<dyn WindowSystem>> {
    let kms = parse_kms_options(options);
    let drm_device = match &kms.drm_device {
        Some(device) => device.clone(),
        None => probe_drm_devices(&kms)
            .map(|(device, _)| device)
            .ok_or_else(|| CoreError::WindowSystem("Failed to find a usable drm device".into()))?,
    };

    let atomic = match kms.atomic {
        AtomicMode::Yes => true,
        AtomicMode::No => false,
        AtomicMode::Auto => atomic::is_supported_on(&drm_device),
    };
    if atomic {
        log::debug!("KMSWindowSystemPlugin: Using atomic modesetting");
    } else {
        log::debug!("KMSWindowSystemPlugin: Using legacy modesetting");
    }

    Ok(Box::new(KmsWindowSystem::new(&drm_device, atomic)?))
}

pub const PLUGIN: WindowSystemPlugin = WindowSystemPlugin {
    name: "kms",
    load_options: |options| {
        options.add_window_system_help(
            "KMS window system options (pass in --winsys-options)\n  \
             kms-drm-device=DEV          The drm device to use (default: first usable /dev/dri/card*)\n  \
             kms-atomic=auto|yes|no      Whether to use atomic modesetting (default: auto)\n",
        )
    },
    probe,
    create,
};
