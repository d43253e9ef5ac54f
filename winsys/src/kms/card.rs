//! DRM device access and display pipeline selection.

use std::fs::{File, OpenOptions};
use std::os::fd::{AsFd, BorrowedFd};
use std::path::Path;

use drm::control::{Device as ControlDevice, Mode, ModeTypeFlags, ResourceHandles};
use drm::control::{connector, crtc, encoder};

use vkbench_core::{CoreError, CoreResult};

/// An open DRM card node.
#[derive(Debug)]
pub struct Card(File);

impl AsFd for Card {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.0.as_fd()
    }
}

impl drm::Device for Card {}
impl ControlDevice for Card {}

impl Card {
    pub fn open(path: &Path) -> std::io::Result<Self> {
        OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map(Card)
    }
}

pub(crate) fn drm_error(what: &str, e: std::io::Error) -> CoreError {
    CoreError::WindowSystem(format!("{what}: {e}"))
}

/// Preferred mode if there is one, otherwise the largest. The first of
/// equally large modes wins.
pub fn pick_mode<T>(
    modes: &[T],
    is_preferred: impl Fn(&T) -> bool,
    pixels: impl Fn(&T) -> u32,
) -> Option<&T> {
    modes.iter().find(|m| is_preferred(m)).or_else(|| {
        modes
            .iter()
            .rev()
            .max_by_key(|m| pixels(m))
            .filter(|m| pixels(m) > 0)
    })
}

/// The first CRTC, in resource order, that no connected connector drives and
/// that one of `encoder_crtcs` (the CRTCs each free encoder can feed) reaches.
pub fn choose_free_crtc(
    crtcs: &[crtc::Handle],
    busy_crtcs: &[crtc::Handle],
    encoder_crtcs: &[Vec<crtc::Handle>],
) -> Option<crtc::Handle> {
    crtcs.iter().copied().find(|crtc| {
        !busy_crtcs.contains(crtc) && encoder_crtcs.iter().any(|possible| possible.contains(crtc))
    })
}

/// Connector, CRTC and mode the benchmark drives, plus the CRTC state to put
/// back afterwards.
#[derive(Debug, Clone)]
pub struct DisplayPipe {
    pub connector: connector::Handle,
    pub crtc: crtc::Handle,
    pub mode: Mode,
    pub prev_crtc: Option<crtc::Info>,
}

impl DisplayPipe {
    pub fn select(card: &Card, resources: &ResourceHandles) -> CoreResult<Self> {
        let connectors = resources
            .connectors()
            .iter()
            .map(|&handle| card.get_connector(handle, true))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| drm_error("Failed to get drm connector", e))?;

        let connector = connectors
            .iter()
            .find(|c| c.state() == connector::State::Connected)
            .ok_or_else(|| {
                CoreError::WindowSystem("Failed to find a connected drm connector".to_string())
            })?;
        log::debug!("KMSWindowSystem: Using connector {:?}", connector.handle());

        let current_crtc = match connector.current_encoder() {
            Some(handle) => card
                .get_encoder(handle)
                .map_err(|e| drm_error("Failed to get drm encoder", e))?
                .crtc(),
            None => None,
        };
        let prev_crtc = match current_crtc {
            Some(handle) => Some(
                card.get_crtc(handle)
                    .map_err(|e| drm_error("Failed to get drm crtc", e))?,
            ),
            None => None,
        };

        let crtc = match current_crtc {
            Some(crtc) => {
                log::debug!("KMSWindowSystem: Using already attached crtc {:?}", crtc);
                crtc
            }
            None => {
                log::debug!(
                    "KMSWindowSystem: No crtc/encoder attached to connector, trying to attach"
                );
                Self::attach_crtc(card, resources, &connectors, connector)?
            }
        };

        let mode = *pick_mode(
            connector.modes(),
            |m| m.mode_type().contains(ModeTypeFlags::PREFERRED),
            |m| {
                let (w, h) = m.size();
                u32::from(w) * u32::from(h)
            },
        )
        .ok_or_else(|| CoreError::WindowSystem("Failed to find a drm mode".to_string()))?;
        let (width, height) = mode.size();
        log::debug!(
            "KMSWindowSystem: Using crtc mode {}x{}{}",
            width,
            height,
            if mode.mode_type().contains(ModeTypeFlags::PREFERRED) {
                " (preferred)"
            } else {
                ""
            }
        );

        Ok(Self {
            connector: connector.handle(),
            crtc,
            mode,
            prev_crtc,
        })
    }

    fn attach_crtc(
        card: &Card,
        resources: &ResourceHandles,
        connectors: &[connector::Info],
        connector: &connector::Info,
    ) -> CoreResult<crtc::Handle> {
        // Encoders and CRTCs already driving a connected output are off limits.
        let mut busy_encoders = Vec::new();
        let mut busy_crtcs = Vec::new();
        for other in connectors
            .iter()
            .filter(|c| c.state() == connector::State::Connected)
        {
            let Some(handle) = other.current_encoder() else {
                continue;
            };
            let encoder = card
                .get_encoder(handle)
                .map_err(|e| drm_error("Failed to get drm encoder", e))?;
            if let Some(crtc) = encoder.crtc() {
                busy_encoders.push(handle);
                busy_crtcs.push(crtc);
            }
        }

        let encoder_crtcs = connector
            .encoders()
            .iter()
            .filter(|handle| !busy_encoders.contains(handle))
            .map(|&handle| {
                card.get_encoder(handle)
                    .map(|info: encoder::Info| resources.filter_crtcs(info.possible_crtcs()))
            })
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| drm_error("Failed to get drm encoder", e))?;

        choose_free_crtc(resources.crtcs(), &busy_crtcs, &encoder_crtcs)
            .ok_or_else(|| CoreError::WindowSystem("Failed to get usable crtc".to_string()))
    }

    pub fn extent(&self) -> (u32, u32) {
        let (width, height) = self.mode.size();
        (u32::from(width), u32::from(height))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn crtc(raw: u32) -> crtc::Handle {
        drm::control::from_u32(raw).unwrap()
    }

    #[rstest]
    #[case::preferred(&[(false, 100), (true, 10), (false, 400)], Some(1))]
    #[case::largest(&[(false, 100), (false, 400), (false, 200)], Some(1))]
    #[case::first_largest(&[(false, 400), (false, 400)], Some(0))]
    #[case::empty(&[], None)]
    fn test_pick_mode(#[case] modes: &[(bool, u32)], #[case] expected: Option<usize>) {
        let picked = pick_mode(modes, |m| m.0, |m| m.1)
            .map(|m| modes.iter().position(|other| std::ptr::eq(other, m)).unwrap());
        assert_eq!(picked, expected);
    }

    #[test]
    fn test_choose_free_crtc() {
        let crtcs = [crtc(10), crtc(11), crtc(12)];

        let chosen = choose_free_crtc(&crtcs, &[crtc(10)], &[vec![crtc(10), crtc(12)]]);
        assert_eq!(chosen, Some(crtc(12)));

        let chosen = choose_free_crtc(&crtcs, &[], &[vec![crtc(12)], vec![crtc(11)]]);
        assert_eq!(chosen, Some(crtc(11)));

        assert_eq!(choose_free_crtc(&crtcs, &[crtc(11)], &[vec![crtc(11)]]), None);
        assert_eq!(choose_free_crtc(&crtcs, &[], &[]), None);
    }

    #[test]
    fn test_open_missing_card() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Card::open(&dir.path().join("card0")).is_err());
    }
}
