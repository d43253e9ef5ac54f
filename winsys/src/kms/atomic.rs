//! Atomic modesetting: one commit per presented frame.

use std::collections::HashMap;
use std::path::Path;

use drm::{ClientCapability, Device};
use drm::control::{
    AtomicCommitFlags, Device as ControlDevice, Mode, PlaneType, ResourceHandles, atomic,
    connector, crtc, framebuffer, plane, property,
};

use vkbench_core::{CoreError, CoreResult};

use super::card::{Card, DisplayPipe, drm_error};

/// The plane to use among `(plane, drives_crtc, is_primary)` entries: the
/// first primary one, otherwise the last one able to drive the CRTC.
pub fn prefer_primary<T: Copy>(planes: &[(T, bool, bool)]) -> Option<T> {
    let mut chosen = None;
    for &(plane, drives_crtc, is_primary) in planes {
        if drives_crtc {
            chosen = Some(plane);
            if is_primary {
                break;
            }
        }
    }
    chosen
}

/// Whether the card accepts atomic commits.
pub fn is_supported_on(path: &Path) -> bool {
    Card::open(path).is_ok_and(|card| enable_atomic(&card).is_ok())
}

fn enable_atomic(card: &Card) -> CoreResult<()> {
    card.set_client_capability(ClientCapability::UniversalPlanes, true)
        .and_then(|_| card.set_client_capability(ClientCapability::Atomic, true))
        .map_err(|_| CoreError::WindowSystem("Atomic not supported".to_string()))
}

fn is_primary_plane(card: &Card, handle: plane::Handle) -> CoreResult<bool> {
    let props = card
        .get_properties(handle)
        .map_err(|e| drm_error("Failed to get plane properties", e))?;
    for (&id, &value) in props.iter() {
        let info = card
            .get_property(id)
            .map_err(|e| drm_error("Failed to get plane property", e))?;
        if info.name().to_str() == Ok("type") {
            return Ok(value == PlaneType::Primary as u64);
        }
    }
    Ok(false)
}

fn plane_for_crtc(
    card: &Card,
    resources: &ResourceHandles,
    crtc: crtc::Handle,
) -> CoreResult<plane::Handle> {
    let handles = card
        .plane_handles()
        .map_err(|e| drm_error("Failed to get plane resources", e))?;

    let mut planes = Vec::with_capacity(handles.len());
    for handle in handles {
        let info = card
            .get_plane(handle)
            .map_err(|e| drm_error("Failed to get plane", e))?;
        let drives_crtc = resources.filter_crtcs(info.possible_crtcs()).contains(&crtc);
        let is_primary = drives_crtc && is_primary_plane(card, handle)?;
        planes.push((handle, drives_crtc, is_primary));
    }

    let plane = prefer_primary(&planes);
    log::debug!("AtomicKMSWindowSystem: Using plane {:?}", plane);
    plane.ok_or_else(|| CoreError::WindowSystem("Failed to find a plane for the crtc".to_string()))
}

fn property_handles<H: drm::control::ResourceHandle>(
    card: &Card,
    handle: H,
) -> CoreResult<HashMap<String, property::Handle>> {
    let props = card
        .get_properties(handle)
        .map_err(|e| drm_error("Failed to get object properties", e))?;
    let infos = props
        .as_hashmap(card)
        .map_err(|e| drm_error("Failed to get object properties", e))?;
    Ok(infos
        .into_iter()
        .map(|(name, info)| (name, info.handle()))
        .collect())
}

fn lookup(props: &HashMap<String, property::Handle>, name: &str) -> CoreResult<property::Handle> {
    props
        .get(name)
        .copied()
        .ok_or_else(|| CoreError::WindowSystem(format!("Missing DRM property '{name}'")))
}

#[derive(Debug, Clone, Copy)]
struct PlaneProps {
    fb_id: property::Handle,
    crtc_id: property::Handle,
    src_x: property::Handle,
    src_y: property::Handle,
    src_w: property::Handle,
    src_h: property::Handle,
    crtc_x: property::Handle,
    crtc_y: property::Handle,
    crtc_w: property::Handle,
    crtc_h: property::Handle,
}

/// Property ids an atomic commit writes.
#[derive(Debug, Clone, Copy)]
struct PropertyIds {
    plane: PlaneProps,
    crtc_mode_id: property::Handle,
    crtc_active: property::Handle,
    connector_crtc_id: property::Handle,
}

impl PropertyIds {
    fn resolve(
        card: &Card,
        crtc: crtc::Handle,
        connector: connector::Handle,
        plane: plane::Handle,
    ) -> CoreResult<Self> {
        let plane_props = property_handles(card, plane)?;
        let crtc_props = property_handles(card, crtc)?;
        let connector_props = property_handles(card, connector)?;

        Ok(Self {
            plane: PlaneProps {
                fb_id: lookup(&plane_props, "FB_ID")?,
                crtc_id: lookup(&plane_props, "CRTC_ID")?,
                src_x: lookup(&plane_props, "SRC_X")?,
                src_y: lookup(&plane_props, "SRC_Y")?,
                src_w: lookup(&plane_props, "SRC_W")?,
                src_h: lookup(&plane_props, "SRC_H")?,
                crtc_x: lookup(&plane_props, "CRTC_X")?,
                crtc_y: lookup(&plane_props, "CRTC_Y")?,
                crtc_w: lookup(&plane_props, "CRTC_W")?,
                crtc_h: lookup(&plane_props, "CRTC_H")?,
            },
            crtc_mode_id: lookup(&crtc_props, "MODE_ID")?,
            crtc_active: lookup(&crtc_props, "ACTIVE")?,
            connector_crtc_id: lookup(&connector_props, "CRTC_ID")?,
        })
    }
}

/// Plane and property ids for committing to one display pipe.
#[derive(Debug)]
pub struct AtomicFlip {
    plane: plane::Handle,
    props: PropertyIds,
}

impl AtomicFlip {
    pub fn new(card: &Card, resources: &ResourceHandles, pipe: &DisplayPipe) -> CoreResult<Self> {
        enable_atomic(card)?;
        let plane = plane_for_crtc(card, resources, pipe.crtc)?;
        let props = PropertyIds::resolve(card, pipe.crtc, pipe.connector, plane)?;
        Ok(Self { plane, props })
    }

    /// Show `fb` on the next vblank, setting the mode first when `modeset`.
    pub fn commit(
        &self,
        card: &Card,
        pipe: &DisplayPipe,
        fb: framebuffer::Handle,
        modeset: bool,
    ) -> CoreResult<()> {
        let mut req = atomic::AtomicModeReq::new();
        let mut flags = AtomicCommitFlags::NONBLOCK | AtomicCommitFlags::PAGE_FLIP_EVENT;

        let mode_blob = if modeset {
            let blob = card
                .create_property_blob(&pipe.mode)
                .map_err(|e| drm_error("Failed to create mode blob", e))?;
            let blob_id = match blob {
                property::Value::Blob(id) => Some(id),
                _ => None,
            };
            req.add_property(
                pipe.connector,
                self.props.connector_crtc_id,
                property::Value::CRTC(Some(pipe.crtc)),
            );
            req.add_property(pipe.crtc, self.props.crtc_mode_id, blob);
            req.add_property(
                pipe.crtc,
                self.props.crtc_active,
                property::Value::Boolean(true),
            );
            flags |= AtomicCommitFlags::ALLOW_MODESET;
            blob_id
        } else {
            None
        };

        self.add_plane_properties(&mut req, pipe, fb);
        let result = card
            .atomic_commit(flags, req)
            .map_err(|e| drm_error("Failed to perform atomic commit", e));

        if let Some(id) = mode_blob
            && let Err(e) = card.destroy_property_blob(id)
        {
            log::warn!("Failed to destroy mode blob: {}", e);
        }
        result
    }

    fn add_plane_properties(
        &self,
        req: &mut atomic::AtomicModeReq,
        pipe: &DisplayPipe,
        fb: framebuffer::Handle,
    ) {
        let props = &self.props.plane;
        let (width, height) = mode_size(&pipe.mode);
        let values = [
            (props.fb_id, property::Value::Framebuffer(Some(fb))),
            (props.crtc_id, property::Value::CRTC(Some(pipe.crtc))),
            (props.src_x, property::Value::UnsignedRange(0)),
            (props.src_y, property::Value::UnsignedRange(0)),
            // Source coordinates are 16.16 fixed point.
            (props.src_w, property::Value::UnsignedRange(width << 16)),
            (props.src_h, property::Value::UnsignedRange(height << 16)),
            (props.crtc_x, property::Value::SignedRange(0)),
            (props.crtc_y, property::Value::SignedRange(0)),
            (props.crtc_w, property::Value::UnsignedRange(width)),
            (props.crtc_h, property::Value::UnsignedRange(height)),
        ];
        for (prop, value) in values {
            req.add_property(self.plane, prop, value);
        }
    }
}

fn mode_size(mode: &Mode) -> (u64, u64) {
    let (width, height) = mode.size();
    (u64::from(width), u64::from(height))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::primary_wins(&[(1, true, false), (2, true, true), (3, true, false)], Some(2))]
    #[case::last_capable(&[(1, true, false), (2, false, false), (3, true, false)], Some(3))]
    #[case::primary_elsewhere(&[(1, false, true), (2, true, false)], Some(2))]
    #[case::none(&[(1, false, false)], None)]
    fn test_prefer_primary(#[case] planes: &[(u32, bool, bool)], #[case] expected: Option<u32>) {
        assert_eq!(prefer_primary(planes), expected);
    }

    #[test]
    fn test_missing_card_has_no_atomic() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!is_supported_on(&dir.path().join("card0")));
    }
}
