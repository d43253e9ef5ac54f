//! Vulkan color format names as accepted on the command line.

use ash::vk;

/// Color formats that can back a presentable or offscreen render target.
const KNOWN_FORMATS: &[vk::Format] = &[
    vk::Format::R4G4B4A4_UNORM_PACK16,
    vk::Format::B4G4R4A4_UNORM_PACK16,
    vk::Format::R5G6B5_UNORM_PACK16,
    vk::Format::B5G6R5_UNORM_PACK16,
    vk::Format::R5G5B5A1_UNORM_PACK16,
    vk::Format::B5G5R5A1_UNORM_PACK16,
    vk::Format::A1R5G5B5_UNORM_PACK16,
    vk::Format::R8G8B8A8_UNORM,
    vk::Format::R8G8B8A8_SNORM,
    vk::Format::R8G8B8A8_UINT,
    vk::Format::R8G8B8A8_SINT,
    vk::Format::R8G8B8A8_SRGB,
    vk::Format::B8G8R8A8_UNORM,
    vk::Format::B8G8R8A8_SNORM,
    vk::Format::B8G8R8A8_UINT,
    vk::Format::B8G8R8A8_SINT,
    vk::Format::B8G8R8A8_SRGB,
    vk::Format::A8B8G8R8_UNORM_PACK32,
    vk::Format::A8B8G8R8_SRGB_PACK32,
    vk::Format::A2R10G10B10_UNORM_PACK32,
    vk::Format::A2B10G10R10_UNORM_PACK32,
    vk::Format::R16G16B16A16_UNORM,
    vk::Format::R16G16B16A16_SFLOAT,
    vk::Format::R32G32B32A32_SFLOAT,
    vk::Format::B10G11R11_UFLOAT_PACK32,
];

/// The normalized lookup key: underscores removed, upper case.
fn normalize(name: &str) -> String {
    name.chars()
        .filter(|&c| c != '_')
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// The canonical name of `format`, e.g. `B8G8R8A8_SRGB`.
pub fn format_name(format: vk::Format) -> String {
    format!("{format:?}")
}

/// Parse a format name ignoring case and underscores.
///
/// `b8g8r8a8_srgb`, `B8G8R8A8SRGB` and `B8G8R8A8_SRGB` all name the same
/// format. Unknown names yield `None`.
pub fn parse_format(name: &str) -> Option<vk::Format> {
    let key = normalize(name);
    if key.is_empty() {
        return None;
    }
    KNOWN_FORMATS
        .iter()
        .copied()
        .find(|&format| normalize(&format_name(format)) == key)
}

/// Total number of color bits per pixel, used to rank surface formats.
pub fn format_bits(format: vk::Format) -> u32 {
    match format {
        vk::Format::R4G4B4A4_UNORM_PACK16
        | vk::Format::B4G4R4A4_UNORM_PACK16
        | vk::Format::R5G6B5_UNORM_PACK16
        | vk::Format::B5G6R5_UNORM_PACK16
        | vk::Format::R5G5B5A1_UNORM_PACK16
        | vk::Format::B5G5R5A1_UNORM_PACK16
        | vk::Format::A1R5G5B5_UNORM_PACK16 => 16,
        vk::Format::R16G16B16A16_UNORM | vk::Format::R16G16B16A16_SFLOAT => 64,
        vk::Format::R32G32B32A32_SFLOAT => 128,
        vk::Format::UNDEFINED => 0,
        _ => 32,
    }
}

pub fn is_srgb(format: vk::Format) -> bool {
    format_name(format).contains("SRGB")
}
