/// Attachment format probing

use crate::error::{Error, Result};
use crate::renderer::{FormatFeatures, ImageTiling, Renderer, TextureFormat};
use crate::{engine_debug, engine_fail};

/// Depth formats, most precise first
pub const DEPTH_FORMAT_CANDIDATES: [TextureFormat; 5] = [
    TextureFormat::D32_SFLOAT_S8_UINT,
    TextureFormat::D32_SFLOAT,
    TextureFormat::D24_UNORM_S8_UINT,
    TextureFormat::D16_UNORM_S8_UINT,
    TextureFormat::D16_UNORM,
];

/// Depth formats that carry a stencil aspect, most precise first
pub const DEPTH_STENCIL_FORMAT_CANDIDATES: [TextureFormat; 3] = [
    TextureFormat::D32_SFLOAT_S8_UINT,
    TextureFormat::D24_UNORM_S8_UINT,
    TextureFormat::D16_UNORM_S8_UINT,
];

/// Return the first candidate whose `tiling` features include all of
/// `features`.
///
/// Candidates are tried in order, so the result only depends on the list and
/// on what the device reports.
pub fn find_supported_format(
    renderer: &dyn Renderer,
    candidates: &[TextureFormat],
    tiling: ImageTiling,
    features: FormatFeatures,
) -> Result<TextureFormat> {
    for &format in candidates {
        let supported = renderer.format_properties(format).features(tiling);
        if supported.contains(features) {
            engine_debug!("umbra::format", "Selected {:?} ({:?} tiling)", format, tiling);
            return Ok(format);
        }
    }
    Err(engine_fail!(
        "umbra::format",
        Error::FormatNotSupported(format!(
            "none of {:?} supports {:?} with {:?} tiling",
            candidates, features, tiling
        ))
    ))
}

/// Best depth attachment format with optimal tiling.
///
/// `stencil` restricts the search to formats with a stencil aspect, `sampled`
/// additionally requires the format to be readable in shaders.
pub fn find_depth_format(renderer: &dyn Renderer, stencil: bool, sampled: bool) -> Result<TextureFormat> {
    let candidates: &[TextureFormat] = if stencil {
        &DEPTH_STENCIL_FORMAT_CANDIDATES
    } else {
        &DEPTH_FORMAT_CANDIDATES
    };
    let mut features = FormatFeatures::DEPTH_STENCIL_ATTACHMENT;
    if sampled {
        features |= FormatFeatures::SAMPLED_IMAGE;
    }
    find_supported_format(renderer, candidates, ImageTiling::Optimal, features)
}

#[cfg(test)]
#[path = "format_tests.rs"]
mod tests;
