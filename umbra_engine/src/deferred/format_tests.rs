//! Unit tests for depth format selection

use crate::deferred::{
    find_depth_format, find_supported_format, DEPTH_FORMAT_CANDIDATES, DEPTH_STENCIL_FORMAT_CANDIDATES,
};
use crate::error::Error;
use crate::renderer::mock_renderer::MockRenderer;
use crate::renderer::{FormatFeatures, FormatProperties, ImageTiling, TextureFormat};

fn unsupported() -> FormatProperties {
    FormatProperties::default()
}

fn attachment_only() -> FormatProperties {
    FormatProperties {
        linear: FormatFeatures::empty(),
        optimal: FormatFeatures::DEPTH_STENCIL_ATTACHMENT,
    }
}

#[test]
fn test_most_precise_supported_format_wins() {
    let mock = MockRenderer::new();
    let format = find_supported_format(
        &mock,
        &DEPTH_FORMAT_CANDIDATES,
        ImageTiling::Optimal,
        FormatFeatures::DEPTH_STENCIL_ATTACHMENT,
    )
    .unwrap();
    assert_eq!(format, TextureFormat::D32_SFLOAT_S8_UINT);
}

#[test]
fn test_skips_formats_missing_features() {
    let mock = MockRenderer::new();
    mock.set_format_properties(TextureFormat::D32_SFLOAT_S8_UINT, unsupported());
    mock.set_format_properties(TextureFormat::D32_SFLOAT, attachment_only());

    // D32_SFLOAT lacks SAMPLED_IMAGE, so the next candidate is taken
    let format = find_depth_format(&mock, false, true).unwrap();
    assert_eq!(format, TextureFormat::D24_UNORM_S8_UINT);

    // Without the sampling requirement D32_SFLOAT qualifies
    let format = find_depth_format(&mock, false, false).unwrap();
    assert_eq!(format, TextureFormat::D32_SFLOAT);
}

#[test]
fn test_selection_is_deterministic_and_order_sensitive() {
    let mock = MockRenderer::new();
    let required = FormatFeatures::DEPTH_STENCIL_ATTACHMENT;

    let first = find_supported_format(&mock, &DEPTH_FORMAT_CANDIDATES, ImageTiling::Optimal, required).unwrap();
    let again = find_supported_format(&mock, &DEPTH_FORMAT_CANDIDATES, ImageTiling::Optimal, required).unwrap();
    assert_eq!(first, again);

    let reversed: Vec<TextureFormat> = DEPTH_FORMAT_CANDIDATES.iter().rev().copied().collect();
    let format = find_supported_format(&mock, &reversed, ImageTiling::Optimal, required).unwrap();
    assert_eq!(format, TextureFormat::D16_UNORM);
}

#[test]
fn test_tiling_is_respected() {
    let mock = MockRenderer::new();
    // Mock formats report no linear-tiling features at all
    let result = find_supported_format(
        &mock,
        &DEPTH_FORMAT_CANDIDATES,
        ImageTiling::Linear,
        FormatFeatures::DEPTH_STENCIL_ATTACHMENT,
    );
    assert!(matches!(result, Err(Error::FormatNotSupported(_))));
}

#[test]
fn test_stencil_search_ignores_depth_only_formats() {
    let mock = MockRenderer::new();
    for format in DEPTH_STENCIL_FORMAT_CANDIDATES {
        mock.set_format_properties(format, unsupported());
    }

    // D32_SFLOAT and D16_UNORM are still supported but carry no stencil
    let result = find_depth_format(&mock, true, true);
    assert!(matches!(result, Err(Error::FormatNotSupported(_))));
    assert!(find_depth_format(&mock, false, true).is_ok());
}

#[test]
fn test_default_properties_support_nothing() {
    let properties = FormatProperties::default();
    assert!(properties.features(ImageTiling::Linear).is_empty());
    assert!(properties.features(ImageTiling::Optimal).is_empty());
}
