//! Map-layer rendering: per-index color ramps and true-color composites.
//!
//! Produces RGBA8 pixel buffers (row-major, `rows * cols * 4`) ready for a
//! map widget or image encoder. No-data pixels render transparent.

use crate::core::index::SpectralIndex;
use crate::core::scale::ScaledScene;
use crate::types::{ReflectanceBand, SpectraResult, SpectralBand};

/// Reflectance mapped to full brightness in the true-color composite
pub const TRUE_COLOR_MAX_REFLECTANCE: f32 = 0.3;

/// RGB color with channel values in 0..=255
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

/// A color stop: position in [0, 1] mapped to a color
#[derive(Debug, Clone, Copy)]
pub struct ColorStop {
    pub t: f32,
    pub color: Rgb,
}

impl ColorStop {
    pub const fn new(t: f32, r: u8, g: u8, b: u8) -> Self {
        Self {
            t,
            color: Rgb::new(r, g, b),
        }
    }
}

// brown, beige, yellow, lightgreen, green, darkgreen
const VEGETATION_STOPS: &[ColorStop] = &[
    ColorStop::new(0.0, 165, 42, 42),
    ColorStop::new(0.2, 245, 245, 220),
    ColorStop::new(0.4, 255, 255, 0),
    ColorStop::new(0.6, 144, 238, 144),
    ColorStop::new(0.8, 0, 128, 0),
    ColorStop::new(1.0, 0, 100, 0),
];

// darkred, orange, white, lightblue, blue, darkblue
const WATER_STOPS: &[ColorStop] = &[
    ColorStop::new(0.0, 139, 0, 0),
    ColorStop::new(0.2, 255, 165, 0),
    ColorStop::new(0.4, 255, 255, 255),
    ColorStop::new(0.6, 173, 216, 230),
    ColorStop::new(0.8, 0, 0, 255),
    ColorStop::new(1.0, 0, 0, 139),
];

// navy, blue, white, orange, red, maroon
const BUILTUP_STOPS: &[ColorStop] = &[
    ColorStop::new(0.0, 0, 0, 128),
    ColorStop::new(0.2, 0, 0, 255),
    ColorStop::new(0.4, 255, 255, 255),
    ColorStop::new(0.6, 255, 165, 0),
    ColorStop::new(0.8, 255, 0, 0),
    ColorStop::new(1.0, 128, 0, 0),
];

// purple, magenta, white, yellow, orange, red
const BURN_STOPS: &[ColorStop] = &[
    ColorStop::new(0.0, 128, 0, 128),
    ColorStop::new(0.2, 255, 0, 255),
    ColorStop::new(0.4, 255, 255, 255),
    ColorStop::new(0.6, 255, 255, 0),
    ColorStop::new(0.8, 255, 165, 0),
    ColorStop::new(1.0, 255, 0, 0),
];

/// The display ramp for an index
pub fn palette(index: SpectralIndex) -> &'static [ColorStop] {
    match index {
        SpectralIndex::Ndvi | SpectralIndex::Savi | SpectralIndex::Evi => VEGETATION_STOPS,
        SpectralIndex::Ndwi | SpectralIndex::Mndwi => WATER_STOPS,
        SpectralIndex::Ndbi => BUILTUP_STOPS,
        SpectralIndex::Nbr => BURN_STOPS,
    }
}

/// Interpolate a ramp at `t`; out-of-range values clamp to the endpoints.
/// An empty ramp has no color.
pub fn evaluate(stops: &[ColorStop], t: f32) -> Option<Rgb> {
    let mut prev = *stops.first()?;
    let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };
    if t <= prev.t {
        return Some(prev.color);
    }
    for &stop in &stops[1..] {
        if t <= stop.t {
            let span = stop.t - prev.t;
            if span <= f32::EPSILON {
                return Some(stop.color);
            }
            return Some(lerp(prev.color, stop.color, (t - prev.t) / span));
        }
        prev = stop;
    }
    Some(prev.color)
}

fn lerp(a: Rgb, b: Rgb, f: f32) -> Rgb {
    let mix = |x: u8, y: u8| (x as f32 + (y as f32 - x as f32) * f).round() as u8;
    Rgb::new(mix(a.r, b.r), mix(a.g, b.g), mix(a.b, b.b))
}

/// Value range and no-data color for index rendering
#[derive(Debug, Clone)]
pub struct RenderParams {
    /// Value mapped to the ramp start
    pub min: f32,
    /// Value mapped to the ramp end
    pub max: f32,
    /// RGBA for no-data pixels
    pub nodata_color: [u8; 4],
}

impl Default for RenderParams {
    /// The display window for normalized-difference indices
    fn default() -> Self {
        Self {
            min: -1.0,
            max: 1.0,
            nodata_color: [0, 0, 0, 0],
        }
    }
}

/// Render an index band with its ramp into an RGBA8 buffer
pub fn index_to_rgba(
    values: &ReflectanceBand,
    index: SpectralIndex,
    params: &RenderParams,
) -> Vec<u8> {
    let stops = palette(index);
    let range = params.max - params.min;
    let inv_range = if range.abs() > f32::EPSILON {
        1.0 / range
    } else {
        1.0
    };

    let mut rgba = Vec::with_capacity(values.len() * 4);
    for &v in values.iter() {
        let color = if v.is_nan() {
            None
        } else {
            evaluate(stops, (v - params.min) * inv_range)
        };
        match color {
            Some(Rgb { r, g, b }) => rgba.extend_from_slice(&[r, g, b, 255]),
            None => rgba.extend_from_slice(&params.nodata_color),
        }
    }
    rgba
}

/// Render the red/green/blue bands as a true-color RGBA8 composite,
/// stretched over reflectance 0..=0.3
pub fn true_color_rgba(scene: &ScaledScene) -> SpectraResult<Vec<u8>> {
    let red = scene.require_band(SpectralBand::Red)?;
    let green = scene.require_band(SpectralBand::Green)?;
    let blue = scene.require_band(SpectralBand::Blue)?;

    let mut rgba = Vec::with_capacity(red.len() * 4);
    for ((&r, &g), &b) in red.iter().zip(green.iter()).zip(blue.iter()) {
        if r.is_nan() || g.is_nan() || b.is_nan() {
            rgba.extend_from_slice(&[0, 0, 0, 0]);
        } else {
            rgba.extend_from_slice(&[stretch(r), stretch(g), stretch(b), 255]);
        }
    }
    Ok(rgba)
}

fn stretch(reflectance: f32) -> u8 {
    let t = (reflectance / TRUE_COLOR_MAX_REFLECTANCE).clamp(0.0, 1.0);
    (t * 255.0).round() as u8
}

/// Finite min/max of a value sequence, skipping no-data.
///
/// Returns `None` when nothing finite remains; useful for sizing a chart or
/// stretch window around actual data.
pub fn finite_range<T, I>(values: I) -> Option<(T, T)>
where
    T: num_traits::Float,
    I: IntoIterator<Item = T>,
{
    let mut range: Option<(T, T)> = None;
    for v in values {
        if !v.is_finite() {
            continue;
        }
        range = Some(match range {
            Some((lo, hi)) => (lo.min(v), hi.max(v)),
            None => (v, v),
        });
    }
    range
}
