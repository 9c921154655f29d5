//! Core imagery processing modules

pub mod index;
pub mod mask;
pub mod pipeline;
pub mod render;
pub mod scale;
pub mod timeseries;

// Re-export main types
pub use index::{
    EviParams, IndexProcessor, IndexedScene, SaviParams, SpectralIndex, INDEX_BAND_NAME,
};
pub use mask::{CloudMask, CloudMaskProcessor, MaskStats};
pub use pipeline::{PreprocessParams, Preprocessor, ScaledSceneIter, DEFAULT_MAX_CLOUD_PERCENT};
pub use render::{index_to_rgba, palette, true_color_rgba, RenderParams};
pub use scale::{ReflectanceScaler, ScaledScene, REFLECTANCE_SCALE};
pub use timeseries::{IndexSample, MeanReducer, ReduceParams};
