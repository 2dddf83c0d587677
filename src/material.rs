use crate::shading::input::{ScalarInput, SpectrumInput};

use std::fmt;
use std::sync::Arc;

/// Default offset used to restart rays just past a surface.
pub const DEFAULT_RAY_BIAS: f64 = 1.0e-6;

/// A surface description as far as the visibility kernel is concerned: an
/// optional alpha map (no alpha map means the surface is fully opaque), an
/// optional spectral transmittance for the media-aware trace path, and the
/// ray bias used when continuing a ray past the surface.
pub struct Material {
    name: String,
    alpha_map: Option<Arc<dyn ScalarInput>>,
    transmittance: Option<Arc<dyn SpectrumInput>>,
    pub ray_bias: f64,
}

impl Material {
    /// A fully opaque material.
    pub fn opaque(name: &str) -> Self {
        Material {
            name: name.to_string(),
            alpha_map: None,
            transmittance: None,
            ray_bias: DEFAULT_RAY_BIAS,
        }
    }

    /// A material whose transparency is driven by a scalar alpha map.
    pub fn alpha_mapped(name: &str, alpha_map: Arc<dyn ScalarInput>) -> Self {
        Material {
            name: name.to_string(),
            alpha_map: Some(alpha_map),
            transmittance: None,
            ray_bias: DEFAULT_RAY_BIAS,
        }
    }

    /// Attaches a per-wavelength transmittance, used by the spectral trace
    /// path in place of the uniform `1 - alpha` response.
    pub fn with_transmittance(mut self, transmittance: Arc<dyn SpectrumInput>) -> Self {
        self.transmittance = Some(transmittance);
        self
    }

    pub fn with_ray_bias(mut self, ray_bias: f64) -> Self {
        self.ray_bias = ray_bias;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn alpha_map(&self) -> Option<&Arc<dyn ScalarInput>> {
        self.alpha_map.as_ref()
    }

    pub fn has_alpha_map(&self) -> bool {
        self.alpha_map.is_some()
    }

    pub fn transmittance(&self) -> Option<&Arc<dyn SpectrumInput>> {
        self.transmittance.as_ref()
    }
}

impl fmt::Debug for Material {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Material")
            .field("name", &self.name)
            .field("alpha_mapped", &self.alpha_map.is_some())
            .field("ray_bias", &self.ray_bias)
            .finish()
    }
}
