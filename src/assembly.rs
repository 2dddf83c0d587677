// Name-indexed containers for the scene entities the kernel needs to reach:
// BSDFs (so composite models can resolve their child bindings) and materials
// (so the tracer can decide whether the alpha-free fast path is legal).

use crate::bsdf::Bsdf;
use crate::material::Material;

use simple_error::SimpleResult;

use std::collections::BTreeMap;
use std::sync::Arc;

// Entities are keyed by name in ordered maps so iteration (and therefore
// which entity's setup failure gets reported first) is deterministic.
pub struct Assembly {
    bsdfs: BTreeMap<String, Arc<dyn Bsdf>>,
    materials: BTreeMap<String, Arc<Material>>,
}

impl Assembly {
    pub fn new() -> Self {
        Assembly {
            bsdfs: BTreeMap::new(),
            materials: BTreeMap::new(),
        }
    }

    /// Registers a BSDF entity under its own name. Entities are shared
    /// read-only across workers once rendering starts.
    pub fn insert_bsdf(&mut self, bsdf: Arc<dyn Bsdf>) {
        self.bsdfs.insert(bsdf.name().to_string(), bsdf);
    }

    pub fn insert_material(&mut self, material: Arc<Material>) {
        self.materials.insert(material.name().to_string(), material);
    }

    pub fn bsdf_by_name(&self, name: &str) -> Option<&Arc<dyn Bsdf>> {
        self.bsdfs.get(name)
    }

    pub fn material_by_name(&self, name: &str) -> Option<&Arc<Material>> {
        self.materials.get(name)
    }

    /// Whether any registered material carries an alpha map. When this is
    /// false the tracer's probe-only transmission fast path is legal.
    pub fn uses_alpha_mapping(&self) -> bool {
        self.materials.values().any(|m| m.has_alpha_map())
    }

    /// Prepares every BSDF for rendering in name order, resolving composite
    /// bindings. Fails on the first entity whose setup fails; the caller
    /// must treat that as fatal for the frame rather than rendering with a
    /// partially prepared assembly.
    pub fn on_frame_begin(&self) -> SimpleResult<()> {
        for bsdf in self.bsdfs.values() {
            bsdf.on_frame_begin(self)?;
        }
        Ok(())
    }
}

impl Default for Assembly {
    fn default() -> Self {
        Assembly::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shading::input::ConstantScalar;

    #[test]
    fn alpha_mapping_is_detected() {
        let mut assembly = Assembly::new();
        assembly.insert_material(Arc::new(Material::opaque("wall")));
        assert!(!assembly.uses_alpha_mapping());

        assembly.insert_material(Arc::new(Material::alpha_mapped(
            "gauze",
            Arc::new(ConstantScalar(0.5)),
        )));
        assert!(assembly.uses_alpha_mapping());
    }
}
