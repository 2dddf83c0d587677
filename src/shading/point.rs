use crate::material::Material;
use crate::math::vector::Vec3;
use crate::shading::ray::{RayDepth, ShadingRay, VisibilityFlags};
use crate::shading::ShadingBasis;

use std::sync::Arc;

/// The result of intersecting a ray against the scene: either a miss or a
/// surface hit. The record owns the ray that produced it so callers can
/// derive continuation rays (time, depth) without keeping the original
/// around.
#[derive(Clone, Debug)]
pub struct ShadingPoint {
    ray: ShadingRay,
    hit: Option<SurfaceHit>,
}

#[derive(Clone, Debug)]
pub struct SurfaceHit {
    /// Parametric distance along the generating ray.
    pub distance: f64,
    /// World-space hit position.
    pub point: Vec3<f64>,
    pub geometric_normal: Vec3<f64>,
    pub shading_basis: ShadingBasis,
    /// Material bound to the hit surface, if any. A hit without a material
    /// is fully opaque as far as transmission is concerned.
    pub material: Option<Arc<Material>>,
    /// Identifies the intersected geometric entity.
    pub object_id: u32,
}

impl ShadingPoint {
    pub fn miss(ray: ShadingRay) -> Self {
        ShadingPoint { ray, hit: None }
    }

    pub fn surface(ray: ShadingRay, hit: SurfaceHit) -> Self {
        ShadingPoint {
            ray,
            hit: Some(hit),
        }
    }

    pub fn is_hit(&self) -> bool {
        self.hit.is_some()
    }

    pub fn ray(&self) -> &ShadingRay {
        &self.ray
    }

    pub fn time(&self) -> f64 {
        self.ray.time
    }

    pub fn depth(&self) -> RayDepth {
        self.ray.depth
    }

    pub fn flags(&self) -> VisibilityFlags {
        self.ray.flags
    }

    pub fn hit(&self) -> Option<&SurfaceHit> {
        self.hit.as_ref()
    }

    /// World-space hit position. Falls back to the ray origin on a miss.
    pub fn point(&self) -> Vec3<f64> {
        debug_assert!(self.is_hit());
        match &self.hit {
            Some(hit) => hit.point,
            None => self.ray.origin,
        }
    }

    pub fn material(&self) -> Option<&Arc<Material>> {
        self.hit.as_ref().and_then(|h| h.material.as_ref())
    }

    /// Offsets the hit point along `direction` by an epsilon scaled by the
    /// material's ray bias and the magnitude of the position, so a ray
    /// restarted from the returned point cannot immediately re-intersect
    /// the surface it left. Falls back to the ray origin on a miss.
    pub fn biased_point(&self, direction: Vec3<f64>) -> Vec3<f64> {
        debug_assert!(self.is_hit());
        match &self.hit {
            Some(hit) => hit.biased_point(direction),
            None => self.ray.origin,
        }
    }
}

impl Default for ShadingPoint {
    fn default() -> Self {
        ShadingPoint::miss(ShadingRay::new(
            Vec3::zero(),
            Vec3 {
                x: 0.,
                y: 0.,
                z: 1.,
            },
            0.,
            VisibilityFlags::empty(),
            0,
        ))
    }
}

impl SurfaceHit {
    pub fn biased_point(&self, direction: Vec3<f64>) -> Vec3<f64> {
        let bias = match &self.material {
            Some(material) => material.ray_bias,
            None => crate::material::DEFAULT_RAY_BIAS,
        };
        // Scale with the local coordinate magnitude so the offset survives
        // floating-point cancellation far from the origin.
        let scale = self.point.abs().max_element().max(1.0);
        self.point + direction.normalize().scale(bias * scale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::material::Material;

    fn hit_at(x: f64) -> ShadingPoint {
        let ray = ShadingRay::new(
            Vec3::zero(),
            Vec3 {
                x: 1.,
                y: 0.,
                z: 0.,
            },
            0.25,
            VisibilityFlags::SHADOW,
            3,
        );
        ShadingPoint::surface(
            ray,
            SurfaceHit {
                distance: x,
                point: Vec3 {
                    x,
                    y: 0.,
                    z: 0.,
                },
                geometric_normal: Vec3 {
                    x: -1.,
                    y: 0.,
                    z: 0.,
                },
                shading_basis: ShadingBasis::from_normal(Vec3 {
                    x: -1.,
                    y: 0.,
                    z: 0.,
                }),
                material: Some(Arc::new(Material::opaque("wall"))),
                object_id: 0,
            },
        )
    }

    #[test]
    fn biased_point_moves_past_the_surface() {
        let point = hit_at(5.0);
        let dir = Vec3 {
            x: 1.,
            y: 0.,
            z: 0.,
        };
        let biased = point.biased_point(dir);
        assert!(biased.x > 5.0);
        assert!(biased.x - 5.0 < 1e-3);
    }

    #[test]
    fn parent_ray_state_is_preserved() {
        let point = hit_at(2.0);
        assert_eq!(point.depth(), 3);
        assert!((point.time() - 0.25).abs() < 1e-12);
        assert!(point.is_hit());
    }
}
