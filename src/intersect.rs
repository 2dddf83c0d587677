// The ray/scene intersection engine is an external collaborator; this is the
// capability set the tracer programs against.

use crate::shading::point::ShadingPoint;
use crate::shading::ray::ShadingRay;

pub trait Intersector: Send + Sync {
    /// Boolean occlusion probe: whether anything blocks the ray inside its
    /// parametric interval. `parent` is the surface the ray leaves, excluded
    /// from self-intersection.
    fn trace_probe(&self, ray: &ShadingRay, parent: Option<&ShadingPoint>) -> bool;

    /// Full intersection: the closest hit inside the ray's parametric
    /// interval, or a miss record.
    fn trace_full(&self, ray: &ShadingRay, parent: Option<&ShadingPoint>) -> ShadingPoint;
}
