// The visibility-and-shading kernel of a physically-based renderer: the
// tracer walks alpha-transparent occluders to compute transmission, and the
// bsdf module defines the scattering contract every surface model satisfies
// (plus the mix combinator). Intersection, texturing and scene loading are
// external collaborators reached through the traits in intersect and
// shading::input.

pub mod assembly;
pub mod bsdf;
pub mod intersect;
pub mod material;
pub mod math;
pub mod sampler;
pub mod shading;
pub mod spectrum;
pub mod tracer;
