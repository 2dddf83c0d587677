use crate::math::vector::Vec3;

use bitflags::bitflags;

bitflags! {
    /// Selects which category a ray belongs to. Occluders advertise the
    /// categories they are visible to; the intersector only reports hits
    /// whose visibility overlaps the ray's flags.
    pub struct VisibilityFlags: u32 {
        const CAMERA = 1 << 0;
        const LIGHT = 1 << 1;
        const SHADOW = 1 << 2;
        const TRANSPARENCY = 1 << 3;
        const PROBE = 1 << 4;
        const DIFFUSE = 1 << 5;
        const GLOSSY = 1 << 6;
        const SPECULAR = 1 << 7;
        const ALL = Self::CAMERA.bits |
            Self::LIGHT.bits | Self::SHADOW.bits |
            Self::TRANSPARENCY.bits | Self::PROBE.bits |
            Self::DIFFUSE.bits | Self::GLOSSY.bits |
            Self::SPECULAR.bits;
    }
}

/// Number of scattering/transmission bounces a path has taken so far.
pub type RayDepth = u16;

/// A ray traced against the scene.
#[derive(Clone, Copy, Debug)]
pub struct ShadingRay {
    /// The origin point of the ray.
    pub origin: Vec3<f64>,
    /// The direction vector of the ray.
    pub direction: Vec3<f64>,
    /// The parametric interval [tmin, tmax) the ray covers.
    pub tmin: f64,
    pub tmax: f64,
    /// The current time in the scene of the ray (for motion blur).
    pub time: f64,
    pub depth: RayDepth,
    pub flags: VisibilityFlags,
}

impl ShadingRay {
    /// Constructs a ray without a parametric restriction.
    pub fn new(
        origin: Vec3<f64>,
        direction: Vec3<f64>,
        time: f64,
        flags: VisibilityFlags,
        depth: RayDepth,
    ) -> Self {
        ShadingRay {
            origin,
            direction,
            tmin: 0.,
            tmax: f64::INFINITY,
            time,
            depth,
            flags,
        }
    }

    /// Constructs a ray restricted to [tmin, tmax).
    pub fn with_segment(
        origin: Vec3<f64>,
        direction: Vec3<f64>,
        tmin: f64,
        tmax: f64,
        time: f64,
        flags: VisibilityFlags,
        depth: RayDepth,
    ) -> Self {
        debug_assert!(tmin <= tmax);
        ShadingRay {
            origin,
            direction,
            tmin,
            tmax,
            time,
            depth,
            flags,
        }
    }

    /// Calculates a point along the ray given a parametric parameter.
    pub fn point_at(self, t: f64) -> Vec3<f64> {
        self.origin + self.direction.scale(t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point_at_walks_the_ray() {
        let ray = ShadingRay::new(
            Vec3 {
                x: 1.0,
                y: 0.0,
                z: 0.0,
            },
            Vec3 {
                x: 0.0,
                y: 1.0,
                z: 0.0,
            },
            0.0,
            VisibilityFlags::SHADOW,
            0,
        );
        let p = ray.point_at(2.5);
        assert!((p.y - 2.5).abs() < 1e-12);
        assert!((p.x - 1.0).abs() < 1e-12);
    }
}
