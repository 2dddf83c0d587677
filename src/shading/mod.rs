pub mod input;
pub mod point;
pub mod ray;

use crate::math::vector::Vec3;

use bumpalo::Bump;

// Used to convert to and from shading coordinate space:
#[derive(Clone, Copy, Debug)]
pub struct ShadingBasis {
    geometric_n: Vec3<f64>,
    n: Vec3<f64>,
    s: Vec3<f64>,
    t: Vec3<f64>,
}

impl ShadingBasis {
    pub fn new(geometric_n: Vec3<f64>, shading_n: Vec3<f64>, dpdu: Vec3<f64>) -> Self {
        let s = dpdu.normalize();
        ShadingBasis {
            geometric_n,
            n: shading_n,
            s,
            t: shading_n.cross(s),
        }
    }

    /// Builds a frame around a bare normal, picking an arbitrary tangent.
    pub fn from_normal(n: Vec3<f64>) -> Self {
        let a = if n.x.abs() > 0.9 {
            Vec3 {
                x: 0.,
                y: 1.,
                z: 0.,
            }
        } else {
            Vec3 {
                x: 1.,
                y: 0.,
                z: 0.,
            }
        };
        let s = n.cross(a).normalize();
        ShadingBasis {
            geometric_n: n,
            n,
            s,
            t: n.cross(s),
        }
    }

    pub fn normal(self) -> Vec3<f64> {
        self.n
    }

    pub fn geometric_normal(self) -> Vec3<f64> {
        self.geometric_n
    }

    pub fn world_to_shading(self, v: Vec3<f64>) -> Vec3<f64> {
        Vec3 {
            x: v.dot(self.s),
            y: v.dot(self.t),
            z: v.dot(self.n),
        }
    }

    pub fn shading_to_world(self, v: Vec3<f64>) -> Vec3<f64> {
        Vec3 {
            x: (self.s.x * v.x) + (self.t.x * v.y) + (self.n.x * v.z),
            y: (self.s.y * v.x) + (self.t.y * v.y) + (self.n.y * v.z),
            z: (self.s.z * v.x) + (self.t.z * v.y) + (self.n.z * v.z),
        }
    }
}

/// Per-evaluation state handed down the shading call chain. The arena backs
/// every Values blob resolved during one shading-point evaluation; the whole
/// allocation is released at once when the scope ends, nothing is freed
/// individually.
pub struct ShadingContext<'a> {
    arena: &'a Bump,
}

impl<'a> ShadingContext<'a> {
    pub fn new(arena: &'a Bump) -> Self {
        ShadingContext { arena }
    }

    pub fn arena(&self) -> &'a Bump {
        self.arena
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basis_round_trips_directions() {
        let basis = ShadingBasis::from_normal(
            Vec3 {
                x: 0.3,
                y: -0.2,
                z: 0.93,
            }
            .normalize(),
        );
        let v = Vec3 {
            x: 0.5,
            y: 0.7,
            z: -0.1,
        };
        let w = basis.shading_to_world(basis.world_to_shading(v));
        assert!((w - v).length() < 1e-12);
    }

    #[test]
    fn shading_space_normal_is_z() {
        let n = Vec3 {
            x: 1.0,
            y: 1.0,
            z: 1.0,
        }
        .normalize();
        let basis = ShadingBasis::from_normal(n);
        let local = basis.world_to_shading(n);
        assert!(local.x.abs() < 1e-12);
        assert!(local.y.abs() < 1e-12);
        assert!((local.z - 1.0).abs() < 1e-12);
    }
}
