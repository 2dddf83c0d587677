// The tracer wraps the intersector and computes visibility from a point
// along a direction, or between two points, automatically walking through
// alpha-transparent occluders. It stops at the first fully opaque surface,
// when it leaves the scene, or when one of the termination bounds (iteration
// budget, transmission threshold) kicks in.

use crate::assembly::Assembly;
use crate::intersect::Intersector;
use crate::math::vector::Vec3;
use crate::shading::point::ShadingPoint;
use crate::shading::ray::{RayDepth, ShadingRay, VisibilityFlags};
use crate::shading::ShadingContext;
use crate::spectrum::{Alpha, Spectrum};

use log::warn;

/// Scales the distance to the target of a point-to-point trace so the
/// surface at the target itself never registers as an occluder.
const TARGET_EXCLUSION_EPS: f64 = 1.0e-6;

/// Tunes when the occluder walk gives up. These bound the walk only; they do
/// not change what counts as an occluder.
#[derive(Clone, Copy, Debug)]
pub struct TracerConfig {
    /// Accumulated transmission below this value is treated as full
    /// occlusion (an approximation, not an error).
    pub transmission_threshold: f64,
    /// Hard cap on occluder-walk steps; exceeding it treats the last hit as
    /// opaque rather than looping on.
    pub max_iterations: u32,
    /// Emit a one-time diagnostic when the iteration budget is exhausted.
    pub print_details: bool,
}

impl Default for TracerConfig {
    fn default() -> Self {
        TracerConfig {
            transmission_threshold: 0.001,
            max_iterations: 1000,
            print_details: true,
        }
    }
}

/// One tracer per rendering worker. The two shading-point slots are scratch
/// state reused across walk steps; the point returned by a trace call
/// borrows the tracer, so it cannot outlive the next call.
pub struct Tracer<'a> {
    intersector: &'a dyn Intersector,
    assume_no_alpha_mapping: bool,
    transmission_threshold: f64,
    max_iterations: u32,
    print_details: bool,
    slots: [ShadingPoint; 2],
    current: usize,
    iteration_budget_reported: bool,
}

impl<'a> Tracer<'a> {
    /// `assume_no_alpha_mapping` enables the probe-only transmission fast
    /// path. It is only legal when the caller can prove no alpha-mapped
    /// occluder is reachable under the visibility flags it traces with.
    pub fn new(
        intersector: &'a dyn Intersector,
        assume_no_alpha_mapping: bool,
        config: TracerConfig,
    ) -> Self {
        Tracer {
            intersector,
            assume_no_alpha_mapping,
            transmission_threshold: config.transmission_threshold,
            max_iterations: config.max_iterations,
            print_details: config.print_details,
            slots: [ShadingPoint::default(), ShadingPoint::default()],
            current: 0,
            iteration_budget_reported: false,
        }
    }

    /// Derives the fast-path flag from the assembly's materials.
    pub fn for_assembly(
        intersector: &'a dyn Intersector,
        assembly: &Assembly,
        config: TracerConfig,
    ) -> Self {
        Tracer::new(intersector, !assembly.uses_alpha_mapping(), config)
    }

    //
    // Directional tracing.
    //

    /// Computes the transmission in a given direction. Returns the
    /// intersection with the closest fully opaque occluder and the
    /// transmission factor up to (but excluding) it, or a miss if there is
    /// no fully opaque occluder in this direction.
    pub fn trace(
        &mut self,
        origin: Vec3<f64>,
        direction: Vec3<f64>,
        time: f64,
        flags: VisibilityFlags,
        depth: RayDepth,
    ) -> (&ShadingPoint, f64) {
        let transmission = self.do_trace(origin, direction, time, flags, depth, None);
        (&self.slots[self.current], transmission)
    }

    /// Same, starting from a surface: the origin is biased past `parent`
    /// along the direction, the time is inherited and the depth incremented.
    pub fn trace_from(
        &mut self,
        parent: &ShadingPoint,
        direction: Vec3<f64>,
        flags: VisibilityFlags,
    ) -> (&ShadingPoint, f64) {
        let origin = parent.biased_point(direction);
        let transmission = self.do_trace(
            origin,
            direction,
            parent.time(),
            flags,
            parent.depth() + 1,
            Some(parent),
        );
        (&self.slots[self.current], transmission)
    }

    /// Transmission only. When no alpha mapping is reachable this reduces to
    /// a boolean occlusion probe returning 0 or 1; otherwise it runs the
    /// full walk and returns 0 on a hit, the accumulated transmission on a
    /// miss.
    pub fn transmission(
        &mut self,
        origin: Vec3<f64>,
        direction: Vec3<f64>,
        time: f64,
        flags: VisibilityFlags,
        depth: RayDepth,
    ) -> f64 {
        if self.assume_no_alpha_mapping {
            debug_assert!(direction.is_normalized());
            let ray = ShadingRay::new(origin, direction, time, flags, depth);
            if self.intersector.trace_probe(&ray, None) {
                0.0
            } else {
                1.0
            }
        } else {
            let transmission = self.do_trace(origin, direction, time, flags, depth, None);
            if self.slots[self.current].is_hit() {
                0.0
            } else {
                transmission
            }
        }
    }

    pub fn transmission_from(
        &mut self,
        parent: &ShadingPoint,
        direction: Vec3<f64>,
        flags: VisibilityFlags,
    ) -> f64 {
        if self.assume_no_alpha_mapping {
            debug_assert!(direction.is_normalized());
            let ray = ShadingRay::new(
                parent.biased_point(direction),
                direction,
                parent.time(),
                flags,
                parent.depth() + 1,
            );
            if self.intersector.trace_probe(&ray, Some(parent)) {
                0.0
            } else {
                1.0
            }
        } else {
            let (shading_point, transmission) = self.trace_from(parent, direction, flags);
            if shading_point.is_hit() {
                0.0
            } else {
                transmission
            }
        }
    }

    //
    // Point-to-point tracing.
    //

    /// Computes the transmission over the open segment [origin, target).
    /// The surface at the target itself is excluded from occlusion.
    pub fn trace_between(
        &mut self,
        origin: Vec3<f64>,
        target: Vec3<f64>,
        time: f64,
        flags: VisibilityFlags,
        depth: RayDepth,
    ) -> (&ShadingPoint, f64) {
        let transmission = self.do_trace_between(origin, target, time, flags, depth, None);
        (&self.slots[self.current], transmission)
    }

    pub fn trace_between_from(
        &mut self,
        parent: &ShadingPoint,
        target: Vec3<f64>,
        flags: VisibilityFlags,
    ) -> (&ShadingPoint, f64) {
        let origin = parent.biased_point(target - parent.point());
        let transmission = self.do_trace_between(
            origin,
            target,
            parent.time(),
            flags,
            parent.depth() + 1,
            Some(parent),
        );
        (&self.slots[self.current], transmission)
    }

    pub fn transmission_between(
        &mut self,
        origin: Vec3<f64>,
        target: Vec3<f64>,
        time: f64,
        flags: VisibilityFlags,
        depth: RayDepth,
    ) -> f64 {
        if self.assume_no_alpha_mapping {
            let direction = target - origin;
            let dist = direction.length();
            let ray = ShadingRay::with_segment(
                origin,
                direction.scale(1.0 / dist),
                0.0,
                dist * (1.0 - TARGET_EXCLUSION_EPS),
                time,
                flags,
                depth,
            );
            if self.intersector.trace_probe(&ray, None) {
                0.0
            } else {
                1.0
            }
        } else {
            let transmission = self.do_trace_between(origin, target, time, flags, depth, None);
            if self.slots[self.current].is_hit() {
                0.0
            } else {
                transmission
            }
        }
    }

    pub fn transmission_between_from(
        &mut self,
        parent: &ShadingPoint,
        target: Vec3<f64>,
        flags: VisibilityFlags,
    ) -> f64 {
        if self.assume_no_alpha_mapping {
            let direction = target - parent.point();
            let dist = direction.length();
            let ray = ShadingRay::with_segment(
                parent.biased_point(direction),
                direction.scale(1.0 / dist),
                0.0,
                dist * (1.0 - TARGET_EXCLUSION_EPS),
                parent.time(),
                flags,
                parent.depth() + 1,
            );
            if self.intersector.trace_probe(&ray, Some(parent)) {
                0.0
            } else {
                1.0
            }
        } else {
            let (shading_point, transmission) = self.trace_between_from(parent, target, flags);
            if shading_point.is_hit() {
                0.0
            } else {
                transmission
            }
        }
    }

    //
    // Spectral tracing. These accumulate a full spectrum and take the
    // shading context and the parent ray, which leaves room for
    // participating media; without media the result degenerates to the
    // scalar transmission applied uniformly across the bins.
    //

    pub fn trace_spectral(
        &mut self,
        context: &ShadingContext,
        origin: Vec3<f64>,
        direction: Vec3<f64>,
        flags: VisibilityFlags,
        parent_ray: &ShadingRay,
    ) -> (&ShadingPoint, Spectrum) {
        let transmission = self.do_trace_spectral(context, origin, direction, flags, parent_ray, None);
        (&self.slots[self.current], transmission)
    }

    pub fn trace_spectral_from(
        &mut self,
        context: &ShadingContext,
        parent: &ShadingPoint,
        direction: Vec3<f64>,
        flags: VisibilityFlags,
        parent_ray: &ShadingRay,
    ) -> (&ShadingPoint, Spectrum) {
        let origin = parent.biased_point(direction);
        let transmission =
            self.do_trace_spectral(context, origin, direction, flags, parent_ray, Some(parent));
        (&self.slots[self.current], transmission)
    }

    pub fn trace_between_spectral(
        &mut self,
        context: &ShadingContext,
        origin: Vec3<f64>,
        target: Vec3<f64>,
        flags: VisibilityFlags,
        parent_ray: &ShadingRay,
    ) -> (&ShadingPoint, Spectrum) {
        let transmission =
            self.do_trace_between_spectral(context, origin, target, flags, parent_ray, None);
        (&self.slots[self.current], transmission)
    }

    pub fn trace_between_spectral_from(
        &mut self,
        context: &ShadingContext,
        parent: &ShadingPoint,
        target: Vec3<f64>,
        flags: VisibilityFlags,
        parent_ray: &ShadingRay,
    ) -> (&ShadingPoint, Spectrum) {
        let origin = parent.biased_point(target - parent.point());
        let transmission =
            self.do_trace_between_spectral(context, origin, target, flags, parent_ray, Some(parent));
        (&self.slots[self.current], transmission)
    }

    //
    // The walk primitives. Every public operation reduces to one of these.
    //

    fn do_trace(
        &mut self,
        origin: Vec3<f64>,
        direction: Vec3<f64>,
        time: f64,
        flags: VisibilityFlags,
        depth: RayDepth,
        parent: Option<&ShadingPoint>,
    ) -> f64 {
        let mut transmission = 1.0;
        let mut origin = origin;
        let mut first = true;
        let mut iterations = 0u32;

        self.slots[self.current] =
            ShadingPoint::miss(ShadingRay::new(origin, direction, time, flags, depth));

        loop {
            iterations += 1;
            if iterations > self.max_iterations {
                self.report_iteration_budget();
                break;
            }

            let ray = ShadingRay::new(origin, direction, time, flags, depth);
            let point = {
                let exclude = if first {
                    parent
                } else {
                    Some(&self.slots[self.current])
                };
                self.intersector.trace_full(&ray, exclude)
            };
            let next = self.current ^ 1;
            self.slots[next] = point;
            self.current = next;
            first = false;

            if !self.slots[self.current].is_hit() {
                break; // left the scene
            }

            let alpha = match occluder_alpha(&self.slots[self.current]) {
                Some(alpha) => alpha,
                None => break, // fully opaque occluder
            };

            transmission *= alpha.transmittance();
            if transmission < self.transmission_threshold {
                break; // negligible transmission left, treat as opaque
            }

            // Continue from just past the occluder along the same ray.
            origin = self.slots[self.current].biased_point(direction);
        }

        transmission
    }

    fn do_trace_between(
        &mut self,
        origin: Vec3<f64>,
        target: Vec3<f64>,
        time: f64,
        flags: VisibilityFlags,
        depth: RayDepth,
        parent: Option<&ShadingPoint>,
    ) -> f64 {
        let mut transmission = 1.0;
        let mut origin = origin;
        let mut first = true;
        let mut iterations = 0u32;

        self.slots[self.current] =
            ShadingPoint::miss(ShadingRay::new(origin, target - origin, time, flags, depth));

        loop {
            iterations += 1;
            if iterations > self.max_iterations {
                self.report_iteration_budget();
                break;
            }

            // Re-derive the segment each step; the origin moves toward the
            // target as occluders are crossed.
            let direction = target - origin;
            let dist = direction.length();
            if dist == 0.0 {
                break; // degenerate segment
            }
            let direction = direction.scale(1.0 / dist);

            let ray = ShadingRay::with_segment(
                origin,
                direction,
                0.0,
                dist * (1.0 - TARGET_EXCLUSION_EPS),
                time,
                flags,
                depth,
            );
            let point = {
                let exclude = if first {
                    parent
                } else {
                    Some(&self.slots[self.current])
                };
                self.intersector.trace_full(&ray, exclude)
            };
            let next = self.current ^ 1;
            self.slots[next] = point;
            self.current = next;
            first = false;

            if !self.slots[self.current].is_hit() {
                break; // reached the target
            }

            let alpha = match occluder_alpha(&self.slots[self.current]) {
                Some(alpha) => alpha,
                None => break,
            };

            transmission *= alpha.transmittance();
            if transmission < self.transmission_threshold {
                break;
            }

            origin = self.slots[self.current].biased_point(direction);
        }

        transmission
    }

    fn do_trace_spectral(
        &mut self,
        context: &ShadingContext,
        origin: Vec3<f64>,
        direction: Vec3<f64>,
        flags: VisibilityFlags,
        parent_ray: &ShadingRay,
        parent: Option<&ShadingPoint>,
    ) -> Spectrum {
        let time = parent_ray.time;
        let depth = parent_ray.depth + 1;

        let mut transmission = Spectrum::white();
        let mut origin = origin;
        let mut first = true;
        let mut iterations = 0u32;

        self.slots[self.current] =
            ShadingPoint::miss(ShadingRay::new(origin, direction, time, flags, depth));

        loop {
            iterations += 1;
            if iterations > self.max_iterations {
                self.report_iteration_budget();
                break;
            }

            let ray = ShadingRay::new(origin, direction, time, flags, depth);
            let point = {
                let exclude = if first {
                    parent
                } else {
                    Some(&self.slots[self.current])
                };
                self.intersector.trace_full(&ray, exclude)
            };
            let next = self.current ^ 1;
            self.slots[next] = point;
            self.current = next;
            first = false;

            if !self.slots[self.current].is_hit() {
                break;
            }

            let alpha = match occluder_alpha(&self.slots[self.current]) {
                Some(alpha) => alpha,
                None => break,
            };

            transmission = transmission * self.occluder_transmittance(context, alpha);
            if transmission.max_component() < self.transmission_threshold {
                break;
            }

            origin = self.slots[self.current].biased_point(direction);
        }

        transmission
    }

    fn do_trace_between_spectral(
        &mut self,
        context: &ShadingContext,
        origin: Vec3<f64>,
        target: Vec3<f64>,
        flags: VisibilityFlags,
        parent_ray: &ShadingRay,
        parent: Option<&ShadingPoint>,
    ) -> Spectrum {
        let time = parent_ray.time;
        let depth = parent_ray.depth + 1;

        let mut transmission = Spectrum::white();
        let mut origin = origin;
        let mut first = true;
        let mut iterations = 0u32;

        self.slots[self.current] =
            ShadingPoint::miss(ShadingRay::new(origin, target - origin, time, flags, depth));

        loop {
            iterations += 1;
            if iterations > self.max_iterations {
                self.report_iteration_budget();
                break;
            }

            let direction = target - origin;
            let dist = direction.length();
            if dist == 0.0 {
                break;
            }
            let direction = direction.scale(1.0 / dist);

            let ray = ShadingRay::with_segment(
                origin,
                direction,
                0.0,
                dist * (1.0 - TARGET_EXCLUSION_EPS),
                time,
                flags,
                depth,
            );
            let point = {
                let exclude = if first {
                    parent
                } else {
                    Some(&self.slots[self.current])
                };
                self.intersector.trace_full(&ray, exclude)
            };
            let next = self.current ^ 1;
            self.slots[next] = point;
            self.current = next;
            first = false;

            if !self.slots[self.current].is_hit() {
                break;
            }

            let alpha = match occluder_alpha(&self.slots[self.current]) {
                Some(alpha) => alpha,
                None => break,
            };

            transmission = transmission * self.occluder_transmittance(context, alpha);
            if transmission.max_component() < self.transmission_threshold {
                break;
            }

            origin = self.slots[self.current].biased_point(direction);
        }

        transmission
    }

    /// Per-wavelength transmission of the current occluder: the material's
    /// transmittance input when present, else the uniform `1 - alpha`.
    fn occluder_transmittance(&self, context: &ShadingContext, alpha: Alpha) -> Spectrum {
        let shading_point = &self.slots[self.current];
        match shading_point.material().and_then(|m| m.transmittance()) {
            Some(input) => input.evaluate(context, shading_point).clamp(0.0, 1.0),
            None => Spectrum::from_scalar(alpha.transmittance()),
        }
    }

    fn report_iteration_budget(&mut self) {
        if self.print_details && !self.iteration_budget_reported {
            self.iteration_budget_reported = true;
            warn!(
                "tracer: giving up after {} occluder iterations, treating the last hit as opaque.",
                self.max_iterations
            );
        }
    }
}

/// Alpha of the surface at a hit, or `None` when the surface is fully
/// opaque (no material, no alpha map, or alpha saturating at one). Network
/// output is clamped to [0, 1] by `Alpha::new`.
fn occluder_alpha(shading_point: &ShadingPoint) -> Option<Alpha> {
    let material = shading_point.material()?;
    let alpha = match material.alpha_map() {
        Some(map) => Alpha::new(map.evaluate(shading_point)),
        None => return None,
    };
    if alpha.is_opaque() {
        None
    } else {
        Some(alpha)
    }
}
