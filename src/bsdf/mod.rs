pub mod mix;

use crate::assembly::Assembly;
use crate::math::vector::Vec3;
use crate::sampler::SamplingContext;
use crate::shading::point::ShadingPoint;
use crate::shading::{ShadingBasis, ShadingContext};
use crate::spectrum::Spectrum;

use bitflags::bitflags;
use simple_error::SimpleResult;

use std::marker::PhantomData;

bitflags! {
    /// Scattering behaviors a model can exhibit. Evaluation is restricted
    /// to the modes the caller asks for.
    pub struct ScatteringMode: u32 {
        const DIFFUSE = 1 << 0;
        const GLOSSY = 1 << 1;
        const SPECULAR = 1 << 2;
        const ALL = Self::DIFFUSE.bits | Self::GLOSSY.bits | Self::SPECULAR.bits;
    }
}

/// Type-erased reference to a values blob living in the evaluation arena.
/// Composite models store these for their children; only the model that
/// allocated a blob knows its concrete type and reads it back.
#[derive(Clone, Copy)]
pub struct ValuesRef<'a> {
    ptr: *const (),
    _marker: PhantomData<&'a ()>,
}

impl<'a> ValuesRef<'a> {
    pub fn new<T>(values: &'a T) -> Self {
        ValuesRef {
            ptr: values as *const T as *const (),
            _marker: PhantomData,
        }
    }

    /// Reinterprets the blob as its concrete type.
    ///
    /// # Safety
    ///
    /// `T` must be the exact type this reference was created with, which is
    /// guaranteed when a model only downcasts blobs it allocated itself in
    /// `evaluate_inputs`.
    pub unsafe fn downcast<T>(self) -> &'a T {
        &*(self.ptr as *const T)
    }
}

/// One scattering-direction sample. The caller fills in the geometry of the
/// query; `sample` fills in the result. A sample whose mode is empty means
/// the model absorbed the path (no direction was produced).
#[derive(Clone, Copy, Debug)]
pub struct BsdfSample {
    pub geometric_normal: Vec3<f64>,
    pub shading_basis: ShadingBasis,
    pub outgoing: Vec3<f64>,

    pub incoming: Vec3<f64>,
    pub value: Spectrum,
    /// Probability density of `incoming` under the sampling technique that
    /// produced it, w.r.t. solid angle unless the model documents otherwise.
    /// Must agree with `evaluate_pdf` for the same pair of directions.
    pub probability: f64,
    pub mode: ScatteringMode,
}

impl BsdfSample {
    pub fn new(geometric_normal: Vec3<f64>, shading_basis: ShadingBasis, outgoing: Vec3<f64>) -> Self {
        BsdfSample {
            geometric_normal,
            shading_basis,
            outgoing,
            incoming: Vec3::zero(),
            value: Spectrum::black(),
            probability: 0.,
            mode: ScatteringMode::empty(),
        }
    }

    pub fn is_absorption(&self) -> bool {
        self.mode.is_empty()
    }
}

/// Declares one input of a model, for external tooling (property editors);
/// the kernel itself never reads this.
#[derive(Clone, Debug, PartialEq)]
pub struct InputMetadata {
    pub name: &'static str,
    pub label: &'static str,
    pub kind: InputKind,
    pub default: Option<&'static str>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum InputKind {
    /// A binding to another named entity.
    Entity,
    /// A scalar or texture-driven value.
    Colormap,
}

/// The contract every surface-scattering model satisfies. Entities are
/// created at scene setup, prepared once per frame, then shared read-only
/// across rendering workers; per-point state lives in arena-scoped Values
/// blobs, never in the entity itself.
///
/// A model that cannot scatter (wrong modes, zero weight) reports a value
/// and pdf of exactly zero. That is extinction, not an error.
pub trait Bsdf: Send + Sync {
    /// The entity's name, unique within its assembly.
    fn name(&self) -> &str;

    /// Identifies the scattering model implemented by this entity.
    fn model(&self) -> &'static str;

    /// Declarative list of the model's inputs.
    fn input_metadata(&self) -> Vec<InputMetadata> {
        Vec::new()
    }

    /// Prepares the entity for rendering. Composite models resolve their
    /// child bindings here; an unresolved binding is a configuration error
    /// that must exclude the entity from the frame.
    fn on_frame_begin(&self, _assembly: &Assembly) -> SimpleResult<()> {
        Ok(())
    }

    /// Resolves the model's inputs at `shading_point` into a Values blob
    /// allocated from the evaluation arena. Composite models recursively
    /// resolve their children and keep opaque references to the child blobs.
    fn evaluate_inputs<'a>(
        &self,
        context: &ShadingContext<'a>,
        shading_point: &ShadingPoint,
    ) -> ValuesRef<'a>;

    /// Draws one scattering direction according to the model's importance
    /// sampling. `adjoint` selects light- vs importance-transport
    /// reciprocity; `cosine_mult` asks the model to fold |cos(incoming,
    /// normal)| into the returned value. On absorption the sample is left
    /// untouched.
    fn sample(
        &self,
        sampling_context: &mut SamplingContext,
        values: ValuesRef,
        adjoint: bool,
        cosine_mult: bool,
        sample: &mut BsdfSample,
    );

    /// Computes the scattering value and pdf for an explicit pair of
    /// directions, restricted to `modes`.
    fn evaluate(
        &self,
        values: ValuesRef,
        adjoint: bool,
        cosine_mult: bool,
        geometric_normal: Vec3<f64>,
        shading_basis: &ShadingBasis,
        outgoing: Vec3<f64>,
        incoming: Vec3<f64>,
        modes: ScatteringMode,
    ) -> (Spectrum, f64);

    /// Computes only the sampling density for a pair of directions. Cheaper
    /// than `evaluate` when a competing technique just needs the pdf.
    fn evaluate_pdf(
        &self,
        values: ValuesRef,
        geometric_normal: Vec3<f64>,
        shading_basis: &ShadingBasis,
        outgoing: Vec3<f64>,
        incoming: Vec3<f64>,
        modes: ScatteringMode,
    ) -> f64;
}

#[cfg(test)]
pub(crate) mod testing {
    // Closed-form models used by the contract and combinator tests. They
    // live here so the mix tests can reuse them.

    use super::*;
    use crate::math::numbers::Float;
    use crate::math::vector::Vec2;

    pub fn cos_sample_hemisphere(u: Vec2<f64>) -> Vec3<f64> {
        let r = u.x.sqrt();
        let phi = f64::two() * f64::PI * u.y;
        Vec3 {
            x: r * phi.cos(),
            y: r * phi.sin(),
            z: (1.0 - u.x).max(0.0).sqrt(),
        }
    }

    /// A diffuse reflector with the classic cosine-weighted sampling, so
    /// every quantity has a closed form.
    pub struct TestLambertian {
        pub name: String,
        pub reflectance: Spectrum,
    }

    struct LambertianValues {
        reflectance: Spectrum,
    }

    impl Bsdf for TestLambertian {
        fn name(&self) -> &str {
            &self.name
        }

        fn model(&self) -> &'static str {
            "test_lambertian"
        }

        fn evaluate_inputs<'a>(
            &self,
            context: &ShadingContext<'a>,
            _shading_point: &ShadingPoint,
        ) -> ValuesRef<'a> {
            ValuesRef::new(context.arena().alloc(LambertianValues {
                reflectance: self.reflectance,
            }))
        }

        fn sample(
            &self,
            sampling_context: &mut SamplingContext,
            values: ValuesRef,
            _adjoint: bool,
            cosine_mult: bool,
            sample: &mut BsdfSample,
        ) {
            let v = unsafe { values.downcast::<LambertianValues>() };
            let wo = sample.shading_basis.world_to_shading(sample.outgoing);
            let u = sampling_context.next_vec2();
            let mut wi = cos_sample_hemisphere(u);
            if wo.z < 0.0 {
                wi.z = -wi.z;
            }
            let mut value = v.reflectance.scale(f64::INV_PI);
            if cosine_mult {
                value = value.scale(wi.z.abs());
            }
            sample.incoming = sample.shading_basis.shading_to_world(wi);
            sample.value = value;
            sample.probability = wi.z.abs() * f64::INV_PI;
            sample.mode = ScatteringMode::DIFFUSE;
        }

        fn evaluate(
            &self,
            values: ValuesRef,
            _adjoint: bool,
            cosine_mult: bool,
            _geometric_normal: Vec3<f64>,
            shading_basis: &ShadingBasis,
            outgoing: Vec3<f64>,
            incoming: Vec3<f64>,
            modes: ScatteringMode,
        ) -> (Spectrum, f64) {
            if !modes.contains(ScatteringMode::DIFFUSE) {
                return (Spectrum::black(), 0.0);
            }
            let v = unsafe { values.downcast::<LambertianValues>() };
            let wo = shading_basis.world_to_shading(outgoing);
            let wi = shading_basis.world_to_shading(incoming);
            if wo.z * wi.z <= 0.0 {
                return (Spectrum::black(), 0.0);
            }
            let mut value = v.reflectance.scale(f64::INV_PI);
            if cosine_mult {
                value = value.scale(wi.z.abs());
            }
            (value, wi.z.abs() * f64::INV_PI)
        }

        fn evaluate_pdf(
            &self,
            _values: ValuesRef,
            _geometric_normal: Vec3<f64>,
            shading_basis: &ShadingBasis,
            outgoing: Vec3<f64>,
            incoming: Vec3<f64>,
            modes: ScatteringMode,
        ) -> f64 {
            if !modes.contains(ScatteringMode::DIFFUSE) {
                return 0.0;
            }
            let wo = shading_basis.world_to_shading(outgoing);
            let wi = shading_basis.world_to_shading(incoming);
            if wo.z * wi.z <= 0.0 {
                return 0.0;
            }
            wi.z.abs() * f64::INV_PI
        }
    }

    /// A degenerate model returning fixed value/pdf for any direction pair;
    /// lets mixture arithmetic be checked exactly.
    pub struct TestConstant {
        pub name: String,
        pub value: Spectrum,
        pub pdf: f64,
        pub incoming: Vec3<f64>,
    }

    impl Bsdf for TestConstant {
        fn name(&self) -> &str {
            &self.name
        }

        fn model(&self) -> &'static str {
            "test_constant"
        }

        fn evaluate_inputs<'a>(
            &self,
            context: &ShadingContext<'a>,
            _shading_point: &ShadingPoint,
        ) -> ValuesRef<'a> {
            ValuesRef::new(context.arena().alloc(()))
        }

        fn sample(
            &self,
            _sampling_context: &mut SamplingContext,
            _values: ValuesRef,
            _adjoint: bool,
            _cosine_mult: bool,
            sample: &mut BsdfSample,
        ) {
            sample.incoming = self.incoming;
            sample.value = self.value;
            sample.probability = self.pdf;
            sample.mode = ScatteringMode::DIFFUSE;
        }

        fn evaluate(
            &self,
            _values: ValuesRef,
            _adjoint: bool,
            _cosine_mult: bool,
            _geometric_normal: Vec3<f64>,
            _shading_basis: &ShadingBasis,
            _outgoing: Vec3<f64>,
            _incoming: Vec3<f64>,
            _modes: ScatteringMode,
        ) -> (Spectrum, f64) {
            (self.value, self.pdf)
        }

        fn evaluate_pdf(
            &self,
            _values: ValuesRef,
            _geometric_normal: Vec3<f64>,
            _shading_basis: &ShadingBasis,
            _outgoing: Vec3<f64>,
            _incoming: Vec3<f64>,
            _modes: ScatteringMode,
        ) -> f64 {
            self.pdf
        }
    }
}
