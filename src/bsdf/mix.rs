// A mix of two BSDFs, each with its own weight. Sampling picks one child
// stochastically (one-sample estimation between the two techniques);
// evaluation blends both children analytically. The two must imply the same
// density or multiple-importance-sampling combinations become biased.

use crate::assembly::Assembly;
use crate::bsdf::{Bsdf, BsdfSample, InputKind, InputMetadata, ScatteringMode, ValuesRef};
use crate::math::vector::Vec3;
use crate::sampler::SamplingContext;
use crate::shading::input::ScalarInput;
use crate::shading::point::ShadingPoint;
use crate::shading::{ShadingBasis, ShadingContext};
use crate::spectrum::Spectrum;

use once_cell::sync::OnceCell;
use simple_error::{bail, SimpleResult};

use std::sync::Arc;

const MODEL: &str = "bsdf_mix";

pub struct BsdfMix {
    name: String,
    bindings: [String; 2],
    weights: [Arc<dyn ScalarInput>; 2],
    // Resolved once during on_frame_begin, read-only afterwards.
    children: OnceCell<[Arc<dyn Bsdf>; 2]>,
}

struct MixValues<'a> {
    weights: [f64; 2],
    child_values: [ValuesRef<'a>; 2],
}

impl BsdfMix {
    pub fn new(
        name: &str,
        bsdf0: &str,
        bsdf1: &str,
        weight0: Arc<dyn ScalarInput>,
        weight1: Arc<dyn ScalarInput>,
    ) -> Self {
        BsdfMix {
            name: name.to_string(),
            bindings: [bsdf0.to_string(), bsdf1.to_string()],
            weights: [weight0, weight1],
            children: OnceCell::new(),
        }
    }

    fn children(&self) -> &[Arc<dyn Bsdf>; 2] {
        self.children
            .get()
            .expect("bsdf mix used before on_frame_begin")
    }

    fn retrieve_bsdf(
        &self,
        assembly: &Assembly,
        binding: &str,
        param_name: &str,
    ) -> SimpleResult<Arc<dyn Bsdf>> {
        if binding.is_empty() {
            bail!(
                "while preparing bsdf \"{}\": no bsdf bound to \"{}\"",
                self.name,
                param_name
            );
        }
        match assembly.bsdf_by_name(binding) {
            Some(bsdf) => Ok(bsdf.clone()),
            None => bail!(
                "while preparing bsdf \"{}\": cannot find bsdf \"{}\"",
                self.name,
                binding
            ),
        }
    }
}

impl Bsdf for BsdfMix {
    fn name(&self) -> &str {
        &self.name
    }

    fn model(&self) -> &'static str {
        MODEL
    }

    fn input_metadata(&self) -> Vec<InputMetadata> {
        vec![
            InputMetadata {
                name: "bsdf0",
                label: "BSDF 1",
                kind: InputKind::Entity,
                default: None,
            },
            InputMetadata {
                name: "weight0",
                label: "Weight 1",
                kind: InputKind::Colormap,
                default: Some("0.5"),
            },
            InputMetadata {
                name: "bsdf1",
                label: "BSDF 2",
                kind: InputKind::Entity,
                default: None,
            },
            InputMetadata {
                name: "weight1",
                label: "Weight 2",
                kind: InputKind::Colormap,
                default: Some("0.5"),
            },
        ]
    }

    fn on_frame_begin(&self, assembly: &Assembly) -> SimpleResult<()> {
        let bsdf0 = self.retrieve_bsdf(assembly, &self.bindings[0], "bsdf0")?;
        let bsdf1 = self.retrieve_bsdf(assembly, &self.bindings[1], "bsdf1")?;
        // A second frame begin keeps the first resolution; bindings are
        // immutable so the result cannot change.
        let _ = self.children.set([bsdf0, bsdf1]);
        Ok(())
    }

    fn evaluate_inputs<'a>(
        &self,
        context: &ShadingContext<'a>,
        shading_point: &ShadingPoint,
    ) -> ValuesRef<'a> {
        let children = self.children();
        let values = context.arena().alloc(MixValues {
            weights: [
                self.weights[0].evaluate(shading_point),
                self.weights[1].evaluate(shading_point),
            ],
            child_values: [
                children[0].evaluate_inputs(context, shading_point),
                children[1].evaluate_inputs(context, shading_point),
            ],
        });
        ValuesRef::new(values)
    }

    fn sample(
        &self,
        sampling_context: &mut SamplingContext,
        values: ValuesRef,
        adjoint: bool,
        _cosine_mult: bool,
        sample: &mut BsdfSample,
    ) {
        let children = self.children();
        let v = unsafe { values.downcast::<MixValues>() };

        // Retrieve blending weights.
        let w = v.weights;

        // Handle absorption.
        let total_weight = w[0] + w[1];
        if total_weight == 0.0 {
            return;
        }

        // Choose which of the two BSDFs to sample. The selection consumes
        // exactly one stream dimension.
        sampling_context.split_in_place(1, 1);
        let s = sampling_context.next_f64();
        let bsdf_index = if s * total_weight < w[0] { 0 } else { 1 };

        // Sample the chosen BSDF. The cosine factor is applied once by the
        // combination layer, not per child.
        children[bsdf_index].sample(
            sampling_context,
            v.child_values[bsdf_index],
            adjoint,
            false,
            sample,
        );
    }

    fn evaluate(
        &self,
        values: ValuesRef,
        adjoint: bool,
        _cosine_mult: bool,
        geometric_normal: Vec3<f64>,
        shading_basis: &ShadingBasis,
        outgoing: Vec3<f64>,
        incoming: Vec3<f64>,
        modes: ScatteringMode,
    ) -> (Spectrum, f64) {
        let children = self.children();
        let v = unsafe { values.downcast::<MixValues>() };

        // Retrieve blending weights.
        let mut w0 = v.weights[0];
        let mut w1 = v.weights[1];
        let total_weight = w0 + w1;

        // Handle absorption.
        if total_weight == 0.0 {
            return (Spectrum::black(), 0.0);
        }

        // Normalize the blending weights.
        let rcp_total_weight = 1.0 / total_weight;
        w0 *= rcp_total_weight;
        w1 *= rcp_total_weight;

        // Evaluate the first BSDF.
        let (bsdf0_value, bsdf0_prob) = if w0 > 0.0 {
            children[0].evaluate(
                v.child_values[0],
                adjoint,
                false,
                geometric_normal,
                shading_basis,
                outgoing,
                incoming,
                modes,
            )
        } else {
            (Spectrum::black(), 0.0)
        };

        // Evaluate the second BSDF.
        let (bsdf1_value, bsdf1_prob) = if w1 > 0.0 {
            children[1].evaluate(
                v.child_values[1],
                adjoint,
                false,
                geometric_normal,
                shading_basis,
                outgoing,
                incoming,
                modes,
            )
        } else {
            (Spectrum::black(), 0.0)
        };

        // Blend BSDF values.
        let mut value = Spectrum::black();
        if bsdf0_prob > 0.0 {
            value = value + bsdf0_value.scale(w0);
        }
        if bsdf1_prob > 0.0 {
            value = value + bsdf1_value.scale(w1);
        }

        // Blend PDF values. This is the density implied by the one-sample
        // selection performed in sample().
        (value, bsdf0_prob * w0 + bsdf1_prob * w1)
    }

    fn evaluate_pdf(
        &self,
        values: ValuesRef,
        geometric_normal: Vec3<f64>,
        shading_basis: &ShadingBasis,
        outgoing: Vec3<f64>,
        incoming: Vec3<f64>,
        modes: ScatteringMode,
    ) -> f64 {
        let children = self.children();
        let v = unsafe { values.downcast::<MixValues>() };

        // Retrieve blending weights.
        let mut w0 = v.weights[0];
        let mut w1 = v.weights[1];
        let total_weight = w0 + w1;

        // Handle absorption.
        if total_weight == 0.0 {
            return 0.0;
        }

        // Normalized exactly like evaluate() so the two paths agree to the
        // last bit for the same directions.
        let rcp_total_weight = 1.0 / total_weight;
        w0 *= rcp_total_weight;
        w1 *= rcp_total_weight;

        let bsdf0_prob = if w0 > 0.0 {
            children[0].evaluate_pdf(
                v.child_values[0],
                geometric_normal,
                shading_basis,
                outgoing,
                incoming,
                modes,
            )
        } else {
            0.0
        };

        let bsdf1_prob = if w1 > 0.0 {
            children[1].evaluate_pdf(
                v.child_values[1],
                geometric_normal,
                shading_basis,
                outgoing,
                incoming,
                modes,
            )
        } else {
            0.0
        };

        // Blend PDF values.
        bsdf0_prob * w0 + bsdf1_prob * w1
    }
}
