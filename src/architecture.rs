//! The fixed classifier architecture: EfficientNet-B0 with a two-way head
//!
//! The graph mirrors torchvision's `efficientnet_b0` layer for layer so that
//! converted weights reproduce the trained network's outputs: every
//! convolution pads `(k - 1) / 2` on both sides, batch norm uses eps 1e-5,
//! and parameter names follow the torchvision layout (`features.*`,
//! `classifier.1.*`).
//!
//! Parameters live in a `VarMap` so a freshly built network starts from
//! random initialisation and can then be overwritten in place from a
//! checkpoint.

use candle_core::{DType, Device, Module, Result, Tensor, Var, D};
use candle_nn::{BatchNorm, Conv2d, Conv2dConfig, Linear, VarBuilder, VarMap};
use std::collections::BTreeMap;

/// Architecture tag accepted in checkpoint metadata
pub const ARCHITECTURE: &str = "efficientnet_b0";

/// Output width of the classifier head
pub const NUM_CLASSES: usize = 2;

/// `nn.BatchNorm2d` default
const BATCH_NORM_EPS: f64 = 1e-5;

const STEM_CHANNELS: usize = 32;
const HEAD_CHANNELS: usize = 1280;

/// One stage of inverted-residual blocks
#[derive(Debug, Clone, Copy)]
struct Stage {
    expand_ratio: usize,
    kernel: usize,
    stride: usize,
    input_channels: usize,
    out_channels: usize,
    num_layers: usize,
}

impl Stage {
    const fn new(
        expand_ratio: usize,
        kernel: usize,
        stride: usize,
        input_channels: usize,
        out_channels: usize,
        num_layers: usize,
    ) -> Self {
        Self {
            expand_ratio,
            kernel,
            stride,
            input_channels,
            out_channels,
            num_layers,
        }
    }
}

/// B0 has width and depth multipliers of 1.0, so no channel rounding applies
const B0_STAGES: [Stage; 7] = [
    Stage::new(1, 3, 1, 32, 16, 1),
    Stage::new(6, 3, 2, 16, 24, 2),
    Stage::new(6, 5, 2, 24, 40, 2),
    Stage::new(6, 3, 2, 40, 80, 3),
    Stage::new(6, 5, 1, 80, 112, 3),
    Stage::new(6, 5, 2, 112, 192, 4),
    Stage::new(6, 3, 1, 192, 320, 1),
];

/// Conv → BatchNorm → optional SiLU, stored as `{prefix}.0` and `{prefix}.1`
#[derive(Debug)]
struct ConvNormActivation {
    conv: Conv2d,
    norm: BatchNorm,
    activation: bool,
}

impl ConvNormActivation {
    fn new(
        vb: VarBuilder,
        in_channels: usize,
        out_channels: usize,
        kernel: usize,
        stride: usize,
        groups: usize,
        activation: bool,
    ) -> Result<Self> {
        let config = Conv2dConfig {
            padding: (kernel - 1) / 2,
            stride,
            groups,
            ..Default::default()
        };
        let conv =
            candle_nn::conv2d_no_bias(in_channels, out_channels, kernel, config, vb.pp("0"))?;
        let norm = candle_nn::batch_norm(out_channels, BATCH_NORM_EPS, vb.pp("1"))?;
        Ok(Self {
            conv,
            norm,
            activation,
        })
    }
}

impl Module for ConvNormActivation {
    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        let xs = self.conv.forward(xs)?.apply_t(&self.norm, false)?;
        if self.activation {
            candle_nn::ops::silu(&xs)
        } else {
            Ok(xs)
        }
    }
}

#[derive(Debug)]
struct SqueezeExcitation {
    fc1: Conv2d,
    fc2: Conv2d,
}

impl SqueezeExcitation {
    fn new(vb: VarBuilder, channels: usize, squeeze_channels: usize) -> Result<Self> {
        let config = Conv2dConfig::default();
        Ok(Self {
            fc1: candle_nn::conv2d(channels, squeeze_channels, 1, config, vb.pp("fc1"))?,
            fc2: candle_nn::conv2d(squeeze_channels, channels, 1, config, vb.pp("fc2"))?,
        })
    }
}

impl Module for SqueezeExcitation {
    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        let scale = xs.mean_keepdim(D::Minus2)?.mean_keepdim(D::Minus1)?;
        let scale = candle_nn::ops::silu(&self.fc1.forward(&scale)?)?;
        let scale = candle_nn::ops::sigmoid(&self.fc2.forward(&scale)?)?;
        xs.broadcast_mul(&scale)
    }
}

/// Inverted residual block. Stochastic depth is the identity at inference.
#[derive(Debug)]
struct MBConv {
    expand: Option<ConvNormActivation>,
    depthwise: ConvNormActivation,
    squeeze_excitation: SqueezeExcitation,
    project: ConvNormActivation,
    residual: bool,
}

impl MBConv {
    fn new(vb: VarBuilder, stage: Stage, input_channels: usize, stride: usize) -> Result<Self> {
        let vb = vb.pp("block");
        let expanded = input_channels * stage.expand_ratio;

        let mut index = 0;
        let expand = if expanded != input_channels {
            index += 1;
            Some(ConvNormActivation::new(
                vb.pp("0"),
                input_channels,
                expanded,
                1,
                1,
                1,
                true,
            )?)
        } else {
            None
        };
        let depthwise = ConvNormActivation::new(
            vb.pp(index),
            expanded,
            expanded,
            stage.kernel,
            stride,
            expanded,
            true,
        )?;
        let squeeze_channels = usize::max(1, input_channels / 4);
        let squeeze_excitation =
            SqueezeExcitation::new(vb.pp(index + 1), expanded, squeeze_channels)?;
        let project = ConvNormActivation::new(
            vb.pp(index + 2),
            expanded,
            stage.out_channels,
            1,
            1,
            1,
            false,
        )?;

        Ok(Self {
            expand,
            depthwise,
            squeeze_excitation,
            project,
            residual: stride == 1 && input_channels == stage.out_channels,
        })
    }
}

impl Module for MBConv {
    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        let ys = match &self.expand {
            Some(expand) => expand.forward(xs)?,
            None => xs.clone(),
        };
        let ys = self.depthwise.forward(&ys)?;
        let ys = self.squeeze_excitation.forward(&ys)?;
        let ys = self.project.forward(&ys)?;
        if self.residual {
            ys + xs
        } else {
            Ok(ys)
        }
    }
}

/// EfficientNet-B0 producing `(batch, nclasses)` logits
#[derive(Debug)]
pub struct EfficientNetB0 {
    stem: ConvNormActivation,
    blocks: Vec<MBConv>,
    head: ConvNormActivation,
    classifier: Linear,
}

impl EfficientNetB0 {
    pub fn new(vb: VarBuilder, nclasses: usize) -> Result<Self> {
        let features = vb.pp("features");
        let stem = ConvNormActivation::new(features.pp(0), 3, STEM_CHANNELS, 3, 2, 1, true)?;

        let mut blocks = Vec::new();
        for (index, stage) in B0_STAGES.iter().enumerate() {
            let stage_vb = features.pp(index + 1);
            for layer in 0..stage.num_layers {
                let (input_channels, stride) = if layer == 0 {
                    (stage.input_channels, stage.stride)
                } else {
                    (stage.out_channels, 1)
                };
                blocks.push(MBConv::new(stage_vb.pp(layer), *stage, input_channels, stride)?);
            }
        }

        let last_channels = B0_STAGES[B0_STAGES.len() - 1].out_channels;
        let head = ConvNormActivation::new(
            features.pp(B0_STAGES.len() + 1),
            last_channels,
            HEAD_CHANNELS,
            1,
            1,
            1,
            true,
        )?;
        // classifier.0 is dropout
        let classifier = candle_nn::linear(HEAD_CHANNELS, nclasses, vb.pp("classifier.1"))?;

        Ok(Self {
            stem,
            blocks,
            head,
            classifier,
        })
    }
}

impl Module for EfficientNetB0 {
    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        let mut xs = self.stem.forward(xs)?;
        for block in &self.blocks {
            xs = block.forward(&xs)?;
        }
        let xs = self.head.forward(&xs)?;
        let pooled = xs.mean(D::Minus1)?.mean(D::Minus1)?;
        self.classifier.forward(&pooled)
    }
}

/// A randomly initialised network plus handles to every parameter
pub struct Initialized {
    pub network: EfficientNetB0,
    pub varmap: VarMap,
}

impl Initialized {
    /// Named parameter handles, sorted by name
    pub fn variables(&self) -> Result<BTreeMap<String, Var>> {
        let data = self
            .varmap
            .data()
            .lock()
            .map_err(|_| candle_core::Error::Msg("parameter map lock poisoned".to_string()))?;
        Ok(data
            .iter()
            .map(|(name, var)| (name.clone(), var.clone()))
            .collect())
    }

    /// Snapshot of the current parameter values
    pub fn weights(&self) -> Result<BTreeMap<String, Tensor>> {
        Ok(self
            .variables()?
            .into_iter()
            .map(|(name, var)| (name, var.as_tensor().clone()))
            .collect())
    }

    pub fn parameter_count(&self) -> Result<usize> {
        Ok(self
            .variables()?
            .values()
            .map(|var| var.as_tensor().elem_count())
            .sum())
    }
}

/// Build the fixed architecture with random weights on `device`
pub fn initialize(device: &Device) -> Result<Initialized> {
    initialize_with_head(device, NUM_CLASSES)
}

/// Same backbone with a head of arbitrary width.
///
/// Only the two-way head is ever served; other widths exist to produce
/// mismatching parameter sets in tests and tooling.
pub fn initialize_with_head(device: &Device, nclasses: usize) -> Result<Initialized> {
    let varmap = VarMap::new();
    let vb = VarBuilder::from_varmap(&varmap, DType::F32, device);
    let network = EfficientNetB0::new(vb, nclasses)?;
    Ok(Initialized { network, varmap })
}
