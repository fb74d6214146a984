//! MobileNetV3-Large image classifier.
//!
//! The network follows the timm `mobilenetv3_large_100` layout so that its
//! published safetensors weights load by name:
//!
//! - `conv_stem` / `bn1`: 3x3 stride-2 stem with hard-swish
//! - `blocks.{stage}.{block}`: depthwise-separable, inverted-residual and
//!   conv-bn-act blocks, some with squeeze-excite
//! - `conv_head` / `classifier`: pooled 1x1 projection and the linear head
//!
//! The graph embeds its own input handling. It takes raw `(batch, height, width, 3)`
//! pixel values in `0..=255`, rescales them with the ImageNet mean and standard
//! deviation, and ends with a softmax, so its output rows are class
//! probabilities.

use candle_core::{DType, Result, Tensor, D};
use candle_nn::{
    batch_norm, conv2d, conv2d_no_bias, linear, ops::softmax_last_dim, BatchNorm, Conv2d,
    Conv2dConfig, Linear, Module, ModuleT, VarBuilder,
};
use serde::Deserialize;

const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];
const BN_EPS: f64 = 1e-5;
const SE_RATIO: f64 = 0.25;
const STEM_CHANNELS: usize = 16;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Config {
    #[serde(default = "default_num_classes")]
    pub num_classes: usize,
    #[serde(default = "default_num_features")]
    pub num_features: usize,
}

fn default_num_classes() -> usize {
    1000
}

fn default_num_features() -> usize {
    1280
}

impl Default for Config {
    fn default() -> Self {
        Self {
            num_classes: default_num_classes(),
            num_features: default_num_features(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Act {
    Relu,
    HardSwish,
}

impl Act {
    fn apply(self, xs: &Tensor) -> Result<Tensor> {
        match self {
            Act::Relu => xs.relu(),
            Act::HardSwish => hard_swish(xs),
        }
    }
}

fn hard_sigmoid(xs: &Tensor) -> Result<Tensor> {
    xs.affine(1.0, 3.0)?
        .clamp(0f32, 6f32)?
        .affine(1.0 / 6.0, 0.0)
}

fn hard_swish(xs: &Tensor) -> Result<Tensor> {
    xs.mul(&hard_sigmoid(xs)?)
}

/// Round `value` to the nearest multiple of `divisor`, never dropping more than 10%.
fn make_divisible(value: f64, divisor: usize) -> usize {
    let d = divisor as f64;
    let rounded = (((value + d / 2.0) / d).floor() * d).max(d);
    if rounded < 0.9 * value {
        (rounded + d) as usize
    } else {
        rounded as usize
    }
}

#[derive(Debug, Clone, Copy)]
enum BlockKind {
    DepthwiseSeparable,
    InvertedResidual,
    ConvBnAct,
}

#[derive(Debug, Clone, Copy)]
struct BlockConfig {
    kind: BlockKind,
    kernel: usize,
    stride: usize,
    expand_ratio: f64,
    out_channels: usize,
    squeeze_excite: bool,
    act: Act,
}

const fn ds(kernel: usize, stride: usize, out_channels: usize, act: Act) -> BlockConfig {
    BlockConfig {
        kind: BlockKind::DepthwiseSeparable,
        kernel,
        stride,
        expand_ratio: 1.0,
        out_channels,
        squeeze_excite: false,
        act,
    }
}

const fn ir(
    kernel: usize,
    stride: usize,
    expand_ratio: f64,
    out_channels: usize,
    squeeze_excite: bool,
    act: Act,
) -> BlockConfig {
    BlockConfig {
        kind: BlockKind::InvertedResidual,
        kernel,
        stride,
        expand_ratio,
        out_channels,
        squeeze_excite,
        act,
    }
}

const fn cn(kernel: usize, out_channels: usize, act: Act) -> BlockConfig {
    BlockConfig {
        kind: BlockKind::ConvBnAct,
        kernel,
        stride: 1,
        expand_ratio: 1.0,
        out_channels,
        squeeze_excite: false,
        act,
    }
}

use Act::{HardSwish as HS, Relu as RE};

const LARGE_STAGES: &[&[BlockConfig]] = &[
    &[ds(3, 1, 16, RE)],
    &[ir(3, 2, 4.0, 24, false, RE), ir(3, 1, 3.0, 24, false, RE)],
    &[
        ir(5, 2, 3.0, 40, true, RE),
        ir(5, 1, 3.0, 40, true, RE),
        ir(5, 1, 3.0, 40, true, RE),
    ],
    &[
        ir(3, 2, 6.0, 80, false, HS),
        ir(3, 1, 2.5, 80, false, HS),
        ir(3, 1, 2.3, 80, false, HS),
        ir(3, 1, 2.3, 80, false, HS),
    ],
    &[ir(3, 1, 6.0, 112, true, HS), ir(3, 1, 6.0, 112, true, HS)],
    &[
        ir(5, 2, 6.0, 160, true, HS),
        ir(5, 1, 6.0, 160, true, HS),
        ir(5, 1, 6.0, 160, true, HS),
    ],
    &[cn(1, 960, HS)],
];

/// Convolution followed by inference-mode batch norm and an optional activation.
#[derive(Debug, Clone)]
struct ConvBn {
    conv: Conv2d,
    bn: BatchNorm,
    act: Option<Act>,
}

impl ConvBn {
    #[allow(clippy::too_many_arguments)]
    fn load(
        in_channels: usize,
        out_channels: usize,
        kernel: usize,
        stride: usize,
        groups: usize,
        act: Option<Act>,
        conv_vb: VarBuilder,
        bn_vb: VarBuilder,
    ) -> Result<Self> {
        let cfg = Conv2dConfig {
            padding: kernel / 2,
            stride,
            groups,
            ..Default::default()
        };
        let conv = conv2d_no_bias(in_channels, out_channels, kernel, cfg, conv_vb)?;
        let bn = batch_norm(out_channels, BN_EPS, bn_vb)?;
        Ok(Self { conv, bn, act })
    }
}

impl Module for ConvBn {
    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        let xs = self.conv.forward(xs)?;
        let xs = self.bn.forward_t(&xs, false)?;
        match self.act {
            Some(act) => act.apply(&xs),
            None => Ok(xs),
        }
    }
}

#[derive(Debug, Clone)]
struct SqueezeExcite {
    conv_reduce: Conv2d,
    conv_expand: Conv2d,
}

impl SqueezeExcite {
    fn load(channels: usize, vb: VarBuilder) -> Result<Self> {
        let reduced = make_divisible(channels as f64 * SE_RATIO, 8);
        let cfg = Conv2dConfig::default();
        let conv_reduce = conv2d(channels, reduced, 1, cfg, vb.pp("conv_reduce"))?;
        let conv_expand = conv2d(reduced, channels, 1, cfg, vb.pp("conv_expand"))?;
        Ok(Self {
            conv_reduce,
            conv_expand,
        })
    }
}

impl Module for SqueezeExcite {
    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        let scale = xs.mean_keepdim(D::Minus1)?.mean_keepdim(D::Minus2)?;
        let scale = self.conv_reduce.forward(&scale)?.relu()?;
        let scale = hard_sigmoid(&self.conv_expand.forward(&scale)?)?;
        xs.broadcast_mul(&scale)
    }
}

#[derive(Debug, Clone)]
struct DepthwiseSeparable {
    dw: ConvBn,
    se: Option<SqueezeExcite>,
    pw: ConvBn,
    residual: bool,
}

impl DepthwiseSeparable {
    fn load(in_channels: usize, cfg: &BlockConfig, vb: VarBuilder) -> Result<Self> {
        let dw = ConvBn::load(
            in_channels,
            in_channels,
            cfg.kernel,
            cfg.stride,
            in_channels,
            Some(cfg.act),
            vb.pp("conv_dw"),
            vb.pp("bn1"),
        )?;
        let se = match cfg.squeeze_excite {
            true => Some(SqueezeExcite::load(in_channels, vb.pp("se"))?),
            false => None,
        };
        let pw = ConvBn::load(
            in_channels,
            cfg.out_channels,
            1,
            1,
            1,
            None,
            vb.pp("conv_pw"),
            vb.pp("bn2"),
        )?;
        Ok(Self {
            dw,
            se,
            pw,
            residual: cfg.stride == 1 && in_channels == cfg.out_channels,
        })
    }
}

impl Module for DepthwiseSeparable {
    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        let mut ys = self.dw.forward(xs)?;
        if let Some(se) = &self.se {
            ys = se.forward(&ys)?;
        }
        let ys = self.pw.forward(&ys)?;
        if self.residual {
            ys + xs
        } else {
            Ok(ys)
        }
    }
}

#[derive(Debug, Clone)]
struct InvertedResidual {
    expand: ConvBn,
    dw: ConvBn,
    se: Option<SqueezeExcite>,
    project: ConvBn,
    residual: bool,
}

impl InvertedResidual {
    fn load(in_channels: usize, cfg: &BlockConfig, vb: VarBuilder) -> Result<Self> {
        let mid = make_divisible(in_channels as f64 * cfg.expand_ratio, 8);
        let expand = ConvBn::load(
            in_channels,
            mid,
            1,
            1,
            1,
            Some(cfg.act),
            vb.pp("conv_pw"),
            vb.pp("bn1"),
        )?;
        let dw = ConvBn::load(
            mid,
            mid,
            cfg.kernel,
            cfg.stride,
            mid,
            Some(cfg.act),
            vb.pp("conv_dw"),
            vb.pp("bn2"),
        )?;
        let se = match cfg.squeeze_excite {
            true => Some(SqueezeExcite::load(mid, vb.pp("se"))?),
            false => None,
        };
        let project = ConvBn::load(
            mid,
            cfg.out_channels,
            1,
            1,
            1,
            None,
            vb.pp("conv_pwl"),
            vb.pp("bn3"),
        )?;
        Ok(Self {
            expand,
            dw,
            se,
            project,
            residual: cfg.stride == 1 && in_channels == cfg.out_channels,
        })
    }
}

impl Module for InvertedResidual {
    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        let ys = self.expand.forward(xs)?;
        let mut ys = self.dw.forward(&ys)?;
        if let Some(se) = &self.se {
            ys = se.forward(&ys)?;
        }
        let ys = self.project.forward(&ys)?;
        if self.residual {
            ys + xs
        } else {
            Ok(ys)
        }
    }
}

#[derive(Debug, Clone)]
enum Block {
    DepthwiseSeparable(DepthwiseSeparable),
    InvertedResidual(InvertedResidual),
    ConvBnAct(ConvBn),
}

impl Block {
    fn load(in_channels: usize, cfg: &BlockConfig, vb: VarBuilder) -> Result<Self> {
        let block = match cfg.kind {
            BlockKind::DepthwiseSeparable => {
                Block::DepthwiseSeparable(DepthwiseSeparable::load(in_channels, cfg, vb)?)
            }
            BlockKind::InvertedResidual => {
                Block::InvertedResidual(InvertedResidual::load(in_channels, cfg, vb)?)
            }
            BlockKind::ConvBnAct => Block::ConvBnAct(ConvBn::load(
                in_channels,
                cfg.out_channels,
                cfg.kernel,
                cfg.stride,
                1,
                Some(cfg.act),
                vb.pp("conv"),
                vb.pp("bn1"),
            )?),
        };
        Ok(block)
    }
}

impl Module for Block {
    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        match self {
            Block::DepthwiseSeparable(b) => b.forward(xs),
            Block::InvertedResidual(b) => b.forward(xs),
            Block::ConvBnAct(b) => b.forward(xs),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MobileNetV3 {
    mean: Tensor,
    std: Tensor,
    stem: ConvBn,
    blocks: Vec<Block>,
    conv_head: Conv2d,
    classifier: Linear,
    num_classes: usize,
    span: tracing::Span,
}

impl MobileNetV3 {
    pub fn load(vb: VarBuilder, config: &Config) -> Result<Self> {
        let device = vb.device().clone();
        let mean = Tensor::new(&IMAGENET_MEAN, &device)?.reshape((1, 3, 1, 1))?;
        let std = Tensor::new(&IMAGENET_STD, &device)?.reshape((1, 3, 1, 1))?;

        let stem = ConvBn::load(
            3,
            STEM_CHANNELS,
            3,
            2,
            1,
            Some(Act::HardSwish),
            vb.pp("conv_stem"),
            vb.pp("bn1"),
        )?;

        let mut blocks = Vec::new();
        let mut channels = STEM_CHANNELS;
        let vb_blocks = vb.pp("blocks");
        for (stage_idx, stage) in LARGE_STAGES.iter().enumerate() {
            let vb_stage = vb_blocks.pp(stage_idx);
            for (block_idx, cfg) in stage.iter().enumerate() {
                blocks.push(Block::load(channels, cfg, vb_stage.pp(block_idx))?);
                channels = cfg.out_channels;
            }
        }

        let conv_head = conv2d(
            channels,
            config.num_features,
            1,
            Conv2dConfig::default(),
            vb.pp("conv_head"),
        )?;
        let classifier = linear(config.num_features, config.num_classes, vb.pp("classifier"))?;

        Ok(Self {
            mean,
            std,
            stem,
            blocks,
            conv_head,
            classifier,
            num_classes: config.num_classes,
            span: tracing::span!(tracing::Level::TRACE, "mobilenet-v3"),
        })
    }

    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    /// `(batch, height, width, 3)` raw pixels in → `(batch, num_classes)` probabilities out.
    pub fn forward(&self, pixels: &Tensor) -> Result<Tensor> {
        let _enter = self.span.enter();
        let xs = pixels
            .to_dtype(DType::F32)?
            .permute((0, 3, 1, 2))?
            .contiguous()?
            .affine(1.0 / 255.0, 0.0)?
            .broadcast_sub(&self.mean)?
            .broadcast_div(&self.std)?;

        let mut xs = self.stem.forward(&xs)?;
        for block in &self.blocks {
            xs = block.forward(&xs)?;
        }

        let xs = xs.mean_keepdim(D::Minus1)?.mean_keepdim(D::Minus2)?;
        let xs = hard_swish(&self.conv_head.forward(&xs)?)?.flatten_from(1)?;
        let logits = self.classifier.forward(&xs)?;
        softmax_last_dim(&logits)
    }
}
