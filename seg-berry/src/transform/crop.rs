//! 空间重采样: 填充不足目标尺寸的轴, 然后裁剪出固定尺寸的 3D patch.
//!
//! 只有前两个轴参与填充和裁剪, 深度轴保持原样, 且必须等于目标深度.

use ndarray::{s, Array3, ArrayView3};
use rand::Rng;

use super::Transform;
use crate::data::array_min;
use crate::error::{ConfigError, PipelineError, ShapeError};
use crate::sample::Sample;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 目标 patch 尺寸 `(h, w, d)`, 每个分量都为正.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TargetSize([usize; 3]);

impl TargetSize {
    /// 三个分量分别指定.
    pub fn new(h: usize, w: usize, d: usize) -> Result<Self, ConfigError> {
        let dims = [h, w, d];
        match dims.iter().position(|v| *v == 0) {
            Some(axis) => Err(ConfigError::ZeroExtent(axis)),
            None => Ok(Self(dims)),
        }
    }

    /// 立方体.
    #[inline]
    pub fn cubic(n: usize) -> Result<Self, ConfigError> {
        Self::new(n, n, n)
    }

    /// 三个分量.
    #[inline]
    pub fn dims(&self) -> [usize; 3] {
        self.0
    }
}

impl TryFrom<usize> for TargetSize {
    type Error = ConfigError;

    #[inline]
    fn try_from(n: usize) -> Result<Self, Self::Error> {
        Self::cubic(n)
    }
}

impl TryFrom<[usize; 3]> for TargetSize {
    type Error = ConfigError;

    #[inline]
    fn try_from([h, w, d]: [usize; 3]) -> Result<Self, Self::Error> {
        Self::new(h, w, d)
    }
}

impl TryFrom<&[usize]> for TargetSize {
    type Error = ConfigError;

    fn try_from(dims: &[usize]) -> Result<Self, Self::Error> {
        match *dims {
            [h, w, d] => Self::new(h, w, d),
            _ => Err(ConfigError::TargetArity(dims.len())),
        }
    }
}

/// 裁剪窗口起点的选择方式.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum CropMode {
    /// 均匀随机.
    Random,

    /// 以标签加权质心为中心. 窗口越界时该轴起点退化为 0.
    Centroid,
}

/// 标签填充值的来源.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum PadFill {
    /// 标签自身的最小值.
    #[default]
    LabelMinimum,

    /// 扫描的最小值.
    ImageMinimum,
}

/// 单轴填充量: 目标不小于数据长度时, 两侧各填充 `(target - extent) / 2 + 1`.
///
/// 填充后的长度严格大于 `target`.
#[inline]
pub fn pad_amount(extent: usize, target: usize) -> usize {
    if target >= extent {
        (target - extent) / 2 + 1
    } else {
        0
    }
}

/// 在前两个轴两侧分别填充 `px`, `py` 个 `fill`.
pub fn pad_xy(a: ArrayView3<f32>, px: usize, py: usize, fill: f32) -> Array3<f32> {
    let (h, w, d) = a.dim();
    if px == 0 && py == 0 {
        return a.to_owned();
    }
    let mut out = Array3::from_elem((h + 2 * px, w + 2 * py, d), fill);
    out.slice_mut(s![px..px + h, py..py + w, ..]).assign(&a);
    out
}

/// 均匀随机起点 `[0, extent - target)`. 区间为空时返回 0.
#[inline]
pub fn random_offset<R: Rng + ?Sized>(extent: usize, target: usize, rng: &mut R) -> usize {
    if extent > target {
        rng.gen_range(0..extent - target)
    } else {
        0
    }
}

/// 以 `label` 加权质心为中心的前两个轴的起点.
///
/// 质心四舍五入到最近的整数, 起点为 `centroid - target / 2`. 若窗口
/// `[start, start + target)` 不在 `[0, extent)` 内, 该轴起点为 0.
/// 权重之和不为正 (空标签) 时两个轴都为 0.
pub fn centroid_offsets(label: ArrayView3<f32>, (th, tw): (usize, usize)) -> (usize, usize) {
    let (h, w, _) = label.dim();
    let (mut sum, mut sx, mut sy) = (0f64, 0f64, 0f64);
    for ((x, y, _), v) in label.indexed_iter() {
        let v = *v as f64;
        sum += v;
        sx += v * x as f64;
        sy += v * y as f64;
    }
    if !(sum > 0.0) {
        return (0, 0);
    }
    let place = |c: f64, t: usize, extent: usize| {
        let start = c.round() as i64 - (t / 2) as i64;
        if start < 0 || start as usize + t > extent {
            0
        } else {
            start as usize
        }
    };
    (place(sx / sum, th, h), place(sy / sum, tw, w))
}

/// 固定尺寸 patch 裁剪.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PatchCrop {
    target: TargetSize,
    mode: CropMode,
    label_fill: PadFill,
}

impl PatchCrop {
    /// `target` 可以是单个整数 (立方体)、`[usize; 3]` 或长度为 3 的切片.
    /// `centroid_mode` 为真时使用 [`CropMode::Centroid`], 否则 [`CropMode::Random`].
    pub fn new<T>(target: T, centroid_mode: bool) -> Result<Self, ConfigError>
    where
        T: TryInto<TargetSize, Error = ConfigError>,
    {
        let mode = if centroid_mode {
            CropMode::Centroid
        } else {
            CropMode::Random
        };
        Ok(Self::with_target(target.try_into()?, mode))
    }

    /// 由已校验的尺寸直接构造.
    #[inline]
    pub fn with_target(target: TargetSize, mode: CropMode) -> Self {
        Self {
            target,
            mode,
            label_fill: PadFill::default(),
        }
    }

    /// 指定标签的填充值来源.
    #[inline]
    pub fn with_label_fill(mut self, fill: PadFill) -> Self {
        self.label_fill = fill;
        self
    }

    /// 目标尺寸.
    #[inline]
    pub fn target(&self) -> TargetSize {
        self.target
    }

    /// 起点选择方式.
    #[inline]
    pub fn mode(&self) -> CropMode {
        self.mode
    }

    /// 裁剪 `sample`. 名称与仿射矩阵原样保留.
    pub fn crop<R: Rng + ?Sized>(&self, sample: Sample, rng: &mut R) -> Result<Sample, ShapeError> {
        let [th, tw, td] = self.target.dims();
        let (h, w, d) = sample.shape();
        if td != d {
            return Err(ShapeError::DepthMismatch(td, d));
        }

        let (px, py) = (pad_amount(h, th), pad_amount(w, tw));
        let image_min = array_min(sample.image.view()).unwrap_or(0.0);
        let label_min = match self.label_fill {
            PadFill::LabelMinimum => array_min(sample.label.view()).unwrap_or(0.0),
            PadFill::ImageMinimum => image_min,
        };
        let image = pad_xy(sample.image.view(), px, py, image_min);
        let label = pad_xy(sample.label.view(), px, py, label_min);
        let (h, w, _) = image.dim();

        let (ox, oy) = match self.mode {
            CropMode::Random => {
                let ox = random_offset(h, th, rng);
                (ox, random_offset(w, tw, rng))
            }
            CropMode::Centroid => centroid_offsets(label.view(), (th, tw)),
        };
        for (axis, offset, size, extent) in [(0, ox, th, h), (1, oy, tw, w)] {
            if offset + size > extent {
                return Err(ShapeError::WindowOutOfBounds {
                    axis,
                    offset,
                    size,
                    extent,
                });
            }
        }

        let window = s![ox..ox + th, oy..oy + tw, ..];
        Ok(Sample {
            image: image.slice(&window).to_owned(),
            label: label.slice(&window).to_owned(),
            ..sample
        })
    }
}

impl Transform<Sample> for PatchCrop {
    type Output = Sample;

    #[inline]
    fn apply<R: Rng + ?Sized>(&self, input: Sample, rng: &mut R) -> Result<Sample, PipelineError> {
        Ok(self.crop(input, rng)?)
    }
}
