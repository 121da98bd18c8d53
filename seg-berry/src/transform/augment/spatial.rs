use rand::Rng;

use super::Augmentation;
use crate::consts::augment::{AFFINE_DEGREES, AFFINE_P, AFFINE_SCALES};
use crate::data::{NiftiHeaderAttr, Volume, VolumePair};
use crate::transform::resample::{resample, VoxelMap};

/// 随机仿射: 缩放与旋转. 扫描与标注共用同一组采样参数,
/// 扫描三线性插值, 标注最近邻插值, 越界体素填充为各自的最小值.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct RandomAffine {
    scales: (f64, f64),
    degrees: (f64, f64),
    isotropic: bool,
    p: f64,
}

/// 一次采样得到的仿射参数.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct AffineParams {
    /// 三个轴的缩放因子.
    pub scales: [f64; 3],

    /// 绕三个轴的旋转角 (度).
    pub degrees: [f64; 3],
}

impl Default for RandomAffine {
    #[inline]
    fn default() -> Self {
        Self::standard()
    }
}

impl RandomAffine {
    /// 训练流水线使用的固定参数.
    pub const fn standard() -> Self {
        Self {
            scales: AFFINE_SCALES,
            degrees: AFFINE_DEGREES,
            isotropic: true,
            p: AFFINE_P,
        }
    }

    /// 自定义参数. 范围下界大于上界、缩放因子非正或概率不在 `[0, 1]`
    /// 时返回 `None`.
    pub fn new(scales: (f64, f64), degrees: (f64, f64), isotropic: bool, p: f64) -> Option<Self> {
        let valid = scales.0 > 0.0
            && scales.0 <= scales.1
            && degrees.0 <= degrees.1
            && (0.0..=1.0).contains(&p);
        valid.then_some(Self {
            scales,
            degrees,
            isotropic,
            p,
        })
    }

    /// 采样一组仿射参数.
    pub fn sample_params<R: Rng + ?Sized>(&self, rng: &mut R) -> AffineParams {
        let (lo, hi) = self.scales;
        let scales = if self.isotropic {
            [rng.gen_range(lo..=hi); 3]
        } else {
            [(); 3].map(|_| rng.gen_range(lo..=hi))
        };
        let (lo, hi) = self.degrees;
        let degrees = [(); 3].map(|_| rng.gen_range(lo..=hi));
        AffineParams { scales, degrees }
    }

    /// 按给定参数变换一对体数据.
    pub fn transform(&self, pair: &mut VolumePair, params: &AffineParams) {
        let map = VoxelMap::similarity(
            pair.shape(),
            pair.image.pix_dim(),
            params.scales,
            params.degrees,
            [0.0; 3],
        );
        warp(&mut pair.image, &map);
        warp(&mut pair.label, &map);
    }
}

fn warp(v: &mut Volume, map: &VoxelMap) {
    let fill = v.min().unwrap_or(0.0);
    let out = resample(v.data(), map, v.kind(), fill);
    *v.array_mut() = out;
}

impl Augmentation for RandomAffine {
    fn augment<R: Rng + ?Sized>(&self, pair: &mut VolumePair, rng: &mut R) -> bool {
        if !rng.gen_bool(self.p) {
            return false;
        }
        let params = self.sample_params(rng);
        self.transform(pair, &params);
        true
    }
}
