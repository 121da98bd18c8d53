use itertools::izip;
use ndarray::{Array3, Axis, Zip};
use rand::Rng;
use rustfft::FftDirection;

use super::kspace::{fft3, to_complex, unshifted};
use super::Augmentation;
use crate::consts::augment::{MOTION_DEGREES, MOTION_P, MOTION_TRANSFORMS, MOTION_TRANSLATION};
use crate::data::{NiftiHeaderAttr, VolumeKind, VolumePair};
use crate::transform::resample::{resample, VoxelMap};

/// 随机运动伪影.
///
/// 对扫描生成若干份刚体移动后的副本, 在 k-space 中沿深度轴按时间段拼接各副本的频谱,
/// 再逆变换取模. 只作用于扫描, 标注保持不变.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct RandomMotion {
    degrees: f64,
    translation: f64,
    num_transforms: usize,
    p: f64,
}

impl Default for RandomMotion {
    #[inline]
    fn default() -> Self {
        Self::standard()
    }
}

impl RandomMotion {
    /// 训练流水线使用的固定参数.
    pub const fn standard() -> Self {
        Self {
            degrees: MOTION_DEGREES,
            translation: MOTION_TRANSLATION,
            num_transforms: MOTION_TRANSFORMS,
            p: MOTION_P,
        }
    }

    /// 自定义参数. 幅度为负或概率不在 `[0, 1]` 时返回 `None`.
    pub fn new(degrees: f64, translation: f64, num_transforms: usize, p: f64) -> Option<Self> {
        let valid = degrees >= 0.0 && translation >= 0.0 && (0.0..=1.0).contains(&p);
        valid.then_some(Self {
            degrees,
            translation,
            num_transforms,
            p,
        })
    }

    /// 采样运动发生的时刻, 位于 `(0, 1)` 内并升序排列.
    fn sample_times<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<f64> {
        let step = 1.0 / (self.num_transforms + 1) as f64;
        let jitter = step / 20.0;
        let mut times: Vec<f64> = (1..=self.num_transforms)
            .map(|i| i as f64 * step + rng.gen_range(-jitter..=jitter))
            .collect();
        times.sort_by(f64::total_cmp);
        times
    }
}

impl Augmentation for RandomMotion {
    fn augment<R: Rng + ?Sized>(&self, pair: &mut VolumePair, rng: &mut R) -> bool {
        if self.num_transforms == 0 || !rng.gen_bool(self.p) {
            return false;
        }
        let image = &mut pair.image;
        let (shape, spacing) = (image.shape(), image.pix_dim());
        let times = self.sample_times(rng);
        let (d, t) = (self.degrees, self.translation);
        let maps: Vec<VoxelMap> = (0..self.num_transforms)
            .map(|_| {
                let degrees = [(); 3].map(|_| rng.gen_range(-d..=d));
                let translation = [(); 3].map(|_| rng.gen_range(-t..=t));
                VoxelMap::similarity(shape, spacing, [1.0; 3], degrees, translation)
            })
            .collect();
        let fill = image.min().unwrap_or(0.0);
        ghost(image.array_mut(), &maps, &times, fill);
        true
    }
}

/// 将 `maps` 对应的移动副本按 `times` 拼接进 `a` 的频谱.
///
/// fftshift 后深度轴上 `[0, times[0] * nz)` 保留原频谱,
/// `[times[k] * nz, times[k + 1] * nz)` 取第 `k` 个副本的频谱.
fn ghost(a: &mut Array3<f32>, maps: &[VoxelMap], times: &[f64], fill: f32) {
    let nz = a.len_of(Axis(2));
    if a.is_empty() {
        return;
    }
    let mut spectrum = to_complex(a.view());
    fft3(&mut spectrum, FftDirection::Forward);

    let starts: Vec<usize> = times
        .iter()
        .map(|t| ((t * nz as f64).floor() as usize).min(nz))
        .collect();
    let ends = starts.iter().skip(1).copied().chain(std::iter::once(nz));
    for (map, &start, end) in izip!(maps, &starts, ends) {
        if start >= end {
            continue;
        }
        let moved = resample(a.view(), map, VolumeKind::Intensity, fill);
        let mut spec = to_complex(moved.view());
        fft3(&mut spec, FftDirection::Forward);
        for j in start..end {
            let u = unshifted(j, nz);
            spectrum
                .index_axis_mut(Axis(2), u)
                .assign(&spec.index_axis(Axis(2), u));
        }
    }

    fft3(&mut spectrum, FftDirection::Inverse);
    Zip::from(a).and(&spectrum).for_each(|v, c| *v = c.norm());
}
