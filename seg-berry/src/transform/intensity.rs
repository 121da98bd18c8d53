//! 强度归一化: z-normalization 与线性缩放.

use log::warn;
use ndarray::{Array3, ArrayView3};

use crate::data::{array_max, array_min, Volume};

/// 求和时每块的元素个数. 串行与并行路径使用相同的分块与累加顺序,
/// 因此两者结果逐位一致.
const SUM_CHUNK: usize = 1 << 16;

cfg_if::cfg_if! {
    if #[cfg(feature = "rayon")] {
        /// 各块的部分和, 按块顺序排列.
        fn chunk_sums<F>(s: &[f32], f: &F) -> Vec<f64>
        where
            F: Fn(f32) -> f64 + Sync + Send,
        {
            use rayon::prelude::*;
            s.par_chunks(SUM_CHUNK)
                .map(|c| c.iter().map(|v| f(*v)).sum())
                .collect()
        }
    } else {
        /// 各块的部分和, 按块顺序排列.
        fn chunk_sums<F>(s: &[f32], f: &F) -> Vec<f64>
        where
            F: Fn(f32) -> f64 + Sync + Send,
        {
            s.chunks(SUM_CHUNK)
                .map(|c| c.iter().map(|v| f(*v)).sum())
                .collect()
        }
    }
}

/// 以 `f64` 精度求 `f(v)` 之和.
fn sum_by<F>(a: ArrayView3<f32>, f: F) -> f64
where
    F: Fn(f32) -> f64 + Sync + Send,
{
    match a.as_slice_memory_order() {
        Some(s) => chunk_sums(s, &f).into_iter().sum(),
        None => a.iter().map(|v| f(*v)).sum(),
    }
}

/// 对每个体素实施 `f`.
fn map_inplace<F>(a: &mut Array3<f32>, f: F)
where
    F: Fn(f32) -> f32 + Sync + Send,
{
    cfg_if::cfg_if! {
        if #[cfg(feature = "rayon")] {
            a.par_mapv_inplace(f);
        } else {
            a.mapv_inplace(f);
        }
    }
}

/// 均值与 (无偏) 标准差. 空数组返回 `None`.
pub fn mean_std(a: ArrayView3<f32>) -> Option<(f64, f64)> {
    let n = a.len();
    if n == 0 {
        return None;
    }
    let mean = sum_by(a.view(), |v| v as f64) / n as f64;
    let ss = sum_by(a, |v| (v as f64 - mean).powi(2));
    let std = if n > 1 {
        (ss / (n - 1) as f64).sqrt()
    } else {
        0.0
    };
    Some((mean, std))
}

/// 就地 z-normalization: `(v - mean) / std`.
///
/// 标准差为 0 (常量体数据) 时只减去均值.
pub fn z_normalize(a: &mut Array3<f32>) {
    let Some((mean, std)) = mean_std(a.view()) else {
        return;
    };
    if std > 0.0 {
        map_inplace(a, |v| ((v as f64 - mean) / std) as f32);
    } else {
        warn!("z-normalization: zero standard deviation, only centering");
        map_inplace(a, |v| (v as f64 - mean) as f32);
    }
}

/// 就地将强度线性缩放到 `[out_min, out_max]`.
///
/// 数据强度范围为 0 时, 所有体素都置为 `out_min`.
pub fn rescale_intensity(a: &mut Array3<f32>, (out_min, out_max): (f32, f32)) {
    let (Some(lo), Some(hi)) = (array_min(a.view()), array_max(a.view())) else {
        return;
    };
    let range = hi - lo;
    if range > 0.0 {
        let scale = (out_max - out_min) / range;
        map_inplace(a, |v| (v - lo) * scale + out_min);
    } else {
        warn!("rescale: zero intensity range, filling with {out_min}");
        a.fill(out_min);
    }
}

/// 固定的预处理流水线: z-normalization, 然后缩放到 `[0, 1]`.
///
/// 只作用于 [`crate::VolumeKind::Intensity`] 体数据, 标签保持不变.
#[derive(Copy, Clone, Debug)]
pub struct Preprocessing {
    out_range: (f32, f32),
}

impl Default for Preprocessing {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl Preprocessing {
    /// 输出范围为 `[0, 1]` 的标准预处理.
    #[inline]
    pub const fn new() -> Self {
        Self {
            out_range: (0.0, 1.0),
        }
    }

    /// 输出范围.
    #[inline]
    pub fn out_range(&self) -> (f32, f32) {
        self.out_range
    }

    /// 对 `v` 就地实施预处理. 返回是否实际修改了数据.
    pub fn apply(&self, v: &mut Volume) -> bool {
        if v.kind().is_label() {
            return false;
        }
        let data = v.array_mut();
        z_normalize(data);
        rescale_intensity(data, self.out_range);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::{mean_std, rescale_intensity, sum_by, z_normalize, Preprocessing, SUM_CHUNK};
    use crate::data::{Volume, VolumeKind};
    use ndarray::Array3;

    fn f64_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-4
    }

    #[test]
    fn test_z_normalize() {
        let mut a = Array3::from_shape_fn((4, 5, 6), |(x, y, z)| (x * 7 + y * 3 + z) as f32);
        z_normalize(&mut a);
        let (mean, std) = mean_std(a.view()).unwrap();
        assert!(f64_eq(mean, 0.0));
        assert!(f64_eq(std, 1.0));
    }

    #[test]
    fn test_z_normalize_constant() {
        let mut a = Array3::from_elem((3, 3, 3), 5.0f32);
        z_normalize(&mut a);
        assert!(a.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_rescale_range() {
        let mut a = Array3::from_shape_fn((3, 3, 3), |(x, y, z)| x as f32 - y as f32 * z as f32);
        rescale_intensity(&mut a, (0.0, 1.0));
        let lo = a.iter().copied().fold(f32::INFINITY, f32::min);
        let hi = a.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        assert_eq!(lo, 0.0);
        assert!((hi - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_preprocessing_skips_label() {
        let data = Array3::from_shape_fn((3, 3, 3), |(x, _, _)| x as f32 * 10.0);
        let mut label = Volume::from_array(data.clone(), VolumeKind::Label);
        assert!(!Preprocessing::new().apply(&mut label));
        assert_eq!(label.data(), data.view());

        let mut image = Volume::from_array(data, VolumeKind::Intensity);
        assert!(Preprocessing::new().apply(&mut image));
        assert_eq!(image.min(), Some(0.0));
    }

    #[test]
    fn test_sum_matches_sequential_chunks() {
        let a = Array3::from_shape_fn((70, 70, 20), |(x, y, z)| {
            ((x * 31 + y * 17 + z * 7) % 101) as f32 * 0.37 - 11.3
        });
        assert!(a.len() > SUM_CHUNK);
        let s = a.as_slice().unwrap();
        let reference: f64 = s
            .chunks(SUM_CHUNK)
            .map(|c| c.iter().map(|v| *v as f64).sum::<f64>())
            .sum();
        let got = sum_by(a.view(), |v| v as f64);
        assert_eq!(got.to_bits(), reference.to_bits());
    }
}
