use ndarray::{Array3, Zip};
use rand::Rng;
use rustfft::num_complex::Complex32;
use rustfft::FftDirection;

use super::kspace::{fft3, to_complex, unshifted};
use super::Augmentation;
use crate::consts::augment::{SPIKE_COUNT, SPIKE_INTENSITY, SPIKE_P};
use crate::data::VolumePair;

/// 随机尖峰伪影: 在 k-space 的随机位置叠加尖峰, 逆变换后取实部.
/// 只作用于扫描.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct RandomSpike {
    num_spikes: usize,
    intensity: (f64, f64),
    p: f64,
}

impl Default for RandomSpike {
    #[inline]
    fn default() -> Self {
        Self::standard()
    }
}

impl RandomSpike {
    /// 训练流水线使用的固定参数.
    pub const fn standard() -> Self {
        Self {
            num_spikes: SPIKE_COUNT,
            intensity: SPIKE_INTENSITY,
            p: SPIKE_P,
        }
    }

    /// 自定义参数. 强度范围下界大于上界或概率不在 `[0, 1]` 时返回 `None`.
    pub fn new(num_spikes: usize, intensity: (f64, f64), p: f64) -> Option<Self> {
        let valid = intensity.0 <= intensity.1 && (0.0..=1.0).contains(&p);
        valid.then_some(Self {
            num_spikes,
            intensity,
            p,
        })
    }
}

impl Augmentation for RandomSpike {
    fn augment<R: Rng + ?Sized>(&self, pair: &mut VolumePair, rng: &mut R) -> bool {
        if !rng.gen_bool(self.p) {
            return false;
        }
        let positions: Vec<[f64; 3]> = (0..self.num_spikes)
            .map(|_| [(); 3].map(|_| rng.gen::<f64>()))
            .collect();
        let (lo, hi) = self.intensity;
        let factor = rng.gen_range(lo..=hi);
        spike(pair.image.array_mut(), &positions, factor);
        true
    }
}

/// 在 fftshift 后的相对位置 `positions` (每个分量位于 `[0, 1)`)
/// 叠加 `factor * max|F|` 的尖峰.
fn spike(a: &mut Array3<f32>, positions: &[[f64; 3]], factor: f64) {
    if a.is_empty() || positions.is_empty() {
        return;
    }
    let (nx, ny, nz) = a.dim();
    let dims = [nx, ny, nz];
    let mut spectrum = to_complex(a.view());
    fft3(&mut spectrum, FftDirection::Forward);

    let peak = spectrum.iter().map(|c| c.norm()).fold(0f32, f32::max);
    let delta = Complex32::new(peak * factor as f32, 0.0);
    for pos in positions {
        let idx: [usize; 3] = std::array::from_fn(|k| {
            let j = ((pos[k] * dims[k] as f64).floor() as usize).min(dims[k] - 1);
            unshifted(j, dims[k])
        });
        spectrum[(idx[0], idx[1], idx[2])] += delta;
    }

    fft3(&mut spectrum, FftDirection::Inverse);
    Zip::from(a).and(&spectrum).for_each(|v, c| *v = c.re);
}
