//! k-space (3D 离散傅里叶频谱) 工具.

use ndarray::{Array3, ArrayView3, ArrayViewMut1, Axis, Zip};
use rustfft::num_complex::Complex32;
use rustfft::{FftDirection, FftPlanner};

/// 实数体数据转为复数.
pub(crate) fn to_complex(a: ArrayView3<f32>) -> Array3<Complex32> {
    a.mapv(|v| Complex32::new(v, 0.0))
}

/// 就地 3D FFT. 逐轴对每一条 lane 做 1D FFT; 逆变换附带 `1/N` 归一化,
/// 因此 `Forward` 之后 `Inverse` 还原输入.
pub(crate) fn fft3(data: &mut Array3<Complex32>, direction: FftDirection) {
    let mut planner = FftPlanner::<f32>::new();
    for axis in 0..3 {
        let n = data.len_of(Axis(axis));
        if n <= 1 {
            continue;
        }
        let fft = planner.plan_fft(n, direction);
        let run = |mut lane: ArrayViewMut1<Complex32>| {
            let mut buf: Vec<Complex32> = lane.iter().copied().collect();
            fft.process(&mut buf);
            lane.iter_mut().zip(buf).for_each(|(d, s)| *d = s);
        };
        cfg_if::cfg_if! {
            if #[cfg(feature = "rayon")] {
                Zip::from(data.lanes_mut(Axis(axis))).par_for_each(run);
            } else {
                Zip::from(data.lanes_mut(Axis(axis))).for_each(run);
            }
        }
    }
    if matches!(direction, FftDirection::Inverse) && !data.is_empty() {
        let scale = 1.0 / data.len() as f32;
        data.mapv_inplace(|v| v * scale);
    }
}

/// 未移位频率下标 `u` 在 fftshift 之后的位置.
#[cfg(test)]
#[inline]
pub(crate) fn shifted(u: usize, n: usize) -> usize {
    (u + n / 2) % n
}

/// fftshift 之后位置 `j` 对应的未移位频率下标.
#[inline]
pub(crate) fn unshifted(j: usize, n: usize) -> usize {
    (j + n - n / 2) % n
}

#[cfg(test)]
mod tests {
    use super::{fft3, shifted, to_complex, unshifted};
    use ndarray::Array3;
    use rustfft::FftDirection;

    #[test]
    fn test_fft_round_trip() {
        let a = Array3::from_shape_fn((5, 4, 3), |(x, y, z)| (x * 3 + y * y + z) as f32);
        let mut spec = to_complex(a.view());
        fft3(&mut spec, FftDirection::Forward);
        // 直流分量为总和.
        assert!((spec[(0, 0, 0)].re - a.sum()).abs() < 1e-3);
        fft3(&mut spec, FftDirection::Inverse);
        for (c, v) in spec.iter().zip(a.iter()) {
            assert!((c.re - v).abs() < 1e-3);
            assert!(c.im.abs() < 1e-3);
        }
    }

    #[test]
    fn test_shift_inverse() {
        for n in 1..9 {
            for u in 0..n {
                assert_eq!(unshifted(shifted(u, n), n), u);
            }
            // 直流分量位于中心.
            assert_eq!(shifted(0, n), n / 2);
        }
    }
}
