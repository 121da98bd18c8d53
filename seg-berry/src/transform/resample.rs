//! 体素空间重采样. 供随机仿射与运动伪影共用.

use ndarray::{Array3, ArrayView3, Zip};
use num::Float;

use crate::data::VolumeKind;
use crate::Idx3d;

type Mat3 = [[f64; 3]; 3];

/// 坐标越界判定的容差.
const EPS: f64 = 1e-6;

fn mat_mul(a: &Mat3, b: &Mat3) -> Mat3 {
    let mut ans = [[0.0; 3]; 3];
    for (i, row) in ans.iter_mut().enumerate() {
        for (j, v) in row.iter_mut().enumerate() {
            *v = (0..3).map(|k| a[i][k] * b[k][j]).sum();
        }
    }
    ans
}

fn transpose(a: &Mat3) -> Mat3 {
    let mut ans = [[0.0; 3]; 3];
    for (i, row) in a.iter().enumerate() {
        for (j, v) in row.iter().enumerate() {
            ans[j][i] = *v;
        }
    }
    ans
}

/// 由绕 x, y, z 轴的欧拉角 (度) 构造旋转矩阵 `Rz * Ry * Rx`.
pub(crate) fn rotation(degrees: [f64; 3]) -> Mat3 {
    let [(sa, ca), (sb, cb), (sc, cc)] = degrees.map(|d| d.to_radians().sin_cos());
    let rx = [[1.0, 0.0, 0.0], [0.0, ca, -sa], [0.0, sa, ca]];
    let ry = [[cb, 0.0, sb], [0.0, 1.0, 0.0], [-sb, 0.0, cb]];
    let rz = [[cc, -sc, 0.0], [sc, cc, 0.0], [0.0, 0.0, 1.0]];
    mat_mul(&rz, &mat_mul(&ry, &rx))
}

/// 输出体素坐标到输入体素坐标的仿射映射 `u = m * p + offset`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub(crate) struct VoxelMap {
    m: Mat3,
    offset: [f64; 3],
}

impl VoxelMap {
    /// 恒等映射.
    #[cfg(test)]
    pub fn identity() -> Self {
        Self {
            m: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
            offset: [0.0; 3],
        }
    }

    /// 以体数据中心为原点的物理空间相似变换 `x' = R * D * x + t` 的逆映射,
    /// 换算到体素坐标.
    ///
    /// `spacing` 为体素分辨率 (毫米), `scales` 为 `D` 的对角元, `degrees`
    /// 为欧拉角, `translation` 以毫米为单位.
    pub fn similarity(
        shape: Idx3d,
        spacing: [f64; 3],
        scales: [f64; 3],
        degrees: [f64; 3],
        translation: [f64; 3],
    ) -> Self {
        let center = [shape.0, shape.1, shape.2].map(|n| (n as f64 - 1.0) / 2.0);
        let rt = transpose(&rotation(degrees));

        // m = S^-1 * D^-1 * R^T * S
        let mut m = [[0.0; 3]; 3];
        for (i, row) in m.iter_mut().enumerate() {
            for (j, v) in row.iter_mut().enumerate() {
                *v = rt[i][j] * spacing[j] / (spacing[i] * scales[i]);
            }
        }

        let mut offset = [0.0; 3];
        for (i, o) in offset.iter_mut().enumerate() {
            let mc: f64 = (0..3).map(|j| m[i][j] * center[j]).sum();
            let rtt: f64 = (0..3).map(|j| rt[i][j] * translation[j]).sum();
            *o = center[i] - mc - rtt / (spacing[i] * scales[i]);
        }
        Self { m, offset }
    }

    /// 求输出体素 `p` 对应的输入体素坐标.
    #[inline]
    pub fn apply(&self, p: [f64; 3]) -> [f64; 3] {
        let mut ans = self.offset;
        for (i, v) in ans.iter_mut().enumerate() {
            *v += (0..3).map(|j| self.m[i][j] * p[j]).sum::<f64>();
        }
        ans
    }
}

#[inline]
fn lerp<T: Float>(a: T, b: T, t: T) -> T {
    a + (b - a) * t
}

/// 三线性插值. 坐标超出数据范围时返回 `fill`.
fn trilinear(src: &ArrayView3<f32>, q: [f64; 3], fill: f32) -> f32 {
    let (nx, ny, nz) = src.dim();
    let dims = [nx, ny, nz];
    let mut base = [0usize; 3];
    let mut frac = [0f32; 3];
    for k in 0..3 {
        let max = (dims[k] - 1) as f64;
        // NaN 也会被拒绝.
        if !(q[k] > -EPS && q[k] < max + EPS) {
            return fill;
        }
        let v = num::clamp(q[k], 0.0, max);
        let f = v.floor();
        base[k] = f as usize;
        frac[k] = (v - f) as f32;
    }
    let at = |dx: usize, dy: usize, dz: usize| {
        src[(
            (base[0] + dx).min(nx - 1),
            (base[1] + dy).min(ny - 1),
            (base[2] + dz).min(nz - 1),
        )]
    };
    let [fx, fy, fz] = frac;
    let c00 = lerp(at(0, 0, 0), at(1, 0, 0), fx);
    let c10 = lerp(at(0, 1, 0), at(1, 1, 0), fx);
    let c01 = lerp(at(0, 0, 1), at(1, 0, 1), fx);
    let c11 = lerp(at(0, 1, 1), at(1, 1, 1), fx);
    lerp(lerp(c00, c10, fy), lerp(c01, c11, fy), fz)
}

/// 最近邻插值. 坐标超出数据范围时返回 `fill`.
fn nearest(src: &ArrayView3<f32>, q: [f64; 3], fill: f32) -> f32 {
    let (nx, ny, nz) = src.dim();
    let dims = [nx, ny, nz];
    let mut idx = [0usize; 3];
    for k in 0..3 {
        let r = q[k].round();
        if !(r >= 0.0 && r < dims[k] as f64) {
            return fill;
        }
        idx[k] = r as usize;
    }
    src[(idx[0], idx[1], idx[2])]
}

/// 按 `map` 将 `src` 重采样到同形状的新数组. 强度数据使用三线性插值,
/// 标签使用最近邻插值; 落在数据外的体素填充为 `fill`.
pub(crate) fn resample(src: ArrayView3<f32>, map: &VoxelMap, kind: VolumeKind, fill: f32) -> Array3<f32> {
    let mut out = Array3::from_elem(src.dim(), fill);
    let sample = |(x, y, z): Idx3d, v: &mut f32| {
        let q = map.apply([x as f64, y as f64, z as f64]);
        *v = match kind {
            VolumeKind::Intensity => trilinear(&src, q, fill),
            VolumeKind::Label => nearest(&src, q, fill),
        };
    };
    cfg_if::cfg_if! {
        if #[cfg(feature = "rayon")] {
            Zip::indexed(&mut out).par_for_each(sample);
        } else {
            Zip::indexed(&mut out).for_each(sample);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::{resample, rotation, VoxelMap};
    use crate::data::VolumeKind;
    use ndarray::Array3;

    fn f64_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_rotation_is_orthonormal() {
        let r = rotation([30.0, -45.0, 120.0]);
        for i in 0..3 {
            for j in 0..3 {
                let dot: f64 = (0..3).map(|k| r[i][k] * r[j][k]).sum();
                assert!(f64_eq(dot, if i == j { 1.0 } else { 0.0 }));
            }
        }
    }

    #[test]
    fn test_identity_similarity() {
        let m = VoxelMap::similarity((5, 7, 3), [0.7, 0.7, 2.0], [1.0; 3], [0.0; 3], [0.0; 3]);
        let q = m.apply([1.0, 2.0, 3.0]);
        assert!(f64_eq(q[0], 1.0) && f64_eq(q[1], 2.0) && f64_eq(q[2], 3.0));
    }

    #[test]
    fn test_scale_about_center() {
        // 放大 2 倍: 输出中心不动, 输出上距中心 2 个体素的点来自输入上距中心 1 个体素的点.
        let m = VoxelMap::similarity((9, 9, 9), [1.0; 3], [2.0; 3], [0.0; 3], [0.0; 3]);
        let q = m.apply([6.0, 4.0, 4.0]);
        assert!(f64_eq(q[0], 5.0) && f64_eq(q[1], 4.0) && f64_eq(q[2], 4.0));
    }

    #[test]
    fn test_translation_in_mm() {
        let m = VoxelMap::similarity((9, 9, 9), [2.0, 1.0, 1.0], [1.0; 3], [0.0; 3], [4.0, 0.0, 0.0]);
        let q = m.apply([4.0, 4.0, 4.0]);
        assert!(f64_eq(q[0], 2.0));
    }

    #[test]
    fn test_resample_identity_and_fill() {
        let src = Array3::from_shape_fn((4, 4, 4), |(x, y, z)| (x + 2 * y + 3 * z) as f32);
        let out = resample(src.view(), &VoxelMap::identity(), VolumeKind::Intensity, -1.0);
        assert_eq!(out, src);

        let shift = VoxelMap::similarity((4, 4, 4), [1.0; 3], [1.0; 3], [0.0; 3], [-10.0, 0.0, 0.0]);
        let out = resample(src.view(), &shift, VolumeKind::Label, -1.0);
        assert!(out.iter().all(|v| *v == -1.0));
    }

    #[test]
    fn test_label_stays_categorical() {
        let src = Array3::from_shape_fn((8, 8, 4), |(x, y, _)| ((x + y) % 2) as f32);
        let m = VoxelMap::similarity((8, 8, 4), [1.0; 3], [1.3; 3], [0.0, 0.0, 33.0], [0.0; 3]);
        let out = resample(src.view(), &m, VolumeKind::Label, 0.0);
        assert!(out.iter().all(|v| *v == 0.0 || *v == 1.0));
    }
}
