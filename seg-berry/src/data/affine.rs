//! 体素索引到物理空间坐标的 4x4 仿射变换.

use ndarray::Array2;
use nifti::NiftiHeader;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 4x4 仿射矩阵, 行优先. 将体素索引 `(i, j, k, 1)` 映射为物理坐标 (毫米).
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Affine(pub [[f64; 4]; 4]);

impl Default for Affine {
    #[inline]
    fn default() -> Self {
        Self::identity()
    }
}

impl Affine {
    /// 单位变换.
    pub const fn identity() -> Self {
        Self([
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ])
    }

    /// 从 nifti header 中求仿射矩阵.
    ///
    /// 优先级: `sform_code > 0` 时使用 `srow_*`; 否则 `qform_code > 0` 时由四元数构造;
    /// 否则退化为 `pixdim` 对角阵.
    pub fn from_header(h: &NiftiHeader) -> Self {
        if h.sform_code > 0 {
            let row = |r: [f32; 4]| r.map(|v| v as f64);
            return Self([
                row(h.srow_x),
                row(h.srow_y),
                row(h.srow_z),
                [0.0, 0.0, 0.0, 1.0],
            ]);
        }

        let [qfac, dx, dy, dz, ..] = h.pixdim.map(|v| v as f64);
        if h.qform_code > 0 {
            let (b, c, d) = (
                h.quatern_b as f64,
                h.quatern_c as f64,
                h.quatern_d as f64,
            );
            let a = (1.0 - (b * b + c * c + d * d).min(1.0)).sqrt();
            // qfac 只能为 1 或 -1, 0 视作 1.
            let dz = if qfac < 0.0 { -dz } else { dz };
            return Self([
                [
                    (a * a + b * b - c * c - d * d) * dx,
                    (2.0 * b * c - 2.0 * a * d) * dy,
                    (2.0 * b * d + 2.0 * a * c) * dz,
                    h.quatern_x as f64,
                ],
                [
                    (2.0 * b * c + 2.0 * a * d) * dx,
                    (a * a + c * c - b * b - d * d) * dy,
                    (2.0 * c * d - 2.0 * a * b) * dz,
                    h.quatern_y as f64,
                ],
                [
                    (2.0 * b * d - 2.0 * a * c) * dx,
                    (2.0 * c * d + 2.0 * a * b) * dy,
                    (a * a + d * d - c * c - b * b) * dz,
                    h.quatern_z as f64,
                ],
                [0.0, 0.0, 0.0, 1.0],
            ]);
        }

        let mut ans = Self::identity();
        for (axis, v) in [dx, dy, dz].into_iter().enumerate() {
            ans.0[axis][axis] = if v > 0.0 { v } else { 1.0 };
        }
        ans
    }

    /// 转换为 `ndarray` 矩阵, 便于写入 npz.
    pub fn to_array2(&self) -> Array2<f64> {
        Array2::from_shape_fn((4, 4), |(r, c)| self.0[r][c])
    }

    /// 从 4x4 `ndarray` 矩阵恢复. 形状不为 `(4, 4)` 时返回 `None`.
    pub fn from_array2(a: &Array2<f64>) -> Option<Self> {
        if a.dim() != (4, 4) {
            return None;
        }
        let mut ans = Self::identity();
        for ((r, c), v) in a.indexed_iter() {
            ans.0[r][c] = *v;
        }
        Some(ans)
    }
}

#[cfg(test)]
mod tests {
    use super::Affine;
    use nifti::NiftiHeader;

    fn f64_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn test_affine_from_sform() {
        let mut h = NiftiHeader::default();
        h.sform_code = 1;
        h.srow_x = [0.8, 0.0, 0.0, -10.0];
        h.srow_y = [0.0, 0.8, 0.0, 5.0];
        h.srow_z = [0.0, 0.0, 2.5, 1.0];
        let a = Affine::from_header(&h);
        assert!(f64_eq(a.0[0][3], -10.0));
        assert!(f64_eq(a.0[1][3], 5.0));
        assert!(f64_eq(a.0[0][0], 0.8));
        assert!(f64_eq(a.0[2][2], 2.5));
    }

    #[test]
    fn test_affine_from_identity_quaternion() {
        let mut h = NiftiHeader::default();
        h.sform_code = 0;
        h.qform_code = 1;
        h.pixdim = [1.0, 2.0, 3.0, 4.0, 0.0, 0.0, 0.0, 0.0];
        (h.quatern_b, h.quatern_c, h.quatern_d) = (0.0, 0.0, 0.0);
        let a = Affine::from_header(&h);
        assert!(f64_eq(a.0[0][0], 2.0));
        assert!(f64_eq(a.0[1][1], 3.0));
        assert!(f64_eq(a.0[2][2], 4.0));
        assert!(f64_eq(a.0[0][1], 0.0));
    }

    #[test]
    fn test_affine_from_rotated_quaternion_flipped() {
        // 绕 z 轴旋转 90 度, qfac = -1 翻转 z 方向.
        let mut h = NiftiHeader::default();
        h.sform_code = 0;
        h.qform_code = 1;
        h.pixdim = [-1.0, 2.0, 3.0, 4.0, 0.0, 0.0, 0.0, 0.0];
        (h.quatern_b, h.quatern_c, h.quatern_d) = (0.0, 0.0, std::f32::consts::FRAC_1_SQRT_2);
        (h.quatern_x, h.quatern_y, h.quatern_z) = (7.0, -8.0, 9.0);
        let a = Affine::from_header(&h);
        let expected = [
            [0.0, -3.0, 0.0, 7.0],
            [2.0, 0.0, 0.0, -8.0],
            [0.0, 0.0, -4.0, 9.0],
            [0.0, 0.0, 0.0, 1.0],
        ];
        for (row, want) in a.0.iter().zip(expected.iter()) {
            for (v, w) in row.iter().zip(want.iter()) {
                assert!(f64_eq(*v, *w), "{:?}", a.0);
            }
        }
    }

    #[test]
    fn test_affine_from_pixdim_fallback() {
        let mut h = NiftiHeader::default();
        (h.sform_code, h.qform_code) = (0, 0);
        h.pixdim = [1.0, 0.5, 0.0, 3.0, 0.0, 0.0, 0.0, 0.0];
        let a = Affine::from_header(&h);
        assert!(f64_eq(a.0[0][0], 0.5));
        assert!(f64_eq(a.0[1][1], 1.0));
        assert!(f64_eq(a.0[2][2], 3.0));
    }

    #[test]
    fn test_affine_array_round_trip() {
        let a = Affine::identity();
        assert_eq!(Affine::from_array2(&a.to_array2()), Some(a));
        assert_eq!(Affine::from_array2(&ndarray::Array2::zeros((3, 4))), None);
    }
}
