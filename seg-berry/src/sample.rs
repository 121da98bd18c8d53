//! 训练样本.

use ndarray::{Array3, Array4};

use crate::data::Affine;
use crate::Idx3d;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 3D 训练样本: 扫描、二值标签、名称与两份仿射矩阵.
///
/// 原始样本和裁剪后的样本共用该结构, 区别仅在于空间形状.
///
/// # 注意
///
/// 1. `image` 与 `label` 的形状应当一致.
/// 2. 裁剪不会更新仿射矩阵, 因此裁剪后的 `image_affine` 仍然描述原始体素网格.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Sample {
    /// 扫描强度, 形状 `(x, y, z)`.
    pub image: Array3<f32>,

    /// 标签, 值域为 {0.0, 1.0}.
    pub label: Array3<f32>,

    /// 由扫描文件名得到的样本名.
    pub name: String,

    /// 扫描仿射矩阵.
    pub image_affine: Affine,

    /// 标注仿射矩阵.
    pub label_affine: Affine,
}

impl Sample {
    /// 数据形状 `(x, y, z)`.
    #[inline]
    pub fn shape(&self) -> Idx3d {
        self.image.dim()
    }

    /// 标签是否只包含 0.0 和 1.0.
    pub fn is_binary(&self) -> bool {
        self.label.iter().all(|v| *v == 0.0 || *v == 1.0)
    }

    /// 前景 (标签为 1.0) 体素个数.
    pub fn foreground(&self) -> usize {
        self.label.iter().filter(|v| **v == 1.0).count()
    }
}

/// 打包后的样本: 扫描与标签都带有长度为 1 的前置通道轴, 形状为 `(1, x, y, z)`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PackagedSample {
    /// 扫描强度.
    pub image: Array4<f32>,

    /// 标签.
    pub label: Array4<f32>,

    /// 样本名.
    pub name: String,

    /// 扫描仿射矩阵.
    pub image_affine: Affine,

    /// 标注仿射矩阵.
    pub label_affine: Affine,
}
