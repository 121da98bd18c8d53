#![warn(missing_docs)]

//! 核心库. 为 3D 医学影像 (nifti 格式) 语义分割模型构建训练样本.
//!
//! 样本构建流水线由三部分组成, 数据从左到右流动:
//!
//! 1. 样本源 ([`dataset::SampleSource`]): 持有数据清单与索引排列,
//!   按索引加载一对扫描/标注, 实施强度预处理与可选的随机增强, 并二值化标签;
//! 2. 空间裁剪 ([`transform::PatchCrop`]): 填充不足目标尺寸的轴,
//!   然后随机或以标签质心为中心裁剪出固定尺寸的 patch;
//! 3. 张量打包 ([`transform::ToTensor`]): 添加长度为 1 的通道轴.
//!
//! 后两者都实现了 [`transform::Transform`], 可以串联后作为样本源的后置变换.
//!
//! # 注意
//!
//! 1. 轴顺序与 nifti 文件一致, 即 `(x, y, z)`. 只有前两个轴会被填充和裁剪.
//! 2. 所有随机性都来自显式传入 (或样本源自有) 的随机数生成器,
//!   固定种子即可完全复现.
//! 3. 裁剪不会更新仿射矩阵.
//!
//! # 开发计划
//!
//! ### nifti 读取与仿射矩阵 ✅
//!
//! 实现位于 `seg-berry/src/data`.
//!
//! ### 强度预处理 ✅
//!
//! z-normalization, 然后线性缩放到 `[0, 1]`.
//!
//! 实现位于 `seg-berry/src/transform/intensity.rs`.
//!
//! ### 数据增强 ✅
//!
//! 随机仿射、k-space 运动伪影、k-space 尖峰伪影. 四个分支均匀抽取.
//!
//! 实现位于 `seg-berry/src/transform/augment`.
//!
//! ### 填充与裁剪 ✅
//!
//! 随机模式与质心模式.
//!
//! 实现位于 `seg-berry/src/transform/crop.rs`.
//!
//! ### 洗牌策略与并行副本 ✅
//!
//! 实现位于 `seg-berry/src/dataset`.
//!
//! ### 打包样本的 npz 导出 ✅
//!
//! 实现位于 `seg-berry/src/dataset/npz_archive.rs`.

/// 三维索引 / 形状 `(x, y, z)`.
pub type Idx3d = (usize, usize, usize);

/// nifti 体数据与仿射矩阵.
pub mod data;

pub use data::{Affine, NiftiHeaderAttr, Volume, VolumeKind, VolumePair};

pub mod consts;

pub mod dataset;

pub mod error;

pub use error::PipelineError;

pub mod prelude;

mod sample;

pub use sample::{PackagedSample, Sample};

pub mod transform;
