use std::path::Path;

use ndarray::{Array3, ArrayView3, Axis, Ix3};
use nifti::{IntoNdArray, NiftiHeader, NiftiObject, ReaderOptions};
use ordered_float::NotNan;

use crate::error::{LoadError, LoadErrorKind};
use crate::Idx3d;

pub mod affine;

pub use affine::Affine;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// `NiftiHeader` 是栈上大对象, 移动该对象的开销很可观.
/// 因此我们将其分配到堆上.
type BoxedHeader = Box<NiftiHeader>;

/// 体数据的语义类别. 不同类别在重采样时使用不同的插值策略,
/// 并且只有 [`VolumeKind::Intensity`] 会参与强度变换.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum VolumeKind {
    /// 连续强度 (扫描). 重采样使用三线性插值.
    Intensity,

    /// 类别标签 (分割掩码). 重采样使用最近邻插值.
    Label,
}

impl VolumeKind {
    /// 是否为类别标签.
    #[inline]
    pub fn is_label(&self) -> bool {
        matches!(self, Self::Label)
    }
}

/// 3D nii 文件 header 的共用属性.
pub trait NiftiHeaderAttr {
    /// 获取 header 部分.
    fn header(&self) -> &NiftiHeader;

    /// 获取单个体素分辨率 (毫米), 按 nifti 的 `[x, y, z]` 顺序.
    /// 非正值视为 1 毫米.
    #[inline]
    fn pix_dim(&self) -> [f64; 3] {
        let [_, x, y, z, ..] = self.header().pixdim;
        [x, y, z].map(|v| if v > 0.0 { v as f64 } else { 1.0 })
    }

    /// 获取该体数据的 4x4 仿射矩阵.
    #[inline]
    fn affine(&self) -> Affine {
        Affine::from_header(self.header())
    }
}

/// nii 格式 3D 体数据, 包括 header 和体素值. 体素值统一以 `f32` 保存,
/// 轴顺序与 nifti 文件一致, 即 `(x, y, z)`, 其中 `z` 为深度 (切片) 方向.
#[derive(Debug, Clone)]
pub struct Volume {
    kind: VolumeKind,
    header: BoxedHeader,
    data: Array3<f32>,
}

impl NiftiHeaderAttr for Volume {
    #[inline]
    fn header(&self) -> &NiftiHeader {
        &self.header
    }
}

impl Volume {
    /// 打开 nii (或 nii.gz) 文件格式的 3D 体数据. `path` 为本地路径.
    ///
    /// 如果数据是 4D 且最后一维长度为 1, 则取第一个通道. 其他非 3D 数据返回 `Err`.
    pub fn open<P: AsRef<Path>>(path: P, kind: VolumeKind) -> Result<Self, LoadError> {
        let path = path.as_ref();
        let err = |kind| LoadError::new(path, kind);

        let obj = ReaderOptions::new()
            .read_file(path)
            .map_err(|e| err(LoadErrorKind::Codec(e)))?;
        let header = Box::new(obj.header().clone());

        let data = obj
            .into_volume()
            .into_ndarray::<f32>()
            .map_err(|e| err(LoadErrorKind::Codec(e)))?;
        let data = if matches!(data.shape(), [_, _, _, 1]) {
            data.index_axis_move(Axis(3), 0)
        } else {
            data
        };
        let shape = data.shape().to_vec();
        let data = data
            .into_dimensionality::<Ix3>()
            .map_err(|_| err(LoadErrorKind::Dimensionality(shape)))?;

        // nifti 数据域是列优先的, 这里统一为标准布局.
        let data = if data.is_standard_layout() {
            data
        } else {
            data.as_standard_layout().to_owned()
        };
        debug_assert!(data.is_standard_layout());

        Ok(Self { kind, header, data })
    }

    /// 根据裸数据直接创建体数据, header 为默认值 (1 毫米各向同性, 单位仿射).
    ///
    /// # 注意
    ///
    /// 该方法主要用于测试与合成数据.
    pub fn from_array(data: Array3<f32>, kind: VolumeKind) -> Self {
        Self {
            kind,
            header: Box::default(),
            data,
        }
    }

    /// 体数据的语义类别.
    #[inline]
    pub fn kind(&self) -> VolumeKind {
        self.kind
    }

    /// 数据形状 `(x, y, z)`.
    #[inline]
    pub fn shape(&self) -> Idx3d {
        self.data.dim()
    }

    /// 获得数据的一份不可变 shallow copy.
    #[inline]
    pub fn data(&self) -> ArrayView3<'_, f32> {
        self.data.view()
    }

    /// 底层数组的可变引用, 供就地变换使用.
    #[inline]
    pub(crate) fn array_mut(&mut self) -> &mut Array3<f32> {
        &mut self.data
    }

    /// 消费自我, 获得底层数据.
    #[inline]
    pub fn into_data(self) -> Array3<f32> {
        self.data
    }

    /// 最小体素值. 忽略 NaN; 数据为空或全为 NaN 时返回 `None`.
    #[inline]
    pub fn min(&self) -> Option<f32> {
        array_min(self.data.view())
    }

    /// 最大体素值. 忽略 NaN; 数据为空或全为 NaN 时返回 `None`.
    #[inline]
    pub fn max(&self) -> Option<f32> {
        array_max(self.data.view())
    }
}

/// 最小值 (忽略 NaN).
pub(crate) fn array_min(a: ArrayView3<f32>) -> Option<f32> {
    a.iter()
        .filter_map(|v| NotNan::new(*v).ok())
        .min()
        .map(NotNan::into_inner)
}

/// 最大值 (忽略 NaN).
pub(crate) fn array_max(a: ArrayView3<f32>) -> Option<f32> {
    a.iter()
        .filter_map(|v| NotNan::new(*v).ok())
        .max()
        .map(NotNan::into_inner)
}

/// nii 格式的 3D 扫描与对应的标注.
///
/// 该结构完全透明, 仅包含两个公开的 `image` 和 `label` 子结构.
/// 通过 [`VolumePair::open`] 创建时保证两者体素网格形状一致.
#[derive(Debug, Clone)]
pub struct VolumePair {
    /// 3D 扫描.
    pub image: Volume,

    /// 3D 标注.
    pub label: Volume,
}

impl VolumePair {
    /// 分别打开 nii 文件格式的 3D 扫描和对应标注. 如果任一文件打开失败,
    /// 或两者形状不一致, 则返回 `Err`.
    pub fn open(image_path: impl AsRef<Path>, label_path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let image = Volume::open(image_path.as_ref(), VolumeKind::Intensity)?;
        let label = Volume::open(label_path.as_ref(), VolumeKind::Label)?;
        if image.shape() != label.shape() {
            return Err(LoadError::new(
                label_path.as_ref(),
                LoadErrorKind::ShapeMismatch(image.shape(), label.shape()),
            ));
        }
        Ok(Self { image, label })
    }

    /// 数据形状 `(x, y, z)`.
    #[inline]
    pub fn shape(&self) -> Idx3d {
        self.image.shape()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::{Volume, VolumeKind, VolumePair};
    use crate::error::LoadErrorKind;
    use ndarray::{Array3, Array4};
    use nifti::writer::WriterOptions;
    use std::path::Path;

    /// 将 `data` 写为 `path` 处的 nii 文件.
    pub(crate) fn write_nii(path: &Path, data: &Array3<f32>) {
        WriterOptions::new(path).write_nifti(data).unwrap();
    }

    #[test]
    fn test_open_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("img.nii");
        let data = Array3::from_shape_fn((6, 5, 4), |(x, y, z)| (x * 100 + y * 10 + z) as f32);
        write_nii(&path, &data);

        let v = Volume::open(&path, VolumeKind::Intensity).unwrap();
        assert_eq!(v.shape(), (6, 5, 4));
        assert_eq!(v.data(), data.view());
        assert_eq!(v.min(), Some(0.0));
        assert_eq!(v.max(), Some(543.0));
        assert_eq!(v.kind(), VolumeKind::Intensity);
    }

    #[test]
    fn test_open_trailing_singleton_axis() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("single.nii");
        let data = Array4::from_shape_fn((4, 4, 3, 1), |(x, y, z, _)| (x + 2 * y + 3 * z) as f32);
        WriterOptions::new(&path).write_nifti(&data).unwrap();

        let v = Volume::open(&path, VolumeKind::Intensity).unwrap();
        assert_eq!(v.shape(), (4, 4, 3));
        assert_eq!(v.data()[(3, 2, 1)], 10.0);
    }

    #[test]
    fn test_open_rejects_multichannel() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("multi.nii");
        WriterOptions::new(&path)
            .write_nifti(&Array4::<f32>::zeros((4, 4, 3, 2)))
            .unwrap();

        let e = Volume::open(&path, VolumeKind::Label).unwrap_err();
        assert_eq!(e.path, path);
        match e.kind {
            LoadErrorKind::Dimensionality(shape) => assert_eq!(shape, vec![4, 4, 3, 2]),
            k => panic!("unexpected error: {k:?}"),
        }
    }

    #[test]
    fn test_open_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nothing.nii");
        let e = Volume::open(&path, VolumeKind::Label).unwrap_err();
        assert_eq!(e.path, path);
        assert!(matches!(e.kind, LoadErrorKind::Codec(_)));
    }

    #[test]
    fn test_open_pair_shape_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let (img, lab) = (dir.path().join("img.nii"), dir.path().join("lab.nii"));
        write_nii(&img, &Array3::zeros((4, 4, 3)));
        write_nii(&lab, &Array3::zeros((4, 4, 2)));

        let e = VolumePair::open(&img, &lab).unwrap_err();
        assert!(matches!(
            e.kind,
            LoadErrorKind::ShapeMismatch((4, 4, 3), (4, 4, 2))
        ));
    }

    #[test]
    fn test_min_max_skip_nan() {
        let mut data = Array3::from_elem((2, 2, 2), 3.0f32);
        data[(0, 0, 0)] = f32::NAN;
        data[(1, 1, 1)] = -2.0;
        let v = Volume::from_array(data, VolumeKind::Intensity);
        assert_eq!(v.min(), Some(-2.0));
        assert_eq!(v.max(), Some(3.0));
    }
}
