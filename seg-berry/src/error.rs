//! 运行时错误.
//!
//! 所有错误最终都可以汇总为 [`PipelineError`], 以便在 `?` 中直接传播.

use std::fmt;
use std::io;
use std::path::PathBuf;

use crate::Idx3d;

/// 读取 manifest 错误.
#[derive(Debug)]
pub enum ManifestError {
    /// 文件不存在或无法读取.
    Io {
        /// manifest 路径.
        path: PathBuf,
        /// 底层 I/O 错误.
        source: io::Error,
    },

    /// CSV 格式错误.
    Csv {
        /// manifest 路径.
        path: PathBuf,
        /// 底层 CSV 错误.
        source: csv::Error,
    },

    /// 某一行不足两列. 参数为数据行号 (从 0 开始, 不计表头).
    MissingColumn {
        /// manifest 路径.
        path: PathBuf,
        /// 数据行号.
        row: usize,
        /// 该行实际列数.
        found: usize,
    },
}

impl fmt::Display for ManifestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "cannot read manifest {}: {source}", path.display())
            }
            Self::Csv { path, source } => {
                write!(f, "malformed manifest {}: {source}", path.display())
            }
            Self::MissingColumn { path, row, found } => write!(
                f,
                "manifest {} row {row}: expected at least 2 columns, found {found}",
                path.display()
            ),
        }
    }
}

impl std::error::Error for ManifestError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Csv { source, .. } => Some(source),
            Self::MissingColumn { .. } => None,
        }
    }
}

/// 加载体数据失败的具体原因.
#[derive(Debug)]
pub enum LoadErrorKind {
    /// 文件不可读或被 nifti 解码器拒绝.
    Codec(nifti::NiftiError),

    /// 数据不是 3D 的 (允许末尾单例通道). 参数为实际形状.
    Dimensionality(Vec<usize>),

    /// 扫描与标注体素网格不一致. `(image, label)`
    ShapeMismatch(Idx3d, Idx3d),
}

/// 加载体数据错误. 携带出错文件路径与 manifest 行号 (若已知).
#[derive(Debug)]
pub struct LoadError {
    /// 出错的文件.
    pub path: PathBuf,

    /// manifest 行号.
    pub row: Option<usize>,

    /// 具体原因.
    pub kind: LoadErrorKind,
}

impl LoadError {
    /// 构造不带行号的错误.
    #[inline]
    pub fn new(path: impl Into<PathBuf>, kind: LoadErrorKind) -> Self {
        Self {
            path: path.into(),
            row: None,
            kind,
        }
    }

    /// 附加 manifest 行号.
    #[inline]
    pub fn at_row(mut self, row: usize) -> Self {
        self.row = Some(row);
        self
    }
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cannot load {}", self.path.display())?;
        if let Some(row) = self.row {
            write!(f, " (manifest row {row})")?;
        }
        match &self.kind {
            LoadErrorKind::Codec(e) => write!(f, ": {e}"),
            LoadErrorKind::Dimensionality(shape) => {
                write!(f, ": expected a 3D volume, got shape {shape:?}")
            }
            LoadErrorKind::ShapeMismatch(image, label) => {
                write!(f, ": image shape {image:?} != label shape {label:?}")
            }
        }
    }
}

impl std::error::Error for LoadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.kind {
            LoadErrorKind::Codec(e) => Some(e),
            _ => None,
        }
    }
}

/// 目标尺寸配置错误.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ConfigError {
    /// 目标尺寸不是 3 个分量. 参数为实际分量个数.
    TargetArity(usize),

    /// 目标尺寸某个轴为 0. 参数为轴号.
    ZeroExtent(usize),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TargetArity(n) => write!(f, "target size needs 3 components, got {n}"),
            Self::ZeroExtent(axis) => write!(f, "target size is zero along axis {axis}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// 裁剪形状错误.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ShapeError {
    /// 目标深度与数据深度不一致. `(requested, available)`
    DepthMismatch(usize, usize),

    /// 裁剪窗口超出 (填充后的) 数据范围.
    WindowOutOfBounds {
        /// 轴号.
        axis: usize,
        /// 窗口起点.
        offset: usize,
        /// 窗口长度.
        size: usize,
        /// 该轴数据长度.
        extent: usize,
    },
}

impl fmt::Display for ShapeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DepthMismatch(requested, available) => write!(
                f,
                "target depth {requested} does not match volume depth {available}"
            ),
            Self::WindowOutOfBounds {
                axis,
                offset,
                size,
                extent,
            } => write!(
                f,
                "crop window [{offset}, {}) exceeds extent {extent} on axis {axis}",
                offset + size
            ),
        }
    }
}

impl std::error::Error for ShapeError {}

/// 样本构建流水线的汇总错误.
#[derive(Debug)]
pub enum PipelineError {
    /// manifest 错误.
    Manifest(ManifestError),

    /// 体数据加载错误.
    Load(LoadError),

    /// 配置错误.
    Config(ConfigError),

    /// 形状错误.
    Shape(ShapeError),

    /// 索引越界. `(index, len)`
    IndexOutOfRange(usize, usize),
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Manifest(e) => e.fmt(f),
            Self::Load(e) => e.fmt(f),
            Self::Config(e) => e.fmt(f),
            Self::Shape(e) => e.fmt(f),
            Self::IndexOutOfRange(index, len) => {
                write!(f, "index {index} out of range for dataset of size {len}")
            }
        }
    }
}

impl std::error::Error for PipelineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Manifest(e) => Some(e),
            Self::Load(e) => Some(e),
            Self::Config(e) => Some(e),
            Self::Shape(e) => Some(e),
            Self::IndexOutOfRange(..) => None,
        }
    }
}

macro_rules! impl_from {
    ($($variant: ident($err: ty)),*) => {
        $(
            impl From<$err> for PipelineError {
                #[inline]
                fn from(e: $err) -> Self {
                    Self::$variant(e)
                }
            }
        )*
    };
}

impl_from!(
    Manifest(ManifestError),
    Load(LoadError),
    Config(ConfigError),
    Shape(ShapeError)
);
