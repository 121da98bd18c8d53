use std::fmt;
use std::fs::{File, OpenOptions};
use std::io;
use std::num::NonZeroUsize;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use ndarray::{Ix2, Ix4, OwnedRepr};
use ndarray_npy::{NpzReader, NpzWriter, ReadNpzError, WriteNpzError};

use crate::data::Affine;
use crate::sample::PackagedSample;

/// 每个样本在归档中的四个数组的后缀.
const IMAGE: &str = "image";
const LABEL: &str = "label";
const IMAGE_AFFINE: &str = "image_affine";
const LABEL_AFFINE: &str = "label_affine";

/// 最大工作通道数.
const MAX_WORKERS: usize = 64;

/// 读写 `NpzArchive` 错误.
#[derive(Debug)]
pub enum ArchiveError {
    /// workers 太大. 参数为支持的最大值.
    TooManyWorkers(usize),

    /// 读取 npz 文件错误.
    ReadNpz(ReadNpzError),

    /// 写入 npz 文件错误.
    WriteNpz(WriteNpzError),

    /// 其他底层 I/O 错误.
    Io(io::Error),

    /// 仿射矩阵不是 4x4. 参数为样本名.
    MalformedAffine(String),
}

impl fmt::Display for ArchiveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooManyWorkers(max) => write!(f, "at most {max} workers are supported"),
            Self::ReadNpz(e) => write!(f, "cannot read npz archive: {e}"),
            Self::WriteNpz(e) => write!(f, "cannot write npz archive: {e}"),
            Self::Io(e) => write!(f, "npz archive I/O error: {e}"),
            Self::MalformedAffine(name) => write!(f, "sample {name}: affine is not 4x4"),
        }
    }
}

impl std::error::Error for ArchiveError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ReadNpz(e) => Some(e),
            Self::WriteNpz(e) => Some(e),
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ReadNpzError> for ArchiveError {
    #[inline]
    fn from(e: ReadNpzError) -> Self {
        Self::ReadNpz(e)
    }
}

impl From<WriteNpzError> for ArchiveError {
    #[inline]
    fn from(e: WriteNpzError) -> Self {
        Self::WriteNpz(e)
    }
}

impl From<io::Error> for ArchiveError {
    #[inline]
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

/// 将若干打包样本写入 `path` 处的 npz 文件. 返回写入的样本个数.
///
/// 样本 `name` 的四个数组分别保存为 `{name}.image.npy`, `{name}.label.npy`,
/// `{name}.image_affine.npy` 和 `{name}.label_affine.npy`.
pub fn write_archive<'a, P, I>(path: P, samples: I) -> Result<usize, ArchiveError>
where
    P: AsRef<Path>,
    I: IntoIterator<Item = &'a PackagedSample>,
{
    let mut npz = NpzWriter::new(File::create(path)?);
    let mut count = 0;
    for s in samples {
        npz.add_array(format!("{}.{IMAGE}.npy", s.name), &s.image)?;
        npz.add_array(format!("{}.{LABEL}.npy", s.name), &s.label)?;
        npz.add_array(format!("{}.{IMAGE_AFFINE}.npy", s.name), &s.image_affine.to_array2())?;
        npz.add_array(format!("{}.{LABEL_AFFINE}.npy", s.name), &s.label_affine.to_array2())?;
        count += 1;
    }
    npz.finish()?;
    Ok(count)
}

/// Npz 文件归档.
///
/// 该结构可用于建模硬盘上已导出的多个打包样本. 每个工作通道独立打开一次文件,
/// 读取时轮流使用各通道, 以期获得更高的并行度.
pub struct NpzArchive {
    entries: Vec<Mutex<NpzReader<File>>>,
    turn: AtomicUsize,
}

impl NpzArchive {
    /// 初始化.
    ///
    /// `workers` 指定了底层工作通道的个数, 最大为 64.
    pub fn new<P: AsRef<Path>>(workers: NonZeroUsize, p: P) -> Result<Self, ArchiveError> {
        let workers = workers.get();
        if workers > MAX_WORKERS {
            return Err(ArchiveError::TooManyWorkers(MAX_WORKERS));
        }
        let mut v = Vec::with_capacity(workers);
        for _ in 0..workers {
            let file = OpenOptions::new().read(true).open(p.as_ref())?;
            v.push(Mutex::new(NpzReader::new(file)?));
        }
        Ok(Self {
            entries: v,
            turn: AtomicUsize::new(0),
        })
    }

    /// 按样本名读取一个打包样本.
    pub fn sample_by_name(&self, name: &str) -> Result<PackagedSample, ArchiveError> {
        let mut file = self.reader();
        let image = file.by_name::<OwnedRepr<f32>, Ix4>(&format!("{name}.{IMAGE}.npy"))?;
        let label = file.by_name::<OwnedRepr<f32>, Ix4>(&format!("{name}.{LABEL}.npy"))?;
        let mut affine = |key: &str| {
            let a = file.by_name::<OwnedRepr<f64>, Ix2>(&format!("{name}.{key}.npy"))?;
            Affine::from_array2(&a).ok_or_else(|| ArchiveError::MalformedAffine(name.to_string()))
        };
        let image_affine = affine(IMAGE_AFFINE)?;
        let label_affine = affine(LABEL_AFFINE)?;
        Ok(PackagedSample {
            image,
            label,
            name: name.to_string(),
            image_affine,
            label_affine,
        })
    }

    /// 归档中所有样本名, 按写入顺序.
    pub fn sample_names(&self) -> Result<Vec<String>, ArchiveError> {
        let suffix = format!(".{IMAGE}");
        let names = self.reader().names()?;
        Ok(names
            .iter()
            .map(|n| n.strip_suffix(".npy").unwrap_or(n))
            .filter_map(|n| n.strip_suffix(suffix.as_str()).map(str::to_string))
            .collect())
    }

    /// 工作通道个数.
    #[inline]
    pub fn worker_len(&self) -> usize {
        self.entries.len()
    }

    /// 归档中的样本个数.
    pub fn sample_len(&self) -> Result<usize, ArchiveError> {
        self.sample_names().map(|v| v.len())
    }

    fn reader(&self) -> MutexGuard<'_, NpzReader<File>> {
        let slot = self.turn.fetch_add(1, Ordering::Relaxed) % self.worker_len();
        self.entries[slot]
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
