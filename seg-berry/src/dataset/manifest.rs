//! 数据清单 (manifest): CSV 文件, 每行一对扫描/标注相对路径.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, Trim};

use crate::error::ManifestError;

/// 清单中的一行. 行号即该样本的身份.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ManifestEntry {
    /// 扫描路径, 相对数据根目录.
    pub image: PathBuf,

    /// 标注路径, 相对数据根目录.
    pub label: PathBuf,
}

/// 数据清单. 构造后不可变.
///
/// 第 0 列为扫描路径, 第 1 列为标注路径, 其余列忽略.
#[derive(Clone, Debug, Default)]
pub struct Manifest {
    path: PathBuf,
    entries: Vec<ManifestEntry>,
}

impl Manifest {
    /// 读取 `path` 处的 CSV 清单. `has_headers` 为真时首行视为表头.
    pub fn open<P: AsRef<Path>>(path: P, has_headers: bool) -> Result<Self, ManifestError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| ManifestError::Io {
            path: path.to_owned(),
            source,
        })?;
        Self::from_reader(file, has_headers, path)
    }

    /// 从任意 reader 读取 CSV 清单. `path` 只用于错误信息.
    pub fn from_reader<R: io::Read>(
        reader: R,
        has_headers: bool,
        path: impl Into<PathBuf>,
    ) -> Result<Self, ManifestError> {
        let path = path.into();
        let mut reader = ReaderBuilder::new()
            .has_headers(has_headers)
            .flexible(true)
            .trim(Trim::All)
            .from_reader(reader);

        let mut entries = Vec::new();
        for (row, record) in reader.records().enumerate() {
            let record = record.map_err(|source| ManifestError::Csv {
                path: path.clone(),
                source,
            })?;
            match (record.get(0), record.get(1)) {
                (Some(image), Some(label)) => entries.push(ManifestEntry {
                    image: image.into(),
                    label: label.into(),
                }),
                _ => {
                    return Err(ManifestError::MissingColumn {
                        path,
                        row,
                        found: record.len(),
                    })
                }
            }
        }
        Ok(Self { path, entries })
    }

    /// 直接由若干条目构造.
    pub fn from_entries<I: IntoIterator<Item = ManifestEntry>>(entries: I) -> Self {
        Self {
            path: PathBuf::new(),
            entries: entries.into_iter().collect(),
        }
    }

    /// 清单文件路径. 由 [`Manifest::from_entries`] 构造时为空.
    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 行数.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// 是否为空?
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 第 `row` 行.
    #[inline]
    pub fn get(&self, row: usize) -> Option<&ManifestEntry> {
        self.entries.get(row)
    }

    /// 按行序迭代.
    #[inline]
    pub fn iter(&self) -> std::slice::Iter<'_, ManifestEntry> {
        self.entries.iter()
    }
}

impl<'a> IntoIterator for &'a Manifest {
    type Item = &'a ManifestEntry;
    type IntoIter = std::slice::Iter<'a, ManifestEntry>;

    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::Manifest;
    use crate::error::ManifestError;
    use std::path::Path;

    #[test]
    fn test_read_with_header() {
        let text = "image,label,site\na/img0.nii.gz, a/lab0.nii.gz ,x\nb/img1.nii,b/lab1.nii,y\n";
        let m = Manifest::from_reader(text.as_bytes(), true, "train.csv").unwrap();
        assert_eq!(m.len(), 2);
        let e = m.get(0).unwrap();
        assert_eq!(e.image, Path::new("a/img0.nii.gz"));
        assert_eq!(e.label, Path::new("a/lab0.nii.gz"));
        assert_eq!(m.iter().nth(1).unwrap().label, Path::new("b/lab1.nii"));
        assert!(m.get(2).is_none());
    }

    #[test]
    fn test_read_without_header() {
        let text = "img0.nii,lab0.nii\n";
        assert_eq!(Manifest::from_reader(text.as_bytes(), false, "m.csv").unwrap().len(), 1);
        assert!(Manifest::from_reader(text.as_bytes(), true, "m.csv").unwrap().is_empty());
    }

    #[test]
    fn test_missing_column() {
        let text = "image,label\nimg0.nii,lab0.nii\nimg1.nii\n";
        let e = Manifest::from_reader(text.as_bytes(), true, "m.csv").unwrap_err();
        assert!(matches!(e, ManifestError::MissingColumn { row: 1, found: 1, .. }));
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let e = Manifest::open(dir.path().join("none.csv"), true).unwrap_err();
        assert!(matches!(e, ManifestError::Io { .. }));
    }
}
