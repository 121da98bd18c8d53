//! 数据集操作.

use std::path::{Path, PathBuf};

use crate::consts::{DATASET_DIR, MANIFEST_FILE};

pub mod manifest;
mod npz_archive;
pub mod permutation;
pub mod source;

pub use manifest::{Manifest, ManifestEntry};
pub use npz_archive::{write_archive, ArchiveError, NpzArchive};
pub use permutation::{IndexPermutation, ShufflePolicy};
pub use source::{SampleSource, SourceConfig};

/// 获取 `{用户主目录}/dataset` 目录.
pub fn home_dataset_dir() -> Option<PathBuf> {
    let mut ans = dirs::home_dir()?;
    ans.push("dataset");
    Some(ans)
}

/// 获取 `{用户主目录}/dataset` 目录下给定继续项组成的全路径.
pub fn home_dataset_dir_with<P: AsRef<Path>, I: IntoIterator<Item = P>>(it: I) -> Option<PathBuf> {
    let mut ans = home_dataset_dir()?;
    ans.extend(it);
    Some(ans)
}

/// 默认数据根目录 `{用户主目录}/dataset/localisation`.
#[inline]
pub fn default_data_root() -> Option<PathBuf> {
    home_dataset_dir_with([DATASET_DIR])
}

/// 默认清单 `{用户主目录}/dataset/localisation/train.csv`.
#[inline]
pub fn default_manifest() -> Option<PathBuf> {
    home_dataset_dir_with([DATASET_DIR, MANIFEST_FILE])
}
