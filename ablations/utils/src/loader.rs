//! 对 `seg-berry::dataset` 的更一层封装. 从环境变量或用户主目录解析数据集位置.

use log::warn;
use seg_berry::dataset;
use std::env;
use std::path::PathBuf;

/// 读取非空环境变量.
fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.is_empty())
}

/// 获取数据清单路径.
///
/// 1. 若环境变量 `$SEG_MANIFEST` 非空, 则返回其值;
/// 2. 否则, 返回 `$HOME/dataset/localisation/train.csv`.
///
/// 两者都不可用时返回 `None`.
pub fn manifest_from_env_or_home() -> Option<PathBuf> {
    match non_empty_var("SEG_MANIFEST") {
        Some(p) => Some(PathBuf::from(p)),
        None => dataset::default_manifest(),
    }
}

/// 获取数据根目录, 清单中的相对路径相对该目录解析.
///
/// 1. 若环境变量 `$SEG_DATA_ROOT` 非空, 则返回其值;
/// 2. 否则, 返回 `$HOME/dataset/localisation`.
///
/// 两者都不可用时返回 `None`.
pub fn data_root_from_env_or_home() -> Option<PathBuf> {
    match non_empty_var("SEG_DATA_ROOT") {
        Some(p) => Some(PathBuf::from(p)),
        None => dataset::default_data_root(),
    }
}

/// 获取随机种子 `$SEG_SEED`. 未设置或无法解析为 `u64` 时返回 `None`.
pub fn seed_from_env() -> Option<u64> {
    let raw = non_empty_var("SEG_SEED")?;
    match raw.parse() {
        Ok(seed) => Some(seed),
        Err(e) => {
            warn!("ignoring SEG_SEED={raw:?}: {e}");
            None
        }
    }
}
