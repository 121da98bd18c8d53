//! 程序运行函数.

use crate::profile::Profile;
use crate::result::AblationResult;
use log::{debug, info};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use seg_berry::prelude::*;
use std::fmt;
use std::thread::{self, ScopedJoinHandle};
use utils::loader;

/// patch 前两个轴的边长. 深度随样本.
const PATCH: usize = 64;

/// 未指定 `$SEG_SEED` 时使用的种子.
const DEFAULT_SEED: u64 = 0x5eed;

/// 运行错误.
#[derive(Debug)]
pub enum RunError {
    /// 无法确定数据集位置.
    NoDataset,

    /// 读取清单错误.
    Manifest(ManifestError),

    /// 构建样本错误.
    Pipeline(PipelineError),
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoDataset => write!(
                f,
                "cannot locate dataset: set SEG_MANIFEST and SEG_DATA_ROOT"
            ),
            Self::Manifest(e) => e.fmt(f),
            Self::Pipeline(e) => e.fmt(f),
        }
    }
}

impl std::error::Error for RunError {}

impl From<ManifestError> for RunError {
    fn from(e: ManifestError) -> Self {
        Self::Manifest(e)
    }
}

impl From<PipelineError> for RunError {
    fn from(e: PipelineError) -> Self {
        Self::Pipeline(e)
    }
}

/// 等待线程结束. 线程 panic 时在当前线程继续 panic.
fn join<T>(h: ScopedJoinHandle<'_, T>) -> T {
    h.join().unwrap_or_else(|e| std::panic::resume_unwind(e))
}

/// 用 `workers` 个独立副本以 `mode` 裁剪整个数据集.
///
/// 第 `w` 个 worker 处理下标 `w, w + workers, ...`, 副本种子为 `seed + w`.
/// 因此不同模式看到的原始样本 (包括增强结果) 完全相同.
fn run_mode(
    source: &SampleSource,
    mode: CropMode,
    seed: u64,
    workers: usize,
) -> Result<Profile, PipelineError> {
    let profile = Profile::new();
    let n = source.len();
    let parts = thread::scope(|s| {
        let handles: Vec<_> = (0..workers)
            .map(|w| {
                let mut src = source.fork(seed.wrapping_add(w as u64));
                s.spawn(move || -> Result<Profile, PipelineError> {
                    let mut rng = ChaCha8Rng::seed_from_u64(seed ^ w as u64);
                    let mut profile = Profile::new();
                    for index in (w..n).step_by(workers) {
                        let sample = src.raw_item(index)?;
                        let (_, _, depth) = sample.shape();
                        let total = sample.foreground() as u64;
                        let crop = PatchCrop::with_target(TargetSize::new(PATCH, PATCH, depth)?, mode);

                        profile.crop_start();
                        let patch = crop.crop(sample, &mut rng)?;
                        profile.crop_elapsed();

                        let kept = patch.foreground() as u64;
                        debug!("{mode:?}: {} keeps {kept}/{total} foreground voxels", patch.name);
                        profile.count_sample(kept, total);
                    }
                    Ok(profile)
                })
            })
            .collect();
        handles.into_iter().map(join).collect::<Result<Vec<_>, _>>()
    })?;
    Ok(parts.iter().fold(profile, Profile::merge).finish())
}

/// 实际运行.
pub fn run() -> Result<AblationResult, RunError> {
    let manifest = loader::manifest_from_env_or_home().ok_or(RunError::NoDataset)?;
    let data_root = loader::data_root_from_env_or_home().ok_or(RunError::NoDataset)?;
    let seed = loader::seed_from_env().unwrap_or(DEFAULT_SEED);

    // 不洗牌, 保证下标即清单行号, 各 worker 恰好分摊全部样本.
    let config = SourceConfig::new().augment(true).seed(seed);
    let source = SampleSource::open(&manifest, &data_root, config)?;
    let workers = (utils::cpus() / 2).clamp(1, source.len().max(1));
    info!(
        "{} samples from {}, {workers} workers per mode, seed {seed}",
        source.len(),
        manifest.display()
    );

    let source = &source;
    let profiles = thread::scope(|s| {
        let handles = [CropMode::Random, CropMode::Centroid]
            .map(|mode| s.spawn(move || run_mode(source, mode, seed, workers)));
        handles.map(join)
    });
    let [random, centroid] = profiles;
    Ok([("random", random?), ("centroid", centroid?)]
        .into_iter()
        .collect())
}
