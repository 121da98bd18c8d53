//! 样本源: 按索引从清单加载、预处理、增强并二值化一个训练样本.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::debug;
use ndarray::Array3;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use super::manifest::Manifest;
use super::permutation::{IndexPermutation, ShufflePolicy};
use crate::consts::label::{BACKGROUND, EPS, FOREGROUND, THRESHOLD};
use crate::data::{array_max, array_min, NiftiHeaderAttr, VolumePair};
use crate::error::{ManifestError, PipelineError};
use crate::sample::Sample;
use crate::transform::{Augmenter, Identity, Preprocessing, Transform};

/// [`SampleSource`] 的配置.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct SourceConfig {
    augment: bool,
    shuffle: ShufflePolicy,
    has_headers: bool,
    seed: Option<u64>,
}

impl Default for SourceConfig {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl SourceConfig {
    /// 不增强, 不洗牌, 清单带表头, 随机种子取自系统熵.
    pub const fn new() -> Self {
        Self {
            augment: false,
            shuffle: ShufflePolicy::Fixed,
            has_headers: true,
            seed: None,
        }
    }

    /// 是否启用数据增强.
    #[inline]
    pub fn augment(mut self, augment: bool) -> Self {
        self.augment = augment;
        self
    }

    /// 是否洗牌. 开启时使用 [`ShufflePolicy::PerEpoch`].
    #[inline]
    pub fn shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = ShufflePolicy::from_flag(shuffle);
        self
    }

    /// 指定洗牌策略.
    #[inline]
    pub fn shuffle_policy(mut self, policy: ShufflePolicy) -> Self {
        self.shuffle = policy;
        self
    }

    /// 清单首行是否为表头.
    #[inline]
    pub fn has_headers(mut self, yes: bool) -> Self {
        self.has_headers = yes;
        self
    }

    /// 固定随机种子.
    #[inline]
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// 是否启用数据增强?
    #[inline]
    pub fn augments(&self) -> bool {
        self.augment
    }

    /// 洗牌策略.
    #[inline]
    pub fn policy(&self) -> ShufflePolicy {
        self.shuffle
    }
}

/// 样本源.
///
/// 每次 [`SampleSource::get_item`] 都从磁盘重新读取并计算, 不缓存任何变换结果.
/// 访问需要 `&mut self`, 多个 worker 并行时每个 worker 应持有
/// [`SampleSource::fork`] 得到的独立副本.
#[derive(Clone, Debug)]
pub struct SampleSource<T = Identity> {
    manifest: Arc<Manifest>,
    data_root: PathBuf,
    config: SourceConfig,
    preprocessing: Preprocessing,
    augmenter: Augmenter,
    permutation: IndexPermutation,
    accesses: usize,
    rng: ChaCha8Rng,
    transform: T,
}

impl SampleSource<Identity> {
    /// 读取 `manifest_path` 处的清单, 样本路径相对 `data_root` 解析.
    pub fn open(
        manifest_path: impl AsRef<Path>,
        data_root: impl Into<PathBuf>,
        config: SourceConfig,
    ) -> Result<Self, ManifestError> {
        let manifest = Manifest::open(manifest_path, config.has_headers)?;
        Ok(Self::from_manifest(Arc::new(manifest), data_root, config))
    }

    /// 使用已加载的清单.
    pub fn from_manifest(manifest: Arc<Manifest>, data_root: impl Into<PathBuf>, config: SourceConfig) -> Self {
        let mut rng = match config.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        let permutation = if config.shuffle.shuffles() {
            IndexPermutation::shuffled(manifest.len(), &mut rng)
        } else {
            IndexPermutation::identity(manifest.len())
        };
        Self {
            manifest,
            data_root: data_root.into(),
            config,
            preprocessing: Preprocessing::new(),
            augmenter: Augmenter::standard(),
            permutation,
            accesses: 0,
            rng,
            transform: Identity,
        }
    }
}

impl<T> SampleSource<T> {
    /// 设置后置变换, 替换原有的后置变换.
    pub fn with_transform<U>(self, transform: U) -> SampleSource<U> {
        SampleSource {
            manifest: self.manifest,
            data_root: self.data_root,
            config: self.config,
            preprocessing: self.preprocessing,
            augmenter: self.augmenter,
            permutation: self.permutation,
            accesses: self.accesses,
            rng: self.rng,
            transform,
        }
    }

    /// 替换增强参数.
    #[inline]
    pub fn with_augmenter(mut self, augmenter: Augmenter) -> Self {
        self.augmenter = augmenter;
        self
    }

    /// 样本个数, 即清单行数.
    #[inline]
    pub fn len(&self) -> usize {
        self.manifest.len()
    }

    /// 是否为空?
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.manifest.is_empty()
    }

    /// 清单.
    #[inline]
    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// 数据根目录.
    #[inline]
    pub fn data_root(&self) -> &Path {
        &self.data_root
    }

    /// 配置.
    #[inline]
    pub fn config(&self) -> &SourceConfig {
        &self.config
    }

    /// 当前排列.
    #[inline]
    pub fn permutation(&self) -> &IndexPermutation {
        &self.permutation
    }

    /// 为并行 worker 创建独立副本: 共享清单, 以 `seed` 重新播种,
    /// 并据此生成自己的排列.
    pub fn fork(&self, seed: u64) -> Self
    where
        T: Clone,
    {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let permutation = if self.config.shuffle.shuffles() {
            IndexPermutation::shuffled(self.len(), &mut rng)
        } else {
            IndexPermutation::identity(self.len())
        };
        Self {
            manifest: Arc::clone(&self.manifest),
            data_root: self.data_root.clone(),
            config: self.config.seed(seed),
            preprocessing: self.preprocessing,
            augmenter: self.augmenter,
            permutation,
            accesses: 0,
            rng,
            transform: self.transform.clone(),
        }
    }

    /// 立即开始新的 epoch: 洗牌 (若策略允许) 并重置访问计数.
    pub fn start_epoch(&mut self) {
        if self.config.shuffle.shuffles() {
            self.permutation = self.permutation.reshuffled(&mut self.rng);
        }
        self.accesses = 0;
    }

    /// 按策略推进排列, 返回 `index` 对应的清单行号.
    fn resolve(&mut self, index: usize) -> Result<usize, PipelineError> {
        let len = self.len();
        if index >= len {
            return Err(PipelineError::IndexOutOfRange(index, len));
        }
        if self.config.shuffle.due(self.accesses, len) {
            self.permutation = self.permutation.reshuffled(&mut self.rng);
        }
        self.accesses += 1;
        self.permutation
            .get(index)
            .ok_or(PipelineError::IndexOutOfRange(index, len))
    }

    /// 获取第 `index` 个原始样本 (不经过后置变换).
    pub fn raw_item(&mut self, index: usize) -> Result<Sample, PipelineError> {
        let row = self.resolve(index)?;
        let len = self.len();
        let entry = self
            .manifest
            .get(row)
            .ok_or(PipelineError::IndexOutOfRange(row, len))?;
        let image_path = self.data_root.join(&entry.image);
        let label_path = self.data_root.join(&entry.label);
        let name = sample_name(&entry.image);

        let mut pair = VolumePair::open(&image_path, &label_path).map_err(|e| e.at_row(row))?;
        self.preprocessing.apply(&mut pair.image);
        let choice = self
            .config
            .augment
            .then(|| self.augmenter.augment(&mut pair, &mut self.rng));
        debug!("index {index} -> row {row} ({name}), augmentation: {choice:?}");

        let image_affine = pair.image.affine();
        let label_affine = pair.label.affine();
        let mut label = pair.label.into_data();
        binarize(&mut label);
        Ok(Sample {
            image: pair.image.into_data(),
            label,
            name,
            image_affine,
            label_affine,
        })
    }
}

impl<T: Transform<Sample>> SampleSource<T> {
    /// 获取第 `index` 个样本, 并实施后置变换.
    ///
    /// `index` 必须小于 [`SampleSource::len`]. 洗牌开启时, 同一个 `index`
    /// 在不同 epoch 中可能对应不同的清单行.
    pub fn get_item(&mut self, index: usize) -> Result<T::Output, PipelineError> {
        let sample = self.raw_item(index)?;
        self.transform.apply(sample, &mut self.rng)
    }
}

/// 标签二值化: 按自身最小/最大值归一化, 然后以 0.5 为阈值.
/// NaN 体素视为背景.
pub fn binarize(label: &mut Array3<f32>) {
    let (Some(lo), Some(hi)) = (array_min(label.view()), array_max(label.view())) else {
        label.fill(BACKGROUND);
        return;
    };
    let denom = hi - lo + EPS;
    label.mapv_inplace(|v| {
        if ((v - lo) / denom).abs() >= THRESHOLD {
            FOREGROUND
        } else {
            BACKGROUND
        }
    });
}

/// 由扫描路径得到样本名: 文件名中第一个 `.nii` 之前的部分,
/// 不含 `.nii` 时取去掉扩展名的文件名.
pub fn sample_name(image: &Path) -> String {
    let file_name = image
        .file_name()
        .map(|s| s.to_string_lossy())
        .unwrap_or_default();
    match file_name.find(".nii") {
        Some(end) => file_name[..end].to_string(),
        None => image
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::{binarize, sample_name, SampleSource, SourceConfig};
    use crate::data::tests::write_nii;
    use crate::dataset::permutation::ShufflePolicy;
    use crate::error::{LoadErrorKind, PipelineError};
    use crate::transform::{Augmenter, PatchCrop, RandomAffine, RandomMotion, RandomSpike, ToTensor, Transform};
    use ndarray::Array3;
    use std::collections::HashSet;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    /// 在临时目录中写入 `n` 对体数据和清单, 第 `i` 个扫描的体素值都不小于 `i * 1000`
    /// 以便区分.
    fn fixture(n: usize) -> TempDir {
        // 多个测试共享全局 logger, 只有第一次初始化会成功.
        let _ = simple_logger::SimpleLogger::new()
            .with_level(log::LevelFilter::Debug)
            .init();
        let dir = tempfile::tempdir().unwrap();
        let mut csv = String::from("image,label\n");
        for i in 0..n {
            let image = Array3::from_shape_fn((12, 10, 4), |(x, y, z)| (i * 1000 + x * 40 + y * 4 + z) as f32);
            let label = Array3::from_shape_fn((12, 10, 4), |(x, y, _)| {
                if (3..8).contains(&x) && (2..6).contains(&y) {
                    2.0
                } else {
                    0.0
                }
            });
            write_nii(&dir.path().join(format!("case{i}.nii")), &image);
            write_nii(&dir.path().join(format!("case{i}_seg.nii")), &label);
            csv.push_str(&format!("case{i}.nii,case{i}_seg.nii\n"));
        }
        fs::write(dir.path().join("train.csv"), csv).unwrap();
        dir
    }

    fn open(dir: &TempDir, config: SourceConfig) -> SampleSource {
        SampleSource::open(dir.path().join("train.csv"), dir.path(), config).unwrap()
    }

    #[test]
    fn test_len_and_range() {
        let dir = fixture(3);
        let mut src = open(&dir, SourceConfig::new().seed(0));
        assert_eq!(src.len(), 3);
        for i in 0..3 {
            src.get_item(i).unwrap();
        }
        assert!(matches!(
            src.get_item(3),
            Err(PipelineError::IndexOutOfRange(3, 3))
        ));
    }

    #[test]
    fn test_deterministic_without_randomness() {
        let dir = fixture(2);
        let mut src = open(&dir, SourceConfig::new());
        let a = src.get_item(1).unwrap();
        let b = src.get_item(1).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.name, "case1");
        assert_eq!(a.shape(), (12, 10, 4));
        // 预处理后强度位于 [0, 1].
        assert!(a.image.iter().all(|v| (-1e-6..=1.0 + 1e-6).contains(v)));
    }

    #[test]
    fn test_labels_binary() {
        let dir = fixture(2);
        let mut src = open(&dir, SourceConfig::new().augment(true).shuffle(true).seed(3));
        for _ in 0..3 {
            for i in 0..2 {
                let s = src.get_item(i).unwrap();
                assert!(s.is_binary());
            }
        }
        let s = open(&dir, SourceConfig::new()).get_item(0).unwrap();
        assert_eq!(s.foreground(), 5 * 4 * 4);
    }

    #[test]
    fn test_epoch_is_bijection() {
        let dir = fixture(5);
        let mut src = open(&dir, SourceConfig::new().shuffle(true).seed(11));
        assert_eq!(src.config().policy(), ShufflePolicy::PerEpoch);
        for _ in 0..2 {
            let names: HashSet<String> = (0..5).map(|i| src.get_item(i).unwrap().name).collect();
            assert_eq!(names.len(), 5);
            assert!(src.permutation().is_bijection());
        }
    }

    #[test]
    fn test_per_access_reshuffles() {
        let dir = fixture(5);
        let mut src = open(
            &dir,
            SourceConfig::new().shuffle_policy(ShufflePolicy::PerAccess).seed(1),
        );
        let mut seen = Vec::new();
        for _ in 0..20 {
            seen.push(src.raw_item(0).unwrap().name);
            assert!(src.permutation().is_bijection());
        }
        seen.sort();
        seen.dedup();
        assert!(seen.len() > 1);
    }

    #[test]
    fn test_start_epoch_reshuffles() {
        let dir = fixture(5);
        let mut src = open(&dir, SourceConfig::new().shuffle(true).seed(4));
        src.get_item(0).unwrap();
        src.get_item(1).unwrap();
        assert_eq!(src.accesses, 2);

        let mut twin = src.clone();
        let expected = twin.permutation.reshuffled(&mut twin.rng);
        src.start_epoch();
        assert_eq!(src.accesses, 0);
        assert_eq!(src.permutation(), &expected);
        assert!(src.permutation().is_bijection());

        // 新 epoch 的完整一轮仍覆盖全部样本.
        let names: HashSet<String> = (0..5).map(|i| src.get_item(i).unwrap().name).collect();
        assert_eq!(names.len(), 5);
    }

    #[test]
    fn test_start_epoch_keeps_fixed_order() {
        let dir = fixture(3);
        let mut src = open(&dir, SourceConfig::new().seed(4));
        src.get_item(2).unwrap();
        src.start_epoch();
        assert_eq!(src.accesses, 0);
        assert_eq!(src.permutation().as_slice(), &[0, 1, 2]);
    }

    #[test]
    fn test_with_augmenter_replaces_standard() {
        let dir = fixture(2);
        let never = Augmenter::new(
            RandomAffine::new((0.5, 1.5), (-180.0, 180.0), true, 0.0).unwrap(),
            RandomMotion::new(2.0, 2.0, 1, 0.0).unwrap(),
            RandomSpike::new(1, (-0.2, 0.2), 0.0).unwrap(),
        );
        let mut augmented = open(&dir, SourceConfig::new().augment(true).seed(9)).with_augmenter(never);
        let mut plain = open(&dir, SourceConfig::new());
        for i in 0..2 {
            assert_eq!(augmented.get_item(i).unwrap(), plain.get_item(i).unwrap());
        }
    }

    #[test]
    fn test_fork_is_reproducible() {
        let dir = fixture(4);
        let src = open(&dir, SourceConfig::new().augment(true).shuffle(true));
        let (mut a, mut b) = (src.fork(7), src.fork(7));
        assert_eq!(a.permutation(), b.permutation());
        for i in 0..4 {
            assert_eq!(a.get_item(i).unwrap(), b.get_item(i).unwrap());
        }
    }

    #[test]
    fn test_missing_file_names_row() {
        let dir = fixture(2);
        fs::remove_file(dir.path().join("case1_seg.nii")).unwrap();
        let mut src = open(&dir, SourceConfig::new());
        match src.get_item(1) {
            Err(PipelineError::Load(e)) => {
                assert_eq!(e.row, Some(1));
                assert_eq!(e.path, dir.path().join("case1_seg.nii"));
                assert!(matches!(e.kind, LoadErrorKind::Codec(_)));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_full_chain() {
        let dir = fixture(2);
        let crop = PatchCrop::new([8usize, 16, 4], true).unwrap();
        let mut src = open(&dir, SourceConfig::new().augment(true).seed(5)).with_transform(crop.then(ToTensor));
        for i in 0..2 {
            let p = src.get_item(i).unwrap();
            assert_eq!(p.image.shape(), &[1, 8, 16, 4]);
            assert_eq!(p.label.shape(), &[1, 8, 16, 4]);
            assert!(p.label.iter().all(|v| *v == 0.0 || *v == 1.0));
        }
    }

    #[test]
    fn test_binarize() {
        let mut a = Array3::from_shape_vec((1, 1, 5), vec![2.0, 4.0, 3.5, f32::NAN, 2.9]).unwrap();
        binarize(&mut a);
        assert_eq!(a.into_raw_vec(), vec![0.0, 1.0, 1.0, 0.0, 0.0]);

        let mut c = Array3::from_elem((2, 2, 2), 7.0f32);
        binarize(&mut c);
        assert!(c.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_sample_name() {
        assert_eq!(sample_name(Path::new("sub/case_07.nii.gz")), "case_07");
        assert_eq!(sample_name(Path::new("case.nii")), "case");
        assert_eq!(sample_name(Path::new("dir/scan.mha")), "scan");
    }
}
