//! 索引置换与洗牌策略.

use rand::seq::SliceRandom;
use rand::Rng;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// `0..n` 的一个排列. 第 `i` 个元素是请求索引 `i` 对应的清单行号.
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct IndexPermutation(Vec<usize>);

impl IndexPermutation {
    /// 恒等排列.
    pub fn identity(n: usize) -> Self {
        Self((0..n).collect())
    }

    /// 均匀随机排列.
    pub fn shuffled<R: Rng + ?Sized>(n: usize, rng: &mut R) -> Self {
        Self::identity(n).reshuffled(rng)
    }

    /// 返回一个新的均匀随机排列, `self` 不变.
    pub fn reshuffled<R: Rng + ?Sized>(&self, rng: &mut R) -> Self {
        let mut v = self.0.clone();
        v.shuffle(rng);
        Self(v)
    }

    /// 请求索引 `index` 对应的行号.
    #[inline]
    pub fn get(&self, index: usize) -> Option<usize> {
        self.0.get(index).copied()
    }

    /// 长度.
    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// 是否为空?
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// 底层序列.
    #[inline]
    pub fn as_slice(&self) -> &[usize] {
        &self.0
    }

    /// 是否恰好覆盖 `0..len` 各一次?
    pub fn is_bijection(&self) -> bool {
        let mut seen = vec![false; self.0.len()];
        self.0
            .iter()
            .all(|&i| i < seen.len() && !std::mem::replace(&mut seen[i], true))
    }
}

/// 何时重新生成排列.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ShufflePolicy {
    /// 不洗牌, 始终为恒等排列.
    Fixed,

    /// 每 `len` 次访问 (一个 epoch) 重新洗牌一次.
    /// 一个 epoch 内按 `0..len` 访问恰好覆盖每一行一次.
    #[default]
    PerEpoch,

    /// 每次访问前都重新洗牌.
    PerAccess,
}

impl ShufflePolicy {
    /// 由开关得到策略: 开启时为 [`ShufflePolicy::PerEpoch`].
    #[inline]
    pub fn from_flag(shuffle: bool) -> Self {
        if shuffle {
            Self::PerEpoch
        } else {
            Self::Fixed
        }
    }

    /// 是否会洗牌?
    #[inline]
    pub fn shuffles(&self) -> bool {
        !matches!(self, Self::Fixed)
    }

    /// 已完成 `accesses` 次访问、共 `len` 行时, 下一次访问前是否需要重新洗牌.
    #[inline]
    pub fn due(&self, accesses: usize, len: usize) -> bool {
        match self {
            Self::Fixed => false,
            Self::PerEpoch => len > 0 && accesses > 0 && accesses % len == 0,
            Self::PerAccess => true,
        }
    }
}
