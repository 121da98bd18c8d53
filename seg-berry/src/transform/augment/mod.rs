//! 数据增强: 随机仿射、运动伪影、尖峰伪影, 以及它们的组合分派.
//!
//! 分派分两步: [`AugmentChoice::draw`] 均匀抽取一个分支,
//! [`Augmenter::apply`] 执行该分支. 两步分开以便单独测试抽样分布.

use rand::Rng;

use crate::data::VolumePair;

mod kspace;
mod motion;
mod spatial;
mod spike;

pub use motion::RandomMotion;
pub use spatial::{AffineParams, RandomAffine};
pub use spike::RandomSpike;

/// 作用于一对体数据的随机增强.
pub trait Augmentation {
    /// 就地实施增强. 返回是否实际修改了数据 (增强各自带有实施概率).
    fn augment<R: Rng + ?Sized>(&self, pair: &mut VolumePair, rng: &mut R) -> bool;
}

/// 增强分支.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum AugmentChoice {
    /// 仅随机仿射.
    AffineOnly,

    /// 仅运动伪影.
    MotionOnly,

    /// 仅尖峰伪影.
    SpikeOnly,

    /// 随机仿射, 然后运动伪影.
    AffineAndMotion,
}

impl AugmentChoice {
    /// 全部分支.
    pub const ALL: [Self; 4] = [
        Self::AffineOnly,
        Self::MotionOnly,
        Self::SpikeOnly,
        Self::AffineAndMotion,
    ];

    /// 均匀抽取一个分支.
    #[inline]
    pub fn draw<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self::ALL[rng.gen_range(0..Self::ALL.len())]
    }

    /// 分支在 [`AugmentChoice::ALL`] 中的下标.
    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }
}

/// 持有三种增强并按 [`AugmentChoice`] 分派.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Augmenter {
    affine: RandomAffine,
    motion: RandomMotion,
    spike: RandomSpike,
}

impl Augmenter {
    /// 训练流水线使用的固定参数.
    pub const fn standard() -> Self {
        Self {
            affine: RandomAffine::standard(),
            motion: RandomMotion::standard(),
            spike: RandomSpike::standard(),
        }
    }

    /// 使用自定义的增强.
    pub const fn new(affine: RandomAffine, motion: RandomMotion, spike: RandomSpike) -> Self {
        Self {
            affine,
            motion,
            spike,
        }
    }

    /// 执行分支 `choice`. 返回是否有增强实际修改了数据.
    pub fn apply<R: Rng + ?Sized>(&self, choice: AugmentChoice, pair: &mut VolumePair, rng: &mut R) -> bool {
        match choice {
            AugmentChoice::AffineOnly => self.affine.augment(pair, rng),
            AugmentChoice::MotionOnly => self.motion.augment(pair, rng),
            AugmentChoice::SpikeOnly => self.spike.augment(pair, rng),
            AugmentChoice::AffineAndMotion => {
                let a = self.affine.augment(pair, rng);
                let m = self.motion.augment(pair, rng);
                a || m
            }
        }
    }

    /// 抽取一个分支并执行, 返回抽到的分支.
    pub fn augment<R: Rng + ?Sized>(&self, pair: &mut VolumePair, rng: &mut R) -> AugmentChoice {
        let choice = AugmentChoice::draw(rng);
        self.apply(choice, pair, rng);
        choice
    }
}
