//! 样本变换.
//!
//! 每个阶段都实现 [`Transform`], 可以用 [`Transform::then`] 串联成流水线.
//! 随机性全部来自调用方传入的随机数生成器, 因此固定种子即可复现.

use rand::Rng;

use crate::error::PipelineError;

pub mod augment;
pub mod crop;
pub mod intensity;
mod resample;
pub mod tensor;

pub use augment::{AugmentChoice, Augmentation, Augmenter, RandomAffine, RandomMotion, RandomSpike};
pub use crop::{CropMode, PadFill, PatchCrop, TargetSize};
pub use intensity::Preprocessing;
pub use tensor::ToTensor;

/// 变换阶段: 消费 `In`, 产出 `Self::Output`.
pub trait Transform<In> {
    /// 输出类型.
    type Output;

    /// 对 `input` 实施变换.
    fn apply<R: Rng + ?Sized>(&self, input: In, rng: &mut R) -> Result<Self::Output, PipelineError>;

    /// 将 `next` 串联在 `self` 之后.
    #[inline]
    fn then<T>(self, next: T) -> Chain<Self, T>
    where
        Self: Sized,
        T: Transform<Self::Output>,
    {
        Chain(self, next)
    }
}

/// 空变换, 原样返回输入.
#[derive(Copy, Clone, Debug, Default)]
pub struct Identity;

impl<In> Transform<In> for Identity {
    type Output = In;

    #[inline]
    fn apply<R: Rng + ?Sized>(&self, input: In, _rng: &mut R) -> Result<In, PipelineError> {
        Ok(input)
    }
}

/// 两个变换的串联, 由 [`Transform::then`] 创建.
#[derive(Copy, Clone, Debug)]
pub struct Chain<A, B>(A, B);

impl<In, A, B> Transform<In> for Chain<A, B>
where
    A: Transform<In>,
    B: Transform<A::Output>,
{
    type Output = B::Output;

    #[inline]
    fn apply<R: Rng + ?Sized>(&self, input: In, rng: &mut R) -> Result<Self::Output, PipelineError> {
        let mid = self.0.apply(input, rng)?;
        self.1.apply(mid, rng)
    }
}
