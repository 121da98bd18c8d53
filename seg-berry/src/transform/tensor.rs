//! 张量打包.

use ndarray::Axis;
use rand::Rng;

use super::Transform;
use crate::error::PipelineError;
use crate::sample::{PackagedSample, Sample};

/// 为扫描与标签添加长度为 1 的前置通道轴, 形状变为 `(1, x, y, z)`.
#[derive(Copy, Clone, Debug, Default)]
pub struct ToTensor;

impl ToTensor {
    /// 打包一个样本. 名称与仿射矩阵原样保留.
    pub fn pack(sample: Sample) -> PackagedSample {
        let Sample {
            image,
            label,
            name,
            image_affine,
            label_affine,
        } = sample;
        PackagedSample {
            image: image.insert_axis(Axis(0)),
            label: label.insert_axis(Axis(0)),
            name,
            image_affine,
            label_affine,
        }
    }
}

impl Transform<Sample> for ToTensor {
    type Output = PackagedSample;

    #[inline]
    fn apply<R: Rng + ?Sized>(&self, input: Sample, _rng: &mut R) -> Result<PackagedSample, PipelineError> {
        Ok(Self::pack(input))
    }
}

#[cfg(test)]
mod tests {
    use super::ToTensor;
    use crate::data::Affine;
    use crate::sample::Sample;
    use crate::transform::Transform;
    use ndarray::{Array3, Axis};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_pack() {
        let image = Array3::from_shape_fn((3, 4, 5), |(x, y, z)| (x + y + z) as f32);
        let label = Array3::from_shape_fn((3, 4, 5), |(x, _, _)| (x % 2) as f32);
        let mut affine = Affine::identity();
        affine.0[0][3] = -12.5;
        let s = Sample {
            image: image.clone(),
            label: label.clone(),
            name: "case_0".to_string(),
            image_affine: affine,
            label_affine: Affine::identity(),
        };
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let p = ToTensor.apply(s, &mut rng).unwrap();
        assert_eq!(p.image.shape(), &[1, 3, 4, 5]);
        assert_eq!(p.label.shape(), &[1, 3, 4, 5]);
        assert_eq!(p.image.index_axis(Axis(0), 0), image.view());
        assert_eq!(p.label.index_axis(Axis(0), 0), label.view());
        assert_eq!(p.name, "case_0");
        assert_eq!(p.image_affine, affine);
    }
}
