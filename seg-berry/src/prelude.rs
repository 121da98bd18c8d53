//! 🍇欢迎光临🍓
//!
//! 涵盖了本 crate 一系列常用的功能.

pub use crate::Idx3d;

pub use crate::data::{Affine, NiftiHeaderAttr, Volume, VolumeKind, VolumePair};
pub use crate::sample::{PackagedSample, Sample};

pub use crate::dataset::{self, home_dataset_dir_with};
pub use crate::dataset::{Manifest, SampleSource, ShufflePolicy, SourceConfig};

pub use crate::error::{ConfigError, LoadError, ManifestError, PipelineError, ShapeError};

pub use crate::transform::{
    AugmentChoice, Augmenter, CropMode, PadFill, PatchCrop, Preprocessing, TargetSize, ToTensor,
    Transform,
};
