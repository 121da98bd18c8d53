//! 通用常量.

/// 标签二值化.
pub mod label {
    /// 归一化分母的下限, 防止常量标签除零.
    pub const EPS: f32 = 1e-6;

    /// 归一化后 `>= THRESHOLD` 的体素视为前景.
    pub const THRESHOLD: f32 = 0.5;

    /// 前景值.
    pub const FOREGROUND: f32 = 1.0;

    /// 背景值.
    pub const BACKGROUND: f32 = 0.0;
}

/// 数据增强的固定参数.
pub mod augment {
    /// 随机仿射: 各向同性缩放因子范围.
    pub const AFFINE_SCALES: (f64, f64) = (0.5, 1.5);

    /// 随机仿射: 每个轴的旋转角范围 (度).
    pub const AFFINE_DEGREES: (f64, f64) = (-180.0, 180.0);

    /// 随机仿射: 实施概率.
    pub const AFFINE_P: f64 = 1.0;

    /// 运动伪影: 旋转抖动幅度 (度).
    pub const MOTION_DEGREES: f64 = 2.0;

    /// 运动伪影: 平移抖动幅度 (毫米).
    pub const MOTION_TRANSLATION: f64 = 2.0;

    /// 运动伪影: 运动事件次数.
    pub const MOTION_TRANSFORMS: usize = 1;

    /// 运动伪影: 实施概率.
    pub const MOTION_P: f64 = 0.25;

    /// 尖峰伪影: 尖峰个数.
    pub const SPIKE_COUNT: usize = 1;

    /// 尖峰伪影: 强度范围 (相对频谱最大模长).
    pub const SPIKE_INTENSITY: (f64, f64) = (-0.2, 0.2);

    /// 尖峰伪影: 实施概率.
    pub const SPIKE_P: f64 = 0.2;
}

/// 默认数据集目录名 (位于 `$HOME/dataset` 下).
pub const DATASET_DIR: &str = "localisation";

/// 默认清单文件名.
pub const MANIFEST_FILE: &str = "train.csv";
