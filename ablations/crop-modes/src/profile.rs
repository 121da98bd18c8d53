//! 裁剪运行统计.

use std::time::{Duration, Instant};

/// ablation/benchmark 计时器.
///
/// 该计时器支持 "中途中断" 与 "结束中断, 继续开始计时".
#[derive(Clone, Debug)]
struct AccTimer {
    consumed: Duration,
    since: Instant,
}

impl AccTimer {
    /// 初始化计时器. 初始化时会视为已经开始计时 (`self.start()`).
    #[inline]
    fn new() -> Self {
        Self {
            consumed: Duration::ZERO,
            since: Instant::now(),
        }
    }

    /// 开始计时.
    #[inline]
    fn start(&mut self) {
        self.since = Instant::now();
    }

    /// 结束计时, 并将这一区间的时间累加. 返回本轮计时时长.
    ///
    /// # 注意
    ///
    /// 上一次调用必须是 `self.start()`, 否则计算时间值无意义.
    #[inline]
    fn elapsed(&mut self) -> Duration {
        let d = self.since.elapsed();
        self.consumed += d;
        d
    }

    /// 并入另一个计时器累计的时间.
    #[inline]
    fn absorb(&mut self, other: &Self) {
        self.consumed += other.consumed;
    }

    /// 获得总共累计下来的时间综合 (以微秒为单位).
    #[inline]
    fn get_total_us(&self) -> u64 {
        self.consumed.as_micros() as u64
    }
}

/// 一种裁剪模式的统计.
#[derive(Clone, Debug)]
pub struct Profile {
    /// 处理的样本个数.
    samples: u64,

    /// 原始标签本身为空的样本个数.
    trivial: u64,

    /// 原始标签非空, 但 patch 中不含前景的样本个数.
    missed: u64,

    /// patch 内的前景体素总数.
    kept: u64,

    /// 原始样本的前景体素总数.
    total: u64,

    /// 裁剪本身花费的时间 (不含加载、预处理与增强).
    crop_time: AccTimer,

    /// 整个任务花费的总时间.
    real_time: AccTimer,

    /// 最耗时的一次裁剪.
    most: Option<Duration>,
}

impl Profile {
    /// 初始化. 总时间从此刻开始计时.
    #[inline]
    pub fn new() -> Self {
        Self {
            samples: 0,
            trivial: 0,
            missed: 0,
            kept: 0,
            total: 0,
            crop_time: AccTimer::new(),
            real_time: AccTimer::new(),
            most: None,
        }
    }

    /// 开始一次裁剪计时.
    #[inline]
    pub fn crop_start(&mut self) {
        self.crop_time.start();
    }

    /// 结束一次裁剪计时.
    #[inline]
    pub fn crop_elapsed(&mut self) {
        let d = self.crop_time.elapsed();
        self.most = Some(self.most.map_or(d, |m| m.max(d)));
    }

    /// 记录一个样本: patch 内前景体素 `kept`, 原始前景体素 `total`.
    pub fn count_sample(&mut self, kept: u64, total: u64) {
        self.samples += 1;
        self.kept += kept;
        self.total += total;
        match (total, kept) {
            (0, _) => self.trivial += 1,
            (_, 0) => self.missed += 1,
            _ => (),
        }
    }

    /// 并入另一个 worker 的统计. 总时间不累加.
    pub fn merge(mut self, other: &Self) -> Self {
        self.samples += other.samples;
        self.trivial += other.trivial;
        self.missed += other.missed;
        self.kept += other.kept;
        self.total += other.total;
        self.crop_time.absorb(&other.crop_time);
        self.most = match (self.most, other.most) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
        self
    }

    /// 结束全部计时.
    #[inline]
    pub fn finish(mut self) -> Self {
        self.real_time.elapsed();
        self
    }

    /// 样本个数.
    #[inline]
    pub fn get_samples(&self) -> u64 {
        self.samples
    }

    /// 原始标签为空的样本个数.
    #[inline]
    pub fn get_trivial(&self) -> u64 {
        self.trivial
    }

    /// patch 漏掉全部前景的样本个数.
    #[inline]
    pub fn get_missed(&self) -> u64 {
        self.missed
    }

    /// patch 保留的前景比例.
    #[inline]
    pub fn get_coverage(&self) -> Option<f64> {
        match self.total {
            0 => None,
            total => Some(self.kept as f64 / total as f64),
        }
    }

    /// 以微秒为单位获得裁剪总时间.
    #[inline]
    pub fn get_crop_time_us(&self) -> u64 {
        self.crop_time.get_total_us()
    }

    /// 以微秒为单位获得平均裁剪时间.
    #[inline]
    pub fn get_avg_crop_time_us(&self) -> Option<f64> {
        match self.samples {
            0 => None,
            n => Some(self.get_crop_time_us() as f64 / n as f64),
        }
    }

    /// 以微秒为单位获得任务总时间.
    #[inline]
    pub fn get_real_time_us(&self) -> u64 {
        self.real_time.get_total_us()
    }

    /// 最耗时的一次裁剪. 不存在任务时返回 `None`.
    #[inline]
    pub fn get_most_time_consuming(&self) -> Option<Duration> {
        self.most
    }
}

impl Default for Profile {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::Profile;

    #[test]
    fn test_count_and_merge() {
        let mut a = Profile::new();
        a.count_sample(10, 20);
        a.count_sample(0, 0);
        let mut b = Profile::new();
        b.count_sample(0, 5);
        b.crop_start();
        b.crop_elapsed();

        let m = a.merge(&b).finish();
        assert_eq!(m.get_samples(), 3);
        assert_eq!(m.get_trivial(), 1);
        assert_eq!(m.get_missed(), 1);
        assert_eq!(m.get_coverage(), Some(0.4));
        assert!(m.get_most_time_consuming().is_some());
        assert_eq!(Profile::new().get_coverage(), None);
    }
}
