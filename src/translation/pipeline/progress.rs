//! 进度与剩余时间估算
//!
//! 以最近 5 个速度样本的加权移动平均作为实时速度，与进度超过 10% 时
//! 一次性外推得到的总时长混合，再乘以随进度收缩的缓冲系数

use std::collections::VecDeque;
use std::fmt;
use std::time::{Duration, Instant};

use serde::{Serialize, Serializer};

/// 速度样本容量
pub const SAMPLE_CAPACITY: usize = 5;

/// 由旧到新的样本权重；样本不足 5 个时取右对齐的后缀，不重新归一化
pub const SPEED_WEIGHTS: [f64; SAMPLE_CAPACITY] = [0.1, 0.15, 0.2, 0.25, 0.3];

/// 进度超过该比例后才建立初始估计
pub const INITIAL_ESTIMATE_THRESHOLD: f64 = 0.10;

const MAX_REALTIME_WEIGHT: f64 = 0.8;

/// 剩余时间
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eta {
    /// 数据不足，尚无数值估计
    Computing,
    Remaining(Duration),
}

impl Eta {
    pub fn is_computing(&self) -> bool {
        matches!(self, Eta::Computing)
    }
}

impl fmt::Display for Eta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Eta::Computing => write!(f, "计算中..."),
            Eta::Remaining(remaining) => {
                let secs = remaining.as_secs();
                write!(f, "{:02}:{:02}", secs / 60, secs % 60)
            }
        }
    }
}

impl Serialize for Eta {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// 缓冲系数：进度 0 时为 1.2，完成时为 1.0
pub fn buffer_factor(fraction: f64) -> f64 {
    1.2 - fraction.clamp(0.0, 1.0) * 0.2
}

/// 剩余时间估算器，每次运行一个
#[derive(Debug, Clone, Default)]
pub struct ProgressEstimator {
    processed: usize,
    total: usize,
    speed_samples: VecDeque<f64>,
    initial_estimate_secs: Option<f64>,
}

impl ProgressEstimator {
    pub fn new() -> Self {
        Self {
            speed_samples: VecDeque::with_capacity(SAMPLE_CAPACITY),
            ..Default::default()
        }
    }

    pub fn processed(&self) -> usize {
        self.processed
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn samples(&self) -> impl Iterator<Item = f64> + '_ {
        self.speed_samples.iter().copied()
    }

    pub fn initial_estimate(&self) -> Option<Duration> {
        self.initial_estimate_secs.map(Duration::from_secs_f64)
    }

    /// 进度比例，范围 [0, 1]
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        (self.processed as f64 / self.total as f64).min(1.0)
    }

    pub fn percent(&self) -> f64 {
        self.fraction() * 100.0
    }

    /// 加权平均速度（条目/秒）
    pub fn weighted_speed(&self) -> f64 {
        let weights = &SPEED_WEIGHTS[SAMPLE_CAPACITY - self.speed_samples.len()..];
        self.speed_samples
            .iter()
            .zip(weights)
            .map(|(speed, weight)| speed * weight)
            .sum()
    }

    fn push_sample(&mut self, speed: f64) {
        if self.speed_samples.len() == SAMPLE_CAPACITY {
            self.speed_samples.pop_front();
        }
        self.speed_samples.push_back(speed);
    }

    /// 记录一次进度并给出剩余时间
    pub fn update(&mut self, processed: usize, total: usize, elapsed: Duration) -> Eta {
        self.processed = processed;
        self.total = total;

        let elapsed_secs = elapsed.as_secs_f64();
        // 首个回调尚无已处理条目，速度为零的样本会拉低加权平均，不计入
        if processed == 0 || total == 0 || elapsed_secs <= f64::EPSILON {
            return Eta::Computing;
        }

        self.push_sample(processed as f64 / elapsed_secs);

        let speed = self.weighted_speed();
        if speed <= 0.0 {
            return Eta::Computing;
        }

        let fraction = self.fraction();
        if self.initial_estimate_secs.is_none() && fraction > INITIAL_ESTIMATE_THRESHOLD {
            let initial = elapsed_secs / fraction;
            tracing::debug!("初始预估总时长: {:.1}s", initial);
            self.initial_estimate_secs = Some(initial);
        }

        let Some(initial) = self.initial_estimate_secs else {
            return Eta::Computing;
        };

        let remaining_entries = total.saturating_sub(processed) as f64;
        let realtime_remaining = remaining_entries / speed;
        let initial_remaining = initial * (1.0 - fraction);

        let weight_realtime = (fraction + 0.2).min(MAX_REALTIME_WEIGHT);
        let weight_initial = 1.0 - weight_realtime;

        let estimate = (initial_remaining * weight_initial + realtime_remaining * weight_realtime)
            * buffer_factor(fraction);

        Eta::Remaining(Duration::from_secs_f64(estimate.max(0.0)))
    }
}

/// 进度事件节流：两次发出之间至少间隔 `interval`，期间的更新被合并
#[derive(Debug, Clone)]
pub struct ProgressThrottle {
    interval: Duration,
    last_emit: Instant,
}

impl ProgressThrottle {
    /// `started` 视为上一次发出的时间
    pub fn new(interval: Duration, started: Instant) -> Self {
        Self {
            interval,
            last_emit: started,
        }
    }

    pub fn ready(&mut self, now: Instant) -> bool {
        if now.saturating_duration_since(self.last_emit) >= self.interval {
            self.last_emit = now;
            true
        } else {
            false
        }
    }
}
