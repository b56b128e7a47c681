//! PpgSample - Ingestion 输出
//!
//! 单行 CSV 记录对应的原始 PPG 样本。

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 每条记录的字段数
pub const FIELD_COUNT: usize = 5;

/// PPG 样本
///
/// 列顺序固定：`delta/timestamp, P0, P1, P2, AMBIENT`。解析后不可变。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PpgSample {
    /// 第一列：增量或时间戳（语义由时间轴格式决定）
    pub delta_or_timestamp: u64,

    /// 光电通道 0
    pub p0: i64,

    /// 光电通道 1
    pub p1: i64,

    /// 光电通道 2
    pub p2: i64,

    /// 环境光通道
    pub ambient: i64,
}

impl PpgSample {
    /// 构造样本
    pub fn new(delta_or_timestamp: u64, p0: i64, p1: i64, p2: i64, ambient: i64) -> Self {
        Self {
            delta_or_timestamp,
            p0,
            p1,
            p2,
            ambient,
        }
    }

    /// 读取指定通道的原始值
    pub fn channel(&self, channel: Channel) -> i64 {
        match channel {
            Channel::P0 => self.p0,
            Channel::P1 => self.p1,
            Channel::P2 => self.p2,
            Channel::Ambient => self.ambient,
        }
    }
}

/// 输出为与输入完全一致的 5 字段 CSV 行（不含换行）
impl fmt::Display for PpgSample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{},{},{},{}",
            self.delta_or_timestamp, self.p0, self.p1, self.p2, self.ambient
        )
    }
}

/// 传感器通道
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    P0,
    P1,
    P2,
    Ambient,
}

impl Channel {
    /// 可处理的光电通道（不含环境光）
    pub const PHOTODETECTORS: [Channel; 3] = [Channel::P0, Channel::P1, Channel::P2];

    /// CSV 列名
    pub fn column_name(&self) -> &'static str {
        match self {
            Channel::P0 => "P0",
            Channel::P1 => "P1",
            Channel::P2 => "P2",
            Channel::Ambient => "AMBIENT",
        }
    }

    /// 是否为光电通道
    pub fn is_photodetector(&self) -> bool {
        !matches!(self, Channel::Ambient)
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column_name())
    }
}

impl FromStr for Channel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "p0" => Ok(Channel::P0),
            "p1" => Ok(Channel::P1),
            "p2" => Ok(Channel::P2),
            "ambient" => Ok(Channel::Ambient),
            other => Err(format!("unknown channel '{other}'")),
        }
    }
}

/// 带绝对时间的样本
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimedSample {
    /// 展开后的绝对时间 (UTC)
    pub time: DateTime<Utc>,

    /// 原始样本
    pub sample: PpgSample,
}

/// 第一列的时间轴格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum TimelineFormat {
    /// 增量列 + info.txt 中的 start_time (秒)
    Delta { start_time_s: i64 },

    /// 绝对 unix 毫秒时间戳，批量行填 0
    Absolute { start_ms: i64, end_ms: i64 },
}
