//! ProcessingConfig - Config Loader 输出
//!
//! 描述一次处理任务的完整配置：分析窗口、通道、PPI 阈值、滤波器、峰值检测、时间段、输出路由。

use std::collections::HashMap;

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

use crate::{Channel, ContractError};

/// 配置版本
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// 完整的处理配置
///
/// 所有字段都有默认值，空配置文件即合法配置。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProcessingConfig {
    /// 配置版本
    #[serde(default)]
    pub version: ConfigVersion,

    /// 分析设置
    #[serde(default)]
    pub analysis: AnalysisConfig,

    /// PPI 异常值阈值
    #[serde(default)]
    pub ppi: PpiThresholds,

    /// 通道预处理带通滤波器
    #[serde(default)]
    pub filter: FilterConfig,

    /// 峰值检测设置
    #[serde(default)]
    pub detection: DetectionConfig,

    /// 一天内的时间段过滤 (可选)
    #[serde(default)]
    pub time_range: Option<TimeRange>,

    /// CSV 读取设置
    #[serde(default)]
    pub reader: ReaderConfig,

    /// 输出路由配置
    #[serde(default)]
    pub sinks: Vec<SinkConfig>,
}

/// 分析设置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// HRV 窗口长度 (分钟)，1..=60
    #[serde(default = "default_window_minutes")]
    pub window_minutes: u32,

    /// 相邻 PPI 间隔超过该值 (分钟) 时强制关闭窗口
    #[serde(default = "default_gap_minutes")]
    pub gap_minutes: f64,

    /// 要处理的通道
    #[serde(default = "default_channels")]
    pub channels: Vec<Channel>,

    /// 是否计算 HRV 指标
    #[serde(default = "default_true")]
    pub calculate_hrv: bool,

    /// 滤波前是否减去环境光通道
    #[serde(default = "default_true")]
    pub subtract_ambient: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            window_minutes: default_window_minutes(),
            gap_minutes: default_gap_minutes(),
            channels: default_channels(),
            calculate_hrv: true,
            subtract_ambient: true,
        }
    }
}

fn default_window_minutes() -> u32 {
    5
}

fn default_gap_minutes() -> f64 {
    1.0
}

fn default_channels() -> Vec<Channel> {
    Channel::PHOTODETECTORS.to_vec()
}

fn default_true() -> bool {
    true
}

/// PPI 有效范围 (毫秒)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PpiThresholds {
    #[serde(default = "default_ppi_low")]
    pub low_ms: f64,

    #[serde(default = "default_ppi_high")]
    pub high_ms: f64,
}

impl Default for PpiThresholds {
    fn default() -> Self {
        Self {
            low_ms: default_ppi_low(),
            high_ms: default_ppi_high(),
        }
    }
}

fn default_ppi_low() -> f64 {
    667.0
}

fn default_ppi_high() -> f64 {
    2000.0
}

/// Butterworth 带通滤波器参数
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FilterConfig {
    #[serde(default = "default_lowcut")]
    pub lowcut_hz: f64,

    #[serde(default = "default_highcut")]
    pub highcut_hz: f64,

    #[serde(default = "default_order")]
    pub order: usize,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            lowcut_hz: default_lowcut(),
            highcut_hz: default_highcut(),
            order: default_order(),
        }
    }
}

fn default_lowcut() -> f64 {
    0.5
}

fn default_highcut() -> f64 {
    4.0
}

fn default_order() -> usize {
    11
}

/// 峰值检测前的清洗滤波器参数
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DetectionConfig {
    #[serde(default = "default_clean_lowcut")]
    pub clean_lowcut_hz: f64,

    #[serde(default = "default_clean_highcut")]
    pub clean_highcut_hz: f64,

    #[serde(default = "default_clean_order")]
    pub clean_order: usize,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            clean_lowcut_hz: default_clean_lowcut(),
            clean_highcut_hz: default_clean_highcut(),
            clean_order: default_clean_order(),
        }
    }
}

fn default_clean_lowcut() -> f64 {
    0.5
}

fn default_clean_highcut() -> f64 {
    8.0
}

fn default_clean_order() -> usize {
    3
}

/// 一天内的时间段 ("HH:MM"，含端点)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: String,
    pub end: String,
}

impl TimeRange {
    /// 构造时间段
    pub fn new(start: impl Into<String>, end: impl Into<String>) -> Self {
        Self {
            start: start.into(),
            end: end.into(),
        }
    }

    /// 解析起止时间
    pub fn bounds(&self) -> Result<(NaiveTime, NaiveTime), ContractError> {
        Ok((
            parse_clock("time_range.start", &self.start)?,
            parse_clock("time_range.end", &self.end)?,
        ))
    }

    /// 用于结果标注的 "start-end" 文本
    pub fn label(&self) -> String {
        format!("{}-{}", self.start, self.end)
    }
}

fn parse_clock(field: &str, value: &str) -> Result<NaiveTime, ContractError> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M").map_err(|e| {
        ContractError::config_validation(field, format!("expected HH:MM, got '{value}': {e}"))
    })
}

/// 格式错误记录的处理策略
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MalformedPolicy {
    /// 遇到第一条错误记录即中止
    #[default]
    Abort,
    /// 记录警告并跳过
    Skip,
}

/// CSV 读取设置
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ReaderConfig {
    #[serde(default)]
    pub malformed: MalformedPolicy,
}

/// Sink 输出配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkConfig {
    /// Sink 名称
    pub name: String,

    /// Sink 类型
    pub sink_type: SinkType,

    /// 类型特定参数
    #[serde(default)]
    pub params: HashMap<String, String>,
}

impl SinkConfig {
    /// 构造 sink 配置
    pub fn new(name: impl Into<String>, sink_type: SinkType) -> Self {
        Self {
            name: name.into(),
            sink_type,
            params: HashMap::new(),
        }
    }

    /// 追加参数
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }
}

/// Sink 类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkType {
    /// 日志输出
    Log,
    /// CSV 文件输出
    Csv,
    /// JSON 摘要输出
    Json,
}
