//! 合成 PPG 录制
//!
//! 无真实设备时用于测试和演示：按给定心率生成脉搏波形（收缩峰 + 重搏波），
//! 叠加可复现的随机噪声，并按设备的批量写入方式填充第一列。

use std::f64::consts::PI;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use contracts::PpgSample;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::info;

use crate::error::{IngestionError, Result};
use crate::record::RecordWriter;
use crate::recording::RECORDING_FILE;
use crate::timeline::INFO_FILE;

/// 第一列的写入方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyntheticFormat {
    /// 批量首行写入距上批的毫秒增量，起始时间写入 info.txt
    #[default]
    Delta,
    /// 批量首行和末行写入 unix 毫秒时间戳
    Absolute,
}

/// 合成配置
#[derive(Debug, Clone)]
pub struct SyntheticConfig {
    /// 采样率 (Hz)
    pub sample_rate_hz: f64,

    /// 心率 (次/分)
    pub heart_rate_bpm: f64,

    /// 时长 (秒)
    pub duration_secs: f64,

    /// 光电通道直流分量
    pub dc_level: f64,

    /// 脉搏波幅度
    pub amplitude: f64,

    /// 环境光水平
    pub ambient_level: f64,

    /// 均匀噪声幅度
    pub noise: f64,

    /// 随机种子
    pub seed: u64,

    /// 第一列格式
    pub format: SyntheticFormat,

    /// 起始时间 (unix 秒)
    pub start_time_s: i64,

    /// 每批行数
    pub batch_size: usize,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            sample_rate_hz: 25.0,
            heart_rate_bpm: 60.0,
            duration_secs: 120.0,
            dc_level: 270_000.0,
            amplitude: 2_000.0,
            ambient_level: 1_000.0,
            noise: 20.0,
            seed: 42,
            format: SyntheticFormat::Delta,
            start_time_s: 1_700_000_000,
            batch_size: 25,
        }
    }
}

/// Generated recording
#[derive(Debug, Clone)]
pub struct SyntheticRecording {
    /// Generation settings
    pub config: SyntheticConfig,

    /// Samples in file order
    pub samples: Vec<PpgSample>,
}

/// 三个光电通道相对直流分量的比例
const CHANNEL_GAINS: [f64; 3] = [1.0, 1.15, 0.95];

impl SyntheticRecording {
    /// Generate samples from the configuration
    pub fn generate(config: SyntheticConfig) -> Self {
        let fs = config.sample_rate_hz;
        let n = (config.duration_secs * fs).round().max(0.0) as usize;
        let batch = config.batch_size.max(1);
        let period_ms = 1000.0 / fs;
        let start_ms = config.start_time_s.saturating_mul(1000);
        let mut rng = StdRng::seed_from_u64(config.seed);

        let samples = (0..n)
            .map(|i| {
                let t = i as f64 / fs;
                let wave = pulse_shape(t * config.heart_rate_bpm / 60.0);

                let mut channel = |gain: f64| {
                    let value = config.dc_level * gain + config.amplitude * gain * wave;
                    (value + noise(&mut rng, config.noise)).round() as i64
                };
                let p0 = channel(CHANNEL_GAINS[0]);
                let p1 = channel(CHANNEL_GAINS[1]);
                let p2 = channel(CHANNEL_GAINS[2]);
                let ambient =
                    (config.ambient_level + noise(&mut rng, config.noise / 4.0)).round() as i64;

                let first = match config.format {
                    SyntheticFormat::Delta if i % batch == 0 => {
                        let rows = batch.min(n - 1 - i);
                        (rows as f64 * period_ms).round() as u64
                    }
                    SyntheticFormat::Absolute if i % batch == 0 || i == n - 1 => {
                        (start_ms as f64 + i as f64 * period_ms).round() as u64
                    }
                    _ => 0,
                };

                PpgSample::new(first, p0, p1, p2, ambient.max(0))
            })
            .collect();

        Self { config, samples }
    }

    /// Write samples in the CSV record format
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<W> {
        let mut writer = RecordWriter::new(writer);
        writer.write_all(&self.samples)?;
        writer.into_inner()
    }

    /// Write `ppg.csv` (and `info.txt` for the delta format) into `dir`
    pub fn write_to_dir(&self, dir: &Path) -> Result<PathBuf> {
        fs::create_dir_all(dir).map_err(|e| IngestionError::io(dir.display().to_string(), e))?;

        let path = dir.join(RECORDING_FILE);
        let file =
            fs::File::create(&path).map_err(|e| IngestionError::io(path.display().to_string(), e))?;
        self.write_csv(file)?;

        if self.config.format == SyntheticFormat::Delta {
            let info_path = dir.join(INFO_FILE);
            fs::write(&info_path, format!("start_time: {}\n", self.config.start_time_s))
                .map_err(|e| IngestionError::io(info_path.display().to_string(), e))?;
        }

        info!(
            path = %path.display(),
            samples = self.samples.len(),
            format = ?self.config.format,
            "synthetic recording written"
        );
        Ok(path)
    }
}

/// One cardiac cycle sampled at `beats` (cycles since start), in 0..~1.
fn pulse_shape(beats: f64) -> f64 {
    let phase = beats.fract();
    let systolic = gaussian(phase, 0.2, 0.07);
    let dicrotic = 0.35 * gaussian(phase, 0.55, 0.1);
    let baseline = 0.05 * (2.0 * PI * phase).cos();
    systolic + dicrotic + baseline
}

fn gaussian(x: f64, mu: f64, sigma: f64) -> f64 {
    (-0.5 * ((x - mu) / sigma).powi(2)).exp()
}

fn noise(rng: &mut StdRng, level: f64) -> f64 {
    if level > 0.0 {
        rng.random_range(-level..level)
    } else {
        0.0
    }
}
