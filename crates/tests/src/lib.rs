//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 配置文件 → 处理配置
//! - 合成录制 → worker → sinks 的端到端流程（无需真实设备）

#[cfg(test)]
mod contract_tests {
    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::{Channel, ProcessingConfig, SinkType};

    #[test]
    fn test_default_config_survives_toml_round_trip() {
        let toml = ConfigLoader::to_toml(&ProcessingConfig::default()).unwrap();
        let config = ConfigLoader::load_from_str(&toml, ConfigFormat::Toml).unwrap();
        assert_eq!(config.analysis.window_minutes, 5);
        assert_eq!(config.analysis.channels, Channel::PHOTODETECTORS.to_vec());
        assert_eq!(config.ppi.low_ms, 667.0);
    }

    #[test]
    fn test_json_config_with_sinks() {
        let json = r#"{
            "analysis": { "channels": ["p1"], "calculate_hrv": false },
            "sinks": [ { "name": "tables", "sink_type": "csv", "params": { "dir": "out" } } ]
        }"#;
        let config = ConfigLoader::load_from_str(json, ConfigFormat::Json).unwrap();
        assert_eq!(config.analysis.channels, vec![Channel::P1]);
        assert!(!config.analysis.calculate_hrv);
        assert_eq!(config.sinks[0].sink_type, SinkType::Csv);
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::fs;
    use std::io::Cursor;
    use std::path::Path;

    use config_loader::ConfigLoader;
    use contracts::{
        Channel, MalformedPolicy, ProcessingConfig, ProcessingResults, SinkConfig, SinkType,
        StopHandle,
    };
    use dispatcher::create_dispatcher;
    use ingestion::{
        IngestionError, RecordReader, Recording, SyntheticConfig, SyntheticFormat,
        SyntheticRecording,
    };
    use observability::ProcessingMetricsAggregator;
    use processing::{collecting_callback, BatchWorker, DirectoryWorker, FileWorker};

    fn write_session(dir: &Path, config: SyntheticConfig) {
        SyntheticRecording::generate(config).write_to_dir(dir).unwrap();
    }

    fn p0_only() -> ProcessingConfig {
        let mut config = ProcessingConfig::default();
        config.analysis.channels = vec![Channel::P0];
        config
    }

    fn dispatch_to(dir: &Path, results: &ProcessingResults) {
        let dir = dir.display().to_string();
        let mut dispatcher = create_dispatcher(vec![
            SinkConfig::new("console", SinkType::Log),
            SinkConfig::new("csv", SinkType::Csv).with_param("dir", &dir),
            SinkConfig::new("json", SinkType::Json).with_param("dir", &dir),
        ])
        .unwrap();
        dispatcher.dispatch(results).unwrap();
    }

    /// 读取器：设备示例行与格式错误行
    #[test]
    fn test_reader_on_device_lines() {
        let input = "499,270445,314778,266630,1042\n0,269394,313184,265681,1079\n1,2,3\n0,270102,314364,266328,1023\n";

        let samples: Vec<_> = RecordReader::new(Cursor::new(input))
            .with_policy(MalformedPolicy::Skip)
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(samples.len(), 3);
        assert_eq!(samples[0].delta_or_timestamp, 499);
        assert_eq!(samples[1].ambient, 1079);

        let err = RecordReader::new(Cursor::new(input))
            .collect::<Result<Vec<_>, _>>()
            .unwrap_err();
        assert!(matches!(err, IngestionError::MalformedRecord { line_number: 3, .. }));
    }

    /// 合成 60 bpm → FileWorker → csv/json
    #[test]
    fn test_single_file_end_to_end() {
        let root = tempfile::tempdir().unwrap();
        let session = root.path().join("Epoch1");
        write_session(
            &session,
            SyntheticConfig {
                duration_secs: 180.0,
                ..Default::default()
            },
        );

        let recording =
            Recording::load(&session.join("ppg.csv"), None, MalformedPolicy::Abort).unwrap();
        let rate = signal::estimate_sampling_rate(&recording.times()).unwrap();
        assert!((rate - 25.0).abs() < 0.5, "rate {rate}");

        let (callback, events) = collecting_callback();
        let results = FileWorker::new(session.join("ppg.csv"), ProcessingConfig::default())
            .with_progress(callback)
            .run()
            .unwrap();
        assert_eq!(results.source, "Epoch1_ppg");

        for channel in Channel::PHOTODETECTORS {
            let result = &results.channels[&channel];
            let mean = result.ppi.iter().map(|r| r.ppi_ms).sum::<f64>() / result.ppi.len() as f64;
            assert!((mean - 1000.0).abs() < 20.0, "{channel}: mean {mean}");
            assert!(result.hrv.as_ref().is_some_and(|w| !w.is_empty()));
        }
        assert!(events
            .lock()
            .unwrap()
            .contains(&contracts::ProgressEvent::Progress(100)));

        let out = root.path().join("out");
        dispatch_to(&out, &results);
        assert!(out.join("Epoch1_ppg_P0_ppi.csv").exists());
        assert!(out.join("Epoch1_ppg_P2_hrv.csv").exists());

        let summary: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(out.join("Epoch1_ppg_summary.json")).unwrap())
                .unwrap();
        let heart_rate = summary["channels"]["p0"]["heart_rate_bpm"].as_f64().unwrap();
        assert!((heart_rate - 60.0).abs() < 2.0, "heart rate {heart_rate}");
    }

    /// 绝对时间戳格式无需 info.txt
    #[test]
    fn test_absolute_timestamps() {
        let root = tempfile::tempdir().unwrap();
        write_session(
            root.path(),
            SyntheticConfig {
                format: SyntheticFormat::Absolute,
                heart_rate_bpm: 80.0,
                ..Default::default()
            },
        );
        assert!(!root.path().join("info.txt").exists());

        let results = FileWorker::new(root.path().join("ppg.csv"), p0_only())
            .run()
            .unwrap();
        let ppi = &results.channels[&Channel::P0].ppi;
        let mean = ppi.iter().map(|r| r.ppi_ms).sum::<f64>() / ppi.len() as f64;
        assert!((mean - 750.0).abs() < 20.0, "mean {mean}");
    }

    /// 配置文件 → DirectoryWorker：时间段过滤与文件夹标注
    #[test]
    fn test_directory_with_config_file() {
        let root = tempfile::tempdir().unwrap();
        let data = root.path().join("data");
        // 22:13:20 and 23:13:20 UTC
        write_session(&data.join("Epoch1"), SyntheticConfig::default());
        write_session(
            &data.join("Epoch2"),
            SyntheticConfig {
                start_time_s: 1_700_003_600,
                ..Default::default()
            },
        );

        let config_path = root.path().join("ppg.toml");
        fs::write(
            &config_path,
            "[analysis]\nchannels = [\"p0\"]\n\n[time_range]\nstart = \"22:00\"\nend = \"23:00\"\n",
        )
        .unwrap();
        let config = ConfigLoader::load_from_path(&config_path).unwrap();

        let results = DirectoryWorker::new(&data, config).run().unwrap();
        let result = &results.channels[&Channel::P0];
        assert!(!result.ppi.is_empty());
        assert!(result
            .ppi
            .iter()
            .all(|r| r.folder.as_deref() == Some("Epoch1")));
        let overall = result.overall.as_ref().unwrap();
        assert_eq!(overall.time_range, None);
        assert!(result
            .hrv
            .iter()
            .flatten()
            .all(|w| w.folder.as_deref() == Some("Epoch1")));
    }

    /// 批量处理在阻塞线程池上运行，与 CLI 相同
    #[tokio::test]
    async fn test_batch_on_blocking_pool() {
        let root = tempfile::tempdir().unwrap();
        write_session(&root.path().join("P001").join("Epoch1"), SyntheticConfig::default());
        write_session(
            &root.path().join("P002").join("Epoch1"),
            SyntheticConfig {
                start_time_s: 1_700_003_600,
                heart_rate_bpm: 75.0,
                ..Default::default()
            },
        );

        let worker = BatchWorker::new(root.path(), p0_only());
        let results = tokio::task::spawn_blocking(move || worker.run())
            .await
            .unwrap()
            .unwrap();

        let result = &results.channels[&Channel::P0];
        assert!(result.ppi.iter().any(|r| r.participant.as_deref() == Some("P001")));
        assert!(result.ppi.iter().any(|r| r.participant.as_deref() == Some("P002")));
        assert!(result.overall.is_some());

        let out = tempfile::tempdir().unwrap();
        dispatch_to(out.path(), &results);
        let base = results.source.clone();
        let table = fs::read_to_string(out.path().join(format!("{base}_P0_ppi.csv"))).unwrap();
        assert!(table.starts_with("Time,PPI,Amplitude,Quality,Folder,Participant"));
        assert!(table.contains(",Epoch1,P002"));

        let mut aggregator = ProcessingMetricsAggregator::new();
        aggregator.update(&results);
        let summary = aggregator.summary();
        assert_eq!(summary.total_ppi as usize, results.total_ppi());
        assert!(summary.heart_rate_bpm.is_some());
    }

    /// 停止标志在文件夹之间生效
    #[tokio::test]
    async fn test_stop_before_start_returns_empty_results() {
        let root = tempfile::tempdir().unwrap();
        write_session(&root.path().join("Epoch1"), SyntheticConfig::default());

        let stop = StopHandle::new();
        let worker = DirectoryWorker::new(root.path(), p0_only()).with_stop_handle(stop.clone());
        stop.stop();

        let results = tokio::task::spawn_blocking(move || worker.run())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(results.total_ppi(), 0);
    }
}
