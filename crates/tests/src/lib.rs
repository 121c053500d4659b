//! # Integration Tests
//!
//! End-to-end tests across the workspace crates.
//!
//! Covers:
//! - config contracts
//! - scripted device scenarios (no hardware)
//! - simulated rig runs with both calibration strategies
//! - runner to dispatcher hand-off

#[cfg(test)]
mod contract_tests {
    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::{CalibrationStrategy, SyncConfig};

    #[test]
    fn test_default_config_is_valid() {
        ConfigLoader::validate(&SyncConfig::default()).unwrap();
    }

    #[test]
    fn test_config_survives_toml_round_trip() {
        let mut config = SyncConfig::default();
        config.calibration.strategy = CalibrationStrategy::Pulse;
        config.imu.filter_size = 4;

        let toml = ConfigLoader::to_toml(&config).unwrap();
        let loaded = ConfigLoader::load_from_str(&toml, ConfigFormat::Toml).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_engine_accepts_loaded_config() {
        let config = ConfigLoader::load_from_str(
            r#"{"device": {"camera_rate_hz": 15}, "imu": {"filter_size": 3}}"#,
            ConfigFormat::Json,
        )
        .unwrap();
        assert!(sync_engine::SyncEngine::new(&config).is_ok());
    }
}

/// Helpers shared by the scenario tests
#[cfg(test)]
mod support {
    use bytes::Bytes;
    use contracts::{
        CameraImage, CameraInfo, CameraStrobePair, CycleTiming, FrameMetadata, ImuSample,
        StrobeSample, SyncHandlers,
    };
    use ingestion::{embed_metadata, DevicePacket, RawImu, RawStrobe};

    /// Handler that keeps everything it is given
    #[derive(Default)]
    pub struct Recorder {
        pub raw_imu: Vec<ImuSample>,
        pub raw_strobe: Vec<StrobeSample>,
        pub filtered: Vec<ImuSample>,
        pub pairs: Vec<CameraStrobePair>,
        pub timings: Vec<CycleTiming>,
    }

    impl SyncHandlers for Recorder {
        fn on_raw_imu(&mut self, samples: &[ImuSample]) {
            self.raw_imu.extend_from_slice(samples);
        }

        fn on_raw_strobe(&mut self, samples: &[StrobeSample]) {
            self.raw_strobe.extend_from_slice(samples);
        }

        fn on_filtered_imu(&mut self, samples: &[ImuSample]) {
            self.filtered.extend_from_slice(samples);
        }

        fn on_camera_strobe(&mut self, pairs: Vec<CameraStrobePair>) {
            self.pairs.extend(pairs);
        }

        fn on_timing(&mut self, timing: &CycleTiming) {
            self.timings.push(*timing);
        }
    }

    /// One packet with `imu` samples and strobes, all as (device µs, count)
    pub fn packet(send_count: u16, imu_us: &[u32], strobes: &[(u32, u8)]) -> Bytes {
        let packet = DevicePacket {
            send_count,
            imu: imu_us
                .iter()
                .map(|&timestamp_us| RawImu {
                    timestamp_us,
                    accel: [0, 0, 16384],
                    gyro: [0, 0, 0],
                })
                .collect(),
            strobe: strobes
                .iter()
                .map(|&(timestamp_us, count)| RawStrobe {
                    timestamp_us,
                    count,
                })
                .collect(),
        };
        Bytes::copy_from_slice(&packet.encode())
    }

    /// Driver image carrying an embedded metadata header
    pub fn camera_image(stamp: f64, frame_counter: u32) -> (CameraImage, CameraInfo) {
        let metadata = FrameMetadata {
            frame_counter,
            ..Default::default()
        };
        let mut data = vec![0u8; 64];
        data[..32].copy_from_slice(&embed_metadata(&metadata));
        let image = CameraImage {
            stamp,
            frame_id: "camera".to_string(),
            width: 8,
            height: 8,
            encoding: "mono8".to_string(),
            step: 8,
            data: Bytes::from(data),
        };
        let info = CameraInfo::for_image(&image);
        (image, info)
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::sync::atomic::AtomicBool;

    use contracts::{
        BufferStats, CalibrationConfig, CalibrationStrategy, ImuConfig, ManualClock, SyncConfig,
    };
    use ingestion::{camera_feed, Command, MockDevice};
    use sync_engine::{CalibrationStep, CycleOutcome, SyncRunner};

    use crate::support::{camera_image, packet, Recorder};

    fn quick_config() -> SyncConfig {
        SyncConfig {
            imu: ImuConfig { filter_size: 1 },
            calibration: CalibrationConfig {
                strategy: CalibrationStrategy::Statistical,
                sample_count: Some(1),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Three packets of one IMU and one strobe each, camera frames arriving
    /// out of band with a frame counter 100 ahead of the strobe count.
    #[test]
    fn test_three_packet_scenario() {
        const OFFSET: f64 = 10.0;
        const LATENCY: f64 = 0.004;
        let device_us = [1_000_000u32, 1_033_333, 1_066_666];

        let mut device = MockDevice::new();
        for (i, &t) in device_us.iter().enumerate() {
            device.push_bytes(packet(i as u16 + 1, &[t], &[(t, 7 + i as u8)]));
        }
        let commands = device.command_log();

        let clock = ManualClock::new(0.0);
        let (feed_tx, feed_rx) = camera_feed(8);
        let mut runner = SyncRunner::new(&quick_config(), device, clock.clone())
            .unwrap()
            .with_camera_feed(feed_rx);
        let mut out = Recorder::default();

        let mut outcomes = Vec::new();
        for (i, &t) in device_us.iter().enumerate() {
            let host = f64::from(t) / 1e6 + OFFSET;
            clock.set(host);
            let (image, info) = camera_image(host + LATENCY, 101 + i as u32);
            feed_tx.push_camera_frame(image, info).unwrap();
            outcomes.push(runner.poll_once(&mut out).unwrap());
        }

        // calibrated on the first cycle, count offset discovered on the second
        assert!(matches!(
            outcomes[0],
            CycleOutcome::Calibrating(CalibrationStep::Calibrated { .. })
        ));
        assert_eq!(
            outcomes[1],
            CycleOutcome::Synced {
                filtered: 1,
                pairs: 0
            }
        );
        assert_eq!(
            outcomes[2],
            CycleOutcome::Synced {
                filtered: 1,
                pairs: 3
            }
        );

        let engine = runner.engine();
        assert!((engine.clock_offset().unwrap() - OFFSET).abs() < 1e-9);
        assert_eq!(engine.count_offset(), Some(100));

        assert_eq!(out.pairs.len(), 3);
        for (i, pair) in out.pairs.iter().enumerate() {
            assert_eq!(pair.strobe.cumulative_count, i as u64 + 1);
            assert_eq!(pair.camera.frame_counter(), 101 + i as u32);
            let strobe_host = pair.strobe.timestamp_host.unwrap();
            assert!((pair.camera.stamp() - strobe_host).abs() < 1e-12);
            assert!((pair.stamp_correction() + LATENCY).abs() < 1e-6);
        }

        assert_eq!(engine.buffer_stats(), BufferStats::default());
        assert_eq!(out.raw_strobe.len(), 3);
        assert_eq!(out.filtered.len(), 2);
        assert_eq!(out.timings.len(), 2);
        assert_eq!(commands.commands(), vec![Command::setup(&quick_config().device)]);
    }

    #[test]
    fn test_corrupt_packet_is_skipped() {
        let mut corrupt = packet(2, &[1_003_000], &[]).to_vec();
        corrupt[20] ^= 0x40;

        let mut device = MockDevice::new();
        device
            .push_bytes(packet(1, &[1_000_000], &[]))
            .push_bytes(corrupt)
            .push_bytes(vec![0u8; 10])
            .push_bytes(packet(3, &[1_006_000], &[]))
            .push_disconnect();

        let clock = ManualClock::new(5.0);
        let mut runner = SyncRunner::new(&quick_config(), device, clock).unwrap();
        let mut out = Recorder::default();

        let err = runner
            .run(&AtomicBool::new(false), &mut out)
            .unwrap_err();
        assert!(err.is_disconnect());

        let stats = runner.stats();
        assert_eq!(stats.packets, 4);
        assert_eq!(stats.rejected, 2);
        assert_eq!(stats.calibrating, 1);
        assert_eq!(stats.synced, 1);
        // only the good packets reached the handlers
        assert_eq!(out.filtered.len(), 1);
        assert_eq!(out.filtered[0].timestamp_device_raw, 1_006_000);
    }

    #[test]
    fn test_strobe_buffer_saturates_without_camera() {
        let mut config = quick_config();
        config.buffers.strobe = 4;

        let mut device = MockDevice::new();
        for i in 0..6u32 {
            let t = 1_000_000 + i * 33_333;
            device.push_bytes(packet(i as u16, &[t], &[(t, i as u8 + 1)]));
        }

        let clock = ManualClock::new(20.0);
        let mut runner = SyncRunner::new(&config, device, clock.clone()).unwrap();
        let mut out = Recorder::default();

        for _ in 0..6 {
            runner.poll_once(&mut out).unwrap();
            clock.advance(0.033);
            assert!(runner.engine().buffer_stats().strobe_depth <= 4);
        }

        let stats = runner.engine().buffer_stats();
        assert_eq!(stats.strobe_depth, 4);
        assert_eq!(stats.dropped_total, 2);
        assert!(runner.engine().count_offset().is_none());
        assert!(out.pairs.is_empty());
        // the normalizer still saw every strobe
        assert_eq!(out.raw_strobe.last().unwrap().cumulative_count, 6);
    }
}

#[cfg(test)]
mod buffer_tests {
    use sync_engine::BoundedBuffer;

    #[test]
    fn test_fifo_eviction_keeps_newest() {
        let mut buffer = BoundedBuffer::new("imu", 10);

        for i in 0..25u32 {
            let evicted = buffer.push(i);
            assert!(buffer.len() <= buffer.capacity());
            if i >= 10 {
                assert_eq!(evicted, Some(i - 10));
            } else {
                assert_eq!(evicted, None);
            }
        }

        assert_eq!(buffer.dropped_count(), 15);
        assert_eq!(buffer.iter().copied().collect::<Vec<_>>(), (15..25).collect::<Vec<_>>());
    }
}

#[cfg(test)]
mod simulated_rig_tests {
    use std::sync::atomic::AtomicBool;

    use contracts::{CalibrationConfig, CalibrationStrategy, ManualClock, SyncConfig};
    use ingestion::{camera_feed, Pacing, SimulatedRig, SimulatedRigConfig};
    use sync_engine::SyncRunner;

    use crate::support::Recorder;

    fn rig_runner(config: &SyncConfig, packets: u64) -> SyncRunner<SimulatedRig, ManualClock> {
        let clock = ManualClock::new(1_000.0);
        let (tx, rx) = camera_feed(config.buffers.camera_feed);
        let rig = SimulatedRig::new(
            SimulatedRigConfig::default(),
            Pacing::Manual(clock.clone()),
            tx,
        );
        SyncRunner::new(config, rig, clock)
            .unwrap()
            .with_camera_feed(rx)
            .with_packet_limit(packets)
    }

    #[test]
    fn test_statistical_calibration_pairs_every_frame() {
        let config = SyncConfig::default();
        // 1.2 s of device time
        let mut runner = rig_runner(&config, 400);
        let mut out = Recorder::default();

        let stats = runner.run(&AtomicBool::new(false), &mut out).unwrap();
        assert_eq!(stats.packets, 400);
        assert_eq!(stats.rejected, 0);

        let engine = runner.engine();
        let true_offset = runner.device().clock_offset();
        // one-sided receive latency of at most one packet
        let estimated = engine.clock_offset().unwrap();
        assert!(estimated >= true_offset && estimated - true_offset < 0.003);

        // first strobe (count 1) triggered frame 1000
        assert_eq!(engine.count_offset(), Some(999));
        assert!(out.pairs.len() >= 30);
        for pair in &out.pairs {
            assert_eq!(
                i64::from(pair.camera.frame_counter()),
                pair.strobe.cumulative_count as i64 + 999
            );
            // driver stamps run 5 ms behind the trigger
            assert!(pair.stamp_correction() < 0.0);
            assert!(pair.stamp_correction() > -0.005);
        }
        assert_eq!(engine.resyncs(), 0);
        assert_eq!(stats.pairs, out.pairs.len() as u64);
    }

    #[test]
    fn test_pulse_calibration_with_rig() {
        let mut config = SyncConfig::default();
        config.calibration = CalibrationConfig {
            strategy: CalibrationStrategy::Pulse,
            sample_count: Some(3),
            pulse_settle_s: 0.1,
            ..Default::default()
        };
        let mut runner = rig_runner(&config, 600);
        let mut out = Recorder::default();

        runner.run(&AtomicBool::new(false), &mut out).unwrap();

        let engine = runner.engine();
        assert!(engine.is_calibrated());
        // camera stamps carry the 5 ms driver latency
        let error = engine.clock_offset().unwrap() - runner.device().clock_offset();
        assert!((error - 0.005).abs() < 1e-6);
        assert_eq!(engine.count_offset(), Some(999));

        assert!(!out.pairs.is_empty());
        assert!(out
            .pairs
            .iter()
            .all(|p| i64::from(p.camera.frame_counter()) == p.strobe.cumulative_count as i64 + 999));
    }
}

#[cfg(test)]
mod dispatch_tests {
    use std::sync::atomic::AtomicBool;

    use contracts::{ManualClock, SyncConfig, SyncOutput};
    use dispatcher::{create_dispatcher, ChannelHandlers, ForwardSelection, SinkSpec};
    use ingestion::{camera_feed, Pacing, SimulatedRig, SimulatedRigConfig};
    use sync_engine::SyncRunner;

    #[tokio::test]
    async fn test_runner_outputs_reach_json_lines_sink() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.jsonl");

        let (handlers, rx) = ChannelHandlers::channel(4096);
        let mut handlers = handlers.with_selection(ForwardSelection {
            timing: false,
            ..ForwardSelection::default()
        });
        let dispatcher = create_dispatcher(vec![SinkSpec::json_lines("jsonl", &path)], rx).unwrap();
        let dispatcher_task = dispatcher.spawn();

        let runner_task = tokio::task::spawn_blocking(move || {
            let clock = ManualClock::new(50.0);
            let (tx, feed) = camera_feed(32);
            let rig = SimulatedRig::new(SimulatedRigConfig::default(), Pacing::Manual(clock.clone()), tx);
            let mut runner = SyncRunner::new(&SyncConfig::default(), rig, clock)
                .unwrap()
                .with_camera_feed(feed)
                .with_packet_limit(300);
            let stats = runner.run(&AtomicBool::new(false), &mut handlers).unwrap();
            (stats, handlers.dropped())
        });

        let (stats, dropped) = runner_task.await.unwrap();
        let sinks = dispatcher_task.await.unwrap();

        assert_eq!(dropped, 0);
        assert_eq!(sinks[0].1.pairs_written, stats.pairs);

        let content = std::fs::read_to_string(&path).unwrap();
        let mut pairs = 0;
        let mut filtered = 0;
        for line in content.lines() {
            let output: SyncOutput = serde_json::from_str(line).unwrap();
            match output {
                SyncOutput::CameraStrobe(pair) => {
                    assert!(pair.camera.image.data.is_empty());
                    pairs += 1;
                }
                SyncOutput::FilteredImu(samples) => filtered += samples.len() as u64,
                other => panic!("unexpected output {}", other.kind()),
            }
        }
        assert_eq!(pairs, stats.pairs);
        assert_eq!(filtered, stats.filtered_imu);
        assert!(pairs > 0);
    }
}
