//! JsonLinesSink - appends outputs to a file, one JSON object per line

use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use contracts::{ContractError, OutputSink, SyncOutput};
use tracing::{debug, error, instrument};

/// Sink that records outputs as JSON lines
///
/// Image pixel data is not written; pairs carry the frame metadata and
/// corrected stamps only.
pub struct JsonLinesSink {
    name: String,
    path: PathBuf,
    writer: BufWriter<File>,
    /// Output kinds to record; empty records everything
    kinds: HashSet<String>,
    written: u64,
}

impl JsonLinesSink {
    /// Create the file (and parent directories), truncating an existing one
    pub fn create(name: impl Into<String>, path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let file = File::create(&path)?;

        Ok(Self {
            name: name.into(),
            path,
            writer: BufWriter::new(file),
            kinds: HashSet::new(),
            written: 0,
        })
    }

    /// Only record the given output kinds (`camera_strobe`, `filtered_imu`, ...)
    pub fn with_kinds<I, S>(mut self, kinds: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.kinds = kinds.into_iter().map(Into::into).collect();
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    fn accepts(&self, output: &SyncOutput) -> bool {
        self.kinds.is_empty() || self.kinds.contains(output.kind())
    }

    fn write_line(&mut self, output: &SyncOutput) -> std::io::Result<()> {
        let result = match output {
            SyncOutput::CameraStrobe(pair) => {
                let mut pair = pair.clone();
                pair.camera.image.data = Default::default();
                serde_json::to_writer(&mut self.writer, &SyncOutput::CameraStrobe(pair))
            }
            other => serde_json::to_writer(&mut self.writer, other),
        };
        result.map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        self.writer.write_all(b"\n")?;
        self.written += 1;
        Ok(())
    }

    fn persist(&mut self, output: &SyncOutput) -> Result<(), ContractError> {
        self.write_line(output).map_err(|e| {
            error!(sink = %self.name, kind = output.kind(), error = %e, "Write failed");
            ContractError::sink_write(&self.name, e.to_string())
        })
    }
}

impl OutputSink for JsonLinesSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "json_lines_sink_write",
        skip(self, output),
        fields(sink = %self.name, kind = output.kind())
    )]
    async fn write(&mut self, output: &SyncOutput) -> Result<(), ContractError> {
        if self.accepts(output) {
            self.persist(output)?;
        }
        Ok(())
    }

    #[instrument(name = "json_lines_sink_flush", skip(self))]
    async fn flush(&mut self) -> Result<(), ContractError> {
        self.writer
            .flush()
            .map_err(|e| ContractError::sink_write(&self.name, e.to_string()))
    }

    #[instrument(name = "json_lines_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        self.flush().await?;
        debug!(sink = %self.name, written = self.written, path = %self.path.display(), "JsonLinesSink closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use contracts::{
        CameraFrame, CameraImage, CameraInfo, CameraStrobePair, CycleTiming, FrameMetadata,
        StrobeSample,
    };
    use tempfile::tempdir;

    fn pair() -> CameraStrobePair {
        let image = CameraImage {
            stamp: 10.01,
            data: Bytes::from(vec![7u8; 64]),
            ..Default::default()
        };
        let camera = CameraFrame {
            metadata: FrameMetadata {
                frame_counter: 101,
                ..Default::default()
            },
            info: CameraInfo::for_image(&image),
            image,
        };
        let strobe = StrobeSample {
            timestamp_host: Some(10.0),
            cumulative_count: 1,
            ..Default::default()
        };
        CameraStrobePair::new(camera, strobe)
    }

    #[tokio::test]
    async fn test_json_lines_written() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out/run.jsonl");

        let mut sink = JsonLinesSink::create("jsonl", &path).unwrap();
        sink.write(&SyncOutput::Timing(CycleTiming::default()))
            .await
            .unwrap();
        sink.write(&SyncOutput::CameraStrobe(Box::new(pair())))
            .await
            .unwrap();
        sink.close().await.unwrap();

        let text = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);

        let parsed: SyncOutput = serde_json::from_str(lines[1]).unwrap();
        match parsed {
            SyncOutput::CameraStrobe(pair) => {
                assert_eq!(pair.camera.stamp(), 10.0);
                assert!(pair.camera.image.data.is_empty());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_kind_filter() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pairs.jsonl");

        let mut sink = JsonLinesSink::create("pairs", &path)
            .unwrap()
            .with_kinds(["camera_strobe"]);
        sink.write(&SyncOutput::RawImu(vec![])).await.unwrap();
        sink.write(&SyncOutput::CameraStrobe(Box::new(pair())))
            .await
            .unwrap();
        sink.close().await.unwrap();

        assert_eq!(sink.written(), 1);
        assert_eq!(fs::read_to_string(&path).unwrap().lines().count(), 1);
    }
}
