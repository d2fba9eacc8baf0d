//! Recorded landmark streams and their replay.
//!
//! A recording stores what the face and hand detectors reported for every
//! frame of a capture, so a session can be driven without a camera or a
//! detector model. Three on-disk encodings are supported, picked by file
//! extension:
//!
//! - `.json`: human-editable
//! - `.bz2` (e.g. `capture.bin.bz2`): bzip2-compressed bincode
//! - anything else: plain bincode

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use std::sync::Arc;

use bzip2::read::BzDecoder;
use bzip2::write::BzEncoder;
use bzip2::Compression;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::session::LandmarkDetector;
use crate::topology::{FaceTopology, HandTopology};
use crate::types::LandmarkSet;

/// Detector output for one video frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordedFrame {
    pub timestamp_ms: f64,
    #[serde(default)]
    pub faces: Vec<LandmarkSet>,
    #[serde(default)]
    pub hands: Vec<LandmarkSet>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LandmarkRecording {
    /// Size of the displayed video the landmarks were captured against.
    pub width: u32,
    pub height: u32,
    pub frames: Vec<RecordedFrame>,
}

enum Encoding {
    Json,
    CompressedBincode,
    Bincode,
}

impl Encoding {
    fn for_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Encoding::Json,
            Some("bz2") => Encoding::CompressedBincode,
            _ => Encoding::Bincode,
        }
    }
}

impl LandmarkRecording {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            frames: Vec::new(),
        }
    }

    pub fn push(&mut self, frame: RecordedFrame) {
        self.frames.push(frame);
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Length of the capture from the first to the last frame.
    pub fn duration_ms(&self) -> f64 {
        match (self.frames.first(), self.frames.last()) {
            (Some(first), Some(last)) => last.timestamp_ms - first.timestamp_ms,
            _ => 0.0,
        }
    }

    /// Load a recording, choosing the decoder from the file extension.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let reader = BufReader::new(file);

        let recording = match Encoding::for_path(path) {
            Encoding::Json => Self::from_json_reader(reader)?,
            Encoding::CompressedBincode => Self::from_reader(BzDecoder::new(reader))?,
            Encoding::Bincode => Self::from_reader(reader)?,
        };

        tracing::info!(
            "Loaded recording {:?}: {} frames at {}x{}",
            path,
            recording.len(),
            recording.width,
            recording.height
        );
        Ok(recording)
    }

    /// Read a bincode recording from an already-opened reader.
    pub fn from_reader<R: Read>(mut reader: R) -> Result<Self> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        let recording: Self = bincode::deserialize(&bytes)?;
        recording.validate()?;
        Ok(recording)
    }

    pub fn from_json_reader<R: Read>(reader: R) -> Result<Self> {
        let recording: Self = serde_json::from_reader(reader)?;
        recording.validate()?;
        Ok(recording)
    }

    /// Save the recording, choosing the encoder from the file extension.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);

        match Encoding::for_path(path) {
            Encoding::Json => serde_json::to_writer_pretty(&mut writer, self)?,
            Encoding::CompressedBincode => {
                let bytes = bincode::serialize(self)?;
                let mut encoder = BzEncoder::new(&mut writer, Compression::best());
                encoder.write_all(&bytes)?;
                encoder.finish()?;
            }
            Encoding::Bincode => {
                let bytes = bincode::serialize(self)?;
                writer.write_all(&bytes)?;
            }
        }
        writer.flush()?;
        Ok(())
    }

    /// Check the recording is something a session can replay.
    ///
    /// Frames must be in non-decreasing time order. Individual landmark sets
    /// may be short or hold non-finite points: those are frames the fitters
    /// skip, not a broken file.
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(Error::InvalidRecording(format!(
                "surface size must be non-zero, got {}x{}",
                self.width, self.height
            )));
        }

        for (i, pair) in self.frames.windows(2).enumerate() {
            if !(pair[1].timestamp_ms >= pair[0].timestamp_ms) {
                return Err(Error::InvalidRecording(format!(
                    "frame {} at {} ms comes before frame {} at {} ms",
                    i + 1,
                    pair[1].timestamp_ms,
                    i,
                    pair[0].timestamp_ms
                )));
            }
        }
        Ok(())
    }

    /// Frames whose first face has every point the face topology needs.
    pub fn complete_face_frames(&self, topology: &FaceTopology) -> usize {
        self.frames
            .iter()
            .filter(|f| f.faces.first().is_some_and(|s| s.len() >= topology.point_count))
            .count()
    }

    /// Number of hand sets with the hand topology's full point count.
    pub fn complete_hands(&self, topology: &HandTopology) -> usize {
        self.frames
            .iter()
            .flat_map(|f| f.hands.iter())
            .filter(|s| s.len() >= topology.point_count)
            .count()
    }
}

/// Which stream of a recording a replay detector reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayStream {
    Faces,
    Hands,
}

/// A [`LandmarkDetector`] that plays back a recording.
///
/// Each call to `detect` returns the last frame recorded at or before the
/// requested timestamp, measured from the first recorded frame. Past the end
/// it keeps returning nothing.
#[derive(Debug, Clone)]
pub struct ReplayDetector {
    recording: Arc<LandmarkRecording>,
    stream: ReplayStream,
    cursor: usize,
}

impl ReplayDetector {
    pub fn new(recording: Arc<LandmarkRecording>, stream: ReplayStream) -> Self {
        Self {
            recording,
            stream,
            cursor: 0,
        }
    }

    pub fn faces(recording: Arc<LandmarkRecording>) -> Self {
        Self::new(recording, ReplayStream::Faces)
    }

    pub fn hands(recording: Arc<LandmarkRecording>) -> Self {
        Self::new(recording, ReplayStream::Hands)
    }

    pub fn rewind(&mut self) {
        self.cursor = 0;
    }

    fn frame_at(&mut self, timestamp_ms: f64) -> Option<&RecordedFrame> {
        let frames = &self.recording.frames;
        let start = frames.first()?.timestamp_ms;
        let end = frames.last()?.timestamp_ms;
        if timestamp_ms > end - start {
            return None;
        }

        while self.cursor + 1 < frames.len()
            && frames[self.cursor + 1].timestamp_ms - start <= timestamp_ms
        {
            self.cursor += 1;
        }
        frames.get(self.cursor)
    }
}

impl LandmarkDetector for ReplayDetector {
    fn detect(&mut self, timestamp_ms: f64) -> Vec<LandmarkSet> {
        let stream = self.stream;
        match self.frame_at(timestamp_ms) {
            Some(frame) => match stream {
                ReplayStream::Faces => frame.faces.clone(),
                ReplayStream::Hands => frame.hands.clone(),
            },
            None => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::{MEDIAPIPE_FACE, MEDIAPIPE_HAND};
    use crate::types::Landmark;
    use std::path::PathBuf;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("tryon_fit_{}_{}", std::process::id(), name))
    }

    fn sample() -> LandmarkRecording {
        let mut recording = LandmarkRecording::new(640, 480);
        for i in 0..3 {
            let shift = i as f32 * 0.01;
            recording.push(RecordedFrame {
                timestamp_ms: 1000.0 + i as f64 * 33.0,
                faces: vec![LandmarkSet::filled(468, Landmark::new(0.5 + shift, 0.5))],
                hands: vec![
                    LandmarkSet::filled(21, Landmark::new(0.2, 0.6)),
                    LandmarkSet::filled(21, Landmark::with_depth(0.8, 0.6, -0.05)),
                ],
            });
        }
        recording
    }

    #[test]
    fn save_and_load_all_encodings() {
        let recording = sample();
        for name in ["capture.bin", "capture.bin.bz2", "capture.json"] {
            let path = temp_path(name);
            recording.save(&path).unwrap();
            let loaded = LandmarkRecording::load(&path).unwrap();
            std::fs::remove_file(&path).ok();

            assert_eq!(loaded, recording, "{name}");
        }
    }

    #[test]
    fn compressed_file_is_smaller() {
        let recording = sample();
        let plain = temp_path("size.bin");
        let packed = temp_path("size.bin.bz2");
        recording.save(&plain).unwrap();
        recording.save(&packed).unwrap();

        let plain_len = std::fs::metadata(&plain).unwrap().len();
        let packed_len = std::fs::metadata(&packed).unwrap().len();
        std::fs::remove_file(&plain).ok();
        std::fs::remove_file(&packed).ok();

        assert!(packed_len < plain_len);
    }

    #[test]
    fn json_fields_default() {
        let json = r#"{"width": 100, "height": 50, "frames": [{"timestamp_ms": 0.0}]}"#;
        let recording = LandmarkRecording::from_json_reader(json.as_bytes()).unwrap();
        assert_eq!(recording.len(), 1);
        assert!(recording.frames[0].faces.is_empty());
        assert!(recording.frames[0].hands.is_empty());
    }

    #[test]
    fn rejects_bad_recordings() {
        let mut recording = sample();
        recording.width = 0;
        assert!(matches!(recording.validate(), Err(Error::InvalidRecording(_))));

        let mut recording = sample();
        recording.frames.swap(0, 2);
        assert!(matches!(recording.validate(), Err(Error::InvalidRecording(_))));

        let mut recording = sample();
        recording.frames[1].timestamp_ms = f64::NAN;
        assert!(recording.validate().is_err());

        assert!(LandmarkRecording::from_reader(&b"not a recording"[..]).is_err());
    }

    #[test]
    fn counts_complete_sets() {
        let mut recording = sample();
        recording.frames[1].faces[0] = LandmarkSet::filled(10, Landmark::new(0.5, 0.5));
        recording.frames[2].hands.pop();

        assert_eq!(recording.complete_face_frames(&MEDIAPIPE_FACE), 2);
        assert_eq!(recording.complete_hands(&MEDIAPIPE_HAND), 5);
        assert!((recording.duration_ms() - 66.0).abs() < 1e-9);
    }

    #[test]
    fn replay_follows_timestamps() {
        let recording = Arc::new(sample());
        let mut faces = ReplayDetector::faces(recording.clone());
        let mut hands = ReplayDetector::hands(recording.clone());

        let first = faces.detect(0.0);
        assert_eq!(first.len(), 1);
        assert!((first[0][0].x - 0.5).abs() < 1e-6);

        // Between frames: the latest frame already shown
        let mid = faces.detect(50.0);
        assert!((mid[0][0].x - 0.51).abs() < 1e-6);

        let last = faces.detect(66.0);
        assert!((last[0][0].x - 0.52).abs() < 1e-6);

        assert_eq!(hands.detect(10.0).len(), 2);

        // Past the end of the capture
        assert!(faces.detect(500.0).is_empty());

        faces.rewind();
        assert!((faces.detect(0.0)[0][0].x - 0.5).abs() < 1e-6);
    }

    #[test]
    fn empty_recording_replays_nothing() {
        let mut detector = ReplayDetector::faces(Arc::new(LandmarkRecording::new(10, 10)));
        assert!(detector.detect(0.0).is_empty());
    }
}
