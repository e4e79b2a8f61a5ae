use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, Stdio};

use serde::Deserialize;

use crate::pipeline::frame::{Frame, PixelLayout};
use crate::source::backend::VideoSource;
use crate::source::error::{Result, SourceError};
use crate::source::types::Geometry;

/// Extensions decoded through ffmpeg rather than the image codecs.
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "avi", "mov", "mkv", "webm", "m4v"];

/// Whether `path` names a container ffmpeg should decode.
pub fn is_video_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| VIDEO_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    width: u32,
    height: u32,
    #[serde(default)]
    avg_frame_rate: Option<String>,
    #[serde(default)]
    r_frame_rate: Option<String>,
}

/// Parse an ffprobe rate such as `30000/1001`.
fn parse_rate(rate: &str) -> Option<f32> {
    let (num, den) = rate.split_once('/').unwrap_or((rate, "1"));
    let num: f32 = num.trim().parse().ok()?;
    let den: f32 = den.trim().parse().ok()?;
    (den > 0.0 && num > 0.0).then(|| num / den)
}

/// A video file decoded by an `ffmpeg` child process into raw RGB24
/// frames on its stdout.
///
/// Rewinding restarts the decoder; seeking to frame `n` restarts it and
/// discards the first `n` frames.
pub struct VideoFile {
    path: PathBuf,
    looping: bool,
    geometry: Geometry,
    decoder: Option<Decoder>,
    position: u64,
}

struct Decoder {
    child: Child,
    stdout: ChildStdout,
}

impl Decoder {
    fn spawn(path: &Path) -> std::io::Result<Self> {
        let mut cmd = Command::new("ffmpeg");
        cmd.arg("-hide_banner")
            .arg("-loglevel")
            .arg("error")
            .arg("-nostdin")
            .arg("-i")
            .arg(path)
            .arg("-an")
            .arg("-pix_fmt")
            .arg("rgb24")
            .arg("-f")
            .arg("rawvideo")
            .arg("-");
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit());

        let mut child = cmd.spawn()?;
        match child.stdout.take() {
            Some(stdout) => Ok(Self { child, stdout }),
            None => {
                let _ = child.kill();
                let _ = child.wait();
                Err(std::io::Error::other("ffmpeg stdout was not captured"))
            }
        }
    }

    /// Fill `buffer` with one frame. `Ok(false)` at a clean end of stream.
    fn read_into(&mut self, buffer: &mut [u8]) -> std::io::Result<bool> {
        let mut filled = 0;
        while filled < buffer.len() {
            match self.stdout.read(&mut buffer[filled..]) {
                Ok(0) if filled == 0 => return Ok(false),
                Ok(0) => {
                    return Err(std::io::Error::new(
                        ErrorKind::UnexpectedEof,
                        format!("truncated frame ({filled} of {} bytes)", buffer.len()),
                    ))
                }
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        Ok(true)
    }
}

impl Drop for Decoder {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

impl VideoFile {
    pub fn open(path: impl AsRef<Path>, looping: bool) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let open_error = |reason: String| SourceError::Open {
            target: path.display().to_string(),
            reason,
        };
        if !path.is_file() {
            return Err(open_error("no such file".to_string()));
        }

        let geometry = probe(&path).map_err(open_error)?;
        let decoder = Decoder::spawn(&path).map_err(|e| open_error(format!("ffmpeg: {e}")))?;

        tracing::debug!(
            "opened video {} ({}x{}, {:?} fps)",
            path.display(),
            geometry.width,
            geometry.height,
            geometry.fps
        );
        Ok(Self {
            path,
            looping,
            geometry,
            decoder: Some(decoder),
            position: 0,
        })
    }

    /// Index of the frame the next read returns.
    pub fn position(&self) -> u64 {
        self.position
    }

    fn frame_len(&self) -> usize {
        self.geometry.width as usize * self.geometry.height as usize * 3
    }
}

/// Ask ffprobe for the first video stream's size and rate.
fn probe(path: &Path) -> std::result::Result<Geometry, String> {
    let output = Command::new("ffprobe")
        .arg("-v")
        .arg("error")
        .arg("-select_streams")
        .arg("v:0")
        .arg("-show_entries")
        .arg("stream=width,height,avg_frame_rate,r_frame_rate")
        .arg("-of")
        .arg("json")
        .arg(path)
        .stdin(Stdio::null())
        .output()
        .map_err(|e| format!("ffprobe: {e}"))?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(format!("ffprobe failed: {}", stderr.trim()));
    }

    let probed: ProbeOutput =
        serde_json::from_slice(&output.stdout).map_err(|e| format!("ffprobe output: {e}"))?;
    let stream = probed
        .streams
        .into_iter()
        .next()
        .ok_or_else(|| "no video stream".to_string())?;
    if stream.width == 0 || stream.height == 0 {
        return Err(format!("invalid frame size {}x{}", stream.width, stream.height));
    }

    let mut geometry = Geometry::new(stream.width, stream.height);
    let fps = stream
        .avg_frame_rate
        .as_deref()
        .and_then(parse_rate)
        .or_else(|| stream.r_frame_rate.as_deref().and_then(parse_rate));
    if let Some(fps) = fps {
        geometry = geometry.with_fps(fps);
    }
    Ok(geometry)
}

impl VideoSource for VideoFile {
    fn read_frame(&mut self) -> Result<Option<Frame>> {
        let len = self.frame_len();
        let decoder = self.decoder.as_mut().ok_or(SourceError::Released)?;
        let mut data = vec![0u8; len];
        if !decoder
            .read_into(&mut data)
            .map_err(|e| SourceError::Read(e.to_string()))?
        {
            return Ok(None);
        }
        self.position += 1;
        let frame = Frame::new(
            self.geometry.width,
            self.geometry.height,
            PixelLayout::Rgb,
            data,
        )?;
        Ok(Some(frame))
    }

    fn seek(&mut self, index: u64) -> Result<()> {
        if self.decoder.is_none() {
            return Err(SourceError::Released);
        }
        // Drop the old process before starting the next one.
        self.decoder = None;
        self.decoder = Some(Decoder::spawn(&self.path)?);
        self.position = 0;

        let len = self.frame_len();
        let mut scratch = vec![0u8; len];
        while self.position < index {
            let more = match self.decoder.as_mut() {
                Some(decoder) => decoder
                    .read_into(&mut scratch)
                    .map_err(|e| SourceError::Read(e.to_string()))?,
                None => false,
            };
            if !more {
                return Err(SourceError::SeekOutOfRange {
                    index,
                    len: self.position,
                });
            }
            self.position += 1;
        }
        Ok(())
    }

    fn geometry(&self) -> Geometry {
        self.geometry
    }

    fn is_looping(&self) -> bool {
        self.looping
    }

    fn describe(&self) -> String {
        format!("video {}", self.path.display())
    }

    fn release(&mut self) {
        self.decoder = None;
        self.position = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn ffmpeg_available() -> bool {
        ["ffmpeg", "ffprobe"].iter().all(|tool| {
            Command::new(tool)
                .arg("-version")
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .is_ok_and(|s| s.success())
        })
    }

    /// Encode a short test clip, or `None` when ffmpeg is not installed.
    fn test_clip(dir: &Path, frames: u32) -> Option<PathBuf> {
        if !ffmpeg_available() {
            eprintln!("ffmpeg not found, skipping");
            return None;
        }
        let path = dir.join("clip.avi");
        let status = Command::new("ffmpeg")
            .args(["-hide_banner", "-loglevel", "error", "-y", "-f", "lavfi", "-i"])
            .arg("testsrc=size=32x24:rate=10")
            .args(["-frames:v", &frames.to_string(), "-c:v", "mjpeg"])
            .arg(&path)
            .status()
            .unwrap();
        assert!(status.success());
        Some(path)
    }

    #[test]
    fn recognises_video_extensions() {
        assert!(is_video_path(Path::new("a/clip.mp4")));
        assert!(is_video_path(Path::new("clip.MOV")));
        assert!(is_video_path(Path::new("clip.avi")));
        assert!(!is_video_path(Path::new("still.png")));
        assert!(!is_video_path(Path::new("anim.gif")));
        assert!(!is_video_path(Path::new("frames")));
    }

    #[test]
    fn parses_frame_rates() {
        assert_eq!(parse_rate("10/1"), Some(10.0));
        assert_eq!(parse_rate("25"), Some(25.0));
        assert!((parse_rate("30000/1001").unwrap() - 29.97).abs() < 0.01);
        assert_eq!(parse_rate("0/0"), None);
        assert_eq!(parse_rate("n/a"), None);
    }

    #[test]
    fn missing_video_reports_open_error() {
        assert!(matches!(
            VideoFile::open("/nonexistent/lvncam/clip.mp4", true),
            Err(SourceError::Open { .. })
        ));
    }

    #[test]
    fn decodes_every_frame_then_ends() {
        let dir = TempDir::new().unwrap();
        let Some(path) = test_clip(dir.path(), 5) else {
            return;
        };
        let mut video = VideoFile::open(&path, false).unwrap();
        let geometry = video.geometry();
        assert_eq!((geometry.width, geometry.height), (32, 24));
        assert!((geometry.fps.unwrap() - 10.0).abs() < 0.01);

        let mut count = 0;
        while let Some(frame) = video.read_frame().unwrap() {
            assert_eq!(frame.geometry(), (32, 24));
            assert_eq!(frame.layout(), PixelLayout::Rgb);
            count += 1;
        }
        assert_eq!(count, 5);
        assert!(!video.is_looping());
    }

    #[test]
    fn seek_restarts_the_decoder() {
        let dir = TempDir::new().unwrap();
        let Some(path) = test_clip(dir.path(), 4) else {
            return;
        };
        let mut video = VideoFile::open(&path, true).unwrap();
        let first = video.read_frame().unwrap().unwrap();
        while video.read_frame().unwrap().is_some() {}

        video.seek(0).unwrap();
        assert_eq!(video.position(), 0);
        let again = video.read_frame().unwrap().unwrap();
        assert_eq!(first.data(), again.data());

        video.seek(3).unwrap();
        assert!(video.read_frame().unwrap().is_some());
        assert!(video.read_frame().unwrap().is_none());
        assert!(matches!(
            video.seek(9),
            Err(SourceError::SeekOutOfRange { index: 9, len: 4 })
        ));
    }

    #[test]
    fn release_stops_the_decoder() {
        let dir = TempDir::new().unwrap();
        let Some(path) = test_clip(dir.path(), 2) else {
            return;
        };
        let mut video = VideoFile::open(&path, true).unwrap();
        video.release();
        assert!(matches!(video.read_frame(), Err(SourceError::Released)));
        assert!(matches!(video.seek(0), Err(SourceError::Released)));
    }
}
