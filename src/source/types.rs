use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

fn default_looping() -> bool {
    true
}

/// Where frames come from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SourceSpec {
    /// Capture device by index (`/dev/videoN` on Linux).
    Webcam { index: u32 },
    /// Video file, image, animated GIF or directory of images on disk. Files rewind to
    /// the first frame when they run out unless `looping` is false.
    File {
        path: PathBuf,
        #[serde(default = "default_looping")]
        looping: bool,
    },
}

impl SourceSpec {
    pub fn webcam(index: u32) -> Self {
        Self::Webcam { index }
    }

    /// A looping file source.
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::File {
            path: path.into(),
            looping: true,
        }
    }

    /// Override looping for file sources. Webcams never loop.
    pub fn with_looping(self, looping: bool) -> Self {
        match self {
            Self::File { path, .. } => Self::File { path, looping },
            webcam => webcam,
        }
    }

    pub fn is_looping(&self) -> bool {
        matches!(self, Self::File { looping: true, .. })
    }
}

impl fmt::Display for SourceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Webcam { index } => write!(f, "webcam {index}"),
            Self::File { path, .. } => write!(f, "file {}", path.display()),
        }
    }
}

/// Frame geometry and nominal rate of an open source.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Geometry {
    pub width: u32,
    pub height: u32,
    /// Nominal frame rate, when the source has one.
    pub fps: Option<f32>,
}

impl Geometry {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            fps: None,
        }
    }

    pub fn with_fps(mut self, fps: f32) -> Self {
        self.fps = (fps.is_finite() && fps > 0.0).then_some(fps);
        self
    }

    /// Time between frames at the nominal rate.
    pub fn frame_interval(&self) -> Option<Duration> {
        self.fps.map(|fps| Duration::from_secs_f32(1.0 / fps))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_spec_loops_by_default() {
        let spec = SourceSpec::file("clip.gif");
        assert!(spec.is_looping());
        assert!(!spec.clone().with_looping(false).is_looping());
        assert!(!SourceSpec::webcam(0).with_looping(true).is_looping());
    }

    #[test]
    fn spec_display_names_the_source() {
        assert_eq!(SourceSpec::webcam(2).to_string(), "webcam 2");
        assert_eq!(SourceSpec::file("/tmp/a.png").to_string(), "file /tmp/a.png");
    }

    #[test]
    fn spec_deserialises_with_default_looping() {
        let spec: SourceSpec = serde_json::from_str(r#"{"type":"file","path":"x.png"}"#).unwrap();
        assert_eq!(spec, SourceSpec::file("x.png"));

        let spec: SourceSpec = serde_json::from_str(r#"{"type":"webcam","index":1}"#).unwrap();
        assert_eq!(spec, SourceSpec::webcam(1));
    }

    #[test]
    fn geometry_frame_interval() {
        let g = Geometry::new(640, 480).with_fps(25.0);
        let interval = g.frame_interval().unwrap();
        assert!((interval.as_secs_f64() - 0.04).abs() < 1e-6);
        assert_eq!(Geometry::new(1, 1).with_fps(0.0).frame_interval(), None);
    }

    #[test]
    fn geometry_serialises_camel_case() {
        let json = serde_json::to_value(Geometry::new(320, 240).with_fps(30.0)).unwrap();
        assert_eq!(json["width"], 320);
        assert_eq!(json["fps"], 30.0);
    }
}
