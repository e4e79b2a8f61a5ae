use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use image::codecs::gif::GifDecoder;
use image::{AnimationDecoder, DynamicImage, ImageFormat};

use crate::pipeline::frame::Frame;
use crate::source::backend::VideoSource;
use crate::source::error::{Result, SourceError};
use crate::source::types::Geometry;

/// Extensions picked up when a directory is opened as an image sequence.
const SEQUENCE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "gif"];

enum Content {
    /// Frames decoded up front (still images, animated GIFs).
    Decoded(Vec<Frame>),
    /// One image file per frame, decoded on read.
    Sequence(Vec<PathBuf>),
}

impl Content {
    fn len(&self) -> usize {
        match self {
            Self::Decoded(frames) => frames.len(),
            Self::Sequence(paths) => paths.len(),
        }
    }
}

/// Frames from disk: a still image, an animated GIF or a directory of
/// images played in file-name order.
pub struct FileSource {
    path: PathBuf,
    content: Content,
    position: usize,
    looping: bool,
    geometry: Geometry,
}

impl FileSource {
    pub fn open(path: impl AsRef<Path>, looping: bool) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let open_error = |reason: String| SourceError::Open {
            target: path.display().to_string(),
            reason,
        };

        let (content, geometry) = if path.is_dir() {
            let paths = list_sequence(&path)?;
            let first = paths
                .first()
                .ok_or_else(|| SourceError::Empty(path.display().to_string()))?;
            let (width, height) =
                image::image_dimensions(first).map_err(|e| open_error(e.to_string()))?;
            (Content::Sequence(paths), Geometry::new(width, height))
        } else if ImageFormat::from_path(&path).ok() == Some(ImageFormat::Gif) {
            decode_gif(&path).map_err(|e| open_error(e.to_string()))?
        } else {
            let image = image::open(&path).map_err(|e| open_error(e.to_string()))?;
            let frame = Frame::from_image(image)?;
            let (width, height) = frame.geometry();
            (Content::Decoded(vec![frame]), Geometry::new(width, height))
        };

        if content.len() == 0 {
            return Err(SourceError::Empty(path.display().to_string()));
        }

        tracing::debug!(
            "opened {} ({} frames, {}x{})",
            path.display(),
            content.len(),
            geometry.width,
            geometry.height
        );
        Ok(Self {
            path,
            content,
            position: 0,
            looping,
            geometry,
        })
    }

    /// Number of frames in the file or directory.
    pub fn len(&self) -> usize {
        self.content.len()
    }

    pub fn is_empty(&self) -> bool {
        self.content.len() == 0
    }

    /// Index of the frame the next read returns.
    pub fn position(&self) -> usize {
        self.position
    }
}

fn list_sequence(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            p.is_file()
                && p.extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| {
                        SEQUENCE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str())
                    })
        })
        .collect();
    paths.sort();
    Ok(paths)
}

fn decode_gif(path: &Path) -> Result<(Content, Geometry)> {
    let reader = BufReader::new(File::open(path)?);
    let frames = GifDecoder::new(reader)?.into_frames().collect_frames()?;

    let first_delay_ms = frames.first().map(|f| {
        let (num, den) = f.delay().numer_denom_ms();
        num as f32 / den.max(1) as f32
    });
    let frames = frames
        .into_iter()
        .map(|f| Frame::from_image(DynamicImage::ImageRgba8(f.into_buffer())))
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let (width, height) = frames.first().map(Frame::geometry).unwrap_or((0, 0));
    let mut geometry = Geometry::new(width, height);
    if let Some(delay) = first_delay_ms.filter(|d| *d > 0.0) {
        geometry = geometry.with_fps(1000.0 / delay);
    }
    Ok((Content::Decoded(frames), geometry))
}

impl VideoSource for FileSource {
    fn read_frame(&mut self) -> Result<Option<Frame>> {
        if self.position >= self.content.len() {
            return Ok(None);
        }
        let frame = match &self.content {
            Content::Decoded(frames) => frames[self.position].clone(),
            Content::Sequence(paths) => Frame::from_image(image::open(&paths[self.position])?)?,
        };
        self.position += 1;
        Ok(Some(frame))
    }

    fn seek(&mut self, index: u64) -> Result<()> {
        let len = self.content.len();
        if index >= len as u64 {
            return Err(SourceError::SeekOutOfRange {
                index,
                len: len as u64,
            });
        }
        self.position = index as usize;
        Ok(())
    }

    fn geometry(&self) -> Geometry {
        self.geometry
    }

    fn is_looping(&self) -> bool {
        self.looping
    }

    fn describe(&self) -> String {
        format!("file {}", self.path.display())
    }

    fn release(&mut self) {
        self.content = Content::Decoded(Vec::new());
        self.position = 0;
    }
}
