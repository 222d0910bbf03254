//! Frame Export for beatscope
//! PNG sequence writer that encodes on a background thread

use std::path::{Path, PathBuf};
use std::thread::JoinHandle;

use crossbeam_channel::{bounded, Sender};
use image::{ImageFormat, RgbaImage};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to write frame: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode frame: {0}")]
    Image(#[from] image::ImageError),

    #[error("export writer thread stopped unexpectedly")]
    WriterGone,
}

/// File name of frame `index` inside the output directory
pub fn frame_path(dir: &Path, index: u64) -> PathBuf {
    dir.join(format!("frame_{:06}.png", index))
}

/// Writes `frame_NNNNNN.png` files.
///
/// Frames are queued through a bounded channel, so a slow disk applies back-pressure to the
/// renderer instead of growing memory. The first encoding error stops the writer; it is
/// reported by the next [`push`](Self::push) or by [`finish`](Self::finish).
pub struct PngSequenceWriter {
    dir: PathBuf,
    sender: Option<Sender<(u64, RgbaImage)>>,
    worker: Option<JoinHandle<Result<u64, ExportError>>>,
    next_index: u64,
    total_frames: Option<u64>,
}

impl PngSequenceWriter {
    pub fn new(dir: impl Into<PathBuf>, queue_depth: usize) -> Result<Self, ExportError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;

        let (sender, receiver) = bounded::<(u64, RgbaImage)>(queue_depth.max(1));
        let out_dir = dir.clone();
        let worker = std::thread::Builder::new()
            .name("png-export".into())
            .spawn(move || -> Result<u64, ExportError> {
                let mut written = 0;
                for (index, frame) in receiver {
                    let path = frame_path(&out_dir, index);
                    frame.save_with_format(&path, ImageFormat::Png)?;
                    debug!(path = %path.display(), "frame written");
                    written += 1;
                }
                Ok(written)
            })?;

        info!(dir = %dir.display(), "png export started");
        Ok(Self {
            dir,
            sender: Some(sender),
            worker: Some(worker),
            next_index: 0,
            total_frames: None,
        })
    }

    /// Expected frame count, used only for progress reporting
    pub fn with_total(mut self, total_frames: u64) -> Self {
        self.total_frames = Some(total_frames);
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Frames queued so far
    pub fn queued(&self) -> u64 {
        self.next_index
    }

    /// Fraction of the expected frames queued (0 when no total is set)
    pub fn progress(&self) -> f32 {
        match self.total_frames {
            Some(total) if total > 0 => (self.next_index as f32 / total as f32).min(1.0),
            _ => 0.0,
        }
    }

    /// Queue the next frame. Blocks while the queue is full.
    pub fn push(&mut self, frame: RgbaImage) -> Result<PathBuf, ExportError> {
        let index = self.next_index;
        let sent = match &self.sender {
            Some(sender) => sender.send((index, frame)).is_ok(),
            None => false,
        };
        if !sent {
            // The worker hung up, which only happens after an error
            return Err(self.shutdown().err().unwrap_or(ExportError::WriterGone));
        }

        self.next_index += 1;
        if let Some(total) = self.total_frames {
            if self.next_index % 30 == 0 || self.next_index == total {
                info!(frame = self.next_index, total, "export progress");
            }
        }
        Ok(frame_path(&self.dir, index))
    }

    /// Flush the queue and wait for the writer. Returns the number of frames written.
    pub fn finish(mut self) -> Result<u64, ExportError> {
        let written = self.shutdown()?;
        info!(frames = written, dir = %self.dir.display(), "png export finished");
        Ok(written)
    }

    fn shutdown(&mut self) -> Result<u64, ExportError> {
        drop(self.sender.take());
        match self.worker.take() {
            Some(worker) => worker.join().map_err(|_| ExportError::WriterGone)?,
            None => Err(ExportError::WriterGone),
        }
    }
}

impl Drop for PngSequenceWriter {
    fn drop(&mut self) {
        if self.worker.is_some() {
            let _ = self.shutdown();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn frame_names_are_zero_padded() {
        let p = frame_path(Path::new("out"), 42);
        assert_eq!(p, Path::new("out").join("frame_000042.png"));
    }

    #[test]
    fn writes_every_frame_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = PngSequenceWriter::new(dir.path().join("seq"), 2)
            .unwrap()
            .with_total(3);

        assert_eq!(writer.dir(), dir.path().join("seq"));
        for shade in [10u8, 20, 30] {
            let frame = RgbaImage::from_pixel(4, 3, Rgba([shade, 0, 0, 255]));
            let path = writer.push(frame).unwrap();
            assert_eq!(path, frame_path(writer.dir(), writer.queued() - 1));
        }
        assert_eq!(writer.queued(), 3);
        assert_eq!(writer.progress(), 1.0);
        assert_eq!(writer.finish().unwrap(), 3);

        let second = image::open(dir.path().join("seq/frame_000001.png"))
            .unwrap()
            .to_rgba8();
        assert_eq!(second.dimensions(), (4, 3));
        assert_eq!(second.get_pixel(0, 0).0, [20, 0, 0, 255]);
    }

    #[test]
    fn write_error_surfaces() {
        let dir = tempfile::tempdir().unwrap();
        let seq = dir.path().join("seq");
        let mut writer = PngSequenceWriter::new(&seq, 1).unwrap();
        std::fs::remove_dir_all(&seq).unwrap();

        let pushed = writer.push(RgbaImage::new(2, 2));
        let result = match pushed {
            Ok(_) => writer.finish().map(|_| ()),
            Err(err) => Err(err),
        };
        assert!(matches!(result, Err(ExportError::Image(_)) | Err(ExportError::Io(_))));
    }
}
