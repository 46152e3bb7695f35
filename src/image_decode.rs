use crate::database::MediaKind;
use crate::error::GenerationError;
use image::{DynamicImage, ImageError, ImageFormat};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::Once;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

static JXL_DECODER_HOOK: Once = Once::new();

pub fn ensure_jxl_decoder_registered() {
    JXL_DECODER_HOOK.call_once(|| {
        let registered = jxl_oxide::integration::register_image_decoding_hook();
        if registered {
            log::info!("Registered JPEG XL decoder hook");
        }
    });
}

/// Decodes a still image. Extensionless files are identified by content.
pub fn open_image(path: &Path) -> Result<DynamicImage, ImageError> {
    ensure_jxl_decoder_registered();
    if path.extension().is_some() {
        return image::open(path);
    }
    image::ImageReader::open(path)?
        .with_guessed_format()?
        .decode()
}

/// Turns a media file into a single frame ready for downscaling.
///
/// The thumbnail engine only talks to this trait, so decoding can be
/// swapped out when ffmpeg is unavailable or a codec needs special handling.
pub trait MediaDecoder: Send + Sync {
    fn decode(&self, path: &Path, kind: MediaKind) -> Result<DynamicImage, GenerationError>;
}

const DEFAULT_FFMPEG_TIMEOUT: Duration = Duration::from_secs(30);
const FFMPEG_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Decodes images in-process and pulls video frames through ffmpeg.
#[derive(Debug, Clone)]
pub struct DefaultDecoder {
    ffmpeg_path: PathBuf,
    frame_offset_secs: f64,
    timeout: Duration,
}

/// Why one ffmpeg run produced no frame.
enum FrameError {
    /// ffmpeg ran to completion without a usable frame.
    NoFrame(String),
    Failed(GenerationError),
}

impl From<FrameError> for GenerationError {
    fn from(error: FrameError) -> Self {
        match error {
            FrameError::NoFrame(reason) => GenerationError::DecodeFailed(reason),
            FrameError::Failed(error) => error,
        }
    }
}

impl DefaultDecoder {
    pub fn new(ffmpeg_path: impl Into<PathBuf>, frame_offset_secs: f64) -> Self {
        DefaultDecoder {
            ffmpeg_path: ffmpeg_path.into(),
            frame_offset_secs: frame_offset_secs.max(0.0),
            timeout: DEFAULT_FFMPEG_TIMEOUT,
        }
    }

    /// Kills any ffmpeg run that outlives `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn extract_video_frame(&self, path: &Path) -> Result<DynamicImage, GenerationError> {
        match self.run_ffmpeg(path, self.frame_offset_secs) {
            Ok(frame) => Ok(frame),
            // Clips shorter than the offset produce no frame at all.
            Err(FrameError::NoFrame(reason)) if self.frame_offset_secs > 0.0 => {
                log::debug!(
                    "No frame at {:.2}s for {} ({}); retrying from the first frame",
                    self.frame_offset_secs,
                    path.display(),
                    reason
                );
                self.run_ffmpeg(path, 0.0).map_err(GenerationError::from)
            }
            Err(error) => Err(error.into()),
        }
    }

    fn run_ffmpeg(&self, path: &Path, offset_secs: f64) -> Result<DynamicImage, FrameError> {
        let mut child = Command::new(&self.ffmpeg_path)
            .arg("-v")
            .arg("error")
            .arg("-ss")
            .arg(format!("{:.3}", offset_secs))
            .arg("-i")
            .arg(path)
            .args(["-frames:v", "1", "-f", "image2pipe", "-vcodec", "png", "-"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|error| {
                FrameError::Failed(GenerationError::DecodeFailed(format!(
                    "failed to run {}: {}",
                    self.ffmpeg_path.display(),
                    error
                )))
            })?;

        // Drain both pipes off-thread so a chatty ffmpeg cannot stall on a full pipe.
        let stdout = child.stdout.take().map(drain_pipe);
        let stderr = child.stderr.take().map(drain_pipe);

        let status = match wait_with_deadline(&mut child, self.timeout) {
            Ok(Some(status)) => status,
            Ok(None) => {
                let _ = child.kill();
                let _ = child.wait();
                log::warn!(
                    "ffmpeg timed out after {:.1}s on {}",
                    self.timeout.as_secs_f64(),
                    path.display()
                );
                return Err(FrameError::Failed(GenerationError::DecodeFailed(format!(
                    "ffmpeg timed out after {:.1}s",
                    self.timeout.as_secs_f64()
                ))));
            }
            Err(error) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(FrameError::Failed(GenerationError::DecodeFailed(format!(
                    "failed to wait for ffmpeg: {}",
                    error
                ))));
            }
        };
        let stdout = stdout
            .and_then(|reader| reader.join().ok())
            .unwrap_or_default();
        let stderr = stderr
            .and_then(|reader| reader.join().ok())
            .unwrap_or_default();

        if !status.success() || stdout.is_empty() {
            let stderr = String::from_utf8_lossy(&stderr);
            let detail = stderr.lines().last().unwrap_or("no frame produced").trim();
            return Err(FrameError::NoFrame(format!(
                "ffmpeg exited with {}: {}",
                status, detail
            )));
        }

        image::load_from_memory_with_format(&stdout, ImageFormat::Png).map_err(|error| {
            FrameError::NoFrame(format!("unreadable ffmpeg frame: {}", error))
        })
    }
}

fn drain_pipe<R: Read + Send + 'static>(mut pipe: R) -> JoinHandle<Vec<u8>> {
    std::thread::spawn(move || {
        let mut buffer = Vec::new();
        let _ = pipe.read_to_end(&mut buffer);
        buffer
    })
}

/// Polls `child` until it exits or `timeout` elapses. `Ok(None)` means timed out.
fn wait_with_deadline(child: &mut Child, timeout: Duration) -> std::io::Result<Option<ExitStatus>> {
    let started = Instant::now();
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if started.elapsed() >= timeout {
            return Ok(None);
        }
        std::thread::sleep(FFMPEG_POLL_INTERVAL);
    }
}

impl MediaDecoder for DefaultDecoder {
    fn decode(&self, path: &Path, kind: MediaKind) -> Result<DynamicImage, GenerationError> {
        match kind {
            MediaKind::Image => open_image(path).map_err(map_image_error),
            MediaKind::Video => self.extract_video_frame(path),
        }
    }
}

fn map_image_error(error: ImageError) -> GenerationError {
    match error {
        // Truncated sources surface as EOF from some codecs.
        ImageError::IoError(io_error)
            if matches!(
                io_error.kind(),
                std::io::ErrorKind::UnexpectedEof | std::io::ErrorKind::InvalidData
            ) =>
        {
            GenerationError::DecodeFailed(io_error.to_string())
        }
        ImageError::IoError(io_error) => GenerationError::FileUnreadable(io_error.to_string()),
        other => GenerationError::DecodeFailed(other.to_string()),
    }
}
