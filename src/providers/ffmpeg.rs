//! ffmpeg-backed decoder for video files
//!
//! `ffprobe` reads the stream properties once at open time, then an `ffmpeg`
//! child process decodes the first video stream to 8-bit gray rawvideo on its
//! stdout. The output is scaled to the probed display size, so each frame is
//! exactly `width * height` bytes and the decoder reads fixed-size chunks until
//! the pipe closes. A closed pipe only counts as the end of the video when
//! ffmpeg exits successfully.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use serde::Deserialize;
use tokio::io::{AsyncReadExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdout, Command};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::decoder::{DecoderBackend, VideoDecoder, VideoInfo};
use crate::types::RawFrame;
use crate::{PlayerError, Result};

/// Backend spawning `ffprobe`/`ffmpeg` executables.
#[derive(Debug, Clone)]
pub struct FfmpegBackend {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
}

impl Default for FfmpegBackend {
    fn default() -> Self {
        Self { ffmpeg: PathBuf::from("ffmpeg"), ffprobe: PathBuf::from("ffprobe") }
    }
}

impl FfmpegBackend {
    /// Backend resolving `ffmpeg` and `ffprobe` from `PATH`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend using explicit executable paths.
    pub fn with_executables(ffmpeg: impl Into<PathBuf>, ffprobe: impl Into<PathBuf>) -> Self {
        Self { ffmpeg: ffmpeg.into(), ffprobe: ffprobe.into() }
    }

    async fn probe(&self, path: &Path) -> Result<VideoInfo> {
        let output = Command::new(&self.ffprobe)
            .args(["-v", "error", "-select_streams", "v:0", "-show_streams"])
            .args(["-print_format", "json"])
            .arg(path)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| {
                PlayerError::decode_failed_with_source(path, "failed to spawn ffprobe", Box::new(e))
            })?;

        if !output.status.success() {
            return Err(PlayerError::decode_failed(
                path,
                format!(
                    "ffprobe exited with {}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            ));
        }

        parse_probe(path, &output.stdout)
    }
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    #[serde(default)]
    codec_type: Option<String>,
    #[serde(default)]
    width: Option<u32>,
    #[serde(default)]
    height: Option<u32>,
    #[serde(default)]
    r_frame_rate: Option<String>,
    #[serde(default)]
    avg_frame_rate: Option<String>,
    #[serde(default)]
    tags: ProbeTags,
    #[serde(default)]
    side_data_list: Vec<ProbeSideData>,
}

#[derive(Debug, Default, Deserialize)]
struct ProbeTags {
    #[serde(default)]
    rotate: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProbeSideData {
    #[serde(default)]
    rotation: Option<f64>,
}

impl ProbeStream {
    /// Rotation in degrees ffmpeg applies when autorotating.
    fn rotation(&self) -> Option<f64> {
        self.side_data_list
            .iter()
            .find_map(|side| side.rotation)
            .or_else(|| self.tags.rotate.as_deref().and_then(|r| r.trim().parse().ok()))
    }
}

fn parse_probe(path: &Path, json: &[u8]) -> Result<VideoInfo> {
    let probe: ProbeOutput = serde_json::from_slice(json).map_err(|e| {
        PlayerError::decode_failed_with_source(path, "unreadable ffprobe output", Box::new(e))
    })?;

    let stream = probe
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref().is_none_or(|kind| kind == "video"))
        .ok_or_else(|| PlayerError::decode_failed(path, "no video stream"))?;

    let (width, height) = match (stream.width, stream.height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
        _ => return Err(PlayerError::decode_failed(path, "video stream has no resolution")),
    };
    // Quarter turns swap the displayed axes
    let (width, height) = match stream.rotation() {
        Some(degrees) if (degrees.round() as i64).rem_euclid(180) == 90 => (height, width),
        _ => (width, height),
    };

    let fps = stream
        .r_frame_rate
        .as_deref()
        .and_then(parse_rate)
        .or_else(|| stream.avg_frame_rate.as_deref().and_then(parse_rate));

    Ok(VideoInfo { fps, width, height })
}

/// Parse an ffprobe rate such as `30000/1001` or `25`.
fn parse_rate(raw: &str) -> Option<f64> {
    let value = raw.trim();
    let rate = match value.split_once('/') {
        Some((num, den)) => {
            let num = num.trim().parse::<f64>().ok()?;
            let den = den.trim().parse::<f64>().ok()?;
            if den == 0.0 {
                return None;
            }
            num / den
        }
        None => value.parse::<f64>().ok()?,
    };

    (rate.is_finite() && rate > 0.0).then_some(rate)
}

#[async_trait::async_trait]
impl DecoderBackend for FfmpegBackend {
    async fn open(&self, path: &Path) -> Result<Box<dyn VideoDecoder>> {
        match tokio::fs::metadata(path).await {
            Ok(meta) if meta.is_file() => {}
            Ok(_) => return Err(PlayerError::decode_failed(path, "not a regular file")),
            Err(e) => {
                return Err(PlayerError::decode_failed_with_source(
                    path,
                    "cannot open video",
                    Box::new(e),
                ));
            }
        }

        let info = self.probe(path).await?;

        let mut child = Command::new(&self.ffmpeg)
            .args(decode_args(path, &info))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                PlayerError::decode_failed_with_source(path, "failed to spawn ffmpeg", Box::new(e))
            })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| PlayerError::decode_failed(path, "ffmpeg stdout not captured"))?;
        let stderr = child.stderr.take().map(|stderr| tokio::spawn(stderr_tail(stderr)));

        info!(
            "Opened video {}: {}x{} at {:?} fps",
            path.display(),
            info.width,
            info.height,
            info.fps
        );

        Ok(Box::new(FfmpegDecoder {
            path: path.to_path_buf(),
            child,
            stdout: BufReader::new(stdout),
            stderr,
            frame_len: info.width as usize * info.height as usize,
            info,
            frames_read: 0,
            closed: false,
        }))
    }
}

/// ffmpeg arguments decoding the first video stream to gray rawvideo at the
/// probed display size.
fn decode_args(path: &Path, info: &VideoInfo) -> Vec<OsString> {
    let mut args: Vec<OsString> = ["-v", "error", "-nostdin", "-i"].map(OsString::from).into();
    args.push(path.as_os_str().to_os_string());
    args.extend(
        ["-map", "0:v:0", "-f", "rawvideo", "-pix_fmt", "gray", "-sws_flags", "area", "-s"]
            .map(OsString::from),
    );
    args.push(format!("{}x{}", info.width, info.height).into());
    args.push("-".into());
    args
}

/// Most recent ffmpeg diagnostics kept for error reports.
const STDERR_TAIL_BYTES: usize = 4096;

/// Drain ffmpeg's stderr so it never blocks on a full pipe, keeping the tail.
async fn stderr_tail(mut stderr: ChildStderr) -> String {
    let mut tail = Vec::new();
    let mut chunk = [0u8; 1024];
    while let Ok(n) = stderr.read(&mut chunk).await {
        if n == 0 {
            break;
        }
        tail.extend_from_slice(&chunk[..n]);
        if tail.len() > STDERR_TAIL_BYTES {
            tail.drain(..tail.len() - STDERR_TAIL_BYTES);
        }
    }
    String::from_utf8_lossy(&tail).trim().to_string()
}

/// Decoder reading gray frames from an `ffmpeg` child process.
///
/// The child is spawned with kill-on-drop, so dropping the decoder releases it.
pub struct FfmpegDecoder {
    path: PathBuf,
    child: Child,
    stdout: BufReader<ChildStdout>,
    stderr: Option<JoinHandle<String>>,
    info: VideoInfo,
    frame_len: usize,
    frames_read: u64,
    closed: bool,
}

impl FfmpegDecoder {
    /// Reap ffmpeg once its output ends; a failed exit is a decode error.
    async fn finish(&mut self) -> Result<()> {
        self.closed = true;
        let status = self.child.wait().await.map_err(|e| {
            PlayerError::decode_failed_with_source(&self.path, "failed to wait for ffmpeg", Box::new(e))
        })?;
        if status.success() {
            return Ok(());
        }

        let diagnostics = match self.stderr.take() {
            Some(task) => task.await.unwrap_or_default(),
            None => String::new(),
        };
        warn!("ffmpeg failed on {} after {} frames", self.path.display(), self.frames_read);
        Err(PlayerError::decode_failed(
            &self.path,
            format!("ffmpeg exited with {}: {}", status, diagnostics),
        ))
    }
}

#[async_trait::async_trait]
impl VideoDecoder for FfmpegDecoder {
    fn info(&self) -> VideoInfo {
        self.info
    }

    async fn next_frame(&mut self) -> Result<Option<RawFrame>> {
        if self.closed {
            return Ok(None);
        }

        let mut buf = vec![0u8; self.frame_len];
        let mut filled = 0;
        while filled < self.frame_len {
            let n = self
                .stdout
                .read(&mut buf[filled..])
                .await
                .map_err(|e| {
                    PlayerError::decode_failed_with_source(
                        &self.path,
                        "failed to read ffmpeg output",
                        Box::new(e),
                    )
                })?;
            if n == 0 {
                break;
            }
            filled += n;
        }

        if filled < self.frame_len {
            self.finish().await?;
        }
        if filled == 0 {
            debug!("End of video {} after {} frames", self.path.display(), self.frames_read);
            return Ok(None);
        }
        if filled < self.frame_len {
            warn!(
                "Dropping truncated trailing frame of {} ({} of {} bytes)",
                self.path.display(),
                filled,
                self.frame_len
            );
            return Ok(None);
        }

        self.frames_read += 1;
        trace!("Decoded frame {} of {}", self.frames_read, self.path.display());
        RawFrame::luma(self.info.width, self.info.height, buf).map(Some)
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(stderr) = self.stderr.take() {
            stderr.abort();
        }
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        // Already-exited children report an error from start_kill; nothing to release then.
        let _ = self.child.start_kill();
        if let Err(e) = self.child.wait().await {
            warn!("Failed to reap ffmpeg for {}: {}", self.path.display(), e);
        }
        debug!("Closed decoder for {}", self.path.display());
        Ok(())
    }
}
