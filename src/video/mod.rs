//! Video file I/O through the `ffprobe` and `ffmpeg` command-line tools.
//!
//! Frames travel as raw `rgb24` over the subprocess pipes.

use crate::capture::FrameSource;
use crate::frame::{FourCc, PixelFormat, VideoFrame, VideoStreamInfo};
use crate::output::FrameSink;
use anyhow::{anyhow, bail, Context, Result};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::thread;
use tracing::{debug, error, info, warn};

/// Reads the properties of the first video stream in `path`.
pub fn probe(path: &Path) -> Result<VideoStreamInfo> {
    let output = Command::new("ffprobe")
        .args(["-v", "error", "-select_streams", "v:0", "-show_entries"])
        .arg("stream=codec_name,codec_tag_string,width,height,r_frame_rate,nb_frames")
        .args(["-of", "default=noprint_wrappers=1"])
        .arg(path)
        .output()
        .map_err(|e| anyhow!("Failed to run ffprobe: {}", e))?;

    if !output.status.success() {
        bail!("ffprobe failed: {}", String::from_utf8_lossy(&output.stderr));
    }
    parse_probe_output(&String::from_utf8_lossy(&output.stdout))
}

/// Parses `key=value` lines printed by ffprobe.
fn parse_probe_output(text: &str) -> Result<VideoStreamInfo> {
    let mut codec_name = "";
    let mut codec_tag = "";
    let mut width = None;
    let mut height = None;
    let mut frame_rate = 0.0;
    let mut frame_count = None;

    for line in text.lines() {
        let Some((key, value)) = line.trim().split_once('=') else {
            continue;
        };
        match key {
            "codec_name" => codec_name = value,
            "codec_tag_string" => codec_tag = value,
            "width" => width = value.parse::<u32>().ok(),
            "height" => height = value.parse::<u32>().ok(),
            "r_frame_rate" => frame_rate = parse_rate(value),
            "nb_frames" => frame_count = value.parse::<u64>().ok().filter(|n| *n > 0),
            _ => {}
        }
    }

    let (Some(width), Some(height)) = (width, height) else {
        bail!("No video stream dimensions in ffprobe output");
    };
    Ok(VideoStreamInfo {
        codec: codec_fourcc(codec_tag, codec_name),
        width,
        height,
        frame_rate,
        frame_count,
    })
}

/// Container tag when present, otherwise derived from the codec name.
fn codec_fourcc(tag: &str, name: &str) -> FourCc {
    if !tag.is_empty() && !tag.starts_with('[') {
        return tag.parse().unwrap_or(FourCc(*b"????"));
    }
    let code = match name {
        "h264" => "H264",
        "hevc" => "HEVC",
        "mpeg4" => "mp4v",
        "mjpeg" => "MJPG",
        other => other,
    };
    code.parse().unwrap_or(FourCc(*b"????"))
}

fn parse_rate(s: &str) -> f64 {
    if let Some((num, den)) = s.split_once('/') {
        let n: f64 = num.parse().unwrap_or(0.0);
        let d: f64 = den.parse().unwrap_or(1.0);
        if d == 0.0 {
            0.0
        } else {
            n / d
        }
    } else {
        s.parse().unwrap_or(0.0)
    }
}

/// ffmpeg encoder for a four-character codec code.
pub fn encoder_for(codec: FourCc) -> Option<&'static str> {
    let code = codec.to_string().to_ascii_lowercase();
    match code.as_str() {
        "h264" | "avc1" | "x264" => Some("libx264"),
        "hevc" | "hvc1" | "hev1" => Some("libx265"),
        "mp4v" | "fmp4" => Some("mpeg4"),
        "mjpg" => Some("mjpeg"),
        _ => None,
    }
}

/// Forwards error lines from an ffmpeg process to the log.
fn log_stderr(child: &mut Child, tool: &'static str) {
    let Some(mut stderr) = child.stderr.take() else {
        return;
    };
    thread::spawn(move || {
        let mut text = String::new();
        if stderr.read_to_string(&mut text).is_ok() {
            for line in text.lines().filter(|l| !l.trim().is_empty()) {
                error!("{}: {}", tool, line);
            }
        }
    });
}

/// Decodes a video file frame by frame.
pub struct FfmpegSource {
    child: Child,
    stdout: ChildStdout,
    info: VideoStreamInfo,
    frame_size: usize,
}

impl FfmpegSource {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let info = probe(path).with_context(|| format!("probing {:?}", path))?;
        info!("Opening video via ffmpeg: {:?}", path);

        let mut child = Command::new("ffmpeg")
            .args(["-v", "error", "-i"])
            .arg(path)
            .args(["-f", "rawvideo", "-pix_fmt", "rgb24", "-"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| anyhow!("Failed to spawn ffmpeg: {}", e))?;
        log_stderr(&mut child, "ffmpeg");
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| anyhow!("ffmpeg stdout not captured"))?;

        let frame_size = info.width as usize * info.height as usize * 3;
        Ok(Self {
            child,
            stdout,
            info,
            frame_size,
        })
    }
}

impl FrameSource for FfmpegSource {
    fn info(&self) -> &VideoStreamInfo {
        &self.info
    }

    fn next_frame(&mut self) -> Result<Option<VideoFrame>> {
        let mut data = vec![0u8; self.frame_size];
        match self.stdout.read_exact(&mut data) {
            Ok(()) => Ok(Some(VideoFrame::from_data(
                self.info.width,
                self.info.height,
                PixelFormat::Rgb,
                data,
            ))),
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                debug!("End of video stream");
                Ok(None)
            }
            Err(e) => Err(anyhow!("Error reading from ffmpeg: {}", e)),
        }
    }
}

impl Drop for FfmpegSource {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// Encodes frames into a video file.
pub struct FfmpegSink {
    child: Child,
    stdin: Option<ChildStdin>,
    path: PathBuf,
    width: u32,
    height: u32,
}

impl FfmpegSink {
    pub fn create(path: impl AsRef<Path>, codec: FourCc, width: u32, height: u32, frame_rate: f64) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let Some(encoder) = encoder_for(codec) else {
            bail!("No encoder for codec {}", codec);
        };
        let rate = if frame_rate > 0.0 { frame_rate } else { 30.0 };
        info!("Writing {:?} with {} at {}x{} {:.3} fps", path, encoder, width, height, rate);

        let mut command = Command::new("ffmpeg");
        command
            .args(["-v", "error", "-y", "-f", "rawvideo", "-pix_fmt", "rgb24"])
            .args(["-s", &format!("{}x{}", width, height)])
            .args(["-r", &format!("{}", rate)])
            .args(["-i", "-", "-c:v", encoder]);
        if encoder != "mjpeg" {
            command.args(["-pix_fmt", "yuv420p"]);
        }
        let mut child = command
            .arg(&path)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| anyhow!("Failed to spawn ffmpeg: {}", e))?;
        log_stderr(&mut child, "ffmpeg");
        let stdin = child.stdin.take();

        Ok(Self {
            child,
            stdin,
            path,
            width,
            height,
        })
    }
}

impl FrameSink for FfmpegSink {
    fn write_frame(&mut self, frame: &VideoFrame) -> Result<()> {
        if frame.width != self.width || frame.height != self.height {
            bail!(
                "Frame is {}x{}, encoder expects {}x{}",
                frame.width,
                frame.height,
                self.width,
                self.height
            );
        }
        let Some(stdin) = self.stdin.as_mut() else {
            bail!("Encoder for {:?} is already closed", self.path);
        };
        let rgb = frame.to_rgb_image().ok_or_else(|| anyhow!("Malformed frame"))?;
        stdin
            .write_all(rgb.as_raw())
            .with_context(|| format!("writing to {:?}", self.path))?;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        let Some(stdin) = self.stdin.take() else {
            return Ok(());
        };
        drop(stdin);
        let status = self.child.wait()?;
        if !status.success() {
            bail!("ffmpeg exited with {} while writing {:?}", status, self.path);
        }
        debug!("Finished writing {:?}", self.path);
        Ok(())
    }
}

impl Drop for FfmpegSink {
    fn drop(&mut self) {
        if let Err(e) = self.finish() {
            warn!("{}", e);
        }
    }
}
