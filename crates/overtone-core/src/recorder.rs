//! Session recorder
//!
//! Accumulates every buffer the engine renders (delivered over the
//! deferred-work channel) and writes the whole session as a 2-channel
//! 32-bit float WAV on shutdown. The RIFF chunks are written by hand:
//! fmt (format tag 3 = IEEE float), fact (required for non-PCM), data.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::types::{StereoSample, CHANNEL_COUNT, SAMPLE_RATE};

const BYTES_PER_SAMPLE: u32 = 4;

/// Where a captured session is written, relative to the working directory
pub const SESSION_FILE: &str = "overtone-session.wav";

/// Collects the session on the control thread and persists it on drop
#[derive(Debug, Default)]
pub struct SessionRecorder {
    frames: Vec<StereoSample>,
    path: Option<PathBuf>,
    saved: bool,
}

impl SessionRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable recording to the given path
    pub fn set_path(&mut self, path: PathBuf) {
        self.path = Some(path);
    }

    /// Append one rendered buffer
    pub fn append(&mut self, chunk: &[StereoSample]) {
        self.frames.extend_from_slice(chunk);
    }

    /// Stereo frames captured so far
    pub fn frames(&self) -> usize {
        self.frames.len()
    }

    /// Write the session to the configured path
    pub fn save(&mut self) -> io::Result<()> {
        let path = match &self.path {
            Some(path) => path.clone(),
            None => return Ok(()),
        };
        write_wav_file(&path, &self.frames, SAMPLE_RATE)?;
        self.saved = true;
        log::info!(
            "wrote session to {} ({} frames, {:.1}s)",
            path.display(),
            self.frames.len(),
            self.frames.len() as f64 / f64::from(SAMPLE_RATE)
        );
        Ok(())
    }
}

impl Drop for SessionRecorder {
    fn drop(&mut self) {
        if self.path.is_some() && !self.frames.is_empty() && !self.saved {
            if let Err(err) = self.save() {
                log::error!("failed to write session: {}", err);
            }
        }
    }
}

fn write_wav_file(path: &Path, frames: &[StereoSample], sample_rate: u32) -> io::Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    write_wav(&mut writer, frames, sample_rate)?;
    writer.flush()
}

/// Write a 2-channel IEEE-float WAV: RIFF [fmt fact data]
fn write_wav<W: Write>(writer: &mut W, frames: &[StereoSample], sample_rate: u32) -> io::Result<()> {
    let channels = CHANNEL_COUNT as u32;
    let block_align = channels * BYTES_PER_SAMPLE;
    let data_len = frames.len() as u32 * block_align;
    // fmt (8 + 16) + fact (8 + 4) + data (8 + data_len), plus "WAVE"
    let riff_len = 4 + 24 + 12 + 8 + data_len;

    writer.write_all(b"RIFF")?;
    writer.write_all(&riff_len.to_le_bytes())?;
    writer.write_all(b"WAVE")?;

    writer.write_all(b"fmt ")?;
    writer.write_all(&16u32.to_le_bytes())?;
    writer.write_all(&3u16.to_le_bytes())?; // IEEE float
    writer.write_all(&(channels as u16).to_le_bytes())?;
    writer.write_all(&sample_rate.to_le_bytes())?;
    writer.write_all(&(sample_rate * block_align).to_le_bytes())?;
    writer.write_all(&(block_align as u16).to_le_bytes())?;
    writer.write_all(&((BYTES_PER_SAMPLE * 8) as u16).to_le_bytes())?;

    writer.write_all(b"fact")?;
    writer.write_all(&4u32.to_le_bytes())?;
    writer.write_all(&(frames.len() as u32).to_le_bytes())?;

    writer.write_all(b"data")?;
    writer.write_all(&data_len.to_le_bytes())?;
    for frame in frames {
        writer.write_all(&frame.left.to_le_bytes())?;
        writer.write_all(&frame.right.to_le_bytes())?;
    }
    Ok(())
}
