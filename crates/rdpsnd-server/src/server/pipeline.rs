//! Outbound audio pipeline: accumulates source-format PCM frames until one
//! wave's worth is buffered.

use tracing::warn;

use crate::pdu::{AudioFormat, WaveFormat};

/// PCM byte budget per wave when no block-structured codec is involved.
const PASSTHROUGH_WAVE_BYTES: usize = 0x4000;

pub(crate) struct Pipeline {
    out_buffer: Vec<u8>,
    out_frames: usize,
    out_pending_frames: usize,
    block_no: u8,
    src_bytes_per_sample: usize,
    src_bytes_per_frame: usize,
}

impl Pipeline {
    pub(crate) fn new() -> Self {
        Self {
            out_buffer: Vec::new(),
            out_frames: 0,
            out_pending_frames: 0,
            block_no: 0,
            src_bytes_per_sample: 0,
            src_bytes_per_frame: 0,
        }
    }

    /// Derives the per-wave frame budget for the selected client format and
    /// prepares the accumulation buffer.
    ///
    /// The budget is sized so that, after resampling, slightly less than one
    /// client block is produced and the codec output fits a single
    /// `nBlockAlign`-sized frame. Returns `false` for degenerate formats,
    /// leaving the previous configuration untouched.
    pub(crate) fn configure(&mut self, client: &AudioFormat, src: &AudioFormat) -> bool {
        let src_bytes_per_sample = src.bytes_per_sample();
        let src_bytes_per_frame = src.bytes_per_frame();
        if src_bytes_per_frame == 0 {
            warn!("source format has no sample width");
            return false;
        }
        if client.n_samples_per_sec == 0 {
            warn!("client format has a zero sample rate");
            return false;
        }

        let channels = usize::from(client.n_channels);
        let block_align = usize::from(client.n_block_align);

        let mut out_frames = if client.format == WaveFormat::DVI_ADPCM {
            if channels == 0 || block_align <= 4 * channels {
                warn!(block_align, channels, "IMA ADPCM format with an unusable block align");
                return false;
            }
            let bs = (block_align - 4 * channels) * 4;
            (block_align * 4 * channels * 2 / bs + 1) * bs / (channels * 2)
        } else if client.format == WaveFormat::ADPCM {
            if channels == 0 || block_align <= 7 * channels {
                warn!(block_align, channels, "MS ADPCM format with an unusable block align");
                return false;
            }
            let bs = (block_align - 7 * channels) * 2 / channels + 2;
            bs * 4
        } else {
            PASSTHROUGH_WAVE_BYTES / src_bytes_per_frame
        };

        if client.n_samples_per_sec != src.n_samples_per_sec {
            // Bias low so the converted output stays within one client block.
            let src_rate = src.n_samples_per_sec as usize;
            let dst_rate = client.n_samples_per_sec as usize;
            out_frames = (out_frames * src_rate + dst_rate - 100) / dst_rate;
        }

        if out_frames == 0 {
            warn!("per-wave frame budget collapsed to zero");
            return false;
        }

        self.src_bytes_per_sample = src_bytes_per_sample;
        self.src_bytes_per_frame = src_bytes_per_frame;
        self.out_frames = out_frames;
        self.out_pending_frames = 0;

        let out_buffer_size = out_frames * src_bytes_per_frame;
        if self.out_buffer.len() < out_buffer_size {
            self.out_buffer.resize(out_buffer_size, 0);
        }

        true
    }

    /// Copies as many whole frames as currently fit and returns the number of
    /// bytes consumed from `pcm`.
    pub(crate) fn fill(&mut self, pcm: &[u8]) -> usize {
        let available = self.out_frames - self.out_pending_frames;
        let n_frames = (pcm.len() / self.src_bytes_per_frame).min(available);
        let n_bytes = n_frames * self.src_bytes_per_frame;

        let offset = self.out_pending_frames * self.src_bytes_per_frame;
        self.out_buffer[offset..offset + n_bytes].copy_from_slice(&pcm[..n_bytes]);
        self.out_pending_frames += n_frames;

        n_bytes
    }

    pub(crate) fn is_full(&self) -> bool {
        self.out_pending_frames >= self.out_frames
    }

    pub(crate) fn pending_frames(&self) -> usize {
        self.out_pending_frames
    }

    pub(crate) fn pending_bytes(&self) -> &[u8] {
        &self.out_buffer[..self.out_pending_frames * self.src_bytes_per_frame]
    }

    pub(crate) fn clear_pending(&mut self) {
        self.out_pending_frames = 0;
    }

    pub(crate) fn frames_per_wave(&self) -> usize {
        self.out_frames
    }

    pub(crate) fn src_bytes_per_sample(&self) -> usize {
        self.src_bytes_per_sample
    }

    pub(crate) fn src_bytes_per_frame(&self) -> usize {
        self.src_bytes_per_frame
    }

    /// Advances the rolling block counter and returns the value the next wave
    /// carries.
    pub(crate) fn next_block_no(&mut self) -> u8 {
        self.block_no = self.block_no.wrapping_add(1);
        self.block_no
    }
}
