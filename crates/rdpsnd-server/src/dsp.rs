//! Sample-rate conversion and ADPCM encoding contract.
//!
//! The DSP primitives live outside this crate; the outbound pipeline only
//! drives them through this trait. Output buffers are owned by the pipeline
//! and handed in by the caller, so implementations carry codec state only.

/// 16-bit little-endian interleaved PCM in, client-format bytes out.
pub trait AudioDsp: Send + Sync {
    /// Converts `src_frames` frames from `src` to the target channel count
    /// and rate, appending the converted PCM to `dst`.
    ///
    /// Returns the number of frames appended.
    #[allow(clippy::too_many_arguments)]
    fn resample(
        &mut self,
        src: &[u8],
        src_bytes_per_sample: usize,
        src_channels: u16,
        src_rate: u32,
        src_frames: usize,
        dst_channels: u16,
        dst_rate: u32,
        dst: &mut Vec<u8>,
    ) -> usize;

    /// IMA (DVI) ADPCM, format tag 0x0011. Output is appended to `dst` in
    /// whole `block_align` blocks, except possibly the final one.
    fn encode_ima_adpcm(&mut self, src: &[u8], channels: u16, block_align: u16, dst: &mut Vec<u8>);

    /// Microsoft ADPCM, format tag 0x0002. Same output convention as
    /// [`AudioDsp::encode_ima_adpcm`].
    fn encode_ms_adpcm(&mut self, src: &[u8], channels: u16, block_align: u16, dst: &mut Vec<u8>);

    /// Drops predictor state carried between blocks. Called whenever a client
    /// format is (re)selected.
    fn reset_adpcm(&mut self);
}
