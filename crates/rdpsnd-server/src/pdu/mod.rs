//! Audio Output Virtual Channel Extension PDUs ([MS-RDPEA][1]), server-side subset.
//!
//! [1]: https://learn.microsoft.com/en-us/openspecs/windows_protocols/ms-rdpea/bea2d5cf-e3b9-4419-92e5-0e074ff9bc5b

use std::borrow::Cow;
use std::fmt;

use bitflags::bitflags;
use ironrdp_core::{
    cast_length, ensure_fixed_part_size, ensure_size, invalid_field_err, other_err, Decode, DecodeError, DecodeResult,
    Encode, EncodeResult, ReadCursor, WriteCursor,
};
use ironrdp_pdu::{read_padding, write_padding};

pub(crate) const SNDC_CLOSE: u8 = 0x01;
pub(crate) const SNDC_WAVE: u8 = 0x02;
pub(crate) const SNDC_SETVOLUME: u8 = 0x03;
pub(crate) const SNDC_WAVECONFIRM: u8 = 0x05;
pub(crate) const SNDC_TRAINING: u8 = 0x06;
pub(crate) const SNDC_FORMATS: u8 = 0x07;
pub(crate) const SNDC_QUALITYMODE: u8 = 0x0C;

/// The 4-byte `SNDPROLOG` preceding every message on the channel.
///
/// `body_size` counts the bytes following the prolog. The wave continuation
/// emitted after a WaveInfo message is the only data on the channel that is
/// not prefixed by a prolog of its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SndProlog {
    pub msg_type: u8,
    pub body_size: u16,
}

impl SndProlog {
    const NAME: &'static str = "SNDPROLOG";

    pub const FIXED_PART_SIZE: usize = 1 /* msgType */ + 1 /* bPad */ + 2 /* BodySize */;
}

impl<'de> Decode<'de> for SndProlog {
    fn decode(src: &mut ReadCursor<'de>) -> DecodeResult<Self> {
        ensure_fixed_part_size!(in: src);

        let msg_type = src.read_u8();
        read_padding!(src, 1);
        let body_size = src.read_u16();

        Ok(Self { msg_type, body_size })
    }
}

#[repr(u16)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd)]
pub enum Version {
    V2 = 0x02,
    V5 = 0x05,
    V6 = 0x06,
    V8 = 0x08,
}

impl TryFrom<u16> for Version {
    type Error = DecodeError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            0x02 => Ok(Self::V2),
            0x05 => Ok(Self::V5),
            0x06 => Ok(Self::V6),
            0x08 => Ok(Self::V8),
            _ => Err(invalid_field_err!("Version", "wVersion", "unknown audio output version")),
        }
    }
}

impl From<Version> for u16 {
    fn from(version: Version) -> Self {
        version as u16
    }
}

// format tags, per http://tools.ietf.org/html/rfc2361
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WaveFormat(pub u16);

macro_rules! wave_formats {
    (
        $(
            ($konst:ident, $num:expr);
        )+
    ) => {
        impl WaveFormat {
        $(
            pub const $konst: WaveFormat = WaveFormat($num);
        )+

            fn as_str(&self) -> Option<&'static str> {
                match self.0 {
                    $(
                        $num => Some(stringify!($konst)),
                    )+
                        _ => None
                }
            }
        }
    }
}

wave_formats! {
    (UNKNOWN, 0x0000);
    (PCM, 0x0001);
    (ADPCM, 0x0002);
    (IEEE_FLOAT, 0x0003);
    (ALAW, 0x0006);
    (MULAW, 0x0007);
    (DVI_ADPCM, 0x0011);
    (GSM610, 0x0031);
    (MPEGLAYER3, 0x0055);
    (G726_ADPCM, 0x0064);
    (MSRT24, 0x0082);
    (WMAUDIO2, 0x0161);
    (OPUS, 0x704F);
    (AAC_MS, 0xA106);
    (EXTENSIBLE, 0xFFFE);
}

impl fmt::Debug for WaveFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

impl fmt::Display for WaveFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.0, self.as_str().unwrap_or("<unknown wave format>"))
    }
}

/// One `AUDIO_FORMAT` entry of a version-and-formats exchange.
///
/// The fixed part mirrors `WAVEFORMATEX`; `extra_data` holds whatever
/// `cbSize` trailing bytes a codec ships next to its format (coefficient
/// tables and the like). Empty means no trailing bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AudioFormat {
    pub format: WaveFormat,
    pub n_channels: u16,
    pub n_samples_per_sec: u32,
    pub n_avg_bytes_per_sec: u32,
    pub n_block_align: u16,
    pub bits_per_sample: u16,
    pub extra_data: Vec<u8>,
}

impl AudioFormat {
    const NAME: &'static str = "AUDIO_FORMAT";

    // wFormatTag through cbSize, the WAVEFORMATEX fixed part
    const FIXED_PART_SIZE: usize = 18;

    /// A format the endpoint can negotiate: anything with a concrete tag.
    pub fn is_known(&self) -> bool {
        self.format != WaveFormat::UNKNOWN
    }

    pub fn bytes_per_sample(&self) -> usize {
        usize::from(self.bits_per_sample / 8)
    }

    pub fn bytes_per_frame(&self) -> usize {
        self.bytes_per_sample() * usize::from(self.n_channels)
    }

    /// Average byte rate implied by the sample rate, channel count and sample
    /// width, ignoring the stored `nAvgBytesPerSec` field.
    pub fn pcm_avg_bytes_per_sec(&self) -> u32 {
        self.n_samples_per_sec * u32::from(self.n_channels) * u32::from(self.bits_per_sample) / 8
    }
}

impl Encode for AudioFormat {
    fn encode(&self, dst: &mut WriteCursor<'_>) -> EncodeResult<()> {
        ensure_size!(in: dst, size: self.size());

        dst.write_u16(self.format.0); /* wFormatTag */
        dst.write_u16(self.n_channels); /* nChannels */
        dst.write_u32(self.n_samples_per_sec); /* nSamplesPerSec */
        dst.write_u32(self.n_avg_bytes_per_sec); /* nAvgBytesPerSec */
        dst.write_u16(self.n_block_align); /* nBlockAlign */
        dst.write_u16(self.bits_per_sample); /* wBitsPerSample */
        dst.write_u16(cast_length!("cbSize", self.extra_data.len())?);
        dst.write_slice(&self.extra_data);

        Ok(())
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn size(&self) -> usize {
        Self::FIXED_PART_SIZE + self.extra_data.len()
    }
}

impl<'de> Decode<'de> for AudioFormat {
    fn decode(src: &mut ReadCursor<'de>) -> DecodeResult<Self> {
        ensure_fixed_part_size!(in: src);

        let format = WaveFormat(src.read_u16());
        let n_channels = src.read_u16();
        let n_samples_per_sec = src.read_u32();
        let n_avg_bytes_per_sec = src.read_u32();
        let n_block_align = src.read_u16();
        let bits_per_sample = src.read_u16();

        let cb_size = usize::from(src.read_u16());
        ensure_size!(in: src, size: cb_size);
        let extra_data = src.read_slice(cb_size).to_vec();

        Ok(Self {
            format,
            n_channels,
            n_samples_per_sec,
            n_avg_bytes_per_sec,
            n_block_align,
            bits_per_sample,
            extra_data,
        })
    }
}

// Both version-and-formats messages open with the same 20-byte header:
// dwFlags, dwVolume, dwPitch, wDGramPort, wNumberOfFormats,
// cLastBlockConfirmed, wVersion, bPad.
const VERSION_AND_FORMATS_HEADER_SIZE: usize = 20;

fn encode_format_list(dst: &mut WriteCursor<'_>, formats: &[AudioFormat]) -> EncodeResult<()> {
    for format in formats {
        format.encode(dst)?;
    }
    Ok(())
}

fn decode_format_list(src: &mut ReadCursor<'_>, count: usize) -> DecodeResult<Vec<AudioFormat>> {
    let mut formats = Vec::with_capacity(count);
    for _ in 0..count {
        formats.push(AudioFormat::decode(src)?);
    }
    Ok(formats)
}

fn format_list_size(formats: &[AudioFormat]) -> usize {
    formats.iter().map(Encode::size).sum()
}

/// `SERVER_AUDIO_VERSION_AND_FORMATS`: what the server is willing to produce,
/// sent as soon as the channel is up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerAudioFormatPdu {
    pub version: Version,
    pub formats: Vec<AudioFormat>,
}

impl ServerAudioFormatPdu {
    const NAME: &'static str = "SERVER_AUDIO_VERSION_AND_FORMATS";

    const FIXED_PART_SIZE: usize = VERSION_AND_FORMATS_HEADER_SIZE;
}

impl Encode for ServerAudioFormatPdu {
    fn encode(&self, dst: &mut WriteCursor<'_>) -> EncodeResult<()> {
        ensure_size!(in: dst, size: self.size());

        // dwFlags, dwVolume and dwPitch are reserved on the server side, and
        // wDGramPort stays zero without a UDP transport
        write_padding!(dst, 14);
        dst.write_u16(cast_length!("wNumberOfFormats", self.formats.len())?);
        write_padding!(dst, 1); /* cLastBlockConfirmed */
        dst.write_u16(self.version.into());
        write_padding!(dst, 1); /* bPad */
        encode_format_list(dst, &self.formats)
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn size(&self) -> usize {
        Self::FIXED_PART_SIZE + format_list_size(&self.formats)
    }
}

impl<'de> Decode<'de> for ServerAudioFormatPdu {
    fn decode(src: &mut ReadCursor<'de>) -> DecodeResult<Self> {
        ensure_fixed_part_size!(in: src);

        read_padding!(src, 14); /* dwFlags, dwVolume, dwPitch, wDGramPort */
        let count = usize::from(src.read_u16());
        read_padding!(src, 1); /* cLastBlockConfirmed */
        let version = Version::try_from(src.read_u16())?;
        read_padding!(src, 1); /* bPad */
        let formats = decode_format_list(src, count)?;

        Ok(Self { version, formats })
    }
}

bitflags! {
    /// `dwFlags` of the client's version-and-formats message.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub struct AudioFormatFlags: u32 {
        /// Playback is possible at all (`TSSNDCAPS_ALIVE`).
        const ALIVE = 0x0000_0001;
        /// The client can rescale the volume of received audio
        /// (`TSSNDCAPS_VOLUME`).
        const VOLUME = 0x0000_0002;
        /// The client honours pitch changes (`TSSNDCAPS_PITCH`).
        const PITCH = 0x0000_0004;
        // Clients have been seen setting reserved bits; keep them.
        const _ = !0;
    }
}

/// `CLIENT_AUDIO_VERSION_AND_FORMATS`: the client's reply, scoping what it
/// can play back. Fields follow the wire layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientAudioFormatPdu {
    pub flags: AudioFormatFlags,
    pub volume_left: u16,
    pub volume_right: u16,
    pub pitch: u32,
    pub dgram_port: u16,
    pub version: Version,
    pub formats: Vec<AudioFormat>,
}

impl ClientAudioFormatPdu {
    const NAME: &'static str = "CLIENT_AUDIO_VERSION_AND_FORMATS";

    const FIXED_PART_SIZE: usize = VERSION_AND_FORMATS_HEADER_SIZE;

    /// Whether any of the reported formats can actually be negotiated.
    pub fn has_known_format(&self) -> bool {
        self.formats.iter().any(AudioFormat::is_known)
    }
}

impl Encode for ClientAudioFormatPdu {
    fn encode(&self, dst: &mut WriteCursor<'_>) -> EncodeResult<()> {
        ensure_size!(in: dst, size: self.size());

        dst.write_u32(self.flags.bits()); /* dwFlags */
        dst.write_u16(self.volume_left); /* dwVolume, low word */
        dst.write_u16(self.volume_right); /* dwVolume, high word */
        dst.write_u32(self.pitch); /* dwPitch */
        dst.write_u16(self.dgram_port); /* wDGramPort */
        dst.write_u16(cast_length!("wNumberOfFormats", self.formats.len())?);
        write_padding!(dst, 1); /* cLastBlockConfirmed */
        dst.write_u16(self.version.into());
        write_padding!(dst, 1); /* bPad */
        encode_format_list(dst, &self.formats)
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn size(&self) -> usize {
        Self::FIXED_PART_SIZE + format_list_size(&self.formats)
    }
}

impl<'de> Decode<'de> for ClientAudioFormatPdu {
    fn decode(src: &mut ReadCursor<'de>) -> DecodeResult<Self> {
        ensure_fixed_part_size!(in: src);

        let flags = AudioFormatFlags::from_bits_retain(src.read_u32());
        let volume_left = src.read_u16();
        let volume_right = src.read_u16();
        let pitch = src.read_u32();
        let dgram_port = src.read_u16();
        let count = usize::from(src.read_u16());
        read_padding!(src, 1); /* cLastBlockConfirmed */
        let version = Version::try_from(src.read_u16())?;
        read_padding!(src, 1); /* bPad */
        let formats = decode_format_list(src, count)?;

        Ok(Self {
            flags,
            volume_left,
            volume_right,
            pitch,
            dgram_port,
            version,
            formats,
        })
    }
}

/// `wQualityMode` hint sent by clients speaking version 6 or later.
///
/// Informational: the value is kept verbatim so that unrecognized hints
/// survive a round trip.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct QualityMode(pub u16);

impl QualityMode {
    pub const DYNAMIC: QualityMode = QualityMode(0x00);
    pub const MEDIUM: QualityMode = QualityMode(0x01);
    pub const HIGH: QualityMode = QualityMode(0x02);

    fn as_str(&self) -> Option<&'static str> {
        match self.0 {
            0x00 => Some("DYNAMIC"),
            0x01 => Some("MEDIUM"),
            0x02 => Some("HIGH"),
            _ => None,
        }
    }
}

impl fmt::Debug for QualityMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

impl fmt::Display for QualityMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.0, self.as_str().unwrap_or("<unknown quality mode>"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualityModePdu {
    pub quality_mode: QualityMode,
}

impl QualityModePdu {
    const NAME: &'static str = "AUDIO_QUALITY_MODE";

    const FIXED_PART_SIZE: usize =
        2 /* wQualityMode */
        + 2 /* reserved */;
}

impl Encode for QualityModePdu {
    fn encode(&self, dst: &mut WriteCursor<'_>) -> EncodeResult<()> {
        ensure_size!(in: dst, size: self.size());

        dst.write_u16(self.quality_mode.0);
        write_padding!(dst, 2); /* reserved */

        Ok(())
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn size(&self) -> usize {
        Self::FIXED_PART_SIZE
    }
}

impl<'de> Decode<'de> for QualityModePdu {
    fn decode(src: &mut ReadCursor<'de>) -> DecodeResult<Self> {
        ensure_fixed_part_size!(in: src);

        let quality_mode = QualityMode(src.read_u16());
        read_padding!(src, 2); /* reserved */

        Ok(Self { quality_mode })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainingConfirmPdu {
    pub timestamp: u16,
    pub pack_size: u16,
}

impl TrainingConfirmPdu {
    const NAME: &'static str = "SNDTRAININGCONFIRM";

    const FIXED_PART_SIZE: usize =
        2 /* wTimeStamp */
        + 2 /* wPackSize */;
}

impl Encode for TrainingConfirmPdu {
    fn encode(&self, dst: &mut WriteCursor<'_>) -> EncodeResult<()> {
        ensure_size!(in: dst, size: self.size());

        dst.write_u16(self.timestamp);
        dst.write_u16(self.pack_size);

        Ok(())
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn size(&self) -> usize {
        Self::FIXED_PART_SIZE
    }
}

impl<'de> Decode<'de> for TrainingConfirmPdu {
    fn decode(src: &mut ReadCursor<'de>) -> DecodeResult<Self> {
        ensure_fixed_part_size!(in: src);

        let timestamp = src.read_u16();
        let pack_size = src.read_u16();

        Ok(Self { timestamp, pack_size })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaveConfirmPdu {
    pub timestamp: u16,
    pub block_no: u8,
}

impl WaveConfirmPdu {
    const NAME: &'static str = "SNDWAV_CONFIRM";

    const FIXED_PART_SIZE: usize =
        2 /* wTimeStamp */
        + 1 /* cConfirmBlockNo */
        + 1 /* pad */;
}

impl Encode for WaveConfirmPdu {
    fn encode(&self, dst: &mut WriteCursor<'_>) -> EncodeResult<()> {
        ensure_size!(in: dst, size: self.size());

        dst.write_u16(self.timestamp);
        dst.write_u8(self.block_no);
        write_padding!(dst, 1);

        Ok(())
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn size(&self) -> usize {
        Self::FIXED_PART_SIZE
    }
}

impl<'de> Decode<'de> for WaveConfirmPdu {
    fn decode(src: &mut ReadCursor<'de>) -> DecodeResult<Self> {
        ensure_fixed_part_size!(in: src);

        let timestamp = src.read_u16();
        let block_no = src.read_u8();
        read_padding!(src, 1);

        Ok(Self { timestamp, block_no })
    }
}

/// `SNDWAVEINFO`: everything up to and including the first four payload bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaveInfoPdu {
    pub timestamp: u16,
    pub format_no: u16,
    pub block_no: u8,
    pub data: [u8; 4],
}

impl WaveInfoPdu {
    const NAME: &'static str = "SNDWAVEINFO";

    pub const FIXED_PART_SIZE: usize =
        2 /* wTimeStamp */
        + 2 /* wFormatNo */
        + 1 /* cBlockNo */
        + 3 /* bPad */
        + 4 /* data */;
}

impl Encode for WaveInfoPdu {
    fn encode(&self, dst: &mut WriteCursor<'_>) -> EncodeResult<()> {
        ensure_size!(in: dst, size: self.size());

        dst.write_u16(self.timestamp);
        dst.write_u16(self.format_no);
        dst.write_u8(self.block_no);
        write_padding!(dst, 3);
        dst.write_array(self.data);

        Ok(())
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn size(&self) -> usize {
        Self::FIXED_PART_SIZE
    }
}

impl<'de> Decode<'de> for WaveInfoPdu {
    fn decode(src: &mut ReadCursor<'de>) -> DecodeResult<Self> {
        ensure_fixed_part_size!(in: src);

        let timestamp = src.read_u16();
        let format_no = src.read_u16();
        let block_no = src.read_u8();
        read_padding!(src, 3);
        let data = src.read_array();

        Ok(Self {
            timestamp,
            format_no,
            block_no,
            data,
        })
    }
}

/// `SNDWAVE`: the continuation carrying payload bytes 4.. behind a 4-byte pad.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SndWavePdu {
    pub data: Vec<u8>,
}

impl SndWavePdu {
    const NAME: &'static str = "SNDWAVE";

    pub const FIXED_PART_SIZE: usize = 4 /* bPad */;

    fn decode(src: &mut ReadCursor<'_>, data_len: usize) -> DecodeResult<Self> {
        ensure_fixed_part_size!(in: src);

        read_padding!(src, 4);
        ensure_size!(in: src, size: data_len);
        let data = src.read_slice(data_len).into();

        Ok(Self { data })
    }
}

impl Encode for SndWavePdu {
    fn encode(&self, dst: &mut WriteCursor<'_>) -> EncodeResult<()> {
        ensure_size!(in: dst, size: self.size());

        write_padding!(dst, 4);
        dst.write_slice(&self.data);

        Ok(())
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn size(&self) -> usize {
        Self::FIXED_PART_SIZE
            .checked_add(self.data.len())
            .expect("never overflow")
    }
}

/// One audio block: WaveInfoPdu + SndWavePdu.
///
/// The prolog's `BodySize` is `data.len() + 8` and spans both parts; the
/// split point for emitting the parts as two separate channel writes is
/// [`WavePdu::INFO_PART_SIZE`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WavePdu<'a> {
    pub timestamp: u16,
    pub format_no: u16,
    pub block_no: u8,
    pub data: Cow<'a, [u8]>,
}

impl WavePdu<'_> {
    const NAME: &'static str = "WavePdu";

    /// Wire length of the prolog plus the WaveInfo part.
    pub const INFO_PART_SIZE: usize = SndProlog::FIXED_PART_SIZE + WaveInfoPdu::FIXED_PART_SIZE;

    pub(crate) fn body_size(&self) -> usize {
        (WaveInfoPdu::FIXED_PART_SIZE - 4)
            .checked_add(self.data.len())
            .expect("never overflow")
    }

    fn decode(src: &mut ReadCursor<'_>, body_size: u16) -> DecodeResult<Self> {
        let info = WaveInfoPdu::decode(src)?;
        let body_size = usize::from(body_size);
        let data_len = body_size
            .checked_sub(info.size())
            .ok_or_else(|| invalid_field_err!("WavePdu", "BodySize", "too small for the WaveInfo part"))?;
        let wave = SndWavePdu::decode(src, data_len)?;

        let mut data = Vec::with_capacity(wave.size());
        data.extend_from_slice(&info.data);
        data.extend_from_slice(&wave.data);

        Ok(Self {
            timestamp: info.timestamp,
            format_no: info.format_no,
            block_no: info.block_no,
            data: data.into(),
        })
    }
}

impl Encode for WavePdu<'_> {
    fn encode(&self, dst: &mut WriteCursor<'_>) -> EncodeResult<()> {
        let info = WaveInfoPdu {
            timestamp: self.timestamp,
            format_no: self.format_no,
            block_no: self.block_no,
            data: self.data[0..4]
                .try_into()
                .map_err(|e| other_err!("payload shorter than four bytes", source: e))?,
        };
        let wave = SndWavePdu {
            data: self.data[4..].into(),
        };
        info.encode(dst)?;
        wave.encode(dst)?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn size(&self) -> usize {
        (WaveInfoPdu::FIXED_PART_SIZE + SndWavePdu::FIXED_PART_SIZE - 4)
            .checked_add(self.data.len())
            .expect("never overflow")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumePdu {
    pub volume_left: u16,
    pub volume_right: u16,
}

impl VolumePdu {
    const NAME: &'static str = "SNDVOL";

    const FIXED_PART_SIZE: usize = 4;
}

impl Encode for VolumePdu {
    fn encode(&self, dst: &mut WriteCursor<'_>) -> EncodeResult<()> {
        ensure_size!(in: dst, size: self.size());

        let volume = (u32::from(self.volume_right) << 16) | u32::from(self.volume_left);
        dst.write_u32(volume);

        Ok(())
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn size(&self) -> usize {
        Self::FIXED_PART_SIZE
    }
}

impl<'de> Decode<'de> for VolumePdu {
    fn decode(src: &mut ReadCursor<'de>) -> DecodeResult<Self> {
        ensure_fixed_part_size!(in: src);

        let volume_left = src.read_u16();
        let volume_right = src.read_u16();

        Ok(Self {
            volume_left,
            volume_right,
        })
    }
}

/// Server Audio Output Channel message (PDU prefixed with `SNDPROLOG`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerAudioOutputPdu<'a> {
    AudioFormat(ServerAudioFormatPdu),
    Wave(WavePdu<'a>),
    Volume(VolumePdu),
    Close,
}

impl ServerAudioOutputPdu<'_> {
    const NAME: &'static str = "ServerAudioOutputPdu";

    const FIXED_PART_SIZE: usize = SndProlog::FIXED_PART_SIZE;
}

impl Encode for ServerAudioOutputPdu<'_> {
    fn encode(&self, dst: &mut WriteCursor<'_>) -> EncodeResult<()> {
        ensure_fixed_part_size!(in: dst);

        let (msg_type, body_size) = match self {
            Self::AudioFormat(pdu) => (SNDC_FORMATS, pdu.size()),
            Self::Wave(pdu) => (SNDC_WAVE, pdu.body_size()),
            Self::Volume(pdu) => (SNDC_SETVOLUME, pdu.size()),
            Self::Close => (SNDC_CLOSE, 0),
        };

        dst.write_u8(msg_type);
        write_padding!(dst, 1);
        dst.write_u16(cast_length!("ServerAudioOutputPdu::BodySize", body_size)?);

        match self {
            Self::AudioFormat(pdu) => pdu.encode(dst),
            Self::Wave(pdu) => pdu.encode(dst),
            Self::Volume(pdu) => pdu.encode(dst),
            Self::Close => Ok(()),
        }?;

        Ok(())
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn size(&self) -> usize {
        Self::FIXED_PART_SIZE
            .checked_add(match self {
                Self::AudioFormat(pdu) => pdu.size(),
                Self::Wave(pdu) => pdu.size(),
                Self::Volume(pdu) => pdu.size(),
                Self::Close => 0,
            })
            .expect("never overflow")
    }
}

impl<'de> Decode<'de> for ServerAudioOutputPdu<'_> {
    fn decode(src: &mut ReadCursor<'de>) -> DecodeResult<Self> {
        let prolog = SndProlog::decode(src)?;

        match prolog.msg_type {
            SNDC_FORMATS => {
                let pdu = ServerAudioFormatPdu::decode(src)?;
                Ok(Self::AudioFormat(pdu))
            }
            SNDC_WAVE => {
                let pdu = WavePdu::decode(src, prolog.body_size)?;
                Ok(Self::Wave(pdu))
            }
            SNDC_SETVOLUME => {
                let pdu = VolumePdu::decode(src)?;
                Ok(Self::Volume(pdu))
            }
            SNDC_CLOSE => Ok(Self::Close),
            _ => Err(invalid_field_err!(
                "ServerAudioOutputPdu",
                "msgType",
                "unknown audio output PDU type"
            )),
        }
    }
}

/// Client Audio Output Channel message (PDU prefixed with `SNDPROLOG`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientAudioOutputPdu {
    AudioFormat(ClientAudioFormatPdu),
    QualityMode(QualityModePdu),
    TrainingConfirm(TrainingConfirmPdu),
    WaveConfirm(WaveConfirmPdu),
}

impl ClientAudioOutputPdu {
    const NAME: &'static str = "ClientAudioOutputPdu";

    const FIXED_PART_SIZE: usize = SndProlog::FIXED_PART_SIZE;
}

impl Encode for ClientAudioOutputPdu {
    fn encode(&self, dst: &mut WriteCursor<'_>) -> EncodeResult<()> {
        ensure_fixed_part_size!(in: dst);

        let (msg_type, body_size) = match self {
            Self::AudioFormat(pdu) => (SNDC_FORMATS, pdu.size()),
            Self::QualityMode(pdu) => (SNDC_QUALITYMODE, pdu.size()),
            Self::TrainingConfirm(pdu) => (SNDC_TRAINING, pdu.size()),
            Self::WaveConfirm(pdu) => (SNDC_WAVECONFIRM, pdu.size()),
        };

        dst.write_u8(msg_type);
        write_padding!(dst, 1);
        dst.write_u16(cast_length!("ClientAudioOutputPdu::BodySize", body_size)?);

        match self {
            Self::AudioFormat(pdu) => pdu.encode(dst),
            Self::QualityMode(pdu) => pdu.encode(dst),
            Self::TrainingConfirm(pdu) => pdu.encode(dst),
            Self::WaveConfirm(pdu) => pdu.encode(dst),
        }?;

        Ok(())
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn size(&self) -> usize {
        Self::FIXED_PART_SIZE
            .checked_add(match self {
                Self::AudioFormat(pdu) => pdu.size(),
                Self::QualityMode(pdu) => pdu.size(),
                Self::TrainingConfirm(pdu) => pdu.size(),
                Self::WaveConfirm(pdu) => pdu.size(),
            })
            .expect("never overflow")
    }
}

impl<'de> Decode<'de> for ClientAudioOutputPdu {
    fn decode(src: &mut ReadCursor<'de>) -> DecodeResult<Self> {
        let prolog = SndProlog::decode(src)?;

        match prolog.msg_type {
            SNDC_FORMATS => {
                let pdu = ClientAudioFormatPdu::decode(src)?;
                Ok(Self::AudioFormat(pdu))
            }
            SNDC_QUALITYMODE => {
                let pdu = QualityModePdu::decode(src)?;
                Ok(Self::QualityMode(pdu))
            }
            SNDC_TRAINING => {
                let pdu = TrainingConfirmPdu::decode(src)?;
                Ok(Self::TrainingConfirm(pdu))
            }
            SNDC_WAVECONFIRM => {
                let pdu = WaveConfirmPdu::decode(src)?;
                Ok(Self::WaveConfirm(pdu))
            }
            _ => Err(invalid_field_err!(
                "ClientAudioOutputPdu",
                "msgType",
                "unknown audio output PDU type"
            )),
        }
    }
}
