//! The server side of the audio output channel: handshake, format selection
//! and the producer API for streaming PCM to the client.

mod pipeline;
mod task;

use std::borrow::Cow;
use std::io;
use std::sync::Arc;

use ironrdp_core::encode_vec;
use ironrdp_pdu::gcc::ChannelName;
use thiserror::Error;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::warn;

use self::pipeline::Pipeline;
use crate::channel::{ChannelManager, VirtualChannel};
use crate::dsp::AudioDsp;
use crate::pdu::{
    AudioFormat, AudioFormatFlags, ClientAudioFormatPdu, QualityMode, ServerAudioFormatPdu, ServerAudioOutputPdu,
    Version, VolumePdu, WaveFormat, WavePdu,
};

/// Errors surfaced to the producer side of the endpoint.
#[derive(Debug, Error)]
pub enum SoundServerError {
    #[error("the audio output channel could not be opened")]
    ChannelOpen,
    #[error("the audio output channel is not open")]
    ChannelClosed,
    #[error("no client format has been selected")]
    NoFormatSelected,
    #[error("sample data does not contain a whole number of frames")]
    PartialFrame,
    #[error("channel write failed")]
    ChannelWrite(#[source] io::Error),
    #[error("PDU encoding failed")]
    Encode(#[from] ironrdp_core::EncodeError),
}

/// Embedder-side callbacks, invoked from the channel task.
pub trait SoundServerHandler: Send + Sync {
    /// Called once per successful handshake, after the client's formats have
    /// been received and at least one of them is usable.
    ///
    /// Returning `Some(index)` selects that client format right away;
    /// returning `None` leaves the endpoint idle until
    /// [`SoundServer::select_format`] is called.
    fn activated(&mut self, client: &ClientAudioFormatPdu) -> Option<usize>;

    /// Called when the channel task exits, on either shutdown or EOF.
    fn stopped(&mut self) {}
}

pub(crate) struct Shared {
    pub(crate) handler: Box<dyn SoundServerHandler>,
    pub(crate) server_formats: Vec<AudioFormat>,
    pub(crate) src_format: AudioFormat,
    pub(crate) dsp: Box<dyn AudioDsp>,
    pub(crate) channel: Option<Arc<dyn VirtualChannel>>,
    pub(crate) client: Option<ClientAudioFormatPdu>,
    pub(crate) quality_mode: Option<QualityMode>,
    pub(crate) selected: Option<u16>,
    pub(crate) pipeline: Pipeline,
    resampled: Vec<u8>,
    encoded: Vec<u8>,
}

impl Shared {
    /// The opening advertisement: every server format, with its average byte
    /// rate recomputed from the rate, channel count and sample width.
    pub(crate) fn advertisement(&self) -> ServerAudioFormatPdu {
        let formats = self
            .server_formats
            .iter()
            .map(|fmt| AudioFormat {
                n_avg_bytes_per_sec: fmt.pcm_avg_bytes_per_sec(),
                ..fmt.clone()
            })
            .collect();

        ServerAudioFormatPdu {
            version: Version::V6,
            formats,
        }
    }

    pub(crate) async fn send(&self, pdu: &ServerAudioOutputPdu<'_>) -> Result<(), SoundServerError> {
        let channel = self.channel.as_ref().ok_or(SoundServerError::ChannelClosed)?;
        let frame = encode_vec(pdu)?;
        channel.write_all(&frame).await.map_err(SoundServerError::ChannelWrite)
    }

    /// Applies a client format choice. Invalid indices and degenerate formats
    /// are rejected with a warning and no state change.
    pub(crate) fn select_format(&mut self, index: usize) {
        let Shared {
            client,
            src_format,
            dsp,
            selected,
            pipeline,
            ..
        } = self;

        let Some(client) = client.as_ref() else {
            warn!(index, "format selected before the client reported its formats");
            return;
        };
        let Some(format) = client.formats.get(index) else {
            warn!(index, "client format index out of range");
            return;
        };
        let Ok(format_no) = u16::try_from(index) else {
            warn!(index, "client format index out of range");
            return;
        };

        if !pipeline.configure(format, src_format) {
            return;
        }

        *selected = Some(format_no);
        dsp.reset_adpcm();
    }

    pub(crate) async fn push_samples(&mut self, mut pcm: &[u8]) -> Result<(), SoundServerError> {
        if self.selected.is_none() {
            return Err(SoundServerError::NoFormatSelected);
        }
        if pcm.len() % self.pipeline.src_bytes_per_frame() != 0 {
            return Err(SoundServerError::PartialFrame);
        }

        while !pcm.is_empty() {
            let consumed = self.pipeline.fill(pcm);
            pcm = &pcm[consumed..];

            if self.pipeline.is_full() {
                self.send_wave().await?;
            }
        }

        Ok(())
    }

    /// Flushes the accumulated frames as one WaveInfo/Wave pair.
    ///
    /// The pair goes out as two consecutive channel writes split after the
    /// WaveInfo part: the WaveInfo message carries the first four payload
    /// bytes inline, the continuation carries the rest.
    pub(crate) async fn send_wave(&mut self) -> Result<(), SoundServerError> {
        let Shared {
            src_format,
            dsp,
            channel,
            client,
            selected,
            pipeline,
            resampled,
            encoded,
            ..
        } = self;

        let channel = channel.as_ref().ok_or(SoundServerError::ChannelClosed)?;
        let format_no = selected.ok_or(SoundServerError::NoFormatSelected)?;
        let format = client
            .as_ref()
            .and_then(|c| c.formats.get(usize::from(format_no)))
            .ok_or(SoundServerError::NoFormatSelected)?;

        let block_no = pipeline.next_block_no();
        let partial = pipeline.pending_frames() < pipeline.frames_per_wave();
        let src_bytes_per_sample = pipeline.src_bytes_per_sample();

        let (converted, frames): (&[u8], usize) =
            if format.n_samples_per_sec == src_format.n_samples_per_sec && format.n_channels == src_format.n_channels {
                (pipeline.pending_bytes(), pipeline.pending_frames())
            } else {
                resampled.clear();
                let frames = dsp.resample(
                    pipeline.pending_bytes(),
                    src_bytes_per_sample,
                    src_format.n_channels,
                    src_format.n_samples_per_sec,
                    pipeline.pending_frames(),
                    format.n_channels,
                    format.n_samples_per_sec,
                    resampled,
                );
                (resampled.as_slice(), frames)
            };

        let size = frames * usize::from(format.n_channels) * src_bytes_per_sample;

        let payload: &[u8] = if format.format == WaveFormat::DVI_ADPCM || format.format == WaveFormat::ADPCM {
            encoded.clear();
            if format.format == WaveFormat::DVI_ADPCM {
                dsp.encode_ima_adpcm(&converted[..size], format.n_channels, format.n_block_align, encoded);
            } else {
                dsp.encode_ms_adpcm(&converted[..size], format.n_channels, format.n_block_align, encoded);
            }

            // Fill the final block of a partial flush up to nBlockAlign.
            let block_align = usize::from(format.n_block_align);
            if partial && block_align != 0 && encoded.len() % block_align != 0 {
                let fill = block_align - encoded.len() % block_align;
                encoded.resize(encoded.len() + fill, 0);
            }

            encoded.as_slice()
        } else {
            &converted[..size]
        };

        // Sub-frame tails still need the four bytes inlined in the WaveInfo.
        let data: Cow<'_, [u8]> = if payload.len() < 4 {
            let mut padded = payload.to_vec();
            padded.resize(4, 0);
            Cow::Owned(padded)
        } else {
            Cow::Borrowed(payload)
        };

        let pdu = ServerAudioOutputPdu::Wave(WavePdu {
            timestamp: 0,
            format_no,
            block_no,
            data,
        });
        let frame = encode_vec(&pdu)?;
        let (info_part, data_part) = frame.split_at(WavePdu::INFO_PART_SIZE);

        let first = channel.write_all(info_part).await;
        let second = channel.write_all(data_part).await;

        pipeline.clear_pending();

        first.and(second).map_err(SoundServerError::ChannelWrite)
    }

    pub(crate) async fn close(&mut self) -> Result<(), SoundServerError> {
        if self.selected.is_none() {
            return Err(SoundServerError::NoFormatSelected);
        }

        if self.pipeline.pending_frames() > 0 {
            self.send_wave().await?;
        }

        self.selected = None;
        self.send(&ServerAudioOutputPdu::Close).await
    }
}

/// Server-side endpoint of the `"rdpsnd"` static virtual channel.
///
/// Construction goes through [`SoundServer::builder`]. [`SoundServer::start`]
/// opens the channel, spawns the receiver task and advertises the server
/// formats; from then on the embedder streams PCM with
/// [`SoundServer::push_samples`].
pub struct SoundServer {
    vcm: Arc<dyn ChannelManager>,
    shared: Arc<Mutex<Shared>>,
    channel: Option<Arc<dyn VirtualChannel>>,
    stop_tx: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl SoundServer {
    pub const NAME: ChannelName = ChannelName::from_static(b"rdpsnd\0\0");

    pub fn builder() -> SoundServerBuilder<WantsManager> {
        SoundServerBuilder { state: WantsManager {} }
    }

    /// Opens the channel, spawns the receiver task and sends the server
    /// format advertisement.
    pub async fn start(&mut self) -> Result<(), SoundServerError> {
        if self.task.is_some() {
            warn!("audio output channel is already running");
            return Ok(());
        }

        let channel = self.vcm.open(Self::NAME).ok_or(SoundServerError::ChannelOpen)?;

        self.channel = Some(Arc::clone(&channel));
        self.shared.lock().await.channel = Some(Arc::clone(&channel));

        let stop_rx = self.stop_tx.subscribe();
        self.task = Some(tokio::spawn(task::run(Arc::clone(&self.shared), channel, stop_rx)));

        Ok(())
    }

    /// Selects one of the formats the client reported. Out-of-range indices
    /// and degenerate formats are ignored with a warning.
    pub async fn select_format(&self, index: usize) {
        self.shared.lock().await.select_format(index);
    }

    /// Streams whole source-format PCM frames. Frames are buffered until one
    /// wave's worth is available, then converted and sent.
    ///
    /// Fails with [`SoundServerError::NoFormatSelected`] until a client
    /// format has been selected.
    pub async fn push_samples(&self, pcm: &[u8]) -> Result<(), SoundServerError> {
        self.shared.lock().await.push_samples(pcm).await
    }

    pub async fn set_volume(&self, volume_left: u16, volume_right: u16) -> Result<(), SoundServerError> {
        let pdu = ServerAudioOutputPdu::Volume(VolumePdu {
            volume_left,
            volume_right,
        });
        self.shared.lock().await.send(&pdu).await
    }

    /// Flushes any pending frames, tells the client to close its playback
    /// stream and clears the format selection.
    pub async fn close(&self) -> Result<(), SoundServerError> {
        self.shared.lock().await.close().await
    }

    /// Stops the receiver task, closes the channel and waits for the task to
    /// exit.
    pub async fn shutdown(mut self) {
        let _ = self.stop_tx.send(true);
        if let Some(channel) = self.channel.take() {
            channel.close();
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }

    /// Protocol version the client reported, once the handshake completed.
    pub async fn client_version(&self) -> Option<Version> {
        self.shared.lock().await.client.as_ref().map(|c| c.version)
    }

    /// Capability flags the client reported, once the handshake completed.
    pub async fn client_flags(&self) -> Option<AudioFormatFlags> {
        self.shared.lock().await.client.as_ref().map(|c| c.flags)
    }

    /// Formats the client reported, once the handshake completed.
    pub async fn client_formats(&self) -> Option<Vec<AudioFormat>> {
        self.shared.lock().await.client.as_ref().map(|c| c.formats.clone())
    }

    /// Last quality-mode hint received from the client. Informational.
    pub async fn quality_mode(&self) -> Option<QualityMode> {
        self.shared.lock().await.quality_mode
    }

    pub async fn selected_format(&self) -> Option<usize> {
        self.shared.lock().await.selected.map(usize::from)
    }

    /// Source-format frames currently buffered towards the next wave.
    pub async fn pending_frames(&self) -> usize {
        self.shared.lock().await.pipeline.pending_frames()
    }

    /// Source-format frames accumulated per emitted wave for the currently
    /// selected client format.
    pub async fn frames_per_wave(&self) -> usize {
        self.shared.lock().await.pipeline.frames_per_wave()
    }
}

impl Drop for SoundServer {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        if let Some(channel) = self.channel.take() {
            channel.close();
        }
    }
}

pub struct WantsManager {}
pub struct WantsSourceFormat {
    vcm: Arc<dyn ChannelManager>,
}
pub struct WantsDsp {
    vcm: Arc<dyn ChannelManager>,
    src_format: AudioFormat,
}
pub struct WantsHandler {
    vcm: Arc<dyn ChannelManager>,
    src_format: AudioFormat,
    dsp: Box<dyn AudioDsp>,
}
pub struct BuilderDone {
    vcm: Arc<dyn ChannelManager>,
    src_format: AudioFormat,
    dsp: Box<dyn AudioDsp>,
    handler: Box<dyn SoundServerHandler>,
    server_formats: Option<Vec<AudioFormat>>,
}

pub struct SoundServerBuilder<State> {
    state: State,
}

impl SoundServerBuilder<WantsManager> {
    pub fn with_channel_manager(self, vcm: Arc<dyn ChannelManager>) -> SoundServerBuilder<WantsSourceFormat> {
        SoundServerBuilder {
            state: WantsSourceFormat { vcm },
        }
    }
}

impl SoundServerBuilder<WantsSourceFormat> {
    /// The PCM format the embedder pushes through
    /// [`SoundServer::push_samples`].
    pub fn with_source_format(self, src_format: AudioFormat) -> SoundServerBuilder<WantsDsp> {
        SoundServerBuilder {
            state: WantsDsp {
                vcm: self.state.vcm,
                src_format,
            },
        }
    }
}

impl SoundServerBuilder<WantsDsp> {
    pub fn with_dsp<D>(self, dsp: D) -> SoundServerBuilder<WantsHandler>
    where
        D: AudioDsp + 'static,
    {
        SoundServerBuilder {
            state: WantsHandler {
                vcm: self.state.vcm,
                src_format: self.state.src_format,
                dsp: Box::new(dsp),
            },
        }
    }
}

impl SoundServerBuilder<WantsHandler> {
    pub fn with_handler<H>(self, handler: H) -> SoundServerBuilder<BuilderDone>
    where
        H: SoundServerHandler + 'static,
    {
        SoundServerBuilder {
            state: BuilderDone {
                vcm: self.state.vcm,
                src_format: self.state.src_format,
                dsp: self.state.dsp,
                handler: Box::new(handler),
                server_formats: None,
            },
        }
    }
}

impl SoundServerBuilder<BuilderDone> {
    /// Formats advertised to the client. Defaults to the source format alone.
    pub fn with_formats(mut self, server_formats: Vec<AudioFormat>) -> Self {
        self.state.server_formats = Some(server_formats);
        self
    }

    pub fn build(self) -> SoundServer {
        let BuilderDone {
            vcm,
            src_format,
            dsp,
            handler,
            server_formats,
        } = self.state;

        let server_formats = server_formats.unwrap_or_else(|| vec![src_format.clone()]);
        let (stop_tx, _) = watch::channel(false);

        SoundServer {
            vcm,
            shared: Arc::new(Mutex::new(Shared {
                handler,
                server_formats,
                src_format,
                dsp,
                channel: None,
                client: None,
                quality_mode: None,
                selected: None,
                pipeline: Pipeline::new(),
                resampled: Vec::new(),
                encoded: Vec::new(),
            })),
            channel: None,
            stop_tx,
            task: None,
        }
    }
}
