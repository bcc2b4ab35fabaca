//! Fake transport, DSP and handler used to drive the endpoint end to end.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use ironrdp_core::encode_vec;
use rdpsnd_server::channel::{ChannelManager, ChannelName, ReadOutcome, VirtualChannel};
use rdpsnd_server::dsp::AudioDsp;
use rdpsnd_server::pdu::{
    AudioFormat, AudioFormatFlags, ClientAudioFormatPdu, ClientAudioOutputPdu, Version, WaveFormat,
};
use rdpsnd_server::server::{SoundServer, SoundServerHandler};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::Notify;

/// In-memory virtual channel: inbound messages are fed through an mpsc
/// sender, every `write_all` is captured as one entry.
pub(crate) struct MockChannel {
    incoming: tokio::sync::Mutex<UnboundedReceiver<Vec<u8>>>,
    pending: Mutex<Option<Vec<u8>>>,
    writes: Mutex<Vec<Vec<u8>>>,
    closed: AtomicBool,
    close_notify: Notify,
}

impl MockChannel {
    pub(crate) fn new(incoming: UnboundedReceiver<Vec<u8>>) -> Self {
        Self {
            incoming: tokio::sync::Mutex::new(incoming),
            pending: Mutex::new(None),
            writes: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
            close_notify: Notify::new(),
        }
    }

    pub(crate) fn writes(&self) -> Vec<Vec<u8>> {
        self.writes.lock().unwrap().clone()
    }
}

#[async_trait]
impl VirtualChannel for MockChannel {
    async fn read(&self, buf: &mut [u8]) -> io::Result<ReadOutcome> {
        if self.closed.load(Ordering::SeqCst) {
            return Ok(ReadOutcome::Eof);
        }

        let pending = self.pending.lock().unwrap().take();
        let frame = match pending {
            Some(frame) => frame,
            None => {
                let mut incoming = self.incoming.lock().await;
                tokio::select! {
                    _ = self.close_notify.notified() => return Ok(ReadOutcome::Eof),
                    received = incoming.recv() => match received {
                        Some(frame) => frame,
                        None => return Ok(ReadOutcome::Eof),
                    },
                }
            }
        };

        if frame.len() > buf.len() {
            let required = frame.len();
            // lossless retry: the message stays pending
            *self.pending.lock().unwrap() = Some(frame);
            return Ok(ReadOutcome::BufferTooSmall { required });
        }

        buf[..frame.len()].copy_from_slice(&frame);
        Ok(ReadOutcome::Data(frame.len()))
    }

    async fn write_all(&self, data: &[u8]) -> io::Result<()> {
        self.writes.lock().unwrap().push(data.to_vec());
        Ok(())
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.close_notify.notify_waiters();
    }
}

pub(crate) struct MockChannelManager {
    channel: Arc<MockChannel>,
}

impl ChannelManager for MockChannelManager {
    fn open(&self, name: ChannelName) -> Option<Arc<dyn VirtualChannel>> {
        assert_eq!(name, SoundServer::NAME);
        Some(Arc::clone(&self.channel) as Arc<dyn VirtualChannel>)
    }
}

/// A manager that refuses to open the channel.
pub(crate) struct RefusingChannelManager;

impl ChannelManager for RefusingChannelManager {
    fn open(&self, _name: ChannelName) -> Option<Arc<dyn VirtualChannel>> {
        None
    }
}

#[derive(Default)]
pub(crate) struct HandlerState {
    pub(crate) activations: usize,
    pub(crate) last_client: Option<ClientAudioFormatPdu>,
    pub(crate) choice: Option<usize>,
    pub(crate) stopped: bool,
}

pub(crate) struct MockHandler {
    state: Arc<Mutex<HandlerState>>,
}

impl SoundServerHandler for MockHandler {
    fn activated(&mut self, client: &ClientAudioFormatPdu) -> Option<usize> {
        let mut state = self.state.lock().unwrap();
        state.activations += 1;
        state.last_client = Some(client.clone());
        state.choice
    }

    fn stopped(&mut self) {
        self.state.lock().unwrap().stopped = true;
    }
}

#[derive(Default)]
pub(crate) struct DspState {
    pub(crate) resets: usize,
    pub(crate) resample_calls: Vec<ResampleCall>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ResampleCall {
    pub(crate) src_frames: usize,
    pub(crate) src_channels: u16,
    pub(crate) src_rate: u32,
    pub(crate) dst_channels: u16,
    pub(crate) dst_rate: u32,
}

/// Deterministic stand-in for the real DSP: resampling emits `0x5a` filler
/// at the converted frame count, the ADPCM encoders compress 4:1 into
/// recognizable filler bytes.
pub(crate) struct MockDsp {
    state: Arc<Mutex<DspState>>,
}

pub(crate) const IMA_FILLER: u8 = 0xa5;
pub(crate) const MS_FILLER: u8 = 0xb6;
pub(crate) const RESAMPLE_FILLER: u8 = 0x5a;

impl AudioDsp for MockDsp {
    #[allow(clippy::too_many_arguments)]
    fn resample(
        &mut self,
        _src: &[u8],
        src_bytes_per_sample: usize,
        src_channels: u16,
        src_rate: u32,
        src_frames: usize,
        dst_channels: u16,
        dst_rate: u32,
        dst: &mut Vec<u8>,
    ) -> usize {
        self.state.lock().unwrap().resample_calls.push(ResampleCall {
            src_frames,
            src_channels,
            src_rate,
            dst_channels,
            dst_rate,
        });

        let frames = src_frames * dst_rate as usize / src_rate as usize;
        dst.resize(frames * usize::from(dst_channels) * src_bytes_per_sample, RESAMPLE_FILLER);
        frames
    }

    fn encode_ima_adpcm(&mut self, src: &[u8], _channels: u16, _block_align: u16, dst: &mut Vec<u8>) {
        dst.resize(src.len() / 4, IMA_FILLER);
    }

    fn encode_ms_adpcm(&mut self, src: &[u8], _channels: u16, _block_align: u16, dst: &mut Vec<u8>) {
        dst.resize(src.len() / 4, MS_FILLER);
    }

    fn reset_adpcm(&mut self) {
        self.state.lock().unwrap().resets += 1;
    }
}

pub(crate) struct TestRig {
    pub(crate) server: SoundServer,
    pub(crate) channel: Arc<MockChannel>,
    pub(crate) client_tx: UnboundedSender<Vec<u8>>,
    pub(crate) handler: Arc<Mutex<HandlerState>>,
    pub(crate) dsp: Arc<Mutex<DspState>>,
}

/// Builds a not-yet-started endpoint around the mocks, advertising the
/// source format alone.
pub(crate) fn rig(src_format: AudioFormat, choice: Option<usize>) -> TestRig {
    build_rig(src_format, None, choice)
}

/// Same as [`rig`], with an explicit server-format list.
pub(crate) fn rig_with_formats(
    src_format: AudioFormat,
    server_formats: Vec<AudioFormat>,
    choice: Option<usize>,
) -> TestRig {
    build_rig(src_format, Some(server_formats), choice)
}

fn build_rig(src_format: AudioFormat, server_formats: Option<Vec<AudioFormat>>, choice: Option<usize>) -> TestRig {
    let (client_tx, client_rx) = mpsc::unbounded_channel();
    let channel = Arc::new(MockChannel::new(client_rx));
    let handler = Arc::new(Mutex::new(HandlerState {
        choice,
        ..HandlerState::default()
    }));
    let dsp = Arc::new(Mutex::new(DspState::default()));

    let builder = SoundServer::builder()
        .with_channel_manager(Arc::new(MockChannelManager {
            channel: Arc::clone(&channel),
        }))
        .with_source_format(src_format)
        .with_dsp(MockDsp { state: Arc::clone(&dsp) })
        .with_handler(MockHandler {
            state: Arc::clone(&handler),
        });
    let builder = match server_formats {
        Some(formats) => builder.with_formats(formats),
        None => builder,
    };
    let server = builder.build();

    TestRig {
        server,
        channel,
        client_tx,
        handler,
        dsp,
    }
}

pub(crate) fn pcm_format(channels: u16, rate: u32, bits: u16) -> AudioFormat {
    AudioFormat {
        format: WaveFormat::PCM,
        n_channels: channels,
        n_samples_per_sec: rate,
        n_avg_bytes_per_sec: 0,
        n_block_align: channels * bits / 8,
        bits_per_sample: bits,
        extra_data: Vec::new(),
    }
}

pub(crate) fn ima_format(channels: u16, rate: u32, block_align: u16) -> AudioFormat {
    AudioFormat {
        format: WaveFormat::DVI_ADPCM,
        n_channels: channels,
        n_samples_per_sec: rate,
        n_avg_bytes_per_sec: 0,
        n_block_align: block_align,
        bits_per_sample: 4,
        extra_data: Vec::new(),
    }
}

/// One CLIENT_AUDIO_VERSION_AND_FORMATS frame reporting `formats`.
pub(crate) fn client_formats_frame(formats: &[AudioFormat]) -> Vec<u8> {
    encode_vec(&ClientAudioOutputPdu::AudioFormat(ClientAudioFormatPdu {
        version: Version::V6,
        flags: AudioFormatFlags::ALIVE | AudioFormatFlags::VOLUME,
        formats: formats.to_vec(),
        volume_left: 0xFFFF,
        volume_right: 0xFFFF,
        pitch: 0,
        dgram_port: 0,
    }))
    .unwrap()
}

/// Polls `cond` until it holds, failing the test after one second.
pub(crate) async fn wait_until(mut cond: impl FnMut() -> bool) {
    for _ in 0..200 {
        if cond() {
            return;
        }
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }
    panic!("condition was not reached within one second");
}
