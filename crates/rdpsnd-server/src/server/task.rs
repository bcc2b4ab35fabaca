//! The channel receiver task: advertises the server formats, then reads and
//! dispatches client messages until stop or EOF.

use std::sync::Arc;

use ironrdp_core::decode;
use tokio::sync::{watch, Mutex};
use tracing::{debug, warn};

use super::Shared;
use crate::channel::{FramedReader, VirtualChannel};
use crate::pdu::{self, ClientAudioOutputPdu, ServerAudioOutputPdu, SndProlog};

pub(crate) async fn run(shared: Arc<Mutex<Shared>>, channel: Arc<dyn VirtualChannel>, mut stop_rx: watch::Receiver<bool>) {
    debug!("audio output channel task started");

    advertise(&shared).await;

    let mut reader = FramedReader::new(channel);

    loop {
        tokio::select! {
            _ = stop_rx.changed() => {
                debug!("stop requested");
                break;
            }
            res = reader.recv() => match res {
                Ok(Some(frame)) => dispatch(&shared, frame).await,
                Ok(None) => {
                    debug!("channel EOF");
                    break;
                }
                Err(error) => {
                    warn!(%error, "channel read failed");
                    break;
                }
            }
        }
    }

    shared.lock().await.handler.stopped();

    debug!("audio output channel task exited");
}

async fn advertise(shared: &Mutex<Shared>) {
    let shared = shared.lock().await;
    let pdu = ServerAudioOutputPdu::AudioFormat(shared.advertisement());

    if let Err(error) = shared.send(&pdu).await {
        warn!(%error, "failed to advertise server formats");
    }
}

async fn dispatch(shared: &Mutex<Shared>, frame: &[u8]) {
    let prolog = match decode::<SndProlog>(frame) {
        Ok(prolog) => prolog,
        Err(error) => {
            warn!(%error, "channel frame shorter than a message prolog");
            return;
        }
    };

    let total = SndProlog::FIXED_PART_SIZE + usize::from(prolog.body_size);
    if frame.len() < total {
        warn!(
            msg_type = prolog.msg_type,
            body_size = prolog.body_size,
            received = frame.len(),
            "frame shorter than its BodySize claims"
        );
        return;
    }
    let frame = &frame[..total];

    match prolog.msg_type {
        pdu::SNDC_FORMATS | pdu::SNDC_QUALITYMODE | pdu::SNDC_TRAINING | pdu::SNDC_WAVECONFIRM => {
            match decode::<ClientAudioOutputPdu>(frame) {
                Ok(pdu) => handle(shared, pdu).await,
                Err(error) => warn!(%error, msg_type = prolog.msg_type, "malformed client PDU"),
            }
        }
        msg_type => warn!(msg_type, "ignoring unknown message type"),
    }
}

async fn handle(shared: &Mutex<Shared>, pdu: ClientAudioOutputPdu) {
    match pdu {
        ClientAudioOutputPdu::AudioFormat(af) => {
            let mut shared = shared.lock().await;

            // A fresh handshake replaces the previous list wholesale and
            // invalidates the current selection, dropping frames buffered
            // against the old format.
            shared.selected = None;
            shared.pipeline.clear_pending();

            if !af.has_known_format() {
                warn!("client reported no usable audio format, handshake failed");
                shared.client = Some(af);
                return;
            }

            debug!(n_formats = af.formats.len(), version = ?af.version, "client formats received");

            let choice = shared.handler.activated(&af);
            shared.client = Some(af);

            if let Some(index) = choice {
                shared.select_format(index);
            }
        }
        ClientAudioOutputPdu::QualityMode(pdu) => {
            debug!(quality_mode = %pdu.quality_mode, "client quality mode");
            shared.lock().await.quality_mode = Some(pdu.quality_mode);
        }
        ClientAudioOutputPdu::TrainingConfirm(pdu) => {
            debug!(?pdu, "training confirm ignored");
        }
        ClientAudioOutputPdu::WaveConfirm(pdu) => {
            debug!(timestamp = pdu.timestamp, block_no = pdu.block_no, "wave confirmed");
        }
    }
}
