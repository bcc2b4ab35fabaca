#![cfg_attr(doc, doc = include_str!("../README.md"))]

pub mod channel;
pub mod dsp;
pub mod pdu;
pub mod server;

pub use channel::{ChannelManager, ReadOutcome, VirtualChannel};
pub use dsp::AudioDsp;
pub use server::{SoundServer, SoundServerBuilder, SoundServerError, SoundServerHandler};
