//! rendezvous-protocol – Nachrichtenkatalog und Wire-Format
//!
//! Dieses Crate definiert alle Nachrichten, die zwischen Client und Server
//! ausgetauscht werden, sowie den Frame-Codec fuer TCP-Verbindungen.

pub mod control;
pub mod wire;

pub use control::{ClientMessage, ServerEvent, SignalPayload, SignalZiel};
pub use wire::{ClientCodec, FrameCodec, ServerCodec};
