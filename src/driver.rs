//! Encode and decode stages of a round trip.
//!
//! Each stage opens its own session and stream, attaches the caller's
//! diagnostics, runs the codec and releases everything on return. A codec
//! that declines comes back as a [`CodecFailure`] carrying the events the
//! session recorded, with the failure itself emitted as the last error event.

use crate::CodecFormat;
use crate::codec::Codec;
use crate::error::CodecError;
use crate::event::{Event, EventLevel, EventManager};
use crate::image::Image;
use crate::session::{DecodeParameters, DecodeSession, EncodeParameters, EncodeSession};
use crate::stream::{InputStream, OutputStream};

/// A codec declined to encode or decode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodecFailure {
    pub source: CodecError,
    /// Everything the session emitted, ending with the failure itself.
    pub events: Vec<Event>,
}

impl CodecFailure {
    pub fn errors(&self) -> impl Iterator<Item = &str> {
        self.events
            .iter()
            .filter(|e| e.level == EventLevel::Error)
            .map(|e| e.message.as_str())
    }
}

impl std::fmt::Display for CodecFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.source)
    }
}

impl std::error::Error for CodecFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

#[derive(Debug)]
pub struct EncodeOutput {
    pub codestream: Vec<u8>,
    pub events: Vec<Event>,
}

#[derive(Debug)]
pub struct DecodeOutput {
    pub image: Image,
    pub events: Vec<Event>,
}

/// Encodes `image` with `codec`, using `parameters.format` for the session.
pub fn encode_image<C: Codec + ?Sized>(
    codec: &C,
    image: &Image,
    parameters: EncodeParameters,
    manager: Option<EventManager>,
) -> Result<EncodeOutput, CodecFailure> {
    let mut session = EncodeSession::new(parameters.format);
    if let Some(manager) = manager {
        session.set_event_manager(manager);
    }

    let mut stream = OutputStream::new();
    let result = check_supported(codec, parameters.format)
        .and_then(|()| session.setup(parameters, image))
        .and_then(|()| codec.encode(&mut session, &mut stream, image));

    match result {
        Ok(()) => {
            tracing::debug!(bytes = stream.tell(), "encode stage finished");
            Ok(EncodeOutput {
                codestream: stream.into_bytes(),
                events: session.take_events(),
            })
        }
        Err(source) => {
            session.error(source.to_string());
            Err(CodecFailure {
                source,
                events: session.take_events(),
            })
        }
    }
}

/// Decodes one image from `codestream` with `codec`.
pub fn decode_image<C: Codec + ?Sized>(
    codec: &C,
    codestream: &[u8],
    parameters: DecodeParameters,
    manager: Option<EventManager>,
) -> Result<DecodeOutput, CodecFailure> {
    let mut session = DecodeSession::new(parameters.format);
    if let Some(manager) = manager {
        session.set_event_manager(manager);
    }

    let mut stream = InputStream::new(codestream);
    let result = check_supported(codec, parameters.format)
        .and_then(|()| session.setup(parameters))
        .and_then(|()| codec.decode(&mut session, &mut stream));

    match result {
        Ok(image) => {
            tracing::debug!(
                components = image.component_count(),
                width = image.width(),
                height = image.height(),
                "decode stage finished"
            );
            Ok(DecodeOutput {
                image,
                events: session.take_events(),
            })
        }
        Err(source) => {
            session.error(source.to_string());
            Err(CodecFailure {
                source,
                events: session.take_events(),
            })
        }
    }
}

fn check_supported<C: Codec + ?Sized>(codec: &C, format: CodecFormat) -> Result<(), CodecError> {
    if codec.supports(format) {
        Ok(())
    } else {
        Err(CodecError::unsupported(format!(
            "{} does not handle {format}",
            codec.version()
        )))
    }
}
