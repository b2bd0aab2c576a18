use crate::CodecFormat;
use crate::error::CodecError;
use crate::image::Image;
use crate::session::{DecodeSession, EncodeSession};
use crate::stream::{InputStream, OutputStream};

/// Capability interface of an image codec collaborator.
///
/// Sessions carry configuration and diagnostics; a codec emits events through
/// the session it is given and returns `Err` when it declines to encode or
/// decode.
pub trait Codec {
    /// Version string of the codec implementation.
    fn version(&self) -> &str;

    fn supports(&self, format: CodecFormat) -> bool;

    /// Encodes `image` into `stream` using the parameters stored in `session`.
    fn encode(
        &self,
        session: &mut EncodeSession,
        stream: &mut OutputStream,
        image: &Image,
    ) -> Result<(), CodecError>;

    /// Decodes one image from `stream` using the parameters stored in
    /// `session`.
    fn decode(
        &self,
        session: &mut DecodeSession,
        stream: &mut InputStream<'_>,
    ) -> Result<Image, CodecError>;
}
