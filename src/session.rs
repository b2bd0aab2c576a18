//! Encode and decode sessions: one codec context each, with its own
//! parameters and diagnostics attachment.
//!
//! Dropping a session closes it.

use crate::CodecFormat;
use crate::constants::{
    DEFAULT_CODEBLOCK_EXPONENT, DEFAULT_RESOLUTION_COUNT, MAXIMUM_CODEBLOCK_EXPONENT,
    MAXIMUM_RESOLUTION_COUNT, VERSION,
};
use crate::error::CodecError;
use crate::event::{Event, EventLevel, EventLog, EventManager};
use crate::image::Image;

/// Encoder configuration. Start from `default()` and override fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodeParameters {
    /// Output container format.
    pub format: CodecFormat,
    /// Number of resolution levels (decomposition levels + 1).
    pub resolution_count: u8,
    /// Code-block width exponent, as stored in COD (width = 2^(exp + 2)).
    pub codeblock_width_exp: u8,
    /// Code-block height exponent, as stored in COD.
    pub codeblock_height_exp: u8,
    /// Subsampling applied to components built from these parameters.
    pub subsampling_dx: u32,
    pub subsampling_dy: u32,
    /// Written to a COM marker when present.
    pub comment: Option<String>,
}

impl Default for EncodeParameters {
    fn default() -> Self {
        Self {
            format: CodecFormat::J2k,
            resolution_count: DEFAULT_RESOLUTION_COUNT,
            codeblock_width_exp: DEFAULT_CODEBLOCK_EXPONENT,
            codeblock_height_exp: DEFAULT_CODEBLOCK_EXPONENT,
            subsampling_dx: 1,
            subsampling_dy: 1,
            comment: Some(format!("Created by j2k-roundtrip version {VERSION}")),
        }
    }
}

impl EncodeParameters {
    pub fn decomposition_levels(&self) -> u8 {
        self.resolution_count.saturating_sub(1)
    }

    fn validate(&self) -> Result<(), CodecError> {
        if !(1..=MAXIMUM_RESOLUTION_COUNT).contains(&self.resolution_count) {
            return Err(CodecError::invalid_argument(format!(
                "resolution count {} outside 1..={MAXIMUM_RESOLUTION_COUNT}",
                self.resolution_count
            )));
        }
        // ISO/IEC 15444-1, A.6.1: xcb, ycb <= 10 and xcb + ycb <= 12.
        if self.codeblock_width_exp > MAXIMUM_CODEBLOCK_EXPONENT
            || self.codeblock_height_exp > MAXIMUM_CODEBLOCK_EXPONENT
            || self.codeblock_width_exp + self.codeblock_height_exp > 8
        {
            return Err(CodecError::invalid_argument(format!(
                "code-block size 2^{} x 2^{} not allowed",
                self.codeblock_width_exp + 2,
                self.codeblock_height_exp + 2
            )));
        }
        if self.subsampling_dx == 0 || self.subsampling_dy == 0 {
            return Err(CodecError::invalid_argument("zero subsampling factor"));
        }
        if let Some(comment) = &self.comment {
            if comment.len() > u16::MAX as usize - 4 {
                return Err(CodecError::invalid_argument("comment too long for COM"));
            }
        }
        Ok(())
    }
}

/// Decoder configuration. Start from `default()` and override fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DecodeParameters {
    /// Expected container format.
    pub format: CodecFormat,
    /// Number of highest resolution levels to discard (0 decodes full size).
    pub reduce: u8,
    /// Number of quality layers to decode (0 decodes all).
    pub layers: u16,
}

#[derive(Debug)]
pub struct EncodeSession {
    format: CodecFormat,
    parameters: Option<EncodeParameters>,
    log: EventLog,
}

impl EncodeSession {
    pub fn new(format: CodecFormat) -> Self {
        tracing::debug!(%format, "encode session opened");
        Self {
            format,
            parameters: None,
            log: EventLog::default(),
        }
    }

    pub fn format(&self) -> CodecFormat {
        self.format
    }

    pub fn set_event_manager(&mut self, manager: EventManager) {
        self.log.attach(manager);
    }

    /// Validates and stores `parameters` for encoding `image`.
    pub fn setup(&mut self, parameters: EncodeParameters, image: &Image) -> Result<(), CodecError> {
        if parameters.format != self.format {
            return Err(CodecError::FormatMismatch {
                expected: self.format,
                actual: parameters.format,
            });
        }
        parameters.validate()?;
        if image.components.is_empty() {
            return Err(CodecError::invalid_argument("image has no components"));
        }
        tracing::debug!(
            components = image.component_count(),
            width = image.width(),
            height = image.height(),
            resolutions = parameters.resolution_count,
            "encoder set up"
        );
        self.parameters = Some(parameters);
        Ok(())
    }

    pub fn parameters(&self) -> Result<&EncodeParameters, CodecError> {
        self.parameters.as_ref().ok_or(CodecError::SessionNotConfigured)
    }

    pub fn info(&mut self, message: impl Into<String>) {
        self.log.emit(EventLevel::Info, message);
    }

    pub fn warning(&mut self, message: impl Into<String>) {
        self.log.emit(EventLevel::Warning, message);
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.log.emit(EventLevel::Error, message);
    }

    pub fn events(&self) -> &[Event] {
        self.log.events()
    }

    pub fn take_events(&mut self) -> Vec<Event> {
        self.log.take()
    }
}

impl Drop for EncodeSession {
    fn drop(&mut self) {
        tracing::debug!(format = %self.format, "encode session closed");
    }
}

#[derive(Debug)]
pub struct DecodeSession {
    format: CodecFormat,
    parameters: Option<DecodeParameters>,
    log: EventLog,
}

impl DecodeSession {
    pub fn new(format: CodecFormat) -> Self {
        tracing::debug!(%format, "decode session opened");
        Self {
            format,
            parameters: None,
            log: EventLog::default(),
        }
    }

    pub fn format(&self) -> CodecFormat {
        self.format
    }

    pub fn set_event_manager(&mut self, manager: EventManager) {
        self.log.attach(manager);
    }

    pub fn setup(&mut self, parameters: DecodeParameters) -> Result<(), CodecError> {
        if parameters.format != self.format {
            return Err(CodecError::FormatMismatch {
                expected: self.format,
                actual: parameters.format,
            });
        }
        tracing::debug!(
            reduce = parameters.reduce,
            layers = parameters.layers,
            "decoder set up"
        );
        self.parameters = Some(parameters);
        Ok(())
    }

    pub fn parameters(&self) -> Result<&DecodeParameters, CodecError> {
        self.parameters.as_ref().ok_or(CodecError::SessionNotConfigured)
    }

    pub fn info(&mut self, message: impl Into<String>) {
        self.log.emit(EventLevel::Info, message);
    }

    pub fn warning(&mut self, message: impl Into<String>) {
        self.log.emit(EventLevel::Warning, message);
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.log.emit(EventLevel::Error, message);
    }

    pub fn events(&self) -> &[Event] {
        self.log.events()
    }

    pub fn take_events(&mut self) -> Vec<Event> {
        self.log.take()
    }
}

impl Drop for DecodeSession {
    fn drop(&mut self) {
        tracing::debug!(format = %self.format, "decode session closed");
    }
}
