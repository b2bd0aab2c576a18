//! Build, encode, persist, reload, decode, verify.
//!
//! Functional failures (the codec declining either direction, a short
//! reload) end the run with a [`RunOutcome`] that maps to an exit code.
//! Broken preconditions of the harness itself panic.

use std::path::PathBuf;

use crate::{CodecFormat, ColorSpace};
use crate::codec::Codec;
use crate::constants::DEFAULT_OUTPUT_BASE_NAME;
use crate::driver::{self, CodecFailure};
use crate::error::{CodecError, HarnessError, PersistError};
use crate::event::{EventLevel, EventManager};
use crate::image::{ComponentParams, Image};
use crate::persist::{FileStorage, Storage};
use crate::session::{DecodeParameters, EncodeParameters};

/// What to build and how to encode it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarnessConfig {
    pub width: u32,
    pub height: u32,
    pub components: u16,
    pub precision: u8,
    pub signed: bool,
    pub color_space: ColorSpace,
    /// Value every sample starts with.
    pub fill: i32,
    pub format: CodecFormat,
    /// Defaults to `testempty2.<ext>` in the working directory.
    pub output: Option<PathBuf>,
    /// Overrides the encoder's default resolution count.
    pub resolutions: Option<u8>,
    /// Overrides the encoder's default subsampling `(dx, dy)`.
    pub subsampling: Option<(u32, u32)>,
    pub reduce: u8,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            width: 256,
            height: 256,
            components: 1,
            precision: 8,
            signed: false,
            color_space: ColorSpace::Gray,
            fill: 0,
            format: CodecFormat::J2k,
            output: None,
            resolutions: None,
            subsampling: None,
            reduce: 0,
        }
    }
}

impl HarnessConfig {
    pub fn output_path(&self) -> PathBuf {
        self.output.clone().unwrap_or_else(|| {
            PathBuf::from(format!(
                "{DEFAULT_OUTPUT_BASE_NAME}.{}",
                self.format.extension()
            ))
        })
    }

    /// One entry per component, subsampled as the encoder parameters say.
    pub fn component_params(&self) -> Vec<ComponentParams> {
        let encode = self.encode_parameters();
        let params = ComponentParams::new(self.width, self.height, self.precision)
            .signed(self.signed)
            .subsampling(encode.subsampling_dx, encode.subsampling_dy);
        vec![params; self.components as usize]
    }

    pub fn encode_parameters(&self) -> EncodeParameters {
        let defaults = EncodeParameters::default();
        let (subsampling_dx, subsampling_dy) = self
            .subsampling
            .unwrap_or((defaults.subsampling_dx, defaults.subsampling_dy));
        EncodeParameters {
            format: self.format,
            resolution_count: self.resolutions.unwrap_or(defaults.resolution_count),
            subsampling_dx,
            subsampling_dy,
            ..defaults
        }
    }

    pub fn decode_parameters(&self) -> DecodeParameters {
        DecodeParameters {
            format: self.format,
            reduce: self.reduce,
            ..DecodeParameters::default()
        }
    }
}

/// Exit code for each way a run can end. A completed run always exits 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitPolicy {
    pub encode_failure: i32,
    pub decode_failure: i32,
    pub short_read: i32,
}

impl Default for ExitPolicy {
    fn default() -> Self {
        Self {
            encode_failure: 0,
            decode_failure: 1,
            short_read: 1,
        }
    }
}

/// Summary of a successful round trip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundTripReport {
    pub codestream_length: usize,
    pub path: PathBuf,
    pub component_count: usize,
    pub width: u32,
    pub height: u32,
    /// Warnings from both sessions, encode first.
    pub warnings: Vec<String>,
}

#[derive(Debug)]
pub enum RunOutcome {
    Completed(RoundTripReport),
    EncodeDeclined(CodecFailure),
    ShortRead { expected: u64, actual: u64 },
    DecodeDeclined(CodecFailure),
}

impl RunOutcome {
    pub fn exit_code(&self, policy: &ExitPolicy) -> i32 {
        match self {
            Self::Completed(_) => 0,
            Self::EncodeDeclined(_) => policy.encode_failure,
            Self::ShortRead { .. } => policy.short_read,
            Self::DecodeDeclined(_) => policy.decode_failure,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }
}

/// Runs the round trip with `codec` against the file system. `sink` builds
/// the diagnostics manager for each session.
pub fn run<C, F>(codec: &C, config: &HarnessConfig, sink: F) -> Result<RunOutcome, HarnessError>
where
    C: Codec + ?Sized,
    F: FnMut() -> EventManager,
{
    run_with(codec, config, &mut FileStorage, sink)
}

pub fn run_with<C, S, F>(
    codec: &C,
    config: &HarnessConfig,
    storage: &mut S,
    mut sink: F,
) -> Result<RunOutcome, HarnessError>
where
    C: Codec + ?Sized,
    S: Storage + ?Sized,
    F: FnMut() -> EventManager,
{
    let image = Image::create_filled(&config.component_params(), config.color_space, config.fill)
        .map_err(HarnessError::Image)?;
    assert_eq!(image.component_count(), config.components as usize);
    tracing::info!(
        components = image.component_count(),
        width = image.width(),
        height = image.height(),
        precision = config.precision,
        "source image built"
    );

    let encoded = match driver::encode_image(
        codec,
        &image,
        config.encode_parameters(),
        Some(sink()),
    ) {
        Ok(encoded) => encoded,
        Err(failure) => {
            tracing::warn!(error = %failure, "encoder declined");
            return Ok(RunOutcome::EncodeDeclined(failure));
        }
    };
    assert!(
        !encoded.codestream.is_empty(),
        "codec reported success with an empty codestream"
    );
    tracing::info!(bytes = encoded.codestream.len(), "image encoded");

    let path = config.output_path();
    storage.write(&path, &encoded.codestream)?;
    let reloaded = match storage.read(&path) {
        Ok(bytes) => bytes,
        Err(PersistError::ShortRead {
            expected, actual, ..
        }) => {
            tracing::warn!(expected, actual, path = %path.display(), "short read");
            return Ok(RunOutcome::ShortRead { expected, actual });
        }
        Err(other) => return Err(other.into()),
    };
    if reloaded.len() != encoded.codestream.len() {
        let (expected, actual) = (encoded.codestream.len() as u64, reloaded.len() as u64);
        tracing::warn!(expected, actual, path = %path.display(), "reload size differs");
        return Ok(RunOutcome::ShortRead { expected, actual });
    }
    // Decode only ever sees a non-empty buffer.
    assert!(!reloaded.is_empty());
    tracing::info!(bytes = reloaded.len(), path = %path.display(), "codestream reloaded");

    let decoded = match driver::decode_image(
        codec,
        &reloaded,
        config.decode_parameters(),
        Some(sink()),
    ) {
        Ok(decoded) => decoded,
        Err(failure) => {
            tracing::warn!(error = %failure, "decoder declined");
            return Ok(RunOutcome::DecodeDeclined(failure));
        }
    };

    let reconstructed = &decoded.image;
    let geometry_holds = if config.reduce == 0 {
        reconstructed.same_geometry(&image)
    } else {
        reconstructed.component_count() == image.component_count()
    };
    if !geometry_holds {
        let source = CodecError::invalid_data(format!(
            "decoded {} component(s) at {}x{}, expected {} at {}x{}",
            reconstructed.component_count(),
            reconstructed.width(),
            reconstructed.height(),
            image.component_count(),
            image.width(),
            image.height()
        ));
        tracing::warn!(error = %source, "decoded image does not match the source");
        return Ok(RunOutcome::DecodeDeclined(CodecFailure {
            source,
            events: decoded.events,
        }));
    }
    tracing::info!(
        components = reconstructed.component_count(),
        width = reconstructed.width(),
        height = reconstructed.height(),
        "image decoded"
    );

    let warnings = encoded
        .events
        .iter()
        .chain(&decoded.events)
        .filter(|e| e.level == EventLevel::Warning)
        .map(|e| e.message.clone())
        .collect();
    Ok(RunOutcome::Completed(RoundTripReport {
        codestream_length: reloaded.len(),
        path,
        component_count: reconstructed.component_count(),
        width: reconstructed.width(),
        height: reconstructed.height(),
        warnings,
    }))
}
