//! j2k-roundtrip CLI: encodes a synthetic image, writes it out, reads it back
//! and decodes it again.

use std::io::Write;
use std::path::PathBuf;

use clap::error::ErrorKind;
use clap::{CommandFactory, Parser, ValueEnum};
use j2k_roundtrip::constants::{MAXIMUM_COMPONENT_COUNT, MAXIMUM_PRECISION};
use j2k_roundtrip::image::sample_range;
use j2k_roundtrip::{
    Codec, CodecFormat, ColorSpace, EventManager, ExitPolicy, HarnessConfig, J2kCodec, RunOutcome,
    harness,
};
use tracing_subscriber::EnvFilter;

/// Round-trip check for a JPEG 2000 codec
#[derive(Parser)]
#[command(name = "j2k-roundtrip")]
#[command(version)]
#[command(
    about = "Encode, persist, reload and decode a synthetic JPEG 2000 image",
    long_about = None
)]
#[command(after_help = "EXAMPLES:
    j2k-roundtrip
    j2k-roundtrip --format jp2 --components 3 --color-space srgb
    j2k-roundtrip --width 4 --height 4 --encode-failure-exit-code 2

Diagnostics go to stderr; set RUST_LOG=info for stage-by-stage logging.")]
struct Cli {
    /// Image width in pixels
    #[arg(
        short,
        long,
        default_value = "256",
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    width: u32,

    /// Image height in pixels
    #[arg(
        short = 'H',
        long,
        default_value = "256",
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    height: u32,

    /// Number of components
    #[arg(
        short = 'n',
        long,
        default_value = "1",
        value_parser = clap::value_parser!(u16).range(1..=i64::from(MAXIMUM_COMPONENT_COUNT))
    )]
    components: u16,

    /// Bits per sample
    #[arg(
        short,
        long,
        default_value = "8",
        value_parser = clap::value_parser!(u8).range(1..=i64::from(MAXIMUM_PRECISION))
    )]
    precision: u8,

    /// Use signed samples
    #[arg(long)]
    signed: bool,

    /// Initial value of every sample
    #[arg(long, default_value = "0", allow_negative_numbers = true)]
    fill: i32,

    /// Color space recorded in the source image
    #[arg(long, default_value = "gray", value_enum)]
    color_space: ColorSpaceArg,

    /// Container format of the codestream
    #[arg(short, long, default_value = "j2k", value_enum)]
    format: FormatArg,

    /// Where to write the codestream [default: testempty2.<format>]
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Number of resolution levels (decomposition levels + 1)
    #[arg(short, long)]
    resolutions: Option<u8>,

    /// Highest resolution levels to discard when decoding
    #[arg(long, default_value = "0")]
    reduce: u8,

    /// Exit code when the encoder declines the image
    #[arg(long, default_value = "0")]
    encode_failure_exit_code: i32,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum FormatArg {
    /// Raw codestream
    J2k,
    /// JP2 container
    Jp2,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ColorSpaceArg {
    Gray,
    Srgb,
    Sycc,
    Unspecified,
}

impl Cli {
    /// Checks what clap cannot check one argument at a time.
    fn validate(self) -> Result<Self, clap::Error> {
        let (min, max) = sample_range(self.precision, self.signed);
        if !(min..=max).contains(&i64::from(self.fill)) {
            return Err(Cli::command().error(
                ErrorKind::ValueValidation,
                format!(
                    "--fill {} outside {min}..={max} for {}-bit {} samples",
                    self.fill,
                    self.precision,
                    if self.signed { "signed" } else { "unsigned" }
                ),
            ));
        }
        Ok(self)
    }

    fn config(&self) -> HarnessConfig {
        HarnessConfig {
            width: self.width,
            height: self.height,
            components: self.components,
            precision: self.precision,
            signed: self.signed,
            color_space: match self.color_space {
                ColorSpaceArg::Gray => ColorSpace::Gray,
                ColorSpaceArg::Srgb => ColorSpace::Srgb,
                ColorSpaceArg::Sycc => ColorSpace::Sycc,
                ColorSpaceArg::Unspecified => ColorSpace::Unspecified,
            },
            fill: self.fill,
            format: match self.format {
                FormatArg::J2k => CodecFormat::J2k,
                FormatArg::Jp2 => CodecFormat::Jp2,
            },
            output: self.output.clone(),
            resolutions: self.resolutions,
            subsampling: None,
            reduce: self.reduce,
        }
    }

    fn policy(&self) -> ExitPolicy {
        ExitPolicy {
            encode_failure: self.encode_failure_exit_code,
            ..ExitPolicy::default()
        }
    }
}

fn main() {
    init_tracing();
    let cli = Cli::parse().validate().unwrap_or_else(|e| e.exit());

    match round_trip(&cli.config(), &cli.policy(), std::io::stdout) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("fatal: {e}");
            std::process::abort();
        }
    }
}

/// Prints the codec version, runs the round trip with codec events on
/// `console`, prints `end` when it completes and returns the exit code.
fn round_trip<W, F>(
    config: &HarnessConfig,
    policy: &ExitPolicy,
    console: F,
) -> Result<i32, Box<dyn std::error::Error>>
where
    W: Write + 'static,
    F: Fn() -> W,
{
    let codec = J2kCodec::new();
    writeln!(console(), "{}", codec.version())?;
    let outcome = harness::run(&codec, config, || EventManager::console(console()))?;

    match &outcome {
        RunOutcome::Completed(report) => {
            tracing::info!(
                bytes = report.codestream_length,
                path = %report.path.display(),
                width = report.width,
                height = report.height,
                "round trip completed"
            );
            writeln!(console(), "end")?;
        }
        RunOutcome::EncodeDeclined(failure) => {
            eprintln!("Encoder declined: {failure}");
        }
        RunOutcome::ShortRead { expected, actual } => {
            eprintln!("Short read: expected {expected} bytes, got {actual}");
        }
        RunOutcome::DecodeDeclined(failure) => {
            eprintln!("Decoder declined: {failure}");
        }
    }
    Ok(outcome.exit_code(policy))
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
