//! Failure boundaries: declining codecs, short reloads and damaged files.

use std::cell::Cell;
use std::path::Path;

use j2k_roundtrip::event::SharedBuffer;
use j2k_roundtrip::harness::run_with;
use j2k_roundtrip::persist::{FileStorage, Storage};
use j2k_roundtrip::{
    Codec, CodecError, CodecFormat, DecodeParameters, DecodeSession, EncodeSession, EventLevel,
    EventManager, ExitPolicy, HarnessConfig, Image, InputStream, J2kCodec, OutputStream,
    PersistError, RunOutcome,
};

/// Delegates to the reference codec, optionally declining one direction.
#[derive(Default)]
struct Scripted {
    decline_encode: bool,
    decline_decode: bool,
    /// Reports JP2 as unsupported.
    raw_only: bool,
    encode_calls: Cell<usize>,
    decode_calls: Cell<usize>,
}

impl Codec for Scripted {
    fn version(&self) -> &str {
        "scripted"
    }

    fn supports(&self, format: CodecFormat) -> bool {
        !(self.raw_only && format == CodecFormat::Jp2) && J2kCodec.supports(format)
    }

    fn encode(
        &self,
        session: &mut EncodeSession,
        stream: &mut OutputStream,
        image: &Image,
    ) -> Result<(), CodecError> {
        self.encode_calls.set(self.encode_calls.get() + 1);
        if self.decline_encode {
            session.warning("refusing this image");
            return Err(CodecError::ParameterValueNotSupported(
                "scripted refusal".into(),
            ));
        }
        J2kCodec.encode(session, stream, image)
    }

    fn decode(
        &self,
        session: &mut DecodeSession,
        stream: &mut InputStream<'_>,
    ) -> Result<Image, CodecError> {
        self.decode_calls.set(self.decode_calls.get() + 1);
        if self.decline_decode {
            return Err(CodecError::InvalidData("scripted refusal".into()));
        }
        J2kCodec.decode(session, stream)
    }
}

/// Writes to disk but reports fewer bytes on reload than the file holds.
struct Truncating {
    keep: usize,
}

impl Storage for Truncating {
    fn write(&mut self, path: &Path, bytes: &[u8]) -> Result<(), PersistError> {
        FileStorage.write(path, bytes)
    }

    fn read(&mut self, path: &Path) -> Result<Vec<u8>, PersistError> {
        let bytes = FileStorage.read(path)?;
        Err(PersistError::ShortRead {
            path: path.to_path_buf(),
            expected: bytes.len() as u64,
            actual: self.keep.min(bytes.len()) as u64,
        })
    }
}

/// Empties the file on disk before reading it back.
struct Emptying;

impl Storage for Emptying {
    fn write(&mut self, path: &Path, bytes: &[u8]) -> Result<(), PersistError> {
        FileStorage.write(path, bytes)
    }

    fn read(&mut self, path: &Path) -> Result<Vec<u8>, PersistError> {
        FileStorage.write(path, &[])?;
        FileStorage.read(path)
    }
}

/// Reloads a damaged copy of what was written.
struct Corrupting<F: FnMut(&mut Vec<u8>)> {
    damage: F,
}

impl<F: FnMut(&mut Vec<u8>)> Storage for Corrupting<F> {
    fn write(&mut self, path: &Path, bytes: &[u8]) -> Result<(), PersistError> {
        FileStorage.write(path, bytes)
    }

    fn read(&mut self, path: &Path) -> Result<Vec<u8>, PersistError> {
        let mut bytes = FileStorage.read(path)?;
        (self.damage)(&mut bytes);
        Ok(bytes)
    }
}

fn config_in(dir: &tempfile::TempDir) -> HarnessConfig {
    HarnessConfig {
        output: Some(dir.path().join("testempty2.j2k")),
        ..HarnessConfig::default()
    }
}

#[test]
fn test_encoder_refusal_exits_zero() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(&dir);
    let codec = Scripted {
        decline_encode: true,
        ..Scripted::default()
    };
    let out = SharedBuffer::new();
    let sink = out.clone();

    let outcome =
        run_with(&codec, &config, &mut FileStorage, || EventManager::console(sink.clone()))
            .unwrap();

    let RunOutcome::EncodeDeclined(failure) = &outcome else {
        panic!("expected encoder refusal, got {outcome:?}");
    };
    assert_eq!(outcome.exit_code(&ExitPolicy::default()), 0);
    assert_eq!(failure.events.len(), 2);
    assert_eq!(failure.events[0].level, EventLevel::Warning);
    assert_eq!(failure.events[1].level, EventLevel::Error);
    assert_eq!(codec.decode_calls.get(), 0);
    assert!(!config.output_path().exists());
    assert_eq!(
        out.contents(),
        "refusing this image\n[ERROR] Parameter value not supported: scripted refusal\n"
    );
}

#[test]
fn test_encode_exit_code_is_configurable() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(&dir);
    let codec = Scripted {
        decline_encode: true,
        ..Scripted::default()
    };
    let outcome = run_with(&codec, &config, &mut FileStorage, || {
        EventManager::new(std::io::sink())
    })
    .unwrap();
    let policy = ExitPolicy {
        encode_failure: 1,
        ..ExitPolicy::default()
    };
    assert_eq!(outcome.exit_code(&policy), 1);
}

#[test]
fn test_reference_encoder_declines_tiny_image() {
    let dir = tempfile::tempdir().unwrap();
    let config = HarnessConfig {
        width: 4,
        height: 4,
        ..config_in(&dir)
    };
    let outcome = run_with(&J2kCodec, &config, &mut FileStorage, || {
        EventManager::new(std::io::sink())
    })
    .unwrap();
    let RunOutcome::EncodeDeclined(failure) = &outcome else {
        panic!("expected encoder refusal, got {outcome:?}");
    };
    assert!(matches!(
        failure.source,
        CodecError::ParameterValueNotSupported(_)
    ));
    assert_eq!(outcome.exit_code(&ExitPolicy::default()), 0);
}

#[test]
fn test_short_read_exits_one_without_decoding() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(&dir);
    let codec = Scripted::default();

    let outcome = run_with(&codec, &config, &mut Truncating { keep: 5 }, || {
        EventManager::new(std::io::sink())
    })
    .unwrap();

    assert!(matches!(outcome, RunOutcome::ShortRead { actual: 5, .. }));
    assert_eq!(outcome.exit_code(&ExitPolicy::default()), 1);
    assert_eq!(codec.decode_calls.get(), 0);
}

#[test]
fn test_decoder_refusal_exits_one() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(&dir);
    let codec = Scripted {
        decline_decode: true,
        ..Scripted::default()
    };
    let outcome = run_with(&codec, &config, &mut FileStorage, || {
        EventManager::new(std::io::sink())
    })
    .unwrap();

    let RunOutcome::DecodeDeclined(failure) = &outcome else {
        panic!("expected decoder refusal, got {outcome:?}");
    };
    assert_eq!(failure.errors().count(), 1);
    assert_eq!(outcome.exit_code(&ExitPolicy::default()), 1);
    assert_eq!(codec.decode_calls.get(), 1);
    // The file was written before decoding was attempted.
    assert!(config.output_path().exists());
}

#[test]
fn test_reload_shorter_than_codestream_is_not_decoded() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(&dir);
    let codec = Scripted::default();
    let mut storage = Corrupting {
        damage: |bytes: &mut Vec<u8>| bytes.truncate(bytes.len() / 2),
    };
    let outcome = run_with(&codec, &config, &mut storage, || {
        EventManager::new(std::io::sink())
    })
    .unwrap();

    let RunOutcome::ShortRead { expected, actual } = outcome else {
        panic!("expected a short read, got {outcome:?}");
    };
    assert_eq!(actual, expected / 2);
    assert_eq!(codec.decode_calls.get(), 0);
}

#[test]
fn test_empty_file_on_disk_is_not_decoded() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(&dir);
    let codec = Scripted::default();

    let outcome = run_with(&codec, &config, &mut Emptying, || {
        EventManager::new(std::io::sink())
    })
    .unwrap();

    assert!(matches!(outcome, RunOutcome::ShortRead { actual: 0, .. }));
    assert_eq!(outcome.exit_code(&ExitPolicy::default()), 1);
    assert_eq!(codec.decode_calls.get(), 0);
    assert_eq!(std::fs::metadata(config.output_path()).unwrap().len(), 0);
}

#[test]
fn test_damaged_header_is_rejected_by_decoder() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(&dir);
    // Lsiz of the SIZ segment that follows SOC.
    let mut storage = Corrupting {
        damage: |bytes: &mut Vec<u8>| bytes[4..6].copy_from_slice(&[0xFF, 0xFF]),
    };
    let outcome = run_with(&J2kCodec, &config, &mut storage, || {
        EventManager::new(std::io::sink())
    })
    .unwrap();
    let RunOutcome::DecodeDeclined(failure) = &outcome else {
        panic!("expected decoder refusal, got {outcome:?}");
    };
    assert_eq!(failure.errors().count(), 1);
}

#[test]
fn test_unsupported_format_is_declined_before_encoding() {
    let dir = tempfile::tempdir().unwrap();
    let config = HarnessConfig {
        format: CodecFormat::Jp2,
        ..config_in(&dir)
    };
    let codec = Scripted {
        raw_only: true,
        ..Scripted::default()
    };
    let outcome = run_with(&codec, &config, &mut FileStorage, || {
        EventManager::new(std::io::sink())
    })
    .unwrap();

    let RunOutcome::EncodeDeclined(failure) = &outcome else {
        panic!("expected encoder refusal, got {outcome:?}");
    };
    assert!(matches!(
        failure.source,
        CodecError::ParameterValueNotSupported(_)
    ));
    assert_eq!(codec.encode_calls.get(), 0);
    assert!(!config.output_path().exists());
}

#[test]
fn test_wrong_container_is_rejected_by_decoder() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(&dir);
    let mut storage = Corrupting {
        damage: |bytes: &mut Vec<u8>| bytes[0] = 0x00,
    };
    let outcome = run_with(&J2kCodec, &config, &mut storage, || {
        EventManager::new(std::io::sink())
    })
    .unwrap();
    let RunOutcome::DecodeDeclined(failure) = &outcome else {
        panic!("expected decoder refusal, got {outcome:?}");
    };
    assert!(matches!(failure.source, CodecError::InvalidData(_)));
}

#[test]
fn test_decode_parameters_default_to_full_resolution() {
    let params = DecodeParameters::default();
    assert_eq!(params.reduce, 0);
    assert_eq!(params.layers, 0);
    assert_eq!(params.format, CodecFormat::J2k);
}
