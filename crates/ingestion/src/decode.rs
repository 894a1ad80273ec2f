//! Container decode: turn buffered container bytes into interleaved PCM16.
//!
//! Grounded in the `decode_webm_bytes_to_pcm`/`resample_audio` pair used
//! elsewhere in the corpus for browser-recorded audio: probe with a
//! [`symphonia::core::probe::Hint`], decode every packet on the default
//! track, and accumulate samples via [`symphonia::core::audio::SampleBuffer`].

use std::io::Cursor;

use symphonia::core::audio::{AudioBufferRef, Signal};
use symphonia::core::errors::Error as SymError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use voxbridge_core::{Error, Result};

/// Outcome of attempting to decode the current container buffer.
pub enum DecodeOutcome {
    /// Decoded some PCM; the buffer that produced it can be discarded.
    Decoded(Vec<u8>),
    /// Not enough bytes yet; keep accumulating and retry on the next push.
    Incomplete,
    /// Unrecoverable for this buffer; drop it and start fresh.
    Corrupt,
}

const EXPECTED_SAMPLE_RATE: u32 = 48_000;
const EXPECTED_CHANNELS: usize = 2;

/// Attempt to decode every audio frame currently sitting in `buf`.
///
/// Each decoded frame is transposed to interleaved order when its source
/// layout is planar (symphonia stores samples as one plane per channel
/// internally, so this is the common case) before being appended to the
/// PCM16 output. This transpose is the step STT correctness depends on.
pub fn decode_container_chunk(buf: &[u8]) -> DecodeOutcome {
    let cursor = Cursor::new(buf.to_vec());
    let mss = MediaSourceStream::new(Box::new(cursor), Default::default());
    let hint = Hint::new();

    let probed = match symphonia::default::get_probe().format(
        &hint,
        mss,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    ) {
        Ok(probed) => probed,
        Err(SymError::IoError(_)) => return DecodeOutcome::Incomplete,
        Err(_) => return DecodeOutcome::Corrupt,
    };

    let mut format_reader = probed.format;
    let track = match format_reader.default_track() {
        Some(t) => t.clone(),
        None => return DecodeOutcome::Corrupt,
    };
    let track_id = track.id;

    let mut decoder = match symphonia::default::get_codecs()
        .make(&track.codec_params, &Default::default())
    {
        Ok(d) => d,
        Err(_) => return DecodeOutcome::Corrupt,
    };

    let mut pcm16 = Vec::new();
    let mut decoded_any = false;

    loop {
        let packet = match format_reader.next_packet() {
            Ok(packet) => packet,
            Err(SymError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(SymError::ResetRequired) => break,
            Err(_) => {
                if decoded_any {
                    break;
                }
                return DecodeOutcome::Corrupt;
            }
        };
        if packet.track_id() != track_id {
            continue;
        }
        match decoder.decode(&packet) {
            Ok(audio_buf) => {
                decoded_any = true;
                warn_on_unexpected_format(&audio_buf);
                pcm16.extend(interleave_to_pcm16(&audio_buf));
            }
            Err(SymError::DecodeError(_)) => continue,
            Err(SymError::IoError(_)) => break,
            Err(_) => break,
        }
    }

    if !decoded_any {
        return DecodeOutcome::Incomplete;
    }
    DecodeOutcome::Decoded(pcm16)
}

fn warn_on_unexpected_format(audio_buf: &AudioBufferRef<'_>) {
    let spec = audio_buf.spec();
    if spec.rate != EXPECTED_SAMPLE_RATE {
        tracing::warn!(rate = spec.rate, "decoded frame sample rate != 48kHz");
    }
    if spec.channels.count() != EXPECTED_CHANNELS {
        tracing::warn!(
            channels = spec.channels.count(),
            "decoded frame channel count != 2"
        );
    }
}

/// Transpose a decoded frame's per-channel planes into interleaved PCM16.
///
/// Symphonia always decodes into plane-major storage (one contiguous
/// buffer per channel); for anything but mono this requires an explicit
/// transpose to the interleaved order STT consumers expect.
fn interleave_to_pcm16(audio_buf: &AudioBufferRef<'_>) -> Vec<u8> {
    macro_rules! transpose {
        ($buf:expr, $to_f32:expr) => {{
            let planes = $buf.planes();
            let channel_planes = planes.planes();
            let num_channels = channel_planes.len().max(1);
            let frames = $buf.frames();
            let mut interleaved = Vec::with_capacity(frames * num_channels);
            for frame_idx in 0..frames {
                for plane in channel_planes.iter() {
                    interleaved.push($to_f32(plane[frame_idx]));
                }
            }
            interleaved
        }};
    }

    let samples_f32: Vec<f32> = match audio_buf {
        AudioBufferRef::U8(b) => transpose!(b, |s: u8| (s as f32 - 128.0) / 128.0),
        AudioBufferRef::S16(b) => transpose!(b, |s: i16| s as f32 / 32768.0),
        AudioBufferRef::S32(b) => transpose!(b, |s: i32| s as f32 / 2147483648.0),
        AudioBufferRef::F32(b) => transpose!(b, |s: f32| s),
        AudioBufferRef::F64(b) => transpose!(b, |s: f64| s as f32),
        _ => Vec::new(),
    };

    samples_f32
        .into_iter()
        .flat_map(|s| {
            let clamped = s.clamp(-1.0, 1.0);
            ((clamped * 32767.0) as i16).to_le_bytes()
        })
        .collect()
}

/// Surface a corrupt-buffer outcome as the taxonomy error used by callers
/// that need to report it (ingestion itself absorbs this silently per
/// the decode algorithm's error policy; this is for diagnostics only).
pub fn corrupt_buffer_error(detail: impl Into<String>) -> Error {
    Error::AudioDecodeError(detail.into())
}

pub type DecodeResult = Result<Vec<u8>>;
