//! Audio container sniffing and waveform normalization
//!
//! The front end uploads whatever container the browser produced (usually
//! WebM); transcription providers want a known content type and, for MP3,
//! a decodable waveform. Containers we can decode locally (MP3) are
//! rendered to WAV before upload; the rest pass through with their sniffed
//! content type.

use std::io::Cursor;

use crate::{Error, Result};

/// Recognized audio container formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFormat {
    /// RIFF WAV
    Wav,
    /// MPEG audio (MP3)
    Mp3,
    /// WebM (EBML header)
    WebM,
    /// Ogg container
    Ogg,
    /// Unrecognized container
    Unknown,
}

impl AudioFormat {
    /// MIME type sent to transcription providers
    #[must_use]
    pub const fn mime(self) -> &'static str {
        match self {
            Self::Wav => "audio/wav",
            Self::Mp3 => "audio/mpeg",
            Self::WebM => "audio/webm",
            Self::Ogg => "audio/ogg",
            Self::Unknown => "application/octet-stream",
        }
    }

    /// File name used in multipart uploads
    #[must_use]
    pub const fn file_name(self) -> &'static str {
        match self {
            Self::Wav => "audio.wav",
            Self::Mp3 => "audio.mp3",
            Self::WebM => "audio.webm",
            Self::Ogg => "audio.ogg",
            Self::Unknown => "audio.bin",
        }
    }
}

/// One turn's worth of raw audio with its sniffed container format
#[derive(Debug, Clone)]
pub struct AudioClip {
    /// Raw container bytes
    pub bytes: Vec<u8>,
    /// Sniffed container format
    pub format: AudioFormat,
}

impl AudioClip {
    /// Sniff the container format from magic bytes
    #[must_use]
    pub fn sniff(bytes: Vec<u8>) -> Self {
        let format = match bytes.as_slice() {
            [b'R', b'I', b'F', b'F', ..] => AudioFormat::Wav,
            [0x1A, 0x45, 0xDF, 0xA3, ..] => AudioFormat::WebM,
            [b'O', b'g', b'g', b'S', ..] => AudioFormat::Ogg,
            [b'I', b'D', b'3', ..] => AudioFormat::Mp3,
            [first, second, ..] if *first == 0xFF && second & 0xE0 == 0xE0 => AudioFormat::Mp3,
            _ => AudioFormat::Unknown,
        };
        Self { bytes, format }
    }

    /// True if the clip carries no audio data
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Render the clip to a decodable waveform where possible
    ///
    /// MP3 is decoded and re-encoded as 16-bit PCM WAV. WAV passes through.
    /// Containers only the vendor can decode (WebM, Ogg) pass through with
    /// their sniffed content type.
    ///
    /// # Errors
    ///
    /// Returns error if MP3 decoding or WAV encoding fails
    pub fn normalized(self) -> Result<Self> {
        match self.format {
            AudioFormat::Mp3 => {
                let (samples, sample_rate, channels) = decode_mp3(&self.bytes)?;
                let wav = encode_wav(&samples, sample_rate, channels)?;
                Ok(Self {
                    bytes: wav,
                    format: AudioFormat::Wav,
                })
            }
            _ => Ok(self),
        }
    }
}

/// Decode MP3 bytes to interleaved 16-bit PCM
fn decode_mp3(mp3_data: &[u8]) -> Result<(Vec<i16>, u32, u16)> {
    let mut decoder = minimp3::Decoder::new(Cursor::new(mp3_data));
    let mut samples = Vec::new();
    let mut sample_rate = 0u32;
    let mut channels = 0u16;

    loop {
        match decoder.next_frame() {
            Ok(frame) => {
                if sample_rate == 0 {
                    sample_rate = u32::try_from(frame.sample_rate)
                        .map_err(|_| Error::Audio("invalid MP3 sample rate".to_string()))?;
                    channels = u16::try_from(frame.channels)
                        .map_err(|_| Error::Audio("invalid MP3 channel count".to_string()))?;
                }
                samples.extend_from_slice(&frame.data);
            }
            Err(minimp3::Error::Eof) => break,
            Err(e) => return Err(Error::Audio(format!("MP3 decode failed: {e}"))),
        }
    }

    if samples.is_empty() {
        return Err(Error::Audio("MP3 contained no frames".to_string()));
    }

    Ok((samples, sample_rate, channels))
}

/// Encode interleaved 16-bit PCM as a WAV container
fn encode_wav(samples: &[i16], sample_rate: u32, channels: u16) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    let mut writer = hound::WavWriter::new(&mut cursor, spec)
        .map_err(|e| Error::Audio(format!("WAV encode failed: {e}")))?;
    for sample in samples {
        writer
            .write_sample(*sample)
            .map_err(|e| Error::Audio(format!("WAV encode failed: {e}")))?;
    }
    writer
        .finalize()
        .map_err(|e| Error::Audio(format!("WAV finalize failed: {e}")))?;

    Ok(cursor.into_inner())
}
