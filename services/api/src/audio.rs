//! Telephony Audio Utilities
//!
//! Conversions between the three audio representations the service touches:
//! G.711 mu-law at 8 kHz on the telephone leg, 16-bit little-endian PCM at
//! 24 kHz from speech synthesis, and normalized f32 samples in between for
//! resampling. Everything here is mono.

use base64::Engine;
use rubato::{FastFixedIn, PolynomialDegree, Resampler};

/// Sample rate of the telephone media stream (G.711).
pub const TELEPHONY_SAMPLE_RATE: f64 = 8000.0;
/// Sample rate of synthesized PCM before downsampling.
pub const SYNTHESIS_SAMPLE_RATE: f64 = 24000.0;
/// Outbound frame size in mu-law bytes (20 ms at 8 kHz).
pub const TRANSPORT_FRAME_BYTES: usize = 160;

const MULAW_BIAS: i32 = 0x84;
const MULAW_CLIP: i32 = 32635;

/// Encodes one linear PCM sample as a G.711 mu-law byte.
pub fn mulaw_encode_sample(sample: i16) -> u8 {
    let mut s = sample as i32;
    let sign: u8 = if s < 0 {
        s = -s;
        0x80
    } else {
        0
    };
    if s > MULAW_CLIP {
        s = MULAW_CLIP;
    }
    s += MULAW_BIAS;
    let exponent = (31 - (s as u32).leading_zeros()) as i32 - 7;
    let mantissa = ((s >> (exponent + 3)) & 0x0F) as u8;
    !(sign | ((exponent as u8) << 4) | mantissa)
}

/// Decodes one G.711 mu-law byte to a linear PCM sample.
pub fn mulaw_decode_sample(byte: u8) -> i16 {
    let byte = !byte;
    let sign = byte & 0x80;
    let exponent = ((byte >> 4) & 0x07) as i32;
    let mantissa = (byte & 0x0F) as i32;
    let sample = (((mantissa << 3) + MULAW_BIAS) << exponent) - MULAW_BIAS;
    if sign != 0 {
        -sample as i16
    } else {
        sample as i16
    }
}

/// Decodes a mu-law byte stream to normalized f32 samples.
pub fn mulaw_to_f32(bytes: &[u8]) -> Vec<f32> {
    bytes
        .iter()
        .map(|&b| mulaw_decode_sample(b) as f32 / 32768.0)
        .collect()
}

/// Encodes normalized f32 samples as a mu-law byte stream.
pub fn f32_to_mulaw(samples: &[f32]) -> Vec<u8> {
    samples
        .iter()
        .map(|&s| {
            let v = (s * 32768.0).clamp(i16::MIN as f32, i16::MAX as f32) as i16;
            mulaw_encode_sample(v)
        })
        .collect()
}

/// Interprets little-endian PCM16 bytes as normalized f32 samples. An odd
/// trailing byte is dropped.
pub fn pcm16_bytes_to_f32(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(2)
        .map(|chunk| {
            let v = i16::from_le_bytes([chunk[0], chunk[1]]);
            (v as f32 / 32768.0).clamp(-1.0, 1.0)
        })
        .collect()
}

/// Decodes a base64 string to raw bytes, logging and returning empty on
/// malformed input.
pub fn decode_base64(fragment: &str) -> Vec<u8> {
    match base64::engine::general_purpose::STANDARD.decode(fragment) {
        Ok(bytes) => bytes,
        Err(_) => {
            tracing::error!("failed to decode base64 audio fragment");
            Vec::new()
        }
    }
}

pub fn encode_base64(bytes: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

/// A mono resampler that accepts arbitrary-length input.
///
/// `FastFixedIn` requires fixed-size input chunks, but synthesis chunks
/// arrive at whatever size the provider flushed. This wrapper buffers the
/// remainder between calls and pads only on the final flush.
pub struct StreamResampler {
    inner: FastFixedIn<f32>,
    ratio: f64,
    chunk_size: usize,
    pending: Vec<f32>,
}

impl StreamResampler {
    pub fn new(in_rate: f64, out_rate: f64, chunk_size: usize) -> anyhow::Result<Self> {
        let inner = FastFixedIn::<f32>::new(
            out_rate / in_rate,
            1.0,
            PolynomialDegree::Cubic,
            chunk_size,
            1,
        )?;
        Ok(Self {
            inner,
            ratio: out_rate / in_rate,
            chunk_size,
            pending: Vec::new(),
        })
    }

    /// Resamples as many whole chunks as are available, holding the
    /// remainder for the next call.
    pub fn process(&mut self, samples: &[f32]) -> anyhow::Result<Vec<f32>> {
        self.pending.extend_from_slice(samples);
        let mut output = Vec::new();
        while self.pending.len() >= self.chunk_size {
            let chunk: Vec<f32> = self.pending.drain(..self.chunk_size).collect();
            let frames = self.inner.process(&[chunk], None)?;
            output.extend_from_slice(&frames[0]);
        }
        Ok(output)
    }

    /// Resamples whatever is still buffered, zero-padded to a full chunk.
    /// Output is truncated to the span the real samples cover.
    pub fn flush(&mut self) -> anyhow::Result<Vec<f32>> {
        if self.pending.is_empty() {
            return Ok(Vec::new());
        }
        let valid = self.pending.len();
        let mut chunk = std::mem::take(&mut self.pending);
        chunk.resize(self.chunk_size, 0.0);
        let frames = self.inner.process(&[chunk], None)?;
        let keep = ((valid as f64) * self.ratio).round() as usize;
        let mut out = frames[0].clone();
        out.truncate(keep);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn mulaw_known_values() {
        // Silence encodes to 0xFF and decodes back exactly.
        assert_eq!(mulaw_encode_sample(0), 0xFF);
        assert_eq!(mulaw_decode_sample(0xFF), 0);
        // 0x80 is the most negative code word.
        assert_eq!(mulaw_decode_sample(0x80), 32124);
        assert_eq!(mulaw_decode_sample(0x00), -32124);
    }

    #[test]
    fn mulaw_round_trip_is_close() {
        for &sample in &[0i16, 100, -100, 1000, -1000, 16000, -16000, 32000, -32000] {
            let decoded = mulaw_decode_sample(mulaw_encode_sample(sample));
            // mu-law is logarithmic; error grows with amplitude.
            let tolerance = (sample.unsigned_abs() as i32 / 16).max(8);
            assert!(
                (decoded as i32 - sample as i32).abs() <= tolerance,
                "sample {sample} decoded to {decoded}"
            );
        }
    }

    #[test]
    fn mulaw_decode_is_monotonic_per_sign() {
        // Smaller code words decode to larger positive magnitudes.
        let mut prev = mulaw_decode_sample(0xFF);
        for byte in (0x80..0xFF).rev() {
            let value = mulaw_decode_sample(byte);
            assert!(value >= prev);
            prev = value;
        }
    }

    #[test]
    fn f32_conversions_clamp() {
        let encoded = f32_to_mulaw(&[0.0, 2.0, -2.0]);
        assert_eq!(encoded.len(), 3);
        assert_eq!(encoded[0], 0xFF);
        let decoded = mulaw_to_f32(&encoded);
        assert!(decoded.iter().all(|s| (-1.0..=1.0).contains(s)));
    }

    #[test]
    fn pcm16_bytes_decode() {
        // 16384 little endian is [0x00, 0x40], normalizing to 0.5.
        let samples = pcm16_bytes_to_f32(&[0x00, 0x40, 0x00, 0x80]);
        assert_eq!(samples.len(), 2);
        assert_abs_diff_eq!(samples[0], 0.5, epsilon = 0.0001);
        assert_abs_diff_eq!(samples[1], -1.0, epsilon = 0.0001);
        // Odd trailing byte is dropped.
        assert_eq!(pcm16_bytes_to_f32(&[0x00]).len(), 0);
    }

    #[test]
    fn base64_round_trip() {
        let bytes = vec![0u8, 127, 255, 1];
        assert_eq!(decode_base64(&encode_base64(&bytes)), bytes);
        assert!(decode_base64("not base64!").is_empty());
    }

    #[test]
    fn stream_resampler_carries_remainders() {
        let chunk = 480;
        let mut resampler =
            StreamResampler::new(SYNTHESIS_SAMPLE_RATE, TELEPHONY_SAMPLE_RATE, chunk).unwrap();

        // Feed 700 samples: one full chunk processed, 220 held back.
        let out = resampler.process(&vec![0.0f32; 700]).unwrap();
        assert_eq!(out.len(), chunk / 3);

        // Another 260 completes the second chunk.
        let out = resampler.process(&vec![0.0f32; 260]).unwrap();
        assert_eq!(out.len(), chunk / 3);

        assert!(resampler.flush().unwrap().is_empty());
    }

    #[test]
    fn stream_resampler_flush_truncates_padding() {
        let chunk = 480;
        let mut resampler =
            StreamResampler::new(SYNTHESIS_SAMPLE_RATE, TELEPHONY_SAMPLE_RATE, chunk).unwrap();
        resampler.process(&vec![0.5f32; 300]).unwrap();
        let tail = resampler.flush().unwrap();
        // 300 samples at a 1/3 ratio cover 100 output samples.
        assert_eq!(tail.len(), 100);
    }
}
