//! 16-bit PCM helpers and arrival-order playback scheduling.

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use sonia_core::SoniaError;

/// Microphone audio sent upstream.
pub const INPUT_SAMPLE_RATE: u32 = 16_000;
/// Model audio coming back from the realtime and TTS endpoints.
pub const OUTPUT_SAMPLE_RATE: u32 = 24_000;
pub const INPUT_MIME: &str = "audio/pcm;rate=16000";
pub const OUTPUT_MIME: &str = "audio/pcm;rate=24000";

/// Encodes float samples in -1..=1 as base64 little-endian PCM16.
pub fn encode_pcm16(samples: &[f32]) -> String {
    let mut bytes = Vec::with_capacity(samples.len() * 2);
    for s in samples {
        let v = (s.clamp(-1.0, 1.0) * 32768.0).clamp(i16::MIN as f32, i16::MAX as f32) as i16;
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    BASE64_STANDARD.encode(bytes)
}

pub fn encode_bytes(bytes: &[u8]) -> String {
    BASE64_STANDARD.encode(bytes)
}

pub fn decode_bytes(data: &str) -> Result<Vec<u8>, SoniaError> {
    BASE64_STANDARD
        .decode(data.trim())
        .map_err(|e| SoniaError::Audio(e.to_string()))
}

/// Decodes base64 little-endian PCM16 into float samples.
pub fn decode_pcm16(data: &str) -> Result<Vec<f32>, SoniaError> {
    let bytes = decode_bytes(data)?;
    if bytes.len() % 2 != 0 {
        return Err(SoniaError::Audio(format!("odd PCM16 byte length {}", bytes.len())));
    }
    Ok(bytes
        .chunks_exact(2)
        .map(|c| i16::from_le_bytes([c[0], c[1]]) as f32 / 32768.0)
        .collect())
}

/// Playback length of `byte_len` bytes of mono PCM16.
pub fn pcm16_duration_ms(byte_len: usize, sample_rate: u32) -> u64 {
    if sample_rate == 0 {
        return 0;
    }
    (byte_len as u64 / 2) * 1000 / u64::from(sample_rate)
}

/// Schedules returned audio chunks back to back in the order they arrive.
///
/// Times are milliseconds on the caller's session clock.
#[derive(Debug, Default, Clone)]
pub struct PlaybackTimeline {
    next_start_ms: u64,
}

impl PlaybackTimeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the start offset for a chunk of `duration_ms` arriving at `now_ms`.
    pub fn schedule(&mut self, now_ms: u64, duration_ms: u64) -> u64 {
        let start = self.next_start_ms.max(now_ms);
        self.next_start_ms = start + duration_ms;
        start
    }

    /// Drops everything queued; the next chunk starts immediately.
    pub fn interrupt(&mut self) {
        self.next_start_ms = 0;
    }

    pub fn busy_until(&self) -> u64 {
        self.next_start_ms
    }

    pub fn is_playing(&self, now_ms: u64) -> bool {
        self.next_start_ms > now_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pcm16_encode_decode() {
        let encoded = encode_pcm16(&[0.0, 0.5, -1.0, 1.5]);
        let decoded = decode_pcm16(&encoded).unwrap();
        assert_eq!(decoded.len(), 4);
        assert_eq!(decoded[0], 0.0);
        assert_eq!(decoded[1], 0.5);
        assert_eq!(decoded[2], -1.0);
        assert!((decoded[3] - 32767.0 / 32768.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_decode_rejects_bad_input() {
        assert!(decode_pcm16("not base64!!").is_err());
        assert!(decode_pcm16(&encode_bytes(&[1, 2, 3])).is_err());
    }

    #[test]
    fn test_duration() {
        assert_eq!(pcm16_duration_ms(48_000, OUTPUT_SAMPLE_RATE), 1000);
        assert_eq!(pcm16_duration_ms(3_200, INPUT_SAMPLE_RATE), 100);
        assert_eq!(pcm16_duration_ms(10, 0), 0);
    }

    #[test]
    fn test_timeline_queues_in_arrival_order() {
        let mut timeline = PlaybackTimeline::new();
        assert_eq!(timeline.schedule(100, 500), 100);
        assert_eq!(timeline.schedule(200, 300), 600);
        assert!(timeline.is_playing(800));
        assert_eq!(timeline.busy_until(), 900);
        // Gap: playback caught up before this chunk arrived.
        assert_eq!(timeline.schedule(2_000, 100), 2_000);
    }

    #[test]
    fn test_timeline_interrupt() {
        let mut timeline = PlaybackTimeline::new();
        timeline.schedule(0, 5_000);
        timeline.interrupt();
        assert!(!timeline.is_playing(10));
        assert_eq!(timeline.schedule(10, 100), 10);
    }
}
