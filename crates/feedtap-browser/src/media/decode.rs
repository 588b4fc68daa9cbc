//! Host-side decoding of capture payloads.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Deserialize;
use serde_json::Value;

use super::error::CaptureError;

/// One mono block of PCM samples.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    pub sample_rate: u32,
    pub channels: u16,
    pub frame_count: usize,
    pub samples: Vec<f32>,
    /// Audio clock time in seconds.
    pub timestamp: f64,
}

/// One RGBA frame at the video's native size.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoFrame {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
    /// Media time in seconds.
    pub timestamp: f64,
}

/// Playback state change of a watched video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct PlaybackState {
    pub playing: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AudioPayload {
    sample_rate: u32,
    channels: u16,
    frames: usize,
    data: String,
    ts: f64,
}

#[derive(Deserialize)]
struct FramePayload {
    width: u32,
    height: u32,
    data: String,
    ts: f64,
}

/// Sum of absolute channel-0 values must exceed `threshold`. Stops summing
/// as soon as it does.
pub fn passes_energy_gate(samples: &[f32], threshold: f32) -> bool {
    let mut energy = 0.0f32;
    for sample in samples {
        energy += sample.abs();
        if energy > threshold {
            return true;
        }
    }
    false
}

/// Decode an audio payload. `Ok(None)` means the block is silent and dropped.
pub fn decode_audio(payload: Value, threshold: f32) -> Result<Option<AudioBuffer>, CaptureError> {
    let raw: AudioPayload = serde_json::from_value(payload)
        .map_err(|e| CaptureError::Decode(format!("audio: {}", e)))?;

    if raw.channels != 1 {
        return Err(CaptureError::Decode(format!(
            "audio: expected 1 channel, got {}",
            raw.channels
        )));
    }

    let bytes = STANDARD
        .decode(raw.data.as_bytes())
        .map_err(|e| CaptureError::Decode(format!("audio base64: {}", e)))?;
    if bytes.len() % 4 != 0 {
        return Err(CaptureError::Decode(format!(
            "audio: {} bytes is not a whole number of f32 samples",
            bytes.len()
        )));
    }

    let samples: Vec<f32> = bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect();
    if samples.len() != raw.frames {
        return Err(CaptureError::Decode(format!(
            "audio: header says {} frames, got {} samples",
            raw.frames,
            samples.len()
        )));
    }

    if !passes_energy_gate(&samples, threshold) {
        return Ok(None);
    }

    Ok(Some(AudioBuffer {
        sample_rate: raw.sample_rate,
        channels: raw.channels,
        frame_count: raw.frames,
        samples,
        timestamp: raw.ts,
    }))
}

/// Decode a video frame payload.
pub fn decode_frame(payload: Value) -> Result<VideoFrame, CaptureError> {
    let raw: FramePayload = serde_json::from_value(payload)
        .map_err(|e| CaptureError::Decode(format!("frame: {}", e)))?;

    if raw.width == 0 || raw.height == 0 {
        return Err(CaptureError::Decode(format!(
            "frame: empty size {}x{}",
            raw.width, raw.height
        )));
    }

    let pixels = STANDARD
        .decode(raw.data.as_bytes())
        .map_err(|e| CaptureError::Decode(format!("frame base64: {}", e)))?;
    let expected = raw.width as usize * raw.height as usize * 4;
    if pixels.len() != expected {
        return Err(CaptureError::Decode(format!(
            "frame: {}x{} needs {} bytes, got {}",
            raw.width,
            raw.height,
            expected,
            pixels.len()
        )));
    }

    Ok(VideoFrame {
        width: raw.width,
        height: raw.height,
        pixels,
        timestamp: raw.ts,
    })
}

/// Decode a playback state payload.
pub fn decode_state(payload: Value) -> Result<PlaybackState, CaptureError> {
    serde_json::from_value(payload).map_err(|e| CaptureError::Decode(format!("state: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn encode_samples(samples: &[f32]) -> String {
        let bytes: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
        STANDARD.encode(bytes)
    }

    #[test]
    fn test_energy_gate() {
        assert!(!passes_energy_gate(&[], 0.001));
        assert!(!passes_energy_gate(&[0.0; 4096], 0.001));
        assert!(!passes_energy_gate(&[0.0005, -0.0005], 0.001));
        assert!(passes_energy_gate(&[0.0005, -0.0006], 0.001));
        assert!(passes_energy_gate(&[0.0, 0.0, 0.5], 0.001));
        // Zero threshold still drops exact silence.
        assert!(!passes_energy_gate(&[0.0; 8], 0.0));
        assert!(passes_energy_gate(&[1e-9], 0.0));
    }

    #[test]
    fn test_decode_audio() {
        let samples = vec![0.25f32, -0.5, 0.75, 0.0];
        let payload = json!({
            "sampleRate": 48000, "channels": 1, "frames": 4,
            "data": encode_samples(&samples), "ts": 1.25
        });
        let buffer = decode_audio(payload, 0.001).unwrap().unwrap();
        assert_eq!(buffer.samples, samples);
        assert_eq!(buffer.frame_count, 4);
        assert_eq!(buffer.sample_rate, 48000);
        assert_eq!(buffer.timestamp, 1.25);
    }

    #[test]
    fn test_decode_audio_silent_block_dropped() {
        let payload = json!({
            "sampleRate": 48000, "channels": 1, "frames": 3,
            "data": encode_samples(&[0.0, 0.0, 0.0]), "ts": 0.0
        });
        assert!(decode_audio(payload, 0.001).unwrap().is_none());
    }

    #[test]
    fn test_decode_audio_rejects_bad_shape() {
        let stereo = json!({
            "sampleRate": 48000, "channels": 2, "frames": 1,
            "data": encode_samples(&[0.5]), "ts": 0.0
        });
        assert!(matches!(decode_audio(stereo, 0.001), Err(CaptureError::Decode(_))));

        let short = json!({
            "sampleRate": 48000, "channels": 1, "frames": 4,
            "data": encode_samples(&[0.5, 0.5]), "ts": 0.0
        });
        assert!(matches!(decode_audio(short, 0.001), Err(CaptureError::Decode(_))));

        let ragged = json!({
            "sampleRate": 48000, "channels": 1, "frames": 1,
            "data": STANDARD.encode([1u8, 2, 3]), "ts": 0.0
        });
        assert!(matches!(decode_audio(ragged, 0.001), Err(CaptureError::Decode(_))));

        let garbage = json!({
            "sampleRate": 48000, "channels": 1, "frames": 1, "data": "@@@", "ts": 0.0
        });
        assert!(matches!(decode_audio(garbage, 0.001), Err(CaptureError::Decode(_))));

        assert!(matches!(decode_audio(json!("nope"), 0.001), Err(CaptureError::Decode(_))));
    }

    #[test]
    fn test_decode_frame() {
        let pixels: Vec<u8> = (0..2 * 3 * 4).map(|i| i as u8).collect();
        let payload = json!({"width": 2, "height": 3, "data": STANDARD.encode(&pixels), "ts": 4.5});
        let frame = decode_frame(payload).unwrap();
        assert_eq!(frame.width, 2);
        assert_eq!(frame.height, 3);
        assert_eq!(frame.pixels, pixels);
        assert_eq!(frame.timestamp, 4.5);
    }

    #[test]
    fn test_decode_frame_size_mismatch() {
        let payload = json!({"width": 2, "height": 2, "data": STANDARD.encode([0u8; 15]), "ts": 0.0});
        assert!(matches!(decode_frame(payload), Err(CaptureError::Decode(_))));

        let empty = json!({"width": 0, "height": 2, "data": "", "ts": 0.0});
        assert!(matches!(decode_frame(empty), Err(CaptureError::Decode(_))));
    }

    #[test]
    fn test_decode_state() {
        assert_eq!(
            decode_state(json!({"playing": true})).unwrap(),
            PlaybackState { playing: true }
        );
        assert!(decode_state(json!({})).is_err());
    }
}
