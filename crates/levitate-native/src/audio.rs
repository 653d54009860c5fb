// ---------------- Native audio (cpal) ----------------
//
// Each entity owns one looping mono buffer. The device callback mixes every
// active loop at its gain; gains glide toward the volume set by the engine so
// per-tick volume steps do not click.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use levitate_core::{EntityId, ToneBuffer, ToneSink, DEFAULT_SAMPLE_RATE};
use std::sync::{Arc, Mutex, MutexGuard};

// Per-sample gain smoothing factor (~5 ms at 48 kHz).
const GAIN_GLIDE: f32 = 1.0 / 256.0;
// |x| at which a voice is hard left or right.
const PAN_WIDTH: f32 = 1.5;

struct LoopVoice {
    entity: EntityId,
    samples: Arc<[f32]>,
    cursor: usize,
    volume: f32,
    gain: f32,
    left_gain: f32,
    right_gain: f32,
}

#[derive(Default)]
struct Mixer {
    voices: Vec<LoopVoice>,
}

impl Mixer {
    fn voice_mut(&mut self, entity: EntityId) -> Option<&mut LoopVoice> {
        self.voices.iter_mut().find(|v| v.entity == entity)
    }

    fn next_frame(&mut self) -> (f32, f32) {
        let mut left = 0.0f32;
        let mut right = 0.0f32;
        for voice in self.voices.iter_mut() {
            if voice.samples.is_empty() {
                continue;
            }
            voice.gain += (voice.volume - voice.gain) * GAIN_GLIDE;
            let s = voice.samples[voice.cursor] * voice.gain;
            left += s * voice.left_gain;
            right += s * voice.right_gain;
            voice.cursor += 1;
            if voice.cursor >= voice.samples.len() {
                voice.cursor = 0;
            }
        }
        // Soft clip
        (left.tanh(), right.tanh())
    }
}

/// Equal-power gains for a pan in [-1, 1] (left .. right).
fn pan_gains(pan: f32) -> (f32, f32) {
    let angle = (pan.clamp(-1.0, 1.0) + 1.0) * std::f32::consts::FRAC_PI_4;
    (angle.cos(), angle.sin())
}

fn lock(mixer: &Mutex<Mixer>) -> MutexGuard<'_, Mixer> {
    mixer.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Device-backed [`ToneSink`]. Without an output device it stays silent but
/// keeps accepting commands.
pub struct AudioSink {
    mixer: Arc<Mutex<Mixer>>,
    sample_rate: u32,
    _stream: Option<cpal::Stream>,
}

impl AudioSink {
    pub fn start() -> Self {
        let mixer = Arc::new(Mutex::new(Mixer::default()));
        match open_stream(Arc::clone(&mixer)) {
            Ok((stream, sample_rate)) => {
                log::info!("audio output at {} Hz", sample_rate);
                Self {
                    mixer,
                    sample_rate,
                    _stream: Some(stream),
                }
            }
            Err(e) => {
                log::warn!("audio disabled: {e:#}");
                Self::silent_with(mixer)
            }
        }
    }

    pub fn silent() -> Self {
        Self::silent_with(Arc::new(Mutex::new(Mixer::default())))
    }

    fn silent_with(mixer: Arc<Mutex<Mixer>>) -> Self {
        Self {
            mixer,
            sample_rate: DEFAULT_SAMPLE_RATE,
            _stream: None,
        }
    }

    /// Rate tone buffers must be generated at.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn active_voices(&self) -> usize {
        lock(&self.mixer).voices.len()
    }

    /// Pan a voice from its horizontal position in world units.
    pub fn set_pan_from_x(&mut self, entity: EntityId, x: f32) {
        let (left_gain, right_gain) = pan_gains(x / PAN_WIDTH);
        if let Some(voice) = lock(&self.mixer).voice_mut(entity) {
            voice.left_gain = left_gain;
            voice.right_gain = right_gain;
        }
    }
}

impl ToneSink for AudioSink {
    fn load_loop(&mut self, entity: EntityId, buffer: &ToneBuffer) {
        if buffer.sample_rate != self.sample_rate {
            log::warn!(
                "tone buffer at {} Hz played on a {} Hz device",
                buffer.sample_rate,
                self.sample_rate
            );
        }
        let mut mixer = lock(&self.mixer);
        if let Some(voice) = mixer.voice_mut(entity) {
            // Keep the relative position so a retune lands mid-cycle, not at zero.
            let len = buffer.samples.len().max(1);
            voice.cursor = voice.cursor * len / voice.samples.len().max(1) % len;
            voice.samples = Arc::clone(&buffer.samples);
            return;
        }
        let (left_gain, right_gain) = pan_gains(0.0);
        mixer.voices.push(LoopVoice {
            entity,
            samples: Arc::clone(&buffer.samples),
            cursor: 0,
            volume: 0.0,
            gain: 0.0,
            left_gain,
            right_gain,
        });
    }

    fn set_volume(&mut self, entity: EntityId, volume: f32) {
        if let Some(voice) = lock(&self.mixer).voice_mut(entity) {
            voice.volume = volume.clamp(0.0, 1.0);
        }
    }

    fn stop(&mut self, entity: EntityId) {
        lock(&self.mixer).voices.retain(|v| v.entity != entity);
    }
}

fn open_stream(mixer: Arc<Mutex<Mixer>>) -> anyhow::Result<(cpal::Stream, u32)> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| anyhow::anyhow!("no output device"))?;
    let config = device.default_output_config()?;
    let sample_rate = config.sample_rate().0;
    let channels = config.channels() as usize;

    let err_fn = |err| log::error!("audio stream error: {err}");

    let stream = match config.sample_format() {
        cpal::SampleFormat::F32 => {
            build_stream(&device, &config.into(), channels, mixer, err_fn, |s: f32| s)?
        }
        cpal::SampleFormat::I16 => {
            build_stream(&device, &config.into(), channels, mixer, err_fn, |s: f32| {
                (s * i16::MAX as f32) as i16
            })?
        }
        cpal::SampleFormat::U16 => {
            build_stream(&device, &config.into(), channels, mixer, err_fn, |s: f32| {
                ((s * 0.5 + 0.5).clamp(0.0, 1.0) * u16::MAX as f32) as u16
            })?
        }
        other => anyhow::bail!("unsupported sample format {other:?}"),
    };
    stream.play()?;
    Ok((stream, sample_rate))
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    channels: usize,
    mixer: Arc<Mutex<Mixer>>,
    err_fn: impl FnMut(cpal::StreamError) + Send + 'static,
    convert: impl Fn(f32) -> T + Send + 'static,
) -> Result<cpal::Stream, cpal::BuildStreamError>
where
    T: cpal::SizedSample + Send + 'static,
{
    device.build_output_stream(
        config,
        move |data: &mut [T], _| {
            let mut guard = lock(&mixer);
            for frame in data.chunks_mut(channels.max(1)) {
                let (left, right) = guard.next_frame();
                if frame.len() == 1 {
                    frame[0] = convert((left + right) * 0.5);
                    continue;
                }
                for (i, out) in frame.iter_mut().enumerate() {
                    *out = match i {
                        0 => convert(left),
                        1 => convert(right),
                        _ => convert((left + right) * 0.5),
                    };
                }
            }
        },
        err_fn,
        None,
    )
}
