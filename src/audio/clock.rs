// Audio clock - drives the sequencer from the output device callback
// The stream outputs silence; sound is the synthesizer's job.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, SizedSample, Stream, StreamConfig};

use crate::sequencer::SequencerProcessor;
use crate::synth::Synthesizer;

#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    #[error("No audio output device found")]
    NoDevice,

    #[error("Audio configuration error: {0}")]
    Config(String),

    #[error("Unsupported sample format: {0}")]
    UnsupportedFormat(String),

    #[error("Audio stream error: {0}")]
    Stream(String),
}

/// Output device parameters the engine must be built with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceFormat {
    pub sample_rate: u32,
    pub channels: u16,
}

/// Running output stream calling `SequencerProcessor::process` once per
/// callback. Dropping it stops the clock.
pub struct AudioClock {
    _stream: Stream,
    format: DeviceFormat,
}

impl AudioClock {
    fn default_device() -> Result<Device, AudioError> {
        cpal::default_host()
            .default_output_device()
            .ok_or(AudioError::NoDevice)
    }

    /// Format of the default output device
    pub fn default_format() -> Result<DeviceFormat, AudioError> {
        let config = Self::default_device()?
            .default_output_config()
            .map_err(|e| AudioError::Config(e.to_string()))?;
        Ok(DeviceFormat {
            sample_rate: config.sample_rate().0,
            channels: config.channels(),
        })
    }

    /// Open the default output device and start driving `processor`
    pub fn start<S>(processor: SequencerProcessor, synth: S) -> Result<Self, AudioError>
    where
        S: Synthesizer + Send + 'static,
    {
        let device = Self::default_device()?;
        log::info!(
            "Audio device: {}",
            device.name().unwrap_or_else(|_| "Unknown".to_string())
        );

        let supported = device
            .default_output_config()
            .map_err(|e| AudioError::Config(e.to_string()))?;
        let sample_format = supported.sample_format();
        let format = DeviceFormat {
            sample_rate: supported.sample_rate().0,
            channels: supported.channels(),
        };
        let config: StreamConfig = supported.into();
        log::debug!("Audio config: {:?}, format {:?}", config, sample_format);

        let stream = match sample_format {
            SampleFormat::F32 => Self::build_stream::<f32, S>(&device, &config, processor, synth),
            SampleFormat::I16 => Self::build_stream::<i16, S>(&device, &config, processor, synth),
            SampleFormat::U16 => Self::build_stream::<u16, S>(&device, &config, processor, synth),
            other => return Err(AudioError::UnsupportedFormat(format!("{:?}", other))),
        }?;

        stream
            .play()
            .map_err(|e| AudioError::Stream(e.to_string()))?;

        Ok(Self {
            _stream: stream,
            format,
        })
    }

    pub fn format(&self) -> DeviceFormat {
        self.format
    }

    fn build_stream<T, S>(
        device: &Device,
        config: &StreamConfig,
        mut processor: SequencerProcessor,
        mut synth: S,
    ) -> Result<Stream, AudioError>
    where
        T: SizedSample + Send + 'static,
        S: Synthesizer + Send + 'static,
    {
        let channels = usize::from(config.channels.max(1));
        device
            .build_output_stream(
                config,
                move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                    // No allocations, no I/O, no blocking locks
                    data.fill(T::EQUILIBRIUM);
                    processor.process(data.len() / channels, &mut synth);
                },
                |err| log::error!("Audio stream error: {}", err),
                None,
            )
            .map_err(|e| AudioError::Stream(e.to_string()))
    }
}
