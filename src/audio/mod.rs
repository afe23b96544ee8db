// Audio - output device clock

pub mod clock;

pub use clock::{AudioClock, AudioError, DeviceFormat};
