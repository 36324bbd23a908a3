use crate::error::CtLabError;
use crate::fpga::FpgaValueSetter;
use crate::signal::writers::U32Writer;

/// Pulse generator; durations are in FPGA clock cycles.
pub struct PulseGenerator {
    pulse_duration: U32Writer,
    pause_duration: U32Writer,
}

impl PulseGenerator {
    #[must_use]
    pub const fn new(pulse_setter: FpgaValueSetter, pause_setter: FpgaValueSetter) -> Self {
        Self {
            pulse_duration: U32Writer::new(pulse_setter),
            pause_duration: U32Writer::new(pause_setter),
        }
    }

    #[must_use]
    pub const fn pulse_duration(&self) -> u32 {
        self.pulse_duration.value()
    }

    pub fn set_pulse_duration(&mut self, cycles: u32) -> Result<(), CtLabError> {
        self.pulse_duration.set(cycles)
    }

    #[must_use]
    pub const fn pause_duration(&self) -> u32 {
        self.pause_duration.value()
    }

    pub fn set_pause_duration(&mut self, cycles: u32) -> Result<(), CtLabError> {
        self.pause_duration.set(cycles)
    }
}
