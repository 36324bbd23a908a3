//! Writers that pack several settings into one register. Each setter stores
//! its input and writes the recomputed register value right away.

use crate::error::CtLabError;
use crate::fpga::FpgaValueSetter;
use crate::signal::enums::{
    CounterSource, MeasurementMode, ModulationSource, OutputSource, PrescalerMode, Waveform,
};

/// `waveform << 16 | fm_range << 8 | sync << 6 | pm << 4 | fm << 2 | am`
pub struct WaveformWriter {
    setter: FpgaValueSetter,
    waveform: Waveform,
    maximum_frequency_modulation_range: u16,
    synchronization_source: ModulationSource,
    phase_modulation_source: ModulationSource,
    frequency_modulation_source: ModulationSource,
    amplitude_modulation_source: ModulationSource,
}

impl WaveformWriter {
    #[must_use]
    pub fn new(setter: FpgaValueSetter) -> Self {
        Self {
            setter,
            waveform: Waveform::default(),
            maximum_frequency_modulation_range: 0,
            synchronization_source: ModulationSource::default(),
            phase_modulation_source: ModulationSource::default(),
            frequency_modulation_source: ModulationSource::default(),
            amplitude_modulation_source: ModulationSource::default(),
        }
    }

    #[must_use]
    pub fn value(&self) -> u32 {
        u32::from(self.waveform as u8) << 16
            | u32::from(self.maximum_frequency_modulation_range) << 8
            | u32::from(self.synchronization_source as u8) << 6
            | u32::from(self.phase_modulation_source as u8) << 4
            | u32::from(self.frequency_modulation_source as u8) << 2
            | u32::from(self.amplitude_modulation_source as u8)
    }

    fn write(&self) -> Result<(), CtLabError> {
        self.setter.set_u32(self.value())
    }

    #[must_use]
    pub const fn waveform(&self) -> Waveform {
        self.waveform
    }

    pub fn set_waveform(&mut self, waveform: Waveform) -> Result<(), CtLabError> {
        self.waveform = waveform;
        self.write()
    }

    #[must_use]
    pub const fn maximum_frequency_modulation_range(&self) -> u16 {
        self.maximum_frequency_modulation_range
    }

    // range is checked by the DDS generator
    pub fn set_maximum_frequency_modulation_range(&mut self, range: u16) -> Result<(), CtLabError> {
        self.maximum_frequency_modulation_range = range;
        self.write()
    }

    #[must_use]
    pub const fn synchronization_source(&self) -> ModulationSource {
        self.synchronization_source
    }

    pub fn set_synchronization_source(&mut self, source: ModulationSource) -> Result<(), CtLabError> {
        self.synchronization_source = source;
        self.write()
    }

    #[must_use]
    pub const fn phase_modulation_source(&self) -> ModulationSource {
        self.phase_modulation_source
    }

    pub fn set_phase_modulation_source(&mut self, source: ModulationSource) -> Result<(), CtLabError> {
        self.phase_modulation_source = source;
        self.write()
    }

    #[must_use]
    pub const fn frequency_modulation_source(&self) -> ModulationSource {
        self.frequency_modulation_source
    }

    pub fn set_frequency_modulation_source(
        &mut self,
        source: ModulationSource,
    ) -> Result<(), CtLabError> {
        self.frequency_modulation_source = source;
        self.write()
    }

    #[must_use]
    pub const fn amplitude_modulation_source(&self) -> ModulationSource {
        self.amplitude_modulation_source
    }

    pub fn set_amplitude_modulation_source(
        &mut self,
        source: ModulationSource,
    ) -> Result<(), CtLabError> {
        self.amplitude_modulation_source = source;
        self.write()
    }
}

/// `(amplitude as u16) << 16 | (phase as u16)`, both two's complement.
pub struct AmplitudePhaseWriter {
    setter: FpgaValueSetter,
    amplitude: i16,
    phase: i16,
}

impl AmplitudePhaseWriter {
    #[must_use]
    pub const fn new(setter: FpgaValueSetter) -> Self {
        Self {
            setter,
            amplitude: 0,
            phase: 0,
        }
    }

    #[must_use]
    pub fn value(&self) -> u32 {
        u32::from(self.amplitude as u16) << 16 | u32::from(self.phase as u16)
    }

    #[must_use]
    pub const fn amplitude(&self) -> i16 {
        self.amplitude
    }

    pub fn set_amplitude(&mut self, amplitude: i16) -> Result<(), CtLabError> {
        self.amplitude = amplitude;
        self.setter.set_u32(self.value())
    }

    #[must_use]
    pub const fn phase(&self) -> i16 {
        self.phase
    }

    pub fn set_phase(&mut self, phase: i16) -> Result<(), CtLabError> {
        self.phase = phase;
        self.setter.set_u32(self.value())
    }
}

/// A register holding one plain `u32` (phase increment, pulse and pause durations).
pub struct U32Writer {
    setter: FpgaValueSetter,
    value: u32,
}

impl U32Writer {
    #[must_use]
    pub const fn new(setter: FpgaValueSetter) -> Self {
        Self { setter, value: 0 }
    }

    #[must_use]
    pub const fn value(&self) -> u32 {
        self.value
    }

    pub fn set(&mut self, value: u32) -> Result<(), CtLabError> {
        self.value = value;
        self.setter.set_u32(value)
    }
}

/// `source1 << 4 | source0`
pub struct OutputSourceWriter {
    setter: FpgaValueSetter,
    source0: OutputSource,
    source1: OutputSource,
}

impl OutputSourceWriter {
    #[must_use]
    pub const fn new(setter: FpgaValueSetter) -> Self {
        Self {
            setter,
            source0: OutputSource::Dds0,
            source1: OutputSource::Dds0,
        }
    }

    #[must_use]
    pub fn value(&self) -> u32 {
        u32::from(self.source1 as u8) << 4 | u32::from(self.source0 as u8)
    }

    #[must_use]
    pub const fn source0(&self) -> OutputSource {
        self.source0
    }

    pub fn set_source0(&mut self, source: OutputSource) -> Result<(), CtLabError> {
        self.source0 = source;
        self.setter.set_u32(self.value())
    }

    #[must_use]
    pub const fn source1(&self) -> OutputSource {
        self.source1
    }

    pub fn set_source1(&mut self, source: OutputSource) -> Result<(), CtLabError> {
        self.source1 = source;
        self.setter.set_u32(self.value())
    }
}

/// `input << 8 | measurement_mode << 4 | prescaler`
pub struct CounterConfigurationWriter {
    setter: FpgaValueSetter,
    input_source: CounterSource,
    measurement_mode: MeasurementMode,
    prescaler_mode: PrescalerMode,
}

impl CounterConfigurationWriter {
    #[must_use]
    pub const fn new(setter: FpgaValueSetter) -> Self {
        Self {
            setter,
            input_source: CounterSource::Dds0,
            measurement_mode: MeasurementMode::Frequency,
            prescaler_mode: PrescalerMode::GatePeriod1s,
        }
    }

    #[must_use]
    pub fn value(&self) -> u32 {
        u32::from(self.input_source as u8) << 8
            | u32::from(self.measurement_mode as u8) << 4
            | u32::from(self.prescaler_mode as u8)
    }

    fn write(&self) -> Result<(), CtLabError> {
        self.setter.set_u32(self.value())
    }

    #[must_use]
    pub const fn input_source(&self) -> CounterSource {
        self.input_source
    }

    pub fn set_input_source(&mut self, source: CounterSource) -> Result<(), CtLabError> {
        self.input_source = source;
        self.write()
    }

    #[must_use]
    pub const fn measurement_mode(&self) -> MeasurementMode {
        self.measurement_mode
    }

    pub fn set_measurement_mode(&mut self, mode: MeasurementMode) -> Result<(), CtLabError> {
        self.measurement_mode = mode;
        self.write()
    }

    #[must_use]
    pub const fn prescaler_mode(&self) -> PrescalerMode {
        self.prescaler_mode
    }

    pub fn set_prescaler_mode(&mut self, mode: PrescalerMode) -> Result<(), CtLabError> {
        self.prescaler_mode = mode;
        self.write()
    }

    /// Switch both modes with a single register write. The modes are only
    /// taken over when the write was sent.
    pub fn set_modes(
        &mut self,
        prescaler: PrescalerMode,
        measurement: MeasurementMode,
    ) -> Result<(), CtLabError> {
        let value = u32::from(self.input_source as u8) << 8
            | u32::from(measurement as u8) << 4
            | u32::from(prescaler as u8);
        self.setter.set_u32(value)?;
        self.prescaler_mode = prescaler;
        self.measurement_mode = measurement;
        Ok(())
    }
}
