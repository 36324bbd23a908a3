//! Signal generator of the FPGA lab board: four DDS generators, an output
//! selector, a pulse generator and a universal counter.

pub mod counter;
pub mod dds;
pub mod enums;
pub mod modulation;
pub mod output;
pub mod pulse;
pub mod writers;

use std::sync::Arc;

use crate::error::CtLabError;
use crate::fpga::{FpgaConnection, QueryMode};

pub use counter::UniversalCounter;
pub use dds::DdsGenerator;
pub use enums::{
    CounterSource, MeasurementMode, ModulationSource, OutputSource, PrescalerMode, ScopeSource,
    Waveform,
};
pub use modulation::ModulationInfo;
pub use output::OutputSourceSelector;
pub use pulse::PulseGenerator;

/// Register numbers used by [`SignalGenerator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignalGeneratorRegisters {
    /// First register of each DDS generator (waveform, +1 phase increment,
    /// +2 amplitude/phase).
    pub dds_bases: [u16; 4],
    pub output_source: u16,
    pub pulse_duration: u16,
    pub pause_duration: u16,
    pub counter_configuration: u16,
    pub counter_raw_value: u16,
    pub counter_status: u16,
}

impl SignalGeneratorRegisters {
    /// Layout of the serial (c't Lab protocol) firmware.
    pub const SERIAL: Self = Self {
        dds_bases: [16, 20, 24, 28],
        output_source: 3,
        pulse_duration: 15,
        pause_duration: 14,
        counter_configuration: 12,
        counter_raw_value: 5,
        counter_status: 4,
    };

    /// Layout of the SPI firmware variant.
    pub const SPI: Self = Self {
        dds_bases: [8, 12, 16, 20],
        output_source: 7,
        pulse_duration: 6,
        pause_duration: 5,
        counter_configuration: 1,
        counter_raw_value: 3,
        counter_status: 2,
    };
}

impl Default for SignalGeneratorRegisters {
    fn default() -> Self {
        Self::SERIAL
    }
}

pub struct SignalGenerator {
    connection: Arc<FpgaConnection>,
    dds_generators: [DdsGenerator; 4],
    output_source_selector: OutputSourceSelector,
    pulse_generator: PulseGenerator,
    universal_counter: UniversalCounter,
}

impl SignalGenerator {
    /// Bind all features to their registers. The counter value and status
    /// getters are registered in active query mode.
    pub fn new(
        connection: Arc<FpgaConnection>,
        registers: &SignalGeneratorRegisters,
    ) -> Result<Self, CtLabError> {
        let dds = |i: usize| -> Result<DdsGenerator, CtLabError> {
            let base = registers.dds_bases[i];
            Ok(DdsGenerator::new(
                connection.create_value_setter(base)?,
                connection.create_value_setter(base + 1)?,
                connection.create_value_setter(base + 2)?,
            ))
        };
        let dds_generators = [dds(0)?, dds(1)?, dds(2)?, dds(3)?];
        let output_source_selector =
            OutputSourceSelector::new(connection.create_value_setter(registers.output_source)?);
        let pulse_generator = PulseGenerator::new(
            connection.create_value_setter(registers.pulse_duration)?,
            connection.create_value_setter(registers.pause_duration)?,
        );
        let universal_counter = UniversalCounter::new(
            connection.create_value_setter(registers.counter_configuration)?,
            connection.create_value_getter(registers.counter_raw_value, QueryMode::Active)?,
            connection.create_value_getter(registers.counter_status, QueryMode::Active)?,
        );
        Ok(Self {
            connection,
            dds_generators,
            output_source_selector,
            pulse_generator,
            universal_counter,
        })
    }

    #[must_use]
    pub fn connection(&self) -> &Arc<FpgaConnection> {
        &self.connection
    }

    #[must_use]
    pub const fn dds_generators(&self) -> &[DdsGenerator; 4] {
        &self.dds_generators
    }

    pub fn dds_generator_mut(&mut self, index: usize) -> Result<&mut DdsGenerator, CtLabError> {
        self.dds_generators
            .get_mut(index)
            .ok_or_else(|| CtLabError::OutOfRange(format!("DDS generator index {index}")))
    }

    #[must_use]
    pub const fn output_source_selector(&self) -> &OutputSourceSelector {
        &self.output_source_selector
    }

    pub fn output_source_selector_mut(&mut self) -> &mut OutputSourceSelector {
        &mut self.output_source_selector
    }

    #[must_use]
    pub const fn pulse_generator(&self) -> &PulseGenerator {
        &self.pulse_generator
    }

    pub fn pulse_generator_mut(&mut self) -> &mut PulseGenerator {
        &mut self.pulse_generator
    }

    #[must_use]
    pub const fn universal_counter(&self) -> &UniversalCounter {
        &self.universal_counter
    }

    pub fn universal_counter_mut(&mut self) -> &mut UniversalCounter {
        &mut self.universal_counter
    }

    /// Put every feature into its power-on state: outputs on DDS 0 and 1,
    /// silent generators modulated by themselves (i.e. unmodulated), counter
    /// on DDS 0 with a 1 s gate.
    pub fn reset(&mut self) -> Result<(), CtLabError> {
        self.output_source_selector
            .set_output_source0(OutputSource::Dds0)?;
        self.output_source_selector
            .set_output_source1(OutputSource::Dds1)?;
        self.pulse_generator.set_pulse_duration(0)?;
        self.pulse_generator.set_pause_duration(0)?;
        for (index, dds) in self.dds_generators.iter_mut().enumerate() {
            let own = ModulationSource::from_index(index)?;
            dds.set_frequency(0.0)?;
            dds.set_amplitude(0)?;
            dds.set_phase(0)?;
            dds.set_waveform(Waveform::Sine)?;
            dds.set_amplitude_modulation_source(own)?;
            dds.set_frequency_modulation_source(own)?;
            dds.set_phase_modulation_source(own)?;
            dds.set_synchronization_source(own)?;
            dds.set_maximum_frequency_modulation_range(0)?;
        }
        self.universal_counter
            .set_input_source(CounterSource::Dds0)?;
        self.universal_counter
            .set_prescaler_mode(PrescalerMode::GatePeriod1s)
    }

    /// AM information per generator. A generator using itself as source is
    /// not modulated.
    #[must_use]
    pub fn amplitude_modulation_info(&self) -> [ModulationInfo; 4] {
        std::array::from_fn(|i| {
            let carrier = &self.dds_generators[i];
            let source = carrier.amplitude_modulation_source().index();
            let modulator = (source != i).then(|| &self.dds_generators[source]);
            modulation::amplitude_modulation(carrier, modulator)
        })
    }

    /// FM information per generator, same self-reference rule as AM.
    #[must_use]
    pub fn frequency_modulation_info(&self) -> [ModulationInfo; 4] {
        std::array::from_fn(|i| {
            let carrier = &self.dds_generators[i];
            let source = carrier.frequency_modulation_source().index();
            let modulator = (source != i).then(|| &self.dds_generators[source]);
            modulation::frequency_modulation(carrier, modulator)
        })
    }
}
