//! Direct digital synthesis generator.
//!
//! The output frequency is set through a 32-bit phase increment:
//! `phase_increment = f / MAXIMUM_FREQUENCY * 2^31`.

use crate::error::CtLabError;
use crate::fpga::FpgaValueSetter;
use crate::signal::enums::{ModulationSource, Waveform};
use crate::signal::modulation::{AmplitudeSource, FrequencySource};
use crate::signal::writers::{AmplitudePhaseWriter, U32Writer, WaveformWriter};

pub const MAXIMUM_FREQUENCY: f64 = 50e6;
/// Phase increment corresponding to `MAXIMUM_FREQUENCY` (2^31).
pub const MAXIMUM_PHASE_INCREMENT: f64 = 2_147_483_648.0;
pub const MAXIMUM_AMPLITUDE: i16 = i16::MAX;
pub const MAXIMUM_FREQUENCY_MODULATION_RANGE: u16 = 5;

/// Phase increment for `frequency` in Hz, rounded to the nearest integer.
///
/// # Errors
///
/// `OutOfRange` for negative or non-finite frequencies and for results that
/// do not fit a `u32`.
pub fn phase_increment_for(frequency: f64) -> Result<u32, CtLabError> {
    let increment = (frequency / MAXIMUM_FREQUENCY * MAXIMUM_PHASE_INCREMENT).round();
    if !increment.is_finite() || increment < 0.0 || increment > f64::from(u32::MAX) {
        return Err(CtLabError::OutOfRange(format!("frequency {frequency} Hz")));
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let increment = increment as u32;
    Ok(increment)
}

#[must_use]
pub fn frequency_for(phase_increment: u32) -> f64 {
    f64::from(phase_increment) / MAXIMUM_PHASE_INCREMENT * MAXIMUM_FREQUENCY
}

/// Peak frequency deviation reachable with a full-scale modulator.
#[must_use]
pub fn maximum_frequency_modulation_depth(range: u16) -> f64 {
    let steps = i32::from(MAXIMUM_FREQUENCY_MODULATION_RANGE.saturating_sub(range));
    MAXIMUM_FREQUENCY / 2.0 / 8f64.powi(steps)
}

/// One DDS generator: waveform/modulation register (base + 0), phase
/// increment (base + 1), amplitude/phase (base + 2).
pub struct DdsGenerator {
    waveform: WaveformWriter,
    phase_increment: U32Writer,
    amplitude_phase: AmplitudePhaseWriter,
}

impl DdsGenerator {
    #[must_use]
    pub fn new(
        waveform_setter: FpgaValueSetter,
        phase_increment_setter: FpgaValueSetter,
        amplitude_phase_setter: FpgaValueSetter,
    ) -> Self {
        Self {
            waveform: WaveformWriter::new(waveform_setter),
            phase_increment: U32Writer::new(phase_increment_setter),
            amplitude_phase: AmplitudePhaseWriter::new(amplitude_phase_setter),
        }
    }

    #[must_use]
    pub const fn waveform(&self) -> Waveform {
        self.waveform.waveform()
    }

    pub fn set_waveform(&mut self, waveform: Waveform) -> Result<(), CtLabError> {
        self.waveform.set_waveform(waveform)
    }

    #[must_use]
    pub const fn maximum_frequency_modulation_range(&self) -> u16 {
        self.waveform.maximum_frequency_modulation_range()
    }

    /// # Errors
    ///
    /// `OutOfRange` when `range` exceeds 5; nothing is sent then.
    pub fn set_maximum_frequency_modulation_range(&mut self, range: u16) -> Result<(), CtLabError> {
        if range > MAXIMUM_FREQUENCY_MODULATION_RANGE {
            return Err(CtLabError::OutOfRange(format!(
                "maximum frequency modulation range {range} (0..={MAXIMUM_FREQUENCY_MODULATION_RANGE})"
            )));
        }
        self.waveform.set_maximum_frequency_modulation_range(range)
    }

    #[must_use]
    pub fn maximum_frequency_modulation_depth(&self) -> f64 {
        maximum_frequency_modulation_depth(self.maximum_frequency_modulation_range())
    }

    #[must_use]
    pub const fn synchronization_source(&self) -> ModulationSource {
        self.waveform.synchronization_source()
    }

    pub fn set_synchronization_source(&mut self, source: ModulationSource) -> Result<(), CtLabError> {
        self.waveform.set_synchronization_source(source)
    }

    #[must_use]
    pub const fn phase_modulation_source(&self) -> ModulationSource {
        self.waveform.phase_modulation_source()
    }

    pub fn set_phase_modulation_source(&mut self, source: ModulationSource) -> Result<(), CtLabError> {
        self.waveform.set_phase_modulation_source(source)
    }

    #[must_use]
    pub const fn frequency_modulation_source(&self) -> ModulationSource {
        self.waveform.frequency_modulation_source()
    }

    pub fn set_frequency_modulation_source(
        &mut self,
        source: ModulationSource,
    ) -> Result<(), CtLabError> {
        self.waveform.set_frequency_modulation_source(source)
    }

    #[must_use]
    pub const fn amplitude_modulation_source(&self) -> ModulationSource {
        self.waveform.amplitude_modulation_source()
    }

    pub fn set_amplitude_modulation_source(
        &mut self,
        source: ModulationSource,
    ) -> Result<(), CtLabError> {
        self.waveform.set_amplitude_modulation_source(source)
    }

    #[must_use]
    pub const fn phase_increment(&self) -> u32 {
        self.phase_increment.value()
    }

    pub fn set_phase_increment(&mut self, increment: u32) -> Result<(), CtLabError> {
        self.phase_increment.set(increment)
    }

    /// Frequency in Hz, derived from the stored phase increment.
    #[must_use]
    pub fn frequency(&self) -> f64 {
        frequency_for(self.phase_increment())
    }

    pub fn set_frequency(&mut self, frequency: f64) -> Result<(), CtLabError> {
        let increment = phase_increment_for(frequency)?;
        self.set_phase_increment(increment)
    }

    #[must_use]
    pub const fn amplitude(&self) -> i16 {
        self.amplitude_phase.amplitude()
    }

    pub fn set_amplitude(&mut self, amplitude: i16) -> Result<(), CtLabError> {
        self.amplitude_phase.set_amplitude(amplitude)
    }

    #[must_use]
    pub const fn phase(&self) -> i16 {
        self.amplitude_phase.phase()
    }

    pub fn set_phase(&mut self, phase: i16) -> Result<(), CtLabError> {
        self.amplitude_phase.set_phase(phase)
    }
}

impl AmplitudeSource for DdsGenerator {
    fn amplitude(&self) -> i16 {
        Self::amplitude(self)
    }
}

impl FrequencySource for DdsGenerator {
    fn frequency(&self) -> f64 {
        Self::frequency(self)
    }

    fn maximum_frequency_modulation_depth(&self) -> f64 {
        Self::maximum_frequency_modulation_depth(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::recording_connection;

    fn generator(base: u16) -> (std::sync::Arc<crate::test_utils::RecordingSender>, DdsGenerator) {
        let (rec, conn) = recording_connection(7).expect("connection");
        let g = DdsGenerator::new(
            conn.create_value_setter(base).expect("setter"),
            conn.create_value_setter(base + 1).expect("setter"),
            conn.create_value_setter(base + 2).expect("setter"),
        );
        (rec, g)
    }

    #[test]
    fn half_maximum_frequency() {
        assert_eq!(phase_increment_for(MAXIMUM_FREQUENCY / 2.0).expect("ok"), 1 << 30);
        let (rec, mut g) = generator(16);
        g.set_frequency(25e6).expect("set");
        assert_eq!(g.phase_increment(), 1_073_741_824);
        assert_eq!(rec.last().as_deref(), Some("7:17=1073741824"));
        assert!((g.frequency() - 25e6).abs() < 1e-6);
    }

    #[test]
    fn frequency_rounds_to_nearest() {
        // 1 Hz -> 42.949..., 1.5 Hz -> 64.42...
        assert_eq!(phase_increment_for(1.0).expect("ok"), 43);
        assert_eq!(phase_increment_for(1.5).expect("ok"), 64);
        assert_eq!(phase_increment_for(0.0).expect("ok"), 0);
    }

    #[test]
    fn frequency_out_of_range() {
        assert!(phase_increment_for(-1.0).is_err());
        assert!(phase_increment_for(f64::NAN).is_err());
        assert!(phase_increment_for(MAXIMUM_FREQUENCY * 2.0).is_err());
        // just below 2^32 still fits
        assert!(phase_increment_for(MAXIMUM_FREQUENCY * 1.999_999).is_ok());
    }

    #[test]
    fn modulation_depth_per_range() {
        assert_eq!(maximum_frequency_modulation_depth(4), 3_125_000.0);
        assert_eq!(maximum_frequency_modulation_depth(5), 25_000_000.0);
        let (rec, mut g) = generator(20);
        g.set_maximum_frequency_modulation_range(4).expect("set");
        assert_eq!(g.maximum_frequency_modulation_depth(), 3_125_000.0);
        let sent = rec.sent().len();
        assert!(matches!(
            g.set_maximum_frequency_modulation_range(6),
            Err(CtLabError::OutOfRange(_))
        ));
        assert_eq!(rec.sent().len(), sent);
        assert_eq!(g.maximum_frequency_modulation_range(), 4);
    }

    #[test]
    fn amplitude_and_phase_share_a_register() {
        let (rec, mut g) = generator(24);
        g.set_amplitude(1000).expect("set");
        g.set_phase(-1).expect("set");
        assert_eq!(
            rec.sent(),
            vec![
                format!("7:26={}", 1000u32 << 16),
                format!("7:26={}", (1000u32 << 16) | 0xFFFF),
            ]
        );
    }
}
