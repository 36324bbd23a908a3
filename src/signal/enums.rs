//! Register-level enumerations of the signal generator firmware. The
//! discriminants are the values written into the register fields.

use crate::error::CtLabError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum Waveform {
    Rectangle = 0,
    Sawtooth = 1,
    #[default]
    Sine = 2,
}

/// A DDS generator used as modulation or synchronization source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum ModulationSource {
    #[default]
    Dds0 = 0,
    Dds1 = 1,
    Dds2 = 2,
    Dds3 = 3,
}

impl ModulationSource {
    pub const ALL: [Self; 4] = [Self::Dds0, Self::Dds1, Self::Dds2, Self::Dds3];

    /// Source for generator `index` (0..=3).
    pub fn from_index(index: usize) -> Result<Self, CtLabError> {
        Self::ALL
            .get(index)
            .copied()
            .ok_or_else(|| CtLabError::OutOfRange(format!("DDS generator index {index}")))
    }

    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum OutputSource {
    #[default]
    Dds0 = 0,
    Dds1 = 1,
    Dds2 = 2,
    Dds3 = 3,
    PulseGenerator = 4,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum CounterSource {
    #[default]
    Dds0 = 0,
    Dds1 = 1,
    Dds2 = 2,
    Dds3 = 3,
    PulseGenerator = 4,
    External = 5,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum MeasurementMode {
    #[default]
    Frequency = 0,
    Period = 1,
}

/// Gate time (frequency measurement) or counter clock (period measurement).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum PrescalerMode {
    #[default]
    GatePeriod1s = 0,
    GatePeriod10s = 1,
    GatePeriod100ms = 2,
    CounterClock10MHz = 3,
    CounterClock1MHz = 4,
    CounterClock100kHz = 5,
    CounterClock10kHz = 6,
}

impl PrescalerMode {
    #[must_use]
    pub const fn measurement_mode(self) -> MeasurementMode {
        match self {
            Self::GatePeriod1s | Self::GatePeriod10s | Self::GatePeriod100ms => {
                MeasurementMode::Frequency
            }
            _ => MeasurementMode::Period,
        }
    }

    /// Decimal exponent of one count of the raw counter value.
    #[must_use]
    pub const fn least_significant_digit_exponent(self) -> i32 {
        match self {
            Self::GatePeriod100ms => 1,
            Self::GatePeriod1s => 0,
            Self::GatePeriod10s => -1,
            Self::CounterClock10kHz => -4,
            Self::CounterClock100kHz => -5,
            Self::CounterClock1MHz => -6,
            Self::CounterClock10MHz => -7,
        }
    }
}

/// Signal recorded by the scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum ScopeSource {
    #[default]
    Dds0 = 0,
    Dds1 = 1,
    Dds2 = 2,
    Dds3 = 3,
    PulseGenerator = 4,
    External = 5,
}
