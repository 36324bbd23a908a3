//! AM/FM depth of a carrier generator given its modulator.

use crate::signal::dds::{MAXIMUM_AMPLITUDE, MAXIMUM_FREQUENCY};

pub trait AmplitudeSource {
    fn amplitude(&self) -> i16;

    fn maximum_amplitude(&self) -> i16 {
        MAXIMUM_AMPLITUDE
    }
}

pub trait FrequencySource: AmplitudeSource {
    fn frequency(&self) -> f64;

    fn maximum_frequency(&self) -> f64 {
        MAXIMUM_FREQUENCY
    }

    fn maximum_frequency_modulation_depth(&self) -> f64;
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ModulationInfo {
    /// Absolute depth (Hz for FM, amplitude units for AM).
    pub modulation_depth: f64,
    /// Depth relative to the room the carrier leaves; may be infinite.
    pub relative_modulation_depth: f64,
}

impl ModulationInfo {
    #[must_use]
    pub fn overmodulated(&self) -> bool {
        self.relative_modulation_depth > 1.0
    }
}

/// AM of `carrier` by `modulator`. The room is the distance of the carrier
/// amplitude to 0 or to the maximum, whichever is closer.
pub fn amplitude_modulation<C, M>(carrier: &C, modulator: Option<&M>) -> ModulationInfo
where
    C: AmplitudeSource + ?Sized,
    M: AmplitudeSource + ?Sized,
{
    let Some(modulator) = modulator else {
        return ModulationInfo::default();
    };
    let depth = f64::from(modulator.amplitude()).abs();
    if depth == 0.0 {
        return ModulationInfo::default();
    }
    let carrier_amplitude = f64::from(carrier.amplitude());
    let maximum = f64::from(carrier.maximum_amplitude());
    let room = if carrier_amplitude < maximum / 2.0 {
        carrier_amplitude
    } else {
        maximum - carrier_amplitude
    };
    ModulationInfo {
        modulation_depth: depth,
        relative_modulation_depth: (depth / room).abs(),
    }
}

/// FM of `carrier` by `modulator`: the carrier's maximum deviation scaled by
/// the modulator's relative amplitude.
pub fn frequency_modulation<C, M>(carrier: &C, modulator: Option<&M>) -> ModulationInfo
where
    C: FrequencySource + ?Sized,
    M: AmplitudeSource + ?Sized,
{
    let Some(modulator) = modulator else {
        return ModulationInfo::default();
    };
    let depth = (carrier.maximum_frequency_modulation_depth() * f64::from(modulator.amplitude())
        / f64::from(modulator.maximum_amplitude()))
    .abs();
    if depth == 0.0 {
        return ModulationInfo::default();
    }
    let frequency = carrier.frequency();
    let room = if frequency < carrier.maximum_frequency() / 2.0 {
        frequency
    } else {
        carrier.maximum_frequency() - frequency
    };
    ModulationInfo {
        modulation_depth: depth,
        relative_modulation_depth: depth / room,
    }
}
