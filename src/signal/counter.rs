use std::sync::atomic::{AtomicI32, AtomicU8, Ordering};
use std::sync::Arc;

use crate::error::CtLabError;
use crate::fpga::{FpgaValueGetter, FpgaValueSetter};
use crate::message::Message;
use crate::signal::enums::{CounterSource, MeasurementMode, PrescalerMode};
use crate::signal::writers::CounterConfigurationWriter;
use crate::transport::SubscriptionId;

const STATUS_INPUT_SIGNAL_ACTIVE: u32 = 0x1;
const STATUS_OVERFLOW: u32 = 0x2;

// last seen input-active flag: 0 unknown, 1 inactive, 2 active
const ACTIVE_UNKNOWN: u8 = 0;

pub type ValueHandler = Arc<dyn Fn(f64) + Send + Sync>;
pub type ActiveHandler = Arc<dyn Fn(bool) + Send + Sync>;

/// Frequency/period counter. The raw count is scaled by
/// `10^least_significant_digit_exponent`, which follows the prescaler.
pub struct UniversalCounter {
    configuration: CounterConfigurationWriter,
    raw_value: FpgaValueGetter,
    status: FpgaValueGetter,
    exponent: Arc<AtomicI32>,
}

impl UniversalCounter {
    #[must_use]
    pub fn new(
        configuration_setter: FpgaValueSetter,
        raw_value: FpgaValueGetter,
        status: FpgaValueGetter,
    ) -> Self {
        let configuration = CounterConfigurationWriter::new(configuration_setter);
        let exponent = configuration.prescaler_mode().least_significant_digit_exponent();
        Self {
            configuration,
            raw_value,
            status,
            exponent: Arc::new(AtomicI32::new(exponent)),
        }
    }

    #[must_use]
    pub const fn input_source(&self) -> CounterSource {
        self.configuration.input_source()
    }

    pub fn set_input_source(&mut self, source: CounterSource) -> Result<(), CtLabError> {
        self.configuration.set_input_source(source)
    }

    #[must_use]
    pub const fn prescaler_mode(&self) -> PrescalerMode {
        self.configuration.prescaler_mode()
    }

    /// Also switches the measurement mode: gate periods measure frequency,
    /// counter clocks measure period. On a send error the previous modes and
    /// scaling stay in effect.
    pub fn set_prescaler_mode(&mut self, mode: PrescalerMode) -> Result<(), CtLabError> {
        self.configuration
            .set_modes(mode, mode.measurement_mode())?;
        self.exponent
            .store(mode.least_significant_digit_exponent(), Ordering::SeqCst);
        Ok(())
    }

    #[must_use]
    pub const fn measurement_mode(&self) -> MeasurementMode {
        self.configuration.measurement_mode()
    }

    #[must_use]
    pub fn least_significant_digit_exponent(&self) -> i32 {
        self.exponent.load(Ordering::SeqCst)
    }

    /// Measured value in Hz (frequency mode) or seconds (period mode).
    pub fn value(&self) -> Result<f64, CtLabError> {
        let raw = self.raw_value.value_as_u32()?;
        Ok(scale(raw, self.least_significant_digit_exponent()))
    }

    pub fn overflow(&self) -> Result<bool, CtLabError> {
        Ok(self.status.value_as_u32()? & STATUS_OVERFLOW != 0)
    }

    pub fn input_signal_active(&self) -> Result<bool, CtLabError> {
        Ok(self.status.value_as_u32()? & STATUS_INPUT_SIGNAL_ACTIVE != 0)
    }

    /// Called with the scaled value whenever a raw value message arrives.
    /// Unparsable values are skipped.
    pub fn on_value_changed(&self, handler: ValueHandler) -> SubscriptionId {
        let exponent = Arc::clone(&self.exponent);
        self.raw_value.on_updated(Arc::new(move |m: &Message| {
            if let Ok(raw) = m.value::<u32>() {
                handler(scale(raw, exponent.load(Ordering::SeqCst)));
            }
        }))
    }

    /// Called when the input-signal-active bit differs from the last status
    /// message (and for the first status message).
    pub fn on_input_signal_active_changed(&self, handler: ActiveHandler) -> SubscriptionId {
        let last = Arc::new(AtomicU8::new(ACTIVE_UNKNOWN));
        self.status.on_updated(Arc::new(move |m: &Message| {
            let Ok(status) = m.value::<u32>() else {
                return;
            };
            let active = status & STATUS_INPUT_SIGNAL_ACTIVE != 0;
            let code = if active { 2 } else { 1 };
            if last.swap(code, Ordering::SeqCst) != code {
                handler(active);
            }
        }))
    }

    pub fn remove_value_handler(&self, id: SubscriptionId) -> bool {
        self.raw_value.remove_handler(id)
    }

    pub fn remove_input_signal_active_handler(&self, id: SubscriptionId) -> bool {
        self.status.remove_handler(id)
    }
}

fn scale(raw: u32, exponent: i32) -> f64 {
    f64::from(raw) * 10f64.powi(exponent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::Address;
    use crate::fpga::QueryMode;
    use crate::test_utils::recording_connection;
    use std::sync::Mutex;

    fn counter() -> (
        Arc<crate::test_utils::RecordingSender>,
        Arc<crate::fpga::FpgaConnection>,
        UniversalCounter,
    ) {
        let (rec, conn) = recording_connection(7).expect("connection");
        let c = UniversalCounter::new(
            conn.create_value_setter(12).expect("setter"),
            conn.create_value_getter(5, QueryMode::Active).expect("getter"),
            conn.create_value_getter(4, QueryMode::Active).expect("getter"),
        );
        (rec, conn, c)
    }

    #[test]
    fn prescaler_switches_measurement_mode() {
        let (rec, _conn, mut c) = counter();
        c.set_prescaler_mode(PrescalerMode::CounterClock1MHz).expect("set");
        assert_eq!(c.measurement_mode(), MeasurementMode::Period);
        assert_eq!(c.least_significant_digit_exponent(), -6);
        assert_eq!(rec.last().as_deref(), Some("7:12=20"));
        c.set_prescaler_mode(PrescalerMode::GatePeriod100ms).expect("set");
        assert_eq!(c.measurement_mode(), MeasurementMode::Frequency);
        assert_eq!(rec.last().as_deref(), Some("7:12=2"));
    }

    #[test]
    fn scaled_value_and_status() {
        let (_rec, conn, mut c) = counter();
        assert!(matches!(c.value(), Err(CtLabError::NoValueAvailable(_))));
        conn.cache().update(Message::new(Address::new(7, 5), "1234", ""));
        assert_eq!(c.value().expect("value"), 1234.0);
        c.set_prescaler_mode(PrescalerMode::GatePeriod100ms).expect("set");
        assert_eq!(c.value().expect("value"), 12_340.0);

        conn.cache().update(Message::new(Address::new(7, 4), "3", ""));
        assert!(c.overflow().expect("status"));
        assert!(c.input_signal_active().expect("status"));
        conn.cache().update(Message::new(Address::new(7, 4), "1", ""));
        assert!(!c.overflow().expect("status"));
    }

    #[test]
    fn events() {
        let (_rec, conn, mut c) = counter();
        c.set_prescaler_mode(PrescalerMode::GatePeriod10s).expect("set");
        let values = Arc::new(Mutex::new(Vec::new()));
        let v = values.clone();
        c.on_value_changed(Arc::new(move |x: f64| v.lock().expect("lock").push(x)));
        let flags = Arc::new(Mutex::new(Vec::new()));
        let f = flags.clone();
        c.on_input_signal_active_changed(Arc::new(move |a: bool| f.lock().expect("lock").push(a)));

        conn.cache().update(Message::new(Address::new(7, 5), "500", ""));
        conn.cache().update(Message::new(Address::new(7, 4), "1", ""));
        conn.cache().update(Message::new(Address::new(7, 4), "3", ""));
        conn.cache().update(Message::new(Address::new(7, 4), "0", ""));

        assert_eq!(*values.lock().expect("lock"), vec![50.0]);
        assert_eq!(*flags.lock().expect("lock"), vec![true, false]);
    }

    #[test]
    fn failed_prescaler_switch_keeps_scaling() {
        let (rec, conn, mut c) = counter();
        let values = Arc::new(Mutex::new(Vec::new()));
        let v = values.clone();
        c.on_value_changed(Arc::new(move |x: f64| v.lock().expect("lock").push(x)));

        rec.clear();
        rec.fail_next("link down");
        assert!(c.set_prescaler_mode(PrescalerMode::GatePeriod10s).is_err());
        assert!(rec.sent().is_empty());
        assert_eq!(c.prescaler_mode(), PrescalerMode::GatePeriod1s);
        assert_eq!(c.measurement_mode(), MeasurementMode::Frequency);
        assert_eq!(c.least_significant_digit_exponent(), 0);

        conn.cache().update(Message::new(Address::new(7, 5), "500", ""));
        assert_eq!(c.value().expect("value"), 500.0);
        assert_eq!(*values.lock().expect("lock"), vec![500.0]);

        c.set_prescaler_mode(PrescalerMode::GatePeriod10s).expect("set");
        assert_eq!(c.least_significant_digit_exponent(), -1);
        assert_eq!(c.value().expect("value"), 50.0);
    }
}
