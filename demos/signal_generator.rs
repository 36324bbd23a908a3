use std::sync::Arc;

use ctlab_dummy::{DummyDevice, LoopbackTransport};
use ctlab_protocol::signal::{ModulationSource, OutputSource, Waveform};
use ctlab_protocol::{
    CommandSender, CommandStringBuilder, FpgaConnection, MessageCache, RegisterTable,
    SignalGenerator, SignalGeneratorRegisters,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let transport = LoopbackTransport::new(DummyDevice::new(7));
    let sender = Arc::new(CommandSender::new(CommandStringBuilder::new(), transport.clone()));
    let table = Arc::new(RegisterTable::builtin()?.clone());
    let connection = Arc::new(FpgaConnection::new(table, Arc::new(MessageCache::new()), sender));

    let mut sg = SignalGenerator::new(connection, &SignalGeneratorRegisters::default())?;
    sg.reset()?;

    // 1 kHz sine carrier on output 0, amplitude modulated by a 50 Hz sawtooth
    {
        let carrier = sg.dds_generator_mut(0)?;
        carrier.set_frequency(1_000.0)?;
        carrier.set_amplitude(16_000)?;
        carrier.set_amplitude_modulation_source(ModulationSource::Dds1)?;
    }
    {
        let modulator = sg.dds_generator_mut(1)?;
        modulator.set_waveform(Waveform::Sawtooth)?;
        modulator.set_frequency(50.0)?;
        modulator.set_amplitude(8_000)?;
    }
    // FM: DDS2 swept by DDS3 with the second smallest deviation range
    {
        let carrier = sg.dds_generator_mut(2)?;
        carrier.set_frequency(100_000.0)?;
        carrier.set_amplitude(i16::MAX)?;
        carrier.set_maximum_frequency_modulation_range(1)?;
        carrier.set_frequency_modulation_source(ModulationSource::Dds3)?;
    }
    sg.dds_generator_mut(3)?.set_amplitude(4_000)?;
    sg.output_source_selector_mut()
        .set_output_source1(OutputSource::Dds2)?;

    for (i, (am, fm)) in sg
        .amplitude_modulation_info()
        .iter()
        .zip(sg.frequency_modulation_info().iter())
        .enumerate()
    {
        println!(
            "dds{i}: {:>10.1} Hz  AM depth {:>7.1} ({:.0}%{})  FM depth {:>9.1} Hz ({:.0}%{})",
            sg.dds_generators()[i].frequency(),
            am.modulation_depth,
            am.relative_modulation_depth * 100.0,
            if am.overmodulated() { ", overmodulated" } else { "" },
            fm.modulation_depth,
            fm.relative_modulation_depth * 100.0,
            if fm.overmodulated() { ", overmodulated" } else { "" },
        );
    }

    transport.flush();
    println!("{} commands sent", transport.device().received().len());
    Ok(())
}
