use std::io::Write;

use ctlab_dummy::DummyDevice;
use ctlab_protocol::Address;

#[test]
fn load_state_from_toml() -> anyhow::Result<()> {
    let mut file = tempfile::NamedTempFile::new()?;
    writeln!(file, "[values]")?;
    writeln!(file, "\"7:5\" = \"1234\"")?;
    writeln!(file, "\"7:4\" = \"1\"")?;

    let device = DummyDevice::new(7);
    assert_eq!(device.load_state(file.path())?, 2);
    assert_eq!(device.value(Address::new(7, 5)).as_deref(), Some("1234"));

    let replies = device.handle_line("7:5?");
    assert_eq!(replies.len(), 1);
    assert!(replies[0].starts_with("#7:5=1234 [OK]$"));

    let snap = device.snapshot();
    assert_eq!(snap.values.get("7:4").map(String::as_str), Some("1"));
    Ok(())
}

#[test]
fn bad_address_in_state_file() -> anyhow::Result<()> {
    let mut file = tempfile::NamedTempFile::new()?;
    writeln!(file, "[values]\n\"seven\" = \"1\"")?;
    let err = DummyDevice::new(7)
        .load_state(file.path())
        .expect_err("bad address");
    assert!(format!("{err:#}").contains("bad address seven"));
    Ok(())
}
