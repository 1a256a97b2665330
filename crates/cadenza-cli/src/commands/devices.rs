//! Audio output device listing.

use cadenza_io::list_devices;

pub fn run() -> anyhow::Result<()> {
    let devices = list_devices()?;

    if devices.is_empty() {
        println!("No audio output devices found.");
        return Ok(());
    }

    println!("Output Devices");
    println!("==============\n");
    for (idx, device) in devices.iter().enumerate() {
        let default = if device.is_default { " (default)" } else { "" };
        println!(
            "  [{}] {} ({} Hz){}",
            idx, device.name, device.default_sample_rate, default
        );
    }
    println!();
    println!("Tip: select a device by partial name:");
    println!("  cadenza play --device \"USB\"");
    Ok(())
}
