use egk_apdu_core::ChannelFactory;
use egk_apdu_transport_pcsc::PcscChannelFactory;

/// List all available readers
pub(crate) fn list_readers(factory: &PcscChannelFactory) -> Result<(), Box<dyn std::error::Error>> {
    let readers = factory.list_readers()?;

    if readers.is_empty() {
        println!("No readers found!");
        return Ok(());
    }

    println!("Available readers:");
    for (i, reader) in readers.iter().enumerate() {
        let status = match reader.atr() {
            Some(atr) => format!("card present, ATR {}", atr_hex(atr)),
            None => "no card".to_owned(),
        };
        let filtered = if factory.config().accepts_reader(reader.name()) {
            ""
        } else {
            ", ignored"
        };
        println!("{}. {} ({}{})", i + 1, reader.name(), status, filtered);
    }

    Ok(())
}

/// Print transport availability
pub(crate) fn status_command(factory: &PcscChannelFactory) {
    println!("PC/SC service: {}", yes_no(factory.is_available()));
    println!("Matching reader: {}", yes_no(factory.is_enabled()));
}

fn atr_hex(atr: &[u8]) -> String {
    atr.iter().map(|b| format!("{b:02X}")).collect::<Vec<_>>().join(" ")
}

const fn yes_no(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}
