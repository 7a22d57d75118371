use std::fs;
use std::path::Path;
use std::thread;
use std::time::Duration;

use egk_apdu_transport_pcsc::PcscChannelFactory;
use egk_card::payload::InsuranceDataFile;
use egk_card::{CardData, NfcSession, SessionConfig};
use tracing::info;

/// Read the card and store its files below `output`
pub(crate) fn read_command(
    factory: PcscChannelFactory,
    config: SessionConfig,
    can: &str,
    output: &Path,
    decompress: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut session = NfcSession::with_config(factory, config);

    let states = session.subscribe();
    let printer = thread::spawn(move || {
        for state in states {
            println!("> {state}");
            if state.is_terminal() {
                break;
            }
        }
    });

    println!("{}", card_prompt(config.discovery_timeout));
    let result = session.read_card(can);
    drop(session);
    let _ = printer.join();

    let data = result?;
    fs::create_dir_all(output)?;
    if decompress {
        write_documents(&data, output)
    } else {
        write_raw(&data, output)
    }
}

/// Prompt shown while the session waits for a card
fn card_prompt(timeout: Option<Duration>) -> String {
    match timeout {
        Some(timeout) => format!(
            "Hold the card to the reader (giving up after {}s)",
            timeout.as_secs()
        ),
        None => "Hold the card to the reader".to_owned(),
    }
}

fn write_raw(data: &CardData, output: &Path) -> Result<(), Box<dyn std::error::Error>> {
    write_file(&output.join("pd.bin"), data.personal_data.as_bytes())?;
    write_file(&output.join("vd.bin"), data.insurance_data.as_bytes())?;

    let insurance = InsuranceDataFile::parse(&data.insurance_data)?;
    if let Some(gvd) = insurance.secondary() {
        write_file(&output.join("gvd.bin"), gvd)?;
    }
    Ok(())
}

fn write_documents(data: &CardData, output: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let documents = data.decompress()?;
    write_file(&output.join("pd.xml"), &documents.personal_data)?;
    write_file(&output.join("vd.xml"), &documents.insurance_data)?;
    if let Some(gvd) = &documents.protected_insurance_data {
        write_file(&output.join("gvd.xml"), gvd)?;
    }
    Ok(())
}

fn write_file(path: &Path, contents: &[u8]) -> Result<(), Box<dyn std::error::Error>> {
    fs::write(path, contents)?;
    info!(path = %path.display(), bytes = contents.len(), "Wrote file");
    Ok(())
}
