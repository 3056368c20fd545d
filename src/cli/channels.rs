use anyhow::{Context, Result};
use std::path::PathBuf;

use celio::CelReader;

/// List the scan channels of a generic CEL file
pub fn run(file: PathBuf) -> Result<()> {
    let reader = CelReader::open(&file).context("Failed to classify file")?;

    if !reader.kind().is_generic() {
        println!(
            "{}: {} format, single channel",
            file.display(),
            reader.kind()
        );
        return Ok(());
    }

    let count = reader.channel_count().context("Failed to count channels")?;
    println!("{}: {} ({} channels)", file.display(), reader.kind(), count);
    for channel in 0..count {
        let name = reader
            .channel_name(channel)
            .with_context(|| format!("Failed to read channel {channel} name"))?;
        println!("  {channel}: {name}");
    }
    Ok(())
}
