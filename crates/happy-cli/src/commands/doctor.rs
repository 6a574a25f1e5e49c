use happy_sync::config::Configuration;
use happy_sync::local_state::LocalStateFile;

pub fn run() -> anyhow::Result<()> {
    let config = Configuration::create()?;

    println!("Happy State Doctor\n");
    println!("  Version: {}", env!("CARGO_PKG_VERSION"));
    println!("  Data Dir: {}", config.data_dir.display());
    println!("  Settings File: {}", config.settings_file.display());
    println!(
        "  Server URL: {} ({})",
        config.server_url,
        config.server_url_source.as_str()
    );
    println!(
        "  Machine ID: {}",
        config.machine_id.as_deref().unwrap_or("not set")
    );

    match LocalStateFile::read(&config.local_state_file) {
        Ok(local) => println!(
            "  Local State: {} session(s) in {}",
            local.sessions.len(),
            config.local_state_file.display()
        ),
        Err(e) => println!("  Local State: unreadable ({e})"),
    }

    Ok(())
}
