//! `stepwise config`: print a starter configuration.

use stepwise_config::AppConfig;

pub fn run(path_only: bool) {
    let config_path = AppConfig::config_dir().join("config.toml");
    if path_only {
        println!("{}", config_path.display());
        return;
    }

    println!("# Stepwise configuration");
    println!("# Save as {}", config_path.display());
    println!("# The API key can also come from STEPWISE_API_KEY or OPENAI_API_KEY.");
    println!();
    println!("{}", AppConfig::default_toml());
}
