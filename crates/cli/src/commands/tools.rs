//! `stepwise tools`: list the built-in tools.

use stepwise_config::AppConfig;

pub fn run(schemas: bool) -> anyhow::Result<()> {
    let config = AppConfig::load()?;
    let registry = stepwise_tools::default_registry(&config.agent.workspace_dir, &config.tools);

    if registry.is_empty() {
        println!("No tools enabled (see the [tools] section of the config).");
        return Ok(());
    }

    for def in registry.definitions() {
        println!("{:<12} {}", def.name, def.description);
        if schemas {
            println!("{}\n", serde_json::to_string_pretty(&def.parameters)?);
        }
    }
    Ok(())
}
