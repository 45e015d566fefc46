use crate::output::UserOutput;
use stackward::config::{self, GlobalConfig, Paths};

pub fn run_config(
    paths: &Paths,
    key: Option<&str>,
    value: Option<&str>,
    unset: bool,
    out: &dyn UserOutput,
) -> anyhow::Result<()> {
    let file = paths.config_file();
    let mut global = GlobalConfig::load(&file)?;

    match (key, value) {
        (Some(key), _) if unset => {
            if global.unset(key) {
                global.save(&file)?;
                out.success(&format!("Removed {}", key));
            } else {
                out.status(&format!("{} was not set", key));
            }
        }
        (Some(key), Some(value)) => {
            global.set(key, value)?;
            // Reject a file that would no longer resolve to valid settings
            global.settings()?;
            global.save(&file)?;
            out.success(&format!("{}={}", key, value));
        }
        (Some(key), None) => match global.get(key) {
            Some(value) => out.status(value),
            None => out.status(&effective(&global, key)?.unwrap_or_default()),
        },
        (None, _) => {
            for key in config::KNOWN_KEYS {
                let shown = effective(&global, key)?.unwrap_or_default();
                out.status(&format!("{}={}", key, shown));
            }
            for (key, value) in global.entries() {
                if !config::KNOWN_KEYS.contains(&key.as_str()) {
                    out.status(&format!("{}={}", key, value));
                }
            }
        }
    }
    Ok(())
}

/// Value in effect for a known key, including defaults.
fn effective(global: &GlobalConfig, key: &str) -> anyhow::Result<Option<String>> {
    let settings = global.settings()?;
    let value = match key {
        config::WEBHOOK_URL => settings.webhook_url,
        config::HEALTH_TIMEOUT => Some(settings.health_timeout.as_secs().to_string()),
        config::PRE_HOOK_POLICY => Some(settings.pre_hook_policy.to_string()),
        config::PRUNE_IMAGES => Some(settings.prune_images.to_string()),
        _ => None,
    };
    Ok(value)
}
