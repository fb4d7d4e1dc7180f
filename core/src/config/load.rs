use std::path::{Path, PathBuf};

use crate::error::ConfigError;

use super::types::AppConfig;

/// Data directory: `$PHASEFORGE_HOME`, else `~/.phaseforge`.
pub fn get_data_dir() -> Result<PathBuf, ConfigError> {
    if let Ok(dir) = std::env::var("PHASEFORGE_HOME") {
        if !dir.trim().is_empty() {
            return Ok(PathBuf::from(dir));
        }
    }
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .map_err(|_| ConfigError::NoHome)?;
    Ok(PathBuf::from(home).join(".phaseforge"))
}

pub fn load_from(path: &Path) -> Result<AppConfig, ConfigError> {
    let s = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str::<AppConfig>(&s).map_err(|source| ConfigError::Toml {
        path: path.to_path_buf(),
        source,
    })
}

pub fn load_default() -> Result<AppConfig, ConfigError> {
    let data_dir = get_data_dir()?;

    // Priority 1: <data dir>/config.toml
    let home_config = data_dir.join("config.toml");
    // Priority 2: ./phaseforge.toml
    let local_config = Path::new("phaseforge.toml");

    let mut cfg = if home_config.exists() {
        load_from(&home_config)?
    } else if local_config.exists() {
        load_from(local_config)?
    } else {
        AppConfig::default()
    };

    if cfg
        .logging
        .directory
        .as_deref()
        .map(|s| s.trim().is_empty())
        .unwrap_or(true)
    {
        cfg.logging.directory = Some(data_dir.join("logs").to_string_lossy().to_string());
    }

    apply_env_overrides(&mut cfg, |key| std::env::var(key).ok())?;
    cfg.validate()?;
    Ok(cfg)
}

/// Environment overrides (highest priority). `lookup` is `std::env::var` in
/// production.
pub fn apply_env_overrides<F>(cfg: &mut AppConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(v) = get("PHASEFORGE_MODEL") {
        cfg.engine.model = v;
    }
    if let Some(v) = get("PHASEFORGE_MODE") {
        cfg.engine.mode = v.parse()?;
    }
    if let Some(v) = get("PHASEFORGE_ENDPOINT") {
        match &mut cfg.invoker {
            super::types::InvokerConfig::Http(http) => http.endpoint = v,
            other => {
                tracing::warn!(
                    invoker = other.kind(),
                    "PHASEFORGE_ENDPOINT ignored for non-http invoker"
                );
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ExecutionMode, InvokerConfig};
    use std::collections::HashMap;

    #[test]
    fn defaults_validate() {
        let cfg = AppConfig::default();
        cfg.validate().unwrap();
        assert_eq!(cfg.models.len(), 5);
        assert_eq!(cfg.selected_model().unwrap().timeout_secs, 600);
        assert_eq!(cfg.invoker.kind(), "http");
    }

    #[test]
    fn parses_command_invoker_and_custom_models() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[engine]
mode = "parallel"
model = "local"

[invoker]
kind = "command"
program = "llm"
args = ["-m", "local"]
timeout_secs = 30

[[models]]
id = "local"
name = "Local model"
timeout_secs = 120
"#,
        )
        .unwrap();

        let cfg = load_from(&path).unwrap();
        cfg.validate().unwrap();
        assert_eq!(cfg.engine.mode, ExecutionMode::Parallel);
        assert_eq!(cfg.selected_model().unwrap().backend_model(), "local");
        match cfg.invoker {
            InvokerConfig::Command(cmd) => {
                assert_eq!(cmd.program, "llm");
                assert_eq!(cmd.args, vec!["-m", "local"]);
                assert_eq!(cmd.timeout_secs, Some(30));
            }
            other => panic!("unexpected invoker {:?}", other),
        }
    }

    #[test]
    fn unknown_model_is_invalid() {
        let mut cfg = AppConfig::default();
        cfg.engine.model = "nope".into();
        assert!(matches!(cfg.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn env_overrides_win() {
        let env: HashMap<&str, &str> = [
            ("PHASEFORGE_MODEL", "minimax-m2"),
            ("PHASEFORGE_MODE", "Parallel"),
            ("PHASEFORGE_ENDPOINT", "http://gen.local/api"),
        ]
        .into_iter()
        .collect();

        let mut cfg = AppConfig::default();
        apply_env_overrides(&mut cfg, |k| env.get(k).map(|v| v.to_string())).unwrap();

        assert_eq!(cfg.engine.model, "minimax-m2");
        assert_eq!(cfg.engine.mode, ExecutionMode::Parallel);
        match cfg.invoker {
            InvokerConfig::Http(http) => assert_eq!(http.endpoint, "http://gen.local/api"),
            other => panic!("unexpected invoker {:?}", other),
        }
    }

    #[test]
    fn bad_mode_override_is_rejected() {
        let mut cfg = AppConfig::default();
        let err = apply_env_overrides(&mut cfg, |k| {
            (k == "PHASEFORGE_MODE").then(|| "sideways".to_string())
        })
        .unwrap_err();
        assert!(err.to_string().contains("sideways"));
    }

    #[test]
    fn malformed_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "engine = 3").unwrap();
        let err = load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Toml { .. }));
    }
}
