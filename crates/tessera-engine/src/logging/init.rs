use std::sync::Once;

/// Logger configuration.
///
/// `env_filter` uses the `env_logger` filter syntax, for example
/// `"info"` or `"tessera_engine=trace,wgpu=warn"`.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub env_filter: Option<String>,
    pub write_style: env_logger::WriteStyle,
    /// Prefix each record with its module path.
    pub module_path: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            env_filter: None,
            write_style: env_logger::WriteStyle::Auto,
            module_path: true,
        }
    }
}

static INIT: Once = Once::new();

/// Installs `env_logger` as the global logger.
///
/// Filter precedence: `config.env_filter`, then `RUST_LOG`, then `info`.
/// Only the first call has an effect. If another logger was installed first,
/// the error is swallowed and the existing logger stays active.
pub fn init_logging(config: LoggingConfig) {
    INIT.call_once(|| {
        let mut builder = env_logger::Builder::new();

        match config.env_filter {
            Some(filter) => {
                builder.parse_filters(&filter);
            }
            None => match std::env::var("RUST_LOG") {
                Ok(filter) => {
                    builder.parse_filters(&filter);
                }
                Err(_) => {
                    builder.filter_level(log::LevelFilter::Info);
                }
            },
        }

        builder
            .write_style(config.write_style)
            .format_module_path(config.module_path);

        if builder.try_init().is_ok() {
            log::debug!("logging initialized");
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_is_idempotent() {
        init_logging(LoggingConfig {
            env_filter: Some("tessera_engine=trace".into()),
            ..LoggingConfig::default()
        });
        // Second call is ignored rather than panicking on a double install.
        init_logging(LoggingConfig::default());
        log::trace!("still alive");
    }
}
