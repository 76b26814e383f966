//! CLI 配置
//!
//! 日志配置：全局级别加上每个加载组件的可选级别

use beepy_config::Component;
use tracing::Level;

/// CLI 日志配置
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub global: Level,
    pub resolver: Option<Level>,
    pub gateway: Option<Level>,
    pub loader: Option<Level>,
    pub bootstrap: Option<Level>,
    pub reload: Option<Level>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            global: Level::INFO,
            resolver: None,
            gateway: None,
            loader: None,
            bootstrap: None,
            reload: None,
        }
    }
}

impl LogConfig {
    /// Get log level for a specific component
    pub fn level_for(&self, component: Component) -> Level {
        let level = match component {
            Component::Resolver => self.resolver,
            Component::Gateway => self.gateway,
            Component::Loader => self.loader,
            Component::Bootstrap => self.bootstrap,
            Component::Reload => self.reload,
        };
        level.unwrap_or(self.global)
    }

    /// Parse a spec like `info,gateway=debug,reload=trace`
    ///
    /// A bare level sets the global level; `component=level` overrides one
    /// component.
    pub fn parse(spec: &str) -> Result<Self, String> {
        let mut config = Self::default();
        for part in spec.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            match part.split_once('=') {
                None => config.global = parse_log_level(part)?,
                Some((name, level)) => {
                    let component = Component::ALL
                        .into_iter()
                        .find(|c| c.as_str() == name.trim())
                        .ok_or_else(|| format!("未知组件 '{}'", name.trim()))?;
                    let level = Some(parse_log_level(level)?);
                    match component {
                        Component::Resolver => config.resolver = level,
                        Component::Gateway => config.gateway = level,
                        Component::Loader => config.loader = level,
                        Component::Bootstrap => config.bootstrap = level,
                        Component::Reload => config.reload = level,
                    }
                }
            }
        }
        Ok(config)
    }
}

/// Parse log level string
fn parse_log_level(s: &str) -> Result<Level, String> {
    match s.trim().to_lowercase().as_str() {
        "silent" => Ok(Level::ERROR), // silent = only errors
        "error" => Ok(Level::ERROR),
        "warn" => Ok(Level::WARN),
        "info" => Ok(Level::INFO),
        "debug" => Ok(Level::DEBUG),
        "trace" => Ok(Level::TRACE),
        other => Err(format!("无效的日志级别 '{}'", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_only() {
        let config = LogConfig::parse("debug").unwrap();
        assert_eq!(config.global, Level::DEBUG);
        assert_eq!(config.level_for(Component::Gateway), Level::DEBUG);
    }

    #[test]
    fn test_component_override() {
        let config = LogConfig::parse("warn, gateway=trace,reload=info").unwrap();
        assert_eq!(config.level_for(Component::Gateway), Level::TRACE);
        assert_eq!(config.level_for(Component::Reload), Level::INFO);
        assert_eq!(config.level_for(Component::Loader), Level::WARN);
    }

    #[test]
    fn test_silent_is_error() {
        assert_eq!(LogConfig::parse("silent").unwrap().global, Level::ERROR);
    }

    #[test]
    fn test_invalid_spec() {
        assert!(LogConfig::parse("loud").is_err());
        assert!(LogConfig::parse("vm=debug").is_err());
    }
}
