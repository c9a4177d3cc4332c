use dashmap::DashMap;
use std::env;
use std::sync::Arc;

/// Fields that are never flashed back into the session.
pub const DONT_FLASH: [&str; 2] = ["password", "password_confirmation"];

/// Configuration service
#[derive(Clone, Default)]
pub struct ConfigService {
    config: Arc<DashMap<String, String>>,
}

impl ConfigService {
    /// Seeded from the process environment.
    pub fn new() -> Self {
        let service = Self::default();
        for (key, value) in env::vars() {
            service.set(&key, &value);
        }
        service
    }

    /// An empty service, for tests and explicit setups.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.config.get(key).map(|v| v.clone())
    }

    pub fn set(&self, key: &str, value: &str) {
        self.config.insert(key.to_string(), value.to_string());
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).map(|value| {
            matches!(
                value.trim().to_ascii_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            )
        })
    }

    /// A comma-separated value split into trimmed, non-empty entries.
    pub fn get_list(&self, key: &str) -> Vec<String> {
        self.get(key)
            .map(|value| {
                value
                    .split(',')
                    .map(str::trim)
                    .filter(|entry| !entry.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Editors the debug page can link source locations to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Editor {
    VsCode,
    Sublime,
    Idea,
    /// A URL template with `%file` and `%line` placeholders.
    Custom(String),
}

impl Editor {
    pub fn parse(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "vscode" => Editor::VsCode,
            "sublime" => Editor::Sublime,
            "idea" | "phpstorm" => Editor::Idea,
            _ => Editor::Custom(name.trim().to_string()),
        }
    }

    pub fn link(&self, file: &str, line: u32) -> String {
        match self {
            Editor::VsCode => format!("vscode://file/{}:{}", file, line),
            Editor::Sublime => format!("subl://open?url=file://{}&line={}", file, line),
            Editor::Idea => format!("idea://open?file={}&line={}", file, line),
            Editor::Custom(template) => template
                .replace("%file", file)
                .replace("%line", &line.to_string()),
        }
    }
}

/// Behaviour switches for the exception handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerSettings {
    /// Expose full diagnostic detail in responses.
    pub debug: bool,
    /// Where unauthenticated page requests are sent.
    pub login_url: String,
    pub dont_flash: Vec<String>,
    /// Input keys masked on the debug page.
    pub debug_blacklist: Vec<String>,
    pub editor: Option<Editor>,
}

impl Default for HandlerSettings {
    fn default() -> Self {
        Self {
            debug: false,
            login_url: "/login".to_string(),
            dont_flash: DONT_FLASH.iter().map(|f| f.to_string()).collect(),
            debug_blacklist: Vec::new(),
            editor: None,
        }
    }
}

impl HandlerSettings {
    /// Reads `APP_DEBUG`, `APP_LOGIN_URL`, `APP_EDITOR`, `APP_DEBUG_BLACKLIST`
    /// and `APP_DONT_FLASH`. Missing keys keep their defaults.
    pub fn from_config(config: &ConfigService) -> Self {
        let mut settings = Self::default();

        if let Some(debug) = config.get_bool("APP_DEBUG") {
            settings.debug = debug;
        }
        if let Some(login_url) = config.get("APP_LOGIN_URL") {
            settings.login_url = login_url;
        }
        settings.editor = config.get("APP_EDITOR").map(|name| Editor::parse(&name));
        settings.debug_blacklist = config.get_list("APP_DEBUG_BLACKLIST");
        for field in config.get_list("APP_DONT_FLASH") {
            settings.add_dont_flash(field);
        }

        settings
    }

    pub fn add_dont_flash(&mut self, field: impl Into<String>) {
        let field = field.into();
        if !self.dont_flash.contains(&field) {
            self.dont_flash.push(field);
        }
    }

    pub fn is_dont_flash(&self, key: &str) -> bool {
        self.dont_flash.iter().any(|field| field == key)
    }

    pub fn is_blacklisted(&self, key: &str) -> bool {
        self.debug_blacklist
            .iter()
            .any(|entry| entry.eq_ignore_ascii_case(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = HandlerSettings::default();
        assert!(!settings.debug);
        assert_eq!(settings.login_url, "/login");
        assert_eq!(settings.dont_flash, vec!["password", "password_confirmation"]);
    }

    #[test]
    fn test_from_config() {
        let config = ConfigService::empty();
        config.set("APP_DEBUG", "true");
        config.set("APP_LOGIN_URL", "/auth/login");
        config.set("APP_EDITOR", "vscode");
        config.set("APP_DEBUG_BLACKLIST", "api_key, secret ,");
        config.set("APP_DONT_FLASH", "card_number,password");

        let settings = HandlerSettings::from_config(&config);
        assert!(settings.debug);
        assert_eq!(settings.login_url, "/auth/login");
        assert_eq!(settings.editor, Some(Editor::VsCode));
        assert_eq!(settings.debug_blacklist, vec!["api_key", "secret"]);
        assert_eq!(
            settings.dont_flash,
            vec!["password", "password_confirmation", "card_number"]
        );
        assert!(settings.is_blacklisted("API_KEY"));
    }

    #[test]
    fn test_debug_flag_values() {
        let config = ConfigService::empty();
        config.set("APP_DEBUG", "0");
        assert_eq!(config.get_bool("APP_DEBUG"), Some(false));
        config.set("APP_DEBUG", "On");
        assert_eq!(config.get_bool("APP_DEBUG"), Some(true));
        assert_eq!(config.get_bool("MISSING"), None);
    }

    #[test]
    fn test_editor_links() {
        assert_eq!(
            Editor::VsCode.link("/app/src/main.rs", 12),
            "vscode://file//app/src/main.rs:12"
        );
        assert_eq!(
            Editor::parse("myeditor://%file@%line").link("a.rs", 3),
            "myeditor://a.rs@3"
        );
    }
}
