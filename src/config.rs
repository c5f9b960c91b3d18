use crate::number_formatter::{CurrencyPosition, FormatOptions};
use serde::Deserialize;
use std::path::{Path, PathBuf};

const ENV_PREFIX: &str = "MONEYSPEND";

#[derive(Debug, Clone, Default, Deserialize, Eq, PartialEq)]
#[serde(default)]
pub struct Config {
    pub store: StoreConfig,
    pub report: ReportConfig,
    pub formatting: FormattingConfig,
}

impl Config {
    /// Layers the global file, an explicit file and `MONEYSPEND_*` variables.
    /// Anything unreadable is reported and replaced by defaults.
    pub fn load(
        global_config_path: Option<impl AsRef<Path>>,
        config_path: Option<impl AsRef<Path>>,
    ) -> Self {
        let mut settings = config::Config::builder();

        if let Some(path) = global_config_path {
            settings = settings.add_source(config::File::from(path.as_ref()).required(false));
        }

        if let Some(path) = config_path {
            settings = settings.add_source(config::File::from(path.as_ref()).required(false));
        }

        settings = settings.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__"),
        );

        settings
            .build()
            .and_then(|settings| settings.try_deserialize::<Config>())
            .unwrap_or_else(|e| {
                eprintln!("Warning: Failed to load config: {e}");
                Config::default()
            })
    }

    /// `<config dir>/moneyspend/moneyspend.toml` on platforms that have one.
    pub fn global_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "moneyspend")
            .map(|dirs| dirs.config_dir().join("moneyspend.toml"))
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StoreConfig {
    /// Base URL of the database, e.g. `https://<project>.firebaseio.com`.
    pub url: Option<String>,
    pub auth: Option<String>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ReportConfig {
    pub output_dir: Option<PathBuf>,
    pub open_viewer: bool,
    pub check_permission: bool,
    pub viewer: Option<String>,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            output_dir: None,
            open_viewer: true,
            check_permission: true,
            viewer: None,
        }
    }
}

/// Display of amounts in listings and the TUI. The PDF always prints plain integers.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct FormattingConfig {
    pub currency_symbol: Option<String>,
    pub currency_position: Option<SymbolPlacement>,
    pub thousands_separator: char,
}

impl FormattingConfig {
    /// A symbol without a placement, or the reverse, shows no currency.
    pub fn format_options(&self) -> FormatOptions {
        let currency = self
            .currency_symbol
            .clone()
            .zip(self.currency_position)
            .map_or(CurrencyPosition::None, |(symbol, placement)| match placement {
                SymbolPlacement::Prefix => CurrencyPosition::Prefix(symbol),
                SymbolPlacement::Suffix => CurrencyPosition::Suffix(symbol),
            });

        FormatOptions {
            thousands_separator: self.thousands_separator,
            currency,
        }
    }
}

impl Default for FormattingConfig {
    fn default() -> Self {
        let defaults = FormatOptions::default();
        Self {
            currency_symbol: None,
            currency_position: None,
            thousands_separator: defaults.thousands_separator,
        }
    }
}

#[derive(Debug, Copy, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub enum SymbolPlacement {
    Prefix,
    Suffix,
}
