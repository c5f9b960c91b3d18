pub trait NumberFormatter {
    fn format(&self, options: &FormatOptions) -> String;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CurrencyPosition {
    None,
    Prefix(String),
    Suffix(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatOptions {
    pub thousands_separator: char,
    pub currency: CurrencyPosition,
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self {
            thousands_separator: '\u{a0}', // Non-breaking space
            currency: CurrencyPosition::None,
        }
    }
}

impl NumberFormatter for u64 {
    fn format(&self, options: &FormatOptions) -> String {
        let digits = self.to_string();
        let mut formatted = String::with_capacity(digits.len() + digits.len() / 3);
        for (i, ch) in digits.chars().enumerate() {
            if i > 0 && (digits.len() - i) % 3 == 0 {
                formatted.push(options.thousands_separator);
            }
            formatted.push(ch);
        }

        match &options.currency {
            CurrencyPosition::Prefix(symbol) => format!("{symbol}{formatted}"),
            CurrencyPosition::Suffix(symbol) => format!("{formatted}{symbol}"),
            CurrencyPosition::None => formatted,
        }
    }
}
