//! Leg descriptions for the supported locales

use std::str::FromStr;

use crate::ledger::types::Wallet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Locale {
    #[default]
    En,
    /// Indonesian
    Id,
}

impl Locale {
    /// Lenient parse of a language tag (`en`, `en-US`, `id_ID`, ...).
    /// Unknown tags fall back to English.
    pub fn from_tag(tag: &str) -> Self {
        tag.parse().unwrap_or_default()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Locale::En => "en",
            Locale::Id => "id",
        }
    }

    pub fn wallet_name(&self, wallet: Wallet) -> &'static str {
        match (self, wallet) {
            (Locale::En, Wallet::Bank) => "bank",
            (Locale::En, Wallet::Cash) => "cash",
            (Locale::Id, Wallet::Bank) => "bank",
            (Locale::Id, Wallet::Cash) => "tunai",
        }
    }

    /// Expense-leg description naming the destination
    pub fn outgoing(&self, destination: &str) -> String {
        match self {
            Locale::En => format!("Transfer to {destination}"),
            Locale::Id => format!("Transfer ke {destination}"),
        }
    }

    /// Income-leg description naming the source
    pub fn incoming(&self, source: &str) -> String {
        match self {
            Locale::En => format!("Transfer from {source}"),
            Locale::Id => format!("Transfer dari {source}"),
        }
    }
}

impl FromStr for Locale {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let primary = s
            .split(['-', '_'])
            .next()
            .unwrap_or_default()
            .trim()
            .to_lowercase();
        match primary.as_str() {
            "en" => Ok(Locale::En),
            "id" | "in" => Ok(Locale::Id),
            _ => Err(()),
        }
    }
}
