//! Query parameters understood by the extranet and the usage report produced
//! from the Internet > Traffic page.
//!
//! Every page of the extranet is served by `index.php` and selected through
//! query parameters:
//!
//! | Parameter | Values |
//! |-----------|--------|
//! | `content` | `profil`, `internet`, `telephonie`, `television`, `facturation` |
//! | `sub`     | depends on `content`, e.g. `traffic` under `internet` |
//! | `lang`    | `fra`, `eng` |
//! | `logout`  | `1` ends the session |
//!
//! The types below model those values so that a page request can only be
//! built from combinations the extranet actually serves.

use chrono::{DateTime, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Query key selecting the top-level page.
pub const CONTENT_KEY: &str = "content";
/// Query key selecting the sub page.
pub const SUB_KEY: &str = "sub";
/// Query key selecting the language.
pub const LANG_KEY: &str = "lang";
/// Query pair that ends the session.
pub const LOGOUT: (&str, &str) = ("logout", "1");

/// Display language of the extranet pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Lang {
    Fra,
    #[default]
    Eng,
}

impl Lang {
    pub fn as_param(self) -> &'static str {
        match self {
            Lang::Fra => "fra",
            Lang::Eng => "eng",
        }
    }
}

/// Top-level page of the extranet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Page {
    Home,
    Profile,
    #[default]
    Internet,
    Phone,
    Television,
    Invoicing,
}

impl Page {
    /// Value of the `content` parameter; the home page has none.
    pub fn as_param(self) -> Option<&'static str> {
        match self {
            Page::Home => None,
            Page::Profile => Some("profil"),
            Page::Internet => Some("internet"),
            Page::Phone => Some("telephonie"),
            Page::Television => Some("television"),
            Page::Invoicing => Some("facturation"),
        }
    }
}

/// Sub page of one of the top-level pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SubPage {
    Address,
    Password,
    Notifications,
    #[value(name = "internetusage")]
    InternetUsage,
    Email,
    Wireless,
    #[value(name = "longdistance")]
    LongDistance,
    Voicemail,
    #[value(name = "calltransfer")]
    CallTransfer,
}

impl SubPage {
    /// Value of the `sub` parameter.
    pub fn as_param(self) -> &'static str {
        match self {
            SubPage::Address => "profil",
            SubPage::Password => "password",
            SubPage::Notifications => "notifications",
            SubPage::InternetUsage => "traffic",
            SubPage::Email => "email",
            SubPage::Wireless => "wireless",
            SubPage::LongDistance => "interurbain",
            SubPage::Voicemail => "voicemail",
            SubPage::CallTransfer => "call_transfer",
        }
    }

    /// The top-level page this sub page lives under.
    pub fn page(self) -> Page {
        match self {
            SubPage::Address | SubPage::Password | SubPage::Notifications => Page::Profile,
            SubPage::InternetUsage | SubPage::Email | SubPage::Wireless => Page::Internet,
            SubPage::LongDistance | SubPage::Voicemail | SubPage::CallTransfer => Page::Phone,
        }
    }
}

/// Parameters selecting one extranet page.
///
/// A sub page always wins over `page`: asking for the e-mail sub page of the
/// profile page yields the Internet > E-mail page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ContentParams {
    pub page: Page,
    pub sub_page: Option<SubPage>,
    pub lang: Option<Lang>,
}

impl ContentParams {
    pub fn page(page: Page) -> Self {
        Self {
            page,
            ..Self::default()
        }
    }

    pub fn sub_page(sub_page: SubPage) -> Self {
        Self {
            page: sub_page.page(),
            sub_page: Some(sub_page),
            lang: None,
        }
    }

    /// The Internet > Traffic page. Always requested in English since the
    /// usage labels are matched in English.
    pub fn internet_traffic() -> Self {
        Self::sub_page(SubPage::InternetUsage).with_lang(Lang::Eng)
    }

    pub fn with_lang(mut self, lang: Lang) -> Self {
        self.lang = Some(lang);
        self
    }

    /// Ordered query pairs. `default_lang` is used when no language was set.
    pub fn query_pairs(&self, default_lang: Lang) -> Vec<(&'static str, &'static str)> {
        let page = self.sub_page.map(SubPage::page).unwrap_or(self.page);
        let mut pairs = Vec::with_capacity(3);
        if let Some(content) = page.as_param() {
            pairs.push((CONTENT_KEY, content));
        }
        if let Some(sub) = self.sub_page {
            pairs.push((SUB_KEY, sub.as_param()));
        }
        pairs.push((LANG_KEY, self.lang.unwrap_or(default_lang).as_param()));
        pairs
    }
}

/// Data usage scraped from the Internet > Traffic page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageReport {
    /// Remaining data, e.g. `"60.3 Gb"`.
    pub available: Option<String>,
    /// Data used so far in the billing period.
    pub used: Option<String>,
    pub retrieved_at: DateTime<Utc>,
}
