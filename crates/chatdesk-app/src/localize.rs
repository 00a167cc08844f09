// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde::{Deserialize, Serialize};

pub const KEY_GENERAL: &str = "com_ui_general";
pub const KEY_ASSIGN_PROJECT: &str = "com_ui_assign_project";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Locale {
    #[default]
    En,
    De,
    Es,
    Fr,
}

impl Locale {
    pub const ALL: [Self; 4] = [Self::En, Self::De, Self::Es, Self::Fr];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::En => "en",
            Self::De => "de",
            Self::Es => "es",
            Self::Fr => "fr",
        }
    }

    /// Accepts bare languages and regional tags such as `de-AT` or `fr_CA`.
    pub fn parse(value: &str) -> Option<Self> {
        let language = value
            .trim()
            .split(['-', '_', '.'])
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase();
        match language.as_str() {
            "en" => Some(Self::En),
            "de" => Some(Self::De),
            "es" => Some(Self::Es),
            "fr" => Some(Self::Fr),
            _ => None,
        }
    }

    const fn table(self) -> &'static [(&'static str, &'static str)] {
        match self {
            Self::En => &[
                (KEY_GENERAL, "General"),
                (KEY_ASSIGN_PROJECT, "Assign to project"),
            ],
            Self::De => &[
                (KEY_GENERAL, "Allgemein"),
                (KEY_ASSIGN_PROJECT, "Projekt zuweisen"),
            ],
            Self::Es => &[
                (KEY_GENERAL, "General"),
                (KEY_ASSIGN_PROJECT, "Asignar a proyecto"),
            ],
            Self::Fr => &[
                (KEY_GENERAL, "Général"),
                (KEY_ASSIGN_PROJECT, "Attribuer à un projet"),
            ],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Localizer {
    locale: Locale,
}

impl Localizer {
    pub const fn new(locale: Locale) -> Self {
        Self { locale }
    }

    pub const fn locale(&self) -> Locale {
        self.locale
    }

    /// Looks `key` up in the active locale, then English, then echoes the key.
    pub fn localize(&self, key: &str) -> String {
        lookup(self.locale, key)
            .or_else(|| lookup(Locale::En, key))
            .unwrap_or(key)
            .to_owned()
    }
}

fn lookup(locale: Locale, key: &str) -> Option<&'static str> {
    locale
        .table()
        .iter()
        .find(|(candidate, _)| *candidate == key)
        .map(|(_, text)| *text)
}
