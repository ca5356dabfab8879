//! Language tags and bilingual UI label templates.
//!
//! The core only ever stores a [`Language`] tag; formatted strings are
//! resolved by the presentation layer at render time via [`label`].

use serde::{Deserialize, Serialize};

/// Supported interface languages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    Ru,
}

impl Language {
    /// Parse a language tag such as `"en"` or `"ru"`.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "en" => Some(Language::En),
            "ru" => Some(Language::Ru),
            _ => None,
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Ru => "ru",
        }
    }
}

/// The closed set of user-facing label templates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiLabel {
    Placeholder,
    Thinking,
    NewChat,
    SelectChat,
    DeleteChat,
    ClearChat,
    ExportChat,
    ImportChat,
    SendFailed,
}

/// Resolve a label template for a language.
pub fn label(lang: Language, label: UiLabel) -> &'static str {
    match (lang, label) {
        (Language::En, UiLabel::Placeholder) => "Enter your message...",
        (Language::Ru, UiLabel::Placeholder) => "Введите ваше сообщение...",
        (Language::En, UiLabel::Thinking) => "Thinking...",
        (Language::Ru, UiLabel::Thinking) => "Думаю...",
        (Language::En, UiLabel::NewChat) => "New Chat",
        (Language::Ru, UiLabel::NewChat) => "Новый чат",
        (Language::En, UiLabel::SelectChat) => "Select Chat",
        (Language::Ru, UiLabel::SelectChat) => "Выбрать чат",
        (Language::En, UiLabel::DeleteChat) => "Delete Chat",
        (Language::Ru, UiLabel::DeleteChat) => "Удалить чат",
        (Language::En, UiLabel::ClearChat) => "Clear Chat",
        (Language::Ru, UiLabel::ClearChat) => "Очистить чат",
        (Language::En, UiLabel::ExportChat) => "Export Chat",
        (Language::Ru, UiLabel::ExportChat) => "Экспорт чата",
        (Language::En, UiLabel::ImportChat) => "Import Chat",
        (Language::Ru, UiLabel::ImportChat) => "Импорт чата",
        (Language::En, UiLabel::SendFailed) => "Message failed to send",
        (Language::Ru, UiLabel::SendFailed) => "Не удалось отправить сообщение",
    }
}

/// The default system prompt for a language.
pub fn system_prompt(lang: Language) -> &'static str {
    match lang {
        Language::En => "You are a helpful AI assistant.",
        Language::Ru => {
            "Я - полезный ИИ-ассистент. Я говорю по-русски и стараюсь помогать людям."
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_tag_accepts_known_tags() {
        assert_eq!(Language::from_tag("en"), Some(Language::En));
        assert_eq!(Language::from_tag("RU"), Some(Language::Ru));
        assert_eq!(Language::from_tag(" en "), Some(Language::En));
        assert_eq!(Language::from_tag("de"), None);
        assert_eq!(Language::from_tag(""), None);
    }

    #[test]
    fn tag_roundtrip() {
        for lang in [Language::En, Language::Ru] {
            assert_eq!(Language::from_tag(lang.tag()), Some(lang));
        }
    }

    #[test]
    fn serde_uses_lowercase_tags() {
        assert_eq!(serde_json::to_string(&Language::En).unwrap(), "\"en\"");
        assert_eq!(
            serde_json::from_str::<Language>("\"ru\"").unwrap(),
            Language::Ru
        );
    }

    #[test]
    fn every_label_resolves_in_both_languages() {
        let labels = [
            UiLabel::Placeholder,
            UiLabel::Thinking,
            UiLabel::NewChat,
            UiLabel::SelectChat,
            UiLabel::DeleteChat,
            UiLabel::ClearChat,
            UiLabel::ExportChat,
            UiLabel::ImportChat,
            UiLabel::SendFailed,
        ];
        for l in labels {
            assert!(!label(Language::En, l).is_empty());
            assert!(!label(Language::Ru, l).is_empty());
        }
    }

    #[test]
    fn system_prompt_differs_per_language() {
        assert_ne!(system_prompt(Language::En), system_prompt(Language::Ru));
    }
}
