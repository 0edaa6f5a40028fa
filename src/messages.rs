//! User-facing fallback messages
//!
//! Stores show the server's `message` when it sends one. These strings are
//! used when it doesn't (network failures, empty error bodies).

use std::fmt;

/// Language for fallback messages
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Locale {
    #[default]
    En,
    Ru,
}

impl Locale {
    /// Parse locale string from config; unknown values fall back to English
    pub fn from_str(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "ru" | "ru-ru" | "ru_ru" => Self::Ru,
            _ => Self::En,
        }
    }

    /// Convert to string for TOML serialization
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::En => "en",
            Self::Ru => "ru",
        }
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which operation failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Message {
    LoginFailed,
    RegisterFailed,
    SessionSaveFailed,
    DefectsLoadFailed,
    DefectLoadFailed,
    DefectCreateFailed,
    DefectStatusFailed,
    CommentsLoadFailed,
    CommentAddFailed,
    AttachmentUploadFailed,
    ProjectsLoadFailed,
    ProjectCreateFailed,
}

impl Message {
    pub fn text(self, locale: Locale) -> &'static str {
        match locale {
            Locale::En => self.en(),
            Locale::Ru => self.ru(),
        }
    }

    fn en(self) -> &'static str {
        match self {
            Self::LoginFailed => "Could not sign in. Check your credentials.",
            Self::RegisterFailed => "Could not complete registration.",
            Self::SessionSaveFailed => "Could not save the session on this device.",
            Self::DefectsLoadFailed => "Could not load the defect list",
            Self::DefectLoadFailed => "Could not load the defect",
            Self::DefectCreateFailed => "Could not create the defect",
            Self::DefectStatusFailed => "Could not change the defect status",
            Self::CommentsLoadFailed => "Could not load comments",
            Self::CommentAddFailed => "Could not add the comment",
            Self::AttachmentUploadFailed => "Could not upload the file",
            Self::ProjectsLoadFailed => "Could not load the project list",
            Self::ProjectCreateFailed => "Could not create the project",
        }
    }

    fn ru(self) -> &'static str {
        match self {
            Self::LoginFailed => "Не удалось войти. Проверьте данные.",
            Self::RegisterFailed => "Не удалось выполнить регистрацию.",
            Self::SessionSaveFailed => "Не удалось сохранить сессию на этом устройстве.",
            Self::DefectsLoadFailed => "Не удалось загрузить список дефектов",
            Self::DefectLoadFailed => "Не удалось загрузить дефект",
            Self::DefectCreateFailed => "Не удалось создать дефект",
            Self::DefectStatusFailed => "Не удалось изменить статус дефекта",
            Self::CommentsLoadFailed => "Не удалось получить комментарии",
            Self::CommentAddFailed => "Не удалось добавить комментарий",
            Self::AttachmentUploadFailed => "Не удалось загрузить файл",
            Self::ProjectsLoadFailed => "Не удалось загрузить список проектов",
            Self::ProjectCreateFailed => "Не удалось создать проект",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locale_parsing() {
        assert_eq!(Locale::from_str("ru"), Locale::Ru);
        assert_eq!(Locale::from_str("RU-ru"), Locale::Ru);
        assert_eq!(Locale::from_str("en"), Locale::En);
        assert_eq!(Locale::from_str("klingon"), Locale::En);
        assert_eq!(Locale::Ru.to_string(), "ru");
    }

    #[test]
    fn test_messages_are_localized() {
        assert_eq!(
            Message::LoginFailed.text(Locale::Ru),
            "Не удалось войти. Проверьте данные."
        );
        assert_ne!(
            Message::DefectsLoadFailed.text(Locale::En),
            Message::DefectsLoadFailed.text(Locale::Ru)
        );
    }
}
