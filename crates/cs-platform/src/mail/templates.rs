//! Notification Templates
//!
//! Russian is the primary language. Moderation decisions go out in both
//! languages in one message; the rest follow the request language.

use crate::domain::{Lang, ModerationStatus, TalkUploadNotice};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedMail {
    pub subject: String,
    pub html: String,
    pub text: String,
}

/// Escape text for inclusion in HTML bodies.
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&#34;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[derive(Debug, Clone)]
pub struct Templates {
    app_url: String,
}

impl Templates {
    pub fn new(app_url: impl Into<String>) -> Self {
        Self { app_url: app_url.into() }
    }

    pub fn welcome(&self, lang: Lang) -> RenderedMail {
        let (subject, line) = match lang {
            Lang::Ru => (
                "Добро пожаловать!",
                "Спасибо за регистрацию на сайте конференции. Ваша заявка передана в оргкомитет на рассмотрение.",
            ),
            Lang::En => (
                "Welcome!",
                "Thank you for registering on the conference website. Your application has been passed to the organizing committee for review.",
            ),
        };
        RenderedMail {
            subject: subject.to_string(),
            html: format!(
                "<p>{}</p><p><a href=\"{}\">{}</a></p>",
                escape_html(line),
                escape_html(&self.app_url),
                escape_html(&self.app_url)
            ),
            text: format!("{}\n\n{}", line, self.app_url),
        }
    }

    /// Receipt for a submitted registration form.
    pub fn registration_received(&self, lang: Lang) -> RenderedMail {
        let (subject, line) = match lang {
            Lang::Ru => (
                "Заявка получена",
                "Ваша заявка на участие в конференции получена. Мы сообщим о решении оргкомитета по почте.",
            ),
            Lang::En => (
                "Application received",
                "Your application to participate in the conference has been received. We will email you the committee's decision.",
            ),
        };
        RenderedMail {
            subject: subject.to_string(),
            html: format!("<p>{}</p>", escape_html(line)),
            text: line.to_string(),
        }
    }

    /// Organizer notice about a new application.
    pub fn org_new_registration(
        &self,
        lang: Lang,
        full_name: &str,
        affiliation: &str,
        city: &str,
        email: &str,
    ) -> RenderedMail {
        let (subject, labels) = match lang {
            Lang::Ru => ("Новая заявка", ["ФИО", "Организация", "Город", "Email"]),
            Lang::En => ("New application", ["Full name", "Affiliation", "City", "Email"]),
        };
        let values = [full_name.trim(), affiliation.trim(), city.trim(), email.trim()];

        let text = labels
            .iter()
            .zip(values)
            .map(|(label, value)| format!("{}: {}", label, value))
            .collect::<Vec<_>>()
            .join("\n");
        let html = labels
            .iter()
            .zip(values)
            .map(|(label, value)| format!("<p><strong>{}:</strong> {}</p>", label, escape_html(value)))
            .collect::<String>();

        RenderedMail {
            subject: subject.to_string(),
            html,
            text,
        }
    }

    /// Bilingual application decision. `None` for WAITING.
    pub fn user_status(&self, status: ModerationStatus) -> Option<RenderedMail> {
        let (subject, ru, en) = match status {
            ModerationStatus::Approved => (
                "Заявка одобрена / Application approved",
                "Ваша заявка на участие в конференции одобрена.",
                "Your application to participate in the conference has been approved.",
            ),
            ModerationStatus::Rejected => (
                "Заявка отклонена / Application rejected",
                "Ваша заявка на участие в конференции отклонена.",
                "Your application to participate in the conference has been rejected.",
            ),
            ModerationStatus::Waiting => return None,
        };
        Some(RenderedMail {
            subject: subject.to_string(),
            html: format!(
                "<p>{}</p><hr><p><strong>English</strong></p><p>{}</p>",
                escape_html(ru),
                escape_html(en)
            ),
            text: format!("{}\n\n--- English ---\n{}", ru, en),
        })
    }

    /// Bilingual talk decision. `None` for WAITING.
    pub fn talk_status(&self, title: &str, status: ModerationStatus) -> Option<RenderedMail> {
        let (subject, verb_ru, verb_en) = match status {
            ModerationStatus::Approved => ("Доклад одобрен / Talk approved", "одобрен", "approved"),
            ModerationStatus::Rejected => ("Доклад отклонен / Talk rejected", "отклонен", "rejected"),
            ModerationStatus::Waiting => return None,
        };
        let ru = |t: &str| format!("Ваш доклад «{}» {} программным комитетом.", t, verb_ru);
        let en = |t: &str| format!("Your talk \"{}\" was {} by the program committee.", t, verb_en);
        let safe = escape_html(title);
        Some(RenderedMail {
            subject: subject.to_string(),
            html: format!("<p>{}</p><hr><p>{}</p>", ru(&safe), en(&safe)),
            text: format!("{}\n\n{}", ru(title), en(title)),
        })
    }

    /// Acknowledgement to the speaker after a thesis upload.
    pub fn talk_file_uploaded(&self, lang: Lang, title: &str) -> RenderedMail {
        let (subject, line) = match lang {
            Lang::Ru => ("Загружены тезисы", format!("Тезисы к докладу «{}» загружены.", title.trim())),
            Lang::En => ("Thesis uploaded", format!("The thesis for your talk \"{}\" has been uploaded.", title.trim())),
        };
        RenderedMail {
            subject: subject.to_string(),
            html: format!("<p>{}</p>", escape_html(&line)),
            text: line,
        }
    }

    /// Notice to section responsibles or organizers after a thesis upload.
    pub fn organizer_talk_file_uploaded(&self, lang: Lang, notice: &TalkUploadNotice) -> RenderedMail {
        let labels = match lang {
            Lang::Ru => OrgLabels {
                subject: "Тезисы загружены (доклад)",
                title: "Название доклада",
                kind: "Формат",
                section: "Секция",
                abstract_text: "Аннотация",
                file: "Файл тезиса",
                authors: "Авторы",
                speaker: "Докладчик",
                no_file: "файл не загружен",
                no_section: "не указана",
            },
            Lang::En => OrgLabels {
                subject: "Thesis uploaded (talk)",
                title: "Talk title",
                kind: "Format",
                section: "Section",
                abstract_text: "Abstract",
                file: "Thesis file",
                authors: "Authors",
                speaker: "Speaker",
                no_file: "no file uploaded",
                no_section: "not assigned",
            },
        };

        let title = notice.title.trim();
        let speaker = speaker_line(notice);
        let section = notice.section_title.as_deref().unwrap_or(labels.no_section);
        let file_html = match notice.file_url.as_deref().map(str::trim).filter(|u| !u.is_empty()) {
            Some(url) => format!("<a href=\"{0}\">{0}</a>", escape_html(url)),
            None => escape_html(labels.no_file),
        };
        let file_text = notice
            .file_url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .unwrap_or(labels.no_file);

        let text = format!(
            "{}: {}\n{}: {}\n{}: {}\n{}:\n{}\n\n{}: {}\n{}: {}\n{}: {}",
            labels.title, title,
            labels.kind, notice.kind,
            labels.section, section,
            labels.abstract_text, notice.abstract_text.trim(),
            labels.file, file_text,
            labels.authors, notice.authors_line,
            labels.speaker, speaker,
        );
        let html = format!(
            "<p><strong>{}:</strong> {}</p><p><strong>{}:</strong> {}</p><p><strong>{}:</strong> {}</p>\
             <p><strong>{}:</strong><br>{}</p><p><strong>{}:</strong> {}</p>\
             <p><strong>{}:</strong> {}</p><p><strong>{}:</strong> {}</p>",
            labels.title, escape_html(title),
            labels.kind, notice.kind,
            labels.section, escape_html(section),
            labels.abstract_text, escape_html(notice.abstract_text.trim()),
            labels.file, file_html,
            labels.authors, escape_html(&notice.authors_line),
            labels.speaker, escape_html(&speaker),
        );

        RenderedMail {
            subject: format!("{}: {}", labels.subject, title),
            html,
            text,
        }
    }
}

struct OrgLabels {
    subject: &'static str,
    title: &'static str,
    kind: &'static str,
    section: &'static str,
    abstract_text: &'static str,
    file: &'static str,
    authors: &'static str,
    speaker: &'static str,
    no_file: &'static str,
    no_section: &'static str,
}

/// "Full Name (Affiliation, City)", skipping empty parts.
fn speaker_line(notice: &TalkUploadNotice) -> String {
    let details: Vec<&str> = [notice.speaker_affiliation.trim(), notice.speaker_city.trim()]
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect();
    if details.is_empty() {
        notice.speaker_full_name.trim().to_string()
    } else {
        format!("{} ({})", notice.speaker_full_name.trim(), details.join(", "))
    }
}
