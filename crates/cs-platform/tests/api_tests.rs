//! Platform Integration Tests
//!
//! Registration, sessions, talk submission and moderation driven through the
//! services and the HTTP router on top of the in-memory store.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{header, Request, Response, StatusCode};
use chrono::{Duration, TimeZone, Utc};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use cs_platform::clock::FixedClock;
use cs_platform::domain::{
    AuditAction, DomainEvent, Lang, ModerationStatus, RegistrationForm, Role, RoleAssignment, Section,
    TalkDraft, TalkKind,
};
use cs_platform::mail::RecordingMailer;
use cs_platform::repository::Repositories;
use cs_platform::service::AuthContext;
use cs_platform::{Platform, PlatformConfig, PlatformError};

const PASSWORD: &str = "password1";

struct Harness {
    platform: Platform,
    mailer: Arc<RecordingMailer>,
    clock: Arc<FixedClock>,
}

fn harness_with(vars: &[(&str, &str)]) -> Harness {
    let mut all: Vec<(String, String)> = vec![
        ("JWT_SECRET".into(), "integration-secret".into()),
        ("ORGANIZER_EMAILS".into(), "Org@Conf.test".into()),
    ];
    all.extend(vars.iter().map(|(k, v)| (k.to_string(), v.to_string())));
    let config = PlatformConfig::from_lookup(|key| {
        all.iter().rev().find(|(k, _)| k == key).map(|(_, v)| v.clone())
    })
    .unwrap();

    let mailer = Arc::new(RecordingMailer::new());
    let clock = Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()));
    let platform = Platform::new(&config, Repositories::in_memory(), mailer.clone(), clock.clone());
    Harness { platform, mailer, clock }
}

fn harness() -> Harness {
    harness_with(&[])
}

fn draft(abstract_len: usize) -> TalkDraft {
    TalkDraft {
        section_id: None,
        title: "Dust crystals in RF discharge".into(),
        affiliation: "MIPT".into(),
        abstract_text: "ж".repeat(abstract_len),
        kind: "ORAL".into(),
        authors: json!([
            { "fullName": "Ivanov I.", "affiliation": "MIPT" },
            { "fullName": "Petrov P.", "affiliation": "JIHT RAS" }
        ]),
    }
}

fn registration_form() -> RegistrationForm {
    RegistrationForm {
        surname: "Petrova".into(),
        name: "Anna".into(),
        patronymic: "Sergeevna".into(),
        birth_date: "1995-07-01".into(),
        city: "Novosibirsk".into(),
        academic_degree: Some("PhD".into()),
        affiliation: "ITP SB RAS".into(),
        position: "Engineer".into(),
        phone: "+7 913 000 00 00".into(),
        postal_address: "Lavrentyev Ave 1".into(),
        consent_data_processing: true,
        consent_data_transfer: true,
    }
}

impl Harness {
    async fn register(&self, email: &str) -> Uuid {
        let (user, _) = self.platform.auth.register(email, PASSWORD, Lang::Ru).await.unwrap();
        user.id
    }

    async fn admin(&self) -> AuthContext {
        let id = self.register("admin@conf.test").await;
        self.platform
            .repos
            .users
            .assign_role(id, &RoleAssignment::global(Role::Admin))
            .await
            .unwrap();
        let issued = self.platform.auth.login("admin@conf.test", PASSWORD).await.unwrap();
        AuthContext {
            user_id: issued.user_id,
            roles: issued.roles,
        }
    }
}

mod auth_tests {
    use super::*;

    #[tokio::test]
    async fn test_register_once_per_email() {
        let h = harness();
        h.register("a@x.com").await;

        let err = h.platform.auth.register("A@X.com ", PASSWORD, Lang::Ru).await.unwrap_err();
        assert!(matches!(err, PlatformError::Duplicate { .. }));
    }

    #[tokio::test]
    async fn test_register_rejects_bad_input() {
        let h = harness();
        for (email, password) in [("not-an-email", PASSWORD), ("b@x.com", "short")] {
            let err = h.platform.auth.register(email, password, Lang::Ru).await.unwrap_err();
            assert!(matches!(err, PlatformError::Validation { .. }), "{} / {}", email, password);
        }
    }

    #[tokio::test]
    async fn test_welcome_email_is_sent_in_background() {
        let h = harness();
        let (_, event) = h.platform.auth.register("a@x.com", PASSWORD, Lang::En).await.unwrap();
        let handle = h.platform.notifier.dispatch(event).await.unwrap();
        handle.await.unwrap();

        let sent = h.mailer.sent_to("a@x.com");
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].subject, "Welcome!");
    }

    #[tokio::test]
    async fn test_login_scenario() {
        let h = harness();
        let admin = h.admin().await;
        let user_id = h.register("a@x.com").await;

        let issued = h.platform.auth.login("a@x.com", PASSWORD).await.unwrap();
        assert_eq!(issued.roles, vec![Role::User]);
        assert_eq!(issued.status, ModerationStatus::Waiting);

        let wrong = h.platform.auth.login("a@x.com", "wrong").await.unwrap_err();
        let unknown = h.platform.auth.login("nobody@x.com", PASSWORD).await.unwrap_err();
        assert!(matches!(wrong, PlatformError::Unauthorized { .. }));
        assert_eq!(wrong.to_string(), unknown.to_string());

        h.platform
            .moderation
            .set_user_status(&admin, user_id, ModerationStatus::Approved)
            .await
            .unwrap();
        let issued = h.platform.auth.login("a@x.com", PASSWORD).await.unwrap();
        assert!(issued.roles.contains(&Role::Participant));
    }

    #[tokio::test]
    async fn test_refresh_rotation_detects_replay() {
        let h = harness();
        let user_id = h.register("a@x.com").await;
        let first = h.platform.auth.login("a@x.com", PASSWORD).await.unwrap();

        let second = h.platform.auth.refresh(&first.refresh_token).await.unwrap();
        let claims = h.platform.tokens.verify_access_token(&second.access_token).unwrap();
        assert_eq!(claims.uid, user_id);

        let replay = h.platform.auth.refresh(&first.refresh_token).await.unwrap_err();
        assert!(matches!(replay, PlatformError::Unauthorized { .. }));

        let stored = h
            .platform
            .repos
            .sessions
            .find_by_hash(&cs_platform::service::hash_token(&first.refresh_token))
            .await
            .unwrap()
            .unwrap();
        assert!(stored.is_revoked());

        assert!(h.platform.auth.refresh(&second.refresh_token).await.is_ok());
    }

    #[tokio::test]
    async fn test_concurrent_refresh_has_one_winner() {
        let h = harness();
        let user_id = h.register("a@x.com").await;
        let issued = h.platform.auth.login("a@x.com", PASSWORD).await.unwrap();

        let (a, b) = tokio::join!(
            h.platform.auth.refresh(&issued.refresh_token),
            h.platform.auth.refresh(&issued.refresh_token)
        );
        assert_eq!([a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count(), 1);
        let (winner, loser) = if a.is_ok() { (a, b) } else { (b, a) };
        assert!(matches!(loser, Err(PlatformError::Unauthorized { .. })));
        assert_eq!(winner.unwrap().user_id, user_id);

        let replay = h.platform.auth.refresh(&issued.refresh_token).await;
        assert!(replay.is_err());
    }

    #[tokio::test]
    async fn test_register_stores_empty_profile() {
        let h = harness();
        let user_id = h.register("a@x.com").await;
        let profile = h.platform.repos.profiles.get(user_id).await.unwrap().unwrap();
        assert_eq!(profile.user_id, user_id);
        assert_eq!(profile.full_name(), "");
    }

    #[tokio::test]
    async fn test_refresh_rejects_expired_session() {
        let h = harness();
        h.register("a@x.com").await;
        let issued = h.platform.auth.login("a@x.com", PASSWORD).await.unwrap();

        h.clock.advance(Duration::days(31));
        let err = h.platform.auth.refresh(&issued.refresh_token).await.unwrap_err();
        assert!(matches!(err, PlatformError::Unauthorized { .. }));
    }

    #[tokio::test]
    async fn test_access_token_expires_with_clock() {
        let h = harness();
        h.register("a@x.com").await;
        let issued = h.platform.auth.login("a@x.com", PASSWORD).await.unwrap();
        assert!(h.platform.tokens.verify_access_token(&issued.access_token).is_ok());

        h.clock.advance(Duration::minutes(16));
        assert!(h.platform.tokens.verify_access_token(&issued.access_token).is_err());
    }

    #[tokio::test]
    async fn test_logout_revokes_and_is_idempotent() {
        let h = harness();
        h.register("a@x.com").await;
        let issued = h.platform.auth.login("a@x.com", PASSWORD).await.unwrap();

        h.platform.auth.logout(Some(&issued.refresh_token)).await.unwrap();
        h.platform.auth.logout(Some(&issued.refresh_token)).await.unwrap();
        h.platform.auth.logout(Some("unknown")).await.unwrap();
        h.platform.auth.logout(None).await.unwrap();

        assert!(h.platform.auth.refresh(&issued.refresh_token).await.is_err());
    }

    #[tokio::test]
    async fn test_email_verification_is_single_use() {
        let h = harness();
        let user_id = h.register("a@x.com").await;

        let raw = h.platform.auth.issue_email_verification(user_id).await.unwrap();
        h.platform.auth.verify_email(&raw).await.unwrap();
        let again = h.platform.auth.verify_email(&raw).await.unwrap_err();
        assert!(matches!(again, PlatformError::Validation { .. }));

        let raw = h.platform.auth.issue_email_verification(user_id).await.unwrap();
        h.clock.advance(Duration::hours(25));
        assert!(h.platform.auth.verify_email(&raw).await.is_err());
    }
}

mod talk_tests {
    use super::*;

    #[tokio::test]
    async fn test_abstract_length_bounds() {
        let h = harness();
        let speaker = h.register("s@x.com").await;

        for len in [249, 351] {
            let err = h.platform.talks.create(speaker, &draft(len)).await.unwrap_err();
            assert!(matches!(err, PlatformError::Validation { .. }), "length {}", len);
        }
        for len in [250, 350] {
            assert!(h.platform.talks.create(speaker, &draft(len)).await.is_ok(), "length {}", len);
        }
    }

    #[tokio::test]
    async fn test_speaker_quota() {
        let h = harness();
        let speaker = h.register("s@x.com").await;

        h.platform.talks.create(speaker, &draft(300)).await.unwrap();
        h.platform.talks.create(speaker, &draft(300)).await.unwrap();
        // two existing: the third still fits
        h.platform.talks.create(speaker, &draft(300)).await.unwrap();

        let err = h.platform.talks.create(speaker, &draft(300)).await.unwrap_err();
        assert!(matches!(err, PlatformError::TalkLimitReached { limit: 3 }));
        assert_eq!(h.platform.talks.list_mine(speaker).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_concurrent_creates_at_quota_edge() {
        let h = harness();
        let speaker = h.register("s@x.com").await;
        h.platform.talks.create(speaker, &draft(300)).await.unwrap();
        h.platform.talks.create(speaker, &draft(300)).await.unwrap();

        let (draft_a, draft_b) = (draft(300), draft(310));
        let (first, second) = tokio::join!(
            h.platform.talks.create(speaker, &draft_a),
            h.platform.talks.create(speaker, &draft_b)
        );
        let wins = [&first, &second].iter().filter(|r| r.is_ok()).count();
        assert_eq!(wins, 1);
        let loser = if first.is_ok() { second } else { first };
        assert!(matches!(loser, Err(PlatformError::TalkLimitReached { limit: 3 })));
        assert_eq!(h.platform.talks.list_mine(speaker).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_unknown_section_is_not_found() {
        let h = harness();
        let speaker = h.register("s@x.com").await;

        let mut submission = draft(300);
        submission.section_id = Some(Uuid::new_v4());
        let err = h.platform.talks.create(speaker, &submission).await.unwrap_err();
        assert!(matches!(err, PlatformError::NotFound { ref entity_type, .. } if entity_type == "Section"));
        assert!(h.platform.talks.list_mine(speaker).await.unwrap().is_empty());

        let talk = h.platform.talks.create(speaker, &draft(300)).await.unwrap();
        let err = h.platform.talks.update(speaker, talk.id, &submission).await.unwrap_err();
        assert!(matches!(err, PlatformError::NotFound { .. }));
        let stored = h.platform.talks.get_mine(speaker, talk.id).await.unwrap();
        assert_eq!(stored.section_id, None);
    }

    #[tokio::test]
    async fn test_validation_runs_before_quota() {
        let h = harness();
        let speaker = h.register("s@x.com").await;
        for _ in 0..3 {
            h.platform.talks.create(speaker, &draft(300)).await.unwrap();
        }
        let err = h.platform.talks.create(speaker, &draft(10)).await.unwrap_err();
        assert!(matches!(err, PlatformError::Validation { .. }));
    }

    #[tokio::test]
    async fn test_non_owner_cannot_edit_or_delete() {
        let h = harness();
        let owner = h.register("owner@x.com").await;
        let other = h.register("other@x.com").await;
        let talk = h.platform.talks.create(owner, &draft(300)).await.unwrap();

        let mut edit = draft(300);
        edit.title = "Hijacked".into();
        let err = h.platform.talks.update(other, talk.id, &edit).await.unwrap_err();
        assert!(matches!(err, PlatformError::Forbidden { .. }));

        let err = h.platform.talks.delete(other, talk.id).await.unwrap_err();
        assert!(matches!(err, PlatformError::Forbidden { .. }));

        let stored = h.platform.talks.get_mine(owner, talk.id).await.unwrap();
        assert_eq!(stored.title, talk.title);

        let err = h.platform.talks.delete(owner, Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, PlatformError::NotFound { .. }));
        h.platform.talks.delete(owner, talk.id).await.unwrap();
    }

    #[tokio::test]
    async fn test_edit_sends_talk_back_to_moderation() {
        let h = harness();
        let admin = h.admin().await;
        let speaker = h.register("s@x.com").await;
        let talk = h.platform.talks.create(speaker, &draft(300)).await.unwrap();

        h.platform
            .moderation
            .set_talk_status(&admin, talk.id, ModerationStatus::Approved)
            .await
            .unwrap();
        let updated = h.platform.talks.update(speaker, talk.id, &draft(320)).await.unwrap();
        assert_eq!(updated.status, ModerationStatus::Waiting);
    }

    #[tokio::test]
    async fn test_talk_decision_is_notified_once() {
        let h = harness();
        let admin = h.admin().await;
        let speaker = h.register("s@x.com").await;

        let talk = h.platform.talks.create(speaker, &draft(300)).await.unwrap();
        assert_eq!(talk.status, ModerationStatus::Waiting);
        assert_eq!(talk.kind, TalkKind::Oral);
        assert_eq!(talk.authors.len(), 2);

        for _ in 0..2 {
            if let Some(event) = h
                .platform
                .moderation
                .set_talk_status(&admin, talk.id, ModerationStatus::Approved)
                .await
                .unwrap()
            {
                h.platform.notifier.dispatch(event).await;
            }
        }

        let sent = h.mailer.sent_to("s@x.com");
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].subject, "Доклад одобрен / Talk approved");
    }

    #[tokio::test]
    async fn test_file_upload_notifies_section_responsibles() {
        let h = harness();
        let admin = h.admin().await;
        let speaker = h.register("s@x.com").await;
        let section = h
            .platform
            .moderation
            .create_section(&admin, "Пылевая плазма", "Dusty plasma", 1)
            .await
            .unwrap();
        h.platform
            .moderation
            .set_responsibles(&admin, section.id, &["Chair@Conf.test".to_string()])
            .await
            .unwrap();

        let mut submission = draft(300);
        submission.section_id = Some(section.id);
        let talk = h.platform.talks.create(speaker, &submission).await.unwrap();

        let event = h
            .platform
            .talks
            .set_file_url(speaker, talk.id, Some("https://files.conf.test/t.pdf"), Lang::En)
            .await
            .unwrap();
        match &event {
            DomainEvent::TalkFileUploaded { organizers, notice, .. } => {
                assert_eq!(organizers, &vec!["chair@conf.test".to_string()]);
                assert_eq!(notice.section_title.as_deref(), Some("Dusty plasma"));
            }
            other => panic!("unexpected event {:?}", other),
        }
        h.platform.notifier.dispatch(event).await;

        assert_eq!(h.mailer.sent_to("s@x.com")[0].subject, "Thesis uploaded");
        let chair = h.mailer.sent_to("chair@conf.test");
        assert_eq!(chair.len(), 1);
        assert!(chair[0].text.contains("https://files.conf.test/t.pdf"));
        assert!(h.mailer.sent_to("org@conf.test").is_empty());
    }

    #[tokio::test]
    async fn test_file_upload_falls_back_to_organizers() {
        let h = harness();
        let speaker = h.register("s@x.com").await;
        let talk = h.platform.talks.create(speaker, &draft(300)).await.unwrap();

        let event = h
            .platform
            .talks
            .set_file_url(speaker, talk.id, Some("https://files.conf.test/t.pdf"), Lang::Ru)
            .await
            .unwrap();
        h.platform.notifier.dispatch(event).await;

        let org = h.mailer.sent_to("org@conf.test");
        assert_eq!(org.len(), 1);
        assert!(org[0].subject.starts_with("Тезисы загружены (доклад)"));
    }

    #[tokio::test]
    async fn test_upload_without_url_reports_no_file() {
        let h = harness();
        let speaker = h.register("s@x.com").await;
        let talk = h.platform.talks.create(speaker, &draft(300)).await.unwrap();
        h.platform
            .talks
            .set_file_url(speaker, talk.id, Some("https://files.conf.test/old.pdf"), Lang::Ru)
            .await
            .unwrap();

        let event = h
            .platform
            .talks
            .set_file_url(speaker, talk.id, Some("  "), Lang::Ru)
            .await
            .unwrap();
        match &event {
            DomainEvent::TalkFileUploaded { notice, .. } => assert!(notice.file_url.is_none()),
            other => panic!("unexpected event {:?}", other),
        }
        h.platform.notifier.dispatch(event).await;

        let stored = h.platform.talks.get_mine(speaker, talk.id).await.unwrap();
        assert!(stored.file_url.is_none());
        let org = h.mailer.sent_to("org@conf.test");
        assert!(org.last().unwrap().text.contains("файл не загружен"));
    }
}

mod moderation_tests {
    use super::*;

    #[tokio::test]
    async fn test_user_decision_is_notified_once() {
        let h = harness();
        let admin = h.admin().await;
        let user_id = h.register("a@x.com").await;

        let first = h
            .platform
            .moderation
            .set_user_status(&admin, user_id, ModerationStatus::Approved)
            .await
            .unwrap();
        let second = h
            .platform
            .moderation
            .set_user_status(&admin, user_id, ModerationStatus::Approved)
            .await
            .unwrap();
        assert!(first.is_some());
        assert!(second.is_none());

        h.platform.notifier.dispatch(first.unwrap()).await;
        let sent = h.mailer.sent_to("a@x.com");
        assert_eq!(sent.len(), 1);
        assert!(sent[0].text.contains("--- English ---"));
    }

    #[tokio::test]
    async fn test_mail_failure_does_not_undo_decision() {
        let h = harness();
        let admin = h.admin().await;
        let user_id = h.register("a@x.com").await;
        h.mailer.set_failing(true);

        let event = h
            .platform
            .moderation
            .set_user_status(&admin, user_id, ModerationStatus::Rejected)
            .await
            .unwrap()
            .unwrap();
        h.platform.notifier.dispatch(event).await;

        let (user, _) = h.platform.auth.current_user(user_id).await.unwrap();
        assert_eq!(user.status, ModerationStatus::Rejected);
    }

    #[tokio::test]
    async fn test_section_admin_requires_existing_section() {
        let h = harness();
        let admin = h.admin().await;
        let user_id = h.register("a@x.com").await;

        let err = h
            .platform
            .moderation
            .assign_section_admin(&admin, user_id, Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, PlatformError::NotFound { .. }));

        let section = h.platform.moderation.create_section(&admin, "Секция", "", 0).await.unwrap();
        h.platform
            .moderation
            .assign_section_admin(&admin, user_id, section.id)
            .await
            .unwrap();
        let (_, roles) = h.platform.auth.current_user(user_id).await.unwrap();
        assert_eq!(roles, vec![Role::User, Role::SectionAdmin]);

        h.platform
            .moderation
            .remove_section_admin(&admin, user_id, section.id)
            .await
            .unwrap();
        let (_, roles) = h.platform.auth.current_user(user_id).await.unwrap();
        assert_eq!(roles, vec![Role::User]);
    }

    #[tokio::test]
    async fn test_repeated_section_admin_grant_is_noop() {
        let h = harness();
        let admin = h.admin().await;
        let user_id = h.register("a@x.com").await;
        let section = h.platform.moderation.create_section(&admin, "Секция", "", 0).await.unwrap();

        for _ in 0..2 {
            h.platform
                .moderation
                .assign_section_admin(&admin, user_id, section.id)
                .await
                .unwrap();
        }
        let grants = h
            .platform
            .moderation
            .recent_audit(None)
            .await
            .unwrap()
            .into_iter()
            .filter(|e| e.action == AuditAction::RoleAssigned)
            .count();
        assert_eq!(grants, 1);
    }

    #[tokio::test]
    async fn test_user_list_carries_profiles() {
        let h = harness();
        h.admin().await;
        let user_id = h.register("a@x.com").await;
        h.platform
            .registration
            .submit(user_id, registration_form(), Lang::Ru)
            .await
            .unwrap();

        let users = h.platform.moderation.list_users().await.unwrap();
        assert_eq!(users.len(), 2);
        let row = users.iter().find(|u| u.id == user_id).unwrap();
        assert_eq!(row.full_name, "Petrova Anna Sergeevna");
        assert_eq!(row.city, "Novosibirsk");
        assert_eq!(row.roles, vec![RoleAssignment::global(Role::User)]);
    }

    #[tokio::test]
    async fn test_admin_password_reset() {
        let h = harness();
        let admin = h.admin().await;
        let user_id = h.register("a@x.com").await;

        let password = h.platform.moderation.reset_password(&admin, user_id).await.unwrap();
        assert_eq!(password.chars().count(), 12);
        assert!(h.platform.auth.login("a@x.com", PASSWORD).await.is_err());
        assert!(h.platform.auth.login("a@x.com", &password).await.is_ok());

        let err = h
            .platform
            .moderation
            .reset_password(&admin, Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, PlatformError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_responsibles_are_capped() {
        let h = harness();
        let admin = h.admin().await;
        let section = h.platform.moderation.create_section(&admin, "Секция", "", 0).await.unwrap();

        let four: Vec<String> = (1..=4).map(|i| format!("r{}@x.com", i)).collect();
        let err = h
            .platform
            .moderation
            .set_responsibles(&admin, section.id, &four)
            .await
            .unwrap_err();
        assert!(matches!(err, PlatformError::Validation { .. }));

        let emails = vec![" R1@x.com".to_string(), "r1@x.com".to_string(), "r2@x.com".to_string()];
        let saved = h
            .platform
            .moderation
            .set_responsibles(&admin, section.id, &emails)
            .await
            .unwrap();
        assert_eq!(saved, vec!["r1@x.com".to_string(), "r2@x.com".to_string()]);
    }

    #[tokio::test]
    async fn test_admin_actions_are_audited() {
        let h = harness();
        let admin = h.admin().await;
        let user_id = h.register("a@x.com").await;
        h.platform
            .moderation
            .set_user_status(&admin, user_id, ModerationStatus::Approved)
            .await
            .unwrap();

        let entries = h.platform.moderation.recent_audit(None).await.unwrap();
        let target = user_id.to_string();
        assert!(entries
            .iter()
            .any(|e| e.entity_id.as_deref() == Some(target.as_str()) && e.actor_id == Some(admin.user_id)));
    }

    #[tokio::test]
    async fn test_talk_list_filters() {
        let h = harness();
        let speaker = h.register("s@x.com").await;
        let section = Section::new("Секция", "Section", 0);
        h.platform.repos.sections.create(&section).await.unwrap();

        let mut plenary = draft(300);
        plenary.kind = "PLENARY".into();
        plenary.section_id = Some(section.id);
        h.platform.talks.create(speaker, &plenary).await.unwrap();
        h.platform.talks.create(speaker, &draft(300)).await.unwrap();

        let all = h.platform.moderation.list_talks(&Default::default()).await.unwrap();
        assert_eq!(all.len(), 2);

        let filter = cs_platform::domain::TalkFilter {
            section_id: Some(section.id),
            only_plenary: true,
            status: None,
        };
        let filtered = h.platform.moderation.list_talks(&filter).await.unwrap();
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].section_title_en.as_deref(), Some("Section"));
    }
}

mod registration_tests {
    use super::*;

    #[tokio::test]
    async fn test_submit_mails_applicant_and_organizers() {
        let h = harness();
        let user_id = h.register("a@x.com").await;

        let event = h
            .platform
            .registration
            .submit(user_id, registration_form(), Lang::En)
            .await
            .unwrap();
        h.platform.notifier.dispatch(event).await;

        let profile = h.platform.repos.profiles.get(user_id).await.unwrap().unwrap();
        assert_eq!(profile.postal_address, "Lavrentyev Ave 1");
        assert!(profile.consent_data_processing && profile.consent_data_transfer);
        assert_eq!(profile.birth_date.map(|d| d.to_string()).as_deref(), Some("1995-07-01"));

        assert_eq!(h.mailer.sent_to("a@x.com")[0].subject, "Application received");
        let org = h.mailer.sent_to("org@conf.test");
        assert_eq!(org.len(), 1);
        assert_eq!(org[0].subject, "New application");
        assert!(org[0].text.contains("Petrova Anna Sergeevna"));
        assert!(org[0].text.contains("a@x.com"));
    }

    #[tokio::test]
    async fn test_submit_requires_consents_and_waiting_status() {
        let h = harness();
        let admin = h.admin().await;
        let user_id = h.register("a@x.com").await;

        let mut form = registration_form();
        form.consent_data_processing = false;
        let err = h.platform.registration.submit(user_id, form, Lang::Ru).await.unwrap_err();
        assert!(matches!(err, PlatformError::Validation { .. }));
        assert_eq!(h.platform.repos.profiles.get(user_id).await.unwrap().unwrap().surname, "");

        h.platform
            .moderation
            .set_user_status(&admin, user_id, ModerationStatus::Approved)
            .await
            .unwrap();
        let err = h
            .platform
            .registration
            .submit(user_id, registration_form(), Lang::Ru)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("already processed"));
    }

    #[tokio::test]
    async fn test_public_program_and_participants() {
        let h = harness();
        let admin = h.admin().await;
        let approved = h.register("a@x.com").await;
        let waiting = h.register("b@x.com").await;
        for id in [approved, waiting] {
            h.platform
                .registration
                .submit(id, registration_form(), Lang::Ru)
                .await
                .unwrap();
        }
        h.platform
            .moderation
            .set_user_status(&admin, approved, ModerationStatus::Approved)
            .await
            .unwrap();

        let accepted = h.platform.talks.create(approved, &draft(300)).await.unwrap();
        h.platform.talks.create(approved, &draft(300)).await.unwrap();
        h.platform
            .moderation
            .set_talk_status(&admin, accepted.id, ModerationStatus::Approved)
            .await
            .unwrap();

        let program = h.platform.moderation.public_program().await.unwrap();
        assert_eq!(program.len(), 1);
        assert_eq!(program[0].id, accepted.id);
        assert_eq!(program[0].speaker_full_name, "Petrova Anna Sergeevna");

        let participants = h.platform.moderation.public_participants().await.unwrap();
        assert_eq!(participants.len(), 1);
        assert_eq!(participants[0].affiliation, "ITP SB RAS");
    }
}

mod http_tests {
    use super::*;

    fn json_request(method: &str, uri: &str, body: Value, cookie: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().method("GET").uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        builder.body(Body::empty()).unwrap()
    }

    fn cookie_pair(response: &Response<Body>, name: &str) -> Option<String> {
        response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .find(|v| v.starts_with(&format!("{}=", name)))
            .map(|v| v.split(';').next().unwrap_or_default().to_string())
    }

    async fn body_json(response: Response<Body>) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn login(h: &Harness, email: &str) -> (String, String) {
        let response = h
            .platform
            .router()
            .oneshot(json_request("POST", "/auth/login", json!({ "email": email, "password": PASSWORD }), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        (
            cookie_pair(&response, "access_token").unwrap(),
            cookie_pair(&response, "refresh_token").unwrap(),
        )
    }

    #[tokio::test]
    async fn test_health() {
        let h = harness();
        let response = h.platform.router().oneshot(get("/health", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["status"], "UP");
    }

    #[tokio::test]
    async fn test_register_and_login_set_cookies() {
        let h = harness();
        let response = h
            .platform
            .router()
            .oneshot(json_request(
                "POST",
                "/auth/register?lang=en",
                json!({ "email": "a@x.com", "password": PASSWORD }),
                None,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = h
            .platform
            .router()
            .oneshot(json_request("POST", "/auth/login", json!({ "email": "a@x.com", "password": PASSWORD }), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let raw_cookie = response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .find(|v| v.starts_with("access_token="))
            .unwrap()
            .to_string();
        assert!(raw_cookie.contains("HttpOnly"));
        assert!(raw_cookie.contains("SameSite=Lax"));
        assert!(raw_cookie.contains("Path=/"));
        assert!(raw_cookie.contains("Max-Age=900"));
        assert!(!raw_cookie.contains("Secure"));

        let body = body_json(response).await;
        assert_eq!(body["email"], "a@x.com");
        assert_eq!(body["status"], "WAITING");
        assert_eq!(body["roles"], json!(["USER"]));
    }

    #[tokio::test]
    async fn test_duplicate_register_is_conflict() {
        let h = harness();
        h.register("a@x.com").await;
        let response = h
            .platform
            .router()
            .oneshot(json_request("POST", "/auth/register", json!({ "email": "a@x.com", "password": PASSWORD }), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_wrong_password_is_unauthorized() {
        let h = harness();
        h.register("a@x.com").await;
        let response = h
            .platform
            .router()
            .oneshot(json_request("POST", "/auth/login", json!({ "email": "a@x.com", "password": "nope" }), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(response).await["message"], "Unauthorized");
    }

    #[tokio::test]
    async fn test_me_with_cookie_or_bearer() {
        let h = harness();
        h.register("a@x.com").await;
        let (access, _) = login(&h, "a@x.com").await;

        let response = h.platform.router().oneshot(get("/me", Some(&access))).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["email"], "a@x.com");

        let token = access.trim_start_matches("access_token=");
        let request = Request::builder()
            .uri("/me")
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .body(Body::empty())
            .unwrap();
        let response = h.platform.router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = h.platform.router().oneshot(get("/me", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_refresh_cookie_rotation() {
        let h = harness();
        h.register("a@x.com").await;
        let (_, refresh) = login(&h, "a@x.com").await;

        let response = h
            .platform
            .router()
            .oneshot(json_request("POST", "/auth/refresh", json!({}), Some(&refresh)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let rotated = cookie_pair(&response, "refresh_token").unwrap();
        assert_ne!(rotated, refresh);

        let replay = h
            .platform
            .router()
            .oneshot(json_request("POST", "/auth/refresh", json!({}), Some(&refresh)))
            .await
            .unwrap();
        assert_eq!(replay.status(), StatusCode::UNAUTHORIZED);

        let missing = h
            .platform
            .router()
            .oneshot(json_request("POST", "/auth/refresh", json!({}), None))
            .await
            .unwrap();
        assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_logout_always_succeeds_and_clears_cookies() {
        let h = harness();
        let response = h
            .platform
            .router()
            .oneshot(json_request("POST", "/auth/logout", json!({}), Some("refresh_token=bogus")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(cookie_pair(&response, "access_token").as_deref(), Some("access_token="));
        assert_eq!(cookie_pair(&response, "refresh_token").as_deref(), Some("refresh_token="));
    }

    #[tokio::test]
    async fn test_talk_lifecycle_over_http() {
        let h = harness();
        h.register("s@x.com").await;
        let (access, _) = login(&h, "s@x.com").await;

        let body = json!({
            "title": "Plasma crystals",
            "affiliation": "MIPT",
            "abstract": "ж".repeat(300),
            "kind": "POSTER",
            "authors": [{ "fullName": "Ivanov I.", "affiliation": "MIPT" }]
        });
        let response = h
            .platform
            .router()
            .oneshot(json_request("POST", "/participant/talks", body.clone(), Some(&access)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let id = body_json(response).await["id"].as_str().unwrap().to_string();

        let response = h
            .platform
            .router()
            .oneshot(get(&format!("/participant/talks/{}", id), Some(&access)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let talk = body_json(response).await;
        assert_eq!(talk["status"], "WAITING");
        assert_eq!(talk["kind"], "POSTER");

        let response = h
            .platform
            .router()
            .oneshot(json_request("PUT", &format!("/participant/talks/{}", id), body, Some(&access)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["success"], true);

        let response = h
            .platform
            .router()
            .oneshot(json_request(
                "POST",
                &format!("/participant/talks/{}/file", id),
                json!({ "fileUrl": "https://files.conf.test/t.pdf" }),
                Some(&access),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(h.mailer.sent_to("s@x.com")[0].subject, "Загружены тезисы");

        let request = Request::builder()
            .method("DELETE")
            .uri(format!("/participant/talks/{}", id))
            .header(header::COOKIE, &access)
            .body(Body::empty())
            .unwrap();
        let response = h.platform.router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_short_abstract_is_bad_request() {
        let h = harness();
        h.register("s@x.com").await;
        let (access, _) = login(&h, "s@x.com").await;

        let body = json!({
            "title": "Plasma",
            "affiliation": "MIPT",
            "abstract": "too short",
            "kind": "ORAL",
            "authors": [{ "fullName": "A", "affiliation": "B" }]
        });
        let response = h
            .platform
            .router()
            .oneshot(json_request("POST", "/participant/talks", body, Some(&access)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"], "INVALID_INPUT");
    }

    #[tokio::test]
    async fn test_admin_routes_require_admin_role() {
        let h = harness();
        let user_id = h.register("a@x.com").await;
        let (access, _) = login(&h, "a@x.com").await;

        let response = h.platform.router().oneshot(get("/admin/users", Some(&access))).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = h.platform.router().oneshot(get("/admin/users", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        h.admin().await;
        let (admin_access, _) = login(&h, "admin@conf.test").await;
        let response = h
            .platform
            .router()
            .oneshot(json_request(
                "PATCH",
                &format!("/admin/users/{}/status", user_id),
                json!({ "status": "APPROVED" }),
                Some(&admin_access),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(h.mailer.sent_to("a@x.com").len(), 1);

        let response = h
            .platform
            .router()
            .oneshot(json_request(
                "PATCH",
                &format!("/admin/users/{}/status", user_id),
                json!({ "status": "MAYBE" }),
                Some(&admin_access),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_public_sections() {
        let h = harness();
        let admin = h.admin().await;
        h.platform.moderation.create_section(&admin, "Секция", "Section", 2).await.unwrap();

        let response = h.platform.router().oneshot(get("/sections", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let sections = body_json(response).await;
        assert_eq!(sections[0]["titleEn"], "Section");
    }

    #[tokio::test]
    async fn test_register_rate_limit() {
        let h = harness_with(&[("REGISTER_RATE_PER_MIN", "1"), ("REGISTER_RATE_BURST", "1")]);
        let router = h.platform.router();

        let first = router
            .clone()
            .oneshot(json_request("POST", "/auth/register", json!({ "email": "a@x.com", "password": PASSWORD }), None))
            .await
            .unwrap();
        assert_eq!(first.status(), StatusCode::OK);

        let second = router
            .oneshot(json_request("POST", "/auth/register", json!({ "email": "b@x.com", "password": PASSWORD }), None))
            .await
            .unwrap();
        assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    fn from_peer(mut request: Request<Body>, peer: [u8; 4], forwarded_for: Option<&str>) -> Request<Body> {
        request
            .extensions_mut()
            .insert(ConnectInfo(SocketAddr::from((peer, 40000))));
        if let Some(value) = forwarded_for {
            request
                .headers_mut()
                .insert("x-forwarded-for", value.parse().unwrap());
        }
        request
    }

    #[tokio::test]
    async fn test_rotating_forwarded_for_does_not_bypass_limit() {
        let h = harness_with(&[("REGISTER_RATE_PER_MIN", "1"), ("REGISTER_RATE_BURST", "1")]);
        let router = h.platform.router();

        let mut statuses = Vec::new();
        for i in 0..5 {
            let request = from_peer(
                json_request(
                    "POST",
                    "/auth/register",
                    json!({ "email": format!("u{}@x.com", i), "password": PASSWORD }),
                    None,
                ),
                [198, 51, 100, 7],
                Some(&format!("203.0.113.{}", i + 1)),
            );
            statuses.push(router.clone().oneshot(request).await.unwrap().status());
        }
        assert_eq!(statuses[0], StatusCode::OK);
        assert!(statuses[1..].iter().all(|s| *s == StatusCode::TOO_MANY_REQUESTS), "{:?}", statuses);
    }

    #[tokio::test]
    async fn test_forwarded_for_honoured_behind_trusted_proxy() {
        let h = harness_with(&[
            ("REGISTER_RATE_PER_MIN", "1"),
            ("REGISTER_RATE_BURST", "1"),
            ("TRUSTED_PROXIES", "10.0.0.2"),
        ]);
        let router = h.platform.router();

        for (i, client) in ["203.0.113.1", "203.0.113.2"].iter().enumerate() {
            let request = from_peer(
                json_request(
                    "POST",
                    "/auth/register",
                    json!({ "email": format!("u{}@x.com", i), "password": PASSWORD }),
                    None,
                ),
                [10, 0, 0, 2],
                Some(client),
            );
            assert_eq!(router.clone().oneshot(request).await.unwrap().status(), StatusCode::OK);
        }

        let repeat = from_peer(
            json_request("POST", "/auth/register", json!({ "email": "u9@x.com", "password": PASSWORD }), None),
            [10, 0, 0, 2],
            Some("203.0.113.1"),
        );
        assert_eq!(router.oneshot(repeat).await.unwrap().status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[tokio::test]
    async fn test_registration_submit_over_http() {
        let h = harness();
        h.register("a@x.com").await;
        let (access, _) = login(&h, "a@x.com").await;

        let form = serde_json::to_value(registration_form()).unwrap();
        let response = h
            .platform
            .router()
            .oneshot(json_request("POST", "/registration/submit?lang=en", form.clone(), Some(&access)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["success"], true);
        assert_eq!(h.mailer.sent_to("a@x.com")[0].subject, "Application received");

        let response = h
            .platform
            .router()
            .oneshot(get("/participant/profile", Some(&access)))
            .await
            .unwrap();
        let profile = body_json(response).await;
        assert_eq!(profile["birthDate"], "1995-07-01");
        assert_eq!(profile["consentDataTransfer"], true);

        let mut missing = form;
        missing["consentDataTransfer"] = json!(false);
        let response = h
            .platform
            .router()
            .oneshot(json_request("POST", "/registration/submit", missing, Some(&access)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = h
            .platform
            .router()
            .oneshot(json_request("POST", "/registration/submit", json!({}), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_program_and_participants_are_public() {
        let h = harness();
        let admin = h.admin().await;
        let speaker = h.register("s@x.com").await;
        h.platform
            .registration
            .submit(speaker, registration_form(), Lang::Ru)
            .await
            .unwrap();
        h.platform
            .moderation
            .set_user_status(&admin, speaker, ModerationStatus::Approved)
            .await
            .unwrap();
        let talk = h.platform.talks.create(speaker, &draft(300)).await.unwrap();

        let response = h.platform.router().oneshot(get("/program", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!([]));

        h.platform
            .moderation
            .set_talk_status(&admin, talk.id, ModerationStatus::Approved)
            .await
            .unwrap();
        let program = body_json(h.platform.router().oneshot(get("/program", None)).await.unwrap()).await;
        assert_eq!(program[0]["title"], talk.title);

        let response = h.platform.router().oneshot(get("/participants", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await,
            json!([{ "fullName": "Petrova Anna Sergeevna", "affiliation": "ITP SB RAS", "city": "Novosibirsk" }])
        );
    }

    #[tokio::test]
    async fn test_admin_reset_password_over_http() {
        let h = harness();
        let user_id = h.register("a@x.com").await;
        let (user_access, _) = login(&h, "a@x.com").await;
        let request = json!({ "userId": user_id });

        let response = h
            .platform
            .router()
            .oneshot(json_request("POST", "/admin/users/reset-password", request.clone(), Some(&user_access)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        h.admin().await;
        let (admin_access, _) = login(&h, "admin@conf.test").await;
        let response = h
            .platform
            .router()
            .oneshot(json_request("POST", "/admin/users/reset-password", request, Some(&admin_access)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let password = body_json(response).await["password"].as_str().unwrap().to_string();

        let response = h
            .platform
            .router()
            .oneshot(json_request("POST", "/auth/login", json!({ "email": "a@x.com", "password": password }), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_file_upload_without_url_over_http() {
        let h = harness();
        let speaker = h.register("s@x.com").await;
        let talk = h.platform.talks.create(speaker, &draft(300)).await.unwrap();
        let (access, _) = login(&h, "s@x.com").await;

        let response = h
            .platform
            .router()
            .oneshot(json_request(
                "POST",
                &format!("/participant/talks/{}/file?lang=en", talk.id),
                json!({}),
                Some(&access),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let org = h.mailer.sent_to("org@conf.test");
        assert!(org[0].text.contains("no file uploaded"));
    }
}
