//! Default rules for user documents.
//!
//! `evaluate` looks at a document's current fields and returns only the
//! paths that still need a value. It never fails and never coerces data it
//! does not recognize: a scalar where a nested map is expected simply
//! suppresses the nested defaults for that container.

use crate::users::model::{Container, FieldMap, FieldValue};
use crate::users::patch::{Patch, PatchValue};

pub const CREATED_AT: &str = "createdAt";
pub const UPDATED_AT: &str = "updatedAt";
pub const LAST_ACTIVE_AT: &str = "lastActiveAt";
pub const LAST_AGENT_RUN_AT: &str = "lastAgentRunAt";
pub const SETTINGS: &str = "settings";
pub const PROGRESS_SUMMARY: &str = "progressSummary";

/// Defaults for `settings.*`.
pub fn settings_defaults() -> [(&'static str, FieldValue); 3] {
    [
        ("theme", FieldValue::from("system")),
        ("notificationsEnabled", FieldValue::Boolean(true)),
        ("voiceEnabled", FieldValue::Boolean(true)),
    ]
}

/// Defaults for `progressSummary.*`.
pub fn progress_summary_defaults() -> [(&'static str, FieldValue); 3] {
    [
        ("currentStage", FieldValue::from("exploring")),
        ("streakDays", FieldValue::Integer(0)),
        ("lastSessionAt", FieldValue::Null),
    ]
}

/// Compute the sparse patch of missing defaults for one document.
pub fn evaluate(fields: &FieldMap) -> Patch {
    let mut patch = Patch::new();

    if !fields.contains_key(CREATED_AT) {
        patch.set(CREATED_AT, PatchValue::ServerTimestamp);
    }

    // Unlike every other rule, an existing timestamp is overwritten too, so a
    // second run touches `updatedAt` on every document again.
    if needs_updated_at(fields.get(UPDATED_AT)) {
        patch.set(UPDATED_AT, PatchValue::ServerTimestamp);
    }

    if !fields.contains_key(LAST_ACTIVE_AT) {
        patch.set(LAST_ACTIVE_AT, PatchValue::ServerTimestamp);
    }

    if !fields.contains_key(LAST_AGENT_RUN_AT) {
        patch.set(LAST_AGENT_RUN_AT, FieldValue::Null);
    }

    set_nested_defaults(
        &mut patch,
        SETTINGS,
        Container::classify(fields.get(SETTINGS)),
        settings_defaults(),
    );
    set_nested_defaults(
        &mut patch,
        PROGRESS_SUMMARY,
        Container::classify(fields.get(PROGRESS_SUMMARY)),
        progress_summary_defaults(),
    );

    patch
}

fn needs_updated_at(current: Option<&FieldValue>) -> bool {
    matches!(current, None | Some(FieldValue::Timestamp(_)))
}

fn set_nested_defaults<const N: usize>(
    patch: &mut Patch,
    container_key: &str,
    container: Container<'_>,
    defaults: [(&'static str, FieldValue); N],
) {
    if !container.accepts_defaults() {
        return;
    }
    for (key, value) in defaults {
        if !container.has_key(key) {
            patch.set(format!("{container_key}.{key}"), value);
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Utc};

    use super::*;
    use crate::users::model::UserDocument;

    fn ts() -> DateTime<Utc> {
        "2025-06-01T12:00:00Z".parse().unwrap()
    }

    fn map(pairs: &[(&str, FieldValue)]) -> FieldValue {
        FieldValue::Map(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        )
    }

    fn complete_settings() -> FieldValue {
        map(&[
            ("theme", "dark".into()),
            ("notificationsEnabled", false.into()),
            ("voiceEnabled", false.into()),
        ])
    }

    fn complete_progress() -> FieldValue {
        map(&[
            ("currentStage", "reflecting".into()),
            ("streakDays", FieldValue::Integer(12)),
            ("lastSessionAt", ts().into()),
        ])
    }

    /// Every recognized field present; `updatedAt` stored as a non-timestamp
    /// so the touch rule does not fire.
    fn complete_doc() -> UserDocument {
        UserDocument::new("u1")
            .with_field(CREATED_AT, ts())
            .with_field(UPDATED_AT, "2025-06-01T12:00:00Z")
            .with_field(LAST_ACTIVE_AT, ts())
            .with_field(LAST_AGENT_RUN_AT, FieldValue::Null)
            .with_field(SETTINGS, complete_settings())
            .with_field(PROGRESS_SUMMARY, complete_progress())
    }

    #[test]
    fn complete_document_yields_empty_patch() {
        let patch = evaluate(&complete_doc().fields);
        assert!(patch.is_empty(), "unexpected paths: {:?}", patch.paths().collect::<Vec<_>>());
    }

    #[test]
    fn empty_document_gets_every_default() {
        let patch = evaluate(&FieldMap::new());

        assert_eq!(patch.len(), 10);
        assert_eq!(patch.get(CREATED_AT), Some(&PatchValue::ServerTimestamp));
        assert_eq!(patch.get(UPDATED_AT), Some(&PatchValue::ServerTimestamp));
        assert_eq!(patch.get(LAST_ACTIVE_AT), Some(&PatchValue::ServerTimestamp));
        assert_eq!(
            patch.get(LAST_AGENT_RUN_AT),
            Some(&PatchValue::Value(FieldValue::Null))
        );
        assert_eq!(
            patch.get("settings.theme"),
            Some(&PatchValue::Value("system".into()))
        );
        assert_eq!(
            patch.get("settings.notificationsEnabled"),
            Some(&PatchValue::Value(true.into()))
        );
        assert_eq!(
            patch.get("settings.voiceEnabled"),
            Some(&PatchValue::Value(true.into()))
        );
        assert_eq!(
            patch.get("progressSummary.currentStage"),
            Some(&PatchValue::Value("exploring".into()))
        );
        assert_eq!(
            patch.get("progressSummary.streakDays"),
            Some(&PatchValue::Value(FieldValue::Integer(0)))
        );
        assert_eq!(
            patch.get("progressSummary.lastSessionAt"),
            Some(&PatchValue::Value(FieldValue::Null))
        );
    }

    #[test]
    fn missing_created_at_gets_server_time() {
        let mut doc = complete_doc();
        doc.fields.remove(CREATED_AT);

        let patch = evaluate(&doc.fields);
        assert_eq!(patch.len(), 1);
        assert_eq!(patch.get(CREATED_AT), Some(&PatchValue::ServerTimestamp));
    }

    #[test]
    fn existing_created_at_of_any_type_is_kept() {
        let doc = complete_doc().with_field(CREATED_AT, FieldValue::Null);
        assert!(!evaluate(&doc.fields).contains(CREATED_AT));
    }

    #[test]
    fn timestamp_updated_at_is_touched_again() {
        let doc = complete_doc().with_field(UPDATED_AT, ts());

        let patch = evaluate(&doc.fields);
        assert_eq!(patch.len(), 1);
        assert_eq!(patch.get(UPDATED_AT), Some(&PatchValue::ServerTimestamp));
    }

    #[test]
    fn non_timestamp_updated_at_is_kept() {
        for value in [FieldValue::Null, FieldValue::Integer(1_700_000_000)] {
            let doc = complete_doc().with_field(UPDATED_AT, value);
            assert!(!evaluate(&doc.fields).contains(UPDATED_AT));
        }
    }

    #[test]
    fn missing_last_agent_run_at_is_explicit_null() {
        let mut doc = complete_doc();
        doc.fields.remove(LAST_AGENT_RUN_AT);

        let patch = evaluate(&doc.fields);
        assert_eq!(
            patch.get(LAST_AGENT_RUN_AT),
            Some(&PatchValue::Value(FieldValue::Null))
        );
    }

    #[test]
    fn partial_settings_only_fills_missing_keys() {
        let doc = complete_doc().with_field(SETTINGS, map(&[("theme", "dark".into())]));

        let patch = evaluate(&doc.fields);
        assert!(!patch.contains("settings.theme"));
        assert!(patch.contains("settings.notificationsEnabled"));
        assert!(patch.contains("settings.voiceEnabled"));
        assert_eq!(patch.len(), 2);
    }

    #[test]
    fn scalar_settings_suppresses_nested_defaults() {
        let doc = complete_doc().with_field(SETTINGS, "disabled");

        let patch = evaluate(&doc.fields);
        assert!(patch.paths().all(|p| !p.starts_with("settings.")));
        assert!(patch.is_empty());
    }

    #[test]
    fn array_containers_get_every_nested_default() {
        let doc = complete_doc()
            .with_field(SETTINGS, FieldValue::Array(vec![]))
            .with_field(
                PROGRESS_SUMMARY,
                FieldValue::Array(vec!["currentStage".into()]),
            );

        let patch = evaluate(&doc.fields);
        assert_eq!(
            patch.paths().collect::<Vec<_>>(),
            vec![
                "progressSummary.currentStage",
                "progressSummary.lastSessionAt",
                "progressSummary.streakDays",
                "settings.notificationsEnabled",
                "settings.theme",
                "settings.voiceEnabled",
            ]
        );
    }

    #[test]
    fn null_progress_summary_gets_all_defaults() {
        let doc = complete_doc().with_field(PROGRESS_SUMMARY, FieldValue::Null);

        let patch = evaluate(&doc.fields);
        assert_eq!(
            patch.paths().collect::<Vec<_>>(),
            vec![
                "progressSummary.currentStage",
                "progressSummary.lastSessionAt",
                "progressSummary.streakDays",
            ]
        );
    }

    #[test]
    fn null_sub_field_counts_as_present() {
        let doc = complete_doc().with_field(
            PROGRESS_SUMMARY,
            map(&[
                ("currentStage", FieldValue::Null),
                ("streakDays", FieldValue::Null),
                ("lastSessionAt", FieldValue::Null),
            ]),
        );
        assert!(evaluate(&doc.fields).is_empty());
    }

    #[test]
    fn second_pass_is_empty_except_updated_at() {
        let docs = [
            UserDocument::new("empty"),
            UserDocument::new("partial")
                .with_field(SETTINGS, map(&[("theme", "dark".into())]))
                .with_field(PROGRESS_SUMMARY, FieldValue::Null),
            UserDocument::new("scalar").with_field(SETTINGS, "disabled"),
            UserDocument::new("array").with_field(SETTINGS, FieldValue::Array(vec![])),
        ];

        for doc in docs {
            let mut fields = doc.fields.clone();
            evaluate(&fields).apply_to(&mut fields, ts()).unwrap();

            let mut second = evaluate(&fields);
            assert_eq!(
                second.remove(UPDATED_AT),
                Some(PatchValue::ServerTimestamp),
                "doc {} should have updatedAt touched again",
                doc.id
            );
            assert!(
                second.is_empty(),
                "doc {} not idempotent: {:?}",
                doc.id,
                second.paths().collect::<Vec<_>>()
            );
        }
    }
}
