use crate::prelude::*;

#[test]
fn prelude_covers_a_full_session() {
    let schema = FormSchema::new(vec![
        FieldSchema::input("name", "Name").required(true),
        FieldSchema::checkbox("subscribe", "Subscribe"),
    ])
    .expect("schema");
    let controller: FormController = FormController::new(
        schema,
        FormOptions {
            initial_values: value_map! { "name" => "Ann", "subscribe" => false },
            ..FormOptions::default()
        },
    )
    .with_draft_store(DraftStore::in_memory())
    .with_i18n(I18nManager::with_locale(Locale::Tag("en".into())));

    controller.set_value("subscribe", true).expect("edit");
    let snapshot: FormSnapshot = controller.snapshot().expect("snapshot");
    assert_eq!(snapshot.changed_fields, vec!["subscribe"]);

    let outcome: FormResult<SubmitOutcome> = futures::executor::block_on(controller.submit());
    assert_eq!(outcome, Ok(SubmitOutcome::Submitted));
    assert_eq!(controller.value("subscribe"), Ok(Some(FieldValue::Bool(true))));
}

#[test]
fn form_facade_exports_building_blocks() {
    use crate::form::{
        FileStore, InMemoryStore, KeyValueStore, ManualScheduler, Scheduler, SpawnScheduler,
        helpers,
    };

    fn assert_store<T: KeyValueStore>() {}
    fn assert_scheduler<T: Scheduler>() {}

    assert_store::<InMemoryStore>();
    assert_store::<FileStore>();
    assert_scheduler::<ManualScheduler>();
    assert_scheduler::<SpawnScheduler<futures::executor::ThreadPool>>();
    assert!(helpers::is_valid_email("a@b.co"));

    let error: FormError = FormError::AlreadySubmitting;
    assert_eq!(error.to_string(), "form submit is already in progress");
}
