use std::{
    collections::hash_map::DefaultHasher,
    hash::{Hash, Hasher},
};

use proptest::prelude::*;

use entryflow::{
    entry::Entry,
    error::EntryError,
    types::{EntryState, Transition},
    value::Value,
};

#[derive(Debug, Clone)]
enum Step {
    SetTitle(String),
    SetUrl(String),
    SetExtra(u8, i64),
    Accept,
    Reject,
    Fail,
}

fn step_strategy() -> impl Strategy<Value = Step> {
    prop_oneof![
        "[a-zA-Z0-9 .]{0,24}".prop_map(Step::SetTitle),
        "http://[a-z]{1,8}/[0-9]{1,4}".prop_map(Step::SetUrl),
        (0u8..8, any::<i64>()).prop_map(|(k, v)| Step::SetExtra(k, v)),
        Just(Step::Accept),
        Just(Step::Reject),
        Just(Step::Fail),
    ]
}

fn apply(entry: &mut Entry, step: &Step) {
    match step {
        Step::SetTitle(t) => entry.set("title", t.as_str()).unwrap(),
        Step::SetUrl(u) => entry.set("url", u.as_str()).unwrap(),
        Step::SetExtra(k, v) => entry.set(format!("extra_{k}"), *v).unwrap(),
        Step::Accept => {
            entry.accept(None).unwrap();
        }
        Step::Reject => {
            entry.reject(None).unwrap();
        }
        Step::Fail => {
            entry.fail(None).unwrap();
        }
    }
}

fn hash_of(entry: &Entry) -> u64 {
    let mut hasher = DefaultHasher::new();
    entry.hash(&mut hasher);
    hasher.finish()
}

proptest! {
    #[test]
    fn originals_never_change_after_first_assignment(
        title in "[a-zA-Z0-9 ]{1,24}",
        url in "http://[a-z]{1,8}/[0-9]{1,4}",
        steps in prop::collection::vec(step_strategy(), 0..40),
    ) {
        let mut entry = Entry::with_title_url(title.as_str(), url.as_str());
        for step in &steps {
            apply(&mut entry, step);
        }
        prop_assert_eq!(entry.peek("original_title"), Some(&Value::from(title.as_str())));
        prop_assert_eq!(entry.peek("original_url"), Some(&Value::from(url.as_str())));
        prop_assert!(entry.is_valid());
    }

    #[test]
    fn equality_and_hash_ignore_later_edits(
        title in "[a-zA-Z0-9 ]{1,24}",
        url in "http://[a-z]{1,8}/[0-9]{1,4}",
        steps in prop::collection::vec(step_strategy(), 0..40),
    ) {
        let pristine = Entry::with_title_url(title.as_str(), url.as_str());
        let mut edited = pristine.clone();
        for step in &steps {
            apply(&mut edited, step);
        }
        prop_assert_eq!(&edited, &pristine);
        prop_assert_eq!(hash_of(&edited), hash_of(&pristine));
    }

    #[test]
    fn accept_and_reject_never_override_each_other(
        steps in prop::collection::vec(step_strategy(), 0..40),
    ) {
        let mut entry = Entry::with_title_url("a", "http://a");
        for step in &steps {
            let before = entry.state();
            apply(&mut entry, step);
            let after = entry.state();
            match (step, before) {
                (Step::Accept, EntryState::Rejected) | (Step::Reject, EntryState::Accepted) => {
                    prop_assert_eq!(after, before);
                }
                (Step::Accept, _) => prop_assert_eq!(after, EntryState::Accepted),
                (Step::Reject, _) => prop_assert_eq!(after, EntryState::Rejected),
                (Step::Fail, _) => prop_assert_eq!(after, EntryState::Failed),
                _ => prop_assert_eq!(after, before),
            }
        }
    }

    #[test]
    fn immortal_entries_are_never_rejected(steps in prop::collection::vec(step_strategy(), 0..40)) {
        let mut entry = Entry::with_title_url("a", "http://a");
        entry.set("immortal", true).unwrap();
        for step in &steps {
            let before = entry.state();
            if matches!(step, Step::Reject) {
                prop_assert_eq!(entry.reject(Some("rule")).unwrap(), Transition::Suppressed);
                prop_assert_eq!(entry.state(), before);
            } else {
                apply(&mut entry, step);
            }
            prop_assert!(!entry.is_rejected());
        }
    }

    #[test]
    fn bytes_are_always_refused(key in "[a-z_]{1,12}", bytes in prop::collection::vec(any::<u8>(), 0..32)) {
        let mut entry = Entry::new();
        let len = bytes.len();
        prop_assert_eq!(
            entry.set(key.as_str(), Value::Bytes(bytes)),
            Err(EntryError::InvalidValue { key: key.clone(), len })
        );
        prop_assert!(!entry.contains_key(&key));
    }

    #[test]
    fn non_text_url_is_refused(n in any::<i64>()) {
        let mut entry = Entry::with_title_url("a", "http://a");
        let refused = matches!(entry.set("url", n), Err(EntryError::InvalidField { .. }));
        prop_assert!(refused);
        prop_assert_eq!(entry.url(), Some("http://a"));
    }
}
