use backlog_forge::names::{candidate, normalize, MAX_IDENTIFIER_LEN};
use proptest::prelude::*;

proptest! {
    #[test]
    fn prop_normalized_names_are_url_safe(raw in "\\PC{0,120}") {
        let identifier = normalize(&raw);

        prop_assert!(identifier
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-'));
        prop_assert!(identifier.len() <= MAX_IDENTIFIER_LEN);
    }

    #[test]
    fn prop_normalize_is_idempotent(raw in "[A-Za-z0-9 _!?-]{0,80}") {
        let once = normalize(&raw);
        prop_assert_eq!(normalize(&once), once.clone());
    }

    #[test]
    fn prop_case_does_not_matter(raw in "[A-Za-z0-9 ]{1,60}") {
        prop_assert_eq!(normalize(&raw.to_uppercase()), normalize(&raw.to_lowercase()));
    }

    #[test]
    fn prop_candidates_past_the_first_carry_the_attempt(attempt in 2u32..=1000) {
        let name = candidate("app", attempt);
        prop_assert_eq!(name, format!("app-{}", attempt));
    }
}

#[test]
fn first_candidate_is_the_base() {
    assert_eq!(candidate("app", 1), "app");
}
