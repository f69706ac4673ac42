//! Project registry integration tests.

mod common;

use std::collections::HashSet;

use backlog_forge::models::ProjectPhase;
use backlog_forge::registry::{MAX_ALLOCATION_ATTEMPTS, RECENT_PROJECTS_CAP};
use backlog_forge::Error;
use common::setup;

mod create_project {
    use super::*;

    #[test]
    fn normalizes_the_name_into_an_identifier() {
        let (registry, _) = setup();

        let identifier = registry.create_project("My Cool App!!!").unwrap();

        assert_eq!(identifier, "my-cool-app");
        assert!(registry.exists("my-cool-app").unwrap());
    }

    #[test]
    fn suffixes_duplicates_starting_at_two() {
        let (registry, _) = setup();

        let first = registry.create_project("My Cool App!!!").unwrap();
        let second = registry.create_project("my cool app").unwrap();
        let third = registry.create_project("MY COOL APP").unwrap();

        assert_eq!(first, "my-cool-app");
        assert_eq!(second, "my-cool-app-2");
        assert_eq!(third, "my-cool-app-3");
    }

    #[test]
    fn keeps_the_trimmed_name_for_display() {
        let (registry, _) = setup();

        let identifier = registry.create_project("  Todo List  ").unwrap();
        let record = registry.get(&identifier).unwrap();

        assert_eq!(record.display_name, "Todo List");
    }

    #[test]
    fn sets_the_project_up_for_its_orchestrator() {
        let (registry, provider) = setup();

        let identifier = registry.create_project("Todo").unwrap();
        let orchestrator = registry.orchestrator(&identifier).unwrap();

        assert_eq!(orchestrator.phase().unwrap(), ProjectPhase::Configured);
        let snapshot = orchestrator.snapshot().unwrap();
        assert_eq!(snapshot.state.display_name.as_deref(), Some("Todo"));
        assert_eq!(provider.connects(), 0);
    }

    #[test]
    fn rejects_empty_names() {
        let (registry, _) = setup();

        for name in ["", "   ", "!!! ???", "---"] {
            let result = registry.create_project(name);
            assert!(
                matches!(result, Err(Error::InvalidInput(_))),
                "expected {:?} to be rejected",
                name
            );
        }

        assert!(registry.list_projects().unwrap().is_empty());
        assert!(registry.recent_projects().unwrap().is_empty());
    }

    #[test]
    fn truncates_long_names() {
        let (registry, _) = setup();
        let name = "a".repeat(80);

        let identifier = registry.create_project(&name).unwrap();

        assert_eq!(identifier.len(), 50);
    }

    #[test]
    fn fails_once_every_suffix_is_taken() {
        let (registry, _) = setup();

        for _ in 0..MAX_ALLOCATION_ATTEMPTS {
            registry.create_project("app").unwrap();
        }
        assert!(registry.exists("app-1000").unwrap());

        let result = registry.create_project("app");

        match result {
            Err(Error::AllocationExhausted(base)) => assert_eq!(base, "app"),
            other => panic!("expected AllocationExhausted, got {:?}", other),
        }
        assert!(!registry.exists("app-1001").unwrap());
    }

    #[test]
    fn concurrent_creates_never_share_an_identifier() {
        let (registry, _) = setup();

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let registry = registry.clone();
                std::thread::spawn(move || registry.create_project("Race"))
            })
            .collect();

        let mut identifiers = HashSet::new();
        for handle in handles {
            let identifier = handle.join().unwrap().unwrap();
            assert!(identifiers.insert(identifier));
        }

        let mut expected: HashSet<String> = (2..=16).map(|n| format!("race-{}", n)).collect();
        expected.insert("race".to_string());
        assert_eq!(identifiers, expected);
    }
}

mod listing {
    use super::*;

    #[test]
    fn lists_every_project_newest_first() {
        let (registry, _) = setup();

        registry.create_project("Alpha").unwrap();
        registry.create_project("Beta").unwrap();
        registry.create_project("Alpha").unwrap();

        let identifiers: Vec<String> = registry
            .list_projects()
            .unwrap()
            .into_iter()
            .map(|p| p.identifier)
            .collect();

        assert_eq!(identifiers, vec!["alpha-2", "beta", "alpha"]);
    }

    #[test]
    fn unknown_projects_do_not_exist() {
        let (registry, _) = setup();

        assert!(!registry.exists("ghost").unwrap());
        assert!(matches!(
            registry.get("ghost"),
            Err(Error::ProjectNotFound(_))
        ));
        assert!(matches!(
            registry.orchestrator("ghost"),
            Err(Error::ProjectNotFound(_))
        ));
    }
}

mod recent_projects {
    use super::*;

    #[test]
    fn remembers_created_projects_newest_first() {
        let (registry, _) = setup();

        registry.create_project("One").unwrap();
        registry.create_project("Two").unwrap();

        assert_eq!(registry.recent_projects().unwrap(), vec!["two", "one"]);
    }

    #[test]
    fn is_capped() {
        let (registry, _) = setup();

        for i in 0..(RECENT_PROJECTS_CAP + 3) {
            registry.create_project(&format!("Project {}", i)).unwrap();
        }

        let recent = registry.recent_projects().unwrap();
        assert_eq!(recent.len(), RECENT_PROJECTS_CAP);
        assert_eq!(recent[0], "project-12");
        assert!(!recent.contains(&"project-0".to_string()));
        assert_eq!(registry.list_projects().unwrap().len(), RECENT_PROJECTS_CAP + 3);
    }
}
