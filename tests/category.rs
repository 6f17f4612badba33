// tests/category.rs

use proptest::prelude::*;
use steprunner::cache::sorted_for_display;
use steprunner::types::{Category, ConsoleMode, StepDescriptor};

#[test]
fn category_from_description_prefix() {
    assert_eq!(Category::from_description("Run: the app"), Category::Run);
    assert_eq!(Category::from_description("Test: unit tests"), Category::Test);
    assert_eq!(Category::from_description("Tests for the parser"), Category::Test);
    assert_eq!(Category::from_description("Build: docs"), Category::Build);
    assert_eq!(Category::from_description("Tool: formatter"), Category::Tool);
    assert_eq!(Category::from_description("Copy build artifacts"), Category::None);
    assert_eq!(Category::from_description(""), Category::None);
}

#[test]
fn prefixes_are_case_sensitive_and_anchored() {
    assert_eq!(Category::from_description("run: lowercase"), Category::None);
    assert_eq!(Category::from_description(" Run: leading space"), Category::None);
    assert_eq!(Category::from_description("Runner"), Category::None);
}

#[test]
fn display_order_is_run_test_build_tool_none() {
    let mut all = vec![
        Category::None,
        Category::Tool,
        Category::Build,
        Category::Test,
        Category::Run,
    ];
    all.sort();
    assert_eq!(
        all,
        vec![
            Category::Run,
            Category::Test,
            Category::Build,
            Category::Tool,
            Category::None
        ]
    );
}

#[test]
fn sorting_is_stable_within_a_category() {
    let steps = vec![
        StepDescriptor::new("install", "Copy build artifacts", true),
        StepDescriptor::new("docs", "Build: docs", false),
        StepDescriptor::new("run", "Run: the app", false),
        StepDescriptor::new("lib", "Build: library", false),
        StepDescriptor::new("test", "Test: everything", false),
    ];
    let names: Vec<String> = sorted_for_display(&steps)
        .into_iter()
        .map(|s| s.name)
        .collect();
    assert_eq!(names, vec!["run", "test", "docs", "lib", "install"]);
}

#[test]
fn console_mode_parses_case_insensitively() {
    assert_eq!("External".parse::<ConsoleMode>(), Ok(ConsoleMode::External));
    assert_eq!(" internal ".parse::<ConsoleMode>(), Ok(ConsoleMode::Internal));
    assert!("terminal".parse::<ConsoleMode>().is_err());
    assert_eq!(ConsoleMode::default(), ConsoleMode::Integrated);
}

proptest! {
    #[test]
    fn classification_depends_only_on_prefix(rest in ".{0,20}") {
        prop_assert_eq!(Category::from_description(&format!("Run:{rest}")), Category::Run);
        prop_assert_eq!(Category::from_description(&format!("Test{rest}")), Category::Test);
        prop_assert_eq!(Category::from_description(&format!("Build:{rest}")), Category::Build);
        prop_assert_eq!(Category::from_description(&format!("Tool:{rest}")), Category::Tool);
    }

    #[test]
    fn sorted_steps_are_a_permutation_ordered_by_category(
        descs in proptest::collection::vec(
            prop_oneof![
                Just("Run: x"), Just("Test: x"), Just("Build: x"), Just("Tool: x"), Just("other")
            ],
            0..12
        )
    ) {
        let steps: Vec<StepDescriptor> = descs
            .iter()
            .enumerate()
            .map(|(i, d)| StepDescriptor::new(format!("s{i}"), *d, false))
            .collect();
        let sorted = sorted_for_display(&steps);

        prop_assert_eq!(sorted.len(), steps.len());
        for pair in sorted.windows(2) {
            prop_assert!(pair[0].category <= pair[1].category);
            if pair[0].category == pair[1].category {
                let a: usize = pair[0].name[1..].parse().unwrap();
                let b: usize = pair[1].name[1..].parse().unwrap();
                prop_assert!(a < b);
            }
        }
    }
}
