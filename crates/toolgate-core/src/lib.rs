//! Shared data model, error taxonomy and telemetry capability for the
//! toolgate registry. Has no I/O dependencies: storage, network and HTTP
//! concerns live in the crates that consume these types.

pub mod error;
pub mod execution;
pub mod telemetry;
pub mod tool;

pub use error::CoreError;
pub use execution::{ExecutionStatus, NewToolExecution, ToolExecution};
pub use telemetry::{MetricsRecorder, NoopRecorder, Recorder, Timer};
pub use tool::{ImplementationType, NewTool, RegistryStats, Tool, ToolPatch};

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn name_validation_rejects_empty_and_bad_chars() {
        assert!(Tool::validate_name("").is_err());
        assert!(Tool::validate_name("ok_name:1").is_ok());
        assert!(Tool::validate_name("bad name!").is_err());
    }

    #[test]
    fn embedding_text_is_stable() {
        let a = Tool::embedding_text("calc", "adds numbers", "math", &["add".into()]);
        let b = Tool::embedding_text("calc", "adds numbers", "math", &["add".into()]);
        assert_eq!(a, b);
        assert!(a.starts_with("calc\nadds numbers\nCategory: math"));
    }

    #[test]
    fn patch_detects_embedding_text_changes() {
        let mut patch = ToolPatch::default();
        assert!(!patch.touches_embedding_text());
        patch.description = Some("new desc".into());
        assert!(patch.touches_embedding_text());
    }

    proptest! {
        #[test]
        fn validate_name_only_accepts_its_own_charset(name in "\\PC{0,300}") {
            let accepted = Tool::validate_name(&name).is_ok();
            let well_formed = !name.is_empty()
                && name.chars().count() <= 255
                && name.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, ':' | '_' | '-'));
            prop_assert_eq!(accepted, well_formed);
        }

        #[test]
        fn embedding_text_roundtrips_its_inputs(
            name in ".{0,40}",
            description in ".{0,200}",
            category in ".{0,40}",
            tags in proptest::collection::vec(".{0,20}", 0..5),
        ) {
            let text = Tool::embedding_text(&name, &description, &category, &tags);
            prop_assert!(text.starts_with(&format!("{name}\n{description}\nCategory: {category}")));
            prop_assert_eq!(
                Tool::embedding_text(&name, &description, &category, &tags),
                text
            );
        }
    }
}
