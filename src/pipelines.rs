//! Built-in pipeline definitions embedded in the binary
//!
//! Lets users run `--pipeline pokemon` instead of pointing at a YAML file.

use std::collections::HashMap;
use std::sync::LazyLock;

/// Built-in pipeline YAML definitions
pub static BUILTIN_PIPELINES: LazyLock<HashMap<&'static str, &'static str>> =
    LazyLock::new(|| {
        let mut m = HashMap::new();
        m.insert("pokemon", include_str!("../pipelines/pokemon.yaml"));
        m.insert("github", include_str!("../pipelines/github.yaml"));
        m.insert("freshdesk", include_str!("../pipelines/freshdesk.yaml"));
        m.insert("zoom", include_str!("../pipelines/zoom.yaml"));
        m
    });

/// Get a built-in pipeline by name
pub fn get_builtin(name: &str) -> Option<&'static str> {
    BUILTIN_PIPELINES.get(name).copied()
}

/// Check if a name is a built-in pipeline
pub fn is_builtin(name: &str) -> bool {
    BUILTIN_PIPELINES.contains_key(name)
}

/// List all built-in pipeline names
pub fn list_builtin() -> Vec<&'static str> {
    let mut names: Vec<&'static str> = BUILTIN_PIPELINES.keys().copied().collect();
    names.sort_unstable();
    names
}

/// Pipeline metadata for display
#[derive(Debug, Clone)]
pub struct PipelineInfo {
    pub name: &'static str,
    pub description: &'static str,
    /// Keys expected in the config JSON
    pub config_keys: &'static [&'static str],
}

/// Describe the built-in pipelines
pub fn list_builtin_info() -> Vec<PipelineInfo> {
    vec![
        PipelineInfo {
            name: "freshdesk",
            description: "Freshdesk tickets (basic auth)",
            config_keys: &["domain", "token"],
        },
        PipelineInfo {
            name: "github",
            description: "GitHub issues of one repository, incremental merge on updated_at",
            config_keys: &["token", "owner", "repo"],
        },
        PipelineInfo {
            name: "pokemon",
            description: "PokeAPI berries, pokemon, and per-berry details",
            config_keys: &[],
        },
        PipelineInfo {
            name: "zoom",
            description: "Zoom users, meetings, webinars, and reports (account credentials OAuth)",
            config_keys: &["account_id", "client_id", "client_secret"],
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_pipelines_exist() {
        for name in ["pokemon", "github", "freshdesk", "zoom"] {
            assert!(get_builtin(name).is_some(), "{name} missing");
            assert!(is_builtin(name));
        }
    }

    #[test]
    fn test_unknown_pipeline() {
        assert!(get_builtin("stripe").is_none());
    }

    #[test]
    fn test_list_builtin_matches_info() {
        let names = list_builtin();
        assert_eq!(names, vec!["freshdesk", "github", "pokemon", "zoom"]);
        let info: Vec<_> = list_builtin_info().iter().map(|i| i.name).collect();
        assert_eq!(info, names);
    }
}
