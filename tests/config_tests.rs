//! Configuration file loading tests.

use std::io::Write;

use forte_tasks::config::{ConfigError, ForteConfig, StoreBackend};
use forte_tasks::store::TaskStore;

mod file_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_from_file_reads_all_sections() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[store]
backend = "memory"
collection = "todos-local"
request_timeout_ms = 1500

[auth]
sign_in_route = "/auth/login"

[logging]
filter = "forte_tasks=trace"
"#
        )
        .unwrap();

        let config = ForteConfig::from_file(file.path()).unwrap();
        assert_eq!(config.store.backend, StoreBackend::Memory);
        assert_eq!(config.store.collection, "todos-local");
        assert_eq!(config.store.request_timeout_ms, Some(1500));
        assert_eq!(config.auth.sign_in_route, "/auth/login");
        assert_eq!(config.logging.filter, "forte_tasks=trace");
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        let result = ForteConfig::from_file(&path);
        assert!(
            matches!(result, Err(ConfigError::Io { ref path, .. }) if path.ends_with("absent.toml")),
            "expected Io error, got: {result:?}"
        );
    }

    #[test]
    fn test_malformed_file_is_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[store\nbackend = ").unwrap();
        assert!(matches!(
            ForteConfig::from_file(file.path()),
            Err(ConfigError::Parse(_))
        ));
    }
}

mod open_store_tests {
    use super::*;

    #[tokio::test]
    async fn test_open_memory_store_uses_configured_collection() {
        let mut config = ForteConfig::default();
        config.store.collection = "todos-open".to_string();
        let store = config.open_store().unwrap();

        let task = store.create_task("alice", "configured").await.unwrap();
        let tasks = store.list_tasks("alice").await.unwrap();
        assert_eq!(tasks, vec![task]);
    }

    #[test]
    fn test_open_store_validates_first() {
        let mut config = ForteConfig::default();
        config.store.backend = StoreBackend::Firestore;
        assert!(matches!(
            config.open_store(),
            Err(ConfigError::Invalid(_))
        ));
    }
}
