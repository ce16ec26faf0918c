//! 규칙 디렉토리 로더
//!
//! 규칙 루트 아래의 서브디렉토리 하나가 소스 타입 하나에 대응합니다.
//! 디렉토리 이름이 소스 타입 키이며, 그 안의 `.json` 파일들이 파일명
//! 순서로 하나의 [`TranslatorsManager`]에 등록됩니다.
//!
//! ```text
//! rules/
//!   XmlWinEventLog/
//!     4624.json
//!     4625.json
//!   infoblox:dhcp/
//!     dhcpack.json
//! ```
//!
//! 잘못된 JSON이나 알 수 없는 연산자는 전체 로딩을 중단시킵니다.
//! 규칙 에러를 안고 시작하는 것보다 시작 실패가 낫습니다.

use std::path::Path;

use crate::error::TranslatorError;
use crate::manager::TranslatorsManager;
use crate::rule::Translator;

/// 규칙 파일 로더
pub struct RuleLoader;

impl RuleLoader {
    /// 규칙 루트 디렉토리를 로드합니다.
    ///
    /// 소스 타입별 [`TranslatorsManager`] 목록을 반환합니다.
    /// 서브디렉토리가 아닌 엔트리는 무시합니다.
    ///
    /// # Errors
    /// - 디렉토리를 읽을 수 없는 경우
    /// - 규칙 파일이 잘못된 JSON이거나 알 수 없는 연산자를 포함하는 경우
    pub async fn load_directory(
        root: impl AsRef<Path>,
    ) -> Result<Vec<TranslatorsManager>, TranslatorError> {
        let root = root.as_ref();

        let mut entries = tokio::fs::read_dir(root)
            .await
            .map_err(|e| TranslatorError::Load {
                path: root.display().to_string(),
                reason: format!("failed to read rules directory: {e}"),
            })?;

        let mut managers = Vec::new();

        while let Some(entry) = entries.next_entry().await.map_err(|e| TranslatorError::Load {
            path: root.display().to_string(),
            reason: format!("failed to read directory entry: {e}"),
        })? {
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }

            let source_type = match path.file_name().and_then(|n| n.to_str()) {
                Some(name) => name.to_owned(),
                None => continue,
            };

            let manager = Self::load_source_dir(&source_type, &path).await?;
            if manager.is_empty() {
                tracing::warn!(source_type = %source_type, "rule directory has no rules");
                continue;
            }
            managers.push(manager);
        }

        tracing::info!(
            root = %root.display(),
            source_types = managers.len(),
            "loaded translation rules"
        );

        Ok(managers)
    }

    /// 소스 타입 디렉토리 하나를 로드합니다.
    ///
    /// `.json` 파일을 파일명 순서로 등록하여 규칙 순서를 결정적으로
    /// 만듭니다.
    pub async fn load_source_dir(
        source_type: &str,
        dir: impl AsRef<Path>,
    ) -> Result<TranslatorsManager, TranslatorError> {
        let dir = dir.as_ref();

        let mut entries = tokio::fs::read_dir(dir)
            .await
            .map_err(|e| TranslatorError::Load {
                path: dir.display().to_string(),
                reason: format!("failed to read rule directory: {e}"),
            })?;

        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|e| TranslatorError::Load {
            path: dir.display().to_string(),
            reason: format!("failed to read directory entry: {e}"),
        })? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                files.push(path);
            }
        }
        files.sort();

        let mut manager = TranslatorsManager::new(source_type);
        for path in files {
            let translator = Self::load_file(&path).await?;
            let name = path
                .file_stem()
                .and_then(|n| n.to_str())
                .unwrap_or("rule")
                .to_owned();
            manager.put(name, translator);
        }

        Ok(manager)
    }

    /// 단일 규칙 파일을 로드하여 컴파일합니다.
    pub async fn load_file(path: impl AsRef<Path>) -> Result<Translator, TranslatorError> {
        let path = path.as_ref();

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| TranslatorError::Load {
                path: path.display().to_string(),
                reason: format!("failed to read file: {e}"),
            })?;

        Translator::from_str(&content).map_err(|e| TranslatorError::Load {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use normwire_core::maps;
    use serde_json::json;

    const ACK_RULE: &str = r#"{
        "desc": "ack",
        "when": "message like 'ACK'",
        "rules": [ { "message": { "@move": "msg" } } ]
    }"#;

    fn write_rule(dir: &Path, name: &str, content: &str) {
        std::fs::write(dir.join(name), content).expect("write rule file");
    }

    #[tokio::test]
    async fn loads_source_dirs_and_rule_files() {
        let root = tempfile::tempdir().expect("tempdir");
        let source_dir = root.path().join("XmlWinEventLog");
        std::fs::create_dir(&source_dir).expect("create dir");
        write_rule(&source_dir, "4624.json", ACK_RULE);
        write_rule(&source_dir, "4625.json", ACK_RULE);
        // JSON이 아닌 파일은 무시됨
        write_rule(&source_dir, "README.md", "not a rule");

        let managers = RuleLoader::load_directory(root.path()).await.expect("load");
        assert_eq!(managers.len(), 1);
        assert_eq!(managers[0].source_type(), "XmlWinEventLog");
        assert_eq!(managers[0].len(), 2);
    }

    #[tokio::test]
    async fn loaded_rules_translate() {
        let root = tempfile::tempdir().expect("tempdir");
        let source_dir = root.path().join("syslog");
        std::fs::create_dir(&source_dir).expect("create dir");
        write_rule(&source_dir, "ack.json", ACK_RULE);

        let managers = RuleLoader::load_directory(root.path()).await.expect("load");
        let mut data = json!({"message": "DHCPACK"})
            .as_object()
            .cloned()
            .expect("tree");
        let output = managers[0].translate(&mut data).expect("should match");
        assert_eq!(maps::get_str(&output, "msg"), Some("DHCPACK"));
    }

    #[tokio::test]
    async fn bad_json_aborts_loading() {
        let root = tempfile::tempdir().expect("tempdir");
        let source_dir = root.path().join("syslog");
        std::fs::create_dir(&source_dir).expect("create dir");
        write_rule(&source_dir, "bad.json", "{ not json");

        assert!(RuleLoader::load_directory(root.path()).await.is_err());
    }

    #[tokio::test]
    async fn unknown_operator_aborts_loading() {
        let root = tempfile::tempdir().expect("tempdir");
        let source_dir = root.path().join("syslog");
        std::fs::create_dir(&source_dir).expect("create dir");
        write_rule(
            &source_dir,
            "bad.json",
            r#"{ "rules": [ { "a": { "@explode": true } } ] }"#,
        );

        assert!(RuleLoader::load_directory(root.path()).await.is_err());
    }

    #[tokio::test]
    async fn missing_root_is_an_error() {
        assert!(
            RuleLoader::load_directory("/nonexistent/rules/root")
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn empty_source_dir_is_skipped() {
        let root = tempfile::tempdir().expect("tempdir");
        std::fs::create_dir(root.path().join("empty")).expect("create dir");

        let managers = RuleLoader::load_directory(root.path()).await.expect("load");
        assert!(managers.is_empty());
    }
}
