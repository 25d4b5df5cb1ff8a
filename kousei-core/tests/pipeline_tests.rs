// kousei-core/tests/pipeline_tests.rs
use anyhow::Result;
use std::io::Write;
use tempfile::NamedTempFile;

use kousei_core::config::{Preset, RuleDefinition, RuleSource, SourceMetadata};
use kousei_core::reconcile::reconcile_response;
use kousei_core::{
    analyze, AnalysisConfig, AnalysisEngine, Category, IssueSource, RuleManager, SchemaLimits, SecurityGuards,
    Severity,
};

fn single_rule_source(def: RuleDefinition) -> RuleSource {
    RuleSource {
        metadata: SourceMetadata { id: "test".into(), ..Default::default() },
        rules: vec![def],
    }
}

#[test_log::test]
fn test_tabereru_example_offsets() {
    let rules = RuleManager::new(vec![single_rule_source(RuleDefinition {
        id: "ra_nuki_taberu".into(),
        pattern: Some("食べれる".into()),
        message: "ら抜き言葉".into(),
        auto_fix: true,
        replacement: Some("食べられる".into()),
        ..Default::default()
    })]);
    let text = "食べれる";
    let issues = analyze(&rules, text, &AnalysisConfig::default());
    assert_eq!(issues.len(), 1);
    let issue = &issues[0];
    assert_eq!(issue.range.start, 0);
    assert_eq!(issue.range.end, text.len());
    assert_eq!(issue.range.char_range(text), (0, 4));
    assert_eq!(issue.range.utf16_range(text), (0, 4));
    assert_eq!(issue.suggestions[0].text, "食べられる");
    assert_eq!(issue.metadata.original_text, "食べれる");
}

#[test_log::test]
fn test_computer_anchor_example() {
    let text = "コンピュータの表記";
    let raw = r#"{"issues": [{"id": "x", "severity": "info", "category": "consistency",
        "message": "表記ゆれ", "quote": "コンピュータ", "before": "", "after": "の", "nth": 1,
        "suggestions": [{"text": "コンピューター", "rationale": "長音", "confidence": 0.7, "isPreferred": true}]}]}"#;
    let issues = reconcile_response(text, raw, &SchemaLimits::default());
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].range.slice(text), Some("コンピュータ"));
    assert_eq!(issues[0].range.char_range(text), (0, 6));
    assert_eq!(issues[0].source, IssueSource::Llm);
}

#[test]
fn test_load_rule_file_and_override_preset() -> Result<()> {
    let yaml = r#"
metadata:
  id: team
  version: "2.0.0"
  locale: ja-JP
  author: docs-team
rules:
  - id: consistency_server
    severity: warn
    category: consistency
    pattern: サーバー
    message: 社内表記は「サーバ」です。
    auto_fix: true
    replacement: サーバ
  - id: team_word
    severity: info
    category: style
    pattern: 御社
    message: 社外文書では「貴社」を使います。
    auto_fix: true
    replacement: 貴社
"#;
    let mut file = NamedTempFile::new()?;
    file.write_all(yaml.as_bytes())?;

    let source = RuleSource::load_from_file(file.path())?;
    assert_eq!(source.metadata.author, "docs-team");

    let manager = RuleManager::from_preset(Preset::Standard)?.with_source(source);
    let compiled = manager.compiled();
    let server = compiled.get("consistency_server").expect("rule is merged");
    assert_eq!(server.severity, Severity::Warn);
    assert!(compiled.get("team_word").is_some());
    assert!(manager.compile_errors().is_empty());

    let report = manager.engine().analyze("サーバーと御社", &AnalysisConfig::default());
    assert_eq!(report.matched_rule_ids, vec!["consistency_server".to_string(), "team_word".to_string()]);
    Ok(())
}

#[test]
fn test_broken_rules_are_reported_not_fatal() {
    let source = RuleSource {
        metadata: SourceMetadata::default(),
        rules: vec![
            RuleDefinition {
                id: "bad_severity".into(),
                severity: "fatal".into(),
                pattern: Some("あ".into()),
                ..Default::default()
            },
            RuleDefinition {
                id: "fix_without_replacement".into(),
                pattern: Some("い".into()),
                auto_fix: true,
                ..Default::default()
            },
            RuleDefinition {
                id: "bad_regex".into(),
                pattern: Some("(う".into()),
                ..Default::default()
            },
            RuleDefinition {
                id: "bad_group".into(),
                pattern: Some("(え)(お)".into()),
                auto_fix: true,
                replacement: Some("$3".into()),
                ..Default::default()
            },
            RuleDefinition {
                id: "good".into(),
                category: "risk".into(),
                pattern: Some("か".into()),
                ..Default::default()
            },
        ],
    };
    let manager = RuleManager::new(vec![source]);
    assert_eq!(manager.rule_ids(), vec!["good".to_string()]);
    assert!(manager.compile_errors().len() >= 4);
    assert!(manager.compile_errors().iter().all(|e| e.code() == "RULE_COMPILE_ERROR"));

    let report = manager.engine().analyze("あいうえおか", &AnalysisConfig::default());
    assert_eq!(report.issues.len(), 1);
    assert_eq!(report.issues[0].category, Category::Risk);
}

#[test]
fn test_guards_then_reconcile_against_original() {
    let guards = SecurityGuards::default();
    let text = "田中様、資料をご覧になられる際は tanaka@example.com へ。";
    let guarded = guards.prepare(text).unwrap();
    assert!(!guarded.text.contains("tanaka@example.com"));

    // The model quotes a span that the masking left untouched.
    let raw = r#"```json
{"issues": [{"severity": "warn", "category": "honorific", "message": "二重敬語",
  "quote": "ご覧になられる", "before": "資料を", "after": "際", "nth": 1, "suggestions": ["ご覧になる"]}]}
```"#;
    let issues = reconcile_response(text, raw, &SchemaLimits::default());
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].range.slice(text), Some("ご覧になられる"));
    assert_eq!(issues[0].suggestions[0].text, "ご覧になる");
}
