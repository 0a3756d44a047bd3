// ==========================================
// 配置 / 规则 / 批次 集成测试
// ==========================================

use ops_incident_report::api::{ApiError, ImportApi};
use ops_incident_report::config::{config_keys, ConfigManager, PipelineConfigReader};
use ops_incident_report::domain::rule::{ClassificationRule, PatternType, RulePurpose};

use test_helpers::{create_test_db, fixed_now, report_xlsx, write_temp_file};

fn sample_report() -> Vec<u8> {
    report_xlsx(
        &[
            vec!["REQ-1", "01/01/2025 08:00", "Somos Belcorp", "Caída", "Alta", "Nivel 1", "", ""],
            vec!["REQ-2", "22/09/2025 09:00", "Mi Negocio", "Pedido", "Baja", "Cerrado", "", ""],
        ],
        None,
        None,
    )
}

#[tokio::test]
async fn test_disabled_window_accepts_every_date() {
    let (_db, db_path) = create_test_db().unwrap();
    let api = ImportApi::new(&db_path).unwrap().with_clock(fixed_now());
    api.set_cut_window("", "", "disabled").unwrap();

    let file = write_temp_file(&sample_report(), ".xlsx");
    let envelope = api
        .import_file(file.path().to_str().unwrap(), false)
        .await
        .unwrap()
        .envelope;

    assert!(envelope.warnings.is_empty());
    assert!(envelope.records.iter().all(|r| r.in_window));
    assert_eq!(envelope.records[1].status, "Resolved");
    assert_eq!(envelope.records[1].business_unit, "MN");
}

#[tokio::test]
async fn test_configured_sheet_name_is_used() {
    let (_db, db_path) = create_test_db().unwrap();
    let api = ImportApi::new(&db_path).unwrap().with_clock(fixed_now());
    api.set_config(config_keys::INCIDENT_SHEET_NAME, "Datos").unwrap();

    let file = write_temp_file(&sample_report(), ".xlsx");
    let result = api.import_file(file.path().to_str().unwrap(), false).await;
    assert!(matches!(result, Err(ApiError::ImportError(_))));

    // 忽略大小写与首尾空白
    api.set_config(config_keys::INCIDENT_SHEET_NAME, " reporte ").unwrap();
    let response = api.import_file(file.path().to_str().unwrap(), false).await.unwrap();
    assert_eq!(response.envelope.records.len(), 2);
}

#[tokio::test]
async fn test_invalid_timezone_fails_import() {
    let (_db, db_path) = create_test_db().unwrap();
    let api = ImportApi::new(&db_path).unwrap().with_clock(fixed_now());
    api.set_config(config_keys::BUSINESS_TIMEZONE, "Mars/Olympus").unwrap();

    let file = write_temp_file(&sample_report(), ".xlsx");
    let result = api.import_file(file.path().to_str().unwrap(), false).await;
    assert!(result.is_err());

    let reset = api.reset_cut_window_to_current_cycle().await;
    assert!(reset.is_err());
}

#[tokio::test]
async fn test_window_written_through_api_is_read_back() {
    let (_db, db_path) = create_test_db().unwrap();
    let api = ImportApi::new(&db_path).unwrap();
    api.set_cut_window("2025-09-19", "2025-09-25", "weekly").unwrap();

    let config = ConfigManager::new(&db_path).unwrap();
    let window = config.get_cut_window().await.unwrap().unwrap();
    assert_eq!(window.to_string(), "2025-09-19..=2025-09-25 (weekly)");

    // 周三开始的 weekly 窗口不落库
    assert!(api.set_cut_window("2025-09-17", "2025-09-23", "weekly").is_err());
    let window = config.get_cut_window().await.unwrap().unwrap();
    assert_eq!(window.to_string(), "2025-09-19..=2025-09-25 (weekly)");

    api.clear_cut_window().unwrap();
    assert!(config.get_cut_window().await.unwrap().is_none());
}

#[tokio::test]
async fn test_config_snapshot_lists_stored_keys() {
    let (_db, db_path) = create_test_db().unwrap();
    let api = ImportApi::new(&db_path).unwrap();
    api.set_config(config_keys::PREVIEW_LIMIT, "3").unwrap();

    let snapshot: serde_json::Value =
        serde_json::from_str(&api.config_snapshot().unwrap()).unwrap();
    assert_eq!(snapshot[config_keys::PREVIEW_LIMIT], "3");
}

#[tokio::test]
async fn test_preview_respects_limit() {
    let (_db, db_path) = create_test_db().unwrap();
    let api = ImportApi::new(&db_path).unwrap().with_clock(fixed_now());
    api.set_config(config_keys::PREVIEW_LIMIT, "2").unwrap();
    api.set_cut_window("2025-09-19", "2025-09-25", "weekly").unwrap();

    let bytes = report_xlsx(
        &[
            vec!["REQ-1", "fecha rota", "Somos Belcorp", "x", "Alta", "Nivel 1", "", ""],
            vec!["REQ-2", "también rota", "Somos Belcorp", "x", "Alta", "Nivel 1", "", ""],
            vec!["REQ-3", "otra", "Somos Belcorp", "x", "Alta", "Nivel 1", "", ""],
        ],
        None,
        None,
    );
    let file = write_temp_file(&bytes, ".xlsx");
    let response = api.import_file(file.path().to_str().unwrap(), false).await.unwrap();

    assert!(!response.envelope.success);
    assert_eq!(response.envelope.errors.len(), 3);
    assert_eq!(response.envelope.summary.failed, 3);
    assert_eq!(response.preview.len(), 2);
}

#[tokio::test]
async fn test_delete_batch_removes_records() {
    let (_db, db_path) = create_test_db().unwrap();
    let api = ImportApi::new(&db_path).unwrap().with_clock(fixed_now());

    let file = write_temp_file(&sample_report(), ".xlsx");
    let envelope = api
        .import_file(file.path().to_str().unwrap(), true)
        .await
        .unwrap()
        .envelope;
    assert_eq!(api.list_batch_records(&envelope.batch_id).unwrap().len(), 2);

    api.delete_batch(&envelope.batch_id).unwrap();
    assert!(api.list_batch_records(&envelope.batch_id).unwrap().is_empty());
    assert!(matches!(
        api.get_batch(&envelope.batch_id),
        Err(ApiError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_rule_management_through_api() {
    let (_db, db_path) = create_test_db().unwrap();
    let api = ImportApi::new(&db_path).unwrap();

    let seeded = api.seed_default_rules().unwrap();
    assert!(seeded > 0);
    assert_eq!(api.seed_default_rules().unwrap(), 0);

    let rules = api.list_rules(RulePurpose::BusinessUnit).unwrap();
    let first = &rules[0];
    assert_eq!(first.rule.target, "SB");

    let invalid = ClassificationRule::new("[", PatternType::Regex, 5, "X");
    assert!(matches!(
        api.update_rule(first.rule_id, &invalid),
        Err(ApiError::InvalidInput(_))
    ));

    api.set_rule_active(first.rule_id, false).unwrap();
    let rules = api.list_rules(RulePurpose::BusinessUnit).unwrap();
    let stored = rules.iter().find(|r| r.rule_id == first.rule_id).unwrap();
    assert!(!stored.rule.active);

    api.delete_rule(first.rule_id).unwrap();
    assert!(matches!(
        api.delete_rule(first.rule_id),
        Err(ApiError::NotFound(_))
    ));
}
