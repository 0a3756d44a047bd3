// ==========================================
// 事件导入端到端测试
// ==========================================
// 流程: xlsx 报表 → ImportApi → 结果信封 → 落库 → 覆写
// ==========================================

use ops_incident_report::api::{ApiError, ImportApi};
use ops_incident_report::domain::rule::{ClassificationRule, PatternType, RulePurpose};
use ops_incident_report::repository::ClassificationRuleRepository;

use test_helpers::{create_test_db, fixed_now, report_xlsx, write_temp_file};

fn api(db_path: &str) -> ImportApi {
    ImportApi::new(db_path).expect("打开数据库失败").with_clock(fixed_now())
}

#[tokio::test]
async fn test_single_row_inside_weekly_window() {
    let (_db, db_path) = create_test_db().unwrap();
    let api = api(&db_path);
    api.set_cut_window("2025-09-19", "2025-09-25", "weekly").unwrap();

    let bytes = report_xlsx(
        &[vec![
            "REQ-100@https://jira.example/REQ-100",
            "19/09/2025 10:00",
            "Somos Belcorp 2.0",
            "Caída de login",
            "Alta",
            "Nivel 3",
            "",
            "",
        ]],
        None,
        None,
    );
    let file = write_temp_file(&bytes, ".xlsx");

    let response = api
        .import_file(file.path().to_str().unwrap(), true)
        .await
        .expect("导入失败");
    let envelope = &response.envelope;

    assert!(envelope.success);
    assert!(envelope.errors.is_empty());
    assert!(envelope.warnings.is_empty(), "warnings: {:?}", envelope.warnings);
    assert_eq!(envelope.records.len(), 1);

    let record = &envelope.records[0];
    assert_eq!(record.ticket_id, "REQ-100");
    assert_eq!(record.ticket_url.as_deref(), Some("https://jira.example/REQ-100"));
    assert_eq!(record.business_unit, "SB");
    assert_eq!(record.status, "On going in L3");
    assert_eq!(record.priority, "High");
    assert!(record.in_window);
    assert_eq!(record.day_of_month, 19);
    assert_eq!(record.week_number, 38);
    assert_eq!(record.additional_info, "");
    assert_eq!(record.message, "");

    assert_eq!(response.persisted, 1);
    let stored = api.list_batch_records(&envelope.batch_id).unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(&stored[0].record, record);

    let batch = api.get_batch(&envelope.batch_id).unwrap();
    assert_eq!(batch.summary.succeeded, 1);
    assert_eq!(batch.sheet_name, "Reporte");
}

#[tokio::test]
async fn test_linked_counts_from_link_sheet() {
    let (_db, db_path) = create_test_db().unwrap();
    let api = api(&db_path);
    api.set_cut_window("2025-09-19", "2025-09-25", "weekly").unwrap();

    let bytes = report_xlsx(
        &[
            vec!["REQ-1", "19/09/2025 10:00", "Mi Negocio", "Pedido", "Media", "Nivel 2", "", "REQ-9@https://jira.example/REQ-9"],
            vec!["REQ-2", "26/09/2025 08:30", "App Consultora", "Catálogo", "Baja", "Nivel 1", "", "REQ-7"],
            vec!["REQ-3", "20/09/2025 11:00", "Mi Negocio", "Pago", "Crítica", "Nivel 1", "", ""],
        ],
        Some(&[
            vec!["REQ-1", "REQ-9"],
            vec!["REQ-5@https://jira.example/REQ-5", "REQ-9"],
            vec!["REQ-6", "REQ-8"],
        ]),
        None,
    );
    let file = write_temp_file(&bytes, ".xlsx");
    let envelope = api
        .import_file(file.path().to_str().unwrap(), false)
        .await
        .unwrap()
        .envelope;

    assert_eq!(envelope.records.len(), 3);
    let first = &envelope.records[0];
    assert_eq!(first.linked_count, 2);
    assert_eq!(first.message, "REQ-9 --> 2 Linked tickets");
    assert_eq!(first.linked_request_url.as_deref(), Some("https://jira.example/REQ-9"));

    let second = &envelope.records[1];
    assert!(!second.in_window);
    assert_eq!(second.message, "REQ-7 --> 0 Linked tickets");

    let third = &envelope.records[2];
    assert_eq!(third.priority, "Critical");
    assert_eq!(third.message, "");

    let groups = api.link_groups(file.path().to_str().unwrap()).await.unwrap();
    assert_eq!(groups[0].child_id, "REQ-9");
    assert_eq!(groups[0].parent_count, 2);
    assert_eq!(
        groups[0].parents[1].link.as_deref(),
        Some("https://jira.example/REQ-5")
    );
}

#[tokio::test]
async fn test_tag_sheet_groups() {
    let (_db, db_path) = create_test_db().unwrap();
    let api = api(&db_path);

    let bytes = report_xlsx(
        &[],
        None,
        Some(&[
            vec!["REQ-0", "REQ-9", "antes del marcador"],
            vec!["Bug errors"],
            vec!["REQ-1", "REQ-9", "Pagos"],
            vec!["REQ-2", "REQ-9", "Pagos"],
            vec!["Informational"],
            vec!["REQ-3", "REQ-9", "Catálogo"],
            vec!["REQ-1", "REQ-8", ""],
        ]),
    );
    let file = write_temp_file(&bytes, ".xlsx");
    let groups = api.tag_groups(file.path().to_str().unwrap()).await.unwrap();

    let group = groups.group("REQ-9").unwrap();
    assert_eq!(group.categorizations, vec!["Bug errors", "Informational"]);
    assert_eq!(group.additional_infos, vec!["Pagos", "Catálogo"]);

    let ids: Vec<&str> = groups
        .requests_for_categorization("Informational")
        .unwrap()
        .iter()
        .map(|r| r.id.as_str())
        .collect();
    assert_eq!(ids, vec!["REQ-3", "REQ-1"]);
    assert_eq!(groups.requests_for_additional_info("Pagos").unwrap().len(), 2);
    assert!(groups.requests_for_additional_info("antes del marcador").is_none());
}

#[tokio::test]
async fn test_status_override_round_trip() {
    let (_db, db_path) = create_test_db().unwrap();
    let api = api(&db_path);

    let bytes = report_xlsx(
        &[
            vec!["REQ-1", "22/09/2025 09:00", "Somos Belcorp", "Espera", "Alta", "En espera de cliente", "", ""],
            vec!["REQ-2", "22/09/2025 09:30", "Somos Belcorp", "Soporte", "Alta", "Nivel 1", "", ""],
        ],
        None,
        None,
    );
    let file = write_temp_file(&bytes, ".xlsx");
    let envelope = api
        .import_file(file.path().to_str().unwrap(), true)
        .await
        .unwrap()
        .envelope;

    // 未配置窗口: 回退为当前自然周并告警
    assert!(envelope.records.iter().all(|r| r.in_window));
    assert_eq!(envelope.warnings.len(), 1);
    assert!(envelope.warnings[0].contains("2025-09-22..=2025-09-28"));

    let stored = api.list_batch_records(&envelope.batch_id).unwrap();
    assert_eq!(stored[0].record.status, "Awaiting client");

    let updated = api.override_status(stored[0].record_id, "Resolved").await.unwrap();
    assert_eq!(updated.status, "Resolved");
    assert!(updated.status_overridden);

    let again = api.override_status(stored[0].record_id, "On going in L1").await;
    assert!(matches!(again, Err(ApiError::BusinessRuleViolation(_))));

    let not_awaiting = api.override_status(stored[1].record_id, "Resolved").await;
    assert!(matches!(not_awaiting, Err(ApiError::BusinessRuleViolation(_))));

    let missing = api.override_status(9_999, "Resolved").await;
    assert!(matches!(missing, Err(ApiError::NotFound(_))));
}

#[tokio::test]
async fn test_stored_rules_replace_defaults_and_bad_regex_is_isolated() {
    let (_db, db_path) = create_test_db().unwrap();
    let api = api(&db_path);
    api.set_cut_window("2025-09-19", "2025-09-25", "weekly").unwrap();

    // 绕过 API 校验直接写入非法正则
    let repo = ClassificationRuleRepository::new(&db_path).unwrap();
    repo.create(
        RulePurpose::BusinessUnit,
        &ClassificationRule::new("(portal", PatternType::Regex, 1, "BROKEN"),
    )
    .unwrap();
    api.create_rule(
        RulePurpose::BusinessUnit,
        &ClassificationRule::new("portal", PatternType::Contains, 50, "PORTAL"),
    )
    .unwrap();

    let bytes = report_xlsx(
        &[
            vec!["REQ-1", "19/09/2025 10:00", "Portal Interno", "Caída", "Alta", "Nivel 1", "", ""],
            vec!["REQ-2", "19/09/2025 11:00", "Somos Belcorp", "Caída", "Alta", "Nivel 1", "", ""],
        ],
        None,
        None,
    );
    let file = write_temp_file(&bytes, ".xlsx");
    let envelope = api
        .import_file(file.path().to_str().unwrap(), false)
        .await
        .unwrap()
        .envelope;

    assert_eq!(envelope.records.len(), 1);
    assert_eq!(envelope.records[0].business_unit, "PORTAL");
    assert_eq!(envelope.summary.rejected, 1);
    assert!(envelope.warnings.iter().any(|w| w.contains("(portal")));
    assert!(envelope.warnings.iter().any(|w| w.starts_with("行 3")));
}

#[tokio::test]
async fn test_csv_short_header_aborts() {
    let (_db, db_path) = create_test_db().unwrap();
    let api = api(&db_path);

    let file = write_temp_file(
        "Ticket,Fecha de creación,Aplicación\nREQ-1,19/09/2025 10:00,Somos Belcorp\n".as_bytes(),
        ".csv",
    );
    let result = api.import_file(file.path().to_str().unwrap(), true).await;
    assert!(matches!(result, Err(ApiError::ImportError(_))));
}

#[tokio::test]
async fn test_csv_header_mismatch_is_warning_only() {
    let (_db, db_path) = create_test_db().unwrap();
    let api = api(&db_path);
    api.set_cut_window("2025-09-19", "2025-09-25", "weekly").unwrap();

    let csv = "Ticket,Fecha de creación,Aplicación,Owner,Prioridad,Estado,Información adicional,Ticket vinculado\n\
               REQ-1,19/09/2025 10:00,Somos Belcorp,Caída,Alta,Nivel 3,,\n";
    let file = write_temp_file(csv.as_bytes(), ".csv");
    let response = api.import_file(file.path().to_str().unwrap(), false).await.unwrap();

    assert_eq!(response.envelope.records.len(), 1);
    assert_eq!(response.envelope.warnings.len(), 1);
    assert!(response.envelope.warnings[0].starts_with("列 D"));
    assert_eq!(response.preview, response.envelope.warnings);
}

#[tokio::test]
async fn test_unsupported_extension() {
    let (_db, db_path) = create_test_db().unwrap();
    let api = api(&db_path);
    let file = write_temp_file(b"irrelevant", ".ods");
    let result = api.import_file(file.path().to_str().unwrap(), false).await;
    assert!(matches!(result, Err(ApiError::InvalidInput(_))));
}
