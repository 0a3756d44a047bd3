// ==========================================
// 运维事件报表导入系统 - 事件记录仓储
// ==========================================
// 职责: 导入批次 + 派生记录落库（事务化）、人工状态覆写
// 表: import_batch / incident_record（按批次级联删除）
// ==========================================

use crate::db::{init_schema, open_sqlite_connection};
use crate::domain::incident::{DerivedRecord, ImportEnvelope, ImportSummary, RowError};
use crate::engine::record_deriver::DerivationPolicy;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::info;

/// 导入批次
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportBatchRecord {
    pub batch_id: String,
    pub file_name: Option<String>,
    pub sheet_name: String,
    pub success: bool,
    pub summary: ImportSummary,
    pub warnings: Vec<String>,
    pub errors: Vec<RowError>,
    pub imported_at: String,
}

/// 已落库的派生记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredIncident {
    pub record_id: i64,
    pub batch_id: String,
    pub record: DerivedRecord,
}

const RECORD_COLUMNS: &str = "record_id, batch_id, row_number, ticket_id, ticket_url, application, summary, \
     category, status_raw, priority_raw, business_unit, status, priority, created_at, in_window, \
     day_of_month, week_number, additional_info, linked_request_id, linked_request_url, linked_count, \
     message, status_overridden";

fn map_incident(row: &rusqlite::Row<'_>) -> rusqlite::Result<StoredIncident> {
    Ok(StoredIncident {
        record_id: row.get(0)?,
        batch_id: row.get(1)?,
        record: DerivedRecord {
            row_number: row.get::<_, i64>(2)? as usize,
            ticket_id: row.get(3)?,
            ticket_url: row.get(4)?,
            application: row.get(5)?,
            summary: row.get(6)?,
            category: row.get(7)?,
            status_raw: row.get(8)?,
            priority_raw: row.get(9)?,
            business_unit: row.get(10)?,
            status: row.get(11)?,
            priority: row.get(12)?,
            created_at: row.get(13)?,
            in_window: row.get::<_, i64>(14)? != 0,
            day_of_month: row.get(15)?,
            week_number: row.get(16)?,
            additional_info: row.get(17)?,
            linked_request_id: row.get(18)?,
            linked_request_url: row.get(19)?,
            linked_count: row.get::<_, i64>(20)? as usize,
            message: row.get(21)?,
            status_overridden: row.get::<_, i64>(22)? != 0,
        },
    })
}

pub struct IncidentRecordRepository {
    conn: Arc<Mutex<Connection>>,
}

impl IncidentRecordRepository {
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        init_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 保存一次导入的结果信封（批次 + 全部记录，单事务）
    ///
    /// # 返回
    /// - 写入的记录条数
    pub fn save_envelope(
        &self,
        envelope: &ImportEnvelope,
        file_name: Option<&str>,
        sheet_name: &str,
    ) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let tx = conn.unchecked_transaction()?;

        tx.execute(
            r#"
            INSERT INTO import_batch (
                batch_id, file_name, sheet_name, success, total_rows, succeeded,
                rejected, failed, warnings_json, errors_json, imported_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
            params![
                envelope.batch_id,
                file_name,
                sheet_name,
                envelope.success as i32,
                envelope.summary.total_rows as i64,
                envelope.summary.succeeded as i64,
                envelope.summary.rejected as i64,
                envelope.summary.failed as i64,
                serde_json::to_string(&envelope.warnings)?,
                serde_json::to_string(&envelope.errors)?,
                Utc::now().to_rfc3339(),
            ],
        )?;

        let count = Self::insert_records_tx(&tx, &envelope.batch_id, &envelope.records)?;
        tx.commit()?;

        info!(batch_id = %envelope.batch_id, records = count, "导入批次已落库");
        Ok(count)
    }

    fn insert_records_tx(
        tx: &Transaction,
        batch_id: &str,
        records: &[DerivedRecord],
    ) -> RepositoryResult<usize> {
        let mut stmt = tx.prepare(
            r#"
            INSERT INTO incident_record (
                batch_id, row_number, ticket_id, ticket_url, application, summary,
                category, status_raw, priority_raw, business_unit, status, priority,
                created_at, in_window, day_of_month, week_number, additional_info,
                linked_request_id, linked_request_url, linked_count, message, status_overridden
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12,
                ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22
            )
            "#,
        )?;

        let mut count = 0;
        for record in records {
            stmt.execute(params![
                batch_id,
                record.row_number as i64,
                record.ticket_id,
                record.ticket_url,
                record.application,
                record.summary,
                record.category,
                record.status_raw,
                record.priority_raw,
                record.business_unit,
                record.status,
                record.priority,
                record.created_at,
                record.in_window as i32,
                record.day_of_month,
                record.week_number,
                record.additional_info,
                record.linked_request_id,
                record.linked_request_url,
                record.linked_count as i64,
                record.message,
                record.status_overridden as i32,
            ])?;
            count += 1;
        }
        Ok(count)
    }

    pub fn find_batch(&self, batch_id: &str) -> RepositoryResult<Option<ImportBatchRecord>> {
        let conn = self.get_conn()?;
        let row = conn
            .query_row(
                r#"
                SELECT batch_id, file_name, sheet_name, success, total_rows, succeeded,
                       rejected, failed, warnings_json, errors_json, imported_at
                FROM import_batch WHERE batch_id = ?1
                "#,
                params![batch_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, Option<String>>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, i64>(3)? != 0,
                        [
                            row.get::<_, i64>(4)?,
                            row.get::<_, i64>(5)?,
                            row.get::<_, i64>(6)?,
                            row.get::<_, i64>(7)?,
                        ],
                        row.get::<_, String>(8)?,
                        row.get::<_, String>(9)?,
                        row.get::<_, String>(10)?,
                    ))
                },
            )
            .optional()?;

        let Some((batch_id, file_name, sheet_name, success, counts, warnings_json, errors_json, imported_at)) =
            row
        else {
            return Ok(None);
        };

        let warnings: Vec<String> = serde_json::from_str(&warnings_json)?;
        let errors: Vec<RowError> = serde_json::from_str(&errors_json)?;
        Ok(Some(ImportBatchRecord {
            batch_id,
            file_name,
            sheet_name,
            success,
            summary: ImportSummary {
                total_rows: counts[0] as usize,
                succeeded: counts[1] as usize,
                rejected: counts[2] as usize,
                failed: counts[3] as usize,
                warnings: warnings.len(),
            },
            warnings,
            errors,
            imported_at,
        }))
    }

    /// 批次内记录（按工作表行号）
    pub fn list_by_batch(&self, batch_id: &str) -> RepositoryResult<Vec<StoredIncident>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM incident_record WHERE batch_id = ?1 ORDER BY row_number ASC",
            RECORD_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![batch_id], map_incident)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn find_record(&self, record_id: i64) -> RepositoryResult<Option<StoredIncident>> {
        let conn = self.get_conn()?;
        let sql = format!("SELECT {} FROM incident_record WHERE record_id = ?1", RECORD_COLUMNS);
        Ok(conn.query_row(&sql, params![record_id], map_incident).optional()?)
    }

    /// 人工状态覆写（校验由 DerivationPolicy 完成）
    ///
    /// # 返回
    /// - Ok(DerivedRecord): 覆写后的记录
    /// - Err(OverrideRejected): 原始状态不允许覆写 / 已覆写过 / 待修复冲突
    pub fn apply_status_override(
        &self,
        record_id: i64,
        new_status: &str,
        policy: &DerivationPolicy,
    ) -> RepositoryResult<DerivedRecord> {
        let conn = self.get_conn()?;
        let tx = conn.unchecked_transaction()?;

        let sql = format!("SELECT {} FROM incident_record WHERE record_id = ?1", RECORD_COLUMNS);
        let mut stored = tx
            .query_row(&sql, params![record_id], map_incident)
            .optional()?
            .ok_or_else(|| RepositoryError::NotFound {
                entity: "IncidentRecord".to_string(),
                id: record_id.to_string(),
            })?;

        policy.apply_status_override(&mut stored.record, new_status)?;

        tx.execute(
            r#"
            UPDATE incident_record
            SET status = ?2, additional_info = ?3, status_overridden = 1
            WHERE record_id = ?1
            "#,
            params![record_id, stored.record.status, stored.record.additional_info],
        )?;
        tx.commit()?;

        info!(record_id, ticket_id = %stored.record.ticket_id, status = %stored.record.status, "状态已人工覆写");
        Ok(stored.record)
    }

    /// 删除批次（记录级联删除）
    pub fn delete_batch(&self, batch_id: &str) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let affected = conn.execute("DELETE FROM import_batch WHERE batch_id = ?1", params![batch_id])?;
        if affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "ImportBatch".to_string(),
                id: batch_id.to_string(),
            });
        }
        Ok(())
    }
}
