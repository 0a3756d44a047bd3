// ==========================================
// 运维事件报表导入系统 - 分类规则仓储
// ==========================================
// 职责: 管理 classification_rule 表（业务单元 / 状态映射）
// 规则: 读取顺序 priority 升序 → display_order → rule_id
// 红线: Repository 不含业务规则，只做数据 CRUD
// ==========================================

use crate::db::{init_schema, open_sqlite_connection};
use crate::domain::rule::{ClassificationRule, PatternType, RulePurpose, RuleSet};
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::incident_importer_trait::RuleSetSource;
use crate::repository::error::{RepositoryError, RepositoryResult};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::info;

/// 已存储的分类规则
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredRule {
    pub rule_id: i64,
    pub purpose: RulePurpose,
    pub rule: ClassificationRule,
    pub display_order: i64,
    pub created_at: String,
    pub updated_at: String,
}

// 原始行（枚举列尚未解析）
struct RuleRow {
    rule_id: i64,
    purpose: String,
    pattern: String,
    pattern_type: String,
    priority: i32,
    target: String,
    active: bool,
    display_order: i64,
    created_at: String,
    updated_at: String,
}

impl RuleRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            rule_id: row.get(0)?,
            purpose: row.get(1)?,
            pattern: row.get(2)?,
            pattern_type: row.get(3)?,
            priority: row.get(4)?,
            target: row.get(5)?,
            active: row.get::<_, i64>(6)? != 0,
            display_order: row.get(7)?,
            created_at: row.get(8)?,
            updated_at: row.get(9)?,
        })
    }

    fn into_stored(self) -> RepositoryResult<StoredRule> {
        let purpose = RulePurpose::parse(&self.purpose).ok_or_else(|| RepositoryError::FieldValueError {
            field: "purpose".to_string(),
            message: format!("未知规则用途: {}", self.purpose),
        })?;
        let pattern_type =
            PatternType::parse(&self.pattern_type).ok_or_else(|| RepositoryError::FieldValueError {
                field: "pattern_type".to_string(),
                message: format!("未知匹配方式: {}", self.pattern_type),
            })?;

        Ok(StoredRule {
            rule_id: self.rule_id,
            purpose,
            rule: ClassificationRule {
                pattern: self.pattern,
                pattern_type,
                priority: self.priority,
                target: self.target,
                active: self.active,
            },
            display_order: self.display_order,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

const SELECT_COLUMNS: &str = "SELECT rule_id, purpose, pattern, pattern_type, priority, target, active, \
     display_order, created_at, updated_at FROM classification_rule";

pub struct ClassificationRuleRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ClassificationRuleRepository {
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

    /// 新增规则（追加到同用途展示顺序末尾）
    ///
    /// # 返回
    /// - 新规则的 rule_id
    pub fn create(&self, purpose: RulePurpose, rule: &ClassificationRule) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO classification_rule (
                purpose, pattern, pattern_type, priority, target, active, display_order
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6,
                (SELECT COALESCE(MAX(display_order), 0) + 1 FROM classification_rule WHERE purpose = ?1)
            )
            "#,
            params![
                purpose.to_string(),
                rule.pattern,
                rule.pattern_type.to_string(),
                rule.priority,
                rule.target,
                rule.active as i32,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// 更新规则内容（用途不可变）
    pub fn update(&self, rule_id: i64, rule: &ClassificationRule) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            r#"
            UPDATE classification_rule
            SET pattern = ?2, pattern_type = ?3, priority = ?4, target = ?5, active = ?6,
                updated_at = datetime('now')
            WHERE rule_id = ?1
            "#,
            params![
                rule_id,
                rule.pattern,
                rule.pattern_type.to_string(),
                rule.priority,
                rule.target,
                rule.active as i32,
            ],
        )?;
        ensure_found(affected, rule_id)
    }

    /// 启用 / 停用规则
    pub fn set_active(&self, rule_id: i64, active: bool) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            "UPDATE classification_rule SET active = ?2, updated_at = datetime('now') WHERE rule_id = ?1",
            params![rule_id, active as i32],
        )?;
        ensure_found(affected, rule_id)
    }

    pub fn delete(&self, rule_id: i64) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            "DELETE FROM classification_rule WHERE rule_id = ?1",
            params![rule_id],
        )?;
        ensure_found(affected, rule_id)
    }

    pub fn find_by_id(&self, rule_id: i64) -> RepositoryResult<Option<StoredRule>> {
        let conn = self.get_conn()?;
        let row = conn
            .query_row(
                &format!("{} WHERE rule_id = ?1", SELECT_COLUMNS),
                params![rule_id],
                RuleRow::from_row,
            )
            .optional()?;
        row.map(RuleRow::into_stored).transpose()
    }

    /// 按用途列出规则（生效顺序）
    pub fn list_by_purpose(
        &self,
        purpose: RulePurpose,
        include_inactive: bool,
    ) -> RepositoryResult<Vec<StoredRule>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "{} WHERE purpose = ?1 AND (?2 OR active = 1) ORDER BY priority ASC, display_order ASC, rule_id ASC",
            SELECT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![purpose.to_string(), include_inactive], RuleRow::from_row)?;

        let mut rules = Vec::new();
        for row in rows {
            rules.push(row?.into_stored()?);
        }
        Ok(rules)
    }

    /// 启用规则快照
    pub fn rule_set(&self, purpose: RulePurpose) -> RepositoryResult<RuleSet> {
        let rules = self
            .list_by_purpose(purpose, false)?
            .into_iter()
            .map(|stored| stored.rule)
            .collect();
        Ok(RuleSet::new(purpose, rules))
    }

    /// 用途下无任何规则时写入内置默认规则
    ///
    /// # 返回
    /// - 写入条数（已有规则时为 0）
    pub fn seed_defaults(&self, purpose: RulePurpose) -> RepositoryResult<usize> {
        let existing: i64 = {
            let conn = self.get_conn()?;
            conn.query_row(
                "SELECT COUNT(*) FROM classification_rule WHERE purpose = ?1",
                params![purpose.to_string()],
                |row| row.get(0),
            )?
        };
        if existing > 0 {
            return Ok(0);
        }

        let defaults = match purpose {
            RulePurpose::BusinessUnit => RuleSet::default_business_units(),
            RulePurpose::StatusMapping => RuleSet::default_status_mappings(),
        };
        for rule in &defaults.rules {
            self.create(purpose, rule)?;
        }
        info!(purpose = %purpose, count = defaults.rules.len(), "已写入默认分类规则");
        Ok(defaults.rules.len())
    }
}

fn ensure_found(affected: usize, rule_id: i64) -> RepositoryResult<()> {
    if affected == 0 {
        return Err(RepositoryError::NotFound {
            entity: "ClassificationRule".to_string(),
            id: rule_id.to_string(),
        });
    }
    Ok(())
}

#[async_trait]
impl RuleSetSource for ClassificationRuleRepository {
    async fn load_rule_set(&self, purpose: RulePurpose) -> ImportResult<RuleSet> {
        self.rule_set(purpose)
            .map_err(|e| ImportError::DatabaseQueryError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repo() -> ClassificationRuleRepository {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        ClassificationRuleRepository::from_connection(Arc::new(Mutex::new(conn)))
    }

    #[test]
    fn test_list_orders_by_priority_then_insertion() {
        let repo = repo();
        let purpose = RulePurpose::BusinessUnit;
        repo.create(purpose, &ClassificationRule::new("b", PatternType::Contains, 20, "B")).unwrap();
        repo.create(purpose, &ClassificationRule::new("a", PatternType::Contains, 10, "A")).unwrap();
        repo.create(purpose, &ClassificationRule::new("c", PatternType::Contains, 20, "C")).unwrap();
        repo.create(RulePurpose::StatusMapping, &ClassificationRule::new("x", PatternType::Exact, 1, "X"))
            .unwrap();

        let targets: Vec<String> = repo
            .list_by_purpose(purpose, true)
            .unwrap()
            .into_iter()
            .map(|r| r.rule.target)
            .collect();
        assert_eq!(targets, vec!["A", "B", "C"]);
    }

    #[test]
    fn test_inactive_rules_excluded_from_rule_set() {
        let repo = repo();
        let purpose = RulePurpose::StatusMapping;
        let id = repo
            .create(purpose, &ClassificationRule::new("nivel 1", PatternType::Exact, 10, "L1"))
            .unwrap();
        repo.create(purpose, &ClassificationRule::new("nivel 2", PatternType::Exact, 10, "L2").inactive())
            .unwrap();

        assert_eq!(repo.rule_set(purpose).unwrap().rules.len(), 1);
        assert_eq!(repo.list_by_purpose(purpose, true).unwrap().len(), 2);

        repo.set_active(id, false).unwrap();
        assert!(repo.rule_set(purpose).unwrap().is_empty());
    }

    #[test]
    fn test_update_and_delete() {
        let repo = repo();
        let id = repo
            .create(RulePurpose::BusinessUnit, &ClassificationRule::new("somos", PatternType::Contains, 10, "SB"))
            .unwrap();

        let updated = ClassificationRule::new("^somos", PatternType::Regex, 5, "SB");
        repo.update(id, &updated).unwrap();
        let stored = repo.find_by_id(id).unwrap().unwrap();
        assert_eq!(stored.rule, updated);
        assert_eq!(stored.purpose, RulePurpose::BusinessUnit);

        repo.delete(id).unwrap();
        assert!(repo.find_by_id(id).unwrap().is_none());
        assert!(matches!(
            repo.delete(id),
            Err(RepositoryError::NotFound { .. })
        ));
    }

    #[test]
    fn test_seed_defaults_only_once() {
        let repo = repo();
        let seeded = repo.seed_defaults(RulePurpose::BusinessUnit).unwrap();
        assert_eq!(seeded, RuleSet::default_business_units().rules.len());
        assert_eq!(repo.seed_defaults(RulePurpose::BusinessUnit).unwrap(), 0);
        assert_eq!(
            repo.rule_set(RulePurpose::BusinessUnit).unwrap().rules,
            RuleSet::default_business_units().rules
        );
    }

    #[tokio::test]
    async fn test_rule_set_source() {
        let repo = repo();
        let rules = repo.load_rule_set(RulePurpose::StatusMapping).await.unwrap();
        assert!(rules.is_empty());
    }
}
