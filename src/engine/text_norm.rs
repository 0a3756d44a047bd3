// ==========================================
// 运维事件报表导入系统 - 文本归一化工具
// ==========================================
// 职责: 规则匹配 / 表头匹配 / 优先级识别共用的文本归一化
// ==========================================

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// 匹配归一化: 去首尾空白 + 小写 + 连续空白折叠为单个空格
pub fn normalize_for_match(value: &str) -> String {
    value
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// 去重音（NFD 分解后丢弃组合符号）
pub fn fold_accents(value: &str) -> String {
    value.nfd().filter(|c| !is_combining_mark(*c)).collect()
}

/// 匹配归一化 + 去重音
pub fn fold_for_match(value: &str) -> String {
    fold_accents(&normalize_for_match(value))
}

/// 按非字母数字切分为小写去重音词元
pub fn tokenize(value: &str) -> Vec<String> {
    fold_for_match(value)
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_for_match() {
        assert_eq!(normalize_for_match("  Somos   Belcorp\t2.0 "), "somos belcorp 2.0");
        assert_eq!(normalize_for_match(""), "");
    }

    #[test]
    fn test_fold_accents() {
        assert_eq!(fold_accents("Crítica"), "Critica");
        assert_eq!(fold_for_match(" Fecha de Creación "), "fecha de creacion");
    }

    #[test]
    fn test_tokenize() {
        assert_eq!(tokenize("Ticket (ID)#"), vec!["ticket", "id"]);
        assert_eq!(tokenize("Información  adicional:"), vec!["informacion", "adicional"]);
    }
}
