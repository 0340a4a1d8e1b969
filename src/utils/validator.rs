use anyhow::Result;
use std::collections::HashSet;

pub fn is_valid_url(url: &str) -> bool {
    url::Url::parse(url)
        .map(|u| matches!(u.scheme(), "http" | "https"))
        .unwrap_or(false)
}

/// 条目标识会被拼进页面地址，不能包含空白和路径分隔符
pub fn is_valid_identifier(identifier: &str) -> bool {
    !identifier.is_empty()
        && !identifier
            .chars()
            .any(|c| c.is_whitespace() || c.is_control() || matches!(c, '/' | '\\' | '?' | '#'))
}

pub fn validate_identifiers(identifiers: &[String]) -> Result<()> {
    if identifiers.is_empty() {
        anyhow::bail!("未提供任何条目标识。请通过命令行参数或文件提供至少一个。");
    }
    if let Some(bad) = identifiers.iter().find(|id| !is_valid_identifier(id)) {
        anyhow::bail!("无效的条目标识: {:?}", bad);
    }
    let mut seen = HashSet::new();
    if let Some(dup) = identifiers.iter().find(|id| !seen.insert(id.as_str())) {
        anyhow::bail!("条目标识重复: {}", dup);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_validation() {
        assert!(is_valid_url("https://sp.freehat.cc/episode/s01e01/"));
        assert!(is_valid_url("http://example.com"));
        assert!(!is_valid_url("ftp://example.com/a.mp4"));
        assert!(!is_valid_url("invalid-url"));
    }

    #[test]
    fn test_identifier_validation() {
        assert!(is_valid_identifier("s01e01"));
        assert!(is_valid_identifier("1001"));
        assert!(!is_valid_identifier(""));
        assert!(!is_valid_identifier("s01 e01"));
        assert!(!is_valid_identifier("../etc"));
    }

    #[test]
    fn test_identifiers_validation() {
        let ids = |v: &[&str]| v.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        assert!(validate_identifiers(&ids(&["s01e01", "s01e02"])).is_ok());
        assert!(validate_identifiers(&[]).is_err());
        assert!(validate_identifiers(&ids(&["s01e01", "a?b"])).is_err());
        assert!(validate_identifiers(&ids(&["s01e01", "s01e01"])).is_err());
    }
}
