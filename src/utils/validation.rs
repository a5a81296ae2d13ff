use crate::error::{AppError, Result};
use regex::Regex;
use std::sync::OnceLock;

/// 验证门店编码格式
/// 门店编码由 Rainbow-Auth 分配，2-10位大写字母或数字
pub fn validate_branch_code(branch_code: &str) -> Result<()> {
    if branch_code.trim().is_empty() {
        return Err(AppError::Validation("门店编码不能为空".to_string()));
    }

    static BRANCH_CODE: OnceLock<Regex> = OnceLock::new();
    let pattern = BRANCH_CODE.get_or_init(|| Regex::new(r"^[A-Z0-9]{2,10}$").unwrap());

    if !pattern.is_match(branch_code) {
        return Err(AppError::Validation(
            "门店编码只能包含2-10位大写字母或数字".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_wellformed_branch_codes() {
        assert!(validate_branch_code("SH01").is_ok());
        assert!(validate_branch_code("BJ").is_ok());
        assert!(validate_branch_code("STORE12345").is_ok());
    }

    #[test]
    fn rejects_malformed_branch_codes() {
        assert!(validate_branch_code("").is_err());
        assert!(validate_branch_code("sh01").is_err());
        assert!(validate_branch_code("S").is_err());
        assert!(validate_branch_code("TOOLONGBRANCH").is_err());
        assert!(validate_branch_code("SH-01").is_err());
    }
}
