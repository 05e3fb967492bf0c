use dashmap::DashMap;

/// Company ids longer than this never resolve to a token.
pub const MAX_COMPANY_ID_LEN: usize = 128;

pub const TOKEN_ENV_PREFIX: &str = "QWISHI_SQUARE_TOKEN_";

/// Resolves the per-merchant Square access token for a QwiSHi company.
/// `None` means the company is not authorized to reach the platform.
pub trait MerchantTokenSource: Send + Sync {
    fn token_for(&self, company_id: &str) -> Option<String>;
}

/// Reads `QWISHI_SQUARE_TOKEN_<COMPANY>` from the process environment,
/// where `<COMPANY>` is the company id upper-cased with every
/// non-alphanumeric character replaced by `_`.
#[derive(Debug, Clone, Default)]
pub struct EnvTokenSource {
    prefix: String,
}

impl EnvTokenSource {
    pub fn new() -> Self {
        Self::with_prefix(TOKEN_ENV_PREFIX)
    }

    pub fn with_prefix(prefix: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
        }
    }

    /// Environment variable consulted for `company_id`, or `None` if the id
    /// cannot name one.
    pub fn var_name(&self, company_id: &str) -> Option<String> {
        if company_id.is_empty() || company_id.len() > MAX_COMPANY_ID_LEN {
            return None;
        }
        let suffix: String = company_id
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() {
                    c.to_ascii_uppercase()
                } else {
                    '_'
                }
            })
            .collect();
        Some(format!("{}{suffix}", self.prefix))
    }
}

impl MerchantTokenSource for EnvTokenSource {
    fn token_for(&self, company_id: &str) -> Option<String> {
        let var = self.var_name(company_id)?;
        std::env::var(var).ok().filter(|t| !t.trim().is_empty())
    }
}

/// Fixed company → token table.
#[derive(Debug, Default)]
pub struct StaticTokenSource {
    tokens: DashMap<String, String>,
}

impl StaticTokenSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(self, company_id: &str, token: &str) -> Self {
        self.insert(company_id, token);
        self
    }

    pub fn insert(&self, company_id: &str, token: &str) {
        self.tokens.insert(company_id.to_string(), token.to_string());
    }

    pub fn revoke(&self, company_id: &str) {
        self.tokens.remove(company_id);
    }
}

impl MerchantTokenSource for StaticTokenSource {
    fn token_for(&self, company_id: &str) -> Option<String> {
        self.tokens.get(company_id).map(|t| t.value().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn var_name_is_sanitized() {
        let src = EnvTokenSource::new();
        assert_eq!(
            src.var_name("company_123").as_deref(),
            Some("QWISHI_SQUARE_TOKEN_COMPANY_123")
        );
        assert_eq!(
            src.var_name("../evil co").as_deref(),
            Some("QWISHI_SQUARE_TOKEN____EVIL_CO")
        );
        assert!(src.var_name("").is_none());
        assert!(src.var_name(&"x".repeat(MAX_COMPANY_ID_LEN + 1)).is_none());
    }

    #[test]
    fn env_token_resolves_and_blank_is_absent() {
        // Unique prefix so parallel tests never share variables.
        let src = EnvTokenSource::with_prefix("QWISHI_TEST_ENV_TOKEN_");
        unsafe {
            std::env::set_var("QWISHI_TEST_ENV_TOKEN_CO1", "sq-token");
            std::env::set_var("QWISHI_TEST_ENV_TOKEN_CO2", "  ");
        }
        assert_eq!(src.token_for("co1").as_deref(), Some("sq-token"));
        assert!(src.token_for("co2").is_none());
        assert!(src.token_for("co3").is_none());
    }

    #[test]
    fn static_tokens_can_be_revoked() {
        let src = StaticTokenSource::new().with_token("co1", "t1");
        assert_eq!(src.token_for("co1").as_deref(), Some("t1"));
        src.revoke("co1");
        assert!(src.token_for("co1").is_none());
    }
}
