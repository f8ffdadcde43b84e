/// Public Daraja sandbox values. They must never reach a production deployment.
const SANDBOX_SHORTCODE: &str = "174379";
const SANDBOX_PASSKEY: &str = "bfb279f9aa9bdbcf158e97dd71a467cd2e0c893059b10f78e6b72ada1ed2c919";

pub fn is_production_like(env_name: &str) -> bool {
    let env = env_name.trim().to_ascii_lowercase();
    matches!(env.as_str(), "prod" | "production" | "staging")
}

fn looks_like_placeholder(value: &str) -> bool {
    let v = value.trim().to_ascii_lowercase();
    if matches!(
        v.as_str(),
        "changeme" | "change-me" | "secret" | "password" | "test" | "dummy" | "example" | "xxx"
    ) {
        return true;
    }
    ["change-me", "change_me", "replace-me", "your-", "your_", "<", ">"]
        .iter()
        .any(|frag| v.contains(frag))
}

/// Rejects placeholder or sandbox gateway credentials in prod/staging.
///
/// Unset values are accepted here: a missing credential is reported per
/// request by the payment initiator, not at startup.
pub fn validate_credential_for_env(
    env_name: &str,
    key: &str,
    value: Option<&str>,
) -> Result<(), String> {
    if !is_production_like(env_name) {
        return Ok(());
    }
    let Some(v) = value.map(str::trim).filter(|v| !v.is_empty()) else {
        return Ok(());
    };
    if looks_like_placeholder(v) {
        return Err(format!("{key} looks like a placeholder value"));
    }
    if v == SANDBOX_SHORTCODE || v.eq_ignore_ascii_case(SANDBOX_PASSKEY) {
        return Err(format!("{key} must not use the Daraja sandbox value in prod/staging"));
    }
    Ok(())
}

/// Gateway callbacks and outbound triggers must use https in prod/staging.
pub fn require_https_for_env(env_name: &str, key: &str, url: Option<&str>) -> Result<(), String> {
    let Some(url) = url.map(str::trim).filter(|u| !u.is_empty()) else {
        return Ok(());
    };
    let lower = url.to_ascii_lowercase();
    if !lower.starts_with("https://") && !lower.starts_with("http://") {
        return Err(format!("{key} must be an absolute http(s) URL"));
    }
    if is_production_like(env_name) && !lower.starts_with("https://") {
        return Err(format!("{key} must use https:// in prod/staging"));
    }
    Ok(())
}
