//! Caller identity as asserted by the upstream gateway.

use axum::http::HeaderMap;

use carebook_shared::{CoreError, Plan};

use crate::config::ServerConfig;
use crate::error::ServerError;

/// The authenticated caller of a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    /// Subject id issued by the identity provider.
    pub subject: String,
    /// Active subscription plan, if any.
    pub plan: Option<Plan>,
}

impl Caller {
    /// Read the subject and plan headers. A missing or empty subject is
    /// `Unauthorized`; an unknown plan id counts as no plan.
    pub fn from_headers(headers: &HeaderMap, config: &ServerConfig) -> Result<Self, ServerError> {
        let subject = header_str(headers, &config.identity_header)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or(CoreError::Unauthorized)?;

        let plan = header_str(headers, &config.plan_header).and_then(|raw| {
            let plan = Plan::from_id(raw);
            if plan.is_none() && !raw.trim().is_empty() {
                tracing::debug!(value = raw, "ignoring unknown plan header");
            }
            plan
        });

        Ok(Self {
            subject: subject.to_string(),
            plan,
        })
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn subject_is_required() {
        let config = ServerConfig::default();
        let mut headers = HeaderMap::new();
        let err = Caller::from_headers(&headers, &config).unwrap_err();
        assert!(matches!(err, ServerError::Core(CoreError::Unauthorized)));

        headers.insert("x-authenticated-subject", HeaderValue::from_static("  "));
        assert!(Caller::from_headers(&headers, &config).is_err());
    }

    #[test]
    fn plan_is_optional() {
        let config = ServerConfig::default();
        let mut headers = HeaderMap::new();
        headers.insert("x-authenticated-subject", HeaderValue::from_static("user_42"));

        let caller = Caller::from_headers(&headers, &config).unwrap();
        assert_eq!(caller.subject, "user_42");
        assert_eq!(caller.plan, None);

        headers.insert("x-subscription-plan", HeaderValue::from_static("premium"));
        let caller = Caller::from_headers(&headers, &config).unwrap();
        assert_eq!(caller.plan, Some(Plan::Premium));

        headers.insert("x-subscription-plan", HeaderValue::from_static("gold"));
        let caller = Caller::from_headers(&headers, &config).unwrap();
        assert_eq!(caller.plan, None);
    }
}
