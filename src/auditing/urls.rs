//! Named routes of the catalog web front-end, reversed into absolute URLs.

use crate::catalog::Service;
use crate::errors::AuditError;

/// Route name of the per-service audit report page.
pub const AUDIT_REPORT: &str = "audit_report";
/// Route name of the audit overview page.
pub const AUDIT_OVERVIEW: &str = "audit_overview";

/// Route table: name and path segments, `{}` marking a positional argument.
const ROUTES: &[(&str, &[&str])] = &[
    (AUDIT_OVERVIEW, &["audit"]),
    (AUDIT_REPORT, &["audit", "{}", "{}", "{}"]),
];

#[derive(Debug, Clone)]
pub struct UrlReverser {
    base_url: String,
}

impl UrlReverser {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build the URL of `route` with `args` filled in order.
    pub fn reverse(&self, route: &str, args: &[&str]) -> Result<String, AuditError> {
        let no_match = || AuditError::NoReverseMatch {
            route: route.to_string(),
            arity: args.len(),
        };
        let (_, segments) = ROUTES
            .iter()
            .find(|(name, _)| *name == route)
            .ok_or_else(no_match)?;

        let placeholders = segments.iter().filter(|s| **s == "{}").count();
        if placeholders != args.len() || args.iter().any(|a| a.is_empty() || a.contains('/')) {
            return Err(no_match());
        }

        let mut args = args.iter();
        let mut url = self.base_url.clone();
        for segment in *segments {
            url.push('/');
            if *segment == "{}" {
                // Counted above, so there is always an argument left here.
                url.push_str(args.next().copied().unwrap_or_default());
            } else {
                url.push_str(segment);
            }
        }
        url.push('/');
        Ok(url)
    }

    /// Audit report page of one service.
    pub fn audit_report_url(&self, service: &Service) -> Result<String, AuditError> {
        self.reverse(
            AUDIT_REPORT,
            &["services", &service.owner_slug, &service.name_slug],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> Service {
        Service {
            id: 1,
            owner: "Platform".into(),
            name: "Billing API".into(),
            owner_slug: "platform".into(),
            name_slug: "billing-api".into(),
            slack_channel: Some("#billing".into()),
            repository_id: Some(1),
        }
    }

    #[test]
    fn test_audit_report_url() {
        let urls = UrlReverser::new("https://zoo.example.com/");
        assert_eq!(
            urls.audit_report_url(&service()).unwrap(),
            "https://zoo.example.com/audit/services/platform/billing-api/"
        );
    }

    #[test]
    fn test_overview_url_takes_no_arguments() {
        let urls = UrlReverser::new("http://localhost:8000");
        assert_eq!(
            urls.reverse(AUDIT_OVERVIEW, &[]).unwrap(),
            "http://localhost:8000/audit/"
        );
    }

    #[test]
    fn test_unknown_route_or_wrong_arity_fails() {
        let urls = UrlReverser::new("http://localhost");
        assert!(matches!(
            urls.reverse("audit_detail", &[]),
            Err(AuditError::NoReverseMatch { .. })
        ));
        assert!(matches!(
            urls.reverse(AUDIT_REPORT, &["services", "platform"]),
            Err(AuditError::NoReverseMatch { arity: 2, .. })
        ));
        assert!(urls.reverse(AUDIT_REPORT, &["services", "a/b", "c"]).is_err());
    }
}
