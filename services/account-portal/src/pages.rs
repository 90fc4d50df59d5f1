//! HTML pages
//!
//! Templates are compiled into the binary and loaded once at startup; a
//! broken template fails startup, not the first request that uses it.

use axum::response::Html;
use force_api::Account;
use minijinja::{Environment, context};
use time::format_description::well_known::Rfc3339;

use crate::error::AppError;
use crate::session::Session;

const TEMPLATES: &[(&str, &str)] = &[
    ("layout.html", include_str!("../templates/layout.html")),
    ("index.html", include_str!("../templates/index.html")),
    ("accounts.html", include_str!("../templates/accounts.html")),
    ("account.html", include_str!("../templates/account.html")),
    ("edit_account.html", include_str!("../templates/edit_account.html")),
];

pub struct Pages {
    env: Environment<'static>,
}

impl Pages {
    pub fn new() -> Result<Self, minijinja::Error> {
        let mut env = Environment::new();
        for &(name, source) in TEMPLATES {
            env.add_template(name, source)?;
        }
        Ok(Self { env })
    }

    fn render(&self, name: &str, ctx: minijinja::Value) -> Result<Html<String>, AppError> {
        self.env
            .get_template(name)
            .and_then(|template| template.render(ctx))
            .map(Html)
            .map_err(|e| AppError::Render(format!("{name}: {e}")))
    }

    /// Landing page for an authenticated session.
    pub fn index(&self, session: &Session) -> Result<Html<String>, AppError> {
        let instance_url = session.auth.as_ref().map(|auth| auth.instance_url.as_str());
        let logged_at = session
            .logged_at
            .and_then(|at| at.format(&Rfc3339).ok());
        self.render(
            "index.html",
            context! { instance_url => instance_url, logged_at => logged_at },
        )
    }

    pub fn accounts(
        &self,
        accounts: &[Account],
        country: Option<&str>,
    ) -> Result<Html<String>, AppError> {
        self.render(
            "accounts.html",
            context! { accounts => accounts, country => country.filter(|c| !c.is_empty()) },
        )
    }

    pub fn account(&self, account: &Account) -> Result<Html<String>, AppError> {
        self.render("account.html", context! { account => account })
    }

    pub fn edit_account(&self, account: &Account) -> Result<Html<String>, AppError> {
        self.render("edit_account.html", context! { account => account })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use force_auth::AuthInfo;

    fn acme() -> Account {
        Account {
            id: "001xx000003DGb2AAG".into(),
            name: Some("Acme <Corp>".into()),
            account_type: Some("Customer - Direct".into()),
            industry: Some("Manufacturing".into()),
            billing_country: Some("France".into()),
        }
    }

    #[test]
    fn all_templates_compile() {
        assert!(Pages::new().is_ok());
    }

    #[test]
    fn index_shows_instance() {
        let pages = Pages::new().unwrap();
        let mut session = Session::default();
        session.start(AuthInfo::new("X", "https://na1.crm.example"));

        let Html(body) = pages.index(&session).unwrap();
        // Autoescape renders slashes as entities.
        assert!(body.contains("https:&#x2f;&#x2f;na1.crm.example"), "{body}");
        assert!(!body.contains(">X<"), "token must never be rendered");
    }

    #[test]
    fn accounts_lists_rows_and_escapes() {
        let pages = Pages::new().unwrap();
        let Html(body) = pages.accounts(&[acme()], Some("France")).unwrap();
        assert!(body.contains("/account/001xx000003DGb2AAG"));
        assert!(body.contains("Acme &lt;Corp&gt;"));
        assert!(body.contains("Accounts in France"));
    }

    #[test]
    fn empty_listing() {
        let pages = Pages::new().unwrap();
        let Html(body) = pages.accounts(&[], None).unwrap();
        assert!(body.contains("No accounts found."));
    }

    #[test]
    fn account_page_links_to_edit() {
        let pages = Pages::new().unwrap();
        let Html(body) = pages.account(&acme()).unwrap();
        assert!(body.contains("/account/001xx000003DGb2AAG/edit"));
        assert!(body.contains("Manufacturing"));
    }

    #[test]
    fn account_links_encode_id_and_blank_missing_fields() {
        let pages = Pages::new().unwrap();
        let account = Account {
            id: "001 A".into(),
            name: Some("Initech".into()),
            account_type: None,
            industry: None,
            billing_country: None,
        };

        let Html(listing) = pages.accounts(std::slice::from_ref(&account), None).unwrap();
        assert!(listing.contains(r#"href="/account/001%20A""#), "{listing}");
        assert!(!listing.contains("none"));

        let Html(detail) = pages.account(&account).unwrap();
        assert!(detail.contains(r#"href="/account/001%20A/edit""#), "{detail}");
        assert!(!detail.contains("none"));
    }

    #[test]
    fn edit_form_posts_crm_field_names() {
        let pages = Pages::new().unwrap();
        let account = Account {
            industry: None,
            ..acme()
        };
        let Html(body) = pages.edit_account(&account).unwrap();
        assert!(body.contains(r#"action="/account/update""#));
        assert!(body.contains(r#"name="Id" type="hidden" value="001xx000003DGb2AAG""#));
        assert!(body.contains(r#"name="BillingCountry""#));
        assert!(body.contains(r#"name="Industry" type="text" value="""#));
    }
}
