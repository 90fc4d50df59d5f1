//! SOQL query construction for account listings

/// Fields fetched for every account listing.
pub const ACCOUNT_FIELDS: &str = "Id, Name, Type, Industry, BillingCountry";

/// Which accounts a listing should return.
///
/// At most one filter applies, so a query never carries more than one
/// `WHERE` clause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountFilter {
    All,
    Country(String),
    Id(String),
}

impl AccountFilter {
    /// Build a filter from optional request inputs.
    ///
    /// Empty strings count as absent. If both are given the id wins, since it
    /// identifies a single record.
    pub fn from_parts(country: Option<&str>, id: Option<&str>) -> Self {
        let non_empty = |s: Option<&str>| s.filter(|v| !v.is_empty()).map(str::to_owned);
        match (non_empty(country), non_empty(id)) {
            (_, Some(id)) => Self::Id(id),
            (Some(country), None) => Self::Country(country),
            (None, None) => Self::All,
        }
    }
}

/// Build the account query for a filter.
pub fn account_query(filter: &AccountFilter) -> String {
    let base = format!("SELECT {ACCOUNT_FIELDS} FROM Account");
    match filter {
        AccountFilter::All => base,
        AccountFilter::Country(country) => {
            format!("{base} WHERE BillingCountry='{}'", escape_literal(country))
        }
        AccountFilter::Id(id) => format!("{base} WHERE Id='{}'", escape_literal(id)),
    }
}

/// Escape a value for use inside a single-quoted SOQL string literal.
pub fn escape_literal(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if c == '\\' || c == '\'' {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
