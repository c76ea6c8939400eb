//! Bank resources and their query parameters

use serde::Deserialize;
use url::{Url, form_urlencoded};

use crate::{Error, Result};

/// Placeholder in configured URLs replaced by the account id
const ID_PLACEHOLDER: &str = "{id}";

fn default_page() -> String {
    "0".to_string()
}

fn default_size() -> String {
    "1".to_string()
}

fn default_id() -> String {
    "1".to_string()
}

fn default_start_date() -> String {
    "2016-09-04T00:00:00+01:00".to_string()
}

fn default_end_date() -> String {
    "2018-09-04T00:00:00+01:00".to_string()
}

/// `/corpaccounts` parameters
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CorpAccountsQuery {
    /// Page number
    #[serde(default = "default_page")]
    pub page: String,
    /// Page size
    #[serde(default = "default_size")]
    pub size: String,
    /// Sort field
    pub sort: Option<String>,
    /// `asc` / `desc`
    pub order: Option<String>,
}

impl Default for CorpAccountsQuery {
    fn default() -> Self {
        Self {
            page: default_page(),
            size: default_size(),
            sort: None,
            order: None,
        }
    }
}

/// `/corpaccbalance` parameters
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CorpBalanceQuery {
    /// Account id
    #[serde(default = "default_id")]
    pub id: String,
}

/// `/corptranshist` parameters
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorpTransHistoryQuery {
    /// Account id
    #[serde(default = "default_id")]
    pub id: String,
    /// Page number
    #[serde(default = "default_page")]
    pub page: String,
    /// Page size
    #[serde(default = "default_size")]
    pub size: String,
    /// Sort field
    pub sort: Option<String>,
    /// `asc` / `desc`
    pub order: Option<String>,
    /// Start of the listed period (ISO 8601)
    #[serde(default = "default_start_date")]
    pub start_date: String,
    /// End of the listed period (ISO 8601)
    #[serde(default = "default_end_date")]
    pub end_date: String,
}

/// `/persaccounts` parameters
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersAccountsQuery {
    /// Page number
    #[serde(default = "default_page")]
    pub page: String,
    /// Page size
    #[serde(default = "default_size")]
    pub size: String,
    /// Sort field
    pub sort: Option<String>,
    /// `asc` / `desc`
    pub order: Option<String>,
    /// Comma-separated product types, e.g. `CURRENT`
    #[serde(rename = "type")]
    pub account_type: Option<String>,
    /// Comma-separated flags an account must all have, e.g. `netPayAllowed`
    pub flag_filter: Option<String>,
}

/// A bank API resource together with its parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resource {
    /// Corporate accounts list
    CorpAccounts(CorpAccountsQuery),
    /// Corporate account balance
    CorpBalance(CorpBalanceQuery),
    /// Corporate transaction history
    CorpTransHistory(CorpTransHistoryQuery),
    /// Personal accounts list
    PersAccounts(PersAccountsQuery),
}

impl Resource {
    /// Name used in logs
    pub fn name(&self) -> &'static str {
        match self {
            Self::CorpAccounts(_) => "corp_accounts",
            Self::CorpBalance(_) => "corp_balance",
            Self::CorpTransHistory(_) => "corp_trans_history",
            Self::PersAccounts(_) => "pers_accounts",
        }
    }

    /// Account id substituted into the URL path, if any
    fn account_id(&self) -> Option<&str> {
        match self {
            Self::CorpBalance(q) => Some(&q.id),
            Self::CorpTransHistory(q) => Some(&q.id),
            Self::CorpAccounts(_) | Self::PersAccounts(_) => None,
        }
    }

    /// Query pairs sent to the bank. Absent optional values are omitted.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        match self {
            Self::CorpAccounts(q) => {
                push_paging(&mut pairs, &q.page, &q.size, q.sort.as_ref(), q.order.as_ref());
            }
            Self::CorpBalance(_) => {}
            Self::CorpTransHistory(q) => {
                push_paging(&mut pairs, &q.page, &q.size, q.sort.as_ref(), q.order.as_ref());
                pairs.push(("dateStart", q.start_date.clone()));
                pairs.push(("dateEnd", q.end_date.clone()));
            }
            Self::PersAccounts(q) => {
                push_paging(&mut pairs, &q.page, &q.size, q.sort.as_ref(), q.order.as_ref());
                if let Some(t) = &q.account_type {
                    pairs.push(("type", t.clone()));
                }
                if let Some(f) = &q.flag_filter {
                    pairs.push(("flagFilter", f.clone()));
                }
            }
        }
        pairs
    }

    /// Expand a configured URL template into the request URL
    pub(crate) fn build_url(&self, template: &str) -> Result<Url> {
        let expanded = match self.account_id() {
            Some(id) => template.replace(ID_PLACEHOLDER, &encode_path_segment(id)),
            None => template.to_string(),
        };

        let mut url = Url::parse(&expanded).map_err(|e| {
            Error::Config(format!("Invalid URL for {} ({template:?}): {e}", self.name()))
        })?;

        let pairs = self.query_pairs();
        if !pairs.is_empty() {
            let mut query = url.query_pairs_mut();
            for (key, value) in &pairs {
                query.append_pair(key, value);
            }
        }

        Ok(url)
    }
}

fn push_paging(
    pairs: &mut Vec<(&'static str, String)>,
    page: &str,
    size: &str,
    sort: Option<&String>,
    order: Option<&String>,
) {
    pairs.push(("page", page.to_string()));
    pairs.push(("size", size.to_string()));
    if let Some(sort) = sort {
        pairs.push(("sort", sort.clone()));
    }
    if let Some(order) = order {
        pairs.push(("order", order.clone()));
    }
}

/// Percent-encode a single path segment
fn encode_path_segment(value: &str) -> String {
    // form encoding escapes everything but [A-Za-z0-9*-._]; '+' only ever stands for a space
    form_urlencoded::byte_serialize(value.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}
