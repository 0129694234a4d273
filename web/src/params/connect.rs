use events::{OriginId, Page};
use serde::Deserialize;

/// Query string both live update endpoints accept:
/// `?userId=<session>&page=<page>&timestamp=<millis>[&token=<credential>]`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ConnectParams {
    pub user_id: Option<String>,
    pub page: Option<String>,
    pub token: Option<String>,
}

impl ConnectParams {
    /// The session this connection belongs to. Clients that do not say get a fresh id,
    /// which means nothing they announce is ever excluded from their own stream.
    pub fn session_id(&self) -> String {
        match self.user_id.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => OriginId::generate().as_str().to_string(),
        }
    }

    pub fn has_credential(&self) -> bool {
        self.token.as_deref().is_some_and(|token| !token.is_empty())
    }

    pub fn page(&self) -> Page {
        self.page.as_deref().map(Page::from).unwrap_or(Page::Unknown)
    }
}
