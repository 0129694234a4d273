use events::Page;
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ForceRefreshParams {
    pub page: Option<String>,
    pub message: Option<String>,
}

impl ForceRefreshParams {
    /// `None` targets every page. Absent, empty and `all` all mean every page.
    pub fn target(&self) -> Option<Page> {
        match self.page.as_deref().map(str::trim) {
            None | Some("") | Some("all") => None,
            Some(page) => Some(Page::from(page)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_targets_every_page() {
        let params = ForceRefreshParams {
            page: Some("all".to_string()),
            message: None,
        };
        assert_eq!(params.target(), None);
        assert_eq!(ForceRefreshParams::default().target(), None);
    }

    #[test]
    fn a_named_page_is_targeted() {
        let params = ForceRefreshParams {
            page: Some("events".to_string()),
            message: None,
        };
        assert_eq!(params.target(), Some(Page::Events));
    }
}
