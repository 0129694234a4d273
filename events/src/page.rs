use serde::{Deserialize, Serialize};
use std::fmt;

/// The view a client is currently showing. The five house pages list the
/// prefects of one house each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Page {
    Events,
    Dashboard,
    Aquila,
    Cetus,
    Cygnus,
    Ursa,
    Central,
    Main,
    #[serde(other)]
    Unknown,
}

impl Page {
    pub fn as_str(&self) -> &'static str {
        match self {
            Page::Events => "events",
            Page::Dashboard => "dashboard",
            Page::Aquila => "aquila",
            Page::Cetus => "cetus",
            Page::Cygnus => "cygnus",
            Page::Ursa => "ursa",
            Page::Central => "central",
            Page::Main => "main",
            Page::Unknown => "unknown",
        }
    }

    /// Classifies a URL path. First match wins, in the order the admin pages were
    /// historically detected, so `/events/dashboard` is still the events page.
    pub fn detect(path: &str) -> Page {
        if path.contains("events") {
            Page::Events
        } else if path.contains("dashboard") {
            Page::Dashboard
        } else if path.contains("aquila.html") {
            Page::Aquila
        } else if path.contains("cetus.html") {
            Page::Cetus
        } else if path.contains("cygnus.html") {
            Page::Cygnus
        } else if path.contains("ursa.html") {
            Page::Ursa
        } else if path.contains("central.html") {
            Page::Central
        } else if path.contains("main") {
            Page::Main
        } else {
            Page::Unknown
        }
    }

    /// The house this page lists, if it is a house page.
    pub fn house(&self) -> Option<&'static str> {
        match self {
            Page::Aquila | Page::Cetus | Page::Cygnus | Page::Ursa | Page::Central => {
                Some(self.as_str())
            }
            _ => None,
        }
    }

    pub fn is_house_page(&self) -> bool {
        self.house().is_some()
    }
}

impl fmt::Display for Page {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for Page {
    fn from(value: &str) -> Self {
        match value.to_lowercase().as_str() {
            "events" => Page::Events,
            "dashboard" => Page::Dashboard,
            "aquila" => Page::Aquila,
            "cetus" => Page::Cetus,
            "cygnus" => Page::Cygnus,
            "ursa" => Page::Ursa,
            "central" => Page::Central,
            "main" => Page::Main,
            _ => Page::Unknown,
        }
    }
}
