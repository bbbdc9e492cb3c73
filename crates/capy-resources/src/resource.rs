//! Resource data model.
//!
//! A [`Resource`] is an immutable value once it has been handed to the
//! store. Updates are expressed as functions from the old value to a new
//! one (see [`crate::ResourceStore::update`]), never as in-place mutation.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Type discriminator of a resource.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Profile {
    Application,
    Window,
    Notification,
    Device,
    Tab,
    IconTheme,
    TrayItem,
    File,
    Session,
    /// Profiles added by producers outside this crate.
    #[serde(untagged)]
    Other(String),
}

impl Profile {
    pub fn as_str(&self) -> &str {
        match self {
            Profile::Application => "application",
            Profile::Window => "window",
            Profile::Notification => "notification",
            Profile::Device => "device",
            Profile::Tab => "tab",
            Profile::IconTheme => "icontheme",
            Profile::TrayItem => "trayitem",
            Profile::File => "file",
            Profile::Session => "session",
            Profile::Other(name) => name,
        }
    }

    /// Statically declared capabilities of each profile.
    pub fn capabilities(&self) -> Capabilities {
        match self {
            Profile::Application | Profile::File | Profile::Session | Profile::TrayItem => {
                Capabilities::ACTIVATE
            }
            Profile::Window | Profile::Notification | Profile::Tab => Capabilities::ACTIVATE_DELETE,
            Profile::Device | Profile::IconTheme | Profile::Other(_) => Capabilities::READ_ONLY,
        }
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operations a resource accepts beyond being read.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Capability {
    /// Responds to a POST (launch, raise, invoke default action).
    Activate,
    /// Responds to a DELETE (close window, dismiss notification).
    Delete,
}

/// Capability table entry for a profile.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Capabilities {
    pub activate: bool,
    pub delete: bool,
}

impl Capabilities {
    pub const READ_ONLY: Self = Self {
        activate: false,
        delete: false,
    };
    pub const ACTIVATE: Self = Self {
        activate: true,
        delete: false,
    };
    pub const ACTIVATE_DELETE: Self = Self {
        activate: true,
        delete: true,
    };

    pub fn contains(&self, capability: Capability) -> bool {
        match capability {
            Capability::Activate => self.activate,
            Capability::Delete => self.delete,
        }
    }
}

/// Typed relation carried by a [`Link`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Relation {
    #[serde(rename = "self")]
    SelfLink,
    #[serde(rename = "org.refude.defaultaction")]
    DefaultAction,
    #[serde(rename = "org.refude.action")]
    Action,
    #[serde(rename = "org.refude.delete")]
    Delete,
    #[serde(rename = "related")]
    Related,
    #[serde(rename = "search")]
    Search,
    #[serde(rename = "org.refude.menu")]
    Menu,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub href: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub title: String,
    #[serde(default, rename = "icon", skip_serializing_if = "String::is_empty")]
    pub icon: String,
    #[serde(rename = "rel")]
    pub relation: Relation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<Profile>,
}

impl Link {
    pub fn new(href: impl Into<String>, relation: Relation) -> Self {
        Self {
            href: href.into(),
            title: String::new(),
            icon: String::new(),
            relation,
            profile: None,
        }
    }

    pub fn titled(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = icon.into();
        self
    }

    pub fn with_profile(mut self, profile: Profile) -> Self {
        self.profile = Some(profile);
        self
    }
}

/// One addressable entity of desktop state.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub path: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub comment: String,
    /// Icon name or URL, resolved by the icon subsystem.
    #[serde(default, rename = "icon", skip_serializing_if = "String::is_empty")]
    pub icon: String,
    pub profile: Profile,
    pub links: Vec<Link>,
    /// Extra search terms, not shown.
    #[serde(skip)]
    pub keywords: Vec<String>,
    /// Producer-specific fields, flattened into the serialized form.
    #[serde(flatten)]
    pub details: Map<String, Value>,
}

impl Resource {
    /// Create a resource with its `self` link in place.
    pub fn new(path: impl Into<String>, title: impl Into<String>, profile: Profile) -> Self {
        let path = path.into();
        let links = vec![Link::new(path.clone(), Relation::SelfLink)];
        Self {
            path,
            title: title.into(),
            comment: String::new(),
            icon: String::new(),
            profile,
            links,
            keywords: Vec::new(),
            details: Map::new(),
        }
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = comment.into();
        self
    }

    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = icon.into();
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keywords = keywords.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    /// Add a link.
    ///
    /// An empty `href` points at the resource itself; an `href` starting
    /// with `?` is appended to the resource path as a query.
    pub fn add_link(
        mut self,
        href: &str,
        title: impl Into<String>,
        icon: impl Into<String>,
        relation: Relation,
    ) -> Self {
        let href = if href.is_empty() {
            self.path.clone()
        } else if href.starts_with('?') {
            format!("{}{}", self.path, href)
        } else {
            href.to_string()
        };
        self.links
            .push(Link::new(href, relation).titled(title).with_icon(icon));
        self
    }

    /// Move the resource to `path`, carrying along links that point at the
    /// old path or at a query on it.
    pub fn relocate(&mut self, path: &str) {
        if self.path == path {
            return;
        }
        let query_prefix = format!("{}?", self.path);
        for link in &mut self.links {
            if link.href == self.path {
                link.href = path.to_string();
            } else if let Some(query) = link.href.strip_prefix(&query_prefix) {
                link.href = format!("{}?{}", path, query);
            }
        }
        self.path = path.to_string();
    }

    pub fn supports(&self, capability: Capability) -> bool {
        self.profile.capabilities().contains(capability)
    }

    /// Link used when this resource turns up as a search hit.
    pub fn search_link(&self) -> Link {
        let href = self
            .links
            .iter()
            .find(|l| l.relation == Relation::DefaultAction)
            .map(|l| l.href.clone())
            .unwrap_or_else(|| self.path.clone());
        Link::new(href, Relation::DefaultAction)
            .titled(self.title.clone())
            .with_icon(self.icon.clone())
            .with_profile(self.profile.clone())
    }

    /// Action and delete links whose title matches `term`.
    pub fn action_links(&self, term: &str) -> Vec<&Link> {
        let term = term.to_lowercase();
        self.links
            .iter()
            .filter(|l| matches!(l.relation, Relation::Action | Relation::Delete))
            .filter(|l| l.title.to_lowercase().contains(&term))
            .collect()
    }

    /// Whether the resource advertises a link search endpoint.
    pub fn searchable(&self) -> bool {
        self.links.iter().any(|l| l.relation == Relation::Search)
    }
}
