use crate::application::access::{Actor, LOGIN_PATH};
use crate::presentation::views::{
    BrandView, FooterView, LayoutChrome, NavigationLinkView, NavigationView, PageMetaView,
};

/// Site-wide identity shown around every page.
#[derive(Debug, Clone)]
pub struct SiteIdentity {
    pub title: String,
    pub description: String,
    pub footer_copy: String,
}

#[derive(Clone)]
pub struct ChromeService {
    site: SiteIdentity,
}

impl ChromeService {
    pub fn new(site: SiteIdentity) -> Self {
        Self { site }
    }

    /// Header, navigation and meta for `actor` viewing `current_path`.
    pub fn load(&self, actor: &Actor, current_path: &str) -> LayoutChrome {
        let mut entries = vec![link("Home", "/", current_path)];
        match actor.user() {
            Some(_) => {
                entries.push(link("New post", "/create/", current_path));
                entries.push(link("Following", "/follow/", current_path));
                entries.push(link("Log out", "/auth/logout/", current_path));
            }
            None => {
                entries.push(link("Log in", LOGIN_PATH, current_path));
                entries.push(link("Sign up", "/auth/signup/", current_path));
            }
        }

        LayoutChrome {
            brand: BrandView {
                title: self.site.title.clone(),
                href: "/".to_string(),
            },
            navigation: NavigationView { entries },
            footer: FooterView {
                copy: self.site.footer_copy.clone(),
            },
            meta: PageMetaView {
                title: self.site.title.clone(),
                description: self.site.description.clone(),
            },
            viewer: actor.user().map(|user| user.username.clone()),
        }
    }
}

fn link(label: &str, href: &str, current_path: &str) -> NavigationLinkView {
    NavigationLinkView {
        label: label.to_string(),
        href: href.to_string(),
        is_active: href == current_path,
    }
}
