//! Server-rendered pages. Templates are compiled into the binary and parsed
//! once into a `Tera` instance held by the app state. Every template name
//! ends in `.html`, so tera escapes everything interpolated into it.

use std::collections::HashSet;

use serde::Serialize;
use tera::{Context, Tera};

use warbler_types::api::SignupForm;
use warbler_types::models::{AuthoredMessage, MESSAGE_MAX_LEN, ProfileUpdate, User, UserStats};

const TEMPLATES: &[(&str, &str)] = &[
    ("base.html", include_str!("../templates/base.html")),
    ("_messages.html", include_str!("../templates/_messages.html")),
    ("_users.html", include_str!("../templates/_users.html")),
    ("landing.html", include_str!("../templates/landing.html")),
    ("timeline.html", include_str!("../templates/timeline.html")),
    ("signup.html", include_str!("../templates/signup.html")),
    ("login.html", include_str!("../templates/login.html")),
    ("users.html", include_str!("../templates/users.html")),
    ("user_detail.html", include_str!("../templates/user_detail.html")),
    ("follow_list.html", include_str!("../templates/follow_list.html")),
    ("likes.html", include_str!("../templates/likes.html")),
    ("message_form.html", include_str!("../templates/message_form.html")),
    ("message_detail.html", include_str!("../templates/message_detail.html")),
    ("profile_form.html", include_str!("../templates/profile_form.html")),
    ("error.html", include_str!("../templates/error.html")),
];

/// Error pages rendered after the fact by the router's response layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorPage {
    NotFound,
    ServerError,
}

pub(crate) struct ProfilePage {
    pub user: User,
    pub stats: UserStats,
    pub messages: Vec<AuthoredMessage>,
    pub liked: HashSet<i64>,
    /// `None` when nobody is signed in or the viewer is looking at themselves.
    pub is_following: Option<bool>,
}

#[derive(Serialize)]
struct MessageItem<'a> {
    id: i64,
    text: &'a str,
    posted: String,
    user_id: i64,
    username: &'a str,
    image_url: &'a str,
    own: bool,
    liked: bool,
}

fn message_items<'a>(
    entries: &'a [AuthoredMessage],
    viewer: Option<&User>,
    liked: &HashSet<i64>,
) -> Vec<MessageItem<'a>> {
    entries
        .iter()
        .map(|entry| {
            let m = &entry.message;
            MessageItem {
                id: m.id,
                text: &m.text,
                posted: m.timestamp.format("%d %B %Y").to_string(),
                user_id: m.user_id,
                username: &entry.username,
                image_url: &entry.image_url,
                own: viewer.is_some_and(|v| v.id == m.user_id),
                liked: liked.contains(&m.id),
            }
        })
        .collect()
}

pub struct Views {
    tera: Tera,
}

impl Views {
    pub fn load() -> tera::Result<Self> {
        let mut tera = Tera::default();
        tera.add_raw_templates(TEMPLATES.iter().copied())?;
        Ok(Self { tera })
    }

    /// Every page gets `viewer` and `error`, so the layout can always test them.
    fn render(
        &self,
        name: &str,
        viewer: Option<&User>,
        error: Option<&str>,
        fill: impl FnOnce(&mut Context),
    ) -> tera::Result<String> {
        let mut context = Context::new();
        context.insert("viewer", &viewer);
        context.insert("error", error.unwrap_or_default());
        fill(&mut context);
        self.tera.render(name, &context)
    }

    pub(crate) fn landing(&self) -> tera::Result<String> {
        self.render("landing.html", None, None, |_| {})
    }

    pub(crate) fn timeline(
        &self,
        viewer: &User,
        entries: &[AuthoredMessage],
        liked: &HashSet<i64>,
    ) -> tera::Result<String> {
        self.render("timeline.html", Some(viewer), None, |ctx| {
            ctx.insert("messages", &message_items(entries, Some(viewer), liked));
        })
    }

    pub(crate) fn signup_form(&self, values: &SignupForm, error: Option<&str>) -> tera::Result<String> {
        self.render("signup.html", None, error, |ctx| {
            ctx.insert("username", &values.username);
            ctx.insert("email", &values.email);
            ctx.insert("image_url", values.image_url.as_deref().unwrap_or_default());
        })
    }

    pub(crate) fn login_form(&self, username: &str, error: Option<&str>) -> tera::Result<String> {
        self.render("login.html", None, error, |ctx| ctx.insert("username", username))
    }

    pub(crate) fn users_index(
        &self,
        viewer: Option<&User>,
        users: &[User],
        query: Option<&str>,
    ) -> tera::Result<String> {
        self.render("users.html", viewer, None, |ctx| {
            ctx.insert("users", users);
            ctx.insert("empty", "Sorry, no users found.");
            ctx.insert("query", query.unwrap_or_default());
        })
    }

    pub(crate) fn user_detail(&self, viewer: Option<&User>, page: &ProfilePage) -> tera::Result<String> {
        self.render("user_detail.html", viewer, None, |ctx| {
            ctx.insert("user", &page.user);
            ctx.insert("stats", &page.stats);
            ctx.insert("is_following", &page.is_following);
            ctx.insert("messages", &message_items(&page.messages, viewer, &page.liked));
        })
    }

    pub(crate) fn follow_list(
        &self,
        viewer: &User,
        owner: &User,
        heading: &str,
        users: &[User],
    ) -> tera::Result<String> {
        self.render("follow_list.html", Some(viewer), None, |ctx| {
            ctx.insert("owner", owner);
            ctx.insert("heading", heading);
            ctx.insert("users", users);
            ctx.insert("empty", "Nobody here yet.");
        })
    }

    pub(crate) fn likes_list(
        &self,
        viewer: &User,
        owner: &User,
        entries: &[AuthoredMessage],
        liked: &HashSet<i64>,
    ) -> tera::Result<String> {
        self.render("likes.html", Some(viewer), None, |ctx| {
            ctx.insert("owner", owner);
            ctx.insert("messages", &message_items(entries, Some(viewer), liked));
        })
    }

    pub(crate) fn message_form(&self, viewer: &User, text: &str, error: Option<&str>) -> tera::Result<String> {
        self.render("message_form.html", Some(viewer), error, |ctx| {
            ctx.insert("text", text);
            ctx.insert("max_len", &MESSAGE_MAX_LEN);
        })
    }

    pub(crate) fn message_detail(
        &self,
        viewer: Option<&User>,
        entry: &AuthoredMessage,
        liked: &HashSet<i64>,
    ) -> tera::Result<String> {
        self.render("message_detail.html", viewer, None, |ctx| {
            ctx.insert("messages", &message_items(std::slice::from_ref(entry), viewer, liked));
        })
    }

    /// `values` holds the fields to pre-fill: the stored profile on first
    /// display, the submitted ones when re-shown after an error.
    pub(crate) fn profile_form(
        &self,
        viewer: &User,
        values: &ProfileUpdate,
        error: Option<&str>,
    ) -> tera::Result<String> {
        self.render("profile_form.html", Some(viewer), error, |ctx| {
            ctx.insert("username", &values.username);
            ctx.insert("email", &values.email);
            ctx.insert("image_url", values.image_url.as_deref().unwrap_or_default());
            ctx.insert("header_image_url", values.header_image_url.as_deref().unwrap_or_default());
            ctx.insert("bio", values.bio.as_deref().unwrap_or_default());
            ctx.insert("location", values.location.as_deref().unwrap_or_default());
        })
    }

    pub(crate) fn error_page(&self, page: ErrorPage) -> tera::Result<String> {
        let (heading, detail) = match page {
            ErrorPage::NotFound => ("404", "Sorry, we couldn't find that page."),
            ErrorPage::ServerError => ("Something went wrong", "Please try again later."),
        };
        self.render("error.html", None, None, |ctx| {
            ctx.insert("heading", heading);
            ctx.insert("detail", detail);
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use warbler_types::models::{DEFAULT_HEADER_IMAGE_URL, DEFAULT_IMAGE_URL, Message};

    fn user(id: i64, username: &str) -> User {
        User {
            id,
            username: username.into(),
            email: format!("{username}@test"),
            image_url: DEFAULT_IMAGE_URL.into(),
            header_image_url: DEFAULT_HEADER_IMAGE_URL.into(),
            bio: None,
            location: None,
        }
    }

    fn entry(id: i64, author: &User, text: &str) -> AuthoredMessage {
        AuthoredMessage {
            message: Message {
                id,
                text: text.into(),
                timestamp: Utc::now(),
                user_id: author.id,
            },
            username: author.username.clone(),
            image_url: author.image_url.clone(),
        }
    }

    #[test]
    fn every_page_renders() {
        let views = Views::load().unwrap();
        let me = user(1, "me");
        let page = ProfilePage {
            user: me.clone(),
            stats: UserStats::default(),
            messages: vec![entry(1, &me, "hi")],
            liked: HashSet::new(),
            is_following: Some(false),
        };

        assert!(views.landing().unwrap().contains("Sign up now"));
        assert!(views.user_detail(None, &page).unwrap().contains("/users/follow/1"));
        assert!(views.users_index(None, &[], None).unwrap().contains("Sorry, no users found."));
        assert!(views.login_form("me", Some("Invalid credentials.")).unwrap().contains("Invalid credentials."));
        assert!(views.signup_form(&SignupForm::default(), None).unwrap().contains("Join Warbler"));
        assert!(views.message_form(&me, "", None).unwrap().contains("maxlength=\"140\""));
        assert!(views.error_page(ErrorPage::NotFound).unwrap().contains("<h1>404</h1>"));
    }

    #[test]
    fn user_text_is_escaped() {
        let views = Views::load().unwrap();
        let author = user(1, "<b>bold</b>");
        let html = views
            .message_detail(None, &entry(1, &author, "<script>x</script>"), &HashSet::new())
            .unwrap();
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
        assert!(!html.contains("<b>bold</b>"));
    }

    #[test]
    fn own_messages_get_delete_others_get_like() {
        let views = Views::load().unwrap();
        let me = user(1, "me");
        let them = user(2, "them");
        let entries = vec![entry(10, &me, "mine"), entry(11, &them, "theirs")];
        let liked: HashSet<i64> = [11].into_iter().collect();

        let html = views.timeline(&me, &entries, &liked).unwrap();
        assert!(html.contains("/messages/10/delete"));
        assert!(!html.contains("/users/add_like/10"));
        assert!(html.contains("/users/add_like/11\"><button>Unlike"));
    }

    #[test]
    fn anonymous_viewers_get_no_action_buttons() {
        let views = Views::load().unwrap();
        let them = user(2, "them");
        let html = views
            .message_detail(None, &entry(11, &them, "theirs"), &HashSet::new())
            .unwrap();
        assert!(!html.contains("<form"));
    }
}
