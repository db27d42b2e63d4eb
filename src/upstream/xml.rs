//! XML fragment embedded in the credential-code login body (`xXml`).

use std::borrow::Cow;
use std::fmt::Write as _;

use crate::session::GuestSession;

/// Inputs for the login fragment.
#[derive(Debug, Clone)]
pub struct LoginFragment<'a> {
    pub session: &'a GuestSession,
    pub email: &'a str,
    pub code: &'a str,
    pub current_language: &'a str,
}

impl LoginFragment<'_> {
    /// Renders the `<root>` document upstream expects.
    ///
    /// The session's identity is sent only when it is a real one.
    pub fn render(&self) -> String {
        let identity = if crate::session::is_sentinel(&self.session.identity) {
            ""
        } else {
            self.session.identity.as_str()
        };
        let country_language = self.session.country_language.as_str();
        let favorites = self.session.favorite_countries.to_delimited();

        let fields: [(&str, &str); 10] = [
            ("iProfile", identity),
            ("sProvider", "magic-link"),
            ("email", self.email),
            ("code", self.code),
            ("sTypeAccount", "EMAIL"),
            ("iPaysOrigine", country_language),
            ("sLangue", country_language),
            ("sPaysListe", favorites.as_str()),
            ("sPaysLangue", country_language),
            ("sCurrentLangue", self.current_language),
        ];

        let mut out = String::from("<root>");
        for (name, value) in fields {
            let _ = write!(out, "<{name}>{}</{name}>", escape(value));
        }
        out.push_str("</root>");
        out
    }
}

/// Escapes the five XML special characters.
pub fn escape(value: &str) -> Cow<'_, str> {
    if !value.contains(['&', '<', '>', '"', '\'']) {
        return Cow::Borrowed(value);
    }
    let mut out = String::with_capacity(value.len() + 8);
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            other => out.push(other),
        }
    }
    Cow::Owned(out)
}
