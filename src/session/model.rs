//! Guest session data model.
//!
//! The upstream names the four fields `iProfile`, `iBasket`, `sPaysLangue`
//! and `sPaysFav`; those names are only used at the serde boundary.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Prefixes the client uses for provisional identifiers before upstream
/// has assigned real ones.
const PROVISIONAL_PREFIXES: [&str; 2] = ["guest_", "basket_"];

/// Returns true when `value` means "no real identifier yet".
pub fn is_sentinel(value: &str) -> bool {
    let value = value.trim();
    value.is_empty()
        || value == "0"
        || PROVISIONAL_PREFIXES.iter().any(|p| value.starts_with(p))
}

/// The identity/basket/locale/favorites tuple carried by the client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuestSession {
    /// Upstream profile id. Empty or `"0"` means anonymous.
    #[serde(rename = "iProfile", deserialize_with = "lenient_string")]
    pub identity: String,

    /// Upstream basket id. Empty or `"0"` means no basket yet.
    #[serde(rename = "iBasket", deserialize_with = "lenient_string")]
    pub basket_id: String,

    /// Geography and language, e.g. `BE/FR`.
    #[serde(rename = "sPaysLangue", deserialize_with = "lenient_string")]
    pub country_language: String,

    /// Country codes the user compares prices in, e.g. `BE,FR`.
    #[serde(rename = "sPaysFav")]
    pub favorite_countries: FavoriteCountries,
}

impl GuestSession {
    pub fn new(
        identity: impl Into<String>,
        basket_id: impl Into<String>,
        country_language: impl Into<String>,
        favorite_countries: FavoriteCountries,
    ) -> Self {
        Self {
            identity: identity.into(),
            basket_id: basket_id.into(),
            country_language: country_language.into(),
            favorite_countries,
        }
    }

    /// The language part of `country_language` (`BE/FR` → `FR`).
    pub fn language(&self) -> Option<&str> {
        self.country_language
            .split_once('/')
            .map(|(_, lang)| lang)
            .filter(|lang| !lang.is_empty())
    }

    /// Whether identity or basket differ from `previous`.
    pub fn rotated_from(&self, previous: &GuestSession) -> bool {
        self.identity != previous.identity || self.basket_id != previous.basket_id
    }
}

/// A partial session, as read from one source.
///
/// `None` means the source had nothing usable for that field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionPatch {
    pub identity: Option<String>,
    pub basket_id: Option<String>,
    pub country_language: Option<String>,
    pub favorite_countries: Option<FavoriteCountries>,
}

impl SessionPatch {
    /// Builds a patch from a decoded session, dropping sentinel identifiers
    /// and empty locale values.
    pub fn from_session(session: GuestSession) -> Self {
        Self::default()
            .with_identity(session.identity)
            .with_basket_id(session.basket_id)
            .with_country_language(session.country_language)
            .with_favorite_countries(session.favorite_countries)
    }

    pub fn with_identity(mut self, value: impl Into<String>) -> Self {
        self.identity = real_identifier(value.into());
        self
    }

    pub fn with_basket_id(mut self, value: impl Into<String>) -> Self {
        self.basket_id = real_identifier(value.into());
        self
    }

    pub fn with_country_language(mut self, value: impl Into<String>) -> Self {
        let value = value.into().trim().to_string();
        self.country_language = (!value.is_empty()).then_some(value);
        self
    }

    pub fn with_favorite_countries(mut self, value: FavoriteCountries) -> Self {
        self.favorite_countries = (!value.is_empty()).then_some(value);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.identity.is_none()
            && self.basket_id.is_none()
            && self.country_language.is_none()
            && self.favorite_countries.is_none()
    }

    /// Fills fields still unset from a lower-precedence patch.
    pub fn fill_missing(&mut self, lower: SessionPatch) {
        self.identity = self.identity.take().or(lower.identity);
        self.basket_id = self.basket_id.take().or(lower.basket_id);
        self.country_language = self.country_language.take().or(lower.country_language);
        self.favorite_countries = self.favorite_countries.take().or(lower.favorite_countries);
    }
}

fn real_identifier(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!is_sentinel(trimmed)).then(|| trimmed.to_string())
}

/// Favorite countries, normalized to an ordered list of country codes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FavoriteCountries(Vec<String>);

/// The shapes the field takes on the wire.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum FavoriteCountriesWire {
    List(Vec<String>),
    DelimitedString(String),
}

impl FavoriteCountries {
    pub fn new<I, S>(codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self(
            codes
                .into_iter()
                .map(|c| c.as_ref().trim().to_string())
                .filter(|c| !c.is_empty())
                .collect(),
        )
    }

    /// Parses a comma separated list (`"FR,BE"`).
    pub fn parse_delimited(value: &str) -> Self {
        Self::new(value.split(','))
    }

    pub fn codes(&self) -> &[String] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// CSV form, as stored in the session cookie and XML fragments.
    pub fn to_delimited(&self) -> String {
        self.0.join(",")
    }

    pub fn to_wire(&self, shape: FavoriteShape) -> FavoriteCountriesWire {
        match shape {
            FavoriteShape::List => FavoriteCountriesWire::List(self.0.clone()),
            FavoriteShape::Delimited => FavoriteCountriesWire::DelimitedString(self.to_delimited()),
        }
    }
}

/// Which wire shape a given upstream field expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FavoriteShape {
    List,
    Delimited,
}

impl From<FavoriteCountriesWire> for FavoriteCountries {
    fn from(wire: FavoriteCountriesWire) -> Self {
        match wire {
            FavoriteCountriesWire::List(codes) => Self::new(codes),
            FavoriteCountriesWire::DelimitedString(value) => Self::parse_delimited(&value),
        }
    }
}

impl Serialize for FavoriteCountries {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_delimited())
    }
}

impl<'de> Deserialize<'de> for FavoriteCountries {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // Any other shape reads as no favorites rather than failing the session.
        let value = Option::<serde_json::Value>::deserialize(deserializer)?;
        Ok(value
            .and_then(|v| serde_json::from_value::<FavoriteCountriesWire>(v).ok())
            .map(Self::from)
            .unwrap_or_default())
    }
}

/// Accepts strings, numbers and null, since upstream is not consistent
/// about identifier types.
fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => s,
        Some(serde_json::Value::Number(n)) => n.to_string(),
        Some(serde_json::Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    })
}
