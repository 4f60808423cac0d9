//! Credential lookup
//!
//! A lookup list such as `header:Authorization, query:token, cookie:jwt` is
//! tried in order and the first non-empty token wins.

use crate::error::{AuthError, Result};
use actix_web::{HttpMessage, HttpRequest};
use std::collections::HashMap;
use std::str::FromStr;

pub(crate) const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupSource {
    Header,
    Query,
    Cookie,
    Param,
    Form,
}

/// One `<source>:<name>` descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenLookup {
    pub source: LookupSource,
    pub name: String,
}

impl FromStr for TokenLookup {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || AuthError::InvalidTokenLookup(s.trim().to_string());
        let (source, name) = s.trim().split_once(':').ok_or_else(invalid)?;
        let name = name.trim();
        if name.is_empty() {
            return Err(invalid());
        }

        let source = match source.trim() {
            "header" => LookupSource::Header,
            "query" => LookupSource::Query,
            "cookie" => LookupSource::Cookie,
            "param" => LookupSource::Param,
            "form" | "postform" => LookupSource::Form,
            _ => return Err(invalid()),
        };

        Ok(TokenLookup {
            source,
            name: name.to_string(),
        })
    }
}

/// Parse a comma separated lookup list; at least one entry is required
pub fn parse_token_lookups(list: &str) -> Result<Vec<TokenLookup>> {
    let lookups = list
        .split(',')
        .filter(|entry| !entry.trim().is_empty())
        .map(str::parse)
        .collect::<Result<Vec<TokenLookup>>>()?;

    if lookups.is_empty() {
        return Err(AuthError::InvalidTokenLookup(list.to_string()));
    }
    Ok(lookups)
}

/// Read access to the transport locations a token may travel in
pub trait CredentialSource {
    fn header(&self, name: &str) -> Option<String>;
    fn query(&self, name: &str) -> Option<String>;
    fn cookie(&self, name: &str) -> Option<String>;
    fn path_param(&self, name: &str) -> Option<String>;
    fn form_field(&self, name: &str) -> Option<String>;
}

/// `CredentialSource` over an actix request plus an already buffered
/// urlencoded form body.
///
/// Path parameters are only visible once routing has matched, so `param:`
/// lookups need the middleware registered on a resource or scope.
pub struct RequestCredentials<'a> {
    req: &'a HttpRequest,
    query: HashMap<String, String>,
    form: Option<&'a HashMap<String, String>>,
}

impl<'a> RequestCredentials<'a> {
    pub fn new(req: &'a HttpRequest, form: Option<&'a HashMap<String, String>>) -> Self {
        let query = serde_urlencoded::from_str(req.query_string()).unwrap_or_default();
        Self { req, query, form }
    }
}

impl CredentialSource for RequestCredentials<'_> {
    fn header(&self, name: &str) -> Option<String> {
        self.req
            .headers()
            .get(name)
            .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned())
    }

    fn query(&self, name: &str) -> Option<String> {
        self.query.get(name).cloned()
    }

    fn cookie(&self, name: &str) -> Option<String> {
        self.req.cookie(name).map(|c| c.value().to_string())
    }

    fn path_param(&self, name: &str) -> Option<String> {
        self.req.match_info().get(name).map(str::to_string)
    }

    fn form_field(&self, name: &str) -> Option<String> {
        self.form.and_then(|form| form.get(name).cloned())
    }
}

/// Fields of an urlencoded body, `None` for any other content type
pub fn form_fields(req: &HttpRequest, body: &[u8]) -> Option<HashMap<String, String>> {
    if req.content_type() != FORM_CONTENT_TYPE {
        return None;
    }
    Some(serde_urlencoded::from_bytes(body).unwrap_or_default())
}

#[derive(Debug, Clone)]
pub struct CredentialLocator {
    lookups: Vec<TokenLookup>,
    head_name: String,
}

impl CredentialLocator {
    pub fn new(lookups: Vec<TokenLookup>, head_name: impl Into<String>) -> Self {
        Self {
            lookups,
            head_name: head_name.into(),
        }
    }

    pub fn lookups(&self) -> &[TokenLookup] {
        &self.lookups
    }

    pub fn reads_form(&self) -> bool {
        self.lookups.iter().any(|l| l.source == LookupSource::Form)
    }

    /// Find the first non-empty token.
    ///
    /// When nothing is found, a malformed header outranks the emptiness of
    /// later sources; otherwise the last source's error is returned.
    pub fn locate(&self, source: &impl CredentialSource) -> Result<String> {
        let mut malformed = None;
        let mut empty = None;

        for lookup in &self.lookups {
            match self.lookup(lookup, source) {
                Ok(token) => return Ok(token),
                Err(e) if e.is_empty_credential() => empty = Some(e),
                Err(e) => {
                    malformed.get_or_insert(e);
                }
            }
        }

        Err(malformed.or(empty).unwrap_or(AuthError::EmptyAuthHeader))
    }

    fn lookup(&self, lookup: &TokenLookup, source: &impl CredentialSource) -> Result<String> {
        let name = lookup.name.as_str();
        let (value, empty) = match lookup.source {
            LookupSource::Header => return self.header_token(source.header(name)),
            LookupSource::Query => (source.query(name), AuthError::EmptyQueryToken),
            LookupSource::Cookie => (source.cookie(name), AuthError::EmptyCookieToken),
            LookupSource::Param => (source.path_param(name), AuthError::EmptyParamToken),
            LookupSource::Form => (source.form_field(name), AuthError::EmptyPostFormToken),
        };

        value.filter(|v| !v.is_empty()).ok_or(empty)
    }

    fn header_token(&self, value: Option<String>) -> Result<String> {
        let value = value.filter(|v| !v.is_empty()).ok_or(AuthError::EmptyAuthHeader)?;

        match value.split_once(' ') {
            Some((head, token)) if head == self.head_name && !token.is_empty() => {
                Ok(token.to_string())
            }
            _ => Err(AuthError::InvalidAuthHeader),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct FakeRequest {
        headers: HashMap<&'static str, &'static str>,
        query: HashMap<&'static str, &'static str>,
        cookies: HashMap<&'static str, &'static str>,
        params: HashMap<&'static str, &'static str>,
        form: HashMap<&'static str, &'static str>,
    }

    fn get(map: &HashMap<&'static str, &'static str>, name: &str) -> Option<String> {
        map.get(name).map(|v| v.to_string())
    }

    impl CredentialSource for FakeRequest {
        fn header(&self, name: &str) -> Option<String> {
            get(&self.headers, name)
        }
        fn query(&self, name: &str) -> Option<String> {
            get(&self.query, name)
        }
        fn cookie(&self, name: &str) -> Option<String> {
            get(&self.cookies, name)
        }
        fn path_param(&self, name: &str) -> Option<String> {
            get(&self.params, name)
        }
        fn form_field(&self, name: &str) -> Option<String> {
            get(&self.form, name)
        }
    }

    fn locator(lookups: &str) -> CredentialLocator {
        CredentialLocator::new(parse_token_lookups(lookups).unwrap(), "Bearer")
    }

    #[test]
    fn test_parse_lookups() {
        let lookups = parse_token_lookups("header: Authorization, query:token,cookie:jwt, param:token, postform:token").unwrap();
        let sources: Vec<_> = lookups.iter().map(|l| l.source).collect();
        assert_eq!(
            sources,
            vec![
                LookupSource::Header,
                LookupSource::Query,
                LookupSource::Cookie,
                LookupSource::Param,
                LookupSource::Form,
            ]
        );
        assert_eq!(lookups[0].name, "Authorization");
    }

    #[test]
    fn test_parse_rejects_unknown_source() {
        assert!(matches!(
            parse_token_lookups("body:token"),
            Err(AuthError::InvalidTokenLookup(_))
        ));
        assert!(matches!(
            parse_token_lookups("header"),
            Err(AuthError::InvalidTokenLookup(_))
        ));
        assert!(matches!(
            parse_token_lookups(" , "),
            Err(AuthError::InvalidTokenLookup(_))
        ));
    }

    #[test]
    fn test_bearer_header() {
        let mut req = FakeRequest::default();
        req.headers.insert("Authorization", "Bearer abc.def.ghi");
        assert_eq!(locator("header:Authorization").locate(&req).unwrap(), "abc.def.ghi");
    }

    #[test]
    fn test_header_shape_is_strict() {
        for value in ["bearer abc", "Token abc", "Bearer", "Bearer ", "abc"] {
            let mut req = FakeRequest::default();
            req.headers.insert("Authorization", value);
            assert_eq!(
                locator("header:Authorization").locate(&req),
                Err(AuthError::InvalidAuthHeader),
                "{value}"
            );
        }
    }

    #[test]
    fn test_empty_errors_per_source() {
        let req = FakeRequest::default();
        let cases = [
            ("header:Authorization", AuthError::EmptyAuthHeader),
            ("query:token", AuthError::EmptyQueryToken),
            ("cookie:jwt", AuthError::EmptyCookieToken),
            ("param:token", AuthError::EmptyParamToken),
            ("form:token", AuthError::EmptyPostFormToken),
        ];
        for (lookup, expected) in cases {
            assert_eq!(locator(lookup).locate(&req), Err(expected));
        }
    }

    #[test]
    fn test_first_non_empty_source_wins() {
        let mut req = FakeRequest::default();
        req.query.insert("token", "from-query");
        req.cookies.insert("jwt", "from-cookie");

        let found = locator("header:Authorization,query:token,cookie:jwt").locate(&req);
        assert_eq!(found.unwrap(), "from-query");
    }

    #[test]
    fn test_last_empty_error_is_reported() {
        let req = FakeRequest::default();
        let err = locator("header:Authorization,query:token").locate(&req);
        assert_eq!(err, Err(AuthError::EmptyQueryToken));
    }

    #[test]
    fn test_malformed_header_outranks_later_empty_source() {
        let mut req = FakeRequest::default();
        req.headers.insert("Authorization", "Basic dXNlcjpwYXNz");
        let err = locator("header:Authorization,query:token").locate(&req);
        assert_eq!(err, Err(AuthError::InvalidAuthHeader));

        req.query.insert("token", "from-query");
        let found = locator("header:Authorization,query:token").locate(&req);
        assert_eq!(found.unwrap(), "from-query");
    }

    #[test]
    fn test_custom_head_name() {
        let mut req = FakeRequest::default();
        req.headers.insert("X-Auth", "JWT tok");
        let locator = CredentialLocator::new(parse_token_lookups("header:X-Auth").unwrap(), "JWT");
        assert_eq!(locator.locate(&req).unwrap(), "tok");
    }

    #[test]
    fn test_reads_form() {
        assert!(locator("header:Authorization,form:token").reads_form());
        assert!(!locator("header:Authorization,query:token").reads_form());
    }

    #[test]
    fn test_form_fields_only_for_urlencoded_bodies() {
        let req = actix_web::test::TestRequest::post()
            .insert_header(("content-type", FORM_CONTENT_TYPE))
            .to_http_request();
        let fields = form_fields(&req, b"token=abc&title=first").unwrap();
        assert_eq!(fields.get("token").map(String::as_str), Some("abc"));

        let req = actix_web::test::TestRequest::post()
            .insert_header(("content-type", "application/json"))
            .to_http_request();
        assert_eq!(form_fields(&req, b"token=abc"), None);
    }
}
