//! `WWW-Authenticate` challenge parsing (RFC 7235 section 4.1)
//!
//! A single header value may carry several challenges, and servers are
//! inconsistent about separators: some put commas between parameters, some
//! only spaces, and both appear between challenges. The parser walks the
//! value once and decides at every bare token whether it starts a new
//! challenge or continues the current one:
//!
//! ```text
//! Basic realm="web", Bearer realm="api" scope="read write"
//! ^^^^^ scheme       ^^^^^^ scheme      ^^^^^ parameter (space separated)
//! ```
//!
//! A token followed by `=` is a parameter of the current challenge; any other
//! token opens a new challenge. Quoted values may contain commas, spaces and
//! backslash escapes and are never split.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{OAuthError, Result};

/// Key under which a token68 credential (`Negotiate abc==`) is stored.
pub const TOKEN68_PARAM: &str = "token68";

/// One authentication challenge from a `WWW-Authenticate` header.
///
/// # Examples
///
/// ```
/// use oauth_helpers::oauth::challenge::parse_challenges;
///
/// let challenges = parse_challenges(r#"Bearer realm="api", scope="read write""#).unwrap();
/// assert_eq!(challenges[0].scheme, "Bearer");
/// assert_eq!(challenges[0].param("scope"), Some("read write"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Challenge {
    /// Authentication scheme as written in the header (e.g. `Bearer`).
    pub scheme: String,

    /// Parameters with lowercased keys and unquoted values.
    #[serde(default)]
    pub parameters: HashMap<String, String>,
}

impl Challenge {
    /// Creates a challenge with no parameters.
    pub fn new(scheme: impl Into<String>) -> Self {
        Self {
            scheme: scheme.into(),
            parameters: HashMap::new(),
        }
    }

    /// Adds a parameter, returning the updated challenge.
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters
            .insert(key.into().to_ascii_lowercase(), value.into());
        self
    }

    /// Looks up a parameter by case-insensitive name.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.parameters
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Returns `true` for the `Bearer` scheme, compared case-insensitively.
    pub fn is_bearer(&self) -> bool {
        self.scheme.eq_ignore_ascii_case("bearer")
    }
}

/// Parses a raw `WWW-Authenticate` header value into its challenges, in the
/// order they appear.
///
/// Parameter keys are lowercased; when a key repeats within one challenge
/// the first value is kept.
///
/// # Errors
///
/// Returns [`OAuthError::Parse`] if the value is empty, starts with a
/// parameter instead of a scheme, or contains an unterminated quoted string.
///
/// # Examples
///
/// ```
/// use oauth_helpers::oauth::challenge::parse_challenges;
///
/// let challenges =
///     parse_challenges(r#"Basic realm="web", Bearer realm="api" scope="read""#).unwrap();
/// assert_eq!(challenges.len(), 2);
/// assert_eq!(challenges[1].param("scope"), Some("read"));
///
/// assert!(parse_challenges("").is_err());
/// ```
pub fn parse_challenges(header: &str) -> Result<Vec<Challenge>> {
    if header.trim().is_empty() {
        return Err(OAuthError::Parse("empty WWW-Authenticate header".to_string()).into());
    }

    let mut scanner = Scanner::new(header);
    let mut challenges: Vec<Challenge> = Vec::new();

    loop {
        scanner.skip_separators();
        if scanner.at_end() {
            break;
        }

        let start = scanner.pos;
        let token = scanner.read_token();
        if token.is_empty() {
            return Err(OAuthError::Parse(format!(
                "expected token at position {start} in WWW-Authenticate header"
            ))
            .into());
        }

        scanner.skip_whitespace();
        if scanner.peek() != Some('=') {
            challenges.push(Challenge::new(token));
            scanner.read_token68(challenges.last_mut());
            continue;
        }

        let Some(current) = challenges.last_mut() else {
            return Err(OAuthError::Parse(format!(
                "parameter '{token}' appears before any authentication scheme"
            ))
            .into());
        };

        scanner.bump();
        let value = scanner.read_value()?;
        current
            .parameters
            .entry(token.to_ascii_lowercase())
            .or_insert(value);
    }

    if challenges.is_empty() {
        return Err(
            OAuthError::Parse("no authentication scheme in WWW-Authenticate header".to_string())
                .into(),
        );
    }

    Ok(challenges)
}

/// Returns the `resource_metadata` parameter of the first challenge that
/// carries one, or an empty string.
///
/// # Examples
///
/// ```
/// use oauth_helpers::oauth::challenge::{find_resource_metadata_url, Challenge};
///
/// let challenges = vec![
///     Challenge::new("Basic").with_param("realm", "web"),
///     Challenge::new("Bearer").with_param("resource_metadata", "https://a.example/meta"),
/// ];
/// assert_eq!(find_resource_metadata_url(&challenges), "https://a.example/meta");
/// assert_eq!(find_resource_metadata_url(&[]), "");
/// ```
pub fn find_resource_metadata_url(challenges: &[Challenge]) -> String {
    challenges
        .iter()
        .find_map(|c| c.param("resource_metadata"))
        .unwrap_or_default()
        .to_string()
}

/// Returns the whitespace-separated tokens of the first `scope` parameter,
/// or an empty vector when no challenge carries one.
pub fn find_required_scopes(challenges: &[Challenge]) -> Vec<String> {
    challenges
        .iter()
        .find_map(|c| c.param("scope"))
        .map(|scope| scope.split_whitespace().map(str::to_string).collect())
        .unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Scanner
// ---------------------------------------------------------------------------

struct Scanner {
    chars: Vec<char>,
    pos: usize,
}

impl Scanner {
    fn new(input: &str) -> Self {
        Self {
            chars: input.chars().collect(),
            pos: 0,
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn bump(&mut self) {
        self.pos += 1;
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    fn skip_separators(&mut self) {
        while self.peek().is_some_and(|c| c.is_whitespace() || c == ',') {
            self.bump();
        }
    }

    fn read_token(&mut self) -> String {
        let start = self.pos;
        while self.peek().is_some_and(is_token_char) {
            self.bump();
        }
        self.chars[start..self.pos].iter().collect()
    }

    /// Consumes a token68 credential directly after a scheme, if present.
    ///
    /// A token68 is a token followed by either two or more `=` or a single
    /// `=` with no value after it; anything else is left for the main loop.
    fn read_token68(&mut self, challenge: Option<&mut Challenge>) {
        let Some(challenge) = challenge else {
            return;
        };

        let save = self.pos;
        self.skip_whitespace();

        let mut len = 0;
        while self.peek_at(len).is_some_and(is_token_char) {
            len += 1;
        }
        let mut padding = 0;
        while self.peek_at(len + padding) == Some('=') {
            padding += 1;
        }

        if len == 0 || padding == 0 {
            self.pos = save;
            return;
        }

        let mut after = len + padding;
        while self.peek_at(after).is_some_and(char::is_whitespace) {
            after += 1;
        }
        let terminated = match self.peek_at(after) {
            None => true,
            Some(',') => !self.param_follows(after + 1),
            Some(_) => false,
        };

        if padding >= 2 || terminated {
            let value: String = self.chars[self.pos..self.pos + len + padding]
                .iter()
                .collect();
            challenge
                .parameters
                .entry(TOKEN68_PARAM.to_string())
                .or_insert(value);
            self.pos += len + padding;
        } else {
            self.pos = save;
        }
    }

    /// Returns `true` if the text at `offset` (past separators) is a
    /// `key=` auth-param rather than a new scheme.
    fn param_follows(&self, mut offset: usize) -> bool {
        while self
            .peek_at(offset)
            .is_some_and(|c| c.is_whitespace() || c == ',')
        {
            offset += 1;
        }
        let mut len = 0;
        while self.peek_at(offset + len).is_some_and(is_token_char) {
            len += 1;
        }
        let mut after = offset + len;
        while self.peek_at(after).is_some_and(char::is_whitespace) {
            after += 1;
        }
        len > 0 && self.peek_at(after) == Some('=')
    }

    /// Reads a parameter value after `=`: a quoted string or a bare run up
    /// to the next whitespace or comma.
    ///
    /// A bare run that is itself `key=...` (after whitespace, or with a
    /// quoted value) belongs to the next parameter; the current value is
    /// then empty and the run is left for the main loop.
    fn read_value(&mut self) -> Result<String> {
        let before = self.pos;
        self.skip_whitespace();
        let skipped = self.pos > before;

        if self.peek() != Some('"') {
            let start = self.pos;
            while self.peek().is_some_and(|c| !c.is_whitespace() && c != ',') {
                self.bump();
            }
            let run = &self.chars[start..self.pos];
            let next_param = run
                .iter()
                .position(|&c| c == '=')
                .is_some_and(|eq| eq > 0 && (skipped || run.get(eq + 1) == Some(&'"')));
            if next_param {
                self.pos = start;
                return Ok(String::new());
            }
            return Ok(run.iter().collect());
        }

        let open = self.pos;
        self.bump();
        let mut value = String::new();
        while let Some(c) = self.peek() {
            self.bump();
            match c {
                '"' => return Ok(value),
                '\\' => {
                    if let Some(escaped) = self.peek() {
                        value.push(escaped);
                        self.bump();
                    }
                }
                _ => value.push(c),
            }
        }

        Err(OAuthError::Parse(format!(
            "unterminated quoted string starting at position {open}"
        ))
        .into())
    }
}

fn is_token_char(c: char) -> bool {
    !c.is_whitespace() && !matches!(c, ',' | '=' | '"')
}
