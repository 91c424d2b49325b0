//! Signed-cookie session registry and the gateway's auth decision.
//!
//! Sessions are opaque random ids held in a bounded in-memory cache for the
//! life of the process. The cookie handed to browsers wraps the id with an
//! HMAC-SHA256 signature keyed by a per-process random secret, so a restart
//! invalidates every outstanding cookie. Every decode/verify path fails
//! closed with no detail about which check missed.

use crate::security::credentials;
use crate::util::{BoundedCache, Clock};
use chrono::Duration;
use hmac::{Hmac, Mac};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::str::FromStr;
use std::sync::Arc;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Cookie carrying the signed session id.
pub const SESSION_COOKIE: &str = "og_session";

const SESSION_ID_LEN: usize = 18;
const COOKIE_SECRET_LEN: usize = 16;

/// How the gateway authenticates callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    /// Every surface is open; login is a no-op.
    None,
    /// Shared bearer token, exchanged for a cookie at login.
    #[default]
    Token,
    /// scrypt-hashed password, cookie-only after login.
    Password,
}

impl AuthMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthMode::None => "none",
            AuthMode::Token => "token",
            AuthMode::Password => "password",
        }
    }
}

impl FromStr for AuthMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(AuthMode::None),
            "token" => Ok(AuthMode::Token),
            "password" => Ok(AuthMode::Password),
            other => Err(anyhow::anyhow!("unknown auth mode: {other}")),
        }
    }
}

/// Result of a login attempt.
#[derive(Debug)]
pub enum LoginOutcome {
    /// Auth mode `none`: trivially accepted, no session minted.
    Open,
    /// Credentials accepted; a session was minted.
    Granted { session_id: String, cookie: String },
    /// Generic rejection. Callers must not reveal which factor failed.
    Denied,
}

pub struct SessionRegistry {
    mode: AuthMode,
    token: Option<String>,
    password_hash: Option<String>,
    secret: [u8; COOKIE_SECRET_LEN],
    sessions: BoundedCache<String, ()>,
}

impl SessionRegistry {
    pub fn new(
        mode: AuthMode,
        token: Option<String>,
        password_hash: Option<String>,
        capacity: usize,
        idle_timeout: Option<Duration>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let mut secret = [0u8; COOKIE_SECRET_LEN];
        rand::thread_rng().fill_bytes(&mut secret);
        Self {
            mode,
            token,
            password_hash,
            secret,
            sessions: BoundedCache::new(capacity, idle_timeout, clock),
        }
    }

    pub fn mode(&self) -> AuthMode {
        self.mode
    }

    /// Mint a session. Returns `(session_id, signed_cookie_value)`.
    pub fn create(&self) -> (String, String) {
        let mut raw = [0u8; SESSION_ID_LEN];
        rand::thread_rng().fill_bytes(&mut raw);
        let id = hex::encode(raw);
        self.sessions.insert(id.clone(), ());
        let cookie = self.encode(&id);
        (id, cookie)
    }

    /// Forget a session id. Unknown ids are ignored.
    pub fn destroy(&self, id: &str) {
        self.sessions.remove(&id.to_string());
    }

    pub fn is_valid(&self, id: &str) -> bool {
        self.sessions.get(&id.to_string()).is_some()
    }

    pub fn live_sessions(&self) -> usize {
        self.sessions.len()
    }

    /// Wrap a session id in its signed cookie value: `<id>.<hex hmac>`.
    pub fn encode(&self, id: &str) -> String {
        format!("{id}.{}", self.sign(id))
    }

    /// Recover a session id from a cookie value.
    ///
    /// `None` on any structural or signature mismatch. Membership in the
    /// registry is a separate check ([`is_valid`](Self::is_valid)).
    pub fn decode(&self, value: &str) -> Option<String> {
        let (id, sig) = value.split_once('.')?;
        if id.is_empty() || sig.is_empty() {
            return None;
        }
        let expected = self.sign(id);
        let matches: bool = expected.as_bytes().ct_eq(sig.as_bytes()).into();
        matches.then(|| id.to_string())
    }

    /// Login decision per auth mode. Failures are uniformly [`LoginOutcome::Denied`].
    pub fn login(&self, token: Option<&str>, password: Option<&str>) -> LoginOutcome {
        let accepted = match self.mode {
            AuthMode::None => return LoginOutcome::Open,
            AuthMode::Token => self.token_matches(token.unwrap_or("")),
            AuthMode::Password => {
                credentials::verify_password(password.unwrap_or(""), self.password_hash.as_deref())
            }
        };
        if !accepted {
            return LoginOutcome::Denied;
        }
        let (session_id, cookie) = self.create();
        LoginOutcome::Granted { session_id, cookie }
    }

    /// Whether a request's Cookie header carries a live session.
    ///
    /// Always true under mode `none`.
    pub fn is_authenticated(&self, cookie_header: Option<&str>) -> bool {
        if self.mode == AuthMode::None {
            return true;
        }
        self.session_from_cookie_header(cookie_header).is_some()
    }

    /// Full request gate: open mode, a live session cookie, or (token mode
    /// only) a matching bearer token.
    pub fn authorize(&self, cookie_header: Option<&str>, bearer: Option<&str>) -> bool {
        if self.mode == AuthMode::None {
            return true;
        }
        if self.session_from_cookie_header(cookie_header).is_some() {
            return true;
        }
        // Bearer tokens only count under token mode.
        self.mode == AuthMode::Token && bearer.is_some_and(|t| self.token_matches(t))
    }

    /// Verified, registered session id from a raw Cookie header.
    pub fn session_from_cookie_header(&self, header: Option<&str>) -> Option<String> {
        let value = cookie_value(header?)?;
        let id = self.decode(value)?;
        self.is_valid(&id).then_some(id)
    }

    fn token_matches(&self, presented: &str) -> bool {
        match self.token.as_deref() {
            Some(expected) if !expected.is_empty() => {
                presented.as_bytes().ct_eq(expected.as_bytes()).into()
            }
            _ => false,
        }
    }

    fn sign(&self, id: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .expect("hmac accepts keys of any length");
        mac.update(id.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }
}

/// Pull the session cookie's value out of a `Cookie` header.
pub fn cookie_value(header: &str) -> Option<&str> {
    header.split(';').map(str::trim).find_map(|pair| {
        let (name, value) = pair.split_once('=')?;
        (name == SESSION_COOKIE).then_some(value)
    })
}

/// `Set-Cookie` header value minting the session cookie.
pub fn set_cookie_header(cookie: &str) -> String {
    format!("{SESSION_COOKIE}={cookie}; Path=/; HttpOnly; SameSite=Lax")
}

/// `Set-Cookie` header value clearing the session cookie.
pub fn clear_cookie_header() -> String {
    format!("{SESSION_COOKIE}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::SystemClock;

    fn registry(mode: AuthMode, token: Option<&str>, hash: Option<&str>) -> SessionRegistry {
        SessionRegistry::new(
            mode,
            token.map(str::to_string),
            hash.map(str::to_string),
            16,
            None,
            Arc::new(SystemClock),
        )
    }

    #[test]
    fn create_encode_decode_round_trip() {
        let reg = registry(AuthMode::Token, Some("tok"), None);
        let (id, cookie) = reg.create();
        assert_eq!(id.len(), SESSION_ID_LEN * 2);
        assert_eq!(reg.decode(&cookie).as_deref(), Some(id.as_str()));
        assert!(reg.is_valid(&id));
    }

    #[test]
    fn tampered_cookie_fails_closed() {
        let reg = registry(AuthMode::Token, Some("tok"), None);
        let (_, cookie) = reg.create();

        let mut sig_flipped = cookie.clone();
        let last = sig_flipped.pop().unwrap();
        sig_flipped.push(if last == '0' { '1' } else { '0' });
        assert!(reg.decode(&sig_flipped).is_none());

        let mut id_flipped: Vec<char> = cookie.chars().collect();
        id_flipped[0] = if id_flipped[0] == '0' { '1' } else { '0' };
        let id_flipped: String = id_flipped.into_iter().collect();
        assert!(reg.decode(&id_flipped).is_none());

        assert!(reg.decode("").is_none());
        assert!(reg.decode("no-separator").is_none());
        assert!(reg.decode(".sigonly").is_none());
        assert!(reg.decode("idonly.").is_none());
    }

    #[test]
    fn destroy_invalidates_session() {
        let reg = registry(AuthMode::Token, Some("tok"), None);
        let (id, cookie) = reg.create();
        reg.destroy(&id);
        assert!(!reg.is_valid(&id));
        // The cookie still decodes (signature intact) but no longer grants.
        assert!(reg.decode(&cookie).is_some());
        let header = format!("{SESSION_COOKIE}={cookie}");
        assert!(!reg.is_authenticated(Some(&header)));
    }

    #[test]
    fn login_matrix() {
        assert!(matches!(
            registry(AuthMode::None, None, None).login(None, None),
            LoginOutcome::Open
        ));

        let reg = registry(AuthMode::Token, Some("secret-token"), None);
        assert!(matches!(
            reg.login(Some("secret-token"), None),
            LoginOutcome::Granted { .. }
        ));
        assert!(matches!(reg.login(Some("wrong"), None), LoginOutcome::Denied));
        assert!(matches!(reg.login(None, None), LoginOutcome::Denied));

        // Token mode with no configured token never grants.
        let empty = registry(AuthMode::Token, Some(""), None);
        assert!(matches!(empty.login(Some(""), None), LoginOutcome::Denied));

        let hash = credentials::hash_password("pw").unwrap();
        let reg = registry(AuthMode::Password, None, Some(&hash));
        assert!(matches!(
            reg.login(None, Some("pw")),
            LoginOutcome::Granted { .. }
        ));
        assert!(matches!(reg.login(None, Some("nope")), LoginOutcome::Denied));

        // Password mode with no stored hash fails closed.
        let locked = registry(AuthMode::Password, None, None);
        assert!(matches!(locked.login(None, Some("pw")), LoginOutcome::Denied));
    }

    #[test]
    fn bearer_only_counts_in_token_mode() {
        let reg = registry(AuthMode::Token, Some("tok"), None);
        assert!(reg.authorize(None, Some("tok")));
        assert!(!reg.authorize(None, Some("wrong")));
        assert!(!reg.authorize(None, None));

        let hash = credentials::hash_password("pw").unwrap();
        let pw = registry(AuthMode::Password, None, Some(&hash));
        assert!(!pw.authorize(None, Some("tok")));

        let open = registry(AuthMode::None, None, None);
        assert!(open.authorize(None, None));
    }

    #[test]
    fn cookie_header_parsing_finds_session_among_others() {
        let reg = registry(AuthMode::Token, Some("tok"), None);
        let (_, cookie) = reg.create();
        let header = format!("theme=dark; {SESSION_COOKIE}={cookie}; lang=en");
        assert!(reg.is_authenticated(Some(&header)));
        assert!(!reg.is_authenticated(Some("theme=dark; lang=en")));
        assert!(!reg.is_authenticated(None));
    }

    #[test]
    fn registry_capacity_is_bounded() {
        let reg = SessionRegistry::new(
            AuthMode::Token,
            Some("tok".into()),
            None,
            2,
            None,
            Arc::new(SystemClock),
        );
        let (first, _) = reg.create();
        let (second, _) = reg.create();
        let (third, _) = reg.create();
        assert_eq!(reg.live_sessions(), 2);
        assert!(!reg.is_valid(&first));
        assert!(reg.is_valid(&second));
        assert!(reg.is_valid(&third));
    }

    #[test]
    fn auth_mode_parses_from_str() {
        assert_eq!("token".parse::<AuthMode>().unwrap(), AuthMode::Token);
        assert_eq!(" None ".parse::<AuthMode>().unwrap(), AuthMode::None);
        assert_eq!("password".parse::<AuthMode>().unwrap(), AuthMode::Password);
        assert!("basic".parse::<AuthMode>().is_err());
    }
}
