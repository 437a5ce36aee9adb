//! # Session store
//!
//! Server-side session entries paired with an HMAC-signed cookie. The
//! cookie carries only the session id and its signature; everything else
//! lives in the in-process store. A tampered or unknown cookie resolves
//! to `Anonymous`.
//!
//! Sessions exist in two states: anonymous (created by the authorization
//! gate to remember a resume path) and authenticated (created at sign-in,
//! always under a fresh id so an anonymous id never becomes a principal).

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use dashmap::DashMap;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

pub const SESSION_COOKIE: &str = "sl_session";

#[derive(Debug, Clone)]
struct SessionEntry {
    user_id: Option<Uuid>,
    resume_path: Option<String>,
}

pub struct SessionStore {
    key: Vec<u8>,
    entries: DashMap<Uuid, SessionEntry>,
}

impl SessionStore {
    pub fn new(secret: &str) -> Self {
        Self {
            key: secret.as_bytes().to_vec(),
            entries: DashMap::new(),
        }
    }

    fn signature(&self, sid: Uuid) -> String {
        let mut mac = HmacSha256::new_from_slice(&self.key)
            .expect("HMAC accepts keys of any length");
        mac.update(sid.as_bytes());
        URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes())
    }

    fn cookie_value(&self, sid: Uuid) -> String {
        format!("{}.{}", sid.as_simple(), self.signature(sid))
    }

    /// Verifies the cookie signature and returns the session id, or
    /// `None` for anything malformed, forged, or unknown to the store.
    fn resolve(&self, cookie: &str) -> Option<Uuid> {
        let (sid_part, sig_part) = cookie.split_once('.')?;
        let sid = Uuid::try_parse(sid_part).ok()?;
        let expected = URL_SAFE_NO_PAD.decode(sig_part).ok()?;
        let mut mac = HmacSha256::new_from_slice(&self.key)
            .expect("HMAC accepts keys of any length");
        mac.update(sid.as_bytes());
        mac.verify_slice(&expected).ok()?;
        self.entries.contains_key(&sid).then_some(sid)
    }

    /// The authenticated principal behind a cookie, if any.
    pub fn principal(&self, cookie: &str) -> Option<Uuid> {
        let sid = self.resolve(cookie)?;
        self.entries.get(&sid)?.user_id
    }

    /// Remembers the originally requested path so sign-in can resume it.
    /// Reuses the caller's session when one exists, otherwise creates an
    /// anonymous entry and returns the cookie value to set.
    pub fn remember_path(&self, cookie: Option<&str>, path: &str) -> String {
        if let Some(sid) = cookie.and_then(|c| self.resolve(c)) {
            if let Some(mut entry) = self.entries.get_mut(&sid) {
                entry.resume_path = Some(path.to_string());
            }
            return self.cookie_value(sid);
        }
        let sid = Uuid::new_v4();
        self.entries.insert(
            sid,
            SessionEntry {
                user_id: None,
                resume_path: Some(path.to_string()),
            },
        );
        self.cookie_value(sid)
    }

    /// Consumes and returns the remembered path, if any.
    pub fn take_resume_path(&self, cookie: Option<&str>) -> Option<String> {
        let sid = cookie.and_then(|c| self.resolve(c))?;
        self.entries
            .get_mut(&sid)
            .and_then(|mut entry| entry.resume_path.take())
    }

    /// Establishes an authenticated session under a fresh id, dropping
    /// any prior anonymous entry for this caller.
    pub fn sign_in(&self, cookie: Option<&str>, user_id: Uuid) -> String {
        if let Some(old) = cookie.and_then(|c| self.resolve(c)) {
            self.entries.remove(&old);
        }
        let sid = Uuid::new_v4();
        self.entries.insert(
            sid,
            SessionEntry {
                user_id: Some(user_id),
                resume_path: None,
            },
        );
        self.cookie_value(sid)
    }

    /// Invalidates the session; subsequent requests are `Anonymous`.
    pub fn sign_out(&self, cookie: &str) {
        if let Some(sid) = self.resolve(cookie) {
            self.entries.remove(&sid);
        }
    }
}
