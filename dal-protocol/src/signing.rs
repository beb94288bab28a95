//! Request signing.
//!
//! Every signature is an HMAC-SHA1 rendered as lowercase hex. Login chains
//! three HMACs starting from the password; updates and uploads are keyed with
//! the session write-token over the concatenation of the command URL, a random
//! nonce and the parameter values (plus the upload's MD5 for file uploads).
//!
//! `None` parameter values are signed as the empty string. A server that tells
//! null apart from empty would compute a different signature.

use hmac::{Hmac, Mac};
use md5::{Digest, Md5};
use rand::rngs::OsRng;
use rand::RngCore;
use sha1::Sha1;
use std::io::{self, Read};

type HmacSha1 = Hmac<Sha1>;

/// Form field carrying the nonce.
pub const FIELD_RAND_NUM: &str = "rand_num";
/// Form field carrying the signed command URL.
pub const FIELD_URL: &str = "url";
/// Form field listing the signed parameter names.
pub const FIELD_PARAM_ORDER: &str = "param_order";
/// Form field carrying the signature.
pub const FIELD_SIGNATURE: &str = "signature";
/// Form field selecting the response format.
pub const FIELD_CTYPE: &str = "ctype";
/// Multipart part name of an uploaded file.
pub const UPLOAD_PART: &str = "uploadfile";

const CHECKSUM_BUF_SIZE: usize = 8 * 1024;

/// Computes `HMAC-SHA1(key, data)` as lowercase hex.
pub fn hmac_sha1_hex(key: &str, data: &str) -> String {
    let mut mac =
        HmacSha1::new_from_slice(key.as_bytes()).expect("HMAC accepts keys of any length");
    mac.update(data.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Returns a fresh nonce: the decimal form of a random non-negative 63-bit
/// value drawn from the OS RNG.
pub fn random_nonce() -> String {
    (OsRng.next_u64() >> 1).to_string()
}

/// Returns the lowercase hex MD5 of everything readable from `reader`.
pub fn md5_checksum<R: Read>(mut reader: R) -> io::Result<String> {
    let mut hasher = Md5::new();
    let mut buf = [0u8; CHECKSUM_BUF_SIZE];
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Signed fields of a login request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginSignature {
    pub nonce: String,
    pub url: String,
    pub signature: String,
}

impl LoginSignature {
    /// Form fields in transmission order.
    pub fn form_fields(&self) -> Vec<(String, String)> {
        vec![
            (FIELD_RAND_NUM.to_string(), self.nonce.clone()),
            (FIELD_URL.to_string(), self.url.clone()),
            (FIELD_SIGNATURE.to_string(), self.signature.clone()),
        ]
    }
}

/// Signs a login URL with a fresh nonce.
pub fn sign_login(username: &str, password: &str, url: &str) -> LoginSignature {
    sign_login_with_nonce(username, password, url, &random_nonce())
}

/// Signs a login URL: `HMAC(HMAC(HMAC(password, username), nonce), url)`.
pub fn sign_login_with_nonce(
    username: &str,
    password: &str,
    url: &str,
    nonce: &str,
) -> LoginSignature {
    let password_key = hmac_sha1_hex(password, username);
    let nonce_key = hmac_sha1_hex(&password_key, nonce);
    LoginSignature {
        nonce: nonce.to_string(),
        url: url.to_string(),
        signature: hmac_sha1_hex(&nonce_key, url),
    }
}

/// The exact string fed to the HMAC, kept for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignaturePayload {
    data: String,
    param_order: String,
}

impl SignaturePayload {
    fn new<'a, I>(url: &str, nonce: &str, params: I, checksum: Option<&str>) -> Self
    where
        I: IntoIterator<Item = (&'a str, Option<&'a str>)>,
    {
        let mut data = String::with_capacity(url.len() + nonce.len() + 64);
        let mut param_order = String::new();
        data.push_str(url);
        data.push_str(nonce);
        for (name, value) in params {
            data.push_str(value.unwrap_or(""));
            param_order.push_str(name);
            param_order.push(',');
        }
        if let Some(checksum) = checksum {
            data.push_str(checksum);
        }
        Self { data, param_order }
    }

    /// Returns the signed bytes as text.
    pub fn as_str(&self) -> &str {
        &self.data
    }

    /// Returns the parameter names, each followed by a comma.
    pub fn param_order(&self) -> &str {
        &self.param_order
    }
}

/// Signed fields of an update or upload request.
#[derive(Clone, PartialEq, Eq)]
pub struct SignedRequest {
    pub nonce: String,
    pub url: String,
    pub param_order: String,
    pub signature: String,
    payload: SignaturePayload,
}

impl SignedRequest {
    /// Returns the payload the signature was computed over.
    pub fn payload(&self) -> &SignaturePayload {
        &self.payload
    }

    /// Signed fields in transmission order. These follow the request's own
    /// parameters.
    pub fn form_fields(&self) -> Vec<(String, String)> {
        vec![
            (FIELD_RAND_NUM.to_string(), self.nonce.clone()),
            (FIELD_URL.to_string(), self.url.clone()),
            (FIELD_PARAM_ORDER.to_string(), self.param_order.clone()),
            (FIELD_SIGNATURE.to_string(), self.signature.clone()),
        ]
    }
}

impl std::fmt::Debug for SignedRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignedRequest")
            .field("nonce", &self.nonce)
            .field("url", &self.url)
            .field("param_order", &self.param_order)
            .field("signature", &self.signature)
            .finish()
    }
}

/// Signs mutating requests with a session write-token.
#[derive(Clone)]
pub struct RequestSigner {
    write_token: String,
}

impl RequestSigner {
    pub fn new(write_token: impl Into<String>) -> Self {
        Self {
            write_token: write_token.into(),
        }
    }

    /// Signs an update: payload is `url + nonce + values`.
    pub fn sign_update<'a, I>(&self, url: &str, params: I) -> SignedRequest
    where
        I: IntoIterator<Item = (&'a str, Option<&'a str>)>,
    {
        self.sign_update_with_nonce(url, params, &random_nonce())
    }

    pub fn sign_update_with_nonce<'a, I>(&self, url: &str, params: I, nonce: &str) -> SignedRequest
    where
        I: IntoIterator<Item = (&'a str, Option<&'a str>)>,
    {
        self.sign(url, nonce, params, None)
    }

    /// Signs an upload: payload is `url + nonce + values + checksum`.
    pub fn sign_upload<'a, I>(&self, url: &str, params: I, checksum: &str) -> SignedRequest
    where
        I: IntoIterator<Item = (&'a str, Option<&'a str>)>,
    {
        self.sign_upload_with_nonce(url, params, checksum, &random_nonce())
    }

    pub fn sign_upload_with_nonce<'a, I>(
        &self,
        url: &str,
        params: I,
        checksum: &str,
        nonce: &str,
    ) -> SignedRequest
    where
        I: IntoIterator<Item = (&'a str, Option<&'a str>)>,
    {
        self.sign(url, nonce, params, Some(checksum))
    }

    fn sign<'a, I>(&self, url: &str, nonce: &str, params: I, checksum: Option<&str>) -> SignedRequest
    where
        I: IntoIterator<Item = (&'a str, Option<&'a str>)>,
    {
        let payload = SignaturePayload::new(url, nonce, params, checksum);
        SignedRequest {
            nonce: nonce.to_string(),
            url: url.to_string(),
            param_order: payload.param_order.clone(),
            signature: hmac_sha1_hex(&self.write_token, payload.as_str()),
            payload,
        }
    }
}

impl std::fmt::Debug for RequestSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestSigner")
            .field("write_token", &"<redacted>")
            .finish()
    }
}
