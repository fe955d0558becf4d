use aliri_braid::braid;
use std::fmt;

/// Redacts a secret braid: plain formatting prints only `label`, while `{:#}`
/// reveals up to `width` characters (`default` for `Debug`, all for `Display`).
macro_rules! redacted {
    ($ty:ty, $label:literal, $default:literal) => {
        impl fmt::Debug for $ty {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                if !f.alternate() {
                    return f.write_str(concat!("***", $label, "***"));
                }
                write!(f, "\"")?;
                reveal_prefix(self.as_str(), f, $default)?;
                write!(f, "\"")
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                if !f.alternate() {
                    return f.write_str(concat!("***", $label, "***"));
                }
                reveal_prefix(self.as_str(), f, usize::MAX)
            }
        }
    };
}

/// Writes at most `width - 1` leading characters followed by an ellipsis,
/// or the whole secret when it fits.
fn reveal_prefix(secret: &str, f: &mut fmt::Formatter, default_width: usize) -> fmt::Result {
    let width = f.width().unwrap_or(default_width);
    if width <= 1 {
        return f.write_str("…");
    }
    match secret.char_indices().nth(width - 1) {
        Some((cut, _)) => {
            f.write_str(&secret[..cut])?;
            f.write_str("…")
        }
        None => f.write_str(secret),
    }
}

/// The identifier of the application registered with the identity backend
///
/// Also used as the account under which credentials are persisted.
#[braid(serde)]
pub struct ClientId;

/// The secret paired with a [`ClientId`]
#[braid(serde, debug = "owned", display = "owned")]
pub struct ClientSecret;

redacted!(ClientSecretRef, "CLIENT SECRET", 5);

/// A bearer access token, either application-level or user-level
#[braid(serde, debug = "owned", display = "owned")]
pub struct AccessToken;

redacted!(AccessTokenRef, "ACCESS TOKEN", 15);

/// A refresh token used to renew a user session
#[braid(serde, debug = "owned", display = "owned")]
pub struct RefreshToken;

redacted!(RefreshTokenRef, "REFRESH TOKEN", 5);
