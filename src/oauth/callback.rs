//! OAuth callback parameters
//!
//! Query string the identity provider appends when redirecting the user
//! back to `/auth/callback`.

use serde::Deserialize;

use crate::{Error, Result};

/// OAuth callback query parameters
#[derive(Debug, Default, Deserialize)]
pub struct CallbackParams {
    /// Authorization code
    pub code: Option<String>,

    /// State parameter (for CSRF protection)
    pub state: Option<String>,

    /// Error code
    pub error: Option<String>,

    /// Error description
    pub error_description: Option<String>,
}

/// A validated-shape callback: code and state both present
#[derive(Debug)]
pub struct CallbackResult {
    /// Authorization code
    pub code: String,

    /// State parameter
    pub state: String,
}

impl CallbackParams {
    /// Turn the raw parameters into a code/state pair.
    ///
    /// Does not check the state against issued values; the caller does that.
    pub fn into_result(self) -> Result<CallbackResult> {
        if let Some(error) = self.error {
            let description = self
                .error_description
                .unwrap_or_else(|| "Unknown error".to_string());
            return Err(Error::AuthorizationDenied(format!("{error} - {description}")));
        }

        let code = self
            .code
            .filter(|c| !c.is_empty())
            .ok_or(Error::MissingParameter("code"))?;

        let state = self.state.ok_or(Error::StateNotFound)?;

        Ok(CallbackResult { code, state })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_callback_params_deserialize() {
        let params: CallbackParams =
            serde_urlencoded::from_str("code=abc123&state=xyz789").unwrap();

        assert_eq!(params.code, Some("abc123".to_string()));
        assert_eq!(params.state, Some("xyz789".to_string()));
    }

    #[test]
    fn error_parameter_is_denial() {
        let params: CallbackParams =
            serde_urlencoded::from_str("error=access_denied&error_description=user+cancelled")
                .unwrap();
        let err = params.into_result().unwrap_err();
        assert!(matches!(err, Error::AuthorizationDenied(ref m) if m.contains("user cancelled")));
    }

    #[test]
    fn missing_state_is_state_not_found() {
        let params: CallbackParams = serde_urlencoded::from_str("code=abc").unwrap();
        assert!(matches!(params.into_result(), Err(Error::StateNotFound)));
    }

    #[test]
    fn missing_code_is_client_error() {
        let params: CallbackParams = serde_urlencoded::from_str("state=s").unwrap();
        assert!(matches!(
            params.into_result(),
            Err(Error::MissingParameter("code"))
        ));

        let params: CallbackParams = serde_urlencoded::from_str("code=&state=s").unwrap();
        assert!(matches!(
            params.into_result(),
            Err(Error::MissingParameter("code"))
        ));
    }
}
