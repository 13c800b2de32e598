use std::error::Error;
use std::fmt::Display;
use std::sync::Arc;

use base64::alphabet;
use base64::engine::{GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;
use metrics::counter;
use serde::Deserialize;
use utoipa::ToSchema;

use crate::api::{CaptureError, SessionResponse, OK_MESSAGE};
use crate::identity::{PlayerId, RANDOM_VALUE_LEN};
use crate::time::TimeSource;
use crate::token::{InvalidToken, TokenSigner};

/// Longest Steam ID string we bother parsing. Comfortably above the 20 digits
/// of u64::MAX while still bounding the input.
pub const MAX_STEAM_ID_LEN: usize = 25;

/// Standard alphabet with padding. Non-zero bits after the last byte are ignored,
/// as most client side encoders and decoders do.
const RANDOM_VALUE_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_allow_trailing_bits(true),
);

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct AuthRequest {
    #[schema(pattern = "^[0-9]{1,25}$")]
    pub steam_id: String,
    /// 32 random bytes generated by the client, standard base64.
    #[schema(format = Byte)]
    pub random_value: String,
    pub os: String,
    pub os_version: String,
}

/// Why a session request was refused. Only used for metrics and logs, the
/// client always gets the same "Invalid parameter" answer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InvalidParameterReason {
    SteamIdNotNumeric,
    SteamIdTooLong,
    SteamIdOutOfRange,
    RandomValueNotBase64,
    RandomValueWrongLength,
}

impl InvalidParameterReason {
    pub fn reason(&self) -> &'static str {
        match *self {
            Self::SteamIdNotNumeric => "steam_id_not_numeric",
            Self::SteamIdTooLong => "steam_id_too_long",
            Self::SteamIdOutOfRange => "steam_id_out_of_range",
            Self::RandomValueNotBase64 => "random_value_not_base64",
            Self::RandomValueWrongLength => "random_value_wrong_length",
        }
    }
}

impl Display for InvalidParameterReason {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.reason())
    }
}

impl Error for InvalidParameterReason {}

/// Check the client supplied identity parameters and turn them into their binary form.
pub fn validate_parameters(
    steam_id: &str,
    random_value: &str,
) -> Result<(u64, [u8; RANDOM_VALUE_LEN]), InvalidParameterReason> {
    if steam_id.is_empty() || !steam_id.bytes().all(|b| b.is_ascii_digit()) {
        return Err(InvalidParameterReason::SteamIdNotNumeric);
    }

    if steam_id.len() > MAX_STEAM_ID_LEN {
        return Err(InvalidParameterReason::SteamIdTooLong);
    }

    let decoded = RANDOM_VALUE_ENGINE
        .decode(random_value)
        .map_err(|_| InvalidParameterReason::RandomValueNotBase64)?;

    let random_value: [u8; RANDOM_VALUE_LEN] = decoded
        .try_into()
        .map_err(|_| InvalidParameterReason::RandomValueWrongLength)?;

    let steam_id = steam_id
        .parse::<u64>()
        .map_err(|_| InvalidParameterReason::SteamIdOutOfRange)?;

    Ok((steam_id, random_value))
}

/// Issues session tokens and resolves them back into player identities.
pub struct SessionService {
    signer: TokenSigner,
    timesource: Arc<dyn TimeSource + Send + Sync>,
}

impl SessionService {
    pub fn new(signer: TokenSigner, timesource: Arc<dyn TimeSource + Send + Sync>) -> Self {
        Self { signer, timesource }
    }

    pub fn issue(&self, request: &AuthRequest) -> Result<SessionResponse, CaptureError> {
        let (steam_id, random_value) =
            validate_parameters(&request.steam_id, &request.random_value).map_err(|reason| {
                counter!("capture_sessions_rejected_total", "reason" => reason.reason())
                    .increment(1);
                tracing::debug!("rejected session request: {}", reason);
                CaptureError::InvalidParameter(reason)
            })?;

        let player = PlayerId::derive(steam_id, &random_value);
        let token = self
            .signer
            .sign(steam_id, player, self.timesource.current_time())
            .map_err(|err| {
                tracing::error!("failed to sign session token: {}", err);
                CaptureError::TokenSigningError
            })?;

        counter!("capture_sessions_issued_total").increment(1);

        Ok(SessionResponse {
            message: OK_MESSAGE.to_string(),
            token,
            expire: self.signer.expiry_seconds(),
        })
    }

    pub fn verify(&self, token: &str) -> Result<PlayerId, InvalidToken> {
        self.signer
            .verify(token, self.timesource.current_time())
            .map(|claims| claims.uuid)
    }
}
