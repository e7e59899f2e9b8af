use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use chrono::Utc;
use p384::ecdsa::signature::Signer;
use p384::ecdsa::{Signature, SigningKey};
use p384::pkcs8::EncodePublicKey;
use p384::SecretKey;
use rand::rngs::OsRng;
use rand::Rng;
use serde_json::{json, Value};
use uuid::Uuid;

use super::codec::ProtocolError;
use super::packets::since;

const SKIN_SIZE: usize = 64 * 64 * 4;
const TOKEN_LIFETIME_SECS: i64 = 24 * 60 * 60;

/// Self-signed offline identity for one connection
pub struct ClientIdentity {
    secret: SecretKey,
    public_key: String,
    username: String,
    uuid: Uuid,
    client_random_id: i64,
}

impl ClientIdentity {
    pub fn generate(username: &str) -> Result<Self, ProtocolError> {
        let secret = SecretKey::random(&mut OsRng);
        let der = secret
            .public_key()
            .to_public_key_der()
            .map_err(|e| ProtocolError::Handshake(format!("key export failed: {e}")))?;

        Ok(Self {
            secret,
            public_key: STANDARD.encode(der.as_bytes()),
            username: username.to_string(),
            uuid: Uuid::new_v4(),
            client_random_id: OsRng.gen(),
        })
    }

    pub fn secret(&self) -> &SecretKey {
        &self.secret
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    fn sign(&self, claims: &Value) -> Result<String, ProtocolError> {
        let header = json!({ "alg": "ES384", "x5u": self.public_key });
        let encode = |value: &Value| -> Result<String, ProtocolError> {
            let raw = serde_json::to_vec(value)
                .map_err(|e| ProtocolError::Handshake(format!("token encoding failed: {e}")))?;
            Ok(URL_SAFE_NO_PAD.encode(raw))
        };

        let signing_input = format!("{}.{}", encode(&header)?, encode(claims)?);
        let signature: Signature = SigningKey::from(&self.secret).sign(signing_input.as_bytes());
        Ok(format!("{signing_input}.{}", URL_SAFE_NO_PAD.encode(signature.to_bytes())))
    }

    /// Identity chain, wrapped in the certificate envelope on newer protocols
    pub fn chain(&self, protocol: i32) -> Result<String, ProtocolError> {
        let now = Utc::now().timestamp();
        let identity = self.sign(&json!({
            "extraData": {
                "displayName": self.username,
                "identity": self.uuid.to_string(),
                "XUID": "",
                "titleId": "896928775",
            },
            "identityPublicKey": self.public_key,
            "certificateAuthority": true,
            "nbf": now - 60,
            "exp": now + TOKEN_LIFETIME_SECS,
        }))?;

        let chain = json!({ "chain": [identity] });
        let payload = if protocol >= since::CERTIFICATE_LOGIN {
            json!({
                "AuthenticationType": 2,
                "Certificate": chain.to_string(),
                "Token": "",
            })
        } else {
            chain
        };
        Ok(payload.to_string())
    }

    /// Client-data token describing the device and skin
    pub fn client_data(&self, host: &str, port: u16, version: &str) -> Result<String, ProtocolError> {
        let geometry = r#"{"format_version":"1.12.0","minecraft:geometry":[]}"#;
        self.sign(&json!({
            "ClientRandomId": self.client_random_id,
            "CurrentInputMode": 1,
            "DefaultInputMode": 1,
            "DeviceId": Uuid::new_v4().to_string(),
            "DeviceModel": "",
            "DeviceOS": 7,
            "GameVersion": version,
            "GuiScale": 0,
            "LanguageCode": "en_US",
            "PlatformOfflineId": "",
            "PlatformOnlineId": "",
            "PlayFabId": "",
            "SelfSignedId": Uuid::new_v4().to_string(),
            "ServerAddress": format!("{host}:{port}"),
            "ThirdPartyName": self.username,
            "UIProfile": 0,
            "IsEditorMode": false,
            "TrustedSkin": false,
            "OverrideSkin": false,
            "CompatibleWithClientSideChunkGen": false,
            "MaxViewDistance": 8,
            "MemoryTier": 0,
            "PlatformType": 0,
            "GraphicsMode": 1,
            "SkinId": format!("{}.Custom", self.uuid),
            "SkinData": STANDARD.encode(vec![0u8; SKIN_SIZE]),
            "SkinImageWidth": 64,
            "SkinImageHeight": 64,
            "SkinResourcePatch": STANDARD.encode(r#"{"geometry":{"default":"geometry.humanoid.custom"}}"#),
            "SkinGeometryData": STANDARD.encode(geometry),
            "SkinGeometryDataEngineVersion": "",
            "SkinAnimationData": "",
            "SkinColor": "#0",
            "ArmSize": "wide",
            "PersonaSkin": false,
            "PremiumSkin": false,
            "PersonaPieces": [],
            "PieceTintColors": [],
            "AnimatedImageData": [],
            "CapeData": "",
            "CapeId": "",
            "CapeImageWidth": 0,
            "CapeImageHeight": 0,
            "CapeOnClassicSkin": false,
        }))
    }
}
