//! EIP-712 typed-data signing.
//!
//! The exchange hands out typed-data documents (login data, orders to sign)
//! in the `eth_signTypedData_v4` JSON layout. Signatures are sent back as
//! `0x`-prefixed hex of `r || s || v` with `v` in `{27, 28}`.

use alloy::{
    dyn_abi::TypedData,
    primitives::{Address, B256, Signature, U256, hex},
    signers::{SignerSync, local::PrivateKeySigner},
};
use serde_json::{Map, Value};

use crate::error::ApiError;

/// Signs typed-data documents with a local private key.
#[derive(Clone, derive_more::Debug)]
pub struct TypedDataSigner {
    #[debug(skip)]
    signer: PrivateKeySigner,
}

impl TypedDataSigner {
    /// Creates a signer from hex private key, with or without `0x` prefix.
    pub fn new(private_key: &str) -> Result<Self, ApiError> {
        let private_key = private_key.trim();
        if private_key.is_empty() {
            return Err(ApiError::EmptyKey("private key"));
        }
        let signer = private_key
            .strip_prefix("0x")
            .unwrap_or(private_key)
            .parse::<PrivateKeySigner>()?;
        Ok(Self { signer })
    }

    /// Address derived from the private key.
    pub fn address(&self) -> Address {
        self.signer.address()
    }

    /// Signs typed-data document.
    pub fn sign(&self, typed_data: &Value) -> Result<Signature, ApiError> {
        let hash = signing_hash(typed_data)?;
        Ok(self.signer.sign_hash_sync(&hash)?)
    }

    /// Signs typed-data document and returns `0x`-prefixed signature hex.
    pub fn sign_hex(&self, typed_data: &Value) -> Result<String, ApiError> {
        Ok(signature_hex(&self.sign(typed_data)?))
    }
}

/// EIP-712 digest of a typed-data JSON document.
pub fn signing_hash(typed_data: &Value) -> Result<B256, ApiError> {
    let typed: TypedData = serde_json::from_value(typed_data.clone())?;
    Ok(typed.eip712_signing_hash()?)
}

/// `0x`-prefixed hex of `r || s || v`, `v` being 27 or 28.
pub fn signature_hex(signature: &Signature) -> String {
    hex::encode_prefixed(signature.as_bytes())
}

/// Converts numeric strings of integer fields of the primary type (and nested
/// struct types) into JSON numbers when they fit `u64`.
/// Larger values are kept as decimal strings.
pub fn normalize_uint_fields(typed_data: &mut Value) {
    let Some(types) = typed_data.get("types").cloned() else {
        return;
    };
    let Some(primary) = typed_data
        .get("primaryType")
        .and_then(Value::as_str)
        .map(str::to_owned)
    else {
        return;
    };
    if let Some(Value::Object(message)) = typed_data.get_mut("message") {
        normalize_struct(&types, &primary, message);
    }
}

fn normalize_struct(types: &Value, type_name: &str, value: &mut Map<String, Value>) {
    let Some(fields) = types.get(type_name).and_then(Value::as_array) else {
        return;
    };
    for field in fields {
        let (Some(name), Some(r#type)) = (
            field.get("name").and_then(Value::as_str),
            field.get("type").and_then(Value::as_str),
        ) else {
            continue;
        };
        let Some(entry) = value.get_mut(name) else {
            continue;
        };
        if r#type.starts_with("uint") || r#type.starts_with("int") {
            if let Value::String(s) = entry {
                if let Some(n) = parse_integer(s) {
                    *entry = n;
                }
            }
        } else if let Value::Object(nested) = entry {
            normalize_struct(types, r#type, nested);
        }
    }
}

fn parse_integer(value: &str) -> Option<Value> {
    let parsed = match value.strip_prefix("0x") {
        Some(digits) => U256::from_str_radix(digits, 16).ok()?,
        None => U256::from_str_radix(value, 10).ok()?,
    };
    if parsed <= U256::from(u64::MAX) {
        Some(Value::from(parsed.to::<u64>()))
    } else {
        Some(Value::String(parsed.to_string()))
    }
}
