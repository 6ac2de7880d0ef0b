use alloy::primitives::{Address, B256, U256};
use alloy::signers::local::PrivateKeySigner;
use alloy::sol_types::{Revert, SolError};
use std::str::FromStr;

use crate::error::{ClientError, ClientResult};

/// Validates and normalizes an Ethereum address
pub fn validate_address(address: &str) -> ClientResult<Address> {
    let address = address.trim();

    if address.is_empty() {
        return Err(ClientError::Argument("Address cannot be empty".to_string()));
    }

    if !address.starts_with("0x") && !address.starts_with("0X") {
        return Err(ClientError::Argument(format!(
            "Invalid address format: '{}'. Ethereum addresses must start with '0x'",
            address
        )));
    }

    if address.len() != 42 {
        return Err(ClientError::Argument(format!(
            "Invalid address length: '{}'. Ethereum addresses must be exactly 42 characters (0x + 40 hex characters)",
            address
        )));
    }

    let hex_part = &address[2..];
    if !hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(ClientError::Argument(format!(
            "Invalid address format: '{}'. Contains non-hexadecimal characters",
            address
        )));
    }

    // Mixed-case input goes through checksum validation in Address::from_str
    Address::from_str(address).map_err(|e| {
        ClientError::Argument(format!("Invalid Ethereum address: '{}'. Error: {}", address, e))
    })
}

/// Validates function name
pub fn validate_function_name(function_name: &str) -> ClientResult<()> {
    let Some(first) = function_name.chars().next() else {
        return Err(ClientError::Argument(
            "Function name cannot be empty".to_string(),
        ));
    };

    if !first.is_ascii_alphabetic() && first != '_' {
        return Err(ClientError::Argument(format!(
            "Invalid function name: '{}'. Function names must start with a letter or underscore",
            function_name
        )));
    }

    if !function_name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(ClientError::Argument(format!(
            "Invalid function name: '{}'. Function names can only contain letters, numbers, and underscores",
            function_name
        )));
    }

    Ok(())
}

/// Parses an integer id or count given as decimal or `0x` hex
pub fn parse_uint(value_str: &str) -> ClientResult<U256> {
    let value_str = value_str.trim();
    if value_str.is_empty() {
        return Err(ClientError::Argument("Value cannot be empty".to_string()));
    }

    if let Some(hex) = value_str
        .strip_prefix("0x")
        .or_else(|| value_str.strip_prefix("0X"))
    {
        U256::from_str_radix(hex, 16)
            .map_err(|_| ClientError::Argument(format!("Invalid hexadecimal value: '{}'", value_str)))
    } else {
        U256::from_str_radix(value_str, 10).map_err(|_| {
            ClientError::Argument(format!(
                "Invalid numeric value: '{}'. Use decimal format or '0x' prefixed hex",
                value_str
            ))
        })
    }
}

/// Resolves a signer from either a raw hex key or the name of an environment
/// variable holding one.
pub fn resolve_private_key(key_or_env: &str) -> ClientResult<PrivateKeySigner> {
    let key_or_env = key_or_env.trim();
    if key_or_env.is_empty() {
        return Err(ClientError::Configuration(
            "No private key given".to_string(),
        ));
    }

    let candidate = std::env::var(key_or_env).unwrap_or_else(|_| key_or_env.to_string());
    let candidate = candidate.trim();
    let candidate = candidate.strip_prefix("0x").unwrap_or(candidate);

    if candidate.len() != 64 || !candidate.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(ClientError::Configuration(format!(
            "Invalid private key from '{}'. Pass a 0x-prefixed 64-hex-char key, or the name of an environment variable holding one",
            if key_or_env.len() > 20 { "<raw key>" } else { key_or_env }
        )));
    }

    PrivateKeySigner::from_str(candidate)
        .map_err(|e| ClientError::Configuration(format!("Invalid private key: {}", e)))
}

/// Encodes text the way Solidity tooling builds a `bytes32` string constant
pub fn encode_bytes32_string(text: &str) -> ClientResult<B256> {
    let bytes = text.as_bytes();
    // One byte is kept for the terminating zero
    if bytes.len() > 31 {
        return Err(ClientError::Argument(format!(
            "'{}' is too long for a bytes32 string ({} bytes, max 31)",
            text,
            bytes.len()
        )));
    }

    let mut word = [0u8; 32];
    word[..bytes.len()].copy_from_slice(bytes);
    Ok(B256::from(word))
}

/// Accepts a raw 32-byte hex salt or short text encoded as a bytes32 string
pub fn parse_salt(salt: &str) -> ClientResult<B256> {
    let is_raw_word = salt.len() == 66
        && salt.starts_with("0x")
        && salt[2..].chars().all(|c| c.is_ascii_hexdigit());

    if is_raw_word {
        B256::from_str(salt).map_err(|e| ClientError::Argument(format!("Invalid salt: {}", e)))
    } else {
        encode_bytes32_string(salt)
    }
}

/// Expands a bare IPFS content hash with the gateway prefix; full URIs pass through
pub fn resolve_token_uri(uri_or_hash: &str, gateway: &str) -> String {
    let uri_or_hash = uri_or_hash.trim();
    if uri_or_hash.contains("://") {
        uri_or_hash.to_string()
    } else {
        format!("{}/{}", gateway.trim_end_matches('/'), uri_or_hash)
    }
}

/// Pulls the revert reason out of a node error message, verbatim when the
/// node includes it as text, decoded from `Error(string)` data otherwise.
pub fn extract_revert_reason(error: &str) -> Option<String> {
    const MARKER: &str = "execution reverted";

    let Some(idx) = error.find(MARKER) else {
        return decode_revert_data(error);
    };

    let rest = &error[idx + MARKER.len()..];
    if let Some(text) = rest.strip_prefix(':') {
        let text = text.split(", data:").next().unwrap_or(text);
        let text = text.trim().trim_matches('"').trim();
        if !text.is_empty() {
            return Some(text.to_string());
        }
    }

    decode_revert_data(error).or_else(|| Some(MARKER.to_string()))
}

/// Decodes an `Error(string)` payload embedded as hex somewhere in `text`
pub fn decode_revert_data(text: &str) -> Option<String> {
    const SELECTOR: &str = "0x08c379a0";

    let start = text.find(SELECTOR)?;
    let hex_digits: String = text[start + 2..]
        .chars()
        .take_while(|c| c.is_ascii_hexdigit())
        .collect();
    let bytes = hex::decode(hex_digits).ok()?;
    decode_revert_bytes(&bytes)
}

/// Decodes raw `Error(string)` return data
pub fn decode_revert_bytes(bytes: &[u8]) -> Option<String> {
    Revert::abi_decode(bytes, false).ok().map(|revert| revert.reason)
}

/// Maps a node or transport error message onto the error taxonomy
pub fn classify_rpc_error(error: &str) -> ClientError {
    if let Some(reason) = extract_revert_reason(error) {
        return ClientError::Revert(reason);
    }

    let lower = error.to_lowercase();
    if lower.contains("insufficient funds") || lower.contains("insufficient balance") {
        return ClientError::InsufficientFunds {
            have: "unknown".to_string(),
            need: "more than the account balance".to_string(),
        };
    }

    if lower.contains("connection refused")
        || lower.contains("network unreachable")
        || lower.contains("error sending request")
        || lower.contains("dns error")
        || lower.contains("timeout")
        || lower.contains("timed out")
    {
        return ClientError::Connection(interpret_rpc_error(error));
    }

    ClientError::Unknown(interpret_rpc_error(error))
}

/// Creates user-friendly error messages for common RPC errors
pub fn interpret_rpc_error(error: &str) -> String {
    if error.contains("execution reverted") {
        format!(
            "Transaction failed: The contract function reverted execution. {}",
            if error.contains("revert") {
                "This usually means the function's requirements were not met or an assertion failed."
            } else {
                "Check your parameters and try again."
            }
        )
    } else if error.contains("insufficient funds") {
        "Transaction failed: Insufficient funds to cover value and gas costs. Top up the account from a faucet.".to_string()
    } else if error.contains("gas required exceeds allowance") {
        "Transaction failed: Gas limit too low. Try increasing the gas limit for this transaction."
            .to_string()
    } else if error.contains("nonce too low") {
        "Transaction failed: Nonce too low. This usually means another transaction was already mined with this nonce.".to_string()
    } else if error.contains("replacement transaction underpriced") {
        "Transaction failed: Gas price too low to replace pending transaction. Increase the gas price.".to_string()
    } else if error.contains("connection refused") || error.contains("network unreachable") {
        "Network error: Cannot connect to RPC endpoint. Check your internet connection and RPC URL configuration.".to_string()
    } else if error.contains("timeout") || error.contains("timed out") {
        "Network error: Request timed out. The RPC endpoint may be overloaded or unreachable."
            .to_string()
    } else if error.contains("rate limit") {
        "Rate limit error: Too many requests to the RPC endpoint. Try again in a few moments or use a different endpoint.".to_string()
    } else if error.contains("method not found") {
        "RPC error: The requested method is not supported by this RPC endpoint. Try using a different endpoint.".to_string()
    } else {
        format!("RPC error: {}", error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    #[test]
    fn test_validate_address() {
        assert!(validate_address("0x742d35cc6435c9c1c72c5e7b18bab7e1db7a5d6e").is_ok());
        assert!(validate_address("0x0000000000000000000000000000000000000000").is_ok());

        assert!(validate_address("").is_err());
        assert!(validate_address("not_an_address").is_err());
        assert!(validate_address("0x123").is_err());
        assert!(validate_address("742d35Cc6435C9c1c72c5E7b18BaB7e1DB7a5d6e").is_err());
        assert!(matches!(
            validate_address("0xgg2d35Cc6435C9c1c72c5E7b18BaB7e1DB7a5d6e"),
            Err(ClientError::Argument(_))
        ));
    }

    #[test]
    fn test_validate_function_name() {
        assert!(validate_function_name("createToken").is_ok());
        assert!(validate_function_name("_internal").is_ok());
        assert!(validate_function_name("getToken123").is_ok());

        assert!(validate_function_name("").is_err());
        assert!(validate_function_name("123invalid").is_err());
        assert!(validate_function_name("invalid-name").is_err());
    }

    #[test]
    fn test_parse_uint() {
        assert_eq!(parse_uint("42").unwrap(), U256::from(42u64));
        assert_eq!(parse_uint("0x2a").unwrap(), U256::from(42u64));
        assert!(parse_uint("").is_err());
        assert!(parse_uint("4.2").is_err());
    }

    #[test]
    fn test_resolve_private_key_raw_and_env() {
        let signer = resolve_private_key(TEST_KEY).unwrap();
        assert_eq!(
            signer.address(),
            validate_address("0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266").unwrap()
        );

        std::env::set_var("HUB_CLIENT_TEST_KEY", TEST_KEY.trim_start_matches("0x"));
        let from_env = resolve_private_key("HUB_CLIENT_TEST_KEY").unwrap();
        assert_eq!(from_env.address(), signer.address());

        assert!(matches!(
            resolve_private_key("HUB_CLIENT_UNSET_VARIABLE"),
            Err(ClientError::Configuration(_))
        ));
        assert!(resolve_private_key("").is_err());
    }

    #[test]
    fn test_bytes32_string() {
        let word = encode_bytes32_string("demo-salt-1").unwrap();
        assert_eq!(&word[..11], b"demo-salt-1");
        assert!(word[11..].iter().all(|b| *b == 0));
        assert!(encode_bytes32_string(&"x".repeat(32)).is_err());

        let raw = format!("0x{}", "11".repeat(32));
        assert_eq!(parse_salt(&raw).unwrap(), B256::repeat_byte(0x11));
        assert_eq!(parse_salt("demo-salt-1").unwrap(), word);
    }

    #[test]
    fn test_resolve_token_uri() {
        assert_eq!(
            resolve_token_uri("QmHash", "https://gateway.pinata.cloud/ipfs/"),
            "https://gateway.pinata.cloud/ipfs/QmHash"
        );
        assert_eq!(
            resolve_token_uri("ipfs://QmHash", "https://gateway.pinata.cloud/ipfs"),
            "ipfs://QmHash"
        );
    }

    #[test]
    fn test_extract_revert_reason() {
        let err = "server returned an error response: error code 3: execution reverted: Exceeds max supply, data: \"0x08c379a0\"";
        assert_eq!(extract_revert_reason(err).as_deref(), Some("Exceeds max supply"));

        let bare = "server returned an error response: error code -32603: execution reverted";
        assert_eq!(extract_revert_reason(bare).as_deref(), Some("execution reverted"));

        assert_eq!(extract_revert_reason("connection refused"), None);
    }

    #[test]
    fn test_revert_reason_from_data() {
        let encoded = Revert {
            reason: "Not collection owner".to_string(),
        }
        .abi_encode();
        let err = format!(
            "error code 3: execution reverted, data: \"0x{}\"",
            hex::encode(&encoded)
        );
        assert_eq!(
            extract_revert_reason(&err).as_deref(),
            Some("Not collection owner")
        );
        assert_eq!(
            decode_revert_bytes(&encoded).as_deref(),
            Some("Not collection owner")
        );
    }

    #[test]
    fn test_classify_rpc_error() {
        assert_eq!(
            classify_rpc_error("execution reverted: Max supply reached"),
            ClientError::Revert("Max supply reached".to_string())
        );
        assert!(matches!(
            classify_rpc_error("insufficient funds for gas * price + value"),
            ClientError::InsufficientFunds { .. }
        ));
        assert!(matches!(
            classify_rpc_error("error sending request for url: connection refused"),
            ClientError::Connection(_)
        ));
        assert!(matches!(
            classify_rpc_error("something odd"),
            ClientError::Unknown(_)
        ));
    }
}
