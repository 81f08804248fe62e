//! Signing key loading.

use std::path::Path;

use alloy_signer_local::PrivateKeySigner;

use crate::config::AccountConfig;
use crate::error::ClientError;

pub const KEY_FILE: &str = "account.key";
pub const PASSWORD_FILE: &str = "password";

/// Parse a hex private key, with or without `0x`.
pub fn signer_from_hex(key: &str) -> Result<PrivateKeySigner, ClientError> {
    key.trim()
        .parse::<PrivateKeySigner>()
        .map_err(|_| ClientError::Signer("invalid private key".into()))
}

/// Decrypt a JSON keystore with the password stored in `password_file`.
/// Surrounding whitespace in the password file is ignored.
pub fn signer_from_keystore(
    keystore: impl AsRef<Path>,
    password_file: impl AsRef<Path>,
) -> Result<PrivateKeySigner, ClientError> {
    let password = std::fs::read_to_string(password_file.as_ref())?;
    PrivateKeySigner::decrypt_keystore(keystore.as_ref(), password.trim()).map_err(|e| {
        ClientError::Signer(format!(
            "decrypt keystore {}: {e}",
            keystore.as_ref().display()
        ))
    })
}

/// Load the key from a directory holding `account.key` and `password`.
pub fn load_account(dir: impl AsRef<Path>) -> Result<PrivateKeySigner, ClientError> {
    let dir = dir.as_ref();
    signer_from_keystore(dir.join(KEY_FILE), dir.join(PASSWORD_FILE))
}

impl AccountConfig {
    /// A raw key wins over a keystore, which wins over a key directory.
    pub fn signer(&self) -> Result<PrivateKeySigner, ClientError> {
        if let Some(key) = &self.private_key {
            return signer_from_hex(key);
        }
        match (&self.keystore, &self.password_file, &self.dir) {
            (Some(keystore), Some(password), _) => signer_from_keystore(keystore, password),
            (Some(_), None, _) => Err(ClientError::Config(
                "account.keystore needs account.password_file".into(),
            )),
            (None, _, Some(dir)) => load_account(dir),
            _ => Err(ClientError::Config("account has no key source".into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::address;

    const KEY_ONE: &str = "0x0000000000000000000000000000000000000000000000000000000000000001";

    #[test]
    fn hex_key() {
        let signer = signer_from_hex(KEY_ONE).unwrap();
        assert_eq!(
            signer.address(),
            address!("7E5F4552091A69125d5DfCb7b8C2659029395Bdf")
        );
        let bare = signer_from_hex(KEY_ONE.trim_start_matches("0x")).unwrap();
        assert_eq!(bare.address(), signer.address());
    }

    #[test]
    fn bad_key_does_not_echo_input() {
        let err = signer_from_hex("0xnot-a-key").unwrap_err();
        assert!(!err.to_string().contains("not-a-key"));
    }

    #[test]
    fn keystore_directory() {
        let dir = std::env::temp_dir().join(format!("chainclient-account-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let mut rng = rand::thread_rng();
        let (created, _) =
            PrivateKeySigner::new_keystore(&dir, &mut rng, "secret", Some(KEY_FILE)).unwrap();
        std::fs::write(dir.join(PASSWORD_FILE), "secret\n").unwrap();

        let loaded = load_account(&dir).unwrap();
        assert_eq!(loaded.address(), created.address());

        let via_config = AccountConfig {
            dir: Some(dir.clone()),
            ..Default::default()
        };
        assert_eq!(via_config.signer().unwrap().address(), created.address());

        std::fs::write(dir.join(PASSWORD_FILE), "wrong").unwrap();
        assert!(matches!(load_account(&dir), Err(ClientError::Signer(_))));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_key_source() {
        let err = AccountConfig::default().signer().unwrap_err();
        assert!(matches!(err, ClientError::Config(_)));
    }
}
