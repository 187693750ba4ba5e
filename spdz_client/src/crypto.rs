// spdz_client/src/crypto.rs

//! 代理消息的会话加密与会话密钥协商。
//!
//! 每条 `spdz_message` 载荷使用按代理独立协商的 256 位会话密钥加密。
//! 加密采用 XChaCha20-Poly1305，线上格式为 24 字节随机 nonce 前缀加
//! 密文；密钥由客户端 X25519 私钥与代理公钥做 Diffie-Hellman 后取
//! SHA-256 得到。加密算法收敛在 [`MessageCipher`] 接口之后，测试可以
//! 用明文直通的实现替换。

use crate::error::SpdzClientError;
use chacha20poly1305::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Key, XChaCha20Poly1305, XNonce,
};
use sha2::{Digest, Sha256};
use x25519_dalek::{PublicKey, StaticSecret};

/// 会话密钥长度（字节）。
pub const SESSION_KEY_LEN: usize = 32;

/// XChaCha20-Poly1305 的 nonce 长度（字节）。
pub const NONCE_LEN: usize = 24;

/// 代理消息加解密接口。
pub trait MessageCipher: Send + Sync {
    /// 解密一条代理推送的消息，输入为 nonce 前缀加密文。
    fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, SpdzClientError>;

    /// 加密一条消息，输出为 nonce 前缀加密文。
    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, SpdzClientError>;
}

/// 基于 XChaCha20-Poly1305 的会话加密实现。
pub struct SessionCipher {
    cipher: XChaCha20Poly1305,
}

impl SessionCipher {
    /// 由协商好的 256 位会话密钥构造。
    pub fn new(session_key: [u8; SESSION_KEY_LEN]) -> Self {
        SessionCipher {
            cipher: XChaCha20Poly1305::new(Key::from_slice(&session_key)),
        }
    }
}

impl MessageCipher for SessionCipher {
    fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, SpdzClientError> {
        if ciphertext.len() < NONCE_LEN {
            return Err(SpdzClientError::Decryption(format!(
                "密文不足 {} 字节，缺少 nonce 前缀",
                NONCE_LEN
            )));
        }
        let (nonce_bytes, body) = ciphertext.split_at(NONCE_LEN);
        let nonce = XNonce::from_slice(nonce_bytes);
        self.cipher
            .decrypt(nonce, body)
            .map_err(|_| SpdzClientError::Decryption("认证标签校验失败".into()))
    }

    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, SpdzClientError> {
        let nonce = XChaCha20Poly1305::generate_nonce(&mut OsRng);
        let body = self
            .cipher
            .encrypt(&nonce, plaintext)
            .map_err(|_| SpdzClientError::Decryption("加密失败".into()))?;
        let mut out = Vec::with_capacity(NONCE_LEN + body.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&body);
        Ok(out)
    }
}

/// 由客户端私钥与代理公钥（64 个十六进制字符）协商会话密钥。
pub fn derive_session_key(
    client_secret: [u8; SESSION_KEY_LEN],
    proxy_public_key_hex: &str,
) -> Result<[u8; SESSION_KEY_LEN], SpdzClientError> {
    let decoded = hex::decode(proxy_public_key_hex)
        .map_err(|e| SpdzClientError::KeyDerivation(format!("代理公钥不是有效十六进制: {}", e)))?;
    let public_bytes: [u8; SESSION_KEY_LEN] = decoded.as_slice().try_into().map_err(|_| {
        SpdzClientError::KeyDerivation(format!(
            "代理公钥需要 {} 字节，实际 {} 字节",
            SESSION_KEY_LEN,
            decoded.len()
        ))
    })?;

    let secret = StaticSecret::from(client_secret);
    let shared = secret.diffie_hellman(&PublicKey::from(public_bytes));

    let digest = Sha256::digest(shared.as_bytes());
    Ok(digest.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encrypt_decrypt_round_trip() {
        let cipher = SessionCipher::new([7u8; SESSION_KEY_LEN]);
        let plaintext = b"spdz frame bytes";

        let sealed = cipher.encrypt(plaintext).unwrap();
        assert!(sealed.len() > plaintext.len() + NONCE_LEN);
        assert_eq!(cipher.decrypt(&sealed).unwrap(), plaintext);
    }

    #[test]
    fn test_decrypt_rejects_wrong_key() {
        let sealed = SessionCipher::new([1u8; SESSION_KEY_LEN]).encrypt(b"data").unwrap();
        let other = SessionCipher::new([2u8; SESSION_KEY_LEN]);
        assert!(matches!(other.decrypt(&sealed), Err(SpdzClientError::Decryption(_))));
    }

    #[test]
    fn test_decrypt_rejects_truncated_ciphertext() {
        let cipher = SessionCipher::new([0u8; SESSION_KEY_LEN]);
        assert!(matches!(cipher.decrypt(&[0u8; 10]), Err(SpdzClientError::Decryption(_))));
    }

    #[test]
    fn test_derive_session_key_agrees_for_both_sides() {
        // 两侧各自用对方公钥推导，必须得到同一个会话密钥。
        let client_secret = [3u8; SESSION_KEY_LEN];
        let proxy_secret = [9u8; SESSION_KEY_LEN];
        let client_public = PublicKey::from(&StaticSecret::from(client_secret));
        let proxy_public = PublicKey::from(&StaticSecret::from(proxy_secret));

        let client_key =
            derive_session_key(client_secret, &hex::encode(proxy_public.as_bytes())).unwrap();
        let proxy_key =
            derive_session_key(proxy_secret, &hex::encode(client_public.as_bytes())).unwrap();
        assert_eq!(client_key, proxy_key);
    }

    #[test]
    fn test_derive_session_key_rejects_bad_hex() {
        assert!(matches!(
            derive_session_key([0u8; SESSION_KEY_LEN], "not-hex"),
            Err(SpdzClientError::KeyDerivation(_))
        ));
    }
}
