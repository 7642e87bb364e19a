//! Cifragem das anotações clínicas em repouso
//!
//! Observações de consulta, notas de tarefa e notas de humor são gravadas
//! com AES-256-GCM. A chave vem da frase-senha do banco via Argon2id.

use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Key, Nonce,
};
use argon2::Argon2;
use rand::{rngs::OsRng as RandOsRng, RngCore};
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Erros de cifragem e derivação de chave
#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("Falha na criptografia: {0}")]
    EncryptionFailed(String),

    #[error("Falha na descriptografia: {0}")]
    DecryptionFailed(String),

    #[error("Dados inválidos: {0}")]
    InvalidData(String),

    #[error("Configuração de criptografia inválida: {0}")]
    InvalidConfiguration(String),
}

/// Tamanho do nonce em bytes para AES-GCM
const AES_GCM_NONCE_SIZE: usize = 12;

/// Tamanho do salt usado na derivação da chave
pub const KEY_SALT_SIZE: usize = 16;

/// Chave de dados AES-256, zerada ao sair de escopo
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct EncryptionKey([u8; 32]);

impl EncryptionKey {
    #[cfg(test)]
    pub fn generate() -> Self {
        let mut key = [0u8; 32];
        RandOsRng.fill_bytes(&mut key);
        Self(key)
    }

    /// Deriva a chave de dados a partir da frase-senha usando Argon2id
    pub fn derive(key_phrase: &str, salt: &[u8]) -> Result<Self, CryptoError> {
        if key_phrase.is_empty() {
            return Err(CryptoError::InvalidConfiguration(
                "A frase-senha do banco não pode ser vazia".to_string(),
            ));
        }

        let mut key = [0u8; 32];
        Argon2::default()
            .hash_password_into(key_phrase.as_bytes(), salt, &mut key)
            .map_err(|e| CryptoError::InvalidConfiguration(e.to_string()))?;
        Ok(Self(key))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl std::fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("EncryptionKey(..)")
    }
}

/// Gera um salt aleatório para derivação de chave
pub fn generate_salt() -> [u8; KEY_SALT_SIZE] {
    let mut salt = [0u8; KEY_SALT_SIZE];
    RandOsRng.fill_bytes(&mut salt);
    salt
}

/// Texto cifrado e o nonce gravados lado a lado
#[derive(Debug, Clone)]
pub struct EncryptedData {
    pub ciphertext: Vec<u8>,
    pub nonce: Vec<u8>,
}

/// Cifra `data` com um nonce novo
pub fn encrypt(data: &[u8], key: &EncryptionKey) -> Result<EncryptedData, CryptoError> {
    let aes_key = Key::<Aes256Gcm>::from_slice(key.as_bytes());
    let cipher = Aes256Gcm::new(aes_key);

    // Nonce aleatório por registro
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

    let ciphertext = cipher
        .encrypt(&nonce, data)
        .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;

    Ok(EncryptedData {
        ciphertext,
        nonce: nonce.to_vec(),
    })
}

/// Falha se o nonce tiver tamanho errado ou a tag não conferir
pub fn decrypt(encrypted: &EncryptedData, key: &EncryptionKey) -> Result<Vec<u8>, CryptoError> {
    let aes_key = Key::<Aes256Gcm>::from_slice(key.as_bytes());
    let cipher = Aes256Gcm::new(aes_key);

    if encrypted.nonce.len() != AES_GCM_NONCE_SIZE {
        return Err(CryptoError::InvalidData(format!(
            "Nonce inválido: esperado {} bytes, recebido {}",
            AES_GCM_NONCE_SIZE,
            encrypted.nonce.len()
        )));
    }

    let nonce = Nonce::from_slice(&encrypted.nonce);

    cipher
        .decrypt(nonce, encrypted.ciphertext.as_ref())
        .map_err(|e| CryptoError::DecryptionFailed(e.to_string()))
}

/// Criptografa um texto opcional (colunas `*_ciphertext` / `*_nonce`)
pub fn seal_text(
    text: Option<&str>,
    key: &EncryptionKey,
) -> Result<(Option<Vec<u8>>, Option<Vec<u8>>), CryptoError> {
    match text {
        Some(text) => {
            let sealed = encrypt(text.as_bytes(), key)?;
            Ok((Some(sealed.ciphertext), Some(sealed.nonce)))
        }
        None => Ok((None, None)),
    }
}

/// Operação inversa de [`seal_text`]
pub fn open_text(
    ciphertext: Option<Vec<u8>>,
    nonce: Option<Vec<u8>>,
    key: &EncryptionKey,
) -> Result<Option<String>, CryptoError> {
    match (ciphertext, nonce) {
        (Some(ciphertext), Some(nonce)) => {
            let plaintext = decrypt(&EncryptedData { ciphertext, nonce }, key)?;
            String::from_utf8(plaintext)
                .map(Some)
                .map_err(|e| CryptoError::InvalidData(e.to_string()))
        }
        (None, None) => Ok(None),
        _ => Err(CryptoError::InvalidData(
            "Texto criptografado sem nonce correspondente".to_string(),
        )),
    }
}
