//! ABI encoding of constructor arguments.
//!
//! Only static head types are needed for the constructors this tool deploys,
//! so encoding is plain 32-byte word packing.

use alloy_core::primitives::{Address, Bytes, U256};

/// One statically-encoded constructor argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbiWord {
    Address(Address),
    Uint(U256),
}

impl AbiWord {
    fn to_word(&self) -> [u8; 32] {
        let mut word = [0u8; 32];
        match self {
            // Addresses are left-padded to 32 bytes.
            AbiWord::Address(addr) => word[12..].copy_from_slice(addr.as_slice()),
            AbiWord::Uint(value) => word.copy_from_slice(&value.to_be_bytes::<32>()),
        }
        word
    }
}

/// Encode a static argument list as concatenated 32-byte words.
pub fn encode_words(words: &[AbiWord]) -> Vec<u8> {
    let mut out = Vec::with_capacity(words.len() * 32);
    for word in words {
        out.extend_from_slice(&word.to_word());
    }
    out
}

/// Contract-creation init code: compiled bytecode followed by the encoded
/// constructor arguments.
pub fn init_code(bytecode: &Bytes, encoded_args: &[u8]) -> Bytes {
    let mut data = Vec::with_capacity(bytecode.len() + encoded_args.len());
    data.extend_from_slice(bytecode);
    data.extend_from_slice(encoded_args);
    Bytes::from(data)
}
