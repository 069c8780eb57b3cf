//! Canonical block encoding and the block fingerprint.
//!
//! Every site that produces or checks a `previous_hash` goes through
//! [`fingerprint`], so two nodes hashing the same block always agree. The
//! encoding is compact JSON with object keys sorted lexicographically at every
//! depth, independent of how `serde_json` orders maps internally.

use crate::blockchain::Block;
use crate::transaction::Transaction;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

/// Length of a block fingerprint in hex characters.
pub const FINGERPRINT_LEN: usize = 64;

/// Hex-encoded SHA-256 of the block's canonical encoding.
pub fn fingerprint(block: &Block) -> String {
    sha256_hex(canonical_block(block).as_bytes())
}

/// The canonical encoding of a block, as hashed by [`fingerprint`].
pub fn canonical_block(block: &Block) -> String {
    to_canonical_string(&block_value(block))
}

/// Encode any JSON value with sorted keys and no insignificant whitespace.
pub fn to_canonical_string(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

fn block_value(block: &Block) -> Value {
    let transactions: Vec<Value> = block.transactions.iter().map(transaction_value).collect();
    json!({
        "index": block.index,
        "timestamp": block.timestamp,
        "transactions": transactions,
        "proof": block.proof,
        "previous_hash": block.previous_hash,
    })
}

fn transaction_value(tx: &Transaction) -> Value {
    json!({
        "sender": tx.sender,
        "recipient": tx.recipient,
        "amount": Value::Number(tx.amount.as_number().clone()),
    })
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));

            out.push('{');
            for (i, (key, item)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::from(key.as_str()).to_string());
                out.push(':');
                write_canonical(item, out);
            }
            out.push('}');
        }
        // Scalars: serde_json's compact form (escaped strings, shortest round-trip floats).
        scalar => out.push_str(&scalar.to_string()),
    }
}
