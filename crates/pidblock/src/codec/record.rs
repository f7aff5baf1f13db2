use core::num::IntErrorKind;

use serde::Deserialize;

use crate::{DecodeError, Lease, OwnerId, ProducerId};

/// Schema version written by [`encode`].
pub const LEASE_RECORD_VERSION: u64 = 1;

/// Well-known metadata store path of the lease record.
pub const LEASE_RECORD_PATH: &str = "/latest_producer_id_block";

#[derive(Deserialize)]
struct LeaseRecord {
    version: u64,
    broker: OwnerId,
    block_start: String,
    block_end: String,
}

#[derive(Deserialize)]
struct RecordHeader {
    version: u64,
}

/// Serializes a lease into the persisted record format.
///
/// # Example
/// ```
/// use pidblock::{Lease, encode};
///
/// let bytes = encode(&Lease::from_components(2, 1000, 1999));
/// assert_eq!(
///     bytes,
///     br#"{"version":1,"broker":2,"block_start":"1000","block_end":"1999"}"#
/// );
/// ```
pub fn encode(lease: &Lease) -> Vec<u8> {
    // Every field is an integer or a string of digits, so nothing needs
    // escaping.
    format!(
        r#"{{"version":{},"broker":{},"block_start":"{}","block_end":"{}"}}"#,
        LEASE_RECORD_VERSION,
        lease.owner_id(),
        lease.start(),
        lease.end(),
    )
    .into_bytes()
}

/// Parses a persisted record back into a [`Lease`].
///
/// # Errors
///
/// Returns a [`DecodeError`] if the bytes are not a well-formed version 1
/// record, if a bound is not a canonical decimal `i64` (no sign other than a
/// leading `-`, no zero padding), or if the range is negative or reversed.
pub fn decode(bytes: &[u8]) -> Result<Lease, DecodeError> {
    let header: RecordHeader = serde_json::from_slice(bytes)?;
    if header.version != LEASE_RECORD_VERSION {
        return Err(DecodeError::UnsupportedVersion {
            version: header.version,
        });
    }

    let record: LeaseRecord = serde_json::from_slice(bytes)?;
    let start = parse_bound("block_start", &record.block_start)?;
    let end = parse_bound("block_end", &record.block_end)?;
    if start < 0 || start > end {
        return Err(DecodeError::InvalidRange { start, end });
    }

    Ok(Lease::from_components(record.broker, start, end))
}

fn parse_bound(field: &'static str, value: &str) -> Result<ProducerId, DecodeError> {
    if !is_canonical_decimal(value) {
        return Err(DecodeError::InvalidBound {
            field,
            value: value.to_owned(),
        });
    }
    value.parse::<ProducerId>().map_err(|e| match e.kind() {
        IntErrorKind::PosOverflow | IntErrorKind::NegOverflow => DecodeError::Overflow {
            field,
            value: value.to_owned(),
        },
        _ => DecodeError::InvalidBound {
            field,
            value: value.to_owned(),
        },
    })
}

/// `0`, or an optional `-` followed by digits without a leading zero; the
/// form [`encode`] writes.
fn is_canonical_decimal(value: &str) -> bool {
    if value == "0" {
        return true;
    }
    let digits = value.strip_prefix('-').unwrap_or(value);
    digits.starts_with(|c: char| matches!(c, '1'..='9'))
        && digits.bytes().all(|b| b.is_ascii_digit())
}
