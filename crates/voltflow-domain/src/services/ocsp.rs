//! Minimal DER encoder for RFC 6960 OCSP requests.
//!
//! The GetCertificateStatus flow hands us pre-hashed CertID fields, so the
//! request cannot be built from certificate objects; the structure is
//! assembled directly:
//!
//! ```text
//! OCSPRequest ::= SEQUENCE { tbsRequest TBSRequest }
//! TBSRequest  ::= SEQUENCE { requestList SEQUENCE OF Request }
//! Request     ::= SEQUENCE { reqCert CertID }
//! CertID      ::= SEQUENCE {
//!     hashAlgorithm  AlgorithmIdentifier,
//!     issuerNameHash OCTET STRING,
//!     issuerKeyHash  OCTET STRING,
//!     serialNumber   CertificateSerialNumber }
//! ```

use voltflow_ocpp::v201::HashAlgorithm;

const TAG_INTEGER: u8 = 0x02;
const TAG_OCTET_STRING: u8 = 0x04;
const TAG_NULL: u8 = 0x05;
const TAG_OBJECT_IDENTIFIER: u8 = 0x06;
const TAG_SEQUENCE: u8 = 0x30;

fn encode_length(length: usize) -> Vec<u8> {
    if length < 0x80 {
        return vec![length as u8];
    }
    let mut bytes = Vec::new();
    let mut remaining = length;
    while remaining > 0 {
        bytes.insert(0, (remaining & 0xff) as u8);
        remaining >>= 8;
    }
    let mut encoded = vec![0x80 | bytes.len() as u8];
    encoded.extend(bytes);
    encoded
}

fn tlv(tag: u8, content: &[u8]) -> Vec<u8> {
    let mut encoded = vec![tag];
    encoded.extend(encode_length(content.len()));
    encoded.extend_from_slice(content);
    encoded
}

fn object_identifier(arcs: &[u64]) -> Vec<u8> {
    let mut content = vec![(arcs[0] * 40 + arcs[1]) as u8];
    for &arc in &arcs[2..] {
        let mut chunk = Vec::new();
        let mut remaining = arc;
        chunk.insert(0, (remaining & 0x7f) as u8);
        remaining >>= 7;
        while remaining > 0 {
            chunk.insert(0, 0x80 | (remaining & 0x7f) as u8);
            remaining >>= 7;
        }
        content.extend(chunk);
    }
    tlv(TAG_OBJECT_IDENTIFIER, &content)
}

fn integer(bytes: &[u8]) -> Vec<u8> {
    let mut content: Vec<u8> = bytes.iter().copied().skip_while(|&b| b == 0).collect();
    if content.is_empty() {
        content.push(0);
    }
    if content[0] & 0x80 != 0 {
        content.insert(0, 0);
    }
    tlv(TAG_INTEGER, &content)
}

fn hash_algorithm_oid(algorithm: HashAlgorithm) -> Vec<u8> {
    let arcs: &[u64] = match algorithm {
        HashAlgorithm::Sha256 => &[2, 16, 840, 1, 101, 3, 4, 2, 1],
        HashAlgorithm::Sha384 => &[2, 16, 840, 1, 101, 3, 4, 2, 2],
        HashAlgorithm::Sha512 => &[2, 16, 840, 1, 101, 3, 4, 2, 3],
    };
    object_identifier(arcs)
}

/// Encode a single-certificate OCSP request from hashed CertID fields.
pub(crate) fn encode_ocsp_request(
    algorithm: HashAlgorithm,
    issuer_name_hash: &[u8],
    issuer_key_hash: &[u8],
    serial_number: &[u8],
) -> Vec<u8> {
    let mut algorithm_identifier = hash_algorithm_oid(algorithm);
    algorithm_identifier.extend(tlv(TAG_NULL, &[]));
    let algorithm_identifier = tlv(TAG_SEQUENCE, &algorithm_identifier);

    let mut cert_id = algorithm_identifier;
    cert_id.extend(tlv(TAG_OCTET_STRING, issuer_name_hash));
    cert_id.extend(tlv(TAG_OCTET_STRING, issuer_key_hash));
    cert_id.extend(integer(serial_number));
    let cert_id = tlv(TAG_SEQUENCE, &cert_id);

    let request = tlv(TAG_SEQUENCE, &cert_id);
    let request_list = tlv(TAG_SEQUENCE, &request);
    let tbs_request = tlv(TAG_SEQUENCE, &request_list);
    tlv(TAG_SEQUENCE, &tbs_request)
}
