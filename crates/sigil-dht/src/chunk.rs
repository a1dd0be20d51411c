//! Chunked storage: makes byte blobs of any size addressable by one base
//! key on an overlay whose per-value limit is
//! [`sigil_core::constants::MAX_CHUNK_BYTES`].
//!
//! Layout per base key `K`:
//! - blobs within the limit live directly under `sha3_512(K)`;
//! - larger blobs publish a manifest under `sha3_512(K ++ ":manifest")`
//!   and chunks under `sha3_512(K ++ ":chunk:" ++ i)`.
//!
//! Manifest wire format (fixed, big-endian, byte-identical everywhere):
//!
//! ```text
//! "SGL1" | total_len u64 | chunk_count u32 | content_hash [64] | chunk_hash [64] × count
//! ```
//!
//! Readers verify every chunk hash against the manifest before
//! concatenating; a missing or mismatched chunk is `IncompleteChunks`.
//! The TTL class flows to the manifest and every chunk alike.

use sigil_core::constants::MAX_CHUNK_BYTES;
use sigil_core::error::SigilError;
use sigil_crypto::hash::sha3_512;

use crate::overlay::{Overlay, SINGLE_SLOT_VALUE_ID};
use crate::value_type::ValueClass;

const MANIFEST_MAGIC: &[u8; 4] = b"SGL1";
const HASH_LEN: usize = 64;
const MANIFEST_HEADER_LEN: usize = 4 + 8 + 4 + HASH_LEN;

// ── Key derivation ───────────────────────────────────────────────────────────

/// DHT key for the single-chunk (direct) path.
pub fn direct_key(base_key: &str) -> [u8; 64] {
    sha3_512(base_key.as_bytes())
}

/// DHT key of the manifest for `base_key`.
pub fn manifest_key(base_key: &str) -> [u8; 64] {
    sha3_512(format!("{base_key}:manifest").as_bytes())
}

/// DHT key of chunk `index` for `base_key`.
pub fn chunk_key(base_key: &str, index: u32) -> [u8; 64] {
    sha3_512(format!("{base_key}:chunk:{index}").as_bytes())
}

// ── Manifest ─────────────────────────────────────────────────────────────────

struct Manifest {
    total_len: u64,
    content_hash: [u8; 64],
    chunk_hashes: Vec<[u8; 64]>,
}

impl Manifest {
    fn for_blob(bytes: &[u8]) -> Self {
        let chunk_hashes = bytes.chunks(MAX_CHUNK_BYTES).map(sha3_512).collect();
        Self {
            total_len: bytes.len() as u64,
            content_hash: sha3_512(bytes),
            chunk_hashes,
        }
    }

    fn encode(&self) -> Vec<u8> {
        let mut out =
            Vec::with_capacity(MANIFEST_HEADER_LEN + self.chunk_hashes.len() * HASH_LEN);
        out.extend_from_slice(MANIFEST_MAGIC);
        out.extend_from_slice(&self.total_len.to_be_bytes());
        out.extend_from_slice(&(self.chunk_hashes.len() as u32).to_be_bytes());
        out.extend_from_slice(&self.content_hash);
        for hash in &self.chunk_hashes {
            out.extend_from_slice(hash);
        }
        out
    }

    fn decode(bytes: &[u8]) -> Result<Self, SigilError> {
        if bytes.len() < MANIFEST_HEADER_LEN {
            return Err(SigilError::InvalidManifest(format!(
                "{} bytes is shorter than the header",
                bytes.len()
            )));
        }
        if &bytes[..4] != MANIFEST_MAGIC {
            return Err(SigilError::InvalidManifest("bad magic".into()));
        }
        let total_len = u64::from_be_bytes(bytes[4..12].try_into().expect("fixed slice"));
        let chunk_count = u32::from_be_bytes(bytes[12..16].try_into().expect("fixed slice"));
        let mut content_hash = [0u8; HASH_LEN];
        content_hash.copy_from_slice(&bytes[16..16 + HASH_LEN]);

        let body = &bytes[MANIFEST_HEADER_LEN..];
        if body.len() != chunk_count as usize * HASH_LEN {
            return Err(SigilError::InvalidManifest(format!(
                "expected {} chunk hashes, got {} trailing bytes",
                chunk_count,
                body.len()
            )));
        }
        let expected_chunks = (total_len as usize).div_ceil(MAX_CHUNK_BYTES).max(1);
        if chunk_count as usize != expected_chunks {
            return Err(SigilError::InvalidManifest(format!(
                "chunk count {chunk_count} does not match total length {total_len}"
            )));
        }
        let chunk_hashes = body
            .chunks_exact(HASH_LEN)
            .map(|h| {
                let mut arr = [0u8; HASH_LEN];
                arr.copy_from_slice(h);
                arr
            })
            .collect();
        Ok(Self {
            total_len,
            content_hash,
            chunk_hashes,
        })
    }
}

// ── Publish ──────────────────────────────────────────────────────────────────

/// Publish `bytes` under `base_key`. Small blobs go directly; large blobs
/// are split, the chunks written first and the manifest last so a reader
/// never sees a manifest pointing at chunks that are not there yet.
pub fn publish<O: Overlay>(
    overlay: &O,
    base_key: &str,
    bytes: &[u8],
    class: ValueClass,
) -> Result<(), SigilError> {
    if bytes.len() <= MAX_CHUNK_BYTES {
        return overlay.put_signed(&direct_key(base_key), bytes, SINGLE_SLOT_VALUE_ID, class);
    }

    let manifest = Manifest::for_blob(bytes);
    for (index, chunk) in bytes.chunks(MAX_CHUNK_BYTES).enumerate() {
        overlay.put_signed(
            &chunk_key(base_key, index as u32),
            chunk,
            SINGLE_SLOT_VALUE_ID,
            class,
        )?;
    }
    overlay.put_signed(
        &manifest_key(base_key),
        &manifest.encode(),
        SINGLE_SLOT_VALUE_ID,
        class,
    )?;
    tracing::debug!(
        base_key,
        chunks = manifest.chunk_hashes.len(),
        total = manifest.total_len,
        "published chunked value"
    );
    Ok(())
}

// ── Fetch ────────────────────────────────────────────────────────────────────

/// Reassemble one manifest's blob, verifying every chunk hash.
fn reassemble<O: Overlay>(
    overlay: &O,
    base_key: &str,
    manifest: &Manifest,
) -> Result<Vec<u8>, SigilError> {
    let total = manifest.chunk_hashes.len();
    let mut blob = Vec::with_capacity(manifest.total_len as usize);
    let mut present = 0usize;

    for (index, want_hash) in manifest.chunk_hashes.iter().enumerate() {
        let candidates = overlay.get_all(&chunk_key(base_key, index as u32))?;
        // Several values can share a chunk key (stale replicas); the one
        // matching the manifest hash is the one this manifest means.
        match candidates.into_iter().find(|c| sha3_512(c) == *want_hash) {
            Some(chunk) => {
                present += 1;
                blob.extend_from_slice(&chunk);
            }
            None => return Err(SigilError::IncompleteChunks { present, total }),
        }
    }

    if blob.len() as u64 != manifest.total_len || sha3_512(&blob) != manifest.content_hash {
        return Err(SigilError::InvalidManifest(
            "reassembled bytes do not match manifest content hash".into(),
        ));
    }
    Ok(blob)
}

/// Fetch the blob stored under `base_key`: direct value first, manifest
/// path otherwise. Absence is `NotFound`; a manifest whose chunks cannot
/// all be fetched and verified is `IncompleteChunks`.
pub fn fetch<O: Overlay>(overlay: &O, base_key: &str) -> Result<Vec<u8>, SigilError> {
    if let Some(value) = overlay.get(&direct_key(base_key))? {
        return Ok(value);
    }
    match overlay.get(&manifest_key(base_key))? {
        Some(raw) => {
            let manifest = Manifest::decode(&raw)?;
            reassemble(overlay, base_key, &manifest)
        }
        None => Err(SigilError::NotFound),
    }
}

/// Fetch every candidate blob under `base_key`: all live direct values
/// plus the reassembled blob of every manifest that verifies. Callers run
/// newest-valid selection over the result.
///
/// A manifest that fails to reassemble only surfaces as an error when it
/// was the sole candidate; a failed value in a multi-value read never
/// aborts the read.
pub fn fetch_all<O: Overlay>(overlay: &O, base_key: &str) -> Result<Vec<Vec<u8>>, SigilError> {
    let mut candidates = overlay.get_all(&direct_key(base_key))?;
    let mut first_failure: Option<SigilError> = None;

    for raw in overlay.get_all(&manifest_key(base_key))? {
        let result = Manifest::decode(&raw).and_then(|m| reassemble(overlay, base_key, &m));
        match result {
            Ok(blob) => candidates.push(blob),
            Err(e) => {
                tracing::debug!(base_key, error = %e, "skipping unreassemblable manifest");
                first_failure.get_or_insert(e);
            }
        }
    }

    match (candidates.is_empty(), first_failure) {
        (true, Some(e)) => Err(e),
        (_, _) => Ok(candidates),
    }
}
