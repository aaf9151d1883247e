use crate::types::ClaimId;

// Tags for the length-prefixed fields the core cares about. Everything else
// in a real claim payload (streams, channels, collections — the full
// protobuf schema) is carried as opaque trailing bytes; §4.5 only asks this
// crate to read out a handful of fields.
const TAG_CHANNEL_PUBLIC_KEY: u8 = 0x01;
const TAG_SIGNING_CHANNEL_ID: u8 = 0x02;
const TAG_SIGNATURE: u8 = 0x03;
const TAG_TITLE: u8 = 0x04;
const TAG_AUTHOR: u8 = 0x05;
const TAG_DESCRIPTION: u8 = 0x06;
const TAG_REPOST_CLAIM_ID: u8 = 0x07;

/// A claim payload, treated as opaque except for the fields the core needs
/// to read: channel public key, signing-channel id, signature,
/// title/author/description for resolve output, and a repost reference.
///
/// Encoded as a sequence of `tag(1) ∥ len(u32 LE) ∥ bytes` records — the
/// simplest TLV shape that lets a claim carry its signature as one field
/// among others without this crate needing the full stream/channel/
/// collection protobuf schema (§4.5: "the core treats them as opaque byte
/// strings except for …").
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ClaimPayload {
    bytes: Vec<u8>,
}

impl ClaimPayload {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    fn fields(&self) -> impl Iterator<Item = (u8, &[u8])> {
        let mut offset = 0;
        std::iter::from_fn(move || {
            if offset + 5 > self.bytes.len() {
                return None;
            }
            let tag = self.bytes[offset];
            let len = u32::from_le_bytes(self.bytes[offset + 1..offset + 5].try_into().unwrap()) as usize;
            let start = offset + 5;
            if start + len > self.bytes.len() {
                return None;
            }
            let field = &self.bytes[start..start + len];
            offset = start + len;
            Some((tag, field))
        })
    }

    fn field(&self, tag: u8) -> Option<&[u8]> {
        self.fields().find(|(t, _)| *t == tag).map(|(_, v)| v)
    }

    pub fn channel_public_key(&self) -> Option<&[u8]> {
        self.field(TAG_CHANNEL_PUBLIC_KEY)
    }

    pub fn signing_channel_id(&self) -> Option<ClaimId> {
        let bytes = self.field(TAG_SIGNING_CHANNEL_ID)?;
        let arr: [u8; 20] = bytes.try_into().ok()?;
        Some(ClaimId::from_bytes(arr))
    }

    pub fn signature(&self) -> Option<&[u8]> {
        self.field(TAG_SIGNATURE)
    }

    pub fn title(&self) -> Option<&str> {
        self.field(TAG_TITLE).and_then(|b| std::str::from_utf8(b).ok())
    }

    pub fn author(&self) -> Option<&str> {
        self.field(TAG_AUTHOR).and_then(|b| std::str::from_utf8(b).ok())
    }

    pub fn description(&self) -> Option<&str> {
        self.field(TAG_DESCRIPTION).and_then(|b| std::str::from_utf8(b).ok())
    }

    pub fn repost_ref(&self) -> Option<ClaimId> {
        let bytes = self.field(TAG_REPOST_CLAIM_ID)?;
        let arr: [u8; 20] = bytes.try_into().ok()?;
        Some(ClaimId::from_bytes(arr))
    }

    /// The payload with the signature field stripped — what the channel
    /// signs over and what verification re-serialises to check against
    /// (§4.5's "serialised_claim_without_signature").
    pub fn without_signature(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.bytes.len());
        for (tag, field) in self.fields() {
            if tag == TAG_SIGNATURE {
                continue;
            }
            out.push(tag);
            out.extend_from_slice(&(field.len() as u32).to_le_bytes());
            out.extend_from_slice(field);
        }
        out
    }
}

/// Builds a `ClaimPayload` field-by-field — used by the wallet when
/// constructing and signing a new claim or channel output.
#[derive(Default)]
pub struct ClaimPayloadBuilder {
    bytes: Vec<u8>,
}

impl ClaimPayloadBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, tag: u8, value: &[u8]) -> &mut Self {
        self.bytes.push(tag);
        self.bytes.extend_from_slice(&(value.len() as u32).to_le_bytes());
        self.bytes.extend_from_slice(value);
        self
    }

    pub fn channel_public_key(mut self, pubkey: &[u8]) -> Self {
        self.push(TAG_CHANNEL_PUBLIC_KEY, pubkey);
        self
    }

    pub fn signing_channel_id(mut self, id: &ClaimId) -> Self {
        self.push(TAG_SIGNING_CHANNEL_ID, id.as_bytes());
        self
    }

    pub fn signature(mut self, signature_der: &[u8]) -> Self {
        self.push(TAG_SIGNATURE, signature_der);
        self
    }

    pub fn title(mut self, title: &str) -> Self {
        self.push(TAG_TITLE, title.as_bytes());
        self
    }

    pub fn author(mut self, author: &str) -> Self {
        self.push(TAG_AUTHOR, author.as_bytes());
        self
    }

    pub fn description(mut self, description: &str) -> Self {
        self.push(TAG_DESCRIPTION, description.as_bytes());
        self
    }

    pub fn repost_ref(mut self, id: &ClaimId) -> Self {
        self.push(TAG_REPOST_CLAIM_ID, id.as_bytes());
        self
    }

    pub fn build(self) -> ClaimPayload {
        ClaimPayload::from_bytes(self.bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_known_fields() {
        let claim_id = ClaimId::from_bytes([7u8; 20]);
        let payload = ClaimPayloadBuilder::new()
            .title("a stream")
            .signing_channel_id(&claim_id)
            .signature(b"der-bytes")
            .build();

        assert_eq!(payload.title(), Some("a stream"));
        assert_eq!(payload.signing_channel_id(), Some(claim_id));
        assert_eq!(payload.signature(), Some(b"der-bytes".as_slice()));
    }

    #[test]
    fn without_signature_strips_only_the_signature_field() {
        let payload = ClaimPayloadBuilder::new()
            .title("a stream")
            .signature(b"der-bytes")
            .build();
        let stripped = ClaimPayload::from_bytes(payload.without_signature());
        assert_eq!(stripped.title(), Some("a stream"));
        assert_eq!(stripped.signature(), None);
    }
}
