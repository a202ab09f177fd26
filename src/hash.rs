use crate::quantity::Quantity;

/// A 32-byte BLAKE3 digest used for content-addressing.
///
/// In `hashflow`, this identifies:
/// 1. function definitions, through their configuration hash,
/// 2. planned stages, by folding the configuration hash with the hashes of
///    every input in order,
/// 3. planned data, by folding the output position with the stage hash.
///
/// Two structurally identical computations therefore end up with the same
/// `Hash32`, regardless of which objects were used to plan them.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Hash32([u8; 32]);

impl<T> From<T> for Hash32
where
    T: Into<[u8; 32]>,
{
    fn from(value: T) -> Self {
        Hash32(value.into())
    }
}

impl AsRef<[u8]> for Hash32 {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl Hash32 {
    /// One-shot digest of a byte buffer.
    pub fn hash(buffer: impl AsRef<[u8]>) -> Self {
        blake3::Hasher::new()
            .update(buffer.as_ref())
            .finalize()
            .into()
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(self) -> String {
        crate::utils::hex(&self.0)
    }

    /// First eight hex characters, enough to tell stages apart in logs.
    pub fn short(self) -> String {
        crate::utils::hex(&self.0[..4])
    }
}

impl std::fmt::Debug for Hash32 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Hash32({})", self.to_hex())
    }
}

impl std::fmt::Display for Hash32 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Incremental hash accumulator over typed values.
///
/// Each feed appends a canonical byte encoding of its argument:
///
/// | feed       | encoding                                   |
/// |------------|--------------------------------------------|
/// | `str`      | raw UTF-8 bytes                            |
/// | `int`      | `i64`, 8 bytes little-endian               |
/// | `float`    | `f64` bits, 8 bytes little-endian          |
/// | `bool`     | a single `0` or `1` byte                   |
/// | `update`   | raw bytes                                  |
/// | `quantity` | `float(magnitude)` followed by `str(unit)` |
///
/// The order of feeds is part of the identity, so a given logical entity
/// must always be fed in the same documented order.
///
/// # Example
///
/// ```rust
/// use hashflow::{HashBuilder, Quantity};
///
/// let a = HashBuilder::new()
///     .str("recording.smr")
///     .quantity(&Quantity::new(0.5, "s"))
///     .digest();
///
/// let b = HashBuilder::new()
///     .str("recording.smr")
///     .quantity(&Quantity::new(0.5, "s"))
///     .digest();
///
/// assert_eq!(a, b);
/// ```
#[derive(Default, Clone)]
pub struct HashBuilder(blake3::Hasher);

impl HashBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn str(&mut self, value: &str) -> &mut Self {
        self.update(value.as_bytes())
    }

    pub fn int(&mut self, value: i64) -> &mut Self {
        self.update(value.to_le_bytes())
    }

    pub fn float(&mut self, value: f64) -> &mut Self {
        self.update(value.to_bits().to_le_bytes())
    }

    pub fn bool(&mut self, value: bool) -> &mut Self {
        self.update([value as u8])
    }

    pub fn update(&mut self, bytes: impl AsRef<[u8]>) -> &mut Self {
        self.0.update(bytes.as_ref());
        self
    }

    pub fn quantity(&mut self, value: &Quantity) -> &mut Self {
        self.float(value.magnitude()).str(value.unit())
    }

    /// Digest of everything fed so far.
    pub fn digest(&self) -> Hash32 {
        self.0.finalize().into()
    }
}

impl std::fmt::Debug for HashBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "HashBuilder(*)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_is_deterministic() {
        let a = HashBuilder::new().str("windowing").int(3).bool(true).digest();
        let b = HashBuilder::new().str("windowing").int(3).bool(true).digest();
        assert_eq!(a, b);
    }

    #[test]
    fn test_feed_order_matters() {
        let a = HashBuilder::new().int(1).int(2).digest();
        let b = HashBuilder::new().int(2).int(1).digest();
        assert_ne!(a, b);
    }

    #[test]
    fn test_typed_feeds_differ() {
        let int = HashBuilder::new().int(1).digest();
        let float = HashBuilder::new().float(1.0).digest();
        let boolean = HashBuilder::new().bool(true).digest();
        assert_ne!(int, float);
        assert_ne!(int, boolean);
        assert_ne!(float, boolean);
    }

    #[test]
    fn test_int_is_little_endian_fixed_width() {
        let fed = HashBuilder::new().int(1).digest();
        let raw = HashBuilder::new()
            .update([1u8, 0, 0, 0, 0, 0, 0, 0])
            .digest();
        assert_eq!(fed, raw);
    }

    #[test]
    fn test_quantity_encoding() {
        let quantity = HashBuilder::new()
            .quantity(&Quantity::new(2.5, "mV"))
            .digest();
        let manual = HashBuilder::new().float(2.5).str("mV").digest();
        assert_eq!(quantity, manual);

        let other_unit = HashBuilder::new()
            .quantity(&Quantity::new(2.5, "V"))
            .digest();
        assert_ne!(quantity, other_unit);
    }

    #[test]
    fn test_one_shot_matches_builder() {
        let builder = HashBuilder::new().update(b"abc").digest();
        assert_eq!(builder, Hash32::hash(b"abc"));
    }

    #[test]
    fn test_hex() {
        let hash = Hash32::from([0xabu8; 32]);
        assert_eq!(hash.to_hex(), "ab".repeat(32));
        assert_eq!(hash.short(), "abababab");
    }
}
