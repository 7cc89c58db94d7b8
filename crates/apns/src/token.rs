use std::fmt;

/// Opaque device address, stored as the canonical lowercase hex encoding of
/// the underlying token bytes. Both constructors normalize to the same
/// canonical form, so tokens compare and hash by value regardless of the
/// spelling they arrived in.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ApnToken {
	hex: String,
}

impl ApnToken {
	/// Token from the raw binary representation, as handed to the app by the
	/// OS registration callback.
	pub fn from_bytes(bytes: impl AsRef<[u8]>) -> ApnToken {
		ApnToken {
			hex: hex::encode(bytes),
		}
	}

	/// Token from a hex string. Decoding is lenient: anything that is not a
	/// hex digit is dropped, case is folded, and a trailing half-byte is
	/// discarded. `from_hex(t.as_hex())` is the identity for any token `t`.
	pub fn from_hex(s: impl AsRef<str>) -> ApnToken {
		let digits: String = s
			.as_ref()
			.chars()
			.filter(|c| c.is_ascii_hexdigit())
			.map(|c| c.to_ascii_lowercase())
			.collect();
		let digits = &digits[..digits.len() & !1];
		let bytes = hex::decode(digits).expect("input was filtered to hex digits");
		ApnToken::from_bytes(bytes)
	}

	/// The canonical hex form, as it appears in the request path.
	pub fn as_hex(&self) -> &str {
		&self.hex
	}
}

impl fmt::Display for ApnToken {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.hex)
	}
}
