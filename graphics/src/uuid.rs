//! Physical device identification by pipeline cache UUID.

use std::fmt;
use std::str::FromStr;

use ash::vk;

use crate::error::GraphicsError;

const HEX_DIGITS: &[u8; 16] = b"0123456789abcdef";

/// A 16-byte device UUID, written as 32 lowercase hex digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct DeviceUuid {
    raw: [u8; vk::UUID_SIZE],
}

impl DeviceUuid {
    pub const fn from_bytes(raw: [u8; vk::UUID_SIZE]) -> Self {
        Self { raw }
    }

    pub fn bytes(&self) -> &[u8; vk::UUID_SIZE] {
        &self.raw
    }

    /// The 32 character lowercase hexadecimal form.
    pub fn representation(&self) -> String {
        let mut out = String::with_capacity(2 * vk::UUID_SIZE);
        for byte in self.raw {
            out.push(HEX_DIGITS[(byte / 16) as usize] as char);
            out.push(HEX_DIGITS[(byte % 16) as usize] as char);
        }
        out
    }
}

impl From<[u8; vk::UUID_SIZE]> for DeviceUuid {
    fn from(raw: [u8; vk::UUID_SIZE]) -> Self {
        Self::from_bytes(raw)
    }
}

fn decode_digit(ch: u8) -> Result<u8, GraphicsError> {
    match ch {
        b'0'..=b'9' => Ok(ch - b'0'),
        b'a'..=b'f' => Ok(ch - b'a' + 10),
        _ => Err(GraphicsError::InvalidParameter(format!(
            "{} character found while parsing hexadecimal string!",
            ch as char
        ))),
    }
}

impl FromStr for DeviceUuid {
    type Err = GraphicsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let chars = s.as_bytes();
        if chars.len() != 2 * vk::UUID_SIZE {
            return Err(GraphicsError::InvalidParameter(
                "given UUID representation has wrong size!".to_string(),
            ));
        }

        let mut raw = [0u8; vk::UUID_SIZE];
        for (i, byte) in raw.iter_mut().enumerate() {
            *byte = decode_digit(chars[2 * i])? * 16 + decode_digit(chars[2 * i + 1])?;
        }
        Ok(Self { raw })
    }
}

impl fmt::Display for DeviceUuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.representation())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_parse_and_represent() {
        let text = "000102030405060708090a0b0c0d0eff";
        let uuid: DeviceUuid = text.parse().unwrap();
        assert_eq!(uuid.bytes()[0], 0);
        assert_eq!(uuid.bytes()[10], 0x0a);
        assert_eq!(uuid.bytes()[15], 0xff);
        assert_eq!(uuid.representation(), text);
        assert_eq!(uuid.to_string(), text);
    }

    #[rstest]
    #[case::too_short("0011")]
    #[case::too_long("000102030405060708090a0b0c0d0eff00")]
    #[case::empty("")]
    fn test_wrong_size(#[case] text: &str) {
        let err = text.parse::<DeviceUuid>().unwrap_err();
        assert!(err.to_string().contains("wrong size"));
    }

    #[rstest]
    #[case::uppercase("000102030405060708090A0B0C0D0EFF")]
    #[case::not_hex("000102030405060708090a0b0c0d0egg")]
    fn test_bad_character(#[case] text: &str) {
        let err = text.parse::<DeviceUuid>().unwrap_err();
        assert!(err.to_string().contains("parsing hexadecimal"));
    }
}
