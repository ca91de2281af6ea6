use core::fmt;
use core::str::FromStr;

use crate::error::CodecError;

/// A 20-byte account identifier.
///
/// Parsing is a shape check only (`0x` + 40 hex digits). Checksums are not
/// enforced; the wallet is responsible for that.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address([u8; 20]);

impl Address {
    pub const LEN: usize = 20;
    pub const ZERO: Address = Address([0u8; 20]);

    pub const fn from_bytes(bytes: [u8; 20]) -> Self {
        Address(bytes)
    }

    pub const fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        *self == Address::ZERO
    }
}

impl FromStr for Address {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || CodecError::MalformedAddress(s.to_owned());
        let digits = s.strip_prefix("0x").ok_or_else(malformed)?;
        if digits.len() != Address::LEN * 2 {
            return Err(malformed());
        }
        let mut bytes = [0u8; 20];
        hex::decode_to_slice(digits, &mut bytes).map_err(|_| malformed())?;
        Ok(Address(bytes))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({self})")
    }
}

/// Address of a deployed game contract.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContractRef(Address);

impl ContractRef {
    pub const fn new(address: Address) -> Self {
        ContractRef(address)
    }

    pub const fn address(&self) -> Address {
        self.0
    }
}

impl FromStr for ContractRef {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let address: Address = s.parse()?;
        if address.is_zero() {
            return Err(CodecError::MalformedAddress(s.to_owned()));
        }
        Ok(ContractRef(address))
    }
}

impl fmt::Display for ContractRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl fmt::Debug for ContractRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContractRef({})", self.0)
    }
}
