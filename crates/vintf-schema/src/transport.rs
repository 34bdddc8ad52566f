use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind} '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

/// Interface-description dialect of a declaration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HalFormat {
    #[default]
    Hidl,
    Aidl,
    Native,
}

impl HalFormat {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Hidl => "hidl",
            Self::Aidl => "aidl",
            Self::Native => "native",
        }
    }
}

impl fmt::Display for HalFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HalFormat {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hidl" => Ok(Self::Hidl),
            "aidl" => Ok(Self::Aidl),
            "native" => Ok(Self::Native),
            other => Err(UnknownVariant {
                kind: "HAL format",
                value: other.to_owned(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    #[default]
    #[serde(rename = "")]
    Empty,
    Hwbinder,
    Passthrough,
    Inet,
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Empty => "",
            Self::Hwbinder => "hwbinder",
            Self::Passthrough => "passthrough",
            Self::Inet => "inet",
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Arch {
    #[default]
    #[serde(rename = "")]
    Empty,
    #[serde(rename = "32")]
    Arch32,
    #[serde(rename = "64")]
    Arch64,
    #[serde(rename = "32+64")]
    Arch32And64,
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Empty => "",
            Self::Arch32 => "32",
            Self::Arch64 => "64",
            Self::Arch32And64 => "32+64",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportArchError {
    #[error("transport '{0}' requires empty arch and ip/port attributes")]
    UnexpectedAttributes(Transport),
    #[error("passthrough HALs require an arch attribute")]
    PassthroughWithoutArch,
    #[error("passthrough HALs require empty ip/port attributes")]
    PassthroughWithAddress,
    #[error("inet HALs require an empty arch attribute")]
    InetWithArch,
    #[error("inet HALs require ip and port attributes")]
    InetWithoutAddress,
}

/// How a HAL is reached: transport, bitness, and for `inet` the address.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TransportArch {
    pub transport: Transport,
    pub arch: Arch,
    pub ip: Option<String>,
    pub port: Option<u16>,
}

impl TransportArch {
    pub fn new(transport: Transport, arch: Arch) -> Self {
        Self {
            transport,
            arch,
            ip: None,
            port: None,
        }
    }

    pub fn inet(ip: impl Into<String>, port: u16) -> Self {
        Self {
            transport: Transport::Inet,
            arch: Arch::Empty,
            ip: Some(ip.into()),
            port: Some(port),
        }
    }

    fn has_address(&self) -> bool {
        self.ip.is_some() || self.port.is_some()
    }

    pub fn validate(&self) -> Result<(), TransportArchError> {
        match self.transport {
            Transport::Empty | Transport::Hwbinder => {
                if self.arch != Arch::Empty || self.has_address() {
                    return Err(TransportArchError::UnexpectedAttributes(self.transport));
                }
            }
            Transport::Passthrough => {
                if self.arch == Arch::Empty {
                    return Err(TransportArchError::PassthroughWithoutArch);
                }
                if self.has_address() {
                    return Err(TransportArchError::PassthroughWithAddress);
                }
            }
            Transport::Inet => {
                if self.arch != Arch::Empty {
                    return Err(TransportArchError::InetWithArch);
                }
                if self.ip.is_none() || self.port.is_none() {
                    return Err(TransportArchError::InetWithoutAddress);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_text_forms() {
        for format in [HalFormat::Hidl, HalFormat::Aidl, HalFormat::Native] {
            assert_eq!(format.to_string().parse::<HalFormat>().unwrap(), format);
        }
        assert!("HIDL".parse::<HalFormat>().is_err());
        assert_eq!(serde_json::to_string(&HalFormat::Aidl).unwrap(), "\"aidl\"");
    }

    #[test]
    fn arch_serializes_as_bitness() {
        assert_eq!(serde_json::to_string(&Arch::Arch32And64).unwrap(), "\"32+64\"");
        let arch: Arch = serde_json::from_str("\"64\"").unwrap();
        assert_eq!(arch, Arch::Arch64);
    }

    #[test]
    fn hwbinder_rejects_arch_and_address() {
        assert!(TransportArch::new(Transport::Hwbinder, Arch::Empty).validate().is_ok());
        assert!(TransportArch::default().validate().is_ok());
        assert_eq!(
            TransportArch::new(Transport::Hwbinder, Arch::Arch64).validate(),
            Err(TransportArchError::UnexpectedAttributes(Transport::Hwbinder))
        );
    }

    #[test]
    fn passthrough_requires_arch_only() {
        assert!(TransportArch::new(Transport::Passthrough, Arch::Arch32).validate().is_ok());
        assert_eq!(
            TransportArch::new(Transport::Passthrough, Arch::Empty).validate(),
            Err(TransportArchError::PassthroughWithoutArch)
        );
        let mut with_port = TransportArch::new(Transport::Passthrough, Arch::Arch64);
        with_port.port = Some(80);
        assert_eq!(
            with_port.validate(),
            Err(TransportArchError::PassthroughWithAddress)
        );
    }

    #[test]
    fn inet_requires_full_address() {
        assert!(TransportArch::inet("1.2.3.4", 12).validate().is_ok());
        let mut missing_port = TransportArch::inet("1.2.3.4", 12);
        missing_port.port = None;
        assert_eq!(
            missing_port.validate(),
            Err(TransportArchError::InetWithoutAddress)
        );
        let mut with_arch = TransportArch::inet("1.2.3.4", 12);
        with_arch.arch = Arch::Arch32;
        assert_eq!(with_arch.validate(), Err(TransportArchError::InetWithArch));
    }
}
