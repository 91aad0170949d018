use std::fmt;
use std::str::FromStr;

/// A register reference as it appears in the instruction stream.
///
/// `location` is the resident-register name (`r_0_3_1`); `root` is the
/// polynomial-level name obtained by stripping the final `_<n>` suffix and
/// `index` is that suffix. The optional `(k)` bank annotation is carried
/// verbatim so a parsed program prints back identically.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Operand {
    location: String,
    root: String,
    index: String,
    bank: Option<u32>,
    immediate: bool,
}

impl Operand {
    pub fn register(location: impl Into<String>) -> Self {
        Self::build(location.into(), None, false)
    }

    pub fn banked(location: impl Into<String>, bank: u32) -> Self {
        Self::build(location.into(), Some(bank), false)
    }

    pub fn immediate(location: impl Into<String>) -> Self {
        Self::build(location.into(), None, true)
    }

    fn build(location: String, bank: Option<u32>, immediate: bool) -> Self {
        let (root, index) = split_location(&location);
        Self {
            root: root.to_string(),
            index: index.to_string(),
            location,
            bank,
            immediate,
        }
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    /// Polynomial-level name: the location with its final `_<n>` suffix removed.
    pub fn root(&self) -> &str {
        &self.root
    }

    /// The stripped suffix, including its leading underscore (empty if none).
    pub fn index(&self) -> &str {
        &self.index
    }

    pub fn bank(&self) -> Option<u32> {
        self.bank
    }

    pub fn is_immediate(&self) -> bool {
        self.immediate
    }

    pub fn set_location(&mut self, location: impl Into<String>) {
        let location = location.into();
        let (root, index) = split_location(&location);
        self.root = root.to_string();
        self.index = index.to_string();
        self.location = location;
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.location)?;
        if !self.immediate {
            if let Some(bank) = self.bank {
                write!(f, " ({bank})")?;
            }
        }
        Ok(())
    }
}

fn split_location(location: &str) -> (&str, &str) {
    match location.rfind('_') {
        Some(at) => (&location[..at], &location[at..]),
        None => (location, ""),
    }
}

/// Packed twiddle selector `w_<residual>_<stage>_<block>` identifying the
/// twiddle subset and butterfly schedule position of an `ntt`/`intt`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WParam {
    pub residual: usize,
    pub stage: u32,
    pub block: usize,
}

impl WParam {
    pub fn new(residual: usize, stage: u32, block: usize) -> Self {
        Self {
            residual,
            stage,
            block,
        }
    }
}

impl fmt::Display for WParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "w_{}_{}_{}", self.residual, self.stage, self.block)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WParamParseError {
    pub text: String,
}

impl fmt::Display for WParamParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "malformed w-parameter `{}`", self.text)
    }
}

impl std::error::Error for WParamParseError {}

impl FromStr for WParam {
    type Err = WParamParseError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let error = || WParamParseError {
            text: text.to_string(),
        };
        let mut parts = text.trim().split('_');
        if parts.next() != Some("w") {
            return Err(error());
        }
        let residual = parts.next().ok_or_else(error)?;
        let stage = parts.next().ok_or_else(error)?;
        let block = parts.next().ok_or_else(error)?;
        if parts.next().is_some() {
            return Err(error());
        }
        Ok(Self {
            residual: residual.parse().map_err(|_| error())?,
            stage: stage.parse().map_err(|_| error())?,
            block: block.parse().map_err(|_| error())?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn location_splits_at_final_underscore() {
        let op = Operand::register("r_0_3_1");
        assert_eq!(op.root(), "r_0_3");
        assert_eq!(op.index(), "_1");

        let op = Operand::register("tmp");
        assert_eq!(op.root(), "tmp");
        assert_eq!(op.index(), "");
    }

    #[test]
    fn bank_prints_only_when_present() {
        assert_eq!(Operand::banked("a_0", 2).to_string(), "a_0 (2)");
        assert_eq!(Operand::register("a_0").to_string(), "a_0");
        assert_eq!(Operand::immediate("i0").to_string(), "i0");
    }

    #[test]
    fn wparam_round_trips() {
        let w: WParam = "w_2_5_3".parse().expect("parse wparam");
        assert_eq!(w, WParam::new(2, 5, 3));
        assert_eq!(w.to_string(), "w_2_5_3");
    }

    #[test]
    fn wparam_rejects_malformed_text() {
        assert!("w_2_5".parse::<WParam>().is_err());
        assert!("x_2_5_3".parse::<WParam>().is_err());
        assert!("w_2_5_3_9".parse::<WParam>().is_err());
    }
}
