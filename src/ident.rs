// SPDX-FileCopyrightText: Copyright (c) 2024 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Hierarchical identifiers.
//!
//! SPEF and SDF both name design objects with hierarchical paths whose
//! divider, pin-delimiter, and bus-delimiter characters are configured per
//! file. A [`HierId`] is the reconstructed form: an ordered list of
//! components, each optionally carrying a bus subscript, plus an absolute
//! flag for paths that begin with a divider.
//!
//! When the names in a file were generated by an upstream toolchain, a
//! [`Demangle`] adapter restores the canonical spelling before the path is
//! split; canonical names use `.` for hierarchy and `[`/`]` for subscripts.

use std::fmt;
use std::rc::Rc;

use compact_str::CompactString;
use smallvec::SmallVec;

/// One path component: a name and an optional integer bus subscript.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HierComp {
    pub name: CompactString,
    pub index: Option<u32>,
}

impl HierComp {
    pub fn new(name: impl Into<CompactString>) -> Self {
        HierComp {
            name: name.into(),
            index: None,
        }
    }
}

/// A hierarchical identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct HierId {
    pub comps: SmallVec<[HierComp; 4]>,
    /// True when the path began with a divider character.
    pub absolute: bool,
}

impl HierId {
    pub fn single(name: impl Into<CompactString>) -> Self {
        let mut id = HierId::default();
        id.comps.push(HierComp::new(name));
        id
    }

    pub fn is_single(&self) -> bool {
        self.comps.len() == 1
    }

    pub fn last(&self) -> Option<&HierComp> {
        self.comps.last()
    }

    /// Parse a flat string under the given divider and bus delimiters.
    /// `\c` escapes protect any character, including the divider itself.
    /// Returns `None` on empty components, a dangling divider, or a
    /// malformed subscript.
    pub fn parse_str(
        s: &str,
        divider: char,
        bus_open: char,
        bus_close: Option<char>,
    ) -> Option<HierId> {
        let mut chars = s.chars().peekable();
        let mut id = HierId::default();

        if chars.peek() == Some(&divider) {
            chars.next();
            id.absolute = true;
        }

        let mut name = CompactString::const_new("");
        loop {
            match chars.next() {
                Some('\\') => {
                    // Escaped character is taken literally.
                    name.push(chars.next()?);
                }
                Some(c) if c == divider => {
                    if name.is_empty() {
                        return None;
                    }
                    id.comps.push(HierComp::new(std::mem::take(&mut name)));
                }
                Some(c) if c == bus_open => {
                    if name.is_empty() {
                        return None;
                    }
                    let mut digits = CompactString::const_new("");
                    while matches!(chars.peek(), Some(d) if d.is_ascii_digit()) {
                        digits.push(chars.next().unwrap());
                    }
                    if digits.is_empty() {
                        return None;
                    }
                    if let Some(close) = bus_close {
                        if chars.peek() == Some(&close) {
                            chars.next();
                        }
                    }
                    let mut comp = HierComp::new(std::mem::take(&mut name));
                    comp.index = Some(digits.parse().ok()?);
                    id.comps.push(comp);
                    // Only a divider or the end may follow a subscript.
                    match chars.next() {
                        None => return Some(id),
                        Some(c) if c == divider => {}
                        Some(_) => return None,
                    }
                }
                Some(c) => name.push(c),
                None => {
                    if name.is_empty() {
                        return None;
                    }
                    id.comps.push(HierComp::new(name));
                    return Some(id);
                }
            }
        }
    }

    /// Format under the given divider and bus delimiters; a leading divider
    /// marks absolute paths.
    pub fn display(&self, divider: char, bus_open: char, bus_close: Option<char>) -> HierIdDisplay<'_> {
        HierIdDisplay {
            id: self,
            divider,
            bus_open,
            bus_close,
        }
    }
}

pub struct HierIdDisplay<'a> {
    id: &'a HierId,
    divider: char,
    bus_open: char,
    bus_close: Option<char>,
}

impl fmt::Display for HierIdDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.id.absolute {
            write!(f, "{}", self.divider)?;
        }
        for (i, comp) in self.id.comps.iter().enumerate() {
            if i > 0 {
                write!(f, "{}", self.divider)?;
            }
            write_escaped(f, &comp.name)?;
            if let Some(idx) = comp.index {
                write!(f, "{}{}", self.bus_open, idx)?;
                if let Some(close) = self.bus_close {
                    write!(f, "{}", close)?;
                }
            }
        }
        Ok(())
    }
}

/// Escape punctuation inside a component name so the printed form lexes
/// back into the same single component regardless of the active delimiter
/// characters.
fn write_escaped(f: &mut fmt::Formatter<'_>, name: &str) -> fmt::Result {
    use fmt::Write;
    for c in name.chars() {
        if c.is_ascii_punctuation() && c != '_' {
            f.write_char('\\')?;
        }
        f.write_char(c)?;
    }
    Ok(())
}

/// Canonicalizes identifier strings that were mangled by an upstream
/// toolchain. The real adapter lives with that toolchain; the readers only
/// consume this interface.
pub trait Demangle {
    /// Return the canonical spelling of `raw`, or `None` when `raw` is not a
    /// mangled name.
    fn demangle(&self, raw: &str) -> Option<String>;
}

impl fmt::Debug for dyn Demangle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Demangle")
    }
}

/// Adapter that treats every name as already canonical. Attached when a
/// reader is constructed with `demangle = true` but no toolchain adapter is
/// available, so ids still take the canonical-divider parse path.
#[derive(Debug, Default)]
pub struct IdentityDemangle;

impl Demangle for IdentityDemangle {
    fn demangle(&self, raw: &str) -> Option<String> {
        Some(raw.to_string())
    }
}

/// Parse an assembled raw identifier, canonicalizing through the demangler
/// when one is attached. Demangled names always use `.`/`[`/`]`; otherwise
/// the file's own delimiters apply.
pub fn parse_maybe_mangled(
    raw: &str,
    demangler: Option<&Rc<dyn Demangle>>,
    divider: char,
    bus_open: char,
    bus_close: Option<char>,
) -> Option<HierId> {
    match demangler {
        Some(d) => {
            let canon = d.demangle(raw)?;
            HierId::parse_str(&canon, '.', '[', Some(']'))
        }
        None => HierId::parse_str(raw, divider, bus_open, bus_close),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple() {
        let id = HierId::parse_str("top/u1/x", '/', '[', Some(']')).unwrap();
        assert!(!id.absolute);
        assert_eq!(id.comps.len(), 3);
        assert_eq!(id.comps[1].name, "u1");
    }

    #[test]
    fn test_parse_absolute() {
        let id = HierId::parse_str("/top/x", '/', '[', Some(']')).unwrap();
        assert!(id.absolute);
        assert_eq!(id.comps.len(), 2);
    }

    #[test]
    fn test_parse_subscript() {
        let id = HierId::parse_str("top.data[3]", '.', '[', Some(']')).unwrap();
        assert_eq!(id.comps.len(), 2);
        assert_eq!(id.comps[1].index, Some(3));
    }

    #[test]
    fn test_mid_path_subscript() {
        let id = HierId::parse_str("a[1].b", '.', '[', Some(']')).unwrap();
        assert_eq!(id.comps[0].index, Some(1));
        assert_eq!(id.comps[1].name, "b");
    }

    #[test]
    fn test_escaped_divider() {
        let id = HierId::parse_str(r"a\/b/c", '/', '[', Some(']')).unwrap();
        assert_eq!(id.comps.len(), 2);
        assert_eq!(id.comps[0].name, "a/b");
    }

    #[test]
    fn test_empty_component_rejected() {
        assert!(HierId::parse_str("a//b", '/', '[', Some(']')).is_none());
        assert!(HierId::parse_str("a/", '/', '[', Some(']')).is_none());
        assert!(HierId::parse_str("", '/', '[', Some(']')).is_none());
    }

    #[test]
    fn test_display_round_trip() {
        let id = HierId::parse_str("/top/data[7]", '/', '[', Some(']')).unwrap();
        let printed = id.display('/', '[', Some(']')).to_string();
        assert_eq!(printed, "/top/data[7]");
        assert_eq!(HierId::parse_str(&printed, '/', '[', Some(']')).unwrap(), id);
    }

    #[test]
    fn test_display_other_delims() {
        let id = HierId::parse_str("top.a[2]", '.', '[', Some(']')).unwrap();
        assert_eq!(id.display(':', '<', Some('>')).to_string(), "top:a<2>");
    }

    #[test]
    fn test_bus_without_suffix() {
        let id = HierId::parse_str("a<3", '/', '<', None).unwrap();
        assert_eq!(id.comps[0].index, Some(3));
    }

    #[test]
    fn test_identity_demangle_path() {
        let demangler: Rc<dyn Demangle> = Rc::new(IdentityDemangle);
        let id = parse_maybe_mangled("a.b[1]", Some(&demangler), '/', '{', Some('}')).unwrap();
        // Canonical dividers apply, not the file's.
        assert_eq!(id.comps.len(), 2);
        assert_eq!(id.comps[1].index, Some(1));
    }
}
