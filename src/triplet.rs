// SPDX-FileCopyrightText: Copyright (c) 2024 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Best/typical/worst value triplets.
//!
//! Every numeric annotation in SPEF and SDF is a triplet over three
//! operating points. Files write either a bare number (all three equal) or
//! `best:typ:worst`; the printers collapse singleton triplets back to one
//! number.

use std::fmt;

use crate::error::ParseError;
use crate::lexer::{Lexer, TokKind};

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Triplet {
    pub best: f32,
    pub typ: f32,
    pub worst: f32,
}

impl Triplet {
    pub const ZERO: Triplet = Triplet {
        best: 0.0,
        typ: 0.0,
        worst: 0.0,
    };

    pub fn splat(v: f32) -> Self {
        Triplet {
            best: v,
            typ: v,
            worst: v,
        }
    }

    pub fn new(best: f32, typ: f32, worst: f32) -> Self {
        Triplet { best, typ, worst }
    }

    pub fn is_singleton(&self) -> bool {
        self.best == self.typ && self.best == self.worst
    }
}

impl fmt::Display for Triplet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_singleton() {
            write!(f, "{}", self.typ)
        } else {
            write!(f, "{}:{}:{}", self.best, self.typ, self.worst)
        }
    }
}

/// Advance over an integer or real token, returning its value.
pub(crate) fn try_number(lex: &mut Lexer<'_>) -> Result<Option<f32>, ParseError> {
    match lex.sym() {
        TokKind::Int | TokKind::Real => {
            let v = lex.rval() as f32;
            lex.advance()?;
            Ok(Some(v))
        }
        _ => Ok(None),
    }
}

/// Parse `n` or `a:b:c`. Returns `Ok(None)` without consuming anything when
/// the stream does not start with a number; a number followed by a malformed
/// triplet tail also rewinds and returns `Ok(None)`.
pub(crate) fn parse_triplet(lex: &mut Lexer<'_>) -> Result<Option<Triplet>, ParseError> {
    lex.push_pos();

    let first = match try_number(lex)? {
        Some(v) => v,
        None => {
            lex.pop_pos();
            return Ok(None);
        }
    };
    if !lex.have_punct(':')? {
        lex.pop_pos();
        return Ok(Some(Triplet::splat(first)));
    }
    let typ = match try_number(lex)? {
        Some(v) => v,
        None => {
            lex.set_pos();
            lex.pop_pos();
            return Ok(None);
        }
    };
    if !lex.have_punct(':')? {
        lex.set_pos();
        lex.pop_pos();
        return Ok(None);
    }
    let worst = match try_number(lex)? {
        Some(v) => v,
        None => {
            lex.set_pos();
            lex.pop_pos();
            return Ok(None);
        }
    };
    lex.pop_pos();
    Ok(Some(Triplet::new(first, typ, worst)))
}

/// Parse a complex triplet: `re`, `re:re:re`, `re im`, or
/// `re im:re im:re im`. Missing imaginary parts default to zero.
pub(crate) fn parse_complex(
    lex: &mut Lexer<'_>,
) -> Result<Option<(Triplet, Triplet)>, ParseError> {
    lex.push_pos();

    let re1 = match try_number(lex)? {
        Some(v) => v,
        None => {
            lex.pop_pos();
            return Ok(None);
        }
    };

    // A second number with no colon in between is the imaginary part.
    let im1 = try_number(lex)?;

    if !lex.have_punct(':')? {
        lex.pop_pos();
        return Ok(Some((
            Triplet::splat(re1),
            Triplet::splat(im1.unwrap_or(0.0)),
        )));
    }

    let pair = |lex: &mut Lexer<'_>, with_im: bool| -> Result<Option<(f32, f32)>, ParseError> {
        let re = match try_number(lex)? {
            Some(v) => v,
            None => return Ok(None),
        };
        let im = if with_im {
            match try_number(lex)? {
                Some(v) => v,
                None => return Ok(None),
            }
        } else {
            0.0
        };
        Ok(Some((re, im)))
    };

    let with_im = im1.is_some();
    let (re2, im2) = match pair(lex, with_im)? {
        Some(p) => p,
        None => {
            lex.set_pos();
            lex.pop_pos();
            return Ok(None);
        }
    };
    if !lex.have_punct(':')? {
        lex.set_pos();
        lex.pop_pos();
        return Ok(None);
    }
    let (re3, im3) = match pair(lex, with_im)? {
        Some(p) => p,
        None => {
            lex.set_pos();
            lex.pop_pos();
            return Ok(None);
        }
    };
    lex.pop_pos();
    Ok(Some((
        Triplet::new(re1, re2, re3),
        Triplet::new(im1.unwrap_or(0.0), im2, im3),
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(s: &str) -> Lexer<'_> {
        Lexer::new(s).unwrap()
    }

    #[test]
    fn test_singleton() {
        let mut l = lex("1.5 next");
        let t = parse_triplet(&mut l).unwrap().unwrap();
        assert_eq!(t, Triplet::splat(1.5));
        assert!(t.is_singleton());
        assert_eq!(l.text(), "next");
    }

    #[test]
    fn test_full_triplet() {
        let mut l = lex("1:2:3");
        let t = parse_triplet(&mut l).unwrap().unwrap();
        assert_eq!(t, Triplet::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn test_not_a_number() {
        let mut l = lex("abc");
        assert!(parse_triplet(&mut l).unwrap().is_none());
        assert_eq!(l.text(), "abc");
    }

    #[test]
    fn test_malformed_tail_rewinds() {
        // `1:2` with no third value is not a triplet; nothing is consumed.
        let mut l = lex("1:2 rest");
        assert!(parse_triplet(&mut l).unwrap().is_none());
        assert_eq!(l.ival(), 1);
    }

    #[test]
    fn test_display() {
        assert_eq!(Triplet::splat(2.5).to_string(), "2.5");
        assert_eq!(Triplet::new(1.0, 2.0, 3.0).to_string(), "1:2:3");
    }

    #[test]
    fn test_print_parse_round_trip() {
        for t in [
            Triplet::splat(0.0),
            Triplet::splat(-1.25),
            Triplet::new(0.5, 1.0, 1.5),
        ] {
            let printed = t.to_string();
            let mut l = lex(&printed);
            assert_eq!(parse_triplet(&mut l).unwrap().unwrap(), t);
        }
    }

    #[test]
    fn test_complex_forms() {
        let mut l = lex("2.5");
        let (re, im) = parse_complex(&mut l).unwrap().unwrap();
        assert_eq!(re, Triplet::splat(2.5));
        assert_eq!(im, Triplet::ZERO);

        let mut l = lex("1:2:3");
        let (re, im) = parse_complex(&mut l).unwrap().unwrap();
        assert_eq!(re, Triplet::new(1.0, 2.0, 3.0));
        assert_eq!(im, Triplet::ZERO);

        let mut l = lex("1 4");
        let (re, im) = parse_complex(&mut l).unwrap().unwrap();
        assert_eq!(re, Triplet::splat(1.0));
        assert_eq!(im, Triplet::splat(4.0));

        let mut l = lex("1 4:2 5:3 6");
        let (re, im) = parse_complex(&mut l).unwrap().unwrap();
        assert_eq!(re, Triplet::new(1.0, 2.0, 3.0));
        assert_eq!(im, Triplet::new(4.0, 5.0, 6.0));
    }
}
