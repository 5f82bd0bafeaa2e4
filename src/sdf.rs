// SPDX-FileCopyrightText: Copyright (c) 2024 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Reader for Standard Delay Format (SDF, IEEE 1497) files.
//!
//! SDF annotates instances of cells with delays; the extended `XDELAYFILE`
//! dialect additionally carries per-cell energy and leakage annotations.
//! Cells are keyed by celltype; each celltype may carry one wildcard record
//! (`INSTANCE *`) that applies to every instance plus any number of
//! instance-specific records, and [`SdfCellType::get_instance`] resolves a
//! lookup to the most specific one.
//!
//! Only `DELAY` blocks (and, in the extended dialect, `ENERGY`/`LEAKAGE`)
//! are interpreted; `TIMINGCHECK`, `TIMINGENV`, and `LABEL` blocks are
//! skipped by balanced-paren skipping.

use std::cell::Cell;
use std::io;
use std::io::Write;
use std::path::Path;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::error::{ParseError, Warning, Warnings};
use crate::ident::{parse_maybe_mangled, Demangle, HierId, IdentityDemangle};
use crate::lexer::{Lexer, TokKind};
use crate::triplet::{parse_triplet, Triplet};

/// SDF file header. Field order in the file is free, which is more lenient
/// than the standard requires.
#[derive(Debug, Clone)]
pub struct SdfHeader {
    pub sdf_version: Option<String>,
    pub design_name: Option<String>,
    pub date: Option<String>,
    pub vendor: Option<String>,
    pub program: Option<String>,
    pub version: Option<String>,
    pub divider: char,
    pub voltage: Triplet,
    pub process: Option<String>,
    pub temperature: Triplet,
    /// Seconds; the file gives 1, 10, or 100 of a unit between s and fs.
    pub timescale: f64,
    /// Joules; only in the extended dialect.
    pub energyscale: Option<f64>,
    /// True for `XDELAYFILE`.
    pub extended: bool,
}

impl Default for SdfHeader {
    fn default() -> Self {
        SdfHeader {
            sdf_version: None,
            design_name: None,
            date: None,
            vendor: None,
            program: None,
            version: None,
            divider: '.',
            voltage: Triplet::ZERO,
            process: None,
            temperature: Triplet::splat(25.0),
            timescale: 1.0,
            energyscale: None,
            extended: false,
        }
    }
}

/// Conditional expression tree for `COND` delay paths.
#[derive(Debug, Clone, PartialEq)]
pub enum CondExpr {
    Var(HierId),
    Not(Box<CondExpr>),
    And(Box<CondExpr>, Box<CondExpr>),
    Or(Box<CondExpr>, Box<CondExpr>),
    Xor(Box<CondExpr>, Box<CondExpr>),
    Eq(Box<CondExpr>, Box<CondExpr>),
    Ne(Box<CondExpr>, Box<CondExpr>),
    True,
    False,
    /// `CONDELSE` marker: applies when no other condition matched.
    Else,
}

impl CondExpr {
    pub fn var(name: &str) -> CondExpr {
        CondExpr::Var(HierId::single(name))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SdfPathKind {
    IoPath,
    Port,
    Interconnect,
    Device,
    NetDelay,
}

impl SdfPathKind {
    pub fn keyword(&self) -> &'static str {
        match self {
            SdfPathKind::IoPath => "IOPATH",
            SdfPathKind::Port => "PORT",
            SdfPathKind::Interconnect => "INTERCONNECT",
            SdfPathKind::Device => "DEVICE",
            SdfPathKind::NetDelay => "NETDELAY",
        }
    }
}

/// Edge qualifier on a path source pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Edge {
    #[default]
    None,
    Posedge,
    Negedge,
}

/// Zero-to-one and one-to-zero delays. SDF permits up to twelve delay
/// values per list; only these two are kept.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SdfDelay {
    pub z2o: Triplet,
    pub o2z: Triplet,
}

/// One delay (or energy) path of a cell.
#[derive(Debug, Clone)]
pub struct SdfPath {
    pub kind: SdfPathKind,
    /// False for `ABSOLUTE`, true for `INCREMENT`.
    pub increment: bool,
    pub dirfrom: Edge,
    pub cond: Option<CondExpr>,
    pub from: Option<HierId>,
    pub to: Option<HierId>,
    pub delay: SdfDelay,
}

/// Delay/energy annotations for one cell record.
#[derive(Debug, Clone, Default)]
pub struct SdfCell {
    pub paths: Vec<SdfPath>,
    /// Extended dialect only.
    pub energies: Vec<SdfPath>,
    /// Extended dialect only.
    pub leakage: Option<Triplet>,
}

impl SdfCell {
    fn merge(&mut self, other: SdfCell) {
        self.paths.extend(other.paths);
        self.energies.extend(other.energies);
        if other.leakage.is_some() {
            self.leakage = other.leakage;
        }
    }
}

/// All records for one celltype: an optional wildcard cell plus an
/// instance-keyed table. `used` tracks whether any query touched it.
#[derive(Debug, Default)]
pub struct SdfCellType {
    pub celltype: String,
    pub wildcard: Option<SdfCell>,
    pub instances: IndexMap<HierId, SdfCell>,
    pub used: Cell<bool>,
}

impl SdfCellType {
    /// Instance-specific record if one exists, otherwise the wildcard.
    pub fn get_instance(&self, inst: &HierId) -> Option<&SdfCell> {
        self.instances.get(inst).or(self.wildcard.as_ref())
    }
}

/// Parsed SDF file.
#[derive(Debug, Default)]
pub struct Sdf {
    pub(crate) header: SdfHeader,
    pub(crate) celltypes: IndexMap<String, SdfCellType>,
    pub(crate) valid: bool,
    pub(crate) demangler: Option<Rc<dyn Demangle>>,
    pub(crate) warnings: Warnings,
}

impl Sdf {
    /// Create a reader. With `demangle` set, identifiers are canonicalized
    /// through the identity adapter; use [`Sdf::with_demangler`] to attach a
    /// real toolchain adapter.
    pub fn new(demangle: bool) -> Self {
        let mut s = Sdf::default();
        if demangle {
            s.demangler = Some(Rc::new(IdentityDemangle));
        }
        s
    }

    pub fn with_demangler(demangler: Rc<dyn Demangle>) -> Self {
        let mut s = Sdf::default();
        s.demangler = Some(demangler);
        s
    }

    pub fn set_warning_sink(&mut self, sink: impl FnMut(&Warning) + 'static) {
        self.warnings.set_sink(Box::new(sink));
    }

    pub fn read_file(&mut self, path: impl AsRef<Path>) -> Result<(), ParseError> {
        let content = std::fs::read_to_string(path)?;
        self.read_str(&content)
    }

    pub fn read(&mut self, mut reader: impl io::Read) -> Result<(), ParseError> {
        let mut content = String::new();
        reader.read_to_string(&mut content)?;
        self.read_str(&content)
    }

    /// Parse a complete SDF file. Reading twice on one object is not
    /// defined. On error the model is marked invalid and the error is also
    /// recorded as a warning.
    pub fn read_str(&mut self, input: &str) -> Result<(), ParseError> {
        self.valid = false;
        let result = (|| {
            let mut lex = Lexer::new(input)?;
            let mut parser = SdfParser {
                lex: &mut lex,
                out: self,
            };
            parser.run()
        })();
        match result {
            Ok(()) => {
                self.valid = true;
                Ok(())
            }
            Err(e) => {
                let (line, col) = match &e {
                    ParseError::Lexical { line, col, .. }
                    | ParseError::UnexpectedToken { line, col, .. } => (*line, *col),
                    _ => (0, 0),
                };
                self.warnings.emit(line, col, format!("SDF parsing error: {}", e));
                Err(e)
            }
        }
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn header(&self) -> &SdfHeader {
        &self.header
    }

    pub fn celltypes(&self) -> &IndexMap<String, SdfCellType> {
        &self.celltypes
    }

    pub fn warnings(&self) -> &[Warning] {
        self.warnings.list()
    }

    /// Look up a celltype record, marking it used.
    pub fn get_cell(&self, name: &str) -> Option<&SdfCellType> {
        let ct = self.celltypes.get(name)?;
        ct.used.set(true);
        Some(ct)
    }

    /// True when any celltype carries instance-specific records.
    pub fn has_per_instance(&self) -> bool {
        self.celltypes.values().any(|ct| !ct.instances.is_empty())
    }

    /// Write one `msg`-prefixed line per celltype that no query ever hit.
    pub fn report_unused(&self, msg: &str, sink: &mut impl Write) -> io::Result<()> {
        for ct in self.celltypes.values() {
            if !ct.used.get() {
                writeln!(sink, "{}: {}", msg, ct.celltype)?;
            }
        }
        Ok(())
    }

    /// One-line model statistics.
    pub fn summary(&self) -> String {
        let cells: usize = self
            .celltypes
            .values()
            .map(|ct| ct.instances.len() + ct.wildcard.is_some() as usize)
            .sum();
        let paths: usize = self
            .celltypes
            .values()
            .flat_map(|ct| ct.wildcard.iter().chain(ct.instances.values()))
            .map(|c| c.paths.len())
            .sum();
        format!(
            "SDF: {} celltypes, {} cells, {} delay paths",
            self.celltypes.len(),
            cells,
            paths
        )
    }
}

struct SdfParser<'a, 'b> {
    lex: &'a mut Lexer<'b>,
    out: &'a mut Sdf,
}

impl SdfParser<'_, '_> {
    fn err(&self, expected: impl Into<String>, context: &'static str) -> ParseError {
        let found = if self.lex.at_eof() {
            "<eof>".to_string()
        } else {
            self.lex.text().to_string()
        };
        ParseError::UnexpectedToken {
            expected: expected.into(),
            found,
            context,
            line: self.lex.line(),
            col: self.lex.col(),
        }
    }

    fn warn(&mut self, msg: impl Into<String>) {
        self.out
            .warnings
            .emit(self.lex.line(), self.lex.col(), msg);
    }

    fn expect_punct(&mut self, c: char, context: &'static str) -> Result<(), ParseError> {
        if self.lex.have_punct(c)? {
            Ok(())
        } else {
            Err(self.err(format!("`{}`", c), context))
        }
    }

    fn run(&mut self) -> Result<(), ParseError> {
        self.expect_punct('(', "parsing delay file")?;
        if self.lex.have_keyword("DELAYFILE")? {
            self.out.header.extended = false;
        } else if self.lex.have_keyword("XDELAYFILE")? {
            self.out.header.extended = true;
        } else {
            return Err(self.err("DELAYFILE or XDELAYFILE", "parsing delay file"));
        }

        self.read_header()?;

        let mut count = 0usize;
        loop {
            if self.lex.is_punct(')') {
                break;
            }
            self.expect_punct('(', "parsing cells")?;
            if self.lex.have_keyword("CELL")? {
                self.read_cell()?;
                count += 1;
            } else if self.lex.sym() == TokKind::Ident {
                self.warn(format!(
                    "SDF parsing: skipping unknown block `{}`",
                    self.lex.text()
                ));
                self.lex.advance()?;
                self.lex.skip_balanced(1)?;
            } else {
                return Err(self.err("CELL", "parsing cells"));
            }
        }
        self.expect_punct(')', "parsing delay file")?;

        if count == 0 {
            return Err(ParseError::Structural(
                "no cells specified in SDF file".into(),
            ));
        }
        if !self.lex.at_eof() {
            return Err(self.err("end of file", "after delay file"));
        }
        Ok(())
    }

    /*---- header ----*/

    fn hdr_string(&mut self, context: &'static str) -> Result<String, ParseError> {
        if self.lex.sym() != TokKind::QString {
            return Err(self.err("quoted string", context));
        }
        let s = self.lex.text().to_string();
        self.lex.advance()?;
        self.expect_punct(')', context)?;
        Ok(s)
    }

    fn read_header(&mut self) -> Result<(), ParseError> {
        // SDFVERSION comes first; the rest of the fields are accepted in any
        // order.
        self.expect_punct('(', "parsing header")?;
        if !self.lex.have_keyword("SDFVERSION")? {
            return Err(self.err("SDFVERSION", "parsing header"));
        }
        self.out.header.sdf_version = Some(self.hdr_string("parsing SDFVERSION")?);

        loop {
            self.lex.push_pos();
            if !self.lex.have_punct('(')? {
                self.lex.pop_pos();
                return Ok(());
            }
            if self.lex.have_keyword("DESIGN")? {
                self.out.header.design_name = Some(self.hdr_string("parsing DESIGN")?);
            } else if self.lex.have_keyword("DATE")? {
                self.out.header.date = Some(self.hdr_string("parsing DATE")?);
            } else if self.lex.have_keyword("VENDOR")? {
                self.out.header.vendor = Some(self.hdr_string("parsing VENDOR")?);
            } else if self.lex.have_keyword("PROGRAM")? {
                self.out.header.program = Some(self.hdr_string("parsing PROGRAM")?);
            } else if self.lex.have_keyword("VERSION")? {
                self.out.header.version = Some(self.hdr_string("parsing VERSION")?);
            } else if self.lex.have_keyword("PROCESS")? {
                self.out.header.process = Some(self.hdr_string("parsing PROCESS")?);
            } else if self.lex.have_keyword("DIVIDER")? {
                let text = self.lex.text();
                let mut chars = text.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => {
                        self.out.header.divider = c;
                        self.lex.advance()?;
                    }
                    _ => return Err(self.err("single divider character", "parsing DIVIDER")),
                }
                self.expect_punct(')', "parsing DIVIDER")?;
            } else if self.lex.have_keyword("VOLTAGE")? {
                self.out.header.voltage = match parse_triplet(self.lex)? {
                    Some(t) => t,
                    None => return Err(self.err("voltage value", "parsing VOLTAGE")),
                };
                self.expect_punct(')', "parsing VOLTAGE")?;
            } else if self.lex.have_keyword("TEMPERATURE")? {
                self.out.header.temperature = match parse_triplet(self.lex)? {
                    Some(t) => t,
                    None => return Err(self.err("temperature value", "parsing TEMPERATURE")),
                };
                self.expect_punct(')', "parsing TEMPERATURE")?;
            } else if self.lex.have_keyword("TIMESCALE")? {
                self.out.header.timescale = self.read_scale(
                    &[
                        ("s", 1.0),
                        ("ms", 1e-3),
                        ("us", 1e-6),
                        ("ns", 1e-9),
                        ("ps", 1e-12),
                        ("fs", 1e-15),
                    ],
                    "parsing TIMESCALE",
                )?;
            } else if self.lex.have_keyword("ENERGYSCALE")? {
                if !self.out.header.extended {
                    self.warn("SDF parsing: ENERGYSCALE outside XDELAYFILE");
                }
                self.out.header.energyscale = Some(self.read_scale(
                    &[
                        ("J", 1.0),
                        ("mJ", 1e-3),
                        ("uJ", 1e-6),
                        ("nJ", 1e-9),
                        ("pJ", 1e-12),
                        ("fJ", 1e-15),
                    ],
                    "parsing ENERGYSCALE",
                )?);
            } else {
                self.lex.set_pos();
                self.lex.pop_pos();
                return Ok(());
            }
            self.lex.pop_pos();
        }
    }

    /// `<1|10|100> <unit>` with the closing paren.
    fn read_scale(
        &mut self,
        units: &[(&'static str, f64)],
        context: &'static str,
    ) -> Result<f64, ParseError> {
        let val = match self.lex.sym() {
            TokKind::Int => self.lex.ival() as f64,
            TokKind::Real => self.lex.rval(),
            _ => return Err(self.err("1, 10, or 100", context)),
        };
        if val != 1.0 && val != 10.0 && val != 100.0 {
            return Err(self.err("1, 10, or 100", context));
        }
        self.lex.advance()?;
        for &(unit, scale) in units {
            if self.lex.have_keyword(unit)? {
                self.expect_punct(')', context)?;
                return Ok(val * scale);
            }
        }
        let names: Vec<&str> = units.iter().map(|(u, _)| *u).collect();
        Err(self.err(names.join(" or "), context))
    }

    /*---- cells ----*/

    fn read_cell(&mut self) -> Result<(), ParseError> {
        self.expect_punct('(', "parsing CELL")?;
        if !self.lex.have_keyword("CELLTYPE")? {
            return Err(self.err("CELLTYPE", "parsing CELL"));
        }
        if self.lex.sym() != TokKind::QString {
            return Err(self.err("celltype string", "parsing CELLTYPE"));
        }
        let celltype = self.lex.text().to_string();
        self.lex.advance()?;
        self.expect_punct(')', "parsing CELLTYPE")?;

        self.expect_punct('(', "parsing CELL")?;
        if !self.lex.have_keyword("INSTANCE")? {
            return Err(self.err("INSTANCE", "parsing CELL"));
        }
        // `*`, empty, or a hierarchical id.
        let inst = if self.lex.have_punct('*')? {
            None
        } else if self.lex.is_punct(')') {
            None
        } else {
            match self.parse_hier_id()? {
                Some(id) => Some(id),
                None => return Err(self.err("instance path or *", "parsing INSTANCE")),
            }
        };
        self.expect_punct(')', "parsing INSTANCE")?;

        let mut cell = SdfCell::default();
        loop {
            if self.lex.have_punct(')')? {
                break;
            }
            self.expect_punct('(', "parsing CELL")?;
            if self.lex.have_keyword("DELAY")? {
                self.read_delay_block(&mut cell, false)?;
            } else if self.out.header.extended && self.lex.have_keyword("ENERGY")? {
                self.read_delay_block(&mut cell, true)?;
            } else if self.out.header.extended && self.lex.have_keyword("LEAKAGE")? {
                cell.leakage = match parse_triplet(self.lex)? {
                    Some(t) => Some(t),
                    None => return Err(self.err("leakage value", "parsing LEAKAGE")),
                };
                self.expect_punct(')', "parsing LEAKAGE")?;
            } else if self.lex.sym() == TokKind::Ident {
                // TIMINGCHECK, TIMINGENV, LABEL, and (outside the extended
                // dialect) ENERGY/LEAKAGE are skipped unparsed.
                let known = ["TIMINGCHECK", "TIMINGENV", "LABEL", "ENERGY", "LEAKAGE"]
                    .iter()
                    .any(|k| self.lex.text().eq_ignore_ascii_case(k));
                if !known {
                    return Err(self.err(
                        "DELAY, TIMINGCHECK, TIMINGENV, or LABEL",
                        "parsing CELL",
                    ));
                }
                self.lex.advance()?;
                self.lex.skip_balanced(1)?;
            } else {
                return Err(self.err("cell annotation block", "parsing CELL"));
            }
        }

        self.install_cell(celltype, inst, cell);
        Ok(())
    }

    fn install_cell(&mut self, celltype: String, inst: Option<HierId>, cell: SdfCell) {
        let divider = self.out.header.divider;
        let mut duplicate = None;
        let entry = self
            .out
            .celltypes
            .entry(celltype.clone())
            .or_insert_with(|| SdfCellType {
                celltype: celltype.clone(),
                ..SdfCellType::default()
            });
        match inst {
            None => {
                if let Some(existing) = &mut entry.wildcard {
                    existing.merge(cell);
                    duplicate = Some("`INSTANCE *`".to_string());
                } else {
                    entry.wildcard = Some(cell);
                }
            }
            Some(inst) => match entry.instances.entry(inst) {
                indexmap::map::Entry::Occupied(mut o) => {
                    duplicate = Some(format!(
                        "instance `{}`",
                        o.key().display(divider, '[', Some(']'))
                    ));
                    o.get_mut().merge(cell);
                }
                indexmap::map::Entry::Vacant(v) => {
                    v.insert(cell);
                }
            },
        }
        if let Some(what) = duplicate {
            self.warn(format!(
                "SDF parsing: duplicate {} for celltype \"{}\"; merging",
                what, celltype
            ));
        }
    }

    /// Body of a `DELAY` (or extended `ENERGY`) block, after its keyword.
    fn read_delay_block(&mut self, cell: &mut SdfCell, energy: bool) -> Result<(), ParseError> {
        loop {
            if self.lex.have_punct(')')? {
                return Ok(());
            }
            self.expect_punct('(', "parsing DELAY")?;
            if self.lex.have_keyword("ABSOLUTE")? {
                self.read_path_list(cell, energy, false)?;
            } else if self.lex.have_keyword("INCREMENT")? {
                self.read_path_list(cell, energy, true)?;
            } else if self.lex.have_keyword("PATHPULSE")?
                || self.lex.have_keyword("PATHPULSEPERCENT")?
            {
                self.lex.skip_balanced(1)?;
            } else {
                return Err(self.err(
                    "ABSOLUTE, INCREMENT, or PATHPULSE",
                    "parsing DELAY",
                ));
            }
        }
    }

    /// Path records up to the closing paren of ABSOLUTE/INCREMENT.
    fn read_path_list(
        &mut self,
        cell: &mut SdfCell,
        energy: bool,
        increment: bool,
    ) -> Result<(), ParseError> {
        loop {
            if self.lex.have_punct(')')? {
                return Ok(());
            }
            self.expect_punct('(', "parsing delay paths")?;
            let path = self.read_path_record(increment)?;
            if energy {
                cell.energies.push(path);
            } else {
                cell.paths.push(path);
            }
        }
    }

    /// One path record, after its opening paren; consumes the closing paren.
    fn read_path_record(&mut self, increment: bool) -> Result<SdfPath, ParseError> {
        if self.lex.have_keyword("COND")? {
            // Optional quoted label before the expression.
            if self.lex.sym() == TokKind::QString {
                self.lex.advance()?;
            }
            let e = self.parse_cond_expr()?;
            self.expect_punct('(', "parsing COND")?;
            if !self.lex.have_keyword("IOPATH")? {
                return Err(self.err("IOPATH", "parsing COND"));
            }
            let mut path = self.read_iopath(increment)?;
            path.cond = Some(e);
            self.expect_punct(')', "parsing COND")?;
            Ok(path)
        } else if self.lex.have_keyword("CONDELSE")? {
            self.expect_punct('(', "parsing CONDELSE")?;
            if !self.lex.have_keyword("IOPATH")? {
                return Err(self.err("IOPATH", "parsing CONDELSE"));
            }
            let mut path = self.read_iopath(increment)?;
            path.cond = Some(CondExpr::Else);
            self.expect_punct(')', "parsing CONDELSE")?;
            Ok(path)
        } else if self.lex.have_keyword("IOPATH")? {
            self.read_iopath(increment)
        } else if self.lex.have_keyword("PORT")? {
            let to = self.require_hier_id("parsing PORT")?;
            let delay = self.read_delay()?;
            self.expect_punct(')', "parsing PORT")?;
            Ok(SdfPath {
                kind: SdfPathKind::Port,
                increment,
                dirfrom: Edge::None,
                cond: None,
                from: None,
                to: Some(to),
                delay,
            })
        } else if self.lex.have_keyword("INTERCONNECT")? {
            let from = self.require_hier_id("parsing INTERCONNECT")?;
            let to = self.require_hier_id("parsing INTERCONNECT")?;
            let delay = self.read_delay()?;
            self.expect_punct(')', "parsing INTERCONNECT")?;
            Ok(SdfPath {
                kind: SdfPathKind::Interconnect,
                increment,
                dirfrom: Edge::None,
                cond: None,
                from: Some(from),
                to: Some(to),
                delay,
            })
        } else if self.lex.have_keyword("NETDELAY")? {
            let to = self.require_hier_id("parsing NETDELAY")?;
            let delay = self.read_delay()?;
            self.expect_punct(')', "parsing NETDELAY")?;
            Ok(SdfPath {
                kind: SdfPathKind::NetDelay,
                increment,
                dirfrom: Edge::None,
                cond: None,
                from: None,
                to: Some(to),
                delay,
            })
        } else if self.lex.have_keyword("DEVICE")? {
            // The port is optional for DEVICE.
            let to = self.parse_hier_id()?;
            let delay = self.read_delay()?;
            self.expect_punct(')', "parsing DEVICE")?;
            Ok(SdfPath {
                kind: SdfPathKind::Device,
                increment,
                dirfrom: Edge::None,
                cond: None,
                from: None,
                to,
                delay,
            })
        } else {
            Err(self.err("path record", "parsing delay paths"))
        }
    }

    /// `IOPATH <edge? from> <to> <retain?> <delval-list>)`, consuming the
    /// closing paren.
    fn read_iopath(&mut self, increment: bool) -> Result<SdfPath, ParseError> {
        let mut dirfrom = Edge::None;
        let from = if self.lex.is_punct('(') {
            self.lex.advance()?;
            dirfrom = if self.lex.have_keyword("posedge")? {
                Edge::Posedge
            } else if self.lex.have_keyword("negedge")? {
                Edge::Negedge
            } else {
                return Err(self.err("posedge or negedge", "parsing IOPATH"));
            };
            let id = self.require_hier_id("parsing IOPATH")?;
            self.expect_punct(')', "parsing IOPATH")?;
            id
        } else {
            self.require_hier_id("parsing IOPATH")?
        };
        let to = self.require_hier_id("parsing IOPATH")?;

        // RETAIN specs are swallowed.
        loop {
            self.lex.push_pos();
            if self.lex.have_punct('(')? && self.lex.have_keyword("RETAIN")? {
                self.lex.skip_balanced(1)?;
                self.lex.pop_pos();
            } else {
                self.lex.set_pos();
                self.lex.pop_pos();
                break;
            }
        }

        let delay = self.read_delay()?;
        self.expect_punct(')', "parsing IOPATH")?;
        Ok(SdfPath {
            kind: SdfPathKind::IoPath,
            increment,
            dirfrom,
            cond: None,
            from: Some(from),
            to: Some(to),
            delay,
        })
    }

    /*---- delay values ----*/

    /// A delval list: up to twelve parenthesized delvals, of which the
    /// first two are kept as zero-to-one and one-to-zero. A single delval
    /// covers both transitions.
    fn read_delay(&mut self) -> Result<SdfDelay, ParseError> {
        let mut d = SdfDelay::default();
        if !self.lex.is_punct('(') {
            return Err(self.err("delay value", "parsing delval"));
        }
        d.z2o = self.read_delval()?;
        if !self.lex.is_punct('(') {
            d.o2z = d.z2o;
            return Ok(d);
        }
        d.o2z = self.read_delval()?;
        let mut count = 2;
        while count < 12 && self.lex.is_punct('(') {
            self.read_delval()?;
            count += 1;
        }
        Ok(d)
    }

    /// One delval: `(v)` or `((v) (r-limit) [(e-limit)])`. Only the leading
    /// value is recorded; an empty delval is zero.
    fn read_delval(&mut self) -> Result<Triplet, ParseError> {
        self.expect_punct('(', "parsing delval")?;
        if self.lex.have_punct('(')? {
            let t = parse_triplet(self.lex)?.unwrap_or(Triplet::ZERO);
            self.expect_punct(')', "parsing delval")?;
            self.expect_punct('(', "parsing delval")?;
            let _ = parse_triplet(self.lex)?; // r-limit
            self.expect_punct(')', "parsing delval")?;
            if self.lex.have_punct('(')? {
                let _ = parse_triplet(self.lex)?; // e-limit
                self.expect_punct(')', "parsing delval")?;
            }
            self.expect_punct(')', "parsing delval")?;
            Ok(t)
        } else {
            let t = parse_triplet(self.lex)?.unwrap_or(Triplet::ZERO);
            self.expect_punct(')', "parsing delval")?;
            Ok(t)
        }
    }

    /*---- conditional expressions ----*/

    /// Precedence, low to high: `||`, `&&`, `|`, `^`, `&`, `==`/`!=`,
    /// prefix `~`/`!`, primary. All binary operators associate left.
    fn parse_cond_expr(&mut self) -> Result<CondExpr, ParseError> {
        match self.parse_or()? {
            Some(e) => Ok(e),
            None => Err(self.err("conditional expression", "parsing COND")),
        }
    }

    /// Run a sub-parser after a consumed operator; a missing operand is a
    /// hard error.
    fn require_expr(
        &mut self,
        f: fn(&mut Self) -> Result<Option<CondExpr>, ParseError>,
    ) -> Result<CondExpr, ParseError> {
        match f(self)? {
            Some(e) => Ok(e),
            None => Err(self.err("expression operand", "parsing COND")),
        }
    }

    fn parse_or(&mut self) -> Result<Option<CondExpr>, ParseError> {
        let Some(mut l) = self.parse_and()? else {
            return Ok(None);
        };
        while self.lex.is_op2("||") {
            self.lex.advance()?;
            let r = self.require_expr(Self::parse_and)?;
            l = CondExpr::Or(Box::new(l), Box::new(r));
        }
        Ok(Some(l))
    }

    fn parse_and(&mut self) -> Result<Option<CondExpr>, ParseError> {
        let Some(mut l) = self.parse_bitor()? else {
            return Ok(None);
        };
        while self.lex.is_op2("&&") {
            self.lex.advance()?;
            let r = self.require_expr(Self::parse_bitor)?;
            l = CondExpr::And(Box::new(l), Box::new(r));
        }
        Ok(Some(l))
    }

    fn parse_bitor(&mut self) -> Result<Option<CondExpr>, ParseError> {
        let Some(mut l) = self.parse_xor()? else {
            return Ok(None);
        };
        while self.lex.is_punct('|') {
            self.lex.advance()?;
            let r = self.require_expr(Self::parse_xor)?;
            l = CondExpr::Or(Box::new(l), Box::new(r));
        }
        Ok(Some(l))
    }

    fn parse_xor(&mut self) -> Result<Option<CondExpr>, ParseError> {
        let Some(mut l) = self.parse_bitand()? else {
            return Ok(None);
        };
        while self.lex.is_punct('^') {
            self.lex.advance()?;
            let r = self.require_expr(Self::parse_bitand)?;
            l = CondExpr::Xor(Box::new(l), Box::new(r));
        }
        Ok(Some(l))
    }

    fn parse_bitand(&mut self) -> Result<Option<CondExpr>, ParseError> {
        let Some(mut l) = self.parse_equality()? else {
            return Ok(None);
        };
        while self.lex.is_punct('&') {
            self.lex.advance()?;
            let r = self.require_expr(Self::parse_equality)?;
            l = CondExpr::And(Box::new(l), Box::new(r));
        }
        Ok(Some(l))
    }

    fn parse_equality(&mut self) -> Result<Option<CondExpr>, ParseError> {
        let Some(mut l) = self.parse_unary()? else {
            return Ok(None);
        };
        loop {
            let ne = if self.lex.is_op2("==") {
                false
            } else if self.lex.is_op2("!=") {
                true
            } else {
                break;
            };
            self.lex.advance()?;
            let r = self.require_expr(Self::parse_unary)?;
            l = if ne {
                CondExpr::Ne(Box::new(l), Box::new(r))
            } else {
                CondExpr::Eq(Box::new(l), Box::new(r))
            };
        }
        Ok(Some(l))
    }

    fn parse_unary(&mut self) -> Result<Option<CondExpr>, ParseError> {
        if self.lex.is_punct('~') || self.lex.is_punct('!') {
            self.lex.advance()?;
            let e = self.require_expr(Self::parse_unary)?;
            return Ok(Some(CondExpr::Not(Box::new(e))));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Option<CondExpr>, ParseError> {
        if self.lex.sym() == TokKind::BinConst {
            let e = if self.lex.ival() != 0 {
                CondExpr::True
            } else {
                CondExpr::False
            };
            self.lex.advance()?;
            return Ok(Some(e));
        }
        if self.lex.is_punct('(') {
            self.lex.push_pos();
            self.lex.advance()?;
            // A paren that opens the IOPATH ends the expression.
            if self.lex.sym() == TokKind::Ident
                && self.lex.text().eq_ignore_ascii_case("IOPATH")
            {
                self.lex.set_pos();
                self.lex.pop_pos();
                return Ok(None);
            }
            let e = match self.parse_or()? {
                Some(e) => e,
                None => {
                    self.lex.set_pos();
                    self.lex.pop_pos();
                    return Ok(None);
                }
            };
            self.expect_punct(')', "parsing conditional expression")?;
            self.lex.pop_pos();
            return Ok(Some(e));
        }
        Ok(self.parse_var_id()?.map(CondExpr::Var))
    }

    /*---- identifiers ----*/

    fn require_hier_id(&mut self, context: &'static str) -> Result<HierId, ParseError> {
        match self.parse_hier_id()? {
            Some(id) => Ok(id),
            None => Err(self.err("hierarchical identifier", context)),
        }
    }

    /// Collect contiguous tokens into a raw identifier and split it under
    /// the header divider (canonically when a demangler is attached).
    fn parse_hier_id(&mut self) -> Result<Option<HierId>, ParseError> {
        self.collect_and_parse(false)
    }

    /// Like [`Self::parse_hier_id`] but also stopping at expression
    /// operators, for `COND` variables.
    fn parse_var_id(&mut self) -> Result<Option<HierId>, ParseError> {
        self.collect_and_parse(true)
    }

    fn collect_and_parse(&mut self, stop_ops: bool) -> Result<Option<HierId>, ParseError> {
        let raw = match self.collect_raw_id(stop_ops)? {
            Some(raw) => raw,
            None => return Ok(None),
        };
        match parse_maybe_mangled(
            &raw,
            self.out.demangler.as_ref(),
            self.out.header.divider,
            '[',
            Some(']'),
        ) {
            Some(id) => Ok(Some(id)),
            None => {
                self.warn(format!(
                    "SDF parsing: failed to parse hierarchical identifier `{}`",
                    raw
                ));
                Ok(None)
            }
        }
    }

    fn collect_raw_id(&mut self, stop_ops: bool) -> Result<Option<String>, ParseError> {
        let mut raw = String::new();
        let mut first = true;
        loop {
            let t = self.lex.cur();
            let stop = match t.kind {
                TokKind::Punct => {
                    let c = t.text.chars().next().unwrap_or(' ');
                    c == '('
                        || c == ')'
                        || (stop_ops && matches!(c, '~' | '!' | '&' | '|' | '^' | '='))
                }
                TokKind::Op2 | TokKind::BinConst | TokKind::QString | TokKind::StarKw => true,
                TokKind::Eof => true,
                TokKind::Int | TokKind::Real | TokKind::Ident => false,
            };
            if stop || (!first && t.ws_before) {
                break;
            }
            raw.push_str(&t.text);
            first = false;
            self.lex.advance()?;
        }
        if raw.is_empty() {
            Ok(None)
        } else {
            Ok(Some(raw))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(input: &str) -> Sdf {
        let mut sdf = Sdf::new(false);
        sdf.read_str(input).unwrap();
        sdf
    }

    fn header_and(cells: &str) -> String {
        format!(
            r#"(DELAYFILE
  (SDFVERSION "3.0")
  (DESIGN "top")
  (DATE "Tue Jul 30")
  (VENDOR "example")
  (PROGRAM "pnr")
  (VERSION "1.0")
  (DIVIDER /)
  (VOLTAGE 1.62:1.8:1.98)
  (PROCESS "typical")
  (TEMPERATURE 25.0)
  (TIMESCALE 1 ns)
{}
)
"#,
            cells
        )
    }

    const ONE_CELL: &str = r#"  (CELL
    (CELLTYPE "INVX1")
    (INSTANCE u1)
    (DELAY (ABSOLUTE
      (IOPATH A Y (0.1:0.2:0.3) (0.15:0.25:0.35))
    ))
  )"#;

    #[test]
    fn test_header_fields() {
        let sdf = parse(&header_and(ONE_CELL));
        let h = sdf.header();
        assert_eq!(h.sdf_version.as_deref(), Some("3.0"));
        assert_eq!(h.design_name.as_deref(), Some("top"));
        assert_eq!(h.divider, '/');
        assert_eq!(h.voltage, Triplet::new(1.62, 1.8, 1.98));
        assert_eq!(h.process.as_deref(), Some("typical"));
        assert_eq!(h.temperature, Triplet::splat(25.0));
        assert!((h.timescale - 1e-9).abs() < 1e-21);
        assert!(!h.extended);
        assert!(h.energyscale.is_none());
    }

    #[test]
    fn test_timescale_100ps() {
        // Seed scenario 4.
        let input = header_and(ONE_CELL).replace("(TIMESCALE 1 ns)", "(TIMESCALE 100 ps)");
        let sdf = parse(&input);
        assert!((sdf.header().timescale - 1e-10).abs() < 1e-22);
    }

    #[test]
    fn test_iopath_delays() {
        let sdf = parse(&header_and(ONE_CELL));
        let ct = sdf.get_cell("INVX1").unwrap();
        let inst = HierId::single("u1");
        let cell = ct.get_instance(&inst).unwrap();
        assert_eq!(cell.paths.len(), 1);
        let p = &cell.paths[0];
        assert_eq!(p.kind, SdfPathKind::IoPath);
        assert!(!p.increment);
        assert_eq!(p.dirfrom, Edge::None);
        assert_eq!(p.from.as_ref().unwrap(), &HierId::single("A"));
        assert_eq!(p.to.as_ref().unwrap(), &HierId::single("Y"));
        assert_eq!(p.delay.z2o, Triplet::new(0.1, 0.2, 0.3));
        assert_eq!(p.delay.o2z, Triplet::new(0.15, 0.25, 0.35));
    }

    #[test]
    fn test_single_delval_copied() {
        let cells = r#"  (CELL
    (CELLTYPE "BUFX1")
    (INSTANCE u2)
    (DELAY (ABSOLUTE (IOPATH A Y (1.2))))
  )"#;
        let sdf = parse(&header_and(cells));
        let cell_id = HierId::single("u2");
        let cell = sdf.get_cell("BUFX1").unwrap().get_instance(&cell_id).unwrap();
        assert_eq!(cell.paths[0].delay.z2o, Triplet::splat(1.2));
        assert_eq!(cell.paths[0].delay.o2z, Triplet::splat(1.2));
    }

    #[test]
    fn test_cond_expression() {
        // Seed scenario 5.
        let cells = r#"  (CELL
    (CELLTYPE "AOI21")
    (INSTANCE u3)
    (DELAY (ABSOLUTE
      (COND a & ~b (IOPATH A Y (1.2) (1.5)))
    ))
  )"#;
        let sdf = parse(&header_and(cells));
        let inst = HierId::single("u3");
        let cell = sdf.get_cell("AOI21").unwrap().get_instance(&inst).unwrap();
        let p = &cell.paths[0];
        assert_eq!(p.kind, SdfPathKind::IoPath);
        assert_eq!(
            p.cond.as_ref().unwrap(),
            &CondExpr::And(
                Box::new(CondExpr::var("a")),
                Box::new(CondExpr::Not(Box::new(CondExpr::var("b"))))
            )
        );
        assert_eq!(p.delay.z2o, Triplet::splat(1.2));
        assert_eq!(p.delay.o2z, Triplet::splat(1.5));
    }

    fn cond_of(expr: &str) -> CondExpr {
        let cells = format!(
            r#"  (CELL
    (CELLTYPE "X")
    (INSTANCE u)
    (DELAY (ABSOLUTE (COND {} (IOPATH A Y (1)))))
  )"#,
            expr
        );
        let sdf = parse(&header_and(&cells));
        let inst = HierId::single("u");
        sdf.get_cell("X").unwrap().get_instance(&inst).unwrap().paths[0]
            .cond
            .clone()
            .unwrap()
    }

    #[test]
    fn test_cond_precedence() {
        use CondExpr::*;
        // a | b & c parses as OR(a, AND(b, c)).
        assert_eq!(
            cond_of("a | b & c"),
            Or(
                Box::new(CondExpr::var("a")),
                Box::new(And(Box::new(CondExpr::var("b")), Box::new(CondExpr::var("c"))))
            )
        );
        // a && b || c parses as OR(AND(a, b), c).
        assert_eq!(
            cond_of("a && b || c"),
            Or(
                Box::new(And(Box::new(CondExpr::var("a")), Box::new(CondExpr::var("b")))),
                Box::new(CondExpr::var("c"))
            )
        );
        // ~a == b parses as EQ(NOT(a), b).
        assert_eq!(
            cond_of("~a == b"),
            Eq(
                Box::new(Not(Box::new(CondExpr::var("a")))),
                Box::new(CondExpr::var("b"))
            )
        );
    }

    #[test]
    fn test_cond_constants_and_parens() {
        assert_eq!(cond_of("1'b1"), CondExpr::True);
        assert_eq!(cond_of("1'b0"), CondExpr::False);
        assert_eq!(cond_of("1'b0n"), CondExpr::False);
        use CondExpr::*;
        // Parens override precedence.
        assert_eq!(
            cond_of("(a | b) & c"),
            And(
                Box::new(Or(Box::new(CondExpr::var("a")), Box::new(CondExpr::var("b")))),
                Box::new(CondExpr::var("c"))
            )
        );
    }

    #[test]
    fn test_condelse() {
        let cells = r#"  (CELL
    (CELLTYPE "MUX2")
    (INSTANCE u4)
    (DELAY (ABSOLUTE
      (COND s (IOPATH A Y (0.1)))
      (CONDELSE (IOPATH B Y (0.2)))
    ))
  )"#;
        let sdf = parse(&header_and(cells));
        let inst = HierId::single("u4");
        let cell = sdf.get_cell("MUX2").unwrap().get_instance(&inst).unwrap();
        assert_eq!(cell.paths[1].cond, Some(CondExpr::Else));
    }

    #[test]
    fn test_wildcard_and_instance() {
        // Seed scenario 6.
        let cells = r#"  (CELL
    (CELLTYPE "DFF")
    (INSTANCE *)
    (DELAY (ABSOLUTE (IOPATH CLK Q (0.5))))
  )
  (CELL
    (CELLTYPE "DFF")
    (INSTANCE u/v)
    (DELAY (ABSOLUTE (IOPATH CLK Q (0.7))))
  )"#;
        let sdf = parse(&header_and(cells));
        assert!(sdf.has_per_instance());
        let ct = sdf.get_cell("DFF").unwrap();
        assert!(ct.wildcard.is_some());
        assert_eq!(ct.instances.len(), 1);

        let specific = HierId::parse_str("u/v", '/', '[', Some(']')).unwrap();
        let other = HierId::parse_str("other", '/', '[', Some(']')).unwrap();
        assert_eq!(
            ct.get_instance(&specific).unwrap().paths[0].delay.z2o,
            Triplet::splat(0.7)
        );
        assert_eq!(
            ct.get_instance(&other).unwrap().paths[0].delay.z2o,
            Triplet::splat(0.5)
        );
    }

    #[test]
    fn test_lookup_fallbacks() {
        let sdf = parse(&header_and(ONE_CELL));
        assert!(sdf.get_cell("INVX1").is_some());
        assert!(sdf.get_cell("NOPE").is_none());
        // No wildcard: unknown instance resolves to nothing.
        let unknown = HierId::single("zzz");
        assert!(sdf
            .get_cell("INVX1")
            .unwrap()
            .get_instance(&unknown)
            .is_none());
    }

    #[test]
    fn test_used_flag_and_report_unused() {
        let cells = format!("{}\n{}", ONE_CELL, ONE_CELL.replace("INVX1", "NANDX1"));
        let sdf = parse(&header_and(&cells));
        let _ = sdf.get_cell("INVX1");
        let mut out = Vec::new();
        sdf.report_unused("unused celltype", &mut out).unwrap();
        let report = String::from_utf8(out).unwrap();
        assert!(!report.contains("INVX1"));
        assert!(report.contains("unused celltype: NANDX1"));
    }

    #[test]
    fn test_instance_star_merge_warns() {
        let cells = r#"  (CELL
    (CELLTYPE "INVX1")
    (INSTANCE *)
    (DELAY (ABSOLUTE (IOPATH A Y (0.1))))
  )
  (CELL
    (CELLTYPE "INVX1")
    (INSTANCE *)
    (DELAY (INCREMENT (IOPATH A Y (0.2))))
  )"#;
        let sdf = parse(&header_and(cells));
        let ct = &sdf.celltypes()["INVX1"];
        let w = ct.wildcard.as_ref().unwrap();
        assert_eq!(w.paths.len(), 2);
        assert!(!w.paths[0].increment);
        assert!(w.paths[1].increment);
        assert!(sdf
            .warnings()
            .iter()
            .any(|w| w.msg.contains("duplicate `INSTANCE *`")));
    }

    #[test]
    fn test_duplicate_instance_merge_warns() {
        let cells = r#"  (CELL
    (CELLTYPE "DFF")
    (INSTANCE d0)
    (DELAY (ABSOLUTE (IOPATH CLK Q (0.5))))
  )
  (CELL
    (CELLTYPE "DFF")
    (INSTANCE d0)
    (DELAY (INCREMENT (IOPATH CLK Q (0.02))))
  )"#;
        let sdf = parse(&header_and(cells));
        let ct = &sdf.celltypes()["DFF"];
        assert_eq!(ct.instances.len(), 1);
        let inst = HierId::single("d0");
        let cell = ct.get_instance(&inst).unwrap();
        assert_eq!(cell.paths.len(), 2);
        assert!(!cell.paths[0].increment);
        assert!(cell.paths[1].increment);
        assert!(sdf
            .warnings()
            .iter()
            .any(|w| w.msg.contains("duplicate instance `d0`")));
    }

    #[test]
    fn test_empty_instance_is_wildcard() {
        let cells = r#"  (CELL
    (CELLTYPE "TOP")
    (INSTANCE)
    (DELAY (ABSOLUTE (INTERCONNECT u1/Y u2/A (0.01))))
  )"#;
        let sdf = parse(&header_and(cells));
        let ct = &sdf.celltypes()["TOP"];
        assert!(ct.wildcard.is_some());
        let p = &ct.wildcard.as_ref().unwrap().paths[0];
        assert_eq!(p.kind, SdfPathKind::Interconnect);
        assert_eq!(p.from.as_ref().unwrap().comps[0].name, "u1");
        assert_eq!(p.to.as_ref().unwrap().comps[1].name, "A");
    }

    #[test]
    fn test_edge_qualifier() {
        let cells = r#"  (CELL
    (CELLTYPE "DFF")
    (INSTANCE d0)
    (DELAY (ABSOLUTE (IOPATH (posedge CLK) Q (0.35) (0.33))))
  )"#;
        let sdf = parse(&header_and(cells));
        let inst = HierId::single("d0");
        let p = &sdf.get_cell("DFF").unwrap().get_instance(&inst).unwrap().paths[0];
        assert_eq!(p.dirfrom, Edge::Posedge);
        assert_eq!(p.from.as_ref().unwrap(), &HierId::single("CLK"));
    }

    #[test]
    fn test_port_netdelay_device() {
        let cells = r#"  (CELL
    (CELLTYPE "TOP")
    (INSTANCE *)
    (DELAY (ABSOLUTE
      (PORT u1/A (0.05))
      (NETDELAY n1 (0.07))
      (DEVICE Y (0.09))
    ))
  )"#;
        let sdf = parse(&header_and(cells));
        let cell = sdf.celltypes()["TOP"].wildcard.as_ref().unwrap();
        assert_eq!(cell.paths[0].kind, SdfPathKind::Port);
        assert!(cell.paths[0].from.is_none());
        assert_eq!(cell.paths[1].kind, SdfPathKind::NetDelay);
        assert_eq!(cell.paths[2].kind, SdfPathKind::Device);
        assert_eq!(cell.paths[2].to.as_ref().unwrap(), &HierId::single("Y"));
    }

    #[test]
    fn test_nested_delval_and_overflow() {
        // Nested rvalues keep the innermost leading triplet; extra delvals
        // beyond the first two are consumed and dropped.
        let cells = r#"  (CELL
    (CELLTYPE "X")
    (INSTANCE u)
    (DELAY (ABSOLUTE
      (IOPATH A Y ((0.1:0.2:0.3) (0.4)) (0.5) (0.6) (0.7) (0.8) (0.9))
    ))
  )"#;
        let sdf = parse(&header_and(cells));
        let inst = HierId::single("u");
        let p = &sdf.get_cell("X").unwrap().get_instance(&inst).unwrap().paths[0];
        assert_eq!(p.delay.z2o, Triplet::new(0.1, 0.2, 0.3));
        assert_eq!(p.delay.o2z, Triplet::splat(0.5));
    }

    #[test]
    fn test_retain_and_pathpulse_skipped() {
        let cells = r#"  (CELL
    (CELLTYPE "DFF")
    (INSTANCE d1)
    (DELAY
      (PATHPULSE A Y (1) (2))
      (ABSOLUTE (IOPATH CLK Q (RETAIN (0.1)) (0.5) (0.4)))
    )
  )"#;
        let sdf = parse(&header_and(cells));
        let inst = HierId::single("d1");
        let p = &sdf.get_cell("DFF").unwrap().get_instance(&inst).unwrap().paths[0];
        assert_eq!(p.delay.z2o, Triplet::splat(0.5));
        assert_eq!(p.delay.o2z, Triplet::splat(0.4));
    }

    #[test]
    fn test_timingcheck_skipped() {
        let cells = r#"  (CELL
    (CELLTYPE "DFF")
    (INSTANCE d2)
    (TIMINGCHECK
      (SETUP D (posedge CLK) (0.08))
      (HOLD D (posedge CLK) (-0.03))
    )
    (DELAY (ABSOLUTE (IOPATH CLK Q (0.5))))
  )"#;
        let sdf = parse(&header_and(cells));
        let inst = HierId::single("d2");
        let cell = sdf.get_cell("DFF").unwrap().get_instance(&inst).unwrap();
        assert_eq!(cell.paths.len(), 1);
    }

    #[test]
    fn test_extended_energy_and_leakage() {
        let input = r#"(XDELAYFILE
  (SDFVERSION "3.0")
  (DESIGN "top")
  (DIVIDER /)
  (TIMESCALE 1 ns)
  (ENERGYSCALE 10 pJ)
  (CELL
    (CELLTYPE "INVX1")
    (INSTANCE u1)
    (DELAY (ABSOLUTE (IOPATH A Y (0.1))))
    (ENERGY (ABSOLUTE (IOPATH A Y (0.02) (0.03))))
    (LEAKAGE 0.001)
  )
)
"#;
        let sdf = parse(input);
        assert!(sdf.header().extended);
        assert!((sdf.header().energyscale.unwrap() - 1e-11).abs() < 1e-23);
        let inst = HierId::single("u1");
        let cell = sdf.get_cell("INVX1").unwrap().get_instance(&inst).unwrap();
        assert_eq!(cell.paths.len(), 1);
        assert_eq!(cell.energies.len(), 1);
        assert_eq!(cell.energies[0].delay.z2o, Triplet::splat(0.02));
        assert_eq!(cell.leakage, Some(Triplet::splat(0.001)));
    }

    #[test]
    fn test_energy_skipped_when_not_extended() {
        let cells = r#"  (CELL
    (CELLTYPE "INVX1")
    (INSTANCE u1)
    (DELAY (ABSOLUTE (IOPATH A Y (0.1))))
    (ENERGY (ABSOLUTE (IOPATH A Y (0.02))))
  )"#;
        let sdf = parse(&header_and(cells));
        let inst = HierId::single("u1");
        let cell = sdf.get_cell("INVX1").unwrap().get_instance(&inst).unwrap();
        assert!(cell.energies.is_empty());
    }

    #[test]
    fn test_no_cells_is_structural_error() {
        let input = "(DELAYFILE (SDFVERSION \"3.0\") )";
        let mut sdf = Sdf::new(false);
        let err = sdf.read_str(input).unwrap_err();
        assert!(matches!(err, ParseError::Structural(_)));
        assert!(!sdf.is_valid());
    }

    #[test]
    fn test_summary() {
        let sdf = parse(&header_and(ONE_CELL));
        let s = sdf.summary();
        assert!(s.contains("1 celltypes"));
        assert!(s.contains("1 cells"));
        assert!(s.contains("1 delay paths"));
    }
}
