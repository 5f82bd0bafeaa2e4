// SPDX-FileCopyrightText: Copyright (c) 2024 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Reader for Standard Parasitic Exchange Format (SPEF, IEEE 1481) files.
//!
//! SPEF describes the extracted resistance/capacitance/inductance parasitics
//! of a routed design. The format is comma-free and context-sensitive: the
//! hierarchy divider, pin delimiter, and bus delimiters are declared in the
//! file header and apply to every identifier after it, and long paths are
//! compressed through a name map (`*NAME_MAP`) whose entries are referenced
//! as `*<int>` tokens.
//!
//! [`Spef::read_str`] builds the model in place; [`Spef::print`] re-emits a
//! canonical form that parses back to the same model.

use std::io;
use std::path::Path;
use std::rc::Rc;

use compact_str::CompactString;
use indexmap::IndexMap;
use smallvec::SmallVec;

use crate::error::{ParseError, Warning, Warnings};
use crate::ident::{parse_maybe_mangled, Demangle, HierComp, HierId, IdentityDemangle};
use crate::lexer::{Lexer, TokKind};
use crate::triplet::{parse_complex, parse_triplet, try_number, Triplet};

/// A SPEF identifier: either owned outright or a shared reference into the
/// name map. Mapped ids keep their integer so the printer can re-emit the
/// `*<int>` spelling; equality and hashing go through the resolved path, so
/// two models differing only in name-map integer choice compare equal.
#[derive(Debug, Clone)]
pub enum SpefId {
    Owned(HierId),
    Mapped { index: u32, id: Rc<HierId> },
}

impl SpefId {
    pub fn path(&self) -> &HierId {
        match self {
            SpefId::Owned(id) => id,
            SpefId::Mapped { id, .. } => id,
        }
    }

    pub fn is_mapped(&self) -> bool {
        matches!(self, SpefId::Mapped { .. })
    }
}

impl PartialEq for SpefId {
    fn eq(&self, other: &Self) -> bool {
        self.path() == other.path()
    }
}

impl Eq for SpefId {}

impl std::hash::Hash for SpefId {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.path().hash(state);
    }
}

/// Header knobs and free-form strings.
#[derive(Debug, Clone)]
pub struct SpefHeader {
    pub spef_version: String,
    pub design_name: String,
    pub date: String,
    pub vendor: String,
    pub program: String,
    pub version: String,
    pub design_flow: Vec<String>,
    pub divider: char,
    pub delimiter: char,
    pub bus_prefix: char,
    pub bus_suffix: Option<char>,
}

impl Default for SpefHeader {
    fn default() -> Self {
        SpefHeader {
            spef_version: String::new(),
            design_name: String::new(),
            date: String::new(),
            vendor: String::new(),
            program: String::new(),
            version: String::new(),
            design_flow: Vec::new(),
            divider: '.',
            delimiter: ':',
            bus_prefix: '[',
            bus_suffix: Some(']'),
        }
    }
}

/// Units scaled to SI: seconds, farads, ohms, henries.
#[derive(Debug, Clone, Copy)]
pub struct SpefUnits {
    pub time: f64,
    pub cap: f64,
    pub res: f64,
    pub induc: f64,
}

impl Default for SpefUnits {
    fn default() -> Self {
        SpefUnits {
            time: 1e-9,
            cap: 1e-12,
            res: 1.0,
            induc: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortDir {
    Input,
    Output,
    Bidir,
}

/// Optional attributes attached to ports and connection end-points.
#[derive(Debug, Clone, Default)]
pub struct SpefAttributes {
    pub coord: Option<(f64, f64)>,
    pub load: Option<Triplet>,
    pub slew: Option<SpefSlew>,
    pub drive: Option<SpefId>,
}

impl SpefAttributes {
    fn is_empty(&self) -> bool {
        self.coord.is_none() && self.load.is_none() && self.slew.is_none() && self.drive.is_none()
    }
}

#[derive(Debug, Clone)]
pub struct SpefSlew {
    pub rise: Triplet,
    pub fall: Triplet,
    /// Rising and falling thresholds (%), when given.
    pub thresholds: Option<(Triplet, Triplet)>,
}

/// A logical or physical port.
#[derive(Debug, Clone)]
pub struct SpefPort {
    pub inst: Option<SpefId>,
    pub pin: SpefId,
    pub dir: PortDir,
    pub attrs: Option<Box<SpefAttributes>>,
}

/// A `*DEFINE`/`*PDEFINE` entry for hierarchical SPEF. The child model is
/// filled in by an out-of-band hierarchical loader, if at all.
#[derive(Debug)]
pub struct SpefDefine {
    pub physical: bool,
    pub inst: SpefId,
    pub design: String,
    pub child: Option<Box<Spef>>,
}

/// One end-point of a parasitic element: `inst:pin`, an internal node
/// `net:<int>`, or a bare port name.
#[derive(Debug, Clone, PartialEq)]
pub struct SpefNode {
    pub inst: Option<SpefId>,
    pub pin: Option<SpefId>,
    pub idx: Option<u32>,
}

/// A connection end-point of a detailed net.
#[derive(Debug, Clone)]
pub enum SpefConn {
    /// `*P`: external (possibly physical) port.
    Port {
        inst: Option<SpefId>,
        pin: SpefId,
        dir: PortDir,
        attrs: Option<Box<SpefAttributes>>,
    },
    /// `*I`: internal instance pin.
    Pin {
        inst: SpefId,
        pin: SpefId,
        dir: PortDir,
        attrs: Option<Box<SpefAttributes>>,
    },
    /// `*N`: internal net node with coordinates.
    Internal {
        net: SpefId,
        node: u32,
        coord: (f32, f32),
    },
}

/// One capacitor, resistor, or inductor entry. Coupling capacitors carry two
/// nodes; ground capacitors one.
#[derive(Debug, Clone)]
pub struct SpefParasitic {
    pub id: u32,
    pub node: SpefNode,
    pub node2: Option<SpefNode>,
    pub val: Triplet,
}

#[derive(Debug, Clone, Default)]
pub struct SpefDetailedNet {
    pub conns: Vec<SpefConn>,
    pub caps: Vec<SpefParasitic>,
    pub res: Vec<SpefParasitic>,
    pub induc: Vec<SpefParasitic>,
}

/// Pole or residue values for one RC descriptor.
#[derive(Debug, Clone)]
pub struct SpefPole {
    pub idx: u32,
    pub re: Triplet,
    pub im: Triplet,
}

/// One load of a reduced-net driver.
#[derive(Debug, Clone)]
pub struct SpefRcLoad {
    pub inst: Option<SpefId>,
    pub pin: SpefId,
    pub val: Triplet,
    pub pole: Option<SpefPole>,
    pub residue: Option<SpefPole>,
}

/// One driver of a reduced net: driving pin, cell type, π-model, loads.
#[derive(Debug, Clone)]
pub struct SpefDriver {
    pub inst: Option<SpefId>,
    pub pin: SpefId,
    pub cell: SpefId,
    pub c2: Triplet,
    pub r1: Triplet,
    pub c1: Triplet,
    pub loads: Vec<SpefRcLoad>,
}

#[derive(Debug, Clone, Default)]
pub struct SpefReducedNet {
    pub drivers: Vec<SpefDriver>,
}

#[derive(Debug)]
pub enum SpefNetBody {
    Detailed(SpefDetailedNet),
    Reduced(SpefReducedNet),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpefNetKind {
    Detailed,
    Reduced,
    DetailedPhysical,
    ReducedPhysical,
}

impl SpefNetKind {
    pub fn keyword(&self) -> &'static str {
        match self {
            SpefNetKind::Detailed => "*D_NET",
            SpefNetKind::Reduced => "*R_NET",
            SpefNetKind::DetailedPhysical => "*D_PNET",
            SpefNetKind::ReducedPhysical => "*R_PNET",
        }
    }
}

/// A net with parasitic information.
#[derive(Debug)]
pub struct SpefNet {
    pub name: SpefId,
    /// True when the last path component was pin-delimited (`top/u1:A`);
    /// the printer restores the delimiter.
    pub pin_tail: bool,
    pub physical: bool,
    pub tot_cap: Triplet,
    /// Routing confidence (`*V`): 10 = statistical wire load model up
    /// through 100 = final placement, final route, 3d extraction.
    pub routing_confidence: Option<u32>,
    pub body: SpefNetBody,
}

impl SpefNet {
    pub fn kind(&self) -> SpefNetKind {
        match (&self.body, self.physical) {
            (SpefNetBody::Detailed(_), false) => SpefNetKind::Detailed,
            (SpefNetBody::Reduced(_), false) => SpefNetKind::Reduced,
            (SpefNetBody::Detailed(_), true) => SpefNetKind::DetailedPhysical,
            (SpefNetBody::Reduced(_), true) => SpefNetKind::ReducedPhysical,
        }
    }
}

/// Parsed SPEF file.
#[derive(Debug, Default)]
pub struct Spef {
    pub(crate) header: SpefHeader,
    pub(crate) units: SpefUnits,
    pub(crate) name_map: IndexMap<u32, Rc<HierId>>,
    pub(crate) power_nets: Vec<SpefId>,
    pub(crate) gnd_nets: Vec<SpefId>,
    pub(crate) ports: Vec<SpefPort>,
    pub(crate) phys_ports: Vec<SpefPort>,
    pub(crate) defines: Vec<SpefDefine>,
    pub(crate) nets: IndexMap<HierId, SpefNet>,
    pub(crate) valid: bool,
    pub(crate) demangler: Option<Rc<dyn Demangle>>,
    pub(crate) warnings: Warnings,
}

impl Spef {
    /// Create a reader. With `demangle` set, identifiers are canonicalized
    /// through the identity adapter; use [`Spef::with_demangler`] to attach
    /// a real toolchain adapter.
    pub fn new(demangle: bool) -> Self {
        let mut s = Spef::default();
        if demangle {
            s.demangler = Some(Rc::new(IdentityDemangle));
        }
        s
    }

    pub fn with_demangler(demangler: Rc<dyn Demangle>) -> Self {
        let mut s = Spef::default();
        s.demangler = Some(demangler);
        s
    }

    /// Route warnings somewhere other than `log::warn!`.
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

    /// Parse a complete SPEF file. Reading twice on one object is not
    /// defined. On error the model is marked invalid and the error is also
    /// recorded as a warning.
    pub fn read_str(&mut self, input: &str) -> Result<(), ParseError> {
        self.valid = false;
        let result = (|| {
            let mut lex = Lexer::new(input)?;
            let mut parser = SpefParser {
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
                    | ParseError::UnexpectedToken { line, col, .. }
                    | ParseError::UnknownIndex { line, col, .. } => (*line, *col),
                    _ => (0, 0),
                };
                self.warnings.emit(line, col, format!("SPEF parsing error: {}", e));
                Err(e)
            }
        }
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn header(&self) -> &SpefHeader {
        &self.header
    }

    pub fn units(&self) -> &SpefUnits {
        &self.units
    }

    pub fn name_map(&self) -> &IndexMap<u32, Rc<HierId>> {
        &self.name_map
    }

    pub fn power_nets(&self) -> &[SpefId] {
        &self.power_nets
    }

    pub fn ground_nets(&self) -> &[SpefId] {
        &self.gnd_nets
    }

    pub fn ports(&self) -> &[SpefPort] {
        &self.ports
    }

    pub fn physical_ports(&self) -> &[SpefPort] {
        &self.phys_ports
    }

    pub fn defines(&self) -> &[SpefDefine] {
        &self.defines
    }

    pub fn nets(&self) -> &IndexMap<HierId, SpefNet> {
        &self.nets
    }

    pub fn get_net(&self, name: &HierId) -> Option<&SpefNet> {
        self.nets.get(name)
    }

    pub fn warnings(&self) -> &[Warning] {
        self.warnings.list()
    }

    /// True iff `net_name` names a net in the parsed table. The name is
    /// interpreted the way the file's identifiers were: canonicalized when a
    /// demangler is attached, under the file's own delimiters otherwise. A
    /// trailing pin-delimited component (`top/u1:A`) is folded into the
    /// path, matching net-name parsing.
    pub fn is_split(&self, net_name: &str) -> bool {
        self.lookup_name(net_name).is_some()
    }

    fn lookup_name(&self, net_name: &str) -> Option<&SpefNet> {
        let h = &self.header;
        if let Some(id) = parse_maybe_mangled(
            net_name,
            self.demangler.as_ref(),
            h.divider,
            h.bus_prefix,
            h.bus_suffix,
        ) {
            if let Some(net) = self.nets.get(&id) {
                return Some(net);
            }
        }
        // Retry with the trailing pin delimiter folded in.
        let (head, tail) = net_name.rsplit_once(h.delimiter)?;
        let mut id = parse_maybe_mangled(
            head,
            self.demangler.as_ref(),
            h.divider,
            h.bus_prefix,
            h.bus_suffix,
        )?;
        id.comps.push(HierComp::new(tail));
        self.nets.get(&id)
    }

    /// One-line model statistics.
    pub fn summary(&self) -> String {
        let detailed = self
            .nets
            .values()
            .filter(|n| matches!(n.body, SpefNetBody::Detailed(_)))
            .count();
        format!(
            "SPEF: {} nets ({} detailed, {} reduced), {} ports, {} name-map entries",
            self.nets.len(),
            detailed,
            self.nets.len() - detailed,
            self.ports.len() + self.phys_ports.len(),
            self.name_map.len()
        )
    }
}

struct SpefParser<'a, 'b> {
    lex: &'a mut Lexer<'b>,
    out: &'a mut Spef,
}

impl SpefParser<'_, '_> {
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

    fn run(&mut self) -> Result<(), ParseError> {
        self.read_header()?;
        self.read_units()?;
        self.read_name_map()?;
        self.read_power_def()?;
        self.read_external_def()?;
        self.read_define_def()?;
        self.read_variation_def()?;
        self.read_internal_def()?;
        if !self.lex.at_eof() {
            return Err(self.err("end of file", "after net sections"));
        }
        Ok(())
    }

    /*---- header ----*/

    fn header_string(&mut self, kw: &'static str) -> Result<String, ParseError> {
        if !self.lex.have_star_kw(kw)? {
            return Err(self.err(format!("*{}", kw), "parsing header"));
        }
        if self.lex.sym() == TokKind::QString {
            let s = self.lex.text().to_string();
            self.lex.advance()?;
            Ok(s)
        } else {
            Err(self.err(format!("quoted string after *{}", kw), "parsing header"))
        }
    }

    fn delim_char(&mut self, allowed: &[char], what: &'static str) -> Result<char, ParseError> {
        if self.lex.sym() == TokKind::Punct {
            let c = self.lex.text().chars().next().unwrap_or(' ');
            if allowed.contains(&c) {
                self.lex.advance()?;
                return Ok(c);
            }
        }
        let list: String = allowed.iter().map(|c| format!("{} ", c)).collect();
        Err(self.err(format!("one of {}", list.trim_end()), what))
    }

    fn read_header(&mut self) -> Result<(), ParseError> {
        self.out.header.spef_version = self.header_string("SPEF")?;
        self.out.header.design_name = self.header_string("DESIGN")?;
        self.out.header.date = self.header_string("DATE")?;
        self.out.header.vendor = self.header_string("VENDOR")?;
        self.out.header.program = self.header_string("PROGRAM")?;
        self.out.header.version = self.header_string("VERSION")?;

        if !self.lex.have_star_kw("DESIGN_FLOW")? {
            return Err(self.err("*DESIGN_FLOW", "parsing header"));
        }
        if self.lex.sym() != TokKind::QString {
            self.warn("SPEF parsing error: invalid *DESIGN_FLOW in header");
        }
        while self.lex.sym() == TokKind::QString {
            let s = self.lex.text().to_string();
            self.out.header.design_flow.push(s);
            self.lex.advance()?;
        }

        if !self.lex.have_star_kw("DIVIDER")? {
            return Err(self.err("*DIVIDER", "parsing header"));
        }
        self.out.header.divider = self.delim_char(&['.', '/', ':', '|'], "parsing *DIVIDER")?;

        if !self.lex.have_star_kw("DELIMITER")? {
            return Err(self.err("*DELIMITER", "parsing header"));
        }
        self.out.header.delimiter = self.delim_char(&['.', '/', ':', '|'], "parsing *DELIMITER")?;

        if !self.lex.have_star_kw("BUS_DELIMITER")? {
            return Err(self.err("*BUS_DELIMITER", "parsing header"));
        }
        self.out.header.bus_prefix =
            self.delim_char(&['[', '{', '(', '<', ':', '.'], "parsing *BUS_DELIMITER")?;
        self.out.header.bus_suffix = None;
        if self.lex.sym() == TokKind::Punct {
            let c = self.lex.text().chars().next().unwrap_or(' ');
            if matches!(c, ']' | '}' | ')' | '>') {
                self.out.header.bus_suffix = Some(c);
                self.lex.advance()?;
            }
        }
        Ok(())
    }

    /*---- units ----*/

    fn read_unit(
        &mut self,
        kw: &'static str,
        suffixes: &[(&'static str, f64)],
        context: &'static str,
    ) -> Result<f64, ParseError> {
        if !self.lex.have_star_kw(kw)? {
            return Err(self.err(format!("*{}", kw), context));
        }
        let val = match try_number(self.lex)? {
            Some(v) => v as f64,
            None => return Err(self.err("number", context)),
        };
        if val < 0.0 {
            return Err(self.err("positive number", context));
        }
        for &(suffix, scale) in suffixes {
            if self.lex.have_keyword(suffix)? {
                return Ok(val * scale);
            }
        }
        let names: Vec<&str> = suffixes.iter().map(|(s, _)| *s).collect();
        Err(self.err(names.join(" or "), context))
    }

    fn read_units(&mut self) -> Result<(), ParseError> {
        self.out.units.time =
            self.read_unit("T_UNIT", &[("NS", 1e-9), ("PS", 1e-12)], "parsing *T_UNIT")?;
        self.out.units.cap =
            self.read_unit("C_UNIT", &[("PF", 1e-12), ("FF", 1e-15)], "parsing *C_UNIT")?;
        self.out.units.res =
            self.read_unit("R_UNIT", &[("OHM", 1.0), ("KOHM", 1e3)], "parsing *R_UNIT")?;
        self.out.units.induc = self.read_unit(
            "L_UNIT",
            &[("HENRY", 1.0), ("MH", 1e-3), ("UH", 1e-6)],
            "parsing *L_UNIT",
        )?;
        Ok(())
    }

    /*---- name map ----*/

    fn read_name_map(&mut self) -> Result<(), ParseError> {
        if !self.lex.have_star_kw("NAME_MAP")? {
            return Ok(());
        }
        while self.lex.is_punct('*') {
            self.lex.advance()?;
            if self.lex.ws_before() {
                self.warn("SPEF parsing: space after *, ignoring");
            }
            if self.lex.sym() != TokKind::Int {
                return Err(self.err("integer after *", "parsing *NAME_MAP"));
            }
            let idx = self.lex.ival() as u32;
            self.lex.advance()?;

            let id = match self.parse_path()? {
                Some(id) => id,
                None => match self.parse_physical_ref()? {
                    Some(id) => id,
                    None => {
                        return Err(self.err(
                            format!("name for *{}", idx),
                            "parsing *NAME_MAP",
                        ));
                    }
                },
            };
            if self.out.name_map.contains_key(&idx) {
                self.warn(format!(
                    "SPEF *NAME_MAP: duplicate integer {}; using latest map",
                    idx
                ));
            }
            self.out.name_map.insert(idx, Rc::new(id));
        }
        Ok(())
    }

    /*---- power / ground ----*/

    fn read_power_def(&mut self) -> Result<(), ParseError> {
        if self.lex.have_star_kw("POWER_NETS")? {
            let nets = self.id_list()?;
            if nets.is_empty() {
                return Err(self.err("net name", "parsing *POWER_NETS"));
            }
            self.out.power_nets = nets;
        }
        if self.lex.have_star_kw("GROUND_NETS")? {
            let nets = self.id_list()?;
            if nets.is_empty() {
                return Err(self.err("net name", "parsing *GROUND_NETS"));
            }
            self.out.gnd_nets = nets;
        }
        Ok(())
    }

    fn id_list(&mut self) -> Result<Vec<SpefId>, ParseError> {
        let mut out = Vec::new();
        loop {
            if let Some(id) = self.parse_index()? {
                out.push(id);
            } else if let Some(id) = self.parse_path()? {
                out.push(SpefId::Owned(id));
            } else if let Some(id) = self.parse_physical_ref()? {
                out.push(SpefId::Owned(id));
            } else {
                return Ok(out);
            }
        }
    }

    /*---- ports ----*/

    fn read_external_def(&mut self) -> Result<(), ParseError> {
        for physical in [false, true] {
            let kw = if physical { "PHYSICAL_PORTS" } else { "PORTS" };
            if !self.lex.have_star_kw(kw)? {
                continue;
            }
            let mut once = false;
            while let Some((inst, pin)) = self.parse_port_name(physical)? {
                once = true;
                let dir = match self.parse_dir()? {
                    Some(d) => d,
                    None => return Err(self.err("I, O, or B", "parsing port direction")),
                };
                let attrs = self.parse_attributes()?;
                let port = SpefPort {
                    inst,
                    pin,
                    dir,
                    attrs,
                };
                if physical {
                    self.out.phys_ports.push(port);
                } else {
                    self.out.ports.push(port);
                }
            }
            if !once {
                return Err(self.err("port name", "parsing port list"));
            }
        }
        Ok(())
    }

    /*---- defines ----*/

    fn read_define_def(&mut self) -> Result<(), ParseError> {
        loop {
            if self.lex.have_star_kw("DEFINE")? {
                let start = self.out.defines.len();
                loop {
                    let inst = match self.parse_index()? {
                        Some(id) => Some(id),
                        None => self.parse_path()?.map(SpefId::Owned),
                    };
                    match inst {
                        Some(inst) => self.out.defines.push(SpefDefine {
                            physical: false,
                            inst,
                            design: String::new(),
                            child: None,
                        }),
                        None => break,
                    }
                }
                if self.out.defines.len() == start {
                    return Err(self.err("instance name", "parsing *DEFINE"));
                }
                if self.lex.sym() != TokKind::QString {
                    return Err(self.err("design name string", "parsing *DEFINE"));
                }
                let design = self.lex.text().to_string();
                self.lex.advance()?;
                for d in &mut self.out.defines[start..] {
                    d.design = design.clone();
                }
            } else if self.lex.have_star_kw("PDEFINE")? {
                let inst = match self.parse_index()? {
                    Some(id) => id,
                    None => match self.parse_path()? {
                        Some(id) => SpefId::Owned(id),
                        None => return Err(self.err("instance name", "parsing *PDEFINE")),
                    },
                };
                if self.lex.sym() != TokKind::QString {
                    return Err(self.err("design name string", "parsing *PDEFINE"));
                }
                let design = self.lex.text().to_string();
                self.lex.advance()?;
                self.out.defines.push(SpefDefine {
                    physical: true,
                    inst,
                    design,
                    child: None,
                });
            } else {
                return Ok(());
            }
        }
    }

    fn read_variation_def(&mut self) -> Result<(), ParseError> {
        if self.lex.is_star_kw("VARIATION_PARAMETERS") {
            return Err(ParseError::Unsupported("*VARIATION_PARAMETERS"));
        }
        Ok(())
    }

    /*---- nets ----*/

    fn read_internal_def(&mut self) -> Result<(), ParseError> {
        let mut found = false;
        loop {
            let (physical, reduced) = if self.lex.is_star_kw("D_NET") {
                (false, false)
            } else if self.lex.is_star_kw("R_NET") {
                (false, true)
            } else if self.lex.is_star_kw("D_PNET") {
                (true, false)
            } else if self.lex.is_star_kw("R_PNET") {
                (true, true)
            } else {
                break;
            };
            self.lex.advance()?;
            found = true;
            let net = self.read_net(physical, reduced)?;
            let key = net.name.path().clone();
            if self.out.nets.contains_key(&key) {
                self.warn(format!(
                    "SPEF parsing: duplicate net `{}`; keeping first definition",
                    key.display(
                        self.out.header.divider,
                        self.out.header.bus_prefix,
                        self.out.header.bus_suffix
                    )
                ));
            } else {
                self.out.nets.insert(key, net);
            }
        }
        if !found {
            return Err(ParseError::Structural(
                "no nets specified in SPEF file".into(),
            ));
        }
        Ok(())
    }

    fn read_net(&mut self, physical: bool, reduced: bool) -> Result<SpefNet, ParseError> {
        let context: &'static str = if reduced {
            "parsing *R_NET"
        } else {
            "parsing *D_NET"
        };
        let (name, pin_tail) = self.parse_net_name(context)?;

        let tot_cap = match parse_triplet(self.lex)? {
            Some(t) => t,
            None => return Err(self.err("total capacitance", context)),
        };

        let routing_confidence = if self.lex.have_star_kw("V")? {
            if self.lex.sym() != TokKind::Int {
                return Err(self.err("routing confidence integer", context));
            }
            let v = self.lex.ival() as u32;
            self.lex.advance()?;
            Some(v)
        } else {
            None
        };

        let body = if reduced {
            SpefNetBody::Reduced(self.read_reduced_body()?)
        } else {
            SpefNetBody::Detailed(self.read_detailed_body()?)
        };

        if !self.lex.have_star_kw("END")? {
            return Err(self.err("*END", context));
        }

        Ok(SpefNet {
            name,
            pin_tail,
            physical,
            tot_cap,
            routing_confidence,
            body,
        })
    }

    /// Net names are paths with an optional pin-delimited tail component
    /// (`top/u1:A`). The tail folds into the path; `pin_tail` records that
    /// the delimiter has to be restored on output.
    fn parse_net_name(&mut self, context: &'static str) -> Result<(SpefId, bool), ParseError> {
        let name = match self.parse_index()? {
            Some(id) => id,
            None => match self.parse_path()? {
                Some(id) => SpefId::Owned(id),
                None => match self.parse_physical_ref()? {
                    Some(id) => SpefId::Owned(id),
                    None => return Err(self.err("net name", context)),
                },
            },
        };
        if self.have_delimiter()? {
            let tail = match self.collect_id()? {
                Some(c) => c,
                None => return Err(self.err("pin name", context)),
            };
            let mut path = name.path().clone();
            path.comps.push(HierComp::new(tail));
            return Ok((SpefId::Owned(path), true));
        }
        Ok((name, false))
    }

    fn read_detailed_body(&mut self) -> Result<SpefDetailedNet, ParseError> {
        let mut d = SpefDetailedNet::default();

        if self.lex.have_star_kw("CONN")? {
            let mut once = false;
            loop {
                if self.lex.have_star_kw("P")? {
                    once = true;
                    let (inst, pin) = match self.parse_port_name(false)? {
                        Some(p) => p,
                        None => match self.parse_port_name(true)? {
                            Some(p) => p,
                            None => return Err(self.err("port name", "parsing *P")),
                        },
                    };
                    let dir = match self.parse_dir()? {
                        Some(dir) => dir,
                        None => return Err(self.err("I, O, or B", "parsing *CONN")),
                    };
                    let attrs = self.parse_attributes()?;
                    d.conns.push(SpefConn::Port {
                        inst,
                        pin,
                        dir,
                        attrs,
                    });
                } else if self.lex.have_star_kw("I")? {
                    once = true;
                    let (inst, pin) = self.parse_inst_pin()?;
                    let dir = match self.parse_dir()? {
                        Some(dir) => dir,
                        None => return Err(self.err("I, O, or B", "parsing *CONN")),
                    };
                    let attrs = self.parse_attributes()?;
                    d.conns.push(SpefConn::Pin {
                        inst,
                        pin,
                        dir,
                        attrs,
                    });
                } else {
                    break;
                }
            }
            if !once {
                return Err(self.err("*P or *I", "parsing *CONN"));
            }

            while self.lex.have_star_kw("N")? {
                let net = match self.parse_index()? {
                    Some(id) => id,
                    None => match self.parse_path()? {
                        Some(id) => SpefId::Owned(id),
                        None => return Err(self.err("net name", "parsing *N")),
                    },
                };
                if !self.have_delimiter()? {
                    return Err(self.err("pin delimiter", "parsing *N"));
                }
                if self.lex.sym() != TokKind::Int {
                    return Err(self.err("node integer", "parsing *N"));
                }
                let node = self.lex.ival() as u32;
                self.lex.advance()?;
                if !self.lex.have_star_kw("C")? {
                    return Err(self.err("*C", "parsing *N"));
                }
                let cx = match try_number(self.lex)? {
                    Some(v) => v,
                    None => return Err(self.err("x coordinate", "parsing *N")),
                };
                let cy = match try_number(self.lex)? {
                    Some(v) => v,
                    None => return Err(self.err("y coordinate", "parsing *N")),
                };
                d.conns.push(SpefConn::Internal {
                    net,
                    node,
                    coord: (cx, cy),
                });
            }
        }

        if self.lex.have_star_kw("CAP")? {
            while self.lex.sym() == TokKind::Int {
                let id = self.lex.ival() as u32;
                self.lex.advance()?;
                let node = match self.parse_node()? {
                    Some(n) => n,
                    None => return Err(self.err("node", "parsing *CAP")),
                };
                let node2 = if self.can_start_node() {
                    self.parse_node()?
                } else {
                    None
                };
                let val = match parse_triplet(self.lex)? {
                    Some(t) => t,
                    None => return Err(self.err("capacitance value", "parsing *CAP")),
                };
                if self.lex.have_star_kw("SC")? {
                    self.warn("SPEF parsing: skipping *SC sensitivity annotation");
                    let _ = parse_triplet(self.lex)?;
                }
                if let Some(n2) = &node2 {
                    if *n2 == node {
                        self.warn(format!(
                            "SPEF parsing: coupling capacitor {} connects a node to itself",
                            id
                        ));
                    }
                }
                d.caps.push(SpefParasitic {
                    id,
                    node,
                    node2,
                    val,
                });
            }
        }

        for (kw, list_is_res) in [("RES", true), ("INDUC", false)] {
            if self.lex.have_star_kw(kw)? {
                while self.lex.sym() == TokKind::Int {
                    let id = self.lex.ival() as u32;
                    self.lex.advance()?;
                    let node = match self.parse_node()? {
                        Some(n) => n,
                        None => return Err(self.err("node", "parsing parasitic")),
                    };
                    let node2 = match self.parse_node()? {
                        Some(n) => n,
                        None => return Err(self.err("second node", "parsing parasitic")),
                    };
                    let val = match parse_triplet(self.lex)? {
                        Some(t) => t,
                        None => return Err(self.err("parasitic value", "parsing parasitic")),
                    };
                    let p = SpefParasitic {
                        id,
                        node,
                        node2: Some(node2),
                        val,
                    };
                    if list_is_res {
                        d.res.push(p);
                    } else {
                        d.induc.push(p);
                    }
                }
            }
        }

        Ok(d)
    }

    fn read_reduced_body(&mut self) -> Result<SpefReducedNet, ParseError> {
        let mut r = SpefReducedNet::default();
        while self.lex.have_star_kw("DRIVER")? {
            let (inst, pin) = match self.parse_port_name(false)? {
                Some(p) => p,
                None => return Err(self.err("driver pin", "parsing *DRIVER")),
            };
            if !self.lex.have_star_kw("CELL")? {
                return Err(self.err("*CELL", "parsing *R_NET"));
            }
            let cell = match self.parse_index()? {
                Some(id) => id,
                None => match self.parse_path()? {
                    Some(id) => SpefId::Owned(id),
                    None => return Err(self.err("cell type", "parsing *CELL")),
                },
            };
            if !self.lex.have_star_kw("C2_R1_C1")? {
                return Err(self.err("*C2_R1_C1", "parsing *R_NET"));
            }
            let mut pi = [Triplet::ZERO; 3];
            for slot in &mut pi {
                *slot = match parse_triplet(self.lex)? {
                    Some(t) => t,
                    None => return Err(self.err("pi-model value", "parsing *C2_R1_C1")),
                };
            }
            if !self.lex.have_star_kw("LOADS")? {
                return Err(self.err("*LOADS", "parsing *R_NET"));
            }
            let mut loads = Vec::new();
            while self.lex.have_star_kw("RC")? {
                let (l_inst, l_pin) = match self.parse_port_name(false)? {
                    Some(p) => p,
                    None => return Err(self.err("load pin", "parsing *RC")),
                };
                let val = match parse_triplet(self.lex)? {
                    Some(t) => t,
                    None => return Err(self.err("RC value", "parsing *RC")),
                };
                let pole = self.parse_pole("Q")?;
                let residue = self.parse_pole("K")?;
                loads.push(SpefRcLoad {
                    inst: l_inst,
                    pin: l_pin,
                    val,
                    pole,
                    residue,
                });
            }
            r.drivers.push(SpefDriver {
                inst,
                pin,
                cell,
                c2: pi[0],
                r1: pi[1],
                c1: pi[2],
                loads,
            });
        }
        Ok(r)
    }

    fn parse_pole(&mut self, kw: &'static str) -> Result<Option<SpefPole>, ParseError> {
        if !self.lex.have_star_kw(kw)? {
            return Ok(None);
        }
        if self.lex.sym() != TokKind::Int {
            return Err(self.err("pole index", "parsing pole/residue"));
        }
        let idx = self.lex.ival() as u32;
        self.lex.advance()?;
        let (re, im) = match parse_complex(self.lex)? {
            Some(p) => p,
            None => return Err(self.err("complex value", "parsing pole/residue")),
        };
        Ok(Some(SpefPole { idx, re, im }))
    }

    /*---- identifiers ----*/

    fn have_divider(&mut self) -> Result<bool, ParseError> {
        self.lex.have_punct(self.out.header.divider)
    }

    fn have_delimiter(&mut self) -> Result<bool, ParseError> {
        self.lex.have_punct(self.out.header.delimiter)
    }

    /// Assemble one path component from contiguous identifier/integer tokens
    /// with no intervening whitespace, stripping `\` escapes.
    fn collect_id(&mut self) -> Result<Option<CompactString>, ParseError> {
        let mut raw = CompactString::const_new("");
        let mut first = true;
        loop {
            let t = self.lex.cur();
            if !matches!(t.kind, TokKind::Ident | TokKind::Int) || (!first && t.ws_before) {
                break;
            }
            raw.push_str(&t.text);
            first = false;
            self.lex.advance()?;
        }
        if raw.is_empty() {
            return Ok(None);
        }
        Ok(Some(strip_escapes(&raw)))
    }

    /// Hierarchical path: optional leading divider (absolute), components
    /// separated by the divider, optional bus subscript on the last one.
    fn parse_path(&mut self) -> Result<Option<HierId>, ParseError> {
        self.lex.push_pos();
        let absolute = self.have_divider()?;
        let mut comps: SmallVec<[HierComp; 4]> = SmallVec::new();
        let mut raw = String::new();
        loop {
            match self.collect_id()? {
                Some(part) => {
                    if !raw.is_empty() {
                        raw.push(self.out.header.divider);
                    }
                    raw.push_str(&part);
                    comps.push(HierComp::new(part));
                }
                None => {
                    self.lex.set_pos();
                    self.lex.pop_pos();
                    return Ok(None);
                }
            }
            if !self.have_divider()? {
                break;
            }
        }

        if self.lex.have_punct(self.out.header.bus_prefix)? {
            if self.lex.sym() != TokKind::Int {
                self.lex.set_pos();
                self.lex.pop_pos();
                return Ok(None);
            }
            let idx = self.lex.ival() as u32;
            raw.push(self.out.header.bus_prefix);
            raw.push_str(self.lex.text());
            self.lex.advance()?;
            comps.last_mut().unwrap().index = Some(idx);
            if let Some(suffix) = self.out.header.bus_suffix {
                if self.lex.have_punct(suffix)? {
                    raw.push(suffix);
                }
            }
        }
        self.lex.pop_pos();

        if let Some(d) = self.out.demangler.clone() {
            if let Some(canon) = d.demangle(&raw) {
                if let Some(mut id) = HierId::parse_str(&canon, '.', '[', Some(']')) {
                    id.absolute = absolute;
                    return Ok(Some(id));
                }
            }
            self.warn(format!("failed to canonicalize identifier `{}`", raw));
        }
        Ok(Some(HierId { comps, absolute }))
    }

    /// Physical reference: components that may be quoted strings, separated
    /// by the divider. No absolute flag and no bus subscript.
    fn parse_physical_ref(&mut self) -> Result<Option<HierId>, ParseError> {
        self.lex.push_pos();
        let mut comps: SmallVec<[HierComp; 4]> = SmallVec::new();
        loop {
            if self.lex.sym() == TokKind::QString {
                comps.push(HierComp::new(self.lex.text()));
                self.lex.advance()?;
            } else {
                match self.collect_id()? {
                    Some(part) => comps.push(HierComp::new(part)),
                    None => {
                        self.lex.set_pos();
                        self.lex.pop_pos();
                        return Ok(None);
                    }
                }
            }
            if !self.have_divider()? {
                break;
            }
            if self.lex.sym() != TokKind::QString
                && !matches!(self.lex.sym(), TokKind::Ident | TokKind::Int)
            {
                self.lex.set_pos();
                self.lex.pop_pos();
                return Ok(None);
            }
        }
        self.lex.pop_pos();
        Ok(Some(HierId {
            comps,
            absolute: false,
        }))
    }

    /// Single (possibly quoted) name.
    fn parse_name(&mut self) -> Result<Option<SpefId>, ParseError> {
        if self.lex.sym() == TokKind::QString {
            let id = HierId::single(self.lex.text());
            self.lex.advance()?;
            return Ok(Some(SpefId::Owned(id)));
        }
        Ok(self
            .collect_id()?
            .map(|name| SpefId::Owned(HierId::single(name))))
    }

    /// `*<int>` name-map reference. The integer must follow the asterisk
    /// with no whitespace; an unmapped integer is a hard error.
    fn parse_index(&mut self) -> Result<Option<SpefId>, ParseError> {
        if !self.lex.is_punct('*') {
            return Ok(None);
        }
        self.lex.push_pos();
        self.lex.advance()?;
        if self.lex.ws_before() || self.lex.sym() != TokKind::Int {
            self.lex.set_pos();
            self.lex.pop_pos();
            return Ok(None);
        }
        let idx = self.lex.ival();
        let (line, col) = (self.lex.line(), self.lex.col());
        self.lex.advance()?;
        self.lex.pop_pos();
        match self.out.name_map.get(&(idx as u32)) {
            Some(id) => Ok(Some(SpefId::Mapped {
                index: idx as u32,
                id: id.clone(),
            })),
            None => Err(ParseError::UnknownIndex {
                index: idx as u64,
                line,
                col,
            }),
        }
    }

    /// `inst:pin` or `pin` (single component). Emits a warning and returns
    /// `None` on a malformed name, matching the recovery policy for
    /// optional substructures.
    fn parse_port_name(
        &mut self,
        physical: bool,
    ) -> Result<Option<(Option<SpefId>, SpefId)>, ParseError> {
        self.lex.push_pos();
        let first = match self.parse_index()? {
            Some(id) => Some(id),
            None => {
                if physical {
                    self.parse_name()?
                } else {
                    self.parse_path()?.map(SpefId::Owned)
                }
            }
        };
        let first = match first {
            Some(f) => f,
            None => {
                self.lex.pop_pos();
                return Ok(None);
            }
        };
        if self.have_delimiter()? {
            let second = match self.parse_index()? {
                Some(id) => Some(id),
                None => self.parse_path()?.map(SpefId::Owned),
            };
            match second {
                Some(pin) => {
                    self.lex.pop_pos();
                    Ok(Some((Some(first), pin)))
                }
                None => {
                    self.lex.set_pos();
                    self.lex.pop_pos();
                    self.warn("SPEF parsing: port name error");
                    Ok(None)
                }
            }
        } else if first.path().is_single() {
            self.lex.pop_pos();
            Ok(Some((None, first)))
        } else {
            self.lex.set_pos();
            self.lex.pop_pos();
            self.warn("SPEF parsing: port name error");
            Ok(None)
        }
    }

    /// `*I` instance pin: hierarchical instance, delimiter, single-component
    /// pin.
    fn parse_inst_pin(&mut self) -> Result<(SpefId, SpefId), ParseError> {
        let inst = match self.parse_index()? {
            Some(id) => id,
            None => match self.parse_path()? {
                Some(id) => SpefId::Owned(id),
                None => match self.parse_physical_ref()? {
                    Some(id) => SpefId::Owned(id),
                    None => return Err(self.err("instance name", "parsing *I")),
                },
            },
        };
        if !self.have_delimiter()? {
            return Err(self.err("pin delimiter", "parsing *I"));
        }
        let pin = match self.parse_index()? {
            Some(id) => id,
            None => match self.parse_name()? {
                Some(id) => id,
                None => return Err(self.err("pin name", "parsing *I")),
            },
        };
        if !pin.path().is_single() {
            return Err(self.err("single-component pin", "parsing *I"));
        }
        Ok((inst, pin))
    }

    fn can_start_node(&self) -> bool {
        matches!(self.lex.sym(), TokKind::Ident | TokKind::QString)
            || self.lex.is_punct('*')
            || self.lex.is_punct(self.out.header.divider)
    }

    /// A parasitic end-point: `inst:pin`, `net:<int>`, or a bare name.
    fn parse_node(&mut self) -> Result<Option<SpefNode>, ParseError> {
        let first = match self.parse_index()? {
            Some(id) => Some(id),
            None => match self.parse_path()? {
                Some(id) => Some(SpefId::Owned(id)),
                None => self.parse_physical_ref()?.map(SpefId::Owned),
            },
        };
        let first = match first {
            Some(f) => f,
            None => return Ok(None),
        };
        if self.have_delimiter()? {
            if self.lex.sym() == TokKind::Int {
                let idx = self.lex.ival() as u32;
                self.lex.advance()?;
                return Ok(Some(SpefNode {
                    inst: Some(first),
                    pin: None,
                    idx: Some(idx),
                }));
            }
            let pin = match self.parse_index()? {
                Some(id) => id,
                None => match self.parse_name()? {
                    Some(id) => id,
                    None => return Err(self.err("pin name", "parsing node")),
                },
            };
            return Ok(Some(SpefNode {
                inst: Some(first),
                pin: Some(pin),
                idx: None,
            }));
        }
        Ok(Some(SpefNode {
            inst: None,
            pin: Some(first),
            idx: None,
        }))
    }

    fn number_f64(&mut self) -> Result<Option<f64>, ParseError> {
        match self.lex.sym() {
            TokKind::Int | TokKind::Real => {
                let v = self.lex.rval();
                self.lex.advance()?;
                Ok(Some(v))
            }
            _ => Ok(None),
        }
    }

    fn parse_dir(&mut self) -> Result<Option<PortDir>, ParseError> {
        if self.lex.have_keyword("I")? {
            Ok(Some(PortDir::Input))
        } else if self.lex.have_keyword("O")? {
            Ok(Some(PortDir::Output))
        } else if self.lex.have_keyword("B")? {
            Ok(Some(PortDir::Bidir))
        } else {
            Ok(None)
        }
    }

    /// Zero or more `*L`/`*C`/`*S`/`*D` attributes. Duplicates warn and the
    /// latest value wins.
    fn parse_attributes(&mut self) -> Result<Option<Box<SpefAttributes>>, ParseError> {
        let mut attrs = SpefAttributes::default();
        loop {
            if self.lex.have_star_kw("L")? {
                if attrs.load.is_some() {
                    self.warn("SPEF parser: duplicate *L");
                }
                attrs.load = Some(match parse_triplet(self.lex)? {
                    Some(t) => t,
                    None => return Err(self.err("load value", "parsing *L")),
                });
            } else if self.lex.have_star_kw("C")? {
                if attrs.coord.is_some() {
                    self.warn("SPEF parser: duplicate *C");
                }
                let cx = match self.number_f64()? {
                    Some(v) => v,
                    None => return Err(self.err("x coordinate", "parsing *C")),
                };
                let cy = match self.number_f64()? {
                    Some(v) => v,
                    None => return Err(self.err("y coordinate", "parsing *C")),
                };
                attrs.coord = Some((cx, cy));
            } else if self.lex.have_star_kw("S")? {
                if attrs.slew.is_some() {
                    self.warn("SPEF parser: duplicate *S");
                }
                let rise = match parse_triplet(self.lex)? {
                    Some(t) => t,
                    None => return Err(self.err("rising slew", "parsing *S")),
                };
                let fall = match parse_triplet(self.lex)? {
                    Some(t) => t,
                    None => return Err(self.err("falling slew", "parsing *S")),
                };
                let thresholds = match parse_triplet(self.lex)? {
                    Some(t1) => match parse_triplet(self.lex)? {
                        Some(t2) => Some((t1, t2)),
                        None => {
                            self.warn("SPEF parser: slew threshold missing second value");
                            None
                        }
                    },
                    None => None,
                };
                attrs.slew = Some(SpefSlew {
                    rise,
                    fall,
                    thresholds,
                });
            } else if self.lex.have_star_kw("D")? {
                if attrs.drive.is_some() {
                    self.warn("SPEF parser: duplicate *D");
                }
                attrs.drive = Some(match self.parse_index()? {
                    Some(id) => id,
                    None => match self.parse_path()? {
                        Some(id) => SpefId::Owned(id),
                        None => return Err(self.err("cell name", "parsing *D")),
                    },
                });
            } else {
                break;
            }
        }
        if attrs.is_empty() {
            Ok(None)
        } else {
            Ok(Some(Box::new(attrs)))
        }
    }
}

fn strip_escapes(raw: &str) -> CompactString {
    if !raw.contains('\\') {
        return CompactString::from(raw);
    }
    let mut out = CompactString::const_new("");
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}
