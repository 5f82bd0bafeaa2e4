// SPDX-FileCopyrightText: Copyright (c) 2024 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Canonical emitters for the SPEF and SDF models.
//!
//! Printing is read-only and round-trips: the output of a valid model parses
//! back to a structurally equal model and is a fixed point under one more
//! print. Numbers are normalized, units are rescaled to a canonical suffix,
//! name-map numbering is preserved, and SDF paths are emitted grouped by
//! their absolute/increment flag. Invalid models get a `// Status: invalid`
//! banner so downstream consumers know the output is diagnostic only.

use std::io::{self, Write};

use crate::ident::HierId;
use crate::sdf::{CondExpr, Edge, Sdf, SdfCell, SdfDelay, SdfPath};
use crate::spef::{
    PortDir, Spef, SpefAttributes, SpefConn, SpefId, SpefNet, SpefNetBody, SpefNode, SpefPort,
};
use crate::triplet::Triplet;

/// `%g`-style formatting for derived f64 values: rounds away the noise a
/// scale/rescale pair introduces while keeping plain values untouched.
fn fmt_g(v: f64) -> String {
    if v == 0.0 || !v.is_finite() {
        return format!("{}", v);
    }
    let exp = v.abs().log10().floor() as i32;
    let factor = 10f64.powi(8 - exp);
    format!("{}", (v * factor).round() / factor)
}

/// Pick the largest unit that keeps the value at or above one; values below
/// the smallest unit stay in the smallest unit.
fn canon_unit(value: f64, choices: &[(&'static str, f64)]) -> (f64, &'static str) {
    for &(name, scale) in choices {
        if value >= scale {
            return (value / scale, name);
        }
    }
    let &(name, scale) = choices.last().unwrap();
    (value / scale, name)
}

impl PortDir {
    fn letter(&self) -> char {
        match self {
            PortDir::Input => 'I',
            PortDir::Output => 'O',
            PortDir::Bidir => 'B',
        }
    }
}

impl Spef {
    /// Emit the canonical textual form of the model.
    pub fn print(&self, w: &mut impl Write) -> io::Result<()> {
        writeln!(w, "// Status: {}", if self.valid { "valid" } else { "invalid" })?;

        let h = &self.header;
        writeln!(w, "*SPEF \"{}\"", h.spef_version)?;
        writeln!(w, "*DESIGN \"{}\"", h.design_name)?;
        writeln!(w, "*DATE \"{}\"", h.date)?;
        writeln!(w, "*VENDOR \"{}\"", h.vendor)?;
        writeln!(w, "*PROGRAM \"{}\"", h.program)?;
        writeln!(w, "*VERSION \"{}\"", h.version)?;
        write!(w, "*DESIGN_FLOW")?;
        for s in &h.design_flow {
            write!(w, " \"{}\"", s)?;
        }
        writeln!(w)?;
        writeln!(w, "*DIVIDER {}", h.divider)?;
        writeln!(w, "*DELIMITER {}", h.delimiter)?;
        match h.bus_suffix {
            Some(suffix) => writeln!(w, "*BUS_DELIMITER {} {}", h.bus_prefix, suffix)?,
            None => writeln!(w, "*BUS_DELIMITER {}", h.bus_prefix)?,
        }

        let (tv, tu) = canon_unit(self.units.time, &[("NS", 1e-9), ("PS", 1e-12)]);
        writeln!(w, "*T_UNIT {} {}", fmt_g(tv), tu)?;
        let (cv, cu) = canon_unit(self.units.cap, &[("PF", 1e-12), ("FF", 1e-15)]);
        writeln!(w, "*C_UNIT {} {}", fmt_g(cv), cu)?;
        let (rv, ru) = canon_unit(self.units.res, &[("KOHM", 1e3), ("OHM", 1.0)]);
        writeln!(w, "*R_UNIT {} {}", fmt_g(rv), ru)?;
        let (lv, lu) = canon_unit(
            self.units.induc,
            &[("HENRY", 1.0), ("MH", 1e-3), ("UH", 1e-6)],
        );
        writeln!(w, "*L_UNIT {} {}", fmt_g(lv), lu)?;

        if !self.name_map.is_empty() {
            writeln!(w, "*NAME_MAP")?;
            for (idx, id) in &self.name_map {
                writeln!(w, "*{} {}", idx, self.hier(id))?;
            }
        }

        if !self.power_nets.is_empty() {
            write!(w, "*POWER_NETS")?;
            for id in &self.power_nets {
                write!(w, " {}", self.id(id))?;
            }
            writeln!(w)?;
        }
        if !self.gnd_nets.is_empty() {
            write!(w, "*GROUND_NETS")?;
            for id in &self.gnd_nets {
                write!(w, " {}", self.id(id))?;
            }
            writeln!(w)?;
        }

        for (kw, ports) in [("*PORTS", &self.ports), ("*PHYSICAL_PORTS", &self.phys_ports)] {
            if ports.is_empty() {
                continue;
            }
            writeln!(w, "{}", kw)?;
            for port in ports {
                self.print_port(w, port)?;
            }
        }

        for d in &self.defines {
            let kw = if d.physical { "*PDEFINE" } else { "*DEFINE" };
            writeln!(w, "{} {} \"{}\"", kw, self.id(&d.inst), d.design)?;
        }

        for net in self.nets.values() {
            self.print_net(w, net)?;
        }
        Ok(())
    }

    /// Stripped form: net types and names only, without parasitic bodies.
    pub fn dump_rc(&self, w: &mut impl Write) -> io::Result<()> {
        for net in self.nets.values() {
            writeln!(w, "{} {}", net.kind().keyword(), self.net_name(net))?;
        }
        Ok(())
    }

    fn print_port(&self, w: &mut impl Write, port: &SpefPort) -> io::Result<()> {
        match &port.inst {
            Some(inst) => write!(
                w,
                "{}{}{}",
                self.id(inst),
                self.header.delimiter,
                self.id(&port.pin)
            )?,
            None => write!(w, "{}", self.id(&port.pin))?,
        }
        write!(w, " {}", port.dir.letter())?;
        if let Some(attrs) = &port.attrs {
            self.print_attrs(w, attrs)?;
        }
        writeln!(w)
    }

    fn print_attrs(&self, w: &mut impl Write, attrs: &SpefAttributes) -> io::Result<()> {
        if let Some(load) = &attrs.load {
            write!(w, " *L {}", load)?;
        }
        if let Some((cx, cy)) = &attrs.coord {
            write!(w, " *C {} {}", cx, cy)?;
        }
        if let Some(slew) = &attrs.slew {
            write!(w, " *S {} {}", slew.rise, slew.fall)?;
            if let Some((t1, t2)) = &slew.thresholds {
                write!(w, " {} {}", t1, t2)?;
            }
        }
        if let Some(drive) = &attrs.drive {
            write!(w, " *D {}", self.id(drive))?;
        }
        Ok(())
    }

    fn print_net(&self, w: &mut impl Write, net: &SpefNet) -> io::Result<()> {
        write!(w, "{} {} {}", net.kind().keyword(), self.net_name(net), net.tot_cap)?;
        if let Some(v) = net.routing_confidence {
            write!(w, " *V {}", v)?;
        }
        writeln!(w)?;

        match &net.body {
            SpefNetBody::Detailed(d) => {
                if !d.conns.is_empty() {
                    writeln!(w, "*CONN")?;
                    for conn in &d.conns {
                        match conn {
                            SpefConn::Port {
                                inst,
                                pin,
                                dir,
                                attrs,
                            } => {
                                write!(w, "*P ")?;
                                match inst {
                                    Some(inst) => write!(
                                        w,
                                        "{}{}{}",
                                        self.id(inst),
                                        self.header.delimiter,
                                        self.id(pin)
                                    )?,
                                    None => write!(w, "{}", self.id(pin))?,
                                }
                                write!(w, " {}", dir.letter())?;
                                if let Some(attrs) = attrs {
                                    self.print_attrs(w, attrs)?;
                                }
                                writeln!(w)?;
                            }
                            SpefConn::Pin {
                                inst,
                                pin,
                                dir,
                                attrs,
                            } => {
                                write!(
                                    w,
                                    "*I {}{}{} {}",
                                    self.id(inst),
                                    self.header.delimiter,
                                    self.id(pin),
                                    dir.letter()
                                )?;
                                if let Some(attrs) = attrs {
                                    self.print_attrs(w, attrs)?;
                                }
                                writeln!(w)?;
                            }
                            SpefConn::Internal { net, node, coord } => {
                                writeln!(
                                    w,
                                    "*N {}{}{} *C {} {}",
                                    self.id(net),
                                    self.header.delimiter,
                                    node,
                                    coord.0,
                                    coord.1
                                )?;
                            }
                        }
                    }
                }
                for (kw, list) in [("*CAP", &d.caps), ("*RES", &d.res), ("*INDUC", &d.induc)] {
                    if list.is_empty() {
                        continue;
                    }
                    writeln!(w, "{}", kw)?;
                    for p in list {
                        write!(w, "{} {}", p.id, self.node(&p.node))?;
                        if let Some(n2) = &p.node2 {
                            write!(w, " {}", self.node(n2))?;
                        }
                        writeln!(w, " {}", p.val)?;
                    }
                }
            }
            SpefNetBody::Reduced(r) => {
                for drv in &r.drivers {
                    write!(w, "*DRIVER ")?;
                    match &drv.inst {
                        Some(inst) => writeln!(
                            w,
                            "{}{}{}",
                            self.id(inst),
                            self.header.delimiter,
                            self.id(&drv.pin)
                        )?,
                        None => writeln!(w, "{}", self.id(&drv.pin))?,
                    }
                    writeln!(w, "*CELL {}", self.id(&drv.cell))?;
                    writeln!(w, "*C2_R1_C1 {} {} {}", drv.c2, drv.r1, drv.c1)?;
                    writeln!(w, "*LOADS")?;
                    for load in &drv.loads {
                        write!(w, "*RC ")?;
                        match &load.inst {
                            Some(inst) => write!(
                                w,
                                "{}{}{}",
                                self.id(inst),
                                self.header.delimiter,
                                self.id(&load.pin)
                            )?,
                            None => write!(w, "{}", self.id(&load.pin))?,
                        }
                        write!(w, " {}", load.val)?;
                        for (kw, pole) in [("*Q", &load.pole), ("*K", &load.residue)] {
                            if let Some(p) = pole {
                                write!(w, " {} {} {}", kw, p.idx, complex_str(&p.re, &p.im))?;
                            }
                        }
                        writeln!(w)?;
                    }
                }
            }
        }
        writeln!(w, "*END")
    }

    fn hier(&self, id: &HierId) -> String {
        id.display(self.header.divider, self.header.bus_prefix, self.header.bus_suffix)
            .to_string()
    }

    /// Mapped ids keep their `*<int>` spelling; owned ids print in full.
    fn id(&self, id: &SpefId) -> String {
        match id {
            SpefId::Mapped { index, .. } => format!("*{}", index),
            SpefId::Owned(h) => self.hier(h),
        }
    }

    fn net_name(&self, net: &SpefNet) -> String {
        if net.pin_tail {
            // The last component was pin-delimited in the input.
            let path = net.name.path();
            let mut head = path.clone();
            let tail = head.comps.pop().unwrap();
            format!(
                "{}{}{}",
                self.hier(&head),
                self.header.delimiter,
                HierId::single(tail.name).display(
                    self.header.divider,
                    self.header.bus_prefix,
                    self.header.bus_suffix
                )
            )
        } else {
            self.id(&net.name)
        }
    }

    fn node(&self, n: &SpefNode) -> String {
        let mut s = String::new();
        if let Some(inst) = &n.inst {
            s.push_str(&self.id(inst));
        }
        if let Some(pin) = &n.pin {
            if n.inst.is_some() {
                s.push(self.header.delimiter);
            }
            s.push_str(&self.id(pin));
        }
        if let Some(idx) = n.idx {
            s.push(self.header.delimiter);
            s.push_str(&idx.to_string());
        }
        s
    }
}

fn complex_str(re: &Triplet, im: &Triplet) -> String {
    if re.is_singleton() && im.is_singleton() {
        if im.typ == 0.0 {
            format!("{}", re.typ)
        } else {
            format!("{} {}", re.typ, im.typ)
        }
    } else if *im == Triplet::ZERO {
        format!("{}:{}:{}", re.best, re.typ, re.worst)
    } else {
        format!(
            "{} {}:{} {}:{} {}",
            re.best, im.best, re.typ, im.typ, re.worst, im.worst
        )
    }
}

impl Sdf {
    /// Emit the canonical textual form of the model: celltype-major, the
    /// wildcard record first, paths grouped by absolute/increment.
    pub fn print(&self, w: &mut impl Write) -> io::Result<()> {
        writeln!(w, "// Status: {}", if self.valid { "valid" } else { "invalid" })?;
        let h = &self.header;
        writeln!(w, "({}", if h.extended { "XDELAYFILE" } else { "DELAYFILE" })?;
        for (kw, field) in [
            ("SDFVERSION", &h.sdf_version),
            ("DESIGN", &h.design_name),
            ("DATE", &h.date),
            ("VENDOR", &h.vendor),
            ("PROGRAM", &h.program),
            ("VERSION", &h.version),
        ] {
            if let Some(s) = field {
                writeln!(w, "  ({} \"{}\")", kw, s)?;
            }
        }
        writeln!(w, "  (DIVIDER {})", h.divider)?;
        writeln!(w, "  (VOLTAGE {})", h.voltage)?;
        if let Some(p) = &h.process {
            writeln!(w, "  (PROCESS \"{}\")", p)?;
        }
        writeln!(w, "  (TEMPERATURE {})", h.temperature)?;
        let (tv, tu) = scale_value(
            h.timescale,
            &[
                ("s", 1.0),
                ("ms", 1e-3),
                ("us", 1e-6),
                ("ns", 1e-9),
                ("ps", 1e-12),
                ("fs", 1e-15),
            ],
        );
        writeln!(w, "  (TIMESCALE {} {})", tv, tu)?;
        if let Some(es) = h.energyscale {
            let (ev, eu) = scale_value(
                es,
                &[
                    ("J", 1.0),
                    ("mJ", 1e-3),
                    ("uJ", 1e-6),
                    ("nJ", 1e-9),
                    ("pJ", 1e-12),
                    ("fJ", 1e-15),
                ],
            );
            writeln!(w, "  (ENERGYSCALE {} {})", ev, eu)?;
        }

        for ct in self.celltypes.values() {
            if let Some(cell) = &ct.wildcard {
                self.print_cell(w, &ct.celltype, None, cell)?;
            }
            for (inst, cell) in &ct.instances {
                self.print_cell(w, &ct.celltype, Some(inst), cell)?;
            }
        }
        writeln!(w, ")")
    }

    fn print_cell(
        &self,
        w: &mut impl Write,
        celltype: &str,
        inst: Option<&HierId>,
        cell: &SdfCell,
    ) -> io::Result<()> {
        writeln!(w, "  (CELL")?;
        writeln!(w, "    (CELLTYPE \"{}\")", celltype)?;
        match inst {
            Some(id) => writeln!(
                w,
                "    (INSTANCE {})",
                id.display(self.header.divider, '[', Some(']'))
            )?,
            None => writeln!(w, "    (INSTANCE *)")?,
        }
        self.print_paths(w, "DELAY", &cell.paths)?;
        self.print_paths(w, "ENERGY", &cell.energies)?;
        if let Some(leak) = &cell.leakage {
            writeln!(w, "    (LEAKAGE {})", leak)?;
        }
        writeln!(w, "  )")
    }

    fn print_paths(&self, w: &mut impl Write, kw: &str, paths: &[SdfPath]) -> io::Result<()> {
        for increment in [false, true] {
            let group: Vec<&SdfPath> = paths.iter().filter(|p| p.increment == increment).collect();
            if group.is_empty() {
                continue;
            }
            writeln!(
                w,
                "    ({} ({}",
                kw,
                if increment { "INCREMENT" } else { "ABSOLUTE" }
            )?;
            for p in group {
                writeln!(w, "      {}", self.path_str(p))?;
            }
            writeln!(w, "    ))")?;
        }
        Ok(())
    }

    fn path_str(&self, p: &SdfPath) -> String {
        let base = self.path_record_str(p);
        match &p.cond {
            None => base,
            Some(CondExpr::Else) => format!("(CONDELSE {})", base),
            Some(e) => format!("(COND {} {})", self.cond_str(e, 0), base),
        }
    }

    fn path_record_str(&self, p: &SdfPath) -> String {
        let mut s = String::from("(");
        s.push_str(p.kind.keyword());
        if let Some(from) = &p.from {
            let id = from.display(self.header.divider, '[', Some(']')).to_string();
            match p.dirfrom {
                Edge::None => {
                    s.push(' ');
                    s.push_str(&id);
                }
                Edge::Posedge => {
                    s.push_str(" (posedge ");
                    s.push_str(&id);
                    s.push(')');
                }
                Edge::Negedge => {
                    s.push_str(" (negedge ");
                    s.push_str(&id);
                    s.push(')');
                }
            }
        }
        if let Some(to) = &p.to {
            s.push(' ');
            s.push_str(&to.display(self.header.divider, '[', Some(']')).to_string());
        }
        s.push(' ');
        s.push_str(&delay_str(&p.delay));
        s.push(')');
        s
    }

    /// Minimal-paren expression printing; parenthesizes wherever the child
    /// binds looser than its parent so the output re-parses to the same
    /// tree. Constants print with the natural convention: true is `1'b1`.
    fn cond_str(&self, e: &CondExpr, parent_prec: u8) -> String {
        let (prec, s) = match e {
            CondExpr::Or(l, r) => (
                1,
                format!("{} | {}", self.cond_str(l, 1), self.cond_str(r, 2)),
            ),
            CondExpr::Xor(l, r) => (
                2,
                format!("{} ^ {}", self.cond_str(l, 2), self.cond_str(r, 3)),
            ),
            CondExpr::And(l, r) => (
                3,
                format!("{} & {}", self.cond_str(l, 3), self.cond_str(r, 4)),
            ),
            CondExpr::Eq(l, r) => (
                4,
                format!("{} == {}", self.cond_str(l, 4), self.cond_str(r, 5)),
            ),
            CondExpr::Ne(l, r) => (
                4,
                format!("{} != {}", self.cond_str(l, 4), self.cond_str(r, 5)),
            ),
            CondExpr::Not(x) => (5, format!("~{}", self.cond_str(x, 5))),
            CondExpr::Var(id) => (
                6,
                id.display(self.header.divider, '[', Some(']')).to_string(),
            ),
            CondExpr::True => (6, "1'b1".to_string()),
            CondExpr::False => (6, "1'b0".to_string()),
            CondExpr::Else => (6, String::new()),
        };
        if prec < parent_prec {
            format!("({})", s)
        } else {
            s
        }
    }
}

fn delay_str(d: &SdfDelay) -> String {
    format!("({}) ({})", d.z2o, d.o2z)
}

fn scale_value(v: f64, units: &[(&'static str, f64)]) -> (i64, &'static str) {
    for &(name, scale) in units {
        if v >= scale {
            return ((v / scale).round() as i64, name);
        }
    }
    let &(name, scale) = units.last().unwrap();
    ((v / scale).round() as i64, name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fmt_g() {
        assert_eq!(fmt_g(10.000000000000002), "10");
        assert_eq!(fmt_g(0.01), "0.01");
        assert_eq!(fmt_g(1.5), "1.5");
        assert_eq!(fmt_g(0.0), "0");
        assert_eq!(fmt_g(100.0), "100");
    }

    #[test]
    fn test_canon_unit() {
        // 10 PS stays in PS; 1.5 ns moves to NS.
        assert_eq!(canon_unit(1e-11, &[("NS", 1e-9), ("PS", 1e-12)]), (10.0, "PS"));
        let (v, u) = canon_unit(1.5e-9, &[("NS", 1e-9), ("PS", 1e-12)]);
        assert_eq!(u, "NS");
        assert!((v - 1.5).abs() < 1e-9);
        // Below the smallest unit, the smallest unit still applies.
        let (v, u) = canon_unit(1e-16, &[("PF", 1e-12), ("FF", 1e-15)]);
        assert_eq!(u, "FF");
        assert!((v - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_scale_value() {
        assert_eq!(scale_value(1e-10, &[("ns", 1e-9), ("ps", 1e-12)]), (100, "ps"));
        assert_eq!(scale_value(1.0, &[("s", 1.0), ("ms", 1e-3)]), (1, "s"));
        assert_eq!(scale_value(1e-2, &[("s", 1.0), ("ms", 1e-3)]), (10, "ms"));
    }

    #[test]
    fn test_complex_str() {
        assert_eq!(complex_str(&Triplet::splat(2.5), &Triplet::ZERO), "2.5");
        assert_eq!(
            complex_str(&Triplet::splat(1.0), &Triplet::splat(4.0)),
            "1 4"
        );
        assert_eq!(
            complex_str(&Triplet::new(1.0, 2.0, 3.0), &Triplet::ZERO),
            "1:2:3"
        );
        assert_eq!(
            complex_str(&Triplet::new(1.0, 2.0, 3.0), &Triplet::new(4.0, 5.0, 6.0)),
            "1 4:2 5:3 6"
        );
    }
}
