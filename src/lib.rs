// SPDX-FileCopyrightText: Copyright (c) 2024 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Readers and writers for the two textual back-annotation formats of
//! IC back-end flows: SPEF (IEEE 1481) parasitics and SDF (IEEE 1497)
//! delays, including the extended energy dialect.
//!
//! Both readers share a lexer with checkpoint/rewind support and a
//! hierarchical-identifier model that honors each file's configurable
//! divider and bus-delimiter characters. Parsed models are queryable in
//! place and re-emit a canonical textual form that round-trips.
//!
//! ```
//! use backanno::sdf::Sdf;
//!
//! let mut sdf = Sdf::new(false);
//! sdf.read_str(r#"(DELAYFILE
//!   (SDFVERSION "3.0")
//!   (DIVIDER /)
//!   (TIMESCALE 1 ns)
//!   (CELL (CELLTYPE "INVX1") (INSTANCE u1)
//!     (DELAY (ABSOLUTE (IOPATH A Y (0.1) (0.2)))))
//! )"#).unwrap();
//! assert!(sdf.is_valid());
//! assert!(sdf.get_cell("INVX1").is_some());
//! ```

pub mod error;

pub mod lexer;

pub mod ident;

pub mod triplet;

pub mod spef;

pub mod sdf;

pub mod print;
