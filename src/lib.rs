// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![allow(clippy::too_many_arguments)]
//#![deny(unsafe_code)]
// - 'file/physical.rs' uses mmap to map a file into memory

//! # cilmeta
//!
//! Reading, building and writing ECMA-335 (CLI) metadata without a runtime.
//!
//! `cilmeta` works on the metadata blob of a .NET assembly: the `BSJB` root, its heaps and the
//! compressed tables stream, plus the Portable PDB variant of the same format. The PE container
//! around it is left to the caller; [`metadata::cor20header::Cor20Header`] is the one place
//! where the two meet.
//!
//! ## Features
//!
//! - **Reader** - [`metadata::image::MetadataImage`] parses a metadata blob, borrowed or
//!   memory-mapped, into frozen heaps and tables with binary search over sorted tables
//! - **Writer** - [`metadata::writer::MetadataWriter`] lays out heaps and tables and decides
//!   every index width from the final sizes; an unmodified image re-emits byte for byte
//! - **Builder** - [`builder::MetadataBuilder`] defines a new assembly member by member, using
//!   pseudo-tokens for rows that only get their position at finalize
//! - **Signatures** - [`metadata::signatures`] parses and encodes every blob signature kind,
//!   custom modifiers included
//! - **Portable PDB** - [`builder::PortablePdbBuilder`] writes documents and sequence points
//!   for a build
//! - **Binder** - [`binder::Binder`] resolves method and property overloads
//!
//! ## Quick Start
//!
//! ```rust
//! use cilmeta::prelude::*;
//!
//! let mut builder = MetadataBuilder::new(BuilderOptions::default());
//! builder.define_module("Demo.dll", uguid::guid!("01234567-89ab-cdef-0123-456789abcdef"))?;
//! builder.define_type(0, "", "<Module>", None)?;
//! let object = builder.define_type_ref(None, "System", "Object")?;
//! let program = builder.define_type(TypeAttributes::PUBLIC, "Demo", "Program", Some(object))?;
//! let main = builder.define_method(
//!     program,
//!     MethodAttributes::PUBLIC | MethodAttributes::STATIC,
//!     MethodImplAttributes::empty(),
//!     "Main",
//!     &SignatureMethod::new(TypeSignature::Void, vec![]),
//! )?;
//!
//! let finished = builder.finalize()?;
//! let image = MetadataImage::read(finished.data())?;
//! assert_eq!(image.type_name(program)?, "Demo.Program");
//! assert_eq!(finished.resolve(main)?, Token::new(0x0600_0001));
//! # Ok::<(), cilmeta::Error>(())
//! ```
//!
//! ## Errors
//!
//! Every fallible operation returns [`Result`]. [`Error`] separates malformed input, exceeded
//! format limits and misuse of the builder API (see [`Error::is_contract_violation`]).
//!
//! ## Logging
//!
//! The crate logs through the [`log`] facade: layout decisions at `debug`, pseudo-token fixups at
//! `trace` and tolerated malformations of the input at `warn`.

#[macro_use]
pub(crate) mod error;
pub(crate) mod file;

/// Convenient re-exports of the most commonly used types.
///
/// ```rust
/// use cilmeta::prelude::*;
///
/// let token = Token::from_parts(TableId::TypeDef, 2);
/// assert_eq!(token.value(), 0x0200_0002);
/// ```
pub mod prelude;

/// Overload resolution for methods and properties
pub mod binder;

/// Building the metadata of a new assembly and its Portable PDB
pub mod builder;

/// The metadata format: root, heaps, tables, signatures, tokens and the reader and writer
/// built on them
pub mod metadata;

/// `cilmeta` Result type
///
/// A type alias for [`std::result::Result<T, Error>`].
pub type Result<T> = std::result::Result<T, Error>;

/// `cilmeta` Error type
///
/// # Examples
///
/// ```rust
/// use cilmeta::{metadata::image::MetadataImage, Error};
///
/// match MetadataImage::read(&[0x42, 0x53]) {
///     Ok(_) => unreachable!(),
///     Err(Error::Malformed { message, .. }) => println!("malformed: {message}"),
///     Err(error) => println!("error: {error}"),
/// }
/// ```
pub use error::Error;

/// Bounds-checked cursor over a byte slice
pub use file::parser::Parser;

/// Append-only byte cursor used by every encoder
pub use file::writer::ByteWriter;

/// An in-memory or memory-mapped metadata source
pub use file::File;
