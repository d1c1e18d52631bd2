//! nfpm-helper-lib: building Linux packages from upstream release archives.
//!
//! A package directory holds a configuration naming a download URL template
//! and one output per architecture. Building it downloads each architecture's
//! release archive into a shared cache, extracts it into a scratch directory
//! and hands that directory to the external `nfpm` tool once per requested
//! package format.
//!
//! - [`build::Builder`]: one package directory, many architectures and formats
//! - [`generate::Generator`]: many package directories across local or git repositories
//! - [`cache::ContentCache`]: URL-keyed download cache
//! - [`expand::Expander`]: `${NAME}` / `$NAME` template variables

pub mod archive;
pub mod build;
pub mod cache;
pub mod checksum;
pub mod config;
pub mod consts;
pub mod expand;
pub mod generate;
pub mod packager;
pub mod platform;
